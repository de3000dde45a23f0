//! Refractions: views bound to resources.
//!
//! A refraction pairs cursor state with a displayable image. Its central
//! obligation is the incremental update compiler `v_update`: given one
//! applied delta record, adjust the cached image and emit the minimal
//! screen instructions (cell copies and row rewrites) that synchronize the
//! display, without re-rendering rows the change did not touch.
//!
//! Orientation matters throughout: a view anchored at its top applies
//! start-relative copies, while a view showing the last page with content
//! above it applies stop-relative copies so the tail stays pinned.

use std::ops::Range;
use std::sync::Arc;

use regex::Regex;
use tracing::trace;

use core_state::delta::Summary;
use core_state::{Line, LogSnapshot, Record, ResourceId};
use core_syntax::{Field, Reformulations};
use core_text::phrase::{Cell, Measure, Phrase};
use core_text::Image;

use crate::alignment::{
    CellCopy, backward, forward, scroll_backward, scroll_forward, start_relative_delete,
    start_relative_insert, stop_relative_delete, stop_relative_insert,
};
use crate::area::Area;

/// Keyboard interpretation mode of a refraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlMode {
    #[default]
    Control,
    Insert,
    /// Insert the exact next character captured.
    Capture,
}

/// A display synchronization instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Replicate the cells of the source rectangle onto the destination.
    Copy { src: Area, dst: Area },
    /// Rewrite the area with the given cells, row-major.
    Rewrite { area: Area, cells: Vec<Cell> },
}

impl Instruction {
    fn copy(pair: CellCopy) -> Self {
        Instruction::Copy {
            src: pair.0,
            dst: pair.1,
        }
    }
}

/// Read access to the line store a refraction projects.
pub trait LineSource {
    fn ln_count(&self) -> usize;
    fn line(&self, offset: usize) -> Option<Line>;
}

impl LineSource for core_state::Storage {
    fn ln_count(&self) -> usize {
        core_state::Sequence::len(self)
    }

    fn line(&self, offset: usize) -> Option<Line> {
        core_state::Sequence::get(self, offset).cloned()
    }
}

impl LineSource for core_state::Resource {
    fn ln_count(&self) -> usize {
        core_state::Resource::ln_count(self)
    }

    fn line(&self, offset: usize) -> Option<Line> {
        self.sole(offset).ok()
    }
}

/// Position, range, and version details for border indicators and status
/// displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub area: Area,
    pub mode: ControlMode,
    pub version: LogSnapshot,
    pub v_line_offset: usize,
    pub v_cell_offset: usize,
    pub ln_cursor_offset: usize,
    pub ln_range_start: usize,
    pub ln_range_stop: usize,
    pub cl_cursor_start: usize,
    pub cl_cursor_stop: usize,
    pub cl_range_start: usize,
    pub cl_range_stop: usize,
}

impl Status {
    /// The vertical `(start, position, stop)` triple.
    pub fn line(&self) -> (usize, usize, usize) {
        (self.ln_range_start, self.ln_cursor_offset, self.ln_range_stop)
    }

    /// The horizontal cell `(start, position, stop)` triple.
    pub fn cell(&self) -> (usize, usize, usize) {
        (self.cl_range_start, self.cl_cursor_start, self.cl_range_stop)
    }
}

/// A view of a resource: cursor, visible window, margin configuration,
/// image cache, and the pending display instruction queue.
#[derive(Debug)]
pub struct Refraction {
    pub area: Area,
    pub source: ResourceId,
    pub forms: Arc<Reformulations>,
    pub image: Image,
    /// Line position and codepoint position.
    pub focus: (core_state::Position, core_state::Position),
    /// Vertical and horizontal scroll margins.
    pub limits: (usize, usize),
    pub control_mode: ControlMode,
    /// Activity annotation shown beside the cursor; execution status and
    /// similar ephemera.
    pub annotation: Option<String>,
    /// Display instructions accumulated by updates, drained by the frame.
    pub deltas: Vec<Instruction>,
    pub frame_visible: bool,
    /// The log snapshot the image last reflected.
    pub version: LogSnapshot,
}

impl Refraction {
    pub fn new(source: ResourceId, forms: Arc<Reformulations>) -> Self {
        Self {
            area: Area::default(),
            source,
            forms,
            image: Image::new(),
            focus: (core_state::Position::new(), core_state::Position::new()),
            limits: (2, 2),
            control_mode: ControlMode::default(),
            annotation: None,
            deltas: Vec::new(),
            frame_visible: false,
            version: LogSnapshot::default(),
        }
    }

    /// Configure the display area, retaining cursor state.
    pub fn configure(&mut self, area: Area) {
        self.area = area;
    }

    /// The cursor's line and codepoint coordinates.
    pub fn coordinates(&self) -> (usize, usize) {
        (
            self.focus.0.get().max(0) as usize,
            self.focus.1.get().max(0) as usize,
        )
    }

    pub fn annotate(&mut self, annotation: impl Into<String>) {
        self.annotation = Some(annotation.into());
    }

    pub fn clear_annotation(&mut self) {
        self.annotation = None;
    }

    /// Compose the phrase for one line.
    pub fn phrase(&self, line: &Line) -> Arc<Phrase> {
        self.forms.compose(line).shared()
    }

    /// Compose phrases for the existing lines in `[start, stop)`.
    fn iterphrases(&self, start: usize, stop: usize, src: &dyn LineSource) -> Vec<Arc<Phrase>> {
        (start..stop.max(start))
            .filter_map(|lo| src.line(lo))
            .map(|l| self.phrase(&l))
            .collect()
    }

    /// Structured fields of a line.
    pub fn fields(&self, line: &Line) -> Vec<Field> {
        self.forms.ln_structure(line)
    }

    /// Content-relative codepoint ranges per structured field, skipping
    /// the indentation field.
    pub fn field_areas(&self, fields: &[Field]) -> Vec<Range<usize>> {
        let mut out = Vec::new();
        let mut co = 0usize;
        for (i, (_, text)) in fields.iter().enumerate() {
            let n = text.chars().count();
            if i == 0 {
                // Indentation is carried by the line level, not content.
                continue;
            }
            out.push(co..co + n);
            co += n;
        }
        out
    }

    /// Index of the field containing the codepoint `offset`.
    pub fn field_index(&self, areas: &[Range<usize>], offset: usize) -> usize {
        for (i, r) in areas.iter().enumerate() {
            if offset < r.end {
                return i;
            }
        }
        areas.len().saturating_sub(1)
    }

    /// Relocate the cursor to absolute coordinates.
    pub fn seek(&mut self, lo: usize, co: usize) {
        self.focus.0.set(lo as isize);
        self.focus.1.set(co as isize);
    }

    /// Search for `pattern` from `(lo, co)` exclusive, wrapping at the
    /// store boundary. Returns `(line, start, stop)` codepoint offsets.
    pub fn find(
        &self,
        src: &dyn LineSource,
        pattern: &Regex,
        from: (usize, usize),
        forwards: bool,
    ) -> Option<(usize, usize, usize)> {
        let total = src.ln_count();
        if total == 0 {
            return None;
        }
        let (flo, fco) = from;

        let order: Vec<usize> = if forwards {
            (flo..total).chain(0..=flo.min(total - 1)).collect()
        } else {
            (0..=flo.min(total - 1))
                .rev()
                .chain((flo..total).rev())
                .collect()
        };

        let mut candidates = Vec::new();
        for (i, lo) in order.iter().copied().enumerate() {
            let Some(line) = src.line(lo) else { continue };
            let content = &line.content;
            for m in pattern.find_iter(content) {
                let start = content[..m.start()].chars().count();
                let stop = start + content[m.start()..m.end()].chars().count();
                let first_line = i == 0;
                if first_line {
                    // Exclude matches at or before the origin in the
                    // search direction.
                    if forwards && start <= fco {
                        continue;
                    }
                    if !forwards && start >= fco {
                        continue;
                    }
                }
                candidates.push((lo, start, stop));
            }
            if let Some(best) = if forwards {
                candidates.first().copied()
            } else {
                candidates.last().copied()
            } {
                return Some(best);
            }
        }
        None
    }

    // ------------------------------------------------------------------
    // Scrolling
    // ------------------------------------------------------------------

    /// Change the vertical position, clamping to the store edges, and emit
    /// the instructions realizing the motion.
    pub fn scroll(&mut self, to: isize, src: &dyn LineSource) -> Vec<Instruction> {
        let total = src.ln_count();
        let last = total as isize - self.area.lines as isize;
        let to = to.clamp(0, last.max(0)) as usize;
        let current = self.image.line_offset;
        if current == to {
            return Vec::new();
        }

        let dv = to as isize - current as isize;
        if dv.unsigned_abs() >= self.area.lines {
            return self.refresh(to, src);
        }

        let mut out = Vec::new();
        if dv > 0 {
            // The view advances; rows move up and the vacated tail is
            // rendered from the source.
            let dv = dv as usize;
            let eov = to + self.area.lines;
            self.image.delete(0, dv);
            let s = self.image.suffix(self.iterphrases(eov - dv, eov, src));
            out.push(Instruction::copy(scroll_forward(&self.area, dv)));
            out.push(self.v_render(s));
        } else {
            let dv = (-dv) as usize;
            let s = self.image.prefix(self.iterphrases(to, to + dv, src));
            self.image.truncate(self.area.lines);
            out.push(Instruction::copy(scroll_backward(&self.area, dv)));
            out.push(self.v_render(s));
        }
        self.image.line_offset = to;
        out
    }

    /// Adjust the horizontal pan by `delta` cells, reseeking the whole
    /// image.
    pub fn pan(&mut self, delta: isize) -> Vec<Instruction> {
        let current = self.image.cell_offset as isize;
        let to = (current + delta).max(0) as usize;
        if to == self.image.cell_offset {
            return Vec::new();
        }
        self.image.cell_offset = to;
        let all = self.image.all();
        self.image.pan_absolute(all.clone(), to);
        vec![self.v_render(all)]
    }

    /// Constrain the cursor to legal positions and apply margin scrolls.
    pub fn recursor(&mut self, src: &dyn LineSource) -> Vec<Instruction> {
        let total = src.ln_count();
        let mut lo = self.focus.0.get();
        let mut snap_to_end = false;

        if lo < 0 || total < 1 {
            lo = 0;
            self.focus.1.set(0);
        } else if lo >= total as isize {
            lo = total as isize - 1;
            snap_to_end = true;
        }
        self.focus.0.set(lo);
        let lo = lo as usize;

        let Some(li) = src.line(lo) else {
            self.focus.1.restore((0, 0, 0));
            return Vec::new();
        };
        let ll = li.ln_length() as isize;
        if snap_to_end {
            self.focus.1.set(ll);
        }

        // Constrain the codepoint cursor to the line.
        let h = &mut self.focus.1;
        h.datum = h.datum.max(0);
        h.magnitude = h.magnitude.min(ll);
        let hp = h.get().clamp(0, ll);
        h.set(hp);

        // Margin scrolling.
        let current = self.image.line_offset;
        let rln = lo as isize - current as isize;
        let climit = self.limits.0 as isize;
        let sunit = (climit * 2).max(1) as usize;
        let edge = self.area.lines as isize;

        if rln <= climit {
            if rln < 0 {
                // Jump-scroll to center.
                let target = (lo as isize - edge / 2).max(0);
                return self.scroll(target, src);
            }
            if rln < climit {
                let (_, rscroll, _) = backward(total, edge as usize, current, sunit);
                return self.scroll(current as isize + rscroll, src);
            }
        } else if rln > edge {
            let target = (lo as isize - edge / 2).min(total as isize - edge);
            return self.scroll(target, src);
        } else if rln >= edge - climit {
            let (_, rscroll, _) = forward(total, edge as usize, current, sunit);
            return self.scroll(current as isize + rscroll, src);
        }

        Vec::new()
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    /// Sequence the rewrite instruction for the image rows in `larea`.
    pub fn v_render(&self, larea: Range<usize>) -> Instruction {
        let ec = Cell::blank(self.forms.lf_theme.default_glyph());
        let limit = self.area.span;
        let hoffset = self.image.cell_offset;

        let stop = larea.end.min(self.image.count());
        let start = larea.start.min(stop);
        let mut cv: Vec<Cell> = Vec::with_capacity((stop - start) * limit);

        for phrase in &self.image.phrases()[start..stop] {
            let cells = phrase.render(&|c| c);
            let visible = limit.min(cells.len().saturating_sub(hoffset));
            cv.extend(cells.into_iter().skip(hoffset).take(visible));
            for _ in visible..limit {
                cv.push(ec.clone());
            }
        }

        Instruction::Rewrite {
            area: self.area.rows(start, stop - start),
            cells: cv,
        }
    }

    /// Refresh the image with `whence` as the beginning of the view.
    pub fn refresh(&mut self, whence: usize, src: &dyn LineSource) -> Vec<Instruction> {
        let visible = self.area.lines;
        self.image.clear();
        self.image.suffix(self.iterphrases(whence, whence + visible, src));
        self.image.line_offset = whence;

        // Pad short stores before rendering so one rewrite covers the view.
        let count = self.image.count();
        if count < visible {
            let empty = self.forms.lf_empty_phrase();
            self.image.suffix(std::iter::repeat_n(empty, visible - count));
        }
        vec![self.v_render(0..visible)]
    }

    /// Extend the image with empty lines until the display is filled,
    /// trimming any excess. Returns instructions for the padded rows.
    pub fn compensate(&mut self) -> Vec<Instruction> {
        let v_lines = self.area.lines;
        let count = self.image.count();
        if count > v_lines {
            self.image.truncate(v_lines);
            return Vec::new();
        }
        let d = v_lines - count;
        if d == 0 {
            return Vec::new();
        }
        let empty = self.forms.lf_empty_phrase();
        let s = self.image.suffix(std::iter::repeat_n(empty, d));
        vec![self.v_render(s)]
    }

    /// Re-render individual absolute lines that are inside the image.
    pub fn render_lines(&mut self, lines: &[usize], src: &dyn LineSource) -> Vec<Instruction> {
        let mut out = Vec::new();
        for lo in lines {
            let rlo = *lo as isize - self.image.line_offset as isize;
            if rlo < 0 || rlo >= self.image.count() as isize {
                continue;
            }
            let rlo = rlo as usize;
            if let Some(line) = src.line(*lo) {
                let ph = self.phrase(&line);
                let s = self.image.update(rlo..rlo + 1, vec![ph]);
                out.push(self.v_render(s));
            }
        }
        out
    }

    // ------------------------------------------------------------------
    // Incremental update compiler
    // ------------------------------------------------------------------

    /// Update the image for one applied record and emit the display
    /// instructions needed to synchronize the view.
    pub fn v_update(&mut self, ds: &Record, src: &dyn LineSource) -> Vec<Instruction> {
        let mut out = Vec::new();

        let v_lines = self.area.lines;
        let total = src.ln_count();
        let dt = ds.change();
        // The total before this record was applied.
        let vt = total as isize - dt;

        let index = ds.element().unwrap_or(0);
        let vo = self.image.line_offset;
        let whence = index as isize - vo as isize;
        let ve = vo + v_lines;

        // The last page keeps its tail pinned when content above changes.
        let last_page = ve as isize >= vt && vo > 0;

        if index >= ve && !last_page {
            // Ineffective when beyond the view's image.
            return out;
        }

        if index >= vo {
            if matches!(ds, Record::Update { .. }) {
                out.extend(self.render_lines(&[index], src));
                return out;
            }
        }

        let (ni, nd) = match ds {
            Record::Lines {
                insertion, deletion, ..
            } => (insertion.len(), deletion.len()),
            // Checkpoint, cursor hint, or an update before the image.
            _ => return out,
        };

        if dt > 0 && index < vo {
            // The change did not overlap with the image at all; only the
            // position adjusts.
            self.image.line_offset += dt as usize;
            return out;
        }

        if dt == 0 {
            // No change in size; redraw the replaced area.
            debug_assert_eq!(nd, ni);
            let rel_start = whence.max(0) as usize;
            let rel_stop = (whence + ni as isize).clamp(0, v_lines as isize) as usize;
            if rel_stop > rel_start {
                let abs_start = vo + rel_start;
                let abs_stop = vo + rel_stop;
                let s = self
                    .image
                    .update(rel_start..rel_stop, self.iterphrases(abs_start, abs_stop, src));
                out.push(self.v_render(s));
            }
            return out;
        }

        let mut scroll_lock = last_page;
        trace!(
            target: "model.view",
            index, vo, ve, dt, ni, nd, scroll_lock,
            "v_update_lines"
        );

        // Deletion.
        if nd > 0 {
            let (w, d) = if whence < 0 {
                // Adjust the view offset and identify the view-local
                // overlap.
                let d = (whence + nd as isize).max(0) as usize;
                if !scroll_lock {
                    self.image.line_offset -= nd - d;
                }
                (0usize, d)
            } else {
                (
                    whence as usize,
                    nd.min(self.image.count().saturating_sub(whence as usize)),
                )
            };

            let dslice = self.image.delete(w, d);

            if scroll_lock {
                let adjusted = self.image.line_offset as isize - nd as isize;
                if adjusted <= 0 {
                    // The deletion forced a transition to the first page.
                    self.image.line_offset = 0;
                    scroll_lock = false;
                    out.extend(self.refresh(0, src));
                } else {
                    self.image.line_offset = adjusted as usize;
                    out.push(Instruction::copy(stop_relative_delete(
                        &self.area,
                        dslice.start,
                        dslice.end,
                    )));
                    let stop = self.image.line_offset + (dslice.end - dslice.start);
                    let s = self
                        .image
                        .prefix(self.iterphrases(self.image.line_offset, stop, src));
                    out.push(self.v_render(s));
                }
            } else {
                out.push(Instruction::copy(start_relative_delete(
                    &self.area,
                    dslice.start,
                    dslice.end,
                )));
            }
        }

        // Insertion.
        if ni > 0 {
            if whence < 0 {
                // No image overlap; only the offset moves.
                self.image.line_offset += ni;
                return out;
            }
            let whence = whence as usize;

            let i = if scroll_lock {
                self.image.line_offset += ni;
                v_lines.min(ni)
            } else {
                v_lines.saturating_sub(whence).min(ni)
            };

            let s = self
                .image
                .insert(whence, self.iterphrases(index, index + i, src));

            let s = if scroll_lock {
                let trimmed = self.image.count().saturating_sub(v_lines);
                self.image.delete(0, trimmed);
                s.start.saturating_sub(trimmed)..s.end.saturating_sub(trimmed)
            } else {
                self.image.truncate(v_lines);
                s.start..s.end.min(v_lines)
            };

            if s.end > s.start {
                let pair = if scroll_lock {
                    stop_relative_insert(&self.area, s.start, s.end)
                } else {
                    start_relative_insert(&self.area, s.start, s.end)
                };
                out.push(Instruction::copy(pair));
                out.push(self.v_render(s));
            }
        }

        // Tail compensation, orientation independent: refill any rows the
        // record left vacant at the bottom.
        let tail = self.image.line_offset + self.image.count();
        let stop = self.image.line_offset + v_lines;
        if tail < stop {
            let s = self.image.suffix(self.iterphrases(tail, stop, src));
            if s.end > s.start {
                out.push(self.v_render(s));
            }
        }

        out
    }

    /// Describe the current view and cursor for indicators and status
    /// lines.
    pub fn v_status(&self, src: &dyn LineSource) -> Status {
        let (lo, co) = self.coordinates();
        let (ln_start, _, ln_stop) = self.focus.0.snapshot();
        let (cp_start, _, cp_stop) = self.focus.1.snapshot();

        let (cl_start, cl_cursor, cl_stop, cl_cursor_stop) = match src.line(lo) {
            Some(line) => {
                let ph = self.forms.compose(&line);
                let cell_of = |cp: usize| {
                    let (pos, _) = ph.seek((0, 0), cp as isize, Measure::Codepoints);
                    ph.tell(pos, Measure::Cells)
                };
                let cstart = cell_of(cp_start.max(0) as usize);
                let ccur = cell_of(co);
                let cstop = cell_of(cp_stop.max(0) as usize);
                let (upos, _) = ph.seek((0, 0), co as isize, Measure::Codepoints);
                let (next, _) = ph.seek(upos, 1, Measure::Units);
                (cstart, ccur, cstop, ph.tell(next, Measure::Cells))
            }
            None => (0, 0, 0, 0),
        };

        Status {
            area: self.area,
            mode: self.control_mode,
            version: self.version,
            v_line_offset: self.image.line_offset,
            v_cell_offset: self.image.cell_offset,
            ln_cursor_offset: lo,
            ln_range_start: ln_start.max(0) as usize,
            ln_range_stop: ln_stop.max(0) as usize,
            cl_cursor_start: cl_cursor,
            cl_cursor_stop: cl_cursor_stop.max(cl_cursor + 1),
            cl_range_start: cl_start,
            cl_range_stop: cl_stop,
        }
    }
}

impl Summary for Refraction {
    fn line_delta(&mut self, ln_offset: usize, deleted: usize, inserted: usize) {
        let cursor = &mut self.focus.0;
        if deleted > 0 {
            cursor.delete(ln_offset as isize, deleted as isize);
        }
        if inserted > 0 {
            cursor.insert(ln_offset as isize, inserted as isize);
        }
    }

    fn codepoint_delta(&mut self, ln_offset: usize, cp_offset: usize, deleted: usize, inserted: usize) {
        if self.focus.0.get() == ln_offset as isize {
            let cursor = &mut self.focus.1;
            if deleted > 0 {
                cursor.delete(cp_offset as isize, deleted as isize);
            }
            if inserted > 0 {
                cursor.insert(cp_offset as isize, inserted as isize);
            }
        }
    }
}
