//! Process-local resources: line stores funneling every mutation through
//! the modification log.
//!
//! A resource is the record set representing the content read from the
//! system, not a projection of the file itself. All edit methods write
//! delta records; application to the element store happens when the
//! pending transaction is committed, at which point each record is also
//! reported to registered cursors and to the caller's observer hook so
//! views stay coherent with the store. Loading and saving are managed by
//! the session.

use std::path::PathBuf;

use thiserror::Error;
use tracing::trace;

use crate::delta::{Log, LogSnapshot, Record};
use crate::line::{Line, LineForm};
use crate::position::CursorPair;
use crate::sequence::{Immutable, Segments, Sequence};

#[derive(Debug, Error)]
pub enum StateError {
    /// The edit referenced a line beyond the element count. Offsets one
    /// past the end are recovered by auto-initializing an empty line;
    /// anything farther is rejected with the log left uncommitted.
    #[error("line offset {offset} beyond element count {count}")]
    EditRange { offset: usize, count: usize },
}

/// Identity of the resource being modified and refracted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reference {
    /// The system context the path is resolved in, e.g. a host URI.
    pub system: String,
    pub path: PathBuf,
    /// The syntax type selected for the resource.
    pub syntax_type: String,
}

impl Reference {
    pub fn new(system: impl Into<String>, path: impl Into<PathBuf>, syntax_type: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            path: path.into(),
            syntax_type: syntax_type.into(),
        }
    }
}

/// Filesystem status captured at load/store time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceStatus {
    pub last_modified: Option<std::time::SystemTime>,
    pub size: u64,
}

/// Element storage: the mutable segmented store, or the cooperative
/// read-only store used by transcript-like resources.
#[derive(Debug, Clone)]
pub enum Storage {
    Segmented(Segments<Line>),
    Constant(Immutable<Line>),
}

impl Sequence<Line> for Storage {
    fn len(&self) -> usize {
        match self {
            Storage::Segmented(s) => s.len(),
            Storage::Constant(c) => c.len(),
        }
    }

    fn get(&self, index: usize) -> Option<&Line> {
        match self {
            Storage::Segmented(s) => s.get(index),
            Storage::Constant(c) => c.get(index),
        }
    }

    fn set(&mut self, index: usize, value: Line) {
        match self {
            Storage::Segmented(s) => s.set(index, value),
            Storage::Constant(c) => c.set(index, value),
        }
    }

    fn splice(&mut self, start: usize, stop: usize, replacement: Vec<Line>) {
        match self {
            Storage::Segmented(s) => s.splice(start, stop, replacement),
            Storage::Constant(c) => c.splice(start, stop, replacement),
        }
    }

    fn select(&self, start: usize, stop: usize) -> Vec<Line> {
        match self {
            Storage::Segmented(s) => s.select(start, stop),
            Storage::Constant(c) => c.select(start, stop),
        }
    }
}

fn cp_len(s: &str) -> usize {
    s.chars().count()
}

fn cp_byte(s: &str, cp: usize) -> usize {
    s.char_indices().nth(cp).map(|(i, _)| i).unwrap_or(s.len())
}

fn cp_range(s: &str, start: usize, stop: usize) -> &str {
    &s[cp_byte(s, start)..cp_byte(s, stop.max(start))]
}

/// Opaque key for an observing view registered on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub u64);

/// The representation of a stored resource and its modifications.
#[derive(Debug)]
pub struct Resource {
    pub origin: Reference,
    elements: Storage,
    pub modifications: Log,
    pub status: Option<ResourceStatus>,
    views: Vec<ObserverId>,
    cursors: Vec<(ObserverId, CursorPair)>,
}

impl Resource {
    pub fn new(origin: Reference) -> Self {
        Self {
            origin,
            elements: Storage::Segmented(Segments::new()),
            modifications: Log::new(),
            status: None,
            views: Vec::new(),
            cursors: Vec::new(),
        }
    }

    /// Construct a resource over read-only storage; log-side mutations are
    /// silently discarded, giving the transcript append-only semantics.
    pub fn constant(origin: Reference) -> Self {
        Self {
            elements: Storage::Constant(Immutable::new(Vec::new())),
            ..Self::new(origin)
        }
    }

    pub fn elements(&self) -> &Storage {
        &self.elements
    }

    /// Privileged append for constant storage; regular resources extend
    /// through the log instead.
    pub fn elements_constant_mut(&mut self) -> Option<&mut Immutable<Line>> {
        match &mut self.elements {
            Storage::Constant(c) => Some(c),
            Storage::Segmented(_) => None,
        }
    }

    /// Replace the element store wholesale; used by the load path before
    /// any views attach.
    pub fn reset_elements<I: IntoIterator<Item = Line>>(&mut self, lines: I) {
        match &mut self.elements {
            Storage::Segmented(s) => {
                s.clear();
                s.partition(lines);
            }
            Storage::Constant(c) => {
                *c = Immutable::new(lines);
            }
        }
        self.modifications.truncate();
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    pub fn attach_view(&mut self, id: ObserverId) {
        if !self.views.contains(&id) {
            self.views.push(id);
        }
    }

    pub fn detach_view(&mut self, id: ObserverId) {
        self.views.retain(|v| *v != id);
    }

    pub fn views(&self) -> &[ObserverId] {
        &self.views
    }

    pub fn attach_cursor(&mut self, id: ObserverId, cursor: CursorPair) {
        self.cursors.push((id, cursor));
    }

    pub fn detach_cursor(&mut self, id: ObserverId) -> Option<CursorPair> {
        let at = self.cursors.iter().position(|(c, _)| *c == id)?;
        Some(self.cursors.remove(at).1)
    }

    pub fn cursor(&self, id: ObserverId) -> Option<&CursorPair> {
        self.cursors.iter().find(|(c, _)| *c == id).map(|(_, p)| p)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// The current number of lines present in the document.
    pub fn ln_count(&self) -> usize {
        self.elements.len()
    }

    /// Retrieve the line at `line_offset`.
    pub fn sole(&self, line_offset: usize) -> Result<Line, StateError> {
        self.elements
            .get(line_offset)
            .cloned()
            .ok_or(StateError::EditRange {
                offset: line_offset,
                count: self.ln_count(),
            })
    }

    /// Retrieve `(offset, line)` pairs in `[start, stop)`. An inverted
    /// range yields the lines in reverse order.
    pub fn select(&self, start: usize, stop: usize) -> Vec<(usize, Line)> {
        let lines = self.elements.select(start, stop);
        if start <= stop {
            lines
                .into_iter()
                .enumerate()
                .map(|(i, l)| (start + i, l))
                .collect()
        } else {
            lines
                .into_iter()
                .enumerate()
                .map(|(i, l)| (start - i, l))
                .collect()
        }
    }

    /// Format the lines between `start` and `stop` for storage.
    pub fn serialize(&self, form: &LineForm, start: usize, stop: usize) -> String {
        self.select(start, stop)
            .iter()
            .map(|(_, l)| form.sequence(l))
            .collect()
    }

    /// The identifier of the latest modification.
    pub fn version(&self) -> LogSnapshot {
        self.modifications.snapshot()
    }

    /// The delta instructions since the given version.
    pub fn changes(&self, version: LogSnapshot) -> Vec<Record> {
        self.modifications.since(version)
    }

    /// Retrieve the last insertion text present in the log.
    pub fn last_insertion(&self, limit: usize) -> String {
        for r in self.modifications.records().iter().rev().take(limit) {
            match r {
                Record::Update { insertion, .. } if !insertion.is_empty() => {
                    return insertion.clone();
                }
                Record::Lines { insertion, .. } if !insertion.is_empty() => {
                    return insertion
                        .iter()
                        .map(|l| l.content.as_str())
                        .collect::<Vec<_>>()
                        .join("\n");
                }
                _ => {}
            }
        }
        String::new()
    }

    // ------------------------------------------------------------------
    // Commit pipeline
    // ------------------------------------------------------------------

    fn apply_records(
        &mut self,
        deltas: Vec<Record>,
        mut observe: impl FnMut(&Record, &Storage, &[ObserverId]),
    ) {
        for d in deltas {
            d.apply(&mut self.elements);
            for (_, cursor) in self.cursors.iter_mut() {
                d.track(cursor);
            }
            observe(&d, &self.elements, &self.views);
        }
    }

    /// Apply pending modifications, reporting each applied record to
    /// `observe` so attached views can compile their image updates.
    pub fn commit_with(
        &mut self,
        collapse: bool,
        checkpoint: bool,
        observe: impl FnMut(&Record, &Storage, &[ObserverId]),
    ) {
        let pending: Vec<Record> = self.modifications.pending().to_vec();
        self.apply_records(pending, observe);

        if collapse {
            self.modifications.collapse();
        }
        self.modifications.commit();
        if checkpoint {
            self.modifications.checkpoint();
        }
    }

    /// Apply pending modifications without view observation.
    pub fn commit(&mut self) {
        self.commit_with(true, false, |_, _, _| {});
    }

    /// Apply, commit, and checkpoint the log.
    pub fn checkpoint(&mut self) {
        self.commit_with(true, true, |_, _, _| {});
    }

    /// Revert modifications until `quantity` checkpoints back.
    pub fn undo_with(
        &mut self,
        quantity: usize,
        observe: impl FnMut(&Record, &Storage, &[ObserverId]),
    ) {
        let deltas = self.modifications.undo(quantity);
        self.apply_records(deltas, observe);
    }

    /// Replay modifications until `quantity` checkpoints forward.
    pub fn redo_with(
        &mut self,
        quantity: usize,
        observe: impl FnMut(&Record, &Storage, &[ObserverId]),
    ) {
        let deltas = self.modifications.redo(quantity);
        self.apply_records(deltas, observe);
    }

    pub fn undo(&mut self, quantity: usize) {
        self.undo_with(quantity, |_, _, _| {});
    }

    pub fn redo(&mut self, quantity: usize) {
        self.redo_with(quantity, |_, _, _| {});
    }

    // ------------------------------------------------------------------
    // Line-level editing primitives
    // ------------------------------------------------------------------

    /// Validate `lo` for an edit, auto-initializing a line when the offset
    /// is exactly one past the end.
    fn require_line(&mut self, lo: usize) -> Result<Line, StateError> {
        match self.elements.get(lo) {
            Some(line) => Ok(line.clone()),
            None => {
                let count = self.ln_count();
                if lo == count {
                    trace!(target: "state.resource", lo, "auto_initialize_line");
                    self.ln_initialize("", 0, Some(lo));
                    self.commit();
                    Ok(self.sole(lo)?)
                } else {
                    Err(StateError::EditRange { offset: lo, count })
                }
            }
        }
    }

    /// Insert `string` at the codepoint `offset` without committing.
    pub fn insert_codepoints(&mut self, lo: usize, offset: usize, string: &str) {
        self.modifications.write(Record::Update {
            element: lo,
            insertion: string.to_string(),
            deletion: String::new(),
            position: offset,
        });
    }

    /// Append `string` to the line `lo`.
    pub fn extend_codepoints(&mut self, lo: usize, string: &str) -> Result<(), StateError> {
        let co = self.sole(lo)?.ln_length();
        self.insert_codepoints(lo, co, string);
        Ok(())
    }

    /// Remove the codepoints in `[start, stop)` of line `lo`, returning
    /// the deleted text.
    pub fn delete_codepoints(
        &mut self,
        lo: usize,
        start: usize,
        stop: usize,
    ) -> Result<String, StateError> {
        let line = self.sole(lo)?;
        let deletion = cp_range(&line.content, start, stop).to_string();
        self.modifications.write(Record::Update {
            element: lo,
            insertion: String::new(),
            deletion: deletion.clone(),
            position: start,
        });
        Ok(deletion)
    }

    /// Remove the horizontal range and insert `string` at `start`.
    ///
    /// Returns the removed text.
    pub fn substitute_codepoints(
        &mut self,
        lo: usize,
        start: usize,
        stop: usize,
        string: &str,
    ) -> Result<String, StateError> {
        let deletion = self.delete_codepoints(lo, start, stop)?;
        self.insert_codepoints(lo, start, string);
        Ok(deletion)
    }

    fn write_level(&mut self, lo: usize, line: &Line, level: u8) {
        // Structural storage keeps the level out of codepoint space, so
        // level changes are whole-line replacements.
        let mut updated = line.clone();
        updated.level = level;
        self.modifications.write(Record::Lines {
            element: lo,
            insertion: vec![updated],
            deletion: vec![line.clone()],
        });
    }

    /// Unconditionally apply `change` to the indentation of line `lo`.
    pub fn increase_indentation(&mut self, lo: usize, change: i16) -> Result<(), StateError> {
        let line = self.sole(lo)?;
        let level = (line.level as i16 + change).clamp(0, u8::MAX as i16) as u8;
        self.write_level(lo, &line, level);
        Ok(())
    }

    /// Apply `change` to the indentation of the lines in `[start, stop)`,
    /// skipping lines with no content and no indentation.
    pub fn adjust_indentation(&mut self, start: usize, stop: usize, change: i16) {
        for (lo, line) in self.select(start, stop) {
            if line.ln_void() {
                continue;
            }
            let level = (line.level as i16 + change).clamp(0, u8::MAX as i16) as u8;
            self.write_level(lo, &line, level);
        }
    }

    /// Remove all indentation from the lines in `[start, stop)`.
    pub fn delete_indentation(&mut self, start: usize, stop: usize) {
        for (lo, line) in self.select(start, stop) {
            if line.level == 0 {
                continue;
            }
            self.write_level(lo, &line, 0);
        }
    }

    /// Join `count` following lines onto `lo`, separated by `withstring`.
    pub fn join(&mut self, lo: usize, count: usize, withstring: &str) -> Result<(), StateError> {
        let li = self.sole(lo)?;
        let following = self.select(lo + 1, lo + 1 + count);

        let mut combined = String::new();
        for (_, l) in &following {
            combined.push_str(withstring);
            combined.push_str(&l.content);
        }

        self.modifications.write(Record::Update {
            element: lo,
            insertion: combined,
            deletion: String::new(),
            position: li.ln_length(),
        });
        self.modifications.write(Record::Lines {
            element: lo + 1,
            insertion: vec![],
            deletion: following.into_iter().map(|(_, l)| l).collect(),
        });
        Ok(())
    }

    /// Split the line identified by `lo` at the codepoint `offset`.
    pub fn split(&mut self, lo: usize, offset: usize) -> Result<(), StateError> {
        let li = self.sole(lo)?;
        let nlstr = cp_range(&li.content, offset, cp_len(&li.content)).to_string();

        self.modifications.write(Record::Update {
            element: lo,
            insertion: String::new(),
            deletion: nlstr.clone(),
            position: offset,
        });
        self.modifications.write(Record::Lines {
            element: lo + 1,
            insertion: vec![Line::new(nlstr, li.level)],
            deletion: vec![],
        });
        Ok(())
    }

    /// Write a cursor displacement hint effecting motion at commit time.
    pub fn displace_cursors(&mut self, lo: usize, ln_count: isize, co: usize, cp_count: isize) {
        self.modifications.write(Record::Cursor {
            element: lo,
            lines: ln_count,
            position: co,
            codepoints: cp_count,
        });
    }

    /// Insert `text` at the indentation-relative codepoint `co` in line
    /// `lo`, splitting on the form's termination. The first line of `text`
    /// lands before `co`; trailing lines are inserted after `lo` with the
    /// last inheriting any text following `co`.
    ///
    /// Returns the insertion state `(line, codepoint, remainder)`; the
    /// remainder holds a trailing partial termination to prefix onto the
    /// next call.
    pub fn splice_text(
        &mut self,
        form: &LineForm,
        lo: usize,
        co: usize,
        text: &str,
        ln_level: u8,
    ) -> Result<(usize, usize, String), StateError> {
        // Avoid inserting codepoints that may become a boundary with the
        // next insertion.
        let pt = form.measure_partial_termination(text);
        let (text, remainder) = if pt > 0 {
            let cut = text.len() - form.termination[..].chars().take(pt).map(|c| c.len_utf8()).sum::<usize>();
            (&text[..cut], text[cut..].to_string())
        } else {
            (text, String::new())
        };

        let mut parts = text.split(form.termination.as_str());
        let first = parts.next().unwrap_or("");
        let wholes: Vec<&str> = parts.collect();

        let target_line = self.require_line(lo)?;

        // Partial reads may leave an indented, content-less line; inherit
        // leading indentation when content has not begun.
        let (flevel, mut fcontent) = form.level(first);
        if flevel > 0 {
            if target_line.content.is_empty() || co == 0 {
                self.increase_indentation(lo, flevel as i16)?;
            } else {
                // Indentation already terminated; insert the codepoints raw.
                fcontent = first;
            }
        }

        if !wholes.is_empty() {
            // Carry the tail in the final inserted line.
            let suffix =
                self.substitute_codepoints(lo, co, target_line.ln_length(), fcontent)?;
            let end_of_insert = cp_len(wholes[wholes.len() - 1]);

            // Force cursors at `lo` to the beginning of the next line; the
            // codepoint offset must be zero so the deletion is identified
            // as occurring past the cursor.
            let eol = co + cp_len(fcontent);
            self.displace_cursors(lo, 1, 0, -(eol as isize));

            let mut slines: Vec<Line> = Vec::with_capacity(wholes.len());
            for (i, ls) in wholes.iter().enumerate() {
                let (il, content) = form.level(ls);
                let level = if content.is_empty() {
                    il
                } else {
                    il.saturating_add(ln_level)
                };
                let mut line = Line::new(content, level);
                if i == wholes.len() - 1 {
                    line.content.push_str(&suffix);
                }
                slines.push(line);
            }

            let dl = slines.len();
            let final_length = slines[dl - 1].ln_length();
            self.insert_lines(lo + 1, slines);
            let co = final_length - cp_len(&suffix);

            // Restore cursors that were offset.
            self.displace_cursors(lo + dl, -1, 0, 0);
            self.displace_cursors(lo + dl, 0, 0, end_of_insert as isize);

            Ok((lo + dl, co, remainder))
        } else {
            self.insert_codepoints(lo, co, fcontent);
            Ok((lo, co + cp_len(fcontent), remainder))
        }
    }

    /// Copy the lines between `start` and `stop` to `lo`.
    pub fn replicate_lines(&mut self, lo: usize, start: usize, stop: usize) -> usize {
        let rlines: Vec<Line> = self.elements.select(start, stop);
        let count = rlines.len();
        self.modifications.write(Record::Lines {
            element: lo,
            insertion: rlines,
            deletion: vec![],
        });
        count
    }

    /// Remove all lines, leaving a sole empty one.
    pub fn truncate(&mut self) {
        self.delete_lines(0, self.ln_count());
        self.ln_initialize("", 0, None);
    }

    /// Remove the lines in `[start, stop)`, returning the count removed.
    pub fn delete_lines(&mut self, start: usize, stop: usize) -> usize {
        let lines = self.elements.select(start, stop);
        let count = lines.len();
        self.modifications.write(Record::Lines {
            element: start,
            insertion: vec![],
            deletion: lines,
        });
        count
    }

    /// Insert the lines before `lo`, returning the count inserted.
    pub fn insert_lines(&mut self, lo: usize, lines: Vec<Line>) -> usize {
        let count = lines.len();
        self.modifications.write(Record::Lines {
            element: lo,
            insertion: lines,
            deletion: vec![],
        });
        count
    }

    /// Append the lines to the resource's elements.
    pub fn extend_lines(&mut self, lines: Vec<Line>) -> usize {
        let count = lines.len();
        self.modifications.write(Record::Lines {
            element: self.ln_count(),
            insertion: lines,
            deletion: vec![],
        });
        count
    }

    /// Initialize a new line, by default at the end of the elements.
    pub fn ln_initialize(&mut self, content: &str, level: u8, offset: Option<usize>) {
        let lo = offset.unwrap_or_else(|| self.ln_count());
        self.modifications.write(Record::Lines {
            element: lo,
            insertion: vec![Line::new(content, level)],
            deletion: vec![],
        });
    }

    /// Relocate the vertical range `[start, stop)` before the line `lo`.
    ///
    /// The deletion is logged before the insertion so that view updates,
    /// which only inspect the final state, see aligned elements at the
    /// insertion point.
    pub fn move_lines(&mut self, lo: usize, start: usize, stop: usize) -> usize {
        let deletion: Vec<Line> = self.elements.select(start, stop);
        let count = deletion.len();

        if start < lo {
            // Deleted range comes before the insertion line.
            self.modifications.write(Record::Lines {
                element: start,
                insertion: vec![],
                deletion: deletion.clone(),
            });
            self.modifications.write(Record::Lines {
                element: lo - count,
                insertion: deletion,
                deletion: vec![],
            });
        } else {
            // Deleted range comes after the insertion line.
            self.modifications.write(Record::Lines {
                element: start,
                insertion: vec![],
                deletion: deletion.clone(),
            });
            self.modifications.write(Record::Lines {
                element: lo,
                insertion: deletion,
                deletion: vec![],
            });
        }
        count
    }

    /// Swap the case of the codepoints in `[start, stop)` of line `lo`.
    pub fn swap_case(&mut self, lo: usize, start: usize, stop: usize) -> Result<(), StateError> {
        let line = self.sole(lo)?;
        let subbed = cp_range(&line.content, start, stop);
        let swapped: String = subbed
            .chars()
            .flat_map(|c| {
                if c.is_uppercase() {
                    c.to_lowercase().collect::<Vec<char>>()
                } else {
                    c.to_uppercase().collect::<Vec<char>>()
                }
            })
            .collect();
        self.modifications.write(Record::Update {
            element: lo,
            insertion: swapped,
            deletion: subbed.to_string(),
            position: start,
        });
        Ok(())
    }

    /// Delete and return the codepoints before `co` in line `lo`.
    pub fn take_leading(&mut self, lo: usize, co: usize) -> Result<String, StateError> {
        let line = self.sole(lo)?;
        let r = cp_range(&line.content, 0, co).to_string();
        if !r.is_empty() {
            self.modifications.write(Record::Update {
                element: lo,
                insertion: String::new(),
                deletion: r.clone(),
                position: 0,
            });
        }
        Ok(r)
    }

    /// Delete and return the codepoints after `co` in line `lo`.
    pub fn take_following(&mut self, lo: usize, co: usize) -> Result<String, StateError> {
        let line = self.sole(lo)?;
        let r = cp_range(&line.content, co, cp_len(&line.content)).to_string();
        if !r.is_empty() {
            self.modifications.write(Record::Update {
                element: lo,
                insertion: String::new(),
                deletion: r.clone(),
                position: co,
            });
        }
        Ok(r)
    }

    /// Find the next completely empty line at or after `lo`.
    pub fn find_next_void(&self, lo: usize) -> Option<(usize, Line)> {
        self.select(lo, self.ln_count())
            .into_iter()
            .find(|(_, l)| l.ln_void())
    }

    /// Find the previous completely empty line at or before `lo`.
    pub fn find_previous_void(&self, lo: usize) -> Option<(usize, Line)> {
        let mut i = lo.min(self.ln_count().saturating_sub(1));
        loop {
            match self.elements.get(i) {
                Some(l) if l.ln_void() => return Some((i, l.clone())),
                _ => {}
            }
            if i == 0 {
                return None;
            }
            i -= 1;
        }
    }

    /// Identify the area of non-empty lines around `[start, stop)`.
    pub fn map_contiguous_block(&self, start: usize, stop: usize) -> (usize, usize) {
        let mut bstart = 0;
        let mut bstop = self.ln_count();

        for (lo, ln) in self.select(stop, bstop) {
            if ln.ln_void() {
                bstop = lo;
                break;
            }
        }

        let mut i = start;
        while i > 0 {
            i -= 1;
            if let Some(l) = self.elements.get(i) {
                if l.ln_void() {
                    bstart = i + 1;
                    break;
                }
            }
        }

        (bstart, bstop)
    }

    /// Identify the area of an indentation level around `[start, stop)`.
    pub fn map_indentation_block(&self, il: u8, start: usize, stop: usize) -> (usize, usize) {
        let mut bstart = 0;
        let mut bstop = self.ln_count();

        if il == 0 {
            return (bstart, bstop);
        }

        for (lo, ln) in self.select(stop, bstop) {
            if !ln.content.is_empty() && ln.level < il {
                bstop = lo;
                break;
            }
        }

        let mut i = start;
        while i > 0 {
            i -= 1;
            if let Some(l) = self.elements.get(i) {
                if !l.content.is_empty() && l.level < il {
                    bstart = i + 1;
                    break;
                }
            }
        }

        (bstart, bstop)
    }
}
