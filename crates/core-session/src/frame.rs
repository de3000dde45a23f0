//! Session frames: the pane grid bound to refraction stacks.
//!
//! A frame pairs the layout model with one pane per division. Each pane
//! stacks content refractions (the last is visible), a location refraction
//! projecting the focused resource's path, and a prompt refraction opened
//! on demand as the division's footer. The frame routes focus, collects
//! display deltas, and remembers returns so closed views restore their
//! predecessors.

use core_model::frame::Section;
use core_model::{Area, Instruction, Model, Refraction};
use tracing::trace;

/// One division's view stack.
#[derive(Debug)]
pub struct Pane {
    pub location: Refraction,
    /// Content stack; the last entry is visible.
    pub content: Vec<Refraction>,
    pub prompt: Refraction,
    pub prompt_open: bool,
}

impl Pane {
    pub fn new(location: Refraction, content: Refraction, prompt: Refraction) -> Self {
        Self {
            location,
            content: vec![content],
            prompt,
            prompt_open: false,
        }
    }

    pub fn view(&self) -> &Refraction {
        self.content.last().unwrap_or(&self.location)
    }

    pub fn view_mut(&mut self) -> &mut Refraction {
        self.content.last_mut().unwrap_or(&mut self.location)
    }

    /// Display a new refraction, stacking the current one for return.
    pub fn attach(&mut self, refraction: Refraction) {
        self.content.push(refraction);
    }

    /// Close the visible refraction and restore its predecessor.
    ///
    /// Returns the removed refraction; the sole remaining view is never
    /// removed.
    pub fn returnview(&mut self) -> Option<Refraction> {
        if self.content.len() > 1 {
            self.content.pop()
        } else {
            None
        }
    }

    pub fn depth(&self) -> usize {
        self.content.len()
    }
}

/// A screen frame: layout model plus the panes filling it.
#[derive(Debug)]
pub struct Frame {
    pub index: usize,
    pub title: Option<String>,
    pub model: Model,
    pub area: Area,
    /// Panes in `iterpanes` order.
    pub panes: Vec<Pane>,
    /// Focused pane index.
    pub focus: usize,
    /// Whether the focus rests in the pane's prompt footer.
    pub focus_prompt: bool,
    /// Display instructions pending transfer to the device.
    pub deltas: Vec<Instruction>,
}

impl Frame {
    pub fn new(index: usize, area: Area, layout: &[(usize, usize)], panes: Vec<Pane>) -> Self {
        let mut model = Model::new();
        let allocation = 90usize.min(area.span / layout.len().max(1));
        model.configure(area, layout, allocation);
        let mut frame = Self {
            index,
            title: None,
            model,
            area,
            panes,
            focus: 0,
            focus_prompt: false,
            deltas: Vec::new(),
        };
        frame.fill();
        frame
    }

    /// The layout path `(vertical, division)` of a pane index.
    pub fn path_of(&self, pane: usize) -> (usize, usize) {
        self.model
            .iterpanes()
            .get(pane)
            .copied()
            .unwrap_or((0, 0))
    }

    /// Assign section areas to every pane's refractions.
    pub fn fill(&mut self) {
        let paths = self.model.iterpanes();
        for (i, pane) in self.panes.iter_mut().enumerate() {
            let Some((v, d)) = paths.get(i).copied() else {
                continue;
            };
            let content = self.model.section_area(v, d, Section::Content);
            let header = self.model.section_area(v, d, Section::Header);
            let footer = self.model.section_area(v, d, Section::Footer);

            for rf in pane.content.iter_mut() {
                rf.configure(content);
            }
            // The location holds the top header line.
            pane.location.configure(Area::new(
                header.top_offset,
                header.left_offset,
                header.lines.min(1),
                header.span,
            ));
            pane.prompt.configure(footer);
        }
    }

    /// Reconfigure for a new screen area.
    pub fn resize(&mut self, area: Area) {
        self.area = area;
        self.model.remodel(area);
        self.fill();
        trace!(target: "session.frame", index = self.index, lines = area.lines, span = area.span, "frame_resized");
    }

    /// The focused refraction: the pane's prompt when open and focused,
    /// otherwise the visible content view.
    pub fn focused(&self) -> &Refraction {
        let pane = &self.panes[self.focus.min(self.panes.len().saturating_sub(1))];
        if self.focus_prompt && pane.prompt_open {
            &pane.prompt
        } else {
            pane.view()
        }
    }

    pub fn focused_mut(&mut self) -> &mut Refraction {
        let focus = self.focus.min(self.panes.len().saturating_sub(1));
        let pane = &mut self.panes[focus];
        if self.focus_prompt && pane.prompt_open {
            &mut pane.prompt
        } else {
            pane.view_mut()
        }
    }

    pub fn focused_pane(&self) -> &Pane {
        &self.panes[self.focus.min(self.panes.len().saturating_sub(1))]
    }

    pub fn focused_pane_mut(&mut self) -> &mut Pane {
        let focus = self.focus.min(self.panes.len().saturating_sub(1));
        &mut self.panes[focus]
    }

    /// Rotate the pane focus.
    pub fn refocus(&mut self, step: isize) {
        if self.panes.is_empty() {
            return;
        }
        let n = self.panes.len() as isize;
        let next = (self.focus as isize + step).rem_euclid(n);
        self.focus = next as usize;
        self.focus_prompt = false;
    }

    /// Open the focused pane's prompt footer, allocating footer rows in
    /// the model, and emit the patch border.
    pub fn open_prompt(&mut self, rows: usize) -> Vec<Instruction> {
        let (v, d) = self.path_of(self.focus);
        self.model.set_margin_size(v, d, 3, rows);
        self.fill();
        let pane = self.focused_pane_mut();
        pane.prompt_open = true;
        self.focus_prompt = true;

        self.model
            .r_patch_footer(v, d)
            .into_iter()
            .map(border_fill_instruction)
            .collect()
    }

    /// Close the focused pane's prompt, restoring the body rows.
    pub fn close_prompt(&mut self) {
        let (v, d) = self.path_of(self.focus);
        self.model.set_margin_size(v, d, 3, 0);
        self.fill();
        let pane = self.focused_pane_mut();
        pane.prompt_open = false;
        self.focus_prompt = false;
    }

    /// Border rendering for the whole frame.
    pub fn render_borders(&self) -> Vec<Instruction> {
        let mut out: Vec<Instruction> = self
            .model
            .r_enclose(self.area.span, self.area.lines)
            .into_iter()
            .map(border_fill_instruction)
            .collect();
        out.extend(
            self.model
                .r_divide(self.area.span, self.area.lines)
                .into_iter()
                .map(border_fill_instruction),
        );
        out
    }

    /// All refractions in the frame, visible content views first.
    pub fn refractions_mut(&mut self) -> Vec<&mut Refraction> {
        let mut out = Vec::new();
        for pane in self.panes.iter_mut() {
            out.extend(pane.content.iter_mut());
            out.push(&mut pane.location);
            if pane.prompt_open {
                out.push(&mut pane.prompt);
            }
        }
        out
    }
}

/// Convert a border fill into a rewrite instruction.
pub fn border_fill_instruction(fill: core_model::BorderFill) -> Instruction {
    let (area, glyph) = fill;
    let style = core_text::Glyph::default().with_text(core_syntax::palette("application-border"));
    let cells = vec![core_text::Cell::lead(glyph.to_string(), style); area.cells()];
    Instruction::Rewrite { area, cells }
}
