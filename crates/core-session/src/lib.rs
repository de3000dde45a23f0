//! Session: resource ownership, frame management, and dispatch.
//!
//! The session owns the resource arena, the frames, the keyboard
//! selection, and the background I/O manager. Every cycle drains
//! completed I/O, interprets the next device event through the keyboard
//! mode tables, dispatches the bound operation, and drains the per-frame
//! delta queues onto the device. The dispatch loop never propagates
//! failures: a failed operation resets the keyboard mode to control and
//! logs into the transcript.

pub mod frame;
pub mod keyboard;
pub mod location;
pub mod prompt;
pub mod retention;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, warn};

use core_events::{DeviceEvent, Key};
use core_io::{Completion, IoManager, IoTarget};
use core_model::frame::Indicator;
use core_model::{Area, ControlMode, Instruction, Refraction};
use core_state::{
    CursorPair, Directory, Line, LineForm, ObserverId, Record, Reference, Resource, ResourceId,
    ResourceStatus,
};
use core_syntax::{Profile, Reformulations};
use core_text::{Cell, Glyph};

use frame::{Frame, Pane};
use keyboard::{Keyboard, Operation};
use prompt::{Procedure, Revisions, Step, structure};
use retention::{FrameRecord, Selection, SessionSnapshot};

/// Background transfer routing: which resource a completion writes into
/// and the tracked cursor marking its insertion point.
#[derive(Debug, Clone)]
struct IoRoute {
    resource: ResourceId,
    cursor: ObserverId,
    /// Partial line termination carried between transfers.
    remainder: String,
}

pub struct Session {
    pub resources: Directory,
    pub frames: Vec<Frame>,
    /// Focused frame index.
    pub focus: usize,
    pub keyboard: Keyboard,
    pub io: IoManager,
    pub done: bool,

    /// Vertical and horizontal scroll margins.
    margins: (usize, usize),
    cells: (usize, usize),
    profile_dir: Option<PathBuf>,
    forms_cache: HashMap<String, Arc<Reformulations>>,
    transcript: ResourceId,
    revisions: Revisions,
    io_routes: HashMap<u64, IoRoute>,
    next_handle: u64,
    indicator_memory: Vec<Indicator>,
    /// The row the cursor overlay painted last cycle.
    cursor_memory: Option<Area>,
    area: Area,
}

impl Session {
    pub fn new(config: &core_config::Config, io: IoManager, area: Area) -> Self {
        let mut resources = Directory::new();
        let transcript = resources.insert(Resource::constant(Reference::new(
            "session://",
            "/transcript",
            "transcript",
        )));

        Self {
            resources,
            frames: Vec::new(),
            focus: 0,
            keyboard: Keyboard::default(),
            io,
            done: false,
            margins: (
                config.file.scroll.margin.vertical,
                config.file.scroll.margin.horizontal,
            ),
            cells: (config.file.cells.ctlsize, config.file.cells.tabsize),
            profile_dir: config.file.syntax.profiles.clone().or_else(|| {
                let local = PathBuf::from("profiles");
                local.is_dir().then_some(local)
            }),
            forms_cache: HashMap::new(),
            transcript,
            revisions: Revisions::default(),
            io_routes: HashMap::new(),
            next_handle: 1,
            indicator_memory: Vec::new(),
            cursor_memory: None,
            area,
        }
    }

    // ------------------------------------------------------------------
    // Reformulations and resources
    // ------------------------------------------------------------------

    /// Select a syntax type for a path by extension.
    pub fn lookup_type(&self, path: &Path) -> String {
        match path.extension().and_then(|e| e.to_str()) {
            Some("rs") => "rust",
            Some("py") => "python",
            Some("c") | Some("h") => "c",
            Some("js") | Some("ts") => "ecmascript",
            Some("json") => "json",
            Some("html") => "html",
            Some("css") => "css",
            Some("hs") => "haskell",
            Some("lua") => "lua",
            Some("sql") => "sql",
            _ => "lambda",
        }
        .to_string()
    }

    /// The reformulations bundle of a syntax type, loading its keyword
    /// profile on first use. Unknown types fall back to the default
    /// profile rather than failing.
    pub fn forms(&mut self, syntax_type: &str) -> Arc<Reformulations> {
        if let Some(cached) = self.forms_cache.get(syntax_type) {
            return cached.clone();
        }

        let profile = match syntax_type {
            "ivectors" => Profile::instruction_vectors(),
            "lambda" | "transcript" => Profile::lambda(),
            name => {
                let loaded = self
                    .profile_dir
                    .as_ref()
                    .map(|d| d.join(format!("{name}.json")))
                    .filter(|p| p.exists())
                    .and_then(|p| std::fs::read_to_string(p).ok())
                    .and_then(|data| match Profile::from_json(&data) {
                        Ok(p) => Some(p),
                        Err(e) => {
                            warn!(target: "session.syntax", syntax = name, error = %e, "profile_load_failed");
                            None
                        }
                    });
                loaded.unwrap_or_else(Profile::lambda)
            }
        };

        let mut forms = Reformulations::new(syntax_type, profile);
        forms.ctlsize = self.cells.0;
        forms.tabsize = self.cells.1;
        let forms = Arc::new(forms);
        self.forms_cache
            .insert(syntax_type.to_string(), forms.clone());
        forms
    }

    /// Find or load the resource for `path`.
    ///
    /// Bytes failing the configured encoding load under the replacement
    /// strategy rather than rejecting the file.
    pub fn import_resource(&mut self, path: &Path) -> ResourceId {
        if let Some(existing) = self.resources.select_by_path(path) {
            return existing;
        }

        let syntax_type = self.lookup_type(path);
        let mut resource = Resource::new(Reference::new("file://", path, syntax_type));

        if let Ok(bytes) = std::fs::read(path) {
            // Decode failure recovery: surrogate content is replaced.
            let text = String::from_utf8_lossy(&bytes);
            let form = LineForm::default();
            let mut lines: Vec<Line> = text.split('\n').map(|l| form.interpret(l)).collect();
            if text.ends_with('\n') {
                lines.pop();
            }
            if lines.is_empty() {
                lines.push(Line::default());
            }
            resource.reset_elements(lines);
            resource.status = Some(ResourceStatus {
                last_modified: std::fs::metadata(path).and_then(|m| m.modified()).ok(),
                size: bytes.len() as u64,
            });
        } else {
            resource.ln_initialize("", 0, None);
            resource.commit();
        }

        let id = self.resources.insert(resource);
        debug!(target: "session.resource", path = %path.display(), "resource_imported");
        id
    }

    /// Serialize a resource's lines back to its origin path.
    pub fn store_resource(&mut self, rid: ResourceId) -> Result<()> {
        let Some(resource) = self.resources.get(rid) else {
            return Err(anyhow!("resource is closed"));
        };
        let form = LineForm::default();
        let content = resource.serialize(&form, 0, resource.ln_count());
        let path = resource.origin.path.clone();
        std::fs::write(&path, content.as_bytes())
            .with_context(|| format!("storing {}", path.display()))?;

        if let Some(resource) = self.resources.get_mut(rid) {
            resource.status = Some(ResourceStatus {
                last_modified: std::fs::metadata(&path).and_then(|m| m.modified()).ok(),
                size: content.len() as u64,
            });
        }
        self.log(format!("stored {}", path.display()));
        Ok(())
    }

    /// Construct a refraction of the resource identified by `path`.
    pub fn refract(&mut self, path: &Path) -> Refraction {
        let rid = self.import_resource(path);
        self.refraction_of(rid)
    }

    fn refraction_of(&mut self, rid: ResourceId) -> Refraction {
        let syntax_type = self
            .resources
            .get(rid)
            .map(|r| r.origin.syntax_type.clone())
            .unwrap_or_else(|| "lambda".to_string());
        let forms = self.forms(&syntax_type);
        let observer = self.allocate_handle();
        if let Some(resource) = self.resources.get_mut(rid) {
            resource.attach_view(ObserverId(observer));
        }
        let mut rf = Refraction::new(rid, forms);
        rf.limits = self.margins;
        rf
    }

    fn allocate_handle(&mut self) -> u64 {
        let h = self.next_handle;
        self.next_handle += 1;
        h
    }

    fn allocate_scratch(&mut self, name: &str, syntax: &str) -> ResourceId {
        let mut r = Resource::new(Reference::new("session://", name, syntax));
        r.ln_initialize("", 0, None);
        r.commit();
        self.resources.insert(r)
    }

    // ------------------------------------------------------------------
    // Frames
    // ------------------------------------------------------------------

    /// Allocate a frame with the given layout, opening `paths` into its
    /// panes in order; remaining panes receive scratch resources.
    pub fn allocate(&mut self, layout: &[(usize, usize)], paths: &[PathBuf]) -> usize {
        let pane_count: usize = layout.iter().map(|(d, _)| *d).sum::<usize>().max(1);
        let mut panes = Vec::with_capacity(pane_count);

        for i in 0..pane_count {
            let content = match paths.get(i) {
                Some(p) => self.refract(p),
                None => {
                    let rid = self.allocate_scratch(&format!("/scratch/{i}"), "lambda");
                    self.refraction_of(rid)
                }
            };
            let location_rid = self.allocate_scratch(&format!("/location/{i}"), "lambda");
            let mut location = self.refraction_of(location_rid);
            location.frame_visible = true;
            let prompt_rid = self.allocate_scratch(&format!("/prompt/{i}"), "ivectors");
            let prompt = self.refraction_of(prompt_rid);

            self.sync_location(location_rid, content.source);
            panes.push(Pane::new(location, content, prompt));
        }

        let index = self.frames.len();
        let frame = Frame::new(index, self.area, layout, panes);
        self.frames.push(frame);
        self.focus = index;
        info!(target: "session.frame", index, verticals = layout.len(), "frame_allocated");
        index
    }

    /// Rewrite a location resource to show the path of `content`.
    fn sync_location(&mut self, location: ResourceId, content: ResourceId) {
        let path = self
            .resources
            .get(content)
            .map(|r| format!("{}{}", r.origin.system, r.origin.path.display()))
            .unwrap_or_default();
        if let Some(loc) = self.resources.get_mut(location) {
            let count = loc.ln_count();
            loc.delete_lines(0, count);
            loc.insert_lines(0, vec![Line::new(path, 0)]);
            loc.commit();
        }
    }

    pub fn focused_frame(&self) -> Option<&Frame> {
        self.frames.get(self.focus)
    }

    pub fn focused_frame_mut(&mut self) -> Option<&mut Frame> {
        self.frames.get_mut(self.focus)
    }

    fn focused(&self) -> Option<&Refraction> {
        self.frames.get(self.focus).map(|f| f.focused())
    }

    fn focused_mut(&mut self) -> Option<&mut Refraction> {
        self.frames.get_mut(self.focus).map(|f| f.focused_mut())
    }

    /// Resize every frame to the new device dimensions.
    pub fn resize(&mut self, lines: usize, span: usize) {
        self.area = Area::new(0, 0, lines, span);
        for frame in self.frames.iter_mut() {
            frame.resize(Area::new(0, 0, lines, span));
        }
        self.redraw();
    }

    // ------------------------------------------------------------------
    // Commit pipeline
    // ------------------------------------------------------------------

    /// Apply a resource's pending records, distributing each applied
    /// record to every observing refraction before the next applies.
    fn commit_resource(&mut self, rid: ResourceId, collapse: bool, checkpoint: bool) {
        let focus = self.focus;
        let Session {
            resources, frames, ..
        } = self;
        let Some(resource) = resources.get_mut(rid) else {
            return;
        };

        resource.commit_with(collapse, checkpoint, |record, storage, _views| {
            distribute(frames, focus, rid, record, storage);
        });

        self.settle_views(rid);
    }

    fn undo_resource(&mut self, rid: ResourceId, quantity: usize) {
        let focus = self.focus;
        let Session {
            resources, frames, ..
        } = self;
        let Some(resource) = resources.get_mut(rid) else {
            return;
        };
        resource.undo_with(quantity, |record, storage, _views| {
            distribute(frames, focus, rid, record, storage);
        });
        self.settle_views(rid);
    }

    fn redo_resource(&mut self, rid: ResourceId, quantity: usize) {
        let focus = self.focus;
        let Session {
            resources, frames, ..
        } = self;
        let Some(resource) = resources.get_mut(rid) else {
            return;
        };
        resource.redo_with(quantity, |record, storage, _views| {
            distribute(frames, focus, rid, record, storage);
        });
        self.settle_views(rid);
    }

    /// Constrain cursors and pad images for every view of `rid`.
    fn settle_views(&mut self, rid: ResourceId) {
        let Session {
            resources, frames, ..
        } = self;
        let Some(resource) = resources.get(rid) else {
            return;
        };
        for frame in frames.iter_mut() {
            for rf in frame.refractions_mut() {
                if rf.source == rid {
                    let scrolls = rf.recursor(resource.elements());
                    let pads = rf.compensate();
                    if rf.frame_visible {
                        rf.deltas.extend(scrolls);
                        rf.deltas.extend(pads);
                    }
                    rf.version = resource.version();
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Event dispatch
    // ------------------------------------------------------------------

    /// Process one device event.
    pub fn dispatch(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::Key(key) => self.dispatch_key(&key),
            DeviceEvent::Text(text) | DeviceEvent::Paste(text) => {
                let op = Operation::new("delta", &["insert", "character"]);
                self.guarded(op, Some(text), 1);
            }
            DeviceEvent::Resize { lines, span } => self.resize(lines, span),
            DeviceEvent::Wakeup => self.drain_io(),
            DeviceEvent::Interrupt => {
                let op = Operation::new("session", &["cancel"]);
                self.guarded(op, None, 1);
            }
            DeviceEvent::FocusGained | DeviceEvent::FocusLost => {}
        }
    }

    /// Interpret and dispatch a keystroke.
    pub fn dispatch_key(&mut self, key: &Key) {
        let mode = self
            .focused()
            .map(|rf| rf.control_mode)
            .unwrap_or(ControlMode::Control);
        let (op, text) = self.keyboard.interpret(mode, key);
        self.guarded(op, text, 1);
    }

    /// Run an operation inside the recovery block: failures reset the
    /// keyboard mode to control and land in the transcript, never
    /// propagating out of the loop.
    fn guarded(&mut self, op: Operation, text: Option<String>, quantity: usize) {
        if let Err(e) = self.apply(op, text, quantity) {
            warn!(target: "session.dispatch", error = %e, category = op.category, "operation_failed");
            if let Some(rf) = self.focused_mut() {
                rf.control_mode = ControlMode::Control;
            }
            self.log(format!("operation failed: {e}"));
        }
    }

    fn focused_resource(&self) -> Result<ResourceId> {
        self.focused()
            .map(|rf| rf.source)
            .ok_or_else(|| anyhow!("no focused view"))
    }

    fn apply(&mut self, op: Operation, text: Option<String>, quantity: usize) -> Result<()> {
        let q = quantity.max(1) as isize;
        match (op.category, op.path) {
            // ---------------- navigation --------------------------------
            ("navigation", ["vertical", "forward", "unit"]) => self.move_vertical(q),
            ("navigation", ["vertical", "backward", "unit"]) => self.move_vertical(-q),
            ("navigation", ["vertical", "stop"]) => self.vertical_edge(1),
            ("navigation", ["vertical", "start"]) => self.vertical_edge(-1),
            ("navigation", ["vertical", "sections"]) => {
                let edge = self.focused().map(|rf| rf.area.lines).unwrap_or(1) as isize;
                self.move_vertical((edge / 2).max(1) * q)
            }
            ("navigation", ["vertical", "paging"]) => {
                let edge = self.focused().map(|rf| rf.area.lines).unwrap_or(1) as isize;
                self.move_vertical(edge.max(1) * q)
            }
            ("navigation", ["view", "scroll", "forward"]) => {
                let edge = self.focused().map(|rf| rf.area.lines).unwrap_or(1) as isize;
                self.move_vertical(edge.max(1))
            }
            ("navigation", ["view", "scroll", "backward"]) => {
                let edge = self.focused().map(|rf| rf.area.lines).unwrap_or(1) as isize;
                self.move_vertical(-edge.max(1))
            }
            ("navigation", ["vertical", "void", "forward"]) => self.seek_void(true),
            ("navigation", ["vertical", "void", "backward"]) => self.seek_void(false),
            ("navigation", ["vertical", "select", "line"]) => self.select_line(),
            ("navigation", ["vertical", "select", "indentation"]) => self.select_indentation(false),
            ("navigation", ["vertical", "select", "indentation", "level"]) => {
                self.select_indentation(true)
            }
            ("navigation", ["horizontal", "forward"]) => self.move_horizontal(q),
            ("navigation", ["horizontal", "backward"]) => self.move_horizontal(-q),
            ("navigation", ["horizontal", "start"]) => self.horizontal_edge(-1),
            ("navigation", ["horizontal", "stop"]) => self.horizontal_edge(1),
            ("navigation", ["session", "seek", "first"]) => self.seek_line(0),
            ("navigation", ["session", "seek", "last"]) => {
                let rid = self.focused_resource()?;
                let last = self
                    .resources
                    .get(rid)
                    .map(|r| r.ln_count().saturating_sub(1))
                    .unwrap_or(0);
                self.seek_line(last)
            }

            // ---------------- deltas ------------------------------------
            ("delta", ["insert", "character"]) => {
                let text = text.ok_or_else(|| anyhow!("insertion without text"))?;
                self.insert_text(&text, true)
            }
            ("delta", ["insert", "captured"]) => {
                let text = text.ok_or_else(|| anyhow!("capture without text"))?;
                self.insert_text(&text, true)?;
                if let Some(rf) = self.focused_mut() {
                    rf.control_mode = ControlMode::Insert;
                }
                Ok(())
            }
            ("delta", ["delete", "backward"]) => self.delete_backward(),
            ("delta", ["delete", "forward"]) | ("delta", ["delete", "unit"]) => {
                self.delete_forward()
            }
            ("delta", ["delete", "line"]) => self.delete_line(),
            ("delta", ["line", "break"]) => self.line_break(),
            ("delta", ["line", "join"]) => self.line_join(),
            ("delta", ["line", "open", "below"]) => self.line_open(1),
            ("delta", ["line", "open", "above"]) => self.line_open(0),
            ("delta", ["indentation", "increase"]) => self.indent(1),
            ("delta", ["indentation", "decrease"]) => self.indent(-1),
            ("delta", ["undo"]) => {
                let rid = self.focused_resource()?;
                self.undo_resource(rid, quantity.max(1));
                Ok(())
            }
            ("delta", ["redo"]) => {
                let rid = self.focused_resource()?;
                self.redo_resource(rid, quantity.max(1));
                Ok(())
            }

            // ---------------- meta --------------------------------------
            ("meta", ["transition", "insert", rest @ ..]) => self.transition_insert(rest),
            ("meta", ["transition", "control"]) => self.transition_control(),
            ("meta", ["transition", "capture"]) => {
                if let Some(rf) = self.focused_mut() {
                    rf.control_mode = ControlMode::Capture;
                }
                Ok(())
            }
            ("meta", ["prepare", "command"]) => self.open_prompt(),
            ("meta", ["activate"]) => self.activate(),
            ("meta", ["view", "refresh"]) => {
                self.refresh_focused();
                Ok(())
            }
            ("meta", ["ineffective"]) => Ok(()),

            // ---------------- view --------------------------------------
            ("view", ["next", "refraction"]) => {
                if let Some(frame) = self.focused_frame_mut() {
                    frame.refocus(1);
                }
                Ok(())
            }
            ("view", ["previous", "refraction"]) => {
                if let Some(frame) = self.focused_frame_mut() {
                    frame.refocus(-1);
                }
                Ok(())
            }
            ("view", ["pan", "forward"]) => self.pan(4),
            ("view", ["pan", "backward"]) => self.pan(-4),

            // ---------------- session -----------------------------------
            ("session", ["resource", "store"]) => {
                let rid = self.focused_resource()?;
                self.store_resource(rid)
            }
            ("session", ["cancel"]) => self.cancel(),
            ("session", ["quit"]) => {
                self.done = true;
                Ok(())
            }
            ("session", ["view", "close"]) => self.close_view(),
            ("session", ["frame", "switch", "next"]) => {
                if !self.frames.is_empty() {
                    self.focus = (self.focus + 1) % self.frames.len();
                    self.redraw();
                }
                Ok(())
            }

            _ => {
                debug!(
                    target: "session.dispatch",
                    category = op.category,
                    path = ?op.path,
                    "unbound_operation"
                );
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Navigation operations
    // ------------------------------------------------------------------

    fn with_focused_view<R>(
        &mut self,
        f: impl FnOnce(&mut Refraction, &Resource) -> R,
    ) -> Result<R> {
        let focus = self.focus;
        let Session {
            resources, frames, ..
        } = self;
        let frame = frames.get_mut(focus).ok_or_else(|| anyhow!("no frame"))?;
        let rf = frame.focused_mut();
        let resource = resources
            .get(rf.source)
            .ok_or_else(|| anyhow!("focused resource is closed"))?;
        Ok(f(rf, resource))
    }

    fn move_vertical(&mut self, q: isize) -> Result<()> {
        self.with_focused_view(|rf, resource| {
            rf.focus.0.update(q);
            let instrs = rf.recursor(resource);
            if rf.frame_visible {
                rf.deltas.extend(instrs);
            }
        })
    }

    fn vertical_edge(&mut self, direction: isize) -> Result<()> {
        self.with_focused_view(|rf, resource| {
            if direction > 0 {
                rf.focus.0.move_to(0, -1);
            } else {
                rf.focus.0.move_to(0, 1);
            }
            let instrs = rf.recursor(resource);
            if rf.frame_visible {
                rf.deltas.extend(instrs);
            }
        })
    }

    fn move_horizontal(&mut self, q: isize) -> Result<()> {
        self.with_focused_view(|rf, resource| {
            rf.focus.1.update(q);
            let instrs = rf.recursor(resource);
            if rf.frame_visible {
                rf.deltas.extend(instrs);
            }
        })
    }

    fn horizontal_edge(&mut self, direction: isize) -> Result<()> {
        self.with_focused_view(|rf, resource| {
            let (lo, _) = rf.coordinates();
            let ll = resource
                .sole(lo)
                .map(|l| l.ln_length() as isize)
                .unwrap_or(0);
            rf.focus.1.set(if direction > 0 { ll } else { 0 });
            let instrs = rf.recursor(resource);
            if rf.frame_visible {
                rf.deltas.extend(instrs);
            }
        })
    }

    fn seek_line(&mut self, lo: usize) -> Result<()> {
        self.with_focused_view(|rf, resource| {
            rf.seek(lo, 0);
            let instrs = rf.recursor(resource);
            if rf.frame_visible {
                rf.deltas.extend(instrs);
            }
        })
    }

    fn seek_void(&mut self, forwards: bool) -> Result<()> {
        self.with_focused_view(|rf, resource| {
            let (lo, _) = rf.coordinates();
            let found = if forwards {
                resource.find_next_void(lo + 1)
            } else {
                resource.find_previous_void(lo.saturating_sub(1))
            };
            if let Some((vo, _)) = found {
                rf.seek(vo, 0);
                let instrs = rf.recursor(resource);
                if rf.frame_visible {
                    rf.deltas.extend(instrs);
                }
            }
        })
    }

    fn select_line(&mut self) -> Result<()> {
        self.with_focused_view(|rf, resource| {
            let (lo, _) = rf.coordinates();
            rf.focus.0.restore((lo as isize, lo as isize, lo as isize + 1));
            let ll = resource.sole(lo).map(|l| l.ln_length()).unwrap_or(0) as isize;
            rf.focus.1.restore((0, rf.focus.1.get().min(ll), ll));
        })
    }

    fn select_indentation(&mut self, level_only: bool) -> Result<()> {
        self.with_focused_view(|rf, resource| {
            let (lo, _) = rf.coordinates();
            let il = resource.sole(lo).map(|l| l.level).unwrap_or(0);
            let (start, stop) = if level_only {
                resource.map_indentation_block(il, lo, lo + 1)
            } else {
                resource.map_contiguous_block(lo, lo + 1)
            };
            rf.focus
                .0
                .restore((start as isize, lo as isize, stop as isize));
        })
    }

    fn pan(&mut self, q: isize) -> Result<()> {
        self.with_focused_view(|rf, _| {
            let instrs = rf.pan(q);
            if rf.frame_visible {
                rf.deltas.extend(instrs);
            }
        })
    }

    // ------------------------------------------------------------------
    // Delta operations
    // ------------------------------------------------------------------

    fn insert_text(&mut self, text: &str, collapse: bool) -> Result<()> {
        let rid = self.focused_resource()?;
        let (lo, co) = self
            .focused()
            .map(|rf| rf.coordinates())
            .unwrap_or((0, 0));

        {
            let resource = self
                .resources
                .get_mut(rid)
                .ok_or_else(|| anyhow!("resource is closed"))?;
            if text.contains('\n') {
                let form = LineForm::default();
                resource.splice_text(&form, lo, co, text, 0)?;
            } else {
                if resource.ln_count() == lo {
                    resource.ln_initialize("", 0, Some(lo));
                }
                resource.insert_codepoints(lo, co, text);
            }
        }
        self.commit_resource(rid, collapse, false);
        Ok(())
    }

    fn delete_backward(&mut self) -> Result<()> {
        let rid = self.focused_resource()?;
        let (lo, co) = self
            .focused()
            .map(|rf| rf.coordinates())
            .unwrap_or((0, 0));

        if co > 0 {
            if let Some(resource) = self.resources.get_mut(rid) {
                resource.delete_codepoints(lo, co - 1, co)?;
            }
            self.commit_resource(rid, true, false);
        } else if lo > 0 {
            // Join with the previous line.
            let previous_len = self
                .resources
                .get(rid)
                .and_then(|r| r.sole(lo - 1).ok())
                .map(|l| l.ln_length())
                .unwrap_or(0);
            if let Some(resource) = self.resources.get_mut(rid) {
                resource.join(lo - 1, 1, "")?;
            }
            self.commit_resource(rid, false, false);
            self.with_focused_view(|rf, resource| {
                rf.seek(lo - 1, previous_len);
                let instrs = rf.recursor(resource);
                if rf.frame_visible {
                    rf.deltas.extend(instrs);
                }
            })?;
        }
        Ok(())
    }

    fn delete_forward(&mut self) -> Result<()> {
        let rid = self.focused_resource()?;
        let (lo, co) = self
            .focused()
            .map(|rf| rf.coordinates())
            .unwrap_or((0, 0));
        if let Some(resource) = self.resources.get_mut(rid) {
            let ll = resource.sole(lo)?.ln_length();
            if co < ll {
                resource.delete_codepoints(lo, co, co + 1)?;
            }
        }
        self.commit_resource(rid, true, false);
        Ok(())
    }

    fn delete_line(&mut self) -> Result<()> {
        let rid = self.focused_resource()?;
        let (lo, _) = self
            .focused()
            .map(|rf| rf.coordinates())
            .unwrap_or((0, 0));
        if let Some(resource) = self.resources.get_mut(rid) {
            resource.delete_lines(lo, lo + 1);
        }
        self.commit_resource(rid, false, true);
        Ok(())
    }

    fn line_break(&mut self) -> Result<()> {
        let rid = self.focused_resource()?;
        let (lo, co) = self
            .focused()
            .map(|rf| rf.coordinates())
            .unwrap_or((0, 0));
        if let Some(resource) = self.resources.get_mut(rid) {
            if resource.ln_count() == lo {
                resource.ln_initialize("", 0, Some(lo));
            }
            resource.split(lo, co)?;
        }
        self.commit_resource(rid, false, false);
        self.with_focused_view(|rf, resource| {
            rf.seek(lo + 1, 0);
            let instrs = rf.recursor(resource);
            if rf.frame_visible {
                rf.deltas.extend(instrs);
            }
        })
    }

    fn line_join(&mut self) -> Result<()> {
        let rid = self.focused_resource()?;
        let (lo, _) = self
            .focused()
            .map(|rf| rf.coordinates())
            .unwrap_or((0, 0));
        if let Some(resource) = self.resources.get_mut(rid) {
            resource.join(lo, 1, "")?;
        }
        self.commit_resource(rid, false, false);
        Ok(())
    }

    fn line_open(&mut self, below: usize) -> Result<()> {
        let rid = self.focused_resource()?;
        let (lo, _) = self
            .focused()
            .map(|rf| rf.coordinates())
            .unwrap_or((0, 0));
        let at = lo + below;
        if let Some(resource) = self.resources.get_mut(rid) {
            resource.insert_lines(at.min(resource.ln_count()), vec![Line::default()]);
        }
        self.commit_resource(rid, false, true);
        self.with_focused_view(|rf, resource| {
            rf.seek(at, 0);
            rf.control_mode = ControlMode::Insert;
            let instrs = rf.recursor(resource);
            if rf.frame_visible {
                rf.deltas.extend(instrs);
            }
        })
    }

    fn indent(&mut self, change: i16) -> Result<()> {
        let rid = self.focused_resource()?;
        let (range, lo) = self
            .focused()
            .map(|rf| {
                let (start, _, stop) = rf.focus.0.snapshot();
                (
                    (start.max(0) as usize, stop.max(0) as usize),
                    rf.coordinates().0,
                )
            })
            .unwrap_or(((0, 0), 0));

        if let Some(resource) = self.resources.get_mut(rid) {
            if range.1 > range.0 + 1 {
                resource.adjust_indentation(range.0, range.1, change);
            } else {
                resource.increase_indentation(lo, change)?;
            }
        }
        self.commit_resource(rid, false, false);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Meta operations
    // ------------------------------------------------------------------

    fn transition_insert(&mut self, variant: &[&str]) -> Result<()> {
        let rid = self.focused_resource()?;
        // Checkpoint so the insert run groups for undo.
        if let Some(resource) = self.resources.get_mut(rid) {
            resource.checkpoint();
        }
        self.with_focused_view(|rf, resource| {
            let (lo, co) = rf.coordinates();
            let ll = resource.sole(lo).map(|l| l.ln_length()).unwrap_or(0);
            let target = match variant.first().copied() {
                Some("start-of-line") => 0,
                Some("end-of-line") => ll,
                Some("after") => (co + 1).min(ll),
                _ => co,
            };
            rf.focus.1.set(target as isize);
            rf.control_mode = ControlMode::Insert;
        })
    }

    fn transition_control(&mut self) -> Result<()> {
        let rid = self.focused_resource()?;
        if let Some(resource) = self.resources.get_mut(rid) {
            // End of the insert run; collapse typing into one record.
            resource.modifications.collapse();
            resource.checkpoint();
        }
        if let Some(rf) = self.focused_mut() {
            rf.control_mode = ControlMode::Control;
        }
        Ok(())
    }

    fn open_prompt(&mut self) -> Result<()> {
        let latest = self.revisions.latest().map(str::to_string);
        let Some(frame) = self.focused_frame_mut() else {
            return Ok(());
        };
        let patch = frame.open_prompt(1);
        frame.deltas.extend(patch);

        let prompt_rid = frame.focused_pane().prompt.source;
        if let Some(resource) = self.resources.get_mut(prompt_rid) {
            let count = resource.ln_count();
            resource.delete_lines(0, count);
            resource.insert_lines(0, vec![Line::new(latest.unwrap_or_default(), 0)]);
            resource.commit();
        }
        if let Some(rf) = self.focused_mut() {
            rf.control_mode = ControlMode::Insert;
            rf.seek(0, 0);
        }
        self.refresh_focused();
        Ok(())
    }

    fn activate(&mut self) -> Result<()> {
        let in_prompt = self
            .focused_frame()
            .map(|f| f.focus_prompt && f.focused_pane().prompt_open)
            .unwrap_or(false);

        if in_prompt {
            let prompt_rid = self.focused_resource()?;
            let command = self
                .resources
                .get(prompt_rid)
                .map(|r| {
                    r.select(0, r.ln_count())
                        .into_iter()
                        .map(|(_, l)| l.content)
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .unwrap_or_default();

            self.revisions.record(command.clone());
            if let Some(frame) = self.focused_frame_mut() {
                frame.close_prompt();
            }
            if let Some(rf) = self.focused_mut() {
                rf.control_mode = ControlMode::Control;
            }
            let procedure = structure(&command);
            self.execute(&procedure)?;
            self.redraw();
        } else if self.focused().map(|rf| rf.control_mode) == Some(ControlMode::Insert) {
            // Activation while inserting breaks the line at the cursor.
            self.line_break()?;
        } else {
            // Activation in content seeks the next line start.
            self.with_focused_view(|rf, resource| {
                let (lo, _) = rf.coordinates();
                rf.seek((lo + 1).min(resource.ln_count().saturating_sub(1)), 0);
                let instrs = rf.recursor(resource);
                if rf.frame_visible {
                    rf.deltas.extend(instrs);
                }
            })?;
        }
        Ok(())
    }

    fn refresh_focused(&mut self) {
        let _ = self.with_focused_view(|rf, resource| {
            let whence = rf.image.line_offset;
            let instrs = rf.refresh(whence, resource);
            rf.frame_visible = true;
            rf.deltas.extend(instrs);
        });
    }

    fn cancel(&mut self) -> Result<()> {
        let prompt_open = self
            .focused_frame()
            .map(|f| f.focused_pane().prompt_open)
            .unwrap_or(false);
        if prompt_open {
            if let Some(frame) = self.focused_frame_mut() {
                frame.close_prompt();
            }
            self.redraw();
        }
        if let Some(rf) = self.focused_mut() {
            rf.control_mode = ControlMode::Control;
            rf.clear_annotation();
        }
        Ok(())
    }

    fn close_view(&mut self) -> Result<()> {
        let closed = self
            .focused_frame_mut()
            .and_then(|frame| frame.focused_pane_mut().returnview());

        if let Some(closed) = closed {
            let rid = closed.source;
            // Closing a refraction interrupts pending I/O targeting it.
            let routes: Vec<u64> = self
                .io_routes
                .iter()
                .filter(|(_, r)| r.resource == rid)
                .map(|(k, _)| *k)
                .collect();
            for handle in routes {
                self.io.interrupt(core_io::IoLink(handle));
                self.io_routes.remove(&handle);
            }
            self.redraw();
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Prompt execution
    // ------------------------------------------------------------------

    /// Execute a parsed procedure.
    ///
    /// Exit-status conditions are honored as written for `never`, while
    /// completion conditions dispatch optimistically: process exits are
    /// asynchronous, so their statuses resolve through completions.
    pub fn execute(&mut self, procedure: &Procedure) -> Result<()> {
        for (step, condition) in procedure.iterate() {
            if condition == prompt::Condition::Never {
                continue;
            }
            match step {
                Step::Instruction(inst) => self.execute_instruction(inst)?,
                Step::Composition(c) => {
                    for part in &c.parts {
                        match part {
                            Step::Instruction(inst) => self.execute_instruction(inst)?,
                            Step::Procedure(p) => self.execute(p)?,
                            Step::Composition(_) => {}
                        }
                    }
                }
                Step::Procedure(p) => self.execute(p)?,
            }
        }
        Ok(())
    }

    fn execute_instruction(&mut self, inst: &prompt::Instruction) -> Result<()> {
        let args: Vec<&str> = inst.fields.iter().skip(1).map(String::as_str).collect();
        match inst.title() {
            "seek" => {
                let target: usize = args
                    .first()
                    .and_then(|a| a.parse().ok())
                    .ok_or_else(|| anyhow!("seek requires a line number"))?;
                self.seek_line(target.saturating_sub(1))
            }
            "find" => {
                let pattern = args.join(" ");
                let re = regex::Regex::new(&pattern)
                    .with_context(|| format!("invalid pattern {pattern:?}"))?;
                self.with_focused_view(|rf, resource| {
                    let from = rf.coordinates();
                    if let Some((lo, start, _)) = rf.find(resource, &re, from, true) {
                        rf.seek(lo, start);
                        let instrs = rf.recursor(resource);
                        if rf.frame_visible {
                            rf.deltas.extend(instrs);
                        }
                        true
                    } else {
                        false
                    }
                })
                .map(|found| {
                    if !found {
                        self.log(format!("pattern not found: {pattern}"));
                    }
                })
            }
            "open" => {
                let path = args
                    .first()
                    .ok_or_else(|| anyhow!("open requires a path"))?;
                let rf = self.refract(Path::new(path));
                if let Some(frame) = self.focused_frame_mut() {
                    frame.focused_pane_mut().attach(rf);
                    frame.fill();
                }
                let (location, content) = self
                    .focused_frame()
                    .map(|f| {
                        let pane = f.focused_pane();
                        (pane.location.source, pane.view().source)
                    })
                    .ok_or_else(|| anyhow!("no frame"))?;
                self.sync_location(location, content);
                self.redraw();
                Ok(())
            }
            "write" => {
                let rid = match args.first() {
                    Some(path) => {
                        let rid = self.focused_resource()?;
                        if let Some(r) = self.resources.get_mut(rid) {
                            r.origin.path = PathBuf::from(path);
                        }
                        rid
                    }
                    None => self.focused_resource()?,
                };
                self.store_resource(rid)
            }
            "system" => self.execute_system(&args, inst),
            "transmit" => self.execute_transmit(&args),
            "" | "[-]" => Ok(()),
            other => {
                self.log(format!("unknown command: {other}"));
                Ok(())
            }
        }
    }

    /// Spawn a system command, sending the focused vertical range to its
    /// standard input.
    fn execute_transmit(&mut self, args: &[&str]) -> Result<()> {
        let program = args
            .first()
            .ok_or_else(|| anyhow!("transmit requires a command"))?;
        let rid = self.focused_resource()?;

        let payload = {
            let resource = self
                .resources
                .get(rid)
                .ok_or_else(|| anyhow!("resource is closed"))?;
            let (start, stop) = self
                .focused()
                .map(|rf| {
                    let (s, _, e) = rf.focus.0.snapshot();
                    (s.max(0) as usize, e.max(0) as usize)
                })
                .unwrap_or((0, 0));
            let stop = if stop > start { stop } else { resource.ln_count() };
            resource.serialize(&LineForm::default(), start, stop)
        };

        let mut command = std::process::Command::new(program);
        command.args(&args[1..]);
        command.stdin(std::process::Stdio::piped());
        command.stdout(std::process::Stdio::null());
        command.stderr(std::process::Stdio::null());

        let mut child = command
            .spawn()
            .with_context(|| format!("spawning {program}"))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("missing stdin pipe"))?;

        let handle = self.allocate_handle();
        let target = IoTarget(handle);
        // Buffer the serialized lines into bounded chunks for the writer.
        let bytes = payload.into_bytes();
        let chunks: Vec<Vec<u8>> = bytes.chunks(2048).map(|c| c.to_vec()).collect();
        self.io
            .write_from(target, Box::new(stdin), Box::new(chunks.into_iter()))?;
        self.io.process(target, child)?;

        self.log(format!("transmitting to: {}", args.join(" ")));
        Ok(())
    }

    /// Spawn a system command, inserting its output at the cursor.
    fn execute_system(&mut self, args: &[&str], inst: &prompt::Instruction) -> Result<()> {
        let program = args
            .first()
            .ok_or_else(|| anyhow!("system requires a command"))?;
        let rid = self.focused_resource()?;
        let (lo, co) = self
            .focused()
            .map(|rf| rf.coordinates())
            .unwrap_or((0, 0));

        let mut command = std::process::Command::new(program);
        command.args(&args[1..]);
        command.stdout(std::process::Stdio::piped());
        command.stderr(std::process::Stdio::null());
        command.stdin(std::process::Stdio::null());

        let mut child = command
            .spawn()
            .with_context(|| format!("spawning {program}"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("missing stdout pipe"))?;

        // Track the insertion point through interleaved edits.
        let handle = self.allocate_handle();
        let cursor_id = ObserverId(handle);
        if let Some(resource) = self.resources.get_mut(rid) {
            resource.attach_cursor(
                cursor_id,
                CursorPair::allocate(lo as isize, 0, co as isize, co as isize),
            );
        }

        let target = IoTarget(handle);
        self.io_routes.insert(
            handle,
            IoRoute {
                resource: rid,
                cursor: cursor_id,
                remainder: String::new(),
            },
        );
        self.io.read_into(target, Box::new(stdout))?;
        self.io.process(target, child)?;

        if let Some(rf) = self.focused_mut() {
            rf.annotate(format!("system-process: {}", inst.title()));
        }
        self.log(format!("dispatched: {}", args.join(" ")));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Background I/O
    // ------------------------------------------------------------------

    /// Drain completed I/O callbacks and run their effects. Each callback
    /// tolerates its target resource having changed or closed.
    pub fn drain_io(&mut self) {
        for completion in self.io.take() {
            match completion {
                Completion::Insertion {
                    target,
                    text,
                    finished,
                    ..
                } => self.io_insertion(target, &text, finished),
                Completion::Transmission { .. } => {}
                Completion::Exit { target, code, pid, .. } => {
                    self.log(format!("process {pid} exited with {code}"));
                    if let Some(route) = self.io_routes.get(&target.0) {
                        let rid = route.resource;
                        for frame in self.frames.iter_mut() {
                            for rf in frame.refractions_mut() {
                                if rf.source == rid {
                                    rf.annotate(format!("exit: {code}"));
                                }
                            }
                        }
                    }
                }
                Completion::Failure { target, error, .. } => {
                    self.log(format!("i/o failure: {error}"));
                    self.io_routes.remove(&target.0);
                }
            }
        }
    }

    fn io_insertion(&mut self, target: IoTarget, text: &str, finished: bool) {
        let Some(route) = self.io_routes.get(&target.0).cloned() else {
            // The refraction closed; the completion is a no-op.
            return;
        };
        let rid = route.resource;

        let splice_outcome = {
            let Some(resource) = self.resources.get_mut(rid) else {
                self.io_routes.remove(&target.0);
                return;
            };
            let Some(cursor) = resource.cursor(route.cursor).copied() else {
                self.io_routes.remove(&target.0);
                return;
            };
            let (lo, co) = cursor.coordinates();
            let lo = (lo.max(0) as usize).min(resource.ln_count());
            let co = co.max(0) as usize;

            let mut payload = route.remainder.clone();
            payload.push_str(text);
            let form = LineForm::default();
            resource.splice_text(&form, lo, co, &payload, 0)
        };

        match splice_outcome {
            Ok((_, _, remainder)) => {
                if let Some(r) = self.io_routes.get_mut(&target.0) {
                    r.remainder = remainder;
                }
                self.commit_resource(rid, false, false);
            }
            Err(e) => {
                self.log(format!("i/o insertion failed: {e}"));
            }
        }

        if finished {
            if let Some(resource) = self.resources.get_mut(rid) {
                resource.detach_cursor(route.cursor);
                resource.modifications.checkpoint();
            }
            self.io_routes.remove(&target.0);
        }
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    /// Queue a full redraw of the focused frame: borders, location
    /// headers, content, and any open prompts.
    pub fn redraw(&mut self) {
        let focus = self.focus;
        let Session {
            resources, frames, ..
        } = self;
        let Some(frame) = frames.get_mut(focus) else {
            return;
        };

        let borders = frame.render_borders();
        frame.deltas.extend(borders);

        for pane in frame.panes.iter_mut() {
            for rf in pane.content.iter_mut() {
                let Some(resource) = resources.get(rf.source) else {
                    continue;
                };
                rf.frame_visible = true;
                let whence = rf.image.line_offset.min(resource.ln_count());
                let instrs = rf.refresh(whence, resource.elements());
                rf.deltas.extend(instrs);
            }

            if let Some(resource) = resources.get(pane.location.source) {
                pane.location.frame_visible = true;
                let instrs = render_location(&mut pane.location, resource);
                pane.location.deltas.extend(instrs);
            }

            if pane.prompt_open {
                if let Some(resource) = resources.get(pane.prompt.source) {
                    pane.prompt.frame_visible = true;
                    let whence = pane.prompt.image.line_offset.min(resource.ln_count());
                    let instrs = pane.prompt.refresh(whence, resource.elements());
                    pane.prompt.deltas.extend(instrs);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Frame lifecycle
    // ------------------------------------------------------------------

    /// Release a frame, renumbering the remainder. The last frame is
    /// never released; sessions exit instead.
    pub fn release(&mut self, index: usize) {
        if self.frames.len() <= 1 || index >= self.frames.len() {
            return;
        }
        self.frames.remove(index);
        self.resequence();
        if self.focus >= self.frames.len() {
            self.focus = self.frames.len() - 1;
        }
        self.redraw();
    }

    /// Renumber frames after removals.
    fn resequence(&mut self) {
        for (i, frame) in self.frames.iter_mut().enumerate() {
            frame.index = i;
        }
    }

    /// Drain all pending display instructions of the focused frame.
    pub fn drain_deltas(&mut self) -> Vec<Instruction> {
        let Some(frame) = self.frames.get_mut(self.focus) else {
            return Vec::new();
        };
        let mut out = std::mem::take(&mut frame.deltas);
        for rf in frame.refractions_mut() {
            out.append(&mut rf.deltas);
        }
        out
    }

    /// Render cursor/range indicators onto the pane borders, restoring
    /// the cells the previous cycle's indicators overwrote.
    pub fn indicate(&mut self) -> Vec<Instruction> {
        let mut out = Vec::new();
        let border_style = Glyph::default().with_text(core_syntax::palette("application-border"));
        for prev in self.indicator_memory.drain(..) {
            out.push(Instruction::Rewrite {
                area: Area::new(prev.y, prev.x, 1, 1),
                cells: vec![Cell::lead(prev.restore.to_string(), border_style)],
            });
        }

        let status = match self.with_focused_view(|rf, resource| rf.v_status(resource)) {
            Ok(s) => s,
            Err(_) => return out,
        };
        let Some(frame) = self.frames.get(self.focus) else {
            return out;
        };

        let indicators = frame.model.scale_ipositions(
            status.area,
            status.cell(),
            status.line(),
            status.v_cell_offset,
            status.v_line_offset,
        );

        let style = Glyph::default().with_text(core_syntax::palette("teal"));
        for ind in &indicators {
            out.push(Instruction::Rewrite {
                area: Area::new(ind.y, ind.x, 1, 1),
                cells: vec![Cell::lead(ind.glyph.to_string(), style)],
            });
        }
        self.indicator_memory = indicators;

        out.extend(self.cursor_line(&status));
        out
    }

    /// Paint the styled cursor line: range underline plus the emphasized
    /// cursor cell, restoring the row the previous cycle overlaid.
    fn cursor_line(&mut self, status: &core_model::Status) -> Vec<Instruction> {
        let mut out = Vec::new();

        // Restore the previously overlaid row from the image.
        if let Some(prev) = self.cursor_memory.take() {
            let restored = self.with_focused_view(|rf, _| {
                let row = prev.top_offset.checked_sub(rf.area.top_offset)?;
                if prev.left_offset == rf.area.left_offset && row < rf.image.count() {
                    Some(rf.v_render(row..row + 1))
                } else {
                    None
                }
            });
            if let Ok(Some(instr)) = restored {
                out.push(instr);
            }
        }

        let rln = status.ln_cursor_offset as isize - status.v_line_offset as isize;
        if rln < 0 || rln >= status.area.lines as isize {
            return out;
        }

        let shape = match status.mode {
            ControlMode::Insert | ControlMode::Capture => core_model::CursorShape::Underline,
            ControlMode::Control => core_model::CursorShape::Block,
        };

        let produced = self.with_focused_view(|rf, resource| {
            let (lo, _) = rf.coordinates();
            let line = resource.sole(lo).ok()?;
            let phrase = rf.forms.compose(&line);
            let (cp_start, cp_pos, cp_stop) = rf.focus.1.snapshot();
            let horizontal = (
                cp_start.max(0) as usize,
                cp_pos.max(0) as usize,
                cp_stop.max(0) as usize,
            );
            Some(core_model::cursor_line_cells(
                &phrase,
                horizontal,
                shape,
                &core_model::CursorPalette::default(),
            ))
        });

        let Ok(Some(cells)) = produced else {
            return out;
        };

        // Clip to the visible horizontal window and pad to the span.
        let span = status.area.span;
        let offset = status.v_cell_offset;
        let mut row: Vec<Cell> = cells.into_iter().skip(offset).take(span).collect();
        while row.len() < span {
            row.push(Cell::blank(Glyph::default()));
        }

        let area = status.area.rows(rln as usize, 1);
        self.cursor_memory = Some(area);
        out.push(Instruction::Rewrite { area, cells: row });
        out
    }

    // ------------------------------------------------------------------
    // Transcript
    // ------------------------------------------------------------------

    /// Append lines to the transcript resource.
    pub fn log(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(target: "session.transcript", "{message}");
        let rid = self.transcript;
        if let Some(resource) = self.resources.get_mut(rid) {
            if let Some(store) = resource.elements_constant_mut() {
                store.extend_constant(message.lines().map(|l| Line::new(l, 0)));
            }
        }
        self.settle_views(rid);
    }

    // ------------------------------------------------------------------
    // Retention
    // ------------------------------------------------------------------

    /// Capture the session's frame configuration.
    pub fn snapshot(&self) -> SessionSnapshot {
        let frames = self
            .frames
            .iter()
            .map(|f| {
                let (v, d) = f.path_of(f.focus);
                let (_, layout) = f.model.configuration();
                FrameRecord {
                    id: f.title.clone(),
                    vertical: v,
                    division: d,
                    layout: layout.to_vec(),
                    stacks: f
                        .panes
                        .iter()
                        .map(|pane| {
                            pane.content
                                .iter()
                                .map(|rf| {
                                    let (lo, co) = rf.coordinates();
                                    match self.resources.get(rf.source) {
                                        Some(r) if r.origin.system == "file://" => Selection {
                                            path: Some(format!(
                                                "{}{}",
                                                r.origin.system,
                                                r.origin.path.display()
                                            )),
                                            positions: vec![rf.image.line_offset, lo, co],
                                        },
                                        _ => Selection::absent(),
                                    }
                                })
                                .collect()
                        })
                        .collect(),
                    levels: f.panes.iter().map(|p| p.depth().saturating_sub(1)).collect(),
                }
            })
            .collect();

        SessionSnapshot {
            title: "prism".to_string(),
            focused: self.focus,
            frames,
        }
    }

    /// Restore frames from a snapshot. Failures destroy the partially
    /// loaded frames and reinstate the default layout.
    pub fn restore(&mut self, text: &str) {
        match retention::structure_snapshot(text) {
            Ok(snapshot) => {
                self.frames.clear();
                for record in &snapshot.frames {
                    let paths: Vec<PathBuf> = record
                        .stacks
                        .iter()
                        .filter_map(|stack| stack.last())
                        .filter_map(|s| s.path.as_ref())
                        .map(|p| PathBuf::from(p.trim_start_matches("file://")))
                        .collect();
                    let index = self.allocate(&record.layout, &paths);

                    // Reapply retained cursor positions.
                    if let Some(frame) = self.frames.get_mut(index) {
                        for (pane, stack) in frame.panes.iter_mut().zip(&record.stacks) {
                            if let Some(selection) = stack.last() {
                                if selection.positions.len() >= 3 {
                                    let rf = pane.view_mut();
                                    rf.image.line_offset = selection.positions[0];
                                    rf.seek(selection.positions[1], selection.positions[2]);
                                }
                            }
                        }
                        frame.focus = frame
                            .model
                            .iterpanes()
                            .iter()
                            .position(|p| *p == (record.vertical, record.division))
                            .unwrap_or(0);
                    }
                }
                self.focus = snapshot.focused.min(self.frames.len().saturating_sub(1));
                if self.frames.is_empty() {
                    self.allocate(&[(1, 0)], &[]);
                }
            }
            Err(e) => {
                // Configuration failure: transcript and defaults.
                self.frames.clear();
                self.allocate(&[(1, 0)], &[]);
                self.log(format!("session restore failed: {e}"));
            }
        }
        self.redraw();
    }
}

/// Classify a filesystem path for location field rendering.
fn classify_fs(path: &str) -> location::PathKind {
    match std::fs::symlink_metadata(path) {
        Err(_) => location::PathKind::Missing,
        Ok(meta) => {
            if meta.file_type().is_symlink() {
                location::PathKind::Link
            } else if meta.is_dir() {
                location::PathKind::Directory
            } else if is_executable(&meta) {
                location::PathKind::Executable
            } else {
                location::PathKind::File
            }
        }
    }
}

#[cfg(unix)]
fn is_executable(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &std::fs::Metadata) -> bool {
    false
}

/// Render a location header: the path line composed through the
/// filesystem field classes.
fn render_location(rf: &mut Refraction, resource: &core_state::Resource) -> Vec<Instruction> {
    let path_text = resource
        .sole(0)
        .map(|l| l.content)
        .unwrap_or_default();

    // Paths inside session space render as plain data fields.
    let trimmed = path_text
        .strip_prefix("file://")
        .unwrap_or(path_text.as_str());
    let mut fields = vec![(core_syntax::FieldClass::Indentation, String::new())];
    fields.extend(location::structure_path(trimmed, &classify_fs));
    fields.push((core_syntax::FieldClass::TrailingWhitespace, String::new()));

    let phrase = rf.forms.compose_fields(&fields).shared();
    rf.image.clear();
    rf.image.suffix(vec![phrase]);
    rf.image.line_offset = 0;
    vec![rf.v_render(0..1)]
}

/// Distribute one applied record to every observing refraction of `rid`.
fn distribute(
    frames: &mut [Frame],
    focused_frame: usize,
    rid: ResourceId,
    record: &Record,
    storage: &core_state::Storage,
) {
    for (fi, frame) in frames.iter_mut().enumerate() {
        let visible = fi == focused_frame;
        for rf in frame.refractions_mut() {
            if rf.source != rid {
                continue;
            }
            record.track(rf);
            let instrs = rf.v_update(record, storage);
            if visible && rf.frame_visible {
                rf.deltas.extend(instrs);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_events::{ModMask, NamedKey};

    fn session() -> Session {
        let config = core_config::Config::default();
        let io = IoManager::allocate(|| {}).expect("io thread");
        let mut s = Session::new(&config, io, Area::new(0, 0, 24, 80));
        s.allocate(&[(1, 0)], &[]);
        s
    }

    fn focused_content(s: &Session) -> String {
        let rid = s.focused_resource().unwrap();
        let r = s.resources.get(rid).unwrap();
        r.select(0, r.ln_count())
            .into_iter()
            .map(|(_, l)| l.content)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn type_text(s: &mut Session, text: &str) {
        for c in text.chars() {
            s.dispatch_key(&Key::character(c));
        }
    }

    #[test]
    fn insert_mode_round_trip() {
        let mut s = session();
        // Enter insert mode and type.
        s.dispatch_key(&Key::character('i'));
        type_text(&mut s, "hello");
        assert_eq!(focused_content(&s), "hello");

        // Escape back to control.
        s.dispatch_key(&Key::named(NamedKey::Escape));
        let mode = s.focused().unwrap().control_mode;
        assert_eq!(mode, ControlMode::Control);
    }

    #[test]
    fn typing_collapses_for_undo() {
        let mut s = session();
        s.dispatch_key(&Key::character('i'));
        type_text(&mut s, "abc");
        s.dispatch_key(&Key::named(NamedKey::Escape));
        assert_eq!(focused_content(&s), "abc");

        s.dispatch_key(&Key::character('u'));
        assert_eq!(focused_content(&s), "");
    }

    #[test]
    fn line_break_and_join() {
        let mut s = session();
        s.dispatch_key(&Key::character('i'));
        type_text(&mut s, "foobar");
        s.dispatch_key(&Key::named(NamedKey::Escape));

        // Move to offset 3 and break the line.
        s.focused_mut().unwrap().seek(0, 3);
        s.dispatch_key(&Key::character('b'));
        assert_eq!(focused_content(&s), "foo\nbar");

        s.focused_mut().unwrap().seek(0, 0);
        s.dispatch_key(&Key::character('b').with(ModMask::SHIFT));
        assert_eq!(focused_content(&s), "foobar");
    }

    #[test]
    fn failed_operations_recover_to_control() {
        let mut s = session();
        s.dispatch_key(&Key::character('i'));
        // Force a failure by seeking far out and deleting forward.
        s.focused_mut().unwrap().seek(500, 0);
        s.dispatch_key(&Key::named(NamedKey::Delete));
        assert_eq!(s.focused().unwrap().control_mode, ControlMode::Control);
        // The transcript recorded the failure.
        let transcript = s.resources.get(s.transcript).unwrap();
        assert!(transcript.ln_count() > 0);
    }

    #[test]
    fn prompt_opens_executes_seek() {
        let mut s = session();
        s.dispatch_key(&Key::character('i'));
        type_text(&mut s, "a\nb\nc\nd\ne");
        s.dispatch_key(&Key::named(NamedKey::Escape));

        // Open the prompt and type a seek command.
        s.dispatch_key(&Key::named(NamedKey::Space).with(ModMask::CONTROL));
        assert!(s.focused_frame().unwrap().focused_pane().prompt_open);
        type_text(&mut s, "seek 3");
        s.dispatch_key(&Key::named(NamedKey::Return));

        assert!(!s.focused_frame().unwrap().focused_pane().prompt_open);
        let (lo, _) = s.focused().unwrap().coordinates();
        assert_eq!(lo, 2, "seek is one-based");
        assert_eq!(s.revisions.latest(), Some("seek 3"));
    }

    #[test]
    fn snapshot_round_trips_through_retention() {
        let mut s = session();
        let snap = s.snapshot();
        let text = retention::sequence_snapshot(&snap);
        s.restore(&text);
        assert_eq!(s.frames.len(), 1);
        assert!(!s.frames[0].panes.is_empty());
    }

    #[test]
    fn malformed_snapshot_reinstates_default_layout() {
        let mut s = session();
        s.restore("complete garbage\nwithout structure");
        assert_eq!(s.frames.len(), 1, "default layout reinstated");
        let transcript = s.resources.get(s.transcript).unwrap();
        let logged = transcript
            .select(0, transcript.ln_count())
            .into_iter()
            .map(|(_, l)| l.content)
            .collect::<Vec<_>>()
            .join("\n");
        assert!(logged.contains("restore failed"));
    }

    #[test]
    fn closed_resource_completions_are_noops() {
        let mut s = session();
        // A completion for an unknown target must not panic or mutate.
        let before = focused_content(&s);
        s.io_insertion(IoTarget(9999), "data", true);
        assert_eq!(focused_content(&s), before);
    }

    #[test]
    fn transcript_ignores_log_side_edits() {
        let mut s = session();
        s.log("one");
        s.log("two");
        let transcript = s.resources.get_mut(s.transcript).unwrap();
        let count = transcript.ln_count();
        assert_eq!(count, 2);

        // Log-side deletion is discarded by the constant store.
        transcript.delete_lines(0, count);
        transcript.commit();
        assert_eq!(s.resources.get(s.transcript).unwrap().ln_count(), 2);
    }
}
