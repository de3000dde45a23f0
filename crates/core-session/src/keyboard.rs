//! Default keyboard mappings.
//!
//! Three modes drive interpretation: control for navigation and
//! high-level manipulation, insert for character entry, and capture for
//! inserting the exact next keystroke. Bindings key off the stable key
//! identifier strings (`"[J]"`, `"[B][⇧]"`) and resolve to application
//! instructions named by `(category, path)`; unbound keys fall back to a
//! per-mode default.

use std::collections::HashMap;

use core_events::Key;
use core_model::ControlMode;

/// An application instruction selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub category: &'static str,
    pub path: &'static [&'static str],
}

impl Operation {
    pub const fn new(category: &'static str, path: &'static [&'static str]) -> Self {
        Self { category, path }
    }

    pub fn ineffective() -> Self {
        Operation::new("meta", &["ineffective"])
    }

    pub fn is(&self, category: &str, path: &[&str]) -> bool {
        self.category == category && self.path == path
    }
}

/// One mode's binding table.
#[derive(Debug, Default)]
pub struct Mode {
    bindings: HashMap<String, Operation>,
}

impl Mode {
    fn assign(&mut self, identifier: &str, category: &'static str, path: &'static [&'static str]) {
        self.bindings
            .insert(identifier.to_string(), Operation::new(category, path));
    }

    pub fn event(&self, identifier: &str) -> Option<Operation> {
        self.bindings.get(identifier).copied()
    }
}

/// The keyboard selection: mode tables plus the active mode.
#[derive(Debug)]
pub struct Keyboard {
    pub control: Mode,
    pub insert: Mode,
}

impl Default for Keyboard {
    fn default() -> Self {
        let mut control = Mode::default();
        let mut insert = Mode::default();

        // -- Control -----------------------------------------------------
        // Mode transitions.
        control.assign("[I]", "meta", &["transition", "insert", "cursor"]);
        control.assign("[I][\u{21E7}]", "meta", &["transition", "insert", "start-of-line"]);
        control.assign("[A]", "meta", &["transition", "insert", "after"]);
        control.assign("[A][\u{21E7}]", "meta", &["transition", "insert", "end-of-line"]);
        control.assign("[\u{2423}][\u{2303}]", "meta", &["prepare", "command"]);
        control.assign("[R][\u{2325}]", "meta", &["view", "refresh"]);
        control.assign("[\u{23CE}]", "meta", &["activate"]);

        // Vertical navigation.
        control.assign("[J]", "navigation", &["vertical", "forward", "unit"]);
        control.assign("[K]", "navigation", &["vertical", "backward", "unit"]);
        control.assign("[J][\u{21E7}]", "navigation", &["vertical", "stop"]);
        control.assign("[K][\u{21E7}]", "navigation", &["vertical", "start"]);
        control.assign("[J][\u{2303}]", "navigation", &["vertical", "void", "forward"]);
        control.assign("[K][\u{2303}]", "navigation", &["vertical", "void", "backward"]);
        control.assign("[DOWN]", "navigation", &["vertical", "forward", "unit"]);
        control.assign("[UP]", "navigation", &["vertical", "backward", "unit"]);
        control.assign("[E]", "navigation", &["vertical", "sections"]);
        control.assign("[E][\u{21E7}]", "navigation", &["vertical", "paging"]);
        control.assign("[PAGE-DOWN]", "navigation", &["view", "scroll", "forward"]);
        control.assign("[PAGE-UP]", "navigation", &["view", "scroll", "backward"]);
        control.assign("[G]", "navigation", &["session", "seek", "first"]);
        control.assign("[G][\u{21E7}]", "navigation", &["session", "seek", "last"]);

        // Horizontal navigation.
        control.assign("[F]", "navigation", &["horizontal", "forward"]);
        control.assign("[D]", "navigation", &["horizontal", "backward"]);
        control.assign("[RIGHT]", "navigation", &["horizontal", "forward"]);
        control.assign("[LEFT]", "navigation", &["horizontal", "backward"]);
        control.assign("[F][\u{21E7}]", "navigation", &["horizontal", "stop"]);
        control.assign("[D][\u{21E7}]", "navigation", &["horizontal", "start"]);
        control.assign("[HOME]", "navigation", &["horizontal", "start"]);
        control.assign("[END]", "navigation", &["horizontal", "stop"]);

        // Selection.
        control.assign("[H]", "navigation", &["vertical", "select", "line"]);
        control.assign("[L]", "navigation", &["vertical", "select", "indentation"]);
        control.assign(
            "[L][\u{21E7}]",
            "navigation",
            &["vertical", "select", "indentation", "level"],
        );

        // Deltas.
        control.assign("[B]", "delta", &["line", "break"]);
        control.assign("[B][\u{21E7}]", "delta", &["line", "join"]);
        control.assign("[O]", "delta", &["line", "open", "below"]);
        control.assign("[O][\u{21E7}]", "delta", &["line", "open", "above"]);
        control.assign("[X]", "delta", &["delete", "unit"]);
        control.assign("[X][\u{21E7}]", "delta", &["delete", "line"]);
        control.assign("[\u{21E5}]", "delta", &["indentation", "increase"]);
        control.assign("[\u{21E5}][\u{21E7}]", "delta", &["indentation", "decrease"]);
        control.assign("[U]", "delta", &["undo"]);
        control.assign("[U][\u{21E7}]", "delta", &["redo"]);

        // View focus and session scope.
        control.assign("[J][\u{2325}]", "view", &["next", "refraction"]);
        control.assign("[K][\u{2325}]", "view", &["previous", "refraction"]);
        control.assign("[P][\u{2325}]", "view", &["pan", "forward"]);
        control.assign("[Y][\u{2325}]", "view", &["pan", "backward"]);
        control.assign("[S][\u{2303}]", "session", &["resource", "store"]);
        control.assign("[C][\u{2303}]", "session", &["cancel"]);
        control.assign("[Q][\u{2303}]", "session", &["quit"]);
        control.assign("[W][\u{2303}]", "session", &["view", "close"]);
        control.assign("[N][\u{2303}]", "session", &["frame", "switch", "next"]);

        // -- Insert ------------------------------------------------------
        insert.assign("[ESCAPE]", "meta", &["transition", "control"]);
        insert.assign("[\u{23CE}]", "meta", &["activate"]);
        insert.assign("[\u{232B}]", "delta", &["delete", "backward"]);
        insert.assign("[\u{2326}]", "delta", &["delete", "forward"]);
        insert.assign("[\u{21E5}]", "delta", &["indentation", "increase"]);
        insert.assign("[V][\u{2303}]", "meta", &["transition", "capture"]);
        insert.assign("[UP]", "navigation", &["vertical", "backward", "unit"]);
        insert.assign("[DOWN]", "navigation", &["vertical", "forward", "unit"]);
        insert.assign("[LEFT]", "navigation", &["horizontal", "backward"]);
        insert.assign("[RIGHT]", "navigation", &["horizontal", "forward"]);
        insert.assign("[C][\u{2303}]", "meta", &["transition", "control"]);

        Self { control, insert }
    }
}

impl Keyboard {
    /// Interpret a key under the given mode.
    ///
    /// Unbound control keys are ineffective; unbound insert keys holding
    /// text insert it; capture mode inserts the exact key text.
    pub fn interpret(&self, mode: ControlMode, key: &Key) -> (Operation, Option<String>) {
        let identifier = key.identifier();
        match mode {
            ControlMode::Control => (
                self.control
                    .event(&identifier)
                    .unwrap_or_else(Operation::ineffective),
                None,
            ),
            ControlMode::Insert => match self.insert.event(&identifier) {
                Some(op) => (op, None),
                None => match key.text() {
                    Some(text) => (
                        Operation::new("delta", &["insert", "character"]),
                        Some(text),
                    ),
                    None => (Operation::ineffective(), None),
                },
            },
            ControlMode::Capture => match key.text() {
                Some(text) => (
                    Operation::new("delta", &["insert", "captured"]),
                    Some(text),
                ),
                None => (Operation::ineffective(), None),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_events::{ModMask, NamedKey};

    #[test]
    fn control_bindings_resolve() {
        let kb = Keyboard::default();
        let (op, text) = kb.interpret(ControlMode::Control, &Key::character('j'));
        assert!(op.is("navigation", &["vertical", "forward", "unit"]));
        assert!(text.is_none());
    }

    #[test]
    fn shifted_binding_differs() {
        let kb = Keyboard::default();
        let key = Key::character('b').with(ModMask::SHIFT);
        let (op, _) = kb.interpret(ControlMode::Control, &key);
        assert!(op.is("delta", &["line", "join"]));
    }

    #[test]
    fn unbound_control_keys_ineffective() {
        let kb = Keyboard::default();
        let (op, _) = kb.interpret(ControlMode::Control, &Key::character('z'));
        assert!(op.is("meta", &["ineffective"]));
    }

    #[test]
    fn insert_mode_inserts_text() {
        let kb = Keyboard::default();
        let (op, text) = kb.interpret(ControlMode::Insert, &Key::character('z'));
        assert!(op.is("delta", &["insert", "character"]));
        assert_eq!(text.as_deref(), Some("z"));
    }

    #[test]
    fn insert_mode_escape_transitions() {
        let kb = Keyboard::default();
        let (op, _) = kb.interpret(ControlMode::Insert, &Key::named(NamedKey::Escape));
        assert!(op.is("meta", &["transition", "control"]));
    }

    #[test]
    fn capture_inserts_exact_text() {
        let kb = Keyboard::default();
        let (op, text) = kb.interpret(ControlMode::Capture, &Key::named(NamedKey::Tab));
        assert!(op.is("delta", &["insert", "captured"]));
        assert_eq!(text.as_deref(), Some("\t"));
    }
}
