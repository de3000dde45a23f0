//! Device event types and key identifiers.
//!
//! Keys are normalized into `KeyToken`s and formatted as stable identifier
//! strings, `"[A][⇧⌃]"`, consumed by the keyboard binding tables. The
//! identifier syntax is part of the binding contract: a bracketed key name
//! followed by an optional bracketed, sorted modifier group.

use std::fmt;

bitflags::bitflags! {
    /// Key modifier mask.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ModMask: u8 {
        const SHIFT   = 1;
        const CONTROL = 2;
        const META    = 4;
        const SYSTEM  = 8;
    }
}

impl ModMask {
    /// The modifier symbols in sorted codepoint order.
    pub fn symbols(&self) -> String {
        // Sorted by codepoint: ⌃ (0x2303), ⌘ (0x2318), ⌥ (0x2325), ⇧ (0x21E7).
        let mut syms: Vec<char> = Vec::new();
        if self.contains(ModMask::SHIFT) {
            syms.push('\u{21E7}');
        }
        if self.contains(ModMask::CONTROL) {
            syms.push('\u{2303}');
        }
        if self.contains(ModMask::SYSTEM) {
            syms.push('\u{2318}');
        }
        if self.contains(ModMask::META) {
            syms.push('\u{2325}');
        }
        syms.sort_unstable();
        syms.into_iter().collect()
    }
}

/// Named non-character keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Return,
    Escape,
    Backspace,
    Delete,
    Tab,
    Space,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Function(u8),
}

impl NamedKey {
    pub fn name(&self) -> String {
        match self {
            NamedKey::Return => "\u{23CE}".to_string(),
            NamedKey::Escape => "ESCAPE".to_string(),
            NamedKey::Backspace => "\u{232B}".to_string(),
            NamedKey::Delete => "\u{2326}".to_string(),
            NamedKey::Tab => "\u{21E5}".to_string(),
            NamedKey::Space => "\u{2423}".to_string(),
            NamedKey::Up => "UP".to_string(),
            NamedKey::Down => "DOWN".to_string(),
            NamedKey::Left => "LEFT".to_string(),
            NamedKey::Right => "RIGHT".to_string(),
            NamedKey::Home => "HOME".to_string(),
            NamedKey::End => "END".to_string(),
            NamedKey::PageUp => "PAGE-UP".to_string(),
            NamedKey::PageDown => "PAGE-DOWN".to_string(),
            NamedKey::Insert => "INSERT".to_string(),
            NamedKey::Function(n) => format!("F{n}"),
        }
    }
}

/// Logical key identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyToken {
    Character(char),
    Named(NamedKey),
}

/// A normalized keystroke: token plus modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
    pub token: KeyToken,
    pub mods: ModMask,
}

impl Key {
    pub fn character(c: char) -> Self {
        Self {
            token: KeyToken::Character(c),
            mods: ModMask::empty(),
        }
    }

    pub fn named(k: NamedKey) -> Self {
        Self {
            token: KeyToken::Named(k),
            mods: ModMask::empty(),
        }
    }

    pub fn with(mut self, mods: ModMask) -> Self {
        self.mods |= mods;
        self
    }

    /// The stable identifier consumed by the binding tables.
    ///
    /// Characters are uppercased so `a` and `⇧a` share a key name and are
    /// distinguished by the modifier group.
    pub fn identifier(&self) -> String {
        let mut out = String::new();
        out.push('[');
        match self.token {
            KeyToken::Character(c) => {
                for u in c.to_uppercase() {
                    out.push(u);
                }
            }
            KeyToken::Named(n) => out.push_str(&n.name()),
        }
        out.push(']');

        if !self.mods.is_empty() {
            out.push('[');
            out.push_str(&self.mods.symbols());
            out.push(']');
        }
        out
    }

    /// The literal text a key inserts in capture contexts, if any.
    pub fn text(&self) -> Option<String> {
        match self.token {
            KeyToken::Character(c) if !self.mods.intersects(ModMask::CONTROL | ModMask::META) => {
                Some(c.to_string())
            }
            KeyToken::Named(NamedKey::Space) => Some(" ".to_string()),
            KeyToken::Named(NamedKey::Tab) => Some("\t".to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier())
    }
}

/// Events surfaced by the terminal device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Key(Key),
    /// Committed text, already NFC normalized by the device layer.
    Text(String),
    Resize { lines: usize, span: usize },
    /// Bracketed paste payload.
    Paste(String),
    FocusGained,
    FocusLost,
    /// The background I/O thread signalled pending transfers.
    Wakeup,
    Interrupt,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_plain_character() {
        assert_eq!(Key::character('a').identifier(), "[A]");
    }

    #[test]
    fn identifier_with_modifiers() {
        let k = Key::character('a').with(ModMask::SHIFT | ModMask::CONTROL);
        let id = k.identifier();
        assert!(id.starts_with("[A]["));
        assert!(id.contains('\u{21E7}'));
        assert!(id.contains('\u{2303}'));
        // Modifier symbols are sorted for table stability.
        let k2 = Key::character('a').with(ModMask::CONTROL | ModMask::SHIFT);
        assert_eq!(id, k2.identifier());
    }

    #[test]
    fn identifier_named_keys() {
        assert_eq!(Key::named(NamedKey::Return).identifier(), "[\u{23CE}]");
        assert_eq!(Key::named(NamedKey::Function(2)).identifier(), "[F2]");
    }

    #[test]
    fn text_extraction() {
        assert_eq!(Key::character('x').text(), Some("x".to_string()));
        assert_eq!(Key::character('x').with(ModMask::CONTROL).text(), None);
        assert_eq!(Key::named(NamedKey::Space).text(), Some(" ".to_string()));
        assert_eq!(Key::named(NamedKey::Return).text(), None);
    }
}
