//! Line records and the canonical interchange encoding.
//!
//! Lines are stored structurally: indentation level, content, and optional
//! opaque extension metadata. The historical single-string form placed a
//! four-codepoint header before the content (`chr(level)` followed by a
//! three-codepoint big-endian extension length in 7-bit digits); that layout
//! is preserved here as the interchange codec so serialized stores remain
//! readable, while in-memory delta positions address content codepoints
//! directly.

use std::fmt;

/// Codepoints occupied by the interchange header: one level codepoint and
/// three extension-size codepoints.
pub const HEADER_CODEPOINTS: usize = 4;

/// Largest extension length expressible by the three 7-bit digits.
pub const EXTENSION_LIMIT: usize = (1 << 21) - 1;

#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct Line {
    /// Indentation units.
    pub level: u8,
    /// The line's text, excluding indentation and termination.
    pub content: String,
    /// Optional opaque metadata carried with the line.
    pub extension: Option<Box<str>>,
}

impl Line {
    pub fn new(content: impl Into<String>, level: u8) -> Self {
        Self {
            level,
            content: content.into(),
            extension: None,
        }
    }

    pub fn with_extension(mut self, extension: impl Into<Box<str>>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Content length in codepoints.
    pub fn ln_length(&self) -> usize {
        self.content.chars().count()
    }

    /// Whether the line has no content and no indentation.
    pub fn ln_void(&self) -> bool {
        self.content.is_empty() && self.level == 0
    }

    /// Construct the interchange codepoint representation.
    pub fn encode(&self) -> String {
        let ext = self.extension.as_deref().unwrap_or("");
        let lxs = ext.chars().count().min(EXTENSION_LIMIT);
        let mut out = String::with_capacity(4 + self.content.len() + ext.len());
        out.push(char::from_u32(self.level as u32).unwrap_or('\u{0}'));
        out.push(char::from_u32(((lxs >> 14) & 0x7F) as u32).unwrap_or('\u{0}'));
        out.push(char::from_u32(((lxs >> 7) & 0x7F) as u32).unwrap_or('\u{0}'));
        out.push(char::from_u32((lxs & 0x7F) as u32).unwrap_or('\u{0}'));
        out.push_str(&self.content);
        out.push_str(ext);
        out
    }

    /// Structure an interchange representation back into a line.
    ///
    /// Strings shorter than the header decode as an empty line; header
    /// digits outside the 7-bit range are masked.
    pub fn decode(encoded: &str) -> Self {
        let mut chars = encoded.chars();
        let level = match chars.next() {
            Some(c) => (c as u32).min(u8::MAX as u32) as u8,
            None => return Line::default(),
        };
        let d0 = chars.next().map(|c| (c as u32 as usize) & 0x7F).unwrap_or(0);
        let d1 = chars.next().map(|c| (c as u32 as usize) & 0x7F).unwrap_or(0);
        let d2 = chars.next().map(|c| (c as u32 as usize) & 0x7F).unwrap_or(0);
        let lxs = (d0 << 14) | (d1 << 7) | d2;

        let rest: Vec<char> = chars.collect();
        let content_len = rest.len().saturating_sub(lxs);
        let content: String = rest[..content_len].iter().collect();
        let extension: String = rest[content_len..].iter().collect();

        Self {
            level,
            content,
            extension: if extension.is_empty() {
                None
            } else {
                Some(extension.into())
            },
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for _ in 0..self.level {
            f.write_str("\t")?;
        }
        f.write_str(&self.content)
    }
}

/// Line boundary and indentation conventions used when splitting and
/// joining text for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineForm {
    pub termination: String,
    pub indentation: String,
}

impl Default for LineForm {
    fn default() -> Self {
        Self {
            termination: "\n".to_string(),
            indentation: "\t".to_string(),
        }
    }
}

impl LineForm {
    /// Identify the indentation level and remaining content of raw text.
    pub fn level<'a>(&self, text: &'a str) -> (u8, &'a str) {
        let ic = &self.indentation;
        let mut level: u8 = 0;
        let mut rest = text;
        while !ic.is_empty() && rest.starts_with(ic.as_str()) && level < u8::MAX {
            level += 1;
            rest = &rest[ic.len()..];
        }
        (level, rest)
    }

    /// Codepoints of a trailing partial termination sequence, if any.
    ///
    /// A no-op for single-codepoint terminations; multi-codepoint
    /// terminations (CRLF) report a dangling prefix so stream splicing can
    /// defer the boundary to the next read.
    pub fn measure_partial_termination(&self, text: &str) -> usize {
        let term: Vec<char> = self.termination.chars().collect();
        if term.len() < 2 {
            return 0;
        }
        for take in (1..term.len()).rev() {
            let prefix: String = term[..take].iter().collect();
            if text.ends_with(&prefix) {
                return take;
            }
        }
        0
    }

    /// Format a line for storage: indentation, content, termination.
    pub fn sequence(&self, line: &Line) -> String {
        let mut out = String::new();
        for _ in 0..line.level {
            out.push_str(&self.indentation);
        }
        out.push_str(&line.content);
        out.push_str(&self.termination);
        out
    }

    /// Interpret raw text as a structured line.
    pub fn interpret(&self, text: &str) -> Line {
        let (level, content) = self.level(text);
        Line::new(content, level)
    }
}
