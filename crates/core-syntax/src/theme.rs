//! Field theming: the palette and the class-to-glyph table.

use std::collections::HashMap;

use core_text::Glyph;

use crate::fields::FieldClass;

/// Named palette colors.
pub fn palette(name: &str) -> u32 {
    match name {
        "terminal-default" => 0xF0F0F0,
        "application-border" => 0x606060,
        "black" => 0x000000,
        "white" => 0xFFFFFF,
        "red" => 0xED7973,
        "green" => 0x84D084,
        "yellow" => 0xF5F59E,
        "blue" => 0x8CAADC,
        "magenta" => 0xCBA3EB,
        "cyan" => 0x108787,
        "gray" => 0xBBBBBB,
        "dark" => 0x808080,
        "orange" => 0xFFA500,
        "pink" => 0xFFC0CB,
        "teal" => 0x209090,
        "purple" => 0xC38FF4,
        "absolute-red" => 0xFF0000,
        "absolute-blue" => 0x0000FF,
        _ => 0xF0F0F0,
    }
}

/// Resolved glyph templates per field class.
#[derive(Debug, Clone)]
pub struct Theme {
    entries: HashMap<FieldClass, Glyph>,
    default: Glyph,
    /// Style for obstruction markers around control characters.
    pub obstruction: Glyph,
    /// Style for the hexadecimal representation of control characters.
    pub representation: Glyph,
}

impl Default for Theme {
    fn default() -> Self {
        let base = Glyph::default();
        let color = |name: &str| base.with_text(palette(name));

        use FieldClass::*;
        let table: &[(FieldClass, &str)] = &[
            (ExclusionStart, "dark"),
            (ExclusionStop, "dark"),
            (ExclusionDelimit, "teal"),
            (ExclusionSpace, "teal"),
            (ExclusionWords, "teal"),
            (ExclusionFragment, "teal"),
            (LiteralStart, "gray"),
            (LiteralStop, "gray"),
            (LiteralDelimit, "gray"),
            (LiteralSpace, "gray"),
            (LiteralWords, "gray"),
            (LiteralFragment, "gray"),
            (InclusionProjectword, "pink"),
            (InclusionHighlight, "yellow"),
            (InclusionKeyword, "blue"),
            (InclusionCoreword, "purple"),
            (InclusionMetaword, "orange"),
            (InclusionIdentifier, "terminal-default"),
            (InclusionFragment, "dark"),
            (InclusionStartEnclosure, "terminal-default"),
            (InclusionStopEnclosure, "terminal-default"),
            (InclusionRouter, "terminal-default"),
            (InclusionTerminator, "terminal-default"),
            (InclusionOperation, "terminal-default"),
            (InclusionSpace, "terminal-default"),
            (InclusionStopExclusion, "dark"),
            (InclusionStopLiteral, "dark"),
            (ErrorCondition, "absolute-red"),
            (Indentation, "terminal-default"),
            (IndentationOnly, "dark"),
            (TrailingWhitespace, "absolute-red"),
            (FieldAnnotationStart, "absolute-blue"),
            (FieldAnnotationTitle, "green"),
            (FieldAnnotationStop, "absolute-blue"),
            (FieldAnnotationSeparator, "terminal-default"),
            (FilesystemRoot, "orange"),
            (Warning, "yellow"),
            (Directory, "blue"),
            (Relatives, "blue"),
            (Executable, "green"),
            (Data, "white"),
            (DotFile, "gray"),
            (FileNotFound, "absolute-red"),
            (Void, "absolute-red"),
            (Link, "purple"),
            (Device, "orange"),
            (Socket, "orange"),
            (Pipe, "orange"),
            (PathSeparator, "dark"),
            (PathDirectory, "gray"),
            (PathLink, "purple"),
            (PathEmpty, "terminal-default"),
        ];

        let entries = table.iter().map(|(fc, name)| (*fc, color(name))).collect();

        Self {
            entries,
            default: color("terminal-default"),
            obstruction: base.with_text(0x5050DF),
            representation: base.with_text(0x777777),
        }
    }
}

impl Theme {
    /// Look up the glyph for a field class, falling back to the default
    /// entry for unrecognized classes.
    pub fn glyph(&self, class: FieldClass) -> Glyph {
        self.entries.get(&class).copied().unwrap_or(self.default)
    }

    pub fn default_glyph(&self) -> Glyph {
        self.default
    }

    /// Override an entry; used by configuration-loaded themes.
    pub fn set(&mut self, class: FieldClass, glyph: Glyph) {
        self.entries.insert(class, glyph);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_classes_resolve() {
        let t = Theme::default();
        assert_eq!(
            t.glyph(FieldClass::InclusionKeyword).textcolor,
            palette("blue")
        );
    }

    #[test]
    fn unknown_classes_fall_back() {
        let t = Theme::default();
        assert_eq!(t.glyph(FieldClass::Default), t.default_glyph());
    }

    #[test]
    fn overrides_apply() {
        let mut t = Theme::default();
        let g = Glyph::default().with_text(0x123456);
        t.set(FieldClass::Warning, g);
        assert_eq!(t.glyph(FieldClass::Warning), g);
    }
}
