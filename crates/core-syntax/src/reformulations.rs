//! Line reformulations: the bundle of codec conventions, line form,
//! tokenizer, and grapheme segmenter installed by a syntax type.
//!
//! Resources, refractions, and the renderer use this to convert a line
//! from one form into another: structured fields for navigation, and
//! phrases for display. Tokenizer failures degrade to a single
//! error-condition field rather than propagating.

use std::sync::Arc;

use tracing::warn;

use core_state::{Line, LineForm};
use core_text::phrase::{Glyph, Phrase, Segment};
use core_text::{graphemes, redirect_exceptions, unit_width, words};

use crate::fields::{Field, FieldClass};
use crate::profile::Profile;
use crate::theme::Theme;

/// The set of routines and descriptors for reading, writing, tokenizing,
/// formatting, and rendering a line of syntax.
#[derive(Debug, Clone)]
pub struct Reformulations {
    /// The syntax type name.
    pub lf_type: String,
    /// Glyph templates used to compose phrases from fields.
    pub lf_theme: Theme,
    /// The line boundary and indentation conventions.
    pub lf_lines: LineForm,
    /// The field isolation profile.
    pub lf_fields: Profile,
    /// The text encoding used when reading and writing resources.
    pub lf_encoding: String,
    /// Cells rendered per control character.
    pub ctlsize: usize,
    /// Cells rendered per tab and per indentation level.
    pub tabsize: usize,
}

impl Default for Reformulations {
    fn default() -> Self {
        Self {
            lf_type: "lambda".to_string(),
            lf_theme: Theme::default(),
            lf_lines: LineForm::default(),
            lf_fields: Profile::lambda(),
            lf_encoding: "utf-8".to_string(),
            ctlsize: 4,
            tabsize: 4,
        }
    }
}

impl Reformulations {
    pub fn new(lf_type: impl Into<String>, profile: Profile) -> Self {
        Self {
            lf_type: lf_type.into(),
            lf_fields: profile,
            ..Self::default()
        }
    }

    /// An empty phrase configured with the theme.
    pub fn lf_empty_phrase(&self) -> Arc<Phrase> {
        Phrase::empty(self.lf_theme.default_glyph()).shared()
    }

    /// Segment a field into the cell-count word stream.
    pub fn segmentation(&self, field: &str) -> Vec<(isize, String)> {
        words(graphemes(
            unit_width,
            field.chars(),
            self.ctlsize,
            self.tabsize,
        ))
        .collect()
    }

    /// Structure a line into typed fields: the indentation field, the
    /// tokenized content, and a trailing-whitespace field.
    pub fn ln_structure(&self, line: &Line) -> Vec<Field> {
        let mut out = Vec::new();

        let ind_class = if line.content.is_empty() {
            FieldClass::IndentationOnly
        } else {
            FieldClass::Indentation
        };
        out.push((ind_class, "\t".repeat(line.level as usize)));

        let trimmed = line.content.trim_end_matches(' ');
        let trailing = &line.content[trimmed.len()..];

        if !trimmed.is_empty() {
            let fields = self.lf_fields.structure(trimmed);
            let reassembled: String = fields.iter().map(|(_, t)| t.as_str()).collect();
            if reassembled == trimmed {
                out.extend(fields);
            } else {
                // Tokenizer failure: render the line as a sole error field.
                warn!(
                    target: "syntax.fields",
                    syntax = %self.lf_type,
                    length = trimmed.len(),
                    "tokenizer_failure"
                );
                out.push((FieldClass::ErrorCondition, trimmed.to_string()));
            }
        }

        out.push((FieldClass::TrailingWhitespace, trailing.to_string()));
        out
    }

    /// Special-case whitespace fields into stable redirect segments.
    fn control(&self, class: FieldClass, field: &str) -> Segment {
        let cf = self.lf_theme.glyph(class);
        let display: String = field
            .chars()
            .map(|c| {
                if c == '\t' {
                    " ".repeat(self.tabsize)
                } else {
                    c.to_string()
                }
            })
            .collect();
        let n = display.chars().count();

        match class {
            FieldClass::IndentationOnly if n > 0 => {
                let marked: String = display
                    .chars()
                    .take(n - 1)
                    .chain(std::iter::once('>'))
                    .collect();
                Segment::redirect(n, marked, cf, field)
            }
            FieldClass::TrailingWhitespace => Segment::redirect(n, "#".repeat(n), cf, field),
            _ => Segment::redirect(n, display, cf, field),
        }
    }

    /// Construct a phrase representing the structured line.
    pub fn compose(&self, line: &Line) -> Phrase {
        let sline = self.ln_structure(line);
        self.compose_fields(&sline)
    }

    /// Construct a phrase from already-structured fields.
    pub fn compose_fields(&self, sline: &[Field]) -> Phrase {
        let mut segments: Vec<Segment> = Vec::new();

        let last = sline.len().saturating_sub(1);
        for (i, (class, field)) in sline.iter().enumerate() {
            if i == 0 || i == last {
                // Indentation and trailing whitespace render as redirects.
                if !field.is_empty() {
                    segments.push(self.control(*class, field));
                } else if sline.len() == 1 {
                    segments.push(self.control(*class, field));
                }
                continue;
            }

            let glyph = self.glyph_for(*class);
            match glyph.codepoint {
                -1 => {
                    // Hidden field.
                    segments.push(Segment::redirect(0, "", glyph, field.as_str()));
                }
                cp if cp >= 0 => {
                    // Field represented by a substitute character.
                    let display = char::from_u32(cp as u32).unwrap_or('\u{FFFD}').to_string();
                    let cells: usize = self
                        .segmentation(&display)
                        .iter()
                        .map(|(c, _)| c.unsigned_abs())
                        .sum();
                    segments.push(Segment::redirect(cells, display, glyph, field.as_str()));
                }
                _ => {
                    let stream = self.segmentation(field);
                    let framed = stream
                        .into_iter()
                        .map(|(cells, text)| Segment::frame(glyph, cells, text));
                    segments.extend(redirect_exceptions(
                        framed,
                        self.lf_theme.obstruction,
                        self.lf_theme.representation,
                    ));
                }
            }
        }

        if segments.is_empty() {
            return Phrase::empty(self.lf_theme.default_glyph());
        }
        Phrase::new(segments)
    }

    fn glyph_for(&self, class: FieldClass) -> Glyph {
        self.lf_theme.glyph(class)
    }

    /// Interpret raw text as a structured line.
    pub fn ln_interpret(&self, text: &str) -> Line {
        self.lf_lines.interpret(text)
    }

    /// Format a line for storage.
    pub fn ln_sequence(&self, line: &Line) -> String {
        self.lf_lines.sequence(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forms() -> Reformulations {
        Reformulations::default()
    }

    #[test]
    fn structure_carries_indentation_and_trailing() {
        let lf = forms();
        let fields = lf.ln_structure(&Line::new("code  ", 2));
        assert_eq!(fields[0].0, FieldClass::Indentation);
        assert_eq!(fields[0].1, "\t\t");
        assert_eq!(fields.last().unwrap().0, FieldClass::TrailingWhitespace);
        assert_eq!(fields.last().unwrap().1, "  ");
    }

    #[test]
    fn indentation_only_class() {
        let lf = forms();
        let fields = lf.ln_structure(&Line::new("", 1));
        assert_eq!(fields[0].0, FieldClass::IndentationOnly);
    }

    #[test]
    fn compose_renders_indentation_cells() {
        let lf = forms();
        let phrase = lf.compose(&Line::new("x", 1));
        // One level of indentation occupies tabsize cells.
        assert_eq!(phrase.cell_count(), lf.tabsize + 1);
    }

    #[test]
    fn compose_marks_trailing_whitespace() {
        let lf = forms();
        let phrase = lf.compose(&Line::new("a  ", 0));
        let cells = phrase.render(&|c| c);
        let texts: Vec<&str> = cells.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "#", "#"]);
    }

    #[test]
    fn control_characters_redirect() {
        let lf = forms();
        let phrase = lf.compose(&Line::new("\u{1}", 0));
        let cells = phrase.render(&|c| c);
        let texts: Vec<&str> = cells.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["[", "0", "1", "]"]);
        assert_eq!(cells[0].style, lf.lf_theme.obstruction);
        assert_eq!(cells[1].style, lf.lf_theme.representation);
    }

    #[test]
    fn empty_line_composes_empty_phrase() {
        let lf = forms();
        let phrase = lf.compose(&Line::new("", 0));
        assert_eq!(phrase.cell_count(), 0);
    }

    #[test]
    fn phrase_text_reflects_source_content() {
        let lf = forms();
        let line = Line::new("fn main()", 1);
        let phrase = lf.compose(&line);
        assert_eq!(phrase.text(), format!("\t{}", line.content));
    }
}
