//! Inline cursor rendering.
//!
//! Produces the styled cursor line for a phrase: the horizontal range is
//! underlined, and the cursor position cell is emphasized according to its
//! relation to the range. The session overlays the produced cells after
//! draining view deltas and restores them on the next cycle through the
//! device's screen buffer.

use core_text::phrase::{Cell, Glyph, Measure, Phrase};

/// Relation of a position to a `[start, stop)` range.
///
/// Distinguishes the first and last units so their indicators can differ
/// from interior positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRelation {
    Before,
    OnFirst,
    Within,
    OnLast,
    After,
}

pub fn relation(start: usize, stop: usize, position: usize) -> RangeRelation {
    if position < start {
        RangeRelation::Before
    } else if position >= stop {
        RangeRelation::After
    } else if position == start {
        RangeRelation::OnFirst
    } else if position + 1 == stop {
        RangeRelation::OnLast
    } else {
        RangeRelation::Within
    }
}

/// Cursor emphasis colors by range relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorPalette {
    pub clear: u32,
    pub start_exclusive: u32,
    pub start_inclusive: u32,
    pub offset_active: u32,
    pub stop_inclusive: u32,
    pub stop_exclusive: u32,
    pub range_line: u32,
}

impl Default for CursorPalette {
    fn default() -> Self {
        Self {
            clear: 0x00D0_D0D0,
            start_exclusive: 0x00C3_8FF4,
            start_inclusive: 0x0084_D084,
            offset_active: 0x00F0_F0F0,
            stop_inclusive: 0x00ED_7973,
            stop_exclusive: 0x00CB_A3EB,
            range_line: 0x0066_CACA,
        }
    }
}

impl CursorPalette {
    fn emphasis(&self, positions: (usize, usize, usize), empty: bool) -> u32 {
        if empty {
            return self.clear;
        }
        match relation(positions.0, positions.2, positions.1) {
            RangeRelation::Before => self.start_exclusive,
            RangeRelation::OnFirst => self.start_inclusive,
            RangeRelation::Within => self.offset_active,
            RangeRelation::OnLast => self.stop_inclusive,
            RangeRelation::After => self.stop_exclusive,
        }
    }
}

/// Whether the cursor is rendered as a block or an underline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorShape {
    Block,
    Underline,
}

fn cell_span(phrase: &Phrase, cp: usize) -> usize {
    let (pos, _) = phrase.seek((0, 0), cp as isize, Measure::Codepoints);
    phrase.tell(pos, Measure::Cells)
}

/// Render the cursor line for a phrase.
///
/// `horizontal` is the codepoint `(start, position, stop)` triple of the
/// cursor. The range is underlined (suppressed for underline cursors so
/// insert mode does not decorate the whole range), and the cursor's
/// character unit is emphasized by swapping or recoloring its cells.
pub fn cursor_line_cells(
    phrase: &Phrase,
    horizontal: (usize, usize, usize),
    shape: CursorShape,
    palette: &CursorPalette,
) -> Vec<Cell> {
    // Normalize an inverted range.
    let (start, position, stop) = horizontal;
    let (start, stop) = if start > stop {
        (stop, start)
    } else {
        (start, stop)
    };

    let mut cells = phrase.render(&|c| c);
    let empty = phrase.code_count() == 0;

    let range_start = cell_span(phrase, start);
    let range_stop = cell_span(phrase, stop);

    if shape == CursorShape::Block {
        for cell in cells.iter_mut().take(range_stop).skip(range_start) {
            cell.style = cell.style.underlined();
        }
    }

    // Locate the cursor's character unit span in cells.
    let (upos, _) = phrase.seek((0, 0), position as isize, Measure::Codepoints);
    let upos = phrase.afirst(upos);
    let cstart = phrase.tell(upos, Measure::Cells);
    let (unext, _) = phrase.seek(upos, 1, Measure::Units);
    let cstop = phrase.tell(unext, Measure::Cells).max(cstart + 1);

    let color = palette.emphasis((start, position, stop), empty);
    for i in cstart..cstop {
        match cells.get_mut(i) {
            Some(cell) => match shape {
                CursorShape::Block => {
                    // Swap text onto the cell color for a filled cursor.
                    let text = cell.style.textcolor;
                    cell.style = cell.style.with_cell(color).with_text(
                        if color == palette.offset_active {
                            cell.style.cellcolor
                        } else {
                            text
                        },
                    );
                }
                CursorShape::Underline => {
                    cell.style = cell.style.underlined().with_text(color);
                }
            },
            None => {
                // Cursor resting past the line end: emit a filled blank.
                cells.push(Cell::blank(Glyph::default().with_cell(color)));
            }
        }
    }

    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_text::phrase::Segment;

    fn phrase_of(text: &str) -> Phrase {
        let n = text.chars().count();
        Phrase::new(vec![Segment::words(n, text, Glyph::default())])
    }

    #[test]
    fn relation_classification() {
        assert_eq!(relation(2, 5, 0), RangeRelation::Before);
        assert_eq!(relation(2, 5, 2), RangeRelation::OnFirst);
        assert_eq!(relation(2, 5, 3), RangeRelation::Within);
        assert_eq!(relation(2, 5, 4), RangeRelation::OnLast);
        assert_eq!(relation(2, 5, 5), RangeRelation::After);
    }

    #[test]
    fn cursor_cell_emphasized() {
        let p = phrase_of("abcdef");
        let palette = CursorPalette::default();
        let cells = cursor_line_cells(&p, (1, 3, 5), CursorShape::Block, &palette);
        assert_eq!(cells.len(), 6);
        // The cursor cell carries the active emphasis as its background.
        assert_eq!(cells[3].style.cellcolor, palette.offset_active);
        // Range cells are underlined.
        assert!(cells[2].style.underline);
        assert!(!cells[0].style.underline);
    }

    #[test]
    fn underline_shape_skips_range_decoration() {
        let p = phrase_of("abcdef");
        let palette = CursorPalette::default();
        let cells = cursor_line_cells(&p, (0, 2, 4), CursorShape::Underline, &palette);
        assert!(!cells[1].style.underline, "range is not decorated");
        assert!(cells[2].style.underline, "cursor is underlined");
    }

    #[test]
    fn cursor_past_line_end_emits_blank() {
        let p = phrase_of("ab");
        let palette = CursorPalette::default();
        let cells = cursor_line_cells(&p, (0, 2, 2), CursorShape::Block, &palette);
        assert_eq!(cells.len(), 3);
        assert_eq!(cells[2].text, " ");
    }

    #[test]
    fn inverted_range_normalized() {
        let p = phrase_of("abcdef");
        let palette = CursorPalette::default();
        let cells = cursor_line_cells(&p, (5, 3, 1), CursorShape::Block, &palette);
        assert!(cells[2].style.underline);
    }

    #[test]
    fn wide_unit_cursor_covers_all_cells() {
        let p = Phrase::new(vec![
            Segment::words(1, "a", Glyph::default()),
            Segment::unit(2, "\u{6F22}", Glyph::default()),
            Segment::words(1, "b", Glyph::default()),
        ]);
        let palette = CursorPalette::default();
        let cells = cursor_line_cells(&p, (0, 1, 4), CursorShape::Block, &palette);
        // Both cells of the wide unit carry the cursor emphasis.
        assert_eq!(cells[1].style.cellcolor, palette.offset_active);
        assert_eq!(cells[2].style.cellcolor, palette.offset_active);
    }
}
