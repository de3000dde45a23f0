//! Coordinate isomorphism properties for phrases.

use core_text::phrase::{Glyph, Measure, Phrase};
use core_text::{graphemes, unit_width, words};
use proptest::prelude::*;

fn phrase_of(text: &str) -> Phrase {
    let stream: Vec<(isize, String)> = words(graphemes(unit_width, text.chars(), 4, 8)).collect();
    Phrase::from_segmentation(vec![(Glyph::default(), stream)])
}

/// Mixed-width content: ASCII, CJK, combining marks, an emoji sequence.
fn content() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            "[a-z]{1,4}",
            "[\u{4E00}-\u{4E10}]{1,2}",
            Just("e\u{0301}".to_string()),
            Just("\u{1F3F4}\u{200D}\u{2620}\u{FE0F}".to_string()),
        ],
        0..6,
    )
    .prop_map(|parts| parts.concat())
}

proptest! {
    /// For any in-bounds codepoint offset, `tell(seek(origin, c))`
    /// returns `c`.
    #[test]
    fn codepoint_seek_tell_round_trip(text in content()) {
        let p = phrase_of(&text);
        for c in 0..=p.code_count() {
            let (pos, re) = p.seek((0, 0), c as isize, Measure::Codepoints);
            prop_assert_eq!(re, 0, "offset {} should land inside", c);
            prop_assert_eq!(p.tell(pos, Measure::Codepoints), c);
        }
    }

    /// Unit offsets round-trip identically.
    #[test]
    fn unit_seek_tell_round_trip(text in content()) {
        let p = phrase_of(&text);
        for u in 0..=p.unit_count() {
            let (pos, re) = p.seek((0, 0), u as isize, Measure::Units);
            prop_assert_eq!(re, 0);
            prop_assert_eq!(p.tell(pos, Measure::Units), u);
        }
    }

    /// Cell offsets on unit boundaries round-trip; interior cells of wide
    /// units report their overflow instead.
    #[test]
    fn cell_seek_tell_round_trip(text in content()) {
        let p = phrase_of(&text);
        // Walk the unit boundaries and collect their cell offsets.
        let mut cell = 0usize;
        let mut boundary_cells = vec![0usize];
        let mut pos = (0, 0);
        for _ in 0..p.unit_count() {
            let (next, re) = p.seek(pos, 1, Measure::Units);
            prop_assert_eq!(re, 0);
            cell = p.tell(next, Measure::Cells);
            boundary_cells.push(cell);
            pos = next;
        }
        prop_assert_eq!(cell, p.cell_count());

        for c in boundary_cells {
            let (pos, re) = p.seek((0, 0), c as isize, Measure::Cells);
            prop_assert_eq!(re, 0);
            prop_assert_eq!(p.tell(pos, Measure::Cells), c);
        }
    }

    /// Splitting at any codepoint offset preserves the text.
    #[test]
    fn split_preserves_text(text in content(), at in 0usize..40) {
        let p = phrase_of(&text);
        let at = at.min(p.code_count());
        let (pos, _) = p.seek((0, 0), at as isize, Measure::Codepoints);
        let (a, b) = p.split(pos);
        let mut joined = a.text();
        joined.push_str(&b.text());
        prop_assert_eq!(joined, p.text());
    }

    /// The cell count equals the rendered cell vector's length.
    #[test]
    fn render_matches_cell_count(text in content()) {
        let p = phrase_of(&text);
        prop_assert_eq!(p.render(&|c| c).len(), p.cell_count());
    }
}
