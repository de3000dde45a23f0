//! Styled phrase segments and coordinate translation.
//!
//! A `Phrase` is the horizontally segmented, styled representation of one
//! logical text line. Its segments come in three kinds: `Words` (a run of
//! character units sharing one cell rate), `Unit` (a sole character unit
//! composed of a codepoint expression), and `Redirect` (a unit whose display
//! text is remapped, used for control characters and indentation).
//!
//! Phrases expose three isomorphic coordinate systems: codepoints, character
//! units, and cells. The per-segment measurements backing the translations
//! are computed at construction; iteration afterwards is read-only, so
//! callers share phrases as `Arc<Phrase>`.

use std::sync::Arc;

/// Styling template applied to a phrase segment.
///
/// `codepoint` controls field presentation when composing redirects:
/// `-2` requests normal processing, `-1` hides the field entirely, and a
/// non-negative value substitutes the identified character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Glyph {
    pub codepoint: i32,
    pub textcolor: u32,
    pub cellcolor: u32,
    pub underline: bool,
    pub bold: bool,
    pub italic: bool,
}

impl Default for Glyph {
    fn default() -> Self {
        Self {
            codepoint: -2,
            textcolor: 0x00F0_F0F0,
            cellcolor: 0x0000_0000,
            underline: false,
            bold: false,
            italic: false,
        }
    }
}

impl Glyph {
    pub fn with_text(self, textcolor: u32) -> Self {
        Self { textcolor, ..self }
    }
    pub fn with_cell(self, cellcolor: u32) -> Self {
        Self { cellcolor, ..self }
    }
    pub fn with_codepoint(self, codepoint: i32) -> Self {
        Self { codepoint, ..self }
    }
    pub fn underlined(self) -> Self {
        Self {
            underline: true,
            ..self
        }
    }
}

/// One display cell. Lead cells carry the unit text; continuation cells of
/// wide units carry an empty string and a non-zero window index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub text: String,
    pub window: u16,
    pub style: Glyph,
}

impl Cell {
    pub fn lead(text: impl Into<String>, style: Glyph) -> Self {
        Self {
            text: text.into(),
            window: 0,
            style,
        }
    }

    pub fn continuation(window: u16, style: Glyph) -> Self {
        Self {
            text: String::new(),
            window,
            style,
        }
    }

    pub fn blank(style: Glyph) -> Self {
        Cell::lead(" ", style)
    }
}

/// Coordinate system selector for `seek`/`tell`/`point` translations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    Codepoints,
    Units,
    Cells,
}

fn cp_len(s: &str) -> usize {
    s.chars().count()
}

fn cp_byte(s: &str, cp: usize) -> usize {
    s.char_indices()
        .nth(cp)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Slice by codepoint offsets, clamping to the string's bounds.
pub fn cp_slice(s: &str, start: usize, stop: usize) -> &str {
    let b0 = cp_byte(s, start);
    let b1 = cp_byte(s, stop.max(start));
    &s[b0..b1]
}

/// A phrase segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Uniform cell-rate run of character units.
    Words {
        cells: usize,
        text: String,
        style: Glyph,
    },
    /// A sole character unit composed from a codepoint expression.
    Unit {
        cells: usize,
        text: String,
        style: Glyph,
    },
    /// A unit whose displayed text differs from its source text.
    Redirect {
        cells: usize,
        display: String,
        style: Glyph,
        source: String,
    },
}

impl Segment {
    pub fn words(cells: usize, text: impl Into<String>, style: Glyph) -> Self {
        Segment::Words {
            cells,
            text: text.into(),
            style,
        }
    }

    pub fn unit(cells: usize, text: impl Into<String>, style: Glyph) -> Self {
        Segment::Unit {
            cells,
            text: text.into(),
            style,
        }
    }

    pub fn redirect(
        cells: usize,
        display: impl Into<String>,
        style: Glyph,
        source: impl Into<String>,
    ) -> Self {
        Segment::Redirect {
            cells,
            display: display.into(),
            style,
            source: source.into(),
        }
    }

    /// Select the segment kind for a `words` stream entry. Negative cell
    /// counts isolate character units.
    pub fn frame(style: Glyph, cells: isize, text: String) -> Self {
        if cells < 0 {
            Segment::Unit {
                cells: (-cells) as usize,
                text,
                style,
            }
        } else {
            Segment::Words {
                cells: cells as usize,
                text,
                style,
            }
        }
    }

    /// The coordinate-bearing text. Redirects translate against their
    /// source, not their display.
    pub fn text(&self) -> &str {
        match self {
            Segment::Words { text, .. } | Segment::Unit { text, .. } => text,
            Segment::Redirect { source, .. } => source,
        }
    }

    pub fn style(&self) -> Glyph {
        match self {
            Segment::Words { style, .. }
            | Segment::Unit { style, .. }
            | Segment::Redirect { style, .. } => *style,
        }
    }

    pub fn cell_count(&self) -> usize {
        match self {
            Segment::Words { cells, .. }
            | Segment::Unit { cells, .. }
            | Segment::Redirect { cells, .. } => *cells,
        }
    }

    /// Codepoints per character unit: one for `Words`, the full codepoint
    /// length for `Unit` and `Redirect`.
    pub fn unit_size(&self) -> usize {
        match self {
            Segment::Words { .. } => 1,
            _ => cp_len(self.text()),
        }
    }

    pub fn code_count(&self) -> usize {
        cp_len(self.text())
    }

    pub fn unit_count(&self) -> usize {
        self.code_count() / self.unit_size().max(1)
    }

    /// Cells required to display one character unit.
    pub fn cell_rate(&self) -> usize {
        self.cell_count() / self.unit_count().max(1)
    }

    pub fn count(&self, m: Measure) -> usize {
        match m {
            Measure::Codepoints => self.code_count(),
            Measure::Units => self.unit_count(),
            Measure::Cells => self.cell_count(),
        }
    }

    /// Translate a segment-relative codepoint offset into the measure space.
    pub fn offset(&self, m: Measure, cp: usize) -> usize {
        match m {
            Measure::Codepoints => cp,
            Measure::Units => cp / self.unit_size().max(1),
            Measure::Cells => (cp / self.unit_size().max(1)) * self.cell_rate(),
        }
    }

    /// Translate a measure-space offset back into `(codepoint, overflow)`.
    pub fn point(&self, m: Measure, off: usize) -> (usize, isize) {
        match m {
            Measure::Codepoints => {
                let n = self.code_count();
                if off < n {
                    (off, 0)
                } else {
                    (n, (off - n) as isize)
                }
            }
            Measure::Units => {
                let uc = self.unit_count();
                if off < 1 {
                    (0, off as isize)
                } else if off < uc {
                    (off, 0)
                } else {
                    (self.code_count(), (off - uc) as isize)
                }
            }
            Measure::Cells => {
                let rate = self.cell_rate().max(1);
                (off / rate, (off % rate) as isize)
            }
        }
    }

    /// Split at a segment-relative codepoint offset, preserving the style.
    pub fn split(&self, cp: usize) -> (Segment, Segment) {
        match self {
            Segment::Words { text, style, .. } => {
                let former = cp_slice(text, 0, cp).to_string();
                let latter = cp_slice(text, cp, cp_len(text)).to_string();
                let rate = self.cell_rate();
                (
                    Segment::Words {
                        cells: cp_len(&former) * rate,
                        text: former,
                        style: *style,
                    },
                    Segment::Words {
                        cells: cp_len(&latter) * rate,
                        text: latter,
                        style: *style,
                    },
                )
            }
            // Units and redirects never split; the boundary lands on one
            // side whole with an empty counterpart.
            _ => {
                let style = self.style();
                let empty = Segment::Unit {
                    cells: 0,
                    text: String::new(),
                    style,
                };
                if cp < self.code_count() {
                    (empty, self.clone())
                } else {
                    (self.clone(), empty)
                }
            }
        }
    }

    /// Produce the concrete cells for this segment.
    pub fn render(&self, define: &dyn Fn(char) -> char) -> Vec<Cell> {
        let mut out = Vec::with_capacity(self.cell_count());
        match self {
            Segment::Words { text, style, .. } => {
                let rate = self.cell_rate();
                for t in text.chars() {
                    let mapped = define(t);
                    for i in 0..rate {
                        if i == 0 {
                            out.push(Cell::lead(mapped.to_string(), *style));
                        } else {
                            out.push(Cell::continuation(i as u16, *style));
                        }
                    }
                }
            }
            Segment::Unit { text, style, .. } => {
                let mapped: String = text.chars().map(define).collect();
                for i in 0..self.cell_rate() {
                    if i == 0 {
                        out.push(Cell::lead(mapped.clone(), *style));
                    } else {
                        out.push(Cell::continuation(i as u16, *style));
                    }
                }
            }
            Segment::Redirect { display, style, .. } => {
                // Each display character occupies one cell.
                for t in display.chars() {
                    out.push(Cell::lead(define(t).to_string(), *style));
                }
            }
        }
        out
    }
}

/// An immutable sequence of segments with coordinate translation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Phrase {
    segments: Vec<Segment>,
}

/// The first address of any phrase: segment zero, codepoint zero, no
/// remainder.
pub const ORIGIN: ((usize, usize), isize) = ((0, 0), 0);

impl Phrase {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn from_words<I: IntoIterator<Item = Segment>>(words: I) -> Self {
        Self {
            segments: words.into_iter().collect(),
        }
    }

    /// Construct from `(style, words-stream)` pairs as produced by the
    /// grapheme segmentation.
    pub fn from_segmentation<I>(qwords: I) -> Self
    where
        I: IntoIterator<Item = (Glyph, Vec<(isize, String)>)>,
    {
        let mut segments = Vec::new();
        for (style, stream) in qwords {
            for (cells, text) in stream {
                segments.push(Segment::frame(style, cells, text));
            }
        }
        Self { segments }
    }

    /// A phrase holding a single empty word carrying `style`.
    pub fn empty(style: Glyph) -> Self {
        Self {
            segments: vec![Segment::words(0, "", style)],
        }
    }

    pub fn shared(self) -> Arc<Phrase> {
        Arc::new(self)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment(&self, i: usize) -> Option<&Segment> {
        self.segments.get(i)
    }

    /// The text content of the phrase. May differ from what is sent to the
    /// display in redirect cases.
    pub fn text(&self) -> String {
        self.segments.iter().map(|w| w.text()).collect()
    }

    pub fn cell_count(&self) -> usize {
        self.segments.iter().map(|w| w.cell_count()).sum()
    }

    pub fn unit_count(&self) -> usize {
        self.segments.iter().map(|w| w.unit_count()).sum()
    }

    pub fn code_count(&self) -> usize {
        self.segments.iter().map(|w| w.code_count()).sum()
    }

    pub fn count(&self, m: Measure) -> usize {
        self.segments.iter().map(|w| w.count(m)).sum()
    }

    /// Find the segment and codepoint offset for the measure-space
    /// `offset` relative to `whence`. Returns the position and the
    /// unconsumed remainder (zero when the offset landed inside the
    /// phrase).
    pub fn seek(
        &self,
        whence: (usize, usize),
        offset: isize,
        m: Measure,
    ) -> ((usize, usize), isize) {
        if offset == 0 || self.segments.is_empty() {
            return (whence, offset);
        }

        let (wordi, chari) = whence;
        let fword = &self.segments[wordi.min(self.segments.len() - 1)];
        let ui = fword.offset(m, chari) as isize;

        // Normalize the remainder to be relative to the beginning or end of
        // the starting segment so the scan always subtracts whole segments.
        let forward = offset > 0;
        let (mut re, lswitch): (isize, isize) = if forward {
            (offset + ui, 0)
        } else {
            (-offset + (fword.offset(m, fword.code_count()) as isize - ui), -1)
        };

        let n = self.segments.len() as isize;
        let step: isize = if forward { 1 } else { -1 };
        let mut idx = wordi as isize;

        let (word, ll) = loop {
            if idx < 0 || idx >= n {
                // Offset exceeded bounds; report the edge and the remainder.
                return if forward {
                    let last = self.segments.len() - 1;
                    ((last, self.segments[last].code_count()), re)
                } else {
                    ((0, 0), re)
                };
            }
            let word = &self.segments[idx as usize];
            let ll = word.count(m) as isize;
            if re <= ll {
                break (word, ll);
            }
            re -= ll;
            idx += step;
        };

        let local = (re + lswitch * ll).unsigned_abs();
        let (ci, r) = word.point(m, local);
        ((idx as usize, ci), -r)
    }

    /// Identify the absolute measure-space offset of `position`.
    pub fn tell(&self, position: (usize, usize), m: Measure) -> usize {
        if self.segments.is_empty() {
            return 0;
        }
        let (wi, ci) = position;
        let offset = self.segments[wi.min(self.segments.len() - 1)].offset(m, ci);
        offset
            + self.segments[..wi.min(self.segments.len())]
                .iter()
                .map(|w| w.count(m))
                .sum::<usize>()
    }

    /// Align the position on the next segment with real codepoint content.
    pub fn areal(&self, position: (usize, usize)) -> (usize, usize) {
        let (mut wi, mut ci) = position;
        loop {
            match self.segments.get(wi) {
                Some(w) if ci >= w.code_count() => {
                    wi += 1;
                    ci = 0;
                }
                Some(_) => return (wi, ci),
                None => {
                    let last = self.segments.len().saturating_sub(1);
                    return (
                        last,
                        self.segments.get(last).map(|w| w.code_count()).unwrap_or(0),
                    );
                }
            }
        }
    }

    /// Align to the beginning of the following segment when resting at the
    /// end of the current one.
    pub fn afirst(&self, position: (usize, usize)) -> (usize, usize) {
        let (wi, ci) = position;
        if wi + 1 >= self.segments.len() {
            return position;
        }
        if ci < self.segments[wi].code_count() {
            return position;
        }
        (wi + 1, 0)
    }

    /// Align to the end of the preceding segment when resting at the start
    /// of the current one.
    pub fn alast(&self, position: (usize, usize)) -> (usize, usize) {
        let (wi, ci) = position;
        if wi < 1 || ci > 0 {
            position
        } else {
            (wi - 1, self.segments[wi - 1].code_count())
        }
    }

    /// Split the phrase at `whence`, preserving styles on both sides.
    pub fn split(&self, whence: (usize, usize)) -> (Phrase, Phrase) {
        if self.segments.is_empty() {
            return (Phrase::default(), Phrase::default());
        }
        let (wordi, codei) = whence;
        let wordi = wordi.min(self.segments.len() - 1);
        let (former, latter) = self.segments[wordi].split(codei);

        let mut head: Vec<Segment> = self.segments[..wordi].to_vec();
        head.push(former);
        let mut tail = vec![latter];
        tail.extend_from_slice(&self.segments[wordi + 1..]);

        (Phrase::new(head), Phrase::new(tail))
    }

    /// Extract the subphrase between two seek positions, optionally
    /// restyling the selected words.
    pub fn subphrase(
        &self,
        start: (usize, usize),
        stop: (usize, usize),
        adjust: impl Fn(Glyph) -> Glyph,
    ) -> Phrase {
        let mut out = Vec::new();
        let (start_i, char_i) = start;
        let (stop_i, schar_i) = stop;

        if start_i == stop_i {
            if let Some(word) = self.segments.get(start_i) {
                let text = cp_slice(word.text(), char_i, schar_i).to_string();
                let rate = word.cell_rate();
                out.push(Segment::words(
                    cp_len(&text) * rate,
                    text,
                    adjust(word.style()),
                ));
            }
        } else {
            if let Some(word) = self.segments.get(start_i) {
                let text = cp_slice(word.text(), char_i, word.code_count()).to_string();
                if !text.is_empty() {
                    let rate = word.cell_rate();
                    out.push(Segment::words(
                        cp_len(&text) * rate,
                        text,
                        adjust(word.style()),
                    ));
                }
            }
            out.extend_from_slice(
                &self.segments[(start_i + 1).min(self.segments.len())..stop_i.min(self.segments.len())],
            );
            if let Some(word) = self.segments.get(stop_i) {
                let text = cp_slice(word.text(), 0, schar_i).to_string();
                if !text.is_empty() {
                    let rate = word.cell_rate();
                    out.push(Segment::words(
                        cp_len(&text) * rate,
                        text,
                        adjust(word.style()),
                    ));
                }
            }
        }
        Phrase::new(out)
    }

    /// Merge adjacent words sharing a style into single segments.
    pub fn combine(&self) -> Phrase {
        let mut out: Vec<Segment> = Vec::with_capacity(self.segments.len());
        for seg in &self.segments {
            match (out.last_mut(), seg) {
                (
                    Some(Segment::Words { cells, text, style }),
                    Segment::Words {
                        cells: c2,
                        text: t2,
                        style: s2,
                    },
                ) if *style == *s2 => {
                    *cells += c2;
                    text.push_str(t2);
                }
                _ => out.push(seg.clone()),
            }
        }
        Phrase::new(out)
    }

    /// Create a new phrase placing `self` between each phrase in `phrases`.
    pub fn join(&self, phrases: &[Phrase]) -> Phrase {
        if phrases.is_empty() {
            return Phrase::default();
        }
        let mut segments = Vec::new();
        for (i, p) in phrases.iter().enumerate() {
            if i > 0 {
                segments.extend_from_slice(&self.segments);
            }
            segments.extend_from_slice(&p.segments);
        }
        Phrase::new(segments)
    }

    /// Produce the cells representing the whole phrase.
    pub fn render(&self, define: &dyn Fn(char) -> char) -> Vec<Cell> {
        let mut out = Vec::with_capacity(self.cell_count());
        for word in &self.segments {
            out.extend(word.render(define));
        }
        out
    }
}

/// Wrap control and low-ASCII units with obstruction markers so their visual
/// representation is stable: `\x01` renders as `[01]` where the brackets use
/// the obstruction style and the digits the representation style.
pub fn redirect_exceptions<I>(
    words: I,
    obstruction: Glyph,
    representation: Glyph,
) -> Vec<Segment>
where
    I: IntoIterator<Item = Segment>,
{
    let mut out = Vec::new();
    for seg in words {
        if let Segment::Unit { text, .. } = &seg {
            let mut chars = text.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                let o = c as u32;
                if o < 32 {
                    let d = format!("{o:02x}");
                    out.push(Segment::redirect(1, "[", obstruction, ""));
                    out.push(Segment::redirect(
                        d.chars().count(),
                        d,
                        representation,
                        text.clone(),
                    ));
                    out.push(Segment::redirect(1, "]", obstruction, ""));
                    continue;
                }
            }
        }
        out.push(seg);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grapheme::{graphemes, unit_width, words};

    fn style() -> Glyph {
        Glyph::default()
    }

    fn phrase_of(text: &str) -> Phrase {
        let stream: Vec<(isize, String)> =
            words(graphemes(unit_width, text.chars(), 4, 8)).collect();
        Phrase::from_segmentation(vec![(style(), stream)])
    }

    #[test]
    fn counts_ascii() {
        let p = phrase_of("hello");
        assert_eq!(p.code_count(), 5);
        assert_eq!(p.unit_count(), 5);
        assert_eq!(p.cell_count(), 5);
    }

    #[test]
    fn counts_wide() {
        let p = phrase_of("a\u{6F22}b");
        assert_eq!(p.code_count(), 3);
        assert_eq!(p.unit_count(), 3);
        assert_eq!(p.cell_count(), 4);
    }

    #[test]
    fn seek_tell_codepoint_isomorphism() {
        let p = phrase_of("ab\u{6F22}\u{5B57}cd");
        for c in 0..=p.code_count() {
            let (pos, re) = p.seek((0, 0), c as isize, Measure::Codepoints);
            assert_eq!(re, 0, "offset {c} should land inside");
            assert_eq!(p.tell(pos, Measure::Codepoints), c);
        }
    }

    #[test]
    fn seek_tell_cell_isomorphism() {
        let p = phrase_of("ab\u{6F22}\u{5B57}cd");
        // Cell offsets on unit boundaries round-trip.
        for (cp, cell) in [(0usize, 0usize), (1, 1), (2, 2), (3, 4), (4, 6), (5, 7)] {
            let (pos, _) = p.seek((0, 0), cell as isize, Measure::Cells);
            assert_eq!(p.tell(pos, Measure::Cells), cell);
            assert_eq!(p.tell(pos, Measure::Codepoints), cp);
        }
    }

    #[test]
    fn seek_backward() {
        let p = phrase_of("abcdef");
        let (end, _) = p.seek((0, 0), 6, Measure::Codepoints);
        let (back, re) = p.seek(end, -4, Measure::Codepoints);
        assert_eq!(re, 0);
        assert_eq!(p.tell(back, Measure::Codepoints), 2);
    }

    #[test]
    fn seek_overflow_reports_remainder() {
        let p = phrase_of("abc");
        let (pos, re) = p.seek((0, 0), 10, Measure::Codepoints);
        assert_eq!(pos, (p.len() - 1, p.segments().last().unwrap().code_count()));
        assert!(re > 0);
    }

    #[test]
    fn split_preserves_content() {
        let p = phrase_of("foobar");
        let (pos, _) = p.seek((0, 0), 3, Measure::Codepoints);
        let (a, b) = p.split(pos);
        assert_eq!(a.text(), "foo");
        assert_eq!(b.text(), "bar");
    }

    #[test]
    fn unit_is_indivisible() {
        let s = "\u{1F3F4}\u{200D}\u{2620}\u{FE0F}";
        let p = phrase_of(&format!("a{s}b"));
        // Unit occupies a sole segment between two single-char words.
        assert_eq!(p.len(), 3);
        assert_eq!(p.unit_count(), 3);
        let seg = &p.segments()[1];
        let (l, r) = seg.split(1);
        assert_eq!(l.code_count(), 0);
        assert_eq!(r.text(), s);
    }

    #[test]
    fn redirect_exceptions_control_char() {
        let p = phrase_of("\u{1}");
        let obstruction = style().with_text(0x5050DF);
        let representation = style().with_text(0x777777);
        let wrapped = Phrase::new(redirect_exceptions(
            p.segments().to_vec(),
            obstruction,
            representation,
        ));
        let cells = wrapped.render(&|c| c);
        let texts: Vec<&str> = cells.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["[", "0", "1", "]"]);
        assert_eq!(cells[0].style, obstruction);
        assert_eq!(cells[1].style, representation);
        assert_eq!(cells[2].style, representation);
        assert_eq!(cells[3].style, obstruction);
    }

    #[test]
    fn combine_merges_same_style_runs() {
        let st = style();
        let p = Phrase::new(vec![
            Segment::words(2, "ab", st),
            Segment::words(2, "cd", st),
            Segment::words(1, "e", st.with_text(1)),
        ]);
        let c = p.combine();
        assert_eq!(c.len(), 2);
        assert_eq!(c.segments()[0].text(), "abcd");
    }

    #[test]
    fn wide_render_emits_continuations() {
        let p = phrase_of("\u{6F22}");
        let cells = p.render(&|c| c);
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].text, "\u{6F22}");
        assert_eq!(cells[1].text, "");
        assert_eq!(cells[1].window, 1);
    }
}
