//! View-local phrase cache backing a display.
//!
//! The image holds the phrases currently reflected by a view together with a
//! parallel `whence` vector recording, per phrase, the seek position of the
//! view's horizontal cell offset. Controllers update `line_offset` and
//! `cell_offset` when scrolls or pans occur; every mutating operation here
//! maintains `phrases.len() == whence.len()`.

use std::ops::Range;
use std::sync::Arc;

use crate::phrase::{Measure, Phrase, ORIGIN};

/// Seek state for one phrase: the segment/codepoint position reaching the
/// image's cell offset and the unconsumed remainder.
pub type Whence = ((usize, usize), isize);

#[derive(Debug, Default, Clone)]
pub struct Image {
    /// The line offset the image currently reflects. Updated by the
    /// controller when scrolls occur.
    pub line_offset: usize,
    /// The cell offset the image currently reflects. Updated by the
    /// controller after pans.
    pub cell_offset: usize,
    phrases: Vec<Arc<Phrase>>,
    whence: Vec<Whence>,
}

impl Image {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of phrases currently present.
    pub fn count(&self) -> usize {
        debug_assert_eq!(self.phrases.len(), self.whence.len());
        self.phrases.len()
    }

    pub fn phrases(&self) -> &[Arc<Phrase>] {
        &self.phrases
    }

    pub fn whence(&self) -> &[Whence] {
        &self.whence
    }

    pub fn phrase(&self, index: usize) -> Option<&Arc<Phrase>> {
        self.phrases.get(index)
    }

    /// The range covering every phrase in the image.
    pub fn all(&self) -> Range<usize> {
        0..self.phrases.len()
    }

    /// Delete the phrases at and after `index`.
    pub fn truncate(&mut self, index: usize) {
        self.phrases.truncate(index);
        self.whence.truncate(index);
    }

    pub fn clear(&mut self) {
        self.phrases.clear();
        self.whence.clear();
    }

    fn clamp(&self, r: &Range<usize>) -> Range<usize> {
        r.start.min(self.phrases.len())..r.end.min(self.phrases.len())
    }

    /// Re-seek the whence entries of `larea` relative to their current
    /// positions by `offset` cells. The image's `cell_offset` must be
    /// updated independently.
    pub fn pan_relative(&mut self, larea: Range<usize>, offset: isize) {
        let larea = self.clamp(&larea);
        for i in larea {
            let (pos, re) = self.whence[i];
            self.whence[i] = self.phrases[i].seek(pos, offset - re, Measure::Cells);
        }
    }

    /// Re-seek the whence entries of `larea` from the beginning of each
    /// phrase to the absolute cell `offset`.
    pub fn pan_absolute(&mut self, larea: Range<usize>, offset: usize) {
        let larea = self.clamp(&larea);
        for i in larea {
            self.whence[i] = self.phrases[i].seek((0, 0), offset as isize, Measure::Cells);
        }
    }

    /// Replace the phrases of `larea`, reseeking their whence state to the
    /// image's cell offset. Returns the written range.
    pub fn update<I>(&mut self, larea: Range<usize>, phrases: I) -> Range<usize>
    where
        I: IntoIterator<Item = Arc<Phrase>>,
    {
        let larea = self.clamp(&larea);
        let replacement: Vec<Arc<Phrase>> = phrases.into_iter().collect();
        let whence: Vec<Whence> = replacement
            .iter()
            .map(|ph| ph.seek((0, 0), self.cell_offset as isize, Measure::Cells))
            .collect();
        let start = larea.start;
        let count = whence.len();
        self.phrases.splice(larea.clone(), replacement);
        self.whence.splice(larea, whence);
        start..start + count
    }

    /// Insert phrases at the start of the image.
    ///
    /// Returns the prepended range.
    pub fn prefix<I>(&mut self, phrases: I) -> Range<usize>
    where
        I: IntoIterator<Item = Arc<Phrase>>,
    {
        let added: Vec<Arc<Phrase>> = phrases.into_iter().collect();
        let count = added.len();
        self.phrases.splice(0..0, added);
        self.whence.splice(0..0, std::iter::repeat_n(ORIGIN, count));
        let larea = 0..count;
        if self.cell_offset != 0 {
            self.pan_absolute(larea.clone(), self.cell_offset);
        }
        larea
    }

    /// Append phrases at the end of the image.
    ///
    /// Returns the appended range.
    pub fn suffix<I>(&mut self, phrases: I) -> Range<usize>
    where
        I: IntoIterator<Item = Arc<Phrase>>,
    {
        let il = self.phrases.len();
        self.phrases.extend(phrases);
        let count = self.phrases.len() - il;
        self.whence.extend(std::iter::repeat_n(ORIGIN, count));
        let larea = il..il + count;
        if self.cell_offset != 0 {
            self.pan_absolute(larea.clone(), self.cell_offset);
        }
        larea
    }

    /// Remove `count` phrases at the image-relative `index`.
    ///
    /// Returns the actually deleted range.
    pub fn delete(&mut self, index: usize, count: usize) -> Range<usize> {
        let stop = self.phrases.len().min(index + count);
        let larea = index.min(stop)..stop;
        self.phrases.drain(larea.clone());
        self.whence.drain(larea.clone());
        larea
    }

    /// Insert phrases at `index`, displacing but not deleting surrounding
    /// entries. Returns the inserted range.
    pub fn insert<I>(&mut self, index: usize, phrases: I) -> Range<usize>
    where
        I: IntoIterator<Item = Arc<Phrase>>,
    {
        let index = index.min(self.phrases.len());
        let added: Vec<Arc<Phrase>> = phrases.into_iter().collect();
        let count = added.len();
        self.phrases.splice(index..index, added);
        self.whence
            .splice(index..index, std::iter::repeat_n(ORIGIN, count));
        let larea = index..index + count;
        if self.cell_offset != 0 {
            self.pan_absolute(larea.clone(), self.cell_offset);
        }
        larea
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phrase::{Glyph, Segment};

    fn ph(text: &str) -> Arc<Phrase> {
        let n = text.chars().count();
        Phrase::new(vec![Segment::words(n, text, Glyph::default())]).shared()
    }

    #[test]
    fn suffix_and_count() {
        let mut img = Image::new();
        img.suffix(vec![ph("a"), ph("b")]);
        assert_eq!(img.count(), 2);
        assert_eq!(img.whence().len(), 2);
    }

    #[test]
    fn prefix_preserves_order() {
        let mut img = Image::new();
        img.suffix(vec![ph("c")]);
        let r = img.prefix(vec![ph("a"), ph("b")]);
        assert_eq!(r, 0..2);
        let texts: Vec<String> = img.phrases().iter().map(|p| p.text()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn delete_clamps_to_image() {
        let mut img = Image::new();
        img.suffix(vec![ph("a"), ph("b"), ph("c")]);
        let r = img.delete(1, 10);
        assert_eq!(r, 1..3);
        assert_eq!(img.count(), 1);
    }

    #[test]
    fn insert_displaces() {
        let mut img = Image::new();
        img.suffix(vec![ph("a"), ph("d")]);
        let r = img.insert(1, vec![ph("b"), ph("c")]);
        assert_eq!(r, 1..3);
        let texts: Vec<String> = img.phrases().iter().map(|p| p.text()).collect();
        assert_eq!(texts, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn update_reseeks_to_cell_offset() {
        let mut img = Image::new();
        img.suffix(vec![ph("abcdef")]);
        img.cell_offset = 2;
        img.update(0..1, vec![ph("uvwxyz")]);
        let (pos, re) = img.whence()[0];
        assert_eq!(re, 0);
        assert_eq!(img.phrases()[0].tell(pos, Measure::Cells), 2);
    }

    #[test]
    fn pan_absolute_seeks_from_origin() {
        let mut img = Image::new();
        img.suffix(vec![ph("abcdef"), ph("ab")]);
        img.pan_absolute(0..2, 4);
        let (p0, _) = img.whence()[0];
        assert_eq!(img.phrases()[0].tell(p0, Measure::Cells), 4);
        // Short line: remainder reports the overflow.
        let (_, r1) = img.whence()[1];
        assert!(r1 > 0);
    }

    #[test]
    fn lengths_stay_parallel() {
        let mut img = Image::new();
        img.suffix(vec![ph("a"), ph("b"), ph("c"), ph("d")]);
        img.delete(0, 2);
        img.insert(1, vec![ph("x")]);
        img.prefix(vec![ph("y")]);
        img.truncate(3);
        assert_eq!(img.phrases().len(), img.whence().len());
    }
}
