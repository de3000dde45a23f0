//! Cursor position state relative to a range.
//!
//! A position is the mutable triple `(datum, offset, magnitude)`: an origin,
//! a cursor relative to the origin, and a range length. No constraints are
//! enforced by the arithmetic itself; coherency is the caller's judgement.
//! The load-bearing contract is reference-space adjustment: `insert`,
//! `delete`, and `changed` preserve the absolute position `get()` under
//! edits that do not remove the indexed unit, and snap to the edit's end
//! when they do.

/// Relation of the offset to the datum/magnitude range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Before,
    Within,
    After,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    /// The absolute reference position; the start.
    pub datum: isize,
    /// The actual position relative to the datum; current is datum+offset.
    pub offset: isize,
    /// The size of the range relative to the datum; stop is datum+magnitude.
    pub magnitude: isize,
}

impl Position {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn minimum(&self) -> isize {
        self.datum
    }

    pub fn maximum(&self) -> isize {
        self.datum + self.magnitude
    }

    /// The absolute position.
    pub fn get(&self) -> isize {
        self.datum + self.offset
    }

    /// Set the absolute position, recalculating the offset.
    ///
    /// Returns the change applied to the offset.
    pub fn set(&mut self, position: isize) -> isize {
        let new = position - self.datum;
        let change = self.offset - new;
        self.offset = new;
        change
    }

    pub fn configure(&mut self, datum: isize, magnitude: isize, offset: isize) {
        self.datum = datum;
        self.magnitude = magnitude;
        self.offset = offset;
    }

    /// Apply minimum and maximum limits to the absolute values.
    pub fn limit(&mut self, minimum: isize, maximum: isize) {
        let (start, offset, stop) = self.snapshot();
        self.restore((
            start.clamp(minimum, maximum),
            offset.clamp(minimum, maximum),
            stop.clamp(minimum, maximum),
        ));
    }

    /// Constrain the offset to the bounds of the magnitude.
    ///
    /// Returns the change in position: positive when the magnitude was
    /// exceeded, negative when the minimum was.
    pub fn constrain(&mut self) -> isize {
        let o = self.offset;
        if o > self.magnitude {
            self.offset = self.magnitude;
        } else if o < 0 {
            self.offset = 0;
        }
        o - self.offset
    }

    /// The absolute `(start, position, stop)` triple.
    pub fn snapshot(&self) -> (isize, isize, isize) {
        let start = self.datum;
        (start, start + self.offset, start + self.magnitude)
    }

    pub fn restore(&mut self, snapshot: (isize, isize, isize)) {
        self.datum = snapshot.0;
        self.offset = snapshot.1 - snapshot.0;
        self.magnitude = snapshot.2 - snapshot.0;
    }

    /// Update the offset by the given quantity.
    pub fn update(&mut self, quantity: isize) {
        self.offset += quantity;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Zero the offset and magnitude, keeping the datum.
    pub fn zero(&mut self) {
        self.magnitude = 0;
        self.offset = 0;
    }

    /// Move the position relatively (`perspective == 0`), relative to the
    /// beginning (`> 0`), or relative to the end (`< 0`).
    pub fn move_to(&mut self, location: isize, perspective: isize) -> isize {
        if perspective == 0 {
            self.offset += location;
            return location;
        }

        let mut offset = if perspective > 0 { 0 } else { self.magnitude };
        offset += location * perspective.signum();
        let change = self.offset - offset;
        self.offset = offset;
        change
    }

    /// Move the origin to the offset and zero the magnitude.
    pub fn collapse(&mut self) -> isize {
        let o = self.offset;
        self.datum += o;
        self.offset = 0;
        self.magnitude = 0;
        o
    }

    /// Relocate the datum to the offset when the offset escapes the range.
    pub fn normalize(&mut self) -> isize {
        if self.offset >= self.magnitude || self.offset < 0 {
            let o = self.offset;
            self.datum += o;
            self.magnitude = 0;
            self.offset = 0;
            return o;
        }
        0
    }

    /// Reposition the datum such that the offset equals `offset`, keeping
    /// the magnitude. Returns the change to the datum.
    pub fn reposition(&mut self, offset: isize) -> isize {
        let delta = self.offset - offset;
        self.datum += delta;
        self.offset = offset;
        delta
    }

    /// Adjust the datum to the offset's position, maintaining the stop.
    pub fn start(&mut self) {
        let change = self.reposition(0);
        self.magnitude -= change;
    }

    /// Place the offset in the middle of the range.
    pub fn bisect(&mut self) {
        self.offset = self.magnitude / 2;
    }

    /// Adjust the magnitude to the offset's position.
    pub fn halt(&mut self, delta: isize) {
        self.magnitude = self.offset + delta;
    }

    /// Invert the direction of the position.
    pub fn invert(&mut self) {
        self.datum += self.magnitude;
        self.offset = -self.offset;
        self.magnitude = -self.magnitude;
    }

    /// Send the datum forward or backward by whole magnitudes.
    pub fn page(&mut self, quantity: isize) {
        self.datum += self.magnitude * quantity;
    }

    /// Increase the magnitude relative to a particular offset.
    pub fn dilate(&mut self, offset: isize, quantity: isize) {
        self.contract(offset, -quantity)
    }

    /// Decrease the magnitude relative to a particular offset.
    pub fn contract(&mut self, offset: isize, quantity: isize) {
        if offset < 0 {
            // Before the range; only the datum moves.
            self.datum -= quantity;
        } else if offset <= self.magnitude {
            // Within the range; adjust size and position.
            self.magnitude -= quantity;
            self.offset -= quantity;
        } else {
            // After the range; only the offset moves.
            self.offset -= quantity;
        }
    }

    /// Recognize `quantity` units inserted at the absolute `offset`.
    /// Insertions within or adjacent to the range expand it.
    pub fn insert(&mut self, offset: isize, quantity: isize) {
        let mut position = self.get();
        if offset <= position {
            position += quantity;
        }

        if offset < self.datum {
            // Push the range forward.
            self.datum += quantity;
        } else if offset <= self.datum + self.magnitude {
            // Range adjacent insertion; extend by quantity.
            self.magnitude += quantity;
        }

        self.set(position);
    }

    /// Recognize `quantity` units removed at the absolute `offset`.
    /// Deletions overlapping the range reduce it by the intersection.
    pub fn delete(&mut self, offset: isize, quantity: isize) {
        let roffset = offset - self.datum;
        let end = roffset + quantity;

        // The offset is handled independently of the range; subsequent
        // set() calls adjust accordingly.
        if self.offset >= roffset {
            if self.offset >= end {
                self.update(-quantity);
            } else {
                self.offset = roffset;
            }
        }
        let position = self.get();

        if roffset >= self.magnitude {
            // Deletion entirely after the range.
            return;
        } else if end < 0 {
            // Deletion entirely before the range.
            self.datum -= quantity;
            self.set(position);
            return;
        }

        // Reduce the magnitude by the overlapping area.
        let overlap = end.min(self.magnitude) - roffset.max(0);
        self.magnitude -= overlap;

        if roffset > 0 {
            // Deletion after the datum; magnitude already reduced.
            return;
        }

        self.datum += roffset;
        self.set(position);
    }

    /// Adjust for a reference-space change at the absolute `offset`:
    /// positive quantities are insertions, negative are removals.
    pub fn changed(&mut self, offset: isize, quantity: isize) {
        if quantity > 0 {
            self.insert(offset, quantity);
        } else if quantity < 0 {
            self.delete(offset, -quantity);
        }
    }

    /// Classify the offset against the range bounds.
    pub fn relation(&self) -> Relation {
        if self.offset < 0 {
            Relation::Before
        } else if self.offset > self.magnitude {
            Relation::After
        } else {
            Relation::Within
        }
    }

    /// Relocate the start or stop onto the offset when it lies outside.
    pub fn compensate(&mut self) {
        match self.relation() {
            Relation::After => self.magnitude = self.offset,
            Relation::Before => {
                self.datum += self.offset;
                self.offset = 0;
            }
            Relation::Within => {}
        }
    }

    /// The absolute `(start, stop)` pair, shifted by `adjustment`.
    pub fn range(&self, adjustment: isize) -> (isize, isize) {
        let (start, _, stop) = self.snapshot();
        (start + adjustment, stop + adjustment)
    }
}

/// A line/codepoint position pair registered as a delta observer.
#[derive(Debug, Clone, Copy, Default)]
pub struct CursorPair {
    pub lines: Position,
    pub codepoints: Position,
}

impl CursorPair {
    pub fn allocate(lo: isize, cstart: isize, co: isize, cstop: isize) -> Self {
        let mut c = Self::default();
        c.lines.restore((lo, lo, lo + 1));
        c.codepoints.restore((cstart, co, cstop));
        c
    }

    pub fn coordinates(&self) -> (isize, isize) {
        (self.lines.get(), self.codepoints.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(datum: isize, offset: isize, magnitude: isize) -> Position {
        let mut p = Position::new();
        p.configure(datum, magnitude, offset);
        p
    }

    #[test]
    fn absolute_get_set() {
        let mut p = at(10, 5, 10);
        assert_eq!(p.get(), 15);
        p.set(12);
        assert_eq!(p.get(), 12);
        assert_eq!(p.datum, 10);
    }

    #[test]
    fn insertion_before_preserves_absolute() {
        let mut p = at(10, 5, 10);
        p.changed(3, 4);
        assert_eq!(p.get(), 19);
        assert_eq!(p.datum, 14);
        assert_eq!(p.magnitude, 10);
    }

    #[test]
    fn insertion_within_expands() {
        let mut p = at(10, 5, 10);
        p.changed(12, 2);
        assert_eq!(p.get(), 17);
        assert_eq!(p.magnitude, 12);
    }

    #[test]
    fn insertion_after_range_ignored() {
        let mut p = at(10, 5, 10);
        p.changed(30, 3);
        assert_eq!(p.get(), 15);
        assert_eq!(p.magnitude, 10);
    }

    #[test]
    fn deletion_before_preserves_absolute() {
        let mut p = at(10, 5, 10);
        p.changed(2, -3);
        assert_eq!(p.get(), 12);
        assert_eq!(p.datum, 7);
        assert_eq!(p.magnitude, 10);
    }

    #[test]
    fn deletion_covering_position_snaps_to_edit() {
        let mut p = at(10, 5, 10);
        // Remove [13, 18); the indexed unit is gone, snap to the start.
        p.changed(13, -5);
        assert_eq!(p.get(), 13);
    }

    #[test]
    fn deletion_after_position_shrinks_range_only() {
        let mut p = at(10, 2, 10);
        p.changed(15, -3);
        assert_eq!(p.get(), 12);
        assert_eq!(p.magnitude, 7);
    }

    #[test]
    fn relation_classification() {
        assert_eq!(at(0, -1, 5).relation(), Relation::Before);
        assert_eq!(at(0, 3, 5).relation(), Relation::Within);
        assert_eq!(at(0, 6, 5).relation(), Relation::After);
    }

    #[test]
    fn collapse_and_normalize() {
        let mut p = at(10, 5, 10);
        assert_eq!(p.collapse(), 5);
        assert_eq!((p.datum, p.offset, p.magnitude), (15, 0, 0));

        let mut q = at(10, 3, 10);
        assert_eq!(q.normalize(), 0, "within range is untouched");
        q.offset = 12;
        assert_eq!(q.normalize(), 12);
        assert_eq!(q.datum, 22);
    }

    #[test]
    fn invert_reverses_direction() {
        let mut p = at(10, 2, 6);
        p.invert();
        assert_eq!(p.datum, 16);
        assert_eq!(p.get(), 14);
        assert_eq!(p.magnitude, -6);
    }

    #[test]
    fn compensate_relocates_edges() {
        let mut p = at(0, 7, 5);
        p.compensate();
        assert_eq!(p.magnitude, 7);

        let mut q = at(10, -2, 5);
        q.compensate();
        assert_eq!(q.datum, 8);
        assert_eq!(q.offset, 0);
    }
}
