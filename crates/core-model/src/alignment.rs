//! View alignment math and screen-copy regions.
//!
//! The position functions compute where a view must sit after an insertion
//! or deletion so the displayed image is maintained; the scroll functions
//! constrain relative scroll requests to the store's boundaries; and the
//! rectangle generators produce `(source, destination)` cell-copy pairs for
//! the device, where the source is the untouched region and the
//! destination is the same region shifted.
//!
//! Shared parameter vocabulary: `total` is the available units prior to the
//! change, `visible` the units the view can show, `position` the view's
//! current offset within `total`, `offset` the point of change, and
//! `quantity` the size of the change.

use crate::area::Area;

/// A cell replication instruction: copy the source rectangle's cells onto
/// the destination rectangle.
pub type CellCopy = (Area, Area);

/// Calculate the view's position after an insertion or deletion.
pub fn delta(total: usize, visible: usize, position: usize, offset: usize, quantity: isize) -> usize {
    if quantity == 0 {
        position
    } else if quantity > 0 {
        insert(total, visible, position, offset, quantity as usize)
    } else {
        delete(total, visible, position, offset, (-quantity) as usize)
    }
}

/// The view position maintaining the current image after an insertion.
pub fn insert(total: usize, visible: usize, position: usize, offset: usize, quantity: usize) -> usize {
    if position == 0 && total < visible {
        // First page with everything visible; no adjustment.
        return position;
    }

    if position + visible >= total.saturating_sub(quantity) {
        // Last page insertion forces alignment.
        total.saturating_sub(visible)
    } else if offset < position {
        position + quantity
    } else {
        position
    }
}

/// The view position maintaining the image after a deletion.
pub fn delete(total: usize, visible: usize, position: usize, offset: usize, quantity: usize) -> usize {
    if position == 0 {
        return position;
    }

    let d_end = offset + quantity;
    let max_p = total.saturating_sub(visible);
    let mut position = position;

    if d_end < position {
        position -= quantity;
    } else if position + visible >= total.saturating_sub(quantity) {
        // Last page deletion forces alignment.
        return max_p;
    } else if offset < position {
        // Overlap: the deletion spans the view's start.
        position = offset;
    }

    position.min(max_p)
}

/// Constrain a relative scroll request.
///
/// Returns the new absolute position, the constrained change, and the
/// relative area left vacant.
pub fn scroll(
    total: usize,
    visible: usize,
    position: usize,
    quantity: isize,
) -> (usize, isize, (usize, usize)) {
    if quantity == 0 {
        (position, 0, (0, 0))
    } else if quantity > 0 {
        forward(total, visible, position, quantity as usize)
    } else {
        backward(total, visible, position, (-quantity) as usize)
    }
}

/// Constrain a forward scroll so it never crosses `total`.
pub fn forward(
    total: usize,
    visible: usize,
    position: usize,
    quantity: usize,
) -> (usize, isize, (usize, usize)) {
    // The maximums handle the exception case of scrolling forwards with
    // fewer lines than the view can show.
    let start = (position + quantity).min(total.saturating_sub(visible));
    let change = start.saturating_sub(position);

    // The minimum of the visible or change is vacated at the edge.
    let edge = total.min(start + visible);
    (
        start,
        change as isize,
        (edge.saturating_sub(change.min(visible)), edge),
    )
}

/// Constrain a backward scroll so it never crosses zero.
pub fn backward(
    _total: usize,
    visible: usize,
    position: usize,
    quantity: usize,
) -> (usize, isize, (usize, usize)) {
    let start = position.saturating_sub(quantity);
    let change = start as isize - position as isize;

    // Moving backward vacates the rows between the new start and the old
    // position, bounded by the view size.
    (start, change, (start, position.min(start + visible)))
}

/// Move every line of the area forward by `quantity`: rows below the first
/// `quantity` move up, vacating the final rows.
pub fn scroll_forward(area: &Area, quantity: usize) -> CellCopy {
    let kept = area.lines.saturating_sub(quantity);
    (area.rows(quantity, kept), area.rows(0, kept))
}

/// Move every line of the area backward by `quantity`: rows above the
/// final `quantity` move down, vacating the initial rows.
pub fn scroll_backward(area: &Area, quantity: usize) -> CellCopy {
    let kept = area.lines.saturating_sub(quantity);
    (area.rows(0, kept), area.rows(quantity, kept))
}

/// Move the lines below `stop` up to `start`, covering a deletion in a
/// view anchored at its top.
pub fn start_relative_delete(area: &Area, start: usize, stop: usize) -> CellCopy {
    let kept = area.lines.saturating_sub(stop);
    (area.rows(stop, kept), area.rows(start, kept))
}

/// Move the lines at and below `start` down next to `stop`, opening room
/// for an insertion in a view anchored at its top.
pub fn start_relative_insert(area: &Area, start: usize, stop: usize) -> CellCopy {
    let d = stop - start;
    let kept = area.lines.saturating_sub(start).saturating_sub(d);
    (area.rows(start, kept), area.rows(stop, kept))
}

/// Copy the lines above `stop` up directly above `start`, opening room for
/// an insertion in a view anchored at its bottom.
pub fn stop_relative_insert(area: &Area, start: usize, stop: usize) -> CellCopy {
    let d = stop - start;
    let kept = start.saturating_sub(d);
    (area.rows(d, kept), area.rows(0, kept))
}

/// Copy the lines above `start` down next to `stop`, covering a deletion
/// in a view anchored at its bottom.
pub fn stop_relative_delete(area: &Area, start: usize, stop: usize) -> CellCopy {
    (area.rows(0, start), area.rows(stop - start, start))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_forward_rectangles() {
        // The frame scroll instruction scenario: a ten-line view scrolled
        // forward by three.
        let area = Area::new(0, 0, 10, 40);
        let (src, dst) = scroll_forward(&area, 3);
        assert_eq!(src, Area::new(3, 0, 7, 40));
        assert_eq!(dst, Area::new(0, 0, 7, 40));
    }

    #[test]
    fn scroll_backward_rectangles() {
        let area = Area::new(5, 2, 10, 40);
        let (src, dst) = scroll_backward(&area, 4);
        assert_eq!(src, Area::new(5, 2, 6, 40));
        assert_eq!(dst, Area::new(9, 2, 6, 40));
    }

    #[test]
    fn start_relative_delete_rectangles() {
        let area = Area::new(0, 0, 10, 20);
        // Lines [2, 5) deleted: rows below 5 move up to row 2.
        let (src, dst) = start_relative_delete(&area, 2, 5);
        assert_eq!(src, Area::new(5, 0, 5, 20));
        assert_eq!(dst, Area::new(2, 0, 5, 20));
    }

    #[test]
    fn start_relative_insert_rectangles() {
        let area = Area::new(0, 0, 10, 20);
        let (src, dst) = start_relative_insert(&area, 2, 5);
        assert_eq!(src, Area::new(2, 0, 5, 20));
        assert_eq!(dst, Area::new(5, 0, 5, 20));
    }

    #[test]
    fn stop_relative_rectangles() {
        let area = Area::new(0, 0, 10, 20);
        let (src, dst) = stop_relative_insert(&area, 4, 6);
        assert_eq!(src, Area::new(2, 0, 2, 20));
        assert_eq!(dst, Area::new(0, 0, 2, 20));

        let (src, dst) = stop_relative_delete(&area, 3, 6);
        assert_eq!(src, Area::new(0, 0, 3, 20));
        assert_eq!(dst, Area::new(3, 0, 3, 20));
    }

    #[test]
    fn insert_position_before_view() {
        // Insertion before the view's position pushes it forward.
        assert_eq!(insert(30, 10, 10, 5, 3), 13);
        // Insertion after leaves it.
        assert_eq!(insert(100, 10, 10, 50, 3), 10);
    }

    #[test]
    fn insert_position_last_page() {
        // Insertion near the end while on the last page re-aligns.
        assert_eq!(insert(33, 10, 22, 30, 3), 23);
    }

    #[test]
    fn delete_position_before_view() {
        assert_eq!(delete(30, 10, 10, 2, 3), 7);
        assert_eq!(delete(100, 10, 10, 50, 3), 10);
    }

    #[test]
    fn delete_position_overlap() {
        // Deletion spanning the view start relocates to the offset.
        assert_eq!(delete(100, 10, 10, 8, 5), 8);
    }

    #[test]
    fn delete_position_first_page_stays() {
        assert_eq!(delete(30, 10, 0, 5, 3), 0);
    }

    #[test]
    fn forward_clamps_to_total() {
        let (pos, change, vacant) = forward(30, 10, 15, 100);
        assert_eq!(pos, 20);
        assert_eq!(change, 5);
        assert_eq!(vacant, (25, 30));
    }

    #[test]
    fn backward_clamps_to_zero() {
        let (pos, change, _) = backward(30, 10, 3, 100);
        assert_eq!(pos, 0);
        assert_eq!(change, -3);
    }
}
