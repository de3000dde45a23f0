//! Client-side screen cell buffer.
//!
//! Cell replication between rectangles has no portable terminal escape, so
//! the device keeps the authoritative cell grid here: rewrites land in the
//! buffer before being emitted, and `replicate_cells` copies buffered
//! content so the destination can be redrawn without consulting the
//! session. The buffer also restores cells that indicators overwrite.

use core_model::Area;
use core_text::{Cell, Glyph};

#[derive(Debug, Clone)]
pub struct Screen {
    lines: usize,
    span: usize,
    cells: Vec<Cell>,
}

impl Screen {
    pub fn new(lines: usize, span: usize) -> Self {
        Self {
            lines,
            span,
            cells: vec![Cell::blank(Glyph::default()); lines * span],
        }
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.lines, self.span)
    }

    pub fn resize(&mut self, lines: usize, span: usize) {
        let mut next = vec![Cell::blank(Glyph::default()); lines * span];
        for y in 0..lines.min(self.lines) {
            for x in 0..span.min(self.span) {
                next[y * span + x] = self.cells[y * self.span + x].clone();
            }
        }
        self.lines = lines;
        self.span = span;
        self.cells = next;
    }

    pub fn cell(&self, y: usize, x: usize) -> Option<&Cell> {
        if y >= self.lines || x >= self.span {
            return None;
        }
        self.cells.get(y * self.span + x)
    }

    /// Write `cells` row-major into `area`, clipping at the surface edges.
    pub fn rewrite(&mut self, area: &Area, cells: &[Cell]) {
        let mut i = 0;
        for ry in 0..area.lines {
            for rx in 0..area.span {
                let Some(cell) = cells.get(i) else { return };
                i += 1;
                let y = area.top_offset + ry;
                let x = area.left_offset + rx;
                if y < self.lines && x < self.span {
                    self.cells[y * self.span + x] = cell.clone();
                }
            }
        }
    }

    /// Replicate the source rectangle's cells onto the destination.
    ///
    /// Overlapping rectangles are handled by snapshotting the source
    /// before writing.
    pub fn replicate_cells(&mut self, src: &Area, dst: &Area) {
        let rows = src.lines.min(dst.lines);
        let cols = src.span.min(dst.span);

        let mut copied: Vec<Cell> = Vec::with_capacity(rows * cols);
        for ry in 0..rows {
            for rx in 0..cols {
                let y = src.top_offset + ry;
                let x = src.left_offset + rx;
                copied.push(
                    self.cell(y, x)
                        .cloned()
                        .unwrap_or_else(|| Cell::blank(Glyph::default())),
                );
            }
        }

        let mut i = 0;
        for ry in 0..rows {
            for rx in 0..cols {
                let y = dst.top_offset + ry;
                let x = dst.left_offset + rx;
                if y < self.lines && x < self.span {
                    self.cells[y * self.span + x] = copied[i].clone();
                }
                i += 1;
            }
        }
    }

    /// Clear the area to blank cells.
    pub fn invalidate_cells(&mut self, area: &Area) {
        let blank = Cell::blank(Glyph::default());
        for ry in 0..area.lines {
            for rx in 0..area.span {
                let y = area.top_offset + ry;
                let x = area.left_offset + rx;
                if y < self.lines && x < self.span {
                    self.cells[y * self.span + x] = blank.clone();
                }
            }
        }
    }

    /// The text of a row; continuation cells contribute nothing.
    pub fn row_text(&self, y: usize) -> String {
        (0..self.span)
            .filter_map(|x| self.cell(y, x))
            .filter(|c| c.window == 0)
            .map(|c| if c.text.is_empty() { " ".to_string() } else { c.text.clone() })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells_of(text: &str) -> Vec<Cell> {
        text.chars()
            .map(|c| Cell::lead(c.to_string(), Glyph::default()))
            .collect()
    }

    #[test]
    fn rewrite_and_read_back() {
        let mut s = Screen::new(4, 10);
        s.rewrite(&Area::new(1, 2, 1, 3), &cells_of("abc"));
        assert_eq!(s.cell(1, 2).unwrap().text, "a");
        assert_eq!(s.cell(1, 4).unwrap().text, "c");
        assert_eq!(s.row_text(1), "  abc     ");
    }

    #[test]
    fn replicate_moves_rows() {
        let mut s = Screen::new(6, 4);
        s.rewrite(&Area::new(2, 0, 1, 4), &cells_of("row2"));
        s.rewrite(&Area::new(3, 0, 1, 4), &cells_of("row3"));

        // Rows [2,4) move up by two.
        s.replicate_cells(&Area::new(2, 0, 2, 4), &Area::new(0, 0, 2, 4));
        assert_eq!(s.row_text(0), "row2");
        assert_eq!(s.row_text(1), "row3");
        // Source remains; renders overwrite it afterwards.
        assert_eq!(s.row_text(2), "row2");
    }

    #[test]
    fn replicate_overlapping_regions() {
        let mut s = Screen::new(5, 3);
        for y in 0..5 {
            s.rewrite(&Area::new(y, 0, 1, 3), &cells_of(&format!("r{y} ")));
        }
        // Shift down by one with overlap.
        s.replicate_cells(&Area::new(0, 0, 4, 3), &Area::new(1, 0, 4, 3));
        assert_eq!(s.row_text(1), "r0 ");
        assert_eq!(s.row_text(4), "r3 ");
    }

    #[test]
    fn invalidate_blanks() {
        let mut s = Screen::new(2, 4);
        s.rewrite(&Area::new(0, 0, 1, 4), &cells_of("full"));
        s.invalidate_cells(&Area::new(0, 1, 1, 2));
        assert_eq!(s.row_text(0), "f  l");
    }

    #[test]
    fn resize_preserves_overlap() {
        let mut s = Screen::new(2, 4);
        s.rewrite(&Area::new(0, 0, 1, 4), &cells_of("keep"));
        s.resize(3, 3);
        assert_eq!(s.row_text(0), "kee");
        assert_eq!(s.dimensions(), (3, 3));
    }

    #[test]
    fn clipping_at_edges() {
        let mut s = Screen::new(2, 3);
        s.rewrite(&Area::new(1, 2, 2, 5), &cells_of("abcdefghij"));
        // Only the in-bounds corner lands.
        assert_eq!(s.cell(1, 2).unwrap().text, "a");
        assert!(s.cell(2, 0).is_none());
    }
}
