//! Frame layout model: the pane grid, border rendering, and indicator
//! placement.
//!
//! A frame's screen estate is divided into vertical stripes, each stacked
//! with divisions. Every division carries three sub-areas: a location
//! header, the content body, and an optional prompt footer. The model
//! computes all geometry up front; border rendering is a pure function of
//! the model, and the intersection cache resolves the box-drawing glyph to
//! place where borders meet.

use ahash::AHashMap;

use crate::area::Area;

pub mod glyphs {
    pub const HORIZONTAL: char = '\u{2500}'; // ─
    pub const VERTICAL: char = '\u{2502}'; // │
    pub const DOTTED_HORIZONTAL: char = '\u{254C}'; // ╌
    pub const DOTTED_VERTICAL: char = '\u{254E}'; // ╎
    pub const TOP_LEFT: char = '\u{250C}'; // ┌
    pub const TOP_RIGHT: char = '\u{2510}'; // ┐
    pub const BOTTOM_LEFT: char = '\u{2514}'; // └
    pub const BOTTOM_RIGHT: char = '\u{2518}'; // ┘
    pub const LEFT: char = '\u{251C}'; // ├
    pub const RIGHT: char = '\u{2524}'; // ┤
    pub const TOP: char = '\u{252C}'; // ┬
    pub const BOTTOM: char = '\u{2534}'; // ┴
    pub const FULL: char = '\u{253C}'; // ┼
    pub const WEDGE_UP: char = '\u{25B4}'; // ▴
    pub const WEDGE_DOWN: char = '\u{25BE}'; // ▾
    pub const WEDGE_LEFT: char = '\u{25C2}'; // ◂
    pub const WEDGE_RIGHT: char = '\u{25B8}'; // ▸
}

/// A border fill: the rectangle repeats the glyph.
pub type BorderFill = (Area, char);

/// One division: position, dimensions, and `(header, footer)` line counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Division {
    pub position: (usize, usize),
    pub dimensions: (usize, usize),
    pub header: usize,
    pub footer: usize,
}

/// Pane section selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Content,
    Header,
    Footer,
}

/// Border side carrying an indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
    Top,
    Bottom,
}

/// Cursor relation the indicator communicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorType {
    StartInclusive,
    OffsetActive,
    StopExclusive,
    StopInclusive,
}

/// Whether the indicated position is visible or clamped off an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorImage {
    Leading,
    Following,
    Visible,
}

/// A placed indicator: the screen cell, the glyph, and the border glyph to
/// restore once the indicator moves away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Indicator {
    pub x: usize,
    pub y: usize,
    pub itype: IndicatorType,
    pub glyph: char,
    pub restore: char,
}

/// The visual model defining pane positions within a frame.
#[derive(Debug, Default)]
pub struct Model {
    border: usize,
    header_size: usize,
    allocation: usize,
    context: Area,
    layout: Vec<(usize, usize)>,
    /// Stripe positions and dimensions: `((x, y), (width, height))`.
    verticals: Vec<((usize, usize), (usize, usize))>,
    divisions: Vec<Vec<Division>>,
    /// Margin overrides keyed by `(vertical, division, section)` where the
    /// section is 1 for headers and 3 for footers.
    deltas: AHashMap<(usize, usize, usize), usize>,
    intersections: AHashMap<(usize, usize), char>,
}

impl Model {
    pub fn new() -> Self {
        Self {
            border: 1,
            header_size: 2,
            ..Self::default()
        }
    }

    pub fn vertical_count(&self) -> usize {
        self.verticals.len()
    }

    pub fn division_count(&self, vertical: usize) -> usize {
        self.divisions.get(vertical).map(|d| d.len()).unwrap_or(0)
    }

    pub fn configuration(&self) -> (Area, &[(usize, usize)]) {
        (self.context, &self.layout)
    }

    /// Distribute `span` so each segment has at least `allocation` units,
    /// separated by borders.
    fn distribute(span: usize, allocation: usize, separator: usize) -> Vec<(usize, usize)> {
        let count = (span / (allocation + separator).max(1)).max(1);
        let size = span / count;
        let offset = size + separator;
        let last = span - offset * (count - 1);

        (0..count)
            .map(|i| {
                let position = offset * i + 1;
                let extent = if i + 1 == count { last } else { size };
                (position, extent)
            })
            .collect()
    }

    /// Reset the intersection cache to the frame's outer corners and
    /// header tees.
    fn reset_intersections(&mut self) {
        self.intersections.clear();
        let w = self.context.span;
        let h = self.context.lines;
        if w == 0 || h == 0 {
            return;
        }
        self.intersections.insert((0, 0), glyphs::TOP_LEFT);
        self.intersections.insert((0, 3), glyphs::LEFT);
        self.intersections.insert((w - 1, 3), glyphs::RIGHT);
        self.intersections.insert((w - 1, 0), glyphs::TOP_RIGHT);
        self.intersections.insert((0, h - 1), glyphs::BOTTOM_LEFT);
        self.intersections.insert((w - 1, h - 1), glyphs::BOTTOM_RIGHT);
    }

    /// Combine box drawing characters to form intersections.
    fn combine(f: char, l: char) -> char {
        use glyphs::*;
        match (f, l) {
            (VERTICAL, LEFT) | (LEFT, VERTICAL) => LEFT,
            (VERTICAL, RIGHT) | (RIGHT, VERTICAL) => RIGHT,
            (VERTICAL, HORIZONTAL)
            | (LEFT, RIGHT)
            | (RIGHT, LEFT)
            | (TOP, BOTTOM)
            | (BOTTOM, TOP) => FULL,
            // Latter wins; handles the literal corner cases.
            _ => l,
        }
    }

    /// Process the crossbars that divide a vertical.
    fn update_inner_intersections(&mut self, page: usize) {
        let (pp, pd) = self.verticals[page];
        let mut lefts: Vec<(usize, usize)> = self.divisions[page]
            .iter()
            .map(|d| (pp.0.saturating_sub(1), d.position.1.saturating_sub(1)))
            .collect();
        if let Some(first) = lefts.first_mut() {
            // The first division's left tee sits on the header separator.
            first.1 += 3;
        }
        let rights: Vec<(usize, usize)> = lefts.iter().map(|(_, y)| (pp.0 + pd.0 + 1, *y)).collect();

        for p in lefts {
            let cur = self.intersections.get(&p).copied().unwrap_or(glyphs::LEFT);
            self.intersections.insert(p, Self::combine(glyphs::LEFT, cur));
        }
        for p in rights {
            let cur = self.intersections.get(&p).copied().unwrap_or(glyphs::RIGHT);
            self.intersections
                .insert(p, Self::combine(glyphs::RIGHT, cur));
        }
    }

    /// Distribute the vertical stripes per `layout[i] = (division_count,
    /// allocation_width)`. A stripe declaring zero allocation absorbs the
    /// remainder; without one, the last stripe does.
    fn redistribute(&mut self, layout: &[(usize, usize)], allocation: usize) {
        let height = self.context.lines.saturating_sub(self.border * 2);
        let width = self.context.span.saturating_sub(self.border * 2);
        let nverticals = layout.len();

        let mut layout: Vec<(usize, usize)> = layout.to_vec();
        let inheritor = layout
            .iter()
            .position(|(_, w)| *w == 0)
            .unwrap_or(nverticals - 1);
        layout[inheritor].1 = 0;
        self.layout = layout.clone();

        self.verticals = layout
            .iter()
            .map(|(_, w)| {
                let span = allocation * w + w.saturating_sub(1) * self.border;
                ((0, self.border), (span, height))
            })
            .collect();

        let used: usize = self.verticals.iter().map(|(_, d)| d.0).sum();
        let mut uwidth = width.saturating_sub(used);
        uwidth = uwidth.saturating_sub((nverticals - 1) * self.border);
        {
            let (_, dims) = &mut self.verticals[inheritor];
            dims.0 = uwidth;
        }

        // Horizontal offsets from the computed widths.
        let mut offset = self.border;
        for (position, dims) in self.verticals.iter_mut() {
            position.0 = offset;
            offset += dims.0 + self.border;
        }

        // Seed sole divisions for freshly created stripes.
        self.divisions = self
            .verticals
            .iter()
            .map(|(vp, vd)| {
                vec![Division {
                    position: *vp,
                    dimensions: *vd,
                    header: self.header_size,
                    footer: 0,
                }]
            })
            .collect();

        self.reset_intersections();
        for i in 0..self.verticals.len() {
            self.update_inner_intersections(i);
        }
    }

    /// Split the vertical `page` into `divisions` stacked panes.
    fn divide(&mut self, page: usize, divisions: usize) {
        let (pp, pd) = self.verticals[page];
        let allocation = (pd.1 / divisions.max(1)).saturating_sub(1);
        self.divisions[page] = Self::distribute(pd.1, allocation, self.border)
            .into_iter()
            .enumerate()
            .map(|(di, (p, height))| Division {
                position: (pp.0, p),
                dimensions: (pd.0, height),
                header: self.header_size,
                footer: self.deltas.get(&(page, di, 3)).copied().unwrap_or(0),
            })
            .collect();
        self.update_inner_intersections(page);
    }

    /// Configure the frame geometry: one stripe per layout entry, divided
    /// into the requested number of panes.
    pub fn configure(&mut self, area: Area, layout: &[(usize, usize)], allocation: usize) {
        self.context = area;
        self.allocation = allocation;
        self.redistribute(layout, allocation);
        for (i, (count, _)) in layout.iter().enumerate() {
            self.divide(i, *count);
        }
    }

    /// Rebuild all geometry from the retained configuration; used after
    /// resizes and margin changes.
    pub fn remodel(&mut self, area: Area) {
        let layout = self.layout.clone();
        if layout.is_empty() {
            self.context = area;
            return;
        }
        let allocation = self.allocation;
        self.configure(area, &layout, allocation);
    }

    /// Change the header or footer size of a division. The `section` is 1
    /// for headers and 3 for footers. Returns the change in size.
    pub fn set_margin_size(
        &mut self,
        vertical: usize,
        division: usize,
        section: usize,
        size: usize,
    ) -> isize {
        let key = (vertical, division, section);
        let current = self.deltas.get(&key).copied().unwrap_or(0);
        self.deltas.insert(key, size);

        if let Some(d) = self
            .divisions
            .get_mut(vertical)
            .and_then(|ds| ds.get_mut(division))
        {
            match section {
                1 => d.header = size,
                3 => d.footer = size,
                _ => {}
            }
        }
        self.update_inner_intersections(vertical);
        size as isize - current as isize
    }

    /// Identify the vertical, division, and section containing the screen
    /// coordinates.
    pub fn address(&self, x: usize, y: usize) -> Option<(usize, usize, Section)> {
        let x = x.checked_sub(self.context.left_offset)?;
        let y = y.checked_sub(self.context.top_offset)?;

        for (v, (p, d)) in self.verticals.iter().enumerate() {
            if x >= p.0 && x <= p.0 + d.0 {
                for (i, div) in self.divisions[v].iter().enumerate() {
                    if y >= div.position.1 && y <= div.position.1 + div.dimensions.1 {
                        let ry = y - div.position.1;
                        let section = if div.header > 0 && ry <= div.header {
                            Section::Header
                        } else if div.footer > 0 && ry >= div.dimensions.1 - div.footer {
                            Section::Footer
                        } else {
                            Section::Content
                        };
                        return Some((v, i, section));
                    }
                }
            }
        }
        None
    }

    /// Pane paths in left-to-right, top-to-bottom order.
    pub fn iterpanes(&self) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for v in 0..self.verticals.len() {
            for d in 0..self.divisions[v].len() {
                out.push((v, d));
            }
        }
        out
    }

    /// The screen area of a division's section.
    pub fn section_area(&self, vertical: usize, division: usize, section: Section) -> Area {
        let Some(div) = self
            .divisions
            .get(vertical)
            .and_then(|ds| ds.get(division))
        else {
            return Area::default();
        };

        let rx = self.context.left_offset;
        let ry = self.context.top_offset;
        let (left, top) = div.position;
        let (width, height) = div.dimensions;
        let vborder = self.border;

        let dt = if div.header > 0 {
            div.header + vborder
        } else {
            0
        };
        let db = if div.footer > 0 {
            div.footer + vborder
        } else {
            0
        };

        match section {
            Section::Content => Area::new(
                ry + top + dt,
                rx + left,
                height.saturating_sub(dt + db),
                width,
            ),
            Section::Header => Area::new(
                ry + top,
                rx + left,
                dt.saturating_sub(vborder),
                width,
            ),
            Section::Footer => Area::new(
                ry + top + height - db.saturating_sub(vborder).min(height),
                rx + left,
                db.saturating_sub(vborder),
                width,
            ),
        }
    }

    // ------------------------------------------------------------------
    // Border rendering
    // ------------------------------------------------------------------

    /// Draw the surrounding frame of the session panes.
    pub fn r_enclose(&self, width: usize, height: usize) -> Vec<BorderFill> {
        use glyphs::*;
        let hlength = width.saturating_sub(self.border * 2);
        let vlength = height.saturating_sub(self.border * 2);

        vec![
            (Area::new(0, 0, 1, 1), TOP_LEFT),
            (Area::new(0, 1, 1, hlength), HORIZONTAL),
            (Area::new(0, width - 1, 1, 1), TOP_RIGHT),
            (Area::new(height - 1, 0, 1, 1), BOTTOM_LEFT),
            (Area::new(height - 1, 1, 1, hlength), HORIZONTAL),
            (Area::new(height - 1, width - 1, 1, 1), BOTTOM_RIGHT),
            (Area::new(1, 0, vlength, 1), VERTICAL),
            (Area::new(1, width - 1, vlength, 1), VERTICAL),
        ]
    }

    fn r_divide_verticals(&self, position: (usize, usize), size: usize) -> Vec<BorderFill> {
        use glyphs::*;
        vec![
            (Area::new(position.1, position.0, 1, 1), TOP),
            (
                Area::new(position.1 + 1, position.0, size.saturating_sub(2), 1),
                VERTICAL,
            ),
            (Area::new(position.1 + size - 1, position.0, 1, 1), BOTTOM),
        ]
    }

    fn r_divide_horizontals(
        &self,
        solid: bool,
        position: (usize, usize),
        size: usize,
    ) -> Vec<BorderFill> {
        use glyphs::*;
        let end = (position.0 + size + 1, position.1);
        let (hl, li, ri) = if solid {
            (
                HORIZONTAL,
                self.intersections.get(&position).copied().unwrap_or(LEFT),
                self.intersections.get(&end).copied().unwrap_or(RIGHT),
            )
        } else {
            (DOTTED_HORIZONTAL, VERTICAL, VERTICAL)
        };

        vec![
            (Area::new(position.1, position.0, 1, 1), li),
            (Area::new(position.1, position.0 + 1, 1, size), hl),
            (Area::new(position.1, position.0 + 1 + size, 1, 1), ri),
        ]
    }

    /// The dividing line separating a prompt footer from the body; used
    /// when opening a prompt in an already drawn frame.
    pub fn r_patch_footer(&self, vertical: usize, division: usize) -> Vec<BorderFill> {
        let Some(div) = self
            .divisions
            .get(vertical)
            .and_then(|ds| ds.get(division))
        else {
            return Vec::new();
        };
        let h = div.position.0.saturating_sub(self.border);
        let v = div.position.1;
        self.r_divide_horizontals(
            false,
            (h, v + div.dimensions.1 - div.footer - self.border),
            div.dimensions.0,
        )
    }

    /// All divisions necessary to represent the configuration.
    pub fn r_divide(&self, _width: usize, height: usize) -> Vec<BorderFill> {
        let mut out = Vec::new();

        for (vp, _) in self.verticals.iter().skip(1) {
            out.extend(self.r_divide_verticals((vp.0 - 1, vp.1 - 1), height));
        }

        for (i, _) in self.verticals.iter().enumerate() {
            for div in self.divisions[i].iter().skip(1) {
                out.extend(self.r_divide_horizontals(
                    true,
                    (div.position.0 - 1, div.position.1 - 1),
                    div.dimensions.0,
                ));
            }

            for div in &self.divisions[i] {
                let h = div.position.0.saturating_sub(self.border);
                let v = div.position.1;
                if div.header > 0 {
                    out.extend(self.r_divide_horizontals(
                        false,
                        (h, v + div.header),
                        div.dimensions.0,
                    ));
                }
                if div.footer > 0 {
                    out.extend(self.r_divide_horizontals(
                        false,
                        (h, v + div.dimensions.1 - div.footer - self.border),
                        div.dimensions.0,
                    ));
                }
            }
        }
        out
    }

    // ------------------------------------------------------------------
    // Indicators
    // ------------------------------------------------------------------

    /// Configure one position indicator: clamp to the visible limit and
    /// classify it as leading, following, or visible.
    fn indicate(
        itype: IndicatorType,
        last: usize,
        limit: usize,
        offset: usize,
        d: usize,
        i: usize,
    ) -> (IndicatorType, IndicatorImage, usize) {
        let itype = if i == last && itype == IndicatorType::OffsetActive {
            IndicatorType::StopInclusive
        } else {
            itype
        };

        let ri = i as isize - d as isize;
        if ri < 0 {
            (itype, IndicatorImage::Leading, offset)
        } else if ri >= limit as isize {
            (itype, IndicatorImage::Following, limit.saturating_sub(1) + offset)
        } else {
            (itype, IndicatorImage::Visible, ri as usize + offset)
        }
    }

    fn side_glyph(side: Side, image: IndicatorImage) -> char {
        use glyphs::*;
        match (side, image) {
            (Side::Left | Side::Right, IndicatorImage::Leading) => WEDGE_UP,
            (Side::Left | Side::Right, IndicatorImage::Following) => WEDGE_DOWN,
            (Side::Left, IndicatorImage::Visible) => WEDGE_RIGHT,
            (Side::Right, IndicatorImage::Visible) => WEDGE_LEFT,
            (Side::Top | Side::Bottom, IndicatorImage::Leading) => WEDGE_LEFT,
            (Side::Top | Side::Bottom, IndicatorImage::Following) => WEDGE_RIGHT,
            (Side::Top, IndicatorImage::Visible) => WEDGE_DOWN,
            (Side::Bottom, IndicatorImage::Visible) => WEDGE_UP,
        }
    }

    /// Scale the cursor vectors of a pane into indicator placements on its
    /// borders: the vertical triple lands on the left and right borders,
    /// the horizontal triple on the top and bottom.
    pub fn scale_ipositions(
        &self,
        pane: Area,
        horizontal: (usize, usize, usize),
        vertical: (usize, usize, usize),
        dx: usize,
        dy: usize,
    ) -> Vec<Indicator> {
        let itypes = [
            IndicatorType::StartInclusive,
            IndicatorType::OffsetActive,
            IndicatorType::StopExclusive,
        ];

        let mut out = Vec::new();

        let vpos = [vertical.0, vertical.1, vertical.2];
        let last_v = vertical.2;
        for (axis, itype) in vpos.iter().zip(itypes) {
            let (itype, image, y) =
                Self::indicate(itype, last_v, pane.lines, pane.top_offset, dy, *axis);
            for side in [Side::Left, Side::Right] {
                let x = match side {
                    Side::Left => pane.left_offset.saturating_sub(1),
                    _ => pane.left_offset + pane.span,
                };
                out.push(self.place(side, x, y, itype, image));
            }
        }

        let hpos = [horizontal.0, horizontal.1, horizontal.2];
        let last_h = horizontal.2;
        for (axis, itype) in hpos.iter().zip(itypes) {
            let (itype, image, x) =
                Self::indicate(itype, last_h, pane.span, pane.left_offset, dx, *axis);
            for side in [Side::Top, Side::Bottom] {
                let y = match side {
                    Side::Top => pane.top_offset.saturating_sub(1),
                    _ => pane.top_offset + pane.lines,
                };
                out.push(self.place(side, x, y, itype, image));
            }
        }

        out
    }

    fn place(
        &self,
        side: Side,
        x: usize,
        y: usize,
        itype: IndicatorType,
        image: IndicatorImage,
    ) -> Indicator {
        // Preserve corners and tees: the restore glyph is the cached
        // intersection when one exists, otherwise the plain border line.
        let restore = self.intersections.get(&(x, y)).copied().unwrap_or(match side {
            Side::Left | Side::Right => glyphs::VERTICAL,
            Side::Top | Side::Bottom => glyphs::HORIZONTAL,
        });

        Indicator {
            x,
            y,
            itype,
            glyph: Self::side_glyph(side, image),
            restore,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_80x24(layout: &[(usize, usize)]) -> Model {
        let mut m = Model::new();
        m.configure(Area::new(0, 0, 24, 80), layout, 30);
        m
    }

    #[test]
    fn sole_pane_configuration() {
        let m = model_80x24(&[(1, 0)]);
        assert_eq!(m.vertical_count(), 1);
        assert_eq!(m.division_count(0), 1);

        let body = m.section_area(0, 0, Section::Content);
        // Borders and the two-line header are excluded from the body.
        assert!(body.lines < 24);
        assert!(body.span <= 78);
        assert!(body.top_offset >= 3);
    }

    #[test]
    fn two_verticals_absorb_remainder() {
        let m = model_80x24(&[(1, 1), (1, 0)]);
        assert_eq!(m.vertical_count(), 2);
        let (p0, d0) = m.verticals[0];
        let (p1, d1) = m.verticals[1];
        assert!(p0.0 < p1.0);
        // All width is accounted for: widths + 3 borders.
        assert_eq!(d0.0 + d1.0 + 3, 80);
    }

    #[test]
    fn stacked_divisions_have_minimum_heights() {
        let m = model_80x24(&[(3, 0)]);
        assert_eq!(m.division_count(0), 3);
        let (_, (_, h)) = m.verticals[0];
        let min = (h / 3).saturating_sub(1);
        for d in &m.divisions[0] {
            assert!(d.dimensions.1 >= min, "{} < {min}", d.dimensions.1);
        }
    }

    #[test]
    fn address_resolves_sections() {
        let m = model_80x24(&[(2, 0)]);
        let header = m.section_area(0, 0, Section::Header);
        let body = m.section_area(0, 0, Section::Content);

        let (v, d, s) = m.address(header.left_offset, header.top_offset).unwrap();
        assert_eq!((v, d), (0, 0));
        assert_eq!(s, Section::Header);

        let (v, d, s) = m
            .address(body.left_offset + 1, body.top_offset + 1)
            .unwrap();
        assert_eq!((v, d), (0, 0));
        assert_eq!(s, Section::Content);
    }

    #[test]
    fn enclosure_corners() {
        let m = model_80x24(&[(1, 0)]);
        let fills = m.r_enclose(80, 24);
        assert!(fills.contains(&(Area::new(0, 0, 1, 1), glyphs::TOP_LEFT)));
        assert!(fills.contains(&(Area::new(23, 79, 1, 1), glyphs::BOTTOM_RIGHT)));
    }

    #[test]
    fn divide_emits_borders_between_stripes() {
        let m = model_80x24(&[(1, 1), (1, 0)]);
        let fills = m.r_divide(80, 24);
        // A vertical divider between the stripes produces a top tee.
        assert!(fills.iter().any(|(_, g)| *g == glyphs::TOP));
        assert!(fills.iter().any(|(_, g)| *g == glyphs::VERTICAL));
    }

    #[test]
    fn glyph_combination() {
        assert_eq!(Model::combine(glyphs::VERTICAL, glyphs::LEFT), glyphs::LEFT);
        assert_eq!(Model::combine(glyphs::LEFT, glyphs::RIGHT), glyphs::FULL);
        assert_eq!(Model::combine(glyphs::TOP, glyphs::BOTTOM), glyphs::FULL);
        assert_eq!(
            Model::combine(glyphs::HORIZONTAL, glyphs::TOP_LEFT),
            glyphs::TOP_LEFT
        );
    }

    #[test]
    fn iterpanes_order() {
        let m = model_80x24(&[(2, 1), (1, 0)]);
        assert_eq!(m.iterpanes(), vec![(0, 0), (0, 1), (1, 0)]);
    }

    #[test]
    fn indicators_clamp_to_edges() {
        let m = model_80x24(&[(1, 0)]);
        let pane = m.section_area(0, 0, Section::Content);

        // Cursor far below the visible window clamps to a following wedge.
        let ind = m.scale_ipositions(pane, (0, 1, 2), (100, 150, 200), 0, 0);
        let left_following = ind
            .iter()
            .find(|i| i.glyph == glyphs::WEDGE_DOWN)
            .expect("a following wedge");
        assert_eq!(left_following.y, pane.top_offset + pane.lines - 1);
    }

    #[test]
    fn indicator_restore_preserves_intersections() {
        let m = model_80x24(&[(1, 0)]);
        let pane = m.section_area(0, 0, Section::Content);
        let ind = m.scale_ipositions(pane, (0, 0, 1), (0, 0, 1), 0, 0);
        for i in &ind {
            assert_ne!(i.restore, '\0');
        }
    }

    #[test]
    fn footer_margin_resize() {
        let mut m = model_80x24(&[(1, 0)]);
        let change = m.set_margin_size(0, 0, 3, 2);
        assert_eq!(change, 2);
        let footer = m.section_area(0, 0, Section::Footer);
        assert_eq!(footer.lines, 2);
        let change = m.set_margin_size(0, 0, 3, 0);
        assert_eq!(change, -2);
    }
}
