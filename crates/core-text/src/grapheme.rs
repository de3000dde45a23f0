//! Character unit recognition over codepoint streams.
//!
//! Character units are identified by analyzing the cell usage of contiguous
//! codepoints: when appending a codepoint increases the measured cell count,
//! a new unit has begun. Variation Selectors, ZWJ sequences, and Regional
//! Indicator pairs are handled as explicit exceptions to that heuristic so
//! that composed emoji and qualified symbols remain single units.
//!
//! Width precedence for a unit:
//! 1. Caller-supplied control/tab sizes for single low-ASCII codepoints.
//! 2. ZWJ sequences and VS16 qualification widen to the maximum member
//!    width, floored at two cells for pictographic content.
//! 3. Regional indicator pairs occupy two cells.
//! 4. Cluster summation via `unicode-width` otherwise.
//!
//! The classifier favors over-estimation: an extra blank cell is harmless
//! while under-estimation causes rendering drift.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

pub const ZWJ: char = '\u{200D}';
pub const ZWNJ: char = '\u{200C}';
pub const VS16: char = '\u{FE0F}';

pub fn is_regional_indicator(c: char) -> bool {
    ('\u{1F1E6}'..='\u{1F1FF}').contains(&c)
}

fn is_extended_pictographic(c: char) -> bool {
    ('\u{1F300}'..='\u{1FAFF}').contains(&c) || ('\u{2600}'..='\u{27BF}').contains(&c)
}

fn is_variation_selector(c: char) -> bool {
    ('\u{FE00}'..='\u{FE0F}').contains(&c)
}

/// Measure the display cells required by a character unit.
///
/// `ctlsize` and `tabsize` are the cell counts assigned to low-ASCII control
/// characters and tabs respectively; the caller decides their visual size.
pub fn unit_width(text: &str, ctlsize: usize, tabsize: usize) -> usize {
    let mut chars = text.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return 0,
    };
    if chars.next().is_none() {
        // Sole codepoint.
        if first == '\t' {
            return tabsize;
        }
        if (first as u32) < 32 {
            return ctlsize;
        }
        return UnicodeWidthChar::width(first).unwrap_or(0);
    }

    if text.contains(ZWJ) || text.contains(VS16) {
        // Joined or qualified expression. The maximum member width decides
        // the unit's cells; pictographic members force emoji presentation.
        let mut w = 0;
        let mut pictographic = false;
        for c in text.chars() {
            if c == ZWJ || is_variation_selector(c) {
                continue;
            }
            pictographic |= is_extended_pictographic(c);
            w = w.max(UnicodeWidthChar::width(c).unwrap_or(0));
        }
        if pictographic {
            w = w.max(2);
        }
        return w;
    }

    let mut ri = text.chars().filter(|c| is_regional_indicator(*c));
    if ri.next().is_some() && ri.next().is_some() {
        // Paired regional indicators display as a single two-cell flag.
        return 2;
    }

    // Sum cluster widths so combining marks collapse onto their base.
    text.graphemes(true)
        .map(|g| UnicodeWidthStr::width(g))
        .sum()
}

/// Recognize character units from an iterator of codepoints.
///
/// Yields `(cell_count, unit_text)` pairs where each unit is a minimal
/// character unit. `cells` measures a candidate unit; see `unit_width`.
pub fn graphemes<I, F>(cells: F, ci: I, ctlsize: usize, tabsize: usize) -> Graphemes<I::IntoIter, F>
where
    I: IntoIterator<Item = char>,
    F: Fn(&str, usize, usize) -> usize,
{
    Graphemes {
        cells,
        ci: ci.into_iter(),
        ctlsize,
        tabsize,
        unit: String::new(),
        unitlen: 0,
        queued: None,
        done: false,
    }
}

pub struct Graphemes<I, F> {
    cells: F,
    ci: I,
    ctlsize: usize,
    tabsize: usize,
    unit: String,
    unitlen: usize,
    queued: Option<(usize, String)>,
    done: bool,
}

impl<I, F> Graphemes<I, F>
where
    I: Iterator<Item = char>,
    F: Fn(&str, usize, usize) -> usize,
{
    fn measure(&self, text: &str) -> usize {
        (self.cells)(text, self.ctlsize, self.tabsize)
    }

    fn take_unit(&mut self) -> (usize, String) {
        let text = std::mem::take(&mut self.unit);
        let cellcount = self.unitlen;
        self.unitlen = 0;
        (cellcount, text)
    }
}

impl<I, F> Iterator for Graphemes<I, F>
where
    I: Iterator<Item = char>,
    F: Fn(&str, usize, usize) -> usize,
{
    type Item = (usize, String);

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(q) = self.queued.take() {
            return Some(q);
        }
        if self.done {
            return None;
        }

        while let Some(cp) = self.ci.next() {
            if cp > '\u{2000}' {
                if cp < '\u{FE00}' {
                    if cp == ZWJ {
                        // ZWJ sequence continuation.
                        self.unit.push(cp);
                        match self.ci.next() {
                            Some(follow) => {
                                self.unit.push(follow);
                                self.unitlen = (self.cells)(&self.unit, self.ctlsize, self.tabsize);
                                continue;
                            }
                            None => {
                                // Final codepoint in iterator.
                                self.done = true;
                                return Some(self.take_unit());
                            }
                        }
                    } else if cp == ZWNJ {
                        // ZWNJ word isolation: terminate and mark.
                        let marker = (0, ZWNJ.to_string());
                        if self.unit.is_empty() {
                            return Some(marker);
                        }
                        self.queued = Some(marker);
                        return Some(self.take_unit());
                    }
                } else if cp <= '\u{FE0F}' {
                    // VS qualification of the former codepoint.
                    // Always overwrites the previous unit length.
                    self.unit.push(cp);
                    self.unitlen = (self.cells)(&self.unit, self.ctlsize, self.tabsize);
                    continue;
                } else if is_regional_indicator(cp) {
                    let mut tail = self.unit.chars().rev();
                    let last_ri = tail.next().is_some_and(is_regional_indicator);
                    if last_ri {
                        let former_ri = tail.next().is_some_and(is_regional_indicator);
                        if former_ri {
                            // Three consecutive RIs; break the unit.
                            let finished = self.take_unit();
                            self.unit.push(cp);
                            self.unitlen = (self.cells)(&self.unit, self.ctlsize, self.tabsize);
                            return Some(finished);
                        }
                        // Pair with the pending RI.
                        self.unit.push(cp);
                        self.unitlen = (self.cells)(&self.unit, self.ctlsize, self.tabsize);
                        continue;
                    }
                }
            }

            // Detect units by whether or not they increase the cell usage.
            // Zero-cell additions continue the unit until a change occurs.
            let mut ext = self.unit.clone();
            ext.push(cp);
            let extlen = self.measure(&ext);

            if !self.unit.is_empty() && extlen > self.unitlen {
                // Completed.
                let finished = self.take_unit();
                self.unit.push(cp);
                self.unitlen = (self.cells)(&self.unit, self.ctlsize, self.tabsize);
                return Some(finished);
            }
            // Continued.
            self.unit = ext;
            self.unitlen = extlen;
        }

        self.done = true;
        if self.unit.is_empty() {
            None
        } else {
            Some(self.take_unit())
        }
    }
}

/// Group character units by cell usage rate.
///
/// Produces `(cells, text)` pairs suitable for phrase construction; negative
/// cell counts mark a sole character unit (plural codepoint expressions and
/// control characters) that must not merge into a uniform-rate run.
pub fn words<I>(gi: I) -> impl Iterator<Item = (isize, String)>
where
    I: IntoIterator<Item = (usize, String)>,
{
    let mut current = 0usize;
    let mut chars = String::new();
    let mut count = 0usize;
    let mut out = Vec::new();

    for (cc, u) in gi {
        let plural = u.chars().count() > 1;
        if cc != current || plural {
            if count > 0 {
                out.push(((current * count) as isize, std::mem::take(&mut chars)));
                count = 0;
            }
            let control = !plural && u.chars().next().is_some_and(|c| (c as u32) < 32);
            if plural || control {
                out.push((-(cc as isize), u));
                current = 0;
            } else {
                chars.push_str(&u);
                count += 1;
                current = cc;
            }
        } else {
            chars.push_str(&u);
            count += 1;
        }
    }

    if count > 0 {
        out.push(((current * count) as isize, chars));
    }
    out.into_iter()
}
