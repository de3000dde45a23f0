//! Cell-oriented text representation.
//!
//! This crate carries the presentation half of the text pipeline: character
//! unit recognition over codepoint streams (`grapheme`), the styled
//! `Phrase` segmentation with its three coordinate systems (`phrase`), and
//! the view-local `Image` phrase cache (`image`).
//!
//! Nothing here touches document storage; the document model consumes these
//! types when composing lines for display.

pub mod grapheme;
pub mod image;
pub mod phrase;

pub use grapheme::{graphemes, unit_width, words};
pub use image::{Image, Whence};
pub use phrase::{Cell, Glyph, Measure, ORIGIN, Phrase, Segment, cp_slice, redirect_exceptions};
