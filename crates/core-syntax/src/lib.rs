//! Syntax types: field classification, keyword profiles, themes, and the
//! reformulations bundle binding them to a line form and segmenter.

pub mod fields;
pub mod profile;
pub mod reformulations;
pub mod theme;

pub use fields::{Field, FieldClass};
pub use profile::{Pair, Profile};
pub use reformulations::Reformulations;
pub use theme::{Theme, palette};
