//! View and layout model: refractions over resources, alignment math for
//! incremental scrolling, and the frame pane grid.

pub mod alignment;
pub mod area;
pub mod cursor;
pub mod frame;
pub mod refraction;

pub use alignment::CellCopy;
pub use area::Area;
pub use cursor::{CursorPalette, CursorShape, cursor_line_cells};
pub use frame::{BorderFill, Division, Indicator, Model, Section, Side};
pub use refraction::{ControlMode, Instruction, LineSource, Refraction, Status};
