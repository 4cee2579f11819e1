//! 2-D geometric operations relevant to electronic packaging layout.
//!
//! Coordinates are stored as integer database units. Conversion to
//! floating-point user units happens only through [`CoordUnits`](crate::units::CoordUnits).
//!
//! # Examples
//!
//! Create a [rectangle](crate::rect::Rect):
//!
//! ```
//! # use geometry::prelude::*;
//! let rect = Rect::from_sides(10, 20, 30, 40);
//! assert_eq!(rect.area(), 400);
//! ```
#![warn(missing_docs)]

pub mod bbox;
pub mod collide;
pub mod contains;
pub mod point;
pub mod polygon;
pub mod prelude;
pub mod rect;
pub mod shape;
pub mod transform;
pub mod union;
pub mod units;
