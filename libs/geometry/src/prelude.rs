//! An import prelude that re-exports commonly used items.

pub use crate::bbox::Bbox;
pub use crate::collide::Collide;
pub use crate::contains::{Containment, Contains, EdgeInclusion};
pub use crate::point::Point;
pub use crate::polygon::{Polygon, PolygonWithHoles};
pub use crate::rect::Rect;
pub use crate::shape::Shape;
pub use crate::transform::{Mirror, Transform, TransformMut, Transformation};
pub use crate::union::BoundingUnion;
pub use crate::units::CoordUnits;
