//! Bounding unions of geometric objects.

use crate::bbox::Bbox;
use crate::rect::Rect;

/// Computes the smallest shape of type [`BoundingUnion::Output`]
/// containing both `self` and `other`.
///
/// # Examples
///
/// ```
/// # use geometry::prelude::*;
/// let a = Rect::from_sides(0, 0, 10, 10);
/// let b = Rect::from_sides(20, -5, 30, 5);
/// assert_eq!(a.bounding_union(&b), Rect::from_sides(0, -5, 30, 10));
///
/// let none: Option<Rect> = None;
/// assert_eq!(none.bounding_union(&a), Some(a));
/// ```
pub trait BoundingUnion<T: ?Sized> {
    /// The type of the bounding shape.
    type Output;
    /// Computes the bounding union of `self` and `other`.
    fn bounding_union(&self, other: &T) -> Self::Output;
}

impl<T: Bbox> BoundingUnion<T> for Option<Rect> {
    type Output = Option<Rect>;

    fn bounding_union(&self, other: &T) -> Self::Output {
        match (*self, other.bbox()) {
            (Some(a), Some(b)) => Some(a.union(b)),
            (Some(a), None) => Some(a),
            (None, b) => b,
        }
    }
}
