//! 2-D points.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use crate::transform::{TransformMut, Transformation};

/// A point in two-dimensional space, in database units.
#[derive(
    Debug, Copy, Clone, Default, Hash, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord,
)]
pub struct Point {
    /// The x-coordinate of the point.
    pub x: i64,
    /// The y-coordinate of the point.
    pub y: i64,
}

impl Point {
    /// Creates a new [`Point`] from (x,y) coordinates.
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Returns the origin, `(0, 0)`.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let origin = Point::zero();
    /// assert_eq!(origin, Point::new(0, 0));
    /// ```
    #[inline]
    pub const fn zero() -> Self {
        Self { x: 0, y: 0 }
    }

    /// Creates a point by rounding floating-point coordinates to the nearest integer.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// assert_eq!(Point::round_from(1.5, -2.4), Point::new(2, -2));
    /// ```
    #[inline]
    pub fn round_from(x: f64, y: f64) -> Self {
        Self::new(x.round() as i64, y.round() as i64)
    }

    /// Returns the coordinates as a floating-point pair.
    #[inline]
    pub fn to_f64(self) -> [f64; 2] {
        [self.x as f64, self.y as f64]
    }

    /// The squared euclidean distance to `other`.
    pub fn dist2(&self, other: Point) -> i128 {
        let dx = (self.x - other.x) as i128;
        let dy = (self.y - other.y) as i128;
        dx * dx + dy * dy
    }

    /// The euclidean distance to `other`.
    pub fn dist(&self, other: Point) -> f64 {
        (self.dist2(other) as f64).sqrt()
    }

    /// The z-component of the cross product `(a - self) x (b - self)`.
    ///
    /// Positive if `self`, `a`, `b` turn counter-clockwise.
    pub fn cross(&self, a: Point, b: Point) -> i128 {
        let (ax, ay) = ((a.x - self.x) as i128, (a.y - self.y) as i128);
        let (bx, by) = ((b.x - self.x) as i128, (b.y - self.y) as i128);
        ax * by - ay * bx
    }
}

impl From<(i64, i64)> for Point {
    fn from(value: (i64, i64)) -> Self {
        Self::new(value.0, value.1)
    }
}

impl Add<Point> for Point {
    type Output = Self;
    fn add(self, rhs: Point) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign<Point> for Point {
    fn add_assign(&mut self, rhs: Point) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub<Point> for Point {
    type Output = Self;
    fn sub(self, rhs: Point) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign<Point> for Point {
    fn sub_assign(&mut self, rhs: Point) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Neg for Point {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y)
    }
}

impl TransformMut for Point {
    fn transform_mut(&mut self, trans: Transformation) {
        *self = trans.apply(*self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_sign_follows_orientation() {
        let o = Point::zero();
        assert!(o.cross(Point::new(10, 0), Point::new(0, 10)) > 0);
        assert!(o.cross(Point::new(0, 10), Point::new(10, 0)) < 0);
        assert_eq!(o.cross(Point::new(5, 5), Point::new(10, 10)), 0);
    }

    #[test]
    fn point_arithmetic() {
        let mut p = Point::new(3, 4) + Point::new(1, 1);
        p -= Point::new(4, 5);
        assert_eq!(p, Point::zero());
        assert_eq!(Point::new(3, 4).dist(Point::zero()), 5.);
    }
}
