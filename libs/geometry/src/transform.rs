//! Transformation types and traits.
//!
//! A [`Transformation`] is an affine map built from a uniform scale, a rotation,
//! an optional mirror and a translation, applied in that order. Transformations
//! are kept in floating point and only rounded to integer coordinates when applied
//! to a [`Point`], so cascading instance transforms never accumulates rounding error.

use approx::{AbsDiffEq, RelativeEq};
use impl_trait_for_tuples::impl_for_tuples;
use serde::{Deserialize, Serialize};

use crate::point::Point;

/// A mirror axis.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Mirror {
    /// No mirroring.
    #[default]
    No,
    /// Reflection about the x-axis, negating y-coordinates.
    X,
    /// Reflection about the y-axis, negating x-coordinates.
    Y,
    /// Reflection about both axes.
    XY,
}

impl Mirror {
    fn matrix(&self) -> [[f64; 2]; 2] {
        match self {
            Mirror::No => [[1., 0.], [0., 1.]],
            Mirror::X => [[1., 0.], [0., -1.]],
            Mirror::Y => [[-1., 0.], [0., 1.]],
            Mirror::XY => [[-1., 0.], [0., -1.]],
        }
    }
}

/// An affine transformation of the plane.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    /// The transformation matrix represented in row-major order.
    pub(crate) a: [[f64; 2]; 2],
    /// The x-y translation applied after the transformation.
    pub(crate) b: [f64; 2],
}

impl Default for Transformation {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transformation {
    /// Returns the identity transform, leaving any transformed object unmodified.
    pub const fn identity() -> Self {
        Self {
            a: [[1., 0.], [0., 1.]],
            b: [0., 0.],
        }
    }

    /// Creates a transformation from a row-major linear part `a` and a translation `b`.
    pub const fn from_matrix(a: [[f64; 2]; 2], b: [f64; 2]) -> Self {
        Self { a, b }
    }

    /// The row-major linear part.
    pub fn matrix(&self) -> [[f64; 2]; 2] {
        self.a
    }

    /// The translation part.
    pub fn offset(&self) -> [f64; 2] {
        self.b
    }

    /// Returns a translation by `(x,y)`.
    pub fn translate(x: f64, y: f64) -> Self {
        Self {
            a: [[1., 0.], [0., 1.]],
            b: [x, y],
        }
    }

    /// Returns a counter-clockwise rotation by `angle` radians about the origin.
    pub fn rotate(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            a: [[cos, -sin], [sin, cos]],
            b: [0., 0.],
        }
    }

    /// Returns a uniform scale about the origin.
    pub fn scale(factor: f64) -> Self {
        Self {
            a: [[factor, 0.], [0., factor]],
            b: [0., 0.],
        }
    }

    /// Returns a reflection about the given [`Mirror`] axis.
    pub fn mirror(mirror: Mirror) -> Self {
        Self {
            a: mirror.matrix(),
            b: [0., 0.],
        }
    }

    /// Creates a transformation that scales, rotates (radians, counter-clockwise),
    /// mirrors and finally translates by `offset`.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let t = Transformation::from_parts(2., std::f64::consts::FRAC_PI_2, Mirror::No, Point::new(10, 0));
    /// assert_eq!(t.apply(Point::new(1, 0)), Point::new(10, 2));
    /// ```
    pub fn from_parts(scale: f64, rotation: f64, mirror: Mirror, offset: Point) -> Self {
        let linear = Self::cascade(
            Self::mirror(mirror),
            Self::cascade(Self::rotate(rotation), Self::scale(scale)),
        );
        Self {
            a: linear.a,
            b: [offset.x as f64, offset.y as f64],
        }
    }

    /// Creates a transform from only an offset.
    pub fn from_offset(offset: Point) -> Self {
        Self::translate(offset.x as f64, offset.y as f64)
    }

    /// Create a new [`Transformation`] that is the cascade of `parent` and `child`.
    ///
    /// "Parents" and "children" refer to typical layout-instance hierarchies,
    /// in which each level of instance has a nested set of transformations relative
    /// to its top-level parent. The child is applied first.
    ///
    /// Note this operation *is not* commutative.
    pub fn cascade(parent: Transformation, child: Transformation) -> Transformation {
        let mut b = matvec(&parent.a, &child.b);
        b[0] += parent.b[0];
        b[1] += parent.b[1];
        let a = matmul(&parent.a, &child.a);
        Self { a, b }
    }

    /// Returns the inverse [`Transformation`] of `self`.
    ///
    /// Transformations built by this crate are never singular unless scaled by zero,
    /// in which case the inverse is `None`.
    pub fn inv(&self) -> Option<Transformation> {
        let det = self.det();
        if det == 0. {
            return None;
        }
        let a = [
            [self.a[1][1] / det, -self.a[0][1] / det],
            [-self.a[1][0] / det, self.a[0][0] / det],
        ];
        let b = matvec(&a, &self.b);
        Some(Self {
            a,
            b: [-b[0], -b[1]],
        })
    }

    /// The determinant of the linear part. Negative for mirrored transformations.
    pub fn det(&self) -> f64 {
        self.a[0][0] * self.a[1][1] - self.a[0][1] * self.a[1][0]
    }

    /// The uniform scale factor of the linear part.
    pub fn scale_factor(&self) -> f64 {
        self.det().abs().sqrt()
    }

    /// Returns `true` if the transformation flips orientation.
    pub fn is_mirrored(&self) -> bool {
        self.det() < 0.
    }

    /// Returns `true` if axis-aligned rectangles stay axis-aligned under this transformation.
    pub fn is_rectilinear(&self) -> bool {
        const EPS: f64 = 1e-12;
        (self.a[0][1].abs() < EPS && self.a[1][0].abs() < EPS)
            || (self.a[0][0].abs() < EPS && self.a[1][1].abs() < EPS)
    }

    /// Returns `true` if this is the identity transformation.
    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// The translation part, rounded to integer coordinates.
    pub fn offset_point(&self) -> Point {
        Point::round_from(self.b[0], self.b[1])
    }

    /// Applies the transformation to floating-point coordinates.
    pub fn apply_f64(&self, p: [f64; 2]) -> [f64; 2] {
        let mut v = matvec(&self.a, &p);
        v[0] += self.b[0];
        v[1] += self.b[1];
        v
    }

    /// Applies the transformation to `p`, rounding the result to the nearest integer point.
    pub fn apply(&self, p: Point) -> Point {
        let [x, y] = self.apply_f64(p.to_f64());
        Point::round_from(x, y)
    }
}

impl AbsDiffEq for Transformation {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        self.a
            .iter()
            .flatten()
            .zip(other.a.iter().flatten())
            .chain(self.b.iter().zip(other.b.iter()))
            .all(|(x, y)| x.abs_diff_eq(y, epsilon))
    }
}

impl RelativeEq for Transformation {
    fn default_max_relative() -> Self::Epsilon {
        f64::default_max_relative()
    }

    fn relative_eq(
        &self,
        other: &Self,
        epsilon: Self::Epsilon,
        max_relative: Self::Epsilon,
    ) -> bool {
        self.a
            .iter()
            .flatten()
            .zip(other.a.iter().flatten())
            .chain(self.b.iter().zip(other.b.iter()))
            .all(|(x, y)| x.relative_eq(y, epsilon, max_relative))
    }
}

fn matvec(a: &[[f64; 2]; 2], b: &[f64; 2]) -> [f64; 2] {
    [
        a[0][0] * b[0] + a[0][1] * b[1],
        a[1][0] * b[0] + a[1][1] * b[1],
    ]
}

fn matmul(a: &[[f64; 2]; 2], b: &[[f64; 2]; 2]) -> [[f64; 2]; 2] {
    [
        [
            a[0][0] * b[0][0] + a[0][1] * b[1][0],
            a[0][0] * b[0][1] + a[0][1] * b[1][1],
        ],
        [
            a[1][0] * b[0][0] + a[1][1] * b[1][0],
            a[1][0] * b[0][1] + a[1][1] * b[1][1],
        ],
    ]
}

/// A trait for specifying how an object is changed by a [`Transformation`].
#[impl_for_tuples(32)]
pub trait TransformMut {
    /// Applies matrix-vector [`Transformation`] `trans`.
    fn transform_mut(&mut self, trans: Transformation);
}

impl<T: TransformMut> TransformMut for Vec<T> {
    fn transform_mut(&mut self, trans: Transformation) {
        for i in self.iter_mut() {
            i.transform_mut(trans);
        }
    }
}

impl<T: TransformMut> TransformMut for Option<T> {
    fn transform_mut(&mut self, trans: Transformation) {
        if let Some(inner) = self.as_mut() {
            inner.transform_mut(trans);
        }
    }
}

/// A trait for specifying how an object is changed by a [`Transformation`].
///
/// Takes in an owned copy of the shape and returns the transformed version.
pub trait Transform: TransformMut + Sized {
    /// Applies matrix-vector [`Transformation`] `trans`.
    ///
    /// Creates a new shape at a location equal to the transformation of the original.
    #[inline]
    fn transform(mut self, trans: Transformation) -> Self {
        self.transform_mut(trans);
        self
    }
}

impl<T: TransformMut + Sized> Transform for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn cascade_identity_preserves_transformation() {
        let tf = Transformation::from_parts(1.5, 0.3, Mirror::Y, Point::new(520, 130));
        assert_eq!(Transformation::cascade(tf, Transformation::identity()), tf);
        assert_eq!(Transformation::cascade(Transformation::identity(), tf), tf);
    }

    #[test]
    fn cascade_is_associative() {
        let t1 = Transformation::from_parts(1., 0.7, Mirror::X, Point::new(1_000, -250));
        let t2 = Transformation::from_parts(2., -1.1, Mirror::No, Point::new(-30, 4_000));
        let t3 = Transformation::from_parts(0.5, PI, Mirror::XY, Point::new(17, 17));
        let left = Transformation::cascade(Transformation::cascade(t1, t2), t3);
        let right = Transformation::cascade(t1, Transformation::cascade(t2, t3));
        assert_relative_eq!(left, right, epsilon = 1e-9);
    }

    #[test]
    fn transformation_applies_in_documented_order() {
        // scale, then rotate, then mirror about the x-axis, then translate
        let t = Transformation::from_parts(2., FRAC_PI_2, Mirror::X, Point::new(100, 100));
        assert_eq!(t.apply(Point::new(10, 0)), Point::new(100, 80));
        assert!(t.is_mirrored());
        assert!(t.is_rectilinear());
    }

    #[test]
    fn inverse_round_trips_points() {
        let t = Transformation::from_parts(3., 0.4, Mirror::Y, Point::new(-700, 90));
        let inv = t.inv().unwrap();
        let p = Point::new(1234, -5678);
        assert_eq!(inv.apply(t.apply(p)), p);
        assert_relative_eq!(
            Transformation::cascade(t, inv),
            Transformation::identity(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn scale_factor_ignores_rotation_and_mirror() {
        let t = Transformation::from_parts(4., 1.0, Mirror::XY, Point::zero());
        assert_relative_eq!(t.scale_factor(), 4., epsilon = 1e-12);
        assert!(Transformation::scale(0.).inv().is_none());
    }
}
