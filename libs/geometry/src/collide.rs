//! Pairwise collision tests with an optional clearance margin.

use crate::bbox::Bbox;
use crate::point::Point;
use crate::polygon::{on_segment, Polygon};
use crate::rect::Rect;
use crate::shape::Shape;

/// Tests whether two shapes come within `margin` database units of each other.
///
/// Shapes that touch collide at a margin of zero. Every non-empty shape collides
/// with itself, and shapes with bounding boxes farther apart than `margin` never collide.
///
/// # Examples
///
/// ```
/// # use geometry::prelude::*;
/// let a = Rect::from_sides(0, 0, 10, 10);
/// let b = Rect::from_sides(15, 0, 25, 10);
/// assert!(!a.collides(&b, 0));
/// assert!(a.collides(&b, 5));
/// assert!(a.collides(&a, 0));
/// ```
pub trait Collide<T: ?Sized = Self> {
    /// Returns `true` if `self` and `other` are within `margin` of each other.
    fn collides(&self, other: &T, margin: i64) -> bool;
}

impl Collide for Rect {
    fn collides(&self, other: &Rect, margin: i64) -> bool {
        self.expand_all(margin.max(0))
            .intersection(*other)
            .is_some()
    }
}

impl Collide for Polygon {
    fn collides(&self, other: &Polygon, margin: i64) -> bool {
        let margin = margin.max(0);
        let (Some(ba), Some(bb)) = (self.bbox(), other.bbox()) else {
            return false;
        };
        if !ba.collides(&bb, margin) {
            return false;
        }
        for (a0, a1) in self.edges() {
            for (b0, b1) in other.edges() {
                if segments_intersect(a0, a1, b0, b1) {
                    return true;
                }
            }
        }
        let inside = |outer: &Polygon, inner: &Polygon| {
            inner
                .points()
                .first()
                .map(|p| outer.contains_point(*p))
                .unwrap_or(false)
        };
        if inside(self, other) || inside(other, self) {
            return true;
        }
        if margin == 0 {
            return false;
        }
        let m = margin as f64;
        self.edges().any(|(a0, a1)| {
            other
                .edges()
                .any(|(b0, b1)| segment_distance(a0, a1, b0, b1) <= m)
        })
    }
}

impl Collide for Shape {
    fn collides(&self, other: &Shape, margin: i64) -> bool {
        if let (Shape::Rect(a), Shape::Rect(b)) = (self, other) {
            return a.collides(b, margin);
        }
        let (pa, pb) = (self.to_polygon_with_holes(), other.to_polygon_with_holes());
        if !pa.outline.collides(&pb.outline, margin) {
            return false;
        }
        // A shape lying entirely inside the other's hole does not collide with it.
        let in_hole = |holes: &[Polygon], outline: &Polygon| {
            holes.iter().any(|h| {
                outline.points().iter().all(|p| h.contains_point(*p))
                    && !h.collides_boundary(outline, margin)
            })
        };
        !(in_hole(pa.holes.as_slice(), &pb.outline) || in_hole(pb.holes.as_slice(), &pa.outline))
    }
}

impl Polygon {
    fn collides_boundary(&self, other: &Polygon, margin: i64) -> bool {
        let m = margin.max(0) as f64;
        self.edges().any(|(a0, a1)| {
            other
                .edges()
                .any(|(b0, b1)| segment_distance(a0, a1, b0, b1) <= m)
        })
    }
}

/// Exact test for closed segments `ab` and `cd` sharing at least one point.
pub(crate) fn segments_intersect(a: Point, b: Point, c: Point, d: Point) -> bool {
    let d1 = c.cross(d, a).signum();
    let d2 = c.cross(d, b).signum();
    let d3 = a.cross(b, c).signum();
    let d4 = a.cross(b, d).signum();
    if d1 * d2 < 0 && d3 * d4 < 0 {
        return true;
    }
    on_segment(c, d, a) || on_segment(c, d, b) || on_segment(a, b, c) || on_segment(a, b, d)
}

fn point_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let [px, py] = p.to_f64();
    let [ax, ay] = a.to_f64();
    let [bx, by] = b.to_f64();
    let (dx, dy) = (bx - ax, by - ay);
    let len2 = dx * dx + dy * dy;
    let t = if len2 == 0. {
        0.
    } else {
        (((px - ax) * dx + (py - ay) * dy) / len2).clamp(0., 1.)
    };
    (px - (ax + t * dx)).hypot(py - (ay + t * dy))
}

fn segment_distance(a0: Point, a1: Point, b0: Point, b1: Point) -> f64 {
    if segments_intersect(a0, a1, b0, b1) {
        return 0.;
    }
    point_segment_distance(a0, b0, b1)
        .min(point_segment_distance(a1, b0, b1))
        .min(point_segment_distance(b0, a0, a1))
        .min(point_segment_distance(b1, a0, a1))
}
