//! Integer coordinate polygons and polygons with holes.

use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

use crate::bbox::Bbox;
use crate::contains::{Containment, Contains, EdgeInclusion};
use crate::point::Point;
use crate::rect::Rect;
use crate::transform::{TransformMut, Transformation};

/// A simple polygon, with vertex coordinates given in database units.
///
/// The closing edge from the last vertex back to the first is implicit.
#[derive(Debug, Default, Clone, Hash, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Polygon {
    points: Vec<Point>,
}

impl Polygon {
    /// Creates a polygon with given vertices.
    pub fn from_verts(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Creates a four-vertex polygon covering `rect`, in counter-clockwise order.
    pub fn rect(rect: Rect) -> Self {
        Self::from_verts(rect.corners().to_vec())
    }

    /// Approximates a circle by a regular polygon with `div` vertices.
    ///
    /// `div` is clamped to at least 3.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let circle = Polygon::circle(Point::zero(), 1_000, 16);
    /// assert_eq!(circle.points().len(), 16);
    /// assert!(circle.contains_point(Point::new(0, 0)));
    /// assert!(!circle.contains_point(Point::new(1_001, 0)));
    /// ```
    pub fn circle(center: Point, radius: i64, div: usize) -> Self {
        let div = div.max(3);
        let r = radius as f64;
        let points = (0..div)
            .map(|i| {
                let theta = TAU * i as f64 / div as f64;
                Point::round_from(
                    center.x as f64 + r * theta.cos(),
                    center.y as f64 + r * theta.sin(),
                )
            })
            .collect();
        Self { points }
    }

    /// Replaces every corner with a circular arc of the given radius.
    ///
    /// `div` is the number of segments a full circle would be divided into; each arc
    /// uses a proportional share. The radius is reduced at corners whose adjacent
    /// edges are too short to fit it. Collinear vertices are kept as they are.
    pub fn with_rounded_corners(&self, radius: i64, div: usize) -> Self {
        let n = self.points.len();
        if radius <= 0 || n < 3 {
            return self.clone();
        }
        let mut points = Vec::with_capacity(n * 4);
        for i in 0..n {
            let prev = self.points[(i + n - 1) % n].to_f64();
            let curr = self.points[i].to_f64();
            let next = self.points[(i + 1) % n].to_f64();
            match fillet(prev, curr, next, radius as f64, div.max(4)) {
                Some(arc) => points.extend(arc.into_iter().map(|[x, y]| Point::round_from(x, y))),
                None => points.push(self.points[i]),
            }
        }
        points.dedup();
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        Self { points }
    }

    /// The vertices of the polygon.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Consumes the polygon, returning its vertices.
    pub fn into_points(self) -> Vec<Point> {
        self.points
    }

    /// Iterates over the edges of the polygon, including the closing edge.
    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| (self.points[i], self.points[(i + 1) % n]))
    }

    /// Twice the signed area. Positive for counter-clockwise polygons.
    pub fn signed_area2(&self) -> i128 {
        self.edges()
            .map(|(a, b)| a.x as i128 * b.y as i128 - b.x as i128 * a.y as i128)
            .sum()
    }

    /// The enclosed area in square database units.
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let tri = Polygon::from_verts(vec![Point::new(0, 0), Point::new(10, 0), Point::new(0, 10)]);
    /// assert_eq!(tri.area(), 50.);
    /// ```
    pub fn area(&self) -> f64 {
        self.signed_area2().abs() as f64 / 2.
    }

    /// Returns `true` if the vertices are in counter-clockwise order.
    pub fn is_ccw(&self) -> bool {
        self.signed_area2() > 0
    }

    /// Returns `true` if the polygon has fewer than three vertices or encloses no area.
    pub fn is_degenerate(&self) -> bool {
        self.points.len() < 3 || self.signed_area2() == 0
    }

    /// Reverses vertex order in place.
    pub fn reverse(&mut self) {
        self.points.reverse();
    }

    /// Returns the polygon with counter-clockwise vertex order.
    pub fn normalized(mut self) -> Self {
        if self.signed_area2() < 0 {
            self.reverse();
        }
        self
    }

    /// The area centroid as floating-point coordinates.
    ///
    /// Falls back to the vertex average for degenerate polygons.
    pub fn centroid(&self) -> [f64; 2] {
        let a2 = self.signed_area2();
        if a2 == 0 {
            let n = self.points.len().max(1) as f64;
            let (sx, sy) = self
                .points
                .iter()
                .fold((0., 0.), |(sx, sy), p| (sx + p.x as f64, sy + p.y as f64));
            return [sx / n, sy / n];
        }
        let (mut cx, mut cy) = (0f64, 0f64);
        for (a, b) in self.edges() {
            let cross = a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64;
            cx += (a.x + b.x) as f64 * cross;
            cy += (a.y + b.y) as f64 * cross;
        }
        let a6 = 3. * a2 as f64;
        [cx / a6, cy / a6]
    }

    /// Returns `true` if `p` lies on one of the polygon's edges.
    pub fn on_boundary(&self, p: Point) -> bool {
        self.edges().any(|(a, b)| on_segment(a, b, p))
    }

    /// Returns `true` if `p` is inside the polygon or on its boundary.
    pub fn contains_point(&self, p: Point) -> bool {
        self.on_boundary(p) || winding_number(&self.points, 1, [p.x as i128, p.y as i128]) != 0
    }

    /// Returns `true` if floating-point coordinates `p` are inside the polygon.
    ///
    /// Points exactly on the boundary may be classified either way.
    pub fn contains_point_f64(&self, p: [f64; 2]) -> bool {
        let mut inside = false;
        for (a, b) in self.edges() {
            let (ax, ay, bx, by) = (a.x as f64, a.y as f64, b.x as f64, b.y as f64);
            if (ay > p[1]) != (by > p[1]) {
                let x = ax + (p[1] - ay) * (bx - ax) / (by - ay);
                if p[0] < x {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Tests whether `rect` lies inside the polygon.
    ///
    /// With [`EdgeInclusion::Inclusive`] the rectangle may touch the polygon boundary;
    /// with [`EdgeInclusion::Exclusive`] it must lie strictly inside.
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let poly = Polygon::rect(Rect::from_sides(0, 0, 100, 100));
    /// let touching = Rect::from_sides(0, 0, 50, 50);
    /// assert!(poly.contains_rect(touching, EdgeInclusion::Inclusive));
    /// assert!(!poly.contains_rect(touching, EdgeInclusion::Exclusive));
    /// ```
    pub fn contains_rect(&self, rect: Rect, inclusion: EdgeInclusion) -> bool {
        if rect.is_degenerate() {
            let corners_in = rect.corners().iter().all(|c| match inclusion {
                EdgeInclusion::Inclusive => self.contains_point(*c),
                EdgeInclusion::Exclusive => self.contains_point(*c) && !self.on_boundary(*c),
            });
            return corners_in && !self.edges().any(|(a, b)| crosses_open_rect(a, b, rect));
        }
        let blocked = match inclusion {
            EdgeInclusion::Inclusive => self.edges().any(|(a, b)| crosses_open_rect(a, b, rect)),
            EdgeInclusion::Exclusive => self
                .edges()
                .any(|(a, b)| clip_to_rect(a, b, rect).is_some()),
        };
        if blocked {
            return false;
        }
        // The rectangle interior is not cut by the boundary, so its center decides.
        let c2 = [
            rect.left() as i128 + rect.right() as i128,
            rect.bot() as i128 + rect.top() as i128,
        ];
        winding_number(&self.points, 2, c2) != 0
    }
}

impl Bbox for Polygon {
    fn bbox(&self) -> Option<Rect> {
        let mut iter = self.points.iter();
        let first = *iter.next()?;
        let (mut l, mut b, mut r, mut t) = (first.x, first.y, first.x, first.y);
        for p in iter {
            l = l.min(p.x);
            b = b.min(p.y);
            r = r.max(p.x);
            t = t.max(p.y);
        }
        Some(Rect::from_sides(l, b, r, t))
    }
}

impl Contains<Point> for Polygon {
    fn contains(&self, p: &Point) -> Containment {
        if self.contains_point(*p) {
            Containment::Full
        } else {
            Containment::None
        }
    }
}

impl Contains<Rect> for Polygon {
    fn contains(&self, rect: &Rect) -> Containment {
        if self.contains_rect(*rect, EdgeInclusion::Inclusive) {
            Containment::Full
        } else if self.edges().any(|(a, b)| crosses_open_rect(a, b, *rect)) {
            Containment::Partial
        } else {
            Containment::None
        }
    }
}

impl TransformMut for Polygon {
    fn transform_mut(&mut self, trans: Transformation) {
        self.points.transform_mut(trans);
        if trans.is_mirrored() {
            self.points.reverse();
        }
    }
}

/// A polygon outline with zero or more polygonal holes.
#[derive(Debug, Default, Clone, Hash, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolygonWithHoles {
    /// The outer boundary.
    pub outline: Polygon,
    /// Holes cut out of the outline.
    pub holes: Vec<Polygon>,
}

impl PolygonWithHoles {
    /// Creates a polygon with holes from an outline and a set of holes.
    pub fn new(outline: Polygon, holes: Vec<Polygon>) -> Self {
        Self { outline, holes }
    }

    /// The area of the outline minus the area of the holes.
    pub fn area(&self) -> f64 {
        self.outline.area() - self.holes.iter().map(Polygon::area).sum::<f64>()
    }

    /// Returns `true` if `p` lies in the solid region, including its boundary.
    pub fn contains_point(&self, p: Point) -> bool {
        self.outline.contains_point(p)
            && self
                .holes
                .iter()
                .all(|h| h.on_boundary(p) || !h.contains_point(p))
    }

    /// Tests whether `rect` lies in the solid region.
    pub fn contains_rect(&self, rect: Rect, inclusion: EdgeInclusion) -> bool {
        self.outline.contains_rect(rect, inclusion)
            && self.holes.iter().all(|h| {
                let blocked = h.edges().any(|(a, b)| match inclusion {
                    EdgeInclusion::Inclusive => crosses_open_rect(a, b, rect),
                    EdgeInclusion::Exclusive => clip_to_rect(a, b, rect).is_some(),
                });
                !blocked && !h.contains_rect(rect, EdgeInclusion::Exclusive)
            })
    }
}

impl Bbox for PolygonWithHoles {
    fn bbox(&self) -> Option<Rect> {
        self.outline.bbox()
    }
}

impl TransformMut for PolygonWithHoles {
    fn transform_mut(&mut self, trans: Transformation) {
        self.outline.transform_mut(trans);
        self.holes.transform_mut(trans);
    }
}

/// Winding number of `p` with respect to the polygon scaled by `scale`.
fn winding_number(points: &[Point], scale: i128, p: [i128; 2]) -> i32 {
    let n = points.len();
    let mut wn = 0;
    for i in 0..n {
        let a = [points[i].x as i128 * scale, points[i].y as i128 * scale];
        let j = (i + 1) % n;
        let b = [points[j].x as i128 * scale, points[j].y as i128 * scale];
        let is_left = (b[0] - a[0]) * (p[1] - a[1]) - (p[0] - a[0]) * (b[1] - a[1]);
        if a[1] <= p[1] {
            if b[1] > p[1] && is_left > 0 {
                wn += 1;
            }
        } else if b[1] <= p[1] && is_left < 0 {
            wn -= 1;
        }
    }
    wn
}

pub(crate) fn on_segment(a: Point, b: Point, p: Point) -> bool {
    a.cross(b, p) == 0
        && p.x >= a.x.min(b.x)
        && p.x <= a.x.max(b.x)
        && p.y >= a.y.min(b.y)
        && p.y <= a.y.max(b.y)
}

/// Clips segment `ab` to the closed rectangle, returning the parametric range kept.
fn clip_to_rect(a: Point, b: Point, rect: Rect) -> Option<(f64, f64)> {
    let (ax, ay) = (a.x as f64, a.y as f64);
    let (dx, dy) = ((b.x - a.x) as f64, (b.y - a.y) as f64);
    let mut t0 = 0f64;
    let mut t1 = 1f64;
    let checks = [
        (-dx, ax - rect.left() as f64),
        (dx, rect.right() as f64 - ax),
        (-dy, ay - rect.bot() as f64),
        (dy, rect.top() as f64 - ay),
    ];
    for (p, q) in checks {
        if p == 0. {
            if q < 0. {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0. {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
        }
    }
    (t0 <= t1).then_some((t0, t1))
}

/// Returns `true` if segment `ab` passes through the open interior of `rect`.
pub(crate) fn crosses_open_rect(a: Point, b: Point, rect: Rect) -> bool {
    let Some((t0, t1)) = clip_to_rect(a, b, rect) else {
        return false;
    };
    let t = 0.5 * (t0 + t1);
    let x = a.x as f64 + t * (b.x - a.x) as f64;
    let y = a.y as f64 + t * (b.y - a.y) as f64;
    x > rect.left() as f64 && x < rect.right() as f64 && y > rect.bot() as f64 && y < rect.top() as f64
}

/// Arc points replacing corner `curr`, or `None` if the corner is straight.
fn fillet(
    prev: [f64; 2],
    curr: [f64; 2],
    next: [f64; 2],
    radius: f64,
    div: usize,
) -> Option<Vec<[f64; 2]>> {
    let u = [prev[0] - curr[0], prev[1] - curr[1]];
    let v = [next[0] - curr[0], next[1] - curr[1]];
    let (lu, lv) = (u[0].hypot(u[1]), v[0].hypot(v[1]));
    if lu == 0. || lv == 0. {
        return None;
    }
    let (u, v) = ([u[0] / lu, u[1] / lu], [v[0] / lv, v[1] / lv]);
    let theta = (u[0] * v[0] + u[1] * v[1]).clamp(-1., 1.).acos();
    if theta < 1e-9 || (PI - theta) < 1e-9 {
        return None;
    }
    let half = 0.5 * theta;
    let d = (radius / half.tan()).min(0.5 * lu.min(lv));
    let r = d * half.tan();
    let bis = [u[0] + v[0], u[1] + v[1]];
    let lb = bis[0].hypot(bis[1]);
    let dc = r / half.sin();
    let c = [curr[0] + bis[0] / lb * dc, curr[1] + bis[1] / lb * dc];
    let t1 = [curr[0] + u[0] * d, curr[1] + u[1] * d];
    let t2 = [curr[0] + v[0] * d, curr[1] + v[1] * d];
    let a1 = (t1[1] - c[1]).atan2(t1[0] - c[0]);
    let a2 = (t2[1] - c[1]).atan2(t2[0] - c[0]);
    let mut sweep = a2 - a1;
    while sweep > PI {
        sweep -= TAU;
    }
    while sweep < -PI {
        sweep += TAU;
    }
    let segs = ((sweep.abs() / TAU) * div as f64).ceil().max(1.) as usize;
    Some(
        (0..=segs)
            .map(|k| {
                let a = a1 + sweep * k as f64 / segs as f64;
                [c[0] + r * a.cos(), c[1] + r * a.sin()]
            })
            .collect(),
    )
}
