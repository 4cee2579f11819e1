//! Imprint-grid 2-D triangle meshing.
//!
//! A mesh is generated from a set of imprint lines: every vertex of the boundary and of
//! the imprinted shapes contributes a vertical and a horizontal line. Lines closer than
//! the merge distance collapse, long intervals are split, and cells with a poor aspect
//! ratio are refined. A grid cell whose center lies inside the boundary becomes two
//! counter-clockwise triangles. Cells crossed by a slanted shape edge are cut along it
//! into convex pieces, and each piece inside the boundary is fanned around its center.

use std::collections::HashMap;

use geometry::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::settings::{FRect, MeshSettings};

/// A triangle mesh in user units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh2D {
    /// The vertices.
    pub points: Vec<[f64; 2]>,
    /// The triangles as counter-clockwise vertex indices.
    pub triangles: Vec<[usize; 3]>,
}

impl Mesh2D {
    /// The number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// The corners of triangle `t`.
    pub fn vertices(&self, t: usize) -> [[f64; 2]; 3] {
        let [a, b, c] = self.triangles[t];
        [self.points[a], self.points[b], self.points[c]]
    }

    /// The area of triangle `t`.
    pub fn area(&self, t: usize) -> f64 {
        triangle_area(&self.vertices(t))
    }

    /// The centroid of triangle `t`.
    pub fn centroid(&self, t: usize) -> [f64; 2] {
        let [a, b, c] = self.vertices(t);
        [(a[0] + b[0] + c[0]) / 3., (a[1] + b[1] + c[1]) / 3.]
    }

    /// The bounding box of triangle `t`.
    pub fn bbox(&self, t: usize) -> FRect {
        let [a, b, c] = self.vertices(t);
        FRect {
            left: a[0].min(b[0]).min(c[0]),
            bot: a[1].min(b[1]).min(c[1]),
            right: a[0].max(b[0]).max(c[0]),
            top: a[1].max(b[1]).max(c[1]),
        }
    }

    /// Returns `true` if `p` lies in triangle `t`, edges included.
    pub fn contains(&self, t: usize, p: [f64; 2]) -> bool {
        let [a, b, c] = self.vertices(t);
        let scale = triangle_area(&[a, b, c]).abs().sqrt().max(f64::MIN_POSITIVE);
        let eps = -1e-9 * scale * scale;
        cross(a, b, p) >= eps && cross(b, c, p) >= eps && cross(c, a, p) >= eps
    }

    /// Finds a triangle containing `p`.
    pub fn locate(&self, p: [f64; 2]) -> Option<usize> {
        (0..self.triangles.len()).find(|&t| self.bbox(t).contains(p) && self.contains(t, p))
    }

    /// The length of edge `e` of triangle `t`, running from corner `e` to corner `e + 1`.
    pub fn edge_length(&self, t: usize, e: usize) -> f64 {
        let v = self.vertices(t);
        dist(v[e], v[(e + 1) % 3])
    }

    /// The distance from `p` to the line through edge `e` of triangle `t`.
    pub fn distance_to_edge(&self, t: usize, e: usize, p: [f64; 2]) -> f64 {
        let v = self.vertices(t);
        let (a, b) = (v[e], v[(e + 1) % 3]);
        let len = dist(a, b);
        if len == 0. {
            return dist(a, p);
        }
        cross(a, b, p).abs() / len
    }

    /// The neighbor across each edge of every triangle.
    ///
    /// Edge `e` of a triangle runs from corner `e` to corner `e + 1`.
    pub fn neighbors(&self) -> Vec<[Option<usize>; 3]> {
        let mut edges: HashMap<(usize, usize), (usize, usize)> = HashMap::new();
        let mut out = vec![[None; 3]; self.triangles.len()];
        for (t, tri) in self.triangles.iter().enumerate() {
            for e in 0..3 {
                let (a, b) = (tri[e], tri[(e + 1) % 3]);
                let key = (a.min(b), a.max(b));
                if let Some((other, oe)) = edges.remove(&key) {
                    out[t][e] = Some(other);
                    out[other][oe] = Some(t);
                } else {
                    edges.insert(key, (t, e));
                }
            }
        }
        out
    }

    /// The smallest interior angle of triangle `t` in degrees.
    pub fn min_angle(&self, t: usize) -> f64 {
        let v = self.vertices(t);
        (0..3)
            .map(|k| {
                let (p, a, b) = (v[k], v[(k + 1) % 3], v[(k + 2) % 3]);
                let (u, w) = ([a[0] - p[0], a[1] - p[1]], [b[0] - p[0], b[1] - p[1]]);
                let cos = (u[0] * w[0] + u[1] * w[1]) / (dist(p, a) * dist(p, b));
                cos.clamp(-1., 1.).acos().to_degrees()
            })
            .fold(180., f64::min)
    }

    /// The total area of the mesh.
    pub fn total_area(&self) -> f64 {
        (0..self.triangles.len()).map(|t| self.area(t)).sum()
    }
}

/// Lines and segments to imprint into a mesh, in user units.
#[derive(Debug, Clone, Default)]
pub struct ImprintLines {
    xs: Vec<f64>,
    ys: Vec<f64>,
    segments: Vec<[[f64; 2]; 2]>,
}

impl ImprintLines {
    /// Imprints every vertex and every slanted edge of a shape in database units.
    pub fn add_shape(&mut self, shape: &Shape, units: CoordUnits) {
        let outline = shape.outline();
        let to_unit = |p: Point| [units.to_unit(p.x), units.to_unit(p.y)];
        for ring in std::iter::once(&outline).chain(shape.holes()) {
            for (a, b) in ring.edges() {
                let (a, b) = (to_unit(a), to_unit(b));
                self.add_point(a);
                if a[0] != b[0] && a[1] != b[1] {
                    self.segments.push([a, b]);
                }
            }
        }
    }

    /// Imprints the edges of a box.
    pub fn add_rect(&mut self, rect: &FRect) {
        self.xs.extend([rect.left, rect.right]);
        self.ys.extend([rect.bot, rect.top]);
    }

    /// Imprints a point.
    pub fn add_point(&mut self, p: [f64; 2]) {
        self.xs.push(p[0]);
        self.ys.push(p[1]);
    }

    /// Imprints every line and segment of `other`.
    pub fn extend(&mut self, other: &ImprintLines) {
        self.xs.extend_from_slice(&other.xs);
        self.ys.extend_from_slice(&other.ys);
        self.segments.extend_from_slice(&other.segments);
    }
}

/// Meshes the region inside `boundary`, a shape in database units.
///
/// Grid cells crossed by a slanted imprint segment are cut along it, so triangle edges follow
/// rotated and curved outlines. The angle bound applies to the uncut grid cells.
pub fn generate_mesh(
    boundary: &Shape,
    units: CoordUnits,
    lines: &ImprintLines,
    settings: &MeshSettings,
) -> Result<Mesh2D> {
    let bbox = boundary
        .bbox()
        .filter(|b| !b.is_degenerate())
        .ok_or_else(|| Error::Mesh("boundary is empty".into()))?;
    let lo = [units.to_unit(bbox.left()), units.to_unit(bbox.bot())];
    let hi = [units.to_unit(bbox.right()), units.to_unit(bbox.top())];

    let clamp = |v: &[f64], lo: f64, hi: f64| -> Vec<f64> {
        v.iter()
            .copied()
            .filter(|x| x.is_finite())
            .map(|x| x.clamp(lo, hi))
            .chain([lo, hi])
            .collect()
    };
    let merge = settings.merge_distance();
    let xs = split_long(&merge_lines(clamp(&lines.xs, lo[0], hi[0]), merge), settings.max_len);
    let ys = split_long(&merge_lines(clamp(&lines.ys, lo[1], hi[1]), merge), settings.max_len);

    let to_db = 1. / units.scale2unit();
    let inside = |p: [f64; 2]| boundary.contains_point_f64([p[0] * to_db, p[1] * to_db]);
    let (xs, ys) = refine_grid(xs, ys, settings, |x0, x1, y0, y1| {
        inside([(x0 + x1) / 2., (y0 + y1) / 2.])
    });

    let extent = (hi[0] - lo[0]).max(hi[1] - lo[1]);
    let min_cut = merge.max(1e-9 * extent);
    let mut cuts: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
    for (s, [a, b]) in lines.segments.iter().enumerate() {
        if !(a.iter().chain(b).all(|v| v.is_finite())) {
            continue;
        }
        for i in cell_span(&xs, a[0].min(b[0]), a[0].max(b[0])) {
            for j in cell_span(&ys, a[1].min(b[1]), a[1].max(b[1])) {
                let cell = [xs[i], ys[j], xs[i + 1], ys[j + 1]];
                if clipped_length(*a, *b, cell) > min_cut {
                    cuts.entry((i, j)).or_default().push(s);
                }
            }
        }
    }

    let mut mesh = Mesh2D::default();
    let quantum = 1e-9 * extent.max(f64::MIN_POSITIVE);
    let mut index: HashMap<(i64, i64), usize> = HashMap::new();
    let mut vertex = |mesh: &mut Mesh2D, p: [f64; 2]| -> usize {
        let key = ((p[0] / quantum).round() as i64, (p[1] / quantum).round() as i64);
        *index.entry(key).or_insert_with(|| {
            mesh.points.push(p);
            mesh.points.len() - 1
        })
    };
    let min_area = 1e-12 * extent * extent;
    for i in 0..xs.len() - 1 {
        for j in 0..ys.len() - 1 {
            let corners = vec![
                [xs[i], ys[j]],
                [xs[i + 1], ys[j]],
                [xs[i + 1], ys[j + 1]],
                [xs[i], ys[j + 1]],
            ];
            let Some(segments) = cuts.get(&(i, j)) else {
                if !inside([(xs[i] + xs[i + 1]) / 2., (ys[j] + ys[j + 1]) / 2.]) {
                    continue;
                }
                let [p00, p10, p11, p01] = [0, 1, 2, 3].map(|k| vertex(&mut mesh, corners[k]));
                mesh.triangles.push([p00, p10, p11]);
                mesh.triangles.push([p00, p11, p01]);
                continue;
            };
            let mut pieces = vec![corners];
            for &s in segments {
                let [a, b] = lines.segments[s];
                pieces = pieces
                    .into_iter()
                    .flat_map(|piece| split_convex(&piece, a, b, min_cut))
                    .collect();
            }
            for piece in pieces {
                let center = polygon_centroid(&piece);
                if polygon_area(&piece) <= min_area || !inside(center) {
                    continue;
                }
                let c = vertex(&mut mesh, center);
                let ring: Vec<usize> = piece.iter().map(|&p| vertex(&mut mesh, p)).collect();
                for k in 0..ring.len() {
                    let (u, v) = (ring[k], ring[(k + 1) % ring.len()]);
                    let tri = [c, u, v];
                    if u != v && triangle_area(&tri.map(|n| mesh.points[n])) > min_area {
                        mesh.triangles.push(tri);
                    }
                }
            }
        }
    }
    if mesh.triangles.is_empty() {
        return Err(Error::Mesh("no mesh cell lies inside the boundary".into()));
    }
    tracing::debug!(
        points = mesh.points.len(),
        triangles = mesh.triangles.len(),
        cut_cells = cuts.len(),
        "generated mesh"
    );
    Ok(mesh)
}

/// Grid refinement passes when [`MeshSettings::iteration`] is zero.
const MAX_REFINEMENT_PASSES: usize = 32;

/// Bisects grid intervals until every grid cell inside the boundary splits into triangles
/// whose smallest angle is at least `min_alpha`, or no cell can be split above `min_len`.
fn refine_grid(
    mut xs: Vec<f64>,
    mut ys: Vec<f64>,
    settings: &MeshSettings,
    inside: impl Fn(f64, f64, f64, f64) -> bool,
) -> (Vec<f64>, Vec<f64>) {
    let min_ratio = settings.min_alpha.to_radians().tan();
    let passes = match settings.iteration {
        0 => MAX_REFINEMENT_PASSES,
        n => n,
    };
    for pass in 0..passes {
        let mut split_x = vec![false; xs.len() - 1];
        let mut split_y = vec![false; ys.len() - 1];
        for i in 0..xs.len() - 1 {
            for j in 0..ys.len() - 1 {
                let (w, h) = (xs[i + 1] - xs[i], ys[j + 1] - ys[j]);
                if w.min(h) >= min_ratio * w.max(h) || !inside(xs[i], xs[i + 1], ys[j], ys[j + 1]) {
                    continue;
                }
                if w > h && w / 2. >= settings.min_len {
                    split_x[i] = true;
                } else if h >= w && h / 2. >= settings.min_len {
                    split_y[j] = true;
                }
            }
        }
        if !split_x.contains(&true) && !split_y.contains(&true) {
            return (xs, ys);
        }
        tracing::trace!(pass, "refining mesh for minimum angle");
        xs = split_marked(&xs, &split_x);
        ys = split_marked(&ys, &split_y);
    }
    tracing::debug!(passes, "mesh refinement stopped at the pass limit");
    (xs, ys)
}

/// Sorts lines and merges any line within `eps` of the previous kept line.
///
/// The outermost lines are always kept.
fn merge_lines(mut v: Vec<f64>, eps: f64) -> Vec<f64> {
    v.sort_by(f64::total_cmp);
    v.dedup();
    let (Some(&lo), Some(&hi)) = (v.first(), v.last()) else {
        return v;
    };
    let mut out = vec![lo];
    for x in v {
        if let Some(&last) = out.last() {
            if x - last > eps {
                out.push(x);
            }
        }
    }
    let (n, last) = (out.len(), out.last().copied());
    match last {
        Some(last) if last < hi && n > 1 => out[n - 1] = hi,
        Some(last) if last < hi => out.push(hi),
        _ => {}
    }
    out
}

fn split_long(v: &[f64], max_len: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(v.len());
    for w in v.windows(2) {
        let len = w[1] - w[0];
        let n = (len / max_len).ceil().max(1.).min(1e6) as usize;
        for k in 0..n {
            out.push(w[0] + len * k as f64 / n as f64);
        }
    }
    out.extend(v.last());
    out
}

fn split_marked(v: &[f64], marked: &[bool]) -> Vec<f64> {
    let mut out = Vec::with_capacity(v.len() * 2);
    for (w, split) in v.windows(2).zip(marked) {
        out.push(w[0]);
        if *split {
            out.push((w[0] + w[1]) / 2.);
        }
    }
    out.extend(v.last());
    out
}

/// The grid cells of `lines` whose interval overlaps `[lo, hi]`.
fn cell_span(lines: &[f64], lo: f64, hi: f64) -> std::ops::Range<usize> {
    let start = lines.partition_point(|&x| x <= lo).saturating_sub(1);
    let end = lines.partition_point(|&x| x < hi).min(lines.len() - 1);
    start..end.max(start)
}

/// The length of segment `ab` inside `[left, bot, right, top]`.
fn clipped_length(a: [f64; 2], b: [f64; 2], cell: [f64; 4]) -> f64 {
    let d = [b[0] - a[0], b[1] - a[1]];
    let (mut t0, mut t1) = (0f64, 1f64);
    for axis in 0..2 {
        let (lo, hi) = (cell[axis], cell[axis + 2]);
        if d[axis] == 0. {
            if a[axis] < lo || a[axis] > hi {
                return 0.;
            }
            continue;
        }
        let (u, v) = ((lo - a[axis]) / d[axis], (hi - a[axis]) / d[axis]);
        t0 = t0.max(u.min(v));
        t1 = t1.min(u.max(v));
    }
    (t1 - t0).max(0.) * dist(a, b)
}

/// Splits a counter-clockwise convex polygon by the line through `a` and `b`.
///
/// Vertices within `eps` of the line belong to both halves. Returns the polygon unchanged
/// when the line does not cross its interior.
fn split_convex(poly: &[[f64; 2]], a: [f64; 2], b: [f64; 2], eps: f64) -> Vec<Vec<[f64; 2]>> {
    let len = dist(a, b);
    let side: Vec<i8> = poly
        .iter()
        .map(|&p| {
            let d = cross(a, b, p) / len;
            if d > eps {
                1
            } else if d < -eps {
                -1
            } else {
                0
            }
        })
        .collect();
    if side.iter().all(|&s| s >= 0) || side.iter().all(|&s| s <= 0) {
        return vec![poly.to_vec()];
    }
    let (mut left, mut right) = (Vec::new(), Vec::new());
    for k in 0..poly.len() {
        let prev = (k + poly.len() - 1) % poly.len();
        if side[k] * side[prev] < 0 {
            let x = line_crossing(poly[prev], poly[k], a, b);
            left.push(x);
            right.push(x);
        }
        if side[k] >= 0 {
            left.push(poly[k]);
        }
        if side[k] <= 0 {
            right.push(poly[k]);
        }
    }
    [left, right].into_iter().filter(|p| p.len() >= 3).collect()
}

/// Where edge `pq` crosses the line through `a` and `b`.
///
/// Axis-aligned edges are evaluated on the line itself, so neighboring cells that share the
/// edge compute the same point.
fn line_crossing(p: [f64; 2], q: [f64; 2], a: [f64; 2], b: [f64; 2]) -> [f64; 2] {
    if p[0] == q[0] && a[0] != b[0] {
        let x = p[0];
        return [x, a[1] + (x - a[0]) * (b[1] - a[1]) / (b[0] - a[0])];
    }
    if p[1] == q[1] && a[1] != b[1] {
        let y = p[1];
        return [a[0] + (y - a[1]) * (b[0] - a[0]) / (b[1] - a[1]), y];
    }
    let (d0, d1) = (cross(a, b, p), cross(a, b, q));
    let t = d0 / (d0 - d1);
    [p[0] + (q[0] - p[0]) * t, p[1] + (q[1] - p[1]) * t]
}

fn polygon_area(poly: &[[f64; 2]]) -> f64 {
    let n = poly.len();
    (0..n)
        .map(|k| {
            let (p, q) = (poly[k], poly[(k + 1) % n]);
            p[0] * q[1] - q[0] * p[1]
        })
        .sum::<f64>()
        / 2.
}

/// The vertex average of a convex polygon, which lies strictly inside it.
fn polygon_centroid(poly: &[[f64; 2]]) -> [f64; 2] {
    let n = poly.len() as f64;
    let (x, y) = poly.iter().fold((0., 0.), |(x, y), p| (x + p[0], y + p[1]));
    [x / n, y / n]
}

fn cross(a: [f64; 2], b: [f64; 2], p: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
}

fn dist(a: [f64; 2], b: [f64; 2]) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}

/// The signed area of a triangle, positive when counter-clockwise.
pub fn triangle_area(v: &[[f64; 2]; 3]) -> f64 {
    cross(v[0], v[1], v[2]) / 2.
}

/// The overlap area of two counter-clockwise triangles.
pub fn overlap_area(a: &[[f64; 2]; 3], b: &[[f64; 2]; 3]) -> f64 {
    let mut poly: Vec<[f64; 2]> = b.to_vec();
    for e in 0..3 {
        let (p, q) = (a[e], a[(e + 1) % 3]);
        let input = std::mem::take(&mut poly);
        for (k, &cur) in input.iter().enumerate() {
            let prev = input[(k + input.len() - 1) % input.len()];
            let (cin, pin) = (cross(p, q, cur) >= 0., cross(p, q, prev) >= 0.);
            if cin != pin {
                let (d0, d1) = (cross(p, q, prev), cross(p, q, cur));
                let t = d0 / (d0 - d1);
                poly.push([prev[0] + (cur[0] - prev[0]) * t, prev[1] + (cur[1] - prev[1]) * t]);
            }
            if cin {
                poly.push(cur);
            }
        }
        if poly.len() < 3 {
            return 0.;
        }
    }
    let mut area = 0.;
    for k in 0..poly.len() {
        let (p, q) = (poly[k], poly[(k + 1) % poly.len()]);
        area += p[0] * q[1] - q[0] * p[1];
    }
    (area / 2.).abs()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn board(units: CoordUnits, w: f64, h: f64) -> Shape {
        Rect::from_sides(0, 0, units.to_coord(w), units.to_coord(h)).into()
    }

    #[test]
    fn mesh_covers_boundary_with_imprints() {
        let units = CoordUnits::default();
        let boundary = board(units, 40., 30.);
        let mut lines = ImprintLines::default();
        lines.add_rect(&FRect::from_sides(17.5, 13., 22.5, 17.));
        let settings = MeshSettings {
            min_alpha: 10.,
            ..Default::default()
        };
        let mesh = generate_mesh(&boundary, units, &lines, &settings).unwrap();
        // 3 x 3 grid cells, two triangles each
        assert_eq!(mesh.num_triangles(), 18);
        assert_eq!(mesh.points.len(), 16);
        assert_relative_eq!(mesh.total_area(), 1200., epsilon = 1e-9);
        assert!((0..mesh.num_triangles()).all(|t| mesh.area(t) > 0.));

        let neighbors = mesh.neighbors();
        let interior = neighbors.iter().flatten().filter(|n| n.is_some()).count();
        // every interior edge is seen from both sides
        assert_eq!(interior % 2, 0);
        let center = mesh.locate([20., 15.]).unwrap();
        assert!(FRect::from_sides(17.5, 13., 22.5, 17.).contains(mesh.centroid(center)));
    }

    #[test]
    fn close_lines_merge_and_long_intervals_split() {
        assert_eq!(merge_lines(vec![0., 0.05, 1., 1.02, 2.], 0.1), vec![0., 1., 2.]);
        assert_eq!(merge_lines(vec![0., 1.95, 2.], 0.1), vec![0., 2.]);
        assert_eq!(merge_lines(vec![0., 0.05], 0.1), vec![0., 0.05]);
        assert_eq!(merge_lines(vec![3.], 0.1), vec![3.]);
        assert_eq!(split_long(&[0., 1., 4.], 1.5), vec![0., 1., 2.5, 4.]);

        let units = CoordUnits::default();
        let settings = MeshSettings {
            max_len: 10.,
            ..Default::default()
        };
        let mesh =
            generate_mesh(&board(units, 40., 30.), units, &ImprintLines::default(), &settings).unwrap();
        assert_eq!(mesh.num_triangles(), 4 * 3 * 2);
    }

    #[test]
    fn refinement_improves_minimum_angle() {
        let units = CoordUnits::default();
        let settings = MeshSettings {
            min_alpha: 30.,
            iteration: 5,
            ..Default::default()
        };
        let mesh =
            generate_mesh(&board(units, 10., 1.), units, &ImprintLines::default(), &settings).unwrap();
        let min_angle = smallest_angle(&mesh);
        assert!(min_angle >= 30. - 1e-9, "minimum angle {min_angle}");
    }

    fn smallest_angle(mesh: &Mesh2D) -> f64 {
        (0..mesh.num_triangles()).map(|t| mesh.min_angle(t)).fold(180., f64::min)
    }

    #[test]
    fn package_mesh_meets_the_default_angle() {
        let units = CoordUnits::default();
        let mut lines = ImprintLines::default();
        lines.add_rect(&FRect::from_sides(17.5, 13., 22.5, 17.));
        let settings = MeshSettings::default();
        let mesh = generate_mesh(&board(units, 40., 30.), units, &lines, &settings).unwrap();
        let min_angle = smallest_angle(&mesh);
        assert!(min_angle >= settings.min_alpha - 1e-9, "minimum angle {min_angle}");
        assert_relative_eq!(mesh.total_area(), 1200., epsilon = 1e-9);
    }

    /// Sums the area of triangles whose centroid lies in `shape`, and checks that no
    /// triangle straddles its outline.
    fn area_inside(mesh: &Mesh2D, shape: &Shape, units: CoordUnits) -> f64 {
        let to_db = |p: [f64; 2]| [p[0] / units.scale2unit(), p[1] / units.scale2unit()];
        let mut area = 0.;
        for t in 0..mesh.num_triangles() {
            let inside = mesh.vertices(t).map(|v| {
                // nudge corners toward the centroid to avoid outline ties
                let c = mesh.centroid(t);
                shape.contains_point_f64(to_db([
                    v[0] + (c[0] - v[0]) * 1e-3,
                    v[1] + (c[1] - v[1]) * 1e-3,
                ]))
            });
            assert!(inside.iter().all(|&i| i == inside[0]), "triangle {t} straddles the outline");
            if inside[0] {
                area += mesh.area(t);
            }
        }
        area
    }

    /// The total length of triangle edges without a neighbor.
    fn open_edge_length(mesh: &Mesh2D) -> f64 {
        let neighbors = mesh.neighbors();
        (0..mesh.num_triangles())
            .flat_map(|t| (0..3).map(move |e| (t, e)))
            .filter(|&(t, e)| neighbors[t][e].is_none())
            .map(|(t, e)| mesh.edge_length(t, e))
            .sum()
    }

    #[test]
    fn slanted_edges_cut_grid_cells() {
        let units = CoordUnits::default();
        let boundary = board(units, 10., 10.);
        let die: Shape = Polygon::rect(Rect::from_sides(-1_000_000, -1_000_000, 1_000_000, 1_000_000))
            .transform(Transformation::cascade(
                Transformation::translate(5e6, 5e6),
                Transformation::rotate(std::f64::consts::FRAC_PI_4),
            ))
            .into();
        let mut lines = ImprintLines::default();
        lines.add_shape(&die, units);
        let mesh = generate_mesh(&boundary, units, &lines, &MeshSettings::default()).unwrap();

        assert_relative_eq!(mesh.total_area(), 100., max_relative = 1e-9);
        assert_relative_eq!(area_inside(&mesh, &die, units), die.area() * 1e-12, max_relative = 1e-9);
        // cut points are shared by neighboring cells, so only the board edge stays open
        assert_relative_eq!(open_edge_length(&mesh), 40., max_relative = 1e-9);
        assert!((0..mesh.num_triangles()).all(|t| mesh.area(t) > 0.));
    }

    #[test]
    fn round_outlines_are_followed() {
        let units = CoordUnits::default();
        let pad: Shape = Polygon::circle(Point::new(3_000_000, 2_000_000), 1_200_000, 16).into();
        let mut lines = ImprintLines::default();
        lines.add_shape(&pad, units);
        let settings = MeshSettings {
            max_len: 1.,
            ..Default::default()
        };
        let mesh = generate_mesh(&board(units, 6., 4.), units, &lines, &settings).unwrap();
        assert_relative_eq!(area_inside(&mesh, &pad, units), pad.area() * 1e-12, max_relative = 1e-9);
        assert_relative_eq!(open_edge_length(&mesh), 20., max_relative = 1e-9);

        // a round board is meshed up to its outline
        let mesh = generate_mesh(&pad, units, &lines, &MeshSettings::default()).unwrap();
        assert_relative_eq!(mesh.total_area(), pad.area() * 1e-12, max_relative = 1e-9);
    }

    #[test]
    fn holes_are_not_meshed() {
        let units = CoordUnits::default();
        let outline = Polygon::rect(Rect::from_sides(0, 0, 3_000_000, 3_000_000));
        let hole = Polygon::rect(Rect::from_sides(1_000_000, 1_000_000, 2_000_000, 2_000_000));
        let boundary: Shape = PolygonWithHoles::new(outline, vec![hole]).into();
        let mut lines = ImprintLines::default();
        lines.add_shape(&boundary, units);
        let mesh = generate_mesh(&boundary, units, &lines, &MeshSettings::default()).unwrap();
        assert_eq!(mesh.num_triangles(), 16);
        assert_relative_eq!(mesh.total_area(), 8., epsilon = 1e-9);
        assert!(mesh.locate([1.5, 1.5]).is_none());
    }

    #[test]
    fn triangle_overlap() {
        let a = [[0., 0.], [2., 0.], [0., 2.]];
        assert_relative_eq!(overlap_area(&a, &a), 2., epsilon = 1e-12);
        let b = [[0., 0.], [1., 0.], [0., 1.]];
        assert_relative_eq!(overlap_area(&a, &b), 0.5, epsilon = 1e-12);
        let c = [[5., 5.], [6., 5.], [5., 6.]];
        assert_relative_eq!(overlap_area(&a, &c), 0., epsilon = 1e-12);
    }
}
