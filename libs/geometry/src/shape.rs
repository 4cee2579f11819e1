//! An enumeration of geometric shapes and their properties.

use serde::{Deserialize, Serialize};

use crate::{
    bbox::Bbox,
    contains::{Containment, Contains, EdgeInclusion},
    point::Point,
    polygon::{Polygon, PolygonWithHoles},
    rect::Rect,
    transform::{Transform, TransformMut, Transformation},
};

/// An enumeration of geometric shapes.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Shape {
    /// A rectangle.
    Rect(Rect),
    /// A polygon.
    Polygon(Polygon),
    /// A polygon with holes.
    PolygonWithHoles(PolygonWithHoles),
}

impl Shape {
    /// If this shape is a rectangle, returns the contained rectangle.
    /// Otherwise, returns [`None`].
    pub fn rect(&self) -> Option<Rect> {
        match self {
            Self::Rect(r) => Some(*r),
            _ => None,
        }
    }

    /// If this shape is a polygon, returns the contained polygon.
    /// Otherwise, returns [`None`].
    pub fn polygon(&self) -> Option<&Polygon> {
        match self {
            Self::Polygon(p) => Some(p),
            _ => None,
        }
    }

    /// The shape's outline as a polygon.
    pub fn outline(&self) -> Polygon {
        match self {
            Self::Rect(r) => Polygon::rect(*r),
            Self::Polygon(p) => p.clone(),
            Self::PolygonWithHoles(p) => p.outline.clone(),
        }
    }

    /// The shape's holes. Empty for rectangles and simple polygons.
    pub fn holes(&self) -> &[Polygon] {
        match self {
            Self::PolygonWithHoles(p) => &p.holes,
            _ => &[],
        }
    }

    /// Converts the shape to a polygon with holes.
    pub fn to_polygon_with_holes(&self) -> PolygonWithHoles {
        match self {
            Self::PolygonWithHoles(p) => p.clone(),
            other => PolygonWithHoles::new(other.outline(), Vec::new()),
        }
    }

    /// The area of the solid region.
    pub fn area(&self) -> f64 {
        match self {
            Self::Rect(r) => r.area() as f64,
            Self::Polygon(p) => p.area(),
            Self::PolygonWithHoles(p) => p.area(),
        }
    }

    /// Returns `true` if the shape encloses no area.
    pub fn is_degenerate(&self) -> bool {
        match self {
            Self::Rect(r) => r.is_degenerate(),
            Self::Polygon(p) => p.is_degenerate(),
            Self::PolygonWithHoles(p) => p.outline.is_degenerate(),
        }
    }

    /// Returns `true` if `p` lies in the shape, including its boundary.
    pub fn contains_point(&self, p: Point) -> bool {
        match self {
            Self::Rect(r) => r.encloses(&p),
            Self::Polygon(poly) => poly.contains_point(p),
            Self::PolygonWithHoles(poly) => poly.contains_point(p),
        }
    }

    /// Returns `true` if floating-point coordinates `p` lie in the shape.
    pub fn contains_point_f64(&self, p: [f64; 2]) -> bool {
        match self {
            Self::Rect(r) => {
                p[0] >= r.left() as f64
                    && p[0] <= r.right() as f64
                    && p[1] >= r.bot() as f64
                    && p[1] <= r.top() as f64
            }
            Self::Polygon(poly) => poly.contains_point_f64(p),
            Self::PolygonWithHoles(poly) => {
                poly.outline.contains_point_f64(p)
                    && !poly.holes.iter().any(|h| h.contains_point_f64(p))
            }
        }
    }

    /// Tests whether `rect` lies in the shape with the given edge inclusion.
    pub fn contains_rect(&self, rect: Rect, inclusion: EdgeInclusion) -> bool {
        match self {
            Self::Rect(r) => match inclusion {
                EdgeInclusion::Inclusive => r.encloses(&rect),
                EdgeInclusion::Exclusive => {
                    rect.left() > r.left()
                        && rect.right() < r.right()
                        && rect.bot() > r.bot()
                        && rect.top() < r.top()
                }
            },
            Self::Polygon(poly) => poly.contains_rect(rect, inclusion),
            Self::PolygonWithHoles(poly) => poly.contains_rect(rect, inclusion),
        }
    }
}

impl From<Rect> for Shape {
    fn from(value: Rect) -> Self {
        Self::Rect(value)
    }
}

impl From<Polygon> for Shape {
    fn from(value: Polygon) -> Self {
        Self::Polygon(value)
    }
}

impl From<PolygonWithHoles> for Shape {
    fn from(value: PolygonWithHoles) -> Self {
        Self::PolygonWithHoles(value)
    }
}

impl Bbox for Shape {
    fn bbox(&self) -> Option<Rect> {
        match self {
            Shape::Rect(rect) => rect.bbox(),
            Shape::Polygon(polygon) => polygon.bbox(),
            Shape::PolygonWithHoles(polygon) => polygon.bbox(),
        }
    }
}

impl Contains<Point> for Shape {
    fn contains(&self, p: &Point) -> Containment {
        if self.contains_point(*p) {
            Containment::Full
        } else {
            Containment::None
        }
    }
}

impl TransformMut for Shape {
    /// Rectangles stay rectangles under rectilinear transformations and become
    /// polygons otherwise.
    fn transform_mut(&mut self, trans: Transformation) {
        match self {
            Shape::Rect(rect) => {
                if trans.is_rectilinear() {
                    *rect = Rect::new(trans.apply(rect.lower_left()), trans.apply(rect.upper_right()));
                } else {
                    *self = Shape::Polygon(Polygon::rect(*rect).transform(trans));
                }
            }
            Shape::Polygon(polygon) => polygon.transform_mut(trans),
            Shape::PolygonWithHoles(polygon) => polygon.transform_mut(trans),
        }
    }
}
