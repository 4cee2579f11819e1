//! Axis-aligned rectangles.

use serde::{Deserialize, Serialize};

use crate::bbox::Bbox;
use crate::contains::{Containment, Contains};
use crate::point::Point;
use crate::union::BoundingUnion;

/// An axis-aligned rectangle, specified by lower-left and upper-right corners.
#[derive(
    Debug, Default, Copy, Clone, Hash, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord,
)]
pub struct Rect {
    /// The lower-left corner.
    p0: Point,
    /// The upper-right corner.
    p1: Point,
}

impl Rect {
    /// Creates a rectangle from two opposite corners, sorting the coordinates.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let rect = Rect::new(Point::new(30, 40), Point::new(10, 20));
    /// assert_eq!(rect.lower_left(), Point::new(10, 20));
    /// assert_eq!(rect.upper_right(), Point::new(30, 40));
    /// ```
    pub fn new(a: Point, b: Point) -> Self {
        Self {
            p0: Point::new(a.x.min(b.x), a.y.min(b.y)),
            p1: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// Creates a rectangle from all 4 sides (left, bottom, right, top).
    ///
    /// # Panics
    ///
    /// This method panics if `left > right` or if `bot > top`.
    /// If you want sides to be sorted for you, consider using [`Rect::new`] instead.
    #[inline]
    pub fn from_sides(left: i64, bot: i64, right: i64, top: i64) -> Self {
        assert!(
            left <= right,
            "Rect::from_sides requires that left ({}) <= right ({})",
            left,
            right
        );
        assert!(
            bot <= top,
            "Rect::from_sides requires that bot ({}) <= top ({})",
            bot,
            top
        );
        Self {
            p0: Point::new(left, bot),
            p1: Point::new(right, top),
        }
    }

    /// Creates a rectangle from all 4 sides, returning `None` if the rectangle would be empty.
    pub fn from_sides_option(left: i64, bot: i64, right: i64, top: i64) -> Option<Self> {
        if left > right || bot > top {
            None
        } else {
            Some(Self::from_sides(left, bot, right, top))
        }
    }

    /// Creates a zero-area rectangle containing the given point.
    #[inline]
    pub const fn from_point(p: Point) -> Self {
        Self { p0: p, p1: p }
    }

    /// Creates a rectangle of the given width and height centered at `center`.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let rect = Rect::from_center(Point::new(0, 0), 40, 30);
    /// assert_eq!(rect, Rect::from_sides(-20, -15, 20, 15));
    /// ```
    pub fn from_center(center: Point, width: i64, height: i64) -> Self {
        let (hw, hh) = (width / 2, height / 2);
        Self::from_sides(
            center.x - hw,
            center.y - hh,
            center.x - hw + width,
            center.y - hh + height,
        )
    }

    /// The leftmost x-coordinate.
    #[inline]
    pub const fn left(&self) -> i64 {
        self.p0.x
    }

    /// The bottom y-coordinate.
    #[inline]
    pub const fn bot(&self) -> i64 {
        self.p0.y
    }

    /// The rightmost x-coordinate.
    #[inline]
    pub const fn right(&self) -> i64 {
        self.p1.x
    }

    /// The top y-coordinate.
    #[inline]
    pub const fn top(&self) -> i64 {
        self.p1.y
    }

    /// The lower-left corner.
    #[inline]
    pub const fn lower_left(&self) -> Point {
        self.p0
    }

    /// The upper-right corner.
    #[inline]
    pub const fn upper_right(&self) -> Point {
        self.p1
    }

    /// The four corners in counter-clockwise order, starting at the lower left.
    pub fn corners(&self) -> [Point; 4] {
        [
            self.p0,
            Point::new(self.p1.x, self.p0.y),
            self.p1,
            Point::new(self.p0.x, self.p1.y),
        ]
    }

    /// Returns the center point of the rectangle, rounded down.
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let rect = Rect::from_sides(0, 0, 55, 45);
    /// assert_eq!(rect.center(), Point::new(27, 22));
    /// ```
    pub const fn center(&self) -> Point {
        Point::new((self.p0.x + self.p1.x) / 2, (self.p0.y + self.p1.y) / 2)
    }

    /// The horizontal extent of the rectangle.
    #[inline]
    pub const fn width(&self) -> i64 {
        self.p1.x - self.p0.x
    }

    /// The vertical extent of the rectangle.
    #[inline]
    pub const fn height(&self) -> i64 {
        self.p1.y - self.p0.y
    }

    /// The area of the rectangle in square database units.
    pub const fn area(&self) -> i128 {
        self.width() as i128 * self.height() as i128
    }

    /// Returns `true` if the rectangle has zero width or height.
    pub const fn is_degenerate(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Expands the rectangle by `amount` on every side.
    ///
    /// Negative amounts shrink the rectangle; the result is clamped to
    /// a zero-area rectangle at the center.
    pub fn expand_all(&self, amount: i64) -> Self {
        let c = self.center();
        let left = (self.left() - amount).min(c.x);
        let bot = (self.bot() - amount).min(c.y);
        let right = (self.right() + amount).max(c.x);
        let top = (self.top() + amount).max(c.y);
        Self::from_sides(left, bot, right, top)
    }

    /// The smallest rectangle containing both `self` and `other`.
    pub fn union(self, other: Self) -> Self {
        Self {
            p0: Point::new(self.p0.x.min(other.p0.x), self.p0.y.min(other.p0.y)),
            p1: Point::new(self.p1.x.max(other.p1.x), self.p1.y.max(other.p1.y)),
        }
    }

    /// The smallest rectangle containing every rectangle in `rects`.
    ///
    /// Returns `None` if the iterator is empty.
    pub fn union_all_option(rects: impl IntoIterator<Item = Rect>) -> Option<Self> {
        rects.into_iter().reduce(Rect::union)
    }

    /// The intersection of `self` and `other`, if it is non-empty.
    ///
    /// Touching rectangles intersect in a degenerate rectangle.
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let a = Rect::from_sides(0, 0, 10, 10);
    /// let b = Rect::from_sides(5, 5, 20, 20);
    /// assert_eq!(a.intersection(b), Some(Rect::from_sides(5, 5, 10, 10)));
    /// assert_eq!(a.intersection(Rect::from_sides(11, 0, 12, 1)), None);
    /// ```
    pub fn intersection(self, other: Self) -> Option<Self> {
        Self::from_sides_option(
            self.left().max(other.left()),
            self.bot().max(other.bot()),
            self.right().min(other.right()),
            self.top().min(other.top()),
        )
    }

    /// Returns `true` if `p` lies strictly inside the rectangle.
    pub fn contains_point_strict(&self, p: Point) -> bool {
        p.x > self.left() && p.x < self.right() && p.y > self.bot() && p.y < self.top()
    }
}

impl Bbox for Rect {
    fn bbox(&self) -> Option<Rect> {
        Some(*self)
    }
}

impl Contains<Point> for Rect {
    fn contains(&self, p: &Point) -> Containment {
        if p.x >= self.left() && p.x <= self.right() && p.y >= self.bot() && p.y <= self.top() {
            Containment::Full
        } else {
            Containment::None
        }
    }
}

impl Contains<Rect> for Rect {
    fn contains(&self, other: &Rect) -> Containment {
        if other.left() >= self.left()
            && other.right() <= self.right()
            && other.bot() >= self.bot()
            && other.top() <= self.top()
        {
            Containment::Full
        } else if self.intersection(*other).is_some() {
            Containment::Partial
        } else {
            Containment::None
        }
    }
}

impl<T: Bbox> BoundingUnion<T> for Rect {
    type Output = Rect;

    fn bounding_union(&self, other: &T) -> Self::Output {
        match other.bbox() {
            Some(r) => self.union(r),
            None => *self,
        }
    }
}
