//! Axis-aligned rectangles.

use serde::{Deserialize, Serialize};

use crate::dims::Dims;
use crate::dir::Dir;
use crate::point::Point;
use crate::sides::Sides;
use crate::transform::{Transform, Transformation};

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
    /// assert_eq!(rect, Rect::from_sides(10, 20, 30, 40));
    /// ```
    pub fn new(a: Point, b: Point) -> Self {
        Self {
            p0: Point::new(a.x.min(b.x), a.y.min(b.y)),
            p1: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// Creates a rectangle from all 4 sides (left, bottom, right, top).
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let rect = Rect::from_sides(15, 20, 30, 40);
    /// assert_eq!(rect.left(), 15);
    /// assert_eq!(rect.bot(), 20);
    /// assert_eq!(rect.right(), 30);
    /// assert_eq!(rect.top(), 40);
    /// ```
    ///
    /// # Panics
    ///
    /// This method panics if `left > right` or if `bot > top`.
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

    /// Creates a rectangle from all 4 sides (left, bottom, right, top),
    /// but returns `None` if the given sides would make the rectangle empty.
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// assert_eq!(Rect::from_sides_option(10, 20, 0, 40), None);
    /// ```
    #[inline]
    pub fn from_sides_option(left: i64, bot: i64, right: i64, top: i64) -> Option<Self> {
        if left > right || bot > top {
            None
        } else {
            Some(Self::from_sides(left, bot, right, top))
        }
    }

    /// Creates a rectangle of the given dimensions centered at `center`.
    ///
    /// Odd dimensions place the extra unit above/right of the center.
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let rect = Rect::from_center_dims(Point::new(0, 0), Dims::new(4, 6));
    /// assert_eq!(rect, Rect::from_sides(-2, -3, 2, 3));
    /// ```
    pub fn from_center_dims(center: Point, dims: Dims) -> Self {
        let left = center.x - dims.w() / 2;
        let bot = center.y - dims.h() / 2;
        Self::from_sides(left, bot, left + dims.w(), bot + dims.h())
    }

    /// Creates a zero-area rectangle containing the given point.
    #[inline]
    pub const fn from_point(p: Point) -> Self {
        Self { p0: p, p1: p }
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

    /// The bottom y-coordinate.
    #[inline]
    pub const fn bot(&self) -> i64 {
        self.p0.y
    }

    /// The top y-coordinate.
    #[inline]
    pub const fn top(&self) -> i64 {
        self.p1.y
    }

    /// The left x-coordinate.
    #[inline]
    pub const fn left(&self) -> i64 {
        self.p0.x
    }

    /// The right x-coordinate.
    #[inline]
    pub const fn right(&self) -> i64 {
        self.p1.x
    }

    /// The horizontal extent.
    #[inline]
    pub const fn width(&self) -> i64 {
        self.p1.x - self.p0.x
    }

    /// The vertical extent.
    #[inline]
    pub const fn height(&self) -> i64 {
        self.p1.y - self.p0.y
    }

    /// The extent along `dir`.
    #[inline]
    pub const fn length(&self, dir: Dir) -> i64 {
        match dir {
            Dir::Horiz => self.width(),
            Dir::Vert => self.height(),
        }
    }

    /// The width and height as [`Dims`].
    #[inline]
    pub const fn dims(&self) -> Dims {
        Dims::new(self.width(), self.height())
    }

    /// The area of the rectangle.
    #[inline]
    pub const fn area(&self) -> i64 {
        self.width() * self.height()
    }

    /// Returns `true` if the rectangle has zero area.
    #[inline]
    pub const fn is_degenerate(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Returns the center point of the rectangle, rounded down.
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let rect = Rect::from_sides(0, 0, 55, 45);
    /// assert_eq!(rect.center(), Point::new(27, 22));
    /// ```
    pub const fn center(&self) -> Point {
        Point::new(
            (self.p0.x + self.p1.x).div_euclid(2),
            (self.p0.y + self.p1.y).div_euclid(2),
        )
    }

    /// The exact (possibly half-integer) center point.
    pub fn center_f(&self) -> crate::point::FPoint {
        crate::point::FPoint::new(
            (self.p0.x + self.p1.x) as f64 / 2.,
            (self.p0.y + self.p1.y) as f64 / 2.,
        )
    }

    /// The lower coordinate along `dir`.
    pub const fn lower_coord(&self, dir: Dir) -> i64 {
        self.p0.coord(dir)
    }

    /// The upper coordinate along `dir`.
    pub const fn upper_coord(&self, dir: Dir) -> i64 {
        self.p1.coord(dir)
    }

    /// Expands the rectangle by `amount` on all sides.
    ///
    /// Negative amounts shrink the rectangle; returns `None` if it would become inverted.
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let rect = Rect::from_sides(0, 0, 10, 10);
    /// assert_eq!(rect.expand_all(2), Some(Rect::from_sides(-2, -2, 12, 12)));
    /// assert_eq!(rect.expand_all(-6), None);
    /// ```
    pub fn expand_all(&self, amount: i64) -> Option<Self> {
        self.expand_sides(Sides::uniform(amount))
    }

    /// Expands each side of the rectangle by the corresponding amount.
    ///
    /// Returns `None` if the result would be inverted.
    pub fn expand_sides(&self, amount: Sides<i64>) -> Option<Self> {
        Self::from_sides_option(
            self.left() - amount.left,
            self.bot() - amount.bot,
            self.right() + amount.right,
            self.top() + amount.top,
        )
    }

    /// Shrinks each side of the rectangle by the corresponding inset.
    ///
    /// Returns `None` if the result would be inverted.
    pub fn inset(&self, inset: Sides<i64>) -> Option<Self> {
        self.expand_sides(inset.map(|v| -v))
    }

    /// Expands the rectangle along a single direction.
    pub fn expand_dir(&self, dir: Dir, amount: i64) -> Option<Self> {
        match dir {
            Dir::Horiz => self.expand_sides(Sides::new(amount, 0, amount, 0)),
            Dir::Vert => self.expand_sides(Sides::new(0, amount, 0, amount)),
        }
    }

    /// The intersection of two rectangles, if they overlap or touch.
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let a = Rect::from_sides(0, 0, 10, 10);
    /// let b = Rect::from_sides(5, 5, 20, 20);
    /// assert_eq!(a.intersection(&b), Some(Rect::from_sides(5, 5, 10, 10)));
    /// ```
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        Self::from_sides_option(
            self.left().max(other.left()),
            self.bot().max(other.bot()),
            self.right().min(other.right()),
            self.top().min(other.top()),
        )
    }

    /// Returns `true` if the two rectangles share a region of positive area.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.left() < other.right()
            && other.left() < self.right()
            && self.bot() < other.top()
            && other.bot() < self.top()
    }

    /// The smallest rectangle containing both rectangles.
    pub fn union(&self, other: &Rect) -> Rect {
        Self::from_sides(
            self.left().min(other.left()),
            self.bot().min(other.bot()),
            self.right().max(other.right()),
            self.top().max(other.top()),
        )
    }

    /// The smallest rectangle containing this rectangle and the given point.
    pub fn union_point(&self, p: Point) -> Rect {
        self.union(&Rect::from_point(p))
    }

    /// Returns `true` if `p` lies inside or on the boundary of this rectangle.
    pub fn contains_point(&self, p: Point) -> bool {
        self.left() <= p.x && p.x <= self.right() && self.bot() <= p.y && p.y <= self.top()
    }

    /// Returns `true` if `other` lies entirely within this rectangle.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        self.left() <= other.left()
            && other.right() <= self.right()
            && self.bot() <= other.bot()
            && other.top() <= self.top()
    }

    /// The distances by which each side of `outer` lies outside this rectangle.
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let inner = Rect::from_sides(0, 0, 10, 10);
    /// let outer = Rect::from_sides(-1, -2, 13, 14);
    /// assert_eq!(inner.margins_to(&outer), Sides::new(1, 2, 3, 4));
    /// ```
    pub fn margins_to(&self, outer: &Rect) -> Sides<i64> {
        Sides::new(
            self.left() - outer.left(),
            self.bot() - outer.bot(),
            outer.right() - self.right(),
            outer.top() - self.top(),
        )
    }

    /// Translates the rectangle by `p`.
    pub fn translate(&self, p: Point) -> Rect {
        Self {
            p0: self.p0 + p,
            p1: self.p1 + p,
        }
    }

    /// Snaps all corners of the rectangle to `grid`.
    pub fn snap_to_grid(&self, grid: i64) -> Rect {
        Self::new(self.p0.snap_to_grid(grid), self.p1.snap_to_grid(grid))
    }

    /// The four corners, counterclockwise from the lower left.
    pub fn corners(&self) -> [Point; 4] {
        [
            self.p0,
            Point::new(self.p1.x, self.p0.y),
            self.p1,
            Point::new(self.p0.x, self.p1.y),
        ]
    }
}

impl Transform for Rect {
    fn transform(&self, trans: Transformation) -> Self {
        Self::new(trans.apply(self.p0), trans.apply(self.p1))
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.left(),
            self.bot(),
            self.right(),
            self.top()
        )
    }
}
