//! 2-D points.

use serde::{Deserialize, Serialize};

use crate::dims::Dims;
use crate::dir::Dir;
use crate::snap::{snap_f64_to_grid, snap_to_grid};
use crate::transform::{Transform, Transformation};

/// A point in two-dimensional space.
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

    /// Creates a new point from the given direction and coordinates.
    ///
    /// If `dir` is [`Dir::Horiz`], `a` becomes the x-coordinate and `b` becomes the y-coordinate.
    /// If `dir` is [`Dir::Vert`], `a` becomes the y-coordinate and `b` becomes the x-coordinate.
    pub const fn from_dir_coords(dir: Dir, a: i64, b: i64) -> Self {
        match dir {
            Dir::Horiz => Self::new(a, b),
            Dir::Vert => Self::new(b, a),
        }
    }

    /// Gets the coordinate associated with direction `dir`.
    pub const fn coord(&self, dir: Dir) -> i64 {
        match dir {
            Dir::Horiz => self.x,
            Dir::Vert => self.y,
        }
    }

    /// Snaps the x and y coordinates of this point to the nearest multiple of `grid`.
    #[inline]
    pub fn snap_to_grid(&self, grid: i64) -> Self {
        Self::new(snap_to_grid(self.x, grid), snap_to_grid(self.y, grid))
    }

    /// Returns `true` if both coordinates lie on multiples of `grid`.
    #[inline]
    pub fn is_on_grid(&self, grid: i64) -> bool {
        self.x.rem_euclid(grid) == 0 && self.y.rem_euclid(grid) == 0
    }

    /// Returns `true` if both coordinates are within [`MAX_COORD`](crate::MAX_COORD).
    #[inline]
    pub fn in_range(&self) -> bool {
        crate::coord_in_range(self.x) && crate::coord_in_range(self.y)
    }

    /// The Manhattan distance between two points.
    pub fn manhattan_distance(&self, other: Point) -> i64 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// The squared Euclidean distance between two points.
    pub fn distance_squared(&self, other: Point) -> i64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Converts this point to floating point coordinates.
    #[inline]
    pub fn to_f(self) -> FPoint {
        FPoint::new(self.x as f64, self.y as f64)
    }
}

impl Transform for Point {
    fn transform(&self, trans: Transformation) -> Self {
        trans.apply(*self)
    }
}

impl std::ops::Add<Point> for Point {
    type Output = Self;
    fn add(self, rhs: Point) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Add<Dims> for Point {
    type Output = Self;
    fn add(self, rhs: Dims) -> Self::Output {
        Self::new(self.x + rhs.w(), self.y + rhs.h())
    }
}

impl std::ops::AddAssign<Point> for Point {
    fn add_assign(&mut self, rhs: Point) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::Sub<Point> for Point {
    type Output = Self;
    fn sub(self, rhs: Point) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::SubAssign<Point> for Point {
    fn sub_assign(&mut self, rhs: Point) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl std::ops::Neg for Point {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y)
    }
}

impl From<(i64, i64)> for Point {
    fn from(value: (i64, i64)) -> Self {
        Self {
            x: value.0,
            y: value.1,
        }
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A point with floating point coordinates.
///
/// Used for intermediate results (wire centerlines, angled device outlines)
/// that are not necessarily representable on the integer database grid.
#[derive(Debug, Copy, Clone, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct FPoint {
    /// The x-coordinate of the point.
    pub x: f64,
    /// The y-coordinate of the point.
    pub y: f64,
}

impl FPoint {
    /// Creates a new [`FPoint`].
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// A unit vector pointing at `angle` tenths of a degree counterclockwise from the x-axis.
    pub fn unit(angle: i32) -> Self {
        let rad = (angle as f64 / 10.).to_radians();
        // Keep Manhattan directions exact.
        match crate::wrap_angle(angle) {
            0 => Self::new(1., 0.),
            900 => Self::new(0., 1.),
            1800 => Self::new(-1., 0.),
            2700 => Self::new(0., -1.),
            _ => Self::new(rad.cos(), rad.sin()),
        }
    }

    /// The dot product of two vectors.
    #[inline]
    pub fn dot(&self, other: FPoint) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// The z-component of the cross product of two vectors.
    #[inline]
    pub fn cross(&self, other: FPoint) -> f64 {
        self.x * other.y - self.y * other.x
    }

    /// The Euclidean length of this vector.
    #[inline]
    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// The Euclidean distance between two points.
    #[inline]
    pub fn distance(&self, other: FPoint) -> f64 {
        (*self - other).norm()
    }

    /// Rotates this vector by 90 degrees counterclockwise.
    #[inline]
    pub fn perp(&self) -> Self {
        Self::new(-self.y, self.x)
    }

    /// Scales this vector by `k`.
    #[inline]
    pub fn scale(&self, k: f64) -> Self {
        Self::new(self.x * k, self.y * k)
    }

    /// Rounds to the nearest integer point.
    #[inline]
    pub fn round(&self) -> Point {
        Point::new(self.x.round() as i64, self.y.round() as i64)
    }

    /// Rounds to the nearest point on the given grid.
    pub fn snap_to_grid(&self, grid: i64) -> Point {
        Point::new(snap_f64_to_grid(self.x, grid), snap_f64_to_grid(self.y, grid))
    }

    /// Returns `true` if this point has integer coordinates lying on `grid`.
    pub fn is_on_grid(&self, grid: i64) -> bool {
        let p = self.round();
        (p.x as f64 - self.x).abs() < 1e-6 && (p.y as f64 - self.y).abs() < 1e-6 && p.is_on_grid(grid)
    }
}

impl std::ops::Add<FPoint> for FPoint {
    type Output = Self;
    fn add(self, rhs: FPoint) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub<FPoint> for FPoint {
    type Output = Self;
    fn sub(self, rhs: FPoint) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl From<Point> for FPoint {
    fn from(value: Point) -> Self {
        value.to_f()
    }
}
