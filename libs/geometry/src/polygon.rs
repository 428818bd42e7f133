//! Integer coordinate polygons.

use serde::{Deserialize, Serialize};

use crate::point::Point;
use crate::rect::Rect;
use crate::transform::{Transform, Transformation};

/// A simple polygon, with vertex coordinates given in order.
///
/// The closing edge from the last vertex back to the first is implicit.
#[derive(Debug, Default, Clone, Hash, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Polygon {
    /// Vector of points that make up the polygon.
    points: Vec<Point>,
}

impl Polygon {
    /// Creates a polygon with the given vertices, collapsing degenerate vertices.
    ///
    /// Repeated points and vertices lying on the straight line between their
    /// neighbors are removed.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let polygon = Polygon::new(vec![
    ///     Point::new(0, 0),
    ///     Point::new(5, 0),
    ///     Point::new(10, 0),
    ///     Point::new(10, 10),
    ///     Point::new(10, 10),
    ///     Point::new(0, 10),
    /// ]);
    /// assert_eq!(polygon.points().len(), 4);
    /// ```
    pub fn new(points: Vec<Point>) -> Self {
        Self {
            points: collapse_degenerate(points),
        }
    }

    /// Creates a polygon with given vertices, exactly as provided.
    pub fn from_verts(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Creates a four-vertex polygon from a rectangle, counterclockwise from the lower left.
    pub fn from_rect(rect: Rect) -> Self {
        Self {
            points: rect.corners().to_vec(),
        }
    }

    /// Returns a the vector of points representing the polygon.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Consumes the polygon, returning its vertices.
    pub fn into_points(self) -> Vec<Point> {
        self.points
    }

    /// Returns `true` if the polygon has fewer than three vertices.
    pub fn is_degenerate(&self) -> bool {
        self.points.len() < 3 || self.signed_area2() == 0
    }

    /// The bounding box of the polygon.
    ///
    /// Returns `None` if the polygon has no vertices.
    pub fn bbox(&self) -> Option<Rect> {
        let first = *self.points.first()?;
        Some(
            self.points
                .iter()
                .fold(Rect::from_point(first), |acc, p| acc.union_point(*p)),
        )
    }

    /// If this polygon is an axis-aligned rectangle, returns it.
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let rect = Rect::from_sides(0, 0, 10, 20);
    /// assert_eq!(Polygon::from_rect(rect).as_rect(), Some(rect));
    /// let tri = Polygon::new(vec![Point::new(0, 0), Point::new(10, 0), Point::new(0, 10)]);
    /// assert_eq!(tri.as_rect(), None);
    /// ```
    pub fn as_rect(&self) -> Option<Rect> {
        let simplified = collapse_degenerate(self.points.clone());
        if simplified.len() != 4 {
            return None;
        }
        let bbox = self.bbox()?;
        if bbox.is_degenerate() {
            return None;
        }
        let manhattan = (0..4).all(|i| {
            let a = simplified[i];
            let b = simplified[(i + 1) % 4];
            a.x == b.x || a.y == b.y
        });
        if manhattan && self.signed_area2().unsigned_abs() == 2 * bbox.area() as u128 {
            Some(bbox)
        } else {
            None
        }
    }

    /// Twice the signed area (positive if counterclockwise).
    pub fn signed_area2(&self) -> i128 {
        let n = self.points.len();
        let mut sum = 0i128;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            sum += a.x as i128 * b.y as i128 - b.x as i128 * a.y as i128;
        }
        sum
    }

    /// The unsigned area of the polygon.
    pub fn area(&self) -> f64 {
        self.signed_area2().unsigned_abs() as f64 / 2.
    }

    /// Iterates over the edges of the polygon, including the closing edge.
    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| (self.points[i], self.points[(i + 1) % n]))
    }

    /// Returns `true` if every edge is horizontal or vertical.
    pub fn is_manhattan(&self) -> bool {
        self.edges().all(|(a, b)| a.x == b.x || a.y == b.y)
    }

    /// Returns `true` if `p` lies inside or on the boundary of the polygon.
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let polygon = Polygon::new(vec![
    ///     Point::new(0, 0),
    ///     Point::new(10, 0),
    ///     Point::new(10, 5),
    ///     Point::new(5, 5),
    ///     Point::new(5, 10),
    ///     Point::new(0, 10),
    /// ]);
    /// assert!(polygon.contains_point(Point::new(2, 8)));
    /// assert!(polygon.contains_point(Point::new(10, 5)));
    /// assert!(!polygon.contains_point(Point::new(8, 8)));
    /// ```
    pub fn contains_point(&self, p: Point) -> bool {
        let mut inside = false;
        for (a, b) in self.edges() {
            if on_segment(p, a, b) {
                return true;
            }
            if (a.y > p.y) != (b.y > p.y) {
                // x coordinate of the edge at height p.y, compared without division.
                let lhs = (p.x - a.x) as i128 * (b.y - a.y) as i128;
                let rhs = (b.x - a.x) as i128 * (p.y - a.y) as i128;
                let crosses = if b.y > a.y { lhs < rhs } else { lhs > rhs };
                if crosses {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Snaps every vertex to `grid`, collapsing any vertices made degenerate.
    pub fn snap_to_grid(&self, grid: i64) -> Polygon {
        Polygon::new(self.points.iter().map(|p| p.snap_to_grid(grid)).collect())
    }

    /// Translates the polygon by `p`.
    pub fn translate(&self, p: Point) -> Polygon {
        Polygon::from_verts(self.points.iter().map(|q| *q + p).collect())
    }

    /// Returns `true` if every vertex is within [`MAX_COORD`](crate::MAX_COORD).
    pub fn in_range(&self) -> bool {
        self.points.iter().all(Point::in_range)
    }

    /// The average of the vertices, rounded down.
    pub fn center(&self) -> Point {
        let n = self.points.len().max(1) as i64;
        let x = self.points.iter().map(|point| point.x).sum::<i64>().div_euclid(n);
        let y = self.points.iter().map(|point| point.y).sum::<i64>().div_euclid(n);
        Point::new(x, y)
    }
}

impl Transform for Polygon {
    fn transform(&self, trans: Transformation) -> Self {
        Polygon::from_verts(self.points.iter().map(|p| trans.apply(*p)).collect())
    }
}

impl From<Rect> for Polygon {
    fn from(value: Rect) -> Self {
        Self::from_rect(value)
    }
}

/// Returns `true` if `p` lies on the closed segment from `a` to `b`.
fn on_segment(p: Point, a: Point, b: Point) -> bool {
    let cross = (b.x - a.x) as i128 * (p.y - a.y) as i128 - (b.y - a.y) as i128 * (p.x - a.x) as i128;
    cross == 0
        && p.x >= a.x.min(b.x)
        && p.x <= a.x.max(b.x)
        && p.y >= a.y.min(b.y)
        && p.y <= a.y.max(b.y)
}

/// Removes repeated points and collinear vertices.
fn collapse_degenerate(mut points: Vec<Point>) -> Vec<Point> {
    points.dedup();
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    loop {
        let n = points.len();
        if n < 3 {
            return points;
        }
        let mut removed = false;
        for i in 0..n {
            let prev = points[(i + n - 1) % n];
            let cur = points[i];
            let next = points[(i + 1) % n];
            let cross = (cur.x - prev.x) as i128 * (next.y - prev.y) as i128
                - (cur.y - prev.y) as i128 * (next.x - prev.x) as i128;
            if cross == 0 || cur == next {
                points.remove(i);
                removed = true;
                break;
            }
        }
        if !removed {
            return points;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapse_removes_spikes_and_duplicates() {
        let p = Polygon::new(vec![
            Point::new(0, 0),
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
            Point::new(0, 0),
        ]);
        assert_eq!(p.points().len(), 4);
        assert_eq!(p.area(), 100.);
    }

    #[test]
    fn manhattan_rect_detection() {
        let p = Polygon::new(vec![
            Point::new(0, 0),
            Point::new(0, 10),
            Point::new(20, 10),
            Point::new(20, 0),
        ]);
        assert_eq!(p.as_rect(), Some(Rect::from_sides(0, 0, 20, 10)));
        assert!(p.is_manhattan());
    }
}
