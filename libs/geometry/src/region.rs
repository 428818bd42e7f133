//! Merged polygon regions.
//!
//! A [`Region`] is the union of any number of polygons. It supports the
//! boolean operations (union, difference, intersection) and the containment
//! queries needed to decide whether a candidate device or wire actually fits
//! inside drawn geometry.
//!
//! Boolean operations are delegated to [`geo`], working on `f64` copies of
//! the integer coordinates. All coordinates are bounded by
//! [`MAX_COORD`](crate::MAX_COORD), so integer inputs are represented exactly.

use geo::{Area, BooleanOps, BoundingRect, Coord, Intersects, LineString, MultiPolygon};

use crate::point::{FPoint, Point};
use crate::polygon::Polygon;
use crate::rect::Rect;

/// Areas at or below this value are treated as empty.
const AREA_EPSILON: f64 = 1e-6;

/// Relative tolerance for area comparisons on large shapes.
const RELATIVE_EPSILON: f64 = 1e-9;

/// A union of polygons, possibly with holes and multiple disjoint components.
#[derive(Debug, Clone)]
pub struct Region {
    shapes: MultiPolygon<f64>,
}

impl Default for Region {
    fn default() -> Self {
        Self::new()
    }
}

fn tolerance(area: f64) -> f64 {
    AREA_EPSILON + RELATIVE_EPSILON * area
}

fn ring(points: impl IntoIterator<Item = FPoint>) -> LineString<f64> {
    LineString::from(
        points
            .into_iter()
            .map(|p| Coord { x: p.x, y: p.y })
            .collect::<Vec<_>>(),
    )
}

impl Region {
    /// Creates an empty region.
    pub fn new() -> Self {
        Self {
            shapes: MultiPolygon::new(Vec::new()),
        }
    }

    /// Creates a region covering the given rectangle.
    ///
    /// Zero-area rectangles produce an empty region.
    pub fn from_rect(rect: Rect) -> Self {
        if rect.is_degenerate() {
            return Self::new();
        }
        Self::from_fpoints(&rect.corners().map(Point::to_f))
    }

    /// Creates a region covering the given polygon.
    pub fn from_polygon(polygon: &Polygon) -> Self {
        if polygon.is_degenerate() {
            return Self::new();
        }
        let points: Vec<FPoint> = polygon.points().iter().map(|p| p.to_f()).collect();
        Self::from_fpoints(&points)
    }

    /// Creates a region from a polygon with floating point vertices.
    ///
    /// The polygon is normalized through a union so that self-intersecting
    /// outlines produce a valid region.
    pub fn from_fpoints(points: &[FPoint]) -> Self {
        if points.len() < 3 {
            return Self::new();
        }
        let polygon = geo::Polygon::new(ring(points.iter().copied()), Vec::new());
        let single = MultiPolygon::new(vec![polygon]);
        let shapes = single.union(&MultiPolygon::<f64>::new(Vec::new()));
        Self { shapes }
    }

    /// The area of the region.
    pub fn area(&self) -> f64 {
        self.shapes.unsigned_area()
    }

    /// Returns `true` if the region has no area.
    pub fn is_empty(&self) -> bool {
        self.area() <= AREA_EPSILON
    }

    /// The smallest integer rectangle containing the region.
    pub fn bbox(&self) -> Option<Rect> {
        if self.is_empty() {
            return None;
        }
        let r = self.shapes.bounding_rect()?;
        Some(Rect::from_sides(
            r.min().x.floor() as i64,
            r.min().y.floor() as i64,
            r.max().x.ceil() as i64,
            r.max().y.ceil() as i64,
        ))
    }

    /// Adds `other` to this region.
    pub fn add(&mut self, other: &Region) {
        if other.is_empty() {
            return;
        }
        self.shapes = self.shapes.union(&other.shapes);
    }

    /// Removes `other` from this region.
    pub fn subtract(&mut self, other: &Region) {
        if other.is_empty() || self.is_empty() {
            return;
        }
        self.shapes = self.shapes.difference(&other.shapes);
    }

    /// The union of two regions.
    pub fn union(&self, other: &Region) -> Region {
        let mut out = self.clone();
        out.add(other);
        out
    }

    /// The intersection of two regions.
    pub fn intersection(&self, other: &Region) -> Region {
        if self.is_empty() || other.is_empty() {
            return Region::new();
        }
        Region {
            shapes: self.shapes.intersection(&other.shapes),
        }
    }

    /// The part of this region not covered by `other`.
    pub fn difference(&self, other: &Region) -> Region {
        let mut out = self.clone();
        out.subtract(other);
        out
    }

    /// Returns `true` if `other` lies entirely inside this region.
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let region = Region::from_rect(Rect::from_sides(0, 0, 100, 10));
    /// assert!(region.contains_region(&Region::from_rect(Rect::from_sides(10, 0, 20, 10))));
    /// assert!(!region.contains_region(&Region::from_rect(Rect::from_sides(90, 0, 110, 10))));
    /// ```
    pub fn contains_region(&self, other: &Region) -> bool {
        let outside = other.difference(self).area();
        outside <= tolerance(other.area())
    }

    /// Returns `true` if the rectangle lies entirely inside this region.
    ///
    /// Zero-area rectangles are contained if they touch the region.
    pub fn contains_rect(&self, rect: Rect) -> bool {
        if rect.is_degenerate() {
            return rect.corners().iter().all(|p| self.touches_point(*p));
        }
        self.contains_region(&Region::from_rect(rect))
    }

    /// Returns `true` if the polygon lies entirely inside this region.
    pub fn contains_polygon(&self, polygon: &Polygon) -> bool {
        self.contains_region(&Region::from_polygon(polygon))
    }

    /// Returns `true` if the two regions share positive area.
    pub fn overlaps(&self, other: &Region) -> bool {
        self.intersection(other).area() > tolerance(0.)
    }

    /// Returns `true` if this region shares positive area with the rectangle.
    pub fn overlaps_rect(&self, rect: Rect) -> bool {
        !rect.is_degenerate() && self.overlaps(&Region::from_rect(rect))
    }

    /// The area of this region's overlap with the rectangle.
    pub fn overlap_area(&self, rect: Rect) -> f64 {
        self.intersection(&Region::from_rect(rect)).area()
    }

    /// Returns `true` if `p` is inside or on the boundary of the region.
    pub fn touches_point(&self, p: Point) -> bool {
        self.touches_fpoint(p.to_f())
    }

    /// Returns `true` if `p` is inside or on the boundary of the region.
    pub fn touches_fpoint(&self, p: FPoint) -> bool {
        let c = Coord { x: p.x, y: p.y };
        self.shapes.0.iter().any(|poly| poly.intersects(&c))
    }

    /// Splits the region into its connected components.
    ///
    /// Components are returned in a deterministic order: by bounding box
    /// (left, bottom, right, top), then by area.
    pub fn components(&self) -> Vec<Region> {
        let mut out: Vec<Region> = self
            .shapes
            .0
            .iter()
            .map(|p| Region {
                shapes: MultiPolygon::new(vec![p.clone()]),
            })
            .filter(|r| !r.is_empty())
            .collect();
        out.sort_by(|a, b| {
            a.bbox()
                .cmp(&b.bbox())
                .then(a.area().total_cmp(&b.area()))
        });
        out
    }

    /// Returns `true` if any component of the region has a hole.
    pub fn has_holes(&self) -> bool {
        self.shapes.0.iter().any(|p| !p.interiors().is_empty())
    }

    /// The number of connected components.
    pub fn num_components(&self) -> usize {
        self.shapes.0.len()
    }

    /// The outer boundaries of every component, rounded to integer coordinates.
    pub fn outlines(&self) -> Vec<Polygon> {
        self.shapes
            .0
            .iter()
            .map(|p| ring_to_polygon(p.exterior()))
            .filter(|p| !p.is_degenerate())
            .collect()
    }

    /// If this region is a single hole-free polygon, returns it.
    pub fn as_polygon(&self) -> Option<Polygon> {
        if self.shapes.0.len() != 1 || self.has_holes() {
            return None;
        }
        self.outlines().into_iter().next()
    }

    /// If this region is exactly one axis-aligned rectangle, returns it.
    pub fn as_rect(&self) -> Option<Rect> {
        let bbox = self.bbox()?;
        let area = self.area();
        if self.shapes.0.len() == 1 && (bbox.area() as f64 - area).abs() <= tolerance(area) {
            Some(bbox)
        } else {
            None
        }
    }

    /// Every boundary edge of the region (exteriors and holes).
    pub fn edges(&self) -> Vec<(FPoint, FPoint)> {
        let mut out = Vec::new();
        for p in self.shapes.0.iter() {
            for ring in std::iter::once(p.exterior()).chain(p.interiors().iter()) {
                for line in ring.lines() {
                    let a = FPoint::new(line.start.x, line.start.y);
                    let b = FPoint::new(line.end.x, line.end.y);
                    if a.distance(b) > 1e-9 {
                        out.push((a, b));
                    }
                }
            }
        }
        out
    }

    /// A point strictly inside the region, if one can be found.
    ///
    /// Scans a horizontal line through the middle of the bounding box and
    /// returns the midpoint of the widest interior span.
    pub fn interior_point(&self) -> Option<FPoint> {
        let bbox = self.bbox()?;
        let mut rows = vec![bbox.center_f().y];
        // Fall back to other scan heights if the middle one only grazes vertices.
        for k in 1..8 {
            rows.push(bbox.bot() as f64 + bbox.height() as f64 * k as f64 / 8.);
        }
        let edges = self.edges();
        for y in rows {
            let mut xs: Vec<f64> = edges
                .iter()
                .filter(|(a, b)| (a.y > y) != (b.y > y))
                .map(|(a, b)| a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y))
                .collect();
            xs.sort_by(f64::total_cmp);
            let best = xs
                .chunks_exact(2)
                .map(|c| (c[1] - c[0], (c[0] + c[1]) / 2.))
                .filter(|(w, _)| *w > 1e-9)
                .max_by(|a, b| a.0.total_cmp(&b.0));
            if let Some((_, x)) = best {
                return Some(FPoint::new(x, y));
            }
        }
        None
    }
}

fn ring_to_polygon(ring: &LineString<f64>) -> Polygon {
    let mut points: Vec<Point> = ring
        .coords()
        .map(|c| Point::new(c.x.round() as i64, c.y.round() as i64))
        .collect();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    Polygon::new(points)
}

impl From<Rect> for Region {
    fn from(value: Rect) -> Self {
        Self::from_rect(value)
    }
}

impl From<&Polygon> for Region {
    fn from(value: &Polygon) -> Self {
        Self::from_polygon(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_region_is_empty() {
        let r = Region::default();
        assert!(r.is_empty());
        assert_eq!(r.num_components(), 0);
        assert_eq!(r.bbox(), None);
    }

    #[test]
    fn union_of_touching_rects_is_one_component() {
        let mut r = Region::from_rect(Rect::from_sides(0, 0, 10, 10));
        r.add(&Region::from_rect(Rect::from_sides(10, 0, 20, 10)));
        assert_eq!(r.components().len(), 1);
        assert_eq!(r.as_rect(), Some(Rect::from_sides(0, 0, 20, 10)));
        approx::assert_abs_diff_eq!(r.area(), 200.);
    }

    #[test]
    fn difference_splits_region() {
        let mut r = Region::from_rect(Rect::from_sides(0, 0, 30, 10));
        r.subtract(&Region::from_rect(Rect::from_sides(10, -5, 20, 15)));
        let comps = r.components();
        assert_eq!(comps.len(), 2);
        assert_eq!(comps[0].as_rect(), Some(Rect::from_sides(0, 0, 10, 10)));
        assert_eq!(comps[1].as_rect(), Some(Rect::from_sides(20, 0, 30, 10)));
    }

    #[test]
    fn contains_and_overlaps() {
        let r = Region::from_rect(Rect::from_sides(0, 0, 10, 10));
        assert!(r.contains_rect(Rect::from_sides(0, 0, 10, 10)));
        assert!(r.contains_rect(Rect::from_sides(2, 2, 3, 3)));
        assert!(!r.contains_rect(Rect::from_sides(5, 5, 11, 6)));
        assert!(r.overlaps_rect(Rect::from_sides(9, 9, 20, 20)));
        assert!(!r.overlaps_rect(Rect::from_sides(10, 0, 20, 10)));
        assert!(r.touches_point(Point::new(10, 10)));
        assert!(!r.touches_point(Point::new(11, 10)));
    }

    #[test]
    fn interior_point_of_l_shape() {
        let l = Polygon::new(vec![
            Point::new(0, 0),
            Point::new(100, 0),
            Point::new(100, 10),
            Point::new(10, 10),
            Point::new(10, 100),
            Point::new(0, 100),
        ]);
        let r = Region::from_polygon(&l);
        let p = r.interior_point().unwrap();
        assert!(l.contains_point(p.round()));
    }
}
