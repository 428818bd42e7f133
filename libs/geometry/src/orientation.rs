//! Orientations of placed nodes.
//!
//! Unlike a [`Transformation`](crate::transform::Transformation), an
//! [`Orientation`] may describe any angle, since extracted devices and
//! wires are not restricted to Manhattan geometry.

use serde::{Deserialize, Serialize};

use crate::point::{FPoint, Point};
use crate::transform::{Rotation, Transformation};

/// An orientation of a geometric object.
///
/// Captures reflection and rotation, but not position or scaling.
#[derive(
    Debug, Default, Copy, Clone, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Orientation {
    /// Counterclockwise angle in tenths of a degree, in `[0, 3600)`.
    ///
    /// Applied after reflecting vertically.
    angle: i32,
    /// Reflect vertically (about the x-axis).
    ///
    /// Applied before rotation.
    reflect_vert: bool,
}

impl Orientation {
    /// Creates a new orientation with the given angle (tenths of a degree) and reflection.
    pub const fn new(angle: i32, reflect_vert: bool) -> Self {
        Self {
            angle: crate::wrap_angle(angle),
            reflect_vert,
        }
    }

    /// Creates an unreflected orientation with the given angle.
    pub const fn from_angle(angle: i32) -> Self {
        Self::new(angle, false)
    }

    /// The counterclockwise angle in tenths of a degree.
    #[inline]
    pub const fn angle(&self) -> i32 {
        self.angle
    }

    /// Whether the orientation reflects vertically.
    #[inline]
    pub const fn reflect_vert(&self) -> bool {
        self.reflect_vert
    }

    /// The Manhattan rotation of this orientation, if it has one.
    pub const fn rotation(&self) -> Option<Rotation> {
        Rotation::from_angle(self.angle)
    }

    /// Returns `true` if the angle is a multiple of 90 degrees.
    pub const fn is_manhattan(&self) -> bool {
        self.rotation().is_some()
    }

    /// Returns this orientation rotated by a further 180 degrees.
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// assert_eq!(Orientation::from_angle(900).flipped().angle(), 2700);
    /// ```
    pub const fn flipped(&self) -> Self {
        Self::new(self.angle + 1800, self.reflect_vert)
    }

    /// The orientation of an object with this orientation after placing it with `trans`.
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let t = Transformation::from_opts(Point::zero(), true, Rotation::R90);
    /// let o = Orientation::from_angle(300).transformed(t);
    /// assert_eq!(o, Orientation::new(600, true));
    /// ```
    pub fn transformed(&self, trans: Transformation) -> Self {
        let parent = trans.rotation().angle();
        if trans.reflects() {
            Self::new(parent - self.angle, !self.reflect_vert)
        } else {
            Self::new(parent + self.angle, self.reflect_vert)
        }
    }

    /// Applies this orientation to a vector relative to the object's center.
    pub fn apply_f(&self, p: FPoint) -> FPoint {
        let p = if self.reflect_vert {
            FPoint::new(p.x, -p.y)
        } else {
            p
        };
        let u = FPoint::unit(self.angle);
        FPoint::new(u.x * p.x - u.y * p.y, u.y * p.x + u.x * p.y)
    }

    /// Applies this orientation to an integer vector, rounding the result.
    ///
    /// Manhattan orientations are exact.
    pub fn apply(&self, p: Point) -> Point {
        self.apply_f(p.to_f()).round()
    }
}

impl From<Rotation> for Orientation {
    fn from(value: Rotation) -> Self {
        Self::from_angle(value.angle())
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}deg", self.angle / 10, self.angle % 10)?;
        if self.reflect_vert {
            write!(f, " (mirrored)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manhattan_orientations_are_exact() {
        let o = Orientation::from_angle(900);
        assert_eq!(o.apply(Point::new(10, 0)), Point::new(0, 10));
        let o = Orientation::new(0, true);
        assert_eq!(o.apply(Point::new(3, 4)), Point::new(3, -4));
    }

    #[test]
    fn transformed_matches_point_mapping() {
        let t = Transformation::from_opts(Point::zero(), true, Rotation::R270);
        for angle in [0, 900, 1800, 2700] {
            for reflect in [false, true] {
                let o = Orientation::new(angle, reflect);
                let p = Point::new(3, 7);
                assert_eq!(o.transformed(t).apply(p), t.apply(o.apply(p)));
            }
        }
    }

    #[test]
    fn angled_orientation_rounds() {
        let o = Orientation::from_angle(450);
        let p = o.apply_f(FPoint::new(10., 0.));
        approx::assert_abs_diff_eq!(p.x, 7.0710678, epsilon = 1e-6);
        approx::assert_abs_diff_eq!(p.y, 7.0710678, epsilon = 1e-6);
        assert_eq!(o.apply(Point::new(10, 0)), Point::new(7, 7));
    }
}
