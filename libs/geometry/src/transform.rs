//! Transformation types and traits.

use serde::{Deserialize, Serialize};

use crate::point::Point;

/// A transformation representing a Manhattan translation, rotation, and/or reflection of geometry.
///
/// Reflection (about the x-axis) is applied first, then rotation, then translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transformation {
    /// The transformation matrix.
    mat: [[i8; 2]; 2],
    /// The x-y translation applied after the transformation.
    b: Point,
}

impl Default for Transformation {
    fn default() -> Self {
        Self::identity()
    }
}

/// A Manhattan rotation: 0, 90, 180, or 270 degrees counterclockwise.
#[derive(
    Debug, Clone, Copy, Default, Hash, Eq, Ord, PartialOrd, PartialEq, Serialize, Deserialize,
)]
pub enum Rotation {
    /// 0 degrees; no rotation.
    #[default]
    R0,
    /// 90 degrees counterclockwise.
    R90,
    /// 180 degrees counterclockwise.
    R180,
    /// 270 degrees counterclockwise.
    R270,
}

impl Rotation {
    /// All four rotations, in counterclockwise order.
    pub const ALL: [Rotation; 4] = [Rotation::R0, Rotation::R90, Rotation::R180, Rotation::R270];

    /// The angle of this rotation, in tenths of a degree.
    pub const fn angle(&self) -> i32 {
        match self {
            Rotation::R0 => 0,
            Rotation::R90 => 900,
            Rotation::R180 => 1800,
            Rotation::R270 => 2700,
        }
    }

    /// Converts an angle in tenths of a degree to a rotation, if it is Manhattan.
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// assert_eq!(Rotation::from_angle(-900), Some(Rotation::R270));
    /// assert_eq!(Rotation::from_angle(450), None);
    /// ```
    pub const fn from_angle(angle: i32) -> Option<Self> {
        match crate::wrap_angle(angle) {
            0 => Some(Rotation::R0),
            900 => Some(Rotation::R90),
            1800 => Some(Rotation::R180),
            2700 => Some(Rotation::R270),
            _ => None,
        }
    }

    /// Returns `true` if this rotation swaps the x and y axes.
    pub const fn swaps_axes(&self) -> bool {
        matches!(self, Rotation::R90 | Rotation::R270)
    }

    /// The rotation by an additional 180 degrees.
    pub const fn flipped(&self) -> Self {
        match self {
            Rotation::R0 => Rotation::R180,
            Rotation::R90 => Rotation::R270,
            Rotation::R180 => Rotation::R0,
            Rotation::R270 => Rotation::R90,
        }
    }

    fn matrix(&self) -> [[i8; 2]; 2] {
        match self {
            Rotation::R0 => [[1, 0], [0, 1]],
            Rotation::R90 => [[0, -1], [1, 0]],
            Rotation::R180 => [[-1, 0], [0, -1]],
            Rotation::R270 => [[0, 1], [-1, 0]],
        }
    }
}

/// Multiplies two 2x2 matrices, returning a new 2x2 matrix.
fn matmul_i8(a: &[[i8; 2]; 2], b: &[[i8; 2]; 2]) -> [[i8; 2]; 2] {
    [
        [
            a[0][0] * b[0][0] + a[0][1] * b[1][0],
            a[0][0] * b[0][1] + a[0][1] * b[1][1],
        ],
        [
            a[1][0] * b[0][0] + a[1][1] * b[1][0],
            a[1][0] * b[0][1] + a[1][1] * b[1][1],
        ],
    ]
}

/// Multiplies a 2x2 matrix by a point.
fn matvec(a: &[[i8; 2]; 2], p: Point) -> Point {
    Point::new(
        a[0][0] as i64 * p.x + a[0][1] as i64 * p.y,
        a[1][0] as i64 * p.x + a[1][1] as i64 * p.y,
    )
}

impl Transformation {
    /// Returns the identity transform, leaving any transformed object unmodified.
    pub const fn identity() -> Self {
        Self {
            mat: [[1, 0], [0, 1]],
            b: Point::zero(),
        }
    }

    /// Returns a translation by `(x,y)`.
    pub const fn translate(x: i64, y: i64) -> Self {
        Self {
            mat: [[1, 0], [0, 1]],
            b: Point::new(x, y),
        }
    }

    /// Creates a transform from an offset, a flag indicating whether
    /// to reflect vertically, and a rotation.
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let t = Transformation::from_opts(Point::new(10, 0), false, Rotation::R90);
    /// assert_eq!(t.apply(Point::new(1, 0)), Point::new(10, 1));
    /// ```
    pub fn from_opts(offset: Point, reflect_vert: bool, rotation: Rotation) -> Self {
        let reflect = if reflect_vert {
            [[1, 0], [0, -1]]
        } else {
            [[1, 0], [0, 1]]
        };
        Self {
            mat: matmul_i8(&rotation.matrix(), &reflect),
            b: offset,
        }
    }

    /// Create a new [`Transformation`] that is the cascade of `parent` and `child`.
    ///
    /// The child transformation is applied first.
    pub fn cascade(parent: Transformation, child: Transformation) -> Transformation {
        let b = matvec(&parent.mat, child.b) + parent.b;
        let mat = matmul_i8(&parent.mat, &child.mat);
        Self { mat, b }
    }

    /// Applies this transformation to a point.
    #[inline]
    pub fn apply(&self, p: Point) -> Point {
        matvec(&self.mat, p) + self.b
    }

    /// The point representing the translation of this transformation.
    pub fn offset_point(&self) -> Point {
        self.b
    }

    /// Returns `true` if this transformation mirrors geometry.
    pub fn reflects(&self) -> bool {
        let det = self.mat[0][0] as i32 * self.mat[1][1] as i32
            - self.mat[0][1] as i32 * self.mat[1][0] as i32;
        det < 0
    }

    /// The rotation component of this transformation.
    pub fn rotation(&self) -> Rotation {
        // Undo the reflection, which is applied before rotation.
        let m = if self.reflects() {
            matmul_i8(&self.mat, &[[1, 0], [0, -1]])
        } else {
            self.mat
        };
        match (m[0][0], m[1][0]) {
            (1, 0) => Rotation::R0,
            (0, 1) => Rotation::R90,
            (-1, 0) => Rotation::R180,
            _ => Rotation::R270,
        }
    }

    /// Returns the inverse [`Transformation`] of `self`.
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let t = Transformation::from_opts(Point::new(5, 10), true, Rotation::R90);
    /// let p = Point::new(3, -7);
    /// assert_eq!(t.inv().apply(t.apply(p)), p);
    /// ```
    pub fn inv(&self) -> Transformation {
        // Unitary integer matrices are inverted by transposition.
        let inv = [
            [self.mat[0][0], self.mat[1][0]],
            [self.mat[0][1], self.mat[1][1]],
        ];
        let invb = matvec(&inv, self.b);
        Self { mat: inv, b: -invb }
    }
}

/// A trait for geometric objects that can be transformed into a new object.
pub trait Transform: Sized {
    /// Applies the Manhattan transformation, returning a new object.
    fn transform(&self, trans: Transformation) -> Self;
}

impl<T: Transform> Transform for Vec<T> {
    fn transform(&self, trans: Transformation) -> Self {
        self.iter().map(|item| item.transform(trans)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cascade_applies_child_first() {
        let parent = Transformation::from_opts(Point::new(100, 0), false, Rotation::R90);
        let child = Transformation::translate(10, 0);
        let t = Transformation::cascade(parent, child);
        assert_eq!(t.apply(Point::zero()), Point::new(100, 10));
    }

    #[test]
    fn reflection_then_rotation() {
        let t = Transformation::from_opts(Point::zero(), true, Rotation::R90);
        // (1, 2) -> reflect -> (1, -2) -> rotate 90 -> (2, 1)
        assert_eq!(t.apply(Point::new(1, 2)), Point::new(2, 1));
        assert!(t.reflects());
        assert_eq!(t.rotation(), Rotation::R90);
    }

    #[test]
    fn rotation_round_trips_through_angle() {
        for rot in Rotation::ALL {
            assert_eq!(Rotation::from_angle(rot.angle()), Some(rot));
        }
    }
}
