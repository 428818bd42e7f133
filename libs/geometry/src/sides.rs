//! Per-side quantities of a rectangle.

use serde::{Deserialize, Serialize};

use crate::transform::Rotation;

/// A value associated with each of the four sides of a rectangle.
///
/// Technology templates use this to describe how far a layer is inset
/// from (or grown beyond) the edges of a node or cut.
#[derive(Debug, Default, Copy, Clone, Hash, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sides<T> {
    /// The left side.
    pub left: T,
    /// The bottom side.
    pub bot: T,
    /// The right side.
    pub right: T,
    /// The top side.
    pub top: T,
}

impl<T> Sides<T> {
    /// Creates a new [`Sides`] from each of the four values.
    pub const fn new(left: T, bot: T, right: T, top: T) -> Self {
        Self {
            left,
            bot,
            right,
            top,
        }
    }

    /// Creates a new [`Sides`] with the same value on every side.
    pub fn uniform(value: T) -> Self
    where
        T: Clone,
    {
        Self {
            left: value.clone(),
            bot: value.clone(),
            right: value.clone(),
            top: value,
        }
    }

    /// Maps each side through `f`.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Sides<U> {
        Sides {
            left: f(self.left),
            bot: f(self.bot),
            right: f(self.right),
            top: f(self.top),
        }
    }
}

impl<T: Copy> Sides<T> {
    /// Returns the sides as seen after rotating the owning rectangle
    /// counterclockwise by `rot`.
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let s = Sides::new(1, 2, 3, 4);
    /// assert_eq!(s.rotate(Rotation::R90), Sides::new(4, 1, 2, 3));
    /// ```
    pub fn rotate(self, rot: Rotation) -> Self {
        match rot {
            Rotation::R0 => self,
            Rotation::R90 => Self::new(self.top, self.left, self.bot, self.right),
            Rotation::R180 => Self::new(self.right, self.top, self.left, self.bot),
            Rotation::R270 => Self::new(self.bot, self.right, self.top, self.left),
        }
    }
}

impl Sides<i64> {
    /// The sum of the left and right values.
    pub const fn horiz(&self) -> i64 {
        self.left + self.right
    }

    /// The sum of the bottom and top values.
    pub const fn vert(&self) -> i64 {
        self.bot + self.top
    }

    /// Returns `true` if the value is unchanged by any Manhattan rotation.
    pub fn is_symmetric(&self) -> bool {
        self.left == self.right && self.left == self.bot && self.left == self.top
    }

    /// Takes the larger value on every side.
    pub fn max(&self, other: &Self) -> Self {
        Self::new(
            self.left.max(other.left),
            self.bot.max(other.bot),
            self.right.max(other.right),
            self.top.max(other.top),
        )
    }
}
