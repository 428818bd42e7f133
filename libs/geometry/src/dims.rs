//! Two-dimensional sizes.

use serde::{Deserialize, Serialize};

use crate::dir::Dir;

/// A horizontal and vertical rectangular dimension with no specified location.
#[derive(
    Debug, Default, Copy, Clone, Hash, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord,
)]
pub struct Dims {
    w: i64,
    h: i64,
}

impl Dims {
    /// Creates a new [`Dims`] from a width and height.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let dims = Dims::new(100, 200);
    /// assert_eq!(dims.w(), 100);
    /// assert_eq!(dims.h(), 200);
    /// ```
    pub const fn new(w: i64, h: i64) -> Self {
        Self { w, h }
    }

    /// Creates a square [`Dims`] with the given side length.
    pub const fn square(value: i64) -> Self {
        Self { w: value, h: value }
    }

    /// The width.
    #[inline]
    pub const fn w(&self) -> i64 {
        self.w
    }

    /// The height.
    #[inline]
    pub const fn h(&self) -> i64 {
        self.h
    }

    /// The width (alias for [`Dims::w`]).
    #[inline]
    pub const fn width(&self) -> i64 {
        self.w
    }

    /// The height (alias for [`Dims::h`]).
    #[inline]
    pub const fn height(&self) -> i64 {
        self.h
    }

    /// The dimension along `dir`.
    pub const fn dim(&self, dir: Dir) -> i64 {
        match dir {
            Dir::Horiz => self.w,
            Dir::Vert => self.h,
        }
    }

    /// Swaps width and height.
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// assert_eq!(Dims::new(1, 2).transpose(), Dims::new(2, 1));
    /// ```
    pub const fn transpose(self) -> Self {
        Self {
            w: self.h,
            h: self.w,
        }
    }

    /// The area `w * h`.
    pub const fn area(&self) -> i64 {
        self.w * self.h
    }

    /// The longer of the two dimensions.
    pub fn longer(&self) -> i64 {
        self.w.max(self.h)
    }

    /// The shorter of the two dimensions.
    pub fn shorter(&self) -> i64 {
        self.w.min(self.h)
    }
}

impl std::fmt::Display for Dims {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.w, self.h)
    }
}
