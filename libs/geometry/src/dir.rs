//! Axis-aligned directions: horizontal or vertical.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// An enumeration of axis-aligned directions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Dir {
    /// The horizontal, or x-aligned, direction.
    Horiz,
    /// The vertical, or y-aligned, direction.
    Vert,
}

impl Dir {
    /// Returns the other direction.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// assert_eq!(Dir::Vert.other(), Dir::Horiz);
    /// assert_eq!(Dir::Horiz.other(), Dir::Vert);
    /// ```
    pub const fn other(&self) -> Self {
        match *self {
            Self::Horiz => Self::Vert,
            Self::Vert => Self::Horiz,
        }
    }

    /// The angle of a wire running in this direction, in tenths of a degree.
    pub const fn angle(&self) -> i32 {
        match *self {
            Self::Horiz => 0,
            Self::Vert => 900,
        }
    }
}

impl Display for Dir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Horiz => write!(f, "horizontal"),
            Self::Vert => write!(f, "vertical"),
        }
    }
}
