//! 2-D geometric operations relevant to integrated circuit layout extraction.
//!
//! # Examples
//!
//! Create a [rectangle](crate::rect::Rect):
//!
//! ```
//! # use geometry::prelude::*;
//! let rect = Rect::from_sides(10, 20, 30, 40);
//! assert_eq!(rect.width(), 20);
//! ```
#![warn(missing_docs)]

extern crate self as geometry;

pub mod dims;
pub mod dir;
pub mod orientation;
pub mod point;
pub mod polygon;
pub mod prelude;
pub mod rect;
pub mod region;
pub mod sides;
pub mod snap;
pub mod transform;

/// The largest coordinate magnitude accepted by the extraction pipeline.
///
/// Geometry is converted to `f64` for boolean operations; keeping coordinates
/// well below 2^53 keeps every intermediate product exact.
pub const MAX_COORD: i64 = 1 << 40;

/// Number of angle units in a full turn.
///
/// Angles are measured in tenths of a degree.
pub const FULL_TURN: i32 = 3600;

/// Wraps the given angle (in tenths of a degree) to the interval `[0, 3600)`.
///
/// # Examples
///
/// ```
/// use geometry::wrap_angle;
///
/// assert_eq!(wrap_angle(100), 100);
/// assert_eq!(wrap_angle(-100), 3500);
/// assert_eq!(wrap_angle(7250), 250);
/// assert_eq!(wrap_angle(3600), 0);
/// ```
pub const fn wrap_angle(angle: i32) -> i32 {
    angle.rem_euclid(FULL_TURN)
}

/// Returns `true` if the given coordinate is within [`MAX_COORD`].
#[inline]
pub const fn coord_in_range(coord: i64) -> bool {
    coord.abs() <= MAX_COORD
}
