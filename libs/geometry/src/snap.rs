//! Snapping utilities (eg. snap to a grid).

/// Snaps `pos` to the nearest multiple of `grid`.
///
/// Ties round toward negative infinity.
///
/// # Examples
///
/// ```
/// use geometry::snap::snap_to_grid;
///
/// assert_eq!(snap_to_grid(12, 5), 10);
/// assert_eq!(snap_to_grid(13, 5), 15);
/// assert_eq!(snap_to_grid(-12, 5), -10);
/// ```
pub const fn snap_to_grid(pos: i64, grid: i64) -> i64 {
    assert!(grid > 0);

    let rem = pos.rem_euclid(grid);
    if rem <= grid / 2 {
        pos - rem
    } else {
        pos + grid - rem
    }
}

/// Snaps a floating point coordinate to the nearest multiple of `grid`.
pub fn snap_f64_to_grid(pos: f64, grid: i64) -> i64 {
    assert!(grid > 0);
    let g = grid as f64;
    ((pos / g).round() * g) as i64
}

/// Returns `true` if `pos` lies on a multiple of `grid`.
#[inline]
pub const fn on_grid(pos: i64, grid: i64) -> bool {
    pos.rem_euclid(grid) == 0
}
