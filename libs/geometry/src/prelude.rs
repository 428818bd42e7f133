//! An import prelude that re-exports commonly used items.

pub use crate::dims::Dims;
pub use crate::dir::Dir;
pub use crate::orientation::Orientation;
pub use crate::point::{FPoint, Point};
pub use crate::polygon::Polygon;
pub use crate::rect::Rect;
pub use crate::region::Region;
pub use crate::sides::Sides;
pub use crate::transform::{Rotation, Transform, Transformation};
