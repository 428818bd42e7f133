//! Technology-owned identifiers.

use serde::{Deserialize, Serialize};

macro_rules! tech_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            /// The index of this identifier in its owning table.
            #[inline]
            pub const fn index(&self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

tech_id!(
    /// Identifies a [`Layer`](crate::Layer) of a technology.
    LayerId,
    "layer"
);
tech_id!(
    /// Identifies a [`NodeTemplate`](crate::NodeTemplate) of a technology.
    TemplateId,
    "template"
);
tech_id!(
    /// Identifies an [`ArcProto`](crate::ArcProto) (wire type) of a technology.
    ArcProtoId,
    "arc"
);
