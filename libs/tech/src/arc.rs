//! Wire types.

use std::collections::BTreeSet;

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

use crate::id::{LayerId, TemplateId};

/// A layer drawn by a wire type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArcLayer {
    /// The layer.
    pub layer: LayerId,
    /// Amount added to the wire width on this layer.
    #[serde(default)]
    pub width_offset: i64,
}

/// A wire type ("arc prototype").
///
/// The first layer is the primary layer; the width of a wire is its width
/// on the primary layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArcProto {
    name: ArcStr,
    layers: Vec<ArcLayer>,
    default_width: i64,
    /// Allowed angle granularity in tenths of a degree; zero allows any angle.
    #[serde(default = "manhattan")]
    angle_increment: i32,
    /// The pin template used to terminate wires of this type.
    pin: TemplateId,
}

fn manhattan() -> i32 {
    900
}

impl ArcProto {
    /// Creates a new wire type.
    pub fn new(
        name: impl Into<ArcStr>,
        layers: Vec<ArcLayer>,
        default_width: i64,
        angle_increment: i32,
        pin: TemplateId,
    ) -> Self {
        Self {
            name: name.into(),
            layers,
            default_width,
            angle_increment,
            pin,
        }
    }

    /// The name of the wire type.
    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// The layers drawn by this wire type, primary layer first.
    #[inline]
    pub fn layers(&self) -> &[ArcLayer] {
        &self.layers
    }

    /// The primary layer.
    ///
    /// Validated wire types always have at least one layer.
    #[inline]
    pub fn primary_layer(&self) -> LayerId {
        self.layers[0].layer
    }

    /// The set of all layers drawn by this wire type.
    pub fn signature(&self) -> BTreeSet<LayerId> {
        self.layers.iter().map(|l| l.layer).collect()
    }

    /// The default width of the wire type.
    #[inline]
    pub fn default_width(&self) -> i64 {
        self.default_width
    }

    #[inline]
    pub fn angle_increment(&self) -> i32 {
        self.angle_increment
    }

    /// Returns `true` if wires of this type may be drawn at `angle`.
    ///
    /// ```
    /// # use tech::{ArcProto, ArcLayer, LayerId, TemplateId};
    /// let arc = ArcProto::new("m1", vec![ArcLayer { layer: LayerId(0), width_offset: 0 }], 4, 900, TemplateId(0));
    /// assert!(arc.allows_angle(2700));
    /// assert!(!arc.allows_angle(450));
    /// ```
    pub fn allows_angle(&self, angle: i32) -> bool {
        self.angle_increment <= 0 || geometry::wrap_angle(angle) % self.angle_increment == 0
    }

    /// The pin template that terminates wires of this type.
    #[inline]
    pub fn pin(&self) -> TemplateId {
        self.pin
    }

    /// The drawn width on `layer` of a wire whose primary width is `width`.
    pub fn width_on(&self, layer: LayerId, width: i64) -> Option<i64> {
        self.layers
            .iter()
            .find(|l| l.layer == layer)
            .map(|l| width + l.width_offset)
    }
}
