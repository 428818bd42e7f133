//! Primitive node templates.

use arcstr::ArcStr;
use geometry::prelude::*;
use serde::{Deserialize, Serialize};

use crate::id::{ArcProtoId, LayerId};
use crate::layer::Doping;

/// The kind of a primitive node.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A connection point for wires, with no geometry of its own.
    Pin,
    /// A contact or via.
    Contact,
    /// A MOS transistor with the given active doping.
    Transistor(Doping),
    /// A resistor.
    Resistor,
    /// A capacitor.
    Capacitor,
    /// An inert shape on a single layer.
    PureLayer(LayerId),
}

impl NodeKind {
    /// Returns `true` if instances of this kind are dissolved into raw geometry before extraction.
    pub const fn is_dissolvable(&self) -> bool {
        match self {
            NodeKind::PureLayer(_) => true,
            NodeKind::Pin
            | NodeKind::Contact
            | NodeKind::Transistor(_)
            | NodeKind::Resistor
            | NodeKind::Capacitor => false,
        }
    }
}

/// A layer drawn by a node, inset from the edges of the node's bounding box.
///
/// Negative insets grow the layer beyond the node.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLayer {
    /// The layer.
    pub layer: LayerId,
    /// Inset from each side of the node.
    #[serde(default)]
    pub inset: Sides<i64>,
}

/// A connection point on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortTemplate {
    /// The port name.
    pub name: ArcStr,
    /// The wire types that may connect to this port.
    pub arcs: Vec<ArcProtoId>,
    /// Inset of the port area from each side of the node.
    #[serde(default)]
    pub inset: Sides<i64>,
}

/// An array of square cuts placed inside a node.
///
/// The number of cuts along each axis is the largest count that fits in the
/// node after removing `inset` on every side. The cut array is centered.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CutRule {
    /// The cut layer.
    pub layer: LayerId,
    /// Edge length of one cut.
    pub size: i64,
    /// Edge-to-edge separation of adjacent cuts.
    pub spacing: i64,
    /// Distance from the node edge to the outermost cuts.
    pub inset: i64,
}

impl CutRule {
    /// Center-to-center distance between adjacent cuts.
    #[inline]
    pub const fn pitch(&self) -> i64 {
        self.size + self.spacing
    }

    /// Number of cuts that fit in a span of `avail` units. Always at least one.
    ///
    /// ```
    /// # use tech::{CutRule, LayerId};
    /// let rule = CutRule { layer: LayerId(0), size: 4, spacing: 4, inset: 2 };
    /// assert_eq!(rule.count_along(4), 1);
    /// assert_eq!(rule.count_along(11), 1);
    /// assert_eq!(rule.count_along(12), 2);
    /// ```
    pub fn count_along(&self, avail: i64) -> i64 {
        ((avail + self.spacing) / self.pitch()).max(1)
    }

    /// The extent of `n` cuts placed at minimum spacing.
    #[inline]
    pub const fn array_span(&self, n: i64) -> i64 {
        n * self.size + (n - 1) * self.spacing
    }

    /// The node extent that holds exactly `n` cuts.
    #[inline]
    pub const fn node_extent(&self, n: i64) -> i64 {
        self.array_span(n) + 2 * self.inset
    }

    /// The cuts of a node occupying `node`, ordered bottom to top, then left to right.
    pub fn cut_rects(&self, node: Rect) -> Vec<Rect> {
        let avail = match node.inset(Sides::uniform(self.inset)) {
            Some(r) => r,
            None => node,
        };
        let nx = self.count_along(avail.width());
        let ny = self.count_along(avail.height());
        let x0 = avail.left() + (avail.width() - self.array_span(nx)).div_euclid(2);
        let y0 = avail.bot() + (avail.height() - self.array_span(ny)).div_euclid(2);
        let mut cuts = Vec::with_capacity((nx * ny) as usize);
        for j in 0..ny {
            for i in 0..nx {
                let left = x0 + i * self.pitch();
                let bot = y0 + j * self.pitch();
                cuts.push(Rect::from_sides(
                    left,
                    bot,
                    left + self.size,
                    bot + self.size,
                ));
            }
        }
        cuts
    }
}

/// A primitive node template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTemplate {
    name: ArcStr,
    kind: NodeKind,
    default_size: Dims,
    #[serde(default)]
    layers: Vec<NodeLayer>,
    #[serde(default)]
    ports: Vec<PortTemplate>,
    #[serde(default)]
    cuts: Option<CutRule>,
}

impl NodeTemplate {
    pub fn new(name: impl Into<ArcStr>, kind: NodeKind, default_size: Dims) -> Self {
        Self {
            name: name.into(),
            kind,
            default_size,
            layers: Vec::new(),
            ports: Vec::new(),
            cuts: None,
        }
    }

    /// Adds a layer inset from the node edges.
    pub fn with_layer(mut self, layer: LayerId, inset: Sides<i64>) -> Self {
        self.layers.push(NodeLayer { layer, inset });
        self
    }

    /// Adds a port.
    pub fn with_port(
        mut self,
        name: impl Into<ArcStr>,
        arcs: Vec<ArcProtoId>,
        inset: Sides<i64>,
    ) -> Self {
        self.ports.push(PortTemplate {
            name: name.into(),
            arcs,
            inset,
        });
        self
    }

    /// Sets the cut array.
    pub fn with_cuts(mut self, cuts: CutRule) -> Self {
        self.cuts = Some(cuts);
        self
    }

    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    #[inline]
    pub fn default_size(&self) -> Dims {
        self.default_size
    }

    /// The non-cut layers of the node.
    #[inline]
    pub fn layers(&self) -> &[NodeLayer] {
        &self.layers
    }

    #[inline]
    pub fn ports(&self) -> &[PortTemplate] {
        &self.ports
    }

    /// Gets a port by name.
    pub fn port(&self, name: &str) -> Option<&PortTemplate> {
        self.ports.iter().find(|p| p.name == name)
    }

    #[inline]
    pub fn cuts(&self) -> Option<&CutRule> {
        self.cuts.as_ref()
    }

    /// The inset of `layer` from the node edges, if the node draws it.
    pub fn layer_inset(&self, layer: LayerId) -> Option<Sides<i64>> {
        self.layers
            .iter()
            .find(|l| l.layer == layer)
            .map(|l| l.inset)
    }

    /// Every layer the node draws, including its cut layer.
    pub fn all_layers(&self) -> Vec<LayerId> {
        let mut layers: Vec<_> = self.layers.iter().map(|l| l.layer).collect();
        if let Some(cuts) = &self.cuts {
            layers.push(cuts.layer);
        }
        layers
    }

    /// Number of distinct layers drawn, including the cut layer.
    pub fn distinct_layer_count(&self) -> usize {
        let mut layers = self.all_layers();
        layers.sort();
        layers.dedup();
        layers.len()
    }

    /// The geometry drawn by an unrotated node of the given size centered at the origin.
    ///
    /// Layers whose inset would invert the shape are omitted.
    pub fn layer_rects(&self, size: Dims) -> Vec<(LayerId, Rect)> {
        let node = Rect::from_center_dims(Point::zero(), size);
        let mut rects: Vec<_> = self
            .layers
            .iter()
            .filter_map(|l| node.inset(l.inset).map(|r| (l.layer, r)))
            .collect();
        if let Some(cuts) = &self.cuts {
            rects.extend(cuts.cut_rects(node).into_iter().map(|r| (cuts.layer, r)));
        }
        rects
    }

    /// The area of a port on an unrotated node of the given size centered at the origin.
    pub fn port_rect(&self, port: &PortTemplate, size: Dims) -> Rect {
        let node = Rect::from_center_dims(Point::zero(), size);
        node.inset(port.inset).unwrap_or(Rect::from_point(node.center()))
    }
}
