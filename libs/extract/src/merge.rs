//! Per-layer unions of unclassified geometry.

use std::collections::BTreeMap;

use geometry::prelude::*;
use tech::LayerId;

/// A mapping from layer to the union of the shapes collected on it.
///
/// Layers are kept in ID order so that iteration is deterministic.
#[derive(Debug, Clone, Default)]
pub struct MergeSet {
    layers: BTreeMap<LayerId, Region>,
}

impl MergeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a region to `layer`.
    pub fn add(&mut self, layer: LayerId, region: &Region) {
        if region.is_empty() {
            return;
        }
        self.layers.entry(layer).or_default().add(region);
    }

    pub fn add_polygon(&mut self, layer: LayerId, polygon: &Polygon) {
        self.add(layer, &Region::from_polygon(polygon));
    }

    pub fn add_rect(&mut self, layer: LayerId, rect: Rect) {
        self.add(layer, &Region::from_rect(rect));
    }

    /// Removes a region from `layer`, dropping the layer once it is empty.
    pub fn subtract(&mut self, layer: LayerId, region: &Region) {
        let Some(current) = self.layers.get_mut(&layer) else {
            return;
        };
        current.subtract(region);
        if current.is_empty() {
            self.layers.remove(&layer);
        }
    }

    pub fn subtract_polygon(&mut self, layer: LayerId, polygon: &Polygon) {
        self.subtract(layer, &Region::from_polygon(polygon));
    }

    /// The geometry on `layer`, if any.
    #[inline]
    pub fn get(&self, layer: LayerId) -> Option<&Region> {
        self.layers.get(&layer)
    }

    /// The geometry on `layer`, or an empty region.
    pub fn region(&self, layer: LayerId) -> Region {
        self.layers.get(&layer).cloned().unwrap_or_default()
    }

    /// Removes and returns all geometry on `layer`.
    pub fn take(&mut self, layer: LayerId) -> Region {
        self.layers.remove(&layer).unwrap_or_default()
    }

    /// Returns `true` if `rect` lies entirely within the geometry on `layer`.
    pub fn contains_rect(&self, layer: LayerId, rect: Rect) -> bool {
        self.layers
            .get(&layer)
            .is_some_and(|r| r.contains_rect(rect))
    }

    pub fn contains_region(&self, layer: LayerId, region: &Region) -> bool {
        if region.is_empty() {
            return true;
        }
        self.layers
            .get(&layer)
            .is_some_and(|r| r.contains_region(region))
    }

    /// Returns `true` if the geometry on `layer` shares area with `region`.
    pub fn overlaps(&self, layer: LayerId, region: &Region) -> bool {
        self.layers.get(&layer).is_some_and(|r| r.overlaps(region))
    }

    pub fn overlaps_rect(&self, layer: LayerId, rect: Rect) -> bool {
        self.layers
            .get(&layer)
            .is_some_and(|r| r.overlaps_rect(rect))
    }

    /// The layers with geometry, in ID order.
    pub fn layers(&self) -> impl Iterator<Item = LayerId> + '_ {
        self.layers.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LayerId, &Region)> {
        self.layers.iter().map(|(k, v)| (*k, v))
    }

    pub fn is_empty(&self) -> bool {
        self.layers.values().all(Region::is_empty)
    }

    /// The total area on `layer`.
    pub fn area(&self, layer: LayerId) -> f64 {
        self.layers.get(&layer).map(Region::area).unwrap_or(0.)
    }

    /// Returns `true` if every layer's geometry is contained in the same layer of `other`.
    pub fn is_subset_of(&self, other: &MergeSet) -> bool {
        self.layers
            .iter()
            .all(|(layer, region)| region.is_empty() || other.contains_region(*layer, region))
    }
}
