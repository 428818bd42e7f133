//! A spatial index of unclassified cuts.

use std::collections::BTreeMap;

use geometry::prelude::*;
use rstar::{RTree, RTreeObject, AABB};
use tech::LayerId;

/// One contact or via hole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cut {
    id: u32,
    layer: LayerId,
    shape: Polygon,
    bbox: Rect,
}

impl Cut {
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn layer(&self) -> LayerId {
        self.layer
    }

    #[inline]
    pub fn shape(&self) -> &Polygon {
        &self.shape
    }

    #[inline]
    pub fn bbox(&self) -> Rect {
        self.bbox
    }

    /// The cut as a rectangle, if it is one.
    pub fn as_rect(&self) -> Option<Rect> {
        self.shape.as_rect()
    }
}

fn envelope(rect: Rect) -> AABB<[i64; 2]> {
    AABB::from_corners([rect.left(), rect.bot()], [rect.right(), rect.top()])
}

impl RTreeObject for Cut {
    type Envelope = AABB<[i64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        envelope(self.bbox)
    }
}

/// Per-layer R-trees of cuts.
#[derive(Debug, Default)]
pub struct CutIndex {
    next_id: u32,
    trees: BTreeMap<LayerId, RTree<Cut>>,
}

impl CutIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a cut. Returns `false` if an identical cut is already present.
    pub fn insert(&mut self, layer: LayerId, shape: Polygon) -> bool {
        let Some(bbox) = shape.bbox() else {
            return false;
        };
        let tree = self.trees.entry(layer).or_default();
        let duplicate = tree
            .locate_in_envelope_intersecting(&envelope(bbox))
            .any(|c| c.bbox == bbox && c.shape == shape);
        if duplicate {
            return false;
        }
        let id = self.next_id;
        self.next_id += 1;
        tree.insert(Cut {
            id,
            layer,
            shape,
            bbox,
        });
        true
    }

    /// Removes a cut, returning `true` if it was present.
    pub fn remove(&mut self, cut: &Cut) -> bool {
        self.trees
            .get_mut(&cut.layer)
            .and_then(|t| t.remove(cut))
            .is_some()
    }

    /// The cuts on `layer` whose bounding boxes touch `rect`, ordered by ID.
    pub fn in_rect(&self, layer: LayerId, rect: Rect) -> Vec<Cut> {
        let Some(tree) = self.trees.get(&layer) else {
            return Vec::new();
        };
        let mut cuts: Vec<Cut> = tree
            .locate_in_envelope_intersecting(&envelope(rect))
            .cloned()
            .collect();
        cuts.sort_by_key(|c| c.id);
        cuts
    }

    /// The cuts on `layer` lying entirely inside `rect`.
    pub fn within(&self, layer: LayerId, rect: Rect) -> Vec<Cut> {
        let mut cuts = self.in_rect(layer, rect);
        cuts.retain(|c| rect.contains_rect(&c.bbox));
        cuts
    }

    /// Every cut on `layer` in processing order: descending x, then descending y.
    pub fn ordered(&self, layer: LayerId) -> Vec<Cut> {
        let Some(tree) = self.trees.get(&layer) else {
            return Vec::new();
        };
        let mut cuts: Vec<Cut> = tree.iter().cloned().collect();
        cuts.sort_by(|a, b| {
            let (ca, cb) = (a.bbox.center_f(), b.bbox.center_f());
            cb.x.total_cmp(&ca.x)
                .then(cb.y.total_cmp(&ca.y))
                .then(a.id.cmp(&b.id))
        });
        cuts
    }

    /// The layers holding at least one cut, in ID order.
    pub fn layers(&self) -> Vec<LayerId> {
        self.trees
            .iter()
            .filter(|(_, t)| t.size() > 0)
            .map(|(l, _)| *l)
            .collect()
    }

    pub fn len(&self, layer: LayerId) -> usize {
        self.trees.get(&layer).map(RTree::size).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.trees.values().all(|t| t.size() == 0)
    }

    /// Removes and returns every remaining cut, in processing order per layer.
    pub fn drain(&mut self) -> Vec<Cut> {
        let cuts: Vec<Cut> = self
            .layers()
            .into_iter()
            .flat_map(|layer| self.ordered(layer))
            .collect();
        self.trees.clear();
        cuts
    }
}
