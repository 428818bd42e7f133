//! Technology descriptions for layout extraction.
//!
//! A [`Technology`] enumerates [`Layer`]s with their [`LayerFunction`],
//! primitive [`NodeTemplate`]s (pins, contacts, transistors, and so on), and
//! wire types ([`ArcProto`]). Technologies are immutable once validated and
//! are shared by reference throughout an extraction run.

use std::collections::HashSet;

use arcstr::ArcStr;
use geometry::prelude::*;
use serde::{Deserialize, Serialize};

pub mod arc;
pub mod error;
pub mod id;
pub mod layer;
pub mod template;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use arc::{ArcLayer, ArcProto};
pub use error::{Result, TechError};
pub use id::{ArcProtoId, LayerId, TemplateId};
pub use layer::{Doping, Layer, LayerFunction};
pub use template::{CutRule, NodeKind, NodeLayer, NodeTemplate, PortTemplate};

#[cfg(test)]
mod tests;

/// A validated technology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TechnologyData")]
pub struct Technology {
    name: ArcStr,
    layers: Vec<Layer>,
    templates: Vec<NodeTemplate>,
    arcs: Vec<ArcProto>,
}

/// Unvalidated technology contents, as read from a file.
#[derive(Debug, Clone, Deserialize)]
struct TechnologyData {
    name: ArcStr,
    layers: Vec<Layer>,
    #[serde(default)]
    templates: Vec<NodeTemplate>,
    #[serde(default)]
    arcs: Vec<ArcProto>,
}

impl TryFrom<TechnologyData> for Technology {
    type Error = TechError;

    fn try_from(value: TechnologyData) -> Result<Self> {
        Technology::new(value.name, value.layers, value.templates, value.arcs)
    }
}

impl Technology {
    /// Validates and creates a technology.
    ///
    /// A pure-layer template is added for every layer that does not already have one.
    pub fn new(
        name: impl Into<ArcStr>,
        layers: Vec<Layer>,
        templates: Vec<NodeTemplate>,
        arcs: Vec<ArcProto>,
    ) -> Result<Self> {
        let mut tech = Self {
            name: name.into(),
            layers,
            templates,
            arcs,
        };
        tech.validate()?;
        tech.add_pure_layer_templates();
        Ok(tech)
    }

    fn validate(&self) -> Result<()> {
        let nlayers = self.layers.len();
        let check_layer = |owner: &ArcStr, layer: LayerId| {
            if layer.index() < nlayers {
                Ok(())
            } else {
                Err(TechError::UnknownLayer {
                    owner: owner.clone(),
                    layer,
                })
            }
        };

        check_unique(self.layers.iter().map(|l| l.name()))?;
        check_unique(self.templates.iter().map(|t| t.name()))?;
        check_unique(self.arcs.iter().map(|a| a.name()))?;

        for template in &self.templates {
            for layer in template.all_layers() {
                check_layer(template.name(), layer)?;
            }
            if let NodeKind::PureLayer(layer) = template.kind() {
                check_layer(template.name(), layer)?;
            }
            if template.kind() != NodeKind::Pin && template.all_layers().is_empty() {
                return Err(TechError::EmptyTemplate(template.name().clone()));
            }
            if let Some(cuts) = template.cuts() {
                if cuts.size <= 0 || cuts.spacing < 0 || cuts.inset < 0 {
                    return Err(TechError::InvalidCutRule(template.name().clone()));
                }
            }
            for port in template.ports() {
                if port.arcs.iter().any(|a| a.index() >= self.arcs.len()) {
                    return Err(TechError::UnknownArc {
                        template: template.name().clone(),
                        port: port.name.clone(),
                    });
                }
            }
        }

        for arc in &self.arcs {
            if arc.layers().is_empty() {
                return Err(TechError::EmptyArc(arc.name().clone()));
            }
            for layer in arc.layers() {
                check_layer(arc.name(), layer.layer)?;
            }
            match self.templates.get(arc.pin().index()) {
                Some(t) if t.kind() == NodeKind::Pin => {}
                _ => {
                    return Err(TechError::InvalidPin {
                        arc: arc.name().clone(),
                        pin: arc.pin(),
                    })
                }
            }
        }
        Ok(())
    }

    fn add_pure_layer_templates(&mut self) {
        for (i, layer) in self.layers.iter().enumerate() {
            let id = LayerId(i as u32);
            if self
                .templates
                .iter()
                .any(|t| t.kind() == NodeKind::PureLayer(id))
            {
                continue;
            }
            let arcs: Vec<_> = self
                .arcs
                .iter()
                .enumerate()
                .filter(|(_, a)| a.primary_layer() == id)
                .map(|(j, _)| ArcProtoId(j as u32))
                .collect();
            let template = NodeTemplate::new(
                arcstr::format!("{}-node", layer.name()),
                NodeKind::PureLayer(id),
                Dims::default(),
            )
            .with_layer(id, Sides::default())
            .with_port("port", arcs, Sides::default());
            tracing::trace!(template = %template.name(), "adding pure-layer template");
            self.templates.push(template);
        }
    }

    /// The name of the technology.
    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// Gets the layer with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if the ID does not belong to this technology.
    #[inline]
    pub fn layer(&self, id: LayerId) -> &Layer {
        &self.layers[id.index()]
    }

    /// The function of the given layer.
    #[inline]
    pub fn function(&self, id: LayerId) -> LayerFunction {
        self.layer(id).function()
    }

    /// Iterates over the `(id, layer)` pairs of this technology.
    pub fn layers(&self) -> impl Iterator<Item = (LayerId, &Layer)> {
        self.layers
            .iter()
            .enumerate()
            .map(|(i, l)| (LayerId(i as u32), l))
    }

    /// The layers whose function satisfies `pred`, in ID order.
    pub fn layers_with(&self, pred: impl Fn(LayerFunction) -> bool) -> Vec<LayerId> {
        self.layers()
            .filter(|(_, l)| pred(l.function()))
            .map(|(id, _)| id)
            .collect()
    }

    /// Finds a layer by name.
    pub fn find_layer(&self, name: &str) -> Option<LayerId> {
        self.layers()
            .find(|(_, l)| l.name() == name)
            .map(|(id, _)| id)
    }

    /// The first layer with the same function as `id`.
    ///
    /// Shapes drawn on aliased layers are folded onto the canonical layer.
    pub fn canonical_layer(&self, id: LayerId) -> LayerId {
        let function = self.function(id);
        self.layers()
            .find(|(_, l)| l.function() == function)
            .map(|(id, _)| id)
            .unwrap_or(id)
    }

    /// The layer with exactly the given function, if any.
    pub fn layer_for(&self, function: LayerFunction) -> Option<LayerId> {
        self.layers()
            .find(|(_, l)| l.function() == function)
            .map(|(id, _)| id)
    }

    /// Gets the template with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if the ID does not belong to this technology.
    #[inline]
    pub fn template(&self, id: TemplateId) -> &NodeTemplate {
        &self.templates[id.index()]
    }

    /// Iterates over the `(id, template)` pairs of this technology.
    pub fn templates(&self) -> impl Iterator<Item = (TemplateId, &NodeTemplate)> {
        self.templates
            .iter()
            .enumerate()
            .map(|(i, t)| (TemplateId(i as u32), t))
    }

    /// Finds a template by name.
    pub fn find_template(&self, name: &str) -> Option<TemplateId> {
        self.templates()
            .find(|(_, t)| t.name() == name)
            .map(|(id, _)| id)
    }

    /// The pure-layer template drawing `layer`.
    pub fn pure_layer_template(&self, layer: LayerId) -> Option<TemplateId> {
        self.templates()
            .find(|(_, t)| t.kind() == NodeKind::PureLayer(layer))
            .map(|(id, _)| id)
    }

    /// Gets the wire type with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if the ID does not belong to this technology.
    #[inline]
    pub fn arc(&self, id: ArcProtoId) -> &ArcProto {
        &self.arcs[id.index()]
    }

    /// Iterates over the `(id, wire type)` pairs of this technology.
    pub fn arcs(&self) -> impl Iterator<Item = (ArcProtoId, &ArcProto)> {
        self.arcs
            .iter()
            .enumerate()
            .map(|(i, a)| (ArcProtoId(i as u32), a))
    }

    /// Finds a wire type by name.
    pub fn find_arc(&self, name: &str) -> Option<ArcProtoId> {
        self.arcs()
            .find(|(_, a)| a.name() == name)
            .map(|(id, _)| id)
    }

    /// The wire types whose primary layer is `layer`.
    pub fn arcs_on(&self, layer: LayerId) -> Vec<ArcProtoId> {
        self.arcs()
            .filter(|(_, a)| a.primary_layer() == layer)
            .map(|(id, _)| id)
            .collect()
    }

    /// Returns `true` if any layer has a function satisfying `pred`.
    pub fn has_function(&self, pred: impl Fn(LayerFunction) -> bool) -> bool {
        self.layers.iter().any(|l| pred(l.function()))
    }

    /// Returns `true` if both N- and P-type active layers exist.
    pub fn has_split_diff(&self) -> bool {
        self.has_function(|f| f == LayerFunction::Diff(Doping::N))
            && self.has_function(|f| f == LayerFunction::Diff(Doping::P))
    }
}

fn check_unique<'a>(names: impl Iterator<Item = &'a ArcStr>) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(TechError::DuplicateName(name.clone()));
        }
    }
    Ok(())
}
