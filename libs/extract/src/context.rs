//! The scratch state of one cell's extraction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arcstr::ArcStr;
use diagnostics::{IssueSet, Severity};
use geometry::prelude::*;
use layir::{ArcId, ArcInst, Cell, CellId, LibraryBuilder, NodeId, NodeInst};
use serde::{Deserialize, Serialize};
use tech::{ArcProtoId, Doping, LayerFunction, LayerId, NodeKind, Technology, TemplateId};

use crate::config::{ValidatedOptions, ViaHalo};
use crate::cuts::CutIndex;
use crate::error::{ExtractError, Result};
use crate::issue::{Cause, ExtractIssue};
use crate::merge::MergeSet;
use crate::process::ProcessInfo;
use crate::shapes::{arc_geometry, node_geometry};
use crate::trace::{Stage, TraceAction, TraceEvent, TraceSink};

/// A flag shared between a run and whoever may cancel it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that the run stop at the start of its next stage.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counts of what one cell's extraction produced.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractStats {
    pub contacts: usize,
    pub transistors: usize,
    pub other_devices: usize,
    pub arcs: usize,
    pub pins: usize,
    pub pure_layer: usize,
    pub exports: usize,
    pub dust: usize,
}

/// An export of the source cell whose node was dissolved.
#[derive(Debug, Clone)]
pub(crate) struct PendingExport {
    pub name: ArcStr,
    pub location: Point,
    pub layer: Option<LayerId>,
}

/// An exported pin with no wires, held back until the new topology exists.
#[derive(Debug, Clone)]
pub(crate) struct ParkedPin {
    pub template: TemplateId,
    pub center: Point,
    pub exports: Vec<(ArcStr, ArcStr)>,
}

/// An export that must be created on a child cell so that a wire can reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExportRequest {
    pub child: CellId,
    pub node: NodeId,
    pub port: ArcStr,
    pub name: ArcStr,
}

pub(crate) struct ExtractContext<'a> {
    pub tech: &'a Technology,
    pub options: &'a ValidatedOptions,
    pub process: &'a ProcessInfo,
    /// The library being written. Children of the current cell are already in it.
    pub library: &'a LibraryBuilder,
    /// Source cell to extracted cell, for children extracted earlier in the run.
    pub memo: &'a HashMap<CellId, CellId>,
    pub cancel: &'a CancelToken,
    pub trace: &'a mut dyn TraceSink,
    pub cell: Cell,
    /// Geometry not yet explained by any realized node or wire.
    pub working: MergeSet,
    /// All collected geometry, including cuts.
    pub original: MergeSet,
    pub cuts: CutIndex,
    pub issues: IssueSet<ExtractIssue>,
    pub stats: ExtractStats,
    pub pending_exports: Vec<PendingExport>,
    pub parked_pins: Vec<ParkedPin>,
    pub export_requests: Vec<ExportRequest>,
    pins: HashMap<(Point, ArcProtoId), NodeId>,
}

impl<'a> ExtractContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        tech: &'a Technology,
        options: &'a ValidatedOptions,
        process: &'a ProcessInfo,
        library: &'a LibraryBuilder,
        memo: &'a HashMap<CellId, CellId>,
        cancel: &'a CancelToken,
        trace: &'a mut dyn TraceSink,
        name: ArcStr,
    ) -> Self {
        Self {
            tech,
            options,
            process,
            library,
            memo,
            cancel,
            trace,
            cell: Cell::new(name),
            working: MergeSet::new(),
            original: MergeSet::new(),
            cuts: CutIndex::new(),
            issues: IssueSet::new(),
            stats: ExtractStats::default(),
            pending_exports: Vec::new(),
            parked_pins: Vec::new(),
            export_requests: Vec::new(),
            pins: HashMap::new(),
        }
    }

    /// Fails if the run has been cancelled.
    pub(crate) fn check_cancelled(&self, stage: Stage) -> Result<()> {
        if self.cancel.is_cancelled() {
            tracing::warn!(%stage, cell = %self.cell.name(), "extraction cancelled");
            return Err(ExtractError::Cancelled);
        }
        Ok(())
    }

    /// The layer that geometry drawn on `layer` is collected onto.
    pub(crate) fn effective_layer(&self, layer: LayerId) -> LayerId {
        let canonical = self.tech.canonical_layer(layer);
        if self.process.unify_active && self.tech.function(canonical).is_diff() {
            self.process.unified_diff.unwrap_or(canonical)
        } else {
            canonical
        }
    }

    /// Returns `true` if `layer` covers `region` in the original geometry.
    ///
    /// Wells implied by the substrate are present wherever the opposite
    /// well is not drawn.
    pub(crate) fn layer_satisfied(&self, layer: LayerId, region: &Region) -> bool {
        let layer = self.effective_layer(layer);
        let function = self.tech.function(layer);
        if self.process.ignore_surrounds && (function.is_select() || function.is_well()) {
            return true;
        }
        if self.original.contains_region(layer, region) {
            return true;
        }
        match function {
            LayerFunction::Well(doping) if self.process.substrate.implied_well() == Some(doping) => {
                self.opposite_well_absent(doping, region)
            }
            _ => false,
        }
    }

    fn opposite_well_absent(&self, doping: Doping, region: &Region) -> bool {
        self.tech
            .layers_with(|f| f == LayerFunction::Well(doping.opposite()))
            .into_iter()
            .all(|l| !self.original.overlaps(self.effective_layer(l), region))
    }

    /// Returns `true` if `layer` does not touch `region` in the original geometry.
    pub(crate) fn layer_absent(&self, layer: LayerId, region: &Region) -> bool {
        !self.original.overlaps(self.effective_layer(layer), region)
    }

    pub(crate) fn record(
        &mut self,
        stage: Stage,
        action: TraceAction,
        layer: Option<LayerId>,
        shape: Polygon,
        note: impl Into<String>,
    ) {
        self.trace.record(TraceEvent {
            stage,
            action,
            layer,
            shape,
            note: note.into(),
        });
    }

    pub(crate) fn issue(&mut self, cause: Cause, severity: Severity, locations: Vec<Point>) {
        let issue = ExtractIssue::new(self.cell.name().clone(), cause, severity, locations);
        self.issues.add_and_log(issue);
    }

    /// Adds a realized node to the cell.
    pub(crate) fn add_node(&mut self, node: NodeInst, stage: Stage) -> NodeId {
        let mut note = "node";
        if let Some(t) = node.template() {
            let template = self.tech.template(t);
            note = match template.kind() {
                NodeKind::Pin => {
                    self.stats.pins += 1;
                    "pin"
                }
                NodeKind::Contact => {
                    self.stats.contacts += 1;
                    "contact"
                }
                NodeKind::Transistor(_) => {
                    self.stats.transistors += 1;
                    "transistor"
                }
                NodeKind::Resistor | NodeKind::Capacitor => {
                    self.stats.other_devices += 1;
                    "device"
                }
                NodeKind::PureLayer(_) => {
                    self.stats.pure_layer += 1;
                    "pure-layer shape"
                }
            };
            tracing::debug!(
                template = %template.name(),
                x = node.center().x,
                y = node.center().y,
                orientation = %node.orientation(),
                "realized {note}"
            );
        }
        let bbox = Polygon::from_rect(node.bbox());
        let id = self.cell.add_node(node);
        self.record(stage, TraceAction::Realized, None, bbox, note);
        id
    }

    /// Adds a realized wire to the cell. Zero-length and zero-width wires are refused.
    pub(crate) fn add_arc(&mut self, arc: ArcInst, stage: Stage) -> Option<ArcId> {
        if arc.is_degenerate() {
            tracing::debug!(
                x = arc.head().location.x,
                y = arc.head().location.y,
                "refused degenerate wire"
            );
            return None;
        }
        let proto = self.tech.arc(arc.proto());
        tracing::debug!(
            arc = %proto.name(),
            width = arc.width(),
            head = %arc.head().location,
            tail = %arc.tail().location,
            "realized wire"
        );
        let layer = proto.primary_layer();
        let shape = Polygon::new(vec![arc.head().location, arc.tail().location]);
        self.stats.arcs += 1;
        let id = self.cell.add_arc(arc);
        self.record(stage, TraceAction::Realized, Some(layer), shape, "wire");
        Some(id)
    }

    /// The pin of wire type `arc` at `p`, creating it if needed.
    pub(crate) fn pin_at(&mut self, p: Point, arc: ArcProtoId, stage: Stage) -> NodeId {
        if let Some(id) = self.pins.get(&(p, arc)) {
            if self.cell.try_node(*id).is_some() {
                return *id;
            }
        }
        let pin = self.tech.arc(arc).pin();
        let id = self.add_node(NodeInst::primitive(pin, p, Dims::default()), stage);
        self.pins.insert((p, arc), id);
        id
    }

    /// Removes the geometry of a realized node from the unclassified geometry.
    pub(crate) fn consume_node(&mut self, node: &NodeInst) {
        let cut_layer = node
            .template()
            .and_then(|t| self.tech.template(t).cuts().map(|c| c.layer));
        for (layer, region) in node_geometry(self.tech, node) {
            if self.options.via_halo == ViaHalo::Keep
                && cut_layer.is_some()
                && Some(layer) != cut_layer
            {
                continue;
            }
            let layer = self.effective_layer(layer);
            self.working.subtract(layer, &region);
        }
    }

    /// Removes the geometry of a realized wire from the unclassified geometry.
    pub(crate) fn consume_arc(&mut self, arc: &ArcInst) {
        for (layer, region) in arc_geometry(self.tech, arc) {
            let layer = self.effective_layer(layer);
            self.working.subtract(layer, &region);
        }
    }

    /// Returns `true` if every layer of a wire lies within the original geometry.
    pub(crate) fn arc_fits(&self, arc: &ArcInst) -> bool {
        self.arc_fits_reaching(arc, &Region::new())
    }

    /// Like [`Self::arc_fits`], but the wire may also overlap `reach`.
    pub(crate) fn arc_fits_reaching(&self, arc: &ArcInst, reach: &Region) -> bool {
        arc_geometry(self.tech, arc).iter().all(|(layer, region)| {
            let outside = if reach.is_empty() {
                region.clone()
            } else {
                region.difference(reach)
            };
            self.layer_satisfied(*layer, &outside)
        })
    }
}
