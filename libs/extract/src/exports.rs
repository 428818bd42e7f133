//! Reattachment of exports to the extracted topology.

use arcstr::ArcStr;
use diagnostics::Severity;
use geometry::prelude::*;
use layir::{ArcEnd, ArcId, ArcInst, Cell, LibraryBuilder, NodeId, NodeProto};
use tech::{ArcProtoId, LayerId, NodeKind, Technology};
use tracing::{span, Level};

use crate::context::{ExportRequest, ExtractContext};
use crate::error::Result;
use crate::issue::Cause;
use crate::nets::Nets;
use crate::shapes::{arc_region, primitive_ports};
use crate::trace::Stage;

/// What an export may attach to.
#[derive(Debug, Clone, Copy)]
enum Accepts<'a> {
    /// Ports carrying wires on this layer, or pure-layer nodes drawing it.
    Layer(LayerId),
    /// Ports accepting one of these wire types.
    Arcs(&'a [ArcProtoId]),
    Any,
}

impl Accepts<'_> {
    fn arc(&self, tech: &Technology, arc: ArcProtoId) -> bool {
        match self {
            Accepts::Layer(l) => tech.arc(arc).primary_layer() == *l,
            Accepts::Arcs(arcs) => arcs.contains(&arc),
            Accepts::Any => true,
        }
    }
}

/// A node port at `p` compatible with `accepts`. Non-pin nodes win.
fn port_at(ctx: &ExtractContext<'_>, p: Point, accepts: Accepts<'_>) -> Option<(NodeId, ArcStr)> {
    let mut pin = None;
    for (id, node) in ctx.cell.nodes() {
        let Some(t) = node.template() else {
            continue;
        };
        let kind = ctx.tech.template(t).kind();
        for port in primitive_ports(ctx.tech, node) {
            if !port.touches(p) {
                continue;
            }
            let ok = match (accepts, kind) {
                (Accepts::Layer(l), NodeKind::PureLayer(own)) => ctx.effective_layer(own) == l,
                _ => port.arcs.iter().any(|a| accepts.arc(ctx.tech, *a)),
            };
            if !ok {
                continue;
            }
            if kind == NodeKind::Pin {
                pin.get_or_insert((id, port.name));
            } else {
                return Some((id, port.name));
            }
        }
    }
    pin
}

/// A wire of a compatible type whose footprint covers `p`, and the point on its centerline nearest `p`.
fn arc_through(ctx: &ExtractContext<'_>, p: Point, accepts: Accepts<'_>) -> Option<(ArcId, Point)> {
    ctx.cell.arcs().find_map(|(id, arc)| {
        if !accepts.arc(ctx.tech, arc.proto()) {
            return None;
        }
        let layer = ctx.tech.arc(arc.proto()).primary_layer();
        let footprint = arc_region(ctx.tech, arc, layer)?;
        if !footprint.touches_point(p) {
            return None;
        }
        let (a, b) = (arc.head().location.to_f(), arc.tail().location.to_f());
        let u = (b - a).scale(1. / a.distance(b));
        let t = (p.to_f() - a).dot(u).clamp(0., a.distance(b));
        Some((id, ctx.options.snap_f(a + u.scale(t))))
    })
}

/// Splits a wire at `at` with a new pin, returning the pin.
fn split_arc(ctx: &mut ExtractContext<'_>, id: ArcId, at: Point) -> Option<(NodeId, ArcStr)> {
    let arc = ctx.cell.try_arc(id)?.clone();
    let end = if arc.head().location == at {
        Some(arc.head())
    } else if arc.tail().location == at {
        Some(arc.tail())
    } else {
        None
    };
    if let Some(end) = end {
        return Some((end.node, end.port.clone()));
    }
    let pin = ctx.pin_at(at, arc.proto(), Stage::Exports);
    let port = ctx
        .tech
        .template(ctx.tech.arc(arc.proto()).pin())
        .ports()
        .first()?
        .name
        .clone();
    ctx.cell.remove_arc(id);
    ctx.stats.arcs = ctx.stats.arcs.saturating_sub(1);
    let mid = ArcEnd::new(pin, port.clone(), at);
    let first = ArcInst::new(arc.proto(), arc.head().clone(), mid.clone(), arc.width())
        .with_extension(arc.head_extended(), true);
    let second = ArcInst::new(arc.proto(), mid, arc.tail().clone(), arc.width())
        .with_extension(true, arc.tail_extended());
    ctx.add_arc(first, Stage::Exports);
    ctx.add_arc(second, Stage::Exports);
    tracing::debug!(at = %at, "split wire for export");
    Some((pin, port))
}

/// Finds or makes a port for an export at `p`.
fn landing(ctx: &mut ExtractContext<'_>, p: Point, accepts: Accepts<'_>) -> Option<(NodeId, ArcStr)> {
    if let Some(found) = port_at(ctx, p, accepts) {
        return Some(found);
    }
    let (id, at) = arc_through(ctx, p, accepts)?;
    split_arc(ctx, id, at)
}

fn export(ctx: &mut ExtractContext<'_>, name: &str, node: NodeId, port: ArcStr) {
    let assigned = ctx.cell.add_export(name, node, port);
    if assigned.as_str() != name {
        tracing::warn!(export = %name, renamed = %assigned, "export name already taken");
    }
    ctx.stats.exports += 1;
}

/// Attaches every deferred export to the extracted topology.
pub(crate) fn reconcile(ctx: &mut ExtractContext<'_>) -> Result<()> {
    let span = span!(Level::INFO, "stage", stage = %Stage::Exports);
    let _guard = span.enter();
    ctx.check_cancelled(Stage::Exports)?;

    for pending in std::mem::take(&mut ctx.pending_exports) {
        let accepts = pending.layer.map(Accepts::Layer).unwrap_or(Accepts::Any);
        if let Some((node, port)) = landing(ctx, pending.location, accepts) {
            export(ctx, &pending.name, node, port);
            continue;
        }
        // No geometry is left at the location; give the export a pin of its own.
        let arc = pending
            .layer
            .and_then(|l| ctx.tech.arcs_on(l).first().copied());
        let Some(arc) = arc else {
            tracing::warn!(export = %pending.name, "no pin type for export; dropped");
            continue;
        };
        let pin = ctx.pin_at(pending.location, arc, Stage::Exports);
        let port = ctx
            .tech
            .template(ctx.tech.arc(arc).pin())
            .ports()
            .first()
            .map(|p| p.name.clone())
            .unwrap_or_default();
        export(ctx, &pending.name, pin, port);
        ctx.issue(
            Cause::ExportOnNewPin {
                export: pending.name.clone(),
            },
            Severity::Info,
            vec![pending.location],
        );
    }

    for parked in std::mem::take(&mut ctx.parked_pins) {
        let template = ctx.tech.template(parked.template);
        let arcs: Vec<ArcProtoId> = template
            .ports()
            .iter()
            .flat_map(|p| p.arcs.iter().copied())
            .collect();
        let mut standalone = None;
        for (name, port) in parked.exports {
            if let Some((node, port)) = landing(ctx, parked.center, Accepts::Arcs(&arcs)) {
                export(ctx, &name, node, port);
                continue;
            }
            let pin = *standalone.get_or_insert_with(|| {
                ctx.add_node(
                    layir::NodeInst::primitive(parked.template, parked.center, Dims::default()),
                    Stage::Exports,
                )
            });
            export(ctx, &name, pin, port);
        }
    }
    Ok(())
}

/// Creates the exports that wires of `parent` require on its subcells.
///
/// A requested export whose net already has a real export is named after
/// it; the parent's wire ends are renamed to match.
pub(crate) fn apply_requests(
    tech: &Technology,
    library: &mut LibraryBuilder,
    parent: &mut Cell,
    requests: Vec<ExportRequest>,
    placeholder_prefix: &str,
) {
    for request in requests {
        let Some(child) = library.try_cell(request.child) else {
            continue;
        };
        if child.try_node(request.node).is_none() {
            continue;
        }
        let existing = child
            .exports_on(request.node)
            .into_iter()
            .find(|e| *e.port() == request.port)
            .map(|e| e.name().clone());
        let name = match existing {
            Some(name) => name,
            None => {
                let mut nets = Nets::build(tech, library, child, placeholder_prefix);
                let base = nets
                    .export_name(request.node, &request.port)
                    .unwrap_or_else(|| request.name.clone());
                let Some(child) = library.try_cell_mut(request.child) else {
                    continue;
                };
                let name = child.add_export(&base, request.node, request.port.clone());
                tracing::debug!(cell = %child.name(), export = %name, "created subcell export");
                name
            }
        };
        if name == request.name {
            continue;
        }
        rename_ends(parent, request.child, &request.name, &name);
    }
}

/// Renames the port of every wire end on an instance of `child` from `old` to `new`.
fn rename_ends(parent: &mut Cell, child: layir::CellId, old: &str, new: &ArcStr) {
    let instances: Vec<NodeId> = parent
        .nodes()
        .filter(|(_, n)| n.proto() == NodeProto::Cell(child))
        .map(|(id, _)| id)
        .collect();
    let ids: Vec<ArcId> = parent.arcs().map(|(id, _)| id).collect();
    for id in ids {
        let Some(arc) = parent.try_arc_mut(id) else {
            continue;
        };
        if instances.contains(&arc.head().node) && arc.head().port.as_str() == old {
            arc.head_mut().port = new.clone();
        }
        if instances.contains(&arc.tail().node) && arc.tail().port.as_str() == old {
            arc.tail_mut().port = new.clone();
        }
    }
}
