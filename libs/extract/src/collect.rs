//! Gathers a cell's geometry into the working merge set and cut index.

use std::collections::HashMap;

use arcstr::ArcStr;
use diagnostics::Severity;
use geometry::prelude::*;
use layir::{ArcEnd, ArcInst, Cell, CellId, NodeId, NodeInst, NodeProto};
use tech::{Doping, LayerFunction, LayerId, NodeKind, TemplateId};
use tracing::{span, Level};

use crate::context::{ExtractContext, ParkedPin, PendingExport};
use crate::error::{ExtractError, Result};
use crate::fallback::drop_dust;
use crate::issue::Cause;
use crate::shapes::{arc_geometry, node_geometry, primitive_ports};
use crate::trace::{Stage, TraceAction};

/// A dissolved shape awaiting folding.
struct Loose {
    layer: LayerId,
    shape: Polygon,
}

struct Walk {
    loose: Vec<Loose>,
}

/// Collects the contents of `source` into `ctx`.
pub(crate) fn collect(ctx: &mut ExtractContext<'_>, source: CellId) -> Result<()> {
    let span = span!(Level::INFO, "stage", stage = %Stage::Collect);
    let _guard = span.enter();
    ctx.check_cancelled(Stage::Collect)?;

    let library = ctx.library;
    let cell = library
        .try_cell(source)
        .ok_or_else(|| ExtractError::UnknownCell(arcstr::format!("{source}")))?;

    let mut walk = Walk { loose: Vec::new() };
    let node_map = walk_cell(ctx, &mut walk, cell, Transformation::identity(), true);
    carry_exports(ctx, cell, &node_map);
    fold(ctx, walk.loose);
    Ok(())
}

/// Copies or dissolves everything in `cell`, placed by `trans`.
///
/// Returns the IDs of the nodes copied into the extracted cell.
fn walk_cell(
    ctx: &mut ExtractContext<'_>,
    walk: &mut Walk,
    cell: &Cell,
    trans: Transformation,
    top: bool,
) -> HashMap<NodeId, NodeId> {
    let library = ctx.library;
    let mut copied = HashMap::new();

    for (id, node) in cell.nodes() {
        match node.proto() {
            NodeProto::Cell(child) => {
                let Some(child_cell) = library.try_cell(child) else {
                    continue;
                };
                let placement = node.transformation();
                if let (true, Some(t)) = (ctx.options.should_expand(child_cell.name()), placement) {
                    tracing::debug!(instance = %node.name(), cell = %child_cell.name(), "flattening instance");
                    walk_cell(ctx, walk, child_cell, Transformation::cascade(trans, t), false);
                    continue;
                }
                let target = ctx.memo.get(&child).copied().unwrap_or(child);
                let center = trans.apply(node.center());
                if !center.in_range() {
                    out_of_range(ctx, node.name(), center);
                    continue;
                }
                let copy = NodeInst::instance(target, center)
                    .with_name(node.name().clone())
                    .with_orientation(node.orientation().transformed(trans));
                copied.insert(id, ctx.cell.add_node(copy));
            }
            NodeProto::Primitive(t) => {
                let template = ctx.tech.template(t);
                if template.kind().is_dissolvable() {
                    dissolve_node(ctx, walk, node, trans);
                    continue;
                }
                let copy = transform_node(node, t, trans);
                if !copy.bbox().corners().iter().all(Point::in_range) {
                    out_of_range(ctx, node.name(), copy.center());
                    continue;
                }
                let exported = cell.exports_on(id);
                if top
                    && template.kind() == NodeKind::Pin
                    && !exported.is_empty()
                    && cell.arcs_on(id).is_empty()
                {
                    ctx.parked_pins.push(ParkedPin {
                        template: t,
                        center: copy.center(),
                        exports: exported
                            .iter()
                            .map(|e| (e.name().clone(), e.port().clone()))
                            .collect(),
                    });
                    continue;
                }
                for (layer, region) in node_geometry(ctx.tech, &copy) {
                    let layer = ctx.effective_layer(layer);
                    ctx.original.add(layer, &region);
                }
                copied.insert(id, ctx.add_node(copy, Stage::Collect));
            }
        }
    }

    for (_, arc) in cell.arcs() {
        let ends = (copied.get(&arc.head().node), copied.get(&arc.tail().node));
        if let (Some(head), Some(tail)) = ends {
            let head = ArcEnd::new(*head, arc.head().port.clone(), trans.apply(arc.head().location));
            let tail = ArcEnd::new(*tail, arc.tail().port.clone(), trans.apply(arc.tail().location));
            let copy = ArcInst::new(arc.proto(), head, tail, arc.width())
                .with_extension(arc.head_extended(), arc.tail_extended());
            for (layer, region) in arc_geometry(ctx.tech, &copy) {
                let layer = ctx.effective_layer(layer);
                ctx.original.add(layer, &region);
            }
            ctx.add_arc(copy, Stage::Collect);
            continue;
        }
        // A wire attached to dissolved geometry is dissolved with it.
        let owner = cell
            .try_node(arc.head().node)
            .map(|n| n.name().clone())
            .unwrap_or_default();
        for (layer, region) in arc_geometry(ctx.tech, arc) {
            for outline in region.outlines() {
                place_loose(ctx, walk, layer, outline, trans, &owner, "wire");
            }
        }
    }

    copied
}

fn transform_node(node: &NodeInst, template: TemplateId, trans: Transformation) -> NodeInst {
    let mut copy = NodeInst::primitive(template, trans.apply(node.center()), node.size())
        .with_name(node.name().clone())
        .with_orientation(node.orientation().transformed(trans));
    if let Some(trace) = node.trace() {
        copy = copy.with_trace(trace.iter().map(|p| trans.apply(*p)).collect());
    }
    copy
}

fn dissolve_node(ctx: &mut ExtractContext<'_>, walk: &mut Walk, node: &NodeInst, trans: Transformation) {
    let Some(t) = node.template() else {
        return;
    };
    let template = ctx.tech.template(t);
    let shapes: Vec<(LayerId, Polygon)> = match node.trace() {
        Some(trace) => template
            .all_layers()
            .into_iter()
            .map(|l| (l, Polygon::new(trace.to_vec())))
            .collect(),
        None => template
            .layer_rects(node.size())
            .into_iter()
            .map(|(l, r)| (l, node.place_rect(r)))
            .collect(),
    };
    for (layer, shape) in shapes {
        place_loose(ctx, walk, layer, shape, trans, node.name(), "dissolved");
    }
}

/// Moves a dissolved shape into the extracted cell's coordinates, snapped to the grid.
fn place_loose(
    ctx: &mut ExtractContext<'_>,
    walk: &mut Walk,
    layer: LayerId,
    shape: Polygon,
    trans: Transformation,
    owner: &ArcStr,
    note: &str,
) {
    let shape = shape.transform(trans);
    let snapped = match ctx.options.alignment {
        Some(grid) => shape.snap_to_grid(grid),
        None => shape,
    };
    if !snapped.in_range() {
        out_of_range(ctx, owner, snapped.center());
        return;
    }
    push_loose(ctx, walk, layer, snapped, note);
}

fn push_loose(ctx: &mut ExtractContext<'_>, walk: &mut Walk, layer: LayerId, shape: Polygon, note: &str) {
    if shape.is_degenerate() {
        return;
    }
    let layer = ctx.tech.canonical_layer(layer);
    ctx.record(Stage::Collect, TraceAction::Leftover, Some(layer), shape.clone(), note);
    walk.loose.push(Loose { layer, shape });
}

fn out_of_range(ctx: &mut ExtractContext<'_>, instance: &ArcStr, at: Point) {
    ctx.issue(
        Cause::CoordinateOutOfRange {
            instance: instance.clone(),
        },
        Severity::Warning,
        vec![at],
    );
}

/// Carries the source cell's exports over to copied nodes, or defers them.
fn carry_exports(ctx: &mut ExtractContext<'_>, cell: &Cell, copied: &HashMap<NodeId, NodeId>) {
    for export in cell.exports() {
        if let Some(node) = copied.get(&export.node()) {
            ctx.cell.add_export(export.name(), *node, export.port().clone());
            ctx.stats.exports += 1;
            continue;
        }
        let Some(node) = cell.try_node(export.node()) else {
            continue;
        };
        let Some(template) = node.template().map(|t| ctx.tech.template(t)) else {
            continue;
        };
        // Parked pins carry their own exports.
        if template.kind() == NodeKind::Pin {
            continue;
        }
        let layer = match template.kind() {
            NodeKind::PureLayer(layer) => Some(ctx.effective_layer(layer)),
            _ => None,
        };
        let location = primitive_ports(ctx.tech, node)
            .into_iter()
            .find(|p| &p.name == export.port())
            .map(|p| p.center)
            .unwrap_or_else(|| node.center());
        ctx.pending_exports.push(PendingExport {
            name: export.name().clone(),
            location: ctx.options.snap(location),
            layer,
        });
    }
}

/// The layer a diffusion shape belongs on, given the select layers around it.
fn relabel_diff(
    ctx: &ExtractContext<'_>,
    layer: LayerId,
    shape: &Region,
    selects: &HashMap<Doping, Region>,
) -> LayerId {
    let LayerFunction::Diff(doping) = ctx.tech.function(layer) else {
        return layer;
    };
    let touches = |d: Doping| selects.get(&d).is_some_and(|s| s.overlaps(shape));
    if touches(doping.opposite()) && !touches(doping) {
        if let Some(other) = ctx.tech.layer_for(LayerFunction::Diff(doping.opposite())) {
            tracing::debug!(
                from = %ctx.tech.layer(layer).name(),
                to = %ctx.tech.layer(other).name(),
                "relabeled active under opposite select"
            );
            return other;
        }
    }
    layer
}

/// Folds dissolved shapes into the working merge set and cut index.
fn fold(ctx: &mut ExtractContext<'_>, loose: Vec<Loose>) {
    let mut selects: HashMap<Doping, Region> = HashMap::new();
    for item in &loose {
        if let LayerFunction::Select(d) = ctx.tech.function(item.layer) {
            selects
                .entry(d)
                .or_default()
                .add(&Region::from_polygon(&item.shape));
        }
    }

    let mut cut_shapes = Vec::new();
    for Loose { layer, shape } in loose {
        let function = ctx.tech.function(layer);
        if function.is_contact() {
            let at = shape.center();
            if ctx.cuts.insert(layer, shape.clone()) {
                cut_shapes.push((layer, shape));
            } else {
                ctx.issue(
                    Cause::DuplicateCut {
                        layer: ctx.tech.layer(layer).name().clone(),
                    },
                    Severity::Info,
                    vec![at],
                );
            }
            continue;
        }
        let region = Region::from_polygon(&shape);
        let layer = if function.is_diff() && !ctx.process.unify_active {
            relabel_diff(ctx, layer, &region, &selects)
        } else {
            ctx.effective_layer(layer)
        };
        ctx.working.add(layer, &region);
    }

    for (layer, region) in ctx.working.iter() {
        ctx.original.add(layer, region);
    }
    for (layer, shape) in cut_shapes {
        ctx.original.add_polygon(layer, &shape);
    }
    if ctx.options.min_area > 0 {
        let layers: Vec<LayerId> = ctx.working.layers().collect();
        for layer in layers {
            for piece in ctx.original.region(layer).components() {
                if ctx.working.overlaps(layer, &piece) && drop_dust(ctx, Stage::Collect, layer, &piece) {
                    ctx.working.subtract(layer, &piece);
                }
            }
        }
    }
    tracing::debug!(
        layers = ctx.working.layers().count(),
        cuts = ctx.cuts.layers().iter().map(|l| ctx.cuts.len(*l)).sum::<usize>(),
        "collected geometry"
    );
}
