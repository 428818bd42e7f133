//! Materialization of unexplained geometry as pure-layer nodes.

use diagnostics::Severity;
use geometry::prelude::*;
use layir::{ArcEnd, ArcInst, NodeId, NodeInst};
use tech::{LayerId, TemplateId};
use tracing::{span, Level};

use crate::context::ExtractContext;
use crate::error::Result;
use crate::issue::Cause;
use crate::shapes::{node_ports, primitive_ports};
use crate::trace::{Stage, TraceAction};

/// Splits a region with holes into hole-free vertical slabs.
fn slabs(region: &Region) -> Vec<Region> {
    if !region.has_holes() {
        return vec![region.clone()];
    }
    let Some(bbox) = region.bbox() else {
        return Vec::new();
    };
    let mut xs: Vec<i64> = region
        .edges()
        .into_iter()
        .flat_map(|(a, b)| [a.x.round() as i64, b.x.round() as i64])
        .collect();
    xs.sort_unstable();
    xs.dedup();
    let mut out = Vec::new();
    for w in xs.windows(2) {
        let strip = Rect::from_sides(w[0], bbox.bot(), w[1], bbox.top());
        out.extend(region.intersection(&Region::from_rect(strip)).components());
    }
    out
}

pub(crate) fn discard(
    ctx: &mut ExtractContext<'_>,
    stage: Stage,
    layer: LayerId,
    shape: &Region,
    cause: Cause,
    severity: Severity,
) {
    for outline in shape.outlines() {
        ctx.record(stage, TraceAction::Discarded, Some(layer), outline, cause.to_string());
    }
    let at = shape
        .interior_point()
        .map(|p| ctx.options.snap_f(p))
        .unwrap_or_default();
    ctx.issue(cause, severity, vec![at]);
}

/// Drops `shape` if it is smaller than the minimum area. Returns `true` if it was dropped.
pub(crate) fn drop_dust(ctx: &mut ExtractContext<'_>, stage: Stage, layer: LayerId, shape: &Region) -> bool {
    let area = shape.area();
    if area >= ctx.options.min_area as f64 {
        return false;
    }
    ctx.stats.dust += 1;
    let cause = Cause::DustDropped {
        layer: ctx.tech.layer(layer).name().clone(),
        area: area.round() as i64,
    };
    discard(ctx, stage, layer, shape, cause, Severity::Info);
    true
}

/// The pure-layer node drawing `piece`.
fn pure_node(template: TemplateId, piece: &Region) -> Option<NodeInst> {
    if let Some(rect) = piece.as_rect() {
        return Some(NodeInst::primitive(template, rect.center(), rect.dims()));
    }
    let outline = piece.as_polygon()?;
    let bbox = outline.bbox()?;
    Some(NodeInst::primitive(template, bbox.center(), bbox.dims()).with_trace(outline.into_points()))
}

/// Links a new pure-layer node to the nearest aligned port that a straight
/// wire of default width can reach inside the original geometry.
///
/// Both ends must lie on the alignment grid.
fn link_to_port(ctx: &mut ExtractContext<'_>, layer: LayerId, id: NodeId) {
    let Some(&arc) = ctx.tech.arcs_on(layer).first() else {
        return;
    };
    let node = ctx.cell.node(id);
    let Some(own) = primitive_ports(ctx.tech, node).into_iter().next() else {
        return;
    };
    let c = own.center;
    let grid = ctx.options.grid();
    if !c.is_on_grid(grid) {
        return;
    }
    let width = ctx.tech.arc(arc).default_width();
    let mut targets: Vec<(f64, NodeId, arcstr::ArcStr, Point)> = ctx
        .cell
        .nodes()
        .filter(|(other, _)| *other != id)
        .flat_map(|(other, n)| {
            node_ports(ctx.library, ctx.tech, n)
                .into_iter()
                .map(move |p| (other, p))
        })
        .filter(|(_, p)| p.accepts(arc) && p.center != c && p.center.is_on_grid(grid))
        .filter(|(_, p)| p.center.x == c.x || p.center.y == c.y)
        .map(|(other, p)| (p.center.to_f().distance(c.to_f()), other, p.name, p.center))
        .collect();
    targets.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    for (_, other, port, at) in targets {
        let inst = ArcInst::new(
            arc,
            ArcEnd::new(id, own.name.clone(), c),
            ArcEnd::new(other, port, at),
            width,
        )
        .with_extension(false, false);
        if ctx.arc_fits(&inst) {
            tracing::debug!(from = %c, to = %at, "linked pure-layer shape");
            ctx.add_arc(inst, Stage::PureLayer);
            return;
        }
    }
}

fn materialize(ctx: &mut ExtractContext<'_>, layer: LayerId, shape: &Region) {
    if drop_dust(ctx, Stage::PureLayer, layer, shape) {
        return;
    }
    let name = ctx.tech.layer(layer).name().clone();
    let template = ctx
        .tech
        .pure_layer_template(layer)
        .filter(|_| ctx.options.stages.pure_layer);
    let Some(template) = template else {
        discard(
            ctx,
            Stage::PureLayer,
            layer,
            shape,
            Cause::GeometryDiscarded { layer: name },
            Severity::Warning,
        );
        return;
    };
    for piece in slabs(shape) {
        let Some(node) = pure_node(template, &piece) else {
            continue;
        };
        let id = ctx.add_node(node, Stage::PureLayer);
        if ctx.options.stages.wires {
            link_to_port(ctx, layer, id);
        }
    }
}

/// Turns every remaining shape and cut into a pure-layer node.
pub(crate) fn fallback(ctx: &mut ExtractContext<'_>) -> Result<()> {
    let span = span!(Level::INFO, "stage", stage = %Stage::PureLayer);
    let _guard = span.enter();
    ctx.check_cancelled(Stage::PureLayer)?;

    let mut cuts = ctx.cuts.drain();
    cuts.sort_by_key(|c| c.id());
    for cut in cuts {
        materialize(ctx, cut.layer(), &Region::from_polygon(cut.shape()));
    }

    let layers: Vec<LayerId> = ctx.working.layers().collect();
    for layer in layers {
        let region = ctx.working.take(layer);
        for shape in region.components() {
            materialize(ctx, layer, &shape);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_splits_into_hole_free_slabs() {
        let outer = Region::from_rect(Rect::from_sides(0, 0, 30, 30));
        let hole = Region::from_rect(Rect::from_sides(10, 10, 20, 20));
        let ring = outer.difference(&hole);
        assert!(ring.has_holes());
        let pieces = slabs(&ring);
        assert!(pieces.iter().all(|p| !p.has_holes()));
        let total: f64 = pieces.iter().map(Region::area).sum();
        approx::assert_abs_diff_eq!(total, ring.area(), epsilon = 1e-6);
    }
}
