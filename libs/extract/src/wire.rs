//! Wire extraction from the remaining routable geometry.

use arcstr::ArcStr;
use diagnostics::Severity;
use geometry::prelude::*;
use layir::{ArcEnd, ArcInst, NodeId, NodeProto};
use tech::{ArcProtoId, LayerId, NodeKind};
use tracing::{span, Level};

use crate::centerline::{skeletonize, Centerline};
use crate::context::{ExportRequest, ExtractContext};
use crate::error::Result;
use crate::issue::Cause;
use crate::shapes::{node_ports, primitive_ports, PortShape};
use crate::trace::{Stage, TraceAction};

/// Where a wire end attaches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Terminal {
    /// A port of a node already in the cell.
    Port { node: NodeId, port: ArcStr },
    /// A port inside a subcell instance that must first be exported.
    Request { node: NodeId, request: ExportRequest },
    /// A new or shared pin.
    Pin,
}

/// A wire end with its final location.
#[derive(Debug, Clone)]
pub(crate) struct Anchor {
    pub terminal: Terminal,
    pub location: Point,
    pub extend: bool,
    /// The area of a subcell port the wire may run into.
    pub reach: Option<Polygon>,
}

/// The port of a node in the cell at `p` that accepts wires of type `arc`.
///
/// Device and contact ports win over pins. Ties go to the lowest node id.
pub(crate) fn port_at(
    ctx: &ExtractContext<'_>,
    p: Point,
    arc: ArcProtoId,
) -> Option<(NodeId, PortShape)> {
    let mut pin = None;
    for (id, node) in ctx.cell.nodes() {
        if node.child().is_some() || (node.trace().is_none() && !node.bbox().contains_point(p)) {
            continue;
        }
        for port in primitive_ports(ctx.tech, node) {
            if !port.accepts(arc) || !port.touches(p) {
                continue;
            }
            let is_pin = node
                .template()
                .is_some_and(|t| ctx.tech.template(t).kind() == NodeKind::Pin);
            if !is_pin {
                return Some((id, port));
            }
            pin.get_or_insert((id, port));
        }
    }
    pin
}

/// A port of a subcell instance at `p`, exported or not.
///
/// Exported ports are preferred. An unexported port produces an export
/// request with a placeholder name. Returns the port's center and area.
pub(crate) fn subcell_port_at(
    ctx: &ExtractContext<'_>,
    p: Point,
    arc: ArcProtoId,
) -> Option<(NodeId, Terminal, Point, Polygon)> {
    for (id, node) in ctx.cell.nodes() {
        let NodeProto::Cell(child_id) = node.proto() else {
            continue;
        };
        let Some(child) = ctx.library.try_cell(child_id) else {
            continue;
        };
        if let Some(port) = node_ports(ctx.library, ctx.tech, node)
            .into_iter()
            .find(|port| port.accepts(arc) && port.touches(p))
        {
            return Some((
                id,
                Terminal::Port {
                    node: id,
                    port: port.name,
                },
                port.center,
                port.area,
            ));
        }

        let Some(trans) = node.transformation() else {
            continue;
        };
        let local = trans.inv().apply(p);
        for (inner_id, inner) in child.nodes() {
            if inner.child().is_some() {
                continue;
            }
            for port in primitive_ports(ctx.tech, inner) {
                if !port.accepts(arc) || !port.touches(local) {
                    continue;
                }
                let center = trans.apply(port.center);
                let existing = ctx.export_requests.iter().find(|r| {
                    r.child == child_id && r.node == inner_id && r.port == port.name
                });
                let request = match existing {
                    Some(r) => r.clone(),
                    None => {
                        let taken = |name: &str| {
                            ctx.export_requests
                                .iter()
                                .any(|r| r.child == child_id && r.name.as_str() == name)
                        };
                        let mut name = child.unique_export_name(&ctx.options.placeholder_prefix);
                        let mut i = 1;
                        while taken(&name) {
                            name = child.unique_export_name(&arcstr::format!(
                                "{}{}",
                                ctx.options.placeholder_prefix,
                                i
                            ));
                            i += 1;
                        }
                        ExportRequest {
                            child: child_id,
                            node: inner_id,
                            port: port.name.clone(),
                            name,
                        }
                    }
                };
                let area = port.area.transform(trans);
                return Some((id, Terminal::Request { node: id, request }, center, area));
            }
        }
    }
    None
}

/// The point of the line through `a` and `b` nearest to `p`, snapped.
fn project(ctx: &ExtractContext<'_>, a: FPoint, b: FPoint, p: Point) -> Point {
    let len = a.distance(b);
    if len <= 1e-9 {
        return ctx.options.snap_f(a);
    }
    let u = (b - a).scale(1. / len);
    ctx.options.snap_f(a + u.scale((p.to_f() - a).dot(u)))
}

/// Finds what the end of a line at `end` attaches to. `other` is the opposite end.
pub(crate) fn anchor(
    ctx: &ExtractContext<'_>,
    arc: ArcProtoId,
    end: FPoint,
    other: FPoint,
    hub: bool,
    extend: bool,
) -> Anchor {
    let p = ctx.options.snap_f(end);
    if !hub {
        if let Some((node, port)) = port_at(ctx, p, arc) {
            let is_pin = ctx.cell.node(node).template().is_some_and(|t| {
                ctx.tech.template(t).kind() == NodeKind::Pin
            });
            let location = if is_pin {
                port.center
            } else {
                // Bent ports may not contain the projection of their center.
                Some(project(ctx, end, other, port.center))
                    .filter(|at| port.touches(*at))
                    .unwrap_or(p)
            };
            return Anchor {
                terminal: Terminal::Port {
                    node,
                    port: port.name,
                },
                location,
                extend: is_pin && extend,
                reach: None,
            };
        }
        if let Some((_, terminal, center, area)) = subcell_port_at(ctx, p, arc) {
            return Anchor {
                terminal,
                location: project(ctx, end, other, center),
                extend: false,
                reach: Some(area),
            };
        }
    }
    Anchor {
        terminal: Terminal::Pin,
        location: p,
        extend,
        reach: None,
    }
}

/// Turns an anchor into an arc end, creating pins and recording export requests.
pub(crate) fn attach(ctx: &mut ExtractContext<'_>, anchor: Anchor, arc: ArcProtoId, stage: Stage) -> ArcEnd {
    match anchor.terminal {
        Terminal::Port { node, port } => ArcEnd::new(node, port, anchor.location),
        Terminal::Request { node, request } => {
            let name = request.name.clone();
            if !ctx.export_requests.contains(&request) {
                tracing::debug!(export = %name, "requesting subcell export");
                ctx.export_requests.push(request);
            }
            ArcEnd::new(node, name, anchor.location)
        }
        Terminal::Pin => {
            let pin = ctx.pin_at(anchor.location, arc, stage);
            let port = ctx
                .tech
                .template(ctx.tech.arc(arc).pin())
                .ports()
                .first()
                .map(|p| p.name.clone())
                .unwrap_or_default();
            ArcEnd::new(pin, port, anchor.location)
        }
    }
}

/// Widths to try for a wire no wider than `width`, widest first.
///
/// Every grid-aligned width is tried before the off-grid ones.
pub(crate) fn candidate_widths(width: f64, grid: i64) -> Vec<i64> {
    let base = (width + 1e-6).floor() as i64;
    let grid = grid.max(1);
    let mut out = Vec::new();
    let mut w = base - base.rem_euclid(grid);
    while w > 0 {
        out.push(w);
        w -= grid;
    }
    for w in (1..=base).rev() {
        if !out.contains(&w) {
            out.push(w);
        }
    }
    out
}

/// The widest wire of type `arc` between two locations that fits the original geometry.
pub(crate) fn fit_width(
    ctx: &ExtractContext<'_>,
    arc: ArcProtoId,
    head: (Point, bool),
    tail: (Point, bool),
    width: f64,
) -> Option<i64> {
    fit_width_reaching(ctx, arc, head, tail, width, &Region::new())
}

/// Like [`fit_width`], but the wire may also overlap `reach`.
pub(crate) fn fit_width_reaching(
    ctx: &ExtractContext<'_>,
    arc: ArcProtoId,
    head: (Point, bool),
    tail: (Point, bool),
    width: f64,
    reach: &Region,
) -> Option<i64> {
    candidate_widths(width, ctx.options.grid())
        .into_iter()
        .find(|w| {
            // Node ids are irrelevant to the footprint.
            let probe = ArcInst::new(
                arc,
                ArcEnd::new(NodeId::default(), "", head.0),
                ArcEnd::new(NodeId::default(), "", tail.0),
                *w,
            )
            .with_extension(head.1, tail.1);
            ctx.arc_fits_reaching(&probe, reach)
        })
}

/// The wire type whose select and well layers exactly match those around `shape`.
pub(crate) fn wire_type(ctx: &ExtractContext<'_>, layer: LayerId, shape: &Region) -> Option<ArcProtoId> {
    let tech = ctx.tech;
    let mut candidates: Vec<_> = tech
        .arcs()
        .filter(|(_, a)| ctx.effective_layer(a.primary_layer()) == layer)
        .collect();
    candidates.sort_by(|(_, a), (_, b)| a.name().cmp(b.name()));

    let surround = |l: LayerId| {
        let f = tech.function(l);
        f.is_select() || f.is_well()
    };
    let present = |l: LayerId| {
        ctx.original.overlaps(ctx.effective_layer(l), shape) || ctx.layer_satisfied(l, shape)
    };
    candidates
        .into_iter()
        .find(|(_, proto)| {
            let wanted: Vec<LayerId> = proto
                .layers()
                .iter()
                .map(|l| l.layer)
                .filter(|l| surround(*l))
                .collect();
            if ctx.process.ignore_surrounds || wanted.is_empty() {
                return true;
            }
            let relevant = tech
                .layers_with(|f| f.is_select() || f.is_well())
                .into_iter()
                .filter(|l| {
                    // Surrounds of the other doping only matter when drawn.
                    wanted.contains(l) || ctx.original.overlaps(ctx.effective_layer(*l), shape)
                });
            relevant.into_iter().all(|l| wanted.contains(&l) == present(l))
        })
        .map(|(id, _)| id)
}

fn realize(ctx: &mut ExtractContext<'_>, arc: ArcProtoId, layer: LayerId, line: &Centerline) {
    let head = anchor(ctx, arc, line.head, line.tail, line.head_hub, line.head_ext);
    let tail = anchor(ctx, arc, line.tail, line.head, line.tail_hub, line.tail_ext);
    if head.location == tail.location {
        return;
    }
    let proto = ctx.tech.arc(arc);
    let d = tail.location - head.location;
    let angle = ((d.y as f64).atan2(d.x as f64).to_degrees() * 10.).round() as i32;
    if !proto.allows_angle(angle) {
        tracing::debug!(arc = %proto.name(), angle, "wire angle not allowed");
        ctx.record(
            Stage::Wires,
            TraceAction::Discarded,
            Some(layer),
            Polygon::new(vec![head.location, tail.location]),
            "angle not allowed",
        );
        return;
    }
    let mut reach = Region::new();
    for area in [&head.reach, &tail.reach].into_iter().flatten() {
        reach.add(&Region::from_polygon(area));
    }
    let Some(width) = fit_width_reaching(
        ctx,
        arc,
        (head.location, head.extend),
        (tail.location, tail.extend),
        line.width,
        &reach,
    ) else {
        ctx.record(
            Stage::Wires,
            TraceAction::Discarded,
            Some(layer),
            Polygon::new(vec![head.location, tail.location]),
            "no width fits",
        );
        ctx.issue(
            Cause::WireDoesNotFit {
                layer: ctx.tech.layer(layer).name().clone(),
                width: line.width.round() as i64,
            },
            Severity::Warning,
            vec![head.location, tail.location],
        );
        return;
    };
    let (head_ext, tail_ext) = (head.extend, tail.extend);
    let head = attach(ctx, head, arc, Stage::Wires);
    let tail = attach(ctx, tail, arc, Stage::Wires);
    let inst = ArcInst::new(arc, head, tail, width).with_extension(head_ext, tail_ext);
    ctx.consume_arc(&inst);
    ctx.add_arc(inst, Stage::Wires);
}

/// Extracts wires from every routable layer.
pub(crate) fn extract_wires(ctx: &mut ExtractContext<'_>) -> Result<()> {
    let span = span!(Level::INFO, "stage", stage = %Stage::Wires);
    let _guard = span.enter();
    ctx.check_cancelled(Stage::Wires)?;

    let layers: Vec<LayerId> = ctx
        .working
        .layers()
        .filter(|l| ctx.tech.function(*l).is_routable())
        .collect();
    let grid = ctx.options.grid();
    for layer in layers {
        let original = ctx.original.region(layer);
        for shape in ctx.working.region(layer).components() {
            let Some(arc) = wire_type(ctx, layer, &shape) else {
                let at = shape
                    .interior_point()
                    .map(|p| ctx.options.snap_f(p))
                    .unwrap_or_default();
                ctx.issue(
                    Cause::NoWireType {
                        layer: ctx.tech.layer(layer).name().clone(),
                    },
                    Severity::Warning,
                    vec![at],
                );
                continue;
            };
            let lines = skeletonize(&shape, &original, grid);
            tracing::debug!(layer = %ctx.tech.layer(layer).name(), lines = lines.len(), "skeletonized shape");
            for line in &lines {
                realize(ctx, arc, layer, line);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_prefer_grid_steps() {
        assert_eq!(candidate_widths(6., 1), vec![6, 5, 4, 3, 2, 1]);
        assert_eq!(candidate_widths(6., 2), vec![6, 4, 2, 5, 3, 1]);
        assert_eq!(candidate_widths(7.5, 2), vec![6, 4, 2, 7, 5, 3, 1]);
    }
}
