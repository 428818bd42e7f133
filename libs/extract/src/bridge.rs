//! Connection of leftover routable geometry to the nets it touches.

use arcstr::ArcStr;
use geometry::prelude::*;
use layir::{ArcEnd, ArcInst, NodeId};
use tech::{ArcProtoId, LayerId};
use tracing::{span, Level};

use crate::context::ExtractContext;
use crate::error::Result;
use crate::nets::Nets;
use crate::shapes::{arc_region, node_ports};
use crate::trace::Stage;
use crate::wire::{fit_width, wire_type};

/// A place where leftover geometry meets a realized net.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Landing {
    node: NodeId,
    port: ArcStr,
    location: Point,
}

/// Returns `true` if the regions overlap or share a boundary.
pub(crate) fn touching(a: &Region, b: &Region) -> bool {
    a.overlaps(b) || a.union(b).num_components() < a.num_components() + b.num_components()
}

/// Node ports and wire ends of type `arc` that touch `shape`.
fn landings(ctx: &ExtractContext<'_>, arc: ArcProtoId, layer: LayerId, shape: &Region) -> Vec<Landing> {
    let mut out = Vec::new();
    for (id, node) in ctx.cell.nodes() {
        for port in node_ports(ctx.library, ctx.tech, node) {
            if !port.accepts(arc) {
                continue;
            }
            let touches = if port.area.is_degenerate() {
                shape.touches_point(port.center)
            } else {
                touching(shape, &Region::from_polygon(&port.area))
            };
            if touches {
                out.push(Landing {
                    node: id,
                    port: port.name,
                    location: port.center,
                });
            }
        }
    }
    let probe = shape.interior_point().unwrap_or_default();
    for (_, inst) in ctx.cell.arcs() {
        if inst.proto() != arc {
            continue;
        }
        let Some(footprint) = arc_region(ctx.tech, inst, layer) else {
            continue;
        };
        if !touching(shape, &footprint) {
            continue;
        }
        let (h, t) = (inst.head(), inst.tail());
        let end = if h.location.to_f().distance(probe) <= t.location.to_f().distance(probe) {
            h
        } else {
            t
        };
        let landing = Landing {
            node: end.node,
            port: end.port.clone(),
            location: end.location,
        };
        if !out.contains(&landing) {
            out.push(landing);
        }
    }
    out
}

/// Realizes a straight wire between two locations if some width of it fits.
fn link(
    ctx: &mut ExtractContext<'_>,
    arc: ArcProtoId,
    head: ArcEnd,
    tail: ArcEnd,
    ext: (bool, bool),
    width: f64,
) -> bool {
    if head.location == tail.location {
        return false;
    }
    let Some(width) = fit_width(ctx, arc, (head.location, ext.0), (tail.location, ext.1), width) else {
        return false;
    };
    let inst = ArcInst::new(arc, head, tail, width).with_extension(ext.0, ext.1);
    ctx.consume_arc(&inst);
    ctx.add_arc(inst, Stage::Bridges).is_some()
}

fn pin_end(ctx: &mut ExtractContext<'_>, arc: ArcProtoId, p: Point) -> ArcEnd {
    let pin = ctx.pin_at(p, arc, Stage::Bridges);
    let port = ctx
        .tech
        .template(ctx.tech.arc(arc).pin())
        .ports()
        .first()
        .map(|p| p.name.clone())
        .unwrap_or_default();
    ArcEnd::new(pin, port, p)
}

/// Grows the net at `from` across `shape` with one or two stubs.
fn extend(ctx: &mut ExtractContext<'_>, arc: ArcProtoId, shape: &Region, from: &Landing) {
    let Some(bbox) = shape.bbox() else {
        return;
    };
    let c = from.location;
    let (w, h) = (bbox.width(), bbox.height());
    let horiz = bbox.bot() <= c.y && c.y <= bbox.top();
    let vert = bbox.left() <= c.x && c.x <= bbox.right();
    let dir = if horiz && (w >= h || !vert) {
        Dir::Horiz
    } else if vert {
        Dir::Vert
    } else {
        return;
    };

    let lo = bbox.lower_coord(dir);
    let hi = bbox.upper_coord(dir);
    let at = |v: i64| match dir {
        Dir::Horiz => Point::new(v, c.y),
        Dir::Vert => Point::new(c.x, v),
    };
    let across = match dir {
        Dir::Horiz => h,
        Dir::Vert => w,
    } as f64;
    // A shape on both sides of the port gets a stub in each direction.
    let mut targets = Vec::new();
    if hi > c.coord(dir) {
        targets.push(ctx.options.snap(at(hi)));
    }
    if lo < c.coord(dir) {
        targets.push(ctx.options.snap(at(lo)));
    }
    for target in targets {
        if target == c {
            continue;
        }
        let head = ArcEnd::new(from.node, from.port.clone(), c);
        let Some(width) = fit_width(ctx, arc, (c, false), (target, false), across) else {
            continue;
        };
        let tail = pin_end(ctx, arc, target);
        let inst = ArcInst::new(arc, head, tail, width).with_extension(false, false);
        ctx.consume_arc(&inst);
        ctx.add_arc(inst, Stage::Bridges);
    }
}

/// Connects two nets through `shape`, directly or around one corner.
fn connect(ctx: &mut ExtractContext<'_>, arc: ArcProtoId, shape: &Region, a: &Landing, b: &Landing) {
    let Some(bbox) = shape.bbox() else {
        return;
    };
    let width = bbox.width().min(bbox.height()) as f64;
    let (pa, pb) = (a.location, b.location);
    let end = |c: &Landing| ArcEnd::new(c.node, c.port.clone(), c.location);
    if pa.x == pb.x || pa.y == pb.y {
        link(ctx, arc, end(a), end(b), (false, false), width);
        return;
    }
    for corner in [Point::new(pa.x, pb.y), Point::new(pb.x, pa.y)] {
        if !shape.touches_point(corner) {
            continue;
        }
        let fits = fit_width(ctx, arc, (pa, false), (corner, true), width).is_some()
            && fit_width(ctx, arc, (corner, true), (pb, false), width).is_some();
        if !fits {
            continue;
        }
        let pin = pin_end(ctx, arc, corner);
        link(ctx, arc, end(a), pin.clone(), (false, true), width);
        link(ctx, arc, pin, end(b), (true, false), width);
        return;
    }
}

/// Attaches leftover routable shapes to the one or two nets they touch.
pub(crate) fn bridge(ctx: &mut ExtractContext<'_>) -> Result<()> {
    let span = span!(Level::INFO, "stage", stage = %Stage::Bridges);
    let _guard = span.enter();
    ctx.check_cancelled(Stage::Bridges)?;

    let layers: Vec<LayerId> = ctx
        .working
        .layers()
        .filter(|l| ctx.tech.function(*l).is_routable())
        .collect();
    for layer in layers {
        for shape in ctx.working.region(layer).components() {
            let Some(arc) = wire_type(ctx, layer, &shape) else {
                continue;
            };
            let found = landings(ctx, arc, layer, &shape);
            if found.is_empty() {
                continue;
            }
            let mut nets = Nets::build(
                ctx.tech,
                ctx.library,
                &ctx.cell,
                &ctx.options.placeholder_prefix,
            );
            let mut groups: Vec<(crate::nets::NetKey, Vec<Landing>)> = Vec::new();
            for landing in found {
                let Some(net) = nets.net(landing.node, &landing.port) else {
                    continue;
                };
                match groups.iter_mut().find(|(n, _)| *n == net) {
                    Some((_, v)) => v.push(landing),
                    None => groups.push((net, vec![landing])),
                }
            }
            let probe = shape.interior_point().unwrap_or_default();
            let nearest = |v: &[Landing]| {
                v.iter()
                    .min_by(|a, b| {
                        a.location
                            .to_f()
                            .distance(probe)
                            .total_cmp(&b.location.to_f().distance(probe))
                            .then(a.node.cmp(&b.node))
                    })
                    .cloned()
            };
            match groups.as_slice() {
                [(_, one)] => {
                    if let Some(c) = nearest(one) {
                        tracing::debug!(x = c.location.x, y = c.location.y, "extending net");
                        extend(ctx, arc, &shape, &c);
                    }
                }
                [(_, a), (_, b)] => {
                    if let (Some(a), Some(b)) = (nearest(a), nearest(b)) {
                        tracing::debug!(a = %a.location, b = %b.location, "bridging nets");
                        connect(ctx, arc, &shape, &a, &b);
                    }
                }
                _ => {}
            }
        }
    }
    Ok(())
}
