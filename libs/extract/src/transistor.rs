//! Transistor extraction.
//!
//! Gates are found where poly crosses active. Rectangular gates are matched
//! against templates at a Manhattan orientation; other gates are reduced to
//! centerlines and become angled or serpentine transistors.

use std::collections::BTreeSet;

use arcstr::ArcStr;
use diagnostics::Severity;
use geometry::prelude::*;
use layir::NodeInst;
use tech::{LayerId, NodeKind, NodeTemplate, TemplateId};
use tracing::{span, Level};

use crate::centerline::{skeletonize, Centerline};
use crate::context::ExtractContext;
use crate::error::Result;
use crate::issue::{Cause, Rejection, TemplateFailure};
use crate::shapes::{gate_inset, node_geometry};
use crate::trace::{Stage, TraceAction};

/// A transistor template prepared for matching on one active layer.
struct PossibleTransistor<'t> {
    id: TemplateId,
    template: &'t NodeTemplate,
    gate_inset: Sides<i64>,
    /// The template's poly runs along its x axis when unrotated.
    poly_along_x: bool,
}

/// Transistor templates whose active layer collects onto `active`, most specific first.
fn possible_transistors<'t>(ctx: &ExtractContext<'t>, active: LayerId) -> Vec<PossibleTransistor<'t>> {
    let tech = ctx.tech;
    let mut out: Vec<_> = tech
        .templates()
        .filter(|(_, t)| matches!(t.kind(), NodeKind::Transistor(_)))
        .filter(|(_, t)| {
            let layers = t.layers();
            layers.iter().any(|l| tech.function(l.layer).is_poly())
                && layers.iter().any(|l| {
                    tech.function(l.layer).is_diff() && ctx.effective_layer(l.layer) == active
                })
        })
        .map(|(id, template)| PossibleTransistor {
            id,
            template,
            gate_inset: gate_inset(tech, template),
            poly_along_x: template
                .layer_rects(template.default_size())
                .into_iter()
                .find(|(l, _)| tech.function(*l).is_poly())
                .map_or(true, |(_, r)| r.width() >= r.height()),
        })
        .collect();
    out.sort_by(|a, b| {
        let (a, b) = (a.template, b.template);
        b.distinct_layer_count()
            .cmp(&a.distinct_layer_count())
            .then(b.layers().len().cmp(&a.layers().len()))
            .then(b.default_size().area().cmp(&a.default_size().area()))
            .then(a.name().cmp(b.name()))
    });
    out
}

/// Checks every layer a placed transistor draws against the original geometry.
fn check_node(ctx: &ExtractContext<'_>, node: &NodeInst) -> std::result::Result<(), Rejection> {
    for (layer, region) in node_geometry(ctx.tech, node) {
        if !ctx.layer_satisfied(layer, &region) {
            let have = ctx.original.region(ctx.effective_layer(layer));
            let at = region
                .difference(&have)
                .interior_point()
                .map(|p| ctx.options.snap_f(p))
                .or_else(|| region.bbox().map(|b| b.center()))
                .unwrap_or_default();
            return Err(Rejection::MissingLayer {
                layer: ctx.tech.layer(layer).name().clone(),
                at,
            });
        }
    }
    Ok(())
}

/// Guesses the orientation of a rectangular gate from the layers beyond its edges.
///
/// The result rotates the template's poly axis onto the drawn poly: poly
/// continuing past the left and right edges means a horizontal gate.
fn gate_angle(
    ctx: &ExtractContext<'_>,
    t: &PossibleTransistor<'_>,
    gate: Rect,
    poly: LayerId,
    active: LayerId,
) -> i32 {
    let strips = [
        Rect::from_sides(gate.left() - 1, gate.bot(), gate.left(), gate.top()),
        Rect::from_sides(gate.right(), gate.bot(), gate.right() + 1, gate.top()),
        Rect::from_sides(gate.left(), gate.bot() - 1, gate.right(), gate.bot()),
        Rect::from_sides(gate.left(), gate.top(), gate.right(), gate.top() + 1),
    ];
    let touches = |layer: LayerId, r: &Rect| ctx.original.overlaps_rect(layer, *r) as i32;
    let horiz = &strips[..2];
    let vert = &strips[2..];
    let score0: i32 = horiz.iter().map(|r| touches(poly, r)).sum::<i32>()
        + vert.iter().map(|r| touches(active, r)).sum::<i32>();
    let score90: i32 = vert.iter().map(|r| touches(poly, r)).sum::<i32>()
        + horiz.iter().map(|r| touches(active, r)).sum::<i32>();
    let horizontal = match score0.cmp(&score90) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => gate.width() >= gate.height(),
    };
    if horizontal == t.poly_along_x {
        0
    } else {
        900
    }
}

/// Places a transistor so that its gate lies at `gate_center` with local gate dimensions `gate`.
fn place(t: &PossibleTransistor<'_>, gate_center: FPoint, gate: Dims, angle: i32) -> NodeInst {
    let gi = t.gate_inset;
    let size = Dims::new(gate.w() + gi.left + gi.right, gate.h() + gi.bot + gi.top);
    let orientation = Orientation::from_angle(angle);
    let offset = FPoint::new(
        (gi.right - gi.left) as f64 / 2.,
        (gi.top - gi.bot) as f64 / 2.,
    );
    let center = (gate_center + orientation.apply_f(offset)).round();
    NodeInst::primitive(t.id, center, size).with_orientation(orientation)
}

/// Places a transistor at `angle`, falling back to its 180 degree twin.
fn try_twins(
    ctx: &ExtractContext<'_>,
    t: &PossibleTransistor<'_>,
    gate_center: FPoint,
    gate: Dims,
    angle: i32,
) -> std::result::Result<NodeInst, Rejection> {
    let node = place(t, gate_center, gate, angle);
    let Err(first) = check_node(ctx, &node) else {
        return Ok(node);
    };
    let twin = place(t, gate_center, gate, angle + 1800);
    check_node(ctx, &twin).map(|_| twin).map_err(|_| first)
}

fn try_rect(
    ctx: &ExtractContext<'_>,
    t: &PossibleTransistor<'_>,
    gate: Rect,
    angle: i32,
) -> std::result::Result<NodeInst, Rejection> {
    let local = if angle % 1800 == 0 {
        gate.dims()
    } else {
        gate.dims().transpose()
    };
    try_twins(ctx, t, gate.center_f(), local, angle)
}

/// Orders connected centerlines into a single path, if they form one.
fn stitch(lines: &[Centerline]) -> Option<Vec<FPoint>> {
    const TOL: f64 = 1e-3;
    let ends: Vec<FPoint> = lines.iter().flat_map(|l| [l.head, l.tail]).collect();
    let degree = |p: FPoint| ends.iter().filter(|q| q.distance(p) < TOL).count();
    // A path has exactly two ends touched by a single line.
    let start = ends.iter().copied().find(|p| degree(*p) == 1)?;
    if ends.iter().any(|p| degree(*p) > 2) {
        return None;
    }

    let mut used = vec![false; lines.len()];
    let mut path = vec![start];
    let mut at = start;
    for _ in 0..lines.len() {
        let next = lines.iter().enumerate().find_map(|(i, l)| {
            if used[i] {
                None
            } else if l.head.distance(at) < TOL {
                Some((i, l.tail))
            } else if l.tail.distance(at) < TOL {
                Some((i, l.head))
            } else {
                None
            }
        })?;
        used[next.0] = true;
        path.push(next.1);
        at = next.1;
    }
    used.iter().all(|u| *u).then_some(path)
}

fn try_outline(
    ctx: &ExtractContext<'_>,
    t: &PossibleTransistor<'_>,
    lines: &[Centerline],
) -> std::result::Result<NodeInst, Rejection> {
    let grid = ctx.options.grid();
    let no_path = || Rejection::MissingLayer {
        layer: ctx.tech.layer(t.template.layers()[0].layer).name().clone(),
        at: lines
            .first()
            .map(|l| l.head.snap_to_grid(grid))
            .unwrap_or_default(),
    };
    let width = lines
        .iter()
        .map(|l| l.width)
        .fold(f64::INFINITY, f64::min)
        .round() as i64;
    if width <= 0 {
        return Err(no_path());
    }

    if let [line] = lines {
        let mid = FPoint::new((line.head.x + line.tail.x) / 2., (line.head.y + line.tail.y) / 2.);
        let gate = Dims::new(line.length().round() as i64, width);
        return try_twins(ctx, t, mid, gate, line.angle);
    }

    let path = stitch(lines).ok_or_else(no_path)?;
    let points: Vec<Point> = path.iter().map(|p| p.snap_to_grid(grid)).collect();
    let length: f64 = points.windows(2).map(|w| w[0].to_f().distance(w[1].to_f())).sum();
    let gi = t.gate_inset;
    let size = Dims::new(
        gi.left + length.round() as i64 + gi.right,
        width + gi.bot + gi.top,
    );
    let center = Polygon::from_verts(points.clone())
        .bbox()
        .map(|b| b.center())
        .unwrap_or_default();
    let node = NodeInst::primitive(t.id, center, size).with_trace(points);
    check_node(ctx, &node)?;
    Ok(node)
}

fn gate_layers(ctx: &ExtractContext<'_>, pred: fn(tech::LayerFunction) -> bool) -> BTreeSet<LayerId> {
    ctx.tech
        .layers_with(pred)
        .into_iter()
        .map(|l| ctx.effective_layer(l))
        .collect()
}

/// Extracts transistors from every poly/active crossing.
pub(crate) fn extract_transistors(ctx: &mut ExtractContext<'_>) -> Result<()> {
    let span = span!(Level::INFO, "stage", stage = %Stage::Transistors);
    let _guard = span.enter();
    ctx.check_cancelled(Stage::Transistors)?;

    let polys = gate_layers(ctx, |f| f.is_poly());
    let actives = gate_layers(ctx, |f| f.is_diff());
    for &active in &actives {
        let candidates = possible_transistors(ctx, active);
        for &poly in &polys {
            let gates = ctx.working.region(poly).intersection(&ctx.working.region(active));
            for gate in gates.components() {
                // An earlier gate's transistor may already cover this one.
                if !ctx.working.overlaps(poly, &gate) || !ctx.working.overlaps(active, &gate) {
                    continue;
                }
                extract_gate(ctx, &candidates, poly, active, &gate);
            }
        }
    }
    Ok(())
}

fn extract_gate(
    ctx: &mut ExtractContext<'_>,
    candidates: &[PossibleTransistor<'_>],
    poly: LayerId,
    active: LayerId,
    gate: &Region,
) {
    let mut failures: Vec<TemplateFailure> = Vec::new();
    let mut found = None;
    let rect = gate.as_rect();
    let lines = if rect.is_none() {
        skeletonize(gate, gate, ctx.options.grid())
    } else {
        Vec::new()
    };
    for t in candidates {
        let attempt = match rect {
            Some(rect) => {
                let angle = gate_angle(ctx, t, rect, poly, active);
                try_rect(ctx, t, rect, angle)
            }
            None => try_outline(ctx, t, &lines),
        };
        match attempt {
            Ok(node) => {
                found = Some(node);
                break;
            }
            Err(rejection) => failures.push(TemplateFailure {
                template: t.template.name().clone(),
                rejection,
            }),
        }
    }

    let at = gate
        .interior_point()
        .map(|p| ctx.options.snap_f(p))
        .unwrap_or_default();
    match found {
        Some(node) => {
            ctx.consume_node(&node);
            ctx.add_node(node, Stage::Transistors);
        }
        None => {
            for outline in gate.outlines() {
                ctx.record(
                    Stage::Transistors,
                    TraceAction::Discarded,
                    Some(active),
                    outline,
                    "no transistor matches",
                );
            }
            let poly: ArcStr = ctx.tech.layer(poly).name().clone();
            let active: ArcStr = ctx.tech.layer(active).name().clone();
            ctx.issue(
                Cause::UnmatchedGate {
                    poly,
                    active,
                    failures,
                },
                Severity::Warning,
                vec![at],
            );
        }
    }
}
