//! Contact and via extraction.
//!
//! Every unclassified cut is explained by the most specific contact template
//! whose required layers surround it. Cuts that line up at a regular pitch
//! are grouped into a single multi-cut contact.

use std::collections::HashSet;

use arcstr::ArcStr;
use diagnostics::Severity;
use geometry::prelude::*;
use layir::NodeInst;
use tech::{CutRule, LayerId, NodeKind, NodeLayer, TemplateId};
use tracing::{span, Level};

use crate::context::ExtractContext;
use crate::cuts::Cut;
use crate::error::Result;
use crate::issue::{Cause, Rejection, TemplateFailure};
use crate::trace::{Stage, TraceAction};

/// A contact template prepared for matching, in one orientation.
#[derive(Debug, Clone)]
pub(crate) struct PossibleVia {
    template: TemplateId,
    name: ArcStr,
    cuts: CutRule,
    /// Layer insets as seen in absolute coordinates.
    layers: Vec<NodeLayer>,
    forbidden: Vec<LayerId>,
    /// Unrotated size of a single-cut node.
    single: Dims,
    rotated: bool,
}

impl PossibleVia {
    /// The node covering a group of cuts spanning `cuts`.
    fn node_rect(&self, cuts: Rect) -> Rect {
        let grown = cuts.expand_all(self.cuts.inset).unwrap_or(cuts);
        let single = if self.rotated {
            self.single.transpose()
        } else {
            self.single
        };
        let w = grown.width().max(single.w());
        let h = grown.height().max(single.h());
        Rect::from_center_dims(grown.center(), Dims::new(w, h))
    }

    fn node(&self, rect: Rect) -> NodeInst {
        let (size, angle) = if self.rotated {
            (rect.dims().transpose(), 900)
        } else {
            (rect.dims(), 0)
        };
        NodeInst::primitive(self.template, rect.center(), size)
            .with_orientation(Orientation::from_angle(angle))
    }
}

/// Prepares the contact templates that explain cuts on `layer`, most specific first.
pub(crate) fn possible_vias(ctx: &ExtractContext<'_>, layer: LayerId) -> Vec<PossibleVia> {
    let tech = ctx.tech;
    let mut templates: Vec<_> = tech
        .templates()
        .filter(|(_, t)| t.kind() == NodeKind::Contact)
        .filter(|(_, t)| {
            t.cuts()
                .is_some_and(|c| tech.canonical_layer(c.layer) == layer)
        })
        .collect();
    templates.sort_by(|(_, a), (_, b)| {
        b.distinct_layer_count()
            .cmp(&a.distinct_layer_count())
            .then(b.layers().len().cmp(&a.layers().len()))
            .then(b.default_size().area().cmp(&a.default_size().area()))
            .then(a.name().cmp(b.name()))
    });

    let mut out = Vec::new();
    for (id, template) in templates {
        let Some(cuts) = template.cuts().copied() else {
            continue;
        };
        let functions: Vec<_> = template
            .layers()
            .iter()
            .map(|l| tech.function(l.layer))
            .collect();
        let has_diff = functions.iter().any(|f| f.is_diff());
        let has_poly = functions.iter().any(|f| f.is_poly());
        // Diffusion contacts must not sit on a gate, and poly contacts must not sit on active.
        let forbidden = if has_diff && !has_poly {
            tech.layers_with(|f| f.is_poly())
        } else if has_poly && !has_diff {
            tech.layers_with(|f| f.is_diff())
        } else {
            Vec::new()
        };
        let extent = cuts.node_extent(1);
        let default = template.default_size();
        let single = Dims::new(default.w().max(extent), default.h().max(extent));
        let base = PossibleVia {
            template: id,
            name: template.name().clone(),
            cuts,
            layers: template.layers().to_vec(),
            forbidden,
            single,
            rotated: false,
        };
        let symmetric = single.w() == single.h()
            && template.layers().iter().all(|l| l.inset.is_symmetric());
        if !symmetric {
            let mut rotated = base.clone();
            rotated.rotated = true;
            for l in rotated.layers.iter_mut() {
                l.inset = l.inset.rotate(Rotation::R90);
            }
            out.push(base);
            out.push(rotated);
        } else {
            out.push(base);
        }
    }
    out
}

/// Checks the layers a contact occupying `rect` requires and forbids.
fn check_layers(ctx: &ExtractContext<'_>, via: &PossibleVia, rect: Rect) -> std::result::Result<(), Rejection> {
    for l in &via.layers {
        let required = rect.inset(l.inset).unwrap_or(rect);
        if !ctx.layer_satisfied(l.layer, &Region::from_rect(required)) {
            return Err(Rejection::MissingLayer {
                layer: ctx.tech.layer(l.layer).name().clone(),
                at: missing_point(ctx, l.layer, required),
            });
        }
    }
    let area = Region::from_rect(rect);
    for layer in &via.forbidden {
        if !ctx.layer_absent(*layer, &area) {
            return Err(Rejection::ForbiddenLayer {
                layer: ctx.tech.layer(*layer).name().clone(),
                at: rect.center(),
            });
        }
    }
    Ok(())
}

/// A point of `required` not covered by `layer`.
fn missing_point(ctx: &ExtractContext<'_>, layer: LayerId, required: Rect) -> Point {
    let have = ctx.original.region(ctx.effective_layer(layer));
    Region::from_rect(required)
        .difference(&have)
        .interior_point()
        .map(|p| ctx.options.snap_f(p))
        .unwrap_or_else(|| required.center())
}

#[derive(Debug, Copy, Clone)]
enum Side {
    Left,
    Bot,
    Right,
    Top,
}

impl Side {
    fn of(self, sides: &mut Sides<i64>) -> &mut i64 {
        match self {
            Side::Left => &mut sides.left,
            Side::Bot => &mut sides.bot,
            Side::Right => &mut sides.right,
            Side::Top => &mut sides.top,
        }
    }
}

struct Group {
    cuts: Vec<Cut>,
    bbox: Rect,
}

/// Finds the cut whose bounding box is exactly `rect`, if it is unconsumed.
fn cut_at(ctx: &ExtractContext<'_>, layer: LayerId, rect: Rect, consumed: &HashSet<u32>) -> Option<Cut> {
    ctx.cuts
        .in_rect(layer, rect)
        .into_iter()
        .find(|c| c.bbox() == rect && !consumed.contains(&c.id()) && c.as_rect() == Some(rect))
}

/// The center-to-center distance to the nearest aligned neighbor along `dir`.
fn neighbor_pitch(ctx: &ExtractContext<'_>, cut: Rect, layer: LayerId, dir: Dir, reach: i64, consumed: &HashSet<u32>) -> Option<i64> {
    let search = cut.expand_dir(dir, reach)?;
    ctx.cuts
        .in_rect(layer, search)
        .into_iter()
        .filter(|c| !consumed.contains(&c.id()) && c.bbox() != cut && c.bbox().dims() == cut.dims())
        .filter(|c| match dir {
            Dir::Horiz => c.bbox().bot() == cut.bot(),
            Dir::Vert => c.bbox().left() == cut.left(),
        })
        .map(|c| (c.bbox().lower_coord(dir) - cut.lower_coord(dir)).abs())
        .filter(|d| *d >= cut.length(dir))
        .min()
}

/// Grows a rectangular group of cuts around `seed` at the inferred pitch.
fn grow_group(
    ctx: &ExtractContext<'_>,
    via: &PossibleVia,
    seed: Rect,
    layer: LayerId,
    consumed: &HashSet<u32>,
) -> Option<Group> {
    let reach = via.cuts.pitch() + via.cuts.spacing;
    let px = neighbor_pitch(ctx, seed, layer, Dir::Horiz, reach, consumed);
    let py = neighbor_pitch(ctx, seed, layer, Dir::Vert, reach, consumed);
    if px.is_none() && py.is_none() {
        return None;
    }
    let px = px.unwrap_or(via.cuts.pitch());
    let py = py.unwrap_or(via.cuts.pitch());

    // Extents in cut positions: left, bottom, right, top.
    let span = |e: Sides<i64>| {
        Rect::from_sides(
            seed.left() - e.left * px,
            seed.bot() - e.bot * py,
            seed.right() + e.right * px,
            seed.top() + e.top * py,
        )
    };
    let valid = |e: Sides<i64>| -> bool {
        for i in -e.left..=e.right {
            for j in -e.bot..=e.top {
                let at = seed.translate(Point::new(i * px, j * py));
                if cut_at(ctx, layer, at, consumed).is_none() {
                    return false;
                }
            }
        }
        check_layers(ctx, via, via.node_rect(span(e))).is_ok()
    };

    let mut extent = Sides::uniform(0i64);
    for side in [Side::Right, Side::Left, Side::Top, Side::Bot] {
        let base = *side.of(&mut extent);
        let with = |n: i64| {
            let mut e = extent;
            *side.of(&mut e) = n;
            e
        };
        // Expand until the group stops fitting, then search the boundary.
        let mut good = base;
        let mut step = 1;
        while valid(with(base + step)) {
            good = base + step;
            step *= 2;
        }
        let mut bad = base + step;
        while bad - good > 1 {
            let mid = (good + bad) / 2;
            if valid(with(mid)) {
                good = mid;
            } else {
                bad = mid;
            }
        }
        *side.of(&mut extent) = good;
    }

    let count = (extent.left + extent.right + 1) * (extent.bot + extent.top + 1);
    if count < 2 {
        return None;
    }
    let bbox = span(extent);
    let mut cuts = Vec::new();
    for i in -extent.left..=extent.right {
        for j in -extent.bot..=extent.top {
            let at = seed.translate(Point::new(i * px, j * py));
            cuts.extend(cut_at(ctx, layer, at, consumed));
        }
    }
    Some(Group { cuts, bbox })
}

/// The cuts that a contact occupying `node` should have, if they are all present.
fn exact_cuts(ctx: &ExtractContext<'_>, via: &PossibleVia, node: Rect, layer: LayerId, consumed: &HashSet<u32>) -> Option<Vec<Cut>> {
    via.cuts
        .cut_rects(node)
        .into_iter()
        .map(|r| cut_at(ctx, layer, r, consumed))
        .collect()
}

/// A contact that explains a set of cuts.
struct Match {
    node: NodeInst,
    cuts: Vec<Cut>,
}

fn try_via(
    ctx: &ExtractContext<'_>,
    via: &PossibleVia,
    cut: &Cut,
    consumed: &HashSet<u32>,
) -> std::result::Result<Match, Rejection> {
    let layer = cut.layer();
    let Some(rect) = cut.as_rect() else {
        return try_outline(ctx, via, cut);
    };
    if rect.width() != via.cuts.size || rect.height() != via.cuts.size {
        return Err(Rejection::CutSize { dims: rect.dims() });
    }
    let single = via.node_rect(rect);
    check_layers(ctx, via, single)?;

    // A multi-cut node first.
    if let Some(group) = grow_group(ctx, via, rect, layer, consumed) {
        let node = via.node_rect(group.bbox);
        let cuts = if ctx.options.approximate_cuts {
            let mut cuts = ctx.cuts.within(layer, node);
            cuts.retain(|c| !consumed.contains(&c.id()));
            Some(cuts)
        } else {
            exact_cuts(ctx, via, node, layer, consumed).filter(|c| c.len() == group.cuts.len())
        };
        if let Some(cuts) = cuts {
            if check_layers(ctx, via, node).is_ok() {
                return Ok(Match {
                    node: via.node(node),
                    cuts,
                });
            }
        }
        tracing::debug!(template = %via.name, cuts = group.cuts.len(), "cut group does not match exactly");
    }

    // Then a single cut.
    match exact_cuts(ctx, via, single, layer, consumed) {
        Some(cuts) if cuts.len() == 1 => Ok(Match {
            node: via.node(single),
            cuts,
        }),
        _ => Err(Rejection::CutSize { dims: rect.dims() }),
    }
}

/// Matches a non-rectangular cut with an outlined contact.
fn try_outline(
    ctx: &ExtractContext<'_>,
    via: &PossibleVia,
    cut: &Cut,
) -> std::result::Result<Match, Rejection> {
    let region = Region::from_polygon(cut.shape());
    for l in &via.layers {
        if !ctx.layer_satisfied(l.layer, &region) {
            return Err(Rejection::MissingLayer {
                layer: ctx.tech.layer(l.layer).name().clone(),
                at: cut.shape().center(),
            });
        }
    }
    for layer in &via.forbidden {
        if !ctx.layer_absent(*layer, &region) {
            return Err(Rejection::ForbiddenLayer {
                layer: ctx.tech.layer(*layer).name().clone(),
                at: cut.shape().center(),
            });
        }
    }
    let bbox = cut.bbox();
    let node = NodeInst::primitive(via.template, bbox.center(), bbox.dims())
        .with_trace(cut.shape().points().to_vec());
    Ok(Match {
        node,
        cuts: vec![cut.clone()],
    })
}

/// Extracts contacts from every unclassified cut.
pub(crate) fn extract_vias(ctx: &mut ExtractContext<'_>) -> Result<()> {
    let span = span!(Level::INFO, "stage", stage = %Stage::Vias);
    let _guard = span.enter();
    ctx.check_cancelled(Stage::Vias)?;

    for layer in ctx.cuts.layers() {
        let candidates = possible_vias(ctx, layer);
        let mut consumed = HashSet::new();
        for cut in ctx.cuts.ordered(layer) {
            if consumed.contains(&cut.id()) {
                continue;
            }
            let mut failures = Vec::new();
            let mut found = None;
            for via in &candidates {
                match try_via(ctx, via, &cut, &consumed) {
                    Ok(m) => {
                        found = Some(m);
                        break;
                    }
                    Err(rejection) => {
                        // Rotated variants repeat their base template's failure.
                        if !failures.iter().any(|f: &TemplateFailure| f.template == via.name) {
                            failures.push(TemplateFailure {
                                template: via.name.clone(),
                                rejection,
                            });
                        }
                    }
                }
            }
            match found {
                Some(Match { node, cuts }) => {
                    for c in &cuts {
                        consumed.insert(c.id());
                        ctx.cuts.remove(c);
                    }
                    ctx.consume_node(&node);
                    ctx.add_node(node, Stage::Vias);
                }
                None => {
                    ctx.record(
                        Stage::Vias,
                        TraceAction::Discarded,
                        Some(layer),
                        cut.shape().clone(),
                        "no contact matches",
                    );
                    ctx.issue(
                        Cause::UnmatchedCut {
                            layer: ctx.tech.layer(layer).name().clone(),
                            failures,
                        },
                        Severity::Warning,
                        vec![cut.bbox().center()],
                    );
                }
            }
        }
    }
    Ok(())
}
