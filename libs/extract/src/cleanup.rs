//! Merging of collinear wires through redundant pins.

use layir::{ArcEnd, ArcInst, NodeId};
use tech::NodeKind;
use tracing::{span, Level};

use crate::context::ExtractContext;
use crate::error::Result;
use crate::trace::Stage;

/// A pin that joins exactly two collinear wires of the same type and width, and is not exported.
fn redundant_pin(ctx: &ExtractContext<'_>, id: NodeId) -> Option<(ArcInst, ArcInst)> {
    let node = ctx.cell.try_node(id)?;
    let t = node.template()?;
    if ctx.tech.template(t).kind() != NodeKind::Pin || !ctx.cell.exports_on(id).is_empty() {
        return None;
    }
    let arcs = ctx.cell.arcs_on(id);
    let &[a, b] = arcs.as_slice() else {
        return None;
    };
    let (a, b) = (ctx.cell.try_arc(a)?, ctx.cell.try_arc(b)?);
    if a.proto() != b.proto() || a.width() != b.width() {
        return None;
    }
    // Orient both wires through the pin: far end of `a`, pin, far end of `b`.
    let far = |arc: &ArcInst| -> Option<ArcEnd> {
        if arc.head().node == id && arc.tail().node != id {
            Some(arc.tail().clone())
        } else if arc.tail().node == id && arc.head().node != id {
            Some(arc.head().clone())
        } else {
            None
        }
    };
    let fa = far(a)?;
    let fb = far(b)?;
    let p = node.center();
    let u = fa.location - p;
    let v = fb.location - p;
    let cross = u.x as i128 * v.y as i128 - u.y as i128 * v.x as i128;
    let dot = u.x as i128 * v.x as i128 + u.y as i128 * v.y as i128;
    (cross == 0 && dot < 0).then(|| (a.clone(), b.clone()))
}

/// Merges wires through redundant pins until none remain.
pub(crate) fn cleanup(ctx: &mut ExtractContext<'_>) -> Result<()> {
    let span = span!(Level::INFO, "stage", stage = %Stage::Cleanup);
    let _guard = span.enter();
    ctx.check_cancelled(Stage::Cleanup)?;

    let mut merged = 0usize;
    loop {
        let pins: Vec<NodeId> = ctx.cell.nodes().map(|(id, _)| id).collect();
        let Some((pin, a, b)) = pins
            .into_iter()
            .find_map(|id| redundant_pin(ctx, id).map(|(a, b)| (id, a, b)))
        else {
            break;
        };
        let far = |arc: &ArcInst| {
            if arc.head().node == pin {
                (arc.tail().clone(), arc.tail_extended())
            } else {
                (arc.head().clone(), arc.head_extended())
            }
        };
        let (head, head_ext) = far(&a);
        let (tail, tail_ext) = far(&b);
        let joined = ArcInst::new(a.proto(), head, tail, a.width()).with_extension(head_ext, tail_ext);
        for id in ctx.cell.arcs_on(pin) {
            ctx.cell.remove_arc(id);
        }
        ctx.cell.remove_node(pin);
        ctx.stats.arcs = ctx.stats.arcs.saturating_sub(2);
        ctx.stats.pins = ctx.stats.pins.saturating_sub(1);
        ctx.add_arc(joined, Stage::Cleanup);
        merged += 1;
    }
    if merged > 0 {
        tracing::debug!(merged, "merged collinear wires");
    }
    Ok(())
}
