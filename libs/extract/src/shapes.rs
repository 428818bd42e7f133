//! Geometry drawn by realized nodes and wires, and the locations of their ports.

use arcstr::ArcStr;
use geometry::prelude::*;
use layir::{ArcInst, Cell, LibraryBuilder, NodeInst, NodeProto};
use tech::{ArcProtoId, LayerId, NodeKind, NodeTemplate, PortTemplate, Technology};

/// The rectangle swept by a segment of the given width.
///
/// Each end is pushed outward along the segment by its extension.
/// Zero-length segments produce an empty region.
pub fn segment_region(a: FPoint, b: FPoint, width: f64, ext_a: f64, ext_b: f64) -> Region {
    let len = a.distance(b);
    if len <= 1e-9 || width <= 0. {
        return Region::new();
    }
    let u = (b - a).scale(1. / len);
    let n = u.perp().scale(width / 2.);
    let a = a - u.scale(ext_a);
    let b = b + u.scale(ext_b);
    Region::from_fpoints(&[a - n, b - n, b + n, a + n])
}

/// The region swept along a path, with joints filled.
pub fn path_region(points: &[FPoint], width: f64, ext_start: f64, ext_end: f64) -> Region {
    let mut out = Region::new();
    let n = points.len();
    for i in 1..n {
        let ext_a = if i == 1 { ext_start } else { width / 2. };
        let ext_b = if i == n - 1 { ext_end } else { width / 2. };
        out.add(&segment_region(
            points[i - 1],
            points[i],
            width,
            ext_a,
            ext_b,
        ));
    }
    out
}

/// The geometry of a wire on `layer`, if the wire draws that layer.
pub fn arc_region(tech: &Technology, arc: &ArcInst, layer: LayerId) -> Option<Region> {
    let width = tech.arc(arc.proto()).width_on(layer, arc.width())?;
    if width <= 0 {
        return None;
    }
    let half = width as f64 / 2.;
    Some(segment_region(
        arc.head().location.to_f(),
        arc.tail().location.to_f(),
        width as f64,
        if arc.head_extended() { half } else { 0. },
        if arc.tail_extended() { half } else { 0. },
    ))
}

/// Every layer drawn by a wire.
pub fn arc_geometry(tech: &Technology, arc: &ArcInst) -> Vec<(LayerId, Region)> {
    tech.arc(arc.proto())
        .layers()
        .iter()
        .filter_map(|l| Some((l.layer, arc_region(tech, arc, l.layer)?)))
        .filter(|(_, r)| !r.is_empty())
        .collect()
}

/// How far the gate of a transistor template lies inside the node on each side.
pub(crate) fn gate_inset(tech: &Technology, template: &NodeTemplate) -> Sides<i64> {
    let find = |pred: fn(tech::LayerFunction) -> bool| {
        template
            .layers()
            .iter()
            .find(|l| pred(tech.function(l.layer)))
            .map(|l| l.inset)
            .unwrap_or_default()
    };
    let poly = find(|f| f.is_poly());
    let diff = find(|f| f.is_diff());
    poly.max(&diff)
}

fn trace_points(node: &NodeInst) -> Option<Vec<FPoint>> {
    node.trace().map(|t| t.iter().map(|p| p.to_f()).collect())
}

/// The geometry of a primitive node, in absolute coordinates.
///
/// Cell instances draw nothing of their own.
pub fn node_geometry(tech: &Technology, node: &NodeInst) -> Vec<(LayerId, Region)> {
    let NodeProto::Primitive(id) = node.proto() else {
        return Vec::new();
    };
    let template = tech.template(id);
    let mut out = Vec::new();
    match (template.kind(), node.trace()) {
        (NodeKind::Transistor(_), Some(_)) => {
            let path = trace_points(node).unwrap_or_default();
            let gi = gate_inset(tech, template);
            for l in template.layers() {
                let width = (node.size().h() - l.inset.bot - l.inset.top) as f64;
                let region = path_region(
                    &path,
                    width,
                    (gi.left - l.inset.left) as f64,
                    (gi.right - l.inset.right) as f64,
                );
                out.push((l.layer, region));
            }
        }
        (_, Some(trace)) => {
            let outline = Region::from_polygon(&Polygon::new(trace.to_vec()));
            for layer in template.all_layers() {
                out.push((layer, outline.clone()));
            }
        }
        (_, None) => {
            for (layer, rect) in template.layer_rects(node.size()) {
                out.push((layer, Region::from_polygon(&node.place_rect(rect))));
            }
        }
    }
    out.retain(|(_, r)| !r.is_empty());
    out
}

/// The location of a node port, in the coordinates of the node's cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortShape {
    pub name: ArcStr,
    pub area: Polygon,
    pub center: Point,
    pub arcs: Vec<ArcProtoId>,
}

impl PortShape {
    /// Returns `true` if `p` lies in the port.
    pub fn touches(&self, p: Point) -> bool {
        self.center == p || self.area.contains_point(p)
    }

    /// Returns `true` if the port touches `region`.
    pub fn touches_region(&self, region: &Region) -> bool {
        region.touches_point(self.center)
            || (!self.area.is_degenerate() && region.overlaps(&Region::from_polygon(&self.area)))
    }

    /// Returns `true` if a wire of type `arc` may end on this port.
    pub fn accepts(&self, arc: ArcProtoId) -> bool {
        self.arcs.contains(&arc)
    }

    /// Returns `true` if a wire whose primary layer is `layer` may end on this port.
    pub fn accepts_layer(&self, tech: &Technology, layer: LayerId) -> bool {
        self.arcs
            .iter()
            .any(|a| tech.arc(*a).primary_layer() == layer)
    }

    fn transform(&self, name: ArcStr, trans: Transformation) -> Self {
        Self {
            name,
            area: self.area.transform(trans),
            center: trans.apply(self.center),
            arcs: self.arcs.clone(),
        }
    }
}

fn serpentine_port(
    tech: &Technology,
    template: &NodeTemplate,
    node: &NodeInst,
    port: &PortTemplate,
) -> Option<(Polygon, Point)> {
    let path = trace_points(node)?;
    if path.len() < 2 {
        return None;
    }
    let gi = gate_inset(tech, template);
    let local = template.port_rect(port, template.default_size());
    if local.left() < 0 && local.right() > 0 {
        return side_port(&path, gi, node.size().h(), port.inset);
    }
    let (a, b) = if local.center_f().x <= 0. {
        (path[0], path[1])
    } else {
        (path[path.len() - 2], path[path.len() - 1])
    };
    let len = a.distance(b);
    if len <= 1e-9 {
        return None;
    }
    let u = (b - a).scale(1. / len);
    let n = u.perp();
    let along = gi.left + len.round() as i64 + gi.right;
    let virtual_node = Rect::from_center_dims(Point::zero(), Dims::new(along, node.size().h()));
    let rect = virtual_node.inset(port.inset).unwrap_or(Rect::from_point(virtual_node.center()));
    let start = a - u.scale(gi.left as f64);
    let end = b + u.scale(gi.right as f64);
    let c = FPoint::new((start.x + end.x) / 2., (start.y + end.y) / 2.);
    let map = |p: Point| (c + u.scale(p.x as f64) + n.scale(p.y as f64)).round();
    let area = Polygon::new(rect.corners().iter().map(|p| map(*p)).collect());
    let center = (c + u.scale(rect.center_f().x) + n.scale(rect.center_f().y)).round();
    Some((area, center))
}

/// A port running alongside the whole trace, such as a diffusion terminal.
///
/// The port's inset across a node of height `h` bounds it between two
/// offsets from the trace, measured to the left of the direction of travel.
fn side_port(path: &[FPoint], gi: Sides<i64>, h: i64, inset: Sides<i64>) -> Option<(Polygon, Point)> {
    let lo = -h as f64 / 2. + inset.bot as f64;
    let hi = h as f64 / 2. - inset.top as f64;
    if hi <= lo {
        return None;
    }
    let offset = (lo + hi) / 2.;
    let ext_start = (gi.left - inset.left) as f64;
    let ext_end = (gi.right - inset.right) as f64;
    let outer = lo.abs().max(hi.abs());
    let mut band = path_region(path, 2. * outer, ext_start, ext_end);
    if lo * hi > 0. {
        let inner = lo.abs().min(hi.abs());
        band.subtract(&path_region(path, 2. * inner, ext_start, ext_end));
    }

    let beside = |a: FPoint, b: FPoint, t: f64| {
        let u = (b - a).scale(1. / a.distance(b));
        a + u.scale(t) + u.perp().scale(offset)
    };
    // The middle of the longest segment picks the side.
    let (a, b) = path
        .windows(2)
        .map(|w| (w[0], w[1]))
        .max_by(|x, y| x.0.distance(x.1).total_cmp(&y.0.distance(y.1)))?;
    if a.distance(b) <= 1e-9 {
        return None;
    }
    let probe = beside(a, b, a.distance(b) / 2.);
    let piece = band
        .components()
        .into_iter()
        .find(|c| c.touches_fpoint(probe))?;
    let area = piece.as_polygon()?;

    // Halfway along the trace, if that lies in the port.
    let mut left = path.windows(2).map(|w| w[0].distance(w[1])).sum::<f64>() / 2.;
    let mut halfway = None;
    for w in path.windows(2) {
        let len = w[0].distance(w[1]);
        if len > 1e-9 && left <= len {
            halfway = Some(beside(w[0], w[1], left));
            break;
        }
        left -= len;
    }
    let center = halfway
        .filter(|p| piece.touches_fpoint(*p))
        .unwrap_or(probe)
        .round();
    Some((area, center))
}

/// The ports of a primitive node.
pub fn primitive_ports(tech: &Technology, node: &NodeInst) -> Vec<PortShape> {
    let Some(id) = node.template() else {
        return Vec::new();
    };
    let template = tech.template(id);
    template
        .ports()
        .iter()
        .filter_map(|port| {
            let (area, center) = match (template.kind(), node.trace()) {
                (NodeKind::Transistor(_), Some(_)) => {
                    serpentine_port(tech, template, node, port)?
                }
                (_, Some(trace)) => {
                    let area = Polygon::new(trace.to_vec());
                    let center = area
                        .bbox()
                        .map(|b| b.center())
                        .unwrap_or_else(|| node.center());
                    (area, center)
                }
                (_, None) => {
                    let rect = template.port_rect(port, node.size());
                    (node.place_rect(rect), node.place(rect.center()))
                }
            };
            Some(PortShape {
                name: port.name.clone(),
                area,
                center,
                arcs: port.arcs.clone(),
            })
        })
        .collect()
}

/// The port exported from `cell` as `name`, in the cell's coordinates.
pub fn export_port(
    lib: &LibraryBuilder,
    tech: &Technology,
    cell: &Cell,
    name: &str,
) -> Option<PortShape> {
    let export = cell.try_export(name)?;
    let node = cell.try_node(export.node())?;
    let mut port = port_of(lib, tech, node, export.port())?;
    port.name = export.name().clone();
    Some(port)
}

/// A single named port of a node.
pub fn port_of(
    lib: &LibraryBuilder,
    tech: &Technology,
    node: &NodeInst,
    name: &str,
) -> Option<PortShape> {
    match node.proto() {
        NodeProto::Primitive(_) => primitive_ports(tech, node)
            .into_iter()
            .find(|p| p.name == name),
        NodeProto::Cell(id) => {
            let child = lib.try_cell(id)?;
            let trans = node.transformation()?;
            let inner = export_port(lib, tech, child, name)?;
            Some(inner.transform(inner.name.clone(), trans))
        }
    }
}

/// Every port of a node. The ports of a cell instance are the child's exports.
pub fn node_ports(lib: &LibraryBuilder, tech: &Technology, node: &NodeInst) -> Vec<PortShape> {
    match node.proto() {
        NodeProto::Primitive(_) => primitive_ports(tech, node),
        NodeProto::Cell(id) => {
            let Some(child) = lib.try_cell(id) else {
                return Vec::new();
            };
            child
                .exports()
                .filter_map(|e| port_of(lib, tech, node, e.name()))
                .collect()
        }
    }
}
