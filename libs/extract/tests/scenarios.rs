//! End-to-end extraction of small hand-drawn layouts.

use std::collections::HashMap;

use approx::assert_abs_diff_eq;
use diagnostics::{Diagnostic, Severity};
use extract::shapes::{arc_geometry, node_geometry};
use extract::{Cause, ExtractOptions, ExtractOutput, Extractor, NoTrace, ValidatedOptions};
use geometry::prelude::*;
use layir::{Cell, CellId, LibraryBuilder, NodeInst};
use tech::testing::*;
use tech::{LayerId, NodeKind, Technology};
use test_log::test;

fn shape(tech: &Technology, layer: LayerId, rect: Rect) -> NodeInst {
    let template = tech.pure_layer_template(layer).unwrap();
    NodeInst::primitive(template, rect.center(), rect.dims())
}

fn run(tech: &Technology, cell: Cell, options: ValidatedOptions) -> (ExtractOutput, CellId) {
    let mut lib = LibraryBuilder::new();
    let root = lib.add_cell(cell).unwrap();
    let lib = lib.build().unwrap();
    let output = Extractor::new(tech, options)
        .run(&lib, root, &mut NoTrace)
        .unwrap();
    let id = output.extracted(root).unwrap();
    (output, id)
}

fn count(tech: &Technology, cell: &Cell, pred: impl Fn(NodeKind) -> bool) -> usize {
    cell.nodes()
        .filter_map(|(_, n)| n.template())
        .filter(|t| pred(tech.template(*t).kind()))
        .count()
}

/// Everything the cell draws, merged per layer.
fn drawn(tech: &Technology, cell: &Cell) -> HashMap<LayerId, Region> {
    let mut out: HashMap<LayerId, Region> = HashMap::new();
    for (_, node) in cell.nodes() {
        for (layer, region) in node_geometry(tech, node) {
            out.entry(layer).or_default().add(&region);
        }
    }
    for (_, arc) in cell.arcs() {
        for (layer, region) in arc_geometry(tech, arc) {
            out.entry(layer).or_default().add(&region);
        }
    }
    out
}

fn assert_no_degenerate_arcs(cell: &Cell) {
    for (_, arc) in cell.arcs() {
        assert_ne!(arc.head().location, arc.tail().location);
        assert!(arc.width() > 0);
    }
}

fn straight_wire() -> (Technology, Cell) {
    let tech = test_tech();
    let mut cell = Cell::new("wire");
    cell.add_node(shape(&tech, METAL1, Rect::from_sides(0, 0, 40, 6)));
    (tech, cell)
}

fn via_pair() -> (Technology, Cell) {
    let tech = test_tech();
    let mut cell = Cell::new("via");
    cell.add_node(shape(&tech, METAL1, Rect::from_sides(0, 0, 16, 8)));
    cell.add_node(shape(&tech, METAL2, Rect::from_sides(0, 0, 16, 8)));
    cell.add_node(shape(&tech, VIA1, Rect::from_sides(2, 2, 6, 6)));
    cell.add_node(shape(&tech, VIA1, Rect::from_sides(10, 2, 14, 6)));
    (tech, cell)
}

fn nmos() -> (Technology, Cell) {
    let tech = test_tech();
    let mut cell = Cell::new("nmos");
    cell.add_node(shape(&tech, POLY, Rect::from_sides(-10, -2, 10, 2)));
    cell.add_node(shape(&tech, NDIFF, Rect::from_sides(-6, -8, 6, 8)));
    cell.add_node(shape(&tech, NSELECT, Rect::from_sides(-10, -12, 10, 12)));
    (tech, cell)
}

fn ell() -> (Technology, Cell) {
    let tech = test_tech();
    let mut cell = Cell::new("ell");
    cell.add_node(shape(&tech, METAL1, Rect::from_sides(0, 0, 40, 6)));
    cell.add_node(shape(&tech, METAL1, Rect::from_sides(34, 0, 40, 40)));
    (tech, cell)
}

#[test]
fn straight_metal_becomes_one_wire() {
    let (tech, cell) = straight_wire();
    let (output, id) = run(&tech, cell, ValidatedOptions::default());
    let cell = output.library.cell(id);

    assert_eq!(cell.num_arcs(), 1);
    let (_, arc) = cell.arcs().next().unwrap();
    assert_eq!(arc.proto(), METAL1_ARC);
    assert_eq!(arc.width(), METAL_WIDTH);
    let mut ends = [arc.head().location, arc.tail().location];
    ends.sort();
    assert_eq!(ends, [Point::new(0, 3), Point::new(40, 3)]);
    assert_eq!(count(&tech, cell, |k| k == NodeKind::Pin), 2);
    assert_eq!(cell.num_nodes(), 2);
    assert!(!output.issues.has_warning());
}

#[test]
fn overlapping_metals_with_cuts_become_one_contact() {
    let (tech, cell) = via_pair();
    let (output, id) = run(&tech, cell, ValidatedOptions::default());
    let cell = output.library.cell(id);

    let contacts: Vec<_> = cell
        .nodes()
        .filter(|(_, n)| n.template() == Some(VIA12))
        .map(|(_, n)| n)
        .collect();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].center(), Point::new(8, 4));
    assert_eq!(contacts[0].size(), Dims::new(16, 8));
    assert_eq!(count(&tech, cell, |k| matches!(k, NodeKind::PureLayer(_))), 0);
    assert_eq!(cell.num_arcs(), 0);
}

#[test]
fn gate_becomes_transistor() {
    let (tech, cell) = nmos();
    let (output, id) = run(&tech, cell, ValidatedOptions::default());
    let cell = output.library.cell(id);

    let devices: Vec<_> = cell
        .nodes()
        .filter(|(_, n)| n.template() == Some(NMOS))
        .map(|(_, n)| n)
        .collect();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].center(), Point::zero());
    assert_eq!(devices[0].size(), Dims::new(20, 16));
    assert_eq!(devices[0].orientation().angle(), 0);
    assert_eq!(count(&tech, cell, |k| matches!(k, NodeKind::PureLayer(_))), 0);
    assert!(output.issues.is_empty());
}

#[test]
fn ell_becomes_two_wires_sharing_a_pin() {
    let (tech, cell) = ell();
    let (output, id) = run(&tech, cell, ValidatedOptions::default());
    let cell = output.library.cell(id);

    assert_eq!(cell.num_arcs(), 2);
    assert_eq!(count(&tech, cell, |k| k == NodeKind::Pin), 3);
    let arcs: Vec<_> = cell.arcs().map(|(_, a)| a).collect();
    let nodes = |i: usize| [arcs[i].head().node, arcs[i].tail().node];
    let shared: Vec<_> = nodes(0)
        .into_iter()
        .filter(|n| nodes(1).contains(n))
        .collect();
    assert_eq!(shared.len(), 1);
    assert_eq!(cell.node(shared[0]).center(), Point::new(37, 3));
}

#[test]
fn ell_wires_cover_exactly_the_drawn_metal() {
    let (tech, cell) = ell();
    let (output, id) = run(&tech, cell, ValidatedOptions::default());
    let cell = output.library.cell(id);

    let drawn = drawn(&tech, cell);
    let metal = drawn.get(&METAL1).unwrap();
    let mut expected = Region::from_rect(Rect::from_sides(0, 0, 40, 6));
    expected.add(&Region::from_rect(Rect::from_sides(34, 0, 40, 40)));
    assert_abs_diff_eq!(metal.area(), expected.area(), epsilon = 1e-6);
    assert!(expected.contains_region(metal));
    assert_no_degenerate_arcs(cell);
}

#[test]
fn lone_cut_is_kept_and_reported() {
    let tech = test_tech();
    let mut cell = Cell::new("cut");
    cell.add_node(shape(&tech, VIA1, Rect::from_sides(0, 0, 4, 4)));
    let (output, id) = run(&tech, cell, ValidatedOptions::default());
    let cell = output.library.cell(id);

    assert_eq!(count(&tech, cell, |k| k == NodeKind::Contact), 0);
    assert_eq!(count(&tech, cell, |k| k == NodeKind::PureLayer(VIA1)), 1);
    let unmatched: Vec<_> = output
        .issues
        .iter()
        .filter(|i| matches!(i.cause(), Cause::UnmatchedCut { .. }))
        .collect();
    assert_eq!(unmatched.len(), 1);
    assert!(unmatched[0].to_string().contains("metal1"));
    assert_eq!(unmatched[0].locations(), vec![Point::new(2, 2)]);
}

#[test]
fn extraction_is_deterministic() {
    for make in [straight_wire, via_pair, nmos, ell] {
        let (tech, cell) = make();
        let (a, ida) = run(&tech, cell.clone(), ValidatedOptions::default());
        let (b, idb) = run(&tech, cell, ValidatedOptions::default());
        assert_eq!(a.library.cell(ida), b.library.cell(idb));
        let issues = |o: &ExtractOutput| o.issues.iter().map(|i| i.to_string()).collect::<Vec<_>>();
        assert_eq!(issues(&a), issues(&b));
    }
}

#[test]
fn realized_geometry_stays_within_input() {
    for make in [straight_wire, via_pair, nmos, ell] {
        let (tech, cell) = make();
        let mut input = LibraryBuilder::new();
        let src = input.add_cell(cell.clone()).unwrap();
        let input_drawn = drawn(&tech, input.cell(src));

        let (output, id) = run(&tech, cell, ValidatedOptions::default());
        let cell = output.library.cell(id);
        assert_no_degenerate_arcs(cell);
        for (layer, region) in drawn(&tech, cell) {
            if tech.function(layer).is_well() || tech.function(layer).is_select() {
                continue;
            }
            let source = input_drawn.get(&layer).cloned().unwrap_or_default();
            assert!(
                source.contains_region(&region),
                "{} grew on layer {}",
                cell.name(),
                tech.layer(layer).name()
            );
        }
    }
}

#[test]
fn snapping_keeps_wire_on_grid() {
    let tech = test_tech();
    let mut cell = Cell::new("odd");
    cell.add_node(shape(&tech, METAL1, Rect::from_sides(1, 1, 41, 7)));
    let options = ExtractOptions {
        alignment: Some(2),
        ..Default::default()
    }
    .validate()
    .unwrap();
    let (output, id) = run(&tech, cell, options);
    let cell = output.library.cell(id);
    for (_, arc) in cell.arcs() {
        for end in [arc.head(), arc.tail()] {
            assert_eq!(end.location.x % 2, 0);
            assert_eq!(end.location.y % 2, 0);
        }
    }
    assert!(output
        .issues
        .iter()
        .all(|i| i.severity() < Severity::Error));
}

#[test]
fn extraction_covers_all_input_geometry() {
    for make in [straight_wire, via_pair, nmos, ell] {
        let (tech, cell) = make();
        let mut input = LibraryBuilder::new();
        let src = input.add_cell(cell.clone()).unwrap();
        let input_drawn = drawn(&tech, input.cell(src));

        let (output, id) = run(&tech, cell, ValidatedOptions::default());
        let cell = output.library.cell(id);
        let output_drawn = drawn(&tech, cell);
        for (layer, source) in input_drawn {
            if tech.function(layer).is_well() || tech.function(layer).is_select() {
                continue;
            }
            let name = tech.layer(layer).name();
            let region = output_drawn.get(&layer).cloned().unwrap_or_default();
            assert!(
                region.contains_region(&source),
                "{} lost geometry on layer {}",
                cell.name(),
                name
            );
            assert_abs_diff_eq!(region.area(), source.area(), epsilon = 1e-6);
        }
    }
}

/// An L-shaped gate: poly runs right then turns up, with diffusion on both
/// sides and three active wires leaving it.
fn serpentine() -> (Technology, Cell) {
    let tech = test_tech();
    let mut cell = Cell::new("serpentine");
    cell.add_node(shape(&tech, POLY, Rect::from_sides(-24, -2, 10, 2)));
    cell.add_node(shape(&tech, POLY, Rect::from_sides(6, -2, 10, 30)));
    cell.add_node(shape(&tech, NDIFF, Rect::from_sides(-20, -8, 16, 8)));
    cell.add_node(shape(&tech, NDIFF, Rect::from_sides(0, -8, 16, 26)));
    // Outside the bend, below the first leg.
    cell.add_node(shape(&tech, NDIFF, Rect::from_sides(-14, -30, -8, -8)));
    // Outside the bend, right of the second leg.
    cell.add_node(shape(&tech, NDIFF, Rect::from_sides(16, 14, 40, 20)));
    // Inside the bend.
    cell.add_node(shape(&tech, NDIFF, Rect::from_sides(-16, 8, -10, 30)));
    cell.add_node(shape(&tech, NSELECT, Rect::from_sides(-34, -36, 46, 36)));
    (tech, cell)
}

#[test]
fn bent_gate_becomes_serpentine_transistor() {
    let (tech, cell) = serpentine();
    let (output, id) = run(&tech, cell, ValidatedOptions::default());
    let cell = output.library.cell(id);

    let devices: Vec<_> = cell
        .nodes()
        .filter(|(_, n)| n.template() == Some(NMOS))
        .collect();
    assert_eq!(devices.len(), 1);
    let (device, node) = devices[0];
    let mut trace = node.trace().unwrap().to_vec();
    if trace[0] != Point::new(-20, 0) {
        trace.reverse();
    }
    assert_eq!(
        trace,
        vec![Point::new(-20, 0), Point::new(8, 0), Point::new(8, 26)]
    );
    assert!(!output.issues.iter().any(|i| matches!(
        i.cause(),
        Cause::UnmatchedGate { .. } | Cause::WireDoesNotFit { .. }
    )));

    // Each wire lands on the diffusion side it touches.
    let mut port_of = HashMap::new();
    for (_, arc) in cell.arcs() {
        let Some(end) = arc.end_on(device) else {
            continue;
        };
        assert_eq!(arc.proto(), NACTIVE_ARC);
        let far = if arc.head().node == device {
            arc.tail().location
        } else {
            arc.head().location
        };
        let wire = if far.y < -8 {
            'a'
        } else if far.x > 16 {
            'b'
        } else {
            'c'
        };
        assert!(port_of.insert(wire, end.port.clone()).is_none());
    }
    assert_eq!(port_of.len(), 3);
    assert!(port_of.values().all(|p| p == "s" || p == "d"));
    assert_eq!(port_of[&'a'], port_of[&'b']);
    assert_ne!(port_of[&'a'], port_of[&'c']);
}

#[test]
fn gate_angle_follows_template_poly_axis() {
    let (_, cell) = nmos();
    let tech = upright_tech();
    let (output, id) = run(&tech, cell, ValidatedOptions::default());
    let cell = output.library.cell(id);

    let devices: Vec<_> = cell
        .nodes()
        .filter(|(_, n)| n.template() == Some(NMOS))
        .map(|(_, n)| n)
        .collect();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].orientation().angle() % 1800, 900);
    assert_eq!(devices[0].size(), Dims::new(16, 20));
    assert!(!output
        .issues
        .iter()
        .any(|i| matches!(i.cause(), Cause::UnmatchedGate { .. })));
}

fn spread_cuts() -> (Technology, Cell) {
    let tech = test_tech();
    let mut cell = Cell::new("spread");
    cell.add_node(shape(&tech, METAL1, Rect::from_sides(0, 0, 18, 8)));
    cell.add_node(shape(&tech, METAL2, Rect::from_sides(0, 0, 18, 8)));
    cell.add_node(shape(&tech, VIA1, Rect::from_sides(2, 2, 6, 6)));
    cell.add_node(shape(&tech, VIA1, Rect::from_sides(12, 2, 16, 6)));
    (tech, cell)
}

#[test]
fn irregular_cuts_merge_only_when_approximated() {
    let (tech, cell) = spread_cuts();
    let (output, id) = run(&tech, cell.clone(), ValidatedOptions::default());
    let contacts = count(&tech, output.library.cell(id), |k| k == NodeKind::Contact);
    assert_eq!(contacts, 2);

    let options = ExtractOptions {
        approximate_cuts: true,
        ..Default::default()
    }
    .validate()
    .unwrap();
    let (output, id) = run(&tech, cell, options);
    let cell = output.library.cell(id);
    let contacts: Vec<_> = cell
        .nodes()
        .filter(|(_, n)| n.template() == Some(VIA12))
        .map(|(_, n)| n)
        .collect();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].size(), Dims::new(18, 8));
    assert_eq!(contacts[0].center(), Point::new(9, 4));
}
