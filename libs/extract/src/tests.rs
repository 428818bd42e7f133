use std::collections::HashMap;

use diagnostics::{Diagnostic, Severity};
use geometry::prelude::*;
use geometry::MAX_COORD;
use layir::{ArcEnd, ArcInst, Cell, CellId, Library, LibraryBuilder, NodeInst};
use tech::testing::*;
use tech::{LayerId, NodeKind, Technology};
use test_log::test;

use crate::context::ExtractContext;
use crate::*;

fn shape(tech: &Technology, layer: LayerId, rect: Rect) -> NodeInst {
    let template = tech
        .pure_layer_template(layer)
        .expect("every layer has a pure-layer template");
    NodeInst::primitive(template, rect.center(), rect.dims())
}

fn library(cells: Vec<Cell>) -> (Library, CellId) {
    let mut lib = LibraryBuilder::new();
    let mut last = None;
    for cell in cells {
        last = Some(lib.add_cell(cell).unwrap());
    }
    (lib.build().unwrap(), last.unwrap())
}

fn metal_strip(tech: &Technology, name: &str) -> Cell {
    let mut cell = Cell::new(name);
    cell.add_node(shape(tech, METAL1, Rect::from_sides(0, 0, 40, 6)));
    cell
}

/// Runs `f` against a fresh context for an empty cell.
fn in_context<R>(
    tech: &Technology,
    options: &ValidatedOptions,
    f: impl FnOnce(&mut ExtractContext<'_>) -> R,
) -> R {
    let process = ProcessInfo::default();
    let lib = LibraryBuilder::new();
    let memo = HashMap::new();
    let cancel = CancelToken::new();
    let mut trace = NoTrace;
    let mut ctx = ExtractContext::new(
        tech,
        options,
        &process,
        &lib,
        &memo,
        &cancel,
        &mut trace,
        "top".into(),
    );
    f(&mut ctx)
}

fn extract(tech: &Technology, lib: &Library, root: CellId, options: ExtractOptions) -> ExtractOutput {
    Extractor::new(tech, options.validate().unwrap())
        .run(lib, root, &mut NoTrace)
        .unwrap()
}

fn has_issue(output: &ExtractOutput, pred: impl Fn(&Cause) -> bool) -> bool {
    output.issues.iter().any(|i| pred(i.cause()))
}

fn kinds(tech: &Technology, cell: &Cell) -> Vec<NodeKind> {
    cell.nodes()
        .filter_map(|(_, n)| n.template())
        .map(|t| tech.template(t).kind())
        .collect()
}

#[test]
fn unknown_root_is_an_error() {
    let tech = test_tech();
    let (lib, _) = library(vec![metal_strip(&tech, "top")]);
    let extractor = Extractor::new(&tech, ValidatedOptions::default());
    let err = extractor.run_named(&lib, "missing", &mut NoTrace).unwrap_err();
    assert!(matches!(err, ExtractError::UnknownCell(name) if name == "missing"));
}

#[test]
fn extracted_cell_is_added_under_suffixed_name() {
    let tech = test_tech();
    let (lib, root) = library(vec![metal_strip(&tech, "top")]);
    let output = Extractor::new(&tech, ValidatedOptions::default())
        .run(&lib, root, &mut NoTrace)
        .unwrap();

    let id = output.extracted(root).unwrap();
    let cell = output.library.cell(id);
    assert_eq!(cell.name(), "top_extracted");
    assert_eq!(output.outcomes.len(), 1);
    assert!(output.library.try_cell_named("top").is_some());
    match output.root() {
        Some(CellOutcome::Extracted { stats, .. }) => {
            assert_eq!(stats.arcs, 1);
            assert_eq!(stats.pins, 2);
            assert_eq!(stats.pure_layer, 0);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn existing_destination_fails_the_cell() {
    let tech = test_tech();
    let (lib, root) = library(vec![
        Cell::new("top_extracted"),
        metal_strip(&tech, "top"),
    ]);
    let output = Extractor::new(&tech, ValidatedOptions::default())
        .run(&lib, root, &mut NoTrace)
        .unwrap();
    assert!(matches!(
        output.root(),
        Some(CellOutcome::Failed(ExtractError::DestinationExists(name))) if name == "top_extracted"
    ));
    assert_eq!(output.library.cells().count(), 2);
}

#[test]
fn cancelled_run_reports_every_cell() {
    let tech = test_tech();
    let (lib, root) = library(vec![metal_strip(&tech, "top")]);
    let cancel = CancelToken::new();
    cancel.cancel();
    let output = Extractor::new(&tech, ValidatedOptions::default())
        .with_cancel(cancel)
        .run(&lib, root, &mut NoTrace)
        .unwrap();
    assert!(matches!(
        output.root(),
        Some(CellOutcome::Failed(ExtractError::Cancelled))
    ));
    assert!(output.library.try_cell_named("top_extracted").is_none());
}

#[test]
fn recursive_run_extracts_children_first() {
    let tech = test_tech();
    let mut lib = LibraryBuilder::new();
    let child = lib.add_cell(metal_strip(&tech, "leaf")).unwrap();
    let mut top = Cell::new("top");
    top.add_node(NodeInst::instance(child, Point::new(100, 0)).with_name("x0"));
    let root = lib.add_cell(top).unwrap();
    let lib = lib.build().unwrap();

    let options = ExtractOptions {
        recursive: true,
        ..Default::default()
    }
    .validate()
    .unwrap();
    let output = Extractor::new(&tech, options)
        .run(&lib, root, &mut NoTrace)
        .unwrap();

    let order: Vec<_> = output.outcomes.keys().copied().collect();
    assert_eq!(order, vec![child, root]);
    let leaf = output.extracted(child).unwrap();
    let top = output.library.cell(output.extracted(root).unwrap());
    let instances: Vec<_> = top.nodes().filter_map(|(_, n)| n.child()).collect();
    assert_eq!(instances, vec![leaf]);
}

#[test]
fn non_recursive_run_keeps_source_children() {
    let tech = test_tech();
    let mut lib = LibraryBuilder::new();
    let child = lib.add_cell(metal_strip(&tech, "leaf")).unwrap();
    let mut top = Cell::new("top");
    top.add_node(NodeInst::instance(child, Point::zero()).with_name("x0"));
    let root = lib.add_cell(top).unwrap();
    let lib = lib.build().unwrap();

    let output = Extractor::new(&tech, ValidatedOptions::default())
        .run(&lib, root, &mut NoTrace)
        .unwrap();
    assert_eq!(output.outcomes.len(), 1);
    let top = output.library.cell(output.extracted(root).unwrap());
    let instances: Vec<_> = top.nodes().filter_map(|(_, n)| n.child()).collect();
    assert_eq!(instances, vec![child]);
}

#[test]
fn expanded_children_are_flattened() {
    let tech = test_tech();
    let mut lib = LibraryBuilder::new();
    let child = lib.add_cell(metal_strip(&tech, "leaf")).unwrap();
    let mut top = Cell::new("top");
    top.add_node(NodeInst::instance(child, Point::new(0, 20)).with_name("x0"));
    let root = lib.add_cell(top).unwrap();
    let lib = lib.build().unwrap();

    let options = ExtractOptions {
        recursive: true,
        expand_patterns: vec!["lea.".into()],
        ..Default::default()
    }
    .validate()
    .unwrap();
    let output = Extractor::new(&tech, options)
        .run(&lib, root, &mut NoTrace)
        .unwrap();

    assert_eq!(output.outcomes.len(), 1);
    let top = output.library.cell(output.extracted(root).unwrap());
    assert!(top.nodes().all(|(_, n)| n.child().is_none()));
    assert_eq!(top.num_arcs(), 1);
    let (_, arc) = top.arcs().next().unwrap();
    assert_eq!(arc.head().location.y, 23);
}

#[test]
fn disabled_wires_leave_pure_layer_nodes() {
    let tech = test_tech();
    let (lib, root) = library(vec![metal_strip(&tech, "top")]);
    let mut options = ExtractOptions::default();
    options.stages.wires = false;
    let output = Extractor::new(&tech, options.validate().unwrap())
        .run(&lib, root, &mut NoTrace)
        .unwrap();

    let cell = output.library.cell(output.extracted(root).unwrap());
    assert_eq!(kinds(&tech, cell), vec![NodeKind::PureLayer(METAL1)]);
    assert_eq!(cell.num_arcs(), 0);
}

#[test]
fn disabled_fallback_discards_with_warning() {
    let tech = test_tech();
    let (lib, root) = library(vec![metal_strip(&tech, "top")]);
    let mut options = ExtractOptions::default();
    options.stages.wires = false;
    options.stages.pure_layer = false;
    let output = Extractor::new(&tech, options.validate().unwrap())
        .run(&lib, root, &mut NoTrace)
        .unwrap();

    let cell = output.library.cell(output.extracted(root).unwrap());
    assert_eq!(cell.num_nodes(), 0);
    assert!(output
        .issues
        .iter()
        .any(|i| matches!(i.cause(), Cause::GeometryDiscarded { .. })
            && i.severity() == diagnostics::Severity::Warning));
}

#[test]
fn dust_is_dropped() {
    let tech = test_tech();
    let mut top = Cell::new("top");
    top.add_node(shape(&tech, METAL2, Rect::from_sides(0, 0, 2, 2)));
    let (lib, root) = library(vec![top]);
    let options = ExtractOptions {
        min_area: 10,
        ..Default::default()
    };
    let output = Extractor::new(&tech, options.validate().unwrap())
        .run(&lib, root, &mut NoTrace)
        .unwrap();

    let cell = output.library.cell(output.extracted(root).unwrap());
    assert_eq!(cell.num_nodes(), 0);
    assert!(output
        .issues
        .iter()
        .any(|i| matches!(i.cause(), Cause::DustDropped { area: 4, .. })));
}

#[test]
fn exports_of_dissolved_shapes_survive() {
    let tech = test_tech();
    let mut top = Cell::new("top");
    let node = top.add_node(shape(&tech, METAL1, Rect::from_sides(0, 0, 40, 6)));
    top.add_export("a", node, "port");
    let (lib, root) = library(vec![top]);
    let output = Extractor::new(&tech, ValidatedOptions::default())
        .run(&lib, root, &mut NoTrace)
        .unwrap();

    let cell = output.library.cell(output.extracted(root).unwrap());
    let export = cell.try_export("a").unwrap();
    let node = cell.node(export.node());
    let template = tech.template(node.template().unwrap());
    assert_eq!(template.kind(), NodeKind::Pin);
    assert_eq!(node.center(), Point::new(20, 3));
}

#[test]
fn trace_records_realized_wire() {
    let tech = test_tech();
    let (lib, root) = library(vec![metal_strip(&tech, "top")]);
    let mut trace = VecTrace::new();
    Extractor::new(&tech, ValidatedOptions::default())
        .run(&lib, root, &mut trace)
        .unwrap();
    assert!(trace
        .stage(Stage::Wires)
        .any(|e| e.action == TraceAction::Realized && e.layer == Some(METAL1)));
    assert_eq!(
        trace
            .stage(Stage::PureLayer)
            .filter(|e| e.action == TraceAction::Realized)
            .count(),
        0
    );
}


#[test]
fn grown_geometry_is_reported_and_clipped() {
    let tech = test_tech();
    let options = ValidatedOptions::default();
    in_context(&tech, &options, |ctx| {
        ctx.original.add_rect(METAL1, Rect::from_sides(0, 0, 10, 10));
        ctx.working.add_rect(METAL1, Rect::from_sides(0, 0, 20, 10));

        check_subset(ctx, Stage::Wires);
        assert!(ctx.working.is_subset_of(&ctx.original));
        assert!(ctx.issues.has_error());
        let grew: Vec<_> = ctx
            .issues
            .iter()
            .filter(|i| {
                matches!(
                    i.cause(),
                    Cause::GeometryGrew { stage: Stage::Wires, layer } if layer.as_str() == "metal1"
                )
            })
            .collect();
        assert_eq!(grew.len(), 1);
        assert_eq!(grew[0].locations(), vec![Point::new(15, 5)]);
    });
}

#[test]
fn kept_via_halo_leaves_metal_unclassified() {
    let tech = test_tech();
    let contact = NodeInst::primitive(VIA12, Point::new(4, 4), Dims::square(8));
    for (halo, metal_left) in [(ViaHalo::Consume, false), (ViaHalo::Keep, true)] {
        let options = ExtractOptions {
            via_halo: halo,
            ..Default::default()
        }
        .validate()
        .unwrap();
        in_context(&tech, &options, |ctx| {
            ctx.working.add_rect(METAL1, Rect::from_sides(0, 0, 8, 8));
            ctx.working.add_rect(METAL2, Rect::from_sides(0, 0, 8, 8));
            ctx.working.add_rect(VIA1, Rect::from_sides(2, 2, 6, 6));
            ctx.consume_node(&contact);
            assert!(ctx.working.region(VIA1).is_empty());
            assert_eq!(!ctx.working.region(METAL1).is_empty(), metal_left, "{halo:?}");
            assert_eq!(!ctx.working.region(METAL2).is_empty(), metal_left, "{halo:?}");
        });
    }
}

#[test]
fn dust_beside_a_wire_is_dropped_before_extraction() {
    let tech = test_tech();
    let mut top = Cell::new("top");
    top.add_node(shape(&tech, METAL1, Rect::from_sides(0, 0, 40, 6)));
    top.add_node(shape(&tech, METAL1, Rect::from_sides(0, 20, 2, 22)));
    let (lib, root) = library(vec![top]);
    let mut trace = VecTrace::new();
    let options = ExtractOptions {
        min_area: 10,
        ..Default::default()
    };
    let output = Extractor::new(&tech, options.validate().unwrap())
        .run(&lib, root, &mut trace)
        .unwrap();

    let cell = output.library.cell(output.extracted(root).unwrap());
    assert_eq!(cell.num_arcs(), 1);
    assert_eq!(kinds(&tech, cell), vec![NodeKind::Pin, NodeKind::Pin]);
    match output.root() {
        Some(CellOutcome::Extracted { stats, .. }) => assert_eq!(stats.dust, 1),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(trace
        .stage(Stage::Collect)
        .any(|e| e.action == TraceAction::Discarded && e.layer == Some(METAL1)));
}

#[test]
fn wire_reaches_into_unexported_subcell_port() {
    let tech = test_tech();
    let mut lib = LibraryBuilder::new();
    let mut leaf = Cell::new("leaf");
    leaf.add_node(NodeInst::primitive(VIA12, Point::new(4, 4), Dims::square(8)));
    let child = lib.add_cell(leaf).unwrap();
    let mut top = Cell::new("top");
    top.add_node(NodeInst::instance(child, Point::zero()).with_name("x0"));
    top.add_node(shape(&tech, METAL1, Rect::from_sides(8, 1, 48, 7)));
    let root = lib.add_cell(top).unwrap();
    let lib = lib.build().unwrap();

    let output = extract(&tech, &lib, root, ExtractOptions::default());
    assert!(!has_issue(&output, |c| matches!(c, Cause::WireDoesNotFit { .. })));

    let leaf = output.library.try_cell_named("leaf").unwrap();
    let exports: Vec<_> = leaf.exports().collect();
    assert_eq!(exports.len(), 1);
    assert_eq!(exports[0].port().as_str(), "con");

    let top = output.library.cell(output.extracted(root).unwrap());
    assert_eq!(top.num_arcs(), 1);
    let (_, arc) = top.arcs().next().unwrap();
    assert_eq!(arc.width(), METAL_WIDTH);
    let into = [arc.head(), arc.tail()]
        .into_iter()
        .find(|e| top.node(e.node).child() == Some(child))
        .unwrap();
    assert_eq!(&into.port, exports[0].name());
    assert_eq!(into.location, Point::new(4, 4));
}

#[test]
fn subcell_export_takes_the_name_of_its_net() {
    let tech = test_tech();
    let mut lib = LibraryBuilder::new();
    let mut leaf = Cell::new("leaf");
    let via = leaf.add_node(NodeInst::primitive(VIA12, Point::new(4, 4), Dims::square(8)));
    let pin = leaf.add_node(NodeInst::primitive(METAL1_PIN, Point::new(4, 20), Dims::default()));
    leaf.add_arc(ArcInst::new(
        METAL1_ARC,
        ArcEnd::new(via, "con", Point::new(4, 4)),
        ArcEnd::new(pin, "pin", Point::new(4, 20)),
        METAL_WIDTH,
    ));
    leaf.add_export("vdd", pin, "pin");
    let child = lib.add_cell(leaf).unwrap();
    let mut top = Cell::new("top");
    top.add_node(NodeInst::instance(child, Point::zero()).with_name("x0"));
    top.add_node(shape(&tech, METAL1, Rect::from_sides(8, 1, 48, 7)));
    let root = lib.add_cell(top).unwrap();
    let lib = lib.build().unwrap();

    let output = extract(&tech, &lib, root, ExtractOptions::default());
    let leaf = output.library.try_cell_named("leaf").unwrap();
    let created = leaf.exports_on(via);
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].name().as_str(), "vdd_1");

    let top = output.library.cell(output.extracted(root).unwrap());
    let ports: Vec<_> = top
        .arcs()
        .flat_map(|(_, a)| [a.head().clone(), a.tail().clone()])
        .filter(|e| top.node(e.node).child() == Some(child))
        .map(|e| e.port)
        .collect();
    assert_eq!(ports, vec![ArcStr::from("vdd_1")]);
}

#[test]
fn flattened_wires_snap_to_grid() {
    let tech = test_tech();
    let mut lib = LibraryBuilder::new();
    let mut leaf = Cell::new("leaf");
    let a = leaf.add_node(shape(&tech, METAL1, Rect::from_sides(0, 0, 6, 6)));
    let b = leaf.add_node(shape(&tech, METAL1, Rect::from_sides(34, 0, 40, 6)));
    leaf.add_arc(ArcInst::new(
        METAL1_ARC,
        ArcEnd::new(a, "port", Point::new(3, 3)),
        ArcEnd::new(b, "port", Point::new(37, 3)),
        METAL_WIDTH,
    ));
    let child = lib.add_cell(leaf).unwrap();
    let mut top = Cell::new("top");
    top.add_node(NodeInst::instance(child, Point::new(1, 1)).with_name("x0"));
    let root = lib.add_cell(top).unwrap();
    let lib = lib.build().unwrap();

    let options = ExtractOptions {
        alignment: Some(2),
        expand_patterns: vec!["leaf".into()],
        ..Default::default()
    };
    let output = extract(&tech, &lib, root, options);
    let top = output.library.cell(output.extracted(root).unwrap());
    assert!(top.num_arcs() > 0);
    for (_, arc) in top.arcs() {
        for end in [arc.head(), arc.tail()] {
            assert!(end.location.is_on_grid(2), "wire end {}", end.location);
        }
    }
    for (_, node) in top.nodes() {
        for (_, region) in shapes::node_geometry(&tech, node) {
            let bbox = region.bbox().unwrap();
            assert!(bbox.corners().iter().all(|p| p.is_on_grid(2)), "node at {bbox}");
        }
    }
}

#[test]
fn geometry_beyond_the_coordinate_range_is_skipped() {
    let tech = test_tech();
    let mut lib = LibraryBuilder::new();
    let mut leaf = Cell::new("leaf");
    leaf.add_node(shape(&tech, METAL1, Rect::from_sides(0, 0, 40, 6)).with_name("strip"));
    let child = lib.add_cell(leaf).unwrap();
    let far = Cell::new("far");
    let opaque = lib.add_cell(far).unwrap();
    let mut top = Cell::new("top");
    top.add_node(NodeInst::instance(child, Point::new(MAX_COORD - 10, 0)).with_name("x0"));
    top.add_node(NodeInst::instance(opaque, Point::new(0, MAX_COORD + 1)).with_name("x1"));
    top.add_node(shape(&tech, METAL1, Rect::from_sides(0, 0, 40, 6)));
    let root = lib.add_cell(top).unwrap();
    let lib = lib.build().unwrap();

    let options = ExtractOptions {
        expand_patterns: vec!["leaf".into()],
        ..Default::default()
    };
    let output = extract(&tech, &lib, root, options);
    let skipped: Vec<_> = output
        .issues
        .iter()
        .filter_map(|i| match i.cause() {
            Cause::CoordinateOutOfRange { instance } => Some(instance.to_string()),
            _ => None,
        })
        .collect();
    assert_eq!(skipped, vec!["strip".to_string(), "x1".to_string()]);

    let top = output.library.cell(output.extracted(root).unwrap());
    assert_eq!(top.num_arcs(), 1);
    assert!(top.nodes().all(|(_, n)| n.child().is_none()));
}

#[test]
fn duplicate_cut_is_reported_once() {
    let tech = test_tech();
    let mut top = Cell::new("top");
    top.add_node(shape(&tech, METAL1, Rect::from_sides(0, 0, 8, 8)));
    top.add_node(shape(&tech, METAL2, Rect::from_sides(0, 0, 8, 8)));
    top.add_node(shape(&tech, VIA1, Rect::from_sides(2, 2, 6, 6)));
    top.add_node(shape(&tech, VIA1, Rect::from_sides(2, 2, 6, 6)));
    let (lib, root) = library(vec![top]);
    let output = extract(&tech, &lib, root, ExtractOptions::default());

    let cell = output.library.cell(output.extracted(root).unwrap());
    assert_eq!(kinds(&tech, cell), vec![NodeKind::Contact]);
    let duplicates: Vec<_> = output
        .issues
        .iter()
        .filter(|i| matches!(i.cause(), Cause::DuplicateCut { .. }))
        .collect();
    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[0].severity(), Severity::Info);
    assert_eq!(duplicates[0].locations(), vec![Point::new(4, 4)]);
}

#[test]
fn parked_pin_splits_the_wire_under_it() {
    let tech = test_tech();
    let mut top = Cell::new("top");
    top.add_node(shape(&tech, METAL1, Rect::from_sides(0, 0, 40, 6)));
    let pin = top.add_node(NodeInst::primitive(METAL1_PIN, Point::new(20, 3), Dims::default()));
    top.add_export("out", pin, "pin");
    let (lib, root) = library(vec![top]);
    let output = extract(&tech, &lib, root, ExtractOptions::default());

    let cell = output.library.cell(output.extracted(root).unwrap());
    assert_eq!(cell.num_arcs(), 2);
    let export = cell.try_export("out").unwrap();
    let node = cell.node(export.node());
    assert_eq!(node.center(), Point::new(20, 3));
    assert_eq!(node.template(), Some(METAL1_PIN));
    let ends = cell
        .arcs()
        .flat_map(|(_, a)| [a.head().node, a.tail().node])
        .filter(|n| *n == export.node())
        .count();
    assert_eq!(ends, 2);
}

#[test]
fn parked_pin_without_geometry_keeps_its_own_pin() {
    let tech = test_tech();
    let mut top = Cell::new("top");
    top.add_node(shape(&tech, METAL1, Rect::from_sides(0, 0, 40, 6)));
    let pin = top.add_node(NodeInst::primitive(METAL1_PIN, Point::new(100, 100), Dims::default()));
    top.add_export("lonely", pin, "pin");
    top.add_export("alias", pin, "pin");
    let (lib, root) = library(vec![top]);
    let output = extract(&tech, &lib, root, ExtractOptions::default());

    let cell = output.library.cell(output.extracted(root).unwrap());
    let a = cell.try_export("lonely").unwrap();
    let b = cell.try_export("alias").unwrap();
    assert_eq!(a.node(), b.node());
    assert_eq!(cell.node(a.node()).center(), Point::new(100, 100));
    assert_eq!(cell.num_arcs(), 1);
}

#[test]
fn export_of_dropped_dust_gets_a_new_pin() {
    let tech = test_tech();
    let mut top = Cell::new("top");
    let node = top.add_node(shape(&tech, METAL1, Rect::from_sides(0, 0, 2, 2)));
    top.add_export("tiny", node, "port");
    let (lib, root) = library(vec![top]);
    let options = ExtractOptions {
        min_area: 10,
        ..Default::default()
    };
    let output = extract(&tech, &lib, root, options);

    let cell = output.library.cell(output.extracted(root).unwrap());
    let export = cell.try_export("tiny").unwrap();
    let node = cell.node(export.node());
    assert_eq!(node.template(), Some(METAL1_PIN));
    assert_eq!(node.center(), Point::new(1, 1));
    assert!(has_issue(&output, |c| matches!(c, Cause::ExportOnNewPin { export } if export.as_str() == "tiny")));
}

/// Two contacts joined by bare metal, extracted without the wire stage.
fn contacts_on_metal(tech: &Technology, second: bool) -> (Library, CellId) {
    let mut top = Cell::new("top");
    top.add_node(NodeInst::primitive(VIA12, Point::new(4, 4), Dims::square(8)));
    if second {
        top.add_node(NodeInst::primitive(VIA12, Point::new(44, 4), Dims::square(8)));
    }
    top.add_node(shape(tech, METAL1, Rect::from_sides(8, 1, 40, 7)));
    library(vec![top])
}

fn bridges_only() -> ExtractOptions {
    let mut options = ExtractOptions::default();
    options.stages.wires = false;
    options
}

#[test]
fn bridge_extends_a_contact_across_leftover_metal() {
    let tech = test_tech();
    let (lib, root) = contacts_on_metal(&tech, false);
    let output = extract(&tech, &lib, root, bridges_only());

    let cell = output.library.cell(output.extracted(root).unwrap());
    assert_eq!(cell.num_arcs(), 1);
    let (_, arc) = cell.arcs().next().unwrap();
    assert_eq!(arc.proto(), METAL1_ARC);
    assert_eq!(arc.width(), METAL_WIDTH);
    assert_eq!(arc.head().location, Point::new(4, 4));
    assert_eq!(arc.head().port.as_str(), "con");
    assert_eq!(arc.tail().location, Point::new(40, 4));
    assert_eq!(cell.node(arc.tail().node).template(), Some(METAL1_PIN));
    assert!(!kinds(&tech, cell)
        .iter()
        .any(|k| matches!(k, NodeKind::PureLayer(_))));
}

#[test]
fn bridge_connects_two_contacts() {
    let tech = test_tech();
    let (lib, root) = contacts_on_metal(&tech, true);
    let output = extract(&tech, &lib, root, bridges_only());

    let cell = output.library.cell(output.extracted(root).unwrap());
    assert_eq!(cell.num_arcs(), 1);
    let (_, arc) = cell.arcs().next().unwrap();
    let mut ends = [arc.head().location, arc.tail().location];
    ends.sort();
    assert_eq!(ends, [Point::new(4, 4), Point::new(44, 4)]);
    assert_eq!(arc.width(), METAL_WIDTH);
    assert_eq!(kinds(&tech, cell), vec![NodeKind::Contact, NodeKind::Contact]);
}

fn pdiff_strip(tech: &Technology) -> (Library, CellId) {
    let mut top = Cell::new("top");
    top.add_node(shape(tech, PDIFF, Rect::from_sides(0, 0, 40, 6)));
    library(vec![top])
}

#[test]
fn ignore_np_folds_active_onto_one_layer() {
    let tech = test_tech();
    let (lib, root) = pdiff_strip(&tech);
    for (handling, layer) in [
        (ActiveHandling::Strict, PDIFF),
        (ActiveHandling::IgnoreNp, NDIFF),
    ] {
        let options = ExtractOptions {
            active_handling: handling,
            ..Default::default()
        };
        let output = extract(&tech, &lib, root, options);
        let cell = output.library.cell(output.extracted(root).unwrap());
        assert_eq!(kinds(&tech, cell), vec![NodeKind::PureLayer(layer)], "{handling:?}");
        assert!(has_issue(&output, |c| matches!(c, Cause::NoWireType { .. })));
    }
}

#[test]
fn ignore_surrounds_accepts_bare_active() {
    let tech = test_tech();
    let (lib, root) = pdiff_strip(&tech);
    let options = ExtractOptions {
        active_handling: ActiveHandling::IgnoreSurrounds,
        ..Default::default()
    };
    let output = extract(&tech, &lib, root, options);

    let cell = output.library.cell(output.extracted(root).unwrap());
    assert_eq!(cell.num_arcs(), 1);
    let (_, arc) = cell.arcs().next().unwrap();
    assert_eq!(arc.proto(), PACTIVE_ARC);
    assert_eq!(kinds(&tech, cell), vec![NodeKind::Pin, NodeKind::Pin]);
    assert!(!has_issue(&output, |c| matches!(c, Cause::NoWireType { .. })));
}
