use geometry::prelude::*;
use tech::{ArcProtoId, TemplateId};
use test_log::test;

use crate::*;

fn pin(x: i64, y: i64) -> NodeInst {
    NodeInst::primitive(TemplateId(0), Point::new(x, y), Dims::default()).with_name("pin")
}

#[test]
fn node_names_are_uniquified() {
    let mut cell = Cell::new("top");
    let a = cell.add_node(pin(0, 0));
    let b = cell.add_node(pin(10, 0));
    assert_eq!(cell.node(a).name(), "pin");
    assert_eq!(cell.node(b).name(), "pin_1");
    assert_eq!(cell.try_node_named("pin_1"), Some(b));
}

#[test]
fn removing_a_node_removes_attached_arcs_and_exports() {
    let mut cell = Cell::new("top");
    let a = cell.add_node(pin(0, 0));
    let b = cell.add_node(pin(10, 0));
    let c = cell.add_node(pin(20, 0));
    let ab = cell.add_arc(ArcInst::new(
        ArcProtoId(0),
        ArcEnd::new(a, "pin", Point::new(0, 0)),
        ArcEnd::new(b, "pin", Point::new(10, 0)),
        4,
    ));
    let bc = cell.add_arc(ArcInst::new(
        ArcProtoId(0),
        ArcEnd::new(b, "pin", Point::new(10, 0)),
        ArcEnd::new(c, "pin", Point::new(20, 0)),
        4,
    ));
    cell.add_export("out", c, "pin");
    assert_eq!(cell.arcs_on(b), vec![ab, bc]);

    cell.remove_node(c);
    assert_eq!(cell.num_arcs(), 1);
    assert!(cell.try_export("out").is_none());
    assert!(cell.try_arc(ab).is_some());
}

#[test]
fn export_names_are_uniquified_on_rename() {
    let mut cell = Cell::new("top");
    let a = cell.add_node(pin(0, 0));
    let b = cell.add_node(pin(5, 0));
    assert_eq!(cell.add_export("a", a, "pin"), "a");
    assert_eq!(cell.add_export("tmp", b, "pin"), "tmp");
    assert_eq!(cell.rename_export("tmp", "a").unwrap(), "a_1");
    let names: Vec<_> = cell.exports().map(|e| e.name().clone()).collect();
    assert_eq!(names, vec!["a", "a_1"]);
}

#[test]
fn duplicate_cell_names_are_rejected() {
    let mut lib = LibraryBuilder::new();
    lib.add_cell(Cell::new("a")).unwrap();
    assert_eq!(
        lib.add_cell(Cell::new("a")),
        Err(BuildError::DuplicateCell("a".into()))
    );
}

#[test]
fn topological_order_puts_children_first() {
    let mut lib = LibraryBuilder::new();
    let leaf = lib.add_cell(Cell::new("leaf")).unwrap();
    let mut mid = Cell::new("mid");
    mid.add_node(NodeInst::instance(leaf, Point::zero()));
    let mid = lib.add_cell(mid).unwrap();
    let mut top = Cell::new("top");
    top.add_node(NodeInst::instance(mid, Point::zero()));
    top.add_node(NodeInst::instance(leaf, Point::new(100, 0)));
    let top = lib.add_cell(top).unwrap();

    assert_eq!(lib.topological_order(), vec![leaf, mid, top]);
    assert_eq!(lib.cells_used_by([mid]), vec![mid, leaf]);
    assert!(lib.build().is_ok());
}

#[test]
fn dangling_arcs_fail_validation() {
    let mut cell = Cell::new("top");
    let a = cell.add_node(pin(0, 0));
    let b = cell.add_node(pin(10, 0));
    cell.add_arc(ArcInst::new(
        ArcProtoId(0),
        ArcEnd::new(a, "pin", Point::new(0, 0)),
        ArcEnd::new(b, "pin", Point::new(10, 0)),
        4,
    ));
    cell.nodes.shift_remove(&b);
    let mut lib = LibraryBuilder::new();
    lib.add_cell(cell).unwrap();
    assert_eq!(lib.build(), Err(BuildError::DanglingNode("top".into())));
}

#[test]
fn arc_geometry_queries() {
    let mut cell = Cell::new("top");
    let a = cell.add_node(pin(0, 0));
    let b = cell.add_node(pin(0, 10));
    let arc = ArcInst::new(
        ArcProtoId(0),
        ArcEnd::new(b, "pin", Point::new(0, 10)),
        ArcEnd::new(a, "pin", Point::new(0, 0)),
        4,
    );
    assert_eq!(arc.angle(), 900);
    assert_eq!(arc.length(), 10.);
    assert!(!arc.is_degenerate());
    assert_eq!(arc.end_on(a).map(|e| e.location), Some(Point::zero()));
}

#[test]
fn rotated_nodes_place_geometry() {
    let node = NodeInst::primitive(TemplateId(3), Point::new(100, 100), Dims::new(20, 10))
        .with_orientation(Orientation::from_angle(900));
    assert_eq!(node.bbox(), Rect::from_sides(95, 90, 105, 110));
    assert_eq!(node.place(Point::new(10, 0)), Point::new(100, 110));
}

#[test]
fn library_json_round_trip() {
    let mut lib = LibraryBuilder::new();
    let leaf = lib.add_cell(Cell::new("leaf")).unwrap();
    let mut top = Cell::new("top");
    let inst = top.add_node(NodeInst::instance(leaf, Point::new(3, 4)).with_name("x0"));
    top.add_export("io", inst, "a");
    lib.add_cell(top).unwrap();
    let lib = lib.build().unwrap();

    let json = serde_json::to_string(&lib).unwrap();
    let back: Library = serde_json::from_str(&json).unwrap();
    assert_eq!(back, lib);
    assert_eq!(back.try_cell_named("top").unwrap().num_nodes(), 1);
}
