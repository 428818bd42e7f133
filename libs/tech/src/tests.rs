use geometry::prelude::*;
use test_log::test;

use crate::testing::*;
use crate::*;

#[test]
fn test_tech_is_valid() {
    let tech = test_tech();
    assert_eq!(tech.find_layer("poly"), Some(POLY));
    assert_eq!(tech.find_template("nmos"), Some(NMOS));
    assert_eq!(tech.find_arc("metal-2"), Some(METAL2_ARC));
    assert!(tech.has_split_diff());
    assert_eq!(tech.arc(NACTIVE_ARC).primary_layer(), NDIFF);
}

#[test]
fn every_layer_gets_a_pure_layer_template() {
    let tech = test_tech();
    for (id, _) in tech.layers() {
        let template = tech.pure_layer_template(id).expect("pure-layer template");
        assert_eq!(tech.template(template).kind(), NodeKind::PureLayer(id));
        assert!(tech.template(template).kind().is_dissolvable());
    }
    let m1 = tech.pure_layer_template(METAL1).unwrap();
    assert_eq!(tech.template(m1).ports()[0].arcs, vec![METAL1_ARC]);
}

#[test]
fn aliased_layers_are_canonicalized() {
    let tech = test_tech();
    assert_eq!(tech.canonical_layer(METAL1_ALT), METAL1);
    assert_eq!(tech.canonical_layer(METAL2), METAL2);
}

#[test]
fn contact_geometry_at_default_size() {
    let tech = test_tech();
    let rects = tech.template(VIA12).layer_rects(Dims::square(8));
    let cuts: Vec<_> = rects.iter().filter(|(l, _)| *l == VIA1).collect();
    assert_eq!(cuts.len(), 1);
    assert_eq!(cuts[0].1, Rect::from_sides(-2, -2, 2, 2));
    assert!(rects.contains(&(METAL1, Rect::from_sides(-4, -4, 4, 4))));
}

#[test]
fn multi_cut_contact_geometry() {
    let tech = test_tech();
    let rule = *tech.template(VIA12).cuts().unwrap();
    let width = rule.node_extent(2);
    assert_eq!(width, 16);
    let cuts = rule.cut_rects(Rect::from_sides(0, 0, width, 8));
    assert_eq!(
        cuts,
        vec![Rect::from_sides(2, 2, 6, 6), Rect::from_sides(10, 2, 14, 6)]
    );
}

#[test]
fn transistor_ports_sit_on_layer_ends() {
    let tech = test_tech();
    let nmos = tech.template(NMOS);
    let size = nmos.default_size();
    let g = nmos.port_rect(nmos.port("g").unwrap(), size);
    assert_eq!(g, Rect::from_sides(-10, -2, -6, 2));
    let d = nmos.port_rect(nmos.port("d").unwrap(), size);
    assert_eq!(d, Rect::from_sides(-6, 2, 6, 8));
    assert_eq!(nmos.distinct_layer_count(), 4);
}

#[test]
fn pins_have_point_ports() {
    let tech = test_tech();
    let pin = tech.template(METAL1_PIN);
    let port = &pin.ports()[0];
    assert_eq!(pin.port_rect(port, pin.default_size()), Rect::from_point(Point::zero()));
}

#[test]
fn rejects_dangling_layers() {
    let err = Technology::new(
        "bad",
        vec![Layer::new("m1", LayerFunction::Metal(1))],
        vec![NodeTemplate::new("blob", NodeKind::Contact, Dims::square(4))
            .with_layer(LayerId(3), Sides::default())],
        vec![],
    )
    .unwrap_err();
    assert!(matches!(err, TechError::UnknownLayer { layer: LayerId(3), .. }));
}

#[test]
fn rejects_arcs_without_pins() {
    let err = Technology::new(
        "bad",
        vec![Layer::new("m1", LayerFunction::Metal(1))],
        vec![],
        vec![ArcProto::new(
            "m1",
            vec![ArcLayer {
                layer: LayerId(0),
                width_offset: 0,
            }],
            4,
            900,
            TemplateId(0),
        )],
    )
    .unwrap_err();
    assert_eq!(
        err,
        TechError::InvalidPin {
            arc: "m1".into(),
            pin: TemplateId(0)
        }
    );
}

#[test]
fn loads_from_toml() {
    let src = r#"
name = "tiny"

[[layers]]
name = "m1"
function = { metal = 1 }

[[layers]]
name = "cut"
function = { contact = 1 }

[[templates]]
name = "m1-pin"
kind = "pin"
default_size = { w = 0, h = 0 }
ports = [{ name = "pin", arcs = [0] }]

[[arcs]]
name = "m1"
layers = [{ layer = 0 }]
default_width = 3
pin = 0
"#;
    let tech: Technology = toml::from_str(src).unwrap();
    assert_eq!(tech.arc(ArcProtoId(0)).angle_increment(), 900);
    assert_eq!(tech.function(LayerId(1)), LayerFunction::Contact(1));
    assert!(tech.pure_layer_template(LayerId(1)).is_some());
}

#[test]
fn json_round_trip_is_stable() {
    let tech = test_tech();
    let json = serde_json::to_string(&tech).unwrap();
    let back: Technology = serde_json::from_str(&json).unwrap();
    assert_eq!(back, tech);
}
