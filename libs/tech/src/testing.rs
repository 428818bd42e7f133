//! A small two-metal CMOS technology for tests.

use geometry::prelude::*;

use crate::{
    ArcLayer, ArcProto, ArcProtoId, CutRule, Doping, Layer, LayerFunction, LayerId, NodeKind,
    NodeTemplate, TemplateId, Technology,
};

pub const METAL1: LayerId = LayerId(0);
pub const METAL2: LayerId = LayerId(1);
pub const POLY: LayerId = LayerId(2);
pub const NDIFF: LayerId = LayerId(3);
pub const PDIFF: LayerId = LayerId(4);
pub const NSELECT: LayerId = LayerId(5);
pub const PSELECT: LayerId = LayerId(6);
pub const NWELL: LayerId = LayerId(7);
pub const PWELL: LayerId = LayerId(8);
pub const CONTACT: LayerId = LayerId(9);
pub const VIA1: LayerId = LayerId(10);
/// A second drawing layer with the same function as [`METAL1`].
pub const METAL1_ALT: LayerId = LayerId(11);

pub const METAL1_ARC: ArcProtoId = ArcProtoId(0);
pub const METAL2_ARC: ArcProtoId = ArcProtoId(1);
pub const POLY_ARC: ArcProtoId = ArcProtoId(2);
pub const NACTIVE_ARC: ArcProtoId = ArcProtoId(3);
pub const PACTIVE_ARC: ArcProtoId = ArcProtoId(4);

pub const METAL1_PIN: TemplateId = TemplateId(0);
pub const METAL2_PIN: TemplateId = TemplateId(1);
pub const POLY_PIN: TemplateId = TemplateId(2);
pub const NACTIVE_PIN: TemplateId = TemplateId(3);
pub const PACTIVE_PIN: TemplateId = TemplateId(4);
pub const POLY_CONTACT: TemplateId = TemplateId(5);
pub const NDIFF_CONTACT: TemplateId = TemplateId(6);
pub const PDIFF_CONTACT: TemplateId = TemplateId(7);
pub const VIA12: TemplateId = TemplateId(8);
pub const NMOS: TemplateId = TemplateId(9);
pub const PMOS: TemplateId = TemplateId(10);
pub const POLY_RES: TemplateId = TemplateId(11);

/// Wire width of both metals.
pub const METAL_WIDTH: i64 = 6;
/// Wire width of poly.
pub const POLY_WIDTH: i64 = 4;
/// Cut edge length.
pub const CUT_SIZE: i64 = 4;
/// Cut edge-to-edge spacing.
pub const CUT_SPACING: i64 = 4;

fn cut_rule(layer: LayerId) -> CutRule {
    CutRule {
        layer,
        size: CUT_SIZE,
        spacing: CUT_SPACING,
        inset: 2,
    }
}

fn pin(name: &str, arc: ArcProtoId) -> NodeTemplate {
    NodeTemplate::new(name, NodeKind::Pin, Dims::default()).with_port(
        "pin",
        vec![arc],
        Sides::default(),
    )
}

fn diff_contact(name: &str, diff: LayerId, select: LayerId, well: LayerId, arc: ArcProtoId) -> NodeTemplate {
    NodeTemplate::new(name, NodeKind::Contact, Dims::square(8))
        .with_layer(METAL1, Sides::default())
        .with_layer(diff, Sides::default())
        .with_layer(select, Sides::uniform(-4))
        .with_layer(well, Sides::uniform(-8))
        .with_cuts(cut_rule(CONTACT))
        .with_port("con", vec![METAL1_ARC, arc], Sides::default())
}

/// A MOS transistor whose poly runs along x and active along y.
///
/// The gate is 12 wide and 4 long; poly extends 4 past the active on each
/// side and active extends 6 past the gate. An upright transistor is drawn
/// a quarter turn around, with poly along y.
fn mos(
    name: &str,
    doping: Doping,
    diff: LayerId,
    select: LayerId,
    well: LayerId,
    arc: ArcProtoId,
    upright: bool,
) -> NodeTemplate {
    let side = |inset: Sides<i64>| if upright { inset.rotate(Rotation::R90) } else { inset };
    let size = if upright {
        Dims::new(16, 20)
    } else {
        Dims::new(20, 16)
    };
    NodeTemplate::new(name, NodeKind::Transistor(doping), size)
        .with_layer(POLY, side(Sides::new(0, 6, 0, 6)))
        .with_layer(diff, side(Sides::new(4, 0, 4, 0)))
        .with_layer(select, side(Sides::new(0, -4, 0, -4)))
        .with_layer(well, side(Sides::new(-4, -8, -4, -8)))
        .with_port("g", vec![POLY_ARC], side(Sides::new(0, 6, 16, 6)))
        .with_port("g2", vec![POLY_ARC], side(Sides::new(16, 6, 0, 6)))
        .with_port("s", vec![arc], side(Sides::new(4, 0, 4, 10)))
        .with_port("d", vec![arc], side(Sides::new(4, 10, 4, 0)))
}

/// Builds the test technology.
pub fn test_tech() -> Technology {
    build(false)
}

/// The test technology with its transistors drawn poly-vertical.
///
/// Template, layer and wire IDs match [`test_tech`].
pub fn upright_tech() -> Technology {
    build(true)
}

fn build(upright: bool) -> Technology {
    let layers = vec![
        Layer::new("metal1", LayerFunction::Metal(1)),
        Layer::new("metal2", LayerFunction::Metal(2)),
        Layer::new("poly", LayerFunction::Poly(1)),
        Layer::new("ndiff", LayerFunction::Diff(Doping::N)),
        Layer::new("pdiff", LayerFunction::Diff(Doping::P)),
        Layer::new("nselect", LayerFunction::Select(Doping::N)),
        Layer::new("pselect", LayerFunction::Select(Doping::P)),
        Layer::new("nwell", LayerFunction::Well(Doping::N)),
        Layer::new("pwell", LayerFunction::Well(Doping::P)),
        Layer::new("contact", LayerFunction::Contact(1)),
        Layer::new("via1", LayerFunction::Contact(2)),
        Layer::new("metal1-alt", LayerFunction::Metal(1)),
    ];

    let active = |name: &str, diff, select, well, pin| {
        ArcProto::new(
            name,
            vec![
                ArcLayer {
                    layer: diff,
                    width_offset: 0,
                },
                ArcLayer {
                    layer: select,
                    width_offset: 8,
                },
                ArcLayer {
                    layer: well,
                    width_offset: 16,
                },
            ],
            6,
            900,
            pin,
        )
    };
    let single = |name: &str, layer, width, angle, pin| {
        ArcProto::new(
            name,
            vec![ArcLayer {
                layer,
                width_offset: 0,
            }],
            width,
            angle,
            pin,
        )
    };
    let arcs = vec![
        single("metal-1", METAL1, METAL_WIDTH, 450, METAL1_PIN),
        single("metal-2", METAL2, METAL_WIDTH, 450, METAL2_PIN),
        single("poly", POLY, POLY_WIDTH, 900, POLY_PIN),
        active("n-active", NDIFF, NSELECT, PWELL, NACTIVE_PIN),
        active("p-active", PDIFF, PSELECT, NWELL, PACTIVE_PIN),
    ];

    let templates = vec![
        pin("metal-1-pin", METAL1_ARC),
        pin("metal-2-pin", METAL2_ARC),
        pin("poly-pin", POLY_ARC),
        pin("n-active-pin", NACTIVE_ARC),
        pin("p-active-pin", PACTIVE_ARC),
        NodeTemplate::new("metal-1-poly-con", NodeKind::Contact, Dims::square(8))
            .with_layer(METAL1, Sides::default())
            .with_layer(POLY, Sides::default())
            .with_cuts(cut_rule(CONTACT))
            .with_port("con", vec![METAL1_ARC, POLY_ARC], Sides::default()),
        diff_contact("metal-1-n-active-con", NDIFF, NSELECT, PWELL, NACTIVE_ARC),
        diff_contact("metal-1-p-active-con", PDIFF, PSELECT, NWELL, PACTIVE_ARC),
        NodeTemplate::new("metal-1-metal-2-con", NodeKind::Contact, Dims::square(8))
            .with_layer(METAL1, Sides::default())
            .with_layer(METAL2, Sides::default())
            .with_cuts(cut_rule(VIA1))
            .with_port("con", vec![METAL1_ARC, METAL2_ARC], Sides::default()),
        mos("nmos", Doping::N, NDIFF, NSELECT, PWELL, NACTIVE_ARC, upright),
        mos("pmos", Doping::P, PDIFF, PSELECT, NWELL, PACTIVE_ARC, upright),
        NodeTemplate::new("poly-res", NodeKind::Resistor, Dims::new(12, 4))
            .with_layer(POLY, Sides::default())
            .with_port("a", vec![POLY_ARC], Sides::new(0, 0, 8, 0))
            .with_port("b", vec![POLY_ARC], Sides::new(8, 0, 0, 0)),
    ];

    match Technology::new("cmos2", layers, templates, arcs) {
        Ok(tech) => tech,
        Err(e) => panic!("test technology is invalid: {e}"),
    }
}
