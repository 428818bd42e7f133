//! Classification of the substrate process and active-layer handling.

use std::collections::HashSet;

use layir::{CellId, LibraryBuilder, NodeProto};
use serde::{Deserialize, Serialize};
use tech::{Doping, LayerFunction, LayerId, Technology};

use crate::config::{ActiveHandling, ValidatedOptions};

/// The substrate assumed under geometry with no explicit well.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Substrate {
    /// No P-well is drawn anywhere; P-type regions are implied.
    PType,
    /// No N-well or generic well is drawn anywhere; N-type regions are implied.
    NType,
    /// Both kinds of well are drawn, so nothing is implied.
    #[default]
    Unknown,
}

impl Substrate {
    /// The well doping implied wherever no well is drawn.
    pub fn implied_well(&self) -> Option<Doping> {
        match self {
            Substrate::PType => Some(Doping::P),
            Substrate::NType => Some(Doping::N),
            Substrate::Unknown => None,
        }
    }
}

/// Process-wide facts decided once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessInfo {
    pub substrate: Substrate,
    /// N and P active are folded onto a single layer.
    pub unify_active: bool,
    /// The layer that unified active geometry is folded onto.
    pub unified_diff: Option<LayerId>,
    /// Select and well surrounds are not checked.
    pub ignore_surrounds: bool,
}

#[derive(Debug, Default)]
struct Found {
    p_well: bool,
    n_well: bool,
    generic_well: bool,
}

impl Found {
    fn note(&mut self, function: LayerFunction) {
        match function {
            LayerFunction::Well(Doping::P) => self.p_well = true,
            LayerFunction::Well(Doping::N) => self.n_well = true,
            LayerFunction::GenericWell => self.generic_well = true,
            _ => {}
        }
    }
}

impl ProcessInfo {
    /// Scans the cells that a run starting at `root` will read.
    pub fn classify(
        tech: &Technology,
        options: &ValidatedOptions,
        library: &LibraryBuilder,
        root: CellId,
    ) -> Self {
        let mut found = Found::default();
        let mut visited = HashSet::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(cell) = library.try_cell(id) else {
                continue;
            };
            for (_, node) in cell.nodes() {
                match node.proto() {
                    NodeProto::Primitive(t) => {
                        for layer in tech.template(t).all_layers() {
                            found.note(tech.function(layer));
                        }
                    }
                    NodeProto::Cell(child) => {
                        let expand = library
                            .try_cell(child)
                            .is_some_and(|c| options.should_expand(c.name()));
                        if expand || options.recursive {
                            stack.push(child);
                        }
                    }
                }
            }
            for (_, arc) in cell.arcs() {
                for layer in tech.arc(arc.proto()).layers() {
                    found.note(tech.function(layer.layer));
                }
            }
        }

        let substrate = if !found.p_well {
            Substrate::PType
        } else if !found.n_well && !found.generic_well {
            Substrate::NType
        } else {
            Substrate::Unknown
        };

        let unify_active =
            options.active_handling == ActiveHandling::IgnoreNp || !tech.has_split_diff();
        let unified_diff = if unify_active {
            tech.layer_for(LayerFunction::DiffUnified)
                .or_else(|| tech.layers_with(|f| f.is_diff()).first().copied())
        } else {
            None
        };

        let info = Self {
            substrate,
            unify_active,
            unified_diff,
            ignore_surrounds: options.active_handling == ActiveHandling::IgnoreSurrounds,
        };
        tracing::debug!(
            substrate = ?info.substrate,
            unify_active = info.unify_active,
            ignore_surrounds = info.ignore_surrounds,
            "classified process"
        );
        info
    }
}

#[cfg(test)]
mod tests {
    use geometry::prelude::*;
    use layir::{Cell, NodeInst};
    use tech::testing::*;

    use super::*;
    use crate::config::ExtractOptions;

    fn rect_on(tech: &Technology, layer: LayerId, rect: Rect) -> NodeInst {
        let template = tech.pure_layer_template(layer).unwrap();
        NodeInst::primitive(template, rect.center(), rect.dims())
    }

    fn classify(cell: Cell, options: ExtractOptions) -> ProcessInfo {
        let tech = test_tech();
        let mut lib = LibraryBuilder::new();
        let root = lib.add_cell(cell).unwrap();
        ProcessInfo::classify(&tech, &options.validate().unwrap(), &lib, root)
    }

    fn with_wells(wells: &[LayerId]) -> Cell {
        let tech = test_tech();
        let mut cell = Cell::new("top");
        cell.add_node(rect_on(&tech, NDIFF, Rect::from_sides(0, 0, 10, 10)));
        for (i, well) in wells.iter().enumerate() {
            let x = 20 * i as i64;
            cell.add_node(rect_on(&tech, *well, Rect::from_sides(x, 0, x + 10, 10)));
        }
        cell
    }

    #[test]
    fn substrate_follows_drawn_wells() {
        let cases = [
            (vec![], Substrate::PType),
            (vec![NWELL], Substrate::PType),
            (vec![PWELL], Substrate::NType),
            (vec![PWELL, NWELL], Substrate::Unknown),
        ];
        for (wells, expected) in cases {
            let info = classify(with_wells(&wells), ExtractOptions::default());
            assert_eq!(info.substrate, expected, "wells {wells:?}");
        }
        assert_eq!(Substrate::PType.implied_well(), Some(Doping::P));
        assert_eq!(Substrate::Unknown.implied_well(), None);
    }

    #[test]
    fn active_handling_sets_process_flags() {
        let strict = classify(with_wells(&[]), ExtractOptions::default());
        assert!(!strict.unify_active);
        assert!(!strict.ignore_surrounds);
        assert_eq!(strict.unified_diff, None);

        let options = ExtractOptions {
            active_handling: ActiveHandling::IgnoreNp,
            ..Default::default()
        };
        let unified = classify(with_wells(&[]), options);
        assert!(unified.unify_active);
        assert_eq!(unified.unified_diff, Some(NDIFF));

        let options = ExtractOptions {
            active_handling: ActiveHandling::IgnoreSurrounds,
            ..Default::default()
        };
        let bare = classify(with_wells(&[]), options);
        assert!(bare.ignore_surrounds);
        assert!(!bare.unify_active);
    }

    #[test]
    fn wells_in_subcells_count_only_when_read() {
        let tech = test_tech();
        let mut lib = LibraryBuilder::new();
        let child = lib.add_cell(with_wells(&[PWELL])).unwrap();
        let mut top = Cell::new("parent");
        top.add_node(NodeInst::instance(child, Point::zero()).with_name("x0"));
        let root = lib.add_cell(top).unwrap();

        let run = |options: ExtractOptions| {
            ProcessInfo::classify(&tech, &options.validate().unwrap(), &lib, root).substrate
        };
        assert_eq!(run(ExtractOptions::default()), Substrate::PType);
        let recursive = ExtractOptions {
            recursive: true,
            ..Default::default()
        };
        assert_eq!(run(recursive), Substrate::NType);
        let expanded = ExtractOptions {
            expand_patterns: vec!["top".into()],
            ..Default::default()
        };
        assert_eq!(run(expanded), Substrate::NType);
    }
}
