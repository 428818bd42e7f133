//! Electrical networks of an extracted cell.

use std::collections::{BTreeSet, HashMap};

use arcstr::ArcStr;
use layir::{Cell, LibraryBuilder, NodeId, NodeProto};
use tech::{NodeKind, Technology};

use crate::shapes::node_ports;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub(crate) struct NetKey(u32);

type NetUf = ena::unify::InPlaceUnificationTable<NetKey>;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub(crate) enum NamePriority {
    #[default]
    Unnamed = 0,
    Placeholder = 1,
    Export = 2,
}

/// The value associated with a net in the union find structure.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub(crate) struct NetValue {
    /// The best kind of name among all exports of the merged net.
    priority: NamePriority,
    /// The export that provides `priority`; the least name wins ties.
    name: Option<ArcStr>,
}

impl ena::unify::UnifyKey for NetKey {
    type Value = NetValue;
    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        Self(u)
    }

    fn tag() -> &'static str {
        "NetKey"
    }
}

impl ena::unify::UnifyValue for NetValue {
    type Error = ena::unify::NoError;

    fn unify_values(value1: &Self, value2: &Self) -> std::result::Result<Self, Self::Error> {
        let better = match value1.priority.cmp(&value2.priority) {
            std::cmp::Ordering::Greater => value1,
            std::cmp::Ordering::Less => value2,
            std::cmp::Ordering::Equal if value1.name <= value2.name => value1,
            std::cmp::Ordering::Equal => value2,
        };
        Ok(better.clone())
    }
}

/// Which node ports of a cell are electrically connected.
pub(crate) struct Nets {
    keys: HashMap<(NodeId, ArcStr), NetKey>,
    uf: NetUf,
}

impl Nets {
    /// Computes the networks of `cell`.
    ///
    /// Pins, contacts and pure-layer nodes connect all of their ports. A
    /// transistor connects its gate ports. Wires connect their two ends.
    pub(crate) fn build(
        tech: &Technology,
        library: &LibraryBuilder,
        cell: &Cell,
        placeholder_prefix: &str,
    ) -> Self {
        let mut nets = Self {
            keys: HashMap::new(),
            uf: NetUf::new(),
        };
        for (id, node) in cell.nodes() {
            let ports = node_ports(library, tech, node);
            let mut joined: Vec<ArcStr> = Vec::new();
            for port in &ports {
                nets.register(id, &port.name);
            }
            if let NodeProto::Primitive(t) = node.proto() {
                match tech.template(t).kind() {
                    NodeKind::Pin | NodeKind::Contact | NodeKind::PureLayer(_) => {
                        joined = ports.iter().map(|p| p.name.clone()).collect();
                    }
                    NodeKind::Transistor(_) => {
                        joined = ports
                            .iter()
                            .filter(|p| {
                                p.arcs
                                    .iter()
                                    .any(|a| tech.function(tech.arc(*a).primary_layer()).is_poly())
                            })
                            .map(|p| p.name.clone())
                            .collect();
                    }
                    NodeKind::Resistor | NodeKind::Capacitor => {}
                }
            }
            for pair in joined.windows(2) {
                nets.join((id, &pair[0]), (id, &pair[1]));
            }
        }
        for (_, arc) in cell.arcs() {
            nets.join(
                (arc.head().node, arc.head().port.as_str()),
                (arc.tail().node, arc.tail().port.as_str()),
            );
        }
        for export in cell.exports() {
            let priority = if export.name().starts_with(placeholder_prefix) {
                NamePriority::Placeholder
            } else {
                NamePriority::Export
            };
            let key = nets.register(export.node(), export.port());
            nets.uf.union_value(
                key,
                NetValue {
                    priority,
                    name: Some(export.name().clone()),
                },
            );
        }
        nets
    }

    fn register(&mut self, node: NodeId, port: &str) -> NetKey {
        let key = (node, ArcStr::from(port));
        if let Some(k) = self.keys.get(&key) {
            return *k;
        }
        let k = self.uf.new_key(NetValue::default());
        self.keys.insert(key, k);
        k
    }

    fn join(&mut self, a: (NodeId, &str), b: (NodeId, &str)) {
        let a = self.register(a.0, a.1);
        let b = self.register(b.0, b.1);
        self.uf.union(a, b);
    }

    /// The net of a node port, if the port is known.
    pub(crate) fn net(&mut self, node: NodeId, port: &str) -> Option<NetKey> {
        let k = *self.keys.get(&(node, ArcStr::from(port)))?;
        Some(self.uf.find(k))
    }

    /// The best real export name on the net of a node port.
    pub(crate) fn export_name(&mut self, node: NodeId, port: &str) -> Option<ArcStr> {
        let k = self.net(node, port)?;
        let value = self.uf.probe_value(k);
        (value.priority == NamePriority::Export)
            .then_some(value.name)
            .flatten()
    }

    /// The number of distinct nets among the given node ports.
    pub(crate) fn count<'a>(&mut self, ports: impl IntoIterator<Item = (NodeId, &'a str)>) -> usize {
        ports
            .into_iter()
            .filter_map(|(n, p)| self.net(n, p))
            .collect::<BTreeSet<_>>()
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geometry::prelude::*;
    use layir::{ArcEnd, ArcInst, NodeInst};
    use tech::testing::*;

    #[test]
    fn wires_and_contacts_join_nets() {
        let tech = test_tech();
        let lib = LibraryBuilder::new();
        let mut cell = Cell::new("nets");
        let a = cell.add_node(NodeInst::primitive(METAL1_PIN, Point::new(0, 0), Dims::default()));
        let b = cell.add_node(NodeInst::primitive(VIA12, Point::new(40, 0), Dims::square(8)));
        let c = cell.add_node(NodeInst::primitive(METAL2_PIN, Point::new(80, 0), Dims::default()));
        let d = cell.add_node(NodeInst::primitive(METAL2_PIN, Point::new(0, 80), Dims::default()));
        cell.add_arc(ArcInst::new(
            METAL1_ARC,
            ArcEnd::new(a, "pin", Point::new(0, 0)),
            ArcEnd::new(b, "con", Point::new(40, 0)),
            6,
        ));
        cell.add_arc(ArcInst::new(
            METAL2_ARC,
            ArcEnd::new(b, "con", Point::new(40, 0)),
            ArcEnd::new(c, "pin", Point::new(80, 0)),
            6,
        ));
        cell.add_export("out", c, "pin");
        cell.add_export("__p0", d, "pin");

        let mut nets = Nets::build(&tech, &lib, &cell, "__p");
        assert_eq!(nets.net(a, "pin"), nets.net(c, "pin"));
        assert_ne!(nets.net(a, "pin"), nets.net(d, "pin"));
        assert_eq!(nets.export_name(a, "pin"), Some(ArcStr::from("out")));
        assert_eq!(nets.export_name(d, "pin"), None);
        assert_eq!(nets.count([(a, "pin"), (b, "con"), (d, "pin")]), 2);
    }

    #[test]
    fn transistor_diffusion_ports_stay_apart() {
        let tech = test_tech();
        let lib = LibraryBuilder::new();
        let mut cell = Cell::new("mos");
        let m = cell.add_node(NodeInst::primitive(NMOS, Point::zero(), Dims::new(20, 16)));
        let mut nets = Nets::build(&tech, &lib, &cell, "__p");
        assert_eq!(nets.net(m, "g"), nets.net(m, "g2"));
        assert_ne!(nets.net(m, "s"), nets.net(m, "d"));
    }
}
