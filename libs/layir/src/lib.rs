//! A layout IR of placed nodes, wires, and exports.
//!
//! A [`Cell`] is an arena of [`NodeInst`]s (primitive devices, pins, pure-layer
//! shapes, and instances of other cells) connected by [`ArcInst`]s. Arcs refer
//! to their endpoint nodes by [`NodeId`]; there are no back references.

pub mod id;
pub mod names;

use std::collections::{HashMap, HashSet, VecDeque};
use std::ops::Deref;

use arcstr::ArcStr;
use geometry::prelude::*;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tech::{ArcProtoId, TemplateId};

use crate::id::Id;
use crate::names::Names;

#[cfg(test)]
mod tests;

pub struct Cells;

// The reason this uses [`Cells`] instead of [`Cell`]
// is so that cell IDs are not tied to the cell contents type.
pub type CellId = Id<Cells>;
pub type NodeId = Id<NodeInst>;
pub type ArcId = Id<ArcInst>;

/// An error building a library.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// A cell with this name already exists.
    #[error("a cell named `{0}` already exists")]
    DuplicateCell(ArcStr),
    /// A node instantiates a cell that is not in the library.
    #[error("cell `{cell}` instantiates a missing cell {child}")]
    MissingChild { cell: ArcStr, child: CellId },
    /// A wire or export refers to a node that is not in its cell.
    #[error("cell `{0}` refers to a missing node")]
    DanglingNode(ArcStr),
    /// The cell hierarchy contains a cycle.
    #[error("cell `{0}` instantiates itself")]
    Cycle(ArcStr),
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct LibraryBuilder {
    cell_id: CellId,
    cells: IndexMap<CellId, Cell>,
    name_map: HashMap<ArcStr, CellId>,
}

/// A validated library.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LibraryBuilder")]
pub struct Library(LibraryBuilder);

/// What a node instantiates.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeProto {
    /// A primitive template of the technology.
    Primitive(TemplateId),
    /// Another cell of the library.
    Cell(CellId),
}

/// A placed node.
///
/// For primitives, `center` is the center of the node's bounding box and
/// `size` its unrotated dimensions. For cell instances, `center` is the
/// location of the child's origin.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct NodeInst {
    name: ArcStr,
    proto: NodeProto,
    center: Point,
    size: Dims,
    orientation: Orientation,
    /// An explicit outline (pure-layer shapes, non-Manhattan contacts) or gate
    /// path (serpentine transistors), in absolute coordinates.
    trace: Option<Vec<Point>>,
}

/// One end of a wire.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ArcEnd {
    pub node: NodeId,
    pub port: ArcStr,
    pub location: Point,
}

/// A straight wire between two node ports.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ArcInst {
    proto: ArcProtoId,
    head: ArcEnd,
    tail: ArcEnd,
    width: i64,
    head_extended: bool,
    tail_extended: bool,
}

/// A named port of a cell, bound to a port of one of its nodes.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Export {
    name: ArcStr,
    node: NodeId,
    port: ArcStr,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    name: ArcStr,
    node_id: NodeId,
    nodes: IndexMap<NodeId, NodeInst>,
    node_names: Names,
    arc_id: ArcId,
    arcs: IndexMap<ArcId, ArcInst>,
    exports: IndexMap<ArcStr, Export>,
}

impl Default for LibraryBuilder {
    fn default() -> Self {
        Self {
            cell_id: Id::new(),
            name_map: Default::default(),
            cells: Default::default(),
        }
    }
}

impl LibraryBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a cell to the library.
    ///
    /// Fails if a cell with the same name already exists.
    pub fn add_cell(&mut self, cell: Cell) -> Result<CellId, BuildError> {
        if self.name_map.contains_key(&cell.name) {
            return Err(BuildError::DuplicateCell(cell.name.clone()));
        }
        let id = self.cell_id.alloc();
        self.name_map.insert(cell.name.clone(), id);
        self.cells.insert(id, cell);
        Ok(id)
    }

    /// Gets the cell with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if no cell has the given ID.
    pub fn cell(&self, id: CellId) -> &Cell {
        self.cells.get(&id).unwrap()
    }

    pub fn try_cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(&id)
    }

    pub fn try_cell_mut(&mut self, id: CellId) -> Option<&mut Cell> {
        self.cells.get_mut(&id)
    }

    pub fn try_cell_named(&self, name: &str) -> Option<&Cell> {
        self.try_cell(*self.name_map.get(name)?)
    }

    /// Gets the cell ID corresponding to the given name.
    pub fn try_cell_id_named(&self, name: &str) -> Option<CellId> {
        self.name_map.get(name).copied()
    }

    /// Iterates over the `(id, cell)` pairs in this library.
    pub fn cells(&self) -> impl Iterator<Item = (CellId, &Cell)> {
        self.cells.iter().map(|(id, cell)| (*id, cell))
    }

    /// Returns cell IDs in topological order, children first.
    pub fn topological_order(&self) -> Vec<CellId> {
        let mut state = IndexSet::new();
        for (cell, _) in self.cells() {
            self.dfs_postorder(cell, &mut state);
        }
        state.into_iter().collect()
    }

    fn dfs_postorder(&self, id: CellId, state: &mut IndexSet<CellId>) {
        if state.contains(&id) {
            return;
        }
        let Some(cell) = self.try_cell(id) else {
            return;
        };
        for child in cell.children() {
            self.dfs_postorder(child, state);
        }
        state.insert(id);
    }

    /// The cell IDs instantiated by the given root cells, including the roots.
    pub fn cells_used_by(&self, roots: impl IntoIterator<Item = CellId>) -> Vec<CellId> {
        let mut stack = VecDeque::new();
        let mut visited = IndexSet::new();
        stack.extend(roots);

        while let Some(id) = stack.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            if let Some(cell) = self.try_cell(id) {
                stack.extend(cell.children());
            }
        }

        visited.into_iter().collect()
    }

    fn validate(&self) -> Result<(), BuildError> {
        for (_, cell) in self.cells() {
            for (_, node) in cell.nodes() {
                if let NodeProto::Cell(child) = node.proto {
                    if !self.cells.contains_key(&child) {
                        return Err(BuildError::MissingChild {
                            cell: cell.name.clone(),
                            child,
                        });
                    }
                }
            }
            let dangling = cell.arcs().any(|(_, arc)| {
                !cell.nodes.contains_key(&arc.head.node) || !cell.nodes.contains_key(&arc.tail.node)
            }) || cell
                .exports()
                .any(|export| !cell.nodes.contains_key(&export.node));
            if dangling {
                return Err(BuildError::DanglingNode(cell.name.clone()));
            }
        }

        // Every cell reachable from itself is part of a cycle.
        let mut on_stack = HashSet::new();
        let mut done = HashSet::new();
        for (id, _) in self.cells() {
            self.check_acyclic(id, &mut on_stack, &mut done)?;
        }
        Ok(())
    }

    fn check_acyclic(
        &self,
        id: CellId,
        on_stack: &mut HashSet<CellId>,
        done: &mut HashSet<CellId>,
    ) -> Result<(), BuildError> {
        if done.contains(&id) {
            return Ok(());
        }
        let cell = self.cell(id);
        if !on_stack.insert(id) {
            return Err(BuildError::Cycle(cell.name.clone()));
        }
        for child in cell.children() {
            self.check_acyclic(child, on_stack, done)?;
        }
        on_stack.remove(&id);
        done.insert(id);
        Ok(())
    }

    pub fn build(self) -> Result<Library, BuildError> {
        self.validate()?;
        Ok(Library(self))
    }
}

impl TryFrom<LibraryBuilder> for Library {
    type Error = BuildError;

    fn try_from(value: LibraryBuilder) -> Result<Self, Self::Error> {
        value.build()
    }
}

impl Deref for Library {
    type Target = LibraryBuilder;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Library {
    /// Converts the library back into a builder for modification.
    pub fn into_builder(self) -> LibraryBuilder {
        self.0
    }
}

impl Cell {
    pub fn new(name: impl Into<ArcStr>) -> Self {
        Self {
            name: name.into(),
            node_id: Id::new(),
            nodes: Default::default(),
            node_names: Default::default(),
            arc_id: Id::new(),
            arcs: Default::default(),
            exports: Default::default(),
        }
    }

    /// The name of the cell.
    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// The cells instantiated directly by this cell, without duplicates.
    pub fn children(&self) -> impl Iterator<Item = CellId> + '_ {
        let mut seen = HashSet::new();
        self.nodes.values().filter_map(move |node| match node.proto {
            NodeProto::Cell(child) if seen.insert(child) => Some(child),
            _ => None,
        })
    }

    /// Adds a node, making its name unique within the cell.
    pub fn add_node(&mut self, mut node: NodeInst) -> NodeId {
        let id = self.node_id.alloc();
        let base = if node.name.is_empty() {
            arcstr::literal!("node")
        } else {
            node.name.clone()
        };
        node.name = self.node_names.assign(&base);
        self.nodes.insert(id, node);
        id
    }

    /// Gets the node with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if no node has the given ID.
    #[inline]
    pub fn node(&self, id: NodeId) -> &NodeInst {
        self.nodes.get(&id).unwrap()
    }

    #[inline]
    pub fn try_node(&self, id: NodeId) -> Option<&NodeInst> {
        self.nodes.get(&id)
    }

    pub fn try_node_mut(&mut self, id: NodeId) -> Option<&mut NodeInst> {
        self.nodes.get_mut(&id)
    }

    pub fn try_node_named(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, n)| n.name.as_str() == name)
            .map(|(id, _)| *id)
    }

    /// Iterates over the nodes of this cell in insertion order.
    #[inline]
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &NodeInst)> {
        self.nodes.iter().map(|x| (*x.0, x.1))
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Removes a node together with the wires and exports attached to it.
    pub fn remove_node(&mut self, id: NodeId) -> Option<NodeInst> {
        let node = self.nodes.shift_remove(&id)?;
        self.node_names.release(&node.name);
        self.arcs
            .retain(|_, arc| arc.head.node != id && arc.tail.node != id);
        self.exports.retain(|_, export| export.node != id);
        Some(node)
    }

    pub fn add_arc(&mut self, arc: ArcInst) -> ArcId {
        let id = self.arc_id.alloc();
        self.arcs.insert(id, arc);
        id
    }

    /// Gets the wire with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if no wire has the given ID.
    #[inline]
    pub fn arc(&self, id: ArcId) -> &ArcInst {
        self.arcs.get(&id).unwrap()
    }

    #[inline]
    pub fn try_arc(&self, id: ArcId) -> Option<&ArcInst> {
        self.arcs.get(&id)
    }

    pub fn try_arc_mut(&mut self, id: ArcId) -> Option<&mut ArcInst> {
        self.arcs.get_mut(&id)
    }

    #[inline]
    pub fn arcs(&self) -> impl Iterator<Item = (ArcId, &ArcInst)> {
        self.arcs.iter().map(|x| (*x.0, x.1))
    }

    pub fn num_arcs(&self) -> usize {
        self.arcs.len()
    }

    pub fn remove_arc(&mut self, id: ArcId) -> Option<ArcInst> {
        self.arcs.shift_remove(&id)
    }

    /// The wires attached to the given node.
    pub fn arcs_on(&self, node: NodeId) -> Vec<ArcId> {
        self.arcs()
            .filter(|(_, arc)| arc.head.node == node || arc.tail.node == node)
            .map(|(id, _)| id)
            .collect()
    }

    /// Adds an export, making its name unique within the cell.
    ///
    /// Returns the assigned name.
    pub fn add_export(&mut self, name: &str, node: NodeId, port: impl Into<ArcStr>) -> ArcStr {
        let name = self.unique_export_name(name);
        self.exports.insert(
            name.clone(),
            Export {
                name: name.clone(),
                node,
                port: port.into(),
            },
        );
        name
    }

    /// A name based on `base` that no export of this cell uses.
    pub fn unique_export_name(&self, base: &str) -> ArcStr {
        if !self.exports.contains_key(base) {
            return base.into();
        }
        let mut i = 1;
        loop {
            let candidate = arcstr::format!("{}_{}", base, i);
            if !self.exports.contains_key(&candidate) {
                return candidate;
            }
            i += 1;
        }
    }

    #[inline]
    pub fn try_export(&self, name: &str) -> Option<&Export> {
        self.exports.get(name)
    }

    #[inline]
    pub fn exports(&self) -> impl Iterator<Item = &Export> {
        self.exports.values()
    }

    /// The exports bound to the given node.
    pub fn exports_on(&self, node: NodeId) -> Vec<&Export> {
        self.exports().filter(|e| e.node == node).collect()
    }

    pub fn remove_export(&mut self, name: &str) -> Option<Export> {
        self.exports.shift_remove(name)
    }

    /// Renames an export, uniquifying the new name.
    ///
    /// Returns the assigned name, or `None` if no export is named `old`.
    pub fn rename_export(&mut self, old: &str, new: &str) -> Option<ArcStr> {
        let index = self.exports.get_index_of(old)?;
        let (_, mut export) = self.exports.shift_remove_index(index)?;
        let name = self.unique_export_name(new);
        export.name = name.clone();
        self.exports.shift_insert(index, name.clone(), export);
        Some(name)
    }
}

impl NodeInst {
    /// Creates an unrotated primitive node.
    pub fn primitive(template: TemplateId, center: Point, size: Dims) -> Self {
        Self {
            name: ArcStr::new(),
            proto: NodeProto::Primitive(template),
            center,
            size,
            orientation: Orientation::default(),
            trace: None,
        }
    }

    /// Creates an instance of a cell whose origin is placed at `origin`.
    pub fn instance(cell: CellId, origin: Point) -> Self {
        Self {
            name: ArcStr::new(),
            proto: NodeProto::Cell(cell),
            center: origin,
            size: Dims::default(),
            orientation: Orientation::default(),
            trace: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<ArcStr>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_trace(mut self, trace: Vec<Point>) -> Self {
        self.trace = Some(trace);
        self
    }

    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    #[inline]
    pub fn proto(&self) -> NodeProto {
        self.proto
    }

    /// The template, if this is a primitive node.
    pub fn template(&self) -> Option<TemplateId> {
        match self.proto {
            NodeProto::Primitive(t) => Some(t),
            NodeProto::Cell(_) => None,
        }
    }

    /// The instantiated cell, if this is a cell instance.
    pub fn child(&self) -> Option<CellId> {
        match self.proto {
            NodeProto::Cell(c) => Some(c),
            NodeProto::Primitive(_) => None,
        }
    }

    #[inline]
    pub fn center(&self) -> Point {
        self.center
    }

    #[inline]
    pub fn size(&self) -> Dims {
        self.size
    }

    #[inline]
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    #[inline]
    pub fn trace(&self) -> Option<&[Point]> {
        self.trace.as_deref()
    }

    /// The Manhattan transformation placing this node, if its orientation is Manhattan.
    pub fn transformation(&self) -> Option<Transformation> {
        let rotation = self.orientation.rotation()?;
        Some(Transformation::from_opts(
            self.center,
            self.orientation.reflect_vert(),
            rotation,
        ))
    }

    /// Maps a point relative to the node's unrotated center into absolute coordinates.
    pub fn place(&self, p: Point) -> Point {
        self.orientation.apply(p) + self.center
    }

    /// Maps a node-local rectangle into an absolute polygon.
    pub fn place_rect(&self, rect: Rect) -> Polygon {
        Polygon::new(rect.corners().iter().map(|p| self.place(*p)).collect())
    }

    /// The absolute bounding box of a primitive node's unrotated size.
    pub fn bbox(&self) -> Rect {
        match self.trace.as_deref().and_then(|t| Polygon::from_verts(t.to_vec()).bbox()) {
            Some(bbox) => bbox,
            None => self
                .place_rect(Rect::from_center_dims(Point::zero(), self.size))
                .bbox()
                .unwrap_or(Rect::from_point(self.center)),
        }
    }
}

impl ArcEnd {
    pub fn new(node: NodeId, port: impl Into<ArcStr>, location: Point) -> Self {
        Self {
            node,
            port: port.into(),
            location,
        }
    }
}

impl ArcInst {
    pub fn new(proto: ArcProtoId, head: ArcEnd, tail: ArcEnd, width: i64) -> Self {
        Self {
            proto,
            head,
            tail,
            width,
            head_extended: true,
            tail_extended: true,
        }
    }

    /// Sets whether each end extends past its endpoint by half the width.
    pub fn with_extension(mut self, head: bool, tail: bool) -> Self {
        self.head_extended = head;
        self.tail_extended = tail;
        self
    }

    #[inline]
    pub fn proto(&self) -> ArcProtoId {
        self.proto
    }

    #[inline]
    pub fn head(&self) -> &ArcEnd {
        &self.head
    }

    #[inline]
    pub fn tail(&self) -> &ArcEnd {
        &self.tail
    }

    pub fn head_mut(&mut self) -> &mut ArcEnd {
        &mut self.head
    }

    pub fn tail_mut(&mut self) -> &mut ArcEnd {
        &mut self.tail
    }

    #[inline]
    pub fn width(&self) -> i64 {
        self.width
    }

    #[inline]
    pub fn head_extended(&self) -> bool {
        self.head_extended
    }

    #[inline]
    pub fn tail_extended(&self) -> bool {
        self.tail_extended
    }

    /// The end attached to `node`, head first.
    pub fn end_on(&self, node: NodeId) -> Option<&ArcEnd> {
        if self.head.node == node {
            Some(&self.head)
        } else if self.tail.node == node {
            Some(&self.tail)
        } else {
            None
        }
    }

    /// Returns `true` if the wire has zero length or non-positive width.
    pub fn is_degenerate(&self) -> bool {
        self.head.location == self.tail.location || self.width <= 0
    }

    /// The length of the wire between its endpoints.
    pub fn length(&self) -> f64 {
        self.head.location.to_f().distance(self.tail.location.to_f())
    }

    /// The angle from tail to head in tenths of a degree.
    pub fn angle(&self) -> i32 {
        let d = self.head.location - self.tail.location;
        let deg10 = (d.y as f64).atan2(d.x as f64).to_degrees() * 10.;
        geometry::wrap_angle(deg10.round() as i32)
    }
}

impl Export {
    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    #[inline]
    pub fn node(&self) -> NodeId {
        self.node
    }

    #[inline]
    pub fn port(&self) -> &ArcStr {
        &self.port
    }
}
