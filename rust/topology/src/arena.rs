// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Arena-based storage for planar vector topology.
//!
//! The [`Plus`] header is the central owner of all topology data of one open
//! dataset: four arenas (nodes, lines, areas, isles) indexed by 1-based ids,
//! and one [`SpatialIndex`] per arena. Entities reference each other by id
//! only. Deleting a primitive tombstones its slot; ids are not reused while
//! the store is alive.
//!
//! Every mutation here updates the arena and the matching spatial index
//! together. [`Plus::check`] verifies that they agree.

use nalgebra::Point3;
use smallvec::SmallVec;
use tracing::debug;

use crate::config::BuildOptions;
use crate::error::{Error, IssueKind, Result, TopoIssue};
use crate::geometry::{begin_angle, end_angle, BoundBox, LinePoints};
use crate::keys::*;
use crate::spatial::{BoxIndex, SpatialIndex};

/// One line end attached to a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeLine {
    /// Forward when the line starts at the node, backward when it ends there.
    pub line: DirectedLine,
    /// Direction in which the line leaves the node, in radians.
    pub angle: f32,
}

/// A point where line ends meet.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub coord: Point3<f64>,
    /// Incident line ends, sorted by increasing angle.
    pub lines: SmallVec<[NodeLine; 4]>,
}

impl Node {
    pub fn new(coord: Point3<f64>) -> Self {
        Self {
            coord,
            lines: SmallVec::new(),
        }
    }

    pub fn bbox(&self) -> BoundBox {
        BoundBox::from_point(&self.coord)
    }

    pub fn position(&self, line: DirectedLine) -> Option<usize> {
        self.lines.iter().position(|nl| nl.line == line)
    }

    pub fn angle_of(&self, line: DirectedLine) -> Option<f32> {
        self.position(line).map(|i| self.lines[i].angle)
    }

    /// Inserts a line end, after any existing ends with the same angle.
    fn attach(&mut self, line: DirectedLine, angle: f32) {
        let at = self
            .lines
            .iter()
            .position(|nl| nl.angle > angle)
            .unwrap_or(self.lines.len());
        self.lines.insert(at, NodeLine { line, angle });
    }

    fn detach(&mut self, line: DirectedLine) -> bool {
        match self.position(line) {
            Some(i) => {
                self.lines.remove(i);
                true
            }
            None => false,
        }
    }
}

/// Topology attached to a line record; depends on the line type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineTopo {
    Point,
    Line {
        n1: NodeId,
        n2: NodeId,
    },
    Boundary {
        n1: NodeId,
        n2: NodeId,
        left: AreaRef,
        right: AreaRef,
    },
    Centroid {
        area: Option<AreaId>,
        /// Set when another centroid already claimed `area`.
        duplicate: bool,
    },
    Face,
    Kernel,
}

impl LineTopo {
    /// Topology of a freshly added line of type `ty`.
    fn unbuilt(ty: LineType, nodes: Option<(NodeId, NodeId)>) -> Self {
        match (ty, nodes) {
            (LineType::Line, Some((n1, n2))) => LineTopo::Line { n1, n2 },
            (LineType::Boundary, Some((n1, n2))) => LineTopo::Boundary {
                n1,
                n2,
                left: AreaRef::None,
                right: AreaRef::None,
            },
            (LineType::Centroid, _) => LineTopo::Centroid {
                area: None,
                duplicate: false,
            },
            (LineType::Face, _) => LineTopo::Face,
            (LineType::Kernel, _) => LineTopo::Kernel,
            _ => LineTopo::Point,
        }
    }
}

/// A line record: geometry plus topology.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub ty: LineType,
    pub topo: LineTopo,
    /// Byte offset of the record in the geometry file.
    pub offset: u64,
    pub bbox: BoundBox,
    pub points: LinePoints,
}

impl Line {
    /// Start and end node of a point-to-point line.
    pub fn nodes(&self) -> Option<(NodeId, NodeId)> {
        match self.topo {
            LineTopo::Line { n1, n2 } | LineTopo::Boundary { n1, n2, .. } => Some((n1, n2)),
            _ => None,
        }
    }

    /// What lies on `side` of a boundary; [`AreaRef::None`] for other types.
    pub fn side(&self, side: Side) -> AreaRef {
        match (self.topo, side) {
            (LineTopo::Boundary { left, .. }, Side::Left) => left,
            (LineTopo::Boundary { right, .. }, Side::Right) => right,
            _ => AreaRef::None,
        }
    }

    fn set_side(&mut self, side: Side, value: AreaRef) {
        if let LineTopo::Boundary { left, right, .. } = &mut self.topo {
            match side {
                Side::Left => *left = value,
                Side::Right => *right = value,
            }
        }
    }
}

/// A closed region bounded by an outer ring of boundaries.
#[derive(Debug, Clone, PartialEq)]
pub struct Area {
    /// Boundaries walked clockwise; the area lies right of each directed line.
    pub ring: Vec<DirectedLine>,
    pub isles: Vec<IsleId>,
    pub centroid: Option<LineId>,
    pub bbox: BoundBox,
}

/// A hole inside an area.
#[derive(Debug, Clone, PartialEq)]
pub struct Isle {
    /// Boundaries walked counter-clockwise.
    pub ring: Vec<DirectedLine>,
    pub area: Option<AreaId>,
    pub bbox: BoundBox,
}

/// Side of the boundary a ring entry lays claim to.
pub(crate) fn ring_side(dl: DirectedLine) -> Side {
    if dl.is_forward() {
        Side::Right
    } else {
        Side::Left
    }
}

fn live<T>(arena: &[Option<T>]) -> impl Iterator<Item = (usize, &T)> {
    arena
        .iter()
        .enumerate()
        .filter_map(|(i, slot)| slot.as_ref().map(|v| (i, v)))
}

fn same_box(a: &BoundBox, b: &BoundBox, with_z: bool) -> bool {
    a.n == b.n && a.s == b.s && a.e == b.e && a.w == b.w && (!with_z || (a.t == b.t && a.b == b.b))
}

/// The topology header owning all primitives of one dataset.
///
/// # Example
///
/// ```
/// use grass_lite_topology::{BuildOptions, LinePoints, LineType, Plus};
///
/// let mut plus = Plus::new(false, BuildOptions::default());
/// let a = plus
///     .add_line(LineType::Line, LinePoints::from_xy(&[(0.0, 0.0), (1.0, 0.0)]), 0)
///     .unwrap();
/// plus.add_line(LineType::Line, LinePoints::from_xy(&[(1.0, 0.0), (1.0, 1.0)]), 0)
///     .unwrap();
///
/// assert_eq!(plus.n_lines(), 2);
/// assert_eq!(plus.n_nodes(), 3);
/// assert!(plus.line(a).unwrap().nodes().is_some());
/// ```
#[derive(Debug, Clone)]
pub struct Plus {
    pub(crate) with_z: bool,
    pub(crate) options: BuildOptions,
    pub(crate) bbox: BoundBox,
    pub(crate) coor_size: u64,
    pub(crate) type_counts: [usize; 6],

    pub(crate) nodes: Vec<Option<Node>>,
    pub(crate) lines: Vec<Option<Line>>,
    pub(crate) areas: Vec<Option<Area>>,
    pub(crate) isles: Vec<Option<Isle>>,

    pub(crate) node_index: SpatialIndex,
    pub(crate) line_index: SpatialIndex,
    pub(crate) area_index: SpatialIndex,
    pub(crate) isle_index: SpatialIndex,
}

impl Plus {
    pub fn new(with_z: bool, options: BuildOptions) -> Self {
        let cap = options.rtree_node_capacity;
        Self {
            with_z,
            options,
            bbox: BoundBox::empty(),
            coor_size: 0,
            type_counts: [0; 6],
            nodes: Vec::new(),
            lines: Vec::new(),
            areas: Vec::new(),
            isles: Vec::new(),
            node_index: SpatialIndex::new(with_z, cap),
            line_index: SpatialIndex::new(with_z, cap),
            area_index: SpatialIndex::new(with_z, cap),
            isle_index: SpatialIndex::new(with_z, cap),
        }
    }

    /// Drops every primitive, keeping dimensionality and options.
    pub fn clear(&mut self) {
        *self = Self::new(self.with_z, self.options);
    }

    pub fn with_z(&self) -> bool {
        self.with_z
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Box of every line ever added; not shrunk by deletions.
    pub fn bbox(&self) -> &BoundBox {
        &self.bbox
    }

    pub fn coor_size(&self) -> u64 {
        self.coor_size
    }

    pub fn set_coor_size(&mut self, size: u64) {
        self.coor_size = size;
    }

    // --- Accessors ---

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    pub fn line(&self, id: LineId) -> Option<&Line> {
        self.lines.get(id.index()).and_then(Option::as_ref)
    }

    pub fn area(&self, id: AreaId) -> Option<&Area> {
        self.areas.get(id.index()).and_then(Option::as_ref)
    }

    pub fn isle(&self, id: IsleId) -> Option<&Isle> {
        self.isles.get(id.index()).and_then(Option::as_ref)
    }

    pub(crate) fn line_mut(&mut self, id: LineId) -> Option<&mut Line> {
        self.lines.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub(crate) fn area_mut(&mut self, id: AreaId) -> Option<&mut Area> {
        self.areas.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub(crate) fn isle_mut(&mut self, id: IsleId) -> Option<&mut Isle> {
        self.isles.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Live line, or [`Error::DeadLine`] / [`Error::NotFound`].
    pub fn live_line(&self, id: LineId) -> Result<&Line> {
        match self.lines.get(id.index()) {
            Some(Some(line)) => Ok(line),
            Some(None) => Err(Error::DeadLine(id)),
            None => Err(Error::NotFound(format!("line {id}"))),
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        live(&self.nodes).map(|(i, n)| (NodeId::from_index(i), n))
    }

    pub fn lines(&self) -> impl Iterator<Item = (LineId, &Line)> {
        live(&self.lines).map(|(i, l)| (LineId::from_index(i), l))
    }

    pub fn areas(&self) -> impl Iterator<Item = (AreaId, &Area)> {
        live(&self.areas).map(|(i, a)| (AreaId::from_index(i), a))
    }

    pub fn isles(&self) -> impl Iterator<Item = (IsleId, &Isle)> {
        live(&self.isles).map(|(i, a)| (IsleId::from_index(i), a))
    }

    pub fn n_nodes(&self) -> usize {
        self.node_index.len()
    }

    pub fn n_lines(&self) -> usize {
        self.line_index.len()
    }

    pub fn n_areas(&self) -> usize {
        self.area_index.len()
    }

    pub fn n_isles(&self) -> usize {
        self.isle_index.len()
    }

    /// Highest line id handed out so far, including dead slots.
    pub fn line_slots(&self) -> usize {
        self.lines.len()
    }

    /// Live lines of type `ty`.
    pub fn count_of(&self, ty: LineType) -> usize {
        self.type_counts[ty.store_code() as usize - 1]
    }

    pub fn node_index(&self) -> &SpatialIndex {
        &self.node_index
    }

    pub fn line_index(&self) -> &SpatialIndex {
        &self.line_index
    }

    pub fn area_index(&self) -> &SpatialIndex {
        &self.area_index
    }

    pub fn isle_index(&self) -> &SpatialIndex {
        &self.isle_index
    }

    /// Start and end node of `dl` in its traversal direction.
    pub fn directed_nodes(&self, dl: DirectedLine) -> Option<(NodeId, NodeId)> {
        let (n1, n2) = self.line(dl.line)?.nodes()?;
        Some(if dl.is_forward() { (n1, n2) } else { (n2, n1) })
    }

    // --- Nodes ---

    pub fn add_node(&mut self, coord: Point3<f64>) -> NodeId {
        let node = Node::new(coord);
        let id = NodeId::from_index(self.nodes.len());
        self.node_index.insert(&node.bbox(), id.get());
        self.nodes.push(Some(node));
        debug!(node = %id, x = coord.x, y = coord.y, "added node");
        id
    }

    pub fn del_node(&mut self, id: NodeId) -> bool {
        let Some(slot) = self.nodes.get_mut(id.index()) else {
            return false;
        };
        if slot.take().is_none() {
            return false;
        }
        self.node_index.delete(id.get());
        debug!(node = %id, "deleted node");
        true
    }

    /// Nearest node within `tolerance` of `p`; ties go to the lower id.
    pub fn find_node_near(&self, p: &Point3<f64>, tolerance: f64) -> Option<NodeId> {
        let query = BoundBox::from_point(p).grown(tolerance);
        let tol2 = tolerance * tolerance;
        let mut best: Option<(f64, u32)> = None;
        self.node_index.search(&query, &mut |id| {
            if let Some(node) = NodeId::new(id).and_then(|n| self.node(n)) {
                let d = node.coord - *p;
                let d2 = if self.with_z {
                    d.norm_squared()
                } else {
                    d.x * d.x + d.y * d.y
                };
                let better = match best {
                    None => true,
                    Some((bd, bid)) => d2 < bd || (d2 == bd && id < bid),
                };
                if d2 <= tol2 && better {
                    best = Some((d2, id));
                }
            }
            true
        });
        best.and_then(|(_, id)| NodeId::new(id))
    }

    fn find_or_add_node(&mut self, p: &Point3<f64>) -> NodeId {
        match self.find_node_near(p, self.options.node_tolerance) {
            Some(id) => id,
            None => self.add_node(*p),
        }
    }

    // --- Lines ---

    /// Adds a line and records its incidence at the end nodes.
    ///
    /// Point-like types need at least one vertex, linear types at least two.
    /// Areas are not touched; see [`Plus::rebuild_around`].
    pub fn add_line(&mut self, ty: LineType, points: LinePoints, offset: u64) -> Result<LineId> {
        let id = LineId::from_index(self.lines.len());
        self.lines.push(None);
        if let Err(e) = self.attach_line(id, ty, points, offset) {
            self.lines.pop();
            return Err(e);
        }
        Ok(id)
    }

    /// Replaces geometry of a live line, keeping its id.
    pub fn replace_line(
        &mut self,
        id: LineId,
        ty: LineType,
        points: LinePoints,
        offset: u64,
    ) -> Result<()> {
        validate_points(ty, &points)?;
        self.del_line(id)?;
        self.attach_line(id, ty, points, offset)
    }

    fn attach_line(
        &mut self,
        id: LineId,
        ty: LineType,
        mut points: LinePoints,
        offset: u64,
    ) -> Result<()> {
        validate_points(ty, &points)?;
        if ty.is_point_like() {
            points = LinePoints::from_vec(points.as_slice()[..1].to_vec());
        }
        let nodes = if ty.is_linear() {
            let (Some(first), Some(last)) = (points.first().copied(), points.last().copied()) else {
                return Err(Error::InvalidGeometry(format!("{ty} without vertices")));
            };
            let n1 = self.find_or_add_node(&first);
            let n2 = self.find_or_add_node(&last);
            let (a1, a2) = (begin_angle(&points), end_angle(&points));
            if let Some(Some(node)) = self.nodes.get_mut(n1.index()) {
                node.attach(DirectedLine::forward(id), a1);
            }
            if let Some(Some(node)) = self.nodes.get_mut(n2.index()) {
                node.attach(DirectedLine::backward(id), a2);
            }
            Some((n1, n2))
        } else {
            None
        };

        let bbox = points.bbox();
        self.bbox.expand(&bbox);
        self.line_index.insert(&bbox, id.get());
        self.type_counts[ty.store_code() as usize - 1] += 1;
        self.lines[id.index()] = Some(Line {
            ty,
            topo: LineTopo::unbuilt(ty, nodes),
            offset,
            bbox,
            points,
        });
        debug!(line = %id, %ty, "added line");
        Ok(())
    }

    /// Deletes a line, the areas and isles it bounds, and nodes left empty.
    pub fn del_line(&mut self, id: LineId) -> Result<()> {
        let line = self.live_line(id)?.clone();
        match line.topo {
            LineTopo::Boundary { left, right, .. } => {
                for side in [left, right] {
                    match side {
                        AreaRef::Area(a) => {
                            self.del_area(a);
                        }
                        AreaRef::Isle(i) => {
                            self.del_isle(i);
                        }
                        AreaRef::None => {}
                    }
                }
            }
            LineTopo::Centroid {
                area: Some(a),
                duplicate: false,
            } => {
                if let Some(area) = self.area_mut(a) {
                    if area.centroid == Some(id) {
                        area.centroid = None;
                    }
                }
            }
            _ => {}
        }

        if let Some((n1, n2)) = line.nodes() {
            for (n, dl) in [(n1, DirectedLine::forward(id)), (n2, DirectedLine::backward(id))] {
                let empty = match self.nodes.get_mut(n.index()) {
                    Some(Some(node)) => {
                        node.detach(dl);
                        node.lines.is_empty()
                    }
                    _ => false,
                };
                if empty {
                    self.del_node(n);
                }
            }
        }

        self.line_index.delete(id.get());
        self.type_counts[line.ty.store_code() as usize - 1] -= 1;
        self.lines[id.index()] = None;
        debug!(line = %id, "deleted line");
        Ok(())
    }

    // --- Areas and isles ---

    fn ring_bbox(&self, ring: &[DirectedLine]) -> BoundBox {
        let mut bbox = BoundBox::empty();
        for dl in ring {
            if let Some(line) = self.line(dl.line) {
                bbox.expand(&line.bbox);
            }
        }
        bbox
    }

    /// First ring entry whose side is not free, if any.
    fn claimed_side(&self, ring: &[DirectedLine]) -> Option<LineId> {
        ring.iter()
            .find(|dl| {
                self.line(dl.line).map_or(true, |l| {
                    l.ty != LineType::Boundary || !l.side(ring_side(**dl)).is_none()
                })
            })
            .map(|dl| dl.line)
    }

    fn claim_sides(&mut self, ring: &[DirectedLine], owner: AreaRef) {
        for dl in ring {
            if let Some(line) = self.line_mut(dl.line) {
                line.set_side(ring_side(*dl), owner);
            }
        }
    }

    fn release_sides(&mut self, ring: &[DirectedLine], owner: AreaRef) {
        for dl in ring {
            let side = ring_side(*dl);
            if let Some(line) = self.line_mut(dl.line) {
                if line.side(side) == owner {
                    line.set_side(side, AreaRef::None);
                }
            }
        }
    }

    /// Adds an area from a clockwise ring and claims the boundary sides.
    pub fn add_area(&mut self, ring: Vec<DirectedLine>) -> std::result::Result<AreaId, TopoIssue> {
        if let Some(line) = self.claimed_side(&ring) {
            return Err(TopoIssue::line(IssueKind::SideAlreadyAssigned, line));
        }
        let id = AreaId::from_index(self.areas.len());
        let bbox = self.ring_bbox(&ring);
        self.claim_sides(&ring, AreaRef::Area(id));
        self.area_index.insert(&bbox, id.get());
        debug!(area = %id, lines = ring.len(), "added area");
        self.areas.push(Some(Area {
            ring,
            isles: Vec::new(),
            centroid: None,
            bbox,
        }));
        Ok(id)
    }

    /// Deletes an area; its isles become unattached and its centroids free.
    pub fn del_area(&mut self, id: AreaId) -> bool {
        let Some(area) = self.areas.get_mut(id.index()).and_then(Option::take) else {
            return false;
        };
        self.release_sides(&area.ring, AreaRef::Area(id));
        for isle in &area.isles {
            if let Some(isle) = self.isle_mut(*isle) {
                isle.area = None;
            }
        }
        for cid in self.line_index.select(&area.bbox) {
            if let Some(line) = LineId::new(cid).and_then(|l| self.line_mut(l)) {
                if let LineTopo::Centroid { area: a, duplicate } = &mut line.topo {
                    if *a == Some(id) {
                        *a = None;
                        *duplicate = false;
                    }
                }
            }
        }
        self.area_index.delete(id.get());
        debug!(area = %id, "deleted area");
        true
    }

    /// Adds an isle from a counter-clockwise ring and claims the boundary sides.
    pub fn add_isle(&mut self, ring: Vec<DirectedLine>) -> std::result::Result<IsleId, TopoIssue> {
        if let Some(line) = self.claimed_side(&ring) {
            return Err(TopoIssue::line(IssueKind::SideAlreadyAssigned, line));
        }
        let id = IsleId::from_index(self.isles.len());
        let bbox = self.ring_bbox(&ring);
        self.claim_sides(&ring, AreaRef::Isle(id));
        self.isle_index.insert(&bbox, id.get());
        debug!(isle = %id, lines = ring.len(), "added isle");
        self.isles.push(Some(Isle {
            ring,
            area: None,
            bbox,
        }));
        Ok(id)
    }

    pub fn del_isle(&mut self, id: IsleId) -> bool {
        let Some(isle) = self.isles.get_mut(id.index()).and_then(Option::take) else {
            return false;
        };
        self.release_sides(&isle.ring, AreaRef::Isle(id));
        if let Some(area) = isle.area.and_then(|a| self.area_mut(a)) {
            area.isles.retain(|i| *i != id);
        }
        self.isle_index.delete(id.get());
        debug!(isle = %id, "deleted isle");
        true
    }

    /// Links `isle` into `area`, detaching it from any previous area.
    pub fn area_add_isle(&mut self, area: AreaId, isle: IsleId) -> bool {
        if self.area(area).is_none() {
            return false;
        }
        let previous = match self.isle_mut(isle) {
            Some(i) => i.area.replace(area),
            None => return false,
        };
        if let Some(prev) = previous.filter(|p| *p != area) {
            self.area_del_isle(prev, isle);
            if let Some(i) = self.isle_mut(isle) {
                i.area = Some(area);
            }
        }
        if let Some(a) = self.area_mut(area) {
            if !a.isles.contains(&isle) {
                a.isles.push(isle);
            }
        }
        true
    }

    pub fn area_del_isle(&mut self, area: AreaId, isle: IsleId) -> bool {
        let removed = match self.area_mut(area) {
            Some(a) => {
                let before = a.isles.len();
                a.isles.retain(|i| *i != isle);
                a.isles.len() != before
            }
            None => false,
        };
        if removed {
            if let Some(i) = self.isle_mut(isle) {
                if i.area == Some(area) {
                    i.area = None;
                }
            }
        }
        removed
    }

    pub(crate) fn set_centroid(&mut self, line: LineId, area: Option<AreaId>, duplicate: bool) {
        if let Some(l) = self.line_mut(line) {
            if let LineTopo::Centroid { area: a, duplicate: d } = &mut l.topo {
                *a = area;
                *d = duplicate;
            }
        }
    }

    // --- Consistency ---

    /// Checks arena/index agreement, node incidence and ring closure.
    ///
    /// Returns one message per violation; an empty list means consistent.
    pub fn check(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let nodes = self.nodes().map(|(id, n)| (id.get(), n.bbox()));
        self.check_index("node", &self.node_index, nodes, &mut problems);
        let lines = self.lines().map(|(id, l)| (id.get(), l.bbox));
        self.check_index("line", &self.line_index, lines, &mut problems);
        let areas = self.areas().map(|(id, a)| (id.get(), a.bbox));
        self.check_index("area", &self.area_index, areas, &mut problems);
        let isles = self.isles().map(|(id, i)| (id.get(), i.bbox));
        self.check_index("isle", &self.isle_index, isles, &mut problems);

        for (id, line) in self.lines() {
            let Some((n1, n2)) = line.nodes() else {
                continue;
            };
            for (n, dl) in [(n1, DirectedLine::forward(id)), (n2, DirectedLine::backward(id))] {
                match self.node(n) {
                    Some(node) if node.position(dl).is_some() => {}
                    Some(_) => {
                        problems.push(format!("node {n} does not list line {}", dl.to_signed()))
                    }
                    None => problems.push(format!("line {id} references dead node {n}")),
                }
            }
            for side in [Side::Left, Side::Right] {
                let listed = match line.side(side) {
                    AreaRef::None => true,
                    AreaRef::Area(a) => self
                        .area(a)
                        .is_some_and(|a| a.ring.iter().any(|dl| dl.line == id)),
                    AreaRef::Isle(i) => self
                        .isle(i)
                        .is_some_and(|i| i.ring.iter().any(|dl| dl.line == id)),
                };
                if !listed {
                    problems.push(format!("line {id} {side:?} side points to a ring without it"));
                }
            }
        }

        for (nid, node) in self.nodes() {
            if node.lines.is_empty() {
                problems.push(format!("node {nid} has no lines"));
            }
            for w in node.lines.windows(2) {
                if w[0].angle > w[1].angle {
                    problems.push(format!("node {nid} lines not sorted by angle"));
                }
            }
            for nl in &node.lines {
                let at_node = self.directed_nodes(nl.line).map(|(start, _)| start);
                if at_node != Some(nid) {
                    problems.push(format!(
                        "node {nid} lists line {} which does not start there",
                        nl.line.to_signed()
                    ));
                }
            }
        }

        for (id, area) in self.areas() {
            self.check_ring(&format!("area {id}"), &area.ring, AreaRef::Area(id), &mut problems);
            for isle in &area.isles {
                if self.isle(*isle).and_then(|i| i.area) != Some(id) {
                    problems.push(format!("area {id} lists isle {isle} which is not linked back"));
                }
            }
        }
        for (id, isle) in self.isles() {
            self.check_ring(&format!("isle {id}"), &isle.ring, AreaRef::Isle(id), &mut problems);
        }
        problems
    }

    fn check_index(
        &self,
        what: &str,
        index: &SpatialIndex,
        alive: impl Iterator<Item = (u32, BoundBox)>,
        problems: &mut Vec<String>,
    ) {
        let mut count = 0;
        for (id, bbox) in alive {
            count += 1;
            match index.bbox(id) {
                Some(indexed) if same_box(indexed, &bbox, self.with_z) => {}
                Some(_) => problems.push(format!("{what} {id} indexed with a stale box")),
                None => problems.push(format!("{what} {id} missing from index")),
            }
        }
        if index.len() != count {
            problems.push(format!(
                "{what} index holds {} ids for {count} live {what}s",
                index.len()
            ));
        }
    }

    fn check_ring(
        &self,
        what: &str,
        ring: &[DirectedLine],
        owner: AreaRef,
        problems: &mut Vec<String>,
    ) {
        if ring.is_empty() {
            problems.push(format!("{what} has an empty ring"));
            return;
        }
        for (i, dl) in ring.iter().enumerate() {
            let next = ring[(i + 1) % ring.len()];
            let end = self.directed_nodes(*dl).map(|(_, e)| e);
            let start = self.directed_nodes(next).map(|(s, _)| s);
            if end.is_none() || end != start {
                problems.push(format!("{what} ring is not closed after line {}", dl.to_signed()));
            }
            if self.line(dl.line).map(|l| l.side(ring_side(*dl))) != Some(owner) {
                problems.push(format!("{what} ring line {} does not point back", dl.to_signed()));
            }
        }
    }
}

pub(crate) fn validate_points(ty: LineType, points: &LinePoints) -> Result<()> {
    let needed = if ty.is_linear() { 2 } else { 1 };
    if points.len() < needed {
        return Err(Error::InvalidGeometry(format!(
            "{ty} needs at least {needed} vertices, got {}",
            points.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(xy: &[(f64, f64)]) -> LinePoints {
        LinePoints::from_xy(xy)
    }

    fn plus() -> Plus {
        Plus::new(false, BuildOptions::default())
    }

    #[test]
    fn shared_endpoint_reuses_node() {
        let mut p = plus();
        let a = p.add_line(LineType::Line, line(&[(0.0, 0.0), (1.0, 0.0)]), 0).unwrap();
        let b = p.add_line(LineType::Line, line(&[(1.0, 0.0), (1.0, 1.0)]), 0).unwrap();
        assert_eq!(p.n_nodes(), 3);
        let (_, a2) = p.line(a).unwrap().nodes().unwrap();
        let (b1, _) = p.line(b).unwrap().nodes().unwrap();
        assert_eq!(a2, b1);
        let node = p.node(a2).unwrap();
        assert_eq!(node.lines.len(), 2);
        assert!(node.position(DirectedLine::backward(a)).is_some());
        assert!(node.position(DirectedLine::forward(b)).is_some());
        assert!(p.check().is_empty());
    }

    #[test]
    fn node_tolerance_merges_close_endpoints() {
        let mut p = Plus::new(false, BuildOptions::default().with_node_tolerance(0.01));
        p.add_line(LineType::Line, line(&[(0.0, 0.0), (1.0, 0.0)]), 0).unwrap();
        p.add_line(LineType::Line, line(&[(1.005, 0.0), (2.0, 0.0)]), 0).unwrap();
        assert_eq!(p.n_nodes(), 3);
    }

    #[test]
    fn incidence_sorted_by_angle() {
        let mut p = plus();
        p.add_line(LineType::Line, line(&[(0.0, 0.0), (0.0, 1.0)]), 0).unwrap();
        p.add_line(LineType::Line, line(&[(0.0, 0.0), (1.0, 0.0)]), 0).unwrap();
        p.add_line(LineType::Line, line(&[(0.0, 0.0), (-1.0, 0.0)]), 0).unwrap();
        let origin = p.find_node_near(&Point3::origin(), 0.0).unwrap();
        let angles: Vec<f32> = p.node(origin).unwrap().lines.iter().map(|nl| nl.angle).collect();
        assert!(angles.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(angles.len(), 3);
    }

    #[test]
    fn delete_line_removes_orphan_nodes_and_index_entry() {
        let mut p = plus();
        let a = p.add_line(LineType::Line, line(&[(0.0, 0.0), (1.0, 0.0)]), 0).unwrap();
        p.add_line(LineType::Line, line(&[(1.0, 0.0), (2.0, 0.0)]), 0).unwrap();
        let bbox = p.line(a).unwrap().bbox;
        p.del_line(a).unwrap();
        assert_eq!(p.n_nodes(), 2);
        assert_eq!(p.n_lines(), 1);
        assert!(!p.line_index().select(&bbox).contains(&a.get()));
        assert!(matches!(p.del_line(a), Err(Error::DeadLine(_))));
        assert!(p.check().is_empty());
    }

    #[test]
    fn points_have_no_nodes() {
        let mut p = plus();
        let pt = p.add_line(LineType::Point, line(&[(3.0, 3.0)]), 0).unwrap();
        assert_eq!(p.n_nodes(), 0);
        assert_eq!(p.line(pt).unwrap().topo, LineTopo::Point);
        assert_eq!(p.count_of(LineType::Point), 1);
    }

    #[test]
    fn short_geometry_rejected() {
        let mut p = plus();
        let err = p.add_line(LineType::Boundary, line(&[(0.0, 0.0)]), 0);
        assert!(matches!(err, Err(Error::InvalidGeometry(_))));
        assert_eq!(p.line_slots(), 0);
    }

    #[test]
    fn area_claims_and_releases_sides() {
        let mut p = plus();
        let b = p
            .add_line(
                LineType::Boundary,
                line(&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0), (0.0, 0.0)]),
                0,
            )
            .unwrap();
        let area = p.add_area(vec![DirectedLine::forward(b)]).unwrap();
        assert_eq!(p.line(b).unwrap().side(Side::Right), AreaRef::Area(area));
        let again = p.add_area(vec![DirectedLine::forward(b)]);
        assert_eq!(again, Err(TopoIssue::line(IssueKind::SideAlreadyAssigned, b)));

        let isle = p.add_isle(vec![DirectedLine::backward(b)]).unwrap();
        assert!(p.area_add_isle(area, isle));
        assert!(p.check().is_empty());

        assert!(p.del_area(area));
        assert_eq!(p.line(b).unwrap().side(Side::Right), AreaRef::None);
        assert_eq!(p.isle(isle).unwrap().area, None);
        assert!(!p.del_area(area));
        assert!(p.check().is_empty());
    }

    #[test]
    fn replace_keeps_id() {
        let mut p = plus();
        let a = p.add_line(LineType::Line, line(&[(0.0, 0.0), (1.0, 0.0)]), 0).unwrap();
        p.replace_line(a, LineType::Line, line(&[(5.0, 5.0), (6.0, 5.0)]), 40).unwrap();
        let l = p.line(a).unwrap();
        assert_eq!(l.offset, 40);
        assert_eq!(p.n_nodes(), 2);
        assert_eq!(p.line_index().select(&l.bbox), vec![a.get()]);
        assert!(p.check().is_empty());
    }
}
