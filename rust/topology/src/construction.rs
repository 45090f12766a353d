// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topology building: area rings from boundaries, isle and centroid attachment.
//!
//! Rings are found by walking from a boundary side and, at every node,
//! continuing with the next boundary to the right in angular order. A closed
//! clockwise ring becomes an area, a counter-clockwise one an isle. Problems
//! are collected as [`TopoIssue`]s and never stop the build.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::arena::{LineTopo, Plus};
use crate::error::{IssueKind, Result, TopoIssue};
use crate::geometry::{
    point_in_ring, point_on_ring, segments_intersect, signed_area, BoundBox, LinePoints,
    DEGENERATE_ANGLE,
};
use crate::keys::*;
use crate::rtree::{Rect, RTree};

/// Outcome of walking a ring from one boundary side.
#[derive(Debug, Clone, PartialEq)]
pub enum RingWalk {
    /// Back at the starting line; directed lines in walk order.
    Closed(Vec<DirectedLine>),
    /// The starting line has no direction (all vertices coincide).
    Degenerate,
    /// The walk turned back on itself at a free line end.
    DeadEnd(LineId),
    /// The walk ran into a line it had already used.
    Unclosed(LineId),
    /// Two boundaries leave a node at the same angle.
    SameAngle(LineId),
    /// No continuation found at a node.
    Lost(LineId),
}

/// Summary of a build or rebuild.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub nodes: usize,
    pub lines: usize,
    pub areas: usize,
    pub isles: usize,
    pub issues: Vec<TopoIssue>,
}

impl BuildReport {
    /// Issues other than unattached outer isles, which every map has.
    pub fn warnings(&self) -> impl Iterator<Item = &TopoIssue> {
        self.issues
            .iter()
            .filter(|i| i.kind != IssueKind::IsleOutsideArea)
    }

    pub fn is_clean(&self) -> bool {
        self.warnings().next().is_none()
    }

    pub fn count(&self, kind: IssueKind) -> usize {
        self.issues.iter().filter(|i| i.kind == kind).count()
    }

    fn push(&mut self, issue: TopoIssue) {
        if issue.kind == IssueKind::IsleOutsideArea {
            debug!(%issue, "isle not inside any area");
        } else {
            warn!(%issue, "topology issue");
        }
        self.issues.push(issue);
    }

    fn absorb(&mut self, other: BuildReport) {
        self.issues.extend(other.issues);
    }
}

impl Plus {
    /// Next line around the node of `current` (an incidence entry there).
    ///
    /// `Side::Right` moves to greater angles, `Side::Left` to smaller ones.
    /// Points and degenerate lines are skipped. `current` itself is returned
    /// when it is the only candidate at the node.
    pub fn angle_next_line(
        &self,
        current: DirectedLine,
        side: Side,
        types: TypeMask,
    ) -> Option<(DirectedLine, f32)> {
        let line = self.line(current.line)?;
        if !line.ty.is_linear() {
            return None;
        }
        let (start, _) = self.directed_nodes(current)?;
        let node = self.node(start)?;
        let mut i = node.position(current)?;
        let n = node.lines.len();
        loop {
            i = match side {
                Side::Right => (i + 1) % n,
                Side::Left => (i + n - 1) % n,
            };
            let entry = node.lines[i];
            if entry.angle == DEGENERATE_ANGLE {
                if entry.line == current {
                    return None;
                }
                continue;
            }
            if self
                .line(entry.line.line)
                .is_some_and(|l| types.matches(l.ty))
            {
                return Some((entry.line, entry.angle));
            }
            if entry.line == current {
                return None;
            }
        }
    }

    /// Whether `dl` leaves its node at an angle no neighbouring line shares.
    pub fn node_angle_check(&self, dl: DirectedLine, types: TypeMask) -> bool {
        let Some(angle) = self
            .directed_nodes(dl)
            .and_then(|(start, _)| self.node(start))
            .and_then(|node| node.angle_of(dl))
        else {
            return false;
        };
        for side in [Side::Right, Side::Left] {
            if let Some((other, other_angle)) = self.angle_next_line(dl, side, types) {
                if other != dl && other_angle == angle {
                    return false;
                }
            }
        }
        true
    }

    /// Walks the ring on `side` of boundary `first`.
    pub fn build_area_with_line(&self, first: LineId, side: Side) -> RingWalk {
        let forward = DirectedLine::forward(first);
        let degenerate = self
            .directed_nodes(forward)
            .and_then(|(n1, _)| self.node(n1))
            .and_then(|node| node.angle_of(forward))
            .map_or(true, |a| a == DEGENERATE_ANGLE);
        if degenerate {
            debug!(line = %first, "first line degenerate");
            return RingWalk::Degenerate;
        }

        // the area lies right of a forward line, left of a backward one
        let start = match side {
            Side::Right => forward,
            Side::Left => forward.reversed(),
        };
        let mut ring = vec![start];
        let mut prev = start.reversed();
        loop {
            let Some((next, _)) = self.angle_next_line(prev, Side::Right, TypeMask::BOUNDARY)
            else {
                return RingWalk::Lost(prev.line);
            };
            if !self.node_angle_check(next, TypeMask::BOUNDARY) {
                return RingWalk::SameAngle(next.line);
            }
            if next == start {
                debug!(line = %first, lines = ring.len(), "ring closed");
                return RingWalk::Closed(ring);
            }
            if next == prev {
                return RingWalk::DeadEnd(next.line);
            }
            if ring.iter().any(|dl| dl.line == next.line) {
                return RingWalk::Unclosed(next.line);
            }
            ring.push(next);
            prev = next.reversed();
        }
    }

    /// Vertices of a ring, joints listed once; closed when the ring is.
    pub fn ring_points(&self, ring: &[DirectedLine]) -> LinePoints {
        let mut out = LinePoints::new();
        for dl in ring {
            let Some(line) = self.line(dl.line) else {
                continue;
            };
            let pts = line.points.as_slice();
            let skip = usize::from(!out.is_empty());
            if dl.is_forward() {
                for p in pts.iter().skip(skip) {
                    out.push(p.x, p.y, p.z);
                }
            } else {
                for p in pts.iter().rev().skip(skip) {
                    out.push(p.x, p.y, p.z);
                }
            }
        }
        out
    }

    fn clear_areas(&mut self) {
        let areas: Vec<AreaId> = self.areas().map(|(id, _)| id).collect();
        for id in areas {
            self.del_area(id);
        }
        let isles: Vec<IsleId> = self.isles().map(|(id, _)| id).collect();
        for id in isles {
            self.del_isle(id);
        }
    }

    /// Clears the store, adds every line and builds full topology.
    pub fn build_from<I>(&mut self, lines: I) -> Result<BuildReport>
    where
        I: IntoIterator<Item = (LineType, LinePoints, u64)>,
    {
        self.clear();
        for (ty, points, offset) in lines {
            self.add_line(ty, points, offset)?;
        }
        Ok(self.build())
    }

    /// Rebuilds areas, isles and centroid links from the current lines.
    pub fn build(&mut self) -> BuildReport {
        self.clear_areas();
        let mut report = BuildReport::default();

        if self.options.build_areas {
            let boundaries: Vec<LineId> = self
                .lines()
                .filter(|(_, l)| l.ty == LineType::Boundary)
                .map(|(id, _)| id)
                .collect();
            for line in boundaries {
                for side in [Side::Left, Side::Right] {
                    self.build_line_side(line, side, &mut report);
                }
            }

            let isles: Vec<IsleId> = self.isles().map(|(id, _)| id).collect();
            for isle in isles {
                self.attach_isle(isle, &mut report);
            }
        }

        if self.options.build_areas && self.options.attach_centroids {
            let centroids: Vec<LineId> = self
                .lines()
                .filter(|(_, l)| l.ty == LineType::Centroid)
                .map(|(id, _)| id)
                .collect();
            for c in centroids {
                self.attach_centroid(c, &mut report);
            }
        }

        self.fill_counts(&mut report);
        info!(
            nodes = report.nodes,
            lines = report.lines,
            areas = report.areas,
            isles = report.isles,
            issues = report.warnings().count(),
            "topology built"
        );
        report
    }

    fn fill_counts(&self, report: &mut BuildReport) {
        report.nodes = self.n_nodes();
        report.lines = self.n_lines();
        report.areas = self.n_areas();
        report.isles = self.n_isles();
    }

    /// Builds the area or isle on `side` of `line` if that side is free.
    fn build_line_side(&mut self, line: LineId, side: Side, report: &mut BuildReport) {
        let free = self
            .line(line)
            .is_some_and(|l| l.ty == LineType::Boundary && l.side(side).is_none());
        if !free {
            return;
        }

        let ring = match self.build_area_with_line(line, side) {
            RingWalk::Closed(ring) => ring,
            RingWalk::Degenerate => return,
            RingWalk::DeadEnd(l) | RingWalk::Lost(l) => {
                report.push(TopoIssue::line(IssueKind::DanglingBoundary, l));
                return;
            }
            RingWalk::Unclosed(l) => {
                report.push(TopoIssue::line(IssueKind::UnclosedRing, l));
                return;
            }
            RingWalk::SameAngle(l) => {
                report.push(TopoIssue::line(IssueKind::SameAngle, l));
                return;
            }
        };

        let points = self.ring_points(&ring);
        if ring_self_intersects(points.as_slice()) {
            report.push(TopoIssue::line(IssueKind::SelfIntersectingRing, line));
            return;
        }
        let area = signed_area(points.as_slice());
        if area == 0.0 {
            report.push(TopoIssue::line(IssueKind::InconsistentWinding, line));
            return;
        }

        let added = if area < 0.0 {
            self.add_area(ring).map(|_| ())
        } else {
            self.add_isle(ring).map(|_| ())
        };
        if let Err(issue) = added {
            report.push(issue);
        }
    }

    /// Links `isle` to the smallest area enclosing it.
    pub fn attach_isle(&mut self, isle: IsleId, report: &mut BuildReport) -> Option<AreaId> {
        let found = self.find_isle_area(isle)?;
        match found {
            Some(area) => {
                self.area_add_isle(area, isle);
                debug!(isle = %isle, area = %area, "isle attached");
                Some(area)
            }
            None => {
                report.push(TopoIssue::isle(IssueKind::IsleOutsideArea, isle));
                None
            }
        }
    }

    /// `None` when the isle is dead; `Some(None)` when no area encloses it.
    fn find_isle_area(&self, isle_id: IsleId) -> Option<Option<AreaId>> {
        let isle = self.isle(isle_id)?;
        let isle_pts = self.ring_points(&isle.ring);
        let mut isle_lines: Vec<u32> = isle.ring.iter().map(|dl| dl.line.get()).collect();
        isle_lines.sort_unstable();

        let mut best: Option<(f64, AreaId)> = None;
        for id in self.area_index.select(&isle.bbox) {
            let Some(area_id) = AreaId::new(id) else {
                continue;
            };
            let Some(area) = self.area(area_id) else {
                continue;
            };
            if !area.bbox.contains_box(&isle.bbox) {
                continue;
            }
            let mut area_lines: Vec<u32> = area.ring.iter().map(|dl| dl.line.get()).collect();
            area_lines.sort_unstable();
            if area_lines == isle_lines {
                continue;
            }

            let area_pts = self.ring_points(&area.ring);
            let probe = isle_pts
                .iter()
                .find(|p| !point_on_ring(p, area_pts.as_slice(), 0.0));
            let Some(probe) = probe else {
                continue;
            };
            if !point_in_ring(probe.x, probe.y, area_pts.as_slice()) {
                continue;
            }
            let size = signed_area(area_pts.as_slice()).abs();
            if best.map_or(true, |(s, _)| size < s) {
                best = Some((size, area_id));
            }
        }
        Some(best.map(|(_, a)| a))
    }

    /// Links centroid `line` to the area containing it.
    pub fn attach_centroid(&mut self, line: LineId, report: &mut BuildReport) -> Option<AreaId> {
        let p = match self.line(line) {
            Some(l) if l.ty == LineType::Centroid => *l.points.first()?,
            _ => return None,
        };
        let Some(area_id) = self.find_area(p.x, p.y) else {
            self.set_centroid(line, None, false);
            report.push(TopoIssue::line(IssueKind::CentroidOutsideArea, line));
            return None;
        };
        let claimed = self.area(area_id).and_then(|a| a.centroid);
        match claimed {
            Some(existing) if existing != line => {
                self.set_centroid(line, Some(area_id), true);
                report.push(TopoIssue::line(IssueKind::DuplicateCentroid, line));
            }
            _ => {
                if let Some(area) = self.area_mut(area_id) {
                    area.centroid = Some(line);
                }
                self.set_centroid(line, Some(area_id), false);
            }
        }
        Some(area_id)
    }

    /// Rebuilds areas and isles around `nodes` after an edit inside `region`.
    ///
    /// Areas and isles bounded by lines at the nodes are dropped, every free
    /// boundary side in the affected box is rebuilt, and isles and centroids
    /// there are attached again.
    pub fn rebuild_around(&mut self, nodes: &[NodeId], region: BoundBox) -> BuildReport {
        let mut report = BuildReport::default();
        if !self.options.build_areas {
            self.fill_counts(&mut report);
            return report;
        }

        let mut region = region;
        let mut doomed_areas = Vec::new();
        let mut doomed_isles = Vec::new();
        for n in nodes {
            let Some(node) = self.node(*n) else {
                continue;
            };
            for nl in &node.lines {
                let Some(line) = self.line(nl.line.line) else {
                    continue;
                };
                for side in [Side::Left, Side::Right] {
                    match line.side(side) {
                        AreaRef::Area(a) => doomed_areas.push(a),
                        AreaRef::Isle(i) => doomed_isles.push(i),
                        AreaRef::None => {}
                    }
                }
            }
        }
        for a in doomed_areas {
            if let Some(area) = self.area(a) {
                region.expand(&area.bbox);
            }
            self.del_area(a);
        }
        for i in doomed_isles {
            if let Some(isle) = self.isle(i) {
                region.expand(&isle.bbox);
            }
            self.del_isle(i);
        }

        let candidates: Vec<LineId> = self
            .line_index
            .select(&region)
            .into_iter()
            .filter_map(LineId::new)
            .filter(|l| self.line(*l).is_some_and(|l| l.ty == LineType::Boundary))
            .collect();
        for line in &candidates {
            for side in [Side::Left, Side::Right] {
                self.build_line_side(*line, side, &mut report);
            }
        }
        for line in &candidates {
            for side in [Side::Left, Side::Right] {
                let bbox = match self.line(*line).map(|l| l.side(side)) {
                    Some(AreaRef::Area(a)) => self.area(a).map(|a| a.bbox),
                    Some(AreaRef::Isle(i)) => self.isle(i).map(|i| i.bbox),
                    _ => None,
                };
                if let Some(b) = bbox {
                    region.expand(&b);
                }
            }
        }

        let isles: Vec<IsleId> = self
            .isle_index
            .select(&region)
            .into_iter()
            .filter_map(IsleId::new)
            .collect();
        for isle in isles {
            if let Some(area) = self.isle(isle).and_then(|i| i.area) {
                self.area_del_isle(area, isle);
            }
            self.attach_isle(isle, &mut report);
        }

        if self.options.attach_centroids {
            let centroids: Vec<LineId> = self
                .line_index
                .select(&region)
                .into_iter()
                .filter_map(LineId::new)
                .filter(|l| self.line(*l).is_some_and(|l| l.ty == LineType::Centroid))
                .collect();
            for c in &centroids {
                let owned = match self.line(*c).map(|l| l.topo) {
                    Some(LineTopo::Centroid { area: Some(a), .. }) => Some(a),
                    _ => None,
                };
                if let Some(area) = owned.and_then(|a| self.area_mut(a)) {
                    if area.centroid == Some(*c) {
                        area.centroid = None;
                    }
                }
                self.set_centroid(*c, None, false);
            }
            for c in centroids {
                self.attach_centroid(c, &mut report);
            }
        }

        self.fill_counts(&mut report);
        debug!(
            areas = report.areas,
            isles = report.isles,
            issues = report.issues.len(),
            "topology rebuilt around edit"
        );
        report
    }

    /// Adds a line and updates the topology around it.
    pub fn add_line_and_rebuild(
        &mut self,
        ty: LineType,
        points: LinePoints,
        offset: u64,
    ) -> Result<(LineId, BuildReport)> {
        let id = self.add_line(ty, points, offset)?;
        let report = self.rebuild_after_insert(id);
        Ok((id, report))
    }

    /// Replaces a line's geometry and updates the topology around it.
    pub fn replace_line_and_rebuild(
        &mut self,
        id: LineId,
        ty: LineType,
        points: LinePoints,
        offset: u64,
    ) -> Result<BuildReport> {
        let (nodes, region) = self.edit_footprint(id)?;
        self.replace_line(id, ty, points, offset)?;
        let mut report = self.rebuild_around(&nodes, region);
        report.absorb(self.rebuild_after_insert(id));
        self.fill_counts(&mut report);
        Ok(report)
    }

    /// Deletes a line and updates the topology around it.
    pub fn del_line_and_rebuild(&mut self, id: LineId) -> Result<BuildReport> {
        let (nodes, region) = self.edit_footprint(id)?;
        self.del_line(id)?;
        Ok(self.rebuild_around(&nodes, region))
    }

    /// Nodes and box affected by removing line `id`, including its areas.
    fn edit_footprint(&self, id: LineId) -> Result<(Vec<NodeId>, BoundBox)> {
        let line = self.live_line(id)?;
        let mut region = line.bbox;
        for side in [Side::Left, Side::Right] {
            match line.side(side) {
                AreaRef::Area(a) => {
                    if let Some(area) = self.area(a) {
                        region.expand(&area.bbox);
                    }
                }
                AreaRef::Isle(i) => {
                    if let Some(isle) = self.isle(i) {
                        region.expand(&isle.bbox);
                    }
                }
                AreaRef::None => {}
            }
        }
        let nodes = line.nodes().map_or_else(Vec::new, |(a, b)| vec![a, b]);
        Ok((nodes, region))
    }

    fn rebuild_after_insert(&mut self, id: LineId) -> BuildReport {
        let Some(line) = self.line(id) else {
            return BuildReport::default();
        };
        let bbox = line.bbox;
        match (line.ty, line.nodes()) {
            (LineType::Boundary, Some((n1, n2))) => self.rebuild_around(&[n1, n2], bbox),
            (LineType::Centroid, _) => {
                let mut report = BuildReport::default();
                if self.options.build_areas && self.options.attach_centroids {
                    self.attach_centroid(id, &mut report);
                }
                self.fill_counts(&mut report);
                report
            }
            _ => {
                let mut report = BuildReport::default();
                self.fill_counts(&mut report);
                report
            }
        }
    }
}

/// Whether two non-adjacent edges of a closed ring cross.
///
/// Edges meeting at a shared vertex are allowed, so rings touching
/// themselves at a node pass.
pub(crate) fn ring_self_intersects(ring: &[nalgebra::Point3<f64>]) -> bool {
    let n = ring.len().saturating_sub(1);
    if n < 3 {
        return false;
    }
    let mut tree = RTree::new(2, 8);
    let rects: Vec<Rect> = (0..n)
        .map(|i| {
            let bbox = BoundBox::from_points([&ring[i], &ring[i + 1]]);
            Rect::from_box(&bbox, 2)
        })
        .collect();
    for (i, r) in rects.iter().enumerate() {
        tree.insert(*r, i as u32 + 1);
    }

    let same = |a: &nalgebra::Point3<f64>, b: &nalgebra::Point3<f64>| a.x == b.x && a.y == b.y;
    let mut crossing = false;
    for i in 0..n {
        let (a, b) = (&ring[i], &ring[i + 1]);
        tree.search(&rects[i], &mut |id| {
            let j = id as usize - 1;
            if j <= i || j == i + 1 || (i == 0 && j == n - 1) {
                return true;
            }
            let (c, d) = (&ring[j], &ring[j + 1]);
            let shares_vertex = same(a, c) || same(a, d) || same(b, c) || same(b, d);
            if !shares_vertex && segments_intersect(a, b, c, d) {
                crossing = true;
                return false;
            }
            true
        });
        if crossing {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildOptions;

    fn boundary(p: &mut Plus, xy: &[(f64, f64)]) -> LineId {
        p.add_line(LineType::Boundary, LinePoints::from_xy(xy), 0).unwrap()
    }

    fn square(p: &mut Plus, x0: f64, y0: f64, size: f64) -> [LineId; 4] {
        let (x1, y1) = (x0 + size, y0 + size);
        [
            boundary(p, &[(x0, y0), (x1, y0)]),
            boundary(p, &[(x1, y0), (x1, y1)]),
            boundary(p, &[(x1, y1), (x0, y1)]),
            boundary(p, &[(x0, y1), (x0, y0)]),
        ]
    }

    fn plus() -> Plus {
        Plus::new(false, BuildOptions::default())
    }

    #[test]
    fn square_builds_one_area_and_outer_isle() {
        let mut p = plus();
        let sides = square(&mut p, 0.0, 0.0, 10.0);
        let report = p.build();
        assert_eq!(report.areas, 1);
        assert_eq!(report.isles, 1);
        assert!(report.is_clean());
        assert_eq!(report.count(IssueKind::IsleOutsideArea), 1);

        let (area_id, area) = p.areas().next().unwrap();
        assert_eq!(area.ring.len(), 4);
        // digitized counter-clockwise, so the area is on the left
        for l in sides {
            assert_eq!(p.line(l).unwrap().side(Side::Left), AreaRef::Area(area_id));
            assert!(matches!(p.line(l).unwrap().side(Side::Right), AreaRef::Isle(_)));
        }
        let pts = p.ring_points(&area.ring);
        assert_eq!(pts.first(), pts.last());
        assert!(signed_area(pts.as_slice()) < 0.0);
        assert!(p.check().is_empty());
    }

    #[test]
    fn shared_boundary_gives_two_areas() {
        let mut p = plus();
        square(&mut p, 0.0, 0.0, 10.0);
        boundary(&mut p, &[(10.0, 0.0), (20.0, 0.0), (20.0, 10.0), (10.0, 10.0)]);
        let report = p.build();
        assert_eq!(report.areas, 2);
        assert_eq!(report.isles, 1);
        assert!(report.is_clean());
        assert!(p.check().is_empty());
    }

    #[test]
    fn hole_is_attached_to_enclosing_area() {
        let mut p = plus();
        square(&mut p, 0.0, 0.0, 10.0);
        square(&mut p, 3.0, 3.0, 4.0);
        p.add_line(LineType::Centroid, LinePoints::from_xy(&[(1.0, 1.0)]), 0)
            .unwrap();
        let report = p.build();
        assert_eq!(report.areas, 2);
        assert_eq!(report.isles, 2);

        let outer = p.find_area(1.0, 1.0).unwrap();
        let inner = p.find_area(5.0, 5.0).unwrap();
        assert_ne!(outer, inner);
        assert_eq!(p.area(outer).unwrap().isles.len(), 1);
        assert!(p.area(outer).unwrap().centroid.is_some());
        assert_eq!(report.count(IssueKind::IsleOutsideArea), 1);
        assert!(p.check().is_empty());
    }

    #[test]
    fn dangling_boundary_is_reported() {
        let mut p = plus();
        boundary(&mut p, &[(0.0, 0.0), (5.0, 0.0), (5.0, 5.0)]);
        let report = p.build();
        assert_eq!(report.areas, 0);
        assert!(report.count(IssueKind::DanglingBoundary) > 0);
    }

    #[test]
    fn duplicate_and_outside_centroids() {
        let mut p = plus();
        square(&mut p, 0.0, 0.0, 10.0);
        let c1 = p.add_line(LineType::Centroid, LinePoints::from_xy(&[(2.0, 2.0)]), 0).unwrap();
        let c2 = p.add_line(LineType::Centroid, LinePoints::from_xy(&[(8.0, 8.0)]), 0).unwrap();
        let c3 = p.add_line(LineType::Centroid, LinePoints::from_xy(&[(50.0, 50.0)]), 0).unwrap();
        let report = p.build();
        assert_eq!(report.count(IssueKind::DuplicateCentroid), 1);
        assert_eq!(report.count(IssueKind::CentroidOutsideArea), 1);
        let (area_id, area) = p.areas().next().unwrap();
        assert_eq!(area.centroid, Some(c1));
        assert_eq!(
            p.line(c2).unwrap().topo,
            LineTopo::Centroid { area: Some(area_id), duplicate: true }
        );
        assert_eq!(p.line(c3).unwrap().topo, LineTopo::Centroid { area: None, duplicate: false });
    }

    #[test]
    fn bow_tie_ring_is_rejected() {
        let mut p = plus();
        boundary(&mut p, &[(0.0, 0.0), (10.0, 10.0), (10.0, 0.0), (0.0, 10.0), (0.0, 0.0)]);
        let report = p.build();
        assert_eq!(report.areas, 0);
        assert!(report.count(IssueKind::SelfIntersectingRing) > 0);
    }

    #[test]
    fn splitting_line_rebuilds_incrementally() {
        let mut p = plus();
        square(&mut p, 0.0, 0.0, 10.0);
        p.build();
        assert_eq!(p.n_areas(), 1);

        let (split, report) = p
            .add_line_and_rebuild(
                LineType::Boundary,
                LinePoints::from_xy(&[(0.0, 0.0), (10.0, 10.0)]),
                0,
            )
            .unwrap();
        assert_eq!(report.areas, 2);
        assert!(p.check().is_empty());

        let report = p.del_line_and_rebuild(split).unwrap();
        assert_eq!(report.areas, 1);
        assert_eq!(report.isles, 1);
        assert!(p.check().is_empty());
    }

    #[test]
    fn isolated_ring_inside_area_becomes_isle_incrementally() {
        let mut p = plus();
        square(&mut p, 0.0, 0.0, 10.0);
        p.build();
        let outer = p.find_area(1.0, 1.0).unwrap();

        p.add_line_and_rebuild(
            LineType::Boundary,
            LinePoints::from_xy(&[(4.0, 4.0), (6.0, 4.0), (6.0, 6.0), (4.0, 6.0), (4.0, 4.0)]),
            0,
        )
        .unwrap();
        assert_eq!(p.n_areas(), 2);
        let outer_now = p.find_area(1.0, 1.0).unwrap();
        assert_eq!(p.area(outer_now).unwrap().isles.len(), 1);
        assert_eq!(outer_now, outer);
        assert!(p.check().is_empty());
    }

    #[test]
    fn self_intersection_check() {
        let pts = LinePoints::from_xy(&[
            (0.0, 0.0),
            (0.0, 4.0),
            (4.0, 4.0),
            (4.0, 0.0),
            (0.0, 0.0),
        ]);
        assert!(!ring_self_intersects(pts.as_slice()));
        let bow = LinePoints::from_xy(&[
            (0.0, 0.0),
            (4.0, 4.0),
            (4.0, 0.0),
            (0.0, 4.0),
            (0.0, 0.0),
        ]);
        assert!(ring_self_intersects(bow.as_slice()));
    }
}
