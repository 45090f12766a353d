// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Vertex snapping.
//!
//! Vertices of the target lines closer than a threshold are merged onto a
//! single anchor, and anchors lying close to a segment interior are inserted
//! into that segment.
//!
//! Anchor assignment is first come, first served in scan order (lines in the
//! order given, then vertices in line order). A vertex is bound to the first
//! anchor that claims it, not to the nearest one, so clusters depend on the
//! scan order. A fixed input and order always gives the same result.

use nalgebra::Point3;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use tracing::{debug, info};

use crate::arena::Plus;
use crate::error::{Error, Result};
use crate::geometry::{project_to_segment, BoundBox, LinePoints};
use crate::keys::{LineId, LineType, TypeMask};
use crate::rtree::{Rect, RTree};

/// Counts of one snapping run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SnapReport {
    /// Distinct vertex positions that became anchors.
    pub anchors: usize,
    /// Vertices moved onto their anchor.
    pub moved: usize,
    /// Vertices inserted into segments.
    pub inserted: usize,
    pub rewritten: usize,
    pub deleted: usize,
}

/// What snapping does to one line.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapChange {
    Rewrite(LinePoints),
    /// The line collapsed to a single distinct point.
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapEdit {
    pub line: LineId,
    pub change: SnapChange,
}

/// Edits computed by [`plan_snap`], in target line order.
#[derive(Debug, Clone, Default)]
pub struct SnapPlan {
    pub edits: Vec<SnapEdit>,
    pub report: SnapReport,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum VertexState {
    Unassigned,
    Anchor,
    /// Bound to the anchor with this point index.
    Snap(usize),
}

#[derive(Debug, Clone)]
struct SnapPoint {
    coord: Point3<f64>,
    state: VertexState,
}

fn xy_key(p: &Point3<f64>) -> (u64, u64) {
    // +0.0 and -0.0 are one position
    ((p.x + 0.0).to_bits(), (p.y + 0.0).to_bits())
}

fn point_rect(p: &Point3<f64>) -> Rect {
    Rect::from_box(&BoundBox::from_point(p), 2)
}

/// Distinct vertex positions of the target lines with their point index.
struct PointSet {
    points: Vec<SnapPoint>,
    lookup: FxHashMap<(u64, u64), usize>,
    tree: RTree,
}

impl PointSet {
    fn new() -> Self {
        Self {
            points: Vec::new(),
            lookup: FxHashMap::default(),
            tree: RTree::new(2, crate::rtree::DEFAULT_NODE_CAPACITY),
        }
    }

    fn register(&mut self, p: &Point3<f64>) {
        let key = xy_key(p);
        if self.lookup.contains_key(&key) {
            return;
        }
        let index = self.points.len();
        self.points.push(SnapPoint {
            coord: *p,
            state: VertexState::Unassigned,
        });
        self.lookup.insert(key, index);
        self.tree.insert(point_rect(p), index as u32 + 1);
    }

    fn within(&self, query: &BoundBox) -> Vec<usize> {
        let mut found = Vec::new();
        self.tree.search(&Rect::from_box(query, 2), &mut |id| {
            found.push(id as usize - 1);
            true
        });
        found.sort_unstable();
        found
    }

    fn state_of(&self, p: &Point3<f64>) -> Option<VertexState> {
        self.lookup.get(&xy_key(p)).map(|&i| self.points[i].state)
    }
}

/// Pushes the anchors lying within `threshold` of the interior of `a`-`b`
/// onto `out`, ordered along the segment, and repeats on every piece the
/// insertions create. `on_segment` holds anchors already placed on the
/// original segment.
fn insert_anchors(
    set: &PointSet,
    a: &Point3<f64>,
    b: &Point3<f64>,
    threshold: f64,
    on_segment: &mut FxHashSet<usize>,
    out: &mut Vec<Point3<f64>>,
    report: &mut SnapReport,
) {
    let thresh2 = threshold * threshold;
    let seg_box = BoundBox::from_points([a, b]).grown(threshold);

    let mut found: Vec<(f64, usize)> = Vec::new();
    for k in set.within(&seg_box) {
        let sp = &set.points[k];
        if sp.state != VertexState::Anchor || on_segment.contains(&k) {
            continue;
        }
        let c = &sp.coord;
        let at_end = (c.x == a.x && c.y == a.y) || (c.x == b.x && c.y == b.y);
        if at_end {
            continue;
        }
        let proj = project_to_segment(c, a, b);
        if proj.t > 0.0 && proj.t < 1.0 && proj.dist2 <= thresh2 {
            found.push((proj.along, k));
        }
    }
    if found.is_empty() {
        return;
    }
    found.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)));
    on_segment.extend(found.iter().map(|&(_, k)| k));

    let mut prev = *a;
    for (_, k) in found {
        let c = set.points[k].coord;
        let proj = project_to_segment(&c, a, b);
        let p = Point3::new(c.x, c.y, a.z + proj.t * (b.z - a.z));
        insert_anchors(set, &prev, &p, threshold, on_segment, out, report);
        out.push(p);
        report.inserted += 1;
        prev = p;
    }
    insert_anchors(set, &prev, b, threshold, on_segment, out, report);
}

/// Computes the snapping edits for `lines` without touching the store.
///
/// Only linear lines take part; other types in `lines` are skipped.
pub fn plan_snap(plus: &Plus, lines: &[LineId], threshold: f64) -> Result<SnapPlan> {
    if !(threshold >= 0.0) {
        return Err(Error::InvalidGeometry(format!(
            "snap threshold must be non-negative, got {threshold}"
        )));
    }
    let thresh2 = threshold * threshold;

    let mut targets = Vec::with_capacity(lines.len());
    let mut seen = FxHashSet::default();
    for &id in lines {
        if !seen.insert(id) {
            continue;
        }
        let line = plus.live_line(id)?;
        if TypeMask::LINES.matches(line.ty) {
            targets.push((id, line.ty, &line.points));
        } else {
            debug!(line = %id, ty = %line.ty, "not a linear line, skipped");
        }
    }

    let mut set = PointSet::new();
    for (_, _, points) in &targets {
        for p in points.iter() {
            set.register(p);
        }
    }

    // pass 1: anchors claim unassigned neighbours in scan order
    let mut report = SnapReport::default();
    for i in 0..set.points.len() {
        if set.points[i].state != VertexState::Unassigned {
            continue;
        }
        set.points[i].state = VertexState::Anchor;
        report.anchors += 1;
        let anchor = set.points[i].coord;
        let query = BoundBox::from_point(&anchor).grown(threshold);
        for j in set.within(&query) {
            if j == i || set.points[j].state != VertexState::Unassigned {
                continue;
            }
            let q = set.points[j].coord;
            let (dx, dy) = (q.x - anchor.x, q.y - anchor.y);
            if dx * dx + dy * dy <= thresh2 {
                set.points[j].state = VertexState::Snap(i);
            }
        }
    }

    // pass 2: move snapped vertices, then insert anchors near segments
    let mut edits = Vec::new();
    for (id, _ty, original) in &targets {
        let mut pts: Vec<Point3<f64>> = original.iter().copied().collect();
        for p in &mut pts {
            if let Some(VertexState::Snap(a)) = set.state_of(p) {
                let anchor = set.points[a].coord;
                p.x = anchor.x;
                p.y = anchor.y;
                report.moved += 1;
            }
        }

        let mut out = Vec::with_capacity(pts.len());
        for w in pts.windows(2) {
            out.push(w[0]);
            let mut on_segment = FxHashSet::default();
            insert_anchors(&set, &w[0], &w[1], threshold, &mut on_segment, &mut out, &mut report);
        }
        if let Some(last) = pts.last() {
            out.push(*last);
        }

        let mut snapped = LinePoints::from_vec(out);
        snapped.prune();
        if snapped.len() < 2 {
            debug!(line = %id, "line collapsed by snapping");
            edits.push(SnapEdit {
                line: *id,
                change: SnapChange::Delete,
            });
            report.deleted += 1;
        } else if snapped != **original {
            edits.push(SnapEdit {
                line: *id,
                change: SnapChange::Rewrite(snapped),
            });
            report.rewritten += 1;
        }
    }

    Ok(SnapPlan { edits, report })
}

impl Plus {
    /// Snaps `lines` with `threshold` and applies the result in place.
    ///
    /// Rewritten lines keep their id and offset; topology around every edit
    /// is rebuilt.
    pub fn snap_lines(&mut self, lines: &[LineId], threshold: f64) -> Result<SnapReport> {
        let plan = plan_snap(self, lines, threshold)?;
        for edit in plan.edits {
            match edit.change {
                SnapChange::Rewrite(points) => {
                    let (ty, offset) = {
                        let line = self.live_line(edit.line)?;
                        (line.ty, line.offset)
                    };
                    self.replace_line_and_rebuild(edit.line, ty, points, offset)?;
                }
                SnapChange::Delete => {
                    self.del_line_and_rebuild(edit.line)?;
                }
            }
        }
        log_report(&plan.report, threshold);
        Ok(plan.report)
    }

    /// Ids of every live line of type `ty`, ascending.
    pub fn line_ids_of(&self, ty: LineType) -> Vec<LineId> {
        self.lines()
            .filter(|(_, l)| l.ty == ty)
            .map(|(id, _)| id)
            .collect()
    }
}

pub(crate) fn log_report(report: &SnapReport, threshold: f64) {
    info!(
        threshold,
        anchors = report.anchors,
        moved = report.moved,
        inserted = report.inserted,
        rewritten = report.rewritten,
        deleted = report.deleted,
        "snapped lines"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildOptions;

    fn plus_with(lines: &[&[(f64, f64)]]) -> (Plus, Vec<LineId>) {
        let mut p = Plus::new(false, BuildOptions::default());
        let ids = lines
            .iter()
            .map(|xy| p.add_line(LineType::Line, LinePoints::from_xy(xy), 0).unwrap())
            .collect();
        (p, ids)
    }

    #[test]
    fn vertices_within_threshold_merge() {
        let (mut p, ids) = plus_with(&[&[(0.0, 0.0), (5.0, 0.0)], &[(5.05, 0.02), (9.0, 0.0)]]);
        let report = p.snap_lines(&ids, 0.1).unwrap();
        assert_eq!(report.moved, 1);
        assert_eq!(report.rewritten, 1);
        assert_eq!(p.line(ids[1]).unwrap().points.first(), Some(&Point3::new(5.0, 0.0, 0.0)));
        assert_eq!(p.n_nodes(), 3);
    }

    #[test]
    fn first_anchor_wins_over_nearest() {
        // b is nearer to c, but a claims it first
        let (p, ids) = plus_with(&[
            &[(0.0, 0.0), (0.0, 5.0)],
            &[(0.9, 0.0), (0.9, 5.0)],
            &[(1.5, 0.0), (1.5, 5.0)],
        ]);
        let plan = plan_snap(&p, &ids, 1.0).unwrap();
        let moved_b = plan.edits.iter().find(|e| e.line == ids[1]).unwrap();
        match &moved_b.change {
            SnapChange::Rewrite(pts) => assert_eq!(pts.first(), Some(&Point3::new(0.0, 0.0, 0.0))),
            other => panic!("unexpected {other:?}"),
        }
        // c stays an anchor because a does not reach it
        assert!(!plan.edits.iter().any(|e| e.line == ids[2]));
    }

    #[test]
    fn anchor_inserted_into_passing_segment() {
        let (p, ids) = plus_with(&[&[(0.0, 0.0), (10.0, 0.0)], &[(4.0, 0.05), (4.0, 5.0)]]);
        let plan = plan_snap(&p, &ids, 0.1).unwrap();
        assert_eq!(plan.report.inserted, 1);
        let SnapChange::Rewrite(pts) = &plan.edits[0].change else {
            panic!("expected rewrite");
        };
        assert_eq!(pts.len(), 3);
        assert_eq!(pts.as_slice()[1], Point3::new(4.0, 0.05, 0.0));
    }

    #[test]
    fn insertions_ordered_along_segment() {
        let (p, ids) = plus_with(&[
            &[(0.0, 0.0), (10.0, 0.0)],
            &[(7.0, 0.05), (7.0, 5.0)],
            &[(3.0, -0.05), (3.0, -5.0)],
        ]);
        let plan = plan_snap(&p, &ids, 0.1).unwrap();
        let SnapChange::Rewrite(pts) = &plan.edits[0].change else {
            panic!("expected rewrite");
        };
        let xs: Vec<f64> = pts.iter().map(|q| q.x).collect();
        assert_eq!(xs, vec![0.0, 3.0, 7.0, 10.0]);
    }

    #[test]
    fn pieces_of_a_split_segment_are_retested() {
        // (2.5, 0.12) is too far from the original segment but close to the
        // piece ending at the inserted (5, 0.09)
        let (mut p, ids) = plus_with(&[
            &[(0.0, 0.0), (10.0, 0.0)],
            &[(5.0, 0.09), (5.0, 5.0)],
            &[(2.5, 0.12), (2.5, 5.0)],
        ]);
        let first = p.snap_lines(&ids, 0.1).unwrap();
        assert_eq!(first.inserted, 2);
        let xs: Vec<f64> = p.line(ids[0]).unwrap().points.iter().map(|q| q.x).collect();
        assert_eq!(xs, vec![0.0, 2.5, 5.0, 10.0]);

        let second = p.snap_lines(&ids, 0.1).unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.rewritten, 0);
    }

    #[test]
    fn repeated_targets_are_snapped_once() {
        let (mut p, ids) = plus_with(&[&[(0.0, 0.0), (0.05, 0.0)], &[(0.0, 0.0), (3.0, 0.0)]]);
        let report = p.snap_lines(&[ids[0], ids[1], ids[0]], 0.1).unwrap();
        assert_eq!(report.deleted, 1);
        assert!(p.line(ids[0]).is_none());
    }

    #[test]
    fn collapsed_line_is_deleted() {
        let (mut p, ids) = plus_with(&[&[(0.0, 0.0), (0.05, 0.0)], &[(0.0, 0.0), (3.0, 0.0)]]);
        let report = p.snap_lines(&ids, 0.1).unwrap();
        assert_eq!(report.deleted, 1);
        assert!(p.line(ids[0]).is_none());
        assert!(p.line(ids[1]).is_some());
        assert!(p.check().is_empty());
    }

    #[test]
    fn unrelated_lines_untouched() {
        let (p, ids) = plus_with(&[&[(0.0, 0.0), (1.0, 0.0)], &[(50.0, 50.0), (60.0, 50.0)]]);
        let plan = plan_snap(&p, &ids, 0.5).unwrap();
        assert!(plan.edits.is_empty());
        assert_eq!(plan.report.anchors, 4);
    }

    #[test]
    fn negative_threshold_rejected() {
        let (p, ids) = plus_with(&[&[(0.0, 0.0), (1.0, 0.0)]]);
        assert!(matches!(plan_snap(&p, &ids, -1.0), Err(Error::InvalidGeometry(_))));
    }
}
