// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Read-only topology queries: point location, nearest primitive, area
//! geometry and box selection.
//!
//! Every spatial query starts from the primitive's spatial index and then
//! applies the precise geometric test.

use nalgebra::Point3;

use crate::arena::Plus;
use crate::geometry::{point_in_ring, project_to_segment, signed_area, BoundBox, LinePoints};
use crate::keys::*;

impl Plus {
    /// Area containing point `(x, y)`, excluding its isles.
    ///
    /// When several outer rings contain the point, the smallest area wins.
    pub fn find_area(&self, x: f64, y: f64) -> Option<AreaId> {
        let probe = BoundBox::from_point(&Point3::new(x, y, 0.0));
        let mut query = probe;
        // 2D and 3D indices alike must match any z
        query.t = f64::INFINITY;
        query.b = f64::NEG_INFINITY;

        let mut best: Option<(f64, AreaId)> = None;
        for id in self.area_index.select(&query) {
            let Some(area_id) = AreaId::new(id) else {
                continue;
            };
            let Some(area) = self.area(area_id) else {
                continue;
            };
            let outer = self.ring_points(&area.ring);
            if !point_in_ring(x, y, outer.as_slice()) {
                continue;
            }
            let in_isle = area.isles.iter().any(|isle| {
                self.isle(*isle).is_some_and(|i| {
                    i.bbox.contains_point(x, y)
                        && point_in_ring(x, y, self.ring_points(&i.ring).as_slice())
                })
            });
            if in_isle {
                continue;
            }
            let size = signed_area(outer.as_slice()).abs();
            if best.map_or(true, |(s, _)| size < s) {
                best = Some((size, area_id));
            }
        }
        best.map(|(_, a)| a)
    }

    /// Nearest node within `max_dist` of `p`.
    pub fn find_node(&self, p: &Point3<f64>, max_dist: f64) -> Option<NodeId> {
        self.find_node_near(p, max_dist)
    }

    /// Nearest line of a type in `types` within `max_dist` of `(x, y)`.
    pub fn find_line(&self, x: f64, y: f64, types: TypeMask, max_dist: f64) -> Option<LineId> {
        let p = Point3::new(x, y, 0.0);
        let mut query = BoundBox::from_point(&p).grown(max_dist);
        query.t = f64::INFINITY;
        query.b = f64::NEG_INFINITY;

        let mut best: Option<(f64, LineId)> = None;
        for id in self.line_index.select(&query) {
            let Some(line_id) = LineId::new(id) else {
                continue;
            };
            let Some(line) = self.line(line_id).filter(|l| types.matches(l.ty)) else {
                continue;
            };
            let d2 = line_dist2(&line.points, &p);
            if d2 <= max_dist * max_dist && best.map_or(true, |(b, _)| d2 < b) {
                best = Some((d2, line_id));
            }
        }
        best.map(|(_, l)| l)
    }

    /// What lies left and right of a boundary.
    pub fn line_areas(&self, line: LineId) -> Option<(AreaRef, AreaRef)> {
        let l = self.line(line)?;
        Some((l.side(Side::Left), l.side(Side::Right)))
    }

    /// Outer ring vertices of an area, clockwise and closed.
    pub fn area_points(&self, area: AreaId) -> Option<LinePoints> {
        self.area(area).map(|a| self.ring_points(&a.ring))
    }

    /// Ring vertices of an isle, counter-clockwise and closed.
    pub fn isle_points(&self, isle: IsleId) -> Option<LinePoints> {
        self.isle(isle).map(|i| self.ring_points(&i.ring))
    }

    /// Area of the outer ring minus the areas of its isles.
    pub fn area_size(&self, area: AreaId) -> Option<f64> {
        let a = self.area(area)?;
        let outer = signed_area(self.ring_points(&a.ring).as_slice()).abs();
        let holes: f64 = a
            .isles
            .iter()
            .filter_map(|i| self.isle_points(*i))
            .map(|pts| signed_area(pts.as_slice()).abs())
            .sum();
        Some(outer - holes)
    }

    /// Live lines of a type in `types` whose box overlaps `bbox`.
    pub fn select_lines(&self, bbox: &BoundBox, types: TypeMask) -> Vec<LineId> {
        self.line_index
            .select(bbox)
            .into_iter()
            .filter_map(LineId::new)
            .filter(|l| self.line(*l).is_some_and(|line| types.matches(line.ty)))
            .collect()
    }

    /// Areas whose box overlaps `bbox`.
    pub fn select_areas(&self, bbox: &BoundBox) -> Vec<AreaId> {
        self.area_index
            .select(bbox)
            .into_iter()
            .filter_map(AreaId::new)
            .collect()
    }
}

fn line_dist2(points: &LinePoints, p: &Point3<f64>) -> f64 {
    let pts = points.as_slice();
    if pts.len() == 1 {
        let d = pts[0] - *p;
        return d.x * d.x + d.y * d.y;
    }
    pts.windows(2)
        .map(|w| project_to_segment(p, &w[0], &w[1]).dist2)
        .fold(f64::INFINITY, f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildOptions;
    use approx::assert_relative_eq;

    fn ring(p: &mut Plus, xy: &[(f64, f64)]) -> LineId {
        p.add_line(LineType::Boundary, LinePoints::from_xy(xy), 0).unwrap()
    }

    fn square_with_hole() -> Plus {
        let mut p = Plus::new(false, BuildOptions::default());
        ring(&mut p, &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)]);
        ring(&mut p, &[(4.0, 4.0), (6.0, 4.0), (6.0, 6.0), (4.0, 6.0), (4.0, 4.0)]);
        p.build();
        p
    }

    #[test]
    fn find_area_skips_isle_hole() {
        let p = square_with_hole();
        let outer = p.find_area(1.0, 1.0).unwrap();
        let inner = p.find_area(5.0, 5.0).unwrap();
        assert_ne!(outer, inner);
        assert_eq!(p.find_area(20.0, 20.0), None);
        assert_relative_eq!(p.area_size(outer).unwrap(), 96.0);
        assert_relative_eq!(p.area_size(inner).unwrap(), 4.0);
    }

    #[test]
    fn line_areas_reports_both_sides() {
        let p = square_with_hole();
        let hole_line = LineId::new(2).unwrap();
        let (left, right) = p.line_areas(hole_line).unwrap();
        assert_eq!(left.area(), p.find_area(5.0, 5.0));
        assert!(matches!(right, AreaRef::Isle(_)));
    }

    #[test]
    fn find_line_by_distance() {
        let p = square_with_hole();
        assert_eq!(p.find_line(6.5, 5.0, TypeMask::BOUNDARY, 1.0), LineId::new(2));
        assert_eq!(p.find_line(0.2, 5.0, TypeMask::BOUNDARY, 1.0), LineId::new(1));
        assert_eq!(p.find_line(2.0, 2.0, TypeMask::BOUNDARY, 1.0), None);
        assert_eq!(p.find_line(0.2, 5.0, TypeMask::LINE, 1.0), None);
    }

    #[test]
    fn area_points_are_closed_clockwise() {
        let p = square_with_hole();
        let outer = p.find_area(1.0, 1.0).unwrap();
        let pts = p.area_points(outer).unwrap();
        assert_eq!(pts.first(), pts.last());
        assert!(signed_area(pts.as_slice()) < 0.0);
        let isle = p.area(outer).unwrap().isles[0];
        assert!(signed_area(p.isle_points(isle).unwrap().as_slice()) > 0.0);
    }
}
