// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometric primitives and queries used by topology building and snapping.
//!
//! Computes line angles at nodes, point/segment distances, ring orientation
//! and point-in-ring containment using standard computational geometry
//! algorithms (no external kernel required).

use nalgebra::{Point3, Vector2};
use serde::Serialize;

/// Angle stored for points and degenerate lines; ignored by ring walks.
pub const DEGENERATE_ANGLE: f32 = -9.0;

/// Axis-aligned bounding box: north/south (y), east/west (x), top/bottom (z).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundBox {
    pub n: f64,
    pub s: f64,
    pub e: f64,
    pub w: f64,
    pub t: f64,
    pub b: f64,
}

impl BoundBox {
    /// A box that contains nothing; expanding it by any point yields that point.
    pub fn empty() -> Self {
        Self {
            n: f64::NEG_INFINITY,
            s: f64::INFINITY,
            e: f64::NEG_INFINITY,
            w: f64::INFINITY,
            t: f64::NEG_INFINITY,
            b: f64::INFINITY,
        }
    }

    pub fn from_point(p: &Point3<f64>) -> Self {
        Self {
            n: p.y,
            s: p.y,
            e: p.x,
            w: p.x,
            t: p.z,
            b: p.z,
        }
    }

    pub fn from_points<'a>(pts: impl IntoIterator<Item = &'a Point3<f64>>) -> Self {
        let mut bbox = Self::empty();
        for p in pts {
            bbox.extend_point(p);
        }
        bbox
    }

    pub fn is_empty(&self) -> bool {
        self.w > self.e || self.s > self.n
    }

    pub fn extend_point(&mut self, p: &Point3<f64>) {
        self.n = self.n.max(p.y);
        self.s = self.s.min(p.y);
        self.e = self.e.max(p.x);
        self.w = self.w.min(p.x);
        self.t = self.t.max(p.z);
        self.b = self.b.min(p.z);
    }

    pub fn expand(&mut self, other: &BoundBox) {
        self.n = self.n.max(other.n);
        self.s = self.s.min(other.s);
        self.e = self.e.max(other.e);
        self.w = self.w.min(other.w);
        self.t = self.t.max(other.t);
        self.b = self.b.min(other.b);
    }

    /// Box grown by `d` on every side.
    pub fn grown(&self, d: f64) -> Self {
        Self {
            n: self.n + d,
            s: self.s - d,
            e: self.e + d,
            w: self.w - d,
            t: self.t + d,
            b: self.b - d,
        }
    }

    /// Closed-interval intersection; z is only tested when `with_z` is set.
    pub fn overlaps(&self, other: &BoundBox, with_z: bool) -> bool {
        if self.w > other.e || self.e < other.w || self.s > other.n || self.n < other.s {
            return false;
        }
        !with_z || (self.b <= other.t && self.t >= other.b)
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.w && x <= self.e && y >= self.s && y <= self.n
    }

    pub fn contains_box(&self, other: &BoundBox) -> bool {
        other.w >= self.w && other.e <= self.e && other.s >= self.s && other.n <= self.n
    }
}

impl Default for BoundBox {
    fn default() -> Self {
        Self::empty()
    }
}

/// Ordered vertices of a line record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinePoints {
    points: Vec<Point3<f64>>,
}

impl LinePoints {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    pub fn from_vec(points: Vec<Point3<f64>>) -> Self {
        Self { points }
    }

    /// Builds 2D points (z = 0).
    pub fn from_xy(xy: &[(f64, f64)]) -> Self {
        Self {
            points: xy.iter().map(|&(x, y)| Point3::new(x, y, 0.0)).collect(),
        }
    }

    pub fn push(&mut self, x: f64, y: f64, z: f64) {
        self.points.push(Point3::new(x, y, z));
    }

    pub fn insert(&mut self, index: usize, p: Point3<f64>) {
        self.points.insert(index, p);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn as_slice(&self) -> &[Point3<f64>] {
        &self.points
    }

    pub fn as_mut_slice(&mut self) -> &mut [Point3<f64>] {
        &mut self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point3<f64>> {
        self.points.iter()
    }

    pub fn first(&self) -> Option<&Point3<f64>> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&Point3<f64>> {
        self.points.last()
    }

    pub fn into_vec(self) -> Vec<Point3<f64>> {
        self.points
    }

    pub fn bbox(&self) -> BoundBox {
        BoundBox::from_points(&self.points)
    }

    /// Removes consecutive duplicate vertices. Returns the number removed.
    pub fn prune(&mut self) -> usize {
        let before = self.points.len();
        self.points.dedup();
        before - self.points.len()
    }

    /// Number of distinct vertices after removing consecutive duplicates.
    pub fn distinct_len(&self) -> usize {
        if self.points.is_empty() {
            return 0;
        }
        1 + self.points.windows(2).filter(|w| w[0] != w[1]).count()
    }

    /// Planar length of the polyline.
    pub fn length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| (xy(&w[1]) - xy(&w[0])).norm())
            .sum()
    }
}

impl<'a> IntoIterator for &'a LinePoints {
    type Item = &'a Point3<f64>;
    type IntoIter = std::slice::Iter<'a, Point3<f64>>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

fn xy(p: &Point3<f64>) -> Vector2<f64> {
    Vector2::new(p.x, p.y)
}

/// Angle of the line leaving its first vertex, in radians.
///
/// Uses the first vertex that differs from the start; a line without such a
/// vertex is degenerate and gets [`DEGENERATE_ANGLE`].
pub fn begin_angle(points: &LinePoints) -> f32 {
    let pts = points.as_slice();
    let Some(first) = pts.first() else {
        return DEGENERATE_ANGLE;
    };
    pts.iter()
        .skip(1)
        .find(|p| p.x != first.x || p.y != first.y)
        .map_or(DEGENERATE_ANGLE, |p| {
            (p.y - first.y).atan2(p.x - first.x) as f32
        })
}

/// Angle of the line leaving its last vertex backwards, in radians.
pub fn end_angle(points: &LinePoints) -> f32 {
    let pts = points.as_slice();
    let Some(last) = pts.last() else {
        return DEGENERATE_ANGLE;
    };
    pts.iter()
        .rev()
        .skip(1)
        .find(|p| p.x != last.x || p.y != last.y)
        .map_or(DEGENERATE_ANGLE, |p| {
            (p.y - last.y).atan2(p.x - last.x) as f32
        })
}

/// Closest point on segment `a`-`b` to `p` (planar).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentProjection {
    /// Squared distance from `p` to the closest point.
    pub dist2: f64,
    /// Position of the closest point along the segment, 0 at `a`, 1 at `b`.
    pub t: f64,
    /// Distance from `a` to the closest point.
    pub along: f64,
}

pub fn project_to_segment(p: &Point3<f64>, a: &Point3<f64>, b: &Point3<f64>) -> SegmentProjection {
    let ab = xy(b) - xy(a);
    let ap = xy(p) - xy(a);
    let len2 = ab.norm_squared();
    let t = if len2 == 0.0 {
        0.0
    } else {
        (ap.dot(&ab) / len2).clamp(0.0, 1.0)
    };
    let closest = xy(a) + ab * t;
    SegmentProjection {
        dist2: (xy(p) - closest).norm_squared(),
        t,
        along: t * len2.sqrt(),
    }
}

/// Squared planar distance between two points.
pub fn dist2(a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    (xy(a) - xy(b)).norm_squared()
}

/// Shoelace area of a closed ring; positive when counter-clockwise.
pub fn signed_area(ring: &[Point3<f64>]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..ring.len() {
        let p = &ring[i];
        let q = &ring[(i + 1) % ring.len()];
        sum += p.x * q.y - q.x * p.y;
    }
    sum / 2.0
}

/// Crossing-number test; points on the ring edge may go either way.
pub fn point_in_ring(x: f64, y: f64, ring: &[Point3<f64>]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (&ring[i], &ring[j]);
        if (pi.y > y) != (pj.y > y) {
            let x_cross = pj.x + (y - pj.y) * (pi.x - pj.x) / (pi.y - pj.y);
            if x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Whether `p` lies on any edge of the ring within `eps`.
pub fn point_on_ring(p: &Point3<f64>, ring: &[Point3<f64>], eps: f64) -> bool {
    let eps2 = eps * eps;
    ring.windows(2)
        .any(|w| project_to_segment(p, &w[0], &w[1]).dist2 <= eps2)
}

fn orient(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn on_segment(a: &Point3<f64>, b: &Point3<f64>, p: &Point3<f64>) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

/// Whether segments `a`-`b` and `c`-`d` share at least one point.
pub fn segments_intersect(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    d: &Point3<f64>,
) -> bool {
    let d1 = orient(c, d, a);
    let d2 = orient(c, d, b);
    let d3 = orient(a, b, c);
    let d4 = orient(a, b, d);
    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }
    (d1 == 0.0 && on_segment(c, d, a))
        || (d2 == 0.0 && on_segment(c, d, b))
        || (d3 == 0.0 && on_segment(a, b, c))
        || (d4 == 0.0 && on_segment(a, b, d))
}
