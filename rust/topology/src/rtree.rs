// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory R-tree with Guttman's quadratic split.
//!
//! Tree nodes live in an arena (`Vec<Node>` plus a free list) and reference
//! each other by index. Leaves (level 0) hold primitive ids; inner nodes hold
//! child node indices. Node cover volumes use the bounding sphere of a
//! rectangle, so degenerate (point) rectangles still split sensibly.

use std::io::{Read, Write};

use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::geometry::BoundBox;
use crate::portable::{PortReader, PortWriter};

/// Default maximum number of branches per node.
pub const DEFAULT_NODE_CAPACITY: usize = 8;
/// Largest node capacity accepted when loading a tree.
pub const MAX_NODE_CAPACITY: usize = 64;
const MAX_HEIGHT: u32 = 64;

/// Axis-aligned rectangle with 2 or 3 active dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Rect {
    pub fn from_box(b: &BoundBox, dims: usize) -> Self {
        if dims == 3 {
            Self {
                min: [b.w, b.s, b.b],
                max: [b.e, b.n, b.t],
            }
        } else {
            Self {
                min: [b.w, b.s, 0.0],
                max: [b.e, b.n, 0.0],
            }
        }
    }

    pub fn combine(&self, other: &Rect) -> Rect {
        let mut r = *self;
        for d in 0..3 {
            r.min[d] = r.min[d].min(other.min[d]);
            r.max[d] = r.max[d].max(other.max[d]);
        }
        r
    }

    pub fn overlaps(&self, other: &Rect, dims: usize) -> bool {
        (0..dims).all(|d| self.min[d] <= other.max[d] && self.max[d] >= other.min[d])
    }

    pub fn contains(&self, other: &Rect, dims: usize) -> bool {
        (0..dims).all(|d| self.min[d] <= other.min[d] && self.max[d] >= other.max[d])
    }

    /// Volume of the bounding sphere, up to a constant factor.
    fn spherical_volume(&self, dims: usize) -> f64 {
        let r2: f64 = (0..dims)
            .map(|d| {
                let half = (self.max[d] - self.min[d]) / 2.0;
                half * half
            })
            .sum();
        r2.sqrt().powi(dims as i32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Child {
    Node(usize),
    Entry(u32),
}

#[derive(Debug, Clone, Copy)]
struct Branch {
    rect: Rect,
    child: Child,
}

#[derive(Debug, Clone)]
struct Node {
    /// 0 for leaves.
    level: u32,
    branches: SmallVec<[Branch; DEFAULT_NODE_CAPACITY + 1]>,
}

/// An R-tree mapping rectangles to `u32` ids.
#[derive(Debug, Clone)]
pub struct RTree {
    dims: usize,
    capacity: usize,
    min_fill: usize,
    nodes: Vec<Node>,
    free: Vec<usize>,
    root: usize,
    len: usize,
}

impl RTree {
    /// Creates an empty tree over `dims` (2 or 3) dimensions.
    pub fn new(dims: usize, capacity: usize) -> Self {
        let capacity = capacity.clamp(2, MAX_NODE_CAPACITY);
        let mut tree = Self {
            dims: if dims == 3 { 3 } else { 2 },
            capacity,
            min_fill: (capacity / 2).max(1),
            nodes: Vec::new(),
            free: Vec::new(),
            root: 0,
            len: 0,
        };
        tree.root = tree.alloc_node(0);
        tree
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Level of the root; 0 when the root is a leaf.
    pub fn height(&self) -> u32 {
        self.nodes[self.root].level
    }

    /// Number of live tree nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.len = 0;
        self.root = self.alloc_node(0);
    }

    fn alloc_node(&mut self, level: u32) -> usize {
        let node = Node {
            level,
            branches: SmallVec::new(),
        };
        if let Some(i) = self.free.pop() {
            self.nodes[i] = node;
            i
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    fn free_node(&mut self, i: usize) {
        self.nodes[i].branches.clear();
        self.free.push(i);
    }

    fn cover(&self, n: usize) -> Rect {
        let branches = &self.nodes[n].branches;
        let mut rect = branches[0].rect;
        for b in branches.iter().skip(1) {
            rect = rect.combine(&b.rect);
        }
        rect
    }

    /// Adds an entry. Duplicate rectangles are allowed.
    pub fn insert(&mut self, rect: Rect, id: u32) {
        self.insert_branch(
            Branch {
                rect,
                child: Child::Entry(id),
            },
            0,
        );
        self.len += 1;
    }

    fn insert_branch(&mut self, branch: Branch, level: u32) {
        if let Some(sibling) = self.insert_rec(self.root, branch, level) {
            let old_root = self.root;
            let new_root = self.alloc_node(self.nodes[old_root].level + 1);
            let first = Branch {
                rect: self.cover(old_root),
                child: Child::Node(old_root),
            };
            let second = Branch {
                rect: self.cover(sibling),
                child: Child::Node(sibling),
            };
            self.nodes[new_root].branches.push(first);
            self.nodes[new_root].branches.push(second);
            self.root = new_root;
        }
    }

    /// Returns the index of a new sibling node if `n` was split.
    fn insert_rec(&mut self, n: usize, branch: Branch, level: u32) -> Option<usize> {
        if self.nodes[n].level > level {
            let i = self.pick_branch(n, &branch.rect);
            let Child::Node(child) = self.nodes[n].branches[i].child else {
                unreachable!("inner node holds an entry");
            };
            match self.insert_rec(child, branch, level) {
                None => {
                    let b = &mut self.nodes[n].branches[i];
                    b.rect = b.rect.combine(&branch.rect);
                    None
                }
                Some(sibling) => {
                    self.nodes[n].branches[i].rect = self.cover(child);
                    let new_branch = Branch {
                        rect: self.cover(sibling),
                        child: Child::Node(sibling),
                    };
                    self.add_branch(n, new_branch)
                }
            }
        } else {
            self.add_branch(n, branch)
        }
    }

    fn add_branch(&mut self, n: usize, branch: Branch) -> Option<usize> {
        if self.nodes[n].branches.len() < self.capacity {
            self.nodes[n].branches.push(branch);
            None
        } else {
            Some(self.split(n, branch))
        }
    }

    /// Branch needing the least enlargement; ties go to the smaller cover.
    fn pick_branch(&self, n: usize, rect: &Rect) -> usize {
        let mut best = 0;
        let mut best_incr = f64::INFINITY;
        let mut best_vol = f64::INFINITY;
        for (i, b) in self.nodes[n].branches.iter().enumerate() {
            let vol = b.rect.spherical_volume(self.dims);
            let incr = b.rect.combine(rect).spherical_volume(self.dims) - vol;
            if incr < best_incr || (incr == best_incr && vol < best_vol) {
                best = i;
                best_incr = incr;
                best_vol = vol;
            }
        }
        best
    }

    /// Quadratic split of a full node plus one extra branch.
    fn split(&mut self, n: usize, extra: Branch) -> usize {
        let level = self.nodes[n].level;
        let mut all: Vec<Branch> = self.nodes[n].branches.drain(..).collect();
        all.push(extra);
        let dims = self.dims;
        let total = all.len();

        let volumes: Vec<f64> = all.iter().map(|b| b.rect.spherical_volume(dims)).collect();
        let (mut seed0, mut seed1) = (0, 1);
        let mut worst = f64::NEG_INFINITY;
        for i in 0..total - 1 {
            for j in i + 1..total {
                let joined = all[i].rect.combine(&all[j].rect).spherical_volume(dims);
                let waste = joined - volumes[i] - volumes[j];
                if waste > worst {
                    worst = waste;
                    seed0 = i;
                    seed1 = j;
                }
            }
        }

        let mut group: Vec<Option<usize>> = vec![None; total];
        let mut cover = [all[seed0].rect, all[seed1].rect];
        let mut count = [1usize, 1usize];
        group[seed0] = Some(0);
        group[seed1] = Some(1);
        let mut remaining = total - 2;

        while remaining > 0 {
            // one group must take every remaining branch to reach min fill
            if count[0] + remaining == self.min_fill {
                Self::assign_rest(&mut group, 0);
                break;
            }
            if count[1] + remaining == self.min_fill {
                Self::assign_rest(&mut group, 1);
                break;
            }

            let vol0 = cover[0].spherical_volume(dims);
            let vol1 = cover[1].spherical_volume(dims);
            let mut chosen = 0;
            let mut chosen_group = 0;
            let mut max_diff = f64::NEG_INFINITY;
            for (i, b) in all.iter().enumerate() {
                if group[i].is_some() {
                    continue;
                }
                let d0 = cover[0].combine(&b.rect).spherical_volume(dims) - vol0;
                let d1 = cover[1].combine(&b.rect).spherical_volume(dims) - vol1;
                let diff = (d1 - d0).abs();
                if diff > max_diff {
                    max_diff = diff;
                    chosen = i;
                    chosen_group = if d0 < d1 {
                        0
                    } else if d1 < d0 {
                        1
                    } else if vol0 < vol1 {
                        0
                    } else if vol1 < vol0 {
                        1
                    } else if count[0] <= count[1] {
                        0
                    } else {
                        1
                    };
                }
            }
            group[chosen] = Some(chosen_group);
            cover[chosen_group] = cover[chosen_group].combine(&all[chosen].rect);
            count[chosen_group] += 1;
            remaining -= 1;
        }

        let sibling = self.alloc_node(level);
        for (b, g) in all.into_iter().zip(group) {
            match g {
                Some(1) => self.nodes[sibling].branches.push(b),
                _ => self.nodes[n].branches.push(b),
            }
        }
        sibling
    }

    fn assign_rest(group: &mut [Option<usize>], g: usize) {
        for slot in group.iter_mut().filter(|s| s.is_none()) {
            *slot = Some(g);
        }
    }

    /// Removes the entry `id` stored under `rect`. Returns `false` if absent.
    pub fn remove(&mut self, rect: &Rect, id: u32) -> bool {
        let mut orphans: Vec<(Branch, u32)> = Vec::new();
        if !self.remove_rec(self.root, rect, id, &mut orphans) {
            return false;
        }
        self.len -= 1;

        for (branch, level) in orphans {
            self.insert_branch(branch, level);
        }

        // shorten the tree while the root has a single child
        loop {
            let root = &self.nodes[self.root];
            if root.level == 0 || root.branches.len() != 1 {
                break;
            }
            let Child::Node(child) = root.branches[0].child else {
                break;
            };
            let old = self.root;
            self.root = child;
            self.free_node(old);
        }
        true
    }

    fn remove_rec(
        &mut self,
        n: usize,
        rect: &Rect,
        id: u32,
        orphans: &mut Vec<(Branch, u32)>,
    ) -> bool {
        let level = self.nodes[n].level;
        if level == 0 {
            let pos = self.nodes[n]
                .branches
                .iter()
                .position(|b| b.child == Child::Entry(id));
            return match pos {
                Some(i) => {
                    self.nodes[n].branches.remove(i);
                    true
                }
                None => false,
            };
        }

        let dims = self.dims;
        for i in 0..self.nodes[n].branches.len() {
            let b = self.nodes[n].branches[i];
            if !b.rect.contains(rect, dims) {
                continue;
            }
            let Child::Node(child) = b.child else {
                continue;
            };
            if self.remove_rec(child, rect, id, orphans) {
                if self.nodes[child].branches.len() < self.min_fill {
                    let child_level = self.nodes[child].level;
                    orphans.extend(
                        self.nodes[child]
                            .branches
                            .iter()
                            .map(|&ob| (ob, child_level)),
                    );
                    self.free_node(child);
                    self.nodes[n].branches.remove(i);
                } else {
                    self.nodes[n].branches[i].rect = self.cover(child);
                }
                return true;
            }
        }
        false
    }

    /// Calls `visit` for every entry whose rectangle overlaps `query`.
    ///
    /// Stops early and returns `false` as soon as `visit` returns `false`.
    pub fn search(&self, query: &Rect, visit: &mut dyn FnMut(u32) -> bool) -> bool {
        let mut stack = vec![self.root];
        while let Some(n) = stack.pop() {
            for b in &self.nodes[n].branches {
                if !b.rect.overlaps(query, self.dims) {
                    continue;
                }
                match b.child {
                    Child::Node(c) => stack.push(c),
                    Child::Entry(id) => {
                        if !visit(id) {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }

    /// Writes the tree header followed by a pre-order dump of its nodes.
    pub fn write_to<W: Write>(&self, w: &mut PortWriter<W>) -> Result<()> {
        w.write_int(self.dims as i32)?;
        w.write_int(self.capacity as i32)?;
        w.write_int(self.node_count() as i32)?;
        w.write_int(self.len as i32)?;
        w.write_int(self.height() as i32)?;
        self.write_node(w, self.root)
    }

    fn write_node<W: Write>(&self, w: &mut PortWriter<W>, n: usize) -> Result<()> {
        let node = &self.nodes[n];
        w.write_int(node.level as i32)?;
        w.write_int(node.branches.len() as i32)?;
        for b in &node.branches {
            w.write_f64s(&b.rect.min[..self.dims])?;
            w.write_f64s(&b.rect.max[..self.dims])?;
            match b.child {
                Child::Entry(id) => w.write_int(id as i32)?,
                Child::Node(c) => self.write_node(w, c)?,
            }
        }
        Ok(())
    }

    /// Reads a tree written by [`RTree::write_to`], validating its structure.
    pub fn read_from<R: Read>(r: &mut PortReader<R>) -> Result<Self> {
        let dims = read_index_int(r)?;
        let capacity = read_index_int(r)?;
        let node_count = read_index_int(r)?;
        let entries = read_index_int(r)?;
        let height = read_index_int(r)?;

        if dims != 2 && dims != 3 {
            return Err(corrupt(format!("dimension {dims}")));
        }
        if !(2..=MAX_NODE_CAPACITY as i32).contains(&capacity) {
            return Err(corrupt(format!("node capacity {capacity}")));
        }
        if node_count < 1 || entries < 0 || !(0..=MAX_HEIGHT as i32).contains(&height) {
            return Err(corrupt(format!(
                "header counts nodes={node_count} entries={entries} height={height}"
            )));
        }

        let mut tree = Self::new(dims as usize, capacity as usize);
        tree.nodes.clear();
        let mut seen_entries = 0usize;
        tree.root = tree.read_node(r, height as u32, true, &mut seen_entries)?;

        if tree.nodes.len() != node_count as usize {
            return Err(corrupt(format!(
                "header lists {node_count} nodes, found {}",
                tree.nodes.len()
            )));
        }
        if seen_entries != entries as usize {
            return Err(corrupt(format!(
                "header lists {entries} entries, found {seen_entries}"
            )));
        }
        tree.len = seen_entries;
        tree.validate().map_err(corrupt)?;
        Ok(tree)
    }

    fn read_node<R: Read>(
        &mut self,
        r: &mut PortReader<R>,
        expected_level: u32,
        is_root: bool,
        entries: &mut usize,
    ) -> Result<usize> {
        let level = read_index_int(r)?;
        let count = read_index_int(r)?;
        if level != expected_level as i32 {
            return Err(corrupt(format!(
                "node level {level}, expected {expected_level}"
            )));
        }
        if count < 0 || count as usize > self.capacity {
            return Err(corrupt(format!("node with {count} branches")));
        }
        if count == 0 && (level > 0 || !is_root) {
            return Err(corrupt(format!("empty node at level {level}")));
        }

        let n = self.alloc_node(expected_level);
        for _ in 0..count {
            let mut rect = Rect {
                min: [0.0; 3],
                max: [0.0; 3],
            };
            for d in 0..self.dims {
                rect.min[d] = read_index_f64(r)?;
            }
            for d in 0..self.dims {
                rect.max[d] = read_index_f64(r)?;
            }
            if (0..self.dims).any(|d| !(rect.min[d] <= rect.max[d])) {
                return Err(corrupt("inverted branch rectangle".to_string()));
            }
            let child = if expected_level == 0 {
                let id = read_index_int(r)?;
                if id <= 0 {
                    return Err(corrupt(format!("entry id {id}")));
                }
                *entries += 1;
                Child::Entry(id as u32)
            } else {
                Child::Node(self.read_node(r, expected_level - 1, false, entries)?)
            };
            self.nodes[n].branches.push(Branch { rect, child });
        }
        Ok(n)
    }

    /// Collects every `(id, rect)` pair; order follows the tree layout.
    pub fn entries(&self) -> Vec<(u32, Rect)> {
        let mut out = Vec::with_capacity(self.len);
        let mut stack = vec![self.root];
        while let Some(n) = stack.pop() {
            for b in &self.nodes[n].branches {
                match b.child {
                    Child::Node(c) => stack.push(c),
                    Child::Entry(id) => out.push((id, b.rect)),
                }
            }
        }
        out
    }

    /// Checks structural invariants; returns a description of the first violation.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let mut count = 0;
        self.validate_node(self.root, self.height(), &mut count)?;
        if count != self.len {
            return Err(format!("len {} but {} entries reachable", self.len, count));
        }
        Ok(())
    }

    fn validate_node(
        &self,
        n: usize,
        level: u32,
        count: &mut usize,
    ) -> std::result::Result<(), String> {
        let node = &self.nodes[n];
        if node.level != level {
            return Err(format!("node {n} at level {} expected {level}", node.level));
        }
        if node.branches.len() > self.capacity {
            return Err(format!("node {n} overfull"));
        }
        for b in &node.branches {
            match b.child {
                Child::Entry(_) => *count += 1,
                Child::Node(c) => {
                    if self.nodes[c].branches.is_empty() {
                        return Err(format!("node {c} is empty"));
                    }
                    if !b.rect.contains(&self.cover(c), self.dims) {
                        return Err(format!("branch of node {n} does not cover child {c}"));
                    }
                    self.validate_node(c, level - 1, count)?;
                }
            }
        }
        Ok(())
    }
}

fn corrupt(msg: String) -> Error {
    Error::CorruptIndex(msg)
}

fn read_index_int<R: Read>(r: &mut PortReader<R>) -> Result<i32> {
    r.read_int().map_err(truncation_is_corruption)
}

fn read_index_f64<R: Read>(r: &mut PortReader<R>) -> Result<f64> {
    r.read_f64().map_err(truncation_is_corruption)
}

fn truncation_is_corruption(e: Error) -> Error {
    match e {
        Error::Truncated { expected, got } => Error::CorruptIndex(format!(
            "unexpected end of index block (needed {expected} bytes, had {got})"
        )),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portable::{ByteOrder, PortInfo};

    fn point_rect(x: f64, y: f64) -> Rect {
        Rect {
            min: [x, y, 0.0],
            max: [x, y, 0.0],
        }
    }

    fn window(x0: f64, y0: f64, x1: f64, y1: f64) -> Rect {
        Rect {
            min: [x0, y0, 0.0],
            max: [x1, y1, 0.0],
        }
    }

    fn found(tree: &RTree, q: &Rect) -> Vec<u32> {
        let mut ids = Vec::new();
        tree.search(q, &mut |id| {
            ids.push(id);
            true
        });
        ids.sort_unstable();
        ids
    }

    fn grid_tree(n: u32) -> RTree {
        let mut tree = RTree::new(2, 4);
        for i in 0..n {
            tree.insert(point_rect((i % 10) as f64, (i / 10) as f64), i + 1);
        }
        tree
    }

    #[test]
    fn insert_splits_and_stays_valid() {
        let tree = grid_tree(100);
        assert_eq!(tree.len(), 100);
        assert!(tree.height() >= 2);
        tree.validate().unwrap();
        assert_eq!(found(&tree, &window(-1.0, -1.0, 20.0, 20.0)).len(), 100);
    }

    #[test]
    fn search_matches_brute_force() {
        let tree = grid_tree(100);
        let q = window(2.5, 3.0, 5.0, 4.5);
        let expected: Vec<u32> = (0..100u32)
            .filter(|i| {
                let (x, y) = ((i % 10) as f64, (i / 10) as f64);
                (2.5..=5.0).contains(&x) && (3.0..=4.5).contains(&y)
            })
            .map(|i| i + 1)
            .collect();
        assert_eq!(found(&tree, &q), expected);
    }

    #[test]
    fn search_can_stop_early() {
        let tree = grid_tree(50);
        let mut visited = 0;
        let completed = tree.search(&window(-1.0, -1.0, 20.0, 20.0), &mut |_| {
            visited += 1;
            visited < 3
        });
        assert!(!completed);
        assert_eq!(visited, 3);
    }

    #[test]
    fn remove_condenses_tree() {
        let mut tree = grid_tree(100);
        for i in 0..90u32 {
            let r = point_rect((i % 10) as f64, (i / 10) as f64);
            assert!(tree.remove(&r, i + 1));
            tree.validate().unwrap();
        }
        assert_eq!(tree.len(), 10);
        assert!(!tree.remove(&point_rect(0.0, 0.0), 1));
        assert_eq!(found(&tree, &window(-1.0, -1.0, 20.0, 20.0)), (91..=100).collect::<Vec<_>>());
    }

    #[test]
    fn duplicate_rectangles_are_kept() {
        let mut tree = RTree::new(2, 4);
        for id in 1..=10 {
            tree.insert(point_rect(1.0, 1.0), id);
        }
        tree.validate().unwrap();
        assert_eq!(found(&tree, &point_rect(1.0, 1.0)).len(), 10);
    }

    #[test]
    fn three_dimensional_overlap() {
        let mut tree = RTree::new(3, 8);
        tree.insert(
            Rect {
                min: [0.0, 0.0, 0.0],
                max: [1.0, 1.0, 1.0],
            },
            1,
        );
        let above = Rect {
            min: [0.0, 0.0, 5.0],
            max: [1.0, 1.0, 6.0],
        };
        assert!(found(&tree, &above).is_empty());
    }

    #[test]
    fn persistence_round_trip() {
        let tree = grid_tree(37);
        let port = PortInfo::new(ByteOrder::Little).unwrap();
        let mut w = PortWriter::new(Vec::new(), port);
        tree.write_to(&mut w).unwrap();
        let bytes = w.into_inner();

        let mut r = PortReader::new(bytes.as_slice(), port);
        let loaded = RTree::read_from(&mut r).unwrap();
        loaded.validate().unwrap();
        assert_eq!(loaded.len(), 37);
        assert_eq!(loaded.height(), tree.height());
        let q = window(0.0, 0.0, 4.0, 2.0);
        assert_eq!(found(&loaded, &q), found(&tree, &q));
    }

    #[test]
    fn truncated_block_is_corrupt_not_empty() {
        let tree = grid_tree(20);
        let port = PortInfo::new(ByteOrder::Big).unwrap();
        let mut w = PortWriter::new(Vec::new(), port);
        tree.write_to(&mut w).unwrap();
        let mut bytes = w.into_inner();
        bytes.truncate(bytes.len() - 5);

        let mut r = PortReader::new(bytes.as_slice(), port);
        assert!(matches!(RTree::read_from(&mut r), Err(Error::CorruptIndex(_))));
    }

    #[test]
    fn shrunken_branch_rectangle_is_corrupt() {
        let mut tree = RTree::new(2, 4);
        for i in 0..40u32 {
            tree.insert(point_rect((i % 8) as f64, (i / 8) as f64), i + 1);
        }
        assert!(tree.height() >= 1);
        let port = PortInfo::new(ByteOrder::Little).unwrap();
        let mut w = PortWriter::new(Vec::new(), port);
        tree.write_to(&mut w).unwrap();
        let mut bytes = w.into_inner();

        // five header ints, then the root's level and count; the first
        // branch's max corner is overwritten with its min corner
        let min = bytes[28..44].to_vec();
        bytes[44..60].copy_from_slice(&min);

        let mut r = PortReader::new(bytes.as_slice(), port);
        let err = RTree::read_from(&mut r).unwrap_err();
        assert!(matches!(err, Error::CorruptIndex(_)), "{err}");
    }

    #[test]
    fn empty_leaf_below_root_is_corrupt() {
        let port = PortInfo::new(ByteOrder::Big).unwrap();
        let mut w = PortWriter::new(Vec::new(), port);
        // dims, capacity, nodes, entries, height
        for v in [2, 4, 2, 0, 1] {
            w.write_int(v).unwrap();
        }
        // root: level 1 with one branch pointing at an empty leaf
        w.write_int(1).unwrap();
        w.write_int(1).unwrap();
        w.write_f64s(&[0.0, 0.0, 1.0, 1.0]).unwrap();
        w.write_int(0).unwrap();
        w.write_int(0).unwrap();
        let bytes = w.into_inner();

        let mut r = PortReader::new(bytes.as_slice(), port);
        let err = RTree::read_from(&mut r).unwrap_err();
        assert!(matches!(err, Error::CorruptIndex(_)), "{err}");
    }

    #[test]
    fn empty_root_leaf_loads() {
        let tree = RTree::new(2, 4);
        let port = PortInfo::new(ByteOrder::Big).unwrap();
        let mut w = PortWriter::new(Vec::new(), port);
        tree.write_to(&mut w).unwrap();
        let bytes = w.into_inner();
        let mut r = PortReader::new(bytes.as_slice(), port);
        assert!(RTree::read_from(&mut r).unwrap().is_empty());
    }
}
