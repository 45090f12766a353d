// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Spatial index over primitive bounding boxes.
//!
//! One [`SpatialIndex`] is kept per primitive kind (nodes, lines, areas,
//! isles). It wraps an [`RTree`] together with an id → box map, so deleting
//! by id needs no caller-supplied box and deleting twice is a no-op.

use std::io::{Read, Write};

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::geometry::BoundBox;
use crate::portable::{PortReader, PortWriter};
use crate::rtree::{Rect, RTree};

/// Box index contract used by the primitive store.
pub trait BoxIndex {
    /// Adds `id` under `bbox`. Re-inserting an id replaces its box.
    fn insert(&mut self, bbox: &BoundBox, id: u32);

    /// Removes `id`. Returns `false` if it was not indexed.
    fn delete(&mut self, id: u32) -> bool;

    /// Visits ids whose box overlaps `query` until `visit` returns `false`.
    fn search(&self, query: &BoundBox, visit: &mut dyn FnMut(u32) -> bool);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct SpatialIndex {
    tree: RTree,
    boxes: FxHashMap<u32, BoundBox>,
}

impl SpatialIndex {
    pub fn new(with_z: bool, node_capacity: usize) -> Self {
        Self {
            tree: RTree::new(if with_z { 3 } else { 2 }, node_capacity),
            boxes: FxHashMap::default(),
        }
    }

    fn rect(&self, bbox: &BoundBox) -> Rect {
        Rect::from_box(bbox, self.tree.dims())
    }

    pub fn with_z(&self) -> bool {
        self.tree.dims() == 3
    }

    pub fn contains(&self, id: u32) -> bool {
        self.boxes.contains_key(&id)
    }

    /// Box recorded for `id`.
    pub fn bbox(&self, id: u32) -> Option<&BoundBox> {
        self.boxes.get(&id)
    }

    /// Ids whose box overlaps `query`, in ascending order.
    pub fn select(&self, query: &BoundBox) -> Vec<u32> {
        let mut ids = Vec::new();
        self.search(query, &mut |id| {
            ids.push(id);
            true
        });
        ids.sort_unstable();
        ids
    }

    pub fn clear(&mut self) {
        self.tree.clear();
        self.boxes.clear();
    }

    /// Replaces the whole content with `items`.
    pub fn rebuild<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = (u32, BoundBox)>,
    {
        self.clear();
        for (id, bbox) in items {
            self.insert(&bbox, id);
        }
    }

    pub fn tree(&self) -> &RTree {
        &self.tree
    }

    pub fn write_to<W: Write>(&self, w: &mut PortWriter<W>) -> Result<()> {
        self.tree.write_to(w)
    }

    /// Loads an index block; `with_z` must match the store it belongs to.
    pub fn read_from<R: Read>(r: &mut PortReader<R>, with_z: bool) -> Result<Self> {
        let tree = RTree::read_from(r)?;
        let dims = if with_z { 3 } else { 2 };
        if tree.dims() != dims {
            return Err(Error::CorruptIndex(format!(
                "index has {} dimensions, store has {dims}",
                tree.dims()
            )));
        }
        let mut boxes = FxHashMap::default();
        for (id, rect) in tree.entries() {
            let bbox = BoundBox {
                n: rect.max[1],
                s: rect.min[1],
                e: rect.max[0],
                w: rect.min[0],
                t: rect.max[2],
                b: rect.min[2],
            };
            if boxes.insert(id, bbox).is_some() {
                return Err(Error::CorruptIndex(format!("id {id} indexed twice")));
            }
        }
        Ok(Self { tree, boxes })
    }
}

impl BoxIndex for SpatialIndex {
    fn insert(&mut self, bbox: &BoundBox, id: u32) {
        if let Some(old) = self.boxes.remove(&id) {
            let rect = self.rect(&old);
            self.tree.remove(&rect, id);
        }
        let rect = self.rect(bbox);
        self.tree.insert(rect, id);
        self.boxes.insert(id, *bbox);
    }

    fn delete(&mut self, id: u32) -> bool {
        let Some(old) = self.boxes.remove(&id) else {
            return false;
        };
        let rect = self.rect(&old);
        self.tree.remove(&rect, id)
    }

    fn search(&self, query: &BoundBox, visit: &mut dyn FnMut(u32) -> bool) {
        let rect = self.rect(query);
        self.tree.search(&rect, visit);
    }

    fn len(&self) -> usize {
        self.boxes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portable::{ByteOrder, PortInfo};
    use nalgebra::Point3;

    fn pt(x: f64, y: f64) -> BoundBox {
        BoundBox::from_point(&Point3::new(x, y, 0.0))
    }

    #[test]
    fn delete_is_idempotent() {
        let mut index = SpatialIndex::new(false, 4);
        index.insert(&pt(1.0, 1.0), 1);
        index.insert(&pt(2.0, 2.0), 2);
        assert!(index.delete(1));
        assert!(!index.delete(1));
        assert_eq!(index.len(), 1);
        assert_eq!(index.select(&pt(1.0, 1.0).grown(5.0)), vec![2]);
    }

    #[test]
    fn reinsert_replaces_box() {
        let mut index = SpatialIndex::new(false, 4);
        index.insert(&pt(1.0, 1.0), 7);
        index.insert(&pt(50.0, 50.0), 7);
        assert_eq!(index.len(), 1);
        assert!(index.select(&pt(1.0, 1.0)).is_empty());
        assert_eq!(index.select(&pt(50.0, 50.0)), vec![7]);
    }

    #[test]
    fn select_is_inclusive_and_sorted() {
        let mut index = SpatialIndex::new(false, 4);
        for id in (1..=20).rev() {
            index.insert(&pt(id as f64, 0.0), id);
        }
        let query = BoundBox {
            n: 0.0,
            s: 0.0,
            e: 8.0,
            w: 5.0,
            t: 0.0,
            b: 0.0,
        };
        assert_eq!(index.select(&query), vec![5, 6, 7, 8]);
    }

    #[test]
    fn block_round_trip_restores_boxes() {
        let mut index = SpatialIndex::new(false, 4);
        for id in 1..=30 {
            index.insert(&pt(id as f64, (id * 2) as f64), id);
        }
        let port = PortInfo::new(ByteOrder::Big).unwrap();
        let mut w = PortWriter::new(Vec::new(), port);
        index.write_to(&mut w).unwrap();
        let bytes = w.into_inner();

        let mut r = PortReader::new(bytes.as_slice(), port);
        let mut loaded = SpatialIndex::read_from(&mut r, false).unwrap();
        assert_eq!(loaded.len(), 30);
        assert_eq!(loaded.bbox(4), Some(&pt(4.0, 8.0)));
        assert!(loaded.delete(4));
        assert_eq!(loaded.len(), 29);
    }

    #[test]
    fn dimension_mismatch_is_corrupt() {
        let index = SpatialIndex::new(true, 4);
        let port = PortInfo::new(ByteOrder::Little).unwrap();
        let mut w = PortWriter::new(Vec::new(), port);
        index.write_to(&mut w).unwrap();
        let bytes = w.into_inner();
        let mut r = PortReader::new(bytes.as_slice(), port);
        assert!(matches!(
            SpatialIndex::read_from(&mut r, false),
            Err(Error::CorruptIndex(_))
        ));
    }
}
