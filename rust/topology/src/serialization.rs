// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON snapshot of a topology store.
//!
//! The snapshot lists every live primitive with its id and links in signed
//! form (the same encoding as the topology file), for inspection tools and
//! test fixtures. Loading a snapshot replays its lines under their original
//! ids and rebuilds the topology.

use serde::{Deserialize, Serialize};

use crate::arena::{LineTopo, Plus};
use crate::config::BuildOptions;
use crate::error::{Error, Result};
use crate::geometry::LinePoints;
use crate::keys::*;

#[derive(Debug, Serialize, Deserialize)]
pub struct PlusSnapshot {
    pub with_z: bool,
    pub nodes: Vec<NodeSnapshot>,
    pub lines: Vec<LineSnapshot>,
    pub areas: Vec<AreaSnapshot>,
    pub isles: Vec<IsleSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Incident lines, positive when the line starts here.
    pub lines: Vec<i32>,
    pub angles: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LineSnapshot {
    pub id: u32,
    #[serde(rename = "type")]
    pub ty: String,
    pub offset: u64,
    pub points: Vec<[f64; 3]>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub nodes: Option<[u32; 2]>,
    /// Left and right: positive area, negative isle, 0 none.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sides: Option<[i32; 2]>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub area: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AreaSnapshot {
    pub id: u32,
    pub ring: Vec<i32>,
    pub isles: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub centroid: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IsleSnapshot {
    pub id: u32,
    pub ring: Vec<i32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub area: Option<u32>,
}

impl Plus {
    /// Serializes the store to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_snapshot())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn to_snapshot(&self) -> PlusSnapshot {
        let ring = |r: &[DirectedLine]| -> Vec<i32> { r.iter().map(|dl| dl.to_signed()).collect() };

        let nodes = self
            .nodes()
            .map(|(id, n)| NodeSnapshot {
                id: id.get(),
                x: n.coord.x,
                y: n.coord.y,
                z: n.coord.z,
                lines: n.lines.iter().map(|nl| nl.line.to_signed()).collect(),
                angles: n.lines.iter().map(|nl| nl.angle).collect(),
            })
            .collect();

        let lines = self
            .lines()
            .map(|(id, l)| {
                let (sides, area) = match l.topo {
                    LineTopo::Boundary { left, right, .. } => {
                        (Some([left.to_signed(), right.to_signed()]), None)
                    }
                    LineTopo::Centroid { area, .. } => (None, area.map(AreaId::get)),
                    _ => (None, None),
                };
                LineSnapshot {
                    id: id.get(),
                    ty: l.ty.as_str().to_string(),
                    offset: l.offset,
                    points: l.points.iter().map(|p| [p.x, p.y, p.z]).collect(),
                    nodes: l.nodes().map(|(a, b)| [a.get(), b.get()]),
                    sides,
                    area,
                }
            })
            .collect();

        let areas = self
            .areas()
            .map(|(id, a)| AreaSnapshot {
                id: id.get(),
                ring: ring(&a.ring),
                isles: a.isles.iter().map(|i| i.get()).collect(),
                centroid: a.centroid.map(LineId::get),
            })
            .collect();

        let isles = self
            .isles()
            .map(|(id, i)| IsleSnapshot {
                id: id.get(),
                ring: ring(&i.ring),
                area: i.area.map(AreaId::get),
            })
            .collect();

        PlusSnapshot {
            with_z: self.with_z,
            nodes,
            lines,
            areas,
            isles,
        }
    }

    /// Loads a store from JSON produced by [`Plus::to_json`].
    pub fn from_json(json: &str, options: BuildOptions) -> Result<Self> {
        let snapshot: PlusSnapshot =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        Self::from_snapshot(&snapshot, options)
    }

    /// Replays the snapshot's lines in id order and rebuilds topology.
    ///
    /// Node, area and isle records of the snapshot are derived data and are
    /// not read.
    pub fn from_snapshot(snap: &PlusSnapshot, options: BuildOptions) -> Result<Self> {
        let mut plus = Plus::new(snap.with_z, options);
        let mut lines: Vec<&LineSnapshot> = snap.lines.iter().collect();
        lines.sort_by_key(|l| l.id);

        for l in lines {
            let slot = LineId::new(l.id)
                .ok_or_else(|| Error::Serialization("line id 0 in snapshot".to_string()))?
                .index();
            if slot < plus.lines.len() {
                return Err(Error::Serialization(format!("line {} listed twice", l.id)));
            }
            while plus.lines.len() < slot {
                plus.lines.push(None);
            }
            let ty: LineType = l.ty.parse().map_err(Error::Serialization)?;
            let points = LinePoints::from_vec(
                l.points
                    .iter()
                    .map(|p| nalgebra::Point3::new(p[0], p[1], p[2]))
                    .collect(),
            );
            plus.add_line(ty, points, l.offset)?;
        }
        plus.build();
        Ok(plus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_map() -> Plus {
        let mut p = Plus::new(false, BuildOptions::default());
        p.add_line(
            LineType::Boundary,
            LinePoints::from_xy(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)]),
            0,
        )
        .unwrap();
        p.add_line(LineType::Centroid, LinePoints::from_xy(&[(5.0, 5.0)]), 0)
            .unwrap();
        p.build();
        p
    }

    #[test]
    fn roundtrip_empty_store() {
        let p = Plus::new(true, BuildOptions::default());
        let restored = Plus::from_json(&p.to_json().unwrap(), BuildOptions::default()).unwrap();
        assert!(restored.with_z());
        assert_eq!(restored.n_lines(), 0);
    }

    #[test]
    fn snapshot_lists_links() {
        let p = square_map();
        let snap = p.to_snapshot();
        assert_eq!(snap.lines.len(), 2);
        assert_eq!(snap.lines[0].ty, "boundary");
        assert!(snap.lines[0].sides.is_some());
        assert_eq!(snap.areas.len(), 1);
        assert_eq!(snap.areas[0].centroid, Some(2));
        assert_eq!(snap.lines[1].area, Some(snap.areas[0].id));
    }

    #[test]
    fn roundtrip_keeps_ids_across_gaps() {
        let mut p = square_map();
        let extra = p
            .add_line(LineType::Line, LinePoints::from_xy(&[(20.0, 0.0), (30.0, 0.0)]), 7)
            .unwrap();
        p.del_line(LineId::new(2).unwrap()).unwrap();

        let restored = Plus::from_json(&p.to_json().unwrap(), BuildOptions::default()).unwrap();
        assert_eq!(restored.n_lines(), 2);
        assert!(restored.line(LineId::new(2).unwrap()).is_none());
        assert_eq!(restored.line(extra).unwrap().offset, 7);
        assert_eq!(restored.n_areas(), p.n_areas());
    }

    #[test]
    fn bad_json_is_a_serialization_error() {
        let err = Plus::from_json("{", BuildOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
