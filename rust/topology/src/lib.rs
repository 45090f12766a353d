// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # GRASS-Lite Topology
//!
//! Planar vector topology for GIS line data.
//!
//! A dataset is a set of line records (points, lines, boundaries,
//! centroids) stored in a geometry file. This crate builds topology over
//! them: nodes where line ends meet, areas and isles closed by boundaries,
//! centroids attached to the areas containing them. Each primitive kind gets
//! an R-tree spatial index. Topology and indices persist in a portable
//! binary format that reads the same on big- and little-endian hosts.
//!
//! [`Plus`] is the in-memory store; [`Map`] ties it to the geometry and
//! topology files on disk and keeps both in step across edits. The
//! [`snap`] module merges nearby vertices of a set of lines.

pub mod arena;
pub mod cats;
pub mod config;
pub mod construction;
pub mod coor;
pub mod error;
pub mod geometry;
pub mod keys;
pub mod map;
pub mod portable;
pub mod query;
pub mod rtree;
pub mod serialization;
pub mod snap;
pub mod spatial;
pub mod topo_file;

pub use arena::{Area, Isle, Line, LineTopo, Node, Plus};
pub use cats::LineCats;
pub use config::BuildOptions;
pub use construction::{BuildReport, RingWalk};
pub use coor::{CoorFile, CoorRecord};
pub use error::{Error, IssueKind, Result, TopoIssue};
pub use geometry::{BoundBox, LinePoints};
pub use keys::{
    AreaId, AreaRef, DirectedLine, Direction, IsleId, LineId, LineType, NodeId, Side, TypeMask,
};
pub use map::{Map, MapCounts};
pub use portable::{ByteOrder, PortInfo};
pub use snap::{plan_snap, SnapReport};
pub use spatial::{BoxIndex, SpatialIndex};
