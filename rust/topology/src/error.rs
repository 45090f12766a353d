// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for topology operations.
//!
//! Fatal conditions (corrupt input, impossible layouts, bad ids) are
//! [`Error`] values propagated with `?`. Topology inconsistencies found while
//! building are not errors: they are collected as [`TopoIssue`]s so a caller
//! sees every problem of a build in one pass.

use serde::Serialize;

use crate::keys::{AreaId, IsleId, LineId, NodeId};

/// Result type alias for topology operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during topology operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying file I/O failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary input ended in the middle of a value.
    #[error("truncated input: expected {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },

    /// A host primitive does not have the fixed on-disk width.
    #[error("host size of {kind} is {native} bytes, format requires {portable}")]
    PortSize {
        kind: &'static str,
        native: usize,
        portable: usize,
    },

    /// A byte of the canonical test pattern is missing from the native encoding.
    #[error("non-conforming {0} representation: test pattern byte not found")]
    NonConformingLayout(&'static str),

    /// An offset does not fit in the offset width of the file.
    #[error("offset {0} does not fit in {1} bytes")]
    OffsetOverflow(u64, usize),

    /// File written by a format version this library cannot read.
    #[error("unsupported {what} format version {major}.{minor}")]
    UnsupportedVersion {
        what: &'static str,
        major: u8,
        minor: u8,
    },

    /// Spatial index block failed validation while loading.
    #[error("corrupt spatial index: {0}")]
    CorruptIndex(String),

    /// Topology file failed validation while loading.
    #[error("corrupt topology: {0}")]
    CorruptTopology(String),

    /// Geometry file record failed validation while loading.
    #[error("corrupt geometry record at offset {offset}: {reason}")]
    CorruptGeometry { offset: u64, reason: String },

    /// Attempt to access a deleted line.
    #[error("line {0} is dead")]
    DeadLine(LineId),

    /// A referenced primitive does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Geometry unusable for the requested line type.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Text input could not be parsed.
    #[error("parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Kind of topology inconsistency found while building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IssueKind {
    /// Ring walk reached a node with no further boundary.
    DanglingBoundary,
    /// Ring walk ran into a line already used by the ring.
    UnclosedRing,
    /// Two boundaries leave a node at the same angle.
    SameAngle,
    /// A closed ring encloses zero area.
    InconsistentWinding,
    /// A closed ring crosses itself.
    SelfIntersectingRing,
    /// Boundary side already claimed by another area or isle.
    SideAlreadyAssigned,
    /// Isle not contained in any area.
    IsleOutsideArea,
    /// Centroid outside every area.
    CentroidOutsideArea,
    /// More than one centroid inside an area.
    DuplicateCentroid,
}

/// Primitive a [`TopoIssue`] is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IssueSubject {
    Node(NodeId),
    Line(LineId),
    Area(AreaId),
    Isle(IsleId),
}

/// A named topology inconsistency attached to the offending primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TopoIssue {
    pub kind: IssueKind,
    pub subject: IssueSubject,
}

impl TopoIssue {
    pub fn line(kind: IssueKind, line: LineId) -> Self {
        Self {
            kind,
            subject: IssueSubject::Line(line),
        }
    }

    pub fn isle(kind: IssueKind, isle: IsleId) -> Self {
        Self {
            kind,
            subject: IssueSubject::Isle(isle),
        }
    }

    pub fn area(kind: IssueKind, area: AreaId) -> Self {
        Self {
            kind,
            subject: IssueSubject::Area(area),
        }
    }
}

impl std::fmt::Display for TopoIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.subject {
            IssueSubject::Node(id) => write!(f, "{:?} at node {}", self.kind, id),
            IssueSubject::Line(id) => write!(f, "{:?} at line {}", self.kind, id),
            IssueSubject::Area(id) => write!(f, "{:?} at area {}", self.kind, id),
            IssueSubject::Isle(id) => write!(f, "{:?} at isle {}", self.kind, id),
        }
    }
}
