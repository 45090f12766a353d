// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Primitive id types for arena-based storage.
//!
//! Every primitive gets a stable, 1-based integer id; 0 is the null id and is
//! never handed out. Signed ids used on disk (direction at a node, area vs.
//! isle on a boundary side) are decoded into [`DirectedLine`] and [`AreaRef`]
//! at the serialization boundary.

use bitflags::bitflags;
use serde::Serialize;

macro_rules! primitive_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Creates an id from its 1-based number. Returns `None` for 0.
            pub fn new(n: u32) -> Option<Self> {
                (n != 0).then_some(Self(n))
            }

            /// Id for the arena slot at `index` (0-based).
            pub(crate) fn from_index(index: usize) -> Self {
                Self(index as u32 + 1)
            }

            /// The 1-based id number.
            pub fn get(self) -> u32 {
                self.0
            }

            /// 0-based arena slot.
            pub(crate) fn index(self) -> usize {
                self.0 as usize - 1
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

primitive_id! {
    /// Id of a node (point where line endpoints meet).
    NodeId
}

primitive_id! {
    /// Id of a line record (point, line, boundary, centroid, ...).
    LineId
}

primitive_id! {
    /// Id of an area (outer ring formed by boundaries).
    AreaId
}

primitive_id! {
    /// Id of an isle (hole inside an area).
    IsleId
}

/// Traversal direction of a line relative to its digitized vertex order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    /// First vertex to last vertex. At a node: the line starts here.
    Forward,
    /// Last vertex to first vertex. At a node: the line ends here.
    Backward,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

/// A line together with a traversal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DirectedLine {
    pub line: LineId,
    pub direction: Direction,
}

impl DirectedLine {
    pub fn forward(line: LineId) -> Self {
        Self {
            line,
            direction: Direction::Forward,
        }
    }

    pub fn backward(line: LineId) -> Self {
        Self {
            line,
            direction: Direction::Backward,
        }
    }

    pub fn reversed(self) -> Self {
        Self {
            line: self.line,
            direction: self.direction.reverse(),
        }
    }

    pub fn is_forward(self) -> bool {
        self.direction == Direction::Forward
    }

    /// Signed on-disk form: positive forward, negative backward.
    pub fn to_signed(self) -> i32 {
        let n = self.line.get() as i32;
        if self.is_forward() {
            n
        } else {
            -n
        }
    }

    /// Decodes the signed on-disk form. Returns `None` for 0.
    pub fn from_signed(n: i32) -> Option<Self> {
        let line = LineId::new(n.unsigned_abs())?;
        Some(if n > 0 {
            Self::forward(line)
        } else {
            Self::backward(line)
        })
    }
}

/// What lies on one side of a boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum AreaRef {
    #[default]
    None,
    Area(AreaId),
    Isle(IsleId),
}

impl AreaRef {
    pub fn is_none(self) -> bool {
        self == AreaRef::None
    }

    pub fn area(self) -> Option<AreaId> {
        match self {
            AreaRef::Area(a) => Some(a),
            _ => None,
        }
    }

    /// Signed on-disk form: 0 none, positive area, negative isle.
    pub fn to_signed(self) -> i32 {
        match self {
            AreaRef::None => 0,
            AreaRef::Area(a) => a.get() as i32,
            AreaRef::Isle(i) => -(i.get() as i32),
        }
    }

    pub fn from_signed(n: i32) -> Self {
        if n > 0 {
            AreaId::new(n as u32).map_or(AreaRef::None, AreaRef::Area)
        } else {
            IsleId::new(n.unsigned_abs()).map_or(AreaRef::None, AreaRef::Isle)
        }
    }
}

/// Side of a boundary, looking along its forward direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Side {
    Left,
    Right,
}

/// Geometry type of a line record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LineType {
    Point,
    Line,
    Boundary,
    Centroid,
    Face,
    Kernel,
}

impl LineType {
    pub const ALL: [LineType; 6] = [
        LineType::Point,
        LineType::Line,
        LineType::Boundary,
        LineType::Centroid,
        LineType::Face,
        LineType::Kernel,
    ];

    /// Code stored in geometry and topology files.
    pub fn store_code(self) -> u8 {
        match self {
            LineType::Point => 1,
            LineType::Line => 2,
            LineType::Boundary => 3,
            LineType::Centroid => 4,
            LineType::Face => 5,
            LineType::Kernel => 6,
        }
    }

    pub fn from_store_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => LineType::Point,
            2 => LineType::Line,
            3 => LineType::Boundary,
            4 => LineType::Centroid,
            5 => LineType::Face,
            6 => LineType::Kernel,
            _ => return None,
        })
    }

    pub fn mask(self) -> TypeMask {
        match self {
            LineType::Point => TypeMask::POINT,
            LineType::Line => TypeMask::LINE,
            LineType::Boundary => TypeMask::BOUNDARY,
            LineType::Centroid => TypeMask::CENTROID,
            LineType::Face => TypeMask::FACE,
            LineType::Kernel => TypeMask::KERNEL,
        }
    }

    /// Single-vertex types.
    pub fn is_point_like(self) -> bool {
        TypeMask::POINTS.contains(self.mask()) || self == LineType::Kernel
    }

    /// Types that connect two nodes.
    pub fn is_linear(self) -> bool {
        TypeMask::LINES.contains(self.mask())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LineType::Point => "point",
            LineType::Line => "line",
            LineType::Boundary => "boundary",
            LineType::Centroid => "centroid",
            LineType::Face => "face",
            LineType::Kernel => "kernel",
        }
    }
}

impl std::fmt::Display for LineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LineType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        LineType::ALL
            .into_iter()
            .find(|ty| ty.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown line type '{s}'"))
    }
}

bitflags! {
    /// Set of line types, used to filter queries.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TypeMask: u8 {
        const POINT = 0x01;
        const LINE = 0x02;
        const BOUNDARY = 0x04;
        const CENTROID = 0x08;
        const FACE = 0x10;
        const KERNEL = 0x20;
        const POINTS = Self::POINT.bits() | Self::CENTROID.bits();
        const LINES = Self::LINE.bits() | Self::BOUNDARY.bits();
    }
}

impl TypeMask {
    pub fn matches(self, ty: LineType) -> bool {
        self.contains(ty.mask())
    }
}
