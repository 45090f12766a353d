// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

use crate::rtree::DEFAULT_NODE_CAPACITY;

/// Options controlling how a [`Plus`](crate::Plus) is built and maintained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Endpoints closer than this share a node. 0 means exact match.
    pub node_tolerance: f64,
    /// Maximum branches per R-tree node.
    pub rtree_node_capacity: usize,
    /// Build areas and isles from boundaries.
    pub build_areas: bool,
    /// Attach centroids to the areas containing them.
    pub attach_centroids: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            node_tolerance: 0.0,
            rtree_node_capacity: DEFAULT_NODE_CAPACITY,
            build_areas: true,
            attach_centroids: true,
        }
    }
}

impl BuildOptions {
    /// Options for building nodes and line incidence only.
    pub fn nodes_only() -> Self {
        Self {
            build_areas: false,
            attach_centroids: false,
            ..Self::default()
        }
    }

    pub fn with_node_tolerance(mut self, tolerance: f64) -> Self {
        self.node_tolerance = tolerance.max(0.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let opts: BuildOptions = serde_json::from_str(r#"{"node_tolerance": 0.5}"#).unwrap();
        assert_eq!(opts.node_tolerance, 0.5);
        assert_eq!(opts.rtree_node_capacity, DEFAULT_NODE_CAPACITY);
        assert!(opts.build_areas);
    }

    #[test]
    fn negative_tolerance_is_clamped() {
        assert_eq!(BuildOptions::default().with_node_tolerance(-1.0).node_tolerance, 0.0);
    }
}
