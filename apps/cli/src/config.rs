// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tool configuration loaded from environment variables.

use std::path::PathBuf;

use grass_lite_topology::BuildOptions;

/// Tool configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding map directories.
    pub mapset: PathBuf,
    /// Endpoints closer than this share a node.
    pub node_tolerance: f64,
    /// Maximum branches per R-tree node.
    pub rtree_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = BuildOptions::default();
        Self {
            mapset: std::env::var("GVTOPO_MAPSET")
                .unwrap_or_else(|_| ".".into())
                .into(),
            node_tolerance: std::env::var("GVTOPO_NODE_TOLERANCE")
                .unwrap_or_else(|_| defaults.node_tolerance.to_string())
                .parse()
                .unwrap_or(defaults.node_tolerance),
            rtree_capacity: std::env::var("GVTOPO_RTREE_CAPACITY")
                .unwrap_or_else(|_| defaults.rtree_node_capacity.to_string())
                .parse()
                .unwrap_or(defaults.rtree_node_capacity),
        }
    }

    pub fn map_dir(&self, name: &str) -> PathBuf {
        self.mapset.join(name)
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            rtree_node_capacity: self.rtree_capacity,
            ..BuildOptions::default().with_node_tolerance(self.node_tolerance)
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_follow_config() {
        let config = Config {
            mapset: PathBuf::from("/data"),
            node_tolerance: 0.25,
            rtree_capacity: 16,
        };
        let opts = config.build_options();
        assert_eq!(opts.node_tolerance, 0.25);
        assert_eq!(opts.rtree_node_capacity, 16);
        assert!(opts.build_areas);
        assert_eq!(config.map_dir("roads"), PathBuf::from("/data/roads"));
    }
}
