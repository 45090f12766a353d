// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! gvtopo - import, build, snap and inspect vector maps.

mod ascii;
mod config;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use grass_lite_topology::{BuildReport, LineId, LineType, Map};
use serde::Serialize;
use tracing::{info, warn};

use crate::ascii::{AsciiMap, AsciiRecord};
use crate::config::Config;

#[derive(Parser)]
#[command(name = "gvtopo")]
#[command(about = "Vector topology tools: import, build, snap and inspect maps")]
#[command(version)]
struct Cli {
    /// Directory holding map directories (overrides GVTOPO_MAPSET)
    #[arg(long, global = true)]
    mapset: Option<PathBuf>,

    /// Endpoint snapping tolerance used when building nodes
    #[arg(long, global = true)]
    node_tolerance: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a map from a standard ASCII file
    Import {
        /// ASCII input file
        input: PathBuf,

        /// Name of the new map
        map: String,

        /// Keep z coordinates
        #[arg(short = 'z', long)]
        with_z: bool,

        /// Snap boundary vertices closer than this after import
        #[arg(long)]
        snap: Option<f64>,
    },

    /// Write the live records of a map as standard ASCII
    Export {
        map: String,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rebuild topology from the geometry file
    Build { map: String },

    /// Snap vertices of lines of the given types
    Snap {
        map: String,

        /// Snapping threshold in map units
        #[arg(short, long)]
        threshold: f64,

        /// Line types to snap, comma separated
        #[arg(long = "type", value_delimiter = ',', default_value = "boundary")]
        types: Vec<LineType>,
    },

    /// Print primitive counts of a map
    Info {
        map: String,

        /// Print counts as JSON
        #[arg(long)]
        json: bool,

        /// Print the full topology as JSON
        #[arg(long, conflicts_with = "json")]
        topology: bool,
    },
}

#[derive(Serialize)]
struct InfoOutput<'a> {
    map: &'a str,
    with_z: bool,
    #[serde(flatten)]
    counts: grass_lite_topology::MapCounts,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(mapset) = cli.mapset {
        config.mapset = mapset;
    }
    if let Some(tolerance) = cli.node_tolerance {
        config.node_tolerance = tolerance;
    }

    match cli.command {
        Commands::Import {
            input,
            map,
            with_z,
            snap,
        } => import(&config, &input, &map, with_z, snap),
        Commands::Export { map, output } => export(&config, &map, output),
        Commands::Build { map } => build(&config, &map),
        Commands::Snap {
            map,
            threshold,
            types,
        } => snap(&config, &map, threshold, &types),
        Commands::Info {
            map,
            json,
            topology,
        } => info(&config, &map, json, topology),
    }
}

fn open_map(config: &Config, name: &str) -> Result<Map> {
    let dir = config.map_dir(name);
    Map::open(&dir, config.build_options())
        .with_context(|| format!("failed to open map {}", dir.display()))
}

fn log_build(name: &str, report: &BuildReport) {
    info!(
        map = name,
        nodes = report.nodes,
        lines = report.lines,
        areas = report.areas,
        isles = report.isles,
        "topology built"
    );
    if !report.is_clean() {
        warn!(map = name, issues = report.warnings().count(), "topology has issues");
    }
}

fn lines_of(map: &Map, types: &[LineType]) -> Vec<LineId> {
    map.plus()
        .lines()
        .filter(|(_, l)| types.contains(&l.ty))
        .map(|(id, _)| id)
        .collect()
}

fn import(
    config: &Config,
    input: &Path,
    name: &str,
    with_z: bool,
    snap: Option<f64>,
) -> Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let parsed = ascii::parse_standard(&text, with_z)
        .with_context(|| format!("failed to parse {}", input.display()))?;

    let dir = config.map_dir(name);
    let mut map = Map::create(&dir, with_z, config.build_options())
        .with_context(|| format!("failed to create map {}", dir.display()))?;

    let mut skipped = 0;
    for (i, rec) in parsed.records.iter().enumerate() {
        if !rec.alive {
            skipped += 1;
            continue;
        }
        map.write_line(rec.ty, &rec.points, &rec.cats)
            .with_context(|| format!("record {} ({})", i + 1, rec.ty))?;
    }
    info!(map = name, written = parsed.records.len() - skipped, skipped, "records imported");

    if let Some(threshold) = snap {
        let boundaries = lines_of(&map, &[LineType::Boundary]);
        map.snap_lines(&boundaries, threshold)?;
    }
    let counts = map.counts();
    map.close().context("failed to write topology")?;
    info!(map = name, areas = counts.areas, isles = counts.isles, "map created");
    Ok(())
}

fn export(config: &Config, name: &str, output: Option<PathBuf>) -> Result<()> {
    let mut map = open_map(config, name)?;
    let ids: Vec<LineId> = map.plus().lines().map(|(id, _)| id).collect();

    let mut doc = AsciiMap::default();
    for id in ids {
        let (ty, points, cats) = map.read_line(id)?;
        doc.records.push(AsciiRecord {
            ty,
            alive: true,
            points,
            cats,
        });
    }
    let text = ascii::write_standard(&doc, map.with_z());
    match output {
        Some(path) => std::fs::write(&path, text)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => print!("{text}"),
    }
    Ok(())
}

fn build(config: &Config, name: &str) -> Result<()> {
    let mut map = open_map(config, name)?;
    let report = map.build()?;
    log_build(name, &report);
    map.close().context("failed to write topology")?;
    Ok(())
}

fn snap(config: &Config, name: &str, threshold: f64, types: &[LineType]) -> Result<()> {
    if threshold.is_nan() || threshold < 0.0 {
        bail!("threshold must be a non-negative number, got {threshold}");
    }
    let mut map = open_map(config, name)?;
    let lines = lines_of(&map, types);
    let report = map.snap_lines(&lines, threshold)?;
    info!(
        map = name,
        lines = lines.len(),
        rewritten = report.rewritten,
        deleted = report.deleted,
        "snapped"
    );
    map.close().context("failed to write topology")?;
    Ok(())
}

fn info(config: &Config, name: &str, json: bool, topology: bool) -> Result<()> {
    let map = open_map(config, name)?;
    if topology {
        println!("{}", map.plus().to_json()?);
        return Ok(());
    }

    let out = InfoOutput {
        map: name,
        with_z: map.with_z(),
        counts: map.counts(),
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        let c = out.counts;
        println!("map:         {name}");
        println!("3d:          {}", if out.with_z { "yes" } else { "no" });
        println!("nodes:       {}", c.nodes);
        println!("points:      {}", c.points);
        println!("lines:       {}", c.linestrings);
        println!("boundaries:  {}", c.boundaries);
        println!("centroids:   {}", c.centroids);
        println!("faces:       {}", c.faces);
        println!("kernels:     {}", c.kernels);
        println!("areas:       {}", c.areas);
        println!("isles:       {}", c.isles);
    }
    Ok(())
}
