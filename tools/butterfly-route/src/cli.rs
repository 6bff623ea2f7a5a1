//! CLI commands for butterfly-route

use std::path::{Path as FsPath, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use butterfly_common::TileId;
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::RoutingConfig;
use crate::costs::DistanceCost;
use crate::db::RouterDb;
use crate::import::{import_graph, read_graph};
use crate::network::RoutingNetwork;
use crate::search::{Dijkstra, PathResult, SearchHooks, SearchSettings};
use crate::snap::DirectedSnapPoint;

#[derive(Parser, Debug)]
#[command(name = "butterfly-route")]
#[command(about = "Tiled road-network storage and edge-based routing", long_about = None)]
pub struct Cli {
    /// Routing configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a routing network from a JSON graph
    Import {
        /// Input graph (JSON)
        input: PathBuf,
        /// Output network file
        output: PathBuf,
        /// Tile zoom level (overrides the configuration)
        #[arg(long)]
        zoom: Option<u8>,
    },

    /// Print a per-tile summary of a network
    Inspect {
        /// Network file
        network: PathBuf,
    },

    /// Route from one snap point to one or more targets (JSON output)
    Route {
        /// Network file
        network: PathBuf,
        /// Source as tile/local@offset[:f|:b]
        #[arg(long)]
        from: DirectedSnapPoint,
        /// Target as tile/local@offset[:f|:b]; repeat for more targets
        #[arg(long, required = true)]
        to: Vec<DirectedSnapPoint>,
        /// Cap on settled search states (overrides the configuration)
        #[arg(long)]
        max_settled: Option<usize>,
    },

    /// Cost matrix between sources and targets, one search per worker thread
    Matrix {
        /// Network file
        network: PathBuf,
        /// Source snap points
        #[arg(long, required = true, num_args = 1..)]
        from: Vec<DirectedSnapPoint>,
        /// Target snap points
        #[arg(long, required = true, num_args = 1..)]
        to: Vec<DirectedSnapPoint>,
    },
}

pub fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => RoutingConfig::load(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => RoutingConfig::default(),
    };

    match cli.command {
        Commands::Import {
            input,
            output,
            zoom,
        } => run_import(&input, &output, zoom.unwrap_or(config.zoom)),
        Commands::Inspect { network } => run_inspect(&network),
        Commands::Route {
            network,
            from,
            to,
            max_settled,
        } => {
            let mut settings = SearchSettings::from(&config);
            if let Some(max) = max_settled {
                settings.max_settled = max;
            }
            run_route(&network, settings, from, &to)
        }
        Commands::Matrix { network, from, to } => {
            run_matrix(&network, SearchSettings::from(&config), &from, &to)
        }
    }
}

fn load_network(path: &FsPath) -> Result<RoutingNetwork> {
    RoutingNetwork::load(path).with_context(|| format!("loading network {}", path.display()))
}

fn run_import(input: &FsPath, output: &FsPath, zoom: u8) -> Result<()> {
    let start = Instant::now();
    let graph = read_graph(input)?;
    let db = RouterDb::new(zoom)?;
    let summary = import_graph(&db, &graph)?;

    let network = db.latest();
    network
        .save(output)
        .with_context(|| format!("writing {}", output.display()))?;

    println!(
        "Imported {} vertices, {} edges, {} turn-cost records into {} tiles (zoom {zoom})",
        summary.vertices.len(),
        summary.edges.len(),
        summary.turn_cost_records,
        network.tile_count()
    );
    println!(
        "Saved to {} in {:.2}s",
        output.display(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

fn run_inspect(path: &FsPath) -> Result<()> {
    let network = load_network(path)?;
    println!(
        "zoom {}, {} tiles, {} vertices, {} edges",
        network.zoom(),
        network.tile_count(),
        network.vertex_count(),
        network.edge_count()
    );
    println!(
        "{:>12} {:>7} {:>7} {:>9} {:>8} {:>11} {:>10}",
        "tile", "x", "y", "vertices", "records", "turn costs", "edge bytes"
    );
    for tile in network.tiles() {
        let grid = TileId::from_id(tile.tile_id(), network.zoom());
        let turn_costs: usize = (0..tile.vertex_count())
            .map(|local| {
                tile.turn_cost_record_count(butterfly_common::VertexId::new(tile.tile_id(), local))
            })
            .sum();
        println!(
            "{:>12} {:>7} {:>7} {:>9} {:>8} {:>11} {:>10}",
            tile.tile_id(),
            grid.x,
            grid.y,
            tile.vertex_count(),
            tile.edge_count(),
            turn_costs,
            tile.edge_arena_len()
        );
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct RouteOutput {
    from: String,
    to: String,
    cost: Option<f64>,
    length_m: Option<f64>,
    path: Option<PathOutput>,
}

#[derive(Debug, Serialize)]
struct PathOutput {
    edges: Vec<PathEdge>,
    offset1: u16,
    offset2: u16,
    /// [lon, lat] of the start and end snap points
    endpoints: Vec<[f64; 2]>,
}

#[derive(Debug, Serialize)]
struct PathEdge {
    edge: String,
    forward: bool,
}

fn route_output(
    network: &RoutingNetwork,
    from: &DirectedSnapPoint,
    to: &DirectedSnapPoint,
    result: Option<PathResult>,
) -> RouteOutput {
    let length_m = result.as_ref().and_then(|r| r.path.length_m(network));
    let endpoints = [from.point, to.point]
        .iter()
        .filter_map(|p| p.location(network))
        .map(|(lon, lat)| [lon, lat])
        .collect();
    RouteOutput {
        from: from.point.to_string(),
        to: to.point.to_string(),
        cost: result.as_ref().map(|r| r.cost),
        length_m,
        path: result.map(|r| {
            let mut path = r.path;
            path.trim();
            PathOutput {
                edges: path
                    .edges()
                    .iter()
                    .map(|(edge, forward)| PathEdge {
                        edge: edge.to_string(),
                        forward: *forward,
                    })
                    .collect(),
                offset1: path.offset1,
                offset2: path.offset2,
                endpoints,
            }
        }),
    }
}

fn run_route(
    path: &FsPath,
    settings: SearchSettings,
    from: DirectedSnapPoint,
    to: &[DirectedSnapPoint],
) -> Result<()> {
    let network = load_network(path)?;
    let mut dijkstra = Dijkstra::new(settings);
    let start = Instant::now();
    let results = dijkstra.run_one_to_many(
        &network,
        &DistanceCost::new(),
        from,
        to,
        &mut SearchHooks::new(),
    )?;
    tracing::info!(
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        settled = dijkstra.stats().settled,
        "route computed"
    );

    let output: Vec<RouteOutput> = to
        .iter()
        .zip(results)
        .map(|(target, result)| route_output(&network, &from, target, result))
        .collect();
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[derive(Debug, Serialize)]
struct MatrixOutput {
    from: Vec<String>,
    to: Vec<String>,
    /// Costs per source row; `null` when unreachable
    costs: Vec<Vec<Option<f64>>>,
}

/// One-to-many search per source, spread over the rayon pool
pub fn cost_matrix(
    network: &RoutingNetwork,
    settings: SearchSettings,
    from: &[DirectedSnapPoint],
    to: &[DirectedSnapPoint],
) -> butterfly_common::Result<Vec<Vec<Option<f64>>>> {
    let cost = DistanceCost::new();
    from.par_iter()
        .map_init(
            || Dijkstra::new(settings),
            |dijkstra, &source| -> butterfly_common::Result<Vec<Option<f64>>> {
                let row =
                    dijkstra.run_one_to_many(network, &cost, source, to, &mut SearchHooks::new())?;
                Ok(row.into_iter().map(|r| r.map(|r| r.cost)).collect())
            },
        )
        .collect()
}

fn run_matrix(
    path: &FsPath,
    settings: SearchSettings,
    from: &[DirectedSnapPoint],
    to: &[DirectedSnapPoint],
) -> Result<()> {
    let network = load_network(path)?;
    let start = Instant::now();
    let costs = cost_matrix(&network, settings, from, to)?;
    tracing::info!(
        sources = from.len(),
        targets = to.len(),
        threads = rayon::current_num_threads(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "matrix computed"
    );

    let output = MatrixOutput {
        from: from.iter().map(|p| p.point.to_string()).collect(),
        to: to.iter().map(|p| p.point.to_string()).collect(),
        costs,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
