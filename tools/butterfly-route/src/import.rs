//! JSON graph import
//!
//! ```json
//! {
//!   "vertices": [[4.7868, 50.8546], [4.7870, 50.8550]],
//!   "edges": [{ "from": 0, "to": 1, "edge_type": 1, "attributes": { "oneway": "yes" } }],
//!   "turn_costs": [{ "vertex": 1, "type": 0, "edges": [0], "costs": [0] }]
//! }
//! ```
//!
//! Edges and turn costs refer to vertices and edges by their position in
//! the file.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use butterfly_common::{EdgeId, VertexId};
use serde::Deserialize;

use crate::db::{EdgeDetails, RouterDb};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphFile {
    /// Vertex locations as [lon, lat]
    pub vertices: Vec<[f64; 2]>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
    #[serde(default)]
    pub turn_costs: Vec<TurnCostSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdgeSpec {
    pub from: usize,
    pub to: usize,
    #[serde(default)]
    pub edge_type: u32,
    pub length_cm: Option<u32>,
    /// Intermediate points as [lon, lat]
    #[serde(default)]
    pub shape: Vec<[f64; 2]>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TurnCostSpec {
    pub vertex: usize,
    #[serde(rename = "type", default)]
    pub turn_cost_type: u32,
    pub edges: Vec<usize>,
    /// Row-major, `edges.len()²` entries
    pub costs: Vec<u32>,
}

/// What an import added
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub vertices: Vec<VertexId>,
    pub edges: Vec<EdgeId>,
    pub turn_cost_records: usize,
}

pub fn read_graph<P: AsRef<Path>>(path: P) -> Result<GraphFile> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Add a graph to `db` in one session; nothing is committed on error
pub fn import_graph(db: &RouterDb, graph: &GraphFile) -> Result<ImportSummary> {
    let mut session = db.mutate();
    let mut summary = ImportSummary::default();

    for &[lon, lat] in &graph.vertices {
        if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
            bail!("vertex {} has invalid location [{lon}, {lat}]", summary.vertices.len());
        }
        summary.vertices.push(session.add_vertex(lon, lat));
    }

    let vertex = |index: usize, what: &str| -> Result<VertexId> {
        summary_vertex(&summary.vertices, index).with_context(|| what.to_string())
    };

    let mut edges = Vec::with_capacity(graph.edges.len());
    for (i, entry) in graph.edges.iter().enumerate() {
        let from = vertex(entry.from, &format!("edge {i}"))?;
        let to = vertex(entry.to, &format!("edge {i}"))?;
        let details = EdgeDetails {
            edge_type_id: entry.edge_type,
            length_cm: entry.length_cm,
            shape: entry.shape.iter().map(|&[lon, lat]| (lon, lat)).collect(),
            attributes: entry
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };
        let id = session
            .add_edge(from, to, &details)
            .with_context(|| format!("adding edge {i}"))?;
        edges.push(id);
    }

    for (i, entry) in graph.turn_costs.iter().enumerate() {
        let at = vertex(entry.vertex, &format!("turn costs {i}"))?;
        let ids = entry
            .edges
            .iter()
            .map(|&e| {
                edges
                    .get(e)
                    .copied()
                    .with_context(|| format!("turn costs {i}: no edge {e}"))
            })
            .collect::<Result<Vec<_>>>()?;
        session
            .add_turn_costs(at, entry.turn_cost_type, &ids, &entry.costs)
            .with_context(|| format!("adding turn costs {i} at vertex {}", entry.vertex))?;
        summary.turn_cost_records += 1;
    }

    summary.edges = edges;
    let network = session.commit();
    tracing::info!(
        vertices = summary.vertices.len(),
        edges = summary.edges.len(),
        turn_cost_records = summary.turn_cost_records,
        tiles = network.tile_count(),
        "graph imported"
    );
    Ok(summary)
}

fn summary_vertex(vertices: &[VertexId], index: usize) -> Result<VertexId> {
    match vertices.get(index) {
        Some(&v) => Ok(v),
        None => bail!("no vertex {index} ({} vertices)", vertices.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRAPH: &str = r#"{
        "vertices": [[4.7868, 50.8546], [4.7878, 50.8546], [4.3517, 50.8503]],
        "edges": [
            { "from": 0, "to": 1, "length_cm": 7000, "attributes": { "highway": "residential" } },
            { "from": 1, "to": 2, "shape": [[4.6, 50.852]] }
        ],
        "turn_costs": [{ "vertex": 1, "type": 1, "edges": [0, 1], "costs": [0, 5, 5, 0] }]
    }"#;

    #[test]
    fn imports_vertices_edges_and_turn_costs() {
        let graph: GraphFile = serde_json::from_str(GRAPH).unwrap();
        let db = RouterDb::new(14).unwrap();
        let summary = import_graph(&db, &graph).unwrap();

        assert_eq!(summary.vertices.len(), 3);
        assert_eq!(summary.edges.len(), 2);
        assert_eq!(summary.turn_cost_records, 1);

        let network = db.latest();
        assert_eq!(network.edge_count(), 2);
        assert_eq!(network.tile_count(), 2);

        let mut cursor = network.edge_enumerator();
        assert!(cursor.move_to_edge(summary.edges[0], true));
        assert_eq!(cursor.attribute("highway"), Some("residential"));
        assert_eq!(cursor.length_cm(), 7000);
    }

    #[test]
    fn bad_references_fail_without_committing() {
        let graph: GraphFile = serde_json::from_str(
            r#"{ "vertices": [[4.78, 50.85]], "edges": [{ "from": 0, "to": 3 }] }"#,
        )
        .unwrap();
        let db = RouterDb::new(14).unwrap();
        let err = import_graph(&db, &graph).unwrap_err();
        assert!(format!("{err:#}").contains("no vertex 3"), "{err:#}");
        assert_eq!(db.latest().vertex_count(), 0);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_json::from_str::<GraphFile>(r#"{ "vertices": [], "nodes": [] }"#).is_err());
    }

    #[test]
    fn reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        std::fs::write(&path, GRAPH).unwrap();
        assert_eq!(read_graph(&path).unwrap().edges.len(), 2);
        assert!(read_graph(dir.path().join("missing.json")).is_err());
    }
}
