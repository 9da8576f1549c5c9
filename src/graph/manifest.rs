//! Loading model dependencies from dbt artifacts.
//!
//! Two sources are supported:
//! - dbt's `target/manifest.json`
//! - a plain JSON object mapping each model to its upstream models

use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use super::dag::EdgeMap;
use crate::error::GraphError;

/// Only these manifest nodes show up as runs in the log.
const MODEL_RESOURCE_TYPE: &str = "model";

#[derive(Debug, Default, Deserialize)]
struct DependsOn {
    #[serde(default)]
    nodes: Vec<String>,
}

/// The parts of a manifest node the graph needs.
#[derive(Debug, Deserialize)]
struct ManifestNode {
    name: String,
    resource_type: String,
    #[serde(default)]
    depends_on: DependsOn,
}

/// Root of `manifest.json`; everything but `nodes` is ignored.
#[derive(Debug, Deserialize)]
struct Manifest {
    nodes: HashMap<String, ManifestNode>,
}

/// Load model-to-model edges from a dbt `manifest.json`.
///
/// # Parameters
///
/// * `path` - Path to the manifest file
///
/// # Returns
///
/// An [`EdgeMap`] keyed by model name. Dependencies on sources, seeds and
/// other non-model resources are dropped since they never appear in a run log.
pub fn load_manifest(path: &Path) -> Result<EdgeMap, GraphError> {
    let data = read_file(path)?;
    parse_manifest(&data).map_err(|reason| manifest_error(path, reason))
}

/// Load edges from a JSON object such as `{"fct_orders": ["stg_orders"], "stg_orders": []}`.
pub fn load_edge_map(path: &Path) -> Result<EdgeMap, GraphError> {
    let data = read_file(path)?;
    serde_json::from_str(&data).map_err(|e| manifest_error(path, format!("Invalid JSON format: {}", e)))
}

/// Parse the text of a `manifest.json` into model edges.
pub fn parse_manifest(data: &str) -> Result<EdgeMap, String> {
    let manifest: Manifest = serde_json::from_str(data).map_err(|e| format!("Invalid JSON format: {}", e))?;

    let model_names: HashMap<&str, &str> = manifest
        .nodes
        .iter()
        .filter(|(_, node)| node.resource_type == MODEL_RESOURCE_TYPE)
        .map(|(unique_id, node)| (unique_id.as_str(), node.name.as_str()))
        .collect();

    let mut edges = EdgeMap::new();
    for (unique_id, name) in &model_names {
        let node = &manifest.nodes[*unique_id];
        let deps: BTreeSet<String> = node
            .depends_on
            .nodes
            .iter()
            .filter_map(|dep| model_names.get(dep.as_str()))
            .map(|dep| dep.to_string())
            .collect();

        if edges.insert(name.to_string(), deps).is_some() {
            return Err(format!("Duplicate model name found: {}", name));
        }
    }

    log::debug!("Manifest lists {} models", edges.len());
    Ok(edges)
}

fn read_file(path: &Path) -> Result<String, GraphError> {
    fs::read_to_string(path).map_err(|e| manifest_error(path, format!("Failed to read file: {}", e)))
}

fn manifest_error(path: &Path, reason: String) -> GraphError {
    GraphError::Manifest {
        path: path.to_path_buf(),
        reason,
    }
}
