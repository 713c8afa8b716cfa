//! CLI command implementations.

/// The `compile` subcommand.
pub mod compile;
/// The `nodes` subcommand.
pub mod nodes;
/// The `run` subcommand.
pub mod run;

use std::path::Path;

use telar_core::graph::{Graph, RawGraph};

/// Loads a graph from an editor-format JSON file.
pub fn load_graph(path: &Path) -> anyhow::Result<Graph> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| anyhow::anyhow!("cannot read {}: {err}", path.display()))?;
    let raw: RawGraph = serde_json::from_str(&text)
        .map_err(|err| anyhow::anyhow!("{} is not a valid graph file: {err}", path.display()))?;
    Ok(Graph::from_raw(&raw)?)
}
