//! Model dependency graph and the loaders that feed it.

pub mod dag;
pub mod manifest;

pub use dag::{DependencyGraph, EdgeMap};
pub use manifest::{load_edge_map, load_manifest};
