//! Versioned assets: validation, checksums, tags and dependency graph.

pub mod manager;
pub mod validation;

pub use manager::AssetManager;
