//! Infrastructure layer for Kindred.
//!
//! Implements the ports defined in `kindred-core`: SQLite repositories,
//! the LanceDB vector store with a local fastembed embedder, the LM Studio
//! chat provider, the ComfyUI image client, and the config and data
//! directory loaders.

pub mod comfyui;
pub mod config;
pub mod filesystem;
pub mod llm;
pub mod sqlite;
pub mod vector;

#[cfg(test)]
mod service_tests;
