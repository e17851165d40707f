//! Character memory (RAG).
//!
//! Memories are stored twice: a row in the relational store and, when an
//! embedder is configured, a vector in a per-character table. Retrieval
//! combines importance, recency and semantic similarity into a context
//! block that is injected into the character prompt.

pub mod box_embedder;
pub mod box_vector;
pub mod embedder;
pub mod service;
pub mod vector;
