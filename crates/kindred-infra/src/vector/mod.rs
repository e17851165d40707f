//! Vector database infrastructure for memory embeddings.
//!
//! Provides LanceDB vector store management and fastembed-based local
//! embedding generation. Each character gets its own table of memory
//! vectors keyed by the memory id of the SQLite row.

pub mod embedder;
pub mod lance;
pub mod memory;
pub mod schema;
