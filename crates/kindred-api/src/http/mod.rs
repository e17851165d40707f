//! HTTP/REST API layer for Kindred.
//!
//! Axum-based REST API at `/api/v1/` with optional API key authentication,
//! envelope response format, an SSE event stream and CORS support. The
//! handful of unversioned `/api/...` routes keep older front-ends working.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
