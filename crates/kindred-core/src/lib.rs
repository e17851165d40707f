//! Business logic and repository trait definitions for Kindred.
//!
//! This crate defines the "ports" (repository traits, LLM provider,
//! embedder, vector store and image generator traits) that the
//! infrastructure layer implements, and the services built on them. It
//! depends only on `kindred-types` -- never on `kindred-infra` or any
//! database/IO crate.

pub mod asset;
pub mod call;
pub mod chat;
pub mod event;
pub mod llm;
pub mod media;
pub mod memory;
pub mod messenger;
pub mod repository;
pub mod scene;
pub mod service;
