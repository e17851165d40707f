//! Shared domain types for Kindred.
//!
//! This crate contains the core domain types of the companion service:
//! characters, personalities, roles, conversations, memories, assets,
//! scenes, calls, events, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod anonymous;
pub mod asset;
pub mod call;
pub mod character;
pub mod chat;
pub mod config;
pub mod conversation;
pub mod error;
pub mod event;
pub mod interaction;
pub mod llm;
pub mod memory;
pub mod messenger;
pub mod personality;
pub mod role;
pub mod scene;
