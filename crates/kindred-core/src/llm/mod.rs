//! LLM integration for Kindred.
//!
//! - `LlmProvider`: RPITIT trait the LM Studio client implements
//! - `BoxLlmProvider`: object-safe wrapper for dynamic dispatch
//! - `LlmService`: model discovery, chat with canned fallbacks, and
//!   character-aware response generation
//! - `intent`: keyword detection of media requests

pub mod box_provider;
pub mod fallback;
pub mod intent;
pub mod provider;
pub mod service;
