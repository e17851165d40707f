//! The companion chat turn: user message in, character reply out.

pub mod service;

pub use service::{CompanionChat, Turn};
