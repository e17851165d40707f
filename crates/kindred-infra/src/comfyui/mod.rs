//! ComfyUI image generation backend.

pub mod client;
pub mod workflow;

pub use client::ComfyUiClient;
