//! Image generation port.
//!
//! Implemented by the ComfyUI client in kindred-infra. Implementations
//! return an error for any failure; the media service decides whether to
//! fall back to a placeholder.

use kindred_types::error::MediaError;

/// One txt2img job.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub positive: String,
    pub negative: String,
    /// `None` picks a random seed.
    pub seed: Option<u64>,
    pub filename_prefix: String,
}

/// Encoded image bytes plus what produced them.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    /// File extension without the dot.
    pub extension: String,
    pub checkpoint: Option<String>,
}

pub trait ImageGenerator: Send + Sync {
    fn name(&self) -> &str;

    /// Quick reachability check.
    fn is_available(&self) -> impl std::future::Future<Output = bool> + Send;

    /// Checkpoints the backend can load.
    fn list_checkpoints(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<String>, MediaError>> + Send;

    fn generate(
        &self,
        request: &ImageRequest,
    ) -> impl std::future::Future<Output = Result<GeneratedImage, MediaError>> + Send;
}
