//! FastEmbed-based local embedding generator.
//!
//! Implements the `Embedder` trait from `kindred-core` using fastembed's
//! BGESmallENV15 model (384 dimensions) with ONNX runtime inference. The
//! model is CPU bound, so calls run on the blocking pool behind a mutex.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use kindred_core::memory::embedder::Embedder;
use kindred_observe::genai_attrs;
use kindred_types::error::RepositoryError;
use tracing::Instrument;

use super::schema::EMBEDDING_DIMENSION;

pub const MODEL_NAME: &str = "bge-small-en-v1.5";

pub struct FastEmbedEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
}

impl FastEmbedEmbedder {
    /// Load the model, downloading it into `cache_dir` on first use.
    pub fn new(cache_dir: PathBuf) -> Result<Self, RepositoryError> {
        let options = InitOptions::new(EmbeddingModel::BGESmallENV15)
            .with_cache_dir(cache_dir)
            .with_show_download_progress(false);

        let model = TextEmbedding::try_new(options)
            .map_err(|e| RepositoryError::Query(format!("failed to load embedding model: {e}")))?;
        tracing::info!(model = MODEL_NAME, "embedding model loaded");

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
        })
    }
}

impl Embedder for FastEmbedEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RepositoryError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let span = tracing::debug_span!(
            "embeddings",
            "gen_ai.operation.name" = genai_attrs::OP_EMBEDDINGS,
            "gen_ai.request.model" = MODEL_NAME,
            texts = texts.len(),
        );
        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| RepositoryError::Query("embedding model lock poisoned".to_string()))?;
            model
                .embed(texts, None)
                .map_err(|e| RepositoryError::Query(format!("embedding failed: {e}")))
        })
        .instrument(span)
        .await
        .map_err(|e| RepositoryError::Query(format!("embedding task failed: {e}")))?
    }

    fn model_name(&self) -> &str {
        MODEL_NAME
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIMENSION as usize
    }
}
