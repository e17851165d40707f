//! HTTP client for a ComfyUI server.

use std::time::{Duration, Instant};

use rand::Rng;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;

use kindred_core::media::generator::{GeneratedImage, ImageGenerator, ImageRequest};
use kindred_types::config::ComfyUiConfig;
use kindred_types::error::MediaError;

use super::workflow;

/// Output filename prefix on the ComfyUI side.
const SAVE_PREFIX: &str = "kindred";
const POLL_INTERVAL: Duration = Duration::from_secs(1);
const PING_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct QueuedPrompt {
    prompt_id: String,
}

/// One file reported under a node's `images` in `/history/{id}`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub(crate) struct OutputImage {
    filename: String,
    #[serde(default)]
    subfolder: String,
    #[serde(default = "default_output_type", rename = "type")]
    kind: String,
}

fn default_output_type() -> String {
    "output".to_string()
}

pub struct ComfyUiClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    timeout: Duration,
    forced_checkpoint: Option<String>,
    chosen_checkpoint: RwLock<Option<String>>,
}

impl ComfyUiClient {
    pub fn new(config: &ComfyUiConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("kindred/0.1")
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_id: uuid::Uuid::new_v4().to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
            forced_checkpoint: config.checkpoint.clone(),
            chosen_checkpoint: RwLock::new(None),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Configured checkpoint, else the cached automatic choice.
    async fn checkpoint(&self) -> String {
        if let Some(forced) = &self.forced_checkpoint {
            return forced.clone();
        }
        if let Some(chosen) = self.chosen_checkpoint.read().await.as_ref() {
            return chosen.clone();
        }

        let available = match self.list_checkpoints().await {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(error = %e, "could not list checkpoints");
                Vec::new()
            }
        };
        // Only cache a choice made from a real listing.
        let chosen = workflow::pick_checkpoint(&available);
        if !available.is_empty() {
            *self.chosen_checkpoint.write().await = Some(chosen.clone());
            tracing::info!(checkpoint = %chosen, "comfyui checkpoint selected");
        }
        chosen
    }

    async fn queue(&self, graph: Value) -> Result<String, MediaError> {
        let body = serde_json::json!({ "prompt": graph, "client_id": self.client_id });
        let response = self
            .http
            .post(self.url("/prompt"))
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| MediaError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(MediaError::Generation(format!("queue rejected ({status}): {text}")));
        }

        let queued: QueuedPrompt = response
            .json()
            .await
            .map_err(|e| MediaError::Generation(format!("bad queue response: {e}")))?;
        Ok(queued.prompt_id)
    }

    /// Poll `/history/{id}` until the prompt shows up with outputs.
    async fn wait_for_outputs(&self, prompt_id: &str) -> Result<Vec<OutputImage>, MediaError> {
        let deadline = Instant::now() + self.timeout;
        let url = self.url(&format!("/history/{prompt_id}"));

        while Instant::now() < deadline {
            match self.http.get(&url).timeout(REQUEST_TIMEOUT).send().await {
                Ok(response) if response.status().is_success() => {
                    if let Ok(history) = response.json::<Value>().await {
                        if let Some(images) = output_images(&history, prompt_id) {
                            return Ok(images);
                        }
                    }
                }
                Ok(response) => tracing::debug!(status = %response.status(), "history poll"),
                Err(e) => tracing::debug!(error = %e, "history poll failed"),
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }

        tracing::warn!(prompt_id, "comfyui prompt timed out");
        Err(MediaError::Timeout(self.timeout.as_secs()))
    }

    async fn download(&self, image: &OutputImage) -> Result<Vec<u8>, MediaError> {
        let response = self
            .http
            .get(self.url("/view"))
            .timeout(REQUEST_TIMEOUT)
            .query(&[
                ("filename", image.filename.as_str()),
                ("subfolder", image.subfolder.as_str()),
                ("type", image.kind.as_str()),
            ])
            .send()
            .await
            .map_err(|e| MediaError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MediaError::Generation(format!(
                "download of {} failed: {}",
                image.filename,
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| MediaError::Io(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Images of a finished prompt, or `None` while it is still running.
pub(crate) fn output_images(history: &Value, prompt_id: &str) -> Option<Vec<OutputImage>> {
    let outputs = history.get(prompt_id)?.get("outputs")?.as_object()?;
    let images: Vec<OutputImage> = outputs
        .values()
        .filter_map(|node| node.get("images"))
        .filter_map(|images| serde_json::from_value::<Vec<OutputImage>>(images.clone()).ok())
        .flatten()
        .collect();
    if images.is_empty() { None } else { Some(images) }
}

/// `CheckpointLoaderSimple.input.required.ckpt_name[0]` from `/object_info`.
pub(crate) fn checkpoint_names(object_info: &Value) -> Vec<String> {
    object_info
        .pointer("/CheckpointLoaderSimple/input/required/ckpt_name/0")
        .and_then(|v| serde_json::from_value::<Vec<String>>(v.clone()).ok())
        .unwrap_or_default()
}

impl ImageGenerator for ComfyUiClient {
    fn name(&self) -> &str {
        "comfyui"
    }

    async fn is_available(&self) -> bool {
        match self
            .http
            .get(self.url("/system_stats"))
            .timeout(PING_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn list_checkpoints(&self) -> Result<Vec<String>, MediaError> {
        let response = self
            .http
            .get(self.url("/object_info/CheckpointLoaderSimple"))
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| MediaError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MediaError::Unavailable(format!("object_info returned {}", response.status())));
        }
        let info: Value = response
            .json()
            .await
            .map_err(|e| MediaError::Generation(e.to_string()))?;
        Ok(checkpoint_names(&info))
    }

    async fn generate(&self, request: &ImageRequest) -> Result<GeneratedImage, MediaError> {
        if !self.is_available().await {
            return Err(MediaError::Unavailable(format!("no response from {}", self.base_url)));
        }

        let checkpoint = self.checkpoint().await;
        let seed = request
            .seed
            .unwrap_or_else(|| rand::rng().random_range(0..(1u64 << 31)));
        let graph = workflow::txt2img(&request.positive, &request.negative, seed, &checkpoint, SAVE_PREFIX);

        let prompt_id = self.queue(graph).await?;
        tracing::info!(prompt_id = %prompt_id, checkpoint = %checkpoint, seed, "comfyui prompt queued");

        let images = self.wait_for_outputs(&prompt_id).await?;
        let first = images
            .first()
            .ok_or_else(|| MediaError::Generation("prompt produced no images".to_string()))?;
        let bytes = self.download(first).await?;

        let extension = first
            .filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_else(|| "png".to_string());

        Ok(GeneratedImage {
            bytes,
            extension,
            checkpoint: Some(checkpoint),
        })
    }
}
