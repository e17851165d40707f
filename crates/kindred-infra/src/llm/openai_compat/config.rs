//! Configuration for the OpenAI-compatible provider.
//!
//! LM Studio speaks the OpenAI chat completions protocol on
//! `http://localhost:1234/v1` and accepts any API key.

use std::time::Duration;

use kindred_types::config::LlmConfig;
use kindred_types::llm::ProviderCapabilities;

/// Configuration for an OpenAI-compatible LLM server.
///
/// Used to construct an [`super::OpenAiCompatibleProvider`].
pub struct OpenAiCompatConfig {
    /// Human-readable provider name (e.g., "lmstudio").
    pub provider_name: String,
    /// Base URL including the version segment.
    pub base_url: String,
    pub api_key: String,
    /// Default model id; empty means "whatever the server has loaded".
    pub model: String,
    pub timeout: Duration,
    pub capabilities: ProviderCapabilities,
}

/// LM Studio configuration derived from the `[llm]` config section.
pub fn lm_studio_defaults(config: &LlmConfig) -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        provider_name: "lmstudio".into(),
        base_url: config.base_url.trim_end_matches('/').to_string(),
        api_key: config.api_key.clone(),
        model: config.model.clone().unwrap_or_default(),
        timeout: Duration::from_secs(config.timeout_secs),
        capabilities: ProviderCapabilities {
            streaming: true,
            max_context_tokens: 8_192,
            max_output_tokens: config.max_tokens,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lm_studio_defaults() {
        let cfg = lm_studio_defaults(&LlmConfig::default());
        assert_eq!(cfg.provider_name, "lmstudio");
        assert_eq!(cfg.base_url, "http://localhost:1234/v1");
        assert_eq!(cfg.api_key, "lm-studio");
        assert!(cfg.model.is_empty());
        assert_eq!(cfg.capabilities.max_output_tokens, 512);
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let cfg = lm_studio_defaults(&LlmConfig {
            base_url: "http://gpu-box:1234/v1/".into(),
            model: Some("qwen2.5-7b".into()),
            ..Default::default()
        });
        assert_eq!(cfg.base_url, "http://gpu-box:1234/v1");
        assert_eq!(cfg.model, "qwen2.5-7b");
    }
}
