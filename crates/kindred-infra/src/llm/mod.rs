//! LLM provider implementations.
//!
//! LM Studio exposes an OpenAI-compatible server, so one
//! [`OpenAiCompatibleProvider`] covers it. [`create_provider`] builds the
//! boxed provider the services consume from the `[llm]` config section.

pub mod openai_compat;

use kindred_core::llm::box_provider::BoxLlmProvider;
use kindred_types::config::LlmConfig;

use self::openai_compat::OpenAiCompatibleProvider;

/// Create a [`BoxLlmProvider`] for the configured LM Studio server.
pub fn create_provider(config: &LlmConfig) -> BoxLlmProvider {
    let provider = OpenAiCompatibleProvider::new(openai_compat::config::lm_studio_defaults(config));
    tracing::debug!(base_url = %config.base_url, "llm provider configured");
    BoxLlmProvider::new(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_uses_lmstudio_name() {
        let provider = create_provider(&LlmConfig::default());
        assert_eq!(provider.name(), "lmstudio");
        assert!(provider.capabilities().streaming);
    }
}
