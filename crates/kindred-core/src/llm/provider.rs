//! LlmProvider trait definition.
//!
//! This is the core abstraction the LM Studio client implements.
//! Uses RPITIT for `complete`, `count_tokens` and `list_models`, and
//! `Pin<Box<dyn Stream>>` for `stream` (streams need to be object-safe for
//! the BoxLlmProvider wrapper).

use std::pin::Pin;

use futures_util::Stream;

use kindred_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ModelInfo, ProviderCapabilities, StreamEvent,
    TokenCount,
};

/// Trait for OpenAI-compatible LLM backends.
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g., "lmstudio").
    fn name(&self) -> &str;

    fn capabilities(&self) -> &ProviderCapabilities;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;

    /// Send a streaming completion request. Returns a stream of events.
    fn stream(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>>;

    /// Estimate the tokens in a request without sending it.
    fn count_tokens(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<TokenCount, LlmError>> + Send;

    /// Models currently served by the backend.
    fn list_models(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<ModelInfo>, LlmError>> + Send;
}
