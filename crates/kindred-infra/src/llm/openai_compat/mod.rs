//! OpenAI-compatible LLM provider implementation (LM Studio).
//!
//! Uses [`async_openai`] for chat completions and SSE streaming, and a
//! plain `reqwest` GET for the model listing, which LM Studio serves at
//! `{base}/models`.

pub mod config;
pub mod streaming;

use std::pin::Pin;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, ChatCompletionStreamOptions,
    CreateChatCompletionRequest, StopConfiguration,
};
use futures_util::Stream;
use kindred_observe::genai_attrs;
use tracing::Instrument;
use serde::Deserialize;

use kindred_core::llm::provider::LlmProvider;
use kindred_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, MessageRole, ModelInfo,
    ProviderCapabilities, StopReason, StreamEvent, TokenCount, Usage,
};

use self::config::OpenAiCompatConfig;
use self::streaming::{map_openai_stream, stop_reason};

/// Unified provider for any OpenAI-compatible server.
///
/// Does NOT derive Debug: the `async_openai::Client` holds the API key.
pub struct OpenAiCompatibleProvider {
    client: Client<OpenAIConfig>,
    http: reqwest::Client,
    provider_name: String,
    base_url: String,
    api_key: String,
    model: String,
    capabilities: ProviderCapabilities,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelInfo>,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: OpenAiCompatConfig) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.api_key)
            .with_api_base(&config.base_url);

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();

        Self {
            client: Client::with_config(openai_config).with_http_client(http.clone()),
            http,
            provider_name: config.provider_name,
            base_url: config.base_url,
            api_key: config.api_key,
            model: config.model,
            capabilities: config.capabilities,
        }
    }

    /// Build a [`CreateChatCompletionRequest`] from a generic [`CompletionRequest`].
    fn build_request(
        &self,
        request: &CompletionRequest,
        stream: bool,
    ) -> Result<CreateChatCompletionRequest, LlmError> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::new();

        if let Some(ref system) = request.system {
            messages.push(system_message(system));
        }

        for msg in &request.messages {
            let oai_msg = match msg.role {
                MessageRole::System => system_message(&msg.content),
                MessageRole::User => {
                    ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                        content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
                        name: None,
                    })
                }
                MessageRole::Assistant => {
                    #[allow(deprecated)]
                    ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                        content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                            msg.content.clone(),
                        )),
                        refusal: None,
                        name: None,
                        audio: None,
                        tool_calls: None,
                        function_call: None,
                    })
                }
            };
            messages.push(oai_msg);
        }

        let model = if request.model.is_empty() {
            self.model.clone()
        } else {
            request.model.clone()
        };
        if model.is_empty() {
            return Err(LlmError::InvalidRequest("no model selected".to_string()));
        }

        let mut req = CreateChatCompletionRequest {
            model,
            messages,
            max_completion_tokens: Some(request.max_tokens),
            temperature: request.temperature.map(|t| t as f32),
            ..Default::default()
        };

        if let Some(ref stops) = request.stop_sequences {
            if !stops.is_empty() {
                req.stop = Some(StopConfiguration::StringArray(stops.clone()));
            }
        }

        if stream {
            req.stream = Some(true);
            req.stream_options = Some(ChatCompletionStreamOptions {
                include_usage: Some(true),
                include_obfuscation: None,
            });
        }

        Ok(req)
    }
}

fn system_message(content: &str) -> ChatCompletionRequestMessage {
    ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
        content: ChatCompletionRequestSystemMessageContent::Text(content.to_string()),
        name: None,
    })
}

impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let oai_request = self.build_request(request, false)?;

        let span = tracing::info_span!(
            "chat",
            "gen_ai.operation.name" = genai_attrs::OP_CHAT,
            "gen_ai.provider.name" = %self.provider_name,
            "gen_ai.request.model" = %oai_request.model,
            "gen_ai.request.max_tokens" = request.max_tokens,
            "gen_ai.usage.input_tokens" = tracing::field::Empty,
            "gen_ai.usage.output_tokens" = tracing::field::Empty,
            "gen_ai.response.id" = tracing::field::Empty,
            "gen_ai.response.finish_reasons" = tracing::field::Empty,
        );

        let response = self
            .client
            .chat()
            .create(oai_request)
            .instrument(span.clone())
            .await
            .map_err(map_openai_error)?;

        let choice = response.choices.first();
        let content = choice
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();
        let stop_reason = choice
            .and_then(|c| c.finish_reason.as_ref())
            .map(stop_reason)
            .unwrap_or(StopReason::EndTurn);
        let usage = response
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        span.record(genai_attrs::GEN_AI_USAGE_INPUT_TOKENS, usage.input_tokens);
        span.record(genai_attrs::GEN_AI_USAGE_OUTPUT_TOKENS, usage.output_tokens);
        span.record(genai_attrs::GEN_AI_RESPONSE_ID, response.id.as_str());
        span.record(genai_attrs::GEN_AI_RESPONSE_FINISH_REASONS, tracing::field::debug(&stop_reason));

        Ok(CompletionResponse {
            id: response.id,
            content,
            model: response.model,
            stop_reason,
            usage,
        })
    }

    fn stream(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>> {
        let oai_request = match self.build_request(&request, true) {
            Ok(req) => req,
            Err(e) => {
                return Box::pin(futures_util::stream::once(async move { Err(e) }));
            }
        };

        let client = self.client.clone();

        Box::pin(async_stream::try_stream! {
            let oai_stream = client
                .chat()
                .create_stream(oai_request)
                .await
                .map_err(map_openai_error)?;

            let mut inner = map_openai_stream(oai_stream);

            use futures_util::StreamExt;
            while let Some(event) = inner.next().await {
                yield event?;
            }
        })
    }

    async fn count_tokens(&self, request: &CompletionRequest) -> Result<TokenCount, LlmError> {
        Ok(TokenCount {
            input_tokens: estimate_tokens(request),
        })
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| LlmError::Unavailable(format!("{url}: {e}")))?;

        if !response.status().is_success() {
            return Err(LlmError::Provider {
                message: format!("{url} returned {}", response.status()),
            });
        }

        let list: ModelList = response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(e.to_string()))?;
        Ok(list.data)
    }
}

/// Character-based estimate: about four characters per token, plus a
/// small per-message overhead for role markers.
fn estimate_tokens(request: &CompletionRequest) -> u32 {
    let mut total_chars = request.system.as_ref().map_or(0, |s| s.len());
    for msg in &request.messages {
        total_chars += msg.content.len() + 10;
    }
    (total_chars as f64 / 4.0).ceil() as u32
}

/// Map an `async_openai::error::OpenAIError` to an [`LlmError`].
fn map_openai_error(err: async_openai::error::OpenAIError) -> LlmError {
    use async_openai::error::OpenAIError;

    match &err {
        OpenAIError::ApiError(api_err) => {
            let code = api_err.code.as_deref().unwrap_or("");
            if code == "context_length_exceeded" || api_err.message.contains("context length") {
                LlmError::ContextLengthExceeded { max: 0, requested: 0 }
            } else {
                LlmError::Provider {
                    message: api_err.message.clone(),
                }
            }
        }
        OpenAIError::Reqwest(reqwest_err) => match reqwest_err.status().map(|s| s.as_u16()) {
            Some(401) => LlmError::AuthenticationFailed,
            Some(429) => LlmError::RateLimited { retry_after_ms: None },
            Some(_) => LlmError::Provider {
                message: err.to_string(),
            },
            // No status: connection refused or timed out.
            None => LlmError::Unavailable(err.to_string()),
        },
        OpenAIError::JSONDeserialize(_, content) => {
            LlmError::Deserialization(format!("failed to parse response: {content}"))
        }
        OpenAIError::StreamError(stream_err) => LlmError::Stream(stream_err.to_string()),
        OpenAIError::InvalidArgument(msg) => LlmError::InvalidRequest(msg.clone()),
        _ => LlmError::Provider {
            message: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use kindred_types::config::LlmConfig;
    use kindred_types::llm::Message;

    fn provider(model: Option<&str>) -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::new(config::lm_studio_defaults(&LlmConfig {
            model: model.map(str::to_string),
            ..Default::default()
        }))
    }

    fn request(model: &str) -> CompletionRequest {
        CompletionRequest {
            model: model.to_string(),
            messages: vec![Message::user("Hello"), Message::assistant("Hi there!")],
            system: Some("Be kind".to_string()),
            max_tokens: 256,
            temperature: Some(0.8),
            stream: false,
            stop_sequences: None,
        }
    }

    #[test]
    fn test_build_request_messages() {
        let oai_req = provider(None).build_request(&request("mistral-7b"), false).unwrap();
        assert_eq!(oai_req.model, "mistral-7b");
        // 1 system + 2 conversation
        assert_eq!(oai_req.messages.len(), 3);
        assert!(oai_req.stream.is_none());
    }

    #[test]
    fn test_build_request_streaming() {
        let oai_req = provider(None).build_request(&request("m"), true).unwrap();
        assert_eq!(oai_req.stream, Some(true));
        assert_eq!(oai_req.stream_options.unwrap().include_usage, Some(true));
    }

    #[test]
    fn test_empty_model_falls_back_to_configured() {
        let oai_req = provider(Some("llama-3-8b")).build_request(&request(""), false).unwrap();
        assert_eq!(oai_req.model, "llama-3-8b");

        let err = provider(None).build_request(&request(""), false).unwrap_err();
        assert!(matches!(err, LlmError::InvalidRequest(_)));
    }

    #[test]
    fn test_token_estimate() {
        let n = estimate_tokens(&request("m"));
        // "Be kind" 7 + "Hello" 5+10 + "Hi there!" 9+10 = 41 chars -> 11 tokens
        assert_eq!(n, 11);
    }

    #[tokio::test]
    async fn test_list_models_unreachable_is_unavailable() {
        let p = OpenAiCompatibleProvider::new(config::lm_studio_defaults(&LlmConfig {
            base_url: "http://127.0.0.1:9/v1".to_string(),
            timeout_secs: 1,
            ..Default::default()
        }));
        let err = p.list_models().await.unwrap_err();
        assert!(matches!(err, LlmError::Unavailable(_)));
    }

    #[test]
    fn test_map_openai_error_invalid_argument() {
        use async_openai::error::OpenAIError;
        let err = map_openai_error(OpenAIError::InvalidArgument("bad arg".to_string()));
        assert!(matches!(err, LlmError::InvalidRequest(_)));
    }
}
