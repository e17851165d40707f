//! High-level LLM access for companion features.
//!
//! Wraps a [`BoxLlmProvider`] with model discovery (configured model, else
//! the first model the server lists, cached), availability probing, and
//! chat calls that never fail: an unreachable server or an empty reply
//! yields a canned line and `fallback = true`.

use std::pin::Pin;
use std::time::Duration;

use futures_util::Stream;
use kindred_types::character::Mood;
use kindred_types::config::LlmConfig;
use kindred_types::conversation::ChatMessage;
use kindred_types::llm::{
    CompletionRequest, LlmError, LlmStatus, Message, MessageRole, ModelInfo, StreamEvent,
};
use tokio::sync::RwLock;

use super::box_provider::BoxLlmProvider;
use super::fallback;

/// Model id used when nothing else is known.
pub const DEFAULT_MODEL: &str = "local-model";

const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(3);

/// A reply from the model or a canned substitute.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmReply {
    pub content: String,
    pub fallback: bool,
}

/// What the caller knows about the character answering.
#[derive(Debug, Clone)]
pub struct CharacterPrompt {
    pub name: String,
    /// Full persona prompt; `None` uses a minimal stand-in.
    pub system_prompt: Option<String>,
    /// Output of `build_context`, may be empty.
    pub memory_context: String,
    pub mood: Mood,
}

impl CharacterPrompt {
    /// System prompt with the memory section appended.
    pub fn render(&self) -> String {
        let mut prompt = self.system_prompt.clone().unwrap_or_else(|| {
            format!(
                "You are {}, a virtual companion. Be warm, engaging, and stay in character.",
                self.name
            )
        });
        if !self.memory_context.is_empty() {
            prompt.push_str("\n\n## Relevant Memories\n");
            prompt.push_str(&self.memory_context);
        }
        prompt
    }
}

pub struct LlmService {
    provider: BoxLlmProvider,
    config: LlmConfig,
    model_cache: RwLock<Option<String>>,
}

impl LlmService {
    pub fn new(provider: BoxLlmProvider, config: LlmConfig) -> Self {
        Self {
            provider,
            config,
            model_cache: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Whether the server answers a model listing within a few seconds.
    pub async fn is_available(&self) -> bool {
        matches!(
            tokio::time::timeout(AVAILABILITY_TIMEOUT, self.provider.list_models()).await,
            Ok(Ok(_))
        )
    }

    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        self.provider.list_models().await
    }

    /// Configured model, else the first listed model (cached after the
    /// first successful lookup), else [`DEFAULT_MODEL`].
    pub async fn active_model(&self) -> String {
        if let Some(model) = &self.config.model {
            return model.clone();
        }
        if let Some(cached) = self.model_cache.read().await.clone() {
            return cached;
        }
        match self.provider.list_models().await {
            Ok(models) => match models.into_iter().next() {
                Some(first) => {
                    tracing::info!(model = %first.id, "using first model listed by LLM server");
                    *self.model_cache.write().await = Some(first.id.clone());
                    first.id
                }
                None => DEFAULT_MODEL.to_string(),
            },
            Err(e) => {
                tracing::debug!(error = %e, "model listing failed");
                DEFAULT_MODEL.to_string()
            }
        }
    }

    pub async fn status(&self) -> LlmStatus {
        let listing = tokio::time::timeout(AVAILABILITY_TIMEOUT, self.provider.list_models()).await;
        let (available, models) = match listing {
            Ok(Ok(models)) => (true, models.into_iter().map(|m| m.id).collect()),
            _ => (false, Vec::new()),
        };
        let active_model = if available || self.config.model.is_some() {
            Some(self.active_model().await)
        } else {
            None
        };
        LlmStatus {
            base_url: self.config.base_url.clone(),
            available,
            active_model,
            models,
        }
    }

    /// Build a request for the active model.
    pub async fn request(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        temperature: Option<f64>,
        max_tokens: Option<u32>,
    ) -> CompletionRequest {
        CompletionRequest {
            model: self.active_model().await,
            messages,
            system,
            max_tokens: max_tokens.unwrap_or(self.config.max_tokens),
            temperature: Some(temperature.unwrap_or(self.config.temperature)),
            stream: false,
            stop_sequences: None,
        }
    }

    /// Plain chat completion. Never fails; see [`LlmReply::fallback`].
    pub async fn chat(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        temperature: Option<f64>,
        max_tokens: Option<u32>,
    ) -> LlmReply {
        let request = self.request(messages, system, temperature, max_tokens).await;
        match self.complete_text(&request).await {
            Some(content) => LlmReply {
                content,
                fallback: false,
            },
            None => LlmReply {
                content: fallback::generic(),
                fallback: true,
            },
        }
    }

    /// Answer `user_message` in character.
    pub async fn generate_character_response(
        &self,
        character: &CharacterPrompt,
        user_message: &str,
        history: &[ChatMessage],
        temperature: Option<f64>,
    ) -> LlmReply {
        let request = self
            .character_request(character, user_message, history, temperature)
            .await;
        match self.complete_text(&request).await {
            Some(content) => LlmReply {
                content,
                fallback: false,
            },
            None => LlmReply {
                content: fallback::for_mood(character.mood),
                fallback: true,
            },
        }
    }

    /// The request `generate_character_response` would send, trimmed to
    /// fit the provider's context window.
    pub async fn character_request(
        &self,
        character: &CharacterPrompt,
        user_message: &str,
        history: &[ChatMessage],
        temperature: Option<f64>,
    ) -> CompletionRequest {
        let window = self.config.history_window;
        let start = history.len().saturating_sub(window);
        let mut messages: Vec<Message> = history[start..]
            .iter()
            .filter(|m| matches!(m.role, MessageRole::User | MessageRole::Assistant))
            .map(|m| Message {
                role: m.role,
                content: m.content.clone(),
            })
            .collect();
        messages.push(Message::user(user_message));

        let mut request = self
            .request(
                messages,
                Some(character.render()),
                Some(temperature.unwrap_or(self.config.character_temperature)),
                None,
            )
            .await;
        self.fit_context(&mut request).await;
        request
    }

    /// Stream a prepared request.
    pub fn stream(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>> {
        self.provider.stream(CompletionRequest {
            stream: true,
            ..request
        })
    }

    /// Drop the oldest history messages until the request fits the
    /// provider's context window. The final user message is always kept.
    async fn fit_context(&self, request: &mut CompletionRequest) {
        let budget = self
            .provider
            .capabilities()
            .max_context_tokens
            .saturating_sub(request.max_tokens);
        while request.messages.len() > 1 {
            match self.provider.count_tokens(request).await {
                Ok(count) if count.input_tokens > budget => {
                    request.messages.remove(0);
                }
                _ => break,
            }
        }
    }

    async fn complete_text(&self, request: &CompletionRequest) -> Option<String> {
        match self.provider.complete(request).await {
            Ok(response) => {
                let text = response.content.trim();
                if text.is_empty() {
                    tracing::warn!(model = %request.model, "LLM returned empty content, using fallback");
                    None
                } else {
                    tracing::debug!(
                        model = %response.model,
                        input_tokens = response.usage.input_tokens,
                        output_tokens = response.usage.output_tokens,
                        "LLM completion"
                    );
                    Some(text.to_string())
                }
            }
            Err(e) => {
                tracing::warn!(base_url = %self.config.base_url, error = %e, "LLM unavailable, using fallback");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use futures_util::StreamExt;
    use kindred_types::llm::{
        CompletionResponse, ProviderCapabilities, StopReason, TokenCount, Usage,
    };

    use crate::llm::provider::LlmProvider;

    #[derive(Clone)]
    enum Reply {
        Text(&'static str),
        Down,
    }

    struct MockProvider {
        capabilities: ProviderCapabilities,
        reply: Reply,
        models: Vec<&'static str>,
        listings: Arc<AtomicUsize>,
        last_request: Arc<Mutex<Option<CompletionRequest>>>,
    }

    impl MockProvider {
        fn new(reply: Reply, models: Vec<&'static str>) -> Self {
            Self {
                capabilities: ProviderCapabilities {
                    streaming: true,
                    max_context_tokens: 8192,
                    max_output_tokens: 1024,
                },
                reply,
                models,
                listings: Arc::new(AtomicUsize::new(0)),
                last_request: Arc::new(Mutex::new(None)),
            }
        }
    }

    impl LlmProvider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        fn capabilities(&self) -> &ProviderCapabilities {
            &self.capabilities
        }

        fn complete(
            &self,
            request: &CompletionRequest,
        ) -> impl Future<Output = Result<CompletionResponse, LlmError>> + Send {
            *self.last_request.lock().unwrap() = Some(request.clone());
            let reply = self.reply.clone();
            let model = request.model.clone();
            async move {
                match reply {
                    Reply::Text(text) => Ok(CompletionResponse {
                        id: "resp-1".to_string(),
                        content: text.to_string(),
                        model,
                        stop_reason: StopReason::EndTurn,
                        usage: Usage::default(),
                    }),
                    Reply::Down => Err(LlmError::Unavailable("connection refused".to_string())),
                }
            }
        }

        fn stream(
            &self,
            _request: CompletionRequest,
        ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>> {
            let reply = self.reply.clone();
            Box::pin(async_stream::stream! {
                match reply {
                    Reply::Text(text) => {
                        yield Ok(StreamEvent::Connected);
                        for word in text.split_inclusive(' ') {
                            yield Ok(StreamEvent::TextDelta { text: word.to_string() });
                        }
                        yield Ok(StreamEvent::Done);
                    }
                    Reply::Down => yield Err(LlmError::Unavailable("down".to_string())),
                }
            })
        }

        fn count_tokens(
            &self,
            request: &CompletionRequest,
        ) -> impl Future<Output = Result<TokenCount, LlmError>> + Send {
            let chars: usize = request.messages.iter().map(|m| m.content.len()).sum();
            async move {
                Ok(TokenCount {
                    input_tokens: (chars / 4) as u32,
                })
            }
        }

        fn list_models(&self) -> impl Future<Output = Result<Vec<ModelInfo>, LlmError>> + Send {
            self.listings.fetch_add(1, Ordering::SeqCst);
            let reply = self.reply.clone();
            let models = self.models.clone();
            async move {
                match reply {
                    Reply::Down => Err(LlmError::Unavailable("down".to_string())),
                    Reply::Text(_) => Ok(models
                        .into_iter()
                        .map(|id| ModelInfo {
                            id: id.to_string(),
                            owned_by: None,
                        })
                        .collect()),
                }
            }
        }
    }

    fn prompt(mood: Mood) -> CharacterPrompt {
        CharacterPrompt {
            name: "Luna".to_string(),
            system_prompt: None,
            memory_context: String::new(),
            mood,
        }
    }

    #[tokio::test]
    async fn test_chat_trims_reply() {
        let service = LlmService::new(
            BoxLlmProvider::new(MockProvider::new(Reply::Text("  hi there \n"), vec!["m1"])),
            LlmConfig::default(),
        );
        let reply = service.chat(vec![Message::user("hello")], None, None, None).await;
        assert_eq!(reply.content, "hi there");
        assert!(!reply.fallback);
    }

    #[tokio::test]
    async fn test_chat_falls_back_when_down() {
        let service = LlmService::new(
            BoxLlmProvider::new(MockProvider::new(Reply::Down, vec![])),
            LlmConfig::default(),
        );
        let reply = service.chat(vec![Message::user("hello")], None, None, None).await;
        assert!(reply.fallback);
        assert!(fallback::GENERIC_LINES.contains(&reply.content.as_str()));
        assert!(!service.is_available().await);
        assert_eq!(service.active_model().await, DEFAULT_MODEL);
    }

    #[tokio::test]
    async fn test_empty_reply_uses_mood_fallback() {
        let service = LlmService::new(
            BoxLlmProvider::new(MockProvider::new(Reply::Text("   "), vec!["m1"])),
            LlmConfig::default(),
        );
        let reply = service
            .generate_character_response(&prompt(Mood::Happy), "hi", &[], None)
            .await;
        assert!(reply.fallback);
        assert!(fallback::GOOD_MOOD_LINES.contains(&reply.content.as_str()));
    }

    #[tokio::test]
    async fn test_active_model_prefers_config_then_caches_listing() {
        let mock = MockProvider::new(Reply::Text("ok"), vec!["qwen2.5-7b", "other"]);
        let listings = Arc::clone(&mock.listings);
        let service = LlmService::new(BoxLlmProvider::new(mock), LlmConfig::default());

        assert_eq!(service.active_model().await, "qwen2.5-7b");
        assert_eq!(service.active_model().await, "qwen2.5-7b");
        assert_eq!(listings.load(Ordering::SeqCst), 1);

        let configured = LlmService::new(
            BoxLlmProvider::new(MockProvider::new(Reply::Text("ok"), vec!["qwen2.5-7b"])),
            LlmConfig {
                model: Some("pinned".to_string()),
                ..LlmConfig::default()
            },
        );
        assert_eq!(configured.active_model().await, "pinned");
    }

    #[tokio::test]
    async fn test_character_request_shape() {
        let mock = MockProvider::new(Reply::Text("hey you"), vec!["m1"]);
        let last = Arc::clone(&mock.last_request);
        let service = LlmService::new(BoxLlmProvider::new(mock), LlmConfig::default());

        let mut history: Vec<ChatMessage> = (0..30)
            .map(|i| {
                let role = if i % 2 == 0 { MessageRole::User } else { MessageRole::Assistant };
                ChatMessage::new(role, format!("msg {i}"))
            })
            .collect();
        history.push(ChatMessage::new(MessageRole::System, "ignored"));

        let mut character = prompt(Mood::Neutral);
        character.memory_context = "=== Recent Context ===\n- user: hi".to_string();

        let reply = service
            .generate_character_response(&character, "how are you?", &history, None)
            .await;
        assert_eq!(reply.content, "hey you");

        let request = last.lock().unwrap().clone().unwrap();
        let system = request.system.unwrap();
        assert!(system.starts_with("You are Luna, a virtual companion."));
        assert!(system.ends_with("## Relevant Memories\n=== Recent Context ===\n- user: hi"));
        // last 20 history entries minus the system one, plus the new message
        assert_eq!(request.messages.len(), 20);
        assert_eq!(request.messages.last().unwrap().content, "how are you?");
        assert_eq!(request.messages[0].content, "msg 11");
        assert_eq!(request.temperature, Some(0.85));
    }

    #[tokio::test]
    async fn test_stream_yields_text() {
        let service = LlmService::new(
            BoxLlmProvider::new(MockProvider::new(Reply::Text("one two"), vec!["m1"])),
            LlmConfig::default(),
        );
        let request = service.request(vec![Message::user("hi")], None, None, None).await;
        let mut text = String::new();
        let mut stream = service.stream(request);
        while let Some(event) = stream.next().await {
            if let StreamEvent::TextDelta { text: t } = event.unwrap() {
                text.push_str(&t);
            }
        }
        assert_eq!(text, "one two");
    }
}
