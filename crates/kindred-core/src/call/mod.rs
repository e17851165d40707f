//! Voice call lifecycle.
//!
//! One call at a time: ringing, then active once answered, then ended.
//! Audio is out of scope; while a call is active the user's turns go
//! through the companion chat like any other message. Ending a call leaves
//! a `voice_call` interaction behind.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kindred_types::call::{Call, CallDirection, CallStatus};
use kindred_types::chat::ChatReply;
use kindred_types::error::{CallError, ChatError};
use kindred_types::event::CompanionEvent;
use kindred_types::interaction::{Interaction, InteractionKind};
use rand::seq::IndexedRandom;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::chat::CompanionChat;
use crate::event::EventBus;
use crate::repository::Backend;
use crate::repository::character::CharacterRepository;
use crate::service::interaction::InteractionService;

pub const DEFAULT_HISTORY_LIMIT: u32 = 10;

const GREETINGS: &[&str] = &[
    "Hey! How are you?",
    "Hi! Good to hear from you!",
    "Hello! What's up?",
    "Hey there! Miss me?",
    "Hi! I was just thinking about you!",
    "Hey! Perfect timing, I was hoping you'd call!",
];

/// `call_{YYYYmmdd_HHMMSS}_{first 8 chars of the character id}`
pub fn call_id(character_id: &Uuid, at: DateTime<Utc>) -> String {
    let id = character_id.to_string();
    format!("call_{}_{}", at.format("%Y%m%d_%H%M%S"), &id[..8])
}

pub fn greeting() -> String {
    GREETINGS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(GREETINGS[0])
        .to_string()
}

pub struct CallManager<B: Backend> {
    backend: Arc<B>,
    chat: Arc<CompanionChat<B>>,
    interactions: InteractionService<B>,
    active: RwLock<Option<Call>>,
    events: EventBus,
}

impl<B: Backend> CallManager<B> {
    pub fn new(backend: Arc<B>, chat: Arc<CompanionChat<B>>, events: EventBus) -> Self {
        Self {
            interactions: InteractionService::new(Arc::clone(&backend)),
            backend,
            chat,
            active: RwLock::new(None),
            events,
        }
    }

    pub async fn start_call(
        &self,
        character_id: &Uuid,
        direction: CallDirection,
    ) -> Result<Call, CallError> {
        let character = self
            .backend
            .characters()
            .get(character_id)
            .await
            .map_err(|e| CallError::StorageError(e.to_string()))?
            .ok_or(CallError::CharacterNotFound)?;

        let mut active = self.active.write().await;
        if active.is_some() {
            return Err(CallError::AlreadyActive);
        }

        let now = Utc::now();
        let call = Call {
            id: call_id(character_id, now),
            character_id: *character_id,
            character_name: character.name,
            direction,
            status: CallStatus::Ringing,
            started_at: now,
            answered_at: None,
            ended_at: None,
        };
        *active = Some(call.clone());
        drop(active);

        let direction = direction.as_str();
        tracing::info!(call_id = %call.id, character = %call.character_name, direction, "call started");
        self.events.publish(CompanionEvent::CallStarted {
            call_id: call.id.clone(),
            character_id: call.character_id,
            character_name: call.character_name.clone(),
            direction: direction.to_string(),
        });
        Ok(call)
    }

    /// Pick up a ringing call. Returns the character's greeting.
    pub async fn answer(&self, call_id: &str) -> Result<String, CallError> {
        {
            let mut active = self.active.write().await;
            let call = active
                .as_mut()
                .filter(|c| c.id == call_id)
                .ok_or_else(|| CallError::NotFound(call_id.to_string()))?;
            if call.status == CallStatus::Ringing {
                call.status = CallStatus::Active;
                call.answered_at = Some(Utc::now());
            }
        }

        let greeting = greeting();
        tracing::info!(call_id, "call answered");
        self.events.publish(CompanionEvent::CallAnswered {
            call_id: call_id.to_string(),
            greeting: greeting.clone(),
        });
        Ok(greeting)
    }

    /// One user turn during an answered call.
    pub async fn say(&self, call_id: &str, text: &str) -> Result<ChatReply, CallError> {
        let character_id = {
            let active = self.active.read().await;
            let call = active
                .as_ref()
                .filter(|c| c.id == call_id)
                .ok_or_else(|| CallError::NotFound(call_id.to_string()))?;
            if call.status != CallStatus::Active {
                return Err(CallError::NotAnswered);
            }
            call.character_id
        };

        self.chat
            .send_message(&character_id, text)
            .await
            .map_err(|e| match e {
                ChatError::CharacterNotFound => CallError::CharacterNotFound,
                other => CallError::StorageError(other.to_string()),
            })
    }

    /// Hang up and log the call.
    pub async fn end(&self, call_id: &str) -> Result<Call, CallError> {
        let mut call = {
            let mut active = self.active.write().await;
            match active.as_ref() {
                Some(c) if c.id == call_id => {}
                _ => return Err(CallError::NotFound(call_id.to_string())),
            }
            active.take().ok_or_else(|| CallError::NotFound(call_id.to_string()))?
        };

        let now = Utc::now();
        call.status = CallStatus::Ended;
        call.ended_at = Some(now);
        let duration = call.duration_secs(now);

        let direction = call.direction.as_str();
        self.interactions
            .log(
                InteractionKind::VoiceCall,
                &call.character_id,
                &format!("Voice call ({direction})"),
                serde_json::json!({
                    "call_id": call.id,
                    "duration": duration,
                    "direction": direction,
                    "started_at": call.started_at.to_rfc3339(),
                    "ended_at": now.to_rfc3339(),
                }),
                None,
            )
            .await
            .map_err(|e| CallError::StorageError(e.to_string()))?;

        tracing::info!(call_id = %call.id, duration_secs = duration, "call ended");
        self.events.publish(CompanionEvent::CallEnded {
            call_id: call.id.clone(),
            duration_secs: duration,
        });
        Ok(call)
    }

    /// The call in progress, if any.
    pub async fn status(&self) -> Option<Call> {
        self.active.read().await.clone()
    }

    /// Logged calls, newest first.
    pub async fn history(
        &self,
        character_id: Option<&Uuid>,
        limit: Option<u32>,
    ) -> Result<Vec<Interaction>, CallError> {
        self.interactions
            .recent(
                character_id,
                Some(InteractionKind::VoiceCall),
                limit.unwrap_or(DEFAULT_HISTORY_LIMIT),
            )
            .await
            .map_err(|e| CallError::StorageError(e.to_string()))
    }
}
