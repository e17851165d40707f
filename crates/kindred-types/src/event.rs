//! Event types for the Kindred event bus.
//!
//! `CompanionEvent` is what used to be pushed to the browser over a socket.
//! Every variant is Clone + Send + Sync for use with tokio broadcast channels
//! and is serialized with a `type` tag for the SSE stream.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::character::Mood;
use crate::scene::SceneKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CompanionEvent {
    /// A character said something (reply or unprompted message).
    MessageReceived {
        character_id: Uuid,
        character_name: String,
        content: String,
        /// "text", "photo", "voice", or "anonymous" for the unknown number.
        kind: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        media_path: Option<String>,
        autonomous: bool,
    },

    CharacterUpdated { character_id: Uuid },

    CharacterDeleted { character_id: Uuid },

    StateChanged {
        character_id: Uuid,
        mood: Mood,
        energy: f64,
        relationship_level: f64,
    },

    MemoryStored {
        character_id: Uuid,
        memory_id: Uuid,
        /// True when the content reinforced an existing memory.
        reinforced: bool,
    },

    MediaGenerated {
        character_id: Uuid,
        media_id: Uuid,
        kind: String,
        filepath: String,
        placeholder: bool,
    },

    SceneStarted {
        scene_id: Uuid,
        kind: SceneKind,
        name: String,
    },

    SceneStopped { scene_id: Uuid },

    CallStarted {
        call_id: String,
        character_id: Uuid,
        character_name: String,
        direction: String,
    },

    CallAnswered { call_id: String, greeting: String },

    CallEnded { call_id: String, duration_secs: f64 },
}

impl CompanionEvent {
    /// SSE event name (matches the serde tag).
    pub fn name(&self) -> &'static str {
        match self {
            CompanionEvent::MessageReceived { .. } => "message_received",
            CompanionEvent::CharacterUpdated { .. } => "character_updated",
            CompanionEvent::CharacterDeleted { .. } => "character_deleted",
            CompanionEvent::StateChanged { .. } => "state_changed",
            CompanionEvent::MemoryStored { .. } => "memory_stored",
            CompanionEvent::MediaGenerated { .. } => "media_generated",
            CompanionEvent::SceneStarted { .. } => "scene_started",
            CompanionEvent::SceneStopped { .. } => "scene_stopped",
            CompanionEvent::CallStarted { .. } => "call_started",
            CompanionEvent::CallAnswered { .. } => "call_answered",
            CompanionEvent::CallEnded { .. } => "call_ended",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tag_matches_name() {
        let events = vec![
            CompanionEvent::MessageReceived {
                character_id: Uuid::now_v7(),
                character_name: "Luna".into(),
                content: "Good morning! ☀️".into(),
                kind: "text".into(),
                media_path: None,
                autonomous: true,
            },
            CompanionEvent::SceneStopped { scene_id: Uuid::now_v7() },
            CompanionEvent::CallEnded { call_id: "call_x".into(), duration_secs: 3.5 },
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], event.name());
        }
    }

    #[test]
    fn test_media_path_omitted_when_absent() {
        let event = CompanionEvent::MessageReceived {
            character_id: Uuid::now_v7(),
            character_name: "Luna".into(),
            content: "hi".into(),
            kind: "text".into(),
            media_path: None,
            autonomous: false,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("media_path"));
    }
}
