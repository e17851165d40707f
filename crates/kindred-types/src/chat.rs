//! Types for the companion chat turn: what the user asked for and what
//! the character sent back.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the user's message asks the character to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    /// Plain conversation.
    Text,
    /// "send me a pic": `subject` is beach, gym, outfit, portrait, home or casual.
    Selfie { subject: String },
    VideoMessage { topic: String },
    VoiceMessage { topic: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

/// The character's side of a chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub conversation_id: Uuid,
    pub character_id: Uuid,
    pub content: String,
    pub intent: Intent,
    /// Path of a generated selfie or voice note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_path: Option<String>,
    /// True when the LLM was unreachable and a canned line was used.
    pub fallback: bool,
}
