use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::llm::MessageRole;

/// A conversation between the user and one character.
///
/// All interactions logged while the conversation is open share its
/// `chain_id`, so the full exchange can be replayed later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub character_id: Uuid,
    pub role_id: Option<Uuid>,
    pub chain_id: Uuid,
    pub messages: Vec<ChatMessage>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Conversation {
    pub fn is_ended(&self) -> bool {
        self.ended_at.is_some()
    }

    /// The last `n` messages, oldest first.
    pub fn tail(&self, n: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }
}

/// One message inside a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    /// `metadata.important == true`
    pub fn is_flagged_important(&self) -> bool {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("important"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// `metadata.importance`, defaulting to 0.5.
    pub fn importance(&self) -> f64 {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("importance"))
            .and_then(|v| v.as_f64())
            .unwrap_or(0.5)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartConversationRequest {
    pub role_id: Option<Uuid>,
    pub chain_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_returns_last_messages_in_order() {
        let conv = Conversation {
            id: Uuid::now_v7(),
            character_id: Uuid::now_v7(),
            role_id: None,
            chain_id: Uuid::now_v7(),
            messages: (0..5)
                .map(|i| ChatMessage::new(MessageRole::User, format!("m{i}")))
                .collect(),
            started_at: Utc::now(),
            ended_at: None,
            metadata: serde_json::json!({}),
        };
        let tail: Vec<_> = conv.tail(2).iter().map(|m| m.content.as_str()).collect();
        assert_eq!(tail, vec!["m3", "m4"]);
        assert_eq!(conv.tail(50).len(), 5);
    }

    #[test]
    fn test_message_importance_flags() {
        let mut msg = ChatMessage::new(MessageRole::Assistant, "remember this");
        assert!(!msg.is_flagged_important());
        assert!((msg.importance() - 0.5).abs() < f64::EPSILON);

        msg.metadata = Some(serde_json::json!({"important": true, "importance": 0.9}));
        assert!(msg.is_flagged_important());
        assert!((msg.importance() - 0.9).abs() < f64::EPSILON);
    }
}
