//! Memory types for Kindred.
//!
//! A character remembers snippets of conversation, events, facts and
//! preferences. Each memory is a SQLite row plus (when embeddings are
//! enabled) a vector in the character's LanceDB table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    Conversation,
    Event,
    Fact,
    Preference,
    Emotion,
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryKind::Conversation => write!(f, "conversation"),
            MemoryKind::Event => write!(f, "event"),
            MemoryKind::Fact => write!(f, "fact"),
            MemoryKind::Preference => write!(f, "preference"),
            MemoryKind::Emotion => write!(f, "emotion"),
        }
    }
}

impl FromStr for MemoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "conversation" => Ok(MemoryKind::Conversation),
            "event" => Ok(MemoryKind::Event),
            "fact" => Ok(MemoryKind::Fact),
            "preference" => Ok(MemoryKind::Preference),
            "emotion" => Ok(MemoryKind::Emotion),
            other => Err(format!("invalid memory kind: '{other}'")),
        }
    }
}

impl Default for MemoryKind {
    fn default() -> Self {
        MemoryKind::Conversation
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub id: Uuid,
    pub character_id: Uuid,
    pub content: String,
    pub kind: MemoryKind,
    /// 0.0 trivia .. 1.0 never forget.
    pub importance: f64,
    pub emotion: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// How many times this memory was reinforced by a near-duplicate.
    pub access_count: u32,
    pub created_at: DateTime<Utc>,
}

/// Input for storing a memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMemory {
    pub content: String,
    #[serde(default)]
    pub kind: MemoryKind,
    #[serde(default = "default_importance")]
    pub importance: f64,
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

fn default_importance() -> f64 {
    0.5
}

impl NewMemory {
    pub fn new(content: impl Into<String>, kind: MemoryKind, importance: f64) -> Self {
        Self {
            content: content.into(),
            kind,
            importance,
            emotion: None,
            metadata: None,
        }
    }
}

/// A memory returned from semantic search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryHit {
    pub memory: Memory,
    /// Cosine distance from the query (0 = identical).
    pub distance: f32,
}

/// Optional filters for semantic search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryFilter {
    pub kind: Option<MemoryKind>,
    pub min_importance: Option<f64>,
}

impl MemoryFilter {
    pub fn matches(&self, memory: &Memory) -> bool {
        self.kind.is_none_or(|k| k == memory.kind)
            && self.min_importance.is_none_or(|min| memory.importance >= min)
    }
}

/// What `build_context` pulls from each source.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ContextLimits {
    pub n_recent: usize,
    pub n_semantic: usize,
    pub n_important: usize,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            n_recent: 5,
            n_semantic: 5,
            n_important: 3,
        }
    }
}

/// Threshold above which a memory counts as "important".
pub const IMPORTANT_THRESHOLD: f64 = 0.7;

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(kind: MemoryKind, importance: f64) -> Memory {
        Memory {
            id: Uuid::now_v7(),
            character_id: Uuid::now_v7(),
            content: "We met at a coffee shop".into(),
            kind,
            importance,
            emotion: None,
            metadata: serde_json::json!({}),
            access_count: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_memory_kind_roundtrip() {
        for kind in [
            MemoryKind::Conversation,
            MemoryKind::Event,
            MemoryKind::Fact,
            MemoryKind::Preference,
            MemoryKind::Emotion,
        ] {
            assert_eq!(kind.to_string().parse::<MemoryKind>().unwrap(), kind);
        }
        assert!("dream".parse::<MemoryKind>().is_err());
    }

    #[test]
    fn test_filter_matches() {
        let m = memory(MemoryKind::Event, 0.8);
        assert!(MemoryFilter::default().matches(&m));
        assert!(MemoryFilter { kind: Some(MemoryKind::Event), min_importance: Some(0.7) }.matches(&m));
        assert!(!MemoryFilter { kind: Some(MemoryKind::Fact), min_importance: None }.matches(&m));
        assert!(!MemoryFilter { kind: None, min_importance: Some(0.9) }.matches(&m));
    }

    #[test]
    fn test_new_memory_defaults_from_json() {
        let m: NewMemory = serde_json::from_str(r#"{"content":"likes hiking"}"#).unwrap();
        assert_eq!(m.kind, MemoryKind::Conversation);
        assert!((m.importance - 0.5).abs() < f64::EPSILON);
    }
}
