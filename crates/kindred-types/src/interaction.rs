//! Interaction log and media records.
//!
//! Every exchange with a character leaves an `Interaction` row; generated
//! files (selfies, voice notes) leave a `Media` row pointing at the file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Message,
    Voicemail,
    VoiceCall,
    Media,
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InteractionKind::Message => write!(f, "message"),
            InteractionKind::Voicemail => write!(f, "voicemail"),
            InteractionKind::VoiceCall => write!(f, "voice_call"),
            InteractionKind::Media => write!(f, "media"),
        }
    }
}

impl FromStr for InteractionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "message" => Ok(InteractionKind::Message),
            "voicemail" => Ok(InteractionKind::Voicemail),
            "voice_call" => Ok(InteractionKind::VoiceCall),
            "media" => Ok(InteractionKind::Media),
            other => Err(format!("invalid interaction kind: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: Uuid,
    pub kind: InteractionKind,
    pub character_id: Uuid,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub chain_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Interaction {
    pub fn new(
        kind: InteractionKind,
        character_id: Uuid,
        content: impl Into<String>,
        metadata: serde_json::Value,
        chain_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            character_id,
            content: content.into(),
            metadata,
            chain_id,
            created_at: Utc::now(),
        }
    }
}

/// A voicemail as presented in the inbox, decoded from its interaction row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voicemail {
    pub id: Uuid,
    pub character_id: Uuid,
    pub text: String,
    pub filepath: String,
    pub duration_secs: f64,
    pub listened: bool,
    pub created_at: DateTime<Utc>,
}

impl Voicemail {
    /// Decode a `voicemail` interaction. Returns `None` for other kinds.
    pub fn from_interaction(interaction: &Interaction) -> Option<Self> {
        if interaction.kind != InteractionKind::Voicemail {
            return None;
        }
        let meta = &interaction.metadata;
        Some(Self {
            id: interaction.id,
            character_id: interaction.character_id,
            text: interaction.content.clone(),
            filepath: meta
                .get("filepath")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            duration_secs: meta.get("duration").and_then(|v| v.as_f64()).unwrap_or(0.0),
            listened: meta.get("listened").and_then(|v| v.as_bool()).unwrap_or(false),
            created_at: interaction.created_at,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Voice,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Voice => write!(f, "voice"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(MediaKind::Image),
            "voice" => Ok(MediaKind::Voice),
            "video" => Ok(MediaKind::Video),
            other => Err(format!("invalid media kind: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    pub id: Uuid,
    pub character_id: Uuid,
    pub kind: MediaKind,
    pub filepath: String,
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interaction_kind_roundtrip() {
        for kind in [
            InteractionKind::Message,
            InteractionKind::Voicemail,
            InteractionKind::VoiceCall,
            InteractionKind::Media,
        ] {
            assert_eq!(kind.to_string().parse::<InteractionKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_voicemail_from_interaction() {
        let interaction = Interaction::new(
            InteractionKind::Voicemail,
            Uuid::now_v7(),
            "Call me back!",
            serde_json::json!({"filepath": "/tmp/a.wav", "duration": 2.0, "listened": false}),
            None,
        );
        let vm = Voicemail::from_interaction(&interaction).unwrap();
        assert_eq!(vm.text, "Call me back!");
        assert_eq!(vm.filepath, "/tmp/a.wav");
        assert!(!vm.listened);
    }

    #[test]
    fn test_voicemail_ignores_other_kinds() {
        let interaction = Interaction::new(
            InteractionKind::Message,
            Uuid::now_v7(),
            "hi",
            serde_json::json!({}),
            None,
        );
        assert!(Voicemail::from_interaction(&interaction).is_none());
    }
}
