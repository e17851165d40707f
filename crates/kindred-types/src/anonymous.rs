//! The anonymous contact: an unknown number that texts the phone scene.
//!
//! The contact is stored as an ordinary character tagged `anonymous`; its
//! progress lives in the profile under [`STATE_KEY`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Tag carried by the contact's character row.
pub const ANONYMOUS_TAG: &str = "anonymous";

/// Profile key holding the serialized [`AnonymousState`].
pub const STATE_KEY: &str = "anonymous_state";

/// Who is behind the unknown number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    Hacker,
    SecretAdmirer,
    #[default]
    MysteryStranger,
    AiEntity,
}

impl Persona {
    pub const ALL: [Persona; 4] = [
        Persona::Hacker,
        Persona::SecretAdmirer,
        Persona::MysteryStranger,
        Persona::AiEntity,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Persona::Hacker => "hacker",
            Persona::SecretAdmirer => "secret_admirer",
            Persona::MysteryStranger => "mystery_stranger",
            Persona::AiEntity => "ai_entity",
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Persona {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Persona::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| format!("invalid persona: '{wanted}'"))
    }
}

/// One-off story beats the contact can fire. Each fires at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryEvent {
    FirstContact,
    Riddle,
    SecretDrop,
    DistressSignal,
    IdentityHint,
    PhotoClue,
    RevealTease,
}

impl StoryEvent {
    /// Evaluation order.
    pub const ALL: [StoryEvent; 7] = [
        StoryEvent::FirstContact,
        StoryEvent::Riddle,
        StoryEvent::SecretDrop,
        StoryEvent::DistressSignal,
        StoryEvent::IdentityHint,
        StoryEvent::PhotoClue,
        StoryEvent::RevealTease,
    ];

    /// Messages the contact must have sent before this can fire.
    pub fn min_messages(self) -> u32 {
        match self {
            StoryEvent::FirstContact => 0,
            StoryEvent::Riddle => 5,
            StoryEvent::SecretDrop => 10,
            StoryEvent::DistressSignal => 15,
            StoryEvent::IdentityHint => 20,
            StoryEvent::PhotoClue => 25,
            StoryEvent::RevealTease => 40,
        }
    }

    /// Chance per check once eligible.
    pub fn probability(self) -> f64 {
        match self {
            StoryEvent::FirstContact => 0.15,
            StoryEvent::Riddle => 0.2,
            StoryEvent::SecretDrop => 0.3,
            StoryEvent::DistressSignal => 0.1,
            StoryEvent::IdentityHint => 0.25,
            StoryEvent::PhotoClue => 0.2,
            StoryEvent::RevealTease => 0.15,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StoryEvent::FirstContact => "first_contact",
            StoryEvent::Riddle => "riddle",
            StoryEvent::SecretDrop => "secret_drop",
            StoryEvent::DistressSignal => "distress_signal",
            StoryEvent::IdentityHint => "identity_hint",
            StoryEvent::PhotoClue => "photo_clue",
            StoryEvent::RevealTease => "reveal_tease",
        }
    }
}

impl fmt::Display for StoryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of the contact, persisted with its character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnonymousState {
    pub persona: Persona,
    pub message_count: u32,
    #[serde(default)]
    pub events_triggered: Vec<StoryEvent>,
    #[serde(default)]
    pub revealed_hints: Vec<String>,
    pub last_contact: Option<DateTime<Utc>>,
    /// Chain id shared by every interaction of the thread.
    pub thread_id: Uuid,
    pub active: bool,
}

impl AnonymousState {
    pub fn new(persona: Persona) -> Self {
        Self {
            persona,
            message_count: 0,
            events_triggered: Vec::new(),
            revealed_hints: Vec::new(),
            last_contact: None,
            thread_id: Uuid::new_v4(),
            active: true,
        }
    }

    pub fn has_fired(&self, event: StoryEvent) -> bool {
        self.events_triggered.contains(&event)
    }
}

/// Which way a thread message travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// From the user to the contact.
    Incoming,
    /// From the contact to the user.
    Outgoing,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Incoming => "incoming",
            Direction::Outgoing => "outgoing",
        }
    }
}

/// One message of the anonymous thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnonymousMessage {
    pub character_id: Uuid,
    pub persona: Persona,
    pub direction: Direction,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<StoryEvent>,
    /// The LLM was unavailable and a canned line was used.
    #[serde(default)]
    pub fallback: bool,
    pub sent_at: DateTime<Utc>,
}

/// What the phone scene shows for the contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnonymousContactInfo {
    pub character_id: Uuid,
    pub display_name: String,
    pub number: String,
    pub avatar: String,
    pub persona: Persona,
    pub message_count: u32,
    pub thread_id: Uuid,
    pub active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummonRequest {
    /// Random when omitted.
    pub persona: Option<Persona>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnonymousReplyRequest {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persona_parse_and_serde_agree() {
        for persona in Persona::ALL {
            assert_eq!(persona.to_string().parse::<Persona>().unwrap(), persona);
            let json = serde_json::to_string(&persona).unwrap();
            assert_eq!(json, format!("\"{persona}\""));
        }
        assert!("ghost".parse::<Persona>().is_err());
    }

    #[test]
    fn test_story_thresholds_grow() {
        let mins: Vec<u32> = StoryEvent::ALL.iter().map(|e| e.min_messages()).collect();
        assert!(mins.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(StoryEvent::FirstContact.min_messages(), 0);
    }

    #[test]
    fn test_state_roundtrips_through_json() {
        let mut state = AnonymousState::new(Persona::Hacker);
        state.events_triggered.push(StoryEvent::Riddle);
        let back: AnonymousState =
            serde_json::from_value(serde_json::to_value(&state).unwrap()).unwrap();
        assert_eq!(back, state);
        assert!(back.has_fired(StoryEvent::Riddle));
        assert!(!back.has_fired(StoryEvent::PhotoClue));
    }
}
