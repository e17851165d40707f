use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Maximum length of a character name after trimming.
pub const MAX_NAME_LEN: usize = 100;

/// A chat persona.
///
/// Identity columns live on the `characters` row; anything free-form
/// (backstory, quirks, voice sample) lives in `profile`, which is persisted
/// as the JSON `metadata` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: Uuid,
    pub name: String,
    pub age: Option<u32>,
    pub sex: Option<String>,
    pub hair_color: Option<String>,
    pub eye_color: Option<String>,
    pub height: Option<String>,
    pub body_type: Option<String>,
    pub personality_id: Option<Uuid>,
    pub tags: Vec<String>,
    #[serde(default)]
    pub profile: CharacterProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Extended character profile stored in the metadata JSON blob.
///
/// Unknown keys are preserved in `extra` so that partial updates from older
/// clients never drop data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backstory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interests: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quirks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fears: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CharacterProfile {
    /// Overlay every field that is set in `patch` onto `self`.
    pub fn merge(&mut self, patch: CharacterProfile) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if patch.$field.is_some() { self.$field = patch.$field; })*
            };
        }
        take!(backstory, occupation, speech_style, interests, quirks, fears, secrets, avatar_url, voice_id);
        self.extra.extend(patch.extra);
    }
}

/// Mutable per-character state, one row per character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterState {
    pub character_id: Uuid,
    pub mood: Mood,
    /// 0.0 exhausted .. 1.0 full of energy.
    pub energy: f64,
    /// 0.0 strangers .. 1.0 very close.
    pub relationship_level: f64,
    pub affection: f64,
    pub last_interaction: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl CharacterState {
    /// Fresh state for a newly created character.
    pub fn initial(character_id: Uuid) -> Self {
        Self {
            character_id,
            mood: Mood::Neutral,
            energy: 0.8,
            relationship_level: 0.0,
            affection: 0.0,
            last_interaction: None,
            metadata: serde_json::json!({}),
            updated_at: Utc::now(),
        }
    }
}

/// Clamp a state dimension into `[0.0, 1.0]`. NaN collapses to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Character mood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Neutral,
    Happy,
    Excited,
    Playful,
    Affectionate,
    Calm,
    Thoughtful,
    Tired,
    Sad,
    Lonely,
}

impl Mood {
    pub const ALL: [Mood; 10] = [
        Mood::Neutral,
        Mood::Happy,
        Mood::Excited,
        Mood::Playful,
        Mood::Affectionate,
        Mood::Calm,
        Mood::Thoughtful,
        Mood::Tired,
        Mood::Sad,
        Mood::Lonely,
    ];

    /// Upbeat moods that unlock cheerful message templates.
    pub fn is_good(self) -> bool {
        matches!(self, Mood::Happy | Mood::Excited | Mood::Playful)
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mood::Neutral => "neutral",
            Mood::Happy => "happy",
            Mood::Excited => "excited",
            Mood::Playful => "playful",
            Mood::Affectionate => "affectionate",
            Mood::Calm => "calm",
            Mood::Thoughtful => "thoughtful",
            Mood::Tired => "tired",
            Mood::Sad => "sad",
            Mood::Lonely => "lonely",
        };
        f.write_str(s)
    }
}

impl FromStr for Mood {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mood::ALL
            .into_iter()
            .find(|m| m.to_string() == s.trim().to_lowercase())
            .ok_or_else(|| format!("invalid mood: '{s}'"))
    }
}

impl Default for Mood {
    fn default() -> Self {
        Mood::Neutral
    }
}

/// Request to create a new character. Only `name` is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateCharacterRequest {
    pub name: String,
    pub age: Option<u32>,
    pub sex: Option<String>,
    pub hair_color: Option<String>,
    pub eye_color: Option<String>,
    pub height: Option<String>,
    pub body_type: Option<String>,
    pub personality_id: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub profile: CharacterProfile,
}

/// Partial update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCharacterRequest {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub sex: Option<String>,
    pub hair_color: Option<String>,
    pub eye_color: Option<String>,
    pub height: Option<String>,
    pub body_type: Option<String>,
    pub personality_id: Option<Uuid>,
    pub tags: Option<Vec<String>>,
    pub profile: Option<CharacterProfile>,
}

/// Partial state update (absolute values).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateUpdate {
    pub mood: Option<Mood>,
    pub energy: Option<f64>,
    pub relationship_level: Option<f64>,
    pub affection: Option<f64>,
}

/// One change to a state row, applied by storage in a single statement.
///
/// Absolute values replace the column before the delta is added; the result
/// is clamped to `[0.0, 1.0]`. Deltas from concurrent changes accumulate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateChange {
    pub mood: Option<Mood>,
    pub energy: Option<f64>,
    pub relationship_level: Option<f64>,
    pub affection: Option<f64>,
    pub energy_delta: f64,
    pub relationship_delta: f64,
    pub affection_delta: f64,
    pub last_interaction: Option<DateTime<Utc>>,
}

impl StateChange {
    /// NaN and infinite inputs would poison the row; absolute values are
    /// clamped and non-finite deltas dropped.
    pub fn sanitized(mut self) -> Self {
        let finite = |d: f64| if d.is_finite() { d } else { 0.0 };
        self.energy = self.energy.map(clamp_unit);
        self.relationship_level = self.relationship_level.map(clamp_unit);
        self.affection = self.affection.map(clamp_unit);
        self.energy_delta = finite(self.energy_delta);
        self.relationship_delta = finite(self.relationship_delta);
        self.affection_delta = finite(self.affection_delta);
        self
    }
}

impl From<StateUpdate> for StateChange {
    fn from(update: StateUpdate) -> Self {
        Self {
            mood: update.mood,
            energy: update.energy,
            relationship_level: update.relationship_level,
            affection: update.affection,
            ..Self::default()
        }
    }
}

/// A character together with its live state, as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterView {
    #[serde(flatten)]
    pub character: Character,
    pub state: CharacterState,
}
