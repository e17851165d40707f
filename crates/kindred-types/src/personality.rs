use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A reusable personality that characters can point at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Personality {
    pub id: Uuid,
    /// Unique display name ("Sweet Companion").
    pub name: String,
    /// Base system prompt injected at the top of every character prompt.
    pub system_prompt: String,
    pub traits: Vec<String>,
    pub communication_style: CommunicationStyle,
    /// Emotional openness, 0.0 guarded .. 1.0 an open book.
    pub openness: f64,
    pub values: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// How a personality talks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommunicationStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji_usage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directness: Option<String>,
}

impl CommunicationStyle {
    pub fn is_empty(&self) -> bool {
        self.tone.is_none()
            && self.emoji_usage.is_none()
            && self.humor.is_none()
            && self.directness.is_none()
    }

    /// Render as prompt lines, e.g. "tone: warm\nemoji usage: medium".
    pub fn describe(&self) -> String {
        [
            ("tone", &self.tone),
            ("emoji usage", &self.emoji_usage),
            ("humor", &self.humor),
            ("directness", &self.directness),
        ]
        .iter()
        .filter_map(|(label, value)| value.as_ref().map(|v| format!("{label}: {v}")))
        .collect::<Vec<_>>()
        .join("\n")
    }
}

/// Request to create a custom personality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePersonalityRequest {
    pub name: String,
    pub system_prompt: String,
    #[serde(default)]
    pub traits: Vec<String>,
    #[serde(default)]
    pub communication_style: CommunicationStyle,
    #[serde(default = "default_openness")]
    pub openness: f64,
    #[serde(default)]
    pub values: Vec<String>,
}

fn default_openness() -> f64 {
    0.5
}

/// Built-in personality definition.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PersonalityTemplate {
    pub key: &'static str,
    pub name: &'static str,
    pub system_prompt: &'static str,
    pub traits: &'static [&'static str],
    pub tone: &'static str,
    pub emoji_usage: &'static str,
    pub humor: &'static str,
    pub directness: &'static str,
    pub openness: f64,
    pub values: &'static [&'static str],
}

impl PersonalityTemplate {
    pub fn to_request(&self) -> CreatePersonalityRequest {
        CreatePersonalityRequest {
            name: self.name.to_string(),
            system_prompt: self.system_prompt.to_string(),
            traits: self.traits.iter().map(|t| t.to_string()).collect(),
            communication_style: CommunicationStyle {
                tone: Some(self.tone.to_string()),
                emoji_usage: Some(self.emoji_usage.to_string()),
                humor: Some(self.humor.to_string()),
                directness: Some(self.directness.to_string()),
            },
            openness: self.openness,
            values: self.values.iter().map(|v| v.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_communication_style_describe_skips_missing() {
        let style = CommunicationStyle {
            tone: Some("warm".into()),
            humor: Some("gentle".into()),
            ..Default::default()
        };
        assert_eq!(style.describe(), "tone: warm\nhumor: gentle");
        assert!(!style.is_empty());
        assert!(CommunicationStyle::default().is_empty());
    }

    #[test]
    fn test_create_request_defaults() {
        let req: CreatePersonalityRequest =
            serde_json::from_str(r#"{"name":"Quiet","system_prompt":"Be quiet."}"#).unwrap();
        assert!((req.openness - 0.5).abs() < f64::EPSILON);
        assert!(req.traits.is_empty());
        assert!(req.communication_style.is_empty());
    }
}
