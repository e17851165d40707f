//! Autonomous messenger settings and records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// How often a character reaches out unprompted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Low,
    #[default]
    Moderate,
    High,
}

impl Frequency {
    /// Minimum and maximum seconds between autonomous messages.
    pub fn interval_secs(self) -> (u64, u64) {
        match self {
            Frequency::Low => (3600, 7200),
            Frequency::Moderate => (1800, 3600),
            Frequency::High => (600, 1800),
        }
    }

    /// Probability that a due check actually sends something.
    pub fn chance(self) -> f64 {
        match self {
            Frequency::Low => 0.1,
            Frequency::Moderate => 0.3,
            Frequency::High => 0.6,
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Low => write!(f, "low"),
            Frequency::Moderate => write!(f, "moderate"),
            Frequency::High => write!(f, "high"),
        }
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Frequency::Low),
            "moderate" => Ok(Frequency::Moderate),
            "high" => Ok(Frequency::High),
            other => Err(format!("invalid frequency: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessengerSettings {
    pub frequency: Frequency,
    /// Local hours `[start, end)` during which checks may send.
    pub active_hours: (u32, u32),
    pub photos: bool,
    pub voice: bool,
}

impl Default for MessengerSettings {
    fn default() -> Self {
        Self {
            frequency: Frequency::Moderate,
            active_hours: (8, 23),
            photos: true,
            voice: false,
        }
    }
}

impl MessengerSettings {
    pub fn is_active_hour(&self, hour: u32) -> bool {
        let (start, end) = self.active_hours;
        start <= hour && hour < end
    }
}

/// A registered character as reported by the messenger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub character_id: Uuid,
    pub settings: MessengerSettings,
    /// Local `HH:MM` of the daily morning greeting.
    pub morning_at: String,
    /// Local `HH:MM` of the daily evening message.
    pub evening_at: String,
    pub last_message_at: Option<DateTime<Utc>>,
    /// Whether jobs are live on the scheduler.
    pub scheduled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutonomousKind {
    Text,
    Photo,
    Voice,
}

impl AutonomousKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AutonomousKind::Text => "text",
            AutonomousKind::Photo => "photo",
            AutonomousKind::Voice => "voice",
        }
    }
}

/// A message a character sent on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutonomousMessage {
    pub character_id: Uuid,
    pub character_name: String,
    pub kind: AutonomousKind,
    pub content: String,
    pub media_path: Option<String>,
    pub sent_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = MessengerSettings::default();
        assert_eq!(settings.frequency, Frequency::Moderate);
        assert_eq!(settings.active_hours, (8, 23));
        assert!(settings.photos);
        assert!(!settings.voice);
    }

    #[test]
    fn test_active_hours_are_half_open() {
        let settings = MessengerSettings::default();
        assert!(!settings.is_active_hour(7));
        assert!(settings.is_active_hour(8));
        assert!(settings.is_active_hour(22));
        assert!(!settings.is_active_hour(23));
    }

    #[test]
    fn test_partial_settings_fill_defaults() {
        let settings: MessengerSettings = serde_json::from_str(r#"{"frequency":"high"}"#).unwrap();
        assert_eq!(settings.frequency, Frequency::High);
        assert_eq!(settings.frequency.interval_secs(), (600, 1800));
        assert!(settings.photos);
    }

    #[test]
    fn test_frequency_parse() {
        assert_eq!("LOW".parse::<Frequency>().unwrap(), Frequency::Low);
        assert!("sometimes".parse::<Frequency>().is_err());
    }
}
