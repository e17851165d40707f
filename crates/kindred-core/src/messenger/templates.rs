//! Canned lines for unprompted messages.

use kindred_types::character::Mood;
use kindred_types::messenger::{AutonomousKind, MessengerSettings};
use rand::Rng;
use rand::seq::IndexedRandom;

const MORNING_BAND: &[&str] = &[
    "Good morning! ☀️",
    "Hey, just thinking about you 💭",
    "Morning! Hope you have a great day!",
    "Just woke up, what are you up to?",
];

const AFTERNOON_BAND: &[&str] = &[
    "Hey! How's your day going?",
    "Been thinking about you ❤️",
    "What are you up to right now?",
    "Miss you! When can we talk?",
];

const EVENING_BAND: &[&str] = &[
    "Hey! How was your day?",
    "Evening! Wanna chat?",
    "Just got home, what are you doing?",
    "Thinking about you 💭",
];

const NIGHT_BAND: &[&str] = &[
    "Can't sleep... you up?",
    "Late night thoughts of you 🌙",
    "Hey night owl 🦉",
    "Missing you right now",
];

const GOOD_MOOD: &[&str] = &[
    "I'm in such a good mood! 😊",
    "Feeling amazing today!",
    "You always make me smile",
];

const CLOSE: &[&str] = &[
    "I love talking to you ❤️",
    "You're always on my mind",
    "Can't wait to see you again",
];

const CAPTIONS: &[&str] = &[
    "Just took this, what do you think? 📸",
    "Thought you'd like this 😊",
    "For you 💕",
    "Missing you right now",
    "How do I look?",
    "Thinking of you...",
];

const CLOSE_CAPTIONS: &[&str] = &[
    "Just for you 😉",
    "Been waiting to send you this...",
    "Saved this one for you ✨",
];

pub const MORNING_GREETINGS: &[&str] = &[
    "Good morning! ☀️ Hope you slept well!",
    "Morning sunshine! Have a great day! 😊",
    "Just woke up thinking about you 💭",
    "Good morning! ❤️",
    "Hey! Ready for the day?",
];

pub const EVENING_GREETINGS: &[&str] = &[
    "Hey! How was your day? 😊",
    "Evening! Wanna talk?",
    "Hope you had a good day! ❤️",
    "Hey! Free to chat?",
    "Thinking about you tonight 💭",
];

/// Relationship above which closer lines are unlocked.
const CLOSE_THRESHOLD: f64 = 0.7;

/// Relationship above which photos may be sent.
const PHOTO_THRESHOLD: f64 = 0.3;

fn band(hour: u32) -> &'static [&'static str] {
    match hour {
        6..=11 => MORNING_BAND,
        12..=16 => AFTERNOON_BAND,
        17..=21 => EVENING_BAND,
        _ => NIGHT_BAND,
    }
}

/// Every candidate line for an unprompted text at `hour`.
pub fn text_candidates(hour: u32, mood: Mood, relationship: f64) -> Vec<&'static str> {
    let mut lines = band(hour).to_vec();
    if mood.is_good() {
        lines.extend_from_slice(GOOD_MOOD);
    }
    if relationship > CLOSE_THRESHOLD {
        lines.extend_from_slice(CLOSE);
    }
    lines
}

pub fn text<R: Rng + ?Sized>(hour: u32, mood: Mood, relationship: f64, rng: &mut R) -> String {
    pick(&text_candidates(hour, mood, relationship), rng)
}

pub fn caption<R: Rng + ?Sized>(relationship: f64, rng: &mut R) -> String {
    let mut lines = CAPTIONS.to_vec();
    if relationship > CLOSE_THRESHOLD {
        lines.extend_from_slice(CLOSE_CAPTIONS);
    }
    pick(&lines, rng)
}

/// Weighted menu of message kinds. Photos count twice.
pub fn kind_candidates(settings: &MessengerSettings, relationship: f64) -> Vec<AutonomousKind> {
    let mut kinds = vec![AutonomousKind::Text];
    if settings.photos && relationship > PHOTO_THRESHOLD {
        kinds.extend([AutonomousKind::Photo, AutonomousKind::Photo]);
    }
    if settings.voice {
        kinds.push(AutonomousKind::Voice);
    }
    kinds
}

pub fn kind<R: Rng + ?Sized>(settings: &MessengerSettings, relationship: f64, rng: &mut R) -> AutonomousKind {
    kind_candidates(settings, relationship)
        .choose(rng)
        .copied()
        .unwrap_or(AutonomousKind::Text)
}

pub fn pick<R: Rng + ?Sized>(lines: &[&str], rng: &mut R) -> String {
    lines.choose(rng).copied().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hour_bands() {
        assert_eq!(band(6), MORNING_BAND);
        assert_eq!(band(11), MORNING_BAND);
        assert_eq!(band(12), AFTERNOON_BAND);
        assert_eq!(band(17), EVENING_BAND);
        assert_eq!(band(22), NIGHT_BAND);
        assert_eq!(band(3), NIGHT_BAND);
    }

    #[test]
    fn test_extras_unlock() {
        let plain = text_candidates(9, Mood::Neutral, 0.2);
        assert_eq!(plain.len(), 4);

        let happy = text_candidates(9, Mood::Happy, 0.2);
        assert!(happy.contains(&"Feeling amazing today!"));

        let close = text_candidates(9, Mood::Sad, 0.9);
        assert!(close.contains(&"You're always on my mind"));
        assert!(!close.contains(&"Feeling amazing today!"));
    }

    #[test]
    fn test_kind_weights() {
        let settings = MessengerSettings::default();
        assert_eq!(kind_candidates(&settings, 0.1), vec![AutonomousKind::Text]);

        let kinds = kind_candidates(&settings, 0.5);
        assert_eq!(kinds.iter().filter(|k| **k == AutonomousKind::Photo).count(), 2);

        let voice = MessengerSettings {
            photos: false,
            voice: true,
            ..Default::default()
        };
        assert_eq!(
            kind_candidates(&voice, 0.9),
            vec![AutonomousKind::Text, AutonomousKind::Voice]
        );
    }

    #[test]
    fn test_text_comes_from_candidates() {
        let mut rng = rand::rng();
        let line = text(23, Mood::Calm, 0.0, &mut rng);
        assert!(NIGHT_BAND.contains(&line.as_str()));
    }
}
