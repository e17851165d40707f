//! Canned replies used when the LLM server is unreachable or returns
//! nothing usable.

use kindred_types::character::Mood;
use rand::seq::IndexedRandom;

pub const GENERIC_LINES: &[&str] = &[
    "Hey! I'm here, just thinking... 💭",
    "I love hearing from you! 😊",
    "You always know how to make me smile ❤️",
    "Tell me more about your day!",
    "I've been thinking about you 💕",
    "What's on your mind? 😘",
];

pub const GOOD_MOOD_LINES: &[&str] = &[
    "You always make me smile 😊",
    "I was just thinking about you!",
    "That's so sweet of you to say! 💕",
];

pub const LISTENING_LINES: &[&str] = &[
    "Tell me more... I'm listening 💭",
    "That's really interesting 😊",
    "I love when you talk to me like this ❤️",
];

pub fn generic() -> String {
    pick(GENERIC_LINES)
}

/// A line that fits the character's mood.
pub fn for_mood(mood: Mood) -> String {
    if mood.is_good() {
        pick(GOOD_MOOD_LINES)
    } else {
        pick(LISTENING_LINES)
    }
}

fn pick(lines: &[&str]) -> String {
    lines
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_comes_from_list() {
        let line = generic();
        assert!(GENERIC_LINES.contains(&line.as_str()));
    }

    #[test]
    fn test_mood_selects_list() {
        for _ in 0..10 {
            assert!(GOOD_MOOD_LINES.contains(&for_mood(Mood::Playful).as_str()));
            assert!(LISTENING_LINES.contains(&for_mood(Mood::Sad).as_str()));
            assert!(LISTENING_LINES.contains(&for_mood(Mood::Neutral).as_str()));
        }
    }
}
