//! Keyword detection of what a chat message asks for.
//!
//! Photo requests win over video requests, which win over voice requests;
//! everything else is plain text.

use kindred_types::chat::Intent;

const SELFIE_KEYWORDS: &[&str] = &[
    "selfie",
    "photo",
    "picture",
    "pic",
    "image",
    "show me",
    "send me a photo",
    "send me a pic",
];

const VIDEO_KEYWORDS: &[&str] = &[
    "video",
    "clip",
    "film",
    "record yourself",
    "send a video",
    "video message",
];

const VOICE_KEYWORDS: &[&str] = &[
    "voice message",
    "voice note",
    "audio",
    "record",
    "sing",
    "tell me",
    "story",
];

pub fn parse_intent(message: &str) -> Intent {
    let msg = message.to_lowercase();
    let has = |keywords: &[&str]| keywords.iter().any(|k| msg.contains(k));

    if has(SELFIE_KEYWORDS) {
        return Intent::Selfie {
            subject: selfie_subject(&msg).to_string(),
        };
    }

    if has(VIDEO_KEYWORDS) {
        let topic = if msg.contains("story") {
            "tell me a story"
        } else if msg.contains("day") {
            "your day"
        } else if msg.contains("outfit") {
            "show me your outfit"
        } else if msg.contains("dance") {
            "dance for me"
        } else {
            "your day"
        };
        return Intent::VideoMessage {
            topic: topic.to_string(),
        };
    }

    if has(VOICE_KEYWORDS) {
        return Intent::VoiceMessage {
            topic: message.to_string(),
        };
    }

    Intent::Text
}

fn selfie_subject(msg: &str) -> &'static str {
    if msg.contains("beach") {
        "beach"
    } else if msg.contains("bedroom") || msg.contains("bed") || msg.contains("home") {
        "home"
    } else if msg.contains("gym") || msg.contains("workout") {
        "gym"
    } else if msg.contains("outfit") || msg.contains("wearing") {
        "outfit"
    } else if msg.contains("face") || msg.contains("smile") {
        "portrait"
    } else {
        "casual"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selfie(subject: &str) -> Intent {
        Intent::Selfie {
            subject: subject.to_string(),
        }
    }

    #[test]
    fn test_selfie_subjects() {
        assert_eq!(parse_intent("send me a selfie"), selfie("casual"));
        assert_eq!(parse_intent("Pic from the BEACH?"), selfie("beach"));
        assert_eq!(parse_intent("photo of you in bed"), selfie("home"));
        assert_eq!(parse_intent("show me your workout"), selfie("gym"));
        assert_eq!(parse_intent("what are you wearing? photo pls"), selfie("outfit"));
        assert_eq!(parse_intent("picture of that smile"), selfie("portrait"));
    }

    #[test]
    fn test_selfie_beats_video_and_voice() {
        // "picture" and "video" and "tell me" all present
        assert_eq!(parse_intent("tell me about the video picture"), selfie("casual"));
    }

    #[test]
    fn test_video_topics() {
        let topic = |m: &str| match parse_intent(m) {
            Intent::VideoMessage { topic } => topic,
            other => panic!("expected video, got {other:?}"),
        };
        assert_eq!(topic("send a video story"), "tell me a story");
        assert_eq!(topic("video of your day"), "your day");
        assert_eq!(topic("film your outfit"), "show me your outfit");
        assert_eq!(topic("clip of you dancing, dance!"), "dance for me");
        assert_eq!(topic("video please"), "your day");
    }

    #[test]
    fn test_voice_keeps_original_message() {
        assert_eq!(
            parse_intent("Tell me something nice"),
            Intent::VoiceMessage {
                topic: "Tell me something nice".to_string()
            }
        );
        assert!(matches!(parse_intent("sing for me"), Intent::VoiceMessage { .. }));
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(parse_intent("how was work?"), Intent::Text);
        assert_eq!(parse_intent(""), Intent::Text);
    }
}
