//! Prompt construction for character images.

use rand::Rng;
use rand::seq::IndexedRandom;

pub const STYLE: &str = "realistic, photorealistic, 8k uhd, high detail, professional photography";

pub const NEGATIVE: &str = "nsfw, nude, explicit, lowres, bad anatomy, bad hands, text, error, \
missing fingers, extra digit, fewer digits, cropped, worst quality, low quality, normal quality, \
jpeg artifacts, signature, watermark, username, blurry, artist name, deformed, ugly, mutilated, \
child, minor, underage";

const MOODS: &[(&str, &str)] = &[
    ("happy", "bright smile, cheerful expression, happy eyes"),
    ("playful", "playful grin, mischievous smile, sparkling eyes"),
    ("shy", "shy smile, blushing, looking down slightly, soft expression"),
    ("excited", "excited expression, wide smile, energetic, vibrant"),
    ("loving", "warm smile, soft gaze, affectionate, tender"),
    ("affectionate", "warm smile, soft gaze, affectionate, tender"),
    ("confident", "confident gaze, subtle smile, assured expression"),
    ("calm", "serene expression, relaxed smile, peaceful eyes"),
    ("thoughtful", "thoughtful look, gentle half smile, gazing away"),
    ("tired", "sleepy eyes, lazy smile, cozy look"),
    ("sad", "melancholy expression, downcast eyes, wistful"),
    ("lonely", "wistful expression, soft longing gaze"),
    ("surprised", "surprised look, wide eyes, open mouth smile"),
    ("neutral", "natural expression, relaxed face"),
];

const SETTINGS: &[(&str, &str)] = &[
    ("casual", "casual home interior, cozy room, warm lighting"),
    ("home", "cozy living room, soft blanket, warm ambient lighting"),
    ("outdoors", "outdoor setting, natural sunlight, greenery, park"),
    ("beach", "beach background, ocean waves, golden hour light, sand"),
    ("gym", "gym environment, athletic wear, mirrors, equipment in background"),
    ("outfit", "full body mirror selfie, stylish outfit, bright room"),
    ("portrait", "close-up portrait, soft studio lighting, shallow depth of field"),
    ("night", "evening setting, city lights bokeh, moody atmosphere"),
    ("morning", "morning light streaming through window, fresh natural look"),
    ("cafe", "coffee shop setting, warm light, wooden interior"),
    ("office", "professional office setting, well-lit"),
];

/// Mood and setting of a selfie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfieContext {
    pub mood: String,
    pub setting: String,
}

impl SelfieContext {
    fn new(mood: &str, setting: &str) -> Self {
        Self {
            mood: mood.to_string(),
            setting: setting.to_string(),
        }
    }
}

const CASUAL_CONTEXTS: &[(&str, &str)] = &[
    ("happy", "casual"),
    ("playful", "outdoors"),
    ("excited", "casual"),
    ("shy", "morning"),
];

const CLOSE_CONTEXTS: &[(&str, &str)] = &[
    ("loving", "home"),
    ("playful", "gym"),
    ("confident", "night"),
    ("happy", "cafe"),
    ("excited", "beach"),
];

/// Stable appearance anchor repeated in every prompt of a character.
pub fn character_seed(appearance: &str) -> String {
    format!("consistent character, same person, {appearance}")
}

pub fn mood_description(mood: &str) -> &'static str {
    lookup(MOODS, mood).unwrap_or("natural expression, relaxed face")
}

pub fn setting_description(setting: &str) -> &'static str {
    lookup(SETTINGS, setting).unwrap_or("casual home interior, cozy room, warm lighting")
}

/// (positive, negative) prompts for a character selfie.
pub fn selfie(appearance: &str, mood: &str, setting: &str, extra: Option<&str>) -> (String, String) {
    let mut positive = format!(
        "{STYLE}, portrait of a person, {}, {}, {}, selfie perspective, close up, face visible",
        character_seed(appearance),
        mood_description(mood),
        setting_description(setting),
    );
    if let Some(extra) = extra.map(str::trim).filter(|e| !e.is_empty()) {
        positive.push_str(", ");
        positive.push_str(extra);
    }
    (positive, NEGATIVE.to_string())
}

/// Pick a selfie context. Closer relationships (> 0.5) unlock more
/// personal settings.
pub fn random_context<R: Rng + ?Sized>(relationship: f64, rng: &mut R) -> SelfieContext {
    let pool: Vec<&(&str, &str)> = if relationship > 0.5 {
        CASUAL_CONTEXTS.iter().chain(CLOSE_CONTEXTS).collect()
    } else {
        CASUAL_CONTEXTS.iter().collect()
    };
    pool.choose(rng)
        .map(|(mood, setting)| SelfieContext::new(mood, setting))
        .unwrap_or_else(|| SelfieContext::new("happy", "casual"))
}

fn lookup(table: &[(&str, &'static str)], key: &str) -> Option<&'static str> {
    let key = key.trim().to_lowercase();
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selfie_prompt_layout() {
        let (positive, negative) = selfie("woman, 25 years old, brown hair", "happy", "beach", Some("sunglasses"));
        assert!(positive.starts_with(STYLE));
        assert!(positive.contains("consistent character, same person, woman, 25 years old, brown hair"));
        assert!(positive.contains("bright smile"));
        assert!(positive.contains("ocean waves"));
        assert!(positive.ends_with(", sunglasses"));
        assert!(negative.contains("nsfw"));
    }

    #[test]
    fn test_unknown_keys_fall_back() {
        assert_eq!(mood_description("grumpy"), "natural expression, relaxed face");
        assert_eq!(setting_description("moon"), setting_description("casual"));
        assert_eq!(mood_description(" Happy "), mood_description("happy"));
    }

    #[test]
    fn test_every_intent_subject_has_a_setting() {
        for subject in ["beach", "gym", "outfit", "portrait", "home", "casual"] {
            assert!(lookup(SETTINGS, subject).is_some(), "{subject}");
        }
    }

    #[test]
    fn test_random_context_respects_relationship() {
        let mut rng = rand::rng();
        let casual: Vec<SelfieContext> = CASUAL_CONTEXTS
            .iter()
            .map(|(m, s)| SelfieContext::new(m, s))
            .collect();
        for _ in 0..50 {
            assert!(casual.contains(&random_context(0.2, &mut rng)));
        }
    }
}
