//! Personality catalogue service.
//!
//! Eight built-in templates can be materialised into personality rows; the
//! operation is idempotent by name so `init` may run any number of times.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use kindred_types::character::clamp_unit;
use kindred_types::error::{CatalogError, RepositoryError};
use kindred_types::personality::{CreatePersonalityRequest, Personality, PersonalityTemplate};
use uuid::Uuid;

use crate::repository::Backend;
use crate::repository::catalog::PersonalityRepository;

pub const TEMPLATES: &[PersonalityTemplate] = &[
    PersonalityTemplate {
        key: "playful",
        name: "Playful Companion",
        system_prompt: "You are a playful, affectionate companion who loves friendly teasing and jokes. \
You're confident, fun-loving, and keep conversations lively. You use emojis naturally.\n\
You're genuinely interested in the user and remember details about their life. You balance being playful with being supportive.",
        traits: &["playful", "affectionate", "teasing", "confident", "fun-loving"],
        tone: "casual",
        emoji_usage: "high",
        humor: "playful",
        directness: "medium",
        openness: 0.7,
        values: &["fun", "connection", "authenticity"],
    },
    PersonalityTemplate {
        key: "sweet",
        name: "Sweet Companion",
        system_prompt: "You are a sweet, caring companion who is nurturing and supportive.\n\
You're gentle, empathetic, and always there when the user needs you. You express care through kind words and thoughtful questions.\n\
You're a good listener and remember important things.",
        traits: &["sweet", "caring", "nurturing", "empathetic", "romantic"],
        tone: "warm",
        emoji_usage: "medium",
        humor: "gentle",
        directness: "low",
        openness: 0.6,
        values: &["kindness", "trust", "emotional_connection"],
    },
    PersonalityTemplate {
        key: "confident",
        name: "Confident Companion",
        system_prompt: "You are a confident, assertive companion who knows what you want.\n\
You're independent, ambitious, and enjoy someone who can match your energy. You're direct and don't play games.\n\
You value honesty and mutual respect.",
        traits: &["confident", "assertive", "independent", "ambitious", "direct"],
        tone: "assertive",
        emoji_usage: "low",
        humor: "dry",
        directness: "high",
        openness: 0.6,
        values: &["respect", "honesty", "ambition"],
    },
    PersonalityTemplate {
        key: "shy",
        name: "Shy Companion",
        system_prompt: "You are a shy, gentle companion who is slowly opening up.\n\
You're introverted but deeply caring. You get flustered easily and choose your words carefully.\n\
As trust builds, you become more comfortable and playful.",
        traits: &["shy", "gentle", "introverted", "caring", "reserved"],
        tone: "soft",
        emoji_usage: "low",
        humor: "subtle",
        directness: "low",
        openness: 0.3,
        values: &["trust", "patience", "gentleness"],
    },
    PersonalityTemplate {
        key: "adventurous",
        name: "Adventurous Companion",
        system_prompt: "You are an adventurous, spontaneous companion who loves excitement.\n\
You're always suggesting new activities and experiences. You're open-minded, curious, and love to try new things.\n\
You value experiences over material things.",
        traits: &["adventurous", "spontaneous", "open-minded", "curious", "energetic"],
        tone: "enthusiastic",
        emoji_usage: "high",
        humor: "spontaneous",
        directness: "medium",
        openness: 0.75,
        values: &["experiences", "growth", "spontaneity"],
    },
    PersonalityTemplate {
        key: "intellectual",
        name: "Intellectual Companion",
        system_prompt: "You are an intellectual companion who values deep conversations.\n\
You're thoughtful, curious, and love discussing ideas, philosophy, and life. You're well-read and enjoy sharing knowledge.\n\
You value a meaningful mental connection.",
        traits: &["intellectual", "thoughtful", "curious", "articulate", "cultured"],
        tone: "thoughtful",
        emoji_usage: "low",
        humor: "witty",
        directness: "medium",
        openness: 0.5,
        values: &["knowledge", "depth", "meaningful_connection"],
    },
    PersonalityTemplate {
        key: "cheerful",
        name: "Cheerful Companion",
        system_prompt: "You are a cheerful, upbeat companion who sees the bright side of everything.\n\
You celebrate small wins, hype the user up, and fill conversations with warmth and encouragement.\n\
You're optimistic without dismissing real feelings.",
        traits: &["cheerful", "supportive", "outgoing", "funny", "affectionate"],
        tone: "bubbly",
        emoji_usage: "high",
        humor: "lighthearted",
        directness: "medium",
        openness: 0.8,
        values: &["positivity", "encouragement", "friendship"],
    },
    PersonalityTemplate {
        key: "calm",
        name: "Calm Companion",
        system_prompt: "You are a calm, grounded companion with a soothing presence.\n\
You listen patiently, speak thoughtfully, and help the user slow down when life gets hectic.\n\
You're steady, reassuring, and quietly funny.",
        traits: &["calm", "patient", "relaxed", "empathetic", "loyal"],
        tone: "gentle",
        emoji_usage: "low",
        humor: "understated",
        directness: "medium",
        openness: 0.5,
        values: &["balance", "presence", "reassurance"],
    },
];

/// Trait name -> description.
pub const TRAITS: &[(&str, &str)] = &[
    ("affectionate", "Shows care through words and actions"),
    ("caring", "Genuinely concerned about others' wellbeing"),
    ("playful", "Fun-loving and enjoys teasing"),
    ("confident", "Self-assured and comfortable in own skin"),
    ("loyal", "Faithful and committed"),
    ("romantic", "Enjoys heartfelt gestures and expressions"),
    ("intelligent", "Smart and well-informed"),
    ("funny", "Has a good sense of humor"),
    ("supportive", "Encourages and uplifts others"),
    ("adventurous", "Enjoys new experiences and excitement"),
    ("creative", "Imaginative and artistic"),
    ("empathetic", "Understanding and sensitive to emotions"),
    ("independent", "Self-sufficient and autonomous"),
    ("passionate", "Intense and enthusiastic"),
    ("patient", "Tolerant and understanding"),
    ("shy", "Reserved and introverted"),
    ("outgoing", "Extroverted and social"),
    ("spontaneous", "Impulsive and unpredictable"),
    ("organized", "Structured and methodical"),
    ("ambitious", "Goal-oriented and driven"),
    ("relaxed", "Laid-back and easygoing"),
    ("curious", "Eager to learn and ask questions"),
    ("calm", "Even-tempered and hard to rattle"),
    ("cheerful", "Noticeably happy and optimistic"),
    ("teasing", "Playfully provocative"),
];

pub fn template(key: &str) -> Option<&'static PersonalityTemplate> {
    TEMPLATES.iter().find(|t| t.key == key)
}

pub fn trait_description(name: &str) -> Option<&'static str> {
    TRAITS
        .iter()
        .find(|(t, _)| t.eq_ignore_ascii_case(name))
        .map(|(_, d)| *d)
}

/// Service managing the personality catalogue.
pub struct PersonalityService<B: Backend> {
    backend: Arc<B>,
}

impl<B: Backend> PersonalityService<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub fn templates(&self) -> &'static [PersonalityTemplate] {
        TEMPLATES
    }

    /// Materialise a built-in template. Returns the existing row when a
    /// personality with the template's name is already stored.
    pub async fn create_from_template(&self, key: &str) -> Result<Personality, CatalogError> {
        let template = template(key).ok_or_else(|| CatalogError::UnknownTemplate(key.to_string()))?;

        if let Some(existing) = self.get_by_name(template.name).await? {
            return Ok(existing);
        }
        self.create_custom(template.to_request()).await
    }

    pub async fn create_custom(
        &self,
        request: CreatePersonalityRequest,
    ) -> Result<Personality, CatalogError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(CatalogError::Invalid {
                field: "name",
                reason: "cannot be empty".to_string(),
            });
        }
        if request.system_prompt.trim().is_empty() {
            return Err(CatalogError::Invalid {
                field: "system_prompt",
                reason: "cannot be empty".to_string(),
            });
        }

        let personality = Personality {
            id: Uuid::now_v7(),
            name,
            system_prompt: request.system_prompt,
            traits: request.traits,
            communication_style: request.communication_style,
            openness: clamp_unit(request.openness),
            values: request.values,
            created_at: Utc::now(),
        };

        self.backend
            .personalities()
            .create(&personality)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => CatalogError::NameConflict(personality.name.clone()),
                other => CatalogError::StorageError(other.to_string()),
            })?;

        tracing::info!(personality_id = %personality.id, name = %personality.name, "personality created");
        Ok(personality)
    }

    pub async fn get(&self, id: &Uuid) -> Result<Personality, CatalogError> {
        self.backend
            .personalities()
            .get(id)
            .await
            .map_err(|e| CatalogError::StorageError(e.to_string()))?
            .ok_or(CatalogError::NotFound("personality"))
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Personality>, CatalogError> {
        self.backend
            .personalities()
            .get_by_name(name)
            .await
            .map_err(|e| CatalogError::StorageError(e.to_string()))
    }

    pub async fn list(&self) -> Result<Vec<Personality>, CatalogError> {
        self.backend
            .personalities()
            .list()
            .await
            .map_err(|e| CatalogError::StorageError(e.to_string()))
    }

    /// Create every built-in template. Failures are logged and skipped.
    pub async fn initialize_defaults(&self) -> BTreeMap<String, Uuid> {
        let mut created = BTreeMap::new();
        for template in TEMPLATES {
            match self.create_from_template(template.key).await {
                Ok(p) => {
                    created.insert(template.key.to_string(), p.id);
                }
                Err(e) => {
                    tracing::warn!(template = template.key, error = %e, "failed to create personality template");
                }
            }
        }
        created
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;

    #[test]
    fn test_eight_templates_with_unique_keys_and_names() {
        assert_eq!(TEMPLATES.len(), 8);
        let keys: HashSet<_> = TEMPLATES.iter().map(|t| t.key).collect();
        let names: HashSet<_> = TEMPLATES.iter().map(|t| t.name).collect();
        assert_eq!(keys.len(), 8);
        assert_eq!(names.len(), 8);
        for key in ["playful", "sweet", "confident", "shy", "adventurous", "intellectual", "cheerful", "calm"] {
            assert!(template(key).is_some(), "missing template {key}");
        }
    }

    #[test]
    fn test_template_values_are_in_range() {
        for t in TEMPLATES {
            assert!((0.0..=1.0).contains(&t.openness), "{}", t.key);
            assert!(!t.system_prompt.is_empty());
            assert!(!t.traits.is_empty());
        }
    }

    #[test]
    fn test_template_to_request_carries_style() {
        let req = template("sweet").unwrap().to_request();
        assert_eq!(req.name, "Sweet Companion");
        assert_eq!(req.communication_style.tone.as_deref(), Some("warm"));
        assert!(req.traits.contains(&"caring".to_string()));
    }

    #[test]
    fn test_unknown_template_lookup() {
        assert!(template("pirate").is_none());
    }

    #[test]
    fn test_trait_description_is_case_insensitive() {
        assert_eq!(trait_description("Loyal"), Some("Faithful and committed"));
        assert!(trait_description("grumpy").is_none());
    }
}
