//! Character management service.
//!
//! Owns the character lifecycle (create, update, delete with memory
//! cleanup), the per-character state dimensions, and the text renderings of
//! a character used in prompts and image generation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use kindred_types::character::{
    Character, CharacterState, CharacterView, CreateCharacterRequest, MAX_NAME_LEN, Mood,
    StateChange, StateUpdate, UpdateCharacterRequest,
};
use kindred_types::error::{CharacterError, RepositoryError};
use kindred_types::event::CompanionEvent;
use kindred_types::personality::Personality;
use uuid::Uuid;

use crate::event::EventBus;
use crate::memory::service::MemoryService;
use crate::repository::Backend;
use crate::repository::catalog::PersonalityRepository;
use crate::repository::character::CharacterRepository;

/// Hours of silence after which a moderately close character reaches out.
const SILENCE_HOURS: i64 = 6;

pub struct CharacterService<B: Backend> {
    backend: Arc<B>,
    memory: Arc<MemoryService<B>>,
    events: EventBus,
}

impl<B: Backend> CharacterService<B> {
    pub fn new(backend: Arc<B>, memory: Arc<MemoryService<B>>, events: EventBus) -> Self {
        Self {
            backend,
            memory,
            events,
        }
    }

    pub async fn create(&self, request: CreateCharacterRequest) -> Result<Character, CharacterError> {
        let name = validate_name(&request.name)?;
        if let Some(personality_id) = &request.personality_id {
            self.ensure_personality(personality_id).await?;
        }

        let now = Utc::now();
        let character = Character {
            id: Uuid::now_v7(),
            name,
            age: request.age,
            sex: request.sex,
            hair_color: request.hair_color,
            eye_color: request.eye_color,
            height: request.height,
            body_type: request.body_type,
            personality_id: request.personality_id,
            tags: dedup_tags(request.tags),
            profile: request.profile,
            created_at: now,
            updated_at: now,
        };
        let state = CharacterState::initial(character.id);

        self.backend
            .characters()
            .create(&character, &state)
            .await
            .map_err(|e| CharacterError::StorageError(e.to_string()))?;

        tracing::info!(character_id = %character.id, name = %character.name, "character created");
        Ok(character)
    }

    pub async fn get(&self, id: &Uuid) -> Result<Character, CharacterError> {
        self.backend
            .characters()
            .get(id)
            .await
            .map_err(|e| CharacterError::StorageError(e.to_string()))?
            .ok_or(CharacterError::NotFound)
    }

    /// Character plus live state.
    pub async fn get_view(&self, id: &Uuid) -> Result<CharacterView, CharacterError> {
        let character = self.get(id).await?;
        let state = self.state(id).await?;
        Ok(CharacterView { character, state })
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Character>, CharacterError> {
        self.backend
            .characters()
            .get_by_name(name.trim())
            .await
            .map_err(|e| CharacterError::StorageError(e.to_string()))
    }

    /// Resolve a CLI-style reference: a UUID or an exact name.
    pub async fn resolve(&self, reference: &str) -> Result<Character, CharacterError> {
        if let Ok(id) = reference.parse::<Uuid>() {
            return self.get(&id).await;
        }
        self.find_by_name(reference).await?.ok_or(CharacterError::NotFound)
    }

    pub async fn list(&self) -> Result<Vec<Character>, CharacterError> {
        self.backend
            .characters()
            .list()
            .await
            .map_err(|e| CharacterError::StorageError(e.to_string()))
    }

    pub async fn update(
        &self,
        id: &Uuid,
        request: UpdateCharacterRequest,
    ) -> Result<Character, CharacterError> {
        let mut character = self.get(id).await?;

        if let Some(name) = request.name {
            character.name = validate_name(&name)?;
        }
        if let Some(personality_id) = request.personality_id {
            self.ensure_personality(&personality_id).await?;
            character.personality_id = Some(personality_id);
        }
        if request.age.is_some() {
            character.age = request.age;
        }
        if request.sex.is_some() {
            character.sex = request.sex;
        }
        if request.hair_color.is_some() {
            character.hair_color = request.hair_color;
        }
        if request.eye_color.is_some() {
            character.eye_color = request.eye_color;
        }
        if request.height.is_some() {
            character.height = request.height;
        }
        if request.body_type.is_some() {
            character.body_type = request.body_type;
        }
        if let Some(tags) = request.tags {
            character.tags = dedup_tags(tags);
        }
        if let Some(profile) = request.profile {
            character.profile.merge(profile);
        }
        character.updated_at = Utc::now();

        self.save(&character).await?;
        Ok(character)
    }

    /// Delete a character with its state, conversations, interactions,
    /// media rows and memories.
    pub async fn delete(&self, id: &Uuid) -> Result<(), CharacterError> {
        self.backend
            .characters()
            .delete(id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => CharacterError::NotFound,
                other => CharacterError::StorageError(other.to_string()),
            })?;

        if let Err(e) = self.memory.forget_vectors(id).await {
            tracing::warn!(character_id = %id, error = %e, "failed to drop vector memories");
        }

        self.events
            .publish(CompanionEvent::CharacterDeleted { character_id: *id });
        tracing::info!(character_id = %id, "character deleted");
        Ok(())
    }

    /// Returns false if the tag was already present.
    pub async fn add_tag(&self, id: &Uuid, tag: &str) -> Result<bool, CharacterError> {
        let tag = tag.trim();
        let mut character = self.get(id).await?;
        if tag.is_empty() || character.tags.iter().any(|t| t == tag) {
            return Ok(false);
        }
        character.tags.push(tag.to_string());
        character.updated_at = Utc::now();
        self.save(&character).await?;
        Ok(true)
    }

    /// Returns false if the tag was not present.
    pub async fn remove_tag(&self, id: &Uuid, tag: &str) -> Result<bool, CharacterError> {
        let mut character = self.get(id).await?;
        let before = character.tags.len();
        character.tags.retain(|t| t != tag.trim());
        if character.tags.len() == before {
            return Ok(false);
        }
        character.updated_at = Utc::now();
        self.save(&character).await?;
        Ok(true)
    }

    pub async fn personality_of(
        &self,
        character: &Character,
    ) -> Result<Option<Personality>, CharacterError> {
        let Some(personality_id) = &character.personality_id else {
            return Ok(None);
        };
        self.backend
            .personalities()
            .get(personality_id)
            .await
            .map_err(|e| CharacterError::StorageError(e.to_string()))
    }

    pub async fn state(&self, id: &Uuid) -> Result<CharacterState, CharacterError> {
        self.backend
            .characters()
            .get_state(id)
            .await
            .map_err(|e| CharacterError::StorageError(e.to_string()))?
            .ok_or(CharacterError::NotFound)
    }

    pub async fn set_mood(&self, id: &Uuid, mood: Mood) -> Result<CharacterState, CharacterError> {
        self.apply_change(
            id,
            StateChange {
                mood: Some(mood),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn adjust_relationship(
        &self,
        id: &Uuid,
        delta: f64,
    ) -> Result<CharacterState, CharacterError> {
        self.apply_change(
            id,
            StateChange {
                relationship_delta: delta,
                ..Default::default()
            },
        )
        .await
    }

    pub async fn adjust_energy(&self, id: &Uuid, delta: f64) -> Result<CharacterState, CharacterError> {
        self.apply_change(
            id,
            StateChange {
                energy_delta: delta,
                ..Default::default()
            },
        )
        .await
    }

    pub async fn adjust_affection(
        &self,
        id: &Uuid,
        delta: f64,
    ) -> Result<CharacterState, CharacterError> {
        self.apply_change(
            id,
            StateChange {
                affection_delta: delta,
                ..Default::default()
            },
        )
        .await
    }

    /// Apply absolute values from a partial update.
    pub async fn update_state(
        &self,
        id: &Uuid,
        update: StateUpdate,
    ) -> Result<CharacterState, CharacterError> {
        self.apply_change(id, StateChange::from(update)).await
    }

    pub async fn touch_interaction(&self, id: &Uuid) -> Result<CharacterState, CharacterError> {
        self.apply_change(
            id,
            StateChange {
                last_interaction: Some(Utc::now()),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn count(&self) -> Result<u64, CharacterError> {
        self.backend
            .characters()
            .count()
            .await
            .map_err(|e| CharacterError::StorageError(e.to_string()))
    }

    /// Deltas are added inside the store so concurrent adjustments all land.
    async fn apply_change(
        &self,
        id: &Uuid,
        change: StateChange,
    ) -> Result<CharacterState, CharacterError> {
        let state = self
            .backend
            .characters()
            .apply_state_change(id, &change.sanitized(), Utc::now())
            .await
            .map_err(|e| CharacterError::StorageError(e.to_string()))?
            .ok_or(CharacterError::NotFound)?;

        self.events.publish(CompanionEvent::StateChanged {
            character_id: state.character_id,
            mood: state.mood,
            energy: state.energy,
            relationship_level: state.relationship_level,
        });
        Ok(state)
    }

    async fn save(&self, character: &Character) -> Result<(), CharacterError> {
        self.backend
            .characters()
            .update(character)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => CharacterError::NotFound,
                other => CharacterError::StorageError(other.to_string()),
            })?;
        self.events.publish(CompanionEvent::CharacterUpdated {
            character_id: character.id,
        });
        Ok(())
    }

    async fn ensure_personality(&self, id: &Uuid) -> Result<(), CharacterError> {
        self.backend
            .personalities()
            .get(id)
            .await
            .map_err(|e| CharacterError::StorageError(e.to_string()))?
            .map(|_| ())
            .ok_or(CharacterError::PersonalityNotFound)
    }
}

fn validate_name(raw: &str) -> Result<String, CharacterError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(CharacterError::InvalidName("name cannot be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(CharacterError::InvalidName(format!(
            "name cannot exceed {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

/// Multi-line identity card used in system prompts.
pub fn describe(character: &Character) -> String {
    let mut parts = vec![format!("Name: {}", character.name)];
    if let Some(age) = character.age {
        parts.push(format!("Age: {age}"));
    }
    let labelled = [
        ("Sex", &character.sex),
        ("Hair", &character.hair_color),
        ("Eyes", &character.eye_color),
        ("Height", &character.height),
        ("Build", &character.body_type),
    ];
    for (label, value) in labelled {
        if let Some(v) = value {
            parts.push(format!("{label}: {v}"));
        }
    }
    if !character.tags.is_empty() {
        parts.push(format!("Traits: {}", character.tags.join(", ")));
    }
    parts.join("\n")
}

/// Comma-separated look of a character, used as the subject of image prompts.
pub fn appearance(character: &Character) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(sex) = &character.sex {
        parts.push(sex.clone());
    }
    if let Some(age) = character.age {
        parts.push(format!("{age} years old"));
    }
    if let Some(body) = &character.body_type {
        parts.push(body.clone());
    }
    if let Some(hair) = &character.hair_color {
        parts.push(format!("{hair} hair"));
    }
    if let Some(eyes) = &character.eye_color {
        parts.push(format!("{eyes} eyes"));
    }

    if parts.len() < 3
        && let Some(backstory) = character.profile.backstory.as_deref().filter(|b| !b.is_empty())
    {
        parts.push(backstory.chars().take(100).collect());
    }

    if parts.is_empty() {
        "friendly person".to_string()
    } else {
        parts.join(", ")
    }
}

/// System prompt for a character: personality base prompt, identity,
/// current state and communication style.
pub fn system_prompt(
    character: &Character,
    personality: Option<&Personality>,
    state: &CharacterState,
) -> String {
    let mut parts = Vec::new();

    if let Some(p) = personality {
        parts.push(p.system_prompt.clone());
    }

    parts.push(format!("\n## Your Identity\n{}", describe(character)));

    parts.push(format!(
        "\n## Current State\nCurrent mood: {}\nEnergy level: {:.1}%\nRelationship closeness: {:.1}%",
        state.mood,
        state.energy * 100.0,
        state.relationship_level * 100.0,
    ));

    if let Some(p) = personality
        && !p.communication_style.is_empty()
    {
        parts.push(format!(
            "\n## Communication Style\n{}",
            p.communication_style.describe()
        ));
    }

    parts.join("\n")
}

/// Whether the character would reach out on its own right now.
pub fn should_initiate(state: &CharacterState, now: DateTime<Utc>) -> bool {
    if state.relationship_level > 0.7 {
        return true;
    }
    match state.last_interaction {
        Some(last) if now - last > Duration::hours(SILENCE_HOURS) => state.relationship_level > 0.5,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use kindred_types::character::CharacterProfile;
    use kindred_types::personality::CommunicationStyle;

    fn character() -> Character {
        let now = Utc::now();
        Character {
            id: Uuid::now_v7(),
            name: "Luna".to_string(),
            age: Some(25),
            sex: Some("female".to_string()),
            hair_color: Some("auburn".to_string()),
            eye_color: Some("green".to_string()),
            height: None,
            body_type: Some("athletic".to_string()),
            personality_id: None,
            tags: vec!["playful".to_string(), "curious".to_string()],
            profile: CharacterProfile::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_describe_omits_missing_fields() {
        let text = describe(&character());
        assert_eq!(
            text,
            "Name: Luna\nAge: 25\nSex: female\nHair: auburn\nEyes: green\nBuild: athletic\nTraits: playful, curious"
        );
    }

    #[test]
    fn test_appearance_full() {
        assert_eq!(
            appearance(&character()),
            "female, 25 years old, athletic, auburn hair, green eyes"
        );
    }

    #[test]
    fn test_appearance_pads_with_backstory() {
        let mut c = character();
        c.age = None;
        c.body_type = None;
        c.eye_color = None;
        c.profile.backstory = Some("x".repeat(150));
        let text = appearance(&c);
        assert!(text.starts_with("female, auburn hair, "));
        assert_eq!(text.len(), "female, auburn hair, ".len() + 100);
    }

    #[test]
    fn test_appearance_empty_fallback() {
        let mut c = character();
        c.age = None;
        c.sex = None;
        c.hair_color = None;
        c.eye_color = None;
        c.body_type = None;
        assert_eq!(appearance(&c), "friendly person");
    }

    #[test]
    fn test_system_prompt_sections() {
        let c = character();
        let mut state = CharacterState::initial(c.id);
        state.mood = Mood::Happy;
        state.relationship_level = 0.42;
        let personality = Personality {
            id: Uuid::now_v7(),
            name: "Sweet Companion".to_string(),
            system_prompt: "You are sweet.".to_string(),
            traits: vec![],
            communication_style: CommunicationStyle {
                tone: Some("warm".to_string()),
                ..Default::default()
            },
            openness: 0.5,
            values: vec![],
            created_at: Utc::now(),
        };

        let prompt = system_prompt(&c, Some(&personality), &state);
        assert!(prompt.starts_with("You are sweet."));
        assert!(prompt.contains("## Your Identity\nName: Luna"));
        assert!(prompt.contains("Current mood: happy"));
        assert!(prompt.contains("Energy level: 80.0%"));
        assert!(prompt.contains("Relationship closeness: 42.0%"));
        assert!(prompt.contains("## Communication Style\ntone: warm"));

        let bare = system_prompt(&c, None, &state);
        assert!(bare.starts_with("\n## Your Identity"));
        assert!(!bare.contains("Communication Style"));
    }

    #[test]
    fn test_should_initiate_rules() {
        let now = Utc::now();
        let mut state = CharacterState::initial(Uuid::now_v7());

        state.relationship_level = 0.8;
        assert!(should_initiate(&state, now));

        state.relationship_level = 0.6;
        assert!(!should_initiate(&state, now), "no last interaction");

        state.last_interaction = Some(now - Duration::hours(7));
        assert!(should_initiate(&state, now));

        state.last_interaction = Some(now - Duration::hours(2));
        assert!(!should_initiate(&state, now));

        state.relationship_level = 0.4;
        state.last_interaction = Some(now - Duration::hours(7));
        assert!(!should_initiate(&state, now));
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  Luna ").unwrap(), "Luna");
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"a".repeat(101)).is_err());
        assert!(validate_name(&"a".repeat(100)).is_ok());
    }

    #[test]
    fn test_dedup_tags() {
        let tags = dedup_tags(vec![" a".into(), "b".into(), "a".into(), "".into()]);
        assert_eq!(tags, vec!["a".to_string(), "b".to_string()]);
    }
}
