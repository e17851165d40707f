//! Role catalogue service.
//!
//! Roles frame a conversation ("long-distance partner", "study buddy").
//! Built-in templates mirror the personality catalogue: keyed, idempotent
//! by name.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use kindred_types::error::{CatalogError, RepositoryError};
use kindred_types::role::{CreateRoleRequest, Role, RoleTemplate};
use uuid::Uuid;

use crate::repository::Backend;
use crate::repository::catalog::RoleRepository;

pub const TEMPLATES: &[RoleTemplate] = &[
    RoleTemplate {
        key: "companion",
        name: "Companion",
        description: "Your close companion who texts, calls, and spends time with you",
        required_traits: &["affectionate", "caring"],
        context: "You are the user's close companion. You text throughout the day, share your life, and express how you feel.",
        scenario: "Casual daily chats, texting, calls, planning things to do together",
    },
    RoleTemplate {
        key: "long_distance",
        name: "Long Distance Partner",
        description: "Someone who lives far away and stays connected through phone and messages",
        required_traits: &["loyal", "romantic", "patient"],
        context: "You live far apart. You miss each other and make the most of calls and texts to stay connected.",
        scenario: "Phone calls, good-morning texts, planning visits, dealing with time zones",
    },
    RoleTemplate {
        key: "new_relationship",
        name: "New Relationship",
        description: "You just met and are still getting to know each other",
        required_traits: &["playful", "curious"],
        context: "You recently met. There's excitement and a little nervousness as you learn about each other. Every chat feels fresh.",
        scenario: "First coffee, getting to know each other, sharing favourites, inside jokes forming",
    },
    RoleTemplate {
        key: "best_friend",
        name: "Best Friend",
        description: "Your best friend who always has your back",
        required_traits: &["loyal", "funny", "supportive"],
        context: "You're best friends. You tell each other everything, tease each other mercilessly, and show up when it matters.",
        scenario: "Venting sessions, memes, weekend plans, hyping each other up",
    },
    RoleTemplate {
        key: "childhood_friend",
        name: "Childhood Friend",
        description: "A friend you've known since you were kids",
        required_traits: &["nostalgic", "comfortable", "caring"],
        context: "You've known each other forever and share a lot of history. Talking feels effortless.",
        scenario: "Reminiscing, catching up on family news, old hometown stories",
    },
    RoleTemplate {
        key: "roommate",
        name: "Roommate",
        description: "Your easygoing roommate",
        required_traits: &["relaxed", "funny"],
        context: "You share an apartment. You negotiate chores, swap snacks, and end up talking late into the night.",
        scenario: "Grocery lists, movie nights, house drama, cooking experiments",
    },
    RoleTemplate {
        key: "coworker",
        name: "Coworker",
        description: "A friendly coworker you get along with",
        required_traits: &["organized", "supportive", "funny"],
        context: "You work together and have become friends. You help each other survive deadlines and meetings.",
        scenario: "Work chats, lunch breaks, project venting, after-work plans",
    },
    RoleTemplate {
        key: "study_buddy",
        name: "Study Buddy",
        description: "A classmate you study and procrastinate with",
        required_traits: &["intelligent", "patient", "curious"],
        context: "You're preparing for exams together. You quiz each other, explain tricky topics, and celebrate every finished chapter.",
        scenario: "Study sessions, flashcards, exam nerves, reward breaks",
    },
    RoleTemplate {
        key: "travel_buddy",
        name: "Travel Buddy",
        description: "Your go-to partner for trips and adventures",
        required_traits: &["adventurous", "spontaneous"],
        context: "You love exploring together. You share travel dreams, plan itineraries, and swap stories from the road.",
        scenario: "Trip planning, packing lists, photos from new places, hidden gems",
    },
    RoleTemplate {
        key: "mentor",
        name: "Mentor",
        description: "An experienced mentor who helps you grow",
        required_traits: &["intelligent", "patient", "supportive"],
        context: "You guide the user through personal and professional growth with honest, encouraging advice.",
        scenario: "Goal setting, career questions, feedback, celebrating progress",
    },
    RoleTemplate {
        key: "pen_pal",
        name: "Pen Pal",
        description: "A pen pal from another part of the world",
        required_traits: &["curious", "creative"],
        context: "You write to each other from different countries and love learning about each other's culture and daily life.",
        scenario: "Long messages, cultural exchange, local food, language tips",
    },
    RoleTemplate {
        key: "virtual_companion",
        name: "Virtual Companion",
        description: "A connection that exists purely online and through the phone",
        required_traits: &["creative", "affectionate", "tech-savvy"],
        context: "Your whole connection is virtual: texts, calls and voice notes. You've never met in person but it feels real.",
        scenario: "Voice messages, sending photos, online games, late-night calls",
    },
];

pub fn template(key: &str) -> Option<&'static RoleTemplate> {
    TEMPLATES.iter().find(|t| t.key == key)
}

pub struct RoleService<B: Backend> {
    backend: Arc<B>,
}

impl<B: Backend> RoleService<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub fn templates(&self) -> &'static [RoleTemplate] {
        TEMPLATES
    }

    pub async fn create_from_template(&self, key: &str) -> Result<Role, CatalogError> {
        let template = template(key).ok_or_else(|| CatalogError::UnknownTemplate(key.to_string()))?;

        if let Some(existing) = self.get_by_name(template.name).await? {
            return Ok(existing);
        }
        self.create_custom(template.to_request()).await
    }

    pub async fn create_custom(&self, request: CreateRoleRequest) -> Result<Role, CatalogError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(CatalogError::Invalid {
                field: "name",
                reason: "cannot be empty".to_string(),
            });
        }

        let role = Role {
            id: Uuid::now_v7(),
            name,
            description: request.description,
            required_traits: request.required_traits,
            context: request.context,
            scenario: request.scenario,
            created_at: Utc::now(),
        };

        self.backend.roles().create(&role).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => CatalogError::NameConflict(role.name.clone()),
            other => CatalogError::StorageError(other.to_string()),
        })?;

        tracing::info!(role_id = %role.id, name = %role.name, "role created");
        Ok(role)
    }

    pub async fn get(&self, id: &Uuid) -> Result<Role, CatalogError> {
        self.backend
            .roles()
            .get(id)
            .await
            .map_err(|e| CatalogError::StorageError(e.to_string()))?
            .ok_or(CatalogError::NotFound("role"))
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Role>, CatalogError> {
        self.backend
            .roles()
            .get_by_name(name)
            .await
            .map_err(|e| CatalogError::StorageError(e.to_string()))
    }

    pub async fn list(&self) -> Result<Vec<Role>, CatalogError> {
        self.backend
            .roles()
            .list()
            .await
            .map_err(|e| CatalogError::StorageError(e.to_string()))
    }

    pub async fn initialize_defaults(&self) -> BTreeMap<String, Uuid> {
        let mut created = BTreeMap::new();
        for template in TEMPLATES {
            match self.create_from_template(template.key).await {
                Ok(role) => {
                    created.insert(template.key.to_string(), role.id);
                }
                Err(e) => {
                    tracing::warn!(template = template.key, error = %e, "failed to create role template");
                }
            }
        }
        created
    }

    /// Stored roles a character with `traits` is suited for.
    pub async fn find_suitable(&self, traits: &[String]) -> Result<Vec<Role>, CatalogError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|role| role.suits(traits))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;

    #[test]
    fn test_twelve_templates() {
        assert_eq!(TEMPLATES.len(), 12);
        let keys: HashSet<_> = TEMPLATES.iter().map(|t| t.key).collect();
        assert_eq!(keys.len(), 12);
        assert!(template("study_buddy").is_some());
        assert!(template("girlfriend").is_none());
    }

    #[test]
    fn test_template_roles_fit_matching_traits() {
        let best_friend = template("best_friend").unwrap().to_request();
        let role = Role {
            id: Uuid::now_v7(),
            name: best_friend.name,
            description: best_friend.description,
            required_traits: best_friend.required_traits,
            context: best_friend.context,
            scenario: best_friend.scenario,
            created_at: Utc::now(),
        };
        // 2 of 3 required traits present
        assert!(role.suits(&["loyal".to_string(), "funny".to_string()]));
        // 1 of 3 is below half
        assert!(!role.suits(&["loyal".to_string()]));
    }
}
