use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A relationship scenario a conversation can be framed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// Traits a character should have for this role to fit.
    pub required_traits: Vec<String>,
    /// Framing injected into the prompt.
    pub context: String,
    /// Typical situations in this role.
    pub scenario: String,
    pub created_at: DateTime<Utc>,
}

impl Role {
    /// Whether a character with `traits` suits this role.
    ///
    /// Roles without requirements fit everyone; otherwise at least half of
    /// the required traits must be present.
    pub fn suits(&self, traits: &[String]) -> bool {
        if self.required_traits.is_empty() {
            return true;
        }
        let matching = self
            .required_traits
            .iter()
            .filter(|required| traits.iter().any(|t| t.eq_ignore_ascii_case(required)))
            .count();
        matching * 2 >= self.required_traits.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required_traits: Vec<String>,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub scenario: String,
}

/// Built-in role definition.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RoleTemplate {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub required_traits: &'static [&'static str],
    pub context: &'static str,
    pub scenario: &'static str,
}

impl RoleTemplate {
    pub fn to_request(&self) -> CreateRoleRequest {
        CreateRoleRequest {
            name: self.name.to_string(),
            description: self.description.to_string(),
            required_traits: self.required_traits.iter().map(|t| t.to_string()).collect(),
            context: self.context.to_string(),
            scenario: self.scenario.to_string(),
        }
    }
}
