use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// The sub-applications a user can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneKind {
    Phone,
    Bedroom,
    Admin,
    Dashboard,
    Hub,
}

impl SceneKind {
    pub const ALL: [SceneKind; 5] = [
        SceneKind::Phone,
        SceneKind::Bedroom,
        SceneKind::Admin,
        SceneKind::Dashboard,
        SceneKind::Hub,
    ];
}

impl fmt::Display for SceneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneKind::Phone => write!(f, "phone"),
            SceneKind::Bedroom => write!(f, "bedroom"),
            SceneKind::Admin => write!(f, "admin"),
            SceneKind::Dashboard => write!(f, "dashboard"),
            SceneKind::Hub => write!(f, "hub"),
        }
    }
}

impl FromStr for SceneKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "phone" => Ok(SceneKind::Phone),
            "bedroom" => Ok(SceneKind::Bedroom),
            "admin" => Ok(SceneKind::Admin),
            "dashboard" => Ok(SceneKind::Dashboard),
            "hub" => Ok(SceneKind::Hub),
            other => Err(format!("invalid scene kind: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneStatus {
    Running,
    Stopped,
}

/// A running scene session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub id: Uuid,
    pub name: String,
    pub kind: SceneKind,
    pub status: SceneStatus,
    /// Scene asset this session was loaded from, if any.
    pub asset_id: Option<Uuid>,
    /// Characters present in the scene.
    #[serde(default)]
    pub characters: Vec<Uuid>,
    #[serde(default)]
    pub config: serde_json::Value,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
}

/// Payload of a `scene` asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneDefinition {
    pub name: String,
    pub scene_type: SceneKind,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub characters: Vec<Uuid>,
    #[serde(default)]
    pub assets: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub server_config: serde_json::Value,
    #[serde(default)]
    pub ui_config: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSceneRequest {
    pub kind: SceneKind,
    pub name: String,
    #[serde(default)]
    pub characters: Vec<Uuid>,
    #[serde(default)]
    pub config: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_kind_roundtrip() {
        for kind in SceneKind::ALL {
            assert_eq!(kind.to_string().parse::<SceneKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_scene_definition_minimal() {
        let def: SceneDefinition =
            serde_json::from_str(r#"{"name":"Lobby","scene_type":"hub"}"#).unwrap();
        assert_eq!(def.scene_type, SceneKind::Hub);
        assert!(def.characters.is_empty());
        assert!(def.assets.is_empty());
    }
}
