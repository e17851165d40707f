//! Versioned assets: audio, images, video, scene definitions and messages.
//!
//! The payload of an asset is free-form JSON (`data`); its shape is checked
//! per `AssetType` by the asset manager before saving.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Audio,
    Image,
    Video,
    Scene,
    Message,
}

impl AssetType {
    pub const ALL: [AssetType; 5] = [
        AssetType::Audio,
        AssetType::Image,
        AssetType::Video,
        AssetType::Scene,
        AssetType::Message,
    ];

    /// Accepted file extensions for file-backed asset types.
    pub fn formats(self) -> &'static [&'static str] {
        match self {
            AssetType::Audio => &["wav", "mp3", "ogg", "flac", "m4a"],
            AssetType::Image => &["jpg", "jpeg", "png", "gif", "webp", "bmp"],
            AssetType::Video => &["mp4", "avi", "mov", "mkv", "webm"],
            AssetType::Scene | AssetType::Message => &[],
        }
    }

    pub fn is_file_backed(self) -> bool {
        !self.formats().is_empty()
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetType::Audio => write!(f, "audio"),
            AssetType::Image => write!(f, "image"),
            AssetType::Video => write!(f, "video"),
            AssetType::Scene => write!(f, "scene"),
            AssetType::Message => write!(f, "message"),
        }
    }
}

impl FromStr for AssetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "audio" => Ok(AssetType::Audio),
            "image" => Ok(AssetType::Image),
            "video" => Ok(AssetType::Video),
            "scene" => Ok(AssetType::Scene),
            "message" => Ok(AssetType::Message),
            other => Err(format!("invalid asset type: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: Uuid,
    pub asset_type: AssetType,
    pub data: serde_json::Value,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub tags: Vec<String>,
    /// SHA-256 of the canonical JSON of `data` and `metadata`.
    pub checksum: String,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Save request. Supplying an existing `id` creates a new version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveAssetRequest {
    pub id: Option<Uuid>,
    pub asset_type: AssetType,
    pub data: serde_json::Value,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A previous version kept in history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetVersion {
    pub asset_id: Uuid,
    pub version: u32,
    pub data: serde_json::Value,
    pub metadata: serde_json::Value,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDependency {
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub dependency_type: String,
}

pub const DEFAULT_DEPENDENCY_TYPE: &str = "requires";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetSearch {
    pub asset_type: Option<AssetType>,
    /// Assets must carry every one of these tags.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    100
}

impl Default for AssetSearch {
    fn default() -> Self {
        Self {
            asset_type: None,
            tags: Vec::new(),
            limit: default_limit(),
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetStats {
    pub total_assets: u64,
    pub by_type: BTreeMap<String, u64>,
    pub total_tags: u64,
    pub total_dependencies: u64,
    pub total_versions: u64,
}
