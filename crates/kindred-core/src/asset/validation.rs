//! Per-type payload checks and content checksums for assets.

use std::path::Path;

use kindred_types::asset::AssetType;
use kindred_types::error::AssetError;
use kindred_types::scene::SceneKind;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::service::fs::FileSystem;

/// Check `data` against the rules of `asset_type`.
///
/// File-backed types need a `filepath` with an accepted extension that
/// points at a non-empty file; images must also start with the magic bytes
/// of their extension.
pub async fn validate<F: FileSystem>(
    fs: &F,
    asset_type: AssetType,
    data: &Value,
) -> Result<(), AssetError> {
    match asset_type {
        AssetType::Audio | AssetType::Image | AssetType::Video => {
            validate_file(fs, asset_type, data).await
        }
        AssetType::Scene => validate_scene(data),
        AssetType::Message => validate_message(data),
    }
}

async fn validate_file<F: FileSystem>(
    fs: &F,
    asset_type: AssetType,
    data: &Value,
) -> Result<(), AssetError> {
    let filepath = required_str(data, "filepath")?;
    let path = Path::new(filepath);

    let extension = extension_of(path)
        .ok_or_else(|| AssetError::Validation(format!("{asset_type} file has no extension: {filepath}")))?;
    if !asset_type.formats().contains(&extension.as_str()) {
        return Err(AssetError::Validation(format!(
            "unsupported {asset_type} format '.{extension}' (allowed: {})",
            asset_type.formats().join(", ")
        )));
    }

    if !fs.exists(path).await {
        return Err(AssetError::Validation(format!("{asset_type} file not found: {filepath}")));
    }
    let size = fs
        .file_size(path)
        .await
        .map_err(|e| AssetError::StorageError(e.to_string()))?;
    if size == 0 {
        return Err(AssetError::Validation(format!("{asset_type} file is empty: {filepath}")));
    }

    if asset_type == AssetType::Image {
        let bytes = fs
            .read_bytes(path)
            .await
            .map_err(|e| AssetError::StorageError(e.to_string()))?;
        let detected = detect_image_format(&bytes)
            .ok_or_else(|| AssetError::Validation(format!("file is not a valid image: {filepath}")))?;
        if normalize_image_ext(&extension) != detected {
            return Err(AssetError::Validation(format!(
                "image content is {detected} but extension is .{extension}"
            )));
        }
    }
    Ok(())
}

fn validate_scene(data: &Value) -> Result<(), AssetError> {
    let name = required_str(data, "name")?;
    if name.trim().is_empty() {
        return Err(AssetError::Validation("scene name cannot be empty".to_string()));
    }
    let kind = required_str(data, "scene_type")?;
    kind.parse::<SceneKind>().map_err(AssetError::Validation)?;
    Ok(())
}

fn validate_message(data: &Value) -> Result<(), AssetError> {
    required_str(data, "conversation_id")?;
    match required_str(data, "sender")? {
        "user" | "character" => Ok(()),
        other => Err(AssetError::Validation(format!(
            "message sender must be 'user' or 'character', got '{other}'"
        ))),
    }
}

fn required_str<'a>(data: &'a Value, field: &str) -> Result<&'a str, AssetError> {
    data.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| AssetError::Validation(format!("missing required field '{field}'")))
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn normalize_image_ext(ext: &str) -> &str {
    match ext {
        "jpg" => "jpeg",
        other => other,
    }
}

/// Identify an image from its leading bytes.
pub fn detect_image_format(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("webp")
    } else if bytes.starts_with(b"BM") {
        Some("bmp")
    } else {
        None
    }
}

/// Width and height from a PNG header.
pub fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    if detect_image_format(bytes) != Some("png") || bytes.len() < 24 {
        return None;
    }
    let width = u32::from_be_bytes(bytes[16..20].try_into().ok()?);
    let height = u32::from_be_bytes(bytes[20..24].try_into().ok()?);
    Some((width, height))
}

/// Lowercase hex SHA-256 of the canonical JSON of `data` and `metadata`.
///
/// Object keys are sorted at every level, so two payloads that differ only
/// in key order hash the same.
pub fn checksum(data: &Value, metadata: &Value) -> String {
    let mut root = Map::new();
    root.insert("data".to_string(), canonical(data));
    root.insert("metadata".to_string(), canonical(metadata));
    let digest = Sha256::digest(Value::Object(root).to_string().as_bytes());
    format!("{:x}", digest)
}

fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonical(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_checksum_ignores_key_order() {
        let a: Value = serde_json::from_str(r#"{"b":1,"a":{"y":2,"x":[{"k":1,"j":2}]}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a":{"x":[{"j":2,"k":1}],"y":2},"b":1}"#).unwrap();
        assert_eq!(checksum(&a, &json!({})), checksum(&b, &json!({})));
        assert_ne!(checksum(&a, &json!({})), checksum(&a, &json!({"v": 1})));
        assert_eq!(checksum(&a, &json!({})).len(), 64);
    }

    #[test]
    fn test_detect_image_format() {
        assert_eq!(detect_image_format(b"\x89PNG\r\n\x1a\n...."), Some("png"));
        assert_eq!(detect_image_format(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("jpeg"));
        assert_eq!(detect_image_format(b"GIF89a.."), Some("gif"));
        assert_eq!(detect_image_format(b"RIFF\0\0\0\0WEBPVP8 "), Some("webp"));
        assert_eq!(detect_image_format(b"hello"), None);
    }

    #[test]
    fn test_scene_and_message_rules() {
        assert!(validate_scene(&json!({"name": "Lobby", "scene_type": "hub"})).is_ok());
        assert!(validate_scene(&json!({"name": "Lobby", "scene_type": "arcade"})).is_err());
        assert!(validate_scene(&json!({"scene_type": "hub"})).is_err());

        assert!(validate_message(&json!({"conversation_id": "c1", "sender": "user"})).is_ok());
        assert!(validate_message(&json!({"conversation_id": "c1", "sender": "narrator"})).is_err());
        assert!(validate_message(&json!({"sender": "user"})).is_err());
    }
}
