//! Configuration loader for Kindred.
//!
//! Reads `config.toml` from the data directory (`~/.kindred/` by default)
//! and deserializes it into [`AppConfig`]. Falls back to defaults when the
//! file is missing or malformed, then applies `KINDRED_*` environment
//! overrides on top.

use std::path::Path;

use kindred_types::config::AppConfig;

/// Load configuration from `{data_dir}/config.toml` plus the process
/// environment.
pub async fn load_config(data_dir: &Path) -> AppConfig {
    let mut config = load_file(data_dir).await;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config
}

/// Load `{data_dir}/config.toml` only.
///
/// - Missing file: defaults (debug log).
/// - Unreadable or unparsable file: defaults (warn log).
pub async fn load_file(data_dir: &Path) -> AppConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return AppConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return AppConfig::default();
        }
    };

    match toml::from_str::<AppConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            AppConfig::default()
        }
    }
}

/// Apply environment overrides through `lookup` (normally `std::env::var`).
///
/// `KINDRED_DATA_DIR` is not handled here; it picks the directory the file
/// is read from (see [`crate::filesystem::resolve_data_dir`]).
pub fn apply_env_overrides(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(path) = get("KINDRED_DB_PATH") {
        config.database.path = Some(path);
    }
    if let Some(url) = get("KINDRED_LLM_URL") {
        config.llm.base_url = url;
    }
    if let Some(model) = get("KINDRED_LLM_MODEL") {
        config.llm.model = Some(model);
    }
    if let Some(url) = get("KINDRED_COMFYUI_URL") {
        config.comfyui.base_url = url;
    }
    if let Some(level) = get("KINDRED_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(port) = get("KINDRED_PORT") {
        match port.parse::<u16>() {
            Ok(port) => config.server.port = port,
            Err(_) => tracing::warn!(value = %port, "ignoring invalid KINDRED_PORT"),
        }
    }
}

/// Write the default `config.toml` into `data_dir` unless one exists.
///
/// Returns `true` when a file was written.
pub async fn write_default_config(data_dir: &Path) -> anyhow::Result<bool> {
    let config_path = data_dir.join("config.toml");
    if tokio::fs::try_exists(&config_path).await? {
        return Ok(false);
    }
    let content = toml::to_string_pretty(&AppConfig::default())?;
    tokio::fs::write(&config_path, content).await?;
    tracing::info!(path = %config_path.display(), "default config written");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[tokio::test]
    async fn load_file_missing_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_file(tmp.path()).await;
        assert_eq!(config, AppConfig::default());
    }

    #[tokio::test]
    async fn load_file_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
[llm]
base_url = "http://10.0.0.5:1234/v1"
history_window = 10

[comfyui]
enabled = false

[messenger]
auto_register = true
"#,
        )
        .await
        .unwrap();

        let config = load_file(tmp.path()).await;
        assert_eq!(config.llm.base_url, "http://10.0.0.5:1234/v1");
        assert_eq!(config.llm.history_window, 10);
        assert!(!config.comfyui.enabled);
        assert!(config.messenger.auto_register);
        assert!(config.messenger.anonymous_contact);
        assert_eq!(config.server.port, 5000);
    }

    #[tokio::test]
    async fn load_file_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_file(tmp.path()).await;
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn env_overrides_win_over_file() {
        let mut config = AppConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("KINDRED_LLM_URL", "http://gpu-box:1234/v1"),
                ("KINDRED_LLM_MODEL", "llama-3-8b"),
                ("KINDRED_COMFYUI_URL", "http://gpu-box:8188"),
                ("KINDRED_PORT", "8080"),
                ("KINDRED_DB_PATH", "/srv/kindred.db"),
                ("KINDRED_LOG_LEVEL", "debug"),
            ]),
        );
        assert_eq!(config.llm.base_url, "http://gpu-box:1234/v1");
        assert_eq!(config.llm.model.as_deref(), Some("llama-3-8b"));
        assert_eq!(config.comfyui.base_url, "http://gpu-box:8188");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.path.as_deref(), Some("/srv/kindred.db"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn invalid_or_blank_env_values_are_ignored() {
        let mut config = AppConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[("KINDRED_PORT", "eighty"), ("KINDRED_LLM_MODEL", "  ")]),
        );
        assert_eq!(config.server.port, 5000);
        assert!(config.llm.model.is_none());
    }

    #[tokio::test]
    async fn written_default_config_loads_back() {
        let tmp = TempDir::new().unwrap();
        assert!(write_default_config(tmp.path()).await.unwrap());
        assert!(!write_default_config(tmp.path()).await.unwrap());

        let config = load_file(tmp.path()).await;
        assert_eq!(config, AppConfig::default());
    }
}
