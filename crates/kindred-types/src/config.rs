//! Configuration types for Kindred.
//!
//! `AppConfig` mirrors `config.toml` in the data directory. Every field has a
//! default, so an empty (or missing) file yields a working local setup that
//! talks to LM Studio on `localhost:1234` and ComfyUI on `localhost:8188`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub memory: MemoryConfig,
    pub comfyui: ComfyUiConfig,
    pub messenger: MessengerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Require an API key on `/api` routes.
    pub require_auth: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            require_auth: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Absolute path of the SQLite file. Defaults to `<data_dir>/kindred.db`.
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    /// Fixed model id; when unset the first model the server lists is used.
    pub model: Option<String>,
    pub temperature: f64,
    pub character_temperature: f64,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// How many past messages are replayed to the model.
    pub history_window: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1234/v1".to_string(),
            api_key: "lm-studio".to_string(),
            model: None,
            temperature: 0.8,
            character_temperature: 0.85,
            max_tokens: 512,
            timeout_secs: 60,
            history_window: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Turn off embeddings entirely (SQL-only memory).
    pub vector_enabled: bool,
    /// LanceDB directory. Defaults to `<data_dir>/vectors`.
    pub vector_path: Option<String>,
    pub n_recent: usize,
    pub n_semantic: usize,
    pub n_important: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            vector_enabled: true,
            vector_path: None,
            n_recent: 5,
            n_semantic: 5,
            n_important: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComfyUiConfig {
    pub enabled: bool,
    pub base_url: String,
    pub timeout_secs: u64,
    /// Force a checkpoint instead of auto-selecting one.
    pub checkpoint: Option<String>,
}

impl Default for ComfyUiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://127.0.0.1:8188".to_string(),
            timeout_secs: 300,
            checkpoint: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessengerConfig {
    /// Start the autonomous messenger with `serve`.
    pub enabled: bool,
    /// Register every character on start-up with default settings.
    pub auto_register: bool,
    /// Let the anonymous contact, once summoned, write on its own.
    pub anonymous_contact: bool,
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_register: false,
            anonymous_contact: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when neither `RUST_LOG` nor `-v/-q` say otherwise.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_default_values() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.llm.base_url, "http://localhost:1234/v1");
        assert_eq!(config.llm.api_key, "lm-studio");
        assert!(config.llm.model.is_none());
        assert_eq!(config.comfyui.timeout_secs, 300);
        assert_eq!(config.memory.n_important, 3);
    }

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let toml_str = r#"
[llm]
model = "mistral-7b-instruct"
temperature = 0.5

[server]
port = 8080
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.llm.model.as_deref(), Some("mistral-7b-instruct"));
        assert!((config.llm.temperature - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.llm.max_tokens, 512);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.comfyui.enabled);
    }
}
