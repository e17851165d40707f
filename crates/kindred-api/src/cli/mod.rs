//! CLI command definitions and dispatch for the `kindred` binary.
//!
//! Uses clap derive macros for argument parsing. Commands are grouped by
//! noun (e.g., `kindred character create`, `kindred memory search`).

pub mod asset;
pub mod catalog;
pub mod character;
pub mod chat;
pub mod key;
pub mod memory;
pub mod setup;
pub mod status;

use std::time::Duration;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use indicatif::{ProgressBar, ProgressStyle};

/// Local virtual companions with memory, photos and phone calls.
#[derive(Parser)]
#[command(name = "kindred", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Write logs as JSON lines.
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long, global = true, env = "KINDRED_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server.
    Serve {
        /// Port to listen on (default from config, 5000).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (default from config).
        #[arg(long)]
        host: Option<String>,
    },

    /// Create the data directory, a default config and the built-in
    /// personalities and roles.
    Init,

    /// Manage characters.
    #[command(alias = "char")]
    Character {
        #[command(subcommand)]
        action: CharacterCommand,
    },

    /// Manage personality presets.
    Personality {
        #[command(subcommand)]
        action: CatalogCommand,
    },

    /// Manage relationship roles.
    Role {
        #[command(subcommand)]
        action: RoleCommand,
    },

    /// Send a message to a character, or chat interactively when no
    /// message is given.
    Chat {
        /// Character name or ID.
        character: String,

        /// Message to send.
        message: Option<String>,
    },

    /// Inspect and add character memories.
    Memory {
        #[command(subcommand)]
        action: MemoryCommand,
    },

    /// Browse the asset store.
    Asset {
        #[command(subcommand)]
        action: AssetCommand,
    },

    /// Manage API keys.
    Key {
        #[command(subcommand)]
        action: KeyCommand,
    },

    /// System status dashboard.
    Status,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum CharacterCommand {
    /// Create a character (prompts for the name when omitted).
    Create {
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        age: Option<u32>,

        #[arg(long)]
        sex: Option<String>,

        #[arg(long = "hair")]
        hair_color: Option<String>,

        #[arg(long = "eyes")]
        eye_color: Option<String>,

        #[arg(long)]
        height: Option<String>,

        #[arg(long = "body")]
        body_type: Option<String>,

        /// Personality name or ID.
        #[arg(long)]
        personality: Option<String>,

        /// Tag to attach (repeatable).
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// List all characters.
    #[command(alias = "ls")]
    List,

    /// Show a character with its current state.
    Show {
        /// Character name or ID.
        character: String,
    },

    /// Delete a character and everything it remembers.
    #[command(alias = "rm")]
    Delete {
        /// Character name or ID.
        character: String,

        /// Skip confirmation prompt.
        #[arg(long)]
        force: bool,
    },

    /// Add or remove a tag.
    Tag {
        /// Character name or ID.
        character: String,

        tag: String,

        /// Remove the tag instead of adding it.
        #[arg(long)]
        remove: bool,
    },

    /// Set the current mood.
    Mood {
        /// Character name or ID.
        character: String,

        /// neutral, happy, excited, playful, affectionate, calm,
        /// thoughtful, tired, sad or lonely.
        mood: String,
    },
}

#[derive(Subcommand)]
pub enum CatalogCommand {
    /// List stored entries.
    #[command(alias = "ls")]
    List,

    /// Show the built-in templates.
    Templates,

    /// Store every built-in template (existing names are kept).
    Init,
}

#[derive(Subcommand)]
pub enum RoleCommand {
    /// List stored roles.
    #[command(alias = "ls")]
    List,

    /// Show the built-in templates.
    Templates,

    /// Store every built-in template (existing names are kept).
    Init,

    /// Roles that suit a set of personality traits.
    Suggest {
        /// Traits, e.g. `caring playful`.
        #[arg(required = true)]
        traits: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum MemoryCommand {
    /// Store a memory for a character.
    Add {
        /// Character name or ID.
        character: String,

        content: String,

        /// conversation, event, fact, preference or emotion.
        #[arg(long, default_value = "fact")]
        kind: String,

        /// 0.0 to 1.0.
        #[arg(long, default_value_t = 0.5)]
        importance: f64,
    },

    /// Semantic search over a character's memories.
    Search {
        /// Character name or ID.
        character: String,

        query: String,

        /// Number of results.
        #[arg(short, long, default_value_t = 5)]
        n: usize,
    },

    /// Show the memory context a chat prompt would get.
    Context {
        /// Character name or ID.
        character: String,

        query: String,
    },

    /// Count memories, for one character or all.
    Count {
        /// Character name or ID.
        character: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AssetCommand {
    /// List assets, newest first.
    #[command(alias = "ls")]
    List {
        /// audio, image, video, scene or message.
        #[arg(long = "type")]
        asset_type: Option<String>,

        /// Required tag (repeatable).
        #[arg(long = "tag")]
        tags: Vec<String>,

        #[arg(long, default_value_t = 50)]
        limit: u32,
    },

    /// Totals by type, tags, dependencies and versions.
    Stats,

    /// Assets with no dependencies in either direction.
    Orphans {
        #[arg(long = "type")]
        asset_type: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum KeyCommand {
    /// Create an API key. The key is shown once.
    Create {
        /// Label for the key.
        #[arg(default_value = "default")]
        name: String,
    },

    /// List keys (prefixes only).
    #[command(alias = "ls")]
    List,
}

// --- Shared formatting helpers ---

/// Steady-ticking spinner with a message.
pub(crate) fn spinner(message: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

pub(crate) fn format_relative_time(dt: &chrono::DateTime<chrono::Utc>) -> String {
    let diff = chrono::Utc::now() - *dt;

    if diff.num_minutes() < 1 {
        "just now".to_string()
    } else if diff.num_hours() < 1 {
        format!("{}m ago", diff.num_minutes())
    } else if diff.num_days() < 1 {
        format!("{}h ago", diff.num_hours())
    } else if diff.num_days() < 30 {
        format!("{}d ago", diff.num_days())
    } else {
        dt.format("%Y-%m-%d").to_string()
    }
}

/// Shorten to `max` characters, marking the cut with `...`.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// Render a 0..1 level as a ten-cell bar.
pub(crate) fn level_bar(value: f64) -> String {
    let filled = (value.clamp(0.0, 1.0) * 10.0).round() as usize;
    format!("{}{} {:.2}", "█".repeat(filled), "░".repeat(10 - filled), value)
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("héllo wörld", 8), "héllo...");
    }

    #[test]
    fn test_level_bar_clamps() {
        assert!(level_bar(1.7).starts_with("██████████"));
        assert!(level_bar(0.0).starts_with("░░░░░░░░░░"));
    }

    #[test]
    fn test_relative_time() {
        let now = chrono::Utc::now();
        assert_eq!(format_relative_time(&now), "just now");
        assert_eq!(format_relative_time(&(now - chrono::Duration::hours(3))), "3h ago");
    }

    #[test]
    fn test_chat_message_is_optional() {
        let cli = Cli::try_parse_from(["kindred", "chat", "Luna"]).unwrap();
        assert!(matches!(cli.command, Commands::Chat { message: None, .. }));

        let cli = Cli::try_parse_from(["kindred", "-vv", "chat", "Luna", "hi"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }
}
