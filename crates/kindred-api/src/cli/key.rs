//! API key CLI commands.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use super::format_relative_time;
use crate::state::AppState;

/// Create a key and print it once.
pub async fn create(state: &AppState, name: &str, json: bool) -> Result<()> {
    let (key, info) = state.api_keys.create(name).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "key": key, "info": info }))?
        );
        return Ok(());
    }

    println!();
    println!(
        "  {} API key created (save this -- it won't be shown again):",
        style("🔑").bold()
    );
    println!();
    println!("  {}", style(&key).yellow().bold());
    println!();
    if !state.config.server.require_auth {
        println!(
            "  {}",
            style("Auth is off; set server.require_auth = true in config.toml to enforce keys.").dim()
        );
        println!();
    }
    Ok(())
}

pub async fn list(state: &AppState, json: bool) -> Result<()> {
    let keys = state.api_keys.list().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&keys)?);
        return Ok(());
    }
    if keys.is_empty() {
        println!(
            "  {} No API keys. Create one with: {}",
            style("i").blue().bold(),
            style("kindred key create").yellow()
        );
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Name").fg(Color::White),
        Cell::new("Prefix").fg(Color::White),
        Cell::new("Created").fg(Color::White),
        Cell::new("Last Used").fg(Color::White),
    ]);
    for key in &keys {
        table.add_row(vec![
            Cell::new(&key.name).fg(Color::Cyan),
            Cell::new(format!("{}…", key.key_prefix)),
            Cell::new(key.created_at.format("%Y-%m-%d").to_string()),
            Cell::new(
                key.last_used_at
                    .as_ref()
                    .map(format_relative_time)
                    .unwrap_or_else(|| "never".to_string()),
            )
            .fg(Color::DarkGrey),
        ]);
    }
    println!();
    println!("{table}");
    println!();
    Ok(())
}
