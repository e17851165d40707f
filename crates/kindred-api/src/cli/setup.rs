//! `kindred init`: first-run setup.

use anyhow::Result;
use console::style;

use kindred_infra::config::write_default_config;

use super::spinner;
use crate::state::AppState;

/// Write a default config and store the built-in personalities and roles.
/// Safe to run again; nothing existing is overwritten.
pub async fn init(state: &AppState, json: bool) -> Result<()> {
    let progress = (!json).then(|| spinner("Setting up..."));
    let wrote_config = write_default_config(&state.data_dir).await?;
    let personalities = state.personalities.initialize_defaults().await;
    let roles = state.roles.initialize_defaults().await;
    if let Some(progress) = progress {
        progress.finish_and_clear();
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "data_dir": state.data_dir.display().to_string(),
                "config_written": wrote_config,
                "personalities": personalities,
                "roles": roles,
            }))?
        );
        return Ok(());
    }

    let check = style("✓").green().bold();
    println!();
    println!("  {} Data dir    {}", check, style(state.data_dir.display()).dim());
    if wrote_config {
        println!("  {} Wrote       {}", check, style("config.toml").dim());
    } else {
        println!("  {} Kept        {}", style("•").dim(), style("existing config.toml").dim());
    }
    println!("  {} {} personalities", check, personalities.len());
    println!("  {} {} roles", check, roles.len());
    println!();
    println!(
        "  Next: {}",
        style("kindred character create --name Luna --personality \"Sweet Companion\"").yellow()
    );
    println!();
    Ok(())
}
