//! System status dashboard command.

use anyhow::Result;
use console::style;

use crate::state::AppState;

/// Display system status dashboard.
///
/// Shows stored counts, LM Studio and ComfyUI reachability, and where the
/// data lives.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let characters = state.characters.count().await?;
    let conversations = state.conversations.count().await?;
    let memories = state.memory.count(None).await?;
    let media = state.media.count().await?;
    let assets = state.assets.stats().await?.total_assets;
    let keys = state.api_keys.count().await?;

    let (llm, comfyui) = tokio::join!(state.llm.status(), state.media.generator_available());

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "counts": {
                "characters": characters,
                "conversations": conversations,
                "memories": memories,
                "media": media,
                "assets": assets,
                "api_keys": keys,
            },
            "llm": llm,
            "comfyui": {
                "enabled": state.config.comfyui.enabled,
                "available": comfyui,
                "base_url": state.config.comfyui.base_url,
            },
            "vector_memory": state.memory.semantic_enabled(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let up = |ok: bool| {
        if ok {
            format!("{}", style("● online").green())
        } else {
            format!("{}", style("○ offline").red())
        }
    };

    println!();
    println!("  {} Kindred v{}", style("💞").bold(), env!("CARGO_PKG_VERSION"));
    println!();

    println!("  {}", style("── Companions ──").dim());
    println!("  Characters:    {}", style(characters).bold());
    println!("  Conversations: {}", conversations);
    println!("  Memories:      {}", memories);
    println!("  Media:         {}", media);
    println!("  Assets:        {}", assets);
    println!();

    println!("  {}", style("── Services ──").dim());
    println!("  LM Studio: {}  {}", up(llm.available), style(&llm.base_url).dim());
    if let Some(model) = &llm.active_model {
        println!("    model:   {}", model);
    }
    if state.config.comfyui.enabled {
        println!(
            "  ComfyUI:   {}  {}",
            up(comfyui),
            style(&state.config.comfyui.base_url).dim()
        );
    } else {
        println!("  ComfyUI:   {}", style("disabled (placeholder images)").dim());
    }
    println!(
        "  Vectors:   {}",
        if state.memory.semantic_enabled() {
            format!("{}", style("● LanceDB").green())
        } else {
            format!("{}", style("off").dim())
        }
    );
    println!();

    println!("  {}", style("── System ──").dim());
    println!("  Data dir: {}", style(state.data_dir.display()).dim());
    println!("  Database: {}", style("SQLite (WAL mode)").dim());
    println!(
        "  Auth:     {} ({} key{})",
        if state.config.server.require_auth { "required" } else { "off" },
        keys,
        if keys == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}
