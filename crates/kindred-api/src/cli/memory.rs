//! Memory CLI commands: add, search, context, count.

use anyhow::{Result, anyhow};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use kindred_types::memory::{MemoryFilter, MemoryKind, NewMemory};

use super::{format_relative_time, spinner, truncate};
use crate::state::AppState;

/// Store a memory by hand.
///
/// ```bash
/// kindred memory add Luna "Loves rainy evenings" --kind preference --importance 0.8
/// ```
pub async fn add(
    state: &AppState,
    reference: &str,
    content: &str,
    kind: &str,
    importance: f64,
    json: bool,
) -> Result<()> {
    let kind: MemoryKind = kind.parse().map_err(|e: String| anyhow!(e))?;
    if !(0.0..=1.0).contains(&importance) {
        return Err(anyhow!("importance must be between 0.0 and 1.0"));
    }
    let character = state.characters.resolve(reference).await?;

    let progress = (!json).then(|| spinner("Remembering..."));
    let memory = state
        .memory
        .add(&character.id, NewMemory::new(content, kind, importance))
        .await;
    if let Some(progress) = progress {
        progress.finish_and_clear();
    }
    let memory = memory?;

    if json {
        println!("{}", serde_json::to_string_pretty(&memory)?);
        return Ok(());
    }
    println!(
        "  {} {} will remember: {}",
        style("✓").green().bold(),
        style(&character.name).cyan(),
        style(&memory.content).italic()
    );
    if !state.memory.semantic_enabled() {
        println!(
            "  {}",
            style("(vector memory is off; stored for recency and importance recall only)").dim()
        );
    }
    Ok(())
}

/// Semantic search, closest first.
pub async fn search(
    state: &AppState,
    reference: &str,
    query: &str,
    n: usize,
    json: bool,
) -> Result<()> {
    let character = state.characters.resolve(reference).await?;
    let hits = state
        .memory
        .query(&character.id, query, n, &MemoryFilter::default())
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!();
        if state.memory.semantic_enabled() {
            println!(
                "  {} Nothing {} remembers matches that.",
                style("i").blue().bold(),
                style(&character.name).cyan()
            );
        } else {
            println!(
                "  {} Semantic search needs vector memory ({} in config.toml).",
                style("i").blue().bold(),
                style("memory.vector_enabled = true").yellow()
            );
        }
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Memory").fg(Color::White),
        Cell::new("Kind").fg(Color::White),
        Cell::new("Importance").fg(Color::White),
        Cell::new("Distance").fg(Color::White),
        Cell::new("When").fg(Color::White),
    ]);

    for hit in &hits {
        let m = &hit.memory;
        table.add_row(vec![
            Cell::new(truncate(&m.content, 60)),
            kind_cell(m.kind),
            Cell::new(format!("{:.2}", m.importance)),
            Cell::new(format!("{:.3}", hit.distance)).fg(Color::DarkGrey),
            Cell::new(format_relative_time(&m.created_at)).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

/// Print the memory block a chat prompt would receive for `query`.
pub async fn context(state: &AppState, reference: &str, query: &str, json: bool) -> Result<()> {
    let character = state.characters.resolve(reference).await?;
    let context = state.memory.build_context(&character.id, query).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "character_id": character.id,
                "semantic": state.memory.semantic_enabled(),
                "context": context,
            }))?
        );
        return Ok(());
    }

    println!();
    if context.is_empty() {
        println!("  {} No memories yet.", style("i").blue().bold());
    } else {
        for line in context.lines() {
            println!("  {line}");
        }
    }
    println!();
    Ok(())
}

pub async fn count(state: &AppState, reference: Option<&str>, json: bool) -> Result<()> {
    let character = match reference {
        Some(r) => Some(state.characters.resolve(r).await?),
        None => None,
    };
    let total = state.memory.count(character.as_ref().map(|c| &c.id)).await?;

    if json {
        println!("{}", serde_json::json!({ "count": total }));
        return Ok(());
    }
    match character {
        Some(c) => println!("  {} remembers {}", style(&c.name).cyan(), style(total).bold()),
        None => println!("  {} memories stored", style(total).bold()),
    }
    Ok(())
}

fn kind_cell(kind: MemoryKind) -> Cell {
    let color = match kind {
        MemoryKind::Conversation => Color::Blue,
        MemoryKind::Event => Color::Yellow,
        MemoryKind::Fact => Color::Cyan,
        MemoryKind::Preference => Color::Magenta,
        MemoryKind::Emotion => Color::Red,
    };
    Cell::new(kind.to_string()).fg(color)
}
