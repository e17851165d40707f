//! Asset store CLI commands: list, stats, orphans.

use anyhow::{Result, anyhow};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use kindred_types::asset::{Asset, AssetSearch, AssetType};

use super::{format_relative_time, truncate};
use crate::state::AppState;

fn parse_type(asset_type: Option<&str>) -> Result<Option<AssetType>> {
    asset_type
        .map(|t| t.parse::<AssetType>().map_err(|e| anyhow!(e)))
        .transpose()
}

/// Short human label for an asset: its name, file or text when present.
fn label(asset: &Asset) -> String {
    ["name", "filepath", "text", "content"]
        .iter()
        .find_map(|key| asset.data.get(*key).and_then(|v| v.as_str()))
        .map(|s| truncate(s, 48))
        .unwrap_or_else(|| "-".to_string())
}

fn asset_table(assets: &[Asset]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("ID").fg(Color::White),
        Cell::new("Type").fg(Color::White),
        Cell::new("Label").fg(Color::White),
        Cell::new("Tags").fg(Color::White),
        Cell::new("Ver").fg(Color::White),
        Cell::new("Updated").fg(Color::White),
    ]);
    for asset in assets {
        table.add_row(vec![
            Cell::new(asset.id.to_string()).fg(Color::DarkGrey),
            Cell::new(asset.asset_type.to_string()).fg(Color::Cyan),
            Cell::new(label(asset)),
            Cell::new(asset.tags.join(", ")),
            Cell::new(asset.version),
            Cell::new(format_relative_time(&asset.updated_at)).fg(Color::DarkGrey),
        ]);
    }
    table
}

pub async fn list(
    state: &AppState,
    asset_type: Option<&str>,
    tags: Vec<String>,
    limit: u32,
    json: bool,
) -> Result<()> {
    let search = AssetSearch {
        asset_type: parse_type(asset_type)?,
        tags,
        limit,
        offset: 0,
    };
    let assets = state.assets.search(&search).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&assets)?);
        return Ok(());
    }
    if assets.is_empty() {
        println!("  {} No assets match.", style("i").blue().bold());
        return Ok(());
    }

    println!();
    println!("{}", asset_table(&assets));
    println!();
    Ok(())
}

pub async fn stats(state: &AppState, json: bool) -> Result<()> {
    let stats = state.assets.stats().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!();
    println!("  {}", style("── Assets ──").dim());
    println!("  Total:        {}", style(stats.total_assets).bold());
    for (kind, count) in &stats.by_type {
        println!("    {:<10} {}", kind, count);
    }
    println!("  Tags:         {}", stats.total_tags);
    println!("  Dependencies: {}", stats.total_dependencies);
    println!("  Old versions: {}", stats.total_versions);
    println!();
    Ok(())
}

pub async fn orphans(state: &AppState, asset_type: Option<&str>, json: bool) -> Result<()> {
    let orphans = state.assets.find_orphans(parse_type(asset_type)?).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&orphans)?);
        return Ok(());
    }
    if orphans.is_empty() {
        println!("  {} No orphaned assets.", style("✓").green().bold());
        return Ok(());
    }

    println!();
    println!("{}", asset_table(&orphans));
    println!();
    println!(
        "  {} orphan{}",
        style(orphans.len()).bold(),
        if orphans.len() == 1 { "" } else { "s" }
    );
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_type_rejects_unknown() {
        assert_eq!(parse_type(Some("image")).unwrap(), Some(AssetType::Image));
        assert_eq!(parse_type(None).unwrap(), None);
        assert!(parse_type(Some("spreadsheet")).is_err());
    }
}
