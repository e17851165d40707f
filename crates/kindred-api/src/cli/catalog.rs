//! Personality and role CLI commands.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use kindred_types::role::Role;

use super::{spinner, truncate};
use crate::state::AppState;

fn table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(headers.iter().map(|h| Cell::new(h).fg(Color::White)));
    table
}

fn print_empty(what: &str, hint: &str) {
    println!();
    println!(
        "  {} No {what} stored. Add the built-ins with: {}",
        style("i").blue().bold(),
        style(hint).yellow()
    );
    println!();
}

pub async fn list_personalities(state: &AppState, json: bool) -> Result<()> {
    let personalities = state.personalities.list().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&personalities)?);
        return Ok(());
    }
    if personalities.is_empty() {
        print_empty("personalities", "kindred personality init");
        return Ok(());
    }

    let mut t = table(&["Name", "Traits", "Tone", "Openness"]);
    for p in &personalities {
        t.add_row(vec![
            Cell::new(&p.name).fg(Color::Cyan),
            Cell::new(p.traits.join(", ")),
            Cell::new(p.communication_style.tone.as_deref().unwrap_or("-")),
            Cell::new(format!("{:.1}", p.openness)),
        ]);
    }
    println!();
    println!("{t}");
    println!();
    Ok(())
}

pub async fn personality_templates(state: &AppState, json: bool) -> Result<()> {
    let templates = state.personalities.templates();

    if json {
        println!("{}", serde_json::to_string_pretty(templates)?);
        return Ok(());
    }

    let mut t = table(&["Key", "Name", "Traits", "Tone"]);
    for template in templates {
        t.add_row(vec![
            Cell::new(template.key).fg(Color::Yellow),
            Cell::new(template.name).fg(Color::Cyan),
            Cell::new(template.traits.join(", ")),
            Cell::new(template.tone),
        ]);
    }
    println!();
    println!("{t}");
    println!();
    Ok(())
}

pub async fn init_personalities(state: &AppState, json: bool) -> Result<()> {
    let progress = spinner("Storing built-in personalities...");
    let created = state.personalities.initialize_defaults().await;
    progress.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&created)?);
    } else {
        println!(
            "  {} {} personalities ready",
            style("✓").green().bold(),
            style(created.len()).bold()
        );
    }
    Ok(())
}

fn role_table(roles: &[Role]) -> Table {
    let mut t = table(&["Name", "Description", "Needs"]);
    for role in roles {
        t.add_row(vec![
            Cell::new(&role.name).fg(Color::Cyan),
            Cell::new(truncate(&role.description, 60)),
            Cell::new(role.required_traits.join(", ")).fg(Color::DarkGrey),
        ]);
    }
    t
}

pub async fn list_roles(state: &AppState, json: bool) -> Result<()> {
    let roles = state.roles.list().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&roles)?);
        return Ok(());
    }
    if roles.is_empty() {
        print_empty("roles", "kindred role init");
        return Ok(());
    }

    println!();
    println!("{}", role_table(&roles));
    println!();
    Ok(())
}

pub async fn role_templates(state: &AppState, json: bool) -> Result<()> {
    let templates = state.roles.templates();

    if json {
        println!("{}", serde_json::to_string_pretty(templates)?);
        return Ok(());
    }

    let mut t = table(&["Key", "Name", "Description"]);
    for template in templates {
        t.add_row(vec![
            Cell::new(template.key).fg(Color::Yellow),
            Cell::new(template.name).fg(Color::Cyan),
            Cell::new(truncate(template.description, 60)),
        ]);
    }
    println!();
    println!("{t}");
    println!();
    Ok(())
}

pub async fn init_roles(state: &AppState, json: bool) -> Result<()> {
    let progress = spinner("Storing built-in roles...");
    let created = state.roles.initialize_defaults().await;
    progress.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&created)?);
    } else {
        println!(
            "  {} {} roles ready",
            style("✓").green().bold(),
            style(created.len()).bold()
        );
    }
    Ok(())
}

/// Roles whose required traits fit `traits`.
pub async fn suggest_roles(state: &AppState, traits: &[String], json: bool) -> Result<()> {
    let roles = state.roles.find_suitable(traits).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&roles)?);
        return Ok(());
    }
    if roles.is_empty() {
        println!(
            "  {} No stored role fits {}",
            style("i").blue().bold(),
            traits.join(", ")
        );
        return Ok(());
    }

    println!();
    println!("{}", role_table(&roles));
    println!();
    Ok(())
}
