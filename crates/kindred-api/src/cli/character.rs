//! Character CLI commands: create, list, show, delete, tag, mood.

use anyhow::{Result, anyhow};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::{Confirm, Input};
use uuid::Uuid;

use kindred_types::character::{CharacterProfile, CreateCharacterRequest, Mood};

use super::{format_relative_time, level_bar, spinner};
use crate::state::AppState;

/// Fields collected from `kindred character create` flags.
pub struct CreateArgs {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub sex: Option<String>,
    pub hair_color: Option<String>,
    pub eye_color: Option<String>,
    pub height: Option<String>,
    pub body_type: Option<String>,
    pub personality: Option<String>,
    pub tags: Vec<String>,
}

/// Create a character, prompting for the name when it was not given.
///
/// ```bash
/// kindred character create --name Luna --age 24 --hair silver --personality "Sweet Companion"
/// ```
pub async fn create(state: &AppState, args: CreateArgs, json: bool) -> Result<()> {
    let name = match args.name {
        Some(n) => n,
        None => Input::<String>::new()
            .with_prompt("Character name")
            .interact_text()?,
    };

    let personality_id = match args.personality.as_deref() {
        Some(reference) => Some(resolve_personality(state, reference).await?),
        None => None,
    };

    let character = state
        .characters
        .create(CreateCharacterRequest {
            name,
            age: args.age,
            sex: args.sex,
            hair_color: args.hair_color,
            eye_color: args.eye_color,
            height: args.height,
            body_type: args.body_type,
            personality_id,
            tags: args.tags,
            profile: CharacterProfile::default(),
        })
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&character)?);
        return Ok(());
    }

    println!();
    println!("  {} Character created!", style("✓").green().bold());
    println!();
    println!("  {}  {}", style("Name:").bold(), style(&character.name).cyan());
    println!("  {}    {}", style("ID:").bold(), style(character.id).dim());
    println!();
    println!(
        "  Say hello: {}",
        style(format!("kindred chat {} \"hi!\"", character.name)).yellow()
    );
    println!();
    Ok(())
}

async fn resolve_personality(state: &AppState, reference: &str) -> Result<Uuid> {
    if let Ok(id) = reference.parse::<Uuid>() {
        return Ok(state.personalities.get(&id).await?.id);
    }
    state
        .personalities
        .get_by_name(reference)
        .await?
        .map(|p| p.id)
        .ok_or_else(|| {
            anyhow!("personality '{reference}' not found (try `kindred personality init`)")
        })
}

/// List all characters with mood and relationship.
pub async fn list(state: &AppState, json: bool) -> Result<()> {
    let characters = state.characters.list().await?;

    if json {
        let mut views = Vec::with_capacity(characters.len());
        for character in &characters {
            views.push(state.characters.get_view(&character.id).await?);
        }
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }

    if characters.is_empty() {
        println!();
        println!(
            "  {} No characters yet. Create one with: {}",
            style("i").blue().bold(),
            style("kindred character create").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Name").fg(Color::White),
        Cell::new("Mood").fg(Color::White),
        Cell::new("Relationship").fg(Color::White),
        Cell::new("Tags").fg(Color::White),
        Cell::new("Last Talked").fg(Color::White),
    ]);

    for character in &characters {
        let character_state = state.characters.state(&character.id).await?;
        let last = character_state
            .last_interaction
            .as_ref()
            .map(format_relative_time)
            .unwrap_or_else(|| "never".to_string());

        table.add_row(vec![
            Cell::new(&character.name).fg(Color::Cyan),
            mood_cell(character_state.mood),
            Cell::new(format!("{:.2}", character_state.relationship_level)),
            Cell::new(character.tags.join(", ")),
            Cell::new(last).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} character{}",
        style(characters.len()).bold(),
        if characters.len() == 1 { "" } else { "s" }
    );
    println!();
    Ok(())
}

/// Show a character's profile, state and counts.
pub async fn show(state: &AppState, reference: &str, json: bool) -> Result<()> {
    let character = state.characters.resolve(reference).await?;
    let view = state.characters.get_view(&character.id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    let personality = state.characters.personality_of(&character).await?;
    let memories = state.memory.count(Some(&character.id)).await?;
    let s = &view.state;

    println!();
    println!("  {}", style(&character.name).cyan().bold());
    println!("  {}", style(kindred_core::service::character::appearance(&character)).dim());
    println!();

    println!("  {}", style("── Details ──").dim());
    if let Some(p) = &personality {
        println!("  {} {}", style("Personality:").bold(), p.name);
    }
    if !character.tags.is_empty() {
        println!("  {}        {}", style("Tags:").bold(), character.tags.join(", "));
    }
    println!("  {}          {}", style("ID:").bold(), style(character.id).dim());
    println!();

    println!("  {}", style("── State ──").dim());
    println!("  {}         {}", style("Mood:").bold(), s.mood);
    println!("  {}       {}", style("Energy:").bold(), level_bar(s.energy));
    println!("  {} {}", style("Relationship:").bold(), level_bar(s.relationship_level));
    println!("  {}    {}", style("Affection:").bold(), level_bar(s.affection));
    if let Some(last) = &s.last_interaction {
        println!("  {}  {}", style("Last talked:").bold(), format_relative_time(last));
    }
    println!("  {}     {}", style("Memories:").bold(), memories);
    println!();
    Ok(())
}

/// Delete a character after confirmation.
pub async fn delete(state: &AppState, reference: &str, force: bool, json: bool) -> Result<()> {
    let character = state.characters.resolve(reference).await?;

    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Permanently delete '{}' with all conversations and memories?",
                style(&character.name).red().bold()
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    let progress = spinner(format!("Deleting {}...", character.name));
    state.characters.delete(&character.id).await?;
    progress.finish_and_clear();

    if json {
        println!(
            "{}",
            serde_json::json!({ "deleted": true, "id": character.id })
        );
    } else {
        println!("  {} '{}' deleted.", style("✓").red().bold(), character.name);
    }
    Ok(())
}

/// Add or remove one tag.
pub async fn tag(
    state: &AppState,
    reference: &str,
    tag: &str,
    remove: bool,
    json: bool,
) -> Result<()> {
    let character = state.characters.resolve(reference).await?;
    let changed = if remove {
        state.characters.remove_tag(&character.id, tag).await?
    } else {
        state.characters.add_tag(&character.id, tag).await?
    };

    if json {
        println!(
            "{}",
            serde_json::json!({ "tag": tag, "removed": remove, "changed": changed })
        );
        return Ok(());
    }

    let verb = if remove { "removed from" } else { "added to" };
    if changed {
        println!("  {} '{}' {} {}", style("✓").green().bold(), tag, verb, character.name);
    } else {
        println!("  {} nothing to do", style("i").blue().bold());
    }
    Ok(())
}

/// Set the current mood.
pub async fn mood(state: &AppState, reference: &str, mood: &str, json: bool) -> Result<()> {
    let mood: Mood = mood.parse().map_err(|e: String| anyhow!(e))?;
    let character = state.characters.resolve(reference).await?;
    let updated = state.characters.set_mood(&character.id, mood).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&updated)?);
    } else {
        println!(
            "  {} {} is now {}",
            style("✓").green().bold(),
            style(&character.name).cyan(),
            updated.mood
        );
    }
    Ok(())
}

fn mood_cell(mood: Mood) -> Cell {
    let color = match mood {
        Mood::Happy | Mood::Excited | Mood::Playful | Mood::Affectionate => Color::Green,
        Mood::Sad | Mood::Lonely => Color::Blue,
        Mood::Tired => Color::DarkGrey,
        _ => Color::White,
    };
    Cell::new(mood.to_string()).fg(color)
}
