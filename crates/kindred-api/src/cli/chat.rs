//! Chat from the terminal: one message, or a prompt loop.

use anyhow::Result;
use console::style;
use dialoguer::Input;

use kindred_types::chat::{ChatReply, Intent};

use super::spinner;
use crate::state::AppState;

/// Send `message` to a character, or read messages until `/quit` when
/// none is given.
pub async fn chat(
    state: &AppState,
    reference: &str,
    message: Option<&str>,
    json: bool,
) -> Result<()> {
    let character = state.characters.resolve(reference).await?;

    if let Some(message) = message {
        let reply = send(state, &character.id, &character.name, message, json).await?;
        print_reply(&character.name, &reply, json)?;
        return Ok(());
    }

    println!();
    println!(
        "  Chatting with {}. Type {} to leave.",
        style(&character.name).cyan().bold(),
        style("/quit").yellow()
    );
    println!();

    loop {
        let line = Input::<String>::new()
            .with_prompt(style("you").green().bold().to_string())
            .allow_empty(true)
            .interact_text()?;
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            _ => {}
        }

        let reply = send(state, &character.id, &character.name, line, json).await?;
        print_reply(&character.name, &reply, json)?;
    }

    if let Some(conversation) = state.conversations.active_for(&character.id).await? {
        state.conversations.end(&conversation.id).await?;
    }
    println!("  {}", style("Conversation saved.").dim());
    Ok(())
}

async fn send(
    state: &AppState,
    character_id: &uuid::Uuid,
    name: &str,
    message: &str,
    json: bool,
) -> Result<ChatReply> {
    let progress = (!json).then(|| spinner(format!("{name} is typing...")));
    let reply = state.chat.send_message(character_id, message).await;
    if let Some(progress) = progress {
        progress.finish_and_clear();
    }
    Ok(reply?)
}

fn print_reply(name: &str, reply: &ChatReply, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(reply)?);
        return Ok(());
    }

    println!("  {} {}", style(format!("{name}:")).cyan().bold(), reply.content);
    if let Some(path) = &reply.media_path {
        let label = match reply.intent {
            Intent::VoiceMessage { .. } => "voice note",
            _ => "photo",
        };
        println!("  {} {label}: {}", style("↳").dim(), style(path).dim());
    }
    if reply.fallback {
        println!(
            "  {}",
            style("(LM Studio unreachable, canned reply)").yellow().dim()
        );
    }
    println!();
    Ok(())
}
