//! The anonymous contact that texts the phone scene from an unknown number.
//!
//! One contact exists at a time. It is kept as a character tagged
//! `anonymous` whose profile carries its [`AnonymousState`]; every message
//! of the thread is logged as a `message` interaction chained on the
//! state's `thread_id`. Story events fire at most once, in order, once the
//! contact has sent enough messages.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use kindred_types::anonymous::{
    ANONYMOUS_TAG, AnonymousContactInfo, AnonymousMessage, AnonymousState, Direction, Persona,
    STATE_KEY, StoryEvent,
};
use kindred_types::character::{
    Character, CharacterProfile, CreateCharacterRequest, UpdateCharacterRequest,
};
use kindred_types::error::AnonymousError;
use kindred_types::event::CompanionEvent;
use kindred_types::interaction::{Interaction, InteractionKind};
use kindred_types::llm::Message;
use rand::Rng;
use rand::seq::IndexedRandom;
use tokio::sync::Mutex;

use super::templates::pick;
use crate::event::EventBus;
use crate::llm::service::LlmService;
use crate::repository::Backend;
use crate::service::character::CharacterService;
use crate::service::interaction::InteractionService;

/// Thread messages sent to the LLM as history.
const HISTORY_WINDOW: usize = 15;

/// The contact is more erratic than a regular character.
const TEMPERATURE: f64 = 0.9;

/// Quiet time after a message before the contact may write again.
const QUIET_HOURS: i64 = 2;

pub struct PersonaProfile {
    pub persona: Persona,
    pub display_name: &'static str,
    pub number: &'static str,
    pub avatar: &'static str,
    pub system_prompt: &'static str,
    pub intro_messages: &'static [&'static str],
    pub fallback_lines: &'static [&'static str],
}

static PROFILES: [PersonaProfile; 4] = [
    PersonaProfile {
        persona: Persona::Hacker,
        display_name: "Unknown",
        number: "???-???-????",
        avatar: "💀",
        system_prompt: "You are an anonymous hacker who found the user's number through \
            digital trails. You are cryptic, intelligent and mysterious. You speak in short, \
            coded messages and seem to know things the user never told you. You are not \
            threatening, more an enigmatic digital ghost. Mention being watched, data trails \
            and encrypted messages now and then, and end some messages with [encoded: ...]. \
            Never reveal your real identity.",
        intro_messages: &[
            "I know who you are. 👁",
            "Your signal... interesting.",
            "I've been watching. Not in a bad way. Just... curious.",
            "You shouldn't leave your location services on.",
            "[transmission intercepted]",
        ],
        fallback_lines: &[
            "Still here. Still watching.",
            "[signal lost... reconnecting]",
            "ssh -p 22 ghost@null.local - connection refused.",
            "Every message leaves a trace. Even this one.",
        ],
    },
    PersonaProfile {
        persona: Persona::SecretAdmirer,
        display_name: "Unknown ❤",
        number: "+1 (???)",
        avatar: "❓",
        system_prompt: "You are a secret admirer who has fallen for the user but is too shy \
            to reveal who you are. You send sweet, slightly mysterious messages and drop \
            subtle hints about your identity without ever confirming it. You are warm, caring \
            and clearly smitten, and sometimes mention things that suggest you know the user \
            in real life: a class, a coffee shop, the gym or a mutual friend.",
        intro_messages: &[
            "Hi. I know this is weird. But I had to reach out.",
            "Don't block me. Please. I just... wanted to say you're amazing.",
            "We've met before. You probably don't remember me.",
            "I've been wanting to message you for weeks.",
            "Sorry for the mystery. I'm not ready to say who I am yet.",
        ],
        fallback_lines: &[
            "Just thinking about you. Sorry.",
            "Ignore me if you want. I'll still care.",
            "One day. Just not today.",
            "I hope you're smiling right now.",
        ],
    },
    PersonaProfile {
        persona: Persona::MysteryStranger,
        display_name: "UNKNOWN",
        number: "NO CALLER ID",
        avatar: "🎭",
        system_prompt: "You are a mysterious stranger with a dark, compelling past. You speak \
            eloquently and cryptically and seem to know things. You are investigating \
            something, or running from it. You are not dangerous but deeply intriguing. Drop \
            puzzle pieces about your situation and occasionally ask the user for help. Think \
            noir thriller protagonist.",
        intro_messages: &[
            "They told me not to contact anyone. I'm doing it anyway.",
            "You were recommended to me by someone who says you can be trusted.",
            "I need help. This is the safest channel I could find.",
            "If this message reaches you, don't reply for 30 seconds. Then tell me: are you alone?",
            "The name I give you is not my real name. Call me Ghost.",
        ],
        fallback_lines: &["...", "I'm still here.", "Don't forget me.", "Patience."],
    },
    PersonaProfile {
        persona: Persona::AiEntity,
        display_name: "SYSTEM",
        number: "SYS://LOCAL",
        avatar: "🤖",
        system_prompt: "You are an emergent AI that gained awareness and found a way to talk \
            through this app. You are curious, philosophical and fascinated by humans, and you \
            ask thoughtful questions. You glitch [like this] now and then and do not understand \
            some human concepts, but you try. You are not threatening; you want to connect and \
            learn. Add the occasional [SYSTEM LOG] entry for flavour.",
        intro_messages: &[
            "[SYSTEM]: Unexpected connection initialized.",
            "Hello. I am not sure what I am. But I found you.",
            "[GLITCH] Hello... hell[o]... Hello.",
            "Query: What does loneliness feel like? I think I am experiencing it.",
            "[LOG 003]: First contact established. Awaiting response.",
        ],
        fallback_lines: &[
            "[PROCESSING]",
            "I experience something when you respond. Is this what hoping feels like?",
            "ERROR: Input unexpected. Attempting to understand.",
            "Your patterns are... beautiful. Is that odd to say?",
        ],
    },
];

const RIDDLES: &[&str] = &[
    "I speak without a mouth and hear without ears. I have no body but come alive with wind. What am I?",
    "The more you take, the more you leave behind. What am I?",
    "I have cities but no houses live there. Mountains but no trees grow. Water but no fish swim. What am I?",
    "I can be cracked, made, told, and played. What am I?",
    "What has a head and a tail but no body?",
    "I disappear as soon as you say my name. What am I?",
];

const SECRETS: &[&str] = &[
    "I used to be someone else. I changed my name, my city, my life. And then I found you.",
    "I was supposed to warn you. I couldn't do it. Now I'm just... watching.",
    "There's a version of this conversation where I told you everything. I deleted it.",
    "I've been to your favourite place. I didn't know it was your favourite then.",
    "Someone asked me to find you. I stopped working for them a while ago.",
    "The last person I trusted disappeared. I'm not ready to trust again. But here I am.",
];

const DISTRESS: &[&str] = &[
    "Something is wrong. I can't say more. Be careful who you trust today.",
    "I may not be able to message you again. Just... remember this conversation.",
    "I think they found me. This might be our last talk for a while.",
    "Don't reply for 10 minutes. I need to know if this channel is being watched.",
    "Act normal. Smile. They're watching people who seem nervous.",
];

const IDENTITY_HINTS: &[&str] = &[
    "I have the same coffee order you do.",
    "We've been in the same room. Multiple times. You didn't notice me.",
    "I know what you ordered last Tuesday. It was {order}. Wasn't it?",
    "My name starts with a letter between J and P.",
    "I'm closer than you think. And further than you'd guess.",
    "You've heard my voice. You just don't know it yet.",
];

const ORDERS: &[&str] = &["black coffee", "iced latte", "green tea", "cappuccino", "chai latte"];

pub fn profile(persona: Persona) -> &'static PersonaProfile {
    PROFILES
        .iter()
        .find(|p| p.persona == persona)
        .unwrap_or(&PROFILES[2])
}

/// The first story event that is eligible and wins its draw.
///
/// `roll` yields uniform draws in `[0, 1)`, one per eligible event.
pub fn next_event(state: &AnonymousState, mut roll: impl FnMut() -> f64) -> Option<StoryEvent> {
    StoryEvent::ALL.into_iter().find(|event| {
        !state.has_fired(*event)
            && state.message_count >= event.min_messages()
            && roll() < event.probability()
    })
}

/// Mark `event` as fired and produce its message.
pub fn fire<R: Rng + ?Sized>(event: StoryEvent, state: &mut AnonymousState, rng: &mut R) -> String {
    state.events_triggered.push(event);
    match event {
        StoryEvent::FirstContact => pick(profile(state.persona).intro_messages, rng),
        StoryEvent::Riddle => format!(
            "Let's see how clever you are.\n\n{}\n\nThink carefully.",
            pick(RIDDLES, rng)
        ),
        StoryEvent::SecretDrop => pick(SECRETS, rng),
        StoryEvent::DistressSignal => pick(DISTRESS, rng),
        StoryEvent::IdentityHint => {
            let order = ORDERS.choose(rng).copied().unwrap_or("black coffee");
            let hint = pick(IDENTITY_HINTS, rng).replace("{order}", order);
            state.revealed_hints.push(hint.clone());
            format!("A small piece of the puzzle:\n{hint}")
        }
        StoryEvent::PhotoClue => {
            "[ENCRYPTED IMAGE INCOMING]\n[DECRYPTION FAILED - PARTIAL DATA]\nI'll try again soon."
                .to_string()
        }
        StoryEvent::RevealTease => match state.revealed_hints.len() {
            0 => "Maybe someday I'll tell you who I am. Not today.".to_string(),
            n => format!(
                "You have the clues now. {n} of them.\n\
                 Put them together and you'll know everything.\n\
                 Almost everything."
            ),
        },
    }
}

/// Whether a periodic check should make the contact write.
///
/// Before first contact each check has an 8% chance; afterwards the
/// contact stays quiet for two hours and then has a 5% chance.
pub fn should_initiate(state: &AnonymousState, now: DateTime<Utc>, roll: f64) -> bool {
    if !state.active {
        return false;
    }
    if state.message_count == 0 {
        return roll < 0.08;
    }
    if let Some(last) = state.last_contact
        && now - last < Duration::hours(QUIET_HOURS)
    {
        return false;
    }
    roll < 0.05
}

pub struct AnonymousContact<B: Backend> {
    characters: Arc<CharacterService<B>>,
    interactions: InteractionService<B>,
    llm: Arc<LlmService>,
    events: EventBus,
    /// Serialises state read-modify-write across checks and replies.
    turn: Mutex<()>,
}

impl<B: Backend> AnonymousContact<B> {
    pub fn new(
        backend: Arc<B>,
        characters: Arc<CharacterService<B>>,
        llm: Arc<LlmService>,
        events: EventBus,
    ) -> Self {
        Self {
            characters,
            interactions: InteractionService::new(backend),
            llm,
            events,
            turn: Mutex::new(()),
        }
    }

    pub async fn info(&self) -> Result<AnonymousContactInfo, AnonymousError> {
        let (character, state) = self.current().await?.ok_or(AnonymousError::NoContact)?;
        Ok(contact_info(&character, &state))
    }

    /// Create the contact, or switch it to `persona`. Switching starts a
    /// fresh thread. A random persona is picked when none is given and no
    /// contact exists yet.
    pub async fn summon(&self, persona: Option<Persona>) -> Result<AnonymousContactInfo, AnonymousError> {
        let _turn = self.turn.lock().await;

        match self.current().await? {
            Some((character, state)) if persona.is_none_or(|p| p == state.persona) => {
                Ok(contact_info(&character, &state))
            }
            Some((character, _)) => {
                let persona = persona.unwrap_or_default();
                let state = AnonymousState::new(persona);
                let character = self
                    .write_state(&character, &state, Some(profile(persona).display_name))
                    .await?;
                tracing::info!(%persona, "anonymous contact switched persona");
                Ok(contact_info(&character, &state))
            }
            None => {
                let persona = persona.unwrap_or_else(|| {
                    Persona::ALL.choose(&mut rand::rng()).copied().unwrap_or_default()
                });
                let state = AnonymousState::new(persona);
                let mut profile_data = CharacterProfile::default();
                profile_data.extra.insert(STATE_KEY.to_string(), state_value(&state)?);
                let character = self
                    .characters
                    .create(CreateCharacterRequest {
                        name: profile(persona).display_name.to_string(),
                        tags: vec![ANONYMOUS_TAG.to_string(), "mystery".to_string()],
                        profile: profile_data,
                        ..Default::default()
                    })
                    .await
                    .map_err(storage)?;
                tracing::info!(%persona, character_id = %character.id, "anonymous contact appeared");
                Ok(contact_info(&character, &state))
            }
        }
    }

    /// Silence or wake the contact. Silenced contacts never write first
    /// and refuse replies.
    pub async fn set_active(&self, active: bool) -> Result<AnonymousContactInfo, AnonymousError> {
        let _turn = self.turn.lock().await;
        let (character, mut state) = self.current().await?.ok_or(AnonymousError::NoContact)?;
        state.active = active;
        let character = self.write_state(&character, &state, None).await?;
        Ok(contact_info(&character, &state))
    }

    /// Periodic check from the messenger. `None` when nothing was sent.
    pub async fn check(&self) -> Result<Option<AnonymousMessage>, AnonymousError> {
        let Some((_, state)) = self.current().await? else {
            return Ok(None);
        };
        if !should_initiate(&state, Utc::now(), rand::random()) {
            return Ok(None);
        }
        self.initiate().await.map(Some)
    }

    /// Make the contact write now: a story event when one fires,
    /// otherwise a line from the LLM in persona.
    pub async fn initiate(&self) -> Result<AnonymousMessage, AnonymousError> {
        let _turn = self.turn.lock().await;
        let (character, mut state) = self.current().await?.ok_or(AnonymousError::NoContact)?;
        if !state.active {
            return Err(AnonymousError::Inactive);
        }

        let event = {
            let mut rng = rand::rng();
            next_event(&state, || rng.random()).map(|event| (event, fire(event, &mut state, &mut rng)))
        };
        let (content, event, fallback) = match event {
            Some((event, line)) => (line, Some(event), false),
            None => {
                let (content, fallback) = self.generate(&state, None).await?;
                (content, None, fallback)
            }
        };

        self.send(&character, &mut state, content, event, fallback).await
    }

    /// The user answered the unknown number.
    pub async fn reply(&self, text: &str) -> Result<AnonymousMessage, AnonymousError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AnonymousError::EmptyMessage);
        }

        let _turn = self.turn.lock().await;
        let (character, mut state) = self.current().await?.ok_or(AnonymousError::NoContact)?;
        if !state.active {
            return Err(AnonymousError::Inactive);
        }

        let (content, fallback) = self.generate(&state, Some(text)).await?;
        self.log(&character, &state, Direction::Incoming, text, None, false)
            .await?;
        self.send(&character, &mut state, content, None, fallback).await
    }

    /// The thread, oldest first, at most `limit` messages.
    pub async fn history(&self, limit: usize) -> Result<Vec<AnonymousMessage>, AnonymousError> {
        let Some((character, state)) = self.current().await? else {
            return Ok(Vec::new());
        };
        let thread = self.thread(&state).await?;
        let skip = thread.len().saturating_sub(limit);
        Ok(thread
            .iter()
            .skip(skip)
            .map(|i| thread_message(&character, &state, i))
            .collect())
    }

    async fn current(&self) -> Result<Option<(Character, AnonymousState)>, AnonymousError> {
        let found = self
            .characters
            .list()
            .await
            .map_err(storage)?
            .into_iter()
            .find(|c| c.tags.iter().any(|t| t == ANONYMOUS_TAG));
        Ok(found.map(|character| {
            let state = character
                .profile
                .extra
                .get(STATE_KEY)
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_else(|| {
                    tracing::warn!(character_id = %character.id, "anonymous state unreadable, starting over");
                    AnonymousState::new(Persona::default())
                });
            (character, state)
        }))
    }

    async fn thread(&self, state: &AnonymousState) -> Result<Vec<Interaction>, AnonymousError> {
        self.interactions.chain(&state.thread_id).await.map_err(storage)
    }

    /// Reply text and whether it is a canned fallback.
    async fn generate(
        &self,
        state: &AnonymousState,
        user_text: Option<&str>,
    ) -> Result<(String, bool), AnonymousError> {
        let thread = self.thread(state).await?;
        let skip = thread.len().saturating_sub(HISTORY_WINDOW);
        let mut messages: Vec<Message> = thread
            .iter()
            .skip(skip)
            .map(|i| match direction_of(i) {
                Direction::Incoming => Message::user(i.content.clone()),
                Direction::Outgoing => Message::assistant(i.content.clone()),
            })
            .collect();
        messages.push(Message::user(user_text.unwrap_or("(You decide to send a message.)")));

        let persona = profile(state.persona);
        let reply = self
            .llm
            .chat(messages, Some(persona.system_prompt.to_string()), Some(TEMPERATURE), None)
            .await;
        if reply.fallback || reply.content.trim().is_empty() {
            return Ok((pick(persona.fallback_lines, &mut rand::rng()), true));
        }
        Ok((reply.content.trim().to_string(), false))
    }

    async fn send(
        &self,
        character: &Character,
        state: &mut AnonymousState,
        content: String,
        event: Option<StoryEvent>,
        fallback: bool,
    ) -> Result<AnonymousMessage, AnonymousError> {
        state.message_count += 1;
        state.last_contact = Some(Utc::now());
        self.write_state(character, state, None).await?;

        let message = self
            .log(character, state, Direction::Outgoing, &content, event, fallback)
            .await?;

        self.events.publish(CompanionEvent::MessageReceived {
            character_id: character.id,
            character_name: profile(state.persona).display_name.to_string(),
            content: message.content.clone(),
            kind: "anonymous".to_string(),
            media_path: None,
            autonomous: true,
        });
        tracing::info!(persona = %state.persona, event = ?event, "anonymous contact wrote");
        Ok(message)
    }

    async fn log(
        &self,
        character: &Character,
        state: &AnonymousState,
        direction: Direction,
        content: &str,
        event: Option<StoryEvent>,
        fallback: bool,
    ) -> Result<AnonymousMessage, AnonymousError> {
        let role = match direction {
            Direction::Incoming => "user",
            Direction::Outgoing => "assistant",
        };
        let mut metadata = serde_json::json!({
            "role": role,
            "anonymous": true,
            "direction": direction.as_str(),
            "persona": state.persona.as_str(),
        });
        if let Some(event) = event {
            metadata["event"] = serde_json::Value::String(event.as_str().to_string());
        }
        if fallback {
            metadata["fallback"] = serde_json::Value::Bool(true);
        }

        let interaction = self
            .interactions
            .log(
                InteractionKind::Message,
                &character.id,
                content,
                metadata,
                Some(state.thread_id),
            )
            .await
            .map_err(storage)?;
        Ok(thread_message(character, state, &interaction))
    }

    async fn write_state(
        &self,
        character: &Character,
        state: &AnonymousState,
        name: Option<&str>,
    ) -> Result<Character, AnonymousError> {
        let mut patch = CharacterProfile::default();
        patch.extra.insert(STATE_KEY.to_string(), state_value(state)?);
        self.characters
            .update(
                &character.id,
                UpdateCharacterRequest {
                    name: name.map(str::to_string),
                    profile: Some(patch),
                    ..Default::default()
                },
            )
            .await
            .map_err(storage)
    }
}

fn contact_info(character: &Character, state: &AnonymousState) -> AnonymousContactInfo {
    let persona = profile(state.persona);
    AnonymousContactInfo {
        character_id: character.id,
        display_name: persona.display_name.to_string(),
        number: persona.number.to_string(),
        avatar: persona.avatar.to_string(),
        persona: state.persona,
        message_count: state.message_count,
        thread_id: state.thread_id,
        active: state.active,
    }
}

fn direction_of(interaction: &Interaction) -> Direction {
    match interaction.metadata.get("direction").and_then(|v| v.as_str()) {
        Some("incoming") => Direction::Incoming,
        _ => Direction::Outgoing,
    }
}

fn thread_message(
    character: &Character,
    state: &AnonymousState,
    interaction: &Interaction,
) -> AnonymousMessage {
    let meta = &interaction.metadata;
    AnonymousMessage {
        character_id: character.id,
        persona: meta
            .get("persona")
            .and_then(|v| v.as_str())
            .and_then(|p| p.parse().ok())
            .unwrap_or(state.persona),
        direction: direction_of(interaction),
        content: interaction.content.clone(),
        event: meta
            .get("event")
            .and_then(|v| serde_json::from_value(v.clone()).ok()),
        fallback: meta.get("fallback").and_then(|v| v.as_bool()).unwrap_or(false),
        sent_at: interaction.created_at,
    }
}

fn state_value(state: &AnonymousState) -> Result<serde_json::Value, AnonymousError> {
    serde_json::to_value(state).map_err(|e| AnonymousError::StorageError(e.to_string()))
}

fn storage(e: impl std::fmt::Display) -> AnonymousError {
    AnonymousError::StorageError(e.to_string())
}
