//! Autonomous messenger: characters that text first.
//!
//! Each registered character gets three jobs on the cron scheduler: a
//! check every five minutes that may send something, a morning greeting and
//! an evening message at a random minute picked at registration. Messages
//! are logged as `message` interactions flagged `autonomous` and pushed on
//! the event bus. An attached [`AnonymousContact`] gets its own five-minute
//! check.

pub mod anonymous;
pub mod scheduler;
pub mod templates;

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Local, Timelike, Utc};
use kindred_types::character::{Character, CharacterState};
use kindred_types::error::{CharacterError, MessengerError};
use kindred_types::event::CompanionEvent;
use kindred_types::interaction::InteractionKind;
use kindred_types::messenger::{AutonomousKind, AutonomousMessage, MessengerSettings, Registration};
use rand::Rng;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::event::EventBus;
use crate::media::service::MediaService;
use crate::repository::Backend;
use crate::service::character::CharacterService;
use crate::service::interaction::InteractionService;

pub use anonymous::AnonymousContact;
pub use scheduler::MessengerScheduler;

/// Scheduler owner of the anonymous contact's job.
const ANONYMOUS_OWNER: Uuid = Uuid::nil();

/// Time of day for a daily job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub hour: u32,
    pub minute: u32,
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Random morning slot in 07:00-08:59 and evening slot in 19:00-21:59.
pub fn daily_slots<R: Rng + ?Sized>(rng: &mut R) -> (Slot, Slot) {
    let morning = Slot {
        hour: rng.random_range(7..=8),
        minute: rng.random_range(0..60),
    };
    let evening = Slot {
        hour: rng.random_range(19..=21),
        minute: rng.random_range(0..60),
    };
    (morning, evening)
}

/// Whether a periodic check should send a message.
///
/// `roll` is a uniform draw in `[0, 1)`; the check passes when it lands
/// under the frequency's chance.
pub fn should_send(
    settings: &MessengerSettings,
    last_message_at: Option<DateTime<Utc>>,
    local_hour: u32,
    now: DateTime<Utc>,
    roll: f64,
) -> bool {
    if !settings.is_active_hour(local_hour) {
        return false;
    }
    if let Some(last) = last_message_at {
        let (min_secs, _) = settings.frequency.interval_secs();
        if (now - last).num_seconds() < min_secs as i64 {
            return false;
        }
    }
    roll < settings.frequency.chance()
}

#[derive(Debug, Clone, Copy)]
enum Greeting {
    Morning,
    Evening,
}

struct Entry {
    settings: MessengerSettings,
    morning: Slot,
    evening: Slot,
    last_message_at: Option<DateTime<Utc>>,
}

pub struct AutonomousMessenger<B: Backend> {
    characters: Arc<CharacterService<B>>,
    media: Arc<MediaService<B>>,
    interactions: InteractionService<B>,
    scheduler: MessengerScheduler,
    registered: RwLock<HashMap<Uuid, Entry>>,
    anonymous: RwLock<Option<Arc<AnonymousContact<B>>>>,
    events: EventBus,
    this: Weak<Self>,
}

impl<B: Backend> AutonomousMessenger<B> {
    pub fn new(
        backend: Arc<B>,
        characters: Arc<CharacterService<B>>,
        media: Arc<MediaService<B>>,
        events: EventBus,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            characters,
            media,
            interactions: InteractionService::new(backend),
            scheduler: MessengerScheduler::new(),
            registered: RwLock::new(HashMap::new()),
            anonymous: RwLock::new(None),
            events,
            this: this.clone(),
        })
    }

    /// Start the scheduler and schedule every registered character.
    pub async fn enable(&self) -> Result<(), MessengerError> {
        if self.scheduler.is_running().await {
            return Ok(());
        }
        self.scheduler.start().await?;

        let ids: Vec<Uuid> = self.registered.read().await.keys().copied().collect();
        for id in ids {
            self.schedule(&id).await?;
        }
        if self.anonymous.read().await.is_some() {
            self.schedule_anonymous().await?;
        }
        tracing::info!("autonomous messaging enabled");
        Ok(())
    }

    /// Stop the scheduler. Registrations are kept for the next `enable`.
    pub async fn disable(&self) -> Result<(), MessengerError> {
        if !self.scheduler.is_running().await {
            return Ok(());
        }
        self.scheduler.stop().await?;
        tracing::info!("autonomous messaging disabled");
        Ok(())
    }

    pub async fn is_enabled(&self) -> bool {
        self.scheduler.is_running().await
    }

    /// Register (or re-register) a character. Existing jobs are replaced.
    pub async fn register(
        &self,
        character_id: &Uuid,
        settings: MessengerSettings,
    ) -> Result<Registration, MessengerError> {
        let character = self.characters.get(character_id).await.map_err(not_found)?;

        let (morning, evening) = daily_slots(&mut rand::rng());
        self.registered.write().await.insert(
            *character_id,
            Entry {
                settings,
                morning,
                evening,
                last_message_at: None,
            },
        );
        self.scheduler.remove_owner(character_id).await?;
        if self.scheduler.is_running().await {
            self.schedule(character_id).await?;
        }

        tracing::info!(
            character = %character.name,
            %morning,
            %evening,
            "registered for autonomous messaging"
        );
        self.registration(character_id)
            .await
            .ok_or(MessengerError::NotRegistered)
    }

    pub async fn unregister(&self, character_id: &Uuid) -> Result<(), MessengerError> {
        if self.registered.write().await.remove(character_id).is_none() {
            return Err(MessengerError::NotRegistered);
        }
        let removed = self.scheduler.remove_owner(character_id).await?;
        tracing::info!(%character_id, jobs = removed, "unregistered from autonomous messaging");
        Ok(())
    }

    pub async fn registration(&self, character_id: &Uuid) -> Option<Registration> {
        let scheduled = self.scheduler.job_count(character_id).await > 0;
        self.registered
            .read()
            .await
            .get(character_id)
            .map(|entry| to_registration(character_id, entry, scheduled))
    }

    pub async fn registrations(&self) -> Vec<Registration> {
        let ids: Vec<Uuid> = self.registered.read().await.keys().copied().collect();
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(registration) = self.registration(&id).await {
                out.push(registration);
            }
        }
        out.sort_by_key(|r| r.character_id);
        out
    }

    /// Let the anonymous contact write through the scheduler. Replaces any
    /// contact attached before.
    pub async fn attach_anonymous(&self, contact: Arc<AnonymousContact<B>>) -> Result<(), MessengerError> {
        *self.anonymous.write().await = Some(contact);
        self.scheduler.remove_owner(&ANONYMOUS_OWNER).await?;
        if self.scheduler.is_running().await {
            self.schedule_anonymous().await?;
        }
        Ok(())
    }

    pub async fn anonymous_scheduled(&self) -> bool {
        self.scheduler.job_count(&ANONYMOUS_OWNER).await > 0
    }

    async fn schedule_anonymous(&self) -> Result<(), MessengerError> {
        self.scheduler
            .add(
                ANONYMOUS_OWNER,
                scheduler::CHECK_EVERY_5_MIN,
                false,
                self.job(ANONYMOUS_OWNER, Job::Anonymous),
            )
            .await?;
        Ok(())
    }

    async fn check_anonymous(&self) -> Result<(), MessengerError> {
        let Some(contact) = self.anonymous.read().await.clone() else {
            return Ok(());
        };
        contact
            .check()
            .await
            .map(|_| ())
            .map_err(|e| MessengerError::StorageError(e.to_string()))
    }

    /// Periodic check. Sends something when the character is awake, has
    /// been quiet long enough and the draw succeeds.
    pub async fn check(&self, character_id: &Uuid) -> Result<Option<AutonomousMessage>, MessengerError> {
        let (settings, last) = {
            let registered = self.registered.read().await;
            let entry = registered.get(character_id).ok_or(MessengerError::NotRegistered)?;
            (entry.settings.clone(), entry.last_message_at)
        };

        let roll: f64 = rand::random();
        if !should_send(&settings, last, Local::now().hour(), Utc::now(), roll) {
            return Ok(None);
        }
        self.send_now(character_id).await.map(Some)
    }

    /// Send an autonomous message immediately, skipping the gates.
    pub async fn send_now(&self, character_id: &Uuid) -> Result<AutonomousMessage, MessengerError> {
        let settings = self
            .registered
            .read()
            .await
            .get(character_id)
            .map(|e| e.settings.clone())
            .unwrap_or_default();

        let character = self.characters.get(character_id).await.map_err(not_found)?;
        let state = self.characters.state(character_id).await.map_err(not_found)?;

        let kind = templates::kind(&settings, state.relationship_level, &mut rand::rng());
        let (kind, content, media_path) = match kind {
            AutonomousKind::Text => (kind, self.text_for(&state), None),
            AutonomousKind::Photo => self.photo(&character, &state).await,
            AutonomousKind::Voice => self.voice(&character, &state).await,
        };

        self.deliver(&character, kind, content, media_path).await
    }

    async fn greet(&self, character_id: &Uuid, greeting: Greeting) -> Result<AutonomousMessage, MessengerError> {
        let character = self.characters.get(character_id).await.map_err(not_found)?;
        let lines = match greeting {
            Greeting::Morning => templates::MORNING_GREETINGS,
            Greeting::Evening => templates::EVENING_GREETINGS,
        };
        let content = templates::pick(lines, &mut rand::rng());
        self.deliver(&character, AutonomousKind::Text, content, None).await
    }

    fn text_for(&self, state: &CharacterState) -> String {
        templates::text(
            Local::now().hour(),
            state.mood,
            state.relationship_level,
            &mut rand::rng(),
        )
    }

    async fn photo(
        &self,
        character: &Character,
        state: &CharacterState,
    ) -> (AutonomousKind, String, Option<String>) {
        match self.media.selfie(character, state, None).await {
            Ok(generated) => {
                let caption = templates::caption(state.relationship_level, &mut rand::rng());
                (AutonomousKind::Photo, caption, Some(generated.media.filepath))
            }
            Err(e) => {
                tracing::warn!(character = %character.name, error = %e, "autonomous photo failed, sending text");
                (AutonomousKind::Text, self.text_for(state), None)
            }
        }
    }

    async fn voice(
        &self,
        character: &Character,
        state: &CharacterState,
    ) -> (AutonomousKind, String, Option<String>) {
        let text = self.text_for(state);
        let emotion = state.mood.to_string();
        match self.media.voice_message(character, &text, Some(&emotion)).await {
            Ok(generated) => (AutonomousKind::Voice, text, Some(generated.media.filepath)),
            Err(e) => {
                tracing::warn!(character = %character.name, error = %e, "autonomous voice note failed, sending text");
                (AutonomousKind::Text, text, None)
            }
        }
    }

    async fn deliver(
        &self,
        character: &Character,
        kind: AutonomousKind,
        content: String,
        media_path: Option<String>,
    ) -> Result<AutonomousMessage, MessengerError> {
        let sent_at = Utc::now();
        let mut metadata = serde_json::json!({
            "role": "assistant",
            "kind": kind.as_str(),
            "autonomous": true,
            "timestamp": sent_at.to_rfc3339(),
        });
        if let Some(path) = &media_path {
            metadata["media_path"] = serde_json::Value::String(path.clone());
        }

        self.interactions
            .log(InteractionKind::Message, &character.id, &content, metadata, None)
            .await
            .map_err(|e| MessengerError::StorageError(e.to_string()))?;

        if let Some(entry) = self.registered.write().await.get_mut(&character.id) {
            entry.last_message_at = Some(sent_at);
        }

        self.events.publish(CompanionEvent::MessageReceived {
            character_id: character.id,
            character_name: character.name.clone(),
            content: content.clone(),
            kind: kind.as_str().to_string(),
            media_path: media_path.clone(),
            autonomous: true,
        });
        tracing::info!(character = %character.name, kind = kind.as_str(), "autonomous message sent");

        Ok(AutonomousMessage {
            character_id: character.id,
            character_name: character.name.clone(),
            kind,
            content,
            media_path,
            sent_at,
        })
    }

    async fn schedule(&self, character_id: &Uuid) -> Result<(), MessengerError> {
        let Some((morning, evening)) = self
            .registered
            .read()
            .await
            .get(character_id)
            .map(|e| (e.morning, e.evening))
        else {
            return Err(MessengerError::NotRegistered);
        };

        let id = *character_id;
        self.scheduler
            .add(id, scheduler::CHECK_EVERY_5_MIN, false, self.job(id, Job::Check))
            .await?;
        self.scheduler
            .add(
                id,
                &scheduler::daily_at(morning.hour, morning.minute),
                true,
                self.job(id, Job::Greet(Greeting::Morning)),
            )
            .await?;
        self.scheduler
            .add(
                id,
                &scheduler::daily_at(evening.hour, evening.minute),
                true,
                self.job(id, Job::Greet(Greeting::Evening)),
            )
            .await?;
        Ok(())
    }

    /// Scheduler callback holding a weak handle, so jobs never keep the
    /// messenger alive.
    fn job(&self, character_id: Uuid, job: Job) -> scheduler::JobCallback {
        let this = self.this.clone();
        Arc::new(move || -> futures_util::future::BoxFuture<'static, ()> {
            let this = this.clone();
            Box::pin(async move {
                let Some(messenger) = this.upgrade() else {
                    return;
                };
                let result = match job {
                    Job::Check => messenger.check(&character_id).await.map(|_| ()),
                    Job::Greet(greeting) => messenger.greet(&character_id, greeting).await.map(|_| ()),
                    Job::Anonymous => messenger.check_anonymous().await,
                };
                if let Err(e) = result {
                    tracing::warn!(%character_id, ?job, error = %e, "messenger job failed");
                }
            })
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Job {
    Check,
    Greet(Greeting),
    Anonymous,
}

fn to_registration(character_id: &Uuid, entry: &Entry, scheduled: bool) -> Registration {
    Registration {
        character_id: *character_id,
        settings: entry.settings.clone(),
        morning_at: entry.morning.to_string(),
        evening_at: entry.evening.to_string(),
        last_message_at: entry.last_message_at,
        scheduled,
    }
}

fn not_found(e: CharacterError) -> MessengerError {
    match e {
        CharacterError::NotFound => MessengerError::CharacterNotFound,
        other => MessengerError::StorageError(other.to_string()),
    }
}
