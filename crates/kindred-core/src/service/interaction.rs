//! Interaction log and voicemail inbox.

use std::sync::Arc;

use kindred_types::error::{InteractionError, RepositoryError};
use kindred_types::interaction::{Interaction, InteractionKind, Voicemail};
use uuid::Uuid;

use crate::repository::Backend;
use crate::repository::interaction::InteractionRepository;

/// Upper bound on how far back the inbox looks.
const INBOX_SCAN_LIMIT: u32 = 500;

pub struct InteractionService<B: Backend> {
    backend: Arc<B>,
}

impl<B: Backend> InteractionService<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub async fn log(
        &self,
        kind: InteractionKind,
        character_id: &Uuid,
        content: &str,
        metadata: serde_json::Value,
        chain_id: Option<Uuid>,
    ) -> Result<Interaction, InteractionError> {
        let interaction = Interaction::new(kind, *character_id, content, metadata, chain_id);
        self.backend
            .interactions()
            .create(&interaction)
            .await
            .map_err(|e| InteractionError::StorageError(e.to_string()))?;
        tracing::debug!(interaction_id = %interaction.id, kind = %kind, character_id = %character_id, "interaction logged");
        Ok(interaction)
    }

    pub async fn get(&self, id: &Uuid) -> Result<Interaction, InteractionError> {
        self.backend
            .interactions()
            .get(id)
            .await
            .map_err(|e| InteractionError::StorageError(e.to_string()))?
            .ok_or(InteractionError::NotFound)
    }

    /// All interactions of one chain, oldest first.
    pub async fn chain(&self, chain_id: &Uuid) -> Result<Vec<Interaction>, InteractionError> {
        self.backend
            .interactions()
            .chain(chain_id)
            .await
            .map_err(|e| InteractionError::StorageError(e.to_string()))
    }

    pub async fn list(
        &self,
        character_id: &Uuid,
        kind: Option<InteractionKind>,
        limit: u32,
    ) -> Result<Vec<Interaction>, InteractionError> {
        self.recent(Some(character_id), kind, limit).await
    }

    /// Newest first, optionally across every character.
    pub async fn recent(
        &self,
        character_id: Option<&Uuid>,
        kind: Option<InteractionKind>,
        limit: u32,
    ) -> Result<Vec<Interaction>, InteractionError> {
        self.backend
            .interactions()
            .list(character_id, kind, limit)
            .await
            .map_err(|e| InteractionError::StorageError(e.to_string()))
    }

    /// Drop a voice message into the inbox.
    pub async fn add_voicemail(
        &self,
        character_id: &Uuid,
        filepath: &str,
        text: Option<&str>,
        duration_secs: f64,
    ) -> Result<Voicemail, InteractionError> {
        let content = text.filter(|t| !t.trim().is_empty()).unwrap_or("Voice message");
        let metadata = serde_json::json!({
            "filepath": filepath,
            "duration": duration_secs,
            "listened": false,
        });
        let interaction = self
            .log(InteractionKind::Voicemail, character_id, content, metadata, None)
            .await?;
        Voicemail::from_interaction(&interaction).ok_or(InteractionError::NotAVoicemail)
    }

    /// Newest first.
    pub async fn voicemails(
        &self,
        character_id: &Uuid,
        unheard_only: bool,
    ) -> Result<Vec<Voicemail>, InteractionError> {
        let interactions = self
            .list(character_id, Some(InteractionKind::Voicemail), INBOX_SCAN_LIMIT)
            .await?;
        Ok(interactions
            .iter()
            .filter_map(Voicemail::from_interaction)
            .filter(|vm| !unheard_only || !vm.listened)
            .collect())
    }

    pub async fn mark_listened(&self, id: &Uuid) -> Result<Voicemail, InteractionError> {
        let mut interaction = self.get(id).await?;
        if interaction.kind != InteractionKind::Voicemail {
            return Err(InteractionError::NotAVoicemail);
        }

        if let Some(obj) = interaction.metadata.as_object_mut() {
            obj.insert("listened".to_string(), serde_json::Value::Bool(true));
        } else {
            interaction.metadata = serde_json::json!({ "listened": true });
        }

        self.backend
            .interactions()
            .update_metadata(id, &interaction.metadata)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => InteractionError::NotFound,
                other => InteractionError::StorageError(other.to_string()),
            })?;

        Voicemail::from_interaction(&interaction).ok_or(InteractionError::NotAVoicemail)
    }

    pub async fn count(&self) -> Result<u64, InteractionError> {
        self.backend
            .interactions()
            .count()
            .await
            .map_err(|e| InteractionError::StorageError(e.to_string()))
    }
}
