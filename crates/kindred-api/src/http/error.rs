//! Application error type mapping to HTTP status codes and envelope format.
//!
//! Domain errors are sorted into a handful of stable error codes. Storage
//! failures become `INTERNAL_ERROR` and are logged; the client only sees the
//! message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use kindred_types::error::{
    AnonymousError, AssetError, CallError, CatalogError, CharacterError, ChatError, ConversationError,
    InteractionError, MediaError, MemoryError, MessengerError, RepositoryError, SceneError,
};

use super::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Conflict(String),
    Validation(String),
    Unauthorized(String),
    /// An external service (ComfyUI, LM Studio, vector store) is down.
    Unavailable(String),
    Internal(String),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, &str) {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            AppError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg)
            }
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => AppError::NotFound(e.to_string()),
            RepositoryError::Conflict(msg) => AppError::Conflict(msg),
            e => AppError::Internal(e.to_string()),
        }
    }
}

impl From<CharacterError> for AppError {
    fn from(e: CharacterError) -> Self {
        match e {
            CharacterError::NotFound | CharacterError::PersonalityNotFound => {
                AppError::NotFound(e.to_string())
            }
            CharacterError::InvalidName(_) => AppError::Validation(e.to_string()),
            CharacterError::StorageError(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::NotFound(_) | CatalogError::UnknownTemplate(_) => {
                AppError::NotFound(e.to_string())
            }
            CatalogError::NameConflict(_) => AppError::Conflict(e.to_string()),
            CatalogError::Invalid { .. } => AppError::Validation(e.to_string()),
            CatalogError::StorageError(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<ConversationError> for AppError {
    fn from(e: ConversationError) -> Self {
        match e {
            ConversationError::NotFound
            | ConversationError::CharacterNotFound
            | ConversationError::RoleNotFound => AppError::NotFound(e.to_string()),
            ConversationError::AlreadyEnded => AppError::Conflict(e.to_string()),
            ConversationError::EmptyMessage => AppError::Validation(e.to_string()),
            ConversationError::StorageError(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::CharacterNotFound => AppError::NotFound(e.to_string()),
            ChatError::EmptyMessage => AppError::Validation(e.to_string()),
            ChatError::Conversation(inner) => inner.into(),
            ChatError::Character(inner) => inner.into(),
        }
    }
}

impl From<InteractionError> for AppError {
    fn from(e: InteractionError) -> Self {
        match e {
            InteractionError::NotFound => AppError::NotFound(e.to_string()),
            InteractionError::NotAVoicemail => AppError::Validation(e.to_string()),
            InteractionError::StorageError(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<MemoryError> for AppError {
    fn from(e: MemoryError) -> Self {
        match e {
            MemoryError::NotFound => AppError::NotFound(e.to_string()),
            MemoryError::EmptyContent => AppError::Validation(e.to_string()),
            MemoryError::Embedding(_) | MemoryError::VectorStore(_) => {
                AppError::Unavailable(e.to_string())
            }
            MemoryError::StorageError(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<AssetError> for AppError {
    fn from(e: AssetError) -> Self {
        match e {
            AssetError::NotFound | AssetError::VersionNotFound(_) => {
                AppError::NotFound(e.to_string())
            }
            AssetError::Validation(_) | AssetError::SelfDependency => {
                AppError::Validation(e.to_string())
            }
            AssetError::HasDependents(_) => AppError::Conflict(e.to_string()),
            AssetError::StorageError(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<SceneError> for AppError {
    fn from(e: SceneError) -> Self {
        match e {
            SceneError::NotFound => AppError::NotFound(e.to_string()),
            SceneError::UnregisteredKind(_) | SceneError::InvalidDefinition(_) => {
                AppError::Validation(e.to_string())
            }
            SceneError::Asset(inner) => inner.into(),
        }
    }
}

impl From<CallError> for AppError {
    fn from(e: CallError) -> Self {
        match e {
            CallError::NotFound(_) | CallError::CharacterNotFound => {
                AppError::NotFound(e.to_string())
            }
            CallError::AlreadyActive | CallError::NotAnswered => AppError::Conflict(e.to_string()),
            CallError::StorageError(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<MediaError> for AppError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::Unavailable(_) | MediaError::Timeout(_) => {
                AppError::Unavailable(e.to_string())
            }
            e => AppError::Internal(e.to_string()),
        }
    }
}

impl From<AnonymousError> for AppError {
    fn from(e: AnonymousError) -> Self {
        match e {
            AnonymousError::NoContact => AppError::NotFound(e.to_string()),
            AnonymousError::Inactive => AppError::Conflict(e.to_string()),
            AnonymousError::EmptyMessage => AppError::Validation(e.to_string()),
            AnonymousError::StorageError(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<MessengerError> for AppError {
    fn from(e: MessengerError) -> Self {
        match e {
            MessengerError::CharacterNotFound => AppError::NotFound(e.to_string()),
            MessengerError::NotRegistered => AppError::Conflict(e.to_string()),
            e => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(code, error = message, "request failed");
        }

        ApiResponse::failure(status, code, message).into_response()
    }
}
