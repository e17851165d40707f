use thiserror::Error;

/// Errors from repository operations (used by trait definitions in kindred-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors related to character operations.
#[derive(Debug, Error)]
pub enum CharacterError {
    #[error("character not found")]
    NotFound,

    #[error("invalid character name: {0}")]
    InvalidName(String),

    #[error("personality not found")]
    PersonalityNotFound,

    #[error("storage error: {0}")]
    StorageError(String),
}

/// Errors related to the personality and role catalogues.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("unknown template '{0}'")]
    UnknownTemplate(String),

    #[error("name '{0}' already exists")]
    NameConflict(String),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("storage error: {0}")]
    StorageError(String),
}

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("conversation not found")]
    NotFound,

    #[error("character not found")]
    CharacterNotFound,

    #[error("role not found")]
    RoleNotFound,

    #[error("conversation already ended")]
    AlreadyEnded,

    #[error("empty message")]
    EmptyMessage,

    #[error("storage error: {0}")]
    StorageError(String),
}

/// Errors from a companion chat turn.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("character not found")]
    CharacterNotFound,

    #[error("empty message")]
    EmptyMessage,

    #[error(transparent)]
    Conversation(#[from] ConversationError),

    #[error(transparent)]
    Character(#[from] CharacterError),
}

#[derive(Debug, Error)]
pub enum InteractionError {
    #[error("interaction not found")]
    NotFound,

    #[error("interaction is not a voicemail")]
    NotAVoicemail,

    #[error("storage error: {0}")]
    StorageError(String),
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("memory not found")]
    NotFound,

    #[error("empty memory content")]
    EmptyContent,

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("vector store error: {0}")]
    VectorStore(String),

    #[error("storage error: {0}")]
    StorageError(String),
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset not found")]
    NotFound,

    #[error("asset version {0} not found")]
    VersionNotFound(u32),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("asset has {0} dependent asset(s); delete with cascade to remove them")]
    HasDependents(usize),

    #[error("asset cannot depend on itself")]
    SelfDependency,

    #[error("storage error: {0}")]
    StorageError(String),
}

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("scene type '{0}' is not registered")]
    UnregisteredKind(String),

    #[error("scene not found")]
    NotFound,

    #[error("asset is not a valid scene: {0}")]
    InvalidDefinition(String),

    #[error("asset error: {0}")]
    Asset(#[from] AssetError),
}

#[derive(Debug, Error)]
pub enum CallError {
    #[error("no active call with id '{0}'")]
    NotFound(String),

    #[error("a call is already in progress")]
    AlreadyActive,

    #[error("call is not answered yet")]
    NotAnswered,

    #[error("character not found")]
    CharacterNotFound,

    #[error("storage error: {0}")]
    StorageError(String),
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("image generator unavailable: {0}")]
    Unavailable(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("io error: {0}")]
    Io(String),

    #[error("storage error: {0}")]
    StorageError(String),
}

#[derive(Debug, Error)]
pub enum MessengerError {
    #[error("character not found")]
    CharacterNotFound,

    #[error("character is not registered")]
    NotRegistered,

    #[error("scheduler error: {0}")]
    Scheduler(String),

    #[error("storage error: {0}")]
    StorageError(String),
}

#[derive(Debug, Error)]
pub enum AnonymousError {
    #[error("no anonymous contact yet")]
    NoContact,

    #[error("anonymous contact has gone quiet")]
    Inactive,

    #[error("message cannot be empty")]
    EmptyMessage,

    #[error("storage error: {0}")]
    StorageError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_catalog_error_display() {
        assert_eq!(
            CatalogError::NotFound("personality").to_string(),
            "personality not found"
        );
        assert_eq!(
            CatalogError::UnknownTemplate("pirate".into()).to_string(),
            "unknown template 'pirate'"
        );
    }

    #[test]
    fn test_scene_error_wraps_asset_error() {
        let err: SceneError = AssetError::NotFound.into();
        assert_eq!(err.to_string(), "asset error: asset not found");
    }
}
