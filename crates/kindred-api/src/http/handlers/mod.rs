//! HTTP request handlers for the REST API.

pub mod anonymous;
pub mod asset;
pub mod call;
pub mod catalog;
pub mod character;
pub mod conversation;
pub mod events;
pub mod legacy;
pub mod media;
pub mod memory;
pub mod message;
pub mod messenger;
pub mod scene;
pub mod stats;

use kindred_types::character::Character;

use crate::http::error::AppError;
use crate::state::AppState;

/// Upper bound on a chat message accepted over HTTP.
pub(crate) const MAX_MESSAGE_LENGTH: usize = 10_000;

/// Upper bound on any `limit` or `n` a client may ask for.
pub(crate) const MAX_RESULTS: usize = 200;

/// Trim a chat message and reject empty or oversized ones.
pub(crate) fn checked_message(message: &str) -> Result<&str, AppError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(AppError::Validation("Empty message".to_string()));
    }
    if message.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(AppError::Validation(format!(
            "Message too long (max {MAX_MESSAGE_LENGTH} characters)"
        )));
    }
    Ok(message)
}

/// Look up a character by UUID or exact name, as given in the path.
pub(crate) async fn resolve_character(
    state: &AppState,
    reference: &str,
) -> Result<Character, AppError> {
    Ok(state.characters.resolve(reference).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_message_bounds() {
        assert_eq!(checked_message("  hi  ").unwrap(), "hi");
        assert!(matches!(checked_message("   "), Err(AppError::Validation(_))));
        assert!(checked_message(&"a".repeat(MAX_MESSAGE_LENGTH)).is_ok());
        assert!(matches!(
            checked_message(&"a".repeat(MAX_MESSAGE_LENGTH + 1)),
            Err(AppError::Validation(_))
        ));
    }
}
