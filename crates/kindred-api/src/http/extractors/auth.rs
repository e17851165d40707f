//! API key authentication extractor.
//!
//! Extracts and verifies API keys from:
//! - `Authorization: Bearer <key>` header
//! - `X-API-Key: <key>` header
//!
//! When `server.require_auth` is off (the default for a local install) every
//! request passes.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::http::error::AppError;
use crate::state::AppState;

/// Authenticated request marker. Extracting this validates the API key.
pub struct Authenticated;

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if !state.config.server.require_auth {
            return Ok(Authenticated);
        }

        let api_key = extract_api_key(parts)?;
        if state.api_keys.verify(&api_key).await? {
            Ok(Authenticated)
        } else {
            tracing::debug!(path = %parts.uri.path(), "rejected api key");
            Err(AppError::Unauthorized(
                "Invalid API key. Provide a valid key via 'Authorization: Bearer <key>' or 'X-API-Key: <key>' header.".to_string(),
            ))
        }
    }
}

fn extract_api_key(parts: &Parts) -> Result<String, AppError> {
    if let Some(auth) = parts.headers.get("authorization") {
        let auth_str = auth.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid Authorization header encoding".to_string())
        })?;
        if let Some(key) = auth_str.strip_prefix("Bearer ") {
            return Ok(key.trim().to_string());
        }
    }

    if let Some(key) = parts.headers.get("x-api-key") {
        let key_str = key.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid X-API-Key header encoding".to_string())
        })?;
        return Ok(key_str.trim().to_string());
    }

    Err(AppError::Unauthorized(
        "Missing API key. Provide via 'Authorization: Bearer <key>' or 'X-API-Key: <key>' header.".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/api/v1/characters");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_preferred_over_header() {
        let p = parts(&[("authorization", "Bearer kdr_abc "), ("x-api-key", "kdr_other")]);
        assert_eq!(extract_api_key(&p).unwrap(), "kdr_abc");
    }

    #[test]
    fn test_x_api_key_fallback() {
        let p = parts(&[("x-api-key", "kdr_xyz")]);
        assert_eq!(extract_api_key(&p).unwrap(), "kdr_xyz");
    }

    #[test]
    fn test_missing_key_rejected() {
        let p = parts(&[("authorization", "Basic dXNlcg==")]);
        assert!(matches!(extract_api_key(&p), Err(AppError::Unauthorized(_))));
    }
}
