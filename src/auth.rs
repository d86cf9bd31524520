//! Authentication middleware for API key validation.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::collections::HashSet;
use std::env;
use tracing::info;

pub const API_KEYS_ENV: &str = "PLAGIARISM_API_KEYS";
pub const API_KEY_ENV: &str = "PLAGIARISM_API_KEY";

#[derive(Clone, Default)]
pub struct AuthConfig {
    api_keys: HashSet<String>,
}

impl AuthConfig {
    /// Loads keys from `PLAGIARISM_API_KEYS` (comma separated) and `PLAGIARISM_API_KEY`.
    pub fn from_env() -> Self {
        let mut keys = Vec::new();

        if let Ok(keys_str) = env::var(API_KEYS_ENV) {
            keys.extend(keys_str.split(',').map(str::to_string));
        }
        if let Ok(key) = env::var(API_KEY_ENV) {
            keys.push(key);
        }

        let config = Self::with_keys(keys);
        if config.is_enabled() {
            info!("Authentication enabled ({} API keys configured)", config.api_keys.len());
        } else {
            info!("Authentication disabled (no API keys configured)");
        }
        config
    }

    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let api_keys = keys
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        Self { api_keys }
    }

    pub fn is_enabled(&self) -> bool {
        !self.api_keys.is_empty()
    }

    fn validate_key(&self, key: &str) -> bool {
        !self.is_enabled() || self.api_keys.contains(key)
    }
}

/// Middleware to validate API keys
pub async fn auth_middleware(
    State(auth_config): State<AuthConfig>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, impl IntoResponse> {
    if !auth_config.is_enabled() {
        return Ok(next.run(request).await);
    }

    let api_key = headers.get("X-API-Key").and_then(|v| v.to_str().ok());

    match api_key {
        Some(key) if auth_config.validate_key(key) => Ok(next.run(request).await),
        Some(_) => Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Invalid API key" })),
        )),
        None => Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Missing X-API-Key header" })),
        )),
    }
}
