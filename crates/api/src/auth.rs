//! Caregiver login and API key middleware.
//!
//! When an API key is configured every route except `/health` and `/login`
//! requires `Authorization: Bearer <key>`.

use crate::AppState;
use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::warn;

const EXEMPT_PATHS: [&str; 2] = ["/health", "/login"];

/// Byte comparison whose running time does not depend on where inputs differ.
fn constant_time_eq(expected: &[u8], provided: &[u8]) -> bool {
    if expected.len() != provided.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (a, b) in expected.iter().zip(provided.iter()) {
        diff |= a ^ b;
    }
    diff == 0
}

/// Expected bearer token.
#[derive(Debug, Clone)]
pub struct ApiKeyConfig {
    key_bytes: Vec<u8>,
}

impl ApiKeyConfig {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key_bytes: key.into().into_bytes(),
        }
    }

    fn verify(&self, provided: &[u8]) -> bool {
        constant_time_eq(&self.key_bytes, provided)
    }
}

/// The caregiver account accepted by `/login`.
#[derive(Debug, Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn verify(&self, username: &str, password: &str) -> bool {
        // Evaluate both so a wrong username costs the same as a wrong password.
        let user_ok = constant_time_eq(self.username.as_bytes(), username.as_bytes());
        let pass_ok = constant_time_eq(self.password.as_bytes(), password.as_bytes());
        user_ok & pass_ok
    }
}

#[derive(Debug, serde::Serialize)]
struct AuthError {
    error: String,
    code: &'static str,
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Reject requests without the configured bearer token.
///
/// A no-op when no API key is configured.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(api_key) = state.api_key.as_ref() else {
        return next.run(request).await;
    };

    if EXEMPT_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    match extract_bearer_token(request.headers()) {
        Some(token) if api_key.verify(token.as_bytes()) => next.run(request).await,
        Some(_) => {
            warn!(path = %request.uri().path(), "Invalid API key provided");
            (
                StatusCode::UNAUTHORIZED,
                Json(AuthError {
                    error: "Invalid API key".into(),
                    code: "INVALID_API_KEY",
                }),
            )
                .into_response()
        }
        None => {
            warn!(path = %request.uri().path(), "Missing Authorization header");
            (
                StatusCode::UNAUTHORIZED,
                Json(AuthError {
                    error: "Missing or invalid Authorization header. Use: Authorization: Bearer <key>"
                        .into(),
                    code: "MISSING_API_KEY",
                }),
            )
                .into_response()
        }
    }
}
