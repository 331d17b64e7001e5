//! Header-token sessions.
//!
//! Tokens live in an in-process map; a missing or stale token yields the
//! editorial UI's conventional 440 so it knows to re-login.

use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use dashmap::DashMap;

use crate::error::{ApiError, ErrorResponse};

pub const SESSION_HEADER: &str = "x-session-token";

/// token -> user id
pub type Sessions = Arc<DashMap<String, String>>;

pub fn issue(sessions: &Sessions, user_id: &str) -> String {
    let token = uuid::Uuid::new_v4().simple().to_string();
    sessions.insert(token.clone(), user_id.to_string());
    token
}

pub fn revoke(sessions: &Sessions, headers: &HeaderMap) {
    if let Some(token) = header_token(headers) {
        sessions.remove(token);
    }
}

/// Gate for mutating endpoints. Returns the logged-in user id.
pub fn require_session(sessions: &Sessions, headers: &HeaderMap) -> Result<String, ApiError> {
    header_token(headers)
        .and_then(|token| sessions.get(token).map(|entry| entry.value().clone()))
        .ok_or_else(session_expired)
}

fn header_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn session_expired() -> ApiError {
    let status = StatusCode::from_u16(440).unwrap_or(StatusCode::UNAUTHORIZED);
    (
        status,
        Json(ErrorResponse { error: "session missing or expired".to_string(), code: 440 }),
    )
}
