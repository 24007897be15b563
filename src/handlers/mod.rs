pub mod auth;
pub mod order;

use axum::{
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

// ─── In-memory store ─────────────────────────────────────────────

/// Users and live sessions for the demo service. Lost on restart.
#[derive(Default)]
pub struct Store {
    /// email → user
    pub users: Mutex<HashMap<String, auth::User>>,
    /// Bearer tokens of logged-in users.
    pub sessions: Mutex<HashSet<String>>,
}

/// Pull the bearer token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

// ─── Unified error type ──────────────────────────────────────────

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Unauthorized,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".into()),
        };

        let body = serde_json::json!({
            "message": message,
            "status":  status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}
