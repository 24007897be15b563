use axum::{extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;

use super::{bearer_token, AppError};

// ─── Domain types ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

// ─── POST /api/auth ──────────────────────────────────────────────

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    if req.name.is_empty() || req.email.is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest("name, email, and password are required".into()));
    }

    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        name: req.name,
        email: req.email,
        password: req.password,
    };
    state.store.users.lock().insert(user.email.clone(), user.clone());

    Ok(Json(AuthResponse {
        user,
        token: open_session(&state),
    }))
}

// ─── PUT /api/auth ───────────────────────────────────────────────

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = state
        .store
        .users
        .lock()
        .get(&req.email)
        .filter(|u| u.password == req.password)
        .cloned()
        .ok_or_else(|| AppError::NotFound("unknown user".into()))?;

    Ok(Json(AuthResponse {
        user,
        token: open_session(&state),
    }))
}

// ─── DELETE /api/auth ────────────────────────────────────────────

pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let token = bearer_token(&headers).ok_or(AppError::Unauthorized)?;
    if !state.store.sessions.lock().remove(token) {
        return Err(AppError::Unauthorized);
    }
    Ok(Json(serde_json::json!({ "message": "logout successful" })))
}

fn open_session(state: &AppState) -> String {
    let token = uuid::Uuid::new_v4().simple().to_string();
    state.store.sessions.lock().insert(token.clone());
    token
}
