use axum::{extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;

use super::{bearer_token, AppError};

// ─── Domain types ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: u32,
    pub title: &'static str,
    pub description: &'static str,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub menu_id: u32,
    pub description: String,
    pub price: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub franchise_id: u32,
    pub store_id: u32,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub franchise_id: u32,
    pub store_id: u32,
    pub items: Vec<OrderItem>,
    pub date: chrono::DateTime<chrono::Utc>,
}

static MENU: &[MenuItem] = &[
    MenuItem { id: 1, title: "Veggie", description: "A garden of delight", price: 0.0038 },
    MenuItem { id: 2, title: "Pepperoni", description: "Spicy treat", price: 0.0042 },
    MenuItem { id: 3, title: "Margarita", description: "Essential classic", price: 0.0042 },
    MenuItem { id: 4, title: "Crusty", description: "A dry mouthed favorite", price: 0.0028 },
];

// ─── GET /api/order/menu ─────────────────────────────────────────

pub async fn get_menu() -> Json<&'static [MenuItem]> {
    Json(MENU)
}

// ─── POST /api/order ─────────────────────────────────────────────

pub async fn create_order(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    let token = bearer_token(&headers).ok_or(AppError::Unauthorized)?;
    if !state.store.sessions.lock().contains(token) {
        return Err(AppError::Unauthorized);
    }
    if req.items.is_empty() {
        return Err(AppError::BadRequest("order must contain at least one item".into()));
    }

    Ok(Json(Order {
        id: uuid::Uuid::new_v4().to_string(),
        franchise_id: req.franchise_id,
        store_id: req.store_id,
        items: req.items,
        date: chrono::Utc::now(),
    }))
}
