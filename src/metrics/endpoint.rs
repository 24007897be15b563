use axum::{extract::State, Json};
use std::sync::Arc;

use super::aggregator::AggregatorSnapshot;
use crate::AppState;

// ─── GET /api/metrics ────────────────────────────────────────────
/// Returns the live counters as JSON, useful for curl / debugging.
/// Does not drain the latency windows the scheduler publishes from.

pub async fn get_metrics(
    State(state): State<Arc<AppState>>,
) -> Json<AggregatorSnapshot> {
    Json(state.metrics.snapshot())
}
