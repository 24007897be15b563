//! Request instrumentation and periodic line-protocol publication for
//! the pizza service.
//!
//! The pieces, leaves first:
//!
//!   metrics::line_protocol  `MetricBuilder` record encoder
//!   metrics::system         host CPU / memory sampler
//!   metrics::aggregator     shared counters, snapshot-and-reset renderers
//!   middleware::instrument  per-request hook feeding the aggregator
//!   metrics::scheduler      recurring tick that drains into a batch
//!   metrics::publisher      best-effort HTTP push of that batch

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod server;

use std::sync::Arc;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Central metrics engine: the hook pushes outcomes, the scheduler drains.
    pub metrics: Arc<metrics::MetricAggregator>,

    /// Demo users and sessions behind the auth and order routes.
    pub store: handlers::Store,
}

impl AppState {
    pub fn new(metrics: Arc<metrics::MetricAggregator>) -> Self {
        Self {
            metrics,
            store: handlers::Store::default(),
        }
    }
}
