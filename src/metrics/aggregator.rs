use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::warn;

use super::line_protocol::{MetricBuilder, MetricValue};
use super::system::SystemSampler;
use super::{HttpVerb, OrderOutcome, RequestOutcome, RouteClass};

// ─── Configuration ───────────────────────────────────────────────

/// Measurement prefixes, one per section of the batch.
const HTTP_PREFIX: &str = "http";
const SYSTEM_PREFIX: &str = "system";
const USER_PREFIX: &str = "user";
const PURCHASE_PREFIX: &str = "purchase";
const AUTH_PREFIX: &str = "auth";

// ─── Public types ────────────────────────────────────────────────

/// Process-wide telemetry state.
///
/// The instrumentation hook calls `record_request()`, the scheduler
/// calls the `*_metrics()` renderers once per tick. Every entry point
/// takes the lock exactly once, so a tick sees a request either fully
/// applied or not at all.
pub struct MetricAggregator {
    inner: Mutex<Inner>,
    sampler: SystemSampler,
}

/// Non-destructive view for `GET /api/metrics`. Reading it does not
/// clear any latency window.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AggregatorSnapshot {
    pub total_requests: u64,
    pub get_requests: u64,
    pub put_requests: u64,
    pub post_requests: u64,
    pub delete_requests: u64,
    pub total_latency_ms: u64,
    pub pending_latencies: usize,

    pub auth_attempts: u64,
    pub auth_successes: u64,
    pub auth_failures: u64,
    pub active_users: i64,

    pub pizzas_sold: u64,
    pub revenue: f64,
    pub creation_failures: u64,
    pub pending_creation_latencies: usize,
}

// ─── Internal state ──────────────────────────────────────────────

struct Inner {
    // Cumulative counters
    total_requests: u64,
    get_requests: u64,
    put_requests: u64,
    post_requests: u64,
    delete_requests: u64,
    total_latency_ms: u64,

    auth_attempts: u64,
    auth_successes: u64,
    auth_failures: u64,

    pizzas_sold: u64,
    revenue: f64,
    creation_failures: u64,

    // Gauge. Goes negative on a logout with no matching login.
    active_users: i64,

    // Per-tick windows, drained by the renderers
    latencies: Vec<u64>,
    creation_latencies: Vec<u64>,
    pizzas_since_tick: u64,
    revenue_since_tick: f64,
    last_purchase_tick: Instant,
}

// ─── MetricAggregator impl ───────────────────────────────────────

impl MetricAggregator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
            sampler: SystemSampler::new(),
        }
    }

    // ── Mutation entry points ───────────────────────────────────

    /// Fold one completed request into the counters.
    pub fn record_request(&self, outcome: &RequestOutcome) {
        self.inner.lock().record_request(outcome);
    }

    /// Record one pizza from an order. Failed creations count toward
    /// sales and revenue but not toward creation latency.
    pub fn record_sale(&self, price: f64, creation_latency_ms: u64, success: bool) {
        self.inner.lock().record_sale(price, creation_latency_ms, success);
    }

    pub fn record_auth_attempt(&self, success: bool) {
        self.inner.lock().record_auth_attempt(success);
    }

    // ── Renderers (called once per tick, in order) ──────────────

    /// Request totals plus the latency average for this window.
    /// Clears the latency window, not the totals.
    pub fn http_metrics(&self, buf: &mut MetricBuilder) {
        let mut inner = self.inner.lock();

        // Cumulative sum over this window's sample count.
        let average = MetricValue::ratio(
            inner.total_latency_ms as f64,
            inner.latencies.len() as f64,
        );

        emit(buf, HTTP_PREFIX, "request_total", MetricValue::Count(inner.total_requests), &[]);
        emit(
            buf,
            HTTP_PREFIX,
            "request_total",
            MetricValue::Count(inner.get_requests),
            &[("method", "GET")],
        );
        emit(
            buf,
            HTTP_PREFIX,
            "request_total",
            MetricValue::Count(inner.post_requests),
            &[("method", "POST")],
        );
        emit(
            buf,
            HTTP_PREFIX,
            "request_total",
            MetricValue::Count(inner.delete_requests),
            &[("method", "DELETE")],
        );
        emit(buf, HTTP_PREFIX, "request_latency_average", average, &[]);

        inner.latencies.clear();
    }

    /// Instantaneous CPU and memory utilisation.
    pub fn system_metrics(&self, buf: &mut MetricBuilder) {
        let sample = self.sampler.sample();
        emit(buf, SYSTEM_PREFIX, "cpu_usage_percentage", sample.cpu_percentage(), &[]);
        emit(buf, SYSTEM_PREFIX, "memory_usage_percentage", sample.memory_percentage(), &[]);
    }

    pub fn user_metrics(&self, buf: &mut MetricBuilder) {
        let active = self.inner.lock().active_users;
        emit(buf, USER_PREFIX, "active_users_total", MetricValue::Gauge(active), &[]);
    }

    /// Sales totals, per-minute rates and creation latency for this
    /// window. Clears the creation-latency window and the rate counters.
    pub fn purchase_metrics(&self, buf: &mut MetricBuilder) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let minutes = now.duration_since(inner.last_purchase_tick).as_secs_f64() / 60.0;

        let creation_average = MetricValue::ratio(
            inner.creation_latencies.iter().sum::<u64>() as f64,
            inner.creation_latencies.len() as f64,
        );

        emit(buf, PURCHASE_PREFIX, "pizzas_sold_total", MetricValue::Count(inner.pizzas_sold), &[]);
        emit(
            buf,
            PURCHASE_PREFIX,
            "pizzas_sold_minute",
            MetricValue::ratio(inner.pizzas_since_tick as f64, minutes),
            &[],
        );
        emit(buf, PURCHASE_PREFIX, "revenue_total", MetricValue::Sum(inner.revenue), &[]);
        emit(
            buf,
            PURCHASE_PREFIX,
            "revenue_minute",
            MetricValue::ratio(inner.revenue_since_tick, minutes),
            &[],
        );
        emit(buf, PURCHASE_PREFIX, "creation_latency_average", creation_average, &[]);
        emit(
            buf,
            PURCHASE_PREFIX,
            "creation_failures_total",
            MetricValue::Count(inner.creation_failures),
            &[],
        );

        inner.creation_latencies.clear();
        inner.pizzas_since_tick = 0;
        inner.revenue_since_tick = 0.0;
        inner.last_purchase_tick = now;
    }

    pub fn auth_metrics(&self, buf: &mut MetricBuilder) {
        let inner = self.inner.lock();
        emit(buf, AUTH_PREFIX, "auth_attempts_total", MetricValue::Count(inner.auth_attempts), &[]);
        emit(
            buf,
            AUTH_PREFIX,
            "auth_attempts_successful",
            MetricValue::Count(inner.auth_successes),
            &[],
        );
        emit(buf, AUTH_PREFIX, "auth_attempts_failed", MetricValue::Count(inner.auth_failures), &[]);
    }

    /// Read-only copy of the current state.
    pub fn snapshot(&self) -> AggregatorSnapshot {
        self.inner.lock().snapshot()
    }

    /// Creation latencies recorded since the last `purchase_metrics` call.
    pub fn pending_creation_latencies(&self) -> Vec<u64> {
        self.inner.lock().creation_latencies.clone()
    }
}

impl Default for MetricAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Append one record; a record the encoder refuses is logged and
/// dropped so the rest of the batch still goes out.
fn emit(
    buf: &mut MetricBuilder,
    prefix: &str,
    name: &str,
    value: MetricValue,
    labels: &[(&str, &str)],
) {
    if let Err(e) = buf.add_metric(prefix, name, value, labels) {
        warn!(error = %e, prefix, name, "dropping metric record");
    }
}

// ─── Inner impl ──────────────────────────────────────────────────

impl Inner {
    fn new() -> Self {
        Self {
            total_requests: 0,
            get_requests: 0,
            put_requests: 0,
            post_requests: 0,
            delete_requests: 0,
            total_latency_ms: 0,
            auth_attempts: 0,
            auth_successes: 0,
            auth_failures: 0,
            pizzas_sold: 0,
            revenue: 0.0,
            creation_failures: 0,
            active_users: 0,
            latencies: Vec::with_capacity(1024),
            creation_latencies: Vec::with_capacity(256),
            pizzas_since_tick: 0,
            revenue_since_tick: 0.0,
            last_purchase_tick: Instant::now(),
        }
    }

    fn record_request(&mut self, outcome: &RequestOutcome) {
        // ── Counters ────────────────────────────────────────────
        self.total_requests += 1;
        match outcome.verb {
            HttpVerb::Get => self.get_requests += 1,
            HttpVerb::Put => self.put_requests += 1,
            HttpVerb::Post => self.post_requests += 1,
            HttpVerb::Delete => self.delete_requests += 1,
            HttpVerb::Other => {}
        }

        // ── Latency ─────────────────────────────────────────────
        self.total_latency_ms += outcome.elapsed_ms;
        self.latencies.push(outcome.elapsed_ms);

        // ── Route-specific effects ──────────────────────────────
        match outcome.route {
            RouteClass::Auth => {
                let success = outcome.is_success();
                self.record_auth_attempt(success);
                match (outcome.verb, success) {
                    (HttpVerb::Put, true) => self.active_users += 1,
                    (HttpVerb::Delete, true) => self.active_users -= 1,
                    _ => {}
                }
            }
            RouteClass::Order if outcome.verb == HttpVerb::Post => {
                if let Some(order) = &outcome.order {
                    self.record_order(order);
                }
            }
            RouteClass::Order | RouteClass::Other => {}
        }
    }

    fn record_order(&mut self, order: &OrderOutcome) {
        for &price in &order.item_prices {
            self.record_sale(price, order.elapsed_ms, order.success);
        }
    }

    fn record_sale(&mut self, price: f64, creation_latency_ms: u64, success: bool) {
        self.pizzas_sold += 1;
        self.revenue += price;
        self.pizzas_since_tick += 1;
        self.revenue_since_tick += price;
        if success {
            self.creation_latencies.push(creation_latency_ms);
        } else {
            self.creation_failures += 1;
        }
    }

    fn record_auth_attempt(&mut self, success: bool) {
        self.auth_attempts += 1;
        if success {
            self.auth_successes += 1;
        } else {
            self.auth_failures += 1;
        }
    }

    fn snapshot(&self) -> AggregatorSnapshot {
        AggregatorSnapshot {
            total_requests: self.total_requests,
            get_requests: self.get_requests,
            put_requests: self.put_requests,
            post_requests: self.post_requests,
            delete_requests: self.delete_requests,
            total_latency_ms: self.total_latency_ms,
            pending_latencies: self.latencies.len(),
            auth_attempts: self.auth_attempts,
            auth_successes: self.auth_successes,
            auth_failures: self.auth_failures,
            active_users: self.active_users,
            pizzas_sold: self.pizzas_sold,
            revenue: self.revenue,
            creation_failures: self.creation_failures,
            pending_creation_latencies: self.creation_latencies.len(),
        }
    }
}
