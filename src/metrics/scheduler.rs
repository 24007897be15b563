use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, info};

use super::aggregator::MetricAggregator;
use super::line_protocol::{MetricBuilder, PublicationBatch};
use super::publisher::Publisher;
use crate::error::TelemetryError;

/// Default publication cadence.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(10_000);

/// Drains the aggregator into a batch every `period` and hands it to
/// the publisher without waiting for the push to finish.
///
/// Runs as a plain tokio task: it holds no guard and is dropped with
/// the runtime, so a pending tick never delays shutdown.
pub struct PublicationScheduler<P> {
    aggregator: Arc<MetricAggregator>,
    publisher: Arc<P>,
    source: String,
    period: Duration,
}

impl<P: Publisher> PublicationScheduler<P> {
    pub fn new(
        aggregator: Arc<MetricAggregator>,
        publisher: Arc<P>,
        source: impl Into<String>,
        period: Duration,
    ) -> Self {
        Self {
            aggregator,
            publisher,
            source: source.into(),
            period,
        }
    }

    /// Snapshot every section, in the fixed publication order.
    pub fn build_batch(&self) -> Result<PublicationBatch, TelemetryError> {
        let mut buf = MetricBuilder::new(self.source.as_str());
        self.aggregator.http_metrics(&mut buf);
        self.aggregator.system_metrics(&mut buf);
        self.aggregator.user_metrics(&mut buf);
        self.aggregator.purchase_metrics(&mut buf);
        self.aggregator.auth_metrics(&mut buf);

        if buf.is_empty() {
            return Err(TelemetryError::EmptyBatch);
        }
        Ok(buf.into_batch())
    }

    /// One tick: build the batch and fire it off. The push runs on its
    /// own task and its outcome is only logged.
    pub fn tick(&self) -> Result<JoinHandle<()>, TelemetryError> {
        let batch = self.build_batch()?;
        let publisher = self.publisher.clone();

        Ok(tokio::spawn(async move {
            if let Err(e) = publisher.publish(batch).await {
                report(&e);
            }
        }))
    }

    /// Start ticking. The first tick fires one full period from now.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self) {
        let mut interval = tokio::time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = IntervalStream::new(interval);

        info!(period_ms = self.period.as_millis() as u64, "metrics publication started");

        while ticks.next().await.is_some() {
            match self.tick() {
                Ok(_) => debug!("metrics batch dispatched"),
                Err(e) => error!(error = %e, "error building metrics batch"),
            }
        }
    }
}

fn report(err: &TelemetryError) {
    match err {
        TelemetryError::Delivery { status } => {
            error!(%status, "failed to push metrics data");
        }
        other => error!(error = %other, "error pushing metrics"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{HttpVerb, RequestOutcome, RouteClass};
    use parking_lot::Mutex;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Keeps every batch it is given; fails the first `fail_first` calls.
    #[derive(Default)]
    struct RecordingPublisher {
        batches: Mutex<Vec<String>>,
        calls: AtomicUsize,
        fail_first: usize,
    }

    impl Publisher for RecordingPublisher {
        async fn publish(&self, batch: PublicationBatch) -> Result<(), TelemetryError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.batches.lock().push(batch.into_body());
            if call < self.fail_first {
                return Err(TelemetryError::Delivery {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                });
            }
            Ok(())
        }
    }

    fn get(elapsed_ms: u64) -> RequestOutcome {
        RequestOutcome {
            verb: HttpVerb::Get,
            route: RouteClass::Other,
            status: 200,
            elapsed_ms,
            order: None,
        }
    }

    fn scheduler(
        publisher: Arc<RecordingPublisher>,
        period: Duration,
    ) -> (Arc<MetricAggregator>, PublicationScheduler<RecordingPublisher>) {
        let aggregator = Arc::new(MetricAggregator::new());
        let sched = PublicationScheduler::new(aggregator.clone(), publisher, "pizza-test", period);
        (aggregator, sched)
    }

    fn metric_names(batch: &str) -> Vec<String> {
        batch
            .lines()
            .filter_map(|l| l.split(' ').nth(1))
            .filter_map(|kv| kv.split('=').next())
            .map(str::to_owned)
            .collect()
    }

    #[tokio::test]
    async fn batch_sections_come_out_in_fixed_order() {
        let (aggregator, sched) = scheduler(Arc::default(), DEFAULT_PERIOD);
        aggregator.record_request(&get(100));

        let batch = sched.build_batch().unwrap();
        assert_eq!(batch.records(), 17);
        assert_eq!(
            metric_names(batch.body()),
            vec![
                "request_total",
                "request_total",
                "request_total",
                "request_total",
                "request_latency_average",
                "cpu_usage_percentage",
                "memory_usage_percentage",
                "active_users_total",
                "pizzas_sold_total",
                "pizzas_sold_minute",
                "revenue_total",
                "revenue_minute",
                "creation_latency_average",
                "creation_failures_total",
                "auth_attempts_total",
                "auth_attempts_successful",
                "auth_attempts_failed",
            ]
        );
        assert!(batch
            .body()
            .lines()
            .all(|l| l.contains(",source=pizza-test")));
    }

    #[tokio::test]
    async fn tick_hands_batch_to_publisher() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (aggregator, sched) = scheduler(publisher.clone(), DEFAULT_PERIOD);
        aggregator.record_request(&get(100));
        aggregator.record_request(&get(300));

        sched.tick().unwrap().await.unwrap();

        let batches = publisher.batches.lock();
        assert_eq!(batches.len(), 1);
        assert!(batches[0].contains("http,source=pizza-test request_latency_average=200.00"));
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_fire_on_the_configured_period() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (_aggregator, sched) = scheduler(publisher.clone(), Duration::from_millis(100));
        let handle = sched.spawn();

        // Nothing fires before the first full period.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 3);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_push_does_not_stop_next_tick_or_touch_counters() {
        let publisher = Arc::new(RecordingPublisher {
            fail_first: 1,
            ..Default::default()
        });
        let (aggregator, sched) = scheduler(publisher.clone(), Duration::from_millis(100));
        aggregator.record_request(&get(10));
        aggregator.record_sale(10.0, 50, true);
        let handle = sched.spawn();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 1);
        let after_failure = aggregator.snapshot();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 2);

        let after_next = aggregator.snapshot();
        assert_eq!(after_failure.total_requests, 1);
        assert_eq!(after_next.total_requests, 1);
        assert_eq!(after_next.pizzas_sold, 1);
        assert_eq!(after_next.revenue, 10.0);

        // Second batch still reports totals, but the windows were drained.
        let batches = publisher.batches.lock();
        assert!(batches[1].contains("http,source=pizza-test request_total=1"));
        assert!(batches[1].contains("request_latency_average=0\n"));
        assert!(batches[1].contains("creation_latency_average=0\n"));
        drop(batches);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn aborting_the_task_stops_ticks() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (_aggregator, sched) = scheduler(publisher.clone(), Duration::from_millis(100));
        let handle = sched.spawn();

        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.abort();
        let _ = handle.await;

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 1);
    }
}
