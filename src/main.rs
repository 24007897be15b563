use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use pizza_telemetry::config::Config;
use pizza_telemetry::metrics::{MetricAggregator, PublicationScheduler, RemotePublisher};
use pizza_telemetry::{server, AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pizza_telemetry=debug".into()),
        )
        .init();

    // ── 1. Load config ───────────────────────────────────────────
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    // ── 2. Build shared state ────────────────────────────────────
    let metrics = Arc::new(MetricAggregator::new());
    let state = Arc::new(AppState::new(metrics.clone()));

    // ── 3. Start metrics publication ─────────────────────────────
    let publisher = match RemotePublisher::new(&config.metrics) {
        Ok(p) => Arc::new(p),
        Err(e) => {
            error!(error = %e, "cannot build metrics publisher");
            std::process::exit(1);
        }
    };
    info!(url = publisher.url(), source = %config.metrics.source, "pushing metrics");
    let scheduler = PublicationScheduler::new(
        metrics,
        publisher,
        config.metrics.source.clone(),
        Duration::from_millis(config.metrics.period_ms),
    )
    .spawn();

    // ── 4. Build Axum router ─────────────────────────────────────
    let app = server::create_router(state);

    // ── 5. Bind & serve ──────────────────────────────────────────
    let listener = match tokio::net::TcpListener::bind(&config.server.bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(addr = %config.server.bind_addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };
    info!(addr = %config.server.bind_addr, "server listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await;

    // A pending tick never holds the process open.
    scheduler.abort();
    info!("metrics publication stopped");

    if let Err(e) = served {
        error!(error = %e, "server exited with error");
        std::process::exit(1);
    }
}
