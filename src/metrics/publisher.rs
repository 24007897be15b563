use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tracing::debug;

use super::line_protocol::PublicationBatch;
use crate::config::MetricsConfig;
use crate::error::{ConfigError, TelemetryError};

/// Where a finished batch goes. One call per tick, no retries: the
/// batch is consumed whether or not it arrives.
pub trait Publisher: Send + Sync + 'static {
    fn publish(
        &self,
        batch: PublicationBatch,
    ) -> impl Future<Output = Result<(), TelemetryError>> + Send;
}

/// Pushes line-protocol batches to the telemetry backend over HTTP,
/// authenticating with `Authorization: Bearer <user_id>:<api_key>`.
pub struct RemotePublisher {
    client: reqwest::Client,
    url: String,
}

impl RemotePublisher {
    pub fn new(config: &MetricsConfig) -> Result<Self, ConfigError> {
        let mut auth = HeaderValue::from_str(&format!(
            "Bearer {}:{}",
            config.user_id, config.api_key
        ))
        .map_err(|_| {
            ConfigError::Invalid("metrics credentials contain invalid header characters".into())
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("cannot build metrics client: {e}")))?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Publisher for RemotePublisher {
    async fn publish(&self, batch: PublicationBatch) -> Result<(), TelemetryError> {
        if batch.is_empty() {
            return Err(TelemetryError::EmptyBatch);
        }
        let records = batch.records();
        let body = batch.into_body();
        let bytes = body.len();

        let response = self.client.post(self.url.as_str()).body(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelemetryError::Delivery { status });
        }

        debug!(records, bytes, "pushed metrics");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MetricBuilder, MetricValue};
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(url: String) -> MetricsConfig {
        MetricsConfig {
            url,
            source: "pizza-test".into(),
            user_id: "1234".into(),
            api_key: "secret".into(),
            period_ms: 10_000,
            timeout_ms: 2_000,
        }
    }

    fn batch() -> PublicationBatch {
        let mut buf = MetricBuilder::new("pizza-test");
        buf.add_metric("http", "request_total", MetricValue::Count(3), &[])
            .unwrap();
        buf.add_metric("user", "active_users_total", MetricValue::Gauge(-1), &[])
            .unwrap();
        buf.into_batch()
    }

    #[tokio::test]
    async fn posts_batch_with_bearer_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/push/influx/write"))
            .and(header("authorization", "Bearer 1234:secret"))
            .and(body_string(
                "http,source=pizza-test request_total=3\nuser,source=pizza-test active_users_total=-1",
            ))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let publisher =
            RemotePublisher::new(&config(format!("{}/api/v1/push/influx/write", server.uri())))
                .unwrap();
        publisher.publish(batch()).await.unwrap();
    }

    #[tokio::test]
    async fn non_success_status_is_a_delivery_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let publisher = RemotePublisher::new(&config(server.uri())).unwrap();
        let err = publisher.publish(batch()).await.unwrap_err();
        assert!(matches!(
            err,
            TelemetryError::Delivery { status } if status == reqwest::StatusCode::UNAUTHORIZED
        ));
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_transport_error() {
        // Bind then drop to get a port nobody is listening on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let publisher = RemotePublisher::new(&config(format!("http://127.0.0.1:{port}/push"))).unwrap();

        let err = publisher.publish(batch()).await.unwrap_err();
        assert!(matches!(err, TelemetryError::Transport(_)));
    }

    #[tokio::test]
    async fn empty_batch_is_not_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let publisher = RemotePublisher::new(&config(server.uri())).unwrap();
        let err = publisher
            .publish(MetricBuilder::new("pizza-test").into_batch())
            .await
            .unwrap_err();
        assert!(matches!(err, TelemetryError::EmptyBatch));
    }

    #[test]
    fn rejects_credentials_that_cannot_be_a_header() {
        let mut cfg = config("http://localhost/push".into());
        cfg.api_key = "bad\nkey".into();
        assert!(RemotePublisher::new(&cfg).is_err());
    }
}
