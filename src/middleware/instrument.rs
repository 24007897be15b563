use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tokio_stream::StreamExt;
use tracing::warn;

use crate::metrics::{
    HttpVerb, MetricAggregator, OrderOutcome, RequestOutcome, RouteClass, SUCCESS_STATUS,
};

/// Largest order body we buffer to read the items list. Bigger bodies
/// still reach the handler in full; they just skip sale records.
const MAX_ORDER_BODY: usize = 256 * 1024;

/// Just enough of an order payload to price its line items.
#[derive(Debug, Deserialize)]
struct OrderPayload {
    items: Vec<PricedItem>,
}

#[derive(Debug, Deserialize)]
struct PricedItem {
    price: f64,
}

/// Request-tracking hook, installed once around the whole router:
///
///   .layer(axum_mw::from_fn_with_state(metrics, track_requests))
///
/// Starts the clock before the handler runs and records the outcome
/// once the response is ready. Nothing here can fail the request:
/// an unreadable order body only drops that order's sale records.
pub async fn track_requests(
    State(metrics): State<Arc<MetricAggregator>>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();

    let verb = HttpVerb::from(req.method());
    let route = RouteClass::classify(req.uri().path());

    // ── Order bodies are read here, then handed on untouched ────
    let (req, items) = if route == RouteClass::Order && req.method() == Method::POST {
        let (parts, body) = req.into_parts();
        let (body, items) = buffer_order_body(body).await;
        (Request::from_parts(parts, body), items)
    } else {
        (req, None)
    };

    let response = next.run(req).await;

    let elapsed_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    let order = match (verb, route) {
        (HttpVerb::Post, RouteClass::Order) => match items {
            Some(item_prices) => Some(OrderOutcome {
                item_prices,
                elapsed_ms,
                success: status == SUCCESS_STATUS,
            }),
            None => {
                warn!(status, "order completed without a readable items list; skipping sales");
                None
            }
        },
        _ => None,
    };

    metrics.record_request(&RequestOutcome {
        verb,
        route,
        status,
        elapsed_ms,
        order,
    });

    response
}

/// Read an order body chunk by chunk, with or without a length header.
///
/// Returns the body to hand on plus the item prices when the whole
/// body fit in `MAX_ORDER_BODY`. On overflow the bytes already read are
/// stitched back in front of the rest of the stream; on a read error
/// they are followed by that same error, so the handler's extractor
/// sees exactly what it would have without the hook.
async fn buffer_order_body(body: Body) -> (Body, Option<Vec<f64>>) {
    let mut stream = body.into_data_stream();
    let mut buf = Vec::new();

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) if buf.len() + chunk.len() <= MAX_ORDER_BODY => {
                buf.extend_from_slice(&chunk);
            }
            Ok(chunk) => {
                warn!(limit = MAX_ORDER_BODY, "order body too large to read for metrics");
                let head = tokio_stream::iter([Ok::<_, axum::Error>(Bytes::from(buf)), Ok(chunk)]);
                return (Body::from_stream(head.chain(stream)), None);
            }
            Err(e) => {
                warn!(error = %e, "cannot buffer order body for metrics");
                let head = tokio_stream::iter([Ok(Bytes::from(buf)), Err(e)]);
                return (Body::from_stream(head), None);
            }
        }
    }

    let bytes = Bytes::from(buf);
    let items = item_prices(&bytes);
    (Body::from(bytes), items)
}

/// Unit prices from an order body, or `None` if it has no items list.
fn item_prices(bytes: &[u8]) -> Option<Vec<f64>> {
    serde_json::from_slice::<OrderPayload>(bytes)
        .ok()
        .map(|p| p.items.into_iter().map(|i| i.price).collect())
}
