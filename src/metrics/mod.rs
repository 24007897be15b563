pub mod aggregator;
pub mod endpoint;
pub mod line_protocol;
pub mod publisher;
pub mod scheduler;
pub mod system;

pub use aggregator::{AggregatorSnapshot, MetricAggregator};
pub use line_protocol::{MetricBuilder, MetricValue, PublicationBatch};
pub use publisher::{Publisher, RemotePublisher};
pub use scheduler::PublicationScheduler;
pub use system::{SystemSample, SystemSampler};

use axum::http::Method;

/// Status code that counts as success for auth and order outcomes.
pub const SUCCESS_STATUS: u16 = 200;

/// The HTTP verbs that get their own counter. Everything else only
/// bumps the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVerb {
    Get,
    Put,
    Post,
    Delete,
    Other,
}

impl From<&Method> for HttpVerb {
    fn from(method: &Method) -> Self {
        match *method {
            Method::GET => Self::Get,
            Method::PUT => Self::Put,
            Method::POST => Self::Post,
            Method::DELETE => Self::Delete,
            _ => Self::Other,
        }
    }
}

/// Which business endpoint a request hit, decided once per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Auth,
    Order,
    Other,
}

impl RouteClass {
    /// Substring match on the path: `/api/auth` and anything under
    /// `/api/order` (menu included).
    pub fn classify(path: &str) -> Self {
        if path.contains("/auth") {
            Self::Auth
        } else if path.contains("/order") {
            Self::Order
        } else {
            Self::Other
        }
    }
}

/// One completed order, as seen by the hook. The "write" side for sales.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderOutcome {
    /// Unit price of every line item, in order.
    pub item_prices: Vec<f64>,
    pub elapsed_ms: u64,
    pub success: bool,
}

/// One completed request/response cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOutcome {
    pub verb: HttpVerb,
    pub route: RouteClass,
    pub status: u16,
    pub elapsed_ms: u64,
    /// Present only for a `POST` to the order endpoint whose body
    /// carried a readable items list.
    pub order: Option<OrderOutcome>,
}

impl RequestOutcome {
    pub fn is_success(&self) -> bool {
        self.status == SUCCESS_STATUS
    }
}
