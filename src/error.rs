use reqwest::StatusCode;
use thiserror::Error;

// ─── Encoder ─────────────────────────────────────────────────────

/// Why a single record was rejected by `MetricBuilder::add_metric`.
///
/// The line protocol does no escaping, so anything carrying a reserved
/// character would corrupt the record (and the one after it).
#[derive(Debug, Error, PartialEq)]
pub enum EncodeError {
    #[error("{field} {value:?} contains a reserved line-protocol character")]
    ReservedCharacter { field: &'static str, value: String },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("metric {name:?} has a non-finite value")]
    NonFinite { name: String },
}

// ─── Publication ─────────────────────────────────────────────────

/// Everything that can go wrong between a tick and the backend.
/// None of these ever leave the scheduler task.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("telemetry backend answered {status}")]
    Delivery { status: StatusCode },

    #[error("telemetry transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("batch contains no records")]
    EmptyBatch,
}

// ─── Configuration ───────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("environment variable {var} is not a valid value: {value:?}")]
    Env { var: &'static str, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}
