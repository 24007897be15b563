use std::fmt;

use crate::error::EncodeError;

// ─── Configuration ───────────────────────────────────────────────

/// Characters that delimit the parts of a record. Nothing is escaped,
/// so none of these may appear inside a prefix, name, or label.
pub(crate) const RESERVED: &[char] = &[',', '=', ' ', '\t', '\n', '\r'];

/// Separator used when a batch is rendered for the wire.
pub const DEFAULT_SEPARATOR: &str = "\n";

// ─── Values ──────────────────────────────────────────────────────

/// The right-hand side of `name=value`.
///
/// Each variant carries its own formatting rule, so a record never
/// decides at render time how a number should look.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    /// Monotonic counter, rendered as a plain integer.
    Count(u64),
    /// Signed gauge, rendered as a plain integer (may be negative).
    Gauge(i64),
    /// Running sum, rendered in its natural float form (`15`, `15.5`).
    Sum(f64),
    /// Average / percentage, rendered with exactly two fractional digits.
    Fixed(f64),
}

impl MetricValue {
    /// `numerator / denominator` with two decimals, or the literal `0`
    /// when there is nothing to divide by.
    pub fn ratio(numerator: f64, denominator: f64) -> Self {
        if denominator == 0.0 {
            Self::Count(0)
        } else {
            Self::Fixed(numerator / denominator)
        }
    }

    fn is_finite(&self) -> bool {
        match self {
            Self::Sum(v) | Self::Fixed(v) => v.is_finite(),
            Self::Count(_) | Self::Gauge(_) => true,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(v) => write!(f, "{v}"),
            Self::Gauge(v) => write!(f, "{v}"),
            Self::Sum(v) => write!(f, "{v}"),
            Self::Fixed(v) => write!(f, "{v:.2}"),
        }
    }
}

// ─── Builder ─────────────────────────────────────────────────────

/// Accumulates line-protocol records for one publication batch:
///
///   prefix,source=<tag>[,k1=v1,...] name=value
///
/// Records are appended and never touched again until `clear()`.
#[derive(Debug, Clone)]
pub struct MetricBuilder {
    source: String,
    records: Vec<String>,
}

impl MetricBuilder {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            records: Vec::with_capacity(32),
        }
    }

    /// Encode and append one record. On error nothing is appended and
    /// the records already in the builder are untouched.
    pub fn add_metric(
        &mut self,
        prefix: &str,
        name: &str,
        value: MetricValue,
        labels: &[(&str, &str)],
    ) -> Result<(), EncodeError> {
        check("prefix", prefix)?;
        check("metric name", name)?;
        check("source tag", &self.source)?;
        for (key, val) in labels {
            check("label key", key)?;
            check("label value", val)?;
        }
        if !value.is_finite() {
            return Err(EncodeError::NonFinite { name: name.to_owned() });
        }

        let mut record = format!("{prefix},source={}", self.source);
        for (key, val) in labels {
            record.push(',');
            record.push_str(key);
            record.push('=');
            record.push_str(val);
        }
        record.push(' ');
        record.push_str(name);
        record.push('=');
        record.push_str(&value.to_string());

        self.records.push(record);
        Ok(())
    }

    /// Join every record with `separator`.
    pub fn render(&self, separator: &str) -> String {
        self.records.join(separator)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Freeze the builder into a wire-ready batch.
    pub fn into_batch(self) -> PublicationBatch {
        PublicationBatch {
            body: self.render(DEFAULT_SEPARATOR),
            records: self.records.len(),
        }
    }
}

fn check(field: &'static str, value: &str) -> Result<(), EncodeError> {
    if value.is_empty() {
        return Err(EncodeError::Empty { field });
    }
    if value.contains(RESERVED) {
        return Err(EncodeError::ReservedCharacter {
            field,
            value: value.to_owned(),
        });
    }
    Ok(())
}

// ─── Batch ───────────────────────────────────────────────────────

/// One tick's worth of encoded records. Moved into the publisher and
/// consumed there; never retried.
#[derive(Debug, Clone, PartialEq)]
pub struct PublicationBatch {
    body: String,
    records: usize,
}

impl PublicationBatch {
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn records(&self) -> usize {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    pub fn into_body(self) -> String {
        self.body
    }
}
