// Public error taxonomy — the boundary between internal plumbing (anyhow)
// and typed, caller-facing error kinds.
//
// Internal modules (db::queries, db::schema) keep using anyhow::Result, the
// way the teacher's persistence layer does. Everything the engines expose
// to callers returns AnalyticsError instead, so a caller can match on kind
// rather than parse a message.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// The window or baseline lacks the minimum observations for any claim.
    /// This is only raised for hard failures; soft shortfalls are reported
    /// as `insufficient_data` entries in a result, never as this variant.
    #[error("insufficient data: {reason}")]
    InsufficientData { reason: String },

    /// A snapshot would introduce a negative counter.
    #[error("invalid metrics: {field} would be negative ({value})")]
    InvalidMetrics { field: String, value: i64 },

    /// `w_end <= w_start`, or the window ends in the future.
    #[error("invalid window [{start}, {end}): {reason}")]
    WindowInvalid {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        reason: String,
    },

    /// Analysis exceeded the soft deadline.
    #[error("window too wide: analysis exceeded {deadline_secs}s deadline")]
    WindowTooWide { deadline_secs: u64 },

    /// The underlying persistence layer failed.
    #[error("persistence unavailable: {0}")]
    PersistenceUnavailable(String),
}

impl From<anyhow::Error> for AnalyticsError {
    fn from(err: anyhow::Error) -> Self {
        AnalyticsError::PersistenceUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anyhow_error_collapses_to_persistence_unavailable() {
        let underlying = anyhow::anyhow!("disk full");
        let err: AnalyticsError = underlying.into();
        assert!(matches!(err, AnalyticsError::PersistenceUnavailable(_)));
        assert!(err.to_string().contains("disk full"));
    }
}
