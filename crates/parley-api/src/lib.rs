pub mod auth;
pub mod error;
pub mod extract;
pub mod groups;
pub mod messages;
pub mod middleware;
pub mod pipeline;
pub mod reactions;
pub mod toxicity;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;
pub use pipeline::{MessagePipeline, NewMessage, PipelineError};

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use tracing::warn;

/// Timestamp format written by this crate: RFC 3339, microseconds, `Z`.
pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite defaults are "YYYY-MM-DD HH:MM:SS" without timezone.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}
