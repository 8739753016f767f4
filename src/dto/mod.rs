use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod catalog;
pub mod collections;
pub mod common;
pub mod health;
pub mod messages;
pub mod pick;
pub mod pool;
pub mod rooms;
pub mod session;
pub mod sse;

/// Render a milliseconds-since-epoch stamp as RFC3339 for human-facing
/// payloads.
pub fn format_millis(millis: u64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000)
        .ok()
        .and_then(|ts| ts.format(&Rfc3339).ok())
        .unwrap_or_else(|| "invalid-timestamp".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_epoch_millis() {
        assert_eq!(format_millis(0), "1970-01-01T00:00:00Z");
    }
}
