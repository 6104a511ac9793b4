pub mod auth;
pub mod committee;
pub mod dashboard;
pub mod error;
pub mod middleware;
pub mod transactions;

/// Parse a stored timestamp into UTC, tolerating both RFC 3339 and the bare
/// `YYYY-MM-DD HH:MM:SS` form SQLite's `datetime('now')` produces.
pub(crate) fn parse_db_timestamp(raw: &str, what: &str, id: &str) -> chrono::DateTime<chrono::Utc> {
    raw.parse::<chrono::DateTime<chrono::Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::warn!("Corrupt created_at '{}' on {} '{}': {}", raw, what, id, e);
            chrono::DateTime::default()
        })
}
