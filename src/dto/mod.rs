use std::time::SystemTime;

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Health check payload.
pub mod health;
/// HTTP views of live races.
pub mod race;
/// Custom validators for client payloads.
pub mod validation;
/// WebSocket commands and server messages.
pub mod ws;

/// Timestamps reach clients as RFC 3339 strings.
fn rfc3339(at: SystemTime) -> String {
    OffsetDateTime::from(at)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
