use serde::Serialize;
use utoipa::ToSchema;

/// Payload of `GET /healthcheck`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok`, or `degraded` while the finished-race store is unreachable.
    pub status: &'static str,
}

impl HealthResponse {
    #[allow(missing_docs)]
    pub fn ok() -> Self {
        Self { status: "ok" }
    }

    /// Races keep running; finished races may fail to persist.
    pub fn degraded() -> Self {
        Self { status: "degraded" }
    }
}
