use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the persistence gateway and report `ok` or `degraded`.
///
/// Races keep running while the gateway is down; only finished-race storage is affected.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.store().health_check().await {
        Ok(()) => HealthResponse::ok(),
        Err(err) => {
            warn!(error = %err, "storage health check failed");
            HealthResponse::degraded()
        }
    }
}
