use axum::Router;

use crate::state::SharedState;

pub mod docs;
pub mod health;
pub mod races;
pub mod websocket;

/// Compose every route tree and attach the shared state.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(races::router())
        .merge(websocket::router())
        .merge(docs::router())
        .with_state(state)
}
