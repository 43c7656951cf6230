use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    http::HeaderMap,
    response::IntoResponse,
    routing::get,
};

use crate::{
    error::AppError,
    services::websocket_service,
    state::{SharedState, connections::Identity},
};

/// Header carrying the authenticated user name, set by the fronting proxy.
pub const USER_HEADER: &str = "x-racing-user";
/// Header flagging staff members.
pub const ADMIN_HEADER: &str = "x-racing-admin";
/// Header flagging users barred from commenting.
pub const SQUELCHED_HEADER: &str = "x-racing-squelched";

#[utoipa::path(
    get,
    path = "/ws",
    tag = "websocket",
    params(
        ("x-racing-user" = String, Header, description = "Authenticated user name"),
        ("x-racing-admin" = Option<bool>, Header, description = "Staff flag"),
        ("x-racing-squelched" = Option<bool>, Header, description = "Comment ban flag"),
    ),
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 401, description = "Missing identity")
    )
)]
/// Upgrade an authenticated HTTP connection into a lobby WebSocket session.
pub async fn ws_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let identity = identity_from_headers(&headers)?;
    Ok(ws.on_upgrade(move |socket| websocket_service::handle_socket(state, identity, socket)))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws", get(ws_handler))
}

fn identity_from_headers(headers: &HeaderMap) -> Result<Identity, AppError> {
    let name = headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AppError::Unauthorized(format!("missing `{USER_HEADER}` header")))?;

    Ok(Identity {
        admin: flag(headers, ADMIN_HEADER),
        squelched: flag(headers, SQUELCHED_HEADER),
        ..Identity::new(name)
    })
}

fn flag(headers: &HeaderMap, header: &str) -> bool {
    headers
        .get(header)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| matches!(value.trim(), "1" | "true"))
}
