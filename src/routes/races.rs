use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::{
    dto::race::{RaceDetailResponse, RaceListResponse},
    error::AppError,
    services::public_service,
    state::{SharedState, race::RaceId},
};

/// Read-only views of the live race registry.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/races", get(list_races))
        .route("/races/{id}", get(get_race))
}

#[utoipa::path(
    get,
    path = "/races",
    tag = "races",
    responses((status = 200, description = "Live races", body = RaceListResponse))
)]
/// Return every live race.
pub async fn list_races(State(state): State<SharedState>) -> Json<RaceListResponse> {
    Json(public_service::list_races(&state).await)
}

#[utoipa::path(
    get,
    path = "/races/{id}",
    tag = "races",
    params(("id" = u64, Path, description = "Race identifier")),
    responses(
        (status = 200, description = "Race with racer progress", body = RaceDetailResponse),
        (status = 404, description = "No live race with this identifier")
    )
)]
/// Return one live race with its racers.
pub async fn get_race(
    State(state): State<SharedState>,
    Path(id): Path<RaceId>,
) -> Result<Json<RaceDetailResponse>, AppError> {
    let payload = public_service::get_race(&state, id).await?;
    Ok(Json(payload))
}
