use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the race lobby.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::races::list_races,
        crate::routes::races::get_race,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::race::RaceSummary,
            crate::dto::race::RacerSummary,
            crate::dto::race::ItemSummary,
            crate::dto::race::RaceListResponse,
            crate::dto::race::RaceDetailResponse,
            crate::dto::ws::ClientCommand,
            crate::dto::ws::ServerMessage,
            crate::state::ruleset::Ruleset,
            crate::state::ruleset::RulesetUpdate,
            crate::state::rooms::RoomMember,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "races", description = "Read-only views of live races"),
        (name = "websocket", description = "Lobby and race commands over WebSocket"),
    )
)]
pub struct ApiDoc;
