use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the race party lobby.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::ws::ClientIntent,
            crate::dto::ws::ServerMessage,
            crate::dto::ws::ChatKind,
            crate::dto::party::MemberDto,
            crate::dto::matches::MatchStateDto,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "lobby", description = "WebSocket lobby: sessions, parties, countdowns and matches"),
    )
)]
pub struct ApiDoc;
