use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the heads-up backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::deck::list_decks,
        crate::routes::deck::flip_deck,
        crate::routes::session::get_session,
        crate::routes::session::select_deck,
        crate::routes::session::cancel_session,
        crate::routes::session::dismiss_results,
        crate::routes::sse::public_stream,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::deck::CardDto,
            crate::dto::deck::CardKindDto,
            crate::dto::deck::DeckSummary,
            crate::dto::deck::FlipDeckRequest,
            crate::dto::session::SessionPhaseDto,
            crate::dto::session::PlayedCardDto,
            crate::dto::session::SessionView,
            crate::dto::session::SelectDeckRequest,
            crate::dto::session::CancelSessionRequest,
            crate::dto::sse::Handshake,
            crate::dto::sse::SessionUpdatedEvent,
            crate::dto::sse::ReadyTickEvent,
            crate::dto::sse::PlayTickEvent,
            crate::dto::sse::FinalSecondsEvent,
            crate::dto::sse::CardRevealedEvent,
            crate::dto::sse::AnswerFeedbackEvent,
            crate::dto::sse::TimeUpEvent,
            crate::dto::sse::SessionEndedEvent,
            crate::dto::sse::SessionCancelledEvent,
            crate::dto::sse::SessionFailedEvent,
            crate::dto::sse::DeckFlippedEvent,
            crate::dto::ws::HeadsetInboundMessage,
            crate::dto::ws::HeadsetAck,
            crate::dto::ws::HeadsetCommand,
            crate::engine::Zone,
            crate::engine::gesture::VolumeSpec,
            crate::engine::gesture::Vec3,
            crate::engine::gesture::BodyAnchor,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "decks", description = "Deck picker"),
        (name = "session", description = "Session lifecycle"),
        (name = "sse", description = "Server-sent events stream"),
        (name = "headsets", description = "WebSocket operations for headsets"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/healthcheck",
            "/decks",
            "/decks/{id}/flip",
            "/session",
            "/session/select",
            "/session/cancel",
            "/session/results/dismiss",
            "/sse",
            "/ws",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
