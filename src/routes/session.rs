use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::session::{CancelSessionRequest, SelectDeckRequest, SessionView},
    error::AppError,
    services::session_service,
    state::SharedState,
};

/// Session lifecycle endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/session", get(get_session))
        .route("/session/select", post(select_deck))
        .route("/session/cancel", post(cancel_session))
        .route("/session/results/dismiss", post(dismiss_results))
}

/// Current session read-model.
#[utoipa::path(
    get,
    path = "/session",
    tag = "session",
    responses((status = 200, description = "Current session", body = SessionView))
)]
pub async fn get_session(State(state): State<SharedState>) -> Json<SessionView> {
    let snapshot = session_service::snapshot(&state).await;
    Json(SessionView::from(&snapshot))
}

/// Bind a player to a deck and start a session.
#[utoipa::path(
    post,
    path = "/session/select",
    tag = "session",
    request_body = SelectDeckRequest,
    responses(
        (status = 200, description = "Session started", body = SessionView),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Unknown deck"),
        (status = 409, description = "A session is already running"),
        (status = 422, description = "Deck is disabled or has no cards"),
        (status = 503, description = "No headset connected for the player")
    )
)]
pub async fn select_deck(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<SelectDeckRequest>>,
) -> Result<Json<SessionView>, AppError> {
    let snapshot =
        session_service::select_deck(&state, payload.player_id, payload.deck_id).await?;
    Ok(Json(SessionView::from(&snapshot)))
}

/// Cancel the running session, discarding the card on screen.
#[utoipa::path(
    post,
    path = "/session/cancel",
    tag = "session",
    request_body = CancelSessionRequest,
    responses((status = 200, description = "Session state after the cancel request", body = SessionView))
)]
pub async fn cancel_session(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CancelSessionRequest>>,
) -> Result<Json<SessionView>, AppError> {
    let snapshot = session_service::cancel(&state, payload.player_id).await?;
    Ok(Json(SessionView::from(&snapshot)))
}

/// Hide the results view of the last session.
#[utoipa::path(
    post,
    path = "/session/results/dismiss",
    tag = "session",
    responses((status = 200, description = "Results dismissed", body = SessionView))
)]
pub async fn dismiss_results(
    State(state): State<SharedState>,
) -> Result<Json<SessionView>, AppError> {
    let snapshot = session_service::dismiss_results(&state).await?;
    Ok(Json(SessionView::from(&snapshot)))
}
