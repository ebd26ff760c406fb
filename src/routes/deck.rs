use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::deck::{DeckSummary, FlipDeckRequest},
    error::AppError,
    services::deck_service,
    state::SharedState,
};

/// Deck picker endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/decks", get(list_decks))
        .route("/decks/{id}/flip", post(flip_deck))
}

/// List every loaded deck in catalog order.
#[utoipa::path(
    get,
    path = "/decks",
    tag = "decks",
    responses((status = 200, description = "Loaded decks", body = [DeckSummary]))
)]
pub async fn list_decks(State(state): State<SharedState>) -> Json<Vec<DeckSummary>> {
    Json(deck_service::list_decks(&state).await)
}

/// Flip a deck up or down on the picker.
#[utoipa::path(
    post,
    path = "/decks/{id}/flip",
    tag = "decks",
    params(("id" = String, Path, description = "Identifier of the deck to flip")),
    request_body = FlipDeckRequest,
    responses(
        (status = 200, description = "Deck flipped", body = DeckSummary),
        (status = 404, description = "Unknown deck")
    )
)]
pub async fn flip_deck(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Valid(Json(payload)): Valid<Json<FlipDeckRequest>>,
) -> Result<Json<DeckSummary>, AppError> {
    Ok(Json(
        deck_service::flip_deck(&state, &id, payload.flipped).await?,
    ))
}
