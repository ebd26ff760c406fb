use axum::Router;

use crate::state::SharedState;

pub mod deck;
pub mod docs;
pub mod health;
pub mod session;
pub mod sse;
pub mod websocket;

/// Compose all route trees and bind the shared state.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(deck::router())
        .merge(session::router())
        .merge(sse::router())
        .merge(websocket::router())
        .merge(docs::router());

    api_router.with_state(state)
}
