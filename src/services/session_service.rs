use tracing::info;

use crate::{
    error::ServiceError,
    services::{gameplay, sse_events},
    state::{SessionAction, SharedState, Snapshot, state_machine::Outcome},
};

/// Bind `player_id` to `deck_id` and start the session loop.
///
/// The deck must have a playable pile and the player's headset must be
/// connected; both are checked before any state changes.
pub async fn select_deck(
    state: &SharedState,
    player_id: String,
    deck_id: String,
) -> Result<Snapshot, ServiceError> {
    let cards = state.catalog().read().await.playable_pile(&deck_id)?;
    let host = state.sensor_host(&player_id).ok_or_else(|| {
        ServiceError::SensorUnavailable(format!("no headset connected for player `{player_id}`"))
    })?;

    let mut slot = state.runtime().lock().await;
    state
        .store()
        .dispatch(SessionAction::Select {
            player_id: player_id.clone(),
            deck_id: deck_id.clone(),
        })
        .await?;

    if let Some(stale) = slot.take() {
        stale.teardown();
    }
    info!(%player_id, %deck_id, cards = cards.len(), "deck selected");
    *slot = Some(gameplay::spawn(
        state.clone(),
        player_id,
        deck_id,
        cards,
        host,
    ));
    drop(slot);

    Ok(state.snapshot().await)
}

/// Abort the running session. A pending card is discarded, not archived.
///
/// With a `player_id`, only the bound player may cancel; a mismatch leaves the
/// session untouched. Cancelling while nothing runs does nothing.
pub async fn cancel(
    state: &SharedState,
    player_id: Option<String>,
) -> Result<Snapshot, ServiceError> {
    let mut slot = state.runtime().lock().await;
    let runtime = slot.clone();

    let transition = state
        .store()
        .dispatch_then(
            SessionAction::Cancel {
                player_id: player_id.clone(),
            },
            |_| {
                if let Some(runtime) = runtime.as_ref() {
                    runtime.release();
                }
            },
        )
        .await?;

    match transition.outcome {
        Outcome::Applied => {
            if let Some(runtime) = slot.take() {
                runtime.teardown();
            }
            info!(player_id = ?player_id, "session cancelled");
            sse_events::broadcast_session_cancelled(state, player_id);
        }
        Outcome::Ignored(reason) => {
            info!(player_id = ?player_id, ?reason, "cancel ignored");
        }
    }
    drop(slot);

    Ok(state.snapshot().await)
}

/// Hide the results view shown after a session ended.
pub async fn dismiss_results(state: &SharedState) -> Result<Snapshot, ServiceError> {
    state
        .store()
        .dispatch(SessionAction::SetDisplayResults(false))
        .await?;
    Ok(state.snapshot().await)
}

/// Current session state.
pub async fn snapshot(state: &SharedState) -> Snapshot {
    state.snapshot().await
}
