use tracing::info;

use crate::{
    dto::deck::DeckSummary,
    error::ServiceError,
    services::sse_events,
    state::SharedState,
};

/// Every deck of the catalog, in load order.
pub async fn list_decks(state: &SharedState) -> Vec<DeckSummary> {
    state
        .catalog()
        .read()
        .await
        .decks()
        .map(DeckSummary::from)
        .collect()
}

/// Flip a deck up or down on the picker and broadcast the change.
///
/// Flipping a deck up flips every other deck down; the deck it replaces is
/// broadcast first.
pub async fn flip_deck(
    state: &SharedState,
    deck_id: &str,
    flipped: bool,
) -> Result<DeckSummary, ServiceError> {
    let (summary, replaced) = {
        let mut catalog = state.catalog().write().await;
        let previous = catalog
            .flipped()
            .map(|deck| deck.id.clone())
            .filter(|previous| flipped && previous != deck_id);
        let summary = DeckSummary::from(catalog.set_flipped(deck_id, flipped)?);
        let replaced = previous
            .and_then(|previous| catalog.get(&previous))
            .map(DeckSummary::from);
        (summary, replaced)
    };

    if let Some(replaced) = replaced {
        info!(deck_id = %replaced.id, "deck flipped back");
        sse_events::broadcast_deck_flipped(state, replaced);
    }
    info!(deck_id, flipped, "deck flipped");
    sse_events::broadcast_deck_flipped(state, summary.clone());
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        services::sse_events::EVENT_DECK_FLIPPED,
        state::{
            AppState, DeckCatalog,
            session::{Card, Deck},
        },
    };

    fn deck(id: &str) -> Deck {
        Deck {
            id: id.into(),
            name: id.to_uppercase(),
            description: String::new(),
            play_instructions: String::new(),
            cards: vec![Card::text(0, "x")],
            enabled: true,
            flipped: false,
        }
    }

    #[tokio::test]
    async fn flipping_is_exclusive_and_broadcast() {
        let state = AppState::new(
            AppConfig::default(),
            DeckCatalog::new([deck("a"), deck("b")]),
        );
        let mut events = state.public_sse().subscribe();

        flip_deck(&state, "a", true).await.unwrap();
        let summary = flip_deck(&state, "b", true).await.unwrap();
        assert!(summary.flipped);

        let decks = list_decks(&state).await;
        let flipped: Vec<_> = decks
            .iter()
            .filter(|deck| deck.flipped)
            .map(|deck| deck.id.as_str())
            .collect();
        assert_eq!(flipped, vec!["b"]);

        let flips: Vec<(String, bool)> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|event| {
                assert_eq!(event.event.as_deref(), Some(EVENT_DECK_FLIPPED));
                let payload: serde_json::Value = serde_json::from_str(&event.data).unwrap();
                (
                    payload["id"].as_str().unwrap().to_string(),
                    payload["flipped"].as_bool().unwrap(),
                )
            })
            .collect();
        assert_eq!(
            flips,
            vec![
                ("a".to_string(), true),
                ("a".to_string(), false),
                ("b".to_string(), true)
            ]
        );
    }

    #[tokio::test]
    async fn reflipping_the_same_deck_broadcasts_once() {
        let state = AppState::new(AppConfig::default(), DeckCatalog::new([deck("a")]));
        flip_deck(&state, "a", true).await.unwrap();
        let mut events = state.public_sse().subscribe();

        flip_deck(&state, "a", true).await.unwrap();

        assert!(events.try_recv().is_ok());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn flipping_unknown_deck_is_not_found() {
        let state = AppState::new(AppConfig::default(), DeckCatalog::default());
        let err = flip_deck(&state, "ghost", true).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
