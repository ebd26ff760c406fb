use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::{
    dto::{
        session::SessionView,
        sse::{Handshake, ServerEvent},
    },
    state::SharedState,
};

pub(crate) const EVENT_HANDSHAKE: &str = "handshake";

/// Subscribe to the public SSE stream and build the handshake for the new client.
///
/// The handshake is captured after subscribing so the client cannot miss an
/// update published in between.
pub async fn subscribe_public(
    state: &SharedState,
) -> (broadcast::Receiver<ServerEvent>, Option<ServerEvent>) {
    let receiver = state.public_sse().subscribe();
    let snapshot = state.snapshot().await;
    let handshake = Handshake {
        stream: "public".into(),
        message: "public stream connected".into(),
        session: SessionView::from(&snapshot),
    };

    match ServerEvent::json(Some(EVENT_HANDSHAKE.to_string()), &handshake) {
        Ok(event) => (receiver, Some(event)),
        Err(err) => {
            warn!(error = %err, "failed to serialize SSE handshake");
            (receiver, None)
        }
    }
}

/// Convert a broadcast receiver into an SSE response, forwarding events until
/// the client disconnects. `first` is delivered to this client only.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    first: Option<ServerEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        if let Some(first) = first
            && tx.send(Ok(to_event(first))).await.is_err()
        {
            return;
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            // Skip lagged messages but keep the stream alive.
                            debug!(skipped, "SSE subscriber lagged");
                            continue;
                        }
                    }
                }
            }
        }

        info!("Public SSE stream disconnected");
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        state::{AppState, DeckCatalog},
    };

    #[tokio::test]
    async fn handshake_carries_the_current_session() {
        let state = AppState::new(AppConfig::default(), DeckCatalog::default());

        let (_receiver, handshake) = subscribe_public(&state).await;

        let handshake = handshake.unwrap();
        assert_eq!(handshake.event.as_deref(), Some(EVENT_HANDSHAKE));
        let payload: serde_json::Value = serde_json::from_str(&handshake.data).unwrap();
        assert_eq!(payload["stream"], "public");
        assert_eq!(payload["session"]["phase"], "waiting");
        assert_eq!(payload["session"]["version"], 0);
    }

    #[tokio::test]
    async fn subscription_is_registered_before_the_handshake() {
        let state = AppState::new(AppConfig::default(), DeckCatalog::default());
        let (mut receiver, _) = subscribe_public(&state).await;

        state
            .public_sse()
            .broadcast(ServerEvent::json(Some("ping".to_string()), &1).unwrap());

        assert_eq!(receiver.recv().await.unwrap().event.as_deref(), Some("ping"));
    }
}
