use std::{sync::Arc, time::Duration};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};

use crate::{
    dto::{
        validation::validate_player_id,
        ws::{HeadsetAck, HeadsetInboundMessage},
    },
    engine::SensorHost,
    services::{headset::RemoteSensorHost, session_service},
    state::SharedState,
};

const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// The writer side of a headset connection is gone.
#[derive(Debug, Error)]
#[error("connection closed")]
pub struct ConnectionClosed;

/// Handle the full lifecycle for an individual headset WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("websocket identification timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let player_id = match identify(&initial_message) {
        Ok(player_id) => player_id,
        Err(reason) => {
            warn!(%reason, "rejecting headset connection");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let host = Arc::new(RemoteSensorHost::new(player_id.clone(), outbound_tx.clone()));
    let registered: Arc<dyn SensorHost> = host.clone();
    if state
        .sensor_hosts()
        .insert(player_id.clone(), registered)
        .is_some()
    {
        warn!(%player_id, "headset reconnected; replacing previous connection");
    }
    info!(%player_id, "headset connected");

    let ack = HeadsetAck {
        player_id: player_id.clone(),
        status: "connected".into(),
    };
    if send_message_to_websocket(&outbound_tx, &ack).is_err() {
        info!(%player_id, "connection closed during acknowledgement, terminating");
        unregister(&state, &host);
        finalize(writer_task, outbound_tx).await;
        return;
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<HeadsetInboundMessage>(&text) {
                Ok(HeadsetInboundMessage::Overlap { volume_id, other }) => {
                    if !host.dispatch_overlap(volume_id, &other) {
                        warn!(%player_id, %volume_id, "overlap reported for an unknown volume");
                    }
                }
                Ok(HeadsetInboundMessage::Identification { .. }) => {
                    warn!(%player_id, "ignoring duplicate identification message");
                }
                Ok(HeadsetInboundMessage::Unknown) => {
                    warn!(%player_id, payload = %text, "ignoring unsupported headset message");
                }
                Err(err) => {
                    warn!(%player_id, error = %err, "failed to parse headset message");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(%player_id, "headset closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(%player_id, error = %err, "websocket error");
                break;
            }
        }
    }

    unregister(&state, &host);
    info!(%player_id, "headset disconnected");

    // A session cannot be played without its sensors unless the headset already reconnected.
    if state.sensor_host(&player_id).is_none()
        && let Err(err) = session_service::cancel(&state, Some(player_id.clone())).await
    {
        warn!(%player_id, error = %err, "failed to cancel the session of a disconnected headset");
    }

    finalize(writer_task, outbound_tx).await;
}

/// Extract and validate the player id announced by the first frame.
fn identify(text: &str) -> Result<String, String> {
    let message = serde_json::from_str::<HeadsetInboundMessage>(text)
        .map_err(|err| format!("invalid message: {err}"))?;
    let player_id = message
        .identification_player_id()
        .ok_or_else(|| "first message was not identification".to_string())?;
    validate_player_id(player_id).map_err(|err| err.to_string())?;
    Ok(player_id.to_string())
}

/// Remove the host from the registry unless a newer connection replaced it.
fn unregister(state: &SharedState, host: &Arc<RemoteSensorHost>) {
    let registered: Arc<dyn SensorHost> = host.clone();
    state
        .sensor_hosts()
        .remove_if(host.player_id(), |_, current| Arc::ptr_eq(current, &registered));
    host.clear();
}

/// Serialize a payload and push it onto the provided WebSocket sender.
///
/// Serialization failures are logged and swallowed; a closed writer is reported.
pub(crate) fn send_message_to_websocket<T>(
    tx: &mpsc::UnboundedSender<Message>,
    value: &T,
) -> Result<(), ConnectionClosed>
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(p) => p,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| ConnectionClosed)
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
