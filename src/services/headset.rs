//! [`SensorHost`] backed by a headset connected over WebSocket.
//!
//! Volume commands are pushed to the headset; overlaps come back as inbound
//! messages and are routed to the callback registered for the volume.

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::{
    dto::ws::HeadsetCommand,
    engine::gesture::{BodyAnchor, OverlapCallback, SensorError, SensorHost, VolumeId, VolumeSpec},
    services::websocket_service::send_message_to_websocket,
};

struct RemoteVolume {
    name: String,
    callback: Option<OverlapCallback>,
}

/// Sensor host driving the volumes of one headset.
pub struct RemoteSensorHost {
    player_id: String,
    tx: mpsc::UnboundedSender<Message>,
    volumes: DashMap<VolumeId, RemoteVolume>,
}

impl RemoteSensorHost {
    /// Wrap the outbound channel of a headset connection.
    pub fn new(player_id: impl Into<String>, tx: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            player_id: player_id.into(),
            tx,
            volumes: DashMap::new(),
        }
    }

    /// Player wearing the headset.
    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    /// Route an overlap reported by the headset. Returns `false` for unknown volumes.
    pub fn dispatch_overlap(&self, volume_id: VolumeId, other: &str) -> bool {
        // Clone the callback out so the map shard is unlocked while it runs.
        let callback = match self.volumes.get(&volume_id) {
            Some(volume) => volume.callback.clone(),
            None => {
                trace!(player_id = %self.player_id, %volume_id, "overlap on unknown volume");
                return false;
            }
        };

        if let Some(callback) = callback {
            callback(other);
        }
        true
    }

    /// Forget every volume, used once the connection is gone.
    pub fn clear(&self) {
        self.volumes.clear();
    }

    /// Number of volumes currently spawned on the headset.
    pub fn volume_count(&self) -> usize {
        self.volumes.len()
    }

    fn send(&self, command: &HeadsetCommand) -> Result<(), SensorError> {
        send_message_to_websocket(&self.tx, command).map_err(|_| SensorError::Disconnected)
    }
}

impl SensorHost for RemoteSensorHost {
    fn create_volume(&self, spec: &VolumeSpec) -> Result<VolumeId, SensorError> {
        let volume_id = Uuid::new_v4();
        self.send(&HeadsetCommand::SpawnVolume {
            volume_id,
            volume: spec.clone(),
        })?;
        self.volumes.insert(
            volume_id,
            RemoteVolume {
                name: spec.name.clone(),
                callback: None,
            },
        );
        debug!(player_id = %self.player_id, %volume_id, volume = %spec.name, "volume spawned");
        Ok(volume_id)
    }

    fn attach(&self, volume: VolumeId, anchor: BodyAnchor) -> Result<(), SensorError> {
        if !self.volumes.contains_key(&volume) {
            return Err(SensorError::UnknownVolume(volume));
        }
        self.send(&HeadsetCommand::AttachVolume {
            volume_id: volume,
            anchor,
        })
    }

    fn detach(&self, volume: VolumeId) {
        if self.volumes.contains_key(&volume) {
            let _ = self.send(&HeadsetCommand::DetachVolume { volume_id: volume });
        }
    }

    fn on_overlap(&self, volume: VolumeId, callback: OverlapCallback) -> Result<(), SensorError> {
        let mut entry = self
            .volumes
            .get_mut(&volume)
            .ok_or(SensorError::UnknownVolume(volume))?;
        entry.callback = Some(callback);
        Ok(())
    }

    fn destroy(&self, volume: VolumeId) {
        if let Some((_, removed)) = self.volumes.remove(&volume) {
            let _ = self.send(&HeadsetCommand::DestroyVolume { volume_id: volume });
            debug!(player_id = %self.player_id, volume_id = %volume, volume = %removed.name, "volume destroyed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc, Mutex,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use super::*;
    use crate::engine::{
        GestureClassifier, Zone,
        gesture::{BOTTOM_VOLUME, FRONT_VOLUME},
    };

    fn command_types(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<String> {
        let mut types = Vec::new();
        while let Ok(Message::Text(text)) = rx.try_recv() {
            let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
            types.push(value["type"].as_str().unwrap_or_default().to_string());
        }
        types
    }

    #[test]
    fn classifier_drives_remote_volumes() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let host = Arc::new(RemoteSensorHost::new("p1", tx));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let mut classifier = GestureClassifier::new(host.clone(), Duration::from_secs(1));
        classifier
            .start_detection(move |zone| sink.lock().unwrap().push(zone))
            .unwrap();

        assert_eq!(host.volume_count(), 3);
        assert_eq!(
            command_types(&mut rx),
            vec![
                "spawn_volume",
                "attach_volume",
                "spawn_volume",
                "attach_volume",
                "spawn_volume",
                "attach_volume"
            ]
        );

        let bottom = host
            .volumes
            .iter()
            .find(|entry| entry.name == BOTTOM_VOLUME)
            .map(|entry| *entry.key())
            .unwrap();
        assert!(host.dispatch_overlap(bottom, FRONT_VOLUME));
        assert_eq!(*seen.lock().unwrap(), vec![Zone::Bottom]);

        classifier.stop_detection();
        assert_eq!(host.volume_count(), 0);
        let teardown = command_types(&mut rx);
        assert_eq!(teardown.len(), 6);
        assert_eq!(
            teardown.iter().filter(|kind| *kind == "destroy_volume").count(),
            3
        );
        assert!(!host.dispatch_overlap(bottom, FRONT_VOLUME));
    }

    #[test]
    fn closed_connection_reports_disconnected() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let host = RemoteSensorHost::new("p1", tx);

        let err = host.create_volume(&VolumeSpec::front()).unwrap_err();
        assert_eq!(err, SensorError::Disconnected);
        assert_eq!(host.volume_count(), 0);
    }

    #[test]
    fn overlap_without_callback_is_accepted_silently() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let host = RemoteSensorHost::new("p1", tx);
        let calls = Arc::new(AtomicUsize::new(0));

        let front = host.create_volume(&VolumeSpec::front()).unwrap();
        assert!(host.dispatch_overlap(front, BOTTOM_VOLUME));

        let counter = calls.clone();
        host.on_overlap(
            front,
            Arc::new(move |_: &str| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();
        host.dispatch_overlap(front, BOTTOM_VOLUME);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
