use tokio::sync::broadcast;

use crate::dto::sse::ServerEvent;

/// Broadcast hub fanning session notifications out to every SSE subscriber.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_broadcasts() {
        let hub = SseHub::new(4);
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();

        hub.broadcast(ServerEvent::json(Some("ping".to_string()), &1).unwrap());

        assert_eq!(first.recv().await.unwrap().event.as_deref(), Some("ping"));
        assert_eq!(second.recv().await.unwrap().data, "1");
    }

    #[test]
    fn broadcasting_without_subscribers_is_silent() {
        let hub = SseHub::new(1);
        hub.broadcast(ServerEvent::json(None::<String>, &"nobody").unwrap());
    }
}
