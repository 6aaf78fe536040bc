use beacon_protocol::{BackendEvent, RawEvent};
use tokio::sync::broadcast;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Broadcast channel the backend publishes its events on.
///
/// Every topic shares the one channel; receivers see events in publish order.
#[derive(Debug, Clone)]
pub struct BackendBus {
    sender: broadcast::Sender<RawEvent>,
}

impl BackendBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: RawEvent) {
        if let Err(e) = self.sender.send(event) {
            tracing::warn!(
                "Failed to publish backend event (no subscribers?): {}",
                e.0.topic
            );
        }
    }

    /// Encode and publish a decoded event.
    pub fn emit(&self, event: &BackendEvent) {
        self.publish(event.to_raw());
    }

    #[allow(clippy::result_large_err)]
    pub fn try_publish(&self, event: RawEvent) -> Result<usize, broadcast::error::SendError<RawEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RawEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BackendBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_protocol::topics;
    use serde_json::json;

    #[tokio::test]
    async fn test_backend_bus_basic() {
        let bus = BackendBus::new();
        let mut rx = bus.subscribe();

        bus.publish(RawEvent::new(
            topics::LOADING,
            json!({"threadId": "t1", "loading": true}),
        ));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.topic, topics::LOADING);
        assert_eq!(event.payload["threadId"], "t1");
    }

    #[tokio::test]
    async fn test_backend_bus_multiple_subscribers() {
        let bus = BackendBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(&BackendEvent::LegacyLoading { loading: false });

        let event1 = rx1.recv().await.unwrap();
        let event2 = rx2.recv().await.unwrap();
        assert_eq!(event1, event2);
        assert_eq!(event1.payload, json!(false));

        drop(rx1);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_dropped() {
        let bus = BackendBus::new();
        bus.publish(RawEvent::new(topics::ERROR, json!({})));
        assert!(bus
            .try_publish(RawEvent::new(topics::ERROR, json!({})))
            .is_err());
    }

    #[tokio::test]
    async fn test_lagged_receiver_reports_missed_events() {
        let bus = BackendBus::with_capacity(2);
        let mut rx = bus.subscribe();

        for i in 0..5 {
            bus.publish(RawEvent::new(topics::PROGRESS, json!({"step": i})));
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
        assert_eq!(rx.recv().await.unwrap().payload["step"], 3);
    }
}
