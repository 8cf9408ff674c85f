//! Broadcast event bus for distributing `WorkflowEvent` to subscribers.
//!
//! Built on `tokio::sync::broadcast`. Publishing with no active
//! subscribers is a no-op, so the engine never blocks on observers.

use siteflow_types::event::WorkflowEvent;
use tokio::sync::broadcast;

/// Multi-consumer event bus for workflow lifecycle events.
///
/// Wraps a `tokio::sync::broadcast` channel. Cloning the bus clones the
/// sender, allowing multiple producers and consumers.
pub struct EventBus {
    sender: broadcast::Sender<WorkflowEvent>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a new subscriber that will receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no subscribers, the event is silently dropped.
    pub fn publish(&self, event: WorkflowEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn publish_and_subscribe_delivers_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(WorkflowEvent::InstanceCompleted {
            workflow_id: Uuid::now_v7(),
        });

        let received = rx.recv().await.unwrap();
        assert!(matches!(received, WorkflowEvent::InstanceCompleted { .. }));
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_noop() {
        let bus = EventBus::new(16);
        bus.publish(WorkflowEvent::InstanceCompleted {
            workflow_id: Uuid::now_v7(),
        });
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive_event() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(WorkflowEvent::InstanceCancelled {
            workflow_id: Uuid::now_v7(),
        });

        assert!(matches!(
            rx1.recv().await.unwrap(),
            WorkflowEvent::InstanceCancelled { .. }
        ));
        assert!(matches!(
            rx2.recv().await.unwrap(),
            WorkflowEvent::InstanceCancelled { .. }
        ));
    }
}
