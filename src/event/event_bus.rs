// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-process event bus for broadcasting envelopes and plugin lifecycle.

use tokio::sync::broadcast;

use crate::plugin::PluginMetadata;
use crate::state::StateSnapshot;

use super::{BusMessage, EventEnvelope, EventPublisher, PluginHost};

/// Default channel capacity for the event bus.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Event bus broadcasting [`BusMessage`]s to any number of listeners.
///
/// The bus is a [`PluginHost`], so it can be handed straight to a plugin
/// when no richer host is available.
///
/// # Capacity
///
/// The bus has a fixed capacity (default 256). A listener that falls behind
/// loses the oldest messages and receives `RecvError::Lagged`.
///
/// # Examples
///
/// ```
/// use evdev_relay::event::{EventBus, EventEnvelope, EventPublisher};
/// use serde_json::json;
///
/// let bus = EventBus::new();
/// let mut rx = bus.subscribe();
///
/// let envelope = EventEnvelope::new("tick", json!({})).unwrap();
/// bus.publish("default", envelope);
///
/// let message = rx.try_recv().unwrap();
/// assert_eq!(message.namespace(), "default");
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BusMessage>,
}

impl EventBus {
    /// Creates a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates a new event bus with the specified capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to bus messages published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.sender.subscribe()
    }

    /// Returns the number of active listeners.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Broadcasts a message and returns how many listeners received it.
    pub fn send(&self, message: BusMessage) -> usize {
        // No listeners is not an error for a bus.
        self.sender.send(message).unwrap_or(0)
    }

    /// Publishes an envelope and returns the number of listeners reached.
    #[must_use]
    pub fn publish_counted(&self, namespace: &str, envelope: EventEnvelope) -> usize {
        self.send(BusMessage::Event {
            namespace: namespace.to_string(),
            envelope,
        })
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher for EventBus {
    fn publish(&self, namespace: &str, envelope: EventEnvelope) {
        tracing::trace!(%namespace, event_type = envelope.event_type(), "Publishing event");
        self.send(BusMessage::Event {
            namespace: namespace.to_string(),
            envelope,
        });
    }
}

impl PluginHost for EventBus {
    fn notify_started(
        &self,
        name: &str,
        namespace: &str,
        metadata: PluginMetadata,
        state: StateSnapshot,
        initial: bool,
    ) {
        tracing::debug!(%name, %namespace, initial, "Plugin started");
        self.send(BusMessage::PluginStarted {
            name: name.to_string(),
            namespace: namespace.to_string(),
            metadata,
            state,
            initial,
        });
    }

    fn notify_stopped(&self, namespace: &str) {
        tracing::debug!(%namespace, "Plugin stopped");
        self.send(BusMessage::PluginStopped {
            namespace: namespace.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(n: u64) -> EventEnvelope {
        EventEnvelope::new("tick", json!({ "n": n })).unwrap()
    }

    #[test]
    fn new_bus_has_no_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn drop_subscriber_decrements_count() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        drop(rx);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn publish_delivers_to_multiple_subscribers() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish("default", envelope(1));

        let m1 = rx1.recv().await.unwrap();
        let m2 = rx2.recv().await.unwrap();
        assert_eq!(m1, m2);
        assert_eq!(m1.envelope(), Some(&envelope(1)));
    }

    #[tokio::test]
    async fn publish_preserves_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        for n in 0..10 {
            bus.publish("default", envelope(n));
        }
        for n in 0..10 {
            let message = rx.recv().await.unwrap();
            assert_eq!(message.envelope(), Some(&envelope(n)));
        }
    }

    #[test]
    fn publish_counted_without_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.publish_counted("default", envelope(0)), 0);
    }

    #[test]
    fn clone_shares_same_channel() {
        let bus1 = EventBus::new();
        let bus2 = bus1.clone();
        let _rx = bus1.subscribe();
        assert_eq!(bus2.subscriber_count(), 1);
    }

    #[test]
    fn notify_stopped_is_broadcast() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.notify_stopped("evdev");
        assert_eq!(
            rx.try_recv().unwrap(),
            BusMessage::PluginStopped {
                namespace: "evdev".to_string()
            }
        );
    }
}
