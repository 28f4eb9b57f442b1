// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Messages carried by the in-process [`EventBus`](super::EventBus).

use crate::plugin::PluginMetadata;
use crate::state::StateSnapshot;

use super::EventEnvelope;

/// A message broadcast on the bus.
///
/// # Examples
///
/// ```
/// use evdev_relay::event::{BusMessage, EventEnvelope};
///
/// let envelope = EventEnvelope::state_changed("e1", "OFF".into(), "ON".into());
/// let message = BusMessage::Event {
///     namespace: "default".to_string(),
///     envelope,
/// };
/// assert_eq!(message.namespace(), "default");
/// assert!(message.envelope().is_some());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum BusMessage {
    /// An event published into a namespace.
    Event {
        /// Target namespace.
        namespace: String,
        /// The published envelope.
        envelope: EventEnvelope,
    },

    /// A plugin announced itself as started.
    PluginStarted {
        /// Plugin name.
        name: String,
        /// Namespace served by the plugin.
        namespace: String,
        /// Plugin metadata at announcement time.
        metadata: PluginMetadata,
        /// State table snapshot at announcement time.
        state: StateSnapshot,
        /// `true` for the startup handshake, `false` for a reconnect.
        initial: bool,
    },

    /// A plugin announced that its namespace is unavailable.
    PluginStopped {
        /// Namespace no longer served.
        namespace: String,
    },
}

impl BusMessage {
    /// Returns the namespace this message concerns.
    #[must_use]
    pub fn namespace(&self) -> &str {
        match self {
            Self::Event { namespace, .. }
            | Self::PluginStarted { namespace, .. }
            | Self::PluginStopped { namespace } => namespace,
        }
    }

    /// Returns the envelope of an [`Event`](Self::Event) message.
    #[must_use]
    pub fn envelope(&self) -> Option<&EventEnvelope> {
        match self {
            Self::Event { envelope, .. } => Some(envelope),
            _ => None,
        }
    }

    /// Returns `true` if this is a lifecycle announcement.
    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::PluginStarted { .. } | Self::PluginStopped { .. })
    }
}
