// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Seams towards the host application.

use crate::plugin::PluginMetadata;
use crate::state::StateSnapshot;

use super::EventEnvelope;

/// Hands envelopes to a namespaced event bus.
///
/// Publishing is a hand-off: implementations must not block and must not
/// fail for a well-formed envelope. Downstream delivery is the bus's concern.
pub trait EventPublisher: Send + Sync {
    /// Publishes an envelope into `namespace`.
    fn publish(&self, namespace: &str, envelope: EventEnvelope);
}

/// The host-side lifecycle surface a plugin reports to.
pub trait PluginHost: EventPublisher {
    /// Announces that the plugin `name` is serving `namespace`.
    ///
    /// `initial` is `true` for the startup handshake and `false` when a
    /// previously disconnected source becomes available again.
    fn notify_started(
        &self,
        name: &str,
        namespace: &str,
        metadata: PluginMetadata,
        state: StateSnapshot,
        initial: bool,
    );

    /// Announces that `namespace` is no longer served.
    fn notify_stopped(&self, namespace: &str);
}
