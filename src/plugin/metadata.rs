// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Plugin metadata reported to the host.

use serde::Serialize;

/// Version of the envelope layout this crate publishes.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Metadata announced with every `notify_started`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PluginMetadata {
    /// Envelope layout version, see [`PROTOCOL_VERSION`].
    pub protocol_version: String,
    /// Event type carried by device envelopes.
    pub event_name: String,
    /// Devices listed in the plugin configuration.
    pub devices: Vec<String>,
    /// Whether devices are grabbed for exclusive access.
    pub grab: bool,
}
