// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Plugin configuration.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{EnvelopeError, Error};
use crate::playback::ScriptedSequence;
use crate::state::StateSnapshot;

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Event type used for device envelopes when none is configured.
pub const DEFAULT_EVENT_NAME: &str = "EVDEV_EVENT";

/// Static plugin configuration, read once at construction.
///
/// Deserializes from the argument map a host passes to the plugin; every key
/// is optional.
///
/// # Examples
///
/// ```
/// use evdev_relay::plugin::PluginConfig;
/// use serde_json::json;
///
/// let config = PluginConfig::from_value(json!({
///     "namespace": "evdev",
///     "devices": ["/dev/input/event3"],
///     "grab": false
/// }))
/// .unwrap();
/// assert_eq!(config.namespace, "evdev");
/// assert_eq!(config.event_name, "EVDEV_EVENT");
/// assert!(!config.grab);
///
/// // Equivalent builder form
/// let built = PluginConfig::new()
///     .with_namespace("evdev")
///     .with_device("/dev/input/event3")
///     .with_grab(false);
/// assert_eq!(config, built);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Bus namespace events are published into.
    pub namespace: String,
    /// Event type of device envelopes.
    pub event_name: String,
    /// Devices subscribed at start.
    pub devices: Vec<String>,
    /// Grab devices for exclusive access.
    pub grab: bool,
    /// Scripted sequence replayed at start, for simulation.
    pub sequence: Option<ScriptedSequence>,
    /// Initial contents of the state table.
    pub initial_state: StateSnapshot,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            event_name: DEFAULT_EVENT_NAME.to_string(),
            devices: Vec::new(),
            grab: true,
            sequence: None,
            initial_state: StateSnapshot::new(),
        }
    }
}

impl PluginConfig {
    /// Creates a configuration with every default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from the host's argument map.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the value does not have the expected
    /// shape (including malformed sequences), or any error from
    /// [`validate`](Self::validate).
    pub fn from_value(value: Value) -> Result<Self, Error> {
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values serde cannot.
    ///
    /// Scripted state changes on entities missing from `initial_state` are
    /// logged as warnings; playback stops when it reaches one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEnvelope`] if `event_name` is blank, since no
    /// device envelope could be built with it.
    pub fn validate(&self) -> Result<(), Error> {
        if self.event_name.trim().is_empty() {
            return Err(EnvelopeError::EmptyEventType.into());
        }
        for entity in self.uninitialised_entities() {
            tracing::warn!(%entity, namespace = %self.namespace, "Scripted entity has no initial state");
        }
        Ok(())
    }

    /// Returns the entities the sequence changes that `initial_state` does
    /// not seed, sorted.
    #[must_use]
    pub fn uninitialised_entities(&self) -> Vec<&str> {
        self.sequence
            .as_ref()
            .map(|sequence| {
                sequence
                    .entities()
                    .into_iter()
                    .filter(|entity| !self.initial_state.contains_key(*entity))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Sets the namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the device event type.
    #[must_use]
    pub fn with_event_name(mut self, event_name: impl Into<String>) -> Self {
        self.event_name = event_name.into();
        self
    }

    /// Adds a device subscribed at start.
    #[must_use]
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.devices.push(device.into());
        self
    }

    /// Sets whether devices are grabbed.
    #[must_use]
    pub fn with_grab(mut self, grab: bool) -> Self {
        self.grab = grab;
        self
    }

    /// Sets the scripted sequence.
    #[must_use]
    pub fn with_sequence(mut self, sequence: ScriptedSequence) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Seeds one entity of the state table.
    #[must_use]
    pub fn with_initial_state(mut self, entity: impl Into<String>, value: impl Into<Value>) -> Self {
        self.initial_state.insert(entity.into(), value.into());
        self
    }
}
