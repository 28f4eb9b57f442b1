// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The normalized `{event_type, data}` unit handed to the bus.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::EnvelopeError;

/// Event type used for state transitions published by the sequencer.
pub const STATE_CHANGED: &str = "state_changed";

/// An immutable event envelope.
///
/// Envelopes are validated when they are built, so publishing one can never
/// fail on shape grounds.
///
/// # Examples
///
/// ```
/// use evdev_relay::event::EventEnvelope;
/// use serde_json::json;
///
/// let envelope = EventEnvelope::new("button_pressed", json!({"button": 3})).unwrap();
/// assert_eq!(envelope.event_type(), "button_pressed");
/// assert_eq!(envelope.get("button"), Some(&json!(3)));
///
/// assert!(EventEnvelope::new("", json!({})).is_err());
/// assert!(EventEnvelope::new("x", json!([1, 2])).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventEnvelope {
    event_type: String,
    data: Map<String, Value>,
}

impl EventEnvelope {
    /// Builds an envelope from an event type and a JSON payload.
    ///
    /// `Value::Null` is accepted as an empty payload.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError`] if the event type is empty or the payload is
    /// neither an object nor null.
    pub fn new(event_type: impl Into<String>, data: Value) -> Result<Self, EnvelopeError> {
        let data = match data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => return Err(EnvelopeError::DataNotObject(json_kind(&other))),
        };
        Self::from_map(event_type, data)
    }

    /// Builds an envelope from an already-collected payload map.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::EmptyEventType`] if the event type is empty.
    pub fn from_map(
        event_type: impl Into<String>,
        data: Map<String, Value>,
    ) -> Result<Self, EnvelopeError> {
        let event_type = event_type.into();
        if event_type.trim().is_empty() {
            return Err(EnvelopeError::EmptyEventType);
        }
        Ok(Self { event_type, data })
    }

    /// Builds a `state_changed` envelope.
    #[must_use]
    pub fn state_changed(entity: impl Into<String>, old_state: Value, new_state: Value) -> Self {
        let mut data = Map::new();
        data.insert("entity_id".to_string(), Value::String(entity.into()));
        data.insert("old_state".to_string(), old_state);
        data.insert("new_state".to_string(), new_state);
        Self {
            event_type: STATE_CHANGED.to_string(),
            data,
        }
    }

    /// Returns the event type.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Returns the payload.
    #[must_use]
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Returns one payload field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Returns `true` for `state_changed` envelopes.
    #[must_use]
    pub fn is_state_change(&self) -> bool {
        self.event_type == STATE_CHANGED
    }

    /// Consumes the envelope, returning its event type and payload.
    #[must_use]
    pub fn into_parts(self) -> (String, Map<String, Value>) {
        (self.event_type, self.data)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
