// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scripted sequences and their configuration format.
//!
//! A sequence is written the way hosts pass plugin configuration:
//!
//! ```json
//! {
//!   "events": [
//!     {"offset": 0, "state": {"entity": "light.hall", "newstate": "ON"}},
//!     {"offset": 2, "event": {"event_type": "button", "data": {"id": 1}}},
//!     {"offset": 1, "disconnect": true},
//!     {"offset": 5, "connect": true}
//!   ],
//!   "loop": 1
//! }
//! ```
//!
//! `offset` is the delay in seconds before the step runs. `loop` accepts
//! `0`/`1` or a boolean.

use std::time::Duration;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{EnvelopeError, ScriptError};
use crate::event::EventEnvelope;

/// What a scripted step does.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptEvent {
    /// Replace an entity's value and publish `state_changed`.
    StateChange {
        /// Entity to update; must already exist in the state table.
        entity: String,
        /// New value.
        new_state: Value,
    },
    /// Publish an envelope verbatim.
    GenericEvent(EventEnvelope),
    /// Announce the source as available again.
    Connect,
    /// Announce the source as unavailable.
    Disconnect,
}

impl ScriptEvent {
    /// Creates a state change.
    #[must_use]
    pub fn state_change(entity: impl Into<String>, new_state: impl Into<Value>) -> Self {
        Self::StateChange {
            entity: entity.into(),
            new_state: new_state.into(),
        }
    }

    /// Creates a generic event.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError`] if the event type or payload is malformed.
    pub fn event(event_type: impl Into<String>, data: Value) -> Result<Self, EnvelopeError> {
        EventEnvelope::new(event_type, data).map(Self::GenericEvent)
    }
}

/// One step of a sequence: wait `delay`, then run `event`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptStep {
    /// Delay before the step runs.
    pub delay: Duration,
    /// The step's action.
    pub event: ScriptEvent,
}

impl ScriptStep {
    /// Creates a step.
    #[must_use]
    pub fn new(delay: Duration, event: ScriptEvent) -> Self {
        Self { delay, event }
    }
}

/// An ordered list of scripted steps, optionally replayed forever.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use evdev_relay::playback::{ScriptEvent, ScriptedSequence};
/// use serde_json::json;
///
/// let parsed: ScriptedSequence = serde_json::from_value(json!({
///     "events": [{"offset": 0.5, "state": {"entity": "e1", "newstate": "ON"}}],
///     "loop": 1
/// }))
/// .unwrap();
///
/// let built = ScriptedSequence::new()
///     .step(Duration::from_millis(500), ScriptEvent::state_change("e1", "ON"))
///     .looping(true);
///
/// assert_eq!(parsed, built);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(try_from = "RawSequence")]
pub struct ScriptedSequence {
    steps: Vec<ScriptStep>,
    looping: bool,
}

impl ScriptedSequence {
    /// Creates an empty, non-looping sequence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step.
    #[must_use]
    pub fn step(mut self, delay: Duration, event: ScriptEvent) -> Self {
        self.steps.push(ScriptStep::new(delay, event));
        self
    }

    /// Sets whether the sequence restarts after its last step.
    #[must_use]
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Returns the steps.
    #[must_use]
    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }

    /// Returns `true` if the sequence restarts after its last step.
    #[must_use]
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Returns the number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if the sequence has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns the entities touched by state-change steps.
    #[must_use]
    pub fn entities(&self) -> Vec<&str> {
        let mut entities: Vec<&str> = self
            .steps
            .iter()
            .filter_map(|step| match &step.event {
                ScriptEvent::StateChange { entity, .. } => Some(entity.as_str()),
                _ => None,
            })
            .collect();
        entities.sort_unstable();
        entities.dedup();
        entities
    }
}

#[derive(Deserialize)]
struct RawSequence {
    #[serde(default)]
    events: Vec<RawStep>,
    #[serde(default, rename = "loop")]
    looping: LoopFlag,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LoopFlag {
    Bool(bool),
    Int(i64),
}

impl Default for LoopFlag {
    fn default() -> Self {
        Self::Bool(false)
    }
}

impl LoopFlag {
    fn enabled(&self) -> bool {
        match *self {
            Self::Bool(flag) => flag,
            Self::Int(n) => n != 0,
        }
    }
}

#[derive(Deserialize)]
struct RawStep {
    #[serde(default)]
    offset: f64,
    state: Option<RawState>,
    event: Option<RawEvent>,
    #[serde(default, deserialize_with = "present")]
    disconnect: bool,
    #[serde(default, deserialize_with = "present")]
    connect: bool,
}

#[derive(Deserialize)]
struct RawState {
    entity: String,
    #[serde(alias = "new_state")]
    newstate: Value,
}

#[derive(Deserialize)]
struct RawEvent {
    event_type: String,
    #[serde(default)]
    data: Value,
}

/// Marks a key as present whatever its value, `null` included.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Value::deserialize(deserializer).map(|_| true)
}

impl TryFrom<RawSequence> for ScriptedSequence {
    type Error = ScriptError;

    fn try_from(raw: RawSequence) -> Result<Self, Self::Error> {
        let steps = raw
            .events
            .into_iter()
            .enumerate()
            .map(|(index, step)| step.into_step(index))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            steps,
            looping: raw.looping.enabled(),
        })
    }
}

impl RawStep {
    fn into_step(self, index: usize) -> Result<ScriptStep, ScriptError> {
        let delay = Duration::try_from_secs_f64(self.offset).map_err(|_| {
            ScriptError::InvalidOffset {
                index,
                offset: self.offset,
            }
        })?;

        // Precedence when a step names several kinds: state, event, disconnect, connect.
        let event = if let Some(state) = self.state {
            ScriptEvent::StateChange {
                entity: state.entity,
                new_state: state.newstate,
            }
        } else if let Some(event) = self.event {
            ScriptEvent::event(event.event_type, event.data)
                .map_err(|source| ScriptError::InvalidEvent { index, source })?
        } else if self.disconnect {
            ScriptEvent::Disconnect
        } else if self.connect {
            ScriptEvent::Connect
        } else {
            return Err(ScriptError::EmptyStep(index));
        };

        Ok(ScriptStep::new(delay, event))
    }
}
