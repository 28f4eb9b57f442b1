// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scripted playback for simulation.
//!
//! When no live device is attached, a [`PlaybackSequencer`] can stand in
//! for one: it replays a [`ScriptedSequence`] of state changes, generic
//! events and connect/disconnect markers, each after its own delay.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use evdev_relay::event::EventBus;
//! use evdev_relay::playback::{Announcement, PlaybackSequencer, ScriptEvent, ScriptedSequence};
//! use evdev_relay::plugin::PluginMetadata;
//! use evdev_relay::state::StateTable;
//! use serde_json::json;
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let state = Arc::new(StateTable::new());
//! state.set("light.hall", json!("OFF"));
//!
//! let sequence = ScriptedSequence::new()
//!     .step(Duration::from_millis(10), ScriptEvent::state_change("light.hall", "ON"));
//!
//! let announcement = Announcement {
//!     name: "evdev".to_string(),
//!     namespace: "default".to_string(),
//!     metadata: PluginMetadata::default(),
//! };
//! let sequencer = PlaybackSequencer::new(announcement, sequence, state, Arc::new(EventBus::new()));
//!
//! let stop = CancellationToken::new();
//! let task = tokio::spawn(sequencer.run(stop.clone()));
//! stop.cancel();
//! task.await.unwrap().unwrap();
//! # }
//! ```

mod clock;
mod script;
mod sequencer;

pub use clock::{Clock, TokioClock};
pub use script::{ScriptEvent, ScriptStep, ScriptedSequence};
pub use sequencer::{Announcement, PARK_POLL_INTERVAL, PlaybackSequencer, SequencerState};
