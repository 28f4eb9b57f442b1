// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `evdev_relay` - Relay Linux input device events onto a namespaced event bus.
//!
//! This library reads raw events from input devices (keyboards, remotes,
//! switches) and republishes each one as an event envelope into the
//! namespace of an automation host. A scripted playback mode stands in for
//! real hardware when testing automations.
//!
//! # Features
//!
//! - **Device subscriptions**: one task per device, optional exclusive grab,
//!   released on unsubscribe or shutdown
//! - **Runtime services**: `subscribe` / `unsubscribe` service calls
//! - **State table**: per-entity values with atomic old/new capture
//! - **Scripted playback**: timed state changes, events and connect/disconnect
//!   markers, looping or parking at the end
//!
//! # Cargo features
//!
//! - `evdev` (default): the [`EvdevBackend`](device::EvdevBackend) for
//!   kernel input nodes. Without it only the in-memory backend is available.
//!
//! # Quick Start
//!
//! ## Relaying a keyboard
//!
//! ```no_run
//! use std::sync::Arc;
//! use evdev_relay::device::EvdevBackend;
//! use evdev_relay::event::EventBus;
//! use evdev_relay::plugin::{EvdevPlugin, PluginConfig};
//!
//! #[tokio::main]
//! async fn main() -> evdev_relay::Result<()> {
//!     let bus = Arc::new(EventBus::new());
//!     let mut events = bus.subscribe();
//!
//!     let config = PluginConfig::new()
//!         .with_namespace("keyboard")
//!         .with_device("/dev/input/event3");
//!     let plugin = EvdevPlugin::new("evdev", config, bus.clone(), EvdevBackend)?;
//!     plugin.start().await;
//!
//!     while let Ok(message) = events.recv().await {
//!         println!("{message:?}");
//!     }
//!
//!     plugin.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Simulating a device
//!
//! ```
//! use std::sync::Arc;
//! use evdev_relay::device::MemoryBackend;
//! use evdev_relay::event::{BusMessage, EventBus};
//! use evdev_relay::plugin::{EvdevPlugin, PluginConfig};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> evdev_relay::Result<()> {
//! let config = PluginConfig::from_value(json!({
//!     "initial_state": {"light.hall": "OFF"},
//!     "sequence": {
//!         "events": [{"offset": 0, "state": {"entity": "light.hall", "newstate": "ON"}}],
//!         "loop": 0
//!     }
//! }))?;
//!
//! let bus = Arc::new(EventBus::new());
//! let mut events = bus.subscribe();
//! let plugin = EvdevPlugin::new("sim", config, bus.clone(), MemoryBackend::new())?;
//! plugin.start().await;
//!
//! // Startup handshake, then the scripted state change
//! assert!(matches!(events.recv().await, Ok(BusMessage::PluginStarted { initial: true, .. })));
//! let change = events.recv().await.unwrap();
//! assert_eq!(change.envelope().unwrap().get("new_state"), Some(&json!("ON")));
//!
//! plugin.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Logging
//!
//! The crate logs through [`tracing`] and never installs a subscriber.

pub mod device;
pub mod error;
pub mod event;
pub mod playback;
pub mod plugin;
pub mod state;
pub mod subscription;

pub use device::{DeviceBackend, InputDevice, MemoryBackend, RawInputEvent, SessionId};
#[cfg(feature = "evdev")]
pub use device::EvdevBackend;
pub use error::{EnvelopeError, Error, Result, ScriptError};
pub use event::{BusMessage, EventBus, EventEnvelope, EventPublisher, PluginHost};
pub use playback::{PlaybackSequencer, ScriptedSequence, SequencerState};
pub use plugin::{EvdevPlugin, PluginConfig, PluginMetadata, ServiceCall, ServiceResponse};
pub use state::{StateSnapshot, StateTable};
pub use subscription::{SubscribeOptions, SubscriptionHandle, SubscriptionRegistry};
