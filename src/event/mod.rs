// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event envelopes and the publishing seam.
//!
//! Everything that leaves this crate goes through an [`EventPublisher`]:
//! device sessions publish one [`EventEnvelope`] per raw input event, and the
//! playback sequencer publishes scripted envelopes. The [`PluginHost`] trait
//! adds the lifecycle announcements a host expects from a plugin.
//!
//! [`EventBus`] is a ready-made in-process host built on tokio's broadcast
//! channel.
//!
//! # Examples
//!
//! ```
//! use evdev_relay::event::{BusMessage, EventBus, EventEnvelope, EventPublisher};
//! use serde_json::json;
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.publish("default", EventEnvelope::new("tick", json!({})).unwrap());
//! assert!(matches!(rx.try_recv(), Ok(BusMessage::Event { .. })));
//! ```

mod bus_message;
mod envelope;
mod event_bus;
mod publisher;

pub use bus_message::BusMessage;
pub use envelope::{EventEnvelope, STATE_CHANGED};
pub use event_bus::EventBus;
pub use publisher::{EventPublisher, PluginHost};
