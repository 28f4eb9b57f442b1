// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The plugin surface a host application loads.
//!
//! [`EvdevPlugin`] is configured once from a [`PluginConfig`], reports to
//! a [`PluginHost`](crate::event::PluginHost), and accepts
//! [`ServiceCall`]s to subscribe or unsubscribe devices at runtime.

mod config;
mod evdev_plugin;
mod metadata;
mod service;

pub use config::{DEFAULT_EVENT_NAME, DEFAULT_NAMESPACE, PluginConfig};
pub use evdev_plugin::EvdevPlugin;
pub use metadata::{PROTOCOL_VERSION, PluginMetadata};
pub use service::{ServiceCall, ServiceResponse};
