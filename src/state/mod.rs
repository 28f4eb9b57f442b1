// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entity state tracking.
//!
//! The [`StateTable`] keeps the last known value of every entity the plugin
//! exposes. It is seeded from configuration, mutated by scripted playback
//! and by the host through `set_plugin_state`, and read as whole snapshots
//! when the plugin announces itself.
//!
//! # Examples
//!
//! ```
//! use evdev_relay::state::StateTable;
//! use serde_json::json;
//!
//! let table = StateTable::new();
//! table.set("light.hall", json!("OFF"));
//!
//! let snapshot = table.snapshot();
//! table.set("light.hall", json!("ON"));
//!
//! assert_eq!(snapshot["light.hall"], json!("OFF"));
//! assert_eq!(table.get("light.hall").unwrap(), json!("ON"));
//! ```

mod state_table;

pub use state_table::{StateSnapshot, StateTable};
