// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device subscriptions.
//!
//! The [`SubscriptionRegistry`] owns one session per subscribed device. A
//! session reads its device until it is unsubscribed, the registry is shut
//! down, or the device fails. Callers get a [`SubscriptionHandle`] to watch
//! the session's lifecycle.
//!
//! # Lifecycle
//!
//! - `subscribe` opens the device, optionally grabs it, and starts the read loop
//! - `unsubscribe` cancels the loop and waits until the grab is released
//! - a device I/O error ends only that session; nothing is retried
//! - `shutdown_all` tears down every session and never fails

mod handle;
mod registry;

pub use handle::SubscriptionHandle;
pub use registry::{SubscribeOptions, SubscriptionRegistry};
