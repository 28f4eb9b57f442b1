// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Input devices and the per-device read loop.
//!
//! A [`DeviceBackend`] opens devices by path and yields [`InputDevice`]s,
//! which produce [`RawInputEvent`]s one at a time. Two backends ship with
//! the crate:
//!
//! - [`EvdevBackend`] (feature `evdev`): Linux kernel input nodes such as
//!   `/dev/input/event3`
//! - [`MemoryBackend`]: in-process devices fed through a
//!   [`MemoryDeviceHandle`], for simulation and tests
//!
//! The read loop that turns raw events into bus envelopes lives in the
//! private `session` module and is driven by the
//! [`SubscriptionRegistry`](crate::subscription::SubscriptionRegistry).

#[cfg(feature = "evdev")]
mod evdev_backend;
mod memory;
mod raw_event;
pub(crate) mod session;
mod session_id;

#[cfg(feature = "evdev")]
pub use evdev_backend::{EvdevBackend, EvdevDevice};
pub use memory::{MemoryBackend, MemoryDevice, MemoryDeviceHandle};
pub use raw_event::{
    EV_ABS, EV_KEY, EV_MSC, EV_REL, EV_SW, EV_SYN, EventCategory, KeyState, RawInputEvent,
};
pub use session::SessionState;
pub use session_id::SessionId;

use std::future::Future;
use std::io;

/// An open input device.
pub trait InputDevice: Send + 'static {
    /// Returns the name the device reports, if any.
    fn name(&self) -> Option<&str>;

    /// Waits for the next raw event.
    ///
    /// The returned future must be cancel-safe: dropping it before it
    /// completes must not lose an already-delivered event.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the device can no longer be read, for
    /// example after it was unplugged.
    fn next_event(&mut self) -> impl Future<Output = io::Result<RawInputEvent>> + Send;

    /// Takes exclusive access to the device.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if another reader already holds the grab.
    fn grab(&mut self) -> io::Result<()>;

    /// Releases exclusive access.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the release fails.
    fn ungrab(&mut self) -> io::Result<()>;
}

/// Opens input devices by path.
pub trait DeviceBackend: Send + Sync + 'static {
    /// The device type produced by this backend.
    type Device: InputDevice;

    /// Opens the device at `path`.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the device cannot be opened.
    fn open(&self, path: &str) -> io::Result<Self::Device>;
}
