// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Linux evdev backend.

use std::io;

use chrono::{DateTime, Utc};
use evdev::EventStream;

use super::{DeviceBackend, InputDevice, RawInputEvent};

/// Opens kernel input nodes (`/dev/input/event*`).
///
/// Devices are read asynchronously through the runtime's reactor, so
/// [`DeviceBackend::open`] must be called from within a tokio runtime.
///
/// # Examples
///
/// ```no_run
/// use evdev_relay::device::{DeviceBackend, EvdevBackend, InputDevice};
///
/// # async fn example() -> std::io::Result<()> {
/// let mut keyboard = EvdevBackend.open("/dev/input/event3")?;
/// keyboard.grab()?;
/// let event = keyboard.next_event().await?;
/// println!("{:?}", event.category());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct EvdevBackend;

impl DeviceBackend for EvdevBackend {
    type Device = EvdevDevice;

    fn open(&self, path: &str) -> io::Result<EvdevDevice> {
        let device = evdev::Device::open(path)?;
        let name = device.name().map(str::to_string);
        tracing::debug!(device = %path, name = ?name, "Opened evdev device");
        Ok(EvdevDevice {
            stream: device.into_event_stream()?,
            name,
        })
    }
}

/// An open kernel input device.
pub struct EvdevDevice {
    stream: EventStream,
    name: Option<String>,
}

impl std::fmt::Debug for EvdevDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvdevDevice")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl InputDevice for EvdevDevice {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    async fn next_event(&mut self) -> io::Result<RawInputEvent> {
        let event = self.stream.next_event().await?;
        Ok(RawInputEvent::with_timestamp(
            event.event_type().0,
            event.code(),
            event.value(),
            DateTime::<Utc>::from(event.timestamp()),
        ))
    }

    fn grab(&mut self) -> io::Result<()> {
        self.stream.device_mut().grab()
    }

    fn ungrab(&mut self) -> io::Result<()> {
        self.stream.device_mut().ungrab()
    }
}
