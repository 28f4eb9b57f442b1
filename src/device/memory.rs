// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory input devices.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::{Mutex, mpsc};

use super::{DeviceBackend, EV_KEY, EV_SYN, InputDevice, RawInputEvent};

type EventResult = io::Result<RawInputEvent>;

/// Shared flags of one in-memory device.
#[derive(Debug, Default)]
struct DeviceFlags {
    grabbed: AtomicBool,
    open_count: AtomicUsize,
}

#[derive(Debug, Clone)]
struct Slot {
    name: Option<String>,
    events: Arc<Mutex<mpsc::UnboundedReceiver<EventResult>>>,
    flags: Arc<DeviceFlags>,
}

/// A [`DeviceBackend`] whose devices are fed from the test or simulation
/// code through [`MemoryDeviceHandle`]s.
///
/// Opening a path that was never added fails with
/// [`io::ErrorKind::NotFound`], like a missing `/dev/input` node. Grabbing a
/// device that is already grabbed fails with [`io::ErrorKind::ResourceBusy`].
///
/// # Examples
///
/// ```
/// use evdev_relay::device::{DeviceBackend, MemoryBackend};
///
/// let backend = MemoryBackend::new();
/// let keyboard = backend.add_device("/dev/input/event0", Some("Keyboard"));
///
/// assert!(backend.open("/dev/input/event0").is_ok());
/// assert!(backend.open("/dev/input/event9").is_err());
/// assert!(!keyboard.is_grabbed());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    slots: Arc<parking_lot::Mutex<HashMap<String, Slot>>>,
}

impl MemoryBackend {
    /// Creates a backend with no devices.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a device at `path` and returns the handle that feeds it.
    ///
    /// Adding a path twice replaces the earlier device.
    pub fn add_device(&self, path: impl Into<String>, name: Option<&str>) -> MemoryDeviceHandle {
        let path = path.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let flags = Arc::new(DeviceFlags::default());
        let slot = Slot {
            name: name.map(str::to_string),
            events: Arc::new(Mutex::new(rx)),
            flags: Arc::clone(&flags),
        };
        self.slots.lock().insert(path.clone(), slot);
        MemoryDeviceHandle { path, tx, flags }
    }

    /// Removes the device at `path`; later opens fail with `NotFound`.
    pub fn remove_device(&self, path: &str) -> bool {
        self.slots.lock().remove(path).is_some()
    }
}

impl DeviceBackend for MemoryBackend {
    type Device = MemoryDevice;

    fn open(&self, path: &str) -> io::Result<MemoryDevice> {
        let slot = self
            .slots
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no device at {path}")))?;
        slot.flags.open_count.fetch_add(1, Ordering::AcqRel);
        Ok(MemoryDevice {
            name: slot.name,
            events: slot.events,
            flags: slot.flags,
            holds_grab: false,
        })
    }
}

/// An open in-memory device.
#[derive(Debug)]
pub struct MemoryDevice {
    name: Option<String>,
    events: Arc<Mutex<mpsc::UnboundedReceiver<EventResult>>>,
    flags: Arc<DeviceFlags>,
    holds_grab: bool,
}

impl InputDevice for MemoryDevice {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    async fn next_event(&mut self) -> io::Result<RawInputEvent> {
        let mut events = self.events.lock().await;
        match events.recv().await {
            Some(result) => result,
            None => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "device was disconnected",
            )),
        }
    }

    fn grab(&mut self) -> io::Result<()> {
        if self.holds_grab {
            return Ok(());
        }
        self.flags
            .grabbed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| io::Error::new(io::ErrorKind::ResourceBusy, "device is already grabbed"))?;
        self.holds_grab = true;
        Ok(())
    }

    fn ungrab(&mut self) -> io::Result<()> {
        if self.holds_grab {
            self.flags.grabbed.store(false, Ordering::Release);
            self.holds_grab = false;
        }
        Ok(())
    }
}

impl Drop for MemoryDevice {
    fn drop(&mut self) {
        // Closing the device drops its grab, as the kernel does.
        if self.holds_grab {
            self.flags.grabbed.store(false, Ordering::Release);
        }
        self.flags.open_count.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Feeds events into an in-memory device and observes its flags.
#[derive(Debug, Clone)]
pub struct MemoryDeviceHandle {
    path: String,
    tx: mpsc::UnboundedSender<EventResult>,
    flags: Arc<DeviceFlags>,
}

impl MemoryDeviceHandle {
    /// Returns the device path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Queues a raw event. Returns `false` if the device was replaced.
    pub fn send(&self, event: RawInputEvent) -> bool {
        self.tx.send(Ok(event)).is_ok()
    }

    /// Queues a key event followed by a `SYN_REPORT`.
    pub fn send_key(&self, code: u16, value: i32) -> bool {
        self.send(RawInputEvent::new(EV_KEY, code, value))
            && self.send(RawInputEvent::new(EV_SYN, 0, 0))
    }

    /// Queues a read failure; the reader sees it after all earlier events.
    pub fn fail(&self, kind: io::ErrorKind, message: &str) -> bool {
        self.tx.send(Err(io::Error::new(kind, message.to_string()))).is_ok()
    }

    /// Returns `true` while some open device holds the exclusive grab.
    #[must_use]
    pub fn is_grabbed(&self) -> bool {
        self.flags.grabbed.load(Ordering::Acquire)
    }

    /// Returns how many open handles the device currently has.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.flags.open_count.load(Ordering::Acquire)
    }
}
