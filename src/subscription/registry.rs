// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Registry of active device sessions.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::device::session::{self, SessionContext, SessionEnd};
use crate::device::{DeviceBackend, InputDevice, SessionId, SessionState};
use crate::error::Error;
use crate::event::EventPublisher;

use super::SubscriptionHandle;

/// Per-call subscribe options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Take exclusive access to the device (default: `true`).
    pub grab: bool,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self { grab: true }
    }
}

/// Registry entry: the same object is stored at subscribe and cancelled at
/// unsubscribe.
#[derive(Debug)]
struct DeviceSession {
    id: SessionId,
    cancel: CancellationToken,
    task: JoinHandle<SessionEnd>,
}

/// Guarded registry contents.
///
/// `ended` keeps the id of each session that stopped on its own until the
/// path is unsubscribed or subscribed again, so an unsubscribe racing a
/// device failure resolves the same way whenever the failure was noticed.
#[derive(Debug, Default)]
struct Sessions {
    live: HashMap<String, DeviceSession>,
    ended: HashMap<String, SessionId>,
}

impl Sessions {
    /// Moves sessions that ended on their own from `live` to `ended`.
    fn prune_finished(&mut self) {
        let finished: Vec<String> = self
            .live
            .iter()
            .filter(|(_, session)| session.task.is_finished())
            .map(|(device, _)| device.clone())
            .collect();
        for device in finished {
            if let Some(session) = self.live.remove(&device) {
                tracing::warn!(%device, session = ?session.id, "Removing session that ended on its own");
                self.ended.insert(device, session.id);
            }
        }
    }
}

/// Maps device paths to their running sessions.
///
/// At most one session exists per path. The map sits behind one async mutex
/// that is held across device open and across session teardown, so
/// subscribe and unsubscribe of the same path never interleave. Session
/// tasks never take the lock themselves.
///
/// A session that stops on a device error no longer counts as subscribed.
/// Unsubscribing its path afterwards succeeds once with a warning, whether
/// or not the registry had already noticed the failure.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use evdev_relay::device::MemoryBackend;
/// use evdev_relay::event::EventBus;
/// use evdev_relay::subscription::{SubscribeOptions, SubscriptionRegistry};
///
/// # #[tokio::main]
/// # async fn main() -> evdev_relay::Result<()> {
/// let backend = MemoryBackend::new();
/// let _keyboard = backend.add_device("/dev/input/event0", Some("Keyboard"));
///
/// let registry = SubscriptionRegistry::new(
///     backend,
///     Arc::new(EventBus::new()),
///     "default",
///     "EVDEV_EVENT",
/// );
///
/// registry.subscribe("/dev/input/event0", SubscribeOptions::default()).await?;
/// assert!(registry.is_subscribed("/dev/input/event0").await);
///
/// registry.unsubscribe("/dev/input/event0").await?;
/// assert!(registry.is_empty().await);
/// # Ok(())
/// # }
/// ```
pub struct SubscriptionRegistry<B: DeviceBackend> {
    backend: B,
    publisher: Arc<dyn EventPublisher>,
    namespace: String,
    event_name: String,
    sessions: Mutex<Sessions>,
}

impl<B: DeviceBackend> SubscriptionRegistry<B> {
    /// Creates an empty registry.
    ///
    /// Envelopes from every session are tagged `event_name` and published
    /// into `namespace`.
    pub fn new(
        backend: B,
        publisher: Arc<dyn EventPublisher>,
        namespace: impl Into<String>,
        event_name: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            publisher,
            namespace: namespace.into(),
            event_name: event_name.into(),
            sessions: Mutex::new(Sessions::default()),
        }
    }

    /// Returns the device backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Opens `device` and starts reading it.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadySubscribed`] if a session for `device` is running
    /// - [`Error::DeviceOpen`] if opening or grabbing the device fails; the
    ///   registry is left unchanged
    pub async fn subscribe(
        &self,
        device: &str,
        options: SubscribeOptions,
    ) -> Result<SubscriptionHandle, Error> {
        let mut sessions = self.sessions.lock().await;
        sessions.prune_finished();

        if sessions.live.contains_key(device) {
            return Err(Error::AlreadySubscribed(device.to_string()));
        }

        let mut input = self.backend.open(device).map_err(|source| Error::DeviceOpen {
            device: device.to_string(),
            source,
        })?;
        if options.grab {
            input.grab().map_err(|source| Error::DeviceOpen {
                device: device.to_string(),
                source,
            })?;
        }

        let id = SessionId::new();
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(SessionState::Created);
        let context = SessionContext {
            device: device.to_string(),
            namespace: self.namespace.clone(),
            event_name: self.event_name.clone(),
            publisher: Arc::clone(&self.publisher),
        };
        let task = tokio::spawn(session::run(
            input,
            options.grab,
            context,
            cancel.clone(),
            state_tx,
        ));

        sessions.ended.remove(device);
        sessions
            .live
            .insert(device.to_string(), DeviceSession { id, cancel, task });
        tracing::debug!(%device, session = ?id, grab = options.grab, "Subscribed to device");

        Ok(SubscriptionHandle::new(
            id,
            device.to_string(),
            options.grab,
            state_rx,
        ))
    }

    /// Stops the session for `device` and waits for it to release the device.
    ///
    /// If the session had already stopped on a device error, nothing is
    /// released twice: the call logs a warning and succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSubscribed`] if no session is registered for `device`.
    pub async fn unsubscribe(&self, device: &str) -> Result<(), Error> {
        let mut sessions = self.sessions.lock().await;
        sessions.prune_finished();

        let Some(session) = sessions.live.remove(device) else {
            let id = sessions
                .ended
                .remove(device)
                .ok_or_else(|| Error::NotSubscribed(device.to_string()))?;
            tracing::warn!(%device, session = ?id, "Session had already ended, nothing to cancel");
            return Ok(());
        };

        session.cancel.cancel();
        match session.task.await {
            Ok(end) => tracing::debug!(%device, ?end, "Unsubscribed from device"),
            Err(e) => tracing::error!(%device, error = %e, "Device session task did not finish cleanly"),
        }
        Ok(())
    }

    /// Cancels every session and clears the registry.
    ///
    /// Individual failures are logged, never returned. Returns the number of
    /// sessions that were torn down.
    pub async fn shutdown_all(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        sessions.ended.clear();
        let drained: Vec<(String, DeviceSession)> = sessions.live.drain().collect();

        // Cancel everything first so sessions wind down concurrently.
        for (_, session) in &drained {
            session.cancel.cancel();
        }

        let count = drained.len();
        for (device, session) in drained {
            match session.task.await {
                Ok(SessionEnd::Cancelled) => {}
                Ok(SessionEnd::Failed(reason)) => {
                    tracing::warn!(%device, %reason, "Session had failed before shutdown");
                }
                Err(e) => tracing::error!(%device, error = %e, "Device session task did not finish cleanly"),
            }
        }

        if count > 0 {
            tracing::info!(count, "Closed all device sessions");
        }
        count
    }

    /// Returns `true` if a session for `device` is running.
    pub async fn is_subscribed(&self, device: &str) -> bool {
        let mut sessions = self.sessions.lock().await;
        sessions.prune_finished();
        sessions.live.contains_key(device)
    }

    /// Returns the subscribed device paths, sorted.
    pub async fn devices(&self) -> Vec<String> {
        let mut sessions = self.sessions.lock().await;
        sessions.prune_finished();
        let mut devices: Vec<String> = sessions.live.keys().cloned().collect();
        devices.sort();
        devices
    }

    /// Returns the number of running sessions.
    pub async fn len(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        sessions.prune_finished();
        sessions.live.len()
    }

    /// Returns `true` if no session is running.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<B: DeviceBackend + std::fmt::Debug> std::fmt::Debug for SubscriptionRegistry<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("backend", &self.backend)
            .field("namespace", &self.namespace)
            .field("event_name", &self.event_name)
            .finish_non_exhaustive()
    }
}
