// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device read loop.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::event::{EventEnvelope, EventPublisher};

use super::{InputDevice, RawInputEvent};

/// Lifecycle of a device session.
///
/// `Created → Running → {Cancelled, Failed} → Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Device opened, read loop not yet started.
    Created,
    /// Reading events.
    Running,
    /// Stopped on request; resources are being released.
    Cancelled,
    /// Stopped by a device I/O error; resources are being released.
    Failed,
    /// Resources released, the session is over.
    Closed,
}

impl SessionState {
    /// Returns `true` once the session has released its device.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Returns `true` while the session is reading events.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// How a session's read loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SessionEnd {
    Cancelled,
    Failed(String),
}

/// Everything the read loop needs besides the device itself.
pub(crate) struct SessionContext {
    pub device: String,
    pub namespace: String,
    pub event_name: String,
    pub publisher: Arc<dyn EventPublisher>,
}

impl SessionContext {
    fn forward(&self, name: Option<&str>, event: &RawInputEvent) {
        let payload = event.to_payload(&self.device, name);
        match EventEnvelope::from_map(self.event_name.as_str(), payload) {
            Ok(envelope) => self.publisher.publish(&self.namespace, envelope),
            Err(e) => {
                tracing::error!(device = %self.device, error = %e, "Dropping event with invalid envelope");
            }
        }
    }
}

/// Runs the read loop until `cancel` fires or the device fails, then
/// releases the grab (if held) and reports [`SessionState::Closed`].
///
/// Events are published from inside the loop, so their order on the bus
/// matches the order they were read.
pub(crate) async fn run<D: InputDevice>(
    mut device: D,
    grabbed: bool,
    ctx: SessionContext,
    cancel: CancellationToken,
    state: watch::Sender<SessionState>,
) -> SessionEnd {
    let name = device.name().map(str::to_string);
    state.send_replace(SessionState::Running);
    tracing::info!(device = %ctx.device, name = ?name, grabbed, "Device session started");

    let end = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break SessionEnd::Cancelled,
            result = device.next_event() => match result {
                Ok(event) => {
                    tracing::trace!(device = %ctx.device, ?event, "Read input event");
                    ctx.forward(name.as_deref(), &event);
                }
                Err(e) => {
                    tracing::error!(device = %ctx.device, error = %e, "Device read failed, closing session");
                    break SessionEnd::Failed(e.to_string());
                }
            },
        }
    };

    state.send_replace(match end {
        SessionEnd::Cancelled => SessionState::Cancelled,
        SessionEnd::Failed(_) => SessionState::Failed,
    });

    if grabbed && let Err(e) = device.ungrab() {
        tracing::warn!(device = %ctx.device, error = %e, "Failed to release device grab");
    }
    drop(device);

    state.send_replace(SessionState::Closed);
    tracing::info!(device = %ctx.device, ?end, "Device session closed");
    end
}
