// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Caller-side view of a running device session.

use tokio::sync::watch;

use crate::device::{SessionId, SessionState};

/// Handle returned by a successful subscribe.
///
/// The handle observes the session but does not own it: dropping the handle
/// leaves the session running. Teardown goes through
/// [`SubscriptionRegistry::unsubscribe`](super::SubscriptionRegistry::unsubscribe).
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    id: SessionId,
    device: String,
    grabbed: bool,
    state: watch::Receiver<SessionState>,
}

impl SubscriptionHandle {
    pub(crate) fn new(
        id: SessionId,
        device: String,
        grabbed: bool,
        state: watch::Receiver<SessionState>,
    ) -> Self {
        Self {
            id,
            device,
            grabbed,
            state,
        }
    }

    /// Returns the session identifier.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the device path.
    #[must_use]
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Returns `true` if the session took exclusive access to the device.
    #[must_use]
    pub fn grabbed(&self) -> bool {
        self.grabbed
    }

    /// Returns the current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Waits until the session has released its device.
    pub async fn closed(&self) {
        let mut state = self.state.clone();
        // A dropped sender means the task is gone, which is closed as well.
        let _ = state.wait_for(SessionState::is_closed).await;
    }
}
