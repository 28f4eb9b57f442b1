// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scripted playback engine.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::event::{EventEnvelope, PluginHost};
use crate::plugin::PluginMetadata;
use crate::state::StateTable;

use super::{Clock, ScriptEvent, ScriptedSequence, TokioClock};

/// How often a parked sequencer checks its stop signal.
pub const PARK_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Lifecycle of the sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequencerState {
    /// Waiting out the delay before step `cursor`.
    Idle {
        /// Index of the next step.
        cursor: usize,
    },
    /// Dispatching step `cursor`.
    Advancing {
        /// Index of the step being dispatched.
        cursor: usize,
    },
    /// Sequence exhausted without looping; waiting to be stopped.
    Parked,
    /// Finished, either on request or after a playback error.
    Stopped,
}

/// Identity the sequencer announces to the host.
#[derive(Debug, Clone)]
pub struct Announcement {
    /// Plugin name.
    pub name: String,
    /// Namespace events are published into.
    pub namespace: String,
    /// Metadata sent with every start announcement.
    pub metadata: PluginMetadata,
}

/// Replays a [`ScriptedSequence`] against a state table and a host.
///
/// Before the first step the sequencer announces itself with
/// `notify_started(.., initial = true)` (unless built
/// [`without_handshake`](Self::without_handshake)), carrying a snapshot of the state
/// table. Every step then waits its delay and dispatches:
///
/// - state change: atomically swaps the entity's value and publishes
///   `state_changed` with `entity_id`, `old_state` and `new_state`
/// - generic event: publishes the scripted envelope verbatim
/// - connect: `notify_started(.., initial = false)`
/// - disconnect: `notify_stopped`; playback continues
///
/// When the last step has run, a looping sequence starts over and any other
/// sequence parks, polling the stop signal every [`PARK_POLL_INTERVAL`].
/// A state change for an entity that was never initialised stops playback
/// with [`Error::UnknownEntity`].
pub struct PlaybackSequencer<C: Clock = TokioClock> {
    announcement: Announcement,
    sequence: ScriptedSequence,
    state: Arc<StateTable>,
    host: Arc<dyn PluginHost>,
    clock: C,
    status: watch::Sender<SequencerState>,
    handshake: bool,
}

impl PlaybackSequencer<TokioClock> {
    /// Creates a sequencer driven by the tokio clock.
    #[must_use]
    pub fn new(
        announcement: Announcement,
        sequence: ScriptedSequence,
        state: Arc<StateTable>,
        host: Arc<dyn PluginHost>,
    ) -> Self {
        let (status, _) = watch::channel(SequencerState::Idle { cursor: 0 });
        Self {
            announcement,
            sequence,
            state,
            host,
            clock: TokioClock,
            status,
            handshake: true,
        }
    }
}

impl<C: Clock> PlaybackSequencer<C> {
    /// Replaces the clock.
    #[must_use]
    pub fn with_clock<C2: Clock>(self, clock: C2) -> PlaybackSequencer<C2> {
        PlaybackSequencer {
            announcement: self.announcement,
            sequence: self.sequence,
            state: self.state,
            host: self.host,
            clock,
            status: self.status,
            handshake: self.handshake,
        }
    }

    /// Skips the startup announcement, for callers that already made it.
    #[must_use]
    pub fn without_handshake(mut self) -> Self {
        self.handshake = false;
        self
    }

    /// Returns a receiver tracking the sequencer state.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<SequencerState> {
        self.status.subscribe()
    }

    /// Runs the handshake and then the sequence until `stop` fires.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEntity`] if a state change targets an entity
    /// that is not in the state table.
    pub async fn run(self, stop: CancellationToken) -> Result<(), Error> {
        let Announcement { name, namespace, .. } = &self.announcement;
        tracing::info!(%name, %namespace, steps = self.sequence.len(), looping = self.sequence.is_looping(), "Starting playback");

        if self.handshake {
            self.announce(true);
        }
        let result = self.play(&stop).await;
        self.status.send_replace(SequencerState::Stopped);

        match &result {
            Ok(()) => tracing::info!(%namespace, "Playback stopped"),
            Err(e) => tracing::error!(%namespace, error = %e, "Playback aborted"),
        }
        result
    }

    async fn play(&self, stop: &CancellationToken) -> Result<(), Error> {
        let steps = self.sequence.steps();
        let mut cursor = 0;

        loop {
            if cursor >= steps.len() {
                if !self.sequence.is_looping() || steps.is_empty() {
                    self.park(stop).await;
                    return Ok(());
                }
                cursor = 0;
                tracing::debug!(namespace = %self.announcement.namespace, "Sequence looped");
                // A loop of zero-delay steps must still let other tasks run.
                tokio::task::yield_now().await;
            }

            let step = &steps[cursor];
            self.status.send_replace(SequencerState::Idle { cursor });
            if !self.wait(step.delay, stop).await {
                return Ok(());
            }

            self.status.send_replace(SequencerState::Advancing { cursor });
            self.dispatch(&step.event)?;
            cursor += 1;
        }
    }

    /// Waits `delay`; returns `false` if `stop` fired first.
    async fn wait(&self, delay: Duration, stop: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            () = stop.cancelled() => false,
            () = self.clock.sleep(delay) => true,
        }
    }

    async fn park(&self, stop: &CancellationToken) {
        self.status.send_replace(SequencerState::Parked);
        tracing::debug!(namespace = %self.announcement.namespace, "Sequence exhausted, parking");
        while self.wait(PARK_POLL_INTERVAL, stop).await {}
    }

    fn dispatch(&self, event: &ScriptEvent) -> Result<(), Error> {
        let namespace = &self.announcement.namespace;
        match event {
            ScriptEvent::StateChange { entity, new_state } => {
                let old_state = self.state.replace(entity, new_state.clone())?;
                let envelope =
                    EventEnvelope::state_changed(entity.as_str(), old_state, new_state.clone());
                tracing::debug!(%namespace, ?envelope, "State update");
                self.host.publish(namespace, envelope);
            }
            ScriptEvent::GenericEvent(envelope) => {
                tracing::debug!(%namespace, ?envelope, "Scripted event");
                self.host.publish(namespace, envelope.clone());
            }
            ScriptEvent::Connect => {
                tracing::debug!(%namespace, "Scripted connect");
                self.announce(false);
            }
            ScriptEvent::Disconnect => {
                tracing::debug!(%namespace, "Scripted disconnect");
                self.host.notify_stopped(namespace);
            }
        }
        Ok(())
    }

    fn announce(&self, initial: bool) {
        self.host.notify_started(
            &self.announcement.name,
            &self.announcement.namespace,
            self.announcement.metadata.clone(),
            self.state.snapshot(),
            initial,
        );
    }
}

impl<C: Clock> std::fmt::Debug for PlaybackSequencer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSequencer")
            .field("namespace", &self.announcement.namespace)
            .field("steps", &self.sequence.len())
            .field("looping", &self.sequence.is_looping())
            .field("state", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}
