// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Time source for scripted playback.

use std::future::Future;
use std::time::Duration;

/// Provides the delays the sequencer waits on.
///
/// The sequencer races every sleep against its stop signal, so
/// implementations do not need to be cancellation-aware themselves.
pub trait Clock: Send + Sync + 'static {
    /// Completes after `duration`.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// [`Clock`] backed by `tokio::time`.
///
/// Under a paused test runtime (`#[tokio::test(start_paused = true)]`) the
/// delays advance instantly, which keeps timed playback tests deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
