// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `evdev_relay` library.
//!
//! The top-level [`Error`] covers subscription lifecycle failures, state
//! lookups and service-call validation. Envelope construction and script
//! parsing have their own narrower enums that convert into it.

use std::io;

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// A session for this device is already registered.
    #[error("device {0} is already subscribed")]
    AlreadySubscribed(String),

    /// No session for this device is registered.
    #[error("device {0} is not subscribed")]
    NotSubscribed(String),

    /// Opening or grabbing the device failed.
    #[error("failed to open device {device}: {source}")]
    DeviceOpen {
        /// Path of the device that could not be opened.
        device: String,
        /// The underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// The entity has never been initialised in the state table.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// An event envelope could not be constructed.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(#[from] EnvelopeError),

    /// A service call omitted a required parameter.
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// A service call named a service this plugin does not provide.
    #[error("unknown service: {0}")]
    UnknownService(String),

    /// A service call was addressed to a different namespace.
    #[error("namespace mismatch: plugin serves {expected}, call targeted {actual}")]
    NamespaceMismatch {
        /// Namespace served by the plugin.
        expected: String,
        /// Namespace named in the call.
        actual: String,
    },

    /// A scripted sequence is malformed.
    #[error("invalid script: {0}")]
    InvalidScript(#[from] ScriptError),

    /// Plugin configuration could not be deserialized.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Errors raised while constructing an [`EventEnvelope`](crate::event::EventEnvelope).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// The event type is empty.
    #[error("event type must not be empty")]
    EmptyEventType,

    /// The payload is not a JSON object.
    #[error("event data must be an object, got {0}")]
    DataNotObject(&'static str),
}

/// Errors raised while parsing a scripted sequence.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScriptError {
    /// A step names none of `state`, `event`, `connect` or `disconnect`.
    #[error("step {0} has no state, event, connect or disconnect entry")]
    EmptyStep(usize),

    /// A step offset is negative or not finite.
    #[error("step {index} has invalid offset {offset}")]
    InvalidOffset {
        /// Position of the step in the sequence.
        index: usize,
        /// The offending offset in seconds.
        offset: f64,
    },

    /// A step's event payload is malformed.
    #[error("step {index}: {source}")]
    InvalidEvent {
        /// Position of the step in the sequence.
        index: usize,
        /// Why the event was rejected.
        source: EnvelopeError,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
