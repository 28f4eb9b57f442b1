// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Service calls routed to the plugin by its host.

use serde_json::{Map, Value};

use crate::error::Error;
use crate::subscription::SubscriptionHandle;

/// Prefix hosts may put in front of service names.
const SERVICE_PREFIX: &str = "evdev/";

/// A parsed service call.
///
/// # Examples
///
/// ```
/// use evdev_relay::plugin::ServiceCall;
/// use serde_json::json;
///
/// let kwargs = json!({"device": "/dev/input/event3", "namespace": "kb"});
/// let call = ServiceCall::parse("evdev/subscribe", kwargs.as_object().unwrap()).unwrap();
/// assert_eq!(call.device(), "/dev/input/event3");
/// assert_eq!(call.namespace(), Some("kb"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    /// Start reading a device.
    Subscribe {
        /// Device path.
        device: String,
        /// Namespace the caller expects the plugin to serve.
        namespace: Option<String>,
        /// Per-call override of the configured grab flag.
        grab: Option<bool>,
    },
    /// Stop reading a device.
    Unsubscribe {
        /// Device path.
        device: String,
        /// Namespace the caller expects the plugin to serve.
        namespace: Option<String>,
    },
}

impl ServiceCall {
    /// Parses a service name and its keyword arguments.
    ///
    /// Both `subscribe` and `evdev/subscribe` are accepted, likewise for
    /// `unsubscribe`. Unrecognised keys are ignored.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownService`] for any other service name
    /// - [`Error::MissingParameter`] if `device` is absent or not a string
    pub fn parse(service: &str, kwargs: &Map<String, Value>) -> Result<Self, Error> {
        let name = service.strip_prefix(SERVICE_PREFIX).unwrap_or(service);
        let device = || {
            kwargs
                .get("device")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or(Error::MissingParameter("device"))
        };
        let namespace = kwargs
            .get("namespace")
            .and_then(Value::as_str)
            .map(str::to_string);

        match name {
            "subscribe" => Ok(Self::Subscribe {
                device: device()?,
                namespace,
                grab: kwargs.get("grab").and_then(Value::as_bool),
            }),
            "unsubscribe" => Ok(Self::Unsubscribe {
                device: device()?,
                namespace,
            }),
            _ => Err(Error::UnknownService(service.to_string())),
        }
    }

    /// Returns the device the call targets.
    #[must_use]
    pub fn device(&self) -> &str {
        match self {
            Self::Subscribe { device, .. } | Self::Unsubscribe { device, .. } => device,
        }
    }

    /// Returns the namespace named in the call, if any.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        match self {
            Self::Subscribe { namespace, .. } | Self::Unsubscribe { namespace, .. } => {
                namespace.as_deref()
            }
        }
    }
}

/// Result of a successful service call.
#[derive(Debug, Clone)]
pub enum ServiceResponse {
    /// The device is now being read.
    Subscribed(SubscriptionHandle),
    /// The device has been released.
    Unsubscribed,
}
