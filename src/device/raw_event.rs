// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Backend-neutral input events and their categorisation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Linux `EV_SYN`.
pub const EV_SYN: u16 = 0x00;
/// Linux `EV_KEY`.
pub const EV_KEY: u16 = 0x01;
/// Linux `EV_REL`.
pub const EV_REL: u16 = 0x02;
/// Linux `EV_ABS`.
pub const EV_ABS: u16 = 0x03;
/// Linux `EV_MSC`.
pub const EV_MSC: u16 = 0x04;
/// Linux `EV_SW`.
pub const EV_SW: u16 = 0x05;

/// One raw event as read from an input device.
///
/// # Examples
///
/// ```
/// use evdev_relay::device::{EventCategory, KeyState, RawInputEvent, EV_KEY};
///
/// // KEY_A pressed
/// let event = RawInputEvent::new(EV_KEY, 30, 1);
/// assert_eq!(
///     event.category(),
///     EventCategory::Key { code: 30, state: KeyState::Down }
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawInputEvent {
    /// Event type (`EV_*`).
    pub event_type: u16,
    /// Event code within the type.
    pub code: u16,
    /// Event value.
    pub value: i32,
    /// Kernel timestamp of the event.
    pub timestamp: DateTime<Utc>,
}

impl RawInputEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(event_type: u16, code: u16, value: i32) -> Self {
        Self::with_timestamp(event_type, code, value, Utc::now())
    }

    /// Creates an event with an explicit timestamp.
    #[must_use]
    pub fn with_timestamp(
        event_type: u16,
        code: u16,
        value: i32,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type,
            code,
            value,
            timestamp,
        }
    }

    /// Categorises the event by its type.
    #[must_use]
    pub fn category(&self) -> EventCategory {
        let (code, value) = (self.code, self.value);
        match self.event_type {
            EV_SYN => EventCategory::Synchronization { code },
            EV_KEY => EventCategory::Key {
                code,
                state: KeyState::from_value(value),
            },
            EV_REL => EventCategory::Relative { code, value },
            EV_ABS => EventCategory::Absolute { code, value },
            EV_MSC => EventCategory::Misc { code, value },
            EV_SW => EventCategory::Switch { code, value },
            event_type => EventCategory::Other {
                event_type,
                code,
                value,
            },
        }
    }

    /// Builds the bus payload for this event as read from `device`.
    ///
    /// The payload always carries `device`, `type`, `code`, `value`,
    /// `category` and `timestamp`; key events add `key_state` and named
    /// devices add `name`.
    #[must_use]
    pub fn to_payload(&self, device: &str, name: Option<&str>) -> Map<String, Value> {
        let category = self.category();
        let mut data = Map::new();
        data.insert("device".to_string(), Value::from(device));
        if let Some(name) = name {
            data.insert("name".to_string(), Value::from(name));
        }
        data.insert("type".to_string(), Value::from(self.event_type));
        data.insert("code".to_string(), Value::from(self.code));
        data.insert("value".to_string(), Value::from(self.value));
        data.insert("category".to_string(), Value::from(category.name()));
        if let EventCategory::Key { state, .. } = category {
            data.insert("key_state".to_string(), Value::from(state.to_string()));
        }
        data.insert(
            "timestamp".to_string(),
            Value::from(self.timestamp.to_rfc3339()),
        );
        data
    }
}

/// State of a key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyState {
    /// Key released (value 0).
    Up,
    /// Key pressed (value 1).
    Down,
    /// Key held, autorepeat (value 2 and above).
    Hold,
}

impl KeyState {
    fn from_value(value: i32) -> Self {
        match value {
            0 => Self::Up,
            1 => Self::Down,
            _ => Self::Hold,
        }
    }
}

impl fmt::Display for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Hold => "hold",
        };
        f.write_str(s)
    }
}

/// A raw event interpreted by its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCategory {
    /// `EV_SYN` report boundary.
    Synchronization {
        /// Synchronization code (`SYN_REPORT`, `SYN_DROPPED`, ...).
        code: u16,
    },
    /// `EV_KEY` key or button.
    Key {
        /// Key code.
        code: u16,
        /// Press state.
        state: KeyState,
    },
    /// `EV_REL` relative axis movement.
    Relative {
        /// Axis code.
        code: u16,
        /// Movement delta.
        value: i32,
    },
    /// `EV_ABS` absolute axis position.
    Absolute {
        /// Axis code.
        code: u16,
        /// Axis position.
        value: i32,
    },
    /// `EV_MSC` miscellaneous data.
    Misc {
        /// Misc code.
        code: u16,
        /// Raw value.
        value: i32,
    },
    /// `EV_SW` binary switch.
    Switch {
        /// Switch code.
        code: u16,
        /// Switch position.
        value: i32,
    },
    /// Any other event type.
    Other {
        /// Raw event type.
        event_type: u16,
        /// Raw code.
        code: u16,
        /// Raw value.
        value: i32,
    },
}

impl EventCategory {
    /// Returns the short category name used in payloads.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Synchronization { .. } => "synchronization",
            Self::Key { .. } => "key",
            Self::Relative { .. } => "relative",
            Self::Absolute { .. } => "absolute",
            Self::Misc { .. } => "misc",
            Self::Switch { .. } => "switch",
            Self::Other { .. } => "other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_values_map_to_states() {
        assert_eq!(KeyState::from_value(0), KeyState::Up);
        assert_eq!(KeyState::from_value(1), KeyState::Down);
        assert_eq!(KeyState::from_value(2), KeyState::Hold);
    }

    #[test]
    fn categorise_by_type() {
        assert_eq!(
            RawInputEvent::new(EV_SYN, 0, 0).category(),
            EventCategory::Synchronization { code: 0 }
        );
        assert_eq!(
            RawInputEvent::new(EV_REL, 8, -1).category(),
            EventCategory::Relative { code: 8, value: -1 }
        );
        assert_eq!(
            RawInputEvent::new(EV_ABS, 1, 512).category(),
            EventCategory::Absolute {
                code: 1,
                value: 512
            }
        );
        assert_eq!(
            RawInputEvent::new(0x11, 2, 1).category(),
            EventCategory::Other {
                event_type: 0x11,
                code: 2,
                value: 1
            }
        );
    }

    #[test]
    fn key_payload_contains_device_and_state() {
        let timestamp = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let event = RawInputEvent::with_timestamp(EV_KEY, 30, 1, timestamp);
        let data = event.to_payload("/dev/input/event3", Some("Keyboard"));

        assert_eq!(data["device"], json!("/dev/input/event3"));
        assert_eq!(data["name"], json!("Keyboard"));
        assert_eq!(data["type"], json!(1));
        assert_eq!(data["code"], json!(30));
        assert_eq!(data["value"], json!(1));
        assert_eq!(data["category"], json!("key"));
        assert_eq!(data["key_state"], json!("down"));
        assert_eq!(data["timestamp"], json!(timestamp.to_rfc3339()));
    }

    #[test]
    fn non_key_payload_has_no_key_state() {
        let data = RawInputEvent::new(EV_REL, 0, 5).to_payload("/dev/input/mouse", None);
        assert!(!data.contains_key("key_state"));
        assert!(!data.contains_key("name"));
        assert_eq!(data["category"], json!("relative"));
    }
}
