// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entity state table.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::Value;

use crate::error::Error;

/// A point-in-time copy of the state table.
pub type StateSnapshot = HashMap<String, Value>;

/// Thread-safe mapping from entity identifier to its last known value.
///
/// All access goes through a single `parking_lot::RwLock`; the lock is never
/// held across an `.await`. [`replace`](Self::replace) captures the old value
/// and writes the new one under one write guard.
#[derive(Debug, Default)]
pub struct StateTable {
    entries: RwLock<HashMap<String, Value>>,
}

impl StateTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table seeded with initial values.
    #[must_use]
    pub fn from_initial(initial: StateSnapshot) -> Self {
        Self {
            entries: RwLock::new(initial),
        }
    }

    /// Returns the value of `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEntity`] if the entity has never been set.
    pub fn get(&self, entity: &str) -> Result<Value, Error> {
        self.entries
            .read()
            .get(entity)
            .cloned()
            .ok_or_else(|| Error::UnknownEntity(entity.to_string()))
    }

    /// Sets `entity` to `value`, overwriting any previous value.
    pub fn set(&self, entity: impl Into<String>, value: Value) {
        self.entries.write().insert(entity.into(), value);
    }

    /// Replaces the value of an existing entity and returns the old value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEntity`] if the entity has never been set; the
    /// table is left untouched.
    pub fn replace(&self, entity: &str, value: Value) -> Result<Value, Error> {
        let mut entries = self.entries.write();
        let slot = entries
            .get_mut(entity)
            .ok_or_else(|| Error::UnknownEntity(entity.to_string()))?;
        Ok(std::mem::replace(slot, value))
    }

    /// Returns `true` if the entity has a value.
    #[must_use]
    pub fn contains(&self, entity: &str) -> bool {
        self.entries.read().contains_key(entity)
    }

    /// Returns the number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if no entity has been set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns a deep copy of the whole table.
    ///
    /// Later writes to the table are never visible through the snapshot.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        self.entries.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_then_get_round_trip() {
        let table = StateTable::new();
        table.set("sensor.door", json!({"open": true}));
        assert_eq!(table.get("sensor.door").unwrap(), json!({"open": true}));
    }

    #[test]
    fn get_unknown_entity_fails() {
        let table = StateTable::new();
        assert!(matches!(
            table.get("nope"),
            Err(Error::UnknownEntity(entity)) if entity == "nope"
        ));
    }

    #[test]
    fn set_overwrites() {
        let table = StateTable::new();
        table.set("e1", json!("OFF"));
        table.set("e1", json!("ON"));
        assert_eq!(table.get("e1").unwrap(), json!("ON"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn snapshot_is_isolated_from_later_writes() {
        let table = StateTable::new();
        table.set("e1", json!({"level": 1}));
        let snapshot = table.snapshot();

        table.set("e1", json!({"level": 2}));
        table.set("e2", json!("new"));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot["e1"], json!({"level": 1}));
    }

    #[test]
    fn replace_returns_old_value() {
        let table = StateTable::from_initial(StateSnapshot::from([(
            "e1".to_string(),
            json!("OFF"),
        )]));
        let old = table.replace("e1", json!("ON")).unwrap();
        assert_eq!(old, json!("OFF"));
        assert_eq!(table.get("e1").unwrap(), json!("ON"));
    }

    #[test]
    fn replace_unknown_entity_leaves_table_untouched() {
        let table = StateTable::new();
        assert!(table.replace("ghost", json!(1)).is_err());
        assert!(!table.contains("ghost"));
        assert!(table.is_empty());
    }

    #[test]
    fn concurrent_replaces_observe_every_value_once() {
        use std::sync::Arc;

        let table = Arc::new(StateTable::from_initial(StateSnapshot::from([(
            "counter".to_string(),
            json!(0),
        )])));

        let handles: Vec<_> = (1..=8)
            .map(|n| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || table.replace("counter", json!(n)).unwrap())
            })
            .collect();

        let mut seen: Vec<Value> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        seen.push(table.get("counter").unwrap());
        let mut numbers: Vec<i64> = seen.iter().filter_map(Value::as_i64).collect();
        numbers.sort_unstable();
        assert_eq!(numbers, (0..=8).collect::<Vec<_>>());
    }
}
