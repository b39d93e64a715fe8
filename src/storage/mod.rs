//! Game storage: the single home of mutable narrative state.
//!
//! Definitions (activities, rooms, quests) are static and live in the
//! catalog. Everything that changes during play is written here as JSON
//! values under string keys, so one serialization covers save files and
//! history steps alike.

pub mod history;

use bevy::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::shared::*;

pub const CURRENT_ROOM_KEY: &str = "engine:current_room";
pub const TIME_DATA_KEY: &str = "engine:time_data";
pub const LAST_EVENT_KEY: &str = "engine:last_event";

/// Clock position as persisted. Unset fields fall back to clock defaults.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeData {
    pub current_time: Option<f32>,
    pub current_date: Option<u32>,
}

/// The most recent navigation or clock edit, with the value it replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LastEvent {
    RoomChanged {
        prev: Option<RoomId>,
        value: RoomId,
    },
    TimeChanged {
        prev: TimeData,
        value: TimeData,
    },
}

/// Per-id state persisted under `"<category>:<id>"`.
pub trait StoredRecord: Serialize + DeserializeOwned + Default + PartialEq {
    const CATEGORY: &'static str;
}

fn record_key(category: &str, id: &str) -> String {
    format!("{category}:{id}")
}

#[derive(Resource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameStorage {
    values: BTreeMap<String, Value>,
    flags: BTreeMap<String, bool>,
}

impl GameStorage {
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.values.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!("[Storage] Value under '{}' has unexpected shape: {}", key, e);
                None
            }
        }
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(json) => {
                self.values.insert(key.to_string(), json);
            }
            Err(e) => error!("[Storage] Could not store '{}': {}", key, e),
        }
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    // ─── Flags ───────────────────────────────────────────────────────────

    pub fn get_flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    pub fn set_flag(&mut self, name: &str, value: bool) {
        if value {
            self.flags.insert(name.to_string(), true);
        } else {
            self.flags.remove(name);
        }
    }

    pub fn resolve(&self, flag: &FlagValue) -> bool {
        match flag {
            FlagValue::Literal(value) => *value,
            FlagValue::Flag(name) => self.get_flag(name),
        }
    }

    // ─── Records ─────────────────────────────────────────────────────────

    pub fn load_record<R: StoredRecord>(&self, id: &str) -> R {
        self.get(&record_key(R::CATEGORY, id)).unwrap_or_default()
    }

    /// Default records are removed rather than stored.
    pub fn save_record<R: StoredRecord>(&mut self, id: &str, record: &R) {
        let key = record_key(R::CATEGORY, id);
        if *record == R::default() {
            self.values.remove(&key);
        } else {
            self.set(&key, record);
        }
    }

    // ─── Engine keys ─────────────────────────────────────────────────────
    // Raw accessors: they never touch the last event. Navigation and the
    // clock record events on top of these.

    pub fn current_room_id(&self) -> Option<RoomId> {
        self.get(CURRENT_ROOM_KEY)
    }

    pub fn set_current_room_id(&mut self, room_id: Option<&str>) {
        match room_id {
            Some(id) => self.set(CURRENT_ROOM_KEY, &id),
            None => {
                self.values.remove(CURRENT_ROOM_KEY);
            }
        }
    }

    pub fn time_data(&self) -> TimeData {
        self.get(TIME_DATA_KEY).unwrap_or_default()
    }

    pub fn set_time_data(&mut self, data: &TimeData) {
        if *data == TimeData::default() {
            self.values.remove(TIME_DATA_KEY);
        } else {
            self.set(TIME_DATA_KEY, data);
        }
    }

    pub fn last_event(&self) -> Option<LastEvent> {
        self.get(LAST_EVENT_KEY)
    }

    pub fn set_last_event(&mut self, event: &LastEvent) {
        self.set(LAST_EVENT_KEY, event);
    }

    pub fn snapshot(&self) -> GameStorage {
        self.clone()
    }

    pub fn restore(&mut self, snapshot: GameStorage) {
        *self = snapshot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Counter {
        hits: u32,
    }

    impl StoredRecord for Counter {
        const CATEGORY: &'static str = "counter";
    }

    #[test]
    fn records_round_trip_and_default_records_vanish() {
        let mut storage = GameStorage::default();
        storage.save_record("door", &Counter { hits: 2 });
        assert!(storage.contains("counter:door"));
        assert_eq!(storage.load_record::<Counter>("door").hits, 2);

        storage.save_record("door", &Counter::default());
        assert!(!storage.contains("counter:door"));
        assert_eq!(storage.load_record::<Counter>("missing"), Counter::default());
    }

    #[test]
    fn flag_values_resolve_against_storage() {
        let mut storage = GameStorage::default();
        assert!(storage.resolve(&FlagValue::Literal(true)));
        assert!(!storage.resolve(&FlagValue::from("door_unlocked")));
        storage.set_flag("door_unlocked", true);
        assert!(storage.resolve(&FlagValue::from("door_unlocked")));
    }

    #[test]
    fn mismatched_value_reads_as_none() {
        let mut storage = GameStorage::default();
        storage.set("name", &"Alice");
        assert_eq!(storage.get::<String>("name").as_deref(), Some("Alice"));
        assert_eq!(storage.get::<u32>("name"), None);
    }

    #[test]
    fn snapshot_restore_replaces_everything() {
        let mut storage = GameStorage::default();
        storage.set_current_room_id(Some("terrace"));
        let snap = storage.snapshot();
        storage.set_current_room_id(Some("school"));
        storage.set_flag("met_alice", true);
        storage.restore(snap);
        assert_eq!(storage.current_room_id().as_deref(), Some("terrace"));
        assert!(!storage.get_flag("met_alice"));
    }
}
