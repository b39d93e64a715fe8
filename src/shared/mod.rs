//! Shared types, events, and errors for the routine engine.
//!
//! This is the type contract. Every domain plugin imports from here.
//! Windows, schedules, and the execution context passed to authored
//! callbacks live here so activities, navigation, and quests agree on them.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::calendar::Clock;
use crate::catalog::Catalog;
use crate::storage::history::HistoryRecorder;
use crate::storage::GameStorage;

pub type ActivityId = String;
pub type CharacterId = String;
pub type RoomId = String;
pub type LocationId = String;
pub type MapId = String;
pub type QuestId = String;
pub type StageId = String;

// ═══════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScheduleError {
    #[error("invalid time window: from {from:?} to {to:?}")]
    InvalidTimeWindow { from: Option<f32>, to: Option<f32> },

    #[error("invalid date window: from {from} must be before to {to}")]
    InvalidDateWindow { from: u32, to: u32 },

    #[error("invalid clock settings: {0}")]
    InvalidSettings(String),

    #[error("callback failed: {0}")]
    Callback(String),

    #[error("save failed: {0}")]
    Save(String),
}

// ═══════════════════════════════════════════════════════════════════════
// TIME & DATE WINDOWS
// ═══════════════════════════════════════════════════════════════════════

/// Hour-of-day bounds. `from > to` wraps around midnight.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeWindow {
    pub from: Option<f32>,
    pub to: Option<f32>,
}

impl TimeWindow {
    pub fn between(from: f32, to: f32) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn starting(from: f32) -> Self {
        Self {
            from: Some(from),
            to: None,
        }
    }

    pub fn until(to: f32) -> Self {
        Self {
            from: None,
            to: Some(to),
        }
    }
}

/// Day-number bounds, both inclusive when evaluating activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateWindow {
    pub from: Option<u32>,
    pub to: Option<u32>,
}

impl DateWindow {
    pub fn between(from: u32, to: u32) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn starting(from: u32) -> Self {
        Self {
            from: Some(from),
            to: None,
        }
    }

    pub fn until(to: u32) -> Self {
        Self {
            from: None,
            to: Some(to),
        }
    }
}

/// A snapshot of the clock, taken once per evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Now {
    pub time: f32,
    pub date: u32,
    pub day_start_time: f32,
    pub day_end_time: f32,
}

impl Now {
    /// Missing `from` means one hour before day start, missing `to` one hour
    /// after day end. Windows with `from > to` wrap across midnight.
    pub fn is_within_window(&self, from: Option<f32>, to: Option<f32>) -> bool {
        let from = from.unwrap_or(self.day_start_time - 1.0);
        let to = to.unwrap_or(self.day_end_time + 1.0);
        if from < to {
            self.time >= from && self.time < to
        } else {
            self.time >= from || self.time < to
        }
    }
}

/// Optional time and date windows attached to anything that can be active.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Schedule {
    pub time: Option<TimeWindow>,
    pub date: Option<DateWindow>,
}

impl Schedule {
    pub fn always() -> Self {
        Self::default()
    }

    pub fn is_active(&self, now: &Now) -> bool {
        if let Some(date) = self.date {
            if date.from.is_some_and(|from| from > now.date) {
                return false;
            }
            if date.to.is_some_and(|to| to < now.date) {
                return false;
            }
        }
        now.is_within_window(
            self.time.and_then(|t| t.from),
            self.time.and_then(|t| t.to),
        )
    }

    pub fn expired(&self, now: &Now) -> bool {
        self.date
            .and_then(|d| d.to)
            .is_some_and(|to| to <= now.date)
    }

    /// Replaces bounds with the override's where it sets them.
    pub fn overridden_by(&self, time: Option<TimeWindow>, date: Option<DateWindow>) -> Schedule {
        let own_time = self.time.unwrap_or_default();
        let own_date = self.date.unwrap_or_default();
        Schedule {
            time: match time {
                Some(t) => Some(TimeWindow {
                    from: t.from.or(own_time.from),
                    to: t.to.or(own_time.to),
                }),
                None => self.time,
            },
            date: match date {
                Some(d) => Some(DateWindow {
                    from: d.from.or(own_date.from),
                    to: d.to.or(own_date.to),
                }),
                None => self.date,
            },
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// FLAGS & EXECUTION
// ═══════════════════════════════════════════════════════════════════════

/// Either a literal boolean or the name of a storage flag read at query time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Literal(bool),
    Flag(String),
}

impl Default for FlagValue {
    fn default() -> Self {
        FlagValue::Literal(false)
    }
}

impl From<bool> for FlagValue {
    fn from(value: bool) -> Self {
        FlagValue::Literal(value)
    }
}

impl From<&str> for FlagValue {
    fn from(name: &str) -> Self {
        FlagValue::Flag(name.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionType {
    #[default]
    Interaction,
    Automatic,
}

// ═══════════════════════════════════════════════════════════════════════
// CALLBACK CONTEXT
// ═══════════════════════════════════════════════════════════════════════

/// Everything an authored callback may read or mutate.
pub struct RunContext<'a> {
    pub catalog: &'a Catalog,
    pub clock: &'a Clock,
    pub storage: &'a mut GameStorage,
    pub history: &'a mut dyn HistoryRecorder,
}

impl<'a> RunContext<'a> {
    pub fn new(
        catalog: &'a Catalog,
        clock: &'a Clock,
        storage: &'a mut GameStorage,
        history: &'a mut dyn HistoryRecorder,
    ) -> Self {
        Self {
            catalog,
            clock,
            storage,
            history,
        }
    }
}

pub type Callback<T> =
    Arc<dyn Fn(&T, &mut RunContext<'_>) -> Result<(), ScheduleError> + Send + Sync>;

// ═══════════════════════════════════════════════════════════════════════
// EVENTS
// ═══════════════════════════════════════════════════════════════════════

/// Sent after the player enters a room through the command layer.
#[derive(Event, Debug, Clone, PartialEq, Eq)]
pub struct RoomEnteredEvent {
    pub previous: Option<RoomId>,
    pub room_id: RoomId,
}

/// Sent when the current date differs from the one last observed.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateChangedEvent {
    pub previous: u32,
    pub current: u32,
}
