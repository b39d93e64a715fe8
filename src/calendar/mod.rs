//! Calendar domain: the narrative clock.
//!
//! Responsible for:
//! - Holding clock settings (day bounds, time slots, week layout)
//! - Reading and editing the current time and date in `GameStorage`
//! - Rolling time over into the next date
//! - Sending `DateChangedEvent` whenever the stored date moves

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::shared::*;
use crate::storage::{GameStorage, LastEvent, TimeData};
use crate::RoutineSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub name: String,
    pub start_time: f32,
}

impl TimeSlot {
    pub fn new(name: impl Into<String>, start_time: f32) -> Self {
        Self {
            name: name.into(),
            start_time,
        }
    }
}

/// Clock configuration, loadable from RON. Unset fields take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockSettings {
    pub day_start_time: f32,
    pub day_end_time: f32,
    pub default_time_spent: f32,
    pub time_slots: Vec<TimeSlot>,
    pub week_length: u32,
    /// 1-based week day on which the weekend begins. Defaults to the
    /// second-to-last day of the week.
    pub weekend_start_day: Option<u32>,
    pub week_day_names: Vec<String>,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            day_start_time: 0.0,
            day_end_time: 24.0,
            default_time_spent: 1.0,
            time_slots: Vec::new(),
            week_length: 7,
            weekend_start_day: None,
            week_day_names: Vec::new(),
        }
    }
}

impl ClockSettings {
    pub fn from_ron(source: &str) -> Result<Self, ScheduleError> {
        ron::from_str(source).map_err(|e| ScheduleError::InvalidSettings(e.to_string()))
    }
}

pub type DayNameResolver = Arc<dyn Fn(u32) -> String + Send + Sync>;

#[derive(Resource, Clone)]
pub struct Clock {
    day_start_time: f32,
    day_end_time: f32,
    default_time_spent: f32,
    time_slots: Vec<TimeSlot>,
    week_length: u32,
    weekend_start_day: u32,
    week_day_names: Vec<String>,
    day_name_resolver: Option<DayNameResolver>,
}

impl fmt::Debug for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clock")
            .field("day_start_time", &self.day_start_time)
            .field("day_end_time", &self.day_end_time)
            .field("default_time_spent", &self.default_time_spent)
            .field("time_slots", &self.time_slots)
            .field("week_length", &self.week_length)
            .field("weekend_start_day", &self.weekend_start_day)
            .field("week_day_names", &self.week_day_names)
            .finish_non_exhaustive()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(ClockSettings::default())
    }
}

impl Clock {
    pub fn new(settings: ClockSettings) -> Self {
        let mut clock = Self {
            day_start_time: 0.0,
            day_end_time: 24.0,
            default_time_spent: 1.0,
            time_slots: Vec::new(),
            week_length: 7,
            weekend_start_day: 6,
            week_day_names: Vec::new(),
            day_name_resolver: None,
        };
        clock.initialize(settings);
        clock
    }

    /// Replaces every setting. A custom day-name resolver survives. An
    /// out-of-range weekend start is ignored and the previous one kept, if
    /// it still fits the new week.
    pub fn initialize(&mut self, settings: ClockSettings) {
        let week_length = settings.week_length.max(1);
        let default_weekend = week_length.saturating_sub(1).max(1);
        let previous_weekend = if self.weekend_start_day < week_length {
            self.weekend_start_day
        } else {
            default_weekend
        };
        self.day_start_time = settings.day_start_time;
        self.day_end_time = settings.day_end_time;
        self.default_time_spent = settings.default_time_spent;
        self.time_slots = settings.time_slots;
        self.week_length = week_length;
        self.weekend_start_day = match settings.weekend_start_day {
            Some(day) if day >= week_length => {
                error!(
                    "[Calendar] Weekend start day {} must be before week length {}; keeping {}",
                    day, week_length, previous_weekend
                );
                previous_weekend
            }
            Some(day) => day,
            None => default_weekend,
        };
        self.week_day_names = settings.week_day_names;
        info!(
            "[Calendar] Clock initialized: day {}..{}, {} day week, {} time slots",
            self.day_start_time,
            self.day_end_time,
            self.week_length,
            self.time_slots.len()
        );
    }

    pub fn set_day_name_resolver(&mut self, resolver: impl Fn(u32) -> String + Send + Sync + 'static) {
        self.day_name_resolver = Some(Arc::new(resolver));
    }

    pub fn day_start_time(&self) -> f32 {
        self.day_start_time
    }

    pub fn day_end_time(&self) -> f32 {
        self.day_end_time
    }

    pub fn default_time_spent(&self) -> f32 {
        self.default_time_spent
    }

    pub fn time_slots(&self) -> &[TimeSlot] {
        &self.time_slots
    }

    pub fn week_length(&self) -> u32 {
        self.week_length
    }

    pub fn weekend_start_day(&self) -> u32 {
        self.weekend_start_day
    }

    pub fn now(&self, storage: &GameStorage) -> Now {
        Now {
            time: self.current_time(storage),
            date: self.current_date(storage),
            day_start_time: self.day_start_time,
            day_end_time: self.day_end_time,
        }
    }

    // ─── Time & date ─────────────────────────────────────────────────────

    pub fn current_time(&self, storage: &GameStorage) -> f32 {
        storage
            .time_data()
            .current_time
            .unwrap_or(self.day_start_time)
    }

    pub fn current_date(&self, storage: &GameStorage) -> u32 {
        storage.time_data().current_date.unwrap_or(0)
    }

    pub fn set_current_time(&self, storage: &mut GameStorage, value: f32) {
        let prev = storage.time_data();
        let next = TimeData {
            current_time: Some(value),
            ..prev
        };
        self.write_time_data(storage, prev, next);
    }

    pub fn set_current_date(&self, storage: &mut GameStorage, value: u32) {
        let prev = storage.time_data();
        let next = TimeData {
            current_date: Some(value),
            ..prev
        };
        self.write_time_data(storage, prev, next);
    }

    fn write_time_data(&self, storage: &mut GameStorage, prev: TimeData, value: TimeData) {
        storage.set_time_data(&value);
        storage.set_last_event(&LastEvent::TimeChanged { prev, value });
    }

    /// Advances the time, rolling into following dates past day end.
    /// Returns the new time.
    pub fn increase_time(&self, storage: &mut GameStorage, delta: Option<f32>) -> f32 {
        let delta = delta.unwrap_or(self.default_time_spent);
        let current = self.current_time(storage);
        if !delta.is_finite() {
            warn!("[Calendar] Ignoring non-finite time increase {}", delta);
            return current;
        }
        let new_time = current + delta;
        if new_time < self.day_end_time {
            self.set_current_time(storage, new_time);
            return new_time;
        }
        let overflow = new_time - self.day_end_time;
        let day_length = self.day_end_time - self.day_start_time;
        let (days, new_time) = if day_length > 0.0 {
            // Float-to-int `as` saturates.
            let whole = (overflow / day_length).floor() as u32;
            (whole.saturating_add(1), self.day_start_time + overflow.rem_euclid(day_length))
        } else {
            (1, self.day_start_time + overflow)
        };
        self.increase_date(storage, Some(days), Some(new_time));
        new_time
    }

    /// Advances the date (default one day) and sets the time (default day
    /// start). Returns the new date.
    pub fn increase_date(&self, storage: &mut GameStorage, delta: Option<u32>, time: Option<f32>) -> u32 {
        let prev = storage.time_data();
        let date = self.current_date(storage).saturating_add(delta.unwrap_or(1));
        let next = TimeData {
            current_time: Some(time.unwrap_or(self.day_start_time)),
            current_date: Some(date),
        };
        self.write_time_data(storage, prev, next);
        date
    }

    pub fn is_within_window(&self, storage: &GameStorage, from: Option<f32>, to: Option<f32>) -> bool {
        self.now(storage).is_within_window(from, to)
    }

    // ─── Week & slots ────────────────────────────────────────────────────

    /// 1-based day of the week.
    pub fn current_week_day_number(&self, storage: &GameStorage) -> u32 {
        self.current_date(storage) % self.week_length + 1
    }

    pub fn is_weekend(&self, storage: &GameStorage) -> bool {
        self.current_week_day_number(storage) >= self.weekend_start_day
    }

    /// The resolver receives the zero-based week day. Configured names are
    /// used when no resolver is set.
    pub fn current_day_name(&self, storage: &GameStorage) -> String {
        let index = self.current_week_day_number(storage) - 1;
        if let Some(resolver) = &self.day_name_resolver {
            return resolver(index);
        }
        match self.week_day_names.get(index as usize) {
            Some(name) => name.clone(),
            None => {
                warn!("[Calendar] No day name configured for week day {}", index);
                String::new()
            }
        }
    }

    /// Slot whose `[start, next start)` window holds the current time. Times
    /// before the first slot wrap into the last one.
    pub fn current_time_slot_index(&self, storage: &GameStorage) -> usize {
        if self.time_slots.is_empty() {
            warn!("[Calendar] No time slots configured");
            return 0;
        }
        let now = self.now(storage);
        let last = self.time_slots.len() - 1;
        self.time_slots
            .windows(2)
            .position(|pair| now.is_within_window(Some(pair[0].start_time), Some(pair[1].start_time)))
            .unwrap_or(last)
    }

    pub fn current_time_slot(&self, storage: &GameStorage) -> Option<&TimeSlot> {
        self.time_slots.get(self.current_time_slot_index(storage))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// PLUGIN
// ═══════════════════════════════════════════════════════════════════════

/// Last date the calendar observed, used to detect changes between frames.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct ObservedDate(pub Option<u32>);

pub struct CalendarPlugin;

impl Plugin for CalendarPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<Clock>()
            .init_resource::<ObservedDate>()
            .add_event::<DateChangedEvent>()
            .add_systems(Update, detect_date_change.in_set(RoutineSet::Detect));
    }
}

pub fn detect_date_change(
    clock: Res<Clock>,
    storage: Res<GameStorage>,
    mut observed: ResMut<ObservedDate>,
    mut date_events: EventWriter<DateChangedEvent>,
) {
    let current = clock.current_date(&storage);
    match observed.0 {
        Some(previous) if previous != current => {
            info!("[Calendar] Date changed {} -> {} ({})", previous, current, clock.current_day_name(&storage));
            date_events.send(DateChangedEvent { previous, current });
        }
        _ => {}
    }
    observed.0 = Some(current);
}
