//! Activities: schedulable things that can happen in a container.
//!
//! An activity is static: its windows and callback are authored once. Only
//! hidden/disabled overrides are stored, keyed by the activity id.

pub mod commitment;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::catalog::Identified;
use crate::shared::*;
use crate::shared::Schedule;
use crate::storage::history;
use crate::storage::{GameStorage, StoredRecord};

/// Stored overrides for an activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityRecord {
    pub hidden: Option<FlagValue>,
    pub disabled: Option<FlagValue>,
}

impl StoredRecord for ActivityRecord {
    const CATEGORY: &'static str = "activity";
}

#[derive(Clone)]
pub struct Activity {
    id: ActivityId,
    name: String,
    schedule: Schedule,
    default_hidden: FlagValue,
    default_disabled: FlagValue,
    on_run: Option<Callback<Activity>>,
}

impl fmt::Debug for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activity")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("schedule", &self.schedule)
            .field("has_callback", &self.on_run.is_some())
            .finish()
    }
}

impl Identified for Activity {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Activity {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            schedule: Schedule::always(),
            default_hidden: FlagValue::Literal(false),
            default_disabled: FlagValue::Literal(false),
            on_run: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_time_window(mut self, from: Option<f32>, to: Option<f32>) -> Self {
        self.schedule.time = Some(TimeWindow { from, to });
        self
    }

    pub fn with_date_window(mut self, from: Option<u32>, to: Option<u32>) -> Self {
        self.schedule.date = Some(DateWindow { from, to });
        self
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn hidden_by(mut self, hidden: impl Into<FlagValue>) -> Self {
        self.default_hidden = hidden.into();
        self
    }

    pub fn disabled_by(mut self, disabled: impl Into<FlagValue>) -> Self {
        self.default_disabled = disabled.into();
        self
    }

    pub fn on_run<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Activity, &mut RunContext<'_>) -> Result<(), ScheduleError> + Send + Sync + 'static,
    {
        self.on_run = Some(Arc::new(callback));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn is_active(&self, now: &Now) -> bool {
        self.schedule.is_active(now)
    }

    /// True from the last day of the date window onward.
    pub fn expired(&self, now: &Now) -> bool {
        self.schedule.expired(now)
    }

    pub fn is_hidden(&self, storage: &GameStorage) -> bool {
        let record: ActivityRecord = storage.load_record(&self.id);
        storage.resolve(record.hidden.as_ref().unwrap_or(&self.default_hidden))
    }

    /// `None` clears the stored override.
    pub fn set_hidden(&self, storage: &mut GameStorage, hidden: Option<FlagValue>) {
        let mut record: ActivityRecord = storage.load_record(&self.id);
        record.hidden = hidden;
        storage.save_record(&self.id, &record);
    }

    pub fn is_disabled(&self, storage: &GameStorage) -> bool {
        let record: ActivityRecord = storage.load_record(&self.id);
        storage.resolve(record.disabled.as_ref().unwrap_or(&self.default_disabled))
    }

    pub fn set_disabled(&self, storage: &mut GameStorage, disabled: Option<FlagValue>) {
        let mut record: ActivityRecord = storage.load_record(&self.id);
        record.disabled = disabled;
        storage.save_record(&self.id, &record);
    }

    /// Records a history step, then invokes the callback.
    pub fn run(&self, ctx: &mut RunContext<'_>) -> Result<(), ScheduleError> {
        history::checkpoint(ctx.storage, ctx.history);
        self.invoke(ctx)
    }

    pub(crate) fn invoke(&self, ctx: &mut RunContext<'_>) -> Result<(), ScheduleError> {
        match &self.on_run {
            Some(callback) => {
                info!("[Routine] Running '{}'", self.id);
                callback(self, ctx)
            }
            None => {
                warn!("[Routine] Activity '{}' has no run callback", self.id);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Clock;
    use crate::catalog::Catalog;
    use crate::storage::history::StepHistory;

    fn now(time: f32, date: u32) -> Now {
        Now {
            time,
            date,
            day_start_time: 0.0,
            day_end_time: 24.0,
        }
    }

    #[test]
    fn activity_without_windows_is_always_active() {
        let activity = Activity::new("read");
        for date in [0, 5, 400] {
            for hour in [0.0, 12.0, 23.9] {
                assert!(activity.is_active(&now(hour, date)));
            }
        }
        assert!(!activity.expired(&now(0.0, 1000)));
    }

    #[test]
    fn wrap_around_time_window() {
        let sleep = Activity::new("sleep").with_time_window(Some(20.0), Some(10.0));
        assert!(sleep.is_active(&now(23.0, 0)));
        assert!(sleep.is_active(&now(9.0, 0)));
        assert!(!sleep.is_active(&now(15.0, 0)));
    }

    #[test]
    fn with_schedule_sets_both_windows() {
        let market = Activity::new("market").with_schedule(Schedule {
            time: Some(TimeWindow::between(8.0, 12.0)),
            date: Some(DateWindow::until(3)),
        });
        assert!(market.is_active(&now(9.0, 2)));
        assert!(!market.is_active(&now(13.0, 2)));
        assert!(!market.is_active(&now(9.0, 4)));
        assert!(market.expired(&now(9.0, 3)));
        assert_eq!(market.schedule().overridden_by(None, None), *market.schedule());
    }

    #[test]
    fn hidden_override_takes_precedence_over_default() {
        let activity = Activity::new("secret").hidden_by("secret_found");
        let mut storage = GameStorage::default();
        assert!(!activity.is_hidden(&storage));
        storage.set_flag("secret_found", true);
        assert!(activity.is_hidden(&storage));

        activity.set_hidden(&mut storage, Some(FlagValue::Literal(false)));
        assert!(!activity.is_hidden(&storage));
        activity.set_hidden(&mut storage, None);
        assert!(activity.is_hidden(&storage));
    }

    #[test]
    fn run_records_step_before_callback() {
        let activity = Activity::new("read").on_run(|_, ctx| {
            ctx.storage.set_flag("has_read", true);
            Ok(())
        });
        let catalog = Catalog::default();
        let clock = Clock::default();
        let mut storage = GameStorage::default();
        let mut history = StepHistory::default();
        let mut ctx = RunContext::new(&catalog, &clock, &mut storage, &mut history);
        activity.run(&mut ctx).expect("callback succeeds");

        assert!(storage.get_flag("has_read"));
        assert_eq!(history.len(), 1);
        assert!(!history.latest().is_some_and(|s| s.get_flag("has_read")));
    }

    #[test]
    fn callback_errors_propagate() {
        let activity = Activity::new("break").on_run(|_, _| Err(ScheduleError::Callback("boom".into())));
        let catalog = Catalog::default();
        let clock = Clock::default();
        let mut storage = GameStorage::default();
        let mut history = StepHistory::default();
        let mut ctx = RunContext::new(&catalog, &clock, &mut storage, &mut history);
        assert_eq!(activity.run(&mut ctx), Err(ScheduleError::Callback("boom".into())));
    }
}
