//! Shared container logic: default activities plus a stored overlay.
//!
//! Rooms, locations, and maps share this shape. The default list is fixed
//! at construction; everything that changes at runtime lives in a
//! `ContainerOverlay` record keyed by the container kind and id.
//!
//! Per activity id a container is in one of four states:
//! default-attached, default-excluded, additionally attached, or not
//! attached. Exclusions and additional attachments may carry an expiry
//! date; `clear_expired_activities` folds passed expiries back in.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::activities::Activity;
use crate::calendar::Clock;
use crate::catalog::Catalog;
use crate::shared::*;
use crate::storage::{GameStorage, StoredRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    Room,
    Location,
    Map,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerKind::Room => write!(f, "room"),
            ContainerKind::Location => write!(f, "location"),
            ContainerKind::Map => write!(f, "map"),
        }
    }
}

/// Override windows for an additional activity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ActiveScheduling {
    pub time_window: Option<TimeWindow>,
    pub date_window: Option<DateWindow>,
}

/// Last date (inclusive) an exclusion or scheduled removal is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedScheduling {
    pub to: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerOverlay {
    pub additional_ids: Vec<ActivityId>,
    pub excluded_ids: Vec<ActivityId>,
    pub active_scheduling: BTreeMap<ActivityId, ActiveScheduling>,
    pub excluded_scheduling: BTreeMap<ActivityId, ExcludedScheduling>,
}

impl StoredRecord for ContainerOverlay {
    const CATEGORY: &'static str = "overlay";
}

/// Optional windows passed to `add_activity`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScheduleOptions {
    pub time_window: Option<TimeWindow>,
    pub date_window: Option<DateWindow>,
}

impl ScheduleOptions {
    pub fn time(from: f32, to: f32) -> Self {
        Self {
            time_window: Some(TimeWindow::between(from, to)),
            date_window: None,
        }
    }

    pub fn dates(from: Option<u32>, to: Option<u32>) -> Self {
        Self {
            time_window: None,
            date_window: Some(DateWindow { from, to }),
        }
    }

    pub fn with_dates(mut self, from: Option<u32>, to: Option<u32>) -> Self {
        self.date_window = Some(DateWindow { from, to });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.time_window.is_none() && self.date_window.is_none()
    }
}

/// Where an activity id stands relative to one container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    Default,
    Excluded { until: Option<u32> },
    Additional { removal_on: Option<u32> },
    NotAttached,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NavigationContainer {
    kind: ContainerKind,
    id: String,
    default_activity_ids: Vec<ActivityId>,
}

impl NavigationContainer {
    pub fn new<A: Into<String>>(
        kind: ContainerKind,
        id: impl Into<String>,
        default_activity_ids: impl IntoIterator<Item = A>,
    ) -> Self {
        Self {
            kind,
            id: id.into(),
            default_activity_ids: default_activity_ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn default_activity_ids(&self) -> &[ActivityId] {
        &self.default_activity_ids
    }

    fn record_id(&self) -> String {
        format!("{}/{}", self.kind, self.id)
    }

    pub fn overlay(&self, storage: &GameStorage) -> ContainerOverlay {
        storage.load_record(&self.record_id())
    }

    fn save_overlay(&self, storage: &mut GameStorage, overlay: &ContainerOverlay) {
        storage.save_record(&self.record_id(), overlay);
    }

    fn is_default(&self, activity_id: &str) -> bool {
        self.default_activity_ids.iter().any(|id| id == activity_id)
    }

    pub fn attachment(&self, storage: &GameStorage, activity_id: &str) -> Attachment {
        let overlay = self.overlay(storage);
        let pending = overlay.excluded_scheduling.get(activity_id).map(|e| e.to);
        if overlay.additional_ids.iter().any(|id| id == activity_id) {
            Attachment::Additional { removal_on: pending }
        } else if overlay.excluded_ids.iter().any(|id| id == activity_id) {
            Attachment::Excluded { until: pending }
        } else if self.is_default(activity_id) {
            Attachment::Default
        } else {
            Attachment::NotAttached
        }
    }

    /// Explicit windows are checked strictly. A time window may wrap past
    /// midnight but must not be empty; a date window must run forward.
    fn validate(&self, clock: &Clock, options: &ScheduleOptions) -> Result<(), ScheduleError> {
        if let Some(window) = options.time_window {
            let from = window.from.unwrap_or(clock.day_start_time() - 1.0);
            let to = window.to.unwrap_or(clock.day_end_time() + 1.0);
            if !from.is_finite() || !to.is_finite() || from == to {
                return Err(ScheduleError::InvalidTimeWindow {
                    from: window.from,
                    to: window.to,
                });
            }
        }
        if let Some(DateWindow {
            from: Some(from),
            to: Some(to),
        }) = options.date_window
        {
            if from >= to {
                return Err(ScheduleError::InvalidDateWindow { from, to });
            }
        }
        Ok(())
    }

    pub fn add_activity(
        &self,
        storage: &mut GameStorage,
        clock: &Clock,
        activity_id: &str,
        options: ScheduleOptions,
    ) -> Result<(), ScheduleError> {
        self.validate(clock, &options)?;
        let mut overlay = self.overlay(storage);

        if self.is_default(activity_id) {
            if let Some(pos) = overlay.excluded_ids.iter().position(|id| id == activity_id) {
                overlay.excluded_ids.remove(pos);
                overlay.excluded_scheduling.remove(activity_id);
                self.save_overlay(storage, &overlay);
                info!("[Navigation] '{}' re-associated with {} '{}'", activity_id, self.kind, self.id);
            } else {
                warn!("[Navigation] '{}' is already a default of {} '{}'", activity_id, self.kind, self.id);
            }
            return Ok(());
        }

        if overlay.additional_ids.iter().any(|id| id == activity_id) {
            if !options.is_empty() {
                overlay.excluded_scheduling.remove(activity_id);
                overlay.active_scheduling.insert(
                    activity_id.to_string(),
                    ActiveScheduling {
                        time_window: options.time_window,
                        date_window: options.date_window,
                    },
                );
                self.save_overlay(storage, &overlay);
                info!("[Navigation] Rescheduled '{}' in {} '{}'", activity_id, self.kind, self.id);
            } else if overlay.excluded_scheduling.remove(activity_id).is_some() {
                self.save_overlay(storage, &overlay);
                info!("[Navigation] '{}' re-associated with {} '{}'", activity_id, self.kind, self.id);
            } else {
                warn!("[Navigation] '{}' already exists in {} '{}'", activity_id, self.kind, self.id);
            }
            return Ok(());
        }

        overlay.additional_ids.push(activity_id.to_string());
        if !options.is_empty() {
            overlay.active_scheduling.insert(
                activity_id.to_string(),
                ActiveScheduling {
                    time_window: options.time_window,
                    date_window: options.date_window,
                },
            );
        }
        self.save_overlay(storage, &overlay);
        info!("[Navigation] Added '{}' to {} '{}'", activity_id, self.kind, self.id);
        Ok(())
    }

    /// With `expiry`, the detachment takes effect after that date instead of now.
    pub fn remove_activity(&self, storage: &mut GameStorage, activity_id: &str, expiry: Option<u32>) {
        let mut overlay = self.overlay(storage);

        if let Some(pos) = overlay.additional_ids.iter().position(|id| id == activity_id) {
            match expiry {
                Some(to) => {
                    overlay
                        .excluded_scheduling
                        .insert(activity_id.to_string(), ExcludedScheduling { to });
                    info!(
                        "[Navigation] '{}' leaves {} '{}' after day {}",
                        activity_id, self.kind, self.id, to
                    );
                }
                None => {
                    overlay.additional_ids.remove(pos);
                    overlay.active_scheduling.remove(activity_id);
                    overlay.excluded_scheduling.remove(activity_id);
                    info!("[Navigation] Removed '{}' from {} '{}'", activity_id, self.kind, self.id);
                }
            }
            self.save_overlay(storage, &overlay);
            return;
        }

        if self.is_default(activity_id) {
            if !overlay.excluded_ids.iter().any(|id| id == activity_id) {
                overlay.excluded_ids.push(activity_id.to_string());
            }
            match expiry {
                Some(to) => {
                    overlay
                        .excluded_scheduling
                        .insert(activity_id.to_string(), ExcludedScheduling { to });
                }
                None => {
                    overlay.excluded_scheduling.remove(activity_id);
                }
            }
            self.save_overlay(storage, &overlay);
            info!("[Navigation] Excluded '{}' from {} '{}'", activity_id, self.kind, self.id);
            return;
        }

        warn!("[Navigation] '{}' not found in {} '{}'", activity_id, self.kind, self.id);
    }

    /// Drops scheduling records whose date bound lies before today.
    pub fn clear_expired_activities(&self, storage: &mut GameStorage, clock: &Clock) -> usize {
        let date = clock.current_date(storage);
        let mut overlay = self.overlay(storage);
        let mut cleared = 0;

        let expired_overrides: Vec<ActivityId> = overlay
            .active_scheduling
            .iter()
            .filter(|(_, s)| s.date_window.and_then(|d| d.to).is_some_and(|to| to < date))
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired_overrides {
            overlay.active_scheduling.remove(&id);
            cleared += 1;
        }

        let lapsed: Vec<ActivityId> = overlay
            .excluded_scheduling
            .iter()
            .filter(|(_, e)| e.to < date)
            .map(|(id, _)| id.clone())
            .collect();
        for id in lapsed {
            overlay.excluded_scheduling.remove(&id);
            if let Some(pos) = overlay.additional_ids.iter().position(|a| *a == id) {
                overlay.additional_ids.remove(pos);
                overlay.active_scheduling.remove(&id);
            }
            overlay.excluded_ids.retain(|e| *e != id);
            cleared += 1;
        }

        if cleared > 0 {
            self.save_overlay(storage, &overlay);
            info!("[Navigation] Cleared {} expired entries in {} '{}'", cleared, self.kind, self.id);
        }
        cleared
    }

    /// Active activities: additional ids first, then defaults, each id once.
    pub fn activities<'c>(&self, catalog: &'c Catalog, storage: &GameStorage, clock: &Clock) -> Vec<&'c Activity> {
        let now = clock.now(storage);
        let overlay = self.overlay(storage);
        let mut active: Vec<&'c Activity> = Vec::new();

        for id in &overlay.additional_ids {
            if overlay.excluded_scheduling.get(id).is_some_and(|e| e.to < now.date) {
                continue;
            }
            let Some(activity) = catalog.find_activity(id) else {
                continue;
            };
            let schedule = match overlay.active_scheduling.get(id) {
                Some(o) => activity.schedule().overridden_by(o.time_window, o.date_window),
                None => *activity.schedule(),
            };
            if schedule.is_active(&now) && !active.iter().any(|a| a.id() == id) {
                active.push(activity);
            }
        }

        for id in &self.default_activity_ids {
            if overlay.excluded_ids.contains(id) {
                let lapsed = overlay.excluded_scheduling.get(id).is_some_and(|e| e.to < now.date);
                if !lapsed {
                    continue;
                }
            }
            let Some(activity) = catalog.find_activity(id) else {
                continue;
            };
            if activity.is_active(&now) && !active.iter().any(|a| a.id() == id) {
                active.push(activity);
            }
        }

        active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Catalog, Clock, GameStorage, NavigationContainer) {
        let mut catalog = Catalog::default();
        catalog.activities.add_all([
            Activity::new("smoke_break"),
            Activity::new("read"),
            Activity::new("alice_smokes"),
        ]);
        let container = NavigationContainer::new(ContainerKind::Room, "terrace", ["smoke_break"]);
        (catalog, Clock::default(), GameStorage::default(), container)
    }

    fn ids(activities: &[&Activity]) -> Vec<String> {
        activities.iter().map(|a| a.id().to_string()).collect()
    }

    #[test]
    fn timed_additional_activity_follows_override_window() {
        let (catalog, clock, mut storage, terrace) = setup();
        terrace
            .add_activity(&mut storage, &clock, "alice_smokes", ScheduleOptions::time(10.0, 20.0))
            .expect("valid window");

        clock.set_current_time(&mut storage, 15.0);
        assert_eq!(ids(&terrace.activities(&catalog, &storage, &clock)), vec!["alice_smokes", "smoke_break"]);
        clock.set_current_time(&mut storage, 21.0);
        assert_eq!(ids(&terrace.activities(&catalog, &storage, &clock)), vec!["smoke_break"]);
    }

    #[test]
    fn wrapping_time_window_is_accepted_but_backwards_dates_are_not() {
        let (_, clock, mut storage, terrace) = setup();
        assert!(terrace
            .add_activity(&mut storage, &clock, "read", ScheduleOptions::time(10.0, 5.0))
            .is_ok());
        assert_eq!(
            terrace.add_activity(&mut storage, &clock, "alice_smokes", ScheduleOptions::dates(Some(10), Some(5))),
            Err(ScheduleError::InvalidDateWindow { from: 10, to: 5 })
        );
        assert_eq!(terrace.attachment(&storage, "alice_smokes"), Attachment::NotAttached);
        assert!(terrace
            .add_activity(&mut storage, &clock, "alice_smokes", ScheduleOptions::time(8.0, 8.0))
            .is_err());
    }

    #[test]
    fn add_then_remove_restores_previous_set() {
        let (catalog, clock, mut storage, terrace) = setup();
        let before = ids(&terrace.activities(&catalog, &storage, &clock));
        let overlay_before = terrace.overlay(&storage);

        terrace
            .add_activity(&mut storage, &clock, "read", ScheduleOptions::default())
            .expect("no windows");
        assert_eq!(terrace.attachment(&storage, "read"), Attachment::Additional { removal_on: None });
        terrace.remove_activity(&mut storage, "read", None);

        assert_eq!(ids(&terrace.activities(&catalog, &storage, &clock)), before);
        assert_eq!(terrace.overlay(&storage), overlay_before);
    }

    #[test]
    fn adding_a_default_twice_is_ignored() {
        let (catalog, clock, mut storage, terrace) = setup();
        terrace
            .add_activity(&mut storage, &clock, "smoke_break", ScheduleOptions::default())
            .expect("no windows");
        assert_eq!(terrace.overlay(&storage), ContainerOverlay::default());
        assert_eq!(ids(&terrace.activities(&catalog, &storage, &clock)), vec!["smoke_break"]);
    }

    #[test]
    fn excluded_default_is_re_associated_by_add() {
        let (catalog, clock, mut storage, terrace) = setup();
        terrace.remove_activity(&mut storage, "smoke_break", None);
        assert!(terrace.activities(&catalog, &storage, &clock).is_empty());
        assert_eq!(terrace.attachment(&storage, "smoke_break"), Attachment::Excluded { until: None });

        terrace
            .add_activity(&mut storage, &clock, "smoke_break", ScheduleOptions::default())
            .expect("no windows");
        assert_eq!(terrace.attachment(&storage, "smoke_break"), Attachment::Default);
    }

    #[test]
    fn timed_exclusion_lapses_after_expiry() {
        let (catalog, clock, mut storage, terrace) = setup();
        terrace.remove_activity(&mut storage, "smoke_break", Some(3));

        clock.set_current_date(&mut storage, 3);
        assert!(terrace.activities(&catalog, &storage, &clock).is_empty());
        clock.set_current_date(&mut storage, 4);
        assert_eq!(ids(&terrace.activities(&catalog, &storage, &clock)), vec!["smoke_break"]);

        assert_eq!(terrace.clear_expired_activities(&mut storage, &clock), 1);
        assert_eq!(terrace.attachment(&storage, "smoke_break"), Attachment::Default);
    }

    #[test]
    fn scheduled_removal_keeps_additional_until_date() {
        let (catalog, clock, mut storage, terrace) = setup();
        terrace
            .add_activity(&mut storage, &clock, "read", ScheduleOptions::default())
            .expect("no windows");
        terrace.remove_activity(&mut storage, "read", Some(2));

        clock.set_current_date(&mut storage, 2);
        assert!(ids(&terrace.activities(&catalog, &storage, &clock)).contains(&"read".to_string()));
        clock.set_current_date(&mut storage, 3);
        assert!(!ids(&terrace.activities(&catalog, &storage, &clock)).contains(&"read".to_string()));

        terrace.clear_expired_activities(&mut storage, &clock);
        assert_eq!(terrace.attachment(&storage, "read"), Attachment::NotAttached);
    }

    #[test]
    fn expired_override_becomes_plain_attachment() {
        let (_, clock, mut storage, terrace) = setup();
        terrace
            .add_activity(&mut storage, &clock, "read", ScheduleOptions::dates(None, Some(2)))
            .expect("open start");
        clock.set_current_date(&mut storage, 2);
        assert_eq!(terrace.clear_expired_activities(&mut storage, &clock), 0);
        clock.set_current_date(&mut storage, 3);
        assert_eq!(terrace.clear_expired_activities(&mut storage, &clock), 1);

        let overlay = terrace.overlay(&storage);
        assert_eq!(overlay.additional_ids, vec!["read".to_string()]);
        assert!(overlay.active_scheduling.is_empty());
    }

    #[test]
    fn re_adding_with_windows_replaces_override() {
        let (_, clock, mut storage, terrace) = setup();
        terrace
            .add_activity(&mut storage, &clock, "read", ScheduleOptions::time(8.0, 10.0))
            .expect("valid");
        terrace
            .add_activity(&mut storage, &clock, "read", ScheduleOptions::time(12.0, 14.0))
            .expect("valid");
        let overlay = terrace.overlay(&storage);
        assert_eq!(overlay.additional_ids.len(), 1);
        assert_eq!(
            overlay.active_scheduling.get("read").and_then(|s| s.time_window),
            Some(TimeWindow::between(12.0, 14.0))
        );
    }

    #[test]
    fn removing_unknown_activity_is_a_no_op() {
        let (_, _, mut storage, terrace) = setup();
        terrace.remove_activity(&mut storage, "ghost", None);
        assert_eq!(terrace.overlay(&storage), ContainerOverlay::default());
    }
}
