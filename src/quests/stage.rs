//! Quest stages and their start gates.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::calendar::Clock;
use crate::catalog::Catalog;
use crate::shared::*;
use crate::storage::{GameStorage, StoredRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageRecord {
    pub started: bool,
    pub completed: bool,
    pub initialize_date: Option<u32>,
}

impl StoredRecord for StageRecord {
    const CATEGORY: &'static str = "stage";
}

/// Another quest must have reached (or passed) `stage_number`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestRequirement {
    pub quest_id: QuestId,
    pub stage_number: usize,
}

#[derive(Clone)]
pub struct Stage {
    id: StageId,
    quest_id: QuestId,
    name: String,
    description: String,
    request_description: String,
    delta_date_required: u32,
    quests_required: Vec<QuestRequirement>,
    flags_required: Vec<String>,
    goal_flags: Vec<String>,
    on_start: Option<Callback<Stage>>,
    on_end: Option<Callback<Stage>>,
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("id", &self.id)
            .field("quest_id", &self.quest_id)
            .field("delta_date_required", &self.delta_date_required)
            .field("quests_required", &self.quests_required)
            .field("flags_required", &self.flags_required)
            .field("goal_flags", &self.goal_flags)
            .finish_non_exhaustive()
    }
}

impl Stage {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            quest_id: String::new(),
            description: String::new(),
            request_description: String::new(),
            delta_date_required: 0,
            quests_required: Vec::new(),
            flags_required: Vec::new(),
            goal_flags: Vec::new(),
            on_start: None,
            on_end: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_request_description(mut self, text: impl Into<String>) -> Self {
        self.request_description = text.into();
        self
    }

    pub fn after_days(mut self, days: u32) -> Self {
        self.delta_date_required = days;
        self
    }

    pub fn requires_quest(mut self, quest_id: impl Into<String>, stage_number: usize) -> Self {
        self.quests_required.push(QuestRequirement {
            quest_id: quest_id.into(),
            stage_number,
        });
        self
    }

    pub fn requires_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags_required.push(flag.into());
        self
    }

    /// Setting every goal flag completes the stage.
    pub fn goal_flag(mut self, flag: impl Into<String>) -> Self {
        self.goal_flags.push(flag.into());
        self
    }

    pub fn on_start<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Stage, &mut RunContext<'_>) -> Result<(), ScheduleError> + Send + Sync + 'static,
    {
        self.on_start = Some(Arc::new(callback));
        self
    }

    pub fn on_end<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Stage, &mut RunContext<'_>) -> Result<(), ScheduleError> + Send + Sync + 'static,
    {
        self.on_end = Some(Arc::new(callback));
        self
    }

    pub(crate) fn assign_quest(&mut self, quest_id: &str) {
        self.quest_id = quest_id.to_string();
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn quest_id(&self) -> &str {
        &self.quest_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn request_description(&self) -> &str {
        &self.request_description
    }

    pub fn delta_date_required(&self) -> u32 {
        self.delta_date_required
    }

    fn record_id(&self) -> String {
        format!("{}/{}", self.quest_id, self.id)
    }

    fn record(&self, storage: &GameStorage) -> StageRecord {
        storage.load_record(&self.record_id())
    }

    fn update(&self, storage: &mut GameStorage, edit: impl FnOnce(&mut StageRecord)) {
        let mut record = self.record(storage);
        edit(&mut record);
        storage.save_record(&self.record_id(), &record);
    }

    pub fn started(&self, storage: &GameStorage) -> bool {
        self.record(storage).started
    }

    pub fn completed(&self, storage: &GameStorage) -> bool {
        self.record(storage).completed
            || (!self.goal_flags.is_empty() && self.goal_flags.iter().all(|f| storage.get_flag(f)))
    }

    pub fn set_completed(&self, storage: &mut GameStorage, completed: bool) {
        self.update(storage, |r| r.completed = completed);
    }

    pub fn initialize_date(&self, storage: &GameStorage) -> Option<u32> {
        self.record(storage).initialize_date
    }

    /// Earliest date the stage may start, for display.
    pub fn start_date(&self, storage: &GameStorage) -> Option<u32> {
        self.initialize_date(storage)
            .map(|date| date.saturating_add(self.delta_date_required))
    }

    /// Records today as the day the stage became current.
    pub(crate) fn initialize(&self, storage: &mut GameStorage, clock: &Clock) {
        let today = clock.current_date(storage);
        self.update(storage, |r| r.initialize_date = Some(today));
    }

    pub fn can_start(&self, catalog: &Catalog, storage: &GameStorage, clock: &Clock) -> bool {
        if self.delta_date_required > 0 {
            let Some(initialized) = self.initialize_date(storage) else {
                return false;
            };
            if initialized.saturating_add(self.delta_date_required) > clock.current_date(storage) {
                return false;
            }
        }
        for requirement in &self.quests_required {
            let reached = catalog
                .quests
                .get(&requirement.quest_id)
                .and_then(|quest| quest.current_stage_index(storage))
                .is_some_and(|index| index >= requirement.stage_number);
            if !reached {
                return false;
            }
        }
        self.flags_required.iter().all(|f| storage.get_flag(f))
    }

    pub fn start(&self, ctx: &mut RunContext<'_>) -> Result<(), ScheduleError> {
        if !self.can_start(ctx.catalog, ctx.storage, ctx.clock) {
            info!("[Quest] Stage '{}' of '{}' cannot start yet", self.id, self.quest_id);
            return Ok(());
        }
        self.update(ctx.storage, |r| r.started = true);
        info!("[Quest] Stage '{}' of '{}' started", self.id, self.quest_id);
        if let Some(callback) = &self.on_start {
            callback(self, ctx)?;
        }
        Ok(())
    }

    pub(crate) fn end(&self, ctx: &mut RunContext<'_>) -> Result<(), ScheduleError> {
        match &self.on_end {
            Some(callback) => callback(self, ctx),
            None => Ok(()),
        }
    }
}
