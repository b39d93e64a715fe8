//! Quest domain: linear multi-stage quests.
//!
//! A quest is not started until `start` sets its stage index to 0. Each
//! advance fires `on_next_stage`, then the outgoing stage's `on_end`, then
//! initializes the incoming stage and starts it if its gates allow. Moving
//! past the last stage completes the quest.

pub mod stage;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::calendar::Clock;
use crate::catalog::{Catalog, Identified};
use crate::shared::*;
use crate::storage::history::StepHistory;
use crate::storage::{GameStorage, StoredRecord};
use crate::RoutineSet;

use stage::Stage;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestRecord {
    pub current_stage_index: Option<usize>,
    pub failed: bool,
}

impl StoredRecord for QuestRecord {
    const CATEGORY: &'static str = "quest";
}

#[derive(Clone)]
pub struct Quest {
    id: QuestId,
    name: String,
    description: String,
    stages: Vec<Stage>,
    on_start: Option<Callback<Quest>>,
    on_next_stage: Option<Callback<Quest>>,
}

impl fmt::Debug for Quest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Quest")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("stages", &self.stages)
            .finish_non_exhaustive()
    }
}

impl Identified for Quest {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Quest {
    pub fn new(id: impl Into<String>, stages: impl IntoIterator<Item = Stage>) -> Self {
        let id = id.into();
        let stages = stages
            .into_iter()
            .map(|mut stage| {
                stage.assign_quest(&id);
                stage
            })
            .collect();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            stages,
            on_start: None,
            on_next_stage: None,
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

    pub fn on_start<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Quest, &mut RunContext<'_>) -> Result<(), ScheduleError> + Send + Sync + 'static,
    {
        self.on_start = Some(Arc::new(callback));
        self
    }

    pub fn on_next_stage<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Quest, &mut RunContext<'_>) -> Result<(), ScheduleError> + Send + Sync + 'static,
    {
        self.on_next_stage = Some(Arc::new(callback));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    fn record(&self, storage: &GameStorage) -> QuestRecord {
        storage.load_record(&self.id)
    }

    // ─── Derived state ───────────────────────────────────────────────────

    pub fn current_stage_index(&self, storage: &GameStorage) -> Option<usize> {
        self.record(storage).current_stage_index
    }

    pub fn current_stage(&self, storage: &GameStorage) -> Option<&Stage> {
        self.stages.get(self.current_stage_index(storage)?)
    }

    pub fn started(&self, storage: &GameStorage) -> bool {
        self.current_stage_index(storage).is_some()
    }

    pub fn completed(&self, storage: &GameStorage) -> bool {
        self.current_stage_index(storage)
            .is_some_and(|index| index >= self.stages.len())
    }

    pub fn failed(&self, storage: &GameStorage) -> bool {
        self.record(storage).failed
    }

    pub fn in_progress(&self, storage: &GameStorage) -> bool {
        self.started(storage) && !self.completed(storage) && !self.failed(storage)
    }

    pub fn fail(&self, storage: &mut GameStorage) {
        let mut record = self.record(storage);
        record.failed = true;
        storage.save_record(&self.id, &record);
        info!("[Quest] '{}' failed", self.id);
    }

    /// Current stage exists, has not started or completed, and its gates pass.
    pub fn current_stage_must_start(&self, catalog: &Catalog, storage: &GameStorage, clock: &Clock) -> bool {
        self.current_stage(storage).is_some_and(|stage| {
            !stage.started(storage) && !stage.completed(storage) && stage.can_start(catalog, storage, clock)
        })
    }

    // ─── Transitions ─────────────────────────────────────────────────────

    pub fn start(&self, ctx: &mut RunContext<'_>) -> Result<(), ScheduleError> {
        if self.started(ctx.storage) {
            warn!("[Quest] '{}' is already started", self.id);
            return Ok(());
        }
        let Some(first) = self.stages.first() else {
            error!("[Quest] '{}' has no stages", self.id);
            return Ok(());
        };
        let mut record = self.record(ctx.storage);
        record.current_stage_index = Some(0);
        ctx.storage.save_record(&self.id, &record);
        info!("[Quest] '{}' started", self.id);

        if let Some(callback) = &self.on_start {
            callback(self, ctx)?;
        }
        first.initialize(ctx.storage, ctx.clock);
        first.start(ctx)
    }

    /// Advances only when the current stage is complete.
    pub fn advance_if_completed(&self, ctx: &mut RunContext<'_>) -> Result<bool, ScheduleError> {
        if !self.in_progress(ctx.storage) {
            return Ok(false);
        }
        match self.current_stage(ctx.storage) {
            Some(stage) if stage.completed(ctx.storage) => self.advance_unconditionally(ctx),
            _ => Ok(false),
        }
    }

    /// Completes the current stage and advances, starting the quest first
    /// if needed.
    pub fn continue_quest(&self, ctx: &mut RunContext<'_>) -> Result<bool, ScheduleError> {
        if !self.started(ctx.storage) {
            self.start(ctx)?;
        }
        if !self.in_progress(ctx.storage) {
            warn!("[Quest] '{}' is not in progress", self.id);
            return Ok(false);
        }
        let Some(stage) = self.current_stage(ctx.storage) else {
            error!("[Quest] '{}' has no current stage", self.id);
            return Ok(false);
        };
        stage.set_completed(ctx.storage, true);
        self.advance_unconditionally(ctx)
    }

    pub fn advance_unconditionally(&self, ctx: &mut RunContext<'_>) -> Result<bool, ScheduleError> {
        if !self.in_progress(ctx.storage) {
            warn!("[Quest] '{}' is not in progress", self.id);
            return Ok(false);
        }
        let Some(index) = self.current_stage_index(ctx.storage) else {
            return Ok(false);
        };
        let Some(outgoing) = self.stages.get(index) else {
            error!("[Quest] '{}' has no stage {}", self.id, index);
            return Ok(false);
        };

        let mut record = self.record(ctx.storage);
        record.current_stage_index = Some(index + 1);
        ctx.storage.save_record(&self.id, &record);

        if let Some(callback) = &self.on_next_stage {
            callback(self, ctx)?;
        }
        outgoing.end(ctx)?;

        match self.stages.get(index + 1) {
            Some(next) => {
                next.initialize(ctx.storage, ctx.clock);
                info!("[Quest] '{}' moved to stage '{}'", self.id, next.id());
                if self.current_stage_must_start(ctx.catalog, ctx.storage, ctx.clock) {
                    next.start(ctx)?;
                }
            }
            None => info!("[Quest] '{}' completed", self.id),
        }
        Ok(true)
    }

    /// Starts the current stage if it is waiting on nothing.
    pub fn start_current_stage_if_due(&self, ctx: &mut RunContext<'_>) -> Result<bool, ScheduleError> {
        if !self.in_progress(ctx.storage) || !self.current_stage_must_start(ctx.catalog, ctx.storage, ctx.clock) {
            return Ok(false);
        }
        match self.current_stage(ctx.storage) {
            Some(stage) => {
                stage.start(ctx)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// QUEST MANAGER QUERIES
// ═══════════════════════════════════════════════════════════════════════

/// Silent lookup, for content that probes optional quests.
pub fn find_quest<'c>(catalog: &'c Catalog, id: &str) -> Option<&'c Quest> {
    catalog.quests.find(id)
}

pub fn not_started_quests<'c>(catalog: &'c Catalog, storage: &GameStorage) -> Vec<&'c Quest> {
    catalog.quests.values().iter().filter(|q| !q.started(storage)).collect()
}

pub fn started_quests<'c>(catalog: &'c Catalog, storage: &GameStorage) -> Vec<&'c Quest> {
    catalog.quests.values().iter().filter(|q| q.started(storage)).collect()
}

pub fn in_progress_quests<'c>(catalog: &'c Catalog, storage: &GameStorage) -> Vec<&'c Quest> {
    catalog.quests.values().iter().filter(|q| q.in_progress(storage)).collect()
}

pub fn completed_quests<'c>(catalog: &'c Catalog, storage: &GameStorage) -> Vec<&'c Quest> {
    catalog.quests.values().iter().filter(|q| q.completed(storage)).collect()
}

pub fn failed_quests<'c>(catalog: &'c Catalog, storage: &GameStorage) -> Vec<&'c Quest> {
    catalog.quests.values().iter().filter(|q| q.failed(storage)).collect()
}

/// Starts every in-progress quest's current stage whose gates now pass.
pub fn start_stages_that_must_start(ctx: &mut RunContext<'_>) -> Result<usize, ScheduleError> {
    let catalog = ctx.catalog;
    let mut started = 0;
    for quest in catalog.quests.values() {
        if quest.start_current_stage_if_due(ctx)? {
            started += 1;
        }
    }
    Ok(started)
}

// ═══════════════════════════════════════════════════════════════════════
// PLUGIN
// ═══════════════════════════════════════════════════════════════════════

pub struct QuestPlugin;

impl Plugin for QuestPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            start_pending_stages_on_date_change.in_set(RoutineSet::React),
        );
    }
}

fn start_pending_stages_on_date_change(
    mut date_events: EventReader<DateChangedEvent>,
    catalog: Res<Catalog>,
    clock: Res<Clock>,
    mut storage: ResMut<GameStorage>,
    mut history: ResMut<StepHistory>,
) {
    let Some(change) = date_events.read().last().copied() else {
        return;
    };
    let mut ctx = RunContext::new(&catalog, &clock, &mut storage, &mut *history);
    match start_stages_that_must_start(&mut ctx) {
        Ok(0) => {}
        Ok(count) => info!("[Quest] Day {} started {} waiting stages", change.current, count),
        Err(e) => error!("[Quest] Starting waiting stages failed: {}", e),
    }
}
