//! Commitments bind characters to a room for as long as they are active.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::catalog::Identified;
use crate::shared::*;
use crate::storage::history;
use crate::storage::{GameStorage, StoredRecord};

use super::Activity;

/// Stored overrides for a commitment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitmentRecord {
    pub hidden: Option<FlagValue>,
    pub disabled: Option<FlagValue>,
    pub execution_type: Option<ExecutionType>,
    pub priority: Option<i32>,
}

impl StoredRecord for CommitmentRecord {
    const CATEGORY: &'static str = "commitment";
}

#[derive(Clone)]
pub struct Commitment {
    activity: Activity,
    characters: Vec<CharacterId>,
    room_id: RoomId,
    default_execution_type: ExecutionType,
    default_priority: i32,
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Commitment")
            .field("activity", &self.activity)
            .field("characters", &self.characters)
            .field("room_id", &self.room_id)
            .field("default_execution_type", &self.default_execution_type)
            .field("default_priority", &self.default_priority)
            .finish()
    }
}

impl Identified for Commitment {
    fn id(&self) -> &str {
        self.activity.id()
    }
}

impl Commitment {
    pub fn new<C: Into<String>>(
        id: impl Into<String>,
        characters: impl IntoIterator<Item = C>,
        room_id: impl Into<String>,
    ) -> Self {
        Self {
            activity: Activity::new(id),
            characters: characters.into_iter().map(Into::into).collect(),
            room_id: room_id.into(),
            default_execution_type: ExecutionType::Interaction,
            default_priority: 0,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.activity = self.activity.with_name(name);
        self
    }

    pub fn with_time_window(mut self, from: Option<f32>, to: Option<f32>) -> Self {
        self.activity = self.activity.with_time_window(from, to);
        self
    }

    pub fn with_date_window(mut self, from: Option<u32>, to: Option<u32>) -> Self {
        self.activity = self.activity.with_date_window(from, to);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.default_priority = priority;
        self
    }

    pub fn automatic(mut self) -> Self {
        self.default_execution_type = ExecutionType::Automatic;
        self
    }

    pub fn hidden_by(mut self, hidden: impl Into<FlagValue>) -> Self {
        self.activity = self.activity.hidden_by(hidden);
        self
    }

    pub fn on_run<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Activity, &mut RunContext<'_>) -> Result<(), ScheduleError> + Send + Sync + 'static,
    {
        self.activity = self.activity.on_run(callback);
        self
    }

    pub fn id(&self) -> &str {
        self.activity.id()
    }

    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    pub fn characters(&self) -> &[CharacterId] {
        &self.characters
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn is_active(&self, now: &Now) -> bool {
        self.activity.is_active(now)
    }

    pub fn is_hidden(&self, storage: &GameStorage) -> bool {
        let record: CommitmentRecord = storage.load_record(self.id());
        storage.resolve(record.hidden.as_ref().unwrap_or(&self.activity.default_hidden))
    }

    pub fn set_hidden(&self, storage: &mut GameStorage, hidden: Option<FlagValue>) {
        let mut record: CommitmentRecord = storage.load_record(self.id());
        record.hidden = hidden;
        storage.save_record(self.id(), &record);
    }

    pub fn is_disabled(&self, storage: &GameStorage) -> bool {
        let record: CommitmentRecord = storage.load_record(self.id());
        storage.resolve(record.disabled.as_ref().unwrap_or(&self.activity.default_disabled))
    }

    pub fn set_disabled(&self, storage: &mut GameStorage, disabled: Option<FlagValue>) {
        let mut record: CommitmentRecord = storage.load_record(self.id());
        record.disabled = disabled;
        storage.save_record(self.id(), &record);
    }

    pub fn execution_type(&self, storage: &GameStorage) -> ExecutionType {
        let record: CommitmentRecord = storage.load_record(self.id());
        record.execution_type.unwrap_or(self.default_execution_type)
    }

    pub fn set_execution_type(&self, storage: &mut GameStorage, value: Option<ExecutionType>) {
        let mut record: CommitmentRecord = storage.load_record(self.id());
        record.execution_type = value;
        storage.save_record(self.id(), &record);
    }

    pub fn priority(&self, storage: &GameStorage) -> i32 {
        let record: CommitmentRecord = storage.load_record(self.id());
        record.priority.unwrap_or(self.default_priority)
    }

    pub fn set_priority(&self, storage: &mut GameStorage, value: Option<i32>) {
        let mut record: CommitmentRecord = storage.load_record(self.id());
        record.priority = value;
        storage.save_record(self.id(), &record);
    }

    /// Automatic commitments react to the last room or clock edit, so their
    /// history step is taken as the state stood before that edit.
    pub fn run(&self, ctx: &mut RunContext<'_>) -> Result<(), ScheduleError> {
        match self.execution_type(ctx.storage) {
            ExecutionType::Automatic => history::checkpoint_before_last_event(ctx.storage, ctx.history),
            ExecutionType::Interaction => history::checkpoint(ctx.storage, ctx.history),
        }
        self.activity.invoke(ctx)
    }
}
