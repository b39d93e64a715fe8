//! Storage snapshots taken before player-visible actions.

use bevy::prelude::*;
use std::collections::VecDeque;

use super::{GameStorage, LastEvent};

/// Receives one snapshot per history step. Hosts may forward these to an
/// external undo stack; the engine ships [`StepHistory`].
pub trait HistoryRecorder {
    fn record_step(&mut self, storage: &GameStorage);
}

pub const DEFAULT_HISTORY_CAPACITY: usize = 64;

#[derive(Resource, Debug, Clone)]
pub struct StepHistory {
    steps: VecDeque<GameStorage>,
    capacity: usize,
}

impl Default for StepHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl StepHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            steps: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn latest(&self) -> Option<&GameStorage> {
        self.steps.back()
    }

    pub fn clear(&mut self) {
        self.steps.clear();
    }

    /// Restores the newest step into `storage` and drops it.
    pub fn rollback(&mut self, storage: &mut GameStorage) -> bool {
        match self.steps.pop_back() {
            Some(step) => {
                storage.restore(step);
                info!("[History] Rolled back one step ({} left)", self.steps.len());
                true
            }
            None => {
                warn!("[History] Nothing to roll back");
                false
            }
        }
    }
}

impl HistoryRecorder for StepHistory {
    fn record_step(&mut self, storage: &GameStorage) {
        if self.steps.len() == self.capacity {
            self.steps.pop_front();
        }
        self.steps.push_back(storage.snapshot());
    }
}

/// Records a plain step of the current state.
pub fn checkpoint(storage: &GameStorage, history: &mut dyn HistoryRecorder) {
    history.record_step(storage);
}

/// Records a step as the state stood before the last room or clock edit.
///
/// Automatic commitments fire in response to that edit, so their step must
/// roll back past it too. Storage is left exactly as it was found.
pub fn checkpoint_before_last_event(storage: &mut GameStorage, history: &mut dyn HistoryRecorder) {
    match storage.last_event() {
        Some(LastEvent::RoomChanged { prev, .. }) => {
            let live = storage.current_room_id();
            storage.set_current_room_id(prev.as_deref());
            history.record_step(storage);
            storage.set_current_room_id(live.as_deref());
        }
        Some(LastEvent::TimeChanged { prev, .. }) => {
            let live = storage.time_data();
            storage.set_time_data(&prev);
            history.record_step(storage);
            storage.set_time_data(&live);
        }
        None => history.record_step(storage),
    }
}
