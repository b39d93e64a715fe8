//! Save/load for the routine engine.
//!
//! All mutable narrative state lives in `GameStorage`, so a save file is a
//! versioned snapshot of it. Writes go to a temp file that is then renamed
//! over the target. Loading replaces storage wholesale and clears the step
//! history, since old steps belong to a different timeline.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::calendar::ObservedDate;
use crate::shared::ScheduleError;
use crate::storage::history::StepHistory;
use crate::storage::GameStorage;

pub const SAVE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveFile {
    pub version: u32,
    pub storage: GameStorage,
}

// ═══════════════════════════════════════════════════════════════════════
// EVENTS
// ═══════════════════════════════════════════════════════════════════════

/// Sent by the host to write storage to `path`.
#[derive(Event, Debug, Clone)]
pub struct SaveRequestEvent {
    pub path: PathBuf,
}

/// Sent by the host to replace storage with the save at `path`.
#[derive(Event, Debug, Clone)]
pub struct LoadRequestEvent {
    pub path: PathBuf,
}

/// Sent by SavePlugin after a save completes (success or failure).
#[derive(Event, Debug, Clone)]
pub struct SaveCompleteEvent {
    pub path: PathBuf,
    pub success: bool,
    pub error_message: Option<String>,
}

/// Sent by SavePlugin after a load completes.
#[derive(Event, Debug, Clone)]
pub struct LoadCompleteEvent {
    pub path: PathBuf,
    pub success: bool,
    pub error_message: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════
// PLUGIN
// ═══════════════════════════════════════════════════════════════════════

pub struct SavePlugin;

impl Plugin for SavePlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<SaveRequestEvent>()
            .add_event::<LoadRequestEvent>()
            .add_event::<SaveCompleteEvent>()
            .add_event::<LoadCompleteEvent>()
            .add_systems(Update, (handle_save_request, handle_load_request).chain());
    }
}

// ═══════════════════════════════════════════════════════════════════════
// FILE IO
// ═══════════════════════════════════════════════════════════════════════

pub fn write_save(path: &Path, storage: &GameStorage) -> Result<(), ScheduleError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .map_err(|e| ScheduleError::Save(format!("Could not create {}: {}", dir.display(), e)))?;
    }

    let file = SaveFile {
        version: SAVE_VERSION,
        storage: storage.clone(),
    };
    let json = serde_json::to_string_pretty(&file)
        .map_err(|e| ScheduleError::Save(format!("Serialization failed: {}", e)))?;

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &json)
        .map_err(|e| ScheduleError::Save(format!("Write failed for {}: {}", tmp_path.display(), e)))?;
    fs::rename(&tmp_path, path).map_err(|e| ScheduleError::Save(format!("Rename failed: {}", e)))?;
    Ok(())
}

pub fn read_save(path: &Path) -> Result<SaveFile, ScheduleError> {
    if !path.exists() {
        return Err(ScheduleError::Save(format!("{} does not exist", path.display())));
    }
    let json = fs::read_to_string(path)
        .map_err(|e| ScheduleError::Save(format!("Read failed for {}: {}", path.display(), e)))?;
    let file: SaveFile = serde_json::from_str(&json)
        .map_err(|e| ScheduleError::Save(format!("Deserialization failed: {}", e)))?;

    if file.version != SAVE_VERSION {
        warn!(
            "[Save] {} has version {} but current version is {}. Attempting to load anyway.",
            path.display(),
            file.version,
            SAVE_VERSION
        );
    }
    Ok(file)
}

// ═══════════════════════════════════════════════════════════════════════
// SYSTEMS
// ═══════════════════════════════════════════════════════════════════════

fn handle_save_request(
    mut save_events: EventReader<SaveRequestEvent>,
    mut complete_events: EventWriter<SaveCompleteEvent>,
    storage: Res<GameStorage>,
) {
    for ev in save_events.read() {
        info!("[Save] Saving to {}...", ev.path.display());
        match write_save(&ev.path, &storage) {
            Ok(()) => {
                info!("[Save] Save to {} succeeded.", ev.path.display());
                complete_events.send(SaveCompleteEvent {
                    path: ev.path.clone(),
                    success: true,
                    error_message: None,
                });
            }
            Err(e) => {
                warn!("[Save] Save to {} FAILED: {}", ev.path.display(), e);
                complete_events.send(SaveCompleteEvent {
                    path: ev.path.clone(),
                    success: false,
                    error_message: Some(e.to_string()),
                });
            }
        }
    }
}

fn handle_load_request(
    mut load_events: EventReader<LoadRequestEvent>,
    mut complete_events: EventWriter<LoadCompleteEvent>,
    mut storage: ResMut<GameStorage>,
    mut history: ResMut<StepHistory>,
    mut observed: ResMut<ObservedDate>,
) {
    for ev in load_events.read() {
        info!("[Save] Loading from {}...", ev.path.display());
        match read_save(&ev.path) {
            Ok(file) => {
                storage.restore(file.storage);
                history.clear();
                // A loaded date is not a date change.
                observed.0 = None;
                info!("[Save] Load from {} succeeded.", ev.path.display());
                complete_events.send(LoadCompleteEvent {
                    path: ev.path.clone(),
                    success: true,
                    error_message: None,
                });
            }
            Err(e) => {
                warn!("[Save] Load from {} FAILED: {}", ev.path.display(), e);
                complete_events.send(LoadCompleteEvent {
                    path: ev.path.clone(),
                    success: false,
                    error_message: Some(e.to_string()),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("routine_engine_save_{}_{}", std::process::id(), name))
            .join("save.json")
    }

    #[test]
    fn save_file_round_trips_storage() {
        let path = temp_path("round_trip");
        let mut storage = GameStorage::default();
        storage.set_current_room_id(Some("terrace"));
        storage.set_flag("met_alice", true);

        write_save(&path, &storage).expect("write succeeds");
        let file = read_save(&path).expect("read succeeds");
        assert_eq!(file.version, SAVE_VERSION);
        assert_eq!(file.storage, storage);
        assert!(!path.with_extension("json.tmp").exists());

        let _ = fs::remove_dir_all(path.parent().expect("has parent"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let path = temp_path("missing");
        assert!(matches!(read_save(&path), Err(ScheduleError::Save(_))));
    }
}
