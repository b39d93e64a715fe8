//! Navigation domain: where the player is, and what each place offers.
//!
//! Responsible for:
//! - Tracking the current room (and, through it, location and map)
//! - Sweeping expired overlay entries when the date changes
//! - Running automatic commitments when the player enters a room

pub mod container;
pub mod rooms;

use bevy::prelude::*;

use crate::calendar::Clock;
use crate::catalog::Catalog;
use crate::shared::*;
use crate::storage::history::StepHistory;
use crate::storage::{GameStorage, LastEvent};
use crate::RoutineSet;

use rooms::{ActivityContainer, Location, Room, WorldMap};

pub struct NavigationPlugin;

impl Plugin for NavigationPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<RoomEnteredEvent>().add_systems(
            Update,
            (clear_expired_on_date_change, run_automatic_commitments_on_enter)
                .chain()
                .in_set(RoutineSet::React),
        );
    }
}

// ─── Navigator ───────────────────────────────────────────────────────────────

pub fn current_room_id(storage: &GameStorage) -> Option<RoomId> {
    storage.current_room_id()
}

pub fn current_room<'c>(catalog: &'c Catalog, storage: &GameStorage) -> Option<&'c Room> {
    let id = storage.current_room_id()?;
    let room = catalog.rooms.get(&id);
    if room.is_none() {
        error!("[Navigation] Current room '{}' is not registered", id);
    }
    room
}

pub fn current_location<'c>(catalog: &'c Catalog, storage: &GameStorage) -> Option<&'c Location> {
    let location_id = current_room(catalog, storage)?.location_id()?;
    catalog.locations.get(location_id)
}

pub fn current_map<'c>(catalog: &'c Catalog, storage: &GameStorage) -> Option<&'c WorldMap> {
    let map_id = current_location(catalog, storage)?.map_id()?;
    catalog.maps.get(map_id)
}

/// Moves the player. Returns false when nothing changed: unknown and
/// disabled rooms are refused, and re-entering the current room is a no-op.
pub fn set_current_room(catalog: &Catalog, storage: &mut GameStorage, room_id: &str) -> bool {
    let Some(room) = catalog.rooms.find(room_id) else {
        error!("[Navigation] Cannot enter unregistered room '{}'", room_id);
        return false;
    };
    let prev = storage.current_room_id();
    if prev.as_deref() == Some(room_id) {
        debug!("[Navigation] Already in '{}'", room_id);
        return false;
    }
    if room.is_disabled(storage) {
        warn!("[Navigation] Room '{}' is disabled; staying put", room_id);
        return false;
    }
    storage.set_current_room_id(Some(room_id));
    storage.set_last_event(&LastEvent::RoomChanged {
        prev: prev.clone(),
        value: room_id.to_string(),
    });
    info!("[Navigation] Entered '{}' (from {:?})", room_id, prev);
    true
}

/// Sweeps every registered room, location, and map.
pub fn clear_expired_activities(catalog: &Catalog, storage: &mut GameStorage, clock: &Clock) -> usize {
    let mut cleared = 0;
    for room in catalog.rooms.values() {
        cleared += room.clear_expired_activities(storage, clock);
    }
    for location in catalog.locations.values() {
        cleared += location.clear_expired_activities(storage, clock);
    }
    for map in catalog.maps.values() {
        cleared += map.clear_expired_activities(storage, clock);
    }
    cleared
}

// ─── Systems ─────────────────────────────────────────────────────────────────

fn clear_expired_on_date_change(
    mut date_events: EventReader<DateChangedEvent>,
    catalog: Res<Catalog>,
    clock: Res<Clock>,
    mut storage: ResMut<GameStorage>,
) {
    if date_events.read().last().is_none() {
        return;
    }
    let cleared = clear_expired_activities(&catalog, &mut storage, &clock);
    if cleared > 0 {
        info!("[Navigation] Date change cleared {} expired entries", cleared);
    }
}

fn run_automatic_commitments_on_enter(
    mut entered_events: EventReader<RoomEnteredEvent>,
    catalog: Res<Catalog>,
    clock: Res<Clock>,
    mut storage: ResMut<GameStorage>,
    mut history: ResMut<StepHistory>,
) {
    for ev in entered_events.read() {
        let Some(room) = catalog.rooms.get(&ev.room_id) else {
            continue;
        };
        let mut ctx = RunContext::new(&catalog, &clock, &mut storage, &mut *history);
        if let Err(e) = room.run_automatic_commitments(&mut ctx) {
            error!("[Routine] Automatic commitment in '{}' failed: {}", ev.room_id, e);
        }
    }
}
