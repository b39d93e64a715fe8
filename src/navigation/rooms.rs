//! Rooms, locations, and maps.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::activities::commitment::Commitment;
use crate::activities::Activity;
use crate::calendar::Clock;
use crate::catalog::{Catalog, Identified};
use crate::routine;
use crate::shared::*;
use crate::storage::{GameStorage, StoredRecord};

use super::container::{ContainerKind, NavigationContainer, ScheduleOptions};

/// Stored overrides for a room.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomRecord {
    pub name: Option<String>,
    pub hidden: Option<FlagValue>,
    pub disabled: Option<FlagValue>,
}

impl StoredRecord for RoomRecord {
    const CATEGORY: &'static str = "room";
}

/// Shared add/remove/query surface of every container type.
pub trait ActivityContainer {
    fn container(&self) -> &NavigationContainer;

    fn add_activity(
        &self,
        storage: &mut GameStorage,
        clock: &Clock,
        activity_id: &str,
        options: ScheduleOptions,
    ) -> Result<(), ScheduleError> {
        self.container().add_activity(storage, clock, activity_id, options)
    }

    fn remove_activity(&self, storage: &mut GameStorage, activity_id: &str, expiry: Option<u32>) {
        self.container().remove_activity(storage, activity_id, expiry);
    }

    fn clear_expired_activities(&self, storage: &mut GameStorage, clock: &Clock) -> usize {
        self.container().clear_expired_activities(storage, clock)
    }

    fn activities<'c>(&self, catalog: &'c Catalog, storage: &GameStorage, clock: &Clock) -> Vec<&'c Activity> {
        self.container().activities(catalog, storage, clock)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// ROOM
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct Room {
    name: String,
    location_id: Option<LocationId>,
    container: NavigationContainer,
    default_hidden: FlagValue,
    default_disabled: FlagValue,
}

impl Identified for Room {
    fn id(&self) -> &str {
        self.container.id()
    }
}

impl ActivityContainer for Room {
    fn container(&self) -> &NavigationContainer {
        &self.container
    }
}

impl Room {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            location_id: None,
            container: NavigationContainer::new(ContainerKind::Room, id, Vec::<String>::new()),
            default_hidden: FlagValue::Literal(false),
            default_disabled: FlagValue::Literal(false),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn in_location(mut self, location_id: impl Into<String>) -> Self {
        self.location_id = Some(location_id.into());
        self
    }

    pub fn with_activities<A: Into<String>>(mut self, ids: impl IntoIterator<Item = A>) -> Self {
        self.container = NavigationContainer::new(ContainerKind::Room, self.container.id(), ids);
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

    pub fn id(&self) -> &str {
        self.container.id()
    }

    pub fn location_id(&self) -> Option<&str> {
        self.location_id.as_deref()
    }

    pub fn name(&self, storage: &GameStorage) -> String {
        let record: RoomRecord = storage.load_record(self.id());
        record.name.unwrap_or_else(|| self.name.clone())
    }

    pub fn set_name(&self, storage: &mut GameStorage, name: Option<String>) {
        let mut record: RoomRecord = storage.load_record(self.id());
        record.name = name;
        storage.save_record(self.id(), &record);
    }

    pub fn is_hidden(&self, storage: &GameStorage) -> bool {
        let record: RoomRecord = storage.load_record(self.id());
        storage.resolve(record.hidden.as_ref().unwrap_or(&self.default_hidden))
    }

    pub fn set_hidden(&self, storage: &mut GameStorage, hidden: Option<FlagValue>) {
        let mut record: RoomRecord = storage.load_record(self.id());
        record.hidden = hidden;
        storage.save_record(self.id(), &record);
    }

    pub fn is_disabled(&self, storage: &GameStorage) -> bool {
        let record: RoomRecord = storage.load_record(self.id());
        storage.resolve(record.disabled.as_ref().unwrap_or(&self.default_disabled))
    }

    pub fn set_disabled(&self, storage: &mut GameStorage, disabled: Option<FlagValue>) {
        let mut record: RoomRecord = storage.load_record(self.id());
        record.disabled = disabled;
        storage.save_record(self.id(), &record);
    }

    /// Resolved commitments currently placing characters in this room.
    pub fn routine<'c>(&self, catalog: &'c Catalog, storage: &GameStorage, clock: &Clock) -> Vec<&'c Commitment> {
        routine::routine_for_room(catalog, storage, clock, self.id())
    }

    /// Characters present through the room's routine, in routine order.
    pub fn characters(&self, catalog: &Catalog, storage: &GameStorage, clock: &Clock) -> Vec<CharacterId> {
        let mut characters: Vec<CharacterId> = Vec::new();
        for commitment in self.routine(catalog, storage, clock) {
            for character in commitment.characters() {
                if !characters.contains(character) {
                    characters.push(character.clone());
                }
            }
        }
        characters
    }

    pub fn automatic_commitments<'c>(
        &self,
        catalog: &'c Catalog,
        storage: &GameStorage,
        clock: &Clock,
    ) -> Vec<&'c Commitment> {
        self.routine(catalog, storage, clock)
            .into_iter()
            .filter(|c| c.execution_type(storage) == ExecutionType::Automatic)
            .collect()
    }

    pub fn interactive_commitments<'c>(
        &self,
        catalog: &'c Catalog,
        storage: &GameStorage,
        clock: &Clock,
    ) -> Vec<&'c Commitment> {
        self.routine(catalog, storage, clock)
            .into_iter()
            .filter(|c| c.execution_type(storage) == ExecutionType::Interaction)
            .collect()
    }

    /// Runs every automatic commitment resolved for this room as one history
    /// step. Stops at the first callback error. Returns how many ran.
    pub fn run_automatic_commitments(&self, ctx: &mut RunContext<'_>) -> Result<usize, ScheduleError> {
        let catalog = ctx.catalog;
        let automatic = self.automatic_commitments(catalog, ctx.storage, ctx.clock);
        for (i, commitment) in automatic.iter().enumerate() {
            if i == 0 {
                commitment.run(ctx)?;
            } else {
                commitment.activity().invoke(ctx)?;
            }
        }
        if !automatic.is_empty() {
            info!("[Routine] Ran {} automatic commitments in '{}'", automatic.len(), self.id());
        }
        Ok(automatic.len())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// LOCATION & MAP
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct Location {
    name: String,
    map_id: Option<MapId>,
    container: NavigationContainer,
}

impl Identified for Location {
    fn id(&self) -> &str {
        self.container.id()
    }
}

impl ActivityContainer for Location {
    fn container(&self) -> &NavigationContainer {
        &self.container
    }
}

impl Location {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            map_id: None,
            container: NavigationContainer::new(ContainerKind::Location, id, Vec::<String>::new()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn on_map(mut self, map_id: impl Into<String>) -> Self {
        self.map_id = Some(map_id.into());
        self
    }

    pub fn with_activities<A: Into<String>>(mut self, ids: impl IntoIterator<Item = A>) -> Self {
        self.container = NavigationContainer::new(ContainerKind::Location, self.container.id(), ids);
        self
    }

    pub fn id(&self) -> &str {
        self.container.id()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn map_id(&self) -> Option<&str> {
        self.map_id.as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct WorldMap {
    name: String,
    container: NavigationContainer,
}

impl Identified for WorldMap {
    fn id(&self) -> &str {
        self.container.id()
    }
}

impl ActivityContainer for WorldMap {
    fn container(&self) -> &NavigationContainer {
        &self.container
    }
}

impl WorldMap {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            container: NavigationContainer::new(ContainerKind::Map, id, Vec::<String>::new()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_activities<A: Into<String>>(mut self, ids: impl IntoIterator<Item = A>) -> Self {
        self.container = NavigationContainer::new(ContainerKind::Map, self.container.id(), ids);
        self
    }

    pub fn id(&self) -> &str {
        self.container.id()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
