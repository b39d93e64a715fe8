//! Routine engine library crate: re-exports all modules for integration testing.
//!
//! The binary crate (`main.rs`) runs a scripted headless demo. This library
//! exposes the same modules so that `tests/` integration tests and host games
//! can import engine types, systems, and resources.

pub mod shared;
pub mod storage;
pub mod calendar;
pub mod catalog;
pub mod activities;
pub mod navigation;
pub mod routine;
pub mod quests;
pub mod commands;
pub mod save;
pub mod data;

use bevy::prelude::*;

use calendar::CalendarPlugin;
use catalog::Catalog;
use commands::CommandPlugin;
use navigation::NavigationPlugin;
use quests::QuestPlugin;
use save::SavePlugin;
use storage::history::StepHistory;
use storage::GameStorage;

/// Frame ordering: commands edit storage, the calendar notices date changes,
/// then navigation and quests react to both.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoutineSet {
    Commands,
    Detect,
    React,
}

/// Every engine plugin plus the shared resources. Content is added
/// separately (see `data::DataPlugin`).
pub struct RoutineEnginePlugin;

impl Plugin for RoutineEnginePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<GameStorage>()
            .init_resource::<StepHistory>()
            .init_resource::<Catalog>()
            .configure_sets(
                Update,
                (RoutineSet::Commands, RoutineSet::Detect, RoutineSet::React).chain(),
            )
            .add_plugins((
                CalendarPlugin,
                NavigationPlugin,
                QuestPlugin,
                CommandPlugin,
                SavePlugin,
            ));
    }
}
