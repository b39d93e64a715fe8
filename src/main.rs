use bevy::log::LogPlugin;
use bevy::prelude::*;

use routine_engine::calendar::Clock;
use routine_engine::catalog::Catalog;
use routine_engine::commands::NarrativeCommand;
use routine_engine::data::DataPlugin;
use routine_engine::navigation;
use routine_engine::navigation::rooms::ActivityContainer;
use routine_engine::routine;
use routine_engine::storage::GameStorage;
use routine_engine::RoutineEnginePlugin;

/// A short day in town, one script line per frame.
const SCRIPT: &[&str] = &[
    "set time 7",
    "enter room mc_room",
    "wait 3",
    "enter room terrace",
    "wait (hours: 3.0)",
    "wait (days: 2)",
    "enter room kitchen",
];

fn main() {
    let mut app = App::new();
    app.add_plugins((MinimalPlugins, LogPlugin::default()))
        .add_plugins((RoutineEnginePlugin, DataPlugin));

    // Startup populates the catalog.
    app.update();

    for line in SCRIPT {
        match NarrativeCommand::parse_line(line) {
            Some(command) => {
                app.world_mut().send_event(command);
            }
            None => warn!("[Command] Not a scheduler command: '{}'", line),
        }
        app.update();
        report(app.world(), line);
    }
}

fn report(world: &World, line: &str) {
    let catalog = world.resource::<Catalog>();
    let clock = world.resource::<Clock>();
    let storage = world.resource::<GameStorage>();

    info!(
        "> {:<22} day {} ({}) {:>5.1}h",
        line,
        clock.current_date(storage),
        clock.current_day_name(storage),
        clock.current_time(storage)
    );
    if let Some(room) = navigation::current_room(catalog, storage) {
        let activities: Vec<&str> = room
            .activities(catalog, storage, clock)
            .iter()
            .map(|a| a.id())
            .collect();
        info!(
            "  {} | activities {:?} | characters {:?}",
            room.name(storage),
            activities,
            room.characters(catalog, storage, clock)
        );
    }
    for commitment in routine::current_routine(catalog, storage, clock) {
        info!("  {:?} -> {}", commitment.characters(), commitment.room_id());
    }
}
