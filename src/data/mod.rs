//! Data layer: populates the catalog and clock at startup.
//!
//! This plugin runs in `Startup`, reads the clock settings bundled from
//! `assets/clock.ron`, and fills every catalog registry from the authored
//! content in the submodules. Other domains only read the catalog.

mod home;
mod quests;

use bevy::prelude::*;

use crate::calendar::{Clock, ClockSettings};
use crate::catalog::Catalog;

pub const CLOCK_SETTINGS_RON: &str = include_str!("../../assets/clock.ron");

pub struct DataPlugin;

impl Plugin for DataPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, load_all_data);
    }
}

/// Bundled clock settings. Falls back to defaults if the asset is broken.
pub fn clock_settings() -> ClockSettings {
    match ClockSettings::from_ron(CLOCK_SETTINGS_RON) {
        Ok(settings) => settings,
        Err(e) => {
            error!("[Catalog] Bundled clock settings unreadable, using defaults: {}", e);
            ClockSettings::default()
        }
    }
}

pub fn populate_catalog(catalog: &mut Catalog) {
    home::populate_places(catalog);
    home::populate_activities(catalog);
    home::populate_commitments(catalog);
    quests::populate_quests(catalog);
}

fn load_all_data(mut catalog: ResMut<Catalog>, mut clock: ResMut<Clock>) {
    info!("[Catalog] Populating registries…");

    clock.initialize(clock_settings());

    populate_catalog(&mut catalog);
    info!(
        "  Maps: {}, Locations: {}, Rooms: {}",
        catalog.maps.len(),
        catalog.locations.len(),
        catalog.rooms.len()
    );
    info!(
        "  Activities: {}, Commitments: {}",
        catalog.activities.len(),
        catalog.commitments.len()
    );
    info!("  Quests: {}", catalog.quests.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::rooms::ActivityContainer;

    #[test]
    fn bundled_clock_settings_parse() {
        let settings = ClockSettings::from_ron(CLOCK_SETTINGS_RON).expect("bundled asset parses");
        assert_eq!(settings.week_day_names.len(), 7);
        assert_eq!(settings.weekend_start_day, Some(6));
    }

    #[test]
    fn every_reference_resolves() {
        let mut catalog = Catalog::default();
        populate_catalog(&mut catalog);

        for room in catalog.rooms.values() {
            if let Some(location) = room.location_id() {
                assert!(catalog.locations.has(location), "{} -> {}", room.id(), location);
            }
            for id in room.container().default_activity_ids() {
                assert!(catalog.find_activity(id).is_some(), "{} -> {}", room.id(), id);
            }
        }
        for location in catalog.locations.values() {
            if let Some(map) = location.map_id() {
                assert!(catalog.maps.has(map), "{} -> {}", location.id(), map);
            }
        }
        for commitment in catalog.commitments.values() {
            assert!(catalog.rooms.has(commitment.room_id()), "{}", commitment.id());
        }
        assert!(catalog.quests.values().iter().all(|q| !q.stages().is_empty()));
    }
}
