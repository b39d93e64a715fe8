//! Places, activities, and commitments of the home-and-school setting.

use crate::activities::commitment::Commitment;
use crate::activities::Activity;
use crate::catalog::Catalog;
use crate::navigation::rooms::{Location, Room, WorldMap};

pub fn populate_places(catalog: &mut Catalog) {
    catalog.maps.add(WorldMap::new("town").with_name("Town"));

    catalog.locations.add_all([
        Location::new("mc_home").with_name("Home").on_map("town"),
        Location::new("alice_home").with_name("Alice's House").on_map("town"),
        Location::new("school").with_name("School").on_map("town"),
    ]);

    catalog.rooms.add_all([
        Room::new("mc_room")
            .with_name("Bedroom")
            .in_location("mc_home")
            .with_activities(["sleep", "read"]),
        Room::new("kitchen")
            .with_name("Kitchen")
            .in_location("mc_home")
            .with_activities(["cook"]),
        Room::new("alice_room")
            .with_name("Alice's Room")
            .in_location("alice_home")
            .disabled_by("alice_door_locked"),
        Room::new("classroom").with_name("Classroom").in_location("school"),
        Room::new("terrace")
            .with_name("Terrace")
            .in_location("school")
            .with_activities(["smoke_break", "stargaze"]),
    ]);
}

pub fn populate_activities(catalog: &mut Catalog) {
    catalog.activities.add_all([
        Activity::new("sleep").with_name("Sleep").on_run(|_, ctx| {
            ctx.clock.increase_date(ctx.storage, None, Some(7.0));
            Ok(())
        }),
        Activity::new("read").with_name("Read a book").on_run(|_, ctx| {
            ctx.storage.set_flag("read_a_book", true);
            ctx.clock.increase_time(ctx.storage, Some(2.0));
            Ok(())
        }),
        Activity::new("cook")
            .with_name("Cook")
            .with_time_window(Some(6.0), Some(22.0))
            .on_run(|_, ctx| {
                ctx.clock.increase_time(ctx.storage, None);
                Ok(())
            }),
        Activity::new("smoke_break").with_name("Take a break").on_run(|_, ctx| {
            ctx.clock.increase_time(ctx.storage, Some(0.5));
            Ok(())
        }),
        Activity::new("stargaze")
            .with_name("Look at the stars")
            .with_time_window(Some(21.0), Some(4.0))
            .on_run(|_, ctx| {
                ctx.storage.set_flag("saw_the_stars", true);
                Ok(())
            }),
        Activity::new("talk_alice")
            .with_name("Talk to Alice")
            .on_run(|_, ctx| {
                ctx.storage.set_flag("talked_to_alice", true);
                Ok(())
            }),
    ]);
}

/// Alice's day: asleep until ten, school from eight to two, smoking on the
/// terrace from ten to eight in the evening. Higher priority wins overlaps.
pub fn populate_commitments(catalog: &mut Catalog) {
    catalog.commitments.add_all([
        Commitment::new("alice_sleep", ["alice"], "alice_room")
            .with_name("Alice sleeps")
            .with_time_window(Some(20.0), Some(10.0))
            .with_priority(1),
        Commitment::new("alice_go_school", ["alice"], "classroom")
            .with_name("Alice at school")
            .with_time_window(Some(8.0), Some(14.0))
            .with_priority(2),
        Commitment::new("alice_smokes", ["alice"], "terrace")
            .with_name("Alice smokes")
            .with_time_window(Some(10.0), Some(20.0))
            .automatic()
            .on_run(|_, ctx| {
                ctx.storage.set_flag("saw_alice_smoking", true);
                Ok(())
            }),
    ]);
}
