//! Headless integration tests for the routine engine.
//!
//! These tests run the engine plugins inside a Bevy app with
//! `MinimalPlugins`, feed it narrative commands as events, and check the
//! storage, routine, and quest state after each frame.
//!
//! Run with: `cargo test --test headless`

use bevy::prelude::*;
use routine_engine::activities::commitment::Commitment;
use routine_engine::calendar::Clock;
use routine_engine::catalog::Catalog;
use routine_engine::commands::NarrativeCommand;
use routine_engine::data::DataPlugin;
use routine_engine::navigation;
use routine_engine::navigation::container::{ContainerOverlay, ScheduleOptions};
use routine_engine::navigation::rooms::ActivityContainer;
use routine_engine::quests::{self, stage::Stage, Quest};
use routine_engine::routine;
use routine_engine::save::{LoadRequestEvent, SaveCompleteEvent, SaveRequestEvent};
use routine_engine::shared::*;
use routine_engine::storage::history::StepHistory;
use routine_engine::storage::GameStorage;
use routine_engine::RoutineEnginePlugin;

// ─────────────────────────────────────────────────────────────────────────────
// Test App Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Engine plugins plus the bundled content, already past Startup.
fn build_test_app() -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins);
    app.add_plugins((RoutineEnginePlugin, DataPlugin));
    app.update();
    app
}

fn send(app: &mut App, line: &str) {
    let command = NarrativeCommand::parse_line(line).expect("scheduler command");
    app.world_mut().send_event(command);
    app.update();
}

fn storage(app: &App) -> &GameStorage {
    app.world().resource::<GameStorage>()
}

fn with_context<T>(app: &mut App, f: impl FnOnce(&mut RunContext<'_>) -> T) -> T {
    app.world_mut()
        .resource_scope(|world, mut storage: Mut<GameStorage>| {
            world.resource_scope(|world, mut history: Mut<StepHistory>| {
                let catalog = world.resource::<Catalog>();
                let clock = world.resource::<Clock>();
                let mut ctx = RunContext::new(catalog, clock, &mut storage, &mut *history);
                f(&mut ctx)
            })
        })
}

// ─────────────────────────────────────────────────────────────────────────────
// Clock & commands
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_bundled_clock_settings_are_applied() {
    let app = build_test_app();
    let clock = app.world().resource::<Clock>();
    assert_eq!(clock.time_slots().len(), 5);
    assert_eq!(clock.current_day_name(storage(&app)), "Monday");
}

#[test]
fn test_wait_across_midnight_changes_date() {
    let mut app = build_test_app();
    send(&mut app, "set time 23");
    send(&mut app, "wait 2");

    let clock = app.world().resource::<Clock>();
    assert_eq!(clock.current_date(storage(&app)), 1);
    assert_eq!(clock.current_time(storage(&app)), 1.0);
    assert_eq!(clock.current_day_name(storage(&app)), "Tuesday");
}

#[test]
fn test_each_command_is_a_history_step() {
    let mut app = build_test_app();
    send(&mut app, "set time 9");
    send(&mut app, "enter room mc_room");
    assert_eq!(app.world().resource::<StepHistory>().len(), 2);

    let world = app.world_mut();
    world.resource_scope(|world, mut history: Mut<StepHistory>| {
        let mut storage = world.resource_mut::<GameStorage>();
        assert!(history.rollback(&mut storage));
        assert_eq!(storage.current_room_id(), None);
    });
}

// ─────────────────────────────────────────────────────────────────────────────
// Navigation & routine
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_entering_terrace_runs_alice_smoking() {
    let mut app = build_test_app();
    send(&mut app, "set time 15");
    send(&mut app, "enter room terrace");

    assert!(storage(&app).get_flag("saw_alice_smoking"));
    let catalog = app.world().resource::<Catalog>();
    let clock = app.world().resource::<Clock>();
    let terrace = navigation::current_room(catalog, storage(&app)).expect("in a room");
    assert_eq!(terrace.characters(catalog, storage(&app), clock), vec!["alice".to_string()]);
}

#[test]
fn test_automatic_commitment_step_predates_room_change() {
    let mut app = build_test_app();
    send(&mut app, "set time 15");
    send(&mut app, "enter room mc_room");
    send(&mut app, "enter room terrace");

    let history = app.world().resource::<StepHistory>();
    let step = history.latest().expect("automatic step");
    assert_eq!(step.current_room_id().as_deref(), Some("mc_room"));
    assert!(!step.get_flag("saw_alice_smoking"));
}

#[test]
fn test_entering_room_with_automatic_commitment_is_one_step() {
    let mut app = build_test_app();
    send(&mut app, "set time 15");
    send(&mut app, "enter room mc_room");
    let before = app.world().resource::<StepHistory>().len();
    send(&mut app, "enter room terrace");
    assert_eq!(app.world().resource::<StepHistory>().len(), before + 1);

    let world = app.world_mut();
    world.resource_scope(|world, mut history: Mut<StepHistory>| {
        let mut storage = world.resource_mut::<GameStorage>();
        assert!(history.rollback(&mut storage));
        assert_eq!(storage.current_room_id().as_deref(), Some("mc_room"));
        assert!(!storage.get_flag("saw_alice_smoking"));
        assert!(history.rollback(&mut storage));
        assert_eq!(storage.current_room_id(), None);
    });
}

#[test]
fn test_school_hours_outrank_smoking() {
    let mut app = build_test_app();
    send(&mut app, "set time 12");
    send(&mut app, "enter room terrace");

    assert!(!storage(&app).get_flag("saw_alice_smoking"));
    let catalog = app.world().resource::<Catalog>();
    let clock = app.world().resource::<Clock>();
    assert_eq!(
        routine::character_room(catalog, storage(&app), clock, "alice"),
        Some("classroom")
    );
}

#[test]
fn test_disabled_room_is_refused() {
    let mut app = build_test_app();
    send(&mut app, "enter room mc_room");
    app.world_mut()
        .resource_mut::<GameStorage>()
        .set_flag("alice_door_locked", true);
    send(&mut app, "enter room alice_room");
    assert_eq!(storage(&app).current_room_id().as_deref(), Some("mc_room"));
}

#[test]
fn test_terrace_scenario_with_timed_commitment() {
    let mut app = build_test_app();
    {
        let world = app.world_mut();
        world.resource_mut::<Catalog>().commitments.add(
            Commitment::new("bob_smokes", ["bob"], "terrace").with_priority(1),
        );
    }
    with_context(&mut app, |ctx| {
        let catalog = ctx.catalog;
        let terrace = catalog.rooms.get("terrace").expect("registered");
        terrace
            .add_activity(ctx.storage, ctx.clock, "bob_smokes", ScheduleOptions::time(10.0, 20.0))
            .expect("valid window");
    });

    let ids_at = |app: &mut App, hour: &str| -> Vec<String> {
        send(app, &format!("set time {hour}"));
        let catalog = app.world().resource::<Catalog>();
        let clock = app.world().resource::<Clock>();
        let terrace = catalog.rooms.get("terrace").expect("registered");
        terrace
            .activities(catalog, storage(app), clock)
            .iter()
            .map(|a| a.id().to_string())
            .collect()
    };
    assert!(ids_at(&mut app, "15").contains(&"bob_smokes".to_string()));
    assert!(ids_at(&mut app, "15").contains(&"smoke_break".to_string()));
    assert!(!ids_at(&mut app, "21").contains(&"bob_smokes".to_string()));
}

#[test]
fn test_date_change_sweeps_expired_exclusions() {
    let mut app = build_test_app();
    with_context(&mut app, |ctx| {
        let catalog = ctx.catalog;
        let terrace = catalog.rooms.get("terrace").expect("registered");
        terrace.remove_activity(ctx.storage, "smoke_break", Some(1));
    });
    let terrace_overlay = |app: &App| {
        let catalog = app.world().resource::<Catalog>();
        let terrace = catalog.rooms.get("terrace").expect("registered");
        terrace.container().overlay(storage(app))
    };

    send(&mut app, "wait (days: 1)");
    assert_eq!(terrace_overlay(&app).excluded_ids, vec!["smoke_break".to_string()]);

    send(&mut app, "wait (days: 1)");
    assert_eq!(terrace_overlay(&app), ContainerOverlay::default());
}

// ─────────────────────────────────────────────────────────────────────────────
// Quests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_alice_runs_to_completion() {
    let mut app = build_test_app();
    send(&mut app, "set time 15");

    with_context(&mut app, |ctx| {
        let catalog = ctx.catalog;
        let quest = catalog.quests.get("help_alice").expect("registered");
        quest.start(ctx).expect("start");
    });
    {
        let catalog = app.world().resource::<Catalog>();
        let clock = app.world().resource::<Clock>();
        let terrace = catalog.rooms.get("terrace").expect("registered");
        let ids: Vec<_> = terrace
            .activities(catalog, storage(&app), clock)
            .iter()
            .map(|a| a.id().to_string())
            .collect();
        assert!(ids.contains(&"talk_alice".to_string()));
    }

    // Talking sets the goal flag; the stage then advances on request.
    with_context(&mut app, |ctx| {
        let catalog = ctx.catalog;
        let talk = catalog.find_activity("talk_alice").expect("registered");
        talk.run(ctx).expect("talk");
        let quest = catalog.quests.get("help_alice").expect("registered");
        assert_eq!(quest.advance_if_completed(ctx), Ok(true));
        assert_eq!(quest.advance_if_completed(ctx), Ok(false));
        ctx.storage.set_flag("gift_bought", true);
        assert_eq!(quest.advance_if_completed(ctx), Ok(true));
    });

    let quest_stage = |app: &App| {
        let catalog = app.world().resource::<Catalog>();
        let quest = catalog.quests.get("help_alice").expect("registered");
        let stage = quest.current_stage(storage(app)).expect("in progress");
        (stage.id().to_string(), stage.started(storage(app)))
    };
    assert_eq!(quest_stage(&app), ("wait_for_answer".to_string(), false));

    send(&mut app, "wait (days: 1)");
    assert_eq!(quest_stage(&app), ("wait_for_answer".to_string(), false));
    send(&mut app, "wait (days: 1)");
    assert_eq!(quest_stage(&app), ("wait_for_answer".to_string(), true));

    with_context(&mut app, |ctx| {
        let catalog = ctx.catalog;
        let quest = catalog.quests.get("help_alice").expect("registered");
        assert_eq!(quest.continue_quest(ctx), Ok(true));
        assert!(!quest.current_stage_must_start(ctx.catalog, ctx.storage, ctx.clock));
        ctx.storage.set_flag("bob_liked_gift", true);
        assert_eq!(quests::start_stages_that_must_start(ctx), Ok(1));
        assert_eq!(quest.continue_quest(ctx), Ok(true));
        assert!(quest.completed(ctx.storage));
    });

    let catalog = app.world().resource::<Catalog>();
    assert_eq!(quests::completed_quests(catalog, storage(&app)).len(), 1);
    assert_eq!(storage(&app).get::<usize>("journal:help_alice"), Some(4));
}

#[test]
fn test_callback_error_propagates_from_stage_start() {
    let mut app = build_test_app();
    app.world_mut().resource_mut::<Catalog>().quests.add(Quest::new(
        "broken",
        [Stage::new("explode").on_start(|_, _| Err(ScheduleError::Callback("missing prop".into())))],
    ));
    let result = with_context(&mut app, |ctx| {
        let catalog = ctx.catalog;
        let quest = catalog.quests.get("broken").expect("registered");
        quest.start(ctx)
    });
    assert_eq!(result, Err(ScheduleError::Callback("missing prop".into())));
}

// ─────────────────────────────────────────────────────────────────────────────
// Save / load
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_save_then_load_restores_storage() {
    let path = std::env::temp_dir()
        .join(format!("routine_engine_headless_{}", std::process::id()))
        .join("slot.json");
    let mut app = build_test_app();
    send(&mut app, "set time 15");
    send(&mut app, "enter room terrace");
    let saved = storage(&app).clone();

    app.world_mut().send_event(SaveRequestEvent { path: path.clone() });
    app.update();
    let completions: Vec<bool> = app
        .world_mut()
        .resource_mut::<Events<SaveCompleteEvent>>()
        .drain()
        .map(|e| e.success)
        .collect();
    assert_eq!(completions, vec![true]);

    send(&mut app, "wait (days: 3)");
    send(&mut app, "enter room kitchen");
    assert_ne!(storage(&app), &saved);

    app.world_mut().send_event(LoadRequestEvent { path: path.clone() });
    app.update();
    assert_eq!(storage(&app), &saved);
    assert!(app.world().resource::<StepHistory>().is_empty());

    let _ = std::fs::remove_dir_all(path.parent().expect("has parent"));
}
