//! Command domain: narrative-script commands aimed at the scheduler.
//!
//! The host interpreter tokenizes a script line and offers it to
//! `NarrativeCommand::parse`; lines that are not ours come back as `None`.
//! Parsed commands travel as events and are applied once per frame.

use bevy::prelude::*;
use serde::Deserialize;

use crate::calendar::Clock;
use crate::catalog::Catalog;
use crate::navigation;
use crate::shared::*;
use crate::storage::history::{HistoryRecorder, StepHistory};
use crate::storage::GameStorage;
use crate::RoutineSet;

/// Arguments of the structured `wait` form, e.g. `wait (hours: 2, days: 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct WaitSpec {
    pub hours: Option<f32>,
    pub days: Option<u32>,
}

#[derive(Event, Debug, Clone, PartialEq)]
pub enum NarrativeCommand {
    EnterRoom(RoomId),
    SetTime(f32),
    SetDate(u32),
    Wait(WaitSpec),
}

impl NarrativeCommand {
    pub fn parse_line(line: &str) -> Option<Self> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        Self::parse(&tokens)
    }

    pub fn parse(tokens: &[&str]) -> Option<Self> {
        match tokens {
            ["enter", "room", id] => Some(Self::EnterRoom((*id).to_string())),
            ["set", "time", value] => match value.parse::<f32>() {
                Ok(time) if time.is_finite() => Some(Self::SetTime(time)),
                _ => {
                    warn!("[Command] 'set time' expects a number, got '{}'", value);
                    None
                }
            },
            ["set", "date", value] => match value.parse() {
                Ok(date) => Some(Self::SetDate(date)),
                Err(_) => {
                    warn!("[Command] 'set date' expects a day number, got '{}'", value);
                    None
                }
            },
            ["wait"] => Some(Self::Wait(WaitSpec::default())),
            ["wait", amount] if amount.parse::<f32>().is_ok() => match amount.parse::<f32>() {
                Ok(hours) if hours.is_finite() => Some(Self::Wait(WaitSpec {
                    hours: Some(hours),
                    days: None,
                })),
                _ => {
                    warn!("[Command] 'wait' expects a finite number of hours, got '{}'", amount);
                    None
                }
            },
            ["wait", rest @ ..] => {
                let source = rest.join(" ");
                match ron::from_str::<WaitSpec>(&format!("#![enable(implicit_some)]\n{source}")) {
                    Ok(spec) if spec.hours.is_some_and(|h| !h.is_finite()) => {
                        warn!("[Command] 'wait' expects a finite number of hours, got '{}'", source);
                        None
                    }
                    Ok(spec) => Some(Self::Wait(spec)),
                    Err(e) => {
                        warn!("[Command] Could not read wait arguments '{}': {}", source, e);
                        None
                    }
                }
            }
            _ => None,
        }
    }
}

/// Applies one command. Returns the room entered, if any.
pub fn apply_command(
    command: &NarrativeCommand,
    catalog: &Catalog,
    clock: &Clock,
    storage: &mut GameStorage,
) -> Option<RoomEnteredEvent> {
    match command {
        NarrativeCommand::EnterRoom(room_id) => {
            let previous = storage.current_room_id();
            navigation::set_current_room(catalog, storage, room_id).then(|| RoomEnteredEvent {
                previous,
                room_id: room_id.clone(),
            })
        }
        NarrativeCommand::SetTime(time) => {
            clock.set_current_time(storage, *time);
            None
        }
        NarrativeCommand::SetDate(date) => {
            clock.set_current_date(storage, *date);
            None
        }
        NarrativeCommand::Wait(spec) => {
            if let Some(days) = spec.days.filter(|d| *d > 0) {
                let time = clock.current_time(storage);
                clock.increase_date(storage, Some(days), Some(time));
            }
            match (spec.hours, spec.days) {
                (Some(hours), _) => {
                    clock.increase_time(storage, Some(hours));
                }
                (None, None) => {
                    clock.increase_time(storage, None);
                }
                (None, Some(_)) => {}
            }
            None
        }
    }
}

pub struct CommandPlugin;

impl Plugin for CommandPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<NarrativeCommand>()
            .add_systems(Update, apply_narrative_commands.in_set(RoutineSet::Commands));
    }
}

/// Each command is one player-visible step. Entering a room whose automatic
/// commitments will run leaves the checkpoint to them, so the move is still
/// a single step.
fn apply_narrative_commands(
    mut commands: EventReader<NarrativeCommand>,
    catalog: Res<Catalog>,
    clock: Res<Clock>,
    mut storage: ResMut<GameStorage>,
    mut history: ResMut<StepHistory>,
    mut entered: EventWriter<RoomEnteredEvent>,
) {
    for command in commands.read() {
        info!("[Command] {:?}", command);
        if !enters_room_with_automatic_commitments(command, &catalog, &clock, &storage) {
            history.record_step(&storage);
        }
        if let Some(event) = apply_command(command, &catalog, &clock, &mut storage) {
            entered.send(event);
        }
    }
}

fn enters_room_with_automatic_commitments(
    command: &NarrativeCommand,
    catalog: &Catalog,
    clock: &Clock,
    storage: &GameStorage,
) -> bool {
    let NarrativeCommand::EnterRoom(room_id) = command else {
        return false;
    };
    if storage.current_room_id().as_deref() == Some(room_id.as_str()) {
        return false;
    }
    catalog
        .rooms
        .find(room_id)
        .is_some_and(|room| {
            !room.is_disabled(storage) && !room.automatic_commitments(catalog, storage, clock).is_empty()
        })
}
