//! Which commitment places each character right now.
//!
//! Active, visible commitments are considered in descending priority; equal
//! priorities keep registration order. A commitment is accepted only if
//! none of its characters were already claimed by an earlier acceptance, so
//! no character is ever resolved into two rooms at once.

use bevy::prelude::*;
use std::collections::HashSet;

use crate::activities::commitment::Commitment;
use crate::calendar::Clock;
use crate::catalog::Catalog;
use crate::storage::GameStorage;

/// Every accepted commitment, in registration order.
pub fn current_routine<'c>(catalog: &'c Catalog, storage: &GameStorage, clock: &Clock) -> Vec<&'c Commitment> {
    let now = clock.now(storage);
    let mut candidates: Vec<(usize, i32, &'c Commitment)> = catalog
        .commitments
        .values()
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_active(&now) && !c.is_hidden(storage))
        .map(|(order, c)| (order, c.priority(storage), c))
        .collect();
    // Stable sort: ties stay in registration order.
    candidates.sort_by(|a, b| b.1.cmp(&a.1));

    let mut claimed: HashSet<&'c str> = HashSet::new();
    let mut accepted: Vec<(usize, &'c Commitment)> = Vec::new();
    for (order, _, commitment) in candidates {
        if let Some(busy) = commitment.characters().iter().find(|ch| claimed.contains(ch.as_str())) {
            debug!(
                "[Routine] '{}' skipped: '{}' is already committed elsewhere",
                commitment.id(),
                busy
            );
            continue;
        }
        claimed.extend(commitment.characters().iter().map(String::as_str));
        accepted.push((order, commitment));
    }

    accepted.sort_by_key(|(order, _)| *order);
    accepted.into_iter().map(|(_, c)| c).collect()
}

pub fn routine_for_room<'c>(
    catalog: &'c Catalog,
    storage: &GameStorage,
    clock: &Clock,
    room_id: &str,
) -> Vec<&'c Commitment> {
    current_routine(catalog, storage, clock)
        .into_iter()
        .filter(|c| c.room_id() == room_id)
        .collect()
}

/// The room a character is committed to right now, if any.
pub fn character_room<'c>(
    catalog: &'c Catalog,
    storage: &GameStorage,
    clock: &Clock,
    character: &str,
) -> Option<&'c str> {
    current_routine(catalog, storage, clock)
        .into_iter()
        .find(|c| c.characters().iter().any(|ch| ch == character))
        .map(Commitment::room_id)
}
