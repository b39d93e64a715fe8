//! Id-keyed registries of static narrative definitions.

use bevy::prelude::*;
use std::collections::HashMap;

use crate::activities::commitment::Commitment;
use crate::activities::Activity;
use crate::navigation::rooms::{Location, Room, WorldMap};
use crate::quests::Quest;

pub trait Identified {
    fn id(&self) -> &str;
}

/// Insertion-ordered registry. Re-adding an id replaces it in place.
#[derive(Debug, Clone)]
pub struct Registry<T> {
    label: &'static str,
    index: HashMap<String, usize>,
    items: Vec<T>,
}

impl<T: Identified> Registry<T> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            index: HashMap::new(),
            items: Vec::new(),
        }
    }

    pub fn add(&mut self, item: T) {
        let id = item.id().to_string();
        match self.index.get(&id) {
            Some(&slot) => {
                info!("[Catalog] Replacing {} '{}'", self.label, id);
                self.items[slot] = item;
            }
            None => {
                self.index.insert(id, self.items.len());
                self.items.push(item);
            }
        }
    }

    pub fn add_all(&mut self, items: impl IntoIterator<Item = T>) {
        for item in items {
            self.add(item);
        }
    }

    /// Logs a warning for unknown ids.
    pub fn get(&self, id: &str) -> Option<&T> {
        let found = self.find(id);
        if found.is_none() {
            warn!("[Catalog] No {} registered with id '{}'", self.label, id);
        }
        found
    }

    /// Silent lookup.
    pub fn find(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&slot| &self.items[slot])
    }

    pub fn has(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn values(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Resource, Debug)]
pub struct Catalog {
    pub activities: Registry<Activity>,
    pub commitments: Registry<Commitment>,
    pub rooms: Registry<Room>,
    pub locations: Registry<Location>,
    pub maps: Registry<WorldMap>,
    pub quests: Registry<Quest>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            activities: Registry::new("activity"),
            commitments: Registry::new("commitment"),
            rooms: Registry::new("room"),
            locations: Registry::new("location"),
            maps: Registry::new("map"),
            quests: Registry::new("quest"),
        }
    }
}

impl Catalog {
    /// Containers may list plain activities and commitments alike.
    pub fn find_activity(&self, id: &str) -> Option<&Activity> {
        let found = self
            .activities
            .find(id)
            .or_else(|| self.commitments.find(id).map(Commitment::activity));
        if found.is_none() {
            warn!("[Catalog] No activity or commitment registered with id '{}'", id);
        }
        found
    }
}
