use std::collections::BTreeMap;

use tokio::sync::{Mutex, MutexGuard};

use crate::state::race::{Race, RaceError, RaceId, RaceStatus};

/// Authoritative set of live races.
///
/// Only reachable through [`CommandSerializer::acquire`], so every read and write happens while
/// holding the serializer.
#[derive(Debug)]
pub struct RaceRegistry {
    races: BTreeMap<RaceId, Race>,
    next_id: RaceId,
}

impl Default for RaceRegistry {
    fn default() -> Self {
        Self {
            races: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl RaceRegistry {
    /// Reserve the next race identifier.
    pub fn allocate_id(&mut self) -> RaceId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    #[allow(missing_docs)]
    pub fn insert(&mut self, race: Race) {
        self.races.insert(race.id(), race);
    }

    #[allow(missing_docs)]
    pub fn get(&self, id: RaceId) -> Option<&Race> {
        self.races.get(&id)
    }

    #[allow(missing_docs)]
    pub fn get_mut(&mut self, id: RaceId) -> Option<&mut Race> {
        self.races.get_mut(&id)
    }

    #[allow(missing_docs)]
    pub fn remove(&mut self, id: RaceId) -> Option<Race> {
        self.races.remove(&id)
    }

    /// Like [`get`](Self::get), failing with [`RaceError::RaceNotFound`].
    pub fn require(&self, id: RaceId) -> Result<&Race, RaceError> {
        self.races.get(&id).ok_or(RaceError::RaceNotFound(id))
    }

    /// Like [`get_mut`](Self::get_mut), failing with [`RaceError::RaceNotFound`].
    pub fn require_mut(&mut self, id: RaceId) -> Result<&mut Race, RaceError> {
        self.races.get_mut(&id).ok_or(RaceError::RaceNotFound(id))
    }

    /// Live races in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &Race> {
        self.races.values()
    }

    #[allow(missing_docs)]
    pub fn len(&self) -> usize {
        self.races.len()
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.races.is_empty()
    }

    /// Whether a live race already uses `name`, ignoring case.
    pub fn name_taken(&self, name: &str) -> bool {
        self.races
            .values()
            .any(|race| race.name().eq_ignore_ascii_case(name))
    }

    /// Number of live races captained by `captain`.
    pub fn captained_by(&self, captain: &str) -> usize {
        self.races
            .values()
            .filter(|race| race.captain() == captain)
            .count()
    }

    /// Open races `name` is a racer of.
    pub fn open_races_with(&self, name: &str) -> Vec<RaceId> {
        self.races
            .values()
            .filter(|race| race.status() == RaceStatus::Open && race.is_racer(name))
            .map(Race::id)
            .collect()
    }
}

/// Single ownership token for race state.
///
/// Every command handler and timer callback holds the guard for its whole body.
#[derive(Debug, Default)]
pub struct CommandSerializer {
    races: Mutex<RaceRegistry>,
}

impl CommandSerializer {
    /// Wait for exclusive access to the live races.
    pub async fn acquire(&self) -> MutexGuard<'_, RaceRegistry> {
        self.races.lock().await
    }
}
