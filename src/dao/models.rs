use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::state::{
    race::{ItemPickup, Race, RaceId, Racer, RacerStatus, RoomVisit},
    ruleset::Ruleset,
};

/// Finished race as handed to the persistence gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FinishedRaceEntity {
    /// Race identifier.
    pub id: RaceId,
    /// Display name.
    pub name: String,
    /// Ruleset the race was played under.
    pub ruleset: Ruleset,
    /// Captain when the race started.
    pub captain: String,
    /// Creation time.
    pub created_at: SystemTime,
    /// Start time.
    pub started_at: Option<SystemTime>,
    /// Finish time.
    pub finished_at: Option<SystemTime>,
    /// Racers in join order.
    pub racers: Vec<RacerEntity>,
}

/// Final state of one racer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RacerEntity {
    /// Racer identity.
    pub name: String,
    /// Terminal status.
    pub status: RacerStatus,
    /// Final place, for finishers.
    pub place: Option<u32>,
    /// Last live place.
    pub place_mid: u32,
    /// Run duration in milliseconds, for finishers.
    pub run_time_ms: Option<u64>,
    /// Latest comment.
    pub comment: String,
    /// Full item log.
    pub items: Vec<ItemEntity>,
    /// Full room visit log.
    pub rooms: Vec<RoomVisitEntity>,
}

/// Item pickup record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct ItemEntity {
    pub item_id: u32,
    pub floor_num: u32,
    pub stage_type: u32,
    pub at: SystemTime,
}

/// Room visit record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct RoomVisitEntity {
    pub room_id: String,
    pub floor_num: u32,
    pub stage_type: u32,
    pub at: SystemTime,
}

impl From<&ItemPickup> for ItemEntity {
    fn from(item: &ItemPickup) -> Self {
        Self {
            item_id: item.item_id,
            floor_num: item.floor_num,
            stage_type: item.stage_type,
            at: item.at,
        }
    }
}

impl From<&RoomVisit> for RoomVisitEntity {
    fn from(visit: &RoomVisit) -> Self {
        Self {
            room_id: visit.room_id.clone(),
            floor_num: visit.floor_num,
            stage_type: visit.stage_type,
            at: visit.at,
        }
    }
}

impl From<&Racer> for RacerEntity {
    fn from(racer: &Racer) -> Self {
        Self {
            name: racer.name.clone(),
            status: racer.status,
            place: racer.place,
            place_mid: racer.place_mid,
            run_time_ms: racer.run_time.map(|run| run.as_millis() as u64),
            comment: racer.comment.clone(),
            items: racer.items.iter().map(ItemEntity::from).collect(),
            rooms: racer.rooms.iter().map(RoomVisitEntity::from).collect(),
        }
    }
}

impl From<&Race> for FinishedRaceEntity {
    fn from(race: &Race) -> Self {
        Self {
            id: race.id(),
            name: race.name().to_owned(),
            ruleset: race.ruleset().clone(),
            captain: race.captain().to_owned(),
            created_at: race.created_at(),
            started_at: race.started_at(),
            finished_at: race.finished_at(),
            racers: race.racers().values().map(RacerEntity::from).collect(),
        }
    }
}
