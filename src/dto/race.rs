use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::rfc3339,
    state::{
        race::{ItemPickup, Race, RaceId, RaceStatus, Racer, RacerStatus},
        ruleset::Ruleset,
    },
};

/// Lobby view of a live race.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RaceSummary {
    /// Race identifier.
    pub id: RaceId,
    /// Display name.
    pub name: String,
    /// Lifecycle status.
    pub status: RaceStatus,
    /// Current ruleset.
    pub ruleset: Ruleset,
    /// Current captain.
    pub captain: String,
    /// Racers in join order.
    pub racers: Vec<String>,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// RFC 3339 start time, once started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
}

impl From<&Race> for RaceSummary {
    fn from(race: &Race) -> Self {
        Self {
            id: race.id(),
            name: race.name().to_owned(),
            status: race.status(),
            ruleset: race.ruleset().clone(),
            captain: race.captain().to_owned(),
            racers: race.racers().keys().cloned().collect(),
            created_at: rfc3339(race.created_at()),
            started_at: race.started_at().map(rfc3339),
        }
    }
}

/// Item pickup as exposed to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[allow(missing_docs)]
pub struct ItemSummary {
    pub item_id: u32,
    pub floor_num: u32,
    pub stage_type: u32,
    /// RFC 3339 pickup time.
    pub at: String,
}

impl From<&ItemPickup> for ItemSummary {
    fn from(item: &ItemPickup) -> Self {
        Self {
            item_id: item.item_id,
            floor_num: item.floor_num,
            stage_type: item.stage_type,
            at: rfc3339(item.at),
        }
    }
}

/// Full view of one racer.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[allow(missing_docs)]
pub struct RacerSummary {
    pub name: String,
    pub status: RacerStatus,
    pub place_mid: u32,
    pub place: Option<u32>,
    pub floor_num: u32,
    pub stage_type: u32,
    pub character_num: u32,
    pub backwards_path: bool,
    pub comment: String,
    pub items: Vec<ItemSummary>,
    pub run_time_ms: Option<u64>,
}

impl From<&Racer> for RacerSummary {
    fn from(racer: &Racer) -> Self {
        Self {
            name: racer.name.clone(),
            status: racer.status,
            place_mid: racer.place_mid,
            place: racer.place,
            floor_num: racer.floor_num,
            stage_type: racer.stage_type,
            character_num: racer.character_num,
            backwards_path: racer.backwards_path,
            comment: racer.comment.clone(),
            items: racer.items.iter().map(ItemSummary::from).collect(),
            run_time_ms: racer.run_time.map(|run| run.as_millis() as u64),
        }
    }
}

/// Response payload for `GET /races`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RaceListResponse {
    /// Live races in identifier order.
    pub races: Vec<RaceSummary>,
}

/// Response payload for `GET /races/{id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RaceDetailResponse {
    /// Race overview.
    pub race: RaceSummary,
    /// Racers with their progress.
    pub racers: Vec<RacerSummary>,
}

impl From<&Race> for RaceDetailResponse {
    fn from(race: &Race) -> Self {
        Self {
            race: RaceSummary::from(race),
            racers: race.racers().values().map(RacerSummary::from).collect(),
        }
    }
}
