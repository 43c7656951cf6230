use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::{
        race::{ItemSummary, RaceSummary},
        validation::validate_race_name,
    },
    state::{
        race::{FloorReport, RaceId, RaceStatus, RacerStatus},
        rooms::RoomMember,
        ruleset::{Ruleset, RulesetUpdate},
    },
};

/// `race_create` payload.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateRacePayload {
    /// Display name; blank means "-".
    #[serde(default)]
    #[validate(custom(function = validate_race_name))]
    pub name: String,
    /// Ruleset fields; missing ones take format defaults.
    #[serde(default)]
    pub ruleset: RulesetUpdate,
}

/// Payload naming a race.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, ToSchema)]
pub struct RaceRef {
    /// Race identifier.
    pub id: RaceId,
}

/// `race_ruleset` payload.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct RulesetPayload {
    /// Race identifier.
    pub id: RaceId,
    /// Fields to change.
    pub ruleset: RulesetUpdate,
}

/// `race_floor` payload.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, ToSchema)]
#[allow(missing_docs)]
pub struct FloorPayload {
    pub id: RaceId,
    pub floor_num: u32,
    pub stage_type: u32,
    #[serde(default)]
    pub character_num: Option<u32>,
    #[serde(default)]
    pub backwards_path: Option<bool>,
}

impl From<FloorPayload> for FloorReport {
    fn from(payload: FloorPayload) -> Self {
        Self {
            floor_num: payload.floor_num,
            stage_type: payload.stage_type,
            character_num: payload.character_num,
            backwards_path: payload.backwards_path,
        }
    }
}

/// `race_item` payload.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, ToSchema)]
#[allow(missing_docs)]
pub struct ItemPayload {
    pub id: RaceId,
    pub item_id: u32,
}

/// `race_room` payload.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct RoomPayload {
    /// Race identifier.
    pub id: RaceId,
    /// In-game room identifier.
    #[validate(length(min = 1, max = 64))]
    pub room_id: String,
}

/// `race_comment` payload.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[allow(missing_docs)]
pub struct CommentPayload {
    pub id: RaceId,
    pub comment: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Commands accepted from WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum ClientCommand {
    RaceCreate(CreateRacePayload),
    RaceJoin(RaceRef),
    RaceLeave(RaceRef),
    RaceReady(RaceRef),
    RaceUnready(RaceRef),
    RaceRuleset(RulesetPayload),
    RaceFloor(FloorPayload),
    RaceItem(ItemPayload),
    RaceRoom(RoomPayload),
    RaceComment(CommentPayload),
    RaceFinish(RaceRef),
    RaceQuit(RaceRef),
}

impl ClientCommand {
    /// Wire name echoed in replies.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RaceCreate(_) => "race_create",
            Self::RaceJoin(_) => "race_join",
            Self::RaceLeave(_) => "race_leave",
            Self::RaceReady(_) => "race_ready",
            Self::RaceUnready(_) => "race_unready",
            Self::RaceRuleset(_) => "race_ruleset",
            Self::RaceFloor(_) => "race_floor",
            Self::RaceItem(_) => "race_item",
            Self::RaceRoom(_) => "race_room",
            Self::RaceComment(_) => "race_comment",
            Self::RaceFinish(_) => "race_finish",
            Self::RaceQuit(_) => "race_quit",
        }
    }

    /// Race the command targets, if any.
    pub fn race_id(&self) -> Option<RaceId> {
        match self {
            Self::RaceCreate(_) => None,
            Self::RaceJoin(payload)
            | Self::RaceLeave(payload)
            | Self::RaceReady(payload)
            | Self::RaceUnready(payload)
            | Self::RaceFinish(payload)
            | Self::RaceQuit(payload) => Some(payload.id),
            Self::RaceRuleset(payload) => Some(payload.id),
            Self::RaceFloor(payload) => Some(payload.id),
            Self::RaceItem(payload) => Some(payload.id),
            Self::RaceRoom(payload) => Some(payload.id),
            Self::RaceComment(payload) => Some(payload.id),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Messages pushed to WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum ServerMessage {
    /// Reply to an accepted command.
    Success {
        command: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<RaceId>,
    },
    /// Reply to a rejected command.
    Error { command: String, message: String },
    RaceList { races: Vec<RaceSummary> },
    RaceCreated { race: RaceSummary },
    RaceJoined { id: RaceId, name: String },
    RaceLeft { id: RaceId, name: String },
    RaceSetCaptain { id: RaceId, captain: String },
    RaceSetStatus { id: RaceId, status: RaceStatus },
    RaceSetRuleset { id: RaceId, ruleset: Ruleset },
    RaceStart { id: RaceId, seconds_to_wait: f64 },
    RacerSetStatus {
        id: RaceId,
        name: String,
        status: RacerStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        place: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        run_time_ms: Option<u64>,
    },
    RacerSetFloor {
        id: RaceId,
        name: String,
        floor_num: u32,
        stage_type: u32,
        character_num: u32,
        backwards_path: bool,
    },
    RacerAddItem {
        id: RaceId,
        name: String,
        item: ItemSummary,
    },
    RacerSetComment {
        id: RaceId,
        name: String,
        comment: String,
    },
    RacerSetPlaceMid {
        id: RaceId,
        name: String,
        place_mid: u32,
    },
    RoomMembers {
        room: String,
        members: Vec<RoomMember>,
    },
}

impl ServerMessage {
    /// Acknowledge `command`.
    pub fn success(command: &str, id: Option<RaceId>) -> Self {
        Self::Success {
            command: command.to_owned(),
            id,
        }
    }

    /// Reject `command` with a human-readable reason.
    pub fn error(command: &str, message: impl Into<String>) -> Self {
        Self::Error {
            command: command.to_owned(),
            message: message.into(),
        }
    }
}
