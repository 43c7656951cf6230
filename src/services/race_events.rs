use std::time::Duration;

use axum::extract::ws::{Message, Utf8Bytes};
use tracing::{debug, warn};

use crate::{
    dto::{
        race::{ItemSummary, RaceSummary},
        ws::ServerMessage,
    },
    state::{
        SharedState,
        race::{ItemPickup, Race, RaceId},
        ranking::PlaceChange,
        registry::RaceRegistry,
    },
};

/// Tell every connection that a race was created.
pub fn broadcast_race_created(state: &SharedState, race: &Race) {
    let message = ServerMessage::RaceCreated {
        race: RaceSummary::from(race),
    };
    send_to_everyone(state, &message);
}

/// Tell every connection that `name` joined race `id`.
pub fn broadcast_race_joined(state: &SharedState, id: RaceId, name: &str) {
    let message = ServerMessage::RaceJoined {
        id,
        name: name.to_owned(),
    };
    send_to_everyone(state, &message);
}

/// Tell every connection that `name` left race `id`.
pub fn broadcast_race_left(state: &SharedState, id: RaceId, name: &str) {
    let message = ServerMessage::RaceLeft {
        id,
        name: name.to_owned(),
    };
    send_to_everyone(state, &message);
}

/// Tell every connection that race `id` has a new captain.
pub fn broadcast_race_captain(state: &SharedState, id: RaceId, captain: &str) {
    let message = ServerMessage::RaceSetCaptain {
        id,
        captain: captain.to_owned(),
    };
    send_to_everyone(state, &message);
}

/// Tell every connection about the race's current status.
pub fn broadcast_race_status(state: &SharedState, race: &Race) {
    let message = ServerMessage::RaceSetStatus {
        id: race.id(),
        status: race.status(),
    };
    send_to_everyone(state, &message);
}

/// Tell every connection about the race's current ruleset.
pub fn broadcast_race_ruleset(state: &SharedState, race: &Race) {
    let message = ServerMessage::RaceSetRuleset {
        id: race.id(),
        ruleset: race.ruleset().clone(),
    };
    send_to_everyone(state, &message);
}

/// Send the exact countdown to every connected racer.
pub fn broadcast_race_start(state: &SharedState, race: &Race, delay: Duration) {
    let message = ServerMessage::RaceStart {
        id: race.id(),
        seconds_to_wait: delay.as_secs_f64(),
    };
    send_to_racers(state, race, &message);
}

/// Send a racer's status (and final place, if any) to every connected racer.
pub fn broadcast_racer_status(state: &SharedState, race: &Race, name: &str) {
    let Some(racer) = race.racer(name) else {
        return;
    };
    let message = ServerMessage::RacerSetStatus {
        id: race.id(),
        name: name.to_owned(),
        status: racer.status,
        place: racer.place,
        run_time_ms: racer.run_time.map(|run| run.as_millis() as u64),
    };
    send_to_racers(state, race, &message);
}

/// Send a racer's new floor to every connected racer.
pub fn broadcast_racer_floor(state: &SharedState, race: &Race, name: &str) {
    let Some(racer) = race.racer(name) else {
        return;
    };
    let message = ServerMessage::RacerSetFloor {
        id: race.id(),
        name: name.to_owned(),
        floor_num: racer.floor_num,
        stage_type: racer.stage_type,
        character_num: racer.character_num,
        backwards_path: racer.backwards_path,
    };
    send_to_racers(state, race, &message);
}

/// Send a racer's item pickup to every connected racer.
pub fn broadcast_racer_item(state: &SharedState, race: &Race, name: &str, item: &ItemPickup) {
    let message = ServerMessage::RacerAddItem {
        id: race.id(),
        name: name.to_owned(),
        item: ItemSummary::from(item),
    };
    send_to_racers(state, race, &message);
}

/// Send a racer's comment to every connected racer.
pub fn broadcast_racer_comment(state: &SharedState, race: &Race, name: &str) {
    let Some(racer) = race.racer(name) else {
        return;
    };
    let message = ServerMessage::RacerSetComment {
        id: race.id(),
        name: name.to_owned(),
        comment: racer.comment.clone(),
    };
    send_to_racers(state, race, &message);
}

/// Send every changed live place to every connected racer.
pub fn broadcast_place_changes(state: &SharedState, race: &Race, changes: &[PlaceChange]) {
    for change in changes {
        let message = ServerMessage::RacerSetPlaceMid {
            id: race.id(),
            name: change.name.clone(),
            place_mid: change.place_mid,
        };
        send_to_racers(state, race, &message);
    }
}

/// Send the member list of `room` to its members.
pub fn broadcast_room_members(state: &SharedState, room: &str) {
    let members = state.rooms().snapshot(room);
    let Some(frame) = encode(&ServerMessage::RoomMembers {
        room: room.to_owned(),
        members: members.clone(),
    }) else {
        return;
    };
    for member in &members {
        deliver(state, &member.name, &frame);
    }
}

/// Send the live race list to one connection.
pub fn send_race_list(state: &SharedState, name: &str, races: &RaceRegistry) {
    let message = ServerMessage::RaceList {
        races: races.iter().map(RaceSummary::from).collect(),
    };
    send_to(state, name, &message);
}

/// Send a message to one identity; returns `false` when it is not connected.
pub fn send_to(state: &SharedState, name: &str, message: &ServerMessage) -> bool {
    match encode(message) {
        Some(frame) => deliver(state, name, &frame),
        None => false,
    }
}

fn send_to_everyone(state: &SharedState, message: &ServerMessage) {
    let Some(frame) = encode(message) else {
        return;
    };
    for tx in state.connections().senders() {
        let _ = tx.send(Message::Text(frame.clone()));
    }
}

fn send_to_racers(state: &SharedState, race: &Race, message: &ServerMessage) {
    let Some(frame) = encode(message) else {
        return;
    };
    for name in race.racers().keys() {
        deliver(state, name, &frame);
    }
}

fn deliver(state: &SharedState, name: &str, frame: &Utf8Bytes) -> bool {
    let Some(tx) = state.connections().sender(name) else {
        debug!(user = %name, "skipping message for disconnected user");
        return false;
    };
    tx.send(Message::Text(frame.clone())).is_ok()
}

fn encode(message: &ServerMessage) -> Option<Utf8Bytes> {
    match serde_json::to_string(message) {
        Ok(payload) => Some(Utf8Bytes::from(payload)),
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{message:?}`");
            None
        }
    }
}
