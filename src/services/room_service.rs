use tracing::debug;

use crate::{
    services::race_events,
    state::{SharedState, connections::Identity, rooms::RoomMember},
};

/// Add `identity` to `room` and send the new member list to the room.
pub fn join_room(state: &SharedState, room: &str, identity: &Identity) {
    if state.rooms().join(room, RoomMember::from(identity)) {
        debug!(room, user = %identity.name, "joined room");
        race_events::broadcast_room_members(state, room);
    }
}

/// Remove `name` from `room` and send the remaining member list to the room.
pub fn leave_room(state: &SharedState, room: &str, name: &str) {
    if state.rooms().leave(room, name) {
        debug!(room, user = %name, "left room");
        race_events::broadcast_room_members(state, room);
    }
}

/// Forget a room without notifying anyone.
pub fn drop_room(state: &SharedState, room: &str) {
    state.rooms().drop_room(room);
}
