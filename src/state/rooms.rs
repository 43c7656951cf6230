use dashmap::DashMap;
use indexmap::IndexMap;
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::{connections::Identity, race::RaceId};

/// Room every connection joins on connect.
pub const LOBBY_ROOM: &str = "lobby";

/// Room shared by the racers of one race.
pub fn race_room(id: RaceId) -> String {
    format!("_race_{id}")
}

/// Member descriptor carried in room snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RoomMember {
    /// Member identity.
    pub name: String,
    /// Staff member.
    pub admin: bool,
    /// Barred from posting comments.
    pub squelched: bool,
}

impl From<&Identity> for RoomMember {
    fn from(identity: &Identity) -> Self {
        Self {
            name: identity.name.clone(),
            admin: identity.admin,
            squelched: identity.squelched,
        }
    }
}

/// Room name → members in join order.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, IndexMap<String, RoomMember>>,
}

impl RoomRegistry {
    /// Add a member, returning `false` if it was already there.
    pub fn join(&self, room: &str, member: RoomMember) -> bool {
        let mut members = self.rooms.entry(room.to_owned()).or_default();
        if members.contains_key(&member.name) {
            return false;
        }
        members.insert(member.name.clone(), member);
        true
    }

    /// Remove a member; an emptied room disappears.
    pub fn leave(&self, room: &str, name: &str) -> bool {
        let removed = match self.rooms.get_mut(room) {
            Some(mut members) => members.shift_remove(name).is_some(),
            None => return false,
        };
        self.rooms.remove_if(room, |_, members| members.is_empty());
        removed
    }

    /// Members of `room` in join order.
    pub fn snapshot(&self, room: &str) -> Vec<RoomMember> {
        self.rooms
            .get(room)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Rooms `name` currently belongs to.
    pub fn rooms_of(&self, name: &str) -> Vec<String> {
        self.rooms
            .iter()
            .filter(|entry| entry.value().contains_key(name))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Forget a room and its members.
    pub fn drop_room(&self, room: &str) {
        self.rooms.remove(room);
    }

    #[allow(missing_docs)]
    pub fn contains(&self, room: &str) -> bool {
        self.rooms.contains_key(room)
    }
}
