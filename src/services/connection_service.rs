//! Connection lifecycle: lobby membership on connect, race and room cleanup on disconnect.

use axum::extract::ws::Message;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    services::{race_events, race_service, room_service},
    state::{
        SharedState,
        connections::{ClientConnection, Identity},
        rooms::LOBBY_ROOM,
    },
};

/// Register a fresh connection, put it in the lobby and send it the race list.
///
/// A previous connection of the same identity is replaced and asked to close.
pub async fn connect(state: &SharedState, connection: ClientConnection) {
    let races = state.serializer().acquire().await;
    let identity = connection.identity.clone();

    if let Some(previous) = state.connections().register(connection) {
        info!(user = %identity.name, "replacing existing connection");
        let _ = previous.tx.send(Message::Close(None));
    }
    info!(user = %identity.name, admin = identity.admin, "client connected");

    room_service::join_room(state, LOBBY_ROOM, &identity);
    race_events::send_race_list(state, &identity.name, &races);
}

/// Tear down connection `connection_id` of `identity`.
///
/// Open races are left as if the user sent `race_leave`; races already underway keep the racer.
/// Nothing happens when the connection was already replaced by a newer one.
pub async fn disconnect(state: &SharedState, identity: &Identity, connection_id: Uuid) {
    let mut races = state.serializer().acquire().await;
    let name = identity.name.as_str();
    if !state.connections().is_current(name, connection_id) {
        debug!(user = %name, "stale connection closed; nothing to clean up");
        return;
    }

    for id in races.open_races_with(name) {
        if let Err(err) = race_service::leave_race(state, &mut races, name, id) {
            warn!(race_id = id, user = %name, error = %err, "failed to leave race on disconnect");
        }
    }
    for room in state.rooms().rooms_of(name) {
        room_service::leave_room(state, &room, name);
    }
    state.connections().unregister(name, connection_id);
    info!(user = %name, "client disconnected");
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        dto::ws::ClientCommand,
        services::race_service::{execute, testing::Harness},
        state::rooms::race_room,
    };

    async fn create_race(harness: &Harness, identity: &Identity) -> u64 {
        let command: ClientCommand =
            serde_json::from_value(json!({ "type": "race_create" })).unwrap();
        execute(&harness.state, identity, command)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn connect_sends_race_list_and_lobby_members() {
        let harness = Harness::new();
        let alice = harness.connect("alice").await;
        let id = create_race(&harness, &alice.identity).await;

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        connect(&harness.state, ClientConnection::new(Identity::new("bob"), tx)).await;

        let mut kinds = Vec::new();
        while let Ok(Message::Text(text)) = rx.try_recv() {
            let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
            if value["type"] == "race_list" {
                assert_eq!(value["races"][0]["id"], id);
            }
            kinds.push(value["type"].as_str().unwrap().to_owned());
        }
        assert_eq!(kinds, vec!["room_members", "race_list"]);
        assert_eq!(harness.state.rooms().snapshot(LOBBY_ROOM).len(), 2);
    }

    #[tokio::test]
    async fn disconnect_deletes_race_of_sole_racer() {
        let harness = Harness::new();
        let alice = harness.connect("alice").await;
        let mut bob = harness.connect("bob").await;
        let id = create_race(&harness, &alice.identity).await;
        bob.drain();

        disconnect(&harness.state, &alice.identity, alice.connection_id).await;

        assert!(harness.state.serializer().acquire().await.get(id).is_none());
        assert!(!harness.state.rooms().contains(&race_room(id)));
        assert!(harness.state.connections().sender("alice").is_none());

        let kinds: Vec<_> = bob
            .drain()
            .into_iter()
            .map(|message| message["type"].as_str().unwrap().to_owned())
            .collect();
        assert_eq!(kinds, vec!["race_left", "room_members"]);
    }

    #[tokio::test]
    async fn stale_disconnect_leaves_reconnected_user_alone() {
        let harness = Harness::new();
        let first = harness.connect("alice").await;
        let id = create_race(&harness, &first.identity).await;
        let mut second = harness.connect("alice").await;

        disconnect(&harness.state, &first.identity, first.connection_id).await;

        assert!(harness.state.serializer().acquire().await.get(id).is_some());
        assert!(harness.state.connections().is_current("alice", second.connection_id));
        assert_eq!(harness.state.rooms().snapshot(LOBBY_ROOM).len(), 1);
        assert!(second.drain().is_empty());
    }

    #[tokio::test]
    async fn reconnect_closes_previous_socket() {
        let harness = Harness::new();
        let mut first = harness.connect("alice").await;
        let _second = harness.connect("alice").await;

        assert!(matches!(first.rx.try_recv(), Ok(Message::Close(None))));
    }
}
