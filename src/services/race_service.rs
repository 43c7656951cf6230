use std::time::SystemTime;

use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use validator::Validate;

use crate::{
    dao::models::FinishedRaceEntity,
    dto::ws::{ClientCommand, CreateRacePayload, RulesetPayload},
    error::ServiceError,
    services::{race_events, room_service, timers},
    state::{
        SharedState,
        connections::Identity,
        race::{Race, RaceError, RaceId},
        ranking,
        registry::RaceRegistry,
        rooms::race_room,
        ruleset::{NO_SEED, Ruleset},
    },
};

/// Run one client command under the command serializer.
///
/// Returns the race the command applied to. Races that finished during the command are handed
/// to the collaborators once the serializer is released.
pub async fn execute(
    state: &SharedState,
    identity: &Identity,
    command: ClientCommand,
) -> Result<Option<RaceId>, ServiceError> {
    let (id, finished) = {
        let mut races = state.serializer().acquire().await;
        dispatch(state, &mut races, identity, command)?
    };

    if let Some(race) = finished {
        hand_off(state, race).await;
    }
    Ok(id)
}

type Dispatched = (Option<RaceId>, Option<FinishedRaceEntity>);

fn dispatch(
    state: &SharedState,
    races: &mut RaceRegistry,
    identity: &Identity,
    command: ClientCommand,
) -> Result<Dispatched, ServiceError> {
    let name = identity.name.as_str();
    let limits = *state.config().limits();
    let now = SystemTime::now();

    match command {
        ClientCommand::RaceCreate(payload) => {
            let id = create_race(state, races, identity, payload)?;
            Ok((Some(id), None))
        }
        ClientCommand::RaceJoin(target) => {
            let race = races.require_mut(target.id)?;
            race.join(name, now)?;
            info!(race_id = target.id, user = %name, "racer joined");
            race_events::broadcast_race_joined(state, target.id, name);
            room_service::join_room(state, &race_room(target.id), identity);
            Ok((Some(target.id), None))
        }
        ClientCommand::RaceLeave(target) => {
            leave_race(state, races, name, target.id)?;
            Ok((Some(target.id), None))
        }
        ClientCommand::RaceReady(target) => {
            let race = races.require_mut(target.id)?;
            race.set_ready(name)?;
            race_events::broadcast_racer_status(state, race, name);
            start_check(state, race);
            Ok((Some(target.id), None))
        }
        ClientCommand::RaceUnready(target) => {
            let race = races.require_mut(target.id)?;
            race.set_unready(name)?;
            race_events::broadcast_racer_status(state, race, name);
            Ok((Some(target.id), None))
        }
        ClientCommand::RaceRuleset(RulesetPayload { id, ruleset }) => {
            let race = races.require_mut(id)?;
            let updated = race
                .update_ruleset(name, &ruleset, &limits, &mut rand::rng())?
                .clone();
            info!(race_id = id, ruleset = ?updated, "ruleset changed");
            race_events::broadcast_race_ruleset(state, race);
            Ok((Some(id), None))
        }
        ClientCommand::RaceFloor(payload) => {
            let race = races.require_mut(payload.id)?;
            race.report_floor(name, payload.into(), now)?;
            race_events::broadcast_racer_floor(state, race, name);
            update_standings(state, race);
            Ok((Some(payload.id), None))
        }
        ClientCommand::RaceItem(payload) => {
            let race = races.require_mut(payload.id)?;
            let item = race.report_item(name, payload.item_id, &limits, now)?;
            race_events::broadcast_racer_item(state, race, name, &item);
            update_standings(state, race);
            Ok((Some(payload.id), None))
        }
        ClientCommand::RaceRoom(payload) => {
            payload.validate()?;
            let race = races.require_mut(payload.id)?;
            race.report_room(name, &payload.room_id, now)?;
            debug!(race_id = payload.id, user = %name, room = %payload.room_id, "room visited");
            Ok((Some(payload.id), None))
        }
        ClientCommand::RaceComment(payload) => {
            if identity.squelched {
                return Err(ServiceError::Unauthorized(
                    "squelched users cannot comment".into(),
                ));
            }
            let race = races.require_mut(payload.id)?;
            race.set_comment(name, &payload.comment, &limits)?;
            race_events::broadcast_racer_comment(state, race, name);
            update_standings(state, race);
            Ok((Some(payload.id), None))
        }
        ClientCommand::RaceFinish(target) => {
            let race = races.require_mut(target.id)?;
            let place = race.finish_run(name, now)?;
            info!(race_id = target.id, user = %name, place, "racer finished");
            race_events::broadcast_racer_status(state, race, name);
            update_standings(state, race);
            Ok((Some(target.id), finish_check(state, races, target.id)))
        }
        ClientCommand::RaceQuit(target) => {
            let race = races.require_mut(target.id)?;
            race.quit(name, now)?;
            info!(race_id = target.id, user = %name, "racer quit");
            race_events::broadcast_racer_status(state, race, name);
            update_standings(state, race);
            Ok((Some(target.id), finish_check(state, races, target.id)))
        }
    }
}

fn create_race(
    state: &SharedState,
    races: &mut RaceRegistry,
    identity: &Identity,
    payload: CreateRacePayload,
) -> Result<RaceId, ServiceError> {
    payload.validate()?;
    let limits = state.config().limits();

    let name = match payload.name.trim() {
        "" => NO_SEED.to_owned(),
        trimmed => trimmed.to_owned(),
    };
    if name != NO_SEED && races.name_taken(&name) {
        return Err(RaceError::NameTaken(name).into());
    }
    if races.captained_by(&identity.name) >= limits.max_captained_races {
        return Err(RaceError::CaptainLimit(limits.max_captained_races).into());
    }

    let mut ruleset = payload
        .ruleset
        .apply_to(&Ruleset::default())
        .validated(limits)?;
    ruleset.fill_seed(&mut rand::rng());

    let id = races.allocate_id();
    let race = Race::new(id, name, ruleset, identity.name.clone(), SystemTime::now());
    info!(race_id = id, name = %race.name(), captain = %identity.name, "race created");
    race_events::broadcast_race_created(state, &race);
    races.insert(race);
    room_service::join_room(state, &race_room(id), identity);
    Ok(id)
}

/// Remove `name` from open race `id`; shared by the leave command and disconnect cleanup.
pub(crate) fn leave_race(
    state: &SharedState,
    races: &mut RaceRegistry,
    name: &str,
    id: RaceId,
) -> Result<(), ServiceError> {
    let race = races.require_mut(id)?;
    let outcome = race.leave(name)?;
    info!(race_id = id, user = %name, "racer left");
    race_events::broadcast_race_left(state, id, name);
    room_service::leave_room(state, &race_room(id), name);

    if outcome.emptied {
        races.remove(id);
        room_service::drop_room(state, &race_room(id));
        info!(race_id = id, "last racer left; race deleted");
        return Ok(());
    }

    if let Some(captain) = outcome.new_captain.as_deref() {
        info!(race_id = id, captain = %captain, "captain handed over");
        race_events::broadcast_race_captain(state, id, captain);
    }
    start_check(state, race);
    Ok(())
}

fn start_check(state: &SharedState, race: &mut Race) {
    if !race.ready_to_start() {
        return;
    }
    if let Err(err) = race.begin_countdown() {
        warn!(race_id = race.id(), error = %err, "failed to start countdown");
        return;
    }

    let delay = state.config().timings().start_delay_for(race.ruleset());
    info!(race_id = race.id(), ?delay, "everyone ready; starting countdown");
    race_events::broadcast_race_status(state, race);
    race_events::broadcast_race_start(state, race, delay);
    timers::schedule_start(state, race.id(), delay);
}

pub(crate) fn update_standings(state: &SharedState, race: &mut Race) {
    let changes = ranking::recompute(race);
    race_events::broadcast_place_changes(state, race, &changes);
}

/// Finish race `id` when nobody is racing anymore.
///
/// The race leaves the registry here; the returned record must go through [`hand_off`].
pub(crate) fn finish_check(
    state: &SharedState,
    races: &mut RaceRegistry,
    id: RaceId,
) -> Option<FinishedRaceEntity> {
    if !races.get(id).is_some_and(Race::everyone_done) {
        return None;
    }
    let mut race = races.remove(id)?;
    if let Err(err) = race.mark_finished(SystemTime::now()) {
        error!(race_id = id, error = %err, "failed to mark race finished");
    }

    info!(race_id = id, "race finished");
    race_events::broadcast_race_status(state, &race);
    room_service::drop_room(state, &race_room(id));
    Some(FinishedRaceEntity::from(&race))
}

/// Persist a finished race and request a rating update when the ruleset calls for it.
pub(crate) async fn hand_off(state: &SharedState, race: FinishedRaceEntity) {
    let race_id = race.id;
    match persist(state, race.clone()).await {
        Ok(()) => info!(race_id, "finished race stored"),
        Err(err) => error!(race_id, error = %err, "failed to store finished race"),
    }

    if let Some(kind) = race.ruleset.rating_kind() {
        let ratings = state.ratings();
        tokio::spawn(ratings.update_ratings(kind, race));
    }
}

/// One gateway call, bounded by the configured persistence timeout.
async fn persist(state: &SharedState, race: FinishedRaceEntity) -> Result<(), ServiceError> {
    let limit = state.config().persist_timeout();
    timeout(limit, state.store().finish_race(race))
        .await
        .map_err(|_| ServiceError::Timeout(limit))??;
    Ok(())
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::testing::{Client, Harness, START_DELAY};
    use super::*;
    use crate::{
        dto::ws::{CommentPayload, FloorPayload, RaceRef},
        services::ratings::RatingKind,
        state::{
            connections::Identity,
            race::{RaceStatus, RacerStatus},
            ruleset::{RaceFormat, RulesetUpdate},
        },
    };

    async fn run(
        harness: &Harness,
        client: &Client,
        command: serde_json::Value,
    ) -> Result<Option<RaceId>, ServiceError> {
        let command: ClientCommand = serde_json::from_value(command).unwrap();
        execute(&harness.state, &client.identity, command).await
    }

    async fn create(harness: &Harness, client: &Client, ruleset: serde_json::Value) -> RaceId {
        run(
            harness,
            client,
            json!({ "type": "race_create", "ruleset": ruleset }),
        )
        .await
        .unwrap()
        .unwrap()
    }

    async fn race_status(harness: &Harness, id: RaceId) -> Option<RaceStatus> {
        let races = harness.state.serializer().acquire().await;
        races.get(id).map(Race::status)
    }

    /// Create a race with `clients`, ready everyone and wait for the start timer.
    async fn started_race(harness: &Harness, clients: &[&Client]) -> RaceId {
        let id = create(harness, clients[0], json!({})).await;
        for client in &clients[1..] {
            run(harness, client, json!({ "type": "race_join", "id": id }))
                .await
                .unwrap();
        }
        for client in clients {
            run(harness, client, json!({ "type": "race_ready", "id": id }))
                .await
                .unwrap();
        }
        tokio::time::sleep(START_DELAY * 4).await;
        assert_eq!(race_status(harness, id).await, Some(RaceStatus::InProgress));
        id
    }

    #[tokio::test]
    async fn create_announces_race_to_everyone() {
        let harness = Harness::new();
        let alice = harness.connect("alice").await;
        let mut bob = harness.connect("bob").await;

        let id = create(&harness, &alice, json!({ "format": "seeded" })).await;

        let created = bob.drain_type("race_created");
        assert_eq!(created.len(), 1);
        assert_eq!(created[0]["race"]["id"], id);
        assert_eq!(created[0]["race"]["name"], "-");
        let seed = created[0]["race"]["ruleset"]["seed"].as_str().unwrap();
        assert_eq!(seed.len(), 8);
        assert_eq!(harness.state.rooms().snapshot(&race_room(id)).len(), 1);
    }

    #[tokio::test]
    async fn duplicate_names_and_captain_limit_are_rejected() {
        let harness = Harness::new();
        let alice = harness.connect("alice").await;
        let bob = harness.connect("bob").await;

        run(&harness, &alice, json!({ "type": "race_create", "name": "Weekly" }))
            .await
            .unwrap();
        let err = run(&harness, &bob, json!({ "type": "race_create", "name": "weekly" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        run(&harness, &alice, json!({ "type": "race_create" }))
            .await
            .unwrap();
        let err = run(&harness, &alice, json!({ "type": "race_create" }))
            .await
            .unwrap_err();
        assert_eq!(err.client_message(), "cannot captain more than 2 races at once");
    }

    #[tokio::test]
    async fn rejected_command_mutates_and_broadcasts_nothing() {
        let harness = Harness::new();
        let alice = harness.connect("alice").await;
        let mut bob = harness.connect("bob").await;
        let id = create(&harness, &alice, json!({})).await;
        run(&harness, &bob, json!({ "type": "race_join", "id": id }))
            .await
            .unwrap();
        bob.drain();

        let err = run(&harness, &bob, json!({ "type": "race_join", "id": id }))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert!(bob.drain().is_empty());

        let err = run(&harness, &bob, json!({ "type": "race_join", "id": 99 }))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn leaving_hands_over_captaincy_and_last_leaver_deletes() {
        let harness = Harness::new();
        let alice = harness.connect("alice").await;
        let mut bob = harness.connect("bob").await;
        let id = create(&harness, &alice, json!({})).await;
        run(&harness, &bob, json!({ "type": "race_join", "id": id }))
            .await
            .unwrap();
        bob.drain();

        run(&harness, &alice, json!({ "type": "race_leave", "id": id }))
            .await
            .unwrap();
        let captain = bob.drain_type("race_set_captain");
        assert_eq!(captain[0]["captain"], "bob");

        run(&harness, &bob, json!({ "type": "race_leave", "id": id }))
            .await
            .unwrap();
        assert_eq!(race_status(&harness, id).await, None);
        assert!(!harness.state.rooms().contains(&race_room(id)));
    }

    #[tokio::test]
    async fn everyone_ready_starts_countdown_then_race() {
        let harness = Harness::new();
        let alice = harness.connect("alice").await;
        let mut bob = harness.connect("bob").await;
        let id = create(&harness, &alice, json!({})).await;
        run(&harness, &bob, json!({ "type": "race_join", "id": id }))
            .await
            .unwrap();

        run(&harness, &alice, json!({ "type": "race_ready", "id": id }))
            .await
            .unwrap();
        assert_eq!(race_status(&harness, id).await, Some(RaceStatus::Open));
        run(&harness, &bob, json!({ "type": "race_ready", "id": id }))
            .await
            .unwrap();
        assert_eq!(race_status(&harness, id).await, Some(RaceStatus::Starting));

        let start = bob.drain_type("race_start");
        assert_eq!(start.len(), 1);
        assert_eq!(start[0]["seconds_to_wait"], START_DELAY.as_secs_f64());

        tokio::time::sleep(START_DELAY * 4).await;
        let races = harness.state.serializer().acquire().await;
        let race = races.get(id).unwrap();
        assert_eq!(race.status(), RaceStatus::InProgress);
        for racer in race.racers().values() {
            assert_eq!(racer.status, RacerStatus::Racing);
            assert_eq!(racer.place_mid, 2);
        }
    }

    #[tokio::test]
    async fn solo_race_starts_with_one_ready_racer() {
        let harness = Harness::new();
        let alice = harness.connect("alice").await;
        let id = create(&harness, &alice, json!({ "solo": true })).await;
        run(&harness, &alice, json!({ "type": "race_ready", "id": id }))
            .await
            .unwrap();
        assert_eq!(race_status(&harness, id).await, Some(RaceStatus::Starting));
    }

    #[tokio::test]
    async fn solo_race_stays_single_racer_and_still_starts() {
        let harness = Harness::new();
        let alice = harness.connect("alice").await;
        let mut bob = harness.connect("bob").await;
        let id = create(&harness, &alice, json!({ "solo": true })).await;
        bob.drain();

        let err = run(&harness, &bob, json!({ "type": "race_join", "id": id }))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert_eq!(err.client_message(), "solo races cannot be joined");
        assert!(bob.drain_type("race_joined").is_empty());

        run(&harness, &alice, json!({ "type": "race_ready", "id": id }))
            .await
            .unwrap();
        assert_eq!(race_status(&harness, id).await, Some(RaceStatus::Starting));
    }

    #[tokio::test]
    async fn crowded_race_cannot_be_made_solo() {
        let harness = Harness::new();
        let alice = harness.connect("alice").await;
        let bob = harness.connect("bob").await;
        let id = create(&harness, &alice, json!({})).await;
        run(&harness, &bob, json!({ "type": "race_join", "id": id }))
            .await
            .unwrap();
        run(&harness, &bob, json!({ "type": "race_ready", "id": id }))
            .await
            .unwrap();

        let err = run(
            &harness,
            &alice,
            json!({ "type": "race_ruleset", "id": id, "ruleset": { "solo": true } }),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err.client_message(),
            "a race with more than one racer cannot be made solo"
        );

        let races = harness.state.serializer().acquire().await;
        let race = races.get(id).unwrap();
        assert!(!race.ruleset().solo);
        assert_eq!(race.racer("bob").unwrap().status, RacerStatus::Ready);
    }

    #[tokio::test]
    async fn progress_updates_places_and_reaches_racers() {
        let harness = Harness::new();
        let alice = harness.connect("alice").await;
        let mut bob = harness.connect("bob").await;
        let id = started_race(&harness, &[&alice, &bob]).await;
        bob.drain();

        let floor = FloorPayload {
            id,
            floor_num: 2,
            stage_type: 0,
            character_num: None,
            backwards_path: None,
        };
        execute(&harness.state, &alice.identity, ClientCommand::RaceFloor(floor))
            .await
            .unwrap();

        let messages = bob.drain();
        assert!(messages.iter().any(|m| m["type"] == "racer_set_floor"));
        let places: Vec<_> = messages
            .iter()
            .filter(|m| m["type"] == "racer_set_place_mid")
            .collect();
        assert_eq!(places.len(), 1);
        assert_eq!(places[0]["name"], "alice");
        assert_eq!(places[0]["place_mid"], 1);

        run(&harness, &alice, json!({ "type": "race_item", "id": id, "item_id": 114 }))
            .await
            .unwrap();
        let items = bob.drain_type("racer_add_item");
        assert_eq!(items[0]["item"]["item_id"], 114);
        assert_eq!(items[0]["item"]["floor_num"], 2);
    }

    #[tokio::test]
    async fn squelched_racer_cannot_comment() {
        let harness = Harness::new();
        let alice = harness
            .connect_as(Identity {
                squelched: true,
                ..Identity::new("alice")
            })
            .await;
        let bob = harness.connect("bob").await;
        let id = started_race(&harness, &[&alice, &bob]).await;

        let comment = CommentPayload {
            id,
            comment: "hi".into(),
        };
        let err = execute(
            &harness.state,
            &alice.identity,
            ClientCommand::RaceComment(comment.clone()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        execute(&harness.state, &bob.identity, ClientCommand::RaceComment(comment))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn race_finishes_only_after_last_racer_stops() {
        let harness = Harness::new();
        let alice = harness.connect("alice").await;
        let bob = harness.connect("bob").await;
        let mut carol = harness.connect("carol").await;
        let id = started_race(&harness, &[&alice, &bob, &carol]).await;

        for quitter in [&alice, &bob] {
            execute(
                &harness.state,
                &quitter.identity,
                ClientCommand::RaceQuit(RaceRef { id }),
            )
            .await
            .unwrap();
            assert_eq!(race_status(&harness, id).await, Some(RaceStatus::InProgress));
        }
        assert!(harness.store.finished().await.is_empty());
        carol.drain();

        run(&harness, &carol, json!({ "type": "race_finish", "id": id }))
            .await
            .unwrap();
        assert_eq!(race_status(&harness, id).await, None);

        let statuses = carol.drain_type("race_set_status");
        assert_eq!(statuses[0]["status"], "finished");

        let stored = harness.store.finished().await;
        assert_eq!(stored.len(), 1);
        let carol_record = stored[0].racers.iter().find(|r| r.name == "carol").unwrap();
        assert_eq!(carol_record.place, Some(1));
        assert!(harness.ratings.calls().is_empty());
    }

    #[tokio::test]
    async fn ranked_races_are_handed_to_ratings() {
        let harness = Harness::new();
        let alice = harness.connect("alice").await;
        let id = create(&harness, &alice, json!({ "solo": true, "ranked": true })).await;
        run(&harness, &alice, json!({ "type": "race_ready", "id": id }))
            .await
            .unwrap();
        tokio::time::sleep(START_DELAY * 4).await;

        run(&harness, &alice, json!({ "type": "race_finish", "id": id }))
            .await
            .unwrap();
        assert_eq!(harness.ratings.calls(), vec![(RatingKind::RankedSolo, id)]);
    }

    #[tokio::test]
    async fn ruleset_seed_change_resets_readiness_and_noop_is_rejected() {
        let harness = Harness::new();
        let alice = harness.connect("alice").await;
        let bob = harness.connect("bob").await;
        let id = create(
            &harness,
            &alice,
            json!({ "format": "seeded", "seed": "ABCDEFGH" }),
        )
        .await;
        run(&harness, &bob, json!({ "type": "race_join", "id": id }))
            .await
            .unwrap();
        run(&harness, &bob, json!({ "type": "race_ready", "id": id }))
            .await
            .unwrap();

        let update = |seed: &str| RulesetPayload {
            id,
            ruleset: RulesetUpdate {
                seed: Some(seed.into()),
                ..RulesetUpdate::default()
            },
        };
        let err = execute(
            &harness.state,
            &alice.identity,
            ClientCommand::RaceRuleset(update("ABCDEFGH")),
        )
        .await
        .unwrap_err();
        assert_eq!(err.client_message(), "ruleset is unchanged");

        execute(
            &harness.state,
            &alice.identity,
            ClientCommand::RaceRuleset(update("12345678")),
        )
        .await
        .unwrap();

        let races = harness.state.serializer().acquire().await;
        let race = races.get(id).unwrap();
        assert_eq!(race.ruleset().seed, "12345678");
        assert_eq!(race.ruleset().format, RaceFormat::Seeded);
        assert!(
            race.racers()
                .values()
                .all(|racer| racer.status == RacerStatus::NotReady)
        );
    }

    #[tokio::test]
    async fn stalled_store_does_not_block_the_finish() {
        use std::sync::Arc;

        use futures::future::BoxFuture;

        use crate::{
            config::AppConfig,
            dao::{race_store::RaceStore, storage::StorageResult},
            services::ratings::testing::RecordingRatings,
            state::AppState,
        };

        struct StalledStore;
        impl RaceStore for StalledStore {
            fn finish_race(&self, _: FinishedRaceEntity) -> BoxFuture<'static, StorageResult<()>> {
                Box::pin(futures::future::pending())
            }
            fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
                Box::pin(async { Ok(()) })
            }
        }

        let config = AppConfig::default().with_persist_timeout(Duration::from_millis(20));
        let ratings = RecordingRatings::default();
        let state = AppState::new(config, Arc::new(StalledStore), Arc::new(ratings.clone()));
        let ruleset = Ruleset {
            ranked: true,
            ..Ruleset::default()
        };
        let race = Race::new(1, "-", ruleset, "alice", SystemTime::now());

        let err = persist(&state, FinishedRaceEntity::from(&race))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Timeout(limit) if limit == Duration::from_millis(20)));

        tokio::time::timeout(
            Duration::from_secs(1),
            hand_off(&state, FinishedRaceEntity::from(&race)),
        )
        .await
        .unwrap();
        assert_eq!(ratings.calls(), vec![(RatingKind::Multiplayer, 1)]);
    }
}
