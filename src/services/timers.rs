//! Deferred lifecycle transitions.
//!
//! Timers are never cancelled. Each one sleeps outside any lock, then takes the command
//! serializer and re-checks that the race still exists and is still in the status the timer was
//! scheduled for. A race that moved on or disappeared makes the callback a no-op.

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    services::{race_events, race_service},
    state::{
        SharedState,
        race::{RaceId, RaceStatus},
    },
};

/// Start race `id` after `delay`.
pub fn schedule_start(state: &SharedState, id: RaceId, delay: Duration) {
    let state = Arc::clone(state);
    tokio::spawn(async move {
        sleep(delay).await;
        fire_start(&state, id).await;
    });
}

/// Enforce the time limit of race `id` after `limit`.
pub fn schedule_time_limit(state: &SharedState, id: RaceId, limit: Duration) {
    let state = Arc::clone(state);
    tokio::spawn(async move {
        sleep(limit).await;
        fire_time_limit(&state, id).await;
    });
}

/// Countdown elapsed: `starting` → `in_progress`.
pub async fn fire_start(state: &SharedState, id: RaceId) {
    let mut races = state.serializer().acquire().await;
    let Some(race) = races.get_mut(id) else {
        debug!(race_id = id, "start timer fired for a race that no longer exists");
        return;
    };
    if race.status() != RaceStatus::Starting {
        debug!(race_id = id, status = ?race.status(), "start timer fired out of turn");
        return;
    }
    if let Err(err) = race.start(SystemTime::now()) {
        warn!(race_id = id, error = %err, "failed to start race");
        return;
    }

    let limit = state.config().timings().time_limit_for(race.ruleset());
    info!(race_id = id, racers = race.racers().len(), ?limit, "race started");
    race_events::broadcast_race_status(state, race);
    schedule_time_limit(state, id, limit);
}

/// Time limit reached: every racer still racing quits, then the race finishes.
pub async fn fire_time_limit(state: &SharedState, id: RaceId) {
    let finished = {
        let mut races = state.serializer().acquire().await;
        let Some(race) = races.get_mut(id) else {
            debug!(race_id = id, "time limit fired for a race that no longer exists");
            return;
        };
        if race.status() != RaceStatus::InProgress {
            return;
        }

        let quitters = race.quit_remaining(SystemTime::now());
        info!(race_id = id, quitters = quitters.len(), "time limit reached");
        for name in &quitters {
            race_events::broadcast_racer_status(state, race, name);
        }
        race_service::finish_check(state, &mut races, id)
    };

    if let Some(race) = finished {
        race_service::hand_off(state, race).await;
    }
}
