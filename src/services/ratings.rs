use futures::future::BoxFuture;
use tracing::info;

use crate::dao::models::FinishedRaceEntity;

pub use crate::state::ruleset::RatingKind;

/// Post-race rating computation, invoked fire-and-forget for rated races.
pub trait RatingService: Send + Sync {
    /// Fold a finished race into the rating pool `kind`.
    fn update_ratings(&self, kind: RatingKind, race: FinishedRaceEntity) -> BoxFuture<'static, ()>;
}

/// Default collaborator: records the request in the logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingRatings;

impl RatingService for LoggingRatings {
    fn update_ratings(&self, kind: RatingKind, race: FinishedRaceEntity) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let finishers = race
                .racers
                .iter()
                .filter(|racer| racer.place.is_some())
                .count();
            info!(
                race_id = race.id,
                kind = ?kind,
                racers = race.racers.len(),
                finishers,
                "rating update requested"
            );
        })
    }
}
