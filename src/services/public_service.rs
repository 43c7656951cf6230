//! Read-only projections of the live race registry.

use crate::{
    dto::race::{RaceDetailResponse, RaceListResponse, RaceSummary},
    error::ServiceError,
    state::{SharedState, race::RaceId},
};

/// Every live race in identifier order.
pub async fn list_races(state: &SharedState) -> RaceListResponse {
    let races = state.serializer().acquire().await;
    RaceListResponse {
        races: races.iter().map(RaceSummary::from).collect(),
    }
}

/// One live race with its racers' progress.
pub async fn get_race(state: &SharedState, id: RaceId) -> Result<RaceDetailResponse, ServiceError> {
    let races = state.serializer().acquire().await;
    let race = races.require(id)?;
    Ok(RaceDetailResponse::from(race))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        dto::ws::ClientCommand,
        services::race_service::{execute, testing::Harness},
    };

    #[tokio::test]
    async fn lists_and_details_live_races() {
        let harness = Harness::new();
        let alice = harness.connect("alice").await;
        let command: ClientCommand =
            serde_json::from_value(json!({ "type": "race_create", "name": "Daily" })).unwrap();
        let id = execute(&harness.state, &alice.identity, command)
            .await
            .unwrap()
            .unwrap();

        let list = list_races(&harness.state).await;
        assert_eq!(list.races.len(), 1);
        assert_eq!(list.races[0].name, "Daily");

        let detail = get_race(&harness.state, id).await.unwrap();
        assert_eq!(detail.racers.len(), 1);
        assert_eq!(detail.racers[0].name, "alice");

        assert!(matches!(
            get_race(&harness.state, id + 1).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
