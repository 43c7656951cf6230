use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use super::RaceStore;
use crate::dao::{models::FinishedRaceEntity, storage::StorageResult};

/// Keeps finished races in memory for the process lifetime.
#[derive(Clone, Default)]
pub struct MemoryRaceStore {
    races: Arc<RwLock<Vec<FinishedRaceEntity>>>,
}

impl MemoryRaceStore {
    /// Finished races in the order they were stored.
    pub async fn finished(&self) -> Vec<FinishedRaceEntity> {
        self.races.read().await.clone()
    }
}

impl RaceStore for MemoryRaceStore {
    fn finish_race(&self, race: FinishedRaceEntity) -> BoxFuture<'static, StorageResult<()>> {
        let races = Arc::clone(&self.races);
        Box::pin(async move {
            races.write().await.push(race);
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
