mod file;
mod memory;

use futures::future::BoxFuture;

use crate::dao::{models::FinishedRaceEntity, storage::StorageResult};

pub use self::{file::FileRaceStore, memory::MemoryRaceStore};

/// Persistence gateway receiving every race exactly once, when it finishes.
pub trait RaceStore: Send + Sync {
    /// Store the race, its racers, their item logs and room visits.
    fn finish_race(&self, race: FinishedRaceEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Check that the backend accepts writes.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
