use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::future::BoxFuture;
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};

use super::RaceStore;
use crate::dao::{
    models::FinishedRaceEntity,
    storage::{StorageError, StorageResult},
};

/// Appends one JSON document per finished race to a JSON-lines file.
#[derive(Clone)]
pub struct FileRaceStore {
    path: Arc<PathBuf>,
    write_lock: Arc<Mutex<()>>,
}

impl FileRaceStore {
    /// Store results at `path`; the file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn append(path: &Path, line: &[u8]) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(line).await?;
        file.flush().await
    }
}

impl RaceStore for FileRaceStore {
    fn finish_race(&self, race: FinishedRaceEntity) -> BoxFuture<'static, StorageResult<()>> {
        let path = Arc::clone(&self.path);
        let write_lock = Arc::clone(&self.write_lock);
        Box::pin(async move {
            let mut line = serde_json::to_vec(&race).map_err(|source| StorageError::Encoding {
                race_id: race.id,
                source,
            })?;
            line.push(b'\n');

            let _guard = write_lock.lock().await;
            Self::append(&path, &line).await.map_err(|err| {
                StorageError::unavailable(
                    format!("failed to append race {} to {}", race.id, path.display()),
                    err,
                )
            })
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let path = Arc::clone(&self.path);
        let write_lock = Arc::clone(&self.write_lock);
        Box::pin(async move {
            let _guard = write_lock.lock().await;
            Self::append(&path, b"").await.map_err(|err| {
                StorageError::unavailable(format!("cannot write to {}", path.display()), err)
            })
        })
    }
}
