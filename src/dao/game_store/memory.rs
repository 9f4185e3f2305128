//! In-memory store used by unit tests.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::GameStore;
use crate::dao::{
    models::{GameEntity, GameListItemEntity},
    storage::{StorageError, StorageResult},
};

/// Keeps every saved snapshot; the latest one of a game wins on reads.
#[derive(Default, Clone)]
pub struct MemoryStore {
    saved: Arc<Mutex<Vec<GameEntity>>>,
    unhealthy: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Number of saves performed so far.
    pub async fn save_count(&self) -> usize {
        self.saved.lock().await.len()
    }

    /// Make health checks and reconnects fail.
    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.unhealthy.store(unhealthy, Ordering::SeqCst);
    }

    fn probe(&self) -> StorageResult<()> {
        if self.unhealthy.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(
                "memory store unhealthy".into(),
                std::io::Error::other("unhealthy"),
            ));
        }
        Ok(())
    }
}

impl GameStore for MemoryStore {
    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let saved = self.saved.clone();
        Box::pin(async move {
            saved.lock().await.push(game);
            Ok(())
        })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let saved = self.saved.clone();
        Box::pin(async move {
            Ok(saved
                .lock()
                .await
                .iter()
                .rev()
                .find(|game| game.id == id)
                .cloned())
        })
    }

    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameListItemEntity>>> {
        let saved = self.saved.clone();
        Box::pin(async move {
            Ok(saved
                .lock()
                .await
                .iter()
                .map(GameListItemEntity::from)
                .collect())
        })
    }

    fn delete_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let saved = self.saved.clone();
        Box::pin(async move {
            let mut saved = saved.lock().await;
            let before = saved.len();
            saved.retain(|game| game.id != id);
            Ok(saved.len() != before)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.probe();
        Box::pin(async move { result })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.probe();
        Box::pin(async move { result })
    }
}
