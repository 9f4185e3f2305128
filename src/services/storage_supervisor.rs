use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{game_store::GameStore, models::GameEntity, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Reconnect to the storage backend and keep the shared state in degraded mode when it is unavailable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn GameStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_game_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                resync_hosted_games(&state, store.as_ref()).await;
                delay = INITIAL_DELAY;

                loop {
                    match store.health_check().await {
                        Ok(()) => {
                            if state.is_degraded() {
                                info!("storage healthy again; leaving degraded mode");
                                state.update_degraded(false);
                                resync_hosted_games(&state, store.as_ref()).await;
                            }
                            sleep(HEALTH_POLL_INTERVAL).await;
                        }
                        Err(_) => {
                            let mut attempt = 0;
                            let mut reconnect_delay = INITIAL_DELAY;
                            let mut reconnected = false;

                            while attempt < MAX_RECONNECT_ATTEMPTS {
                                match store.try_reconnect().await {
                                    Ok(()) => {
                                        info!(
                                            "storage reconnection succeeded after health check failure"
                                        );
                                        reconnected = true;
                                        break;
                                    }
                                    Err(reconnect_err) => {
                                        if attempt == 0 {
                                            warn!(
                                                attempt, error = %reconnect_err,
                                                "storage reconnect first attempt failed; entering in degraded mode"
                                            );
                                            state.update_degraded(true);
                                        } else {
                                            warn!(attempt, error = %reconnect_err, "storage reconnect attempt failed");
                                        };
                                        attempt += 1;
                                        sleep(reconnect_delay).await;
                                        reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
                                    }
                                }
                            }

                            if reconnected {
                                if state.is_degraded() {
                                    state.update_degraded(false);
                                    resync_hosted_games(&state, store.as_ref()).await;
                                }
                                sleep(HEALTH_POLL_INTERVAL).await;
                                continue;
                            } else {
                                warn!(
                                    "exhausted storage reconnect attempts; staying in degraded mode"
                                );
                                break;
                            }
                        }
                    }
                }

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Save every hosted game; snapshots taken while degraded were kept in memory only.
async fn resync_hosted_games(state: &SharedState, store: &dyn GameStore) {
    let snapshots: Vec<GameEntity> = state
        .registry()
        .list()
        .into_iter()
        .filter_map(|listing| {
            state
                .registry()
                .read(listing.id, |game| GameEntity::from(game))
                .ok()
        })
        .collect();
    if snapshots.is_empty() {
        return;
    }

    let total = snapshots.len();
    let mut saved = 0;
    for snapshot in snapshots {
        let game_id = snapshot.id;
        match store.save_game(snapshot).await {
            Ok(()) => saved += 1,
            Err(err) => warn!(game_id = %game_id, error = %err, "failed to resync game"),
        }
    }
    info!(saved, total, "hosted games resynced to storage");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::game_store::memory::MemoryStore,
        dto::game::CreateGameRequest,
        services::game_service,
        state::AppState,
    };

    #[tokio::test(start_paused = true)]
    async fn connects_resyncs_and_tracks_health() {
        let state = AppState::new(AppConfig::default());
        game_service::create_game(
            &state,
            CreateGameRequest {
                name: "Hosted while offline".into(),
                settings: None,
            },
        )
        .unwrap();
        assert!(state.is_degraded());

        let store = MemoryStore::default();
        let connect_store = store.clone();
        let supervisor = tokio::spawn(run(state.clone(), move || {
            let store = connect_store.clone();
            async move { Ok::<_, StorageError>(Arc::new(store) as Arc<dyn GameStore>) }
        }));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!state.is_degraded());
        assert!(store.save_count().await >= 1);

        store.set_unhealthy(true);
        tokio::time::sleep(HEALTH_POLL_INTERVAL + Duration::from_millis(10)).await;
        assert!(state.is_degraded());

        store.set_unhealthy(false);
        tokio::time::sleep(MAX_DELAY * 2).await;
        assert!(!state.is_degraded());
        assert!(store.save_count().await >= 2);

        supervisor.abort();
    }
}
