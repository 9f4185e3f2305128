use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report the number of hosted games and whether storage is reachable.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.game_store().await {
        Some(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        None => warn!("storage unavailable (degraded mode)"),
    }

    let games = state.registry().len();
    if state.is_degraded() {
        HealthResponse::degraded(games)
    } else {
        HealthResponse::ok(games)
    }
}
