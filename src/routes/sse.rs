use std::convert::Infallible;

use axum::{
    Router,
    extract::{Query, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    dto::sse::StreamParams, error::AppError, services::sse_service, state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sse/public",
    tag = "sse",
    params(StreamParams),
    responses((status = 200, description = "Public SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream realtime public events to connected screens.
pub async fn public_stream(
    State(state): State<SharedState>,
    Query(params): Query<StreamParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let subscription = sse_service::subscribe_public(&state, params.game_id)?;
    info!(game_id = ?params.game_id, "new public SSE connection");
    Ok(sse_service::to_sse_stream(subscription))
}

#[utoipa::path(
    get,
    path = "/sse/admin",
    tag = "sse",
    params(StreamParams),
    responses(
        (status = 200, description = "Admin SSE stream; the handshake carries the admin token", content_type = "text/event-stream", body = String),
        (status = 401, description = "Another admin stream is already active")
    )
)]
/// Stream every event, admin-only ones included, and issue the admin token.
pub async fn admin_stream(
    State(state): State<SharedState>,
    Query(params): Query<StreamParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let subscription = sse_service::subscribe_admin(&state, params.game_id).await?;
    info!(game_id = ?params.game_id, "new admin SSE connection");
    Ok(sse_service::to_sse_stream(subscription))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sse/public", get(public_stream))
        .route("/sse/admin", get(admin_stream))
}
