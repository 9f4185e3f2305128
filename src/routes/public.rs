use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::{
        common::GameStateView,
        public::{GamesResponse, PaletteResponse, ScoreboardResponse},
    },
    error::AppError,
    services::public_service,
    state::SharedState,
};

/// Public read-only endpoints exposing hosted games to screens.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/public/games", get(list_games))
        .route("/public/games/{id}", get(get_game_state))
        .route("/public/games/{id}/scoreboard", get(get_scoreboard))
        .route("/public/palette", get(get_palette))
}

#[utoipa::path(
    get,
    path = "/public/games",
    tag = "public",
    responses((status = 200, description = "Hosted games", body = GamesResponse))
)]
/// Return the games currently hosted and whether storage is available.
pub async fn list_games(State(state): State<SharedState>) -> Json<GamesResponse> {
    Json(public_service::list_games(&state))
}

#[utoipa::path(
    get,
    path = "/public/games/{id}",
    tag = "public",
    params(("id" = String, Path, description = "Identifier of the game")),
    responses(
        (status = 200, description = "Public game snapshot", body = GameStateView),
        (status = 404, description = "Game not hosted")
    )
)]
/// Return the public snapshot of a game.
pub async fn get_game_state(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameStateView>, AppError> {
    Ok(Json(public_service::game_state(&state, id)?))
}

#[utoipa::path(
    get,
    path = "/public/games/{id}/scoreboard",
    tag = "public",
    params(("id" = String, Path, description = "Identifier of the game")),
    responses(
        (status = 200, description = "Committed standings", body = ScoreboardResponse),
        (status = 404, description = "Game not hosted")
    )
)]
/// Return the committed standings of a game, best team first.
pub async fn get_scoreboard(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScoreboardResponse>, AppError> {
    Ok(Json(public_service::scoreboard(&state, id)?))
}

#[utoipa::path(
    get,
    path = "/public/palette",
    tag = "public",
    responses((status = 200, description = "Team palette", body = PaletteResponse))
)]
/// Return the team colors with their display values.
pub async fn get_palette(State(state): State<SharedState>) -> Json<PaletteResponse> {
    Json(public_service::palette(&state))
}
