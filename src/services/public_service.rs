//! Service helpers that expose read-only public projections of hosted games.

use uuid::Uuid;

use crate::{
    dto::{
        common::GameStateView,
        public::{GamesResponse, PaletteEntry, PaletteResponse, ScoreboardResponse},
    },
    error::ServiceError,
    services::{engine, game_service},
    state::{SharedState, game::TeamColor},
};

/// Return the hosted games alongside the degraded flag.
pub fn list_games(state: &SharedState) -> GamesResponse {
    GamesResponse {
        games: game_service::list_games(state),
        degraded: state.is_degraded(),
    }
}

/// Return the public snapshot of a game; answers stay hidden until revealed.
pub fn game_state(state: &SharedState, game_id: Uuid) -> Result<GameStateView, ServiceError> {
    game_service::game_state(state, game_id)
}

/// Return the committed standings of a game, best first.
pub fn scoreboard(state: &SharedState, game_id: Uuid) -> Result<ScoreboardResponse, ServiceError> {
    let standings = state.registry().read(game_id, engine::standings)?;
    Ok(ScoreboardResponse { standings })
}

/// Return the team palette with its configured display colors.
pub fn palette(state: &SharedState) -> PaletteResponse {
    let config = state.config();
    PaletteResponse {
        colors: TeamColor::ALL
            .into_iter()
            .map(|color| PaletteEntry {
                color,
                display: config.display_color(color),
            })
            .collect(),
    }
}
