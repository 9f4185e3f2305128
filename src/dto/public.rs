use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    config::DisplayColor,
    dto::{game::GameListItem, sse::TeamScore},
    state::game::TeamColor,
};

/// Response payload listing the games hosted in memory.
#[derive(Debug, Serialize, ToSchema)]
pub struct GamesResponse {
    pub games: Vec<GameListItem>,
    pub degraded: bool,
}

/// Current scoreboard of a game.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScoreboardResponse {
    pub standings: Vec<TeamScore>,
}

/// Display color of one palette entry.
#[derive(Debug, Serialize, ToSchema)]
pub struct PaletteEntry {
    pub color: TeamColor,
    pub display: DisplayColor,
}

/// Team palette with the display colors used by screens and controller lights.
#[derive(Debug, Serialize, ToSchema)]
pub struct PaletteResponse {
    pub colors: Vec<PaletteEntry>,
}
