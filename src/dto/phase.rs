use serde::Serialize;
use utoipa::ToSchema;

use crate::state::state_machine::{GamePhase, PlayPhase, QuestionStage};

/// Publicly visible game phase exposed to clients (REST/SSE).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisiblePhase {
    /// Game created, waiting for teams.
    Lobby,
    /// Host is configuring rounds and players.
    Setup,
    /// Between rounds.
    Intermission,
    /// Round active, next question not shown yet.
    QuestionWaiting,
    /// Question on screen and accepting presses.
    QuestionActive,
    /// Correct answer shown.
    AnswerRevealed,
    /// Scoreboard shown after the reveal.
    PointsShown,
    /// Gameplay frozen.
    Paused,
    /// Final scoreboard.
    Finished,
}

impl From<GamePhase> for VisiblePhase {
    fn from(value: GamePhase) -> Self {
        match value {
            GamePhase::Lobby => VisiblePhase::Lobby,
            GamePhase::Setup => VisiblePhase::Setup,
            GamePhase::Playing(PlayPhase::Intermission) => VisiblePhase::Intermission,
            GamePhase::Playing(PlayPhase::RoundActive(stage)) => match stage {
                QuestionStage::Waiting => VisiblePhase::QuestionWaiting,
                QuestionStage::Active => VisiblePhase::QuestionActive,
                QuestionStage::Revealed => VisiblePhase::AnswerRevealed,
                QuestionStage::PointsShown => VisiblePhase::PointsShown,
            },
            GamePhase::Paused { .. } => VisiblePhase::Paused,
            GamePhase::Finished => VisiblePhase::Finished,
        }
    }
}
