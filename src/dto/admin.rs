//! DTO definitions used by the admin REST API and documentation layer.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{sse::TeamScore, validation::validate_display_name},
    services::engine::{Button, NextStep, PressAction, PressOutcome, RoundDraft},
    state::{
        game::{Question, TeamColor},
        rounds::RoundConfig,
    },
};

/// Request adding a team to a game still in lobby or setup.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AddTeamRequest {
    #[validate(length(max = 40), custom(function = "validate_display_name"))]
    pub name: String,
    /// If omitted, the backend picks the first free palette color.
    #[serde(default)]
    pub color: Option<TeamColor>,
}

/// Identifier of a freshly created team.
#[derive(Debug, Serialize, ToSchema)]
pub struct TeamCreatedResponse {
    pub team_id: Uuid,
}

/// Request binding a player of a team to a controller slot.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AddPlayerRequest {
    #[validate(length(max = 40), custom(function = "validate_display_name"))]
    pub name: String,
    #[validate(range(min = 1, max = 4))]
    pub slot: u8,
}

/// Identifier of a freshly created player.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerCreatedResponse {
    pub player_id: Uuid,
}

/// One round of a [`SetRoundsRequest`].
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RoundInput {
    pub config: RoundConfig,
    pub questions: Vec<Question>,
}

impl From<RoundInput> for RoundDraft {
    fn from(input: RoundInput) -> Self {
        Self {
            config: input.config,
            questions: input.questions,
        }
    }
}

/// Request replacing the whole round list.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SetRoundsRequest {
    #[validate(length(min = 1, max = 32))]
    pub rounds: Vec<RoundInput>,
}

/// Query activating a round; the first pending round is used when omitted.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StartRoundParams {
    /// Round to play.
    #[serde(default)]
    pub round_index: Option<usize>,
}

/// Query of the snapshot import route.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ImportParams {
    /// Replace the hosted copy of the game, if any.
    #[serde(default)]
    pub replace: bool,
}

/// Request handing the bomb to a player.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PassRequest {
    pub player_id: Uuid,
}

/// Request choosing the team climbing the ladder.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SelectLadderTeamRequest {
    pub team_id: Uuid,
}

/// Request stealing points from a team.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StealRequest {
    pub target_team_id: Uuid,
}

/// Press injected by the host, as if it came from the controller hub.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SimulatedPressRequest {
    #[validate(range(min = 1, max = 4))]
    pub slot: u8,
    pub button: Button,
    #[serde(default = "default_action")]
    pub action: PressAction,
    /// Defaults to the server clock.
    #[serde(default)]
    pub timestamp_ms: Option<u64>,
}

fn default_action() -> PressAction {
    PressAction::Press
}

/// What a press did.
#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PressOutcomeResponse {
    Ignored { reason: String },
    BuzzAccepted { player_id: Uuid, was_first: bool },
    AnswerRecorded,
    BombPassed,
}

impl From<PressOutcome> for PressOutcomeResponse {
    fn from(outcome: PressOutcome) -> Self {
        match outcome {
            PressOutcome::Ignored(reason) => Self::Ignored {
                reason: reason.to_string(),
            },
            PressOutcome::BuzzAccepted(record) => Self::BuzzAccepted {
                player_id: record.player_id,
                was_first: record.was_first,
            },
            PressOutcome::AnswerRecorded => Self::AnswerRecorded,
            PressOutcome::BombPassed => Self::BombPassed,
        }
    }
}

/// Step taken by `next`.
#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum NextStepResponse {
    Question {
        question_index: usize,
    },
    Round {
        round_index: usize,
        question_index: usize,
    },
    GameOver,
}

impl From<NextStep> for NextStepResponse {
    fn from(step: NextStep) -> Self {
        match step {
            NextStep::Question(question_index) => Self::Question { question_index },
            NextStep::Round {
                round_index,
                question_index,
            } => Self::Round {
                round_index,
                question_index,
            },
            NextStep::GameOver => Self::GameOver,
        }
    }
}

/// Index of the round or question affected by an action.
#[derive(Debug, Serialize, ToSchema)]
pub struct IndexResponse {
    pub index: usize,
}

/// Scoreboard, best team first.
#[derive(Debug, Serialize, ToSchema)]
pub struct StandingsResponse {
    pub standings: Vec<TeamScore>,
}

/// Generic action acknowledgement used by admin endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub message: String,
}
