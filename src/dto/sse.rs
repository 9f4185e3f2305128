use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    services::timers::TimerKind,
    state::{
        game::{BuzzRecord, ChoiceColor, RoundResult, TeamColor},
        rounds::{HotPotatoEntry, RoundKindTag, StealPhase},
    },
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
    /// Game the event belongs to; `None` for process-wide events.
    pub game_id: Option<Uuid>,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
            game_id: None,
        })
    }

    /// Tag the event with the game it concerns.
    pub fn for_game(mut self, game_id: Uuid) -> Self {
        self.game_id = Some(game_id);
        self
    }

    /// Whether a subscriber filtering on `filter` should receive the event.
    pub fn matches(&self, filter: Option<Uuid>) -> bool {
        match (filter, self.game_id) {
            (Some(wanted), Some(actual)) => wanted == actual,
            _ => true,
        }
    }
}

/// Query of the SSE routes.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StreamParams {
    /// Only forward events of this game; process-wide events always pass.
    #[serde(default)]
    pub game_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream (`public` or `admin`).
    pub stream: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
    /// Optional admin token returned when the stream is privileged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

/// Committed score of a team.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct TeamScore {
    pub team_id: Uuid,
    pub name: String,
    pub color: TeamColor,
    pub score: u32,
}

/// Score of a team and the delta applied by the last reveal.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct TeamScoreDelta {
    pub team_id: Uuid,
    pub score: u32,
    pub delta: i64,
}

/// Choice as displayed to contestants, without its correctness.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct ChoiceView {
    pub text: String,
    pub color: ChoiceColor,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Broadcast when a buzz enters the queue.
pub struct BuzzAcceptedEvent {
    #[serde(flatten)]
    pub buzz: BuzzRecord,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Broadcast when a question goes on screen.
pub struct QuestionStartedEvent {
    pub round_index: usize,
    pub question_index: usize,
    pub prompt: String,
    pub choices: Vec<ChoiceView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    pub time_limit_secs: u32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Admin-only notice that a player answered; correctness is withheld.
pub struct AnswerReceivedEvent {
    pub question_index: usize,
    pub player_id: Uuid,
    pub team_id: Uuid,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
/// Broadcast when the correct answer is revealed and staged points committed.
pub struct AnswerRevealedEvent {
    pub question_index: usize,
    pub correct_choice: Option<ChoiceColor>,
    pub teams: Vec<TeamScoreDelta>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Broadcast when the scoreboard is displayed.
pub struct PointsShownEvent {
    pub standings: Vec<TeamScore>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Broadcast when a round becomes active.
pub struct RoundStartedEvent {
    pub round_index: usize,
    pub kind: RoundKindTag,
    pub title: String,
    pub question_count: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Broadcast when a round is replayed with restored scores.
pub struct RoundRetriedEvent {
    pub round_index: usize,
    pub standings: Vec<TeamScore>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Broadcast when a round is closed.
pub struct RoundEndedEvent {
    pub result: RoundResult,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Broadcast when the ladder position changes.
pub struct LadderRungChangedEvent {
    pub team_id: Uuid,
    pub rung: usize,
    pub unbanked: u32,
    pub banked: u32,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
/// Broadcast when the climbing team banks.
pub struct LadderBankedEvent {
    pub team_id: Uuid,
    pub amount: u32,
    pub banked: u32,
    pub score: u32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Broadcast every second while the bomb burns.
pub struct BombTickEvent {
    pub holder_id: Uuid,
    pub team_id: Uuid,
    pub remaining_secs: u32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Broadcast when the bomb changes hands.
pub struct BombPassedEvent {
    pub from_player_id: Uuid,
    pub to_player_id: Uuid,
    pub to_team_id: Uuid,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
/// Broadcast when the bomb explodes, with the cycle's answers.
pub struct BombExplodedEvent {
    pub player_id: Uuid,
    pub team_id: Uuid,
    /// Delta actually applied (zero or negative).
    pub penalty: i64,
    pub score: u32,
    pub history: Vec<HotPotatoEntry>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Broadcast when the steal sub-phase changes.
pub struct StealPhaseChangedEvent {
    pub phase: StealPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
/// Broadcast when points are stolen.
pub struct StealExecutedEvent {
    pub from_team_id: Uuid,
    pub to_team_id: Uuid,
    pub amount: u32,
    pub from_score: u32,
    pub to_score: u32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Broadcast every second by running countdowns.
pub struct TimerTickEvent {
    pub kind: TimerKind,
    pub remaining_secs: u32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Broadcast when a countdown reaches zero.
pub struct TimeUpEvent {
    pub kind: TimerKind,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Broadcast when the game ends.
pub struct GameOverEvent {
    pub standings: Vec<TeamScore>,
}
