use std::{
    fmt,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::DurationMilliSeconds;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::{
    rounds::{RoundConfig, RoundKindTag, RoundRuntime},
    state_machine::{GamePhase, GameStateMachine, GameStatus},
};

/// Maximum number of teams in a game (one per team color).
pub const MAX_TEAMS: usize = 4;

/// Milliseconds since the Unix epoch, saturating to zero on clock skew.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

/// Whole seconds of a countdown, at least one and saturating at `u32::MAX`.
pub fn whole_secs(duration: Duration) -> u32 {
    u32::try_from(duration.as_secs().max(1)).unwrap_or(u32::MAX)
}

/// Fixed team colors; each team of a game owns a distinct one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TeamColor {
    /// Red team.
    Red,
    /// Blue team.
    Blue,
    /// Green team.
    Green,
    /// Yellow team.
    Yellow,
}

impl TeamColor {
    /// All team colors in allocation order.
    pub const ALL: [TeamColor; MAX_TEAMS] = [
        TeamColor::Red,
        TeamColor::Blue,
        TeamColor::Green,
        TeamColor::Yellow,
    ];
}

/// Colored answer buttons found on every controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceColor {
    /// Blue button.
    Blue,
    /// Orange button.
    Orange,
    /// Green button.
    Green,
    /// Yellow button.
    Yellow,
}

/// Controller slot, 1 to 4 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ControllerSlot(u8);

impl ControllerSlot {
    /// Highest valid slot number.
    pub const MAX: u8 = 4;

    /// Validate a raw slot number.
    pub fn new(raw: u8) -> Option<Self> {
        (1..=Self::MAX).contains(&raw).then_some(Self(raw))
    }

    /// Raw slot number.
    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for ControllerSlot {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        ControllerSlot::new(value)
            .ok_or_else(|| format!("controller slot must be within 1..={}", Self::MAX))
    }
}

impl From<ControllerSlot> for u8 {
    fn from(slot: ControllerSlot) -> Self {
        slot.0
    }
}

impl fmt::Display for ControllerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A contestant bound to one controller slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Stable player identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Controller slot owned by the player.
    pub slot: ControllerSlot,
}

/// A team with its committed score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Display name.
    pub name: String,
    /// Team color, unique within a game.
    pub color: TeamColor,
    /// Members in join order.
    pub players: Vec<Player>,
    /// Committed score, never negative.
    pub score: u32,
}

impl Team {
    /// Create an empty team with a zero score.
    pub fn new(name: String, color: TeamColor) -> Self {
        Self {
            name,
            color,
            players: Vec::new(),
            score: 0,
        }
    }

    /// Add `delta` to the score, clamping at zero. Returns the delta actually applied.
    pub fn apply_delta(&mut self, delta: i64) -> i64 {
        let current = i64::from(self.score);
        let next = (current + delta).clamp(0, i64::from(u32::MAX));
        self.score = next as u32;
        next - current
    }
}

/// One answer choice of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Choice {
    /// Text shown on screen.
    pub text: String,
    /// Button selecting this choice.
    pub color: ChoiceColor,
    /// Whether this is the correct choice.
    pub correct: bool,
}

/// A question with its color-keyed choices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Question {
    /// Question text.
    pub prompt: String,
    /// Choices keyed by button color.
    pub choices: Vec<Choice>,
    /// Picture or sound shown with the question.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
}

impl Question {
    /// Choice selected by a button color.
    pub fn choice(&self, color: ChoiceColor) -> Option<&Choice> {
        self.choices.iter().find(|choice| choice.color == color)
    }

    /// The correct choice.
    pub fn correct_choice(&self) -> Option<&Choice> {
        self.choices.iter().find(|choice| choice.correct)
    }
}

/// Progress marker of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    /// Not played yet.
    Pending,
    /// Currently being played.
    Active,
    /// Played to the end.
    Completed,
}

/// A configured round and its question cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    /// Archetype and tuning.
    pub config: RoundConfig,
    /// Questions in play order.
    pub questions: Vec<Question>,
    /// Index of the current question, `-1` before the first one.
    pub current_question_index: i32,
    /// Progress marker.
    pub status: RoundStatus,
    /// Team scores captured when the round started.
    #[serde(default)]
    pub score_snapshot: IndexMap<Uuid, u32>,
}

impl Round {
    /// Create a pending round positioned before its first question.
    pub fn new(config: RoundConfig, questions: Vec<Question>) -> Self {
        Self {
            config,
            questions,
            current_question_index: -1,
            status: RoundStatus::Pending,
            score_snapshot: IndexMap::new(),
        }
    }

    /// Current question index, `None` before the first question.
    pub fn current_index(&self) -> Option<usize> {
        usize::try_from(self.current_question_index).ok()
    }

    /// Index of the next question, when one remains.
    pub fn next_index(&self) -> Option<usize> {
        let next = (self.current_question_index + 1) as usize;
        (next < self.questions.len()).then_some(next)
    }

    /// Reset the cursor before the first question.
    pub fn rewind(&mut self) {
        self.current_question_index = -1;
    }

    /// Clamp an out-of-range cursor back to `-1`. Returns true when clamped.
    pub fn sanitize_cursor(&mut self) -> bool {
        let len = self.questions.len() as i32;
        if self.current_question_index < -1 || self.current_question_index >= len {
            self.current_question_index = -1;
            return true;
        }
        false
    }
}

/// An accepted buzz in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BuzzRecord {
    /// Buzzing player.
    pub player_id: Uuid,
    /// Team of the player.
    pub team_id: Uuid,
    /// Controller slot pressed.
    #[schema(value_type = u8)]
    pub slot: ControllerSlot,
    /// Hardware timestamp of the press in milliseconds.
    pub timestamp_ms: u64,
    /// True for the first accepted buzz of the question.
    pub was_first: bool,
}

/// An answer received for the current question, waiting for the reveal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAnswer {
    /// Answering player.
    pub player_id: Uuid,
    /// Team of the player.
    pub team_id: Uuid,
    /// Pressed color.
    pub choice: ChoiceColor,
    /// Hardware timestamp of the press in milliseconds.
    pub timestamp_ms: u64,
    /// Time between the question start and the press.
    pub latency_ms: u64,
    /// Whether the choice is correct.
    pub correct: bool,
    /// Points committed to the team at reveal time.
    pub staged_points: i64,
}

/// Why the current question stopped accepting answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuestionResolution {
    /// A correct answer settled it.
    CorrectAnswer,
    /// The eligible player(s) answered.
    Answered,
    /// Every player answered.
    AllAnswered,
    /// Every buzzer in the queue was eliminated.
    QueueExhausted,
    /// The question timer ran out.
    TimeUp,
    /// The bomb exploded.
    BombExploded,
}

/// Live data of the question on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionState {
    /// Index of the question in the active round.
    pub index: usize,
    /// Start of the question in milliseconds since the epoch.
    pub started_at_ms: u64,
    /// Configured answer window in seconds.
    pub time_limit_secs: u32,
    /// Seconds left on the question countdown.
    pub remaining_secs: u32,
    /// Accepted buzzes in arrival order.
    pub buzz_queue: Vec<BuzzRecord>,
    /// Answers staged until the reveal.
    pub answers: Vec<PendingAnswer>,
    /// Set once the question stops accepting answers.
    pub resolution: Option<QuestionResolution>,
}

impl QuestionState {
    /// Fresh state for the question at `index`.
    pub fn new(index: usize, started_at_ms: u64, time_limit: Duration) -> Self {
        let secs = whole_secs(time_limit);
        Self {
            index,
            started_at_ms,
            time_limit_secs: secs,
            remaining_secs: secs,
            buzz_queue: Vec::new(),
            answers: Vec::new(),
            resolution: None,
        }
    }

    /// True while answers can still be submitted.
    pub fn is_open(&self) -> bool {
        self.resolution.is_none()
    }

    /// Whether the player already submitted an answer.
    pub fn has_answered(&self, player_id: Uuid) -> bool {
        self.answers.iter().any(|answer| answer.player_id == player_id)
    }
}

/// Host preferences for automatic advancement.
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct GameSettings {
    /// Reveal automatically once the question is resolved.
    pub auto_reveal: bool,
    /// Delay before the automatic reveal.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[schema(value_type = u64)]
    pub reveal_delay: Duration,
    /// Show the scoreboard automatically after a reveal.
    pub auto_show_points: bool,
    /// Delay before the scoreboard is shown.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[schema(value_type = u64)]
    pub show_points_delay: Duration,
    /// Move to the next question (or round) automatically after the scoreboard.
    pub auto_next: bool,
    /// Delay before the automatic next step.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[schema(value_type = u64)]
    pub next_delay: Duration,
    /// End the game automatically after the last question of the last round.
    pub auto_end_game: bool,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            auto_reveal: true,
            reveal_delay: Duration::from_secs(2),
            auto_show_points: true,
            show_points_delay: Duration::from_secs(3),
            auto_next: false,
            next_delay: Duration::from_secs(5),
            auto_end_game: false,
        }
    }
}

/// Score changes recorded when a round ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RoundResult {
    /// Index of the round in the game.
    pub round_index: usize,
    /// Archetype of the round.
    pub kind: RoundKindTag,
    /// Score delta per team (end score minus start score).
    #[schema(value_type = Object)]
    pub deltas: IndexMap<Uuid, i64>,
    /// Completion time in milliseconds since the epoch.
    pub completed_at_ms: u64,
}

/// One hosted game with all its live state.
#[derive(Debug, Clone)]
pub struct GameInstance {
    /// Primary key.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Creation time in milliseconds since the epoch.
    pub created_at_ms: u64,
    /// Last mutation time in milliseconds since the epoch.
    pub updated_at_ms: u64,
    pub(crate) machine: GameStateMachine,
    /// Configured rounds in play order.
    pub rounds: Vec<Round>,
    /// Round currently (or most recently) played.
    pub active_round: Option<usize>,
    /// Teams keyed by id, in creation order.
    pub teams: IndexMap<Uuid, Team>,
    /// Auto-advance preferences.
    pub settings: GameSettings,
    /// Results of completed rounds.
    pub round_results: Vec<RoundResult>,
    /// Question on screen, if any.
    pub question: Option<QuestionState>,
    /// Archetype-specific live state of the active round.
    pub runtime: RoundRuntime,
}

impl GameInstance {
    /// Create a game in the lobby with no teams and no rounds.
    pub fn new(name: String, settings: GameSettings) -> Self {
        let now = unix_millis();
        Self {
            id: Uuid::new_v4(),
            name,
            created_at_ms: now,
            updated_at_ms: now,
            machine: GameStateMachine::new(),
            rounds: Vec::new(),
            active_round: None,
            teams: IndexMap::new(),
            settings,
            round_results: Vec::new(),
            question: None,
            runtime: RoundRuntime::Idle,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> GamePhase {
        self.machine.phase()
    }

    /// Current status, derived from the phase.
    pub fn status(&self) -> GameStatus {
        self.machine.phase().status()
    }

    /// Current generation.
    pub fn generation(&self) -> u64 {
        self.machine.generation()
    }

    /// Record a mutation.
    pub fn touch(&mut self) {
        self.updated_at_ms = unix_millis();
    }

    /// Player owning a controller slot, with its team id.
    pub fn player_by_slot(&self, slot: ControllerSlot) -> Option<(Uuid, &Player)> {
        self.teams.iter().find_map(|(team_id, team)| {
            team.players
                .iter()
                .find(|player| player.slot == slot)
                .map(|player| (*team_id, player))
        })
    }

    /// Player by id, with its team id.
    pub fn player(&self, player_id: Uuid) -> Option<(Uuid, &Player)> {
        self.teams.iter().find_map(|(team_id, team)| {
            team.players
                .iter()
                .find(|player| player.id == player_id)
                .map(|player| (*team_id, player))
        })
    }

    /// All players as `(team_id, player_id)` in team then join order.
    pub fn roster(&self) -> Vec<(Uuid, Uuid)> {
        self.teams
            .iter()
            .flat_map(|(team_id, team)| team.players.iter().map(|player| (*team_id, player.id)))
            .collect()
    }

    /// Total number of players.
    pub fn player_count(&self) -> usize {
        self.teams.values().map(|team| team.players.len()).sum()
    }

    /// Round currently or last played.
    pub fn active_round(&self) -> Option<&Round> {
        self.active_round.and_then(|index| self.rounds.get(index))
    }

    /// Question on screen, if any.
    pub fn current_question(&self) -> Option<&Question> {
        let index = self.question.as_ref()?.index;
        self.active_round()?.questions.get(index)
    }

    /// Current scores keyed by team id.
    pub fn scores(&self) -> IndexMap<Uuid, u32> {
        self.teams
            .iter()
            .map(|(team_id, team)| (*team_id, team.score))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_delta_clamps_at_zero() {
        let mut team = Team::new("Owls".into(), TeamColor::Red);
        team.score = 50;
        assert_eq!(team.apply_delta(-200), -50);
        assert_eq!(team.score, 0);
        assert_eq!(team.apply_delta(120), 120);
        assert_eq!(team.score, 120);
    }

    #[test]
    fn countdown_seconds_saturate() {
        assert_eq!(whole_secs(Duration::from_millis(1_500)), 1);
        assert_eq!(whole_secs(Duration::ZERO), 1);
        assert_eq!(whole_secs(Duration::from_secs(u64::MAX)), u32::MAX);
        let state = QuestionState::new(0, 0, Duration::from_secs(u64::from(u32::MAX) + 10));
        assert_eq!(state.time_limit_secs, u32::MAX);
    }

    #[test]
    fn controller_slot_range() {
        assert!(ControllerSlot::new(0).is_none());
        assert!(ControllerSlot::new(5).is_none());
        assert_eq!(ControllerSlot::new(4).map(ControllerSlot::get), Some(4));
        let parsed: Result<ControllerSlot, _> = serde_json::from_str("7");
        assert!(parsed.is_err());
    }

    #[test]
    fn cursor_helpers() {
        let question = Question {
            prompt: "2 + 2?".into(),
            choices: vec![],
            media_url: None,
        };
        let mut round = Round::new(
            crate::state::rounds::RoundConfig::test_config(),
            vec![question.clone(), question],
        );
        assert_eq!(round.current_index(), None);
        assert_eq!(round.next_index(), Some(0));
        round.current_question_index = 1;
        assert_eq!(round.next_index(), None);
        round.current_question_index = 9;
        assert!(round.sanitize_cursor());
        assert_eq!(round.current_question_index, -1);
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: GameSettings =
            serde_json::from_str(r#"{"auto_next": true, "next_delay": 1500}"#).unwrap();
        assert!(settings.auto_next);
        assert_eq!(settings.next_delay, Duration::from_millis(1500));
        assert!(settings.auto_reveal);
    }
}
