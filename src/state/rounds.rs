//! Round archetypes: their static configuration and the live runtime each one
//! drives while its round is active.

use std::{collections::HashSet, time::Duration};

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_with::DurationMilliSeconds;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::game::{BuzzRecord, ControllerSlot, Question, whole_secs};

/// Default penalty applied when the bomb explodes in a hot-potato round.
pub const DEFAULT_EXPLOSION_PENALTY: u32 = 500;

fn default_explosion_penalty() -> u32 {
    DEFAULT_EXPLOSION_PENALTY
}

/// Speed bonus applied to correct answers of multiple-choice style rounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SpeedBonus {
    /// First correct answer earns `fast`, later ones earn `slow`.
    FastSlow {
        /// Points for the first correct answer.
        fast: i32,
        /// Points for every later correct answer.
        slow: i32,
    },
    /// The Nth correct answer earns `table[N]`, zero beyond the table.
    Ranked {
        /// Points by rank of arrival.
        table: Vec<i32>,
    },
}

/// Round archetype with its scoring parameters.
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoundKind {
    /// First buzzer answers; wrong answers hand the turn to the next buzzer.
    FastestFinger {
        /// Points for a correct answer.
        correct_points: i32,
        /// Points for a wrong answer (zero or negative).
        wrong_points: i32,
        /// Time the buzzer has to answer.
        #[serde_as(as = "DurationMilliSeconds<u64>")]
        #[schema(value_type = u64)]
        answer_time: Duration,
    },
    /// Everyone answers once by pressing a color.
    MultipleChoice {
        /// Points for a correct answer.
        correct_points: i32,
        /// Points for a wrong answer.
        wrong_points: i32,
        /// Optional speed bonus replacing `correct_points`.
        #[serde(default)]
        speed_bonus: Option<SpeedBonus>,
    },
    /// Two choices; only the first correct answer scores.
    TrueFalse {
        /// Points for the first correct answer.
        correct_points: i32,
        /// Points for a wrong answer.
        wrong_points: i32,
    },
    /// Multiple choice around a picture or a sound.
    PictureSound {
        /// Points for a correct answer.
        correct_points: i32,
        /// Points for a wrong answer.
        wrong_points: i32,
        /// Optional speed bonus replacing `correct_points`.
        #[serde(default)]
        speed_bonus: Option<SpeedBonus>,
    },
    /// Buzz to open the gate, then the gate holder answers once.
    Final {
        /// Points for a correct answer.
        correct_points: i32,
        /// Points for a wrong answer.
        wrong_points: i32,
    },
    /// A correct buzzer steals points from another team.
    StealPoints {
        /// Points for a wrong answer.
        wrong_points: i32,
        /// Points taken from the target team.
        steal_amount: u32,
        /// Time the buzzer has to answer.
        #[serde_as(as = "DurationMilliSeconds<u64>")]
        #[schema(value_type = u64)]
        answer_time: Duration,
    },
    /// The bomb holder answers; correct answers pass the bomb on.
    HotPotato {
        /// Points for a correct answer.
        correct_points: i32,
        /// Points for a wrong answer.
        wrong_points: i32,
        /// Fuse length of one bomb cycle.
        #[serde_as(as = "DurationMilliSeconds<u64>")]
        #[schema(value_type = u64)]
        bomb_time: Duration,
        /// Points removed from the holder's team on explosion.
        #[serde(default = "default_explosion_penalty")]
        explosion_penalty: u32,
    },
    /// One team climbs a money ladder and banks on demand.
    Ladder {
        /// Value of each rung, bottom first.
        rungs: Vec<u32>,
    },
}

/// Fieldless archetype tag used in events and summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoundKindTag {
    /// Fastest finger.
    FastestFinger,
    /// Multiple choice.
    MultipleChoice,
    /// True or false.
    TrueFalse,
    /// Picture or sound.
    PictureSound,
    /// Final.
    Final,
    /// Steal points.
    StealPoints,
    /// Hot potato.
    HotPotato,
    /// Ladder.
    Ladder,
}

/// How buzz presses are treated by an archetype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuzzMode {
    /// Buzzing carries no meaning; presses are ignored.
    Ignored,
    /// Only the first buzz of a question is accepted.
    FirstOnly,
}

impl RoundKind {
    /// Fieldless tag.
    pub fn tag(&self) -> RoundKindTag {
        match self {
            RoundKind::FastestFinger { .. } => RoundKindTag::FastestFinger,
            RoundKind::MultipleChoice { .. } => RoundKindTag::MultipleChoice,
            RoundKind::TrueFalse { .. } => RoundKindTag::TrueFalse,
            RoundKind::PictureSound { .. } => RoundKindTag::PictureSound,
            RoundKind::Final { .. } => RoundKindTag::Final,
            RoundKind::StealPoints { .. } => RoundKindTag::StealPoints,
            RoundKind::HotPotato { .. } => RoundKindTag::HotPotato,
            RoundKind::Ladder { .. } => RoundKindTag::Ladder,
        }
    }

    /// Buzz handling of the archetype.
    pub fn buzz_mode(&self) -> BuzzMode {
        match self {
            RoundKind::FastestFinger { .. }
            | RoundKind::StealPoints { .. }
            | RoundKind::Final { .. } => BuzzMode::FirstOnly,
            RoundKind::MultipleChoice { .. }
            | RoundKind::TrueFalse { .. }
            | RoundKind::PictureSound { .. }
            | RoundKind::HotPotato { .. }
            | RoundKind::Ladder { .. } => BuzzMode::Ignored,
        }
    }

    /// Points staged for a wrong answer.
    pub fn wrong_points(&self) -> i32 {
        match self {
            RoundKind::FastestFinger { wrong_points, .. }
            | RoundKind::MultipleChoice { wrong_points, .. }
            | RoundKind::TrueFalse { wrong_points, .. }
            | RoundKind::PictureSound { wrong_points, .. }
            | RoundKind::Final { wrong_points, .. }
            | RoundKind::StealPoints { wrong_points, .. }
            | RoundKind::HotPotato { wrong_points, .. } => *wrong_points,
            RoundKind::Ladder { .. } => 0,
        }
    }

    /// Flat points for a correct answer.
    pub fn correct_points(&self) -> i32 {
        match self {
            RoundKind::FastestFinger { correct_points, .. }
            | RoundKind::MultipleChoice { correct_points, .. }
            | RoundKind::TrueFalse { correct_points, .. }
            | RoundKind::PictureSound { correct_points, .. }
            | RoundKind::Final { correct_points, .. }
            | RoundKind::HotPotato { correct_points, .. } => *correct_points,
            RoundKind::StealPoints { .. } | RoundKind::Ladder { .. } => 0,
        }
    }

    /// Whether the generic question countdown runs for this archetype.
    pub fn uses_question_timer(&self) -> bool {
        !matches!(self, RoundKind::HotPotato { .. })
    }

    /// Build the runtime for a round that is starting.
    ///
    /// `roster` lists `(team_id, player_id)` pairs in roster order and must not be empty for
    /// hot-potato rounds; ladder rounds start with the first team.
    pub fn initial_runtime<R: Rng + ?Sized>(
        &self,
        roster: &[(Uuid, Uuid)],
        rng: &mut R,
    ) -> Option<RoundRuntime> {
        let runtime = match self {
            RoundKind::FastestFinger { answer_time, .. } => {
                RoundRuntime::FastestFinger(FastestFingerRuntime::new(*answer_time))
            }
            RoundKind::MultipleChoice { .. }
            | RoundKind::TrueFalse { .. }
            | RoundKind::PictureSound { .. } => RoundRuntime::Standard,
            RoundKind::Final { .. } => RoundRuntime::Final(FinalRuntime::default()),
            RoundKind::StealPoints {
                steal_amount,
                answer_time,
                ..
            } => RoundRuntime::StealPoints(StealPointsRuntime::new(*steal_amount, *answer_time)),
            RoundKind::HotPotato { bomb_time, .. } => {
                let (team_id, player_id) = *roster.get(rng.random_range(0..roster.len().max(1)))?;
                RoundRuntime::HotPotato(HotPotatoRuntime::new(player_id, team_id, *bomb_time))
            }
            RoundKind::Ladder { rungs } => {
                let (team_id, _) = *roster.first()?;
                RoundRuntime::Ladder(LadderRuntime::new(team_id, rungs.clone()))
            }
        };
        Some(runtime)
    }
}

/// Static configuration of a round.
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RoundConfig {
    /// Title shown when the round starts.
    pub title: String,
    /// Archetype and scoring parameters.
    pub kind: RoundKind,
    /// Answer window of each question.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[schema(value_type = u64)]
    pub question_time: Duration,
}

impl RoundConfig {
    /// Check archetype parameters.
    pub fn validate(&self) -> Result<(), String> {
        if self.question_time.as_secs() == 0 {
            return Err("question time must be at least one second".into());
        }
        match &self.kind {
            RoundKind::Ladder { rungs } if rungs.is_empty() => {
                Err("ladder needs at least one rung".into())
            }
            RoundKind::HotPotato { bomb_time, .. } if bomb_time.as_secs() == 0 => {
                Err("bomb time must be at least one second".into())
            }
            RoundKind::FastestFinger { answer_time, .. }
            | RoundKind::StealPoints { answer_time, .. }
                if answer_time.as_secs() == 0 =>
            {
                Err("answer time must be at least one second".into())
            }
            RoundKind::MultipleChoice {
                speed_bonus: Some(SpeedBonus::Ranked { table }),
                ..
            }
            | RoundKind::PictureSound {
                speed_bonus: Some(SpeedBonus::Ranked { table }),
                ..
            } if table.is_empty() => Err("ranked bonus table is empty".into()),
            _ => Ok(()),
        }
    }

    /// Check a question against the archetype: 2 to 4 choices with distinct colors and exactly
    /// one correct choice.
    pub fn validate_question(&self, question: &Question) -> Result<(), String> {
        let count = question.choices.len();
        if !(2..=4).contains(&count) {
            return Err(format!("question `{}` needs 2 to 4 choices", question.prompt));
        }
        let colors: HashSet<_> = question.choices.iter().map(|choice| choice.color).collect();
        if colors.len() != count {
            return Err(format!("question `{}` repeats a choice color", question.prompt));
        }
        let correct = question.choices.iter().filter(|choice| choice.correct).count();
        if correct != 1 {
            return Err(format!(
                "question `{}` must have exactly one correct choice, found {correct}",
                question.prompt
            ));
        }
        match self.kind {
            RoundKind::TrueFalse { .. } if count != 2 => Err(format!(
                "true/false question `{}` needs exactly 2 choices",
                question.prompt
            )),
            RoundKind::PictureSound { .. } if question.media_url.is_none() => Err(format!(
                "picture/sound question `{}` needs a media url",
                question.prompt
            )),
            _ => Ok(()),
        }
    }

    #[cfg(test)]
    pub(crate) fn test_config() -> Self {
        Self {
            title: "Warm-up".into(),
            kind: RoundKind::MultipleChoice {
                correct_points: 100,
                wrong_points: 0,
                speed_bonus: None,
            },
            question_time: Duration::from_secs(20),
        }
    }
}

/// Live state of the active round's archetype.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RoundRuntime {
    /// No round active.
    #[default]
    Idle,
    /// Multiple-choice, true-false and picture-sound rounds.
    Standard,
    /// Final round gate.
    Final(FinalRuntime),
    /// Fastest-finger turn tracking.
    FastestFinger(FastestFingerRuntime),
    /// Hot-potato bomb cycle.
    HotPotato(HotPotatoRuntime),
    /// Steal-points sub-phases.
    StealPoints(StealPointsRuntime),
    /// Ladder progress.
    Ladder(LadderRuntime),
}

/// Identity of an accepted buzzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct BuzzerRef {
    /// Player who buzzed.
    pub player_id: Uuid,
    /// Team of the player.
    pub team_id: Uuid,
    /// Controller slot.
    #[schema(value_type = u8)]
    pub slot: ControllerSlot,
}

impl From<&BuzzRecord> for BuzzerRef {
    fn from(record: &BuzzRecord) -> Self {
        Self {
            player_id: record.player_id,
            team_id: record.team_id,
            slot: record.slot,
        }
    }
}

/// Final round: the first buzzer holds the gate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FinalRuntime {
    /// Holder of the gate for the current question.
    pub gate_holder: Option<BuzzerRef>,
}

/// Fastest-finger sub-phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FastestFingerPhase {
    /// Waiting for a buzz.
    Buzzing,
    /// A buzzer holds the turn.
    Answering,
}

/// Outcome of a fastest-finger turn advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnAdvance {
    /// Turn handed to the queue entry at this index.
    Next(usize),
    /// No eligible buzzer left.
    Exhausted,
}

/// Fastest-finger turn tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastestFingerRuntime {
    /// Sub-phase.
    pub phase: FastestFingerPhase,
    /// Index into the buzz queue of the player holding the turn.
    pub turn: Option<usize>,
    /// Players who lost their turn on this question.
    pub eliminated: HashSet<Uuid>,
    /// Seconds left for the current turn.
    pub answer_remaining_secs: u32,
    /// Seconds granted per turn.
    pub answer_limit_secs: u32,
}

impl FastestFingerRuntime {
    fn new(answer_time: Duration) -> Self {
        let limit = whole_secs(answer_time);
        Self {
            phase: FastestFingerPhase::Buzzing,
            turn: None,
            eliminated: HashSet::new(),
            answer_remaining_secs: limit,
            answer_limit_secs: limit,
        }
    }

    /// Clear turn state for a new question.
    pub fn reset(&mut self) {
        self.phase = FastestFingerPhase::Buzzing;
        self.turn = None;
        self.eliminated.clear();
        self.answer_remaining_secs = self.answer_limit_secs;
    }

    /// Hand the turn to the queue entry at `cursor` with a fresh countdown.
    pub fn begin_turn(&mut self, cursor: usize) {
        self.phase = FastestFingerPhase::Answering;
        self.turn = Some(cursor);
        self.answer_remaining_secs = self.answer_limit_secs;
    }

    /// Player holding the turn.
    pub fn current_buzzer<'q>(&self, queue: &'q [BuzzRecord]) -> Option<&'q BuzzRecord> {
        self.turn.and_then(|cursor| queue.get(cursor))
    }

    /// Eliminate the current buzzer when requested, then move the turn to the next queued
    /// buzzer that is not eliminated.
    pub fn advance_turn(&mut self, queue: &[BuzzRecord], eliminate_current: bool) -> TurnAdvance {
        if eliminate_current && let Some(current) = self.current_buzzer(queue) {
            self.eliminated.insert(current.player_id);
        }

        let start = self.turn.map_or(0, |cursor| cursor + 1);
        let next = queue
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, record)| !self.eliminated.contains(&record.player_id))
            .map(|(index, _)| index);

        match next {
            Some(index) => {
                self.begin_turn(index);
                TurnAdvance::Next(index)
            }
            None => {
                self.phase = FastestFingerPhase::Buzzing;
                self.turn = None;
                TurnAdvance::Exhausted
            }
        }
    }
}

/// Hot-potato sub-phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HotPotatoPhase {
    /// Holder must answer.
    Playing,
    /// Holder answered correctly and must pass the bomb.
    Passing,
    /// The bomb went off; the next question starts a new cycle.
    Exploded,
}

/// One answer given during a bomb cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct HotPotatoEntry {
    /// Question index in the round.
    pub question_index: usize,
    /// Holder who answered.
    pub player_id: Uuid,
    /// Team of the holder.
    pub team_id: Uuid,
    /// Whether the answer was correct.
    pub correct: bool,
}

/// Hot-potato bomb cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotPotatoRuntime {
    /// Sub-phase.
    pub phase: HotPotatoPhase,
    /// Player holding the bomb.
    pub holder: Uuid,
    /// Team of the holder.
    pub holder_team: Uuid,
    /// Seconds left before the explosion.
    pub bomb_remaining_secs: u32,
    /// Fuse length of a cycle in seconds.
    pub bomb_total_secs: u32,
    /// Last player who answered correctly.
    pub last_correct: Option<Uuid>,
    /// Answers given during the current cycle.
    pub history: Vec<HotPotatoEntry>,
}

impl HotPotatoRuntime {
    fn new(holder: Uuid, holder_team: Uuid, bomb_time: Duration) -> Self {
        let total = whole_secs(bomb_time);
        Self {
            phase: HotPotatoPhase::Playing,
            holder,
            holder_team,
            bomb_remaining_secs: total,
            bomb_total_secs: total,
            last_correct: None,
            history: Vec::new(),
        }
    }

    /// Start a new bomb cycle with a full fuse.
    pub fn start_cycle(&mut self, holder: Uuid, holder_team: Uuid) {
        self.phase = HotPotatoPhase::Playing;
        self.holder = holder;
        self.holder_team = holder_team;
        self.bomb_remaining_secs = self.bomb_total_secs;
        self.last_correct = None;
        self.history.clear();
    }

    /// Record the holder's answer; a correct one opens the passing phase.
    pub fn record_answer(&mut self, entry: HotPotatoEntry) {
        if entry.correct {
            self.phase = HotPotatoPhase::Passing;
            self.last_correct = Some(entry.player_id);
        }
        self.history.push(entry);
    }

    /// Hand the bomb to another player. Returns the previous holder.
    pub fn pass_to(&mut self, player_id: Uuid, team_id: Uuid) -> Uuid {
        let previous = self.holder;
        self.holder = player_id;
        self.holder_team = team_id;
        self.phase = HotPotatoPhase::Playing;
        previous
    }

    /// Detonate; the cycle history stays published until the next cycle starts.
    pub fn explode(&mut self) -> Vec<HotPotatoEntry> {
        self.phase = HotPotatoPhase::Exploded;
        self.bomb_remaining_secs = 0;
        self.history.clone()
    }
}

/// Steal-points sub-phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StealPhase {
    /// Waiting for a buzz.
    Buzzing,
    /// Buzzer must answer.
    Answering,
    /// Buzzer answered correctly; the steal is being announced.
    Announcing,
    /// Buzzer's team picks a target.
    Stealing,
}

/// Steal-points sub-phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StealPointsRuntime {
    /// Sub-phase.
    pub phase: StealPhase,
    /// Accepted buzzer.
    pub buzzer: Option<BuzzerRef>,
    /// Points taken from the target.
    pub steal_amount: u32,
    /// Seconds left for the buzzer to answer.
    pub answer_remaining_secs: u32,
    /// Seconds granted to answer.
    pub answer_limit_secs: u32,
}

impl StealPointsRuntime {
    fn new(steal_amount: u32, answer_time: Duration) -> Self {
        let limit = whole_secs(answer_time);
        Self {
            phase: StealPhase::Buzzing,
            buzzer: None,
            steal_amount,
            answer_remaining_secs: limit,
            answer_limit_secs: limit,
        }
    }

    /// Give the answer turn to the buzzer.
    pub fn begin_answering(&mut self, buzzer: BuzzerRef) {
        self.phase = StealPhase::Answering;
        self.buzzer = Some(buzzer);
        self.answer_remaining_secs = self.answer_limit_secs;
    }

    /// Back to waiting for a buzz.
    pub fn clear(&mut self) {
        self.phase = StealPhase::Buzzing;
        self.buzzer = None;
        self.answer_remaining_secs = self.answer_limit_secs;
    }
}

/// Ladder progress of the climbing team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LadderRuntime {
    /// Climbing team.
    pub team_id: Uuid,
    /// Next rung to reach.
    pub rung: usize,
    /// Value at risk.
    pub unbanked: u32,
    /// Total banked during the round.
    pub banked: u32,
    /// Rung values, bottom first.
    pub rungs: Vec<u32>,
}

impl LadderRuntime {
    fn new(team_id: Uuid, rungs: Vec<u32>) -> Self {
        Self {
            team_id,
            rung: 0,
            unbanked: 0,
            banked: 0,
            rungs,
        }
    }

    /// Correct answer: the unbanked value becomes the reached rung's value.
    pub fn climb(&mut self) -> u32 {
        let Some(top) = self.rungs.len().checked_sub(1) else {
            return self.unbanked;
        };
        let reached = self.rung.min(top);
        self.unbanked = self.rungs[reached];
        self.rung = (reached + 1).min(self.rungs.len());
        self.unbanked
    }

    /// Wrong answer: the unbanked value is lost and the climb restarts.
    pub fn fall(&mut self) {
        self.unbanked = 0;
        self.rung = 0;
    }

    /// Secure the unbanked value. Returns the banked amount.
    pub fn bank(&mut self) -> u32 {
        let amount = self.unbanked;
        self.banked = self.banked.saturating_add(amount);
        self.unbanked = 0;
        self.rung = 0;
        amount
    }

    /// Switch climbing team, restarting the climb.
    pub fn select_team(&mut self, team_id: Uuid) {
        self.team_id = team_id;
        self.fall();
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::state::game::{Choice, ChoiceColor};

    fn record(player_id: Uuid, slot: u8) -> BuzzRecord {
        BuzzRecord {
            player_id,
            team_id: Uuid::new_v4(),
            slot: ControllerSlot::new(slot).unwrap(),
            timestamp_ms: u64::from(slot),
            was_first: slot == 1,
        }
    }

    #[test]
    fn turn_advance_skips_eliminated_buzzers() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let queue = vec![record(a, 1), record(b, 2), record(c, 3)];
        let mut runtime = FastestFingerRuntime::new(Duration::from_secs(5));
        runtime.begin_turn(0);
        runtime.eliminated.insert(b);

        assert_eq!(runtime.advance_turn(&queue, true), TurnAdvance::Next(2));
        assert!(runtime.eliminated.contains(&a));
        assert_eq!(runtime.current_buzzer(&queue).map(|r| r.player_id), Some(c));
        assert_eq!(runtime.phase, FastestFingerPhase::Answering);

        assert_eq!(runtime.advance_turn(&queue, true), TurnAdvance::Exhausted);
        assert_eq!(runtime.phase, FastestFingerPhase::Buzzing);
        assert_eq!(runtime.turn, None);
    }

    #[test]
    fn turn_advance_resets_turn_countdown() {
        let queue = vec![record(Uuid::new_v4(), 1), record(Uuid::new_v4(), 2)];
        let mut runtime = FastestFingerRuntime::new(Duration::from_secs(5));
        runtime.begin_turn(0);
        runtime.answer_remaining_secs = 1;
        runtime.advance_turn(&queue, true);
        assert_eq!(runtime.answer_remaining_secs, 5);
    }

    #[test]
    fn ladder_bank_and_fall() {
        let mut ladder = LadderRuntime::new(Uuid::new_v4(), vec![100, 200, 500]);
        assert_eq!(ladder.climb(), 100);
        assert_eq!(ladder.climb(), 200);
        assert_eq!(ladder.rung, 2);

        assert_eq!(ladder.bank(), 200);
        assert_eq!(ladder.banked, 200);
        assert_eq!(ladder.unbanked, 0);
        assert_eq!(ladder.rung, 0);

        ladder.climb();
        ladder.fall();
        assert_eq!(ladder.unbanked, 0);
        assert_eq!(ladder.rung, 0);
        assert_eq!(ladder.banked, 200);
    }

    #[test]
    fn ladder_clamps_at_top_rung() {
        let mut ladder = LadderRuntime::new(Uuid::new_v4(), vec![100, 300]);
        ladder.climb();
        ladder.climb();
        assert_eq!(ladder.climb(), 300);
        assert_eq!(ladder.rung, 2);
    }

    #[test]
    fn hot_potato_cycle() {
        let (holder, team) = (Uuid::new_v4(), Uuid::new_v4());
        let mut bomb = HotPotatoRuntime::new(holder, team, Duration::from_secs(30));
        bomb.record_answer(HotPotatoEntry {
            question_index: 0,
            player_id: holder,
            team_id: team,
            correct: true,
        });
        assert_eq!(bomb.phase, HotPotatoPhase::Passing);
        assert_eq!(bomb.last_correct, Some(holder));

        let next = Uuid::new_v4();
        assert_eq!(bomb.pass_to(next, team), holder);
        assert_eq!(bomb.phase, HotPotatoPhase::Playing);

        let history = bomb.explode();
        assert_eq!(history.len(), 1);
        assert_eq!(bomb.history, history);
        assert_eq!(bomb.phase, HotPotatoPhase::Exploded);
    }

    #[test]
    fn hot_potato_holder_drawn_from_roster() {
        let roster = vec![
            (Uuid::new_v4(), Uuid::new_v4()),
            (Uuid::new_v4(), Uuid::new_v4()),
        ];
        let kind = RoundKind::HotPotato {
            correct_points: 100,
            wrong_points: 0,
            bomb_time: Duration::from_secs(45),
            explosion_penalty: DEFAULT_EXPLOSION_PENALTY,
        };
        let mut rng = StdRng::seed_from_u64(7);
        match kind.initial_runtime(&roster, &mut rng) {
            Some(RoundRuntime::HotPotato(bomb)) => {
                assert!(roster.iter().any(|(team, player)| {
                    *team == bomb.holder_team && *player == bomb.holder
                }));
                assert_eq!(bomb.bomb_remaining_secs, 45);
            }
            other => panic!("unexpected runtime {other:?}"),
        }
        assert_eq!(kind.initial_runtime(&[], &mut rng), None);
    }

    #[test]
    fn question_validation() {
        let config = RoundConfig {
            title: "TF".into(),
            kind: RoundKind::TrueFalse {
                correct_points: 100,
                wrong_points: 0,
            },
            question_time: Duration::from_secs(10),
        };
        let mut question = Question {
            prompt: "The sky is blue".into(),
            choices: vec![
                Choice {
                    text: "True".into(),
                    color: ChoiceColor::Blue,
                    correct: true,
                },
                Choice {
                    text: "False".into(),
                    color: ChoiceColor::Orange,
                    correct: false,
                },
            ],
            media_url: None,
        };
        assert!(config.validate_question(&question).is_ok());

        question.choices[1].correct = true;
        assert!(config.validate_question(&question).is_err());

        question.choices[1].correct = false;
        question.choices[1].color = ChoiceColor::Blue;
        assert!(config.validate_question(&question).is_err());
    }

    #[test]
    fn round_durations_are_milliseconds() {
        let config: RoundConfig = serde_json::from_str(
            r#"{"title":"Quick","kind":{"kind":"final","correct_points":500,"wrong_points":-500},"question_time":15000}"#,
        )
        .unwrap();
        assert_eq!(config.question_time, Duration::from_secs(15));
        assert!(config.validate().is_ok());

        let short = RoundConfig {
            question_time: Duration::from_millis(900),
            ..config
        };
        assert!(short.validate().is_err());
    }

    #[test]
    fn round_kind_parses_tagged_json() {
        let kind: RoundKind = serde_json::from_str(
            r#"{"kind":"hot_potato","correct_points":100,"wrong_points":-50,"bomb_time":30000}"#,
        )
        .unwrap();
        match kind {
            RoundKind::HotPotato {
                explosion_penalty,
                bomb_time,
                ..
            } => {
                assert_eq!(explosion_penalty, DEFAULT_EXPLOSION_PENALTY);
                assert_eq!(bomb_time, Duration::from_secs(30));
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }
}
