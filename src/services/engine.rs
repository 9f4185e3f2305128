//! Synchronous game engine.
//!
//! Every operation takes exclusive access to one [`GameInstance`], validates its
//! preconditions before touching anything, then mutates the game and appends the
//! events to broadcast. Operations that change what deferred work should be
//! running move the game generation forward; callers compare generations to know
//! when timers must be re-derived.

use std::collections::HashSet;

use indexmap::IndexMap;
use rand::Rng;
use serde::Deserialize;
use tracing::{debug, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::sse::{
        AnswerReceivedEvent, AnswerRevealedEvent, BombExplodedEvent, BombPassedEvent,
        BombTickEvent, BuzzAcceptedEvent, ChoiceView, GameOverEvent, LadderBankedEvent,
        LadderRungChangedEvent, PointsShownEvent, QuestionStartedEvent, RoundEndedEvent,
        RoundRetriedEvent, RoundStartedEvent, StealExecutedEvent, StealPhaseChangedEvent,
        TeamScore, TeamScoreDelta, TimeUpEvent, TimerTickEvent,
    },
    error::EngineError,
    services::{
        buzz_arbiter::{self, BuzzDecision},
        scoring,
        timers::TimerKind,
    },
    state::{
        game::{
            BuzzRecord, ChoiceColor, ControllerSlot, GameInstance, GameSettings, MAX_TEAMS,
            PendingAnswer, Player, Question, QuestionResolution, QuestionState, Round,
            RoundResult, RoundStatus, Team, TeamColor, unix_millis, whole_secs,
        },
        rounds::{
            BuzzerRef, FastestFingerPhase, HotPotatoEntry, HotPotatoPhase, LadderRuntime,
            RoundConfig, RoundKind, RoundRuntime, StealPhase, TurnAdvance,
        },
        state_machine::{GameEvent, GamePhase, GameStatus, PlayPhase, QuestionStage},
    },
};

/// Something observers should hear about, produced by an engine operation.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A buzz entered the queue.
    BuzzAccepted(BuzzAcceptedEvent),
    /// A question went on screen.
    QuestionStarted(QuestionStartedEvent),
    /// A player answered (admin only).
    AnswerReceived(AnswerReceivedEvent),
    /// Staged points were committed.
    AnswerRevealed(AnswerRevealedEvent),
    /// Scoreboard displayed.
    PointsShown(PointsShownEvent),
    /// Round activated.
    RoundStarted(RoundStartedEvent),
    /// Round restarted with restored scores.
    RoundRetried(RoundRetriedEvent),
    /// Round closed.
    RoundEnded(RoundEndedEvent),
    /// Ladder position changed.
    LadderRungChanged(LadderRungChangedEvent),
    /// Ladder value banked.
    LadderBanked(LadderBankedEvent),
    /// Bomb countdown tick.
    BombTick(BombTickEvent),
    /// Bomb changed hands.
    BombPassed(BombPassedEvent),
    /// Bomb exploded.
    BombExploded(BombExplodedEvent),
    /// Steal sub-phase changed.
    StealPhaseChanged(StealPhaseChangedEvent),
    /// Points stolen.
    StealExecuted(StealExecutedEvent),
    /// Countdown tick.
    TimerTick(TimerTickEvent),
    /// Countdown expired.
    TimeUp(TimeUpEvent),
    /// Gameplay frozen.
    GamePaused,
    /// Gameplay resumed.
    GameResumed,
    /// Game finished.
    GameOver(GameOverEvent),
}

/// Controller buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    /// Big buzz button.
    Buzz,
    /// Blue answer button.
    Blue,
    /// Orange answer button.
    Orange,
    /// Green answer button.
    Green,
    /// Yellow answer button.
    Yellow,
}

impl Button {
    /// Answer color of the button, `None` for the buzz button.
    pub fn choice(self) -> Option<ChoiceColor> {
        match self {
            Button::Buzz => None,
            Button::Blue => Some(ChoiceColor::Blue),
            Button::Orange => Some(ChoiceColor::Orange),
            Button::Green => Some(ChoiceColor::Green),
            Button::Yellow => Some(ChoiceColor::Yellow),
        }
    }
}

/// Whether the button went down or up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PressAction {
    /// Button pressed.
    Press,
    /// Button released.
    Release,
}

/// Raw controller input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Press {
    /// Controller slot.
    pub slot: ControllerSlot,
    /// Button.
    pub button: Button,
    /// Press or release.
    pub action: PressAction,
    /// Hardware timestamp in milliseconds.
    pub timestamp_ms: u64,
}

/// What a press did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PressOutcome {
    /// Nothing happened.
    Ignored(&'static str),
    /// Buzz queued.
    BuzzAccepted(BuzzRecord),
    /// Answer staged.
    AnswerRecorded,
    /// Bomb handed to the presser.
    BombPassed,
}

/// Next step taken by [`next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    /// Next question of the active round.
    Question(usize),
    /// First question of the next round.
    Round {
        /// Round started.
        round_index: usize,
        /// Question shown.
        question_index: usize,
    },
    /// No round left; the game ended.
    GameOver,
}

/// State of a countdown after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Countdown {
    /// Still running with this many seconds left.
    Running(u32),
    /// Reached zero and expired.
    Expired,
}

/// Round definition handed to [`set_rounds`].
#[derive(Debug, Clone)]
pub struct RoundDraft {
    /// Archetype and tuning.
    pub config: RoundConfig,
    /// Questions in play order.
    pub questions: Vec<Question>,
}

/// Plan `event`, run `work`, then apply the plan or abort it when `work` fails.
fn transition<T>(
    game: &mut GameInstance,
    event: GameEvent,
    work: impl FnOnce(&mut GameInstance) -> Result<T, EngineError>,
) -> Result<T, EngineError> {
    let plan = game.machine.plan(event)?;
    match work(game) {
        Ok(value) => {
            game.machine.apply(plan.id)?;
            debug!(game_id = %game.id, ?event, phase = ?game.phase(), "transition applied");
            Ok(value)
        }
        Err(err) => {
            if let Err(abort_err) = game.machine.abort(plan.id) {
                warn!(game_id = %game.id, ?abort_err, "failed to abort transition");
            }
            Err(err)
        }
    }
}

fn ensure_editable(game: &GameInstance) -> Result<(), EngineError> {
    match game.status() {
        GameStatus::Lobby | GameStatus::Setup => Ok(()),
        other => Err(EngineError::PhaseMismatch(format!(
            "configuration is locked once the game started (status {other:?})"
        ))),
    }
}

fn ensure_playing(game: &GameInstance) -> Result<QuestionStage, EngineError> {
    match game.phase() {
        GamePhase::Playing(PlayPhase::RoundActive(stage)) => Ok(stage),
        GamePhase::Playing(PlayPhase::Intermission) => Err(EngineError::RoundNotActive),
        other => Err(EngineError::GameNotPlaying(
            format!("{:?}", other.status()).to_lowercase(),
        )),
    }
}

fn active_kind(game: &GameInstance) -> Result<&RoundKind, EngineError> {
    game.active_round()
        .map(|round| &round.config.kind)
        .ok_or(EngineError::RoundNotActive)
}

/// Teams sorted by score, best first.
pub fn standings(game: &GameInstance) -> Vec<TeamScore> {
    let mut standings: Vec<TeamScore> = game
        .teams
        .iter()
        .map(|(team_id, team)| TeamScore {
            team_id: *team_id,
            name: team.name.clone(),
            color: team.color,
            score: team.score,
        })
        .collect();
    standings.sort_by(|a, b| b.score.cmp(&a.score));
    standings
}

fn ladder_event(ladder: &LadderRuntime) -> EngineEvent {
    EngineEvent::LadderRungChanged(LadderRungChangedEvent {
        team_id: ladder.team_id,
        rung: ladder.rung,
        unbanked: ladder.unbanked,
        banked: ladder.banked,
    })
}

fn steal_event(phase: StealPhase, buzzer: Option<BuzzerRef>) -> EngineEvent {
    EngineEvent::StealPhaseChanged(StealPhaseChangedEvent {
        phase,
        team_id: buzzer.map(|buzzer| buzzer.team_id),
    })
}

// ---------------------------------------------------------------------------
// Setup

/// Add a team, picking the first free color when none is requested.
pub fn add_team(
    game: &mut GameInstance,
    name: &str,
    color: Option<TeamColor>,
) -> Result<Uuid, EngineError> {
    ensure_editable(game)?;
    if game.teams.len() >= MAX_TEAMS {
        return Err(EngineError::CapacityExceeded(format!(
            "a game holds at most {MAX_TEAMS} teams"
        )));
    }
    let name = name.trim();
    if name.is_empty() {
        return Err(EngineError::InvalidConfiguration(
            "team name must not be empty".into(),
        ));
    }

    let used: HashSet<TeamColor> = game.teams.values().map(|team| team.color).collect();
    let color = match color {
        Some(color) if used.contains(&color) => {
            return Err(EngineError::CapacityExceeded(format!(
                "team color {color:?} is already taken"
            )));
        }
        Some(color) => color,
        None => TeamColor::ALL
            .into_iter()
            .find(|color| !used.contains(color))
            .ok_or_else(|| EngineError::CapacityExceeded("no team color left".into()))?,
    };

    let team_id = Uuid::new_v4();
    game.teams.insert(team_id, Team::new(name.to_owned(), color));
    game.machine.bump_generation();
    Ok(team_id)
}

/// Remove a team and its players.
pub fn remove_team(game: &mut GameInstance, team_id: Uuid) -> Result<(), EngineError> {
    ensure_editable(game)?;
    game.teams
        .shift_remove(&team_id)
        .ok_or(EngineError::TeamNotFound(team_id))?;
    game.machine.bump_generation();
    Ok(())
}

/// Bind a new player of `team_id` to a controller slot.
pub fn add_player(
    game: &mut GameInstance,
    team_id: Uuid,
    name: &str,
    slot: ControllerSlot,
) -> Result<Uuid, EngineError> {
    ensure_editable(game)?;
    if !game.teams.contains_key(&team_id) {
        return Err(EngineError::TeamNotFound(team_id));
    }
    if game.player_by_slot(slot).is_some() {
        return Err(EngineError::CapacityExceeded(format!(
            "controller slot {slot} is already bound"
        )));
    }
    let name = name.trim();
    if name.is_empty() {
        return Err(EngineError::InvalidConfiguration(
            "player name must not be empty".into(),
        ));
    }

    let player_id = Uuid::new_v4();
    if let Some(team) = game.teams.get_mut(&team_id) {
        team.players.push(Player {
            id: player_id,
            name: name.to_owned(),
            slot,
        });
    }
    game.machine.bump_generation();
    Ok(player_id)
}

/// Replace the round list after validating every round and question.
pub fn set_rounds(game: &mut GameInstance, drafts: Vec<RoundDraft>) -> Result<(), EngineError> {
    ensure_editable(game)?;
    if drafts.is_empty() {
        return Err(EngineError::InvalidConfiguration(
            "a game needs at least one round".into(),
        ));
    }
    for (index, draft) in drafts.iter().enumerate() {
        draft
            .config
            .validate()
            .map_err(|reason| EngineError::InvalidConfiguration(format!("round {index}: {reason}")))?;
        if draft.questions.is_empty() {
            return Err(EngineError::InvalidConfiguration(format!(
                "round {index} has no question"
            )));
        }
        for question in &draft.questions {
            draft.config.validate_question(question).map_err(|reason| {
                EngineError::InvalidConfiguration(format!("round {index}: {reason}"))
            })?;
        }
    }

    game.rounds = drafts
        .into_iter()
        .map(|draft| Round::new(draft.config, draft.questions))
        .collect();
    game.active_round = None;
    game.round_results.clear();
    game.machine.bump_generation();
    Ok(())
}

/// Replace the auto-advance settings; takes effect on the running game immediately.
pub fn update_settings(game: &mut GameInstance, settings: GameSettings) -> Result<(), EngineError> {
    if game.status() == GameStatus::Finished {
        return Err(EngineError::PhaseMismatch("game is finished".into()));
    }
    game.settings = settings;
    game.machine.bump_generation();
    Ok(())
}

// ---------------------------------------------------------------------------
// Lifecycle

/// Lobby to setup.
pub fn begin_setup(game: &mut GameInstance) -> Result<(), EngineError> {
    transition(game, GameEvent::BeginSetup, |_| Ok(()))
}

/// Start playing; needs at least one player and one round.
pub fn start_game(game: &mut GameInstance) -> Result<(), EngineError> {
    transition(game, GameEvent::StartGame, |game| {
        if game.player_count() == 0 {
            return Err(EngineError::InvalidConfiguration(
                "at least one player must be bound to a controller".into(),
            ));
        }
        if game.rounds.is_empty() {
            return Err(EngineError::InvalidConfiguration(
                "at least one round must be configured".into(),
            ));
        }
        Ok(())
    })
}

fn next_pending_round(game: &GameInstance) -> Option<usize> {
    game.rounds
        .iter()
        .position(|round| round.status == RoundStatus::Pending)
}

/// Activate a pending round, by default the first one not played yet.
pub fn start_round<R: Rng + ?Sized>(
    game: &mut GameInstance,
    round_index: Option<usize>,
    rng: &mut R,
    events: &mut Vec<EngineEvent>,
) -> Result<usize, EngineError> {
    transition(game, GameEvent::StartRound, |game| {
        let index = match round_index {
            Some(index) => index,
            None => next_pending_round(game).ok_or(EngineError::NoRemainingQuestions)?,
        };
        let round = game.rounds.get(index).ok_or_else(|| {
            EngineError::InvalidTarget(format!("round {index} does not exist"))
        })?;
        if round.status != RoundStatus::Pending {
            return Err(EngineError::PhaseMismatch(format!(
                "round {index} was already played; retry it instead"
            )));
        }
        let runtime = round
            .config
            .kind
            .initial_runtime(&game.roster(), rng)
            .ok_or_else(|| EngineError::InvalidConfiguration("round needs players".into()))?;

        let snapshot = game.scores();
        let round = &mut game.rounds[index];
        round.status = RoundStatus::Active;
        round.rewind();
        round.score_snapshot = snapshot;
        events.push(EngineEvent::RoundStarted(RoundStartedEvent {
            round_index: index,
            kind: round.config.kind.tag(),
            title: round.config.title.clone(),
            question_count: round.questions.len(),
        }));
        if let RoundRuntime::Ladder(ladder) = &runtime {
            events.push(ladder_event(ladder));
        }

        game.active_round = Some(index);
        game.question = None;
        game.runtime = runtime;
        Ok(index)
    })
}

fn next_holder(roster: &[(Uuid, Uuid)], exploded: Uuid) -> Option<(Uuid, Uuid)> {
    let position = roster
        .iter()
        .position(|(_, player_id)| *player_id == exploded)
        .map_or(0, |index| (index + 1) % roster.len().max(1));
    roster.get(position).copied()
}

/// Put the next question of the active round on screen.
pub fn start_question(
    game: &mut GameInstance,
    now_ms: u64,
    events: &mut Vec<EngineEvent>,
) -> Result<usize, EngineError> {
    transition(game, GameEvent::StartQuestion, |game| {
        let round_index = game.active_round.ok_or(EngineError::RoundNotActive)?;
        let round = &game.rounds[round_index];
        let index = round.next_index().ok_or(EngineError::NoRemainingQuestions)?;
        let question = &round.questions[index];
        let started = QuestionStartedEvent {
            round_index,
            question_index: index,
            prompt: question.prompt.clone(),
            choices: question
                .choices
                .iter()
                .map(|choice| ChoiceView {
                    text: choice.text.clone(),
                    color: choice.color,
                })
                .collect(),
            media_url: question.media_url.clone(),
            time_limit_secs: whole_secs(round.config.question_time),
        };
        let state = QuestionState::new(index, now_ms, round.config.question_time);
        let roster = game.roster();

        match &mut game.runtime {
            RoundRuntime::FastestFinger(ff) => ff.reset(),
            RoundRuntime::Final(gate) => gate.gate_holder = None,
            RoundRuntime::StealPoints(steal) => {
                if steal.phase != StealPhase::Buzzing {
                    steal.clear();
                    events.push(steal_event(steal.phase, None));
                }
            }
            RoundRuntime::HotPotato(bomb) => {
                if bomb.phase == HotPotatoPhase::Exploded {
                    if let Some((team_id, player_id)) = next_holder(&roster, bomb.holder) {
                        bomb.start_cycle(player_id, team_id);
                    }
                } else {
                    bomb.phase = HotPotatoPhase::Playing;
                }
            }
            RoundRuntime::Standard | RoundRuntime::Ladder(_) | RoundRuntime::Idle => {}
        }

        game.rounds[round_index].current_question_index = index as i32;
        game.question = Some(state);
        events.push(EngineEvent::QuestionStarted(started));
        Ok(index)
    })
}

/// Route a controller press to the buzz arbiter or the answer path.
pub fn handle_press(
    game: &mut GameInstance,
    press: Press,
    events: &mut Vec<EngineEvent>,
) -> Result<PressOutcome, EngineError> {
    if press.action == PressAction::Release {
        return Ok(PressOutcome::Ignored("release"));
    }
    let presser = buzz_arbiter::resolve_controller(game, press.slot)?;
    let stage = ensure_playing(game)?;

    if let RoundRuntime::HotPotato(bomb) = &game.runtime
        && bomb.phase == HotPotatoPhase::Passing
    {
        pass_bomb(game, presser, events)?;
        return Ok(PressOutcome::BombPassed);
    }

    match stage {
        QuestionStage::Active => {}
        QuestionStage::Revealed | QuestionStage::PointsShown => {
            return Err(EngineError::AnswerAlreadyRevealed);
        }
        QuestionStage::Waiting => return Err(EngineError::QuestionNotInProgress),
    }

    match press.button.choice() {
        None => buzz(game, presser, press.timestamp_ms, events),
        Some(color) => {
            submit_answer(game, presser, color, press.timestamp_ms, events)?;
            Ok(PressOutcome::AnswerRecorded)
        }
    }
}

fn buzz(
    game: &mut GameInstance,
    buzzer: BuzzerRef,
    timestamp_ms: u64,
    events: &mut Vec<EngineEvent>,
) -> Result<PressOutcome, EngineError> {
    let mode = active_kind(game)?.buzz_mode();
    let question = game
        .question
        .as_mut()
        .ok_or(EngineError::QuestionNotInProgress)?;
    let accepting = question.is_open()
        && match &game.runtime {
            RoundRuntime::FastestFinger(ff) => ff.phase == FastestFingerPhase::Buzzing,
            RoundRuntime::StealPoints(steal) => steal.phase == StealPhase::Buzzing,
            RoundRuntime::Final(gate) => gate.gate_holder.is_none(),
            _ => false,
        };

    let decision = buzz_arbiter::arbitrate(
        mode,
        accepting,
        &mut question.buzz_queue,
        buzzer,
        timestamp_ms,
    )
    .map_err(EngineError::BuzzRejected)?;

    match decision {
        BuzzDecision::Ignored => Ok(PressOutcome::Ignored("buzzing has no effect in this round")),
        BuzzDecision::Accepted(record) => {
            let cursor = question.buzz_queue.len() - 1;
            match &mut game.runtime {
                RoundRuntime::FastestFinger(ff) => ff.begin_turn(cursor),
                RoundRuntime::StealPoints(steal) => {
                    steal.begin_answering(buzzer);
                    events.push(steal_event(steal.phase, steal.buzzer));
                }
                RoundRuntime::Final(gate) => gate.gate_holder = Some(buzzer),
                _ => {}
            }
            game.machine.bump_generation();
            events.push(EngineEvent::BuzzAccepted(BuzzAcceptedEvent {
                buzz: record.clone(),
            }));
            Ok(PressOutcome::BuzzAccepted(record))
        }
    }
}

fn check_eligibility(
    runtime: &RoundRuntime,
    question: &QuestionState,
    answerer: BuzzerRef,
) -> Result<(), EngineError> {
    let already = question.has_answered(answerer.player_id);
    match runtime {
        RoundRuntime::FastestFinger(ff) => {
            if ff.phase != FastestFingerPhase::Answering {
                return Err(EngineError::PhaseMismatch("waiting for a buzz".into()));
            }
            let holder = ff
                .current_buzzer(&question.buzz_queue)
                .map(|record| record.player_id);
            if holder != Some(answerer.player_id) {
                return Err(EngineError::NotYourTurn);
            }
        }
        RoundRuntime::Final(gate) => match gate.gate_holder {
            None => return Err(EngineError::PhaseMismatch("buzz to open the gate".into())),
            Some(holder) if holder.player_id != answerer.player_id => {
                return Err(EngineError::NotYourTurn);
            }
            Some(_) if already => return Err(EngineError::AlreadyAnswered),
            Some(_) => {}
        },
        RoundRuntime::StealPoints(steal) => {
            if steal.phase != StealPhase::Answering {
                return Err(EngineError::PhaseMismatch("waiting for a buzz".into()));
            }
            if steal.buzzer.map(|buzzer| buzzer.player_id) != Some(answerer.player_id) {
                return Err(EngineError::NotYourTurn);
            }
        }
        RoundRuntime::HotPotato(bomb) => {
            if bomb.phase != HotPotatoPhase::Playing {
                return Err(EngineError::PhaseMismatch("the bomb is not in play".into()));
            }
            if bomb.holder != answerer.player_id {
                return Err(EngineError::NotYourTurn);
            }
        }
        RoundRuntime::Ladder(ladder) => {
            if ladder.team_id != answerer.team_id {
                return Err(EngineError::NotYourTurn);
            }
        }
        RoundRuntime::Standard => {
            if already {
                return Err(EngineError::AlreadyAnswered);
            }
        }
        RoundRuntime::Idle => return Err(EngineError::RoundNotActive),
    }
    Ok(())
}

fn submit_answer(
    game: &mut GameInstance,
    answerer: BuzzerRef,
    color: ChoiceColor,
    timestamp_ms: u64,
    events: &mut Vec<EngineEvent>,
) -> Result<(), EngineError> {
    let kind = active_kind(game)?.clone();
    let player_count = game.player_count();
    let correct = {
        let state = game
            .question
            .as_ref()
            .filter(|state| state.is_open())
            .ok_or(EngineError::QuestionNotInProgress)?;
        check_eligibility(&game.runtime, state, answerer)?;
        game.current_question()
            .and_then(|question| question.choice(color))
            .ok_or(EngineError::UnknownChoice)?
            .correct
    };

    let Some(state) = game.question.as_mut() else {
        return Err(EngineError::QuestionNotInProgress);
    };
    let staged_points = scoring::stage_points(&kind, correct, &state.answers);
    state.answers.push(PendingAnswer {
        player_id: answerer.player_id,
        team_id: answerer.team_id,
        choice: color,
        timestamp_ms,
        latency_ms: timestamp_ms.saturating_sub(state.started_at_ms),
        correct,
        staged_points,
    });
    events.push(EngineEvent::AnswerReceived(AnswerReceivedEvent {
        question_index: state.index,
        player_id: answerer.player_id,
        team_id: answerer.team_id,
    }));

    let mut turn_changed = false;
    let resolution = match &mut game.runtime {
        RoundRuntime::FastestFinger(_) if correct => Some(QuestionResolution::CorrectAnswer),
        RoundRuntime::FastestFinger(ff) => match ff.advance_turn(&state.buzz_queue, true) {
            TurnAdvance::Next(_) => {
                turn_changed = true;
                None
            }
            TurnAdvance::Exhausted => Some(QuestionResolution::QueueExhausted),
        },
        RoundRuntime::Standard => {
            (state.answers.len() >= player_count).then_some(QuestionResolution::AllAnswered)
        }
        RoundRuntime::Final(_) | RoundRuntime::StealPoints(_) => Some(if correct {
            QuestionResolution::CorrectAnswer
        } else {
            QuestionResolution::Answered
        }),
        RoundRuntime::HotPotato(bomb) => {
            bomb.record_answer(HotPotatoEntry {
                question_index: state.index,
                player_id: answerer.player_id,
                team_id: answerer.team_id,
                correct,
            });
            Some(QuestionResolution::Answered)
        }
        RoundRuntime::Ladder(ladder) => {
            if correct {
                ladder.climb();
            } else {
                ladder.fall();
            }
            Some(QuestionResolution::Answered)
        }
        RoundRuntime::Idle => None,
    };

    if let Some(resolution) = resolution {
        state.resolution = Some(resolution);
    }
    if resolution.is_some() || turn_changed {
        game.machine.bump_generation();
    }
    Ok(())
}

fn pass_bomb(
    game: &mut GameInstance,
    receiver: BuzzerRef,
    events: &mut Vec<EngineEvent>,
) -> Result<(), EngineError> {
    let RoundRuntime::HotPotato(bomb) = &mut game.runtime else {
        return Err(EngineError::PhaseMismatch("not a hot potato round".into()));
    };
    if bomb.phase != HotPotatoPhase::Passing {
        return Err(EngineError::PhaseMismatch(
            "the holder has not earned a pass".into(),
        ));
    }
    if bomb.holder == receiver.player_id {
        return Err(EngineError::InvalidTarget(
            "the holder cannot pass the bomb to themselves".into(),
        ));
    }
    let from = bomb.pass_to(receiver.player_id, receiver.team_id);
    game.machine.bump_generation();
    events.push(EngineEvent::BombPassed(BombPassedEvent {
        from_player_id: from,
        to_player_id: receiver.player_id,
        to_team_id: receiver.team_id,
    }));
    Ok(())
}

/// Host-driven bomb pass to `player_id`.
pub fn pass(
    game: &mut GameInstance,
    player_id: Uuid,
    events: &mut Vec<EngineEvent>,
) -> Result<(), EngineError> {
    ensure_playing(game)?;
    let (team_id, player) = game
        .player(player_id)
        .ok_or_else(|| EngineError::InvalidTarget(format!("player `{player_id}` not found")))?;
    let receiver = BuzzerRef {
        player_id,
        team_id,
        slot: player.slot,
    };
    pass_bomb(game, receiver, events)
}

/// Reveal the correct answer and commit every staged point (clamped at zero).
pub fn reveal(
    game: &mut GameInstance,
    events: &mut Vec<EngineEvent>,
) -> Result<AnswerRevealedEvent, EngineError> {
    transition(game, GameEvent::Reveal, |game| {
        let correct_choice = game
            .current_question()
            .and_then(Question::correct_choice)
            .map(|choice| choice.color);
        let state = game
            .question
            .as_mut()
            .ok_or(EngineError::QuestionNotInProgress)?;
        let question_index = state.index;
        let answers = std::mem::take(&mut state.answers);

        let mut staged: IndexMap<Uuid, i64> = IndexMap::new();
        for answer in &answers {
            *staged.entry(answer.team_id).or_default() += answer.staged_points;
        }
        let teams = game
            .teams
            .iter_mut()
            .map(|(team_id, team)| {
                let delta = team.apply_delta(staged.get(team_id).copied().unwrap_or(0));
                TeamScoreDelta {
                    team_id: *team_id,
                    score: team.score,
                    delta,
                }
            })
            .collect();

        match &mut game.runtime {
            RoundRuntime::StealPoints(steal) if steal.phase == StealPhase::Answering => {
                let buzzer_correct = steal.buzzer.is_some_and(|buzzer| {
                    answers
                        .iter()
                        .any(|answer| answer.player_id == buzzer.player_id && answer.correct)
                });
                if buzzer_correct {
                    steal.phase = StealPhase::Announcing;
                } else {
                    steal.clear();
                }
                events.push(steal_event(steal.phase, steal.buzzer));
            }
            RoundRuntime::Ladder(ladder) => events.push(ladder_event(ladder)),
            _ => {}
        }

        let revealed = AnswerRevealedEvent {
            question_index,
            correct_choice,
            teams,
        };
        events.push(EngineEvent::AnswerRevealed(revealed.clone()));
        Ok(revealed)
    })
}

/// Show the scoreboard after a reveal.
pub fn show_points(
    game: &mut GameInstance,
    events: &mut Vec<EngineEvent>,
) -> Result<Vec<TeamScore>, EngineError> {
    transition(game, GameEvent::ShowPoints, |game| {
        let standings = standings(game);
        events.push(EngineEvent::PointsShown(PointsShownEvent {
            standings: standings.clone(),
        }));
        Ok(standings)
    })
}

fn close_active_round(
    game: &mut GameInstance,
    events: &mut Vec<EngineEvent>,
) -> Result<RoundResult, EngineError> {
    let index = game.active_round.ok_or(EngineError::RoundNotActive)?;
    let scores = game.scores();
    let round = game
        .rounds
        .get_mut(index)
        .ok_or(EngineError::RoundNotActive)?;
    round.status = RoundStatus::Completed;
    let deltas = scores
        .iter()
        .map(|(team_id, score)| {
            let start = round.score_snapshot.get(team_id).copied().unwrap_or(0);
            (*team_id, i64::from(*score) - i64::from(start))
        })
        .collect();
    let result = RoundResult {
        round_index: index,
        kind: round.config.kind.tag(),
        deltas,
        completed_at_ms: unix_millis(),
    };

    game.round_results
        .retain(|existing| existing.round_index != index);
    game.round_results.push(result.clone());
    game.question = None;
    game.runtime = RoundRuntime::Idle;
    events.push(EngineEvent::RoundEnded(RoundEndedEvent {
        result: result.clone(),
    }));
    Ok(result)
}

/// Close the active round and record its per-team deltas.
pub fn end_round(
    game: &mut GameInstance,
    events: &mut Vec<EngineEvent>,
) -> Result<RoundResult, EngineError> {
    transition(game, GameEvent::EndRound, |game| close_active_round(game, events))
}

/// Replay the active (or last played) round, restoring the scores captured when it started.
pub fn retry_round<R: Rng + ?Sized>(
    game: &mut GameInstance,
    rng: &mut R,
    events: &mut Vec<EngineEvent>,
) -> Result<usize, EngineError> {
    transition(game, GameEvent::RetryRound, |game| {
        let index = game.active_round.ok_or(EngineError::RoundNotActive)?;
        let round = game.rounds.get(index).ok_or(EngineError::RoundNotActive)?;
        let runtime = round
            .config
            .kind
            .initial_runtime(&game.roster(), rng)
            .ok_or_else(|| EngineError::InvalidConfiguration("round needs players".into()))?;
        let snapshot = round.score_snapshot.clone();

        for (team_id, team) in game.teams.iter_mut() {
            if let Some(score) = snapshot.get(team_id) {
                team.score = *score;
            }
        }
        let round = &mut game.rounds[index];
        round.status = RoundStatus::Active;
        round.rewind();
        game.round_results
            .retain(|existing| existing.round_index != index);
        game.question = None;
        game.runtime = runtime;

        events.push(EngineEvent::RoundRetried(RoundRetriedEvent {
            round_index: index,
            standings: standings(game),
        }));
        if let RoundRuntime::Ladder(ladder) = &game.runtime {
            events.push(ladder_event(ladder));
        }
        Ok(index)
    })
}

fn has_pending_round(game: &GameInstance) -> bool {
    next_pending_round(game).is_some()
}

/// Whether anything is left to play after the current question.
pub fn has_more_to_play(game: &GameInstance) -> bool {
    let round_has_more = game
        .active_round()
        .filter(|round| round.status == RoundStatus::Active)
        .and_then(Round::next_index)
        .is_some();
    round_has_more || has_pending_round(game)
}

/// Move on: next question, or next round, or end of the game.
pub fn next<R: Rng + ?Sized>(
    game: &mut GameInstance,
    now_ms: u64,
    rng: &mut R,
    events: &mut Vec<EngineEvent>,
) -> Result<NextStep, EngineError> {
    match game.phase() {
        GamePhase::Playing(PlayPhase::RoundActive(QuestionStage::Active)) => Err(
            EngineError::PhaseMismatch("reveal the current question first".into()),
        ),
        GamePhase::Playing(PlayPhase::RoundActive(_)) => {
            let round_has_more = game.active_round().and_then(Round::next_index).is_some();
            if round_has_more {
                return start_question(game, now_ms, events).map(NextStep::Question);
            }
            end_round(game, events)?;
            next_from_intermission(game, now_ms, rng, events)
        }
        GamePhase::Playing(PlayPhase::Intermission) => {
            next_from_intermission(game, now_ms, rng, events)
        }
        other => Err(EngineError::GameNotPlaying(
            format!("{:?}", other.status()).to_lowercase(),
        )),
    }
}

fn next_from_intermission<R: Rng + ?Sized>(
    game: &mut GameInstance,
    now_ms: u64,
    rng: &mut R,
    events: &mut Vec<EngineEvent>,
) -> Result<NextStep, EngineError> {
    if !has_pending_round(game) {
        end_game(game, events)?;
        return Ok(NextStep::GameOver);
    }
    let round_index = start_round(game, None, rng, events)?;
    let question_index = start_question(game, now_ms, events)?;
    Ok(NextStep::Round {
        round_index,
        question_index,
    })
}

/// Freeze gameplay; every countdown keeps its remaining time.
pub fn pause(game: &mut GameInstance, events: &mut Vec<EngineEvent>) -> Result<(), EngineError> {
    transition(game, GameEvent::Pause, |_| {
        events.push(EngineEvent::GamePaused);
        Ok(())
    })
}

/// Unfreeze gameplay.
pub fn resume(game: &mut GameInstance, events: &mut Vec<EngineEvent>) -> Result<(), EngineError> {
    transition(game, GameEvent::Resume, |_| {
        events.push(EngineEvent::GameResumed);
        Ok(())
    })
}

/// End the game, closing the active round first.
pub fn end_game(
    game: &mut GameInstance,
    events: &mut Vec<EngineEvent>,
) -> Result<Vec<TeamScore>, EngineError> {
    transition(game, GameEvent::EndGame, |game| {
        let round_running = game
            .active_round()
            .is_some_and(|round| round.status == RoundStatus::Active);
        if round_running {
            close_active_round(game, events)?;
        }
        game.question = None;
        game.runtime = RoundRuntime::Idle;
        let standings = standings(game);
        events.push(EngineEvent::GameOver(GameOverEvent {
            standings: standings.clone(),
        }));
        Ok(standings)
    })
}

// ---------------------------------------------------------------------------
// Archetype operations

fn ensure_between_questions(game: &GameInstance) -> Result<(), EngineError> {
    match ensure_playing(game)? {
        QuestionStage::Active => Err(EngineError::PhaseMismatch(
            "not allowed until the answer is revealed".into(),
        )),
        _ => Ok(()),
    }
}

/// Commit the climbing team's unbanked value to its score.
pub fn bank(
    game: &mut GameInstance,
    events: &mut Vec<EngineEvent>,
) -> Result<LadderBankedEvent, EngineError> {
    ensure_between_questions(game)?;
    let RoundRuntime::Ladder(ladder) = &mut game.runtime else {
        return Err(EngineError::PhaseMismatch("not a ladder round".into()));
    };
    let team = game
        .teams
        .get_mut(&ladder.team_id)
        .ok_or(EngineError::TeamNotFound(ladder.team_id))?;

    let amount = ladder.bank();
    team.apply_delta(i64::from(amount));
    let banked = LadderBankedEvent {
        team_id: ladder.team_id,
        amount,
        banked: ladder.banked,
        score: team.score,
    };
    events.push(EngineEvent::LadderBanked(banked.clone()));
    events.push(ladder_event(ladder));
    game.machine.bump_generation();
    Ok(banked)
}

/// Hand the ladder to another team, restarting the climb.
pub fn select_ladder_team(
    game: &mut GameInstance,
    team_id: Uuid,
    events: &mut Vec<EngineEvent>,
) -> Result<(), EngineError> {
    ensure_between_questions(game)?;
    if !game.teams.contains_key(&team_id) {
        return Err(EngineError::TeamNotFound(team_id));
    }
    let RoundRuntime::Ladder(ladder) = &mut game.runtime else {
        return Err(EngineError::PhaseMismatch("not a ladder round".into()));
    };
    ladder.select_team(team_id);
    events.push(ladder_event(ladder));
    game.machine.bump_generation();
    Ok(())
}

/// Detonate the bomb: the holder's team loses the configured penalty right away.
pub fn explode(
    game: &mut GameInstance,
    events: &mut Vec<EngineEvent>,
) -> Result<BombExplodedEvent, EngineError> {
    let stage = ensure_playing(game)?;
    let explosion_penalty = match active_kind(game)? {
        RoundKind::HotPotato {
            explosion_penalty, ..
        } => *explosion_penalty,
        _ => return Err(EngineError::PhaseMismatch("not a hot potato round".into())),
    };
    let RoundRuntime::HotPotato(bomb) = &mut game.runtime else {
        return Err(EngineError::PhaseMismatch("not a hot potato round".into()));
    };
    if bomb.phase == HotPotatoPhase::Exploded {
        return Err(EngineError::PhaseMismatch("the bomb already exploded".into()));
    }

    let history = bomb.explode();
    let (player_id, team_id) = (bomb.holder, bomb.holder_team);
    let (penalty, score) = game
        .teams
        .get_mut(&team_id)
        .map(|team| (team.apply_delta(-i64::from(explosion_penalty)), team.score))
        .unwrap_or((0, 0));
    if stage == QuestionStage::Active
        && let Some(state) = game.question.as_mut()
        && state.is_open()
    {
        state.resolution = Some(QuestionResolution::BombExploded);
    }

    let exploded = BombExplodedEvent {
        player_id,
        team_id,
        penalty,
        score,
        history,
    };
    events.push(EngineEvent::BombExploded(exploded.clone()));
    game.machine.bump_generation();
    Ok(exploded)
}

/// Announcing to stealing.
pub fn begin_steal(
    game: &mut GameInstance,
    events: &mut Vec<EngineEvent>,
) -> Result<(), EngineError> {
    ensure_playing(game)?;
    let RoundRuntime::StealPoints(steal) = &mut game.runtime else {
        return Err(EngineError::PhaseMismatch("not a steal round".into()));
    };
    if steal.phase != StealPhase::Announcing {
        return Err(EngineError::PhaseMismatch("no steal was earned".into()));
    }
    steal.phase = StealPhase::Stealing;
    events.push(steal_event(steal.phase, steal.buzzer));
    game.machine.bump_generation();
    Ok(())
}

/// Move `min(steal amount, target score)` from the target team to the buzzer's team.
pub fn steal(
    game: &mut GameInstance,
    target_team_id: Uuid,
    events: &mut Vec<EngineEvent>,
) -> Result<StealExecutedEvent, EngineError> {
    ensure_playing(game)?;
    let RoundRuntime::StealPoints(steal) = &mut game.runtime else {
        return Err(EngineError::PhaseMismatch("not a steal round".into()));
    };
    if steal.phase != StealPhase::Stealing {
        return Err(EngineError::PhaseMismatch("not in the stealing phase".into()));
    }
    let thief_id = steal
        .buzzer
        .map(|buzzer| buzzer.team_id)
        .ok_or_else(|| EngineError::PhaseMismatch("no buzzer recorded".into()))?;
    if thief_id == target_team_id {
        return Err(EngineError::InvalidTarget(
            "a team cannot steal from itself".into(),
        ));
    }
    if !game.teams.contains_key(&thief_id) {
        return Err(EngineError::TeamNotFound(thief_id));
    }
    let target = game
        .teams
        .get_mut(&target_team_id)
        .ok_or(EngineError::TeamNotFound(target_team_id))?;

    let amount = steal.steal_amount.min(target.score);
    target.score -= amount;
    let from_score = target.score;
    let thief = game
        .teams
        .get_mut(&thief_id)
        .ok_or(EngineError::TeamNotFound(thief_id))?;
    thief.score = thief.score.saturating_add(amount);
    let executed = StealExecutedEvent {
        from_team_id: target_team_id,
        to_team_id: thief_id,
        amount,
        from_score,
        to_score: thief.score,
    };

    steal.clear();
    events.push(EngineEvent::StealExecuted(executed.clone()));
    events.push(steal_event(steal.phase, None));
    game.machine.bump_generation();
    Ok(executed)
}

// ---------------------------------------------------------------------------
// Countdowns

/// Advance a countdown by one second, expiring it at zero.
pub fn tick_countdown(
    game: &mut GameInstance,
    kind: TimerKind,
    events: &mut Vec<EngineEvent>,
) -> Result<Countdown, EngineError> {
    if ensure_playing(game)? != QuestionStage::Active {
        return Err(EngineError::QuestionNotInProgress);
    }
    let remaining = match kind {
        TimerKind::Question => {
            let state = game
                .question
                .as_mut()
                .ok_or(EngineError::QuestionNotInProgress)?;
            state.remaining_secs = state.remaining_secs.saturating_sub(1);
            state.remaining_secs
        }
        TimerKind::AnswerTurn => match &mut game.runtime {
            RoundRuntime::FastestFinger(ff) => {
                ff.answer_remaining_secs = ff.answer_remaining_secs.saturating_sub(1);
                ff.answer_remaining_secs
            }
            _ => return Err(EngineError::PhaseMismatch("no answer turn running".into())),
        },
        TimerKind::StealAnswer => match &mut game.runtime {
            RoundRuntime::StealPoints(steal) => {
                steal.answer_remaining_secs = steal.answer_remaining_secs.saturating_sub(1);
                steal.answer_remaining_secs
            }
            _ => return Err(EngineError::PhaseMismatch("no steal answer running".into())),
        },
        TimerKind::Bomb => match &mut game.runtime {
            RoundRuntime::HotPotato(bomb) => {
                bomb.bomb_remaining_secs = bomb.bomb_remaining_secs.saturating_sub(1);
                events.push(EngineEvent::BombTick(BombTickEvent {
                    holder_id: bomb.holder,
                    team_id: bomb.holder_team,
                    remaining_secs: bomb.bomb_remaining_secs,
                }));
                bomb.bomb_remaining_secs
            }
            _ => return Err(EngineError::PhaseMismatch("no bomb in play".into())),
        },
        TimerKind::AutoReveal
        | TimerKind::AutoShowPoints
        | TimerKind::AutoNext
        | TimerKind::AutoEndGame => {
            return Err(EngineError::PhaseMismatch(format!(
                "{kind:?} is not a countdown"
            )));
        }
    };

    events.push(EngineEvent::TimerTick(TimerTickEvent {
        kind,
        remaining_secs: remaining,
    }));
    if remaining > 0 {
        return Ok(Countdown::Running(remaining));
    }
    expire_countdown(game, kind, events)?;
    Ok(Countdown::Expired)
}

fn expire_countdown(
    game: &mut GameInstance,
    kind: TimerKind,
    events: &mut Vec<EngineEvent>,
) -> Result<(), EngineError> {
    events.push(EngineEvent::TimeUp(TimeUpEvent { kind }));
    if kind == TimerKind::Bomb {
        explode(game, events)?;
        return Ok(());
    }

    let state = game
        .question
        .as_mut()
        .ok_or(EngineError::QuestionNotInProgress)?;
    match (kind, &mut game.runtime) {
        (TimerKind::AnswerTurn, RoundRuntime::FastestFinger(ff)) => {
            if ff.advance_turn(&state.buzz_queue, true) == TurnAdvance::Exhausted {
                state.resolution = Some(QuestionResolution::QueueExhausted);
            }
        }
        _ => {
            if state.is_open() {
                state.resolution = Some(QuestionResolution::TimeUp);
            }
        }
    }
    game.machine.bump_generation();
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        services::buzz_arbiter::BuzzRejection,
        state::{
            game::Choice,
            rounds::{DEFAULT_EXPLOSION_PENALTY, SpeedBonus},
        },
    };

    struct Fixture {
        game: GameInstance,
        teams: Vec<Uuid>,
        players: Vec<Uuid>,
        rng: StdRng,
    }

    fn question(prompt: &str, correct: ChoiceColor, colors: &[ChoiceColor]) -> Question {
        Question {
            prompt: prompt.into(),
            choices: colors
                .iter()
                .map(|color| Choice {
                    text: format!("{color:?}"),
                    color: *color,
                    correct: *color == correct,
                })
                .collect(),
            media_url: Some("https://cdn.example/picture.png".into()),
        }
    }

    fn four_choices(prompt: &str) -> Question {
        question(
            prompt,
            ChoiceColor::Blue,
            &[
                ChoiceColor::Blue,
                ChoiceColor::Orange,
                ChoiceColor::Green,
                ChoiceColor::Yellow,
            ],
        )
    }

    fn round(kind: RoundKind, questions: usize) -> RoundDraft {
        let questions = (0..questions)
            .map(|index| match kind {
                RoundKind::TrueFalse { .. } => question(
                    &format!("statement {index}"),
                    ChoiceColor::Blue,
                    &[ChoiceColor::Blue, ChoiceColor::Orange],
                ),
                _ => four_choices(&format!("question {index}")),
            })
            .collect();
        RoundDraft {
            config: RoundConfig {
                title: format!("{:?}", kind.tag()),
                kind,
                question_time: Duration::from_secs(20),
            },
            questions,
        }
    }

    /// Two teams of two players (slots 1-2 and 3-4) playing the given rounds.
    fn fixture(rounds: Vec<RoundDraft>) -> Fixture {
        let mut game = GameInstance::new("Test show".into(), GameSettings::default());
        let red = add_team(&mut game, "Red", Some(TeamColor::Red)).unwrap();
        let blue = add_team(&mut game, "Blue", None).unwrap();
        let players = vec![
            add_player(&mut game, red, "Ana", slot(1)).unwrap(),
            add_player(&mut game, red, "Ben", slot(2)).unwrap(),
            add_player(&mut game, blue, "Cy", slot(3)).unwrap(),
            add_player(&mut game, blue, "Di", slot(4)).unwrap(),
        ];
        set_rounds(&mut game, rounds).unwrap();
        start_game(&mut game).unwrap();
        Fixture {
            game,
            teams: vec![red, blue],
            players,
            rng: StdRng::seed_from_u64(42),
        }
    }

    fn slot(raw: u8) -> ControllerSlot {
        ControllerSlot::new(raw).unwrap()
    }

    fn press(raw: u8, button: Button, timestamp_ms: u64) -> Press {
        Press {
            slot: slot(raw),
            button,
            action: PressAction::Press,
            timestamp_ms,
        }
    }

    impl Fixture {
        fn start_round_and_question(&mut self) {
            let mut events = Vec::new();
            start_round(&mut self.game, None, &mut self.rng, &mut events).unwrap();
            start_question(&mut self.game, 1_000, &mut events).unwrap();
        }

        fn press(&mut self, raw: u8, button: Button) -> Result<PressOutcome, EngineError> {
            let mut events = Vec::new();
            handle_press(&mut self.game, press(raw, button, 1_500), &mut events)
        }

        fn score(&self, team: usize) -> u32 {
            self.game.teams[&self.teams[team]].score
        }

        fn set_score(&mut self, team: usize, score: u32) {
            self.game.teams[&self.teams[team]].score = score;
        }
    }

    fn ff_kind() -> RoundKind {
        RoundKind::FastestFinger {
            correct_points: 200,
            wrong_points: -50,
            answer_time: Duration::from_secs(5),
        }
    }

    fn steal_kind() -> RoundKind {
        RoundKind::StealPoints {
            wrong_points: 0,
            steal_amount: 300,
            answer_time: Duration::from_secs(5),
        }
    }

    fn hot_potato_kind() -> RoundKind {
        RoundKind::HotPotato {
            correct_points: 100,
            wrong_points: 0,
            bomb_time: Duration::from_secs(3),
            explosion_penalty: DEFAULT_EXPLOSION_PENALTY,
        }
    }

    #[test]
    fn setup_enforces_unique_colors_and_slots() {
        let mut game = GameInstance::new("Setup".into(), GameSettings::default());
        let red = add_team(&mut game, "Red", Some(TeamColor::Red)).unwrap();
        assert!(matches!(
            add_team(&mut game, "Other red", Some(TeamColor::Red)),
            Err(EngineError::CapacityExceeded(_))
        ));
        add_player(&mut game, red, "Ana", slot(1)).unwrap();
        assert!(matches!(
            add_player(&mut game, red, "Ben", slot(1)),
            Err(EngineError::CapacityExceeded(_))
        ));
        for name in ["B", "C", "D"] {
            add_team(&mut game, name, None).unwrap();
        }
        assert!(matches!(
            add_team(&mut game, "Fifth", None),
            Err(EngineError::CapacityExceeded(_))
        ));
    }

    #[test]
    fn rounds_with_two_correct_choices_are_rejected() {
        let mut game = GameInstance::new("Setup".into(), GameSettings::default());
        let mut draft = round(
            RoundKind::MultipleChoice {
                correct_points: 100,
                wrong_points: 0,
                speed_bonus: None,
            },
            1,
        );
        draft.questions[0].choices[1].correct = true;
        assert!(matches!(
            set_rounds(&mut game, vec![draft]),
            Err(EngineError::InvalidConfiguration(_))
        ));
        assert!(game.rounds.is_empty());
    }

    #[test]
    fn single_winner_buzzing_accepts_one_buzz() {
        for kind in [
            ff_kind(),
            steal_kind(),
            RoundKind::Final {
                correct_points: 500,
                wrong_points: -500,
            },
        ] {
            let mut fx = fixture(vec![round(kind, 1)]);
            fx.start_round_and_question();

            assert!(matches!(
                fx.press(2, Button::Buzz),
                Ok(PressOutcome::BuzzAccepted(BuzzRecord { was_first: true, .. }))
            ));
            for raw in [1, 3, 4] {
                assert_eq!(
                    fx.press(raw, Button::Buzz),
                    Err(EngineError::BuzzRejected(BuzzRejection::NotFirst))
                );
            }
            let queue = &fx.game.question.as_ref().unwrap().buzz_queue;
            assert_eq!(queue.len(), 1);
            assert_eq!(queue[0].player_id, fx.players[1]);
        }
    }

    #[test]
    fn buzzes_are_ignored_in_multiple_choice() {
        let mut fx = fixture(vec![round(
            RoundKind::MultipleChoice {
                correct_points: 100,
                wrong_points: 0,
                speed_bonus: None,
            },
            1,
        )]);
        fx.start_round_and_question();
        assert!(matches!(fx.press(1, Button::Buzz), Ok(PressOutcome::Ignored(_))));
        assert_eq!(fx.press(1, Button::Blue), Ok(PressOutcome::AnswerRecorded));
        assert!(fx.game.question.as_ref().unwrap().buzz_queue.is_empty());
    }

    #[test]
    fn unknown_slot_and_release_handling() {
        let mut game = GameInstance::new("Empty".into(), GameSettings::default());
        let mut events = Vec::new();
        assert_eq!(
            handle_press(&mut game, press(3, Button::Buzz, 0), &mut events),
            Err(EngineError::PlayerNotFound(slot(3)))
        );
        let release = Press {
            action: PressAction::Release,
            ..press(3, Button::Buzz, 0)
        };
        assert_eq!(
            handle_press(&mut game, release, &mut events),
            Ok(PressOutcome::Ignored("release"))
        );
    }

    #[test]
    fn true_false_rewards_single_correct_answer() {
        let mut fx = fixture(vec![round(
            RoundKind::TrueFalse {
                correct_points: 100,
                wrong_points: 0,
            },
            1,
        )]);
        fx.start_round_and_question();

        fx.press(1, Button::Blue).unwrap();
        fx.press(3, Button::Blue).unwrap();
        fx.press(4, Button::Orange).unwrap();
        let staged: Vec<i64> = fx.game.question.as_ref().unwrap().answers
            .iter()
            .map(|answer| answer.staged_points)
            .collect();
        assert_eq!(staged, vec![100, 0, 0]);
        assert_eq!(fx.press(1, Button::Orange), Err(EngineError::AlreadyAnswered));

        let revealed = reveal(&mut fx.game, &mut Vec::new()).unwrap();
        assert_eq!(revealed.correct_choice, Some(ChoiceColor::Blue));
        assert_eq!(fx.score(0) + fx.score(1), 100);
    }

    #[test]
    fn all_answers_resolve_multiple_choice() {
        let mut fx = fixture(vec![round(
            RoundKind::MultipleChoice {
                correct_points: 100,
                wrong_points: -20,
                speed_bonus: Some(SpeedBonus::FastSlow {
                    fast: 300,
                    slow: 100,
                }),
            },
            1,
        )]);
        fx.start_round_and_question();
        for raw in 1..=3 {
            fx.press(raw, Button::Blue).unwrap();
        }
        assert!(fx.game.question.as_ref().unwrap().is_open());
        let before = fx.game.generation();
        fx.press(4, Button::Green).unwrap();
        assert_eq!(
            fx.game.question.as_ref().unwrap().resolution,
            Some(QuestionResolution::AllAnswered)
        );
        assert!(fx.game.generation() > before);
        assert_eq!(fx.press(4, Button::Blue), Err(EngineError::QuestionNotInProgress));

        reveal(&mut fx.game, &mut Vec::new()).unwrap();
        assert_eq!(fx.score(0), 400);
        assert_eq!(fx.score(1), 80);
    }

    #[test]
    fn reveal_applies_staged_points_once() {
        let mut fx = fixture(vec![round(ff_kind(), 2)]);
        fx.start_round_and_question();
        fx.press(3, Button::Buzz).unwrap();
        fx.press(3, Button::Blue).unwrap();
        assert_eq!(fx.score(1), 0);

        let mut events = Vec::new();
        let revealed = reveal(&mut fx.game, &mut events).unwrap();
        assert_eq!(fx.score(1), 200);
        assert_eq!(revealed.teams[1].delta, 200);

        assert_eq!(
            reveal(&mut fx.game, &mut events),
            Err(EngineError::AnswerAlreadyRevealed)
        );
        assert_eq!(fx.score(1), 200);
        assert!(fx.game.question.as_ref().unwrap().answers.is_empty());
    }

    #[test]
    fn fastest_finger_wrong_answer_exhausts_single_queue() {
        let mut fx = fixture(vec![round(ff_kind(), 1)]);
        fx.start_round_and_question();
        fx.press(1, Button::Buzz).unwrap();
        assert_eq!(fx.press(2, Button::Blue), Err(EngineError::NotYourTurn));
        fx.press(1, Button::Orange).unwrap();

        let state = fx.game.question.as_ref().unwrap();
        assert_eq!(state.resolution, Some(QuestionResolution::QueueExhausted));
        reveal(&mut fx.game, &mut Vec::new()).unwrap();
        assert_eq!(fx.score(0), 0);
    }

    #[test]
    fn answer_turn_timeout_ends_question_unscored() {
        let mut fx = fixture(vec![round(ff_kind(), 1)]);
        fx.start_round_and_question();
        fx.press(2, Button::Buzz).unwrap();

        let mut events = Vec::new();
        for expected in (1..5).rev() {
            assert_eq!(
                tick_countdown(&mut fx.game, TimerKind::AnswerTurn, &mut events),
                Ok(Countdown::Running(expected))
            );
        }
        assert_eq!(
            tick_countdown(&mut fx.game, TimerKind::AnswerTurn, &mut events),
            Ok(Countdown::Expired)
        );
        assert_eq!(
            fx.game.question.as_ref().unwrap().resolution,
            Some(QuestionResolution::QueueExhausted)
        );
        assert!(events.iter().any(|event| matches!(event, EngineEvent::TimeUp(_))));
    }

    #[test]
    fn question_timer_expiry_resolves() {
        let mut fx = fixture(vec![round(
            RoundKind::PictureSound {
                correct_points: 100,
                wrong_points: 0,
                speed_bonus: None,
            },
            1,
        )]);
        fx.start_round_and_question();
        fx.game.question.as_mut().unwrap().remaining_secs = 1;
        let mut events = Vec::new();
        assert_eq!(
            tick_countdown(&mut fx.game, TimerKind::Question, &mut events),
            Ok(Countdown::Expired)
        );
        assert_eq!(
            fx.game.question.as_ref().unwrap().resolution,
            Some(QuestionResolution::TimeUp)
        );
    }

    #[test]
    fn final_gate_holder_answers_once() {
        let mut fx = fixture(vec![round(
            RoundKind::Final {
                correct_points: 500,
                wrong_points: -500,
            },
            1,
        )]);
        fx.start_round_and_question();
        assert!(matches!(fx.press(4, Button::Blue), Err(EngineError::PhaseMismatch(_))));
        fx.press(4, Button::Buzz).unwrap();
        assert_eq!(fx.press(3, Button::Blue), Err(EngineError::NotYourTurn));
        fx.press(4, Button::Green).unwrap();
        assert_eq!(fx.press(4, Button::Blue), Err(EngineError::QuestionNotInProgress));

        fx.set_score(1, 200);
        reveal(&mut fx.game, &mut Vec::new()).unwrap();
        assert_eq!(fx.score(1), 0);
    }

    #[test]
    fn hot_potato_explosion_clamps_score() {
        let mut fx = fixture(vec![round(hot_potato_kind(), 3)]);
        fx.start_round_and_question();
        let RoundRuntime::HotPotato(bomb) = &fx.game.runtime else {
            panic!("expected hot potato runtime");
        };
        let holder_team = bomb.holder_team;
        fx.game.teams[&holder_team].score = 300;

        let exploded = explode(&mut fx.game, &mut Vec::new()).unwrap();
        assert_eq!(exploded.penalty, -300);
        assert_eq!(exploded.score, 0);
        assert_eq!(fx.game.teams[&holder_team].score, 0);
        assert_eq!(
            fx.game.question.as_ref().unwrap().resolution,
            Some(QuestionResolution::BombExploded)
        );
        assert!(matches!(
            explode(&mut fx.game, &mut Vec::new()),
            Err(EngineError::PhaseMismatch(_))
        ));
    }

    #[test]
    fn hot_potato_pass_and_next_cycle() {
        let mut fx = fixture(vec![round(hot_potato_kind(), 3)]);
        fx.start_round_and_question();
        let holder = match &fx.game.runtime {
            RoundRuntime::HotPotato(bomb) => bomb.holder,
            other => panic!("unexpected runtime {other:?}"),
        };
        let holder_slot = fx.game.player(holder).unwrap().1.slot.get();
        let other_slot = if holder_slot == 1 { 2 } else { 1 };

        assert_eq!(fx.press(other_slot, Button::Blue), Err(EngineError::NotYourTurn));
        fx.press(holder_slot, Button::Blue).unwrap();
        assert_eq!(
            fx.press(holder_slot, Button::Buzz),
            Err(EngineError::InvalidTarget(
                "the holder cannot pass the bomb to themselves".into()
            ))
        );
        assert_eq!(fx.press(other_slot, Button::Buzz), Ok(PressOutcome::BombPassed));

        let mut events = Vec::new();
        reveal(&mut fx.game, &mut events).unwrap();
        start_question(&mut fx.game, 2_000, &mut events).unwrap();
        let (new_holder, remaining) = match &fx.game.runtime {
            RoundRuntime::HotPotato(bomb) => (bomb.holder, bomb.bomb_remaining_secs),
            other => panic!("unexpected runtime {other:?}"),
        };
        assert_eq!(fx.game.player(new_holder).unwrap().1.slot.get(), other_slot);
        assert_eq!(remaining, 3);

        for _ in 0..2 {
            tick_countdown(&mut fx.game, TimerKind::Bomb, &mut events).unwrap();
        }
        assert_eq!(
            tick_countdown(&mut fx.game, TimerKind::Bomb, &mut events),
            Ok(Countdown::Expired)
        );
        let exploded = events.iter().find_map(|event| match event {
            EngineEvent::BombExploded(exploded) => Some(exploded.clone()),
            _ => None,
        });
        assert_eq!(exploded.map(|exploded| exploded.player_id), Some(new_holder));

        reveal(&mut fx.game, &mut events).unwrap();
        start_question(&mut fx.game, 3_000, &mut events).unwrap();
        let roster = fx.game.roster();
        let expected = next_holder(&roster, new_holder).unwrap().1;
        match &fx.game.runtime {
            RoundRuntime::HotPotato(bomb) => {
                assert_eq!(bomb.holder, expected);
                assert_eq!(bomb.phase, HotPotatoPhase::Playing);
                assert!(bomb.history.is_empty());
            }
            other => panic!("unexpected runtime {other:?}"),
        }
    }

    #[test]
    fn steal_transfers_min_amount() {
        let mut fx = fixture(vec![round(steal_kind(), 2)]);
        fx.set_score(0, 1_000);
        fx.set_score(1, 120);
        fx.start_round_and_question();
        fx.press(1, Button::Buzz).unwrap();
        assert_eq!(fx.press(2, Button::Blue), Err(EngineError::NotYourTurn));
        fx.press(1, Button::Blue).unwrap();

        let mut events = Vec::new();
        assert!(matches!(
            steal(&mut fx.game, fx.teams[1], &mut events),
            Err(EngineError::PhaseMismatch(_))
        ));
        reveal(&mut fx.game, &mut events).unwrap();
        begin_steal(&mut fx.game, &mut events).unwrap();
        assert!(matches!(
            steal(&mut fx.game, fx.teams[0], &mut events),
            Err(EngineError::InvalidTarget(_))
        ));

        let executed = steal(&mut fx.game, fx.teams[1], &mut events).unwrap();
        assert_eq!(executed.amount, 120);
        assert_eq!(fx.score(1), 0);
        assert_eq!(fx.score(0), 1_120);
        assert_eq!(fx.score(0) + fx.score(1), 1_120);
        match &fx.game.runtime {
            RoundRuntime::StealPoints(steal) => assert_eq!(steal.phase, StealPhase::Buzzing),
            other => panic!("unexpected runtime {other:?}"),
        }
    }

    #[test]
    fn wrong_steal_answer_clears_on_reveal() {
        let mut fx = fixture(vec![round(steal_kind(), 1)]);
        fx.start_round_and_question();
        fx.press(3, Button::Buzz).unwrap();
        fx.press(3, Button::Orange).unwrap();
        reveal(&mut fx.game, &mut Vec::new()).unwrap();
        match &fx.game.runtime {
            RoundRuntime::StealPoints(steal) => {
                assert_eq!(steal.phase, StealPhase::Buzzing);
                assert!(steal.buzzer.is_none());
            }
            other => panic!("unexpected runtime {other:?}"),
        }
    }

    #[test]
    fn ladder_climb_bank_and_fall() {
        let mut fx = fixture(vec![round(
            RoundKind::Ladder {
                rungs: vec![100, 200, 400],
            },
            3,
        )]);
        fx.start_round_and_question();
        let mut events = Vec::new();

        assert_eq!(fx.press(3, Button::Blue), Err(EngineError::NotYourTurn));
        fx.press(1, Button::Blue).unwrap();
        assert!(matches!(bank(&mut fx.game, &mut events), Err(EngineError::PhaseMismatch(_))));
        reveal(&mut fx.game, &mut events).unwrap();
        start_question(&mut fx.game, 2_000, &mut events).unwrap();
        fx.press(2, Button::Blue).unwrap();
        reveal(&mut fx.game, &mut events).unwrap();

        let banked = bank(&mut fx.game, &mut events).unwrap();
        assert_eq!(banked.amount, 200);
        assert_eq!(banked.banked, 200);
        assert_eq!(fx.score(0), 200);

        start_question(&mut fx.game, 3_000, &mut events).unwrap();
        fx.press(1, Button::Orange).unwrap();
        reveal(&mut fx.game, &mut events).unwrap();
        match &fx.game.runtime {
            RoundRuntime::Ladder(ladder) => {
                assert_eq!(ladder.unbanked, 0);
                assert_eq!(ladder.rung, 0);
                assert_eq!(ladder.banked, 200);
            }
            other => panic!("unexpected runtime {other:?}"),
        }
        select_ladder_team(&mut fx.game, fx.teams[1], &mut events).unwrap();
    }

    #[test]
    fn retry_restores_round_start_scores() {
        let mut fx = fixture(vec![round(ff_kind(), 1)]);
        fx.set_score(0, 50);
        fx.start_round_and_question();
        fx.press(1, Button::Buzz).unwrap();
        fx.press(1, Button::Blue).unwrap();
        let mut events = Vec::new();
        reveal(&mut fx.game, &mut events).unwrap();
        let result = end_round(&mut fx.game, &mut events).unwrap();
        assert_eq!(result.deltas[&fx.teams[0]], 200);
        assert_eq!(fx.score(0), 250);

        retry_round(&mut fx.game, &mut fx.rng, &mut events).unwrap();
        assert_eq!(fx.score(0), 50);
        assert!(fx.game.round_results.is_empty());
        let round = fx.game.active_round().unwrap();
        assert_eq!(round.current_question_index, -1);
        assert_eq!(round.status, RoundStatus::Active);
    }

    #[test]
    fn next_walks_questions_rounds_and_ends_game() {
        let mut fx = fixture(vec![
            round(ff_kind(), 2),
            round(
                RoundKind::TrueFalse {
                    correct_points: 100,
                    wrong_points: 0,
                },
                1,
            ),
        ]);
        let mut events = Vec::new();
        let rng = &mut fx.rng;

        assert_eq!(
            next(&mut fx.game, 0, rng, &mut events),
            Ok(NextStep::Round {
                round_index: 0,
                question_index: 0
            })
        );
        assert!(matches!(
            next(&mut fx.game, 0, rng, &mut events),
            Err(EngineError::PhaseMismatch(_))
        ));
        reveal(&mut fx.game, &mut events).unwrap();
        assert_eq!(next(&mut fx.game, 0, rng, &mut events), Ok(NextStep::Question(1)));
        reveal(&mut fx.game, &mut events).unwrap();
        show_points(&mut fx.game, &mut events).unwrap();
        assert_eq!(
            next(&mut fx.game, 0, rng, &mut events),
            Ok(NextStep::Round {
                round_index: 1,
                question_index: 0
            })
        );
        assert_eq!(fx.game.round_results.len(), 1);
        reveal(&mut fx.game, &mut events).unwrap();
        assert!(!has_more_to_play(&fx.game));
        assert_eq!(next(&mut fx.game, 0, rng, &mut events), Ok(NextStep::GameOver));
        assert_eq!(fx.game.status(), GameStatus::Finished);
        assert_eq!(fx.game.round_results.len(), 2);
    }

    #[test]
    fn paused_game_rejects_presses_and_keeps_countdowns() {
        let mut fx = fixture(vec![round(ff_kind(), 1)]);
        fx.start_round_and_question();
        let mut events = Vec::new();
        tick_countdown(&mut fx.game, TimerKind::Question, &mut events).unwrap();
        pause(&mut fx.game, &mut events).unwrap();

        assert!(matches!(
            fx.press(1, Button::Buzz),
            Err(EngineError::GameNotPlaying(_))
        ));
        assert!(tick_countdown(&mut fx.game, TimerKind::Question, &mut events).is_err());
        resume(&mut fx.game, &mut events).unwrap();
        assert_eq!(fx.game.question.as_ref().unwrap().remaining_secs, 19);
    }

    #[test]
    fn failed_transition_work_leaves_phase_untouched() {
        let mut game = GameInstance::new("Empty".into(), GameSettings::default());
        let generation = game.generation();
        assert!(matches!(
            start_game(&mut game),
            Err(EngineError::InvalidConfiguration(_))
        ));
        assert_eq!(game.status(), GameStatus::Lobby);
        assert_eq!(game.generation(), generation);
        begin_setup(&mut game).unwrap();
        assert_eq!(game.status(), GameStatus::Setup);
    }
}
