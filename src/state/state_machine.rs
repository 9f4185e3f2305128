use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// High-level phases a game instance can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// Freshly created; teams and rounds can be edited.
    Lobby,
    /// Host is finishing the configuration before kick-off.
    Setup,
    /// Gameplay is running in the given sub-phase.
    Playing(PlayPhase),
    /// Gameplay is frozen; `resume` returns to the stored sub-phase.
    Paused {
        /// Sub-phase restored on resume.
        resume: PlayPhase,
    },
    /// Terminal phase with the final scoreboard.
    Finished,
}

/// Sub-phase while the game is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayPhase {
    /// Between rounds, no round active.
    Intermission,
    /// A round is active and its current question is in the given stage.
    RoundActive(QuestionStage),
}

/// Lifecycle of the current question inside an active round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionStage {
    /// Round started, no question shown yet (or between questions).
    Waiting,
    /// Question is on screen and accepting presses.
    Active,
    /// Correct answer shown and staged points committed.
    Revealed,
    /// Scoreboard shown after the reveal.
    PointsShown,
}

/// Coarse status reported to clients and persisted in snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Game created, not configured.
    Lobby,
    /// Game being configured.
    Setup,
    /// Gameplay running.
    Playing,
    /// Gameplay frozen.
    Paused,
    /// Game over.
    Finished,
}

impl GamePhase {
    /// Status derived from the phase.
    pub fn status(&self) -> GameStatus {
        match self {
            GamePhase::Lobby => GameStatus::Lobby,
            GamePhase::Setup => GameStatus::Setup,
            GamePhase::Playing(_) => GameStatus::Playing,
            GamePhase::Paused { .. } => GameStatus::Paused,
            GamePhase::Finished => GameStatus::Finished,
        }
    }

    /// Question stage when a round is active and the game is playing.
    pub fn question_stage(&self) -> Option<QuestionStage> {
        match self {
            GamePhase::Playing(PlayPhase::RoundActive(stage)) => Some(*stage),
            _ => None,
        }
    }

    /// Play sub-phase, whether running or frozen.
    pub fn play_phase(&self) -> Option<PlayPhase> {
        match self {
            GamePhase::Playing(play) | GamePhase::Paused { resume: play } => Some(*play),
            _ => None,
        }
    }
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    /// Host opens the configuration step.
    BeginSetup,
    /// Host starts the game.
    StartGame,
    /// Activate a round.
    StartRound,
    /// Show the next question of the active round.
    StartQuestion,
    /// Reveal the correct answer.
    Reveal,
    /// Display the scoreboard after a reveal.
    ShowPoints,
    /// Close the active round.
    EndRound,
    /// Replay a round from scratch.
    RetryRound,
    /// Freeze gameplay.
    Pause,
    /// Unfreeze gameplay.
    Resume,
    /// Terminate the game.
    EndGame,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: GamePhase,
    /// The event that cannot be applied from this phase.
    pub event: GameEvent,
}

/// Errors that can occur when planning a state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// State machine phase changed since the plan was created.
    PhaseMismatch {
        /// Phase when plan was created.
        expected: GamePhase,
        /// Current phase.
        actual: GamePhase,
    },
    /// Generation changed since the plan was created.
    GenerationMismatch {
        /// Generation expected after the transition.
        expected: u64,
        /// Generation the transition would actually produce.
        actual: u64,
    },
}

/// Errors that can occur when aborting a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned state transition.
pub type PlanId = Uuid;

/// A planned state machine transition that has been validated but not yet applied.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase the state machine is currently in.
    pub from: GamePhase,
    /// Phase the state machine will transition to.
    pub to: GamePhase,
    /// Event that triggered this transition.
    pub event: GameEvent,
    /// Generation after applying this transition.
    pub generation_next: u64,
    /// Timestamp when this plan was created.
    pub pending_since: Instant,
}

/// Phase holder for one game instance.
///
/// The generation counter increases on every applied transition and on every
/// sub-phase change reported through [`GameStateMachine::bump_generation`].
/// Deferred work (timers) captures the generation when it is scheduled and
/// becomes a no-op once the counter moved on.
#[derive(Debug, Clone)]
pub struct GameStateMachine {
    phase: GamePhase,
    generation: u64,
    pending: Option<Plan>,
}

impl Default for GameStateMachine {
    fn default() -> Self {
        Self {
            phase: GamePhase::Lobby,
            generation: 0,
            pending: None,
        }
    }
}

impl GameStateMachine {
    /// Create a new state machine in the lobby phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a machine at the given phase, used when importing snapshots.
    pub fn restore(phase: GamePhase) -> Self {
        Self {
            phase,
            generation: 0,
            pending: None,
        }
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Current generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Invalidate deferred work after a change that does not move the phase
    /// (question resolved, turn handed over, bomb passed...).
    pub fn bump_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Plan a transition by validating that the event can be applied from the current phase.
    /// Returns a Plan that can later be applied or aborted.
    pub fn plan(&mut self, event: GameEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event)
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.phase,
            to: next,
            event,
            generation_next: self.generation + 1,
            pending_since: Instant::now(),
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition, moving the state machine to the next phase.
    /// Returns the new phase after the transition.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<GamePhase, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected_plan_id = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected: expected_plan_id,
                got: plan_id,
            });
        }

        if self.phase != plan.from {
            return Err(ApplyError::PhaseMismatch {
                expected: plan.from,
                actual: self.phase,
            });
        }

        // Work done between plan and apply may bump the generation; that is
        // expected, only a rollback is suspicious.
        if self.generation + 1 < plan.generation_next {
            return Err(ApplyError::GenerationMismatch {
                expected: plan.generation_next,
                actual: self.generation + 1,
            });
        }

        self.phase = plan.to;
        self.generation += 1;

        Ok(self.phase)
    }

    /// Abort a planned transition without applying it, returning the state machine to its previous state.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: GameEvent) -> Result<GamePhase, InvalidTransition> {
        use GameEvent as E;
        use PlayPhase::{Intermission, RoundActive};
        use QuestionStage::{Active, PointsShown, Revealed, Waiting};

        let next = match (self.phase, event) {
            (GamePhase::Lobby, E::BeginSetup) => GamePhase::Setup,
            (GamePhase::Lobby | GamePhase::Setup, E::StartGame) => {
                GamePhase::Playing(Intermission)
            }
            (GamePhase::Playing(Intermission), E::StartRound) => {
                GamePhase::Playing(RoundActive(Waiting))
            }
            (GamePhase::Playing(RoundActive(Waiting | Revealed | PointsShown)), E::StartQuestion) => {
                GamePhase::Playing(RoundActive(Active))
            }
            (GamePhase::Playing(RoundActive(Active)), E::Reveal) => {
                GamePhase::Playing(RoundActive(Revealed))
            }
            (GamePhase::Playing(RoundActive(Revealed)), E::ShowPoints) => {
                GamePhase::Playing(RoundActive(PointsShown))
            }
            (GamePhase::Playing(RoundActive(_)), E::EndRound) => GamePhase::Playing(Intermission),
            (GamePhase::Playing(_), E::RetryRound) => GamePhase::Playing(RoundActive(Waiting)),
            (GamePhase::Playing(play), E::Pause) => GamePhase::Paused { resume: play },
            (GamePhase::Paused { resume }, E::Resume) => GamePhase::Playing(resume),
            (
                GamePhase::Lobby | GamePhase::Setup | GamePhase::Playing(_) | GamePhase::Paused { .. },
                E::EndGame,
            ) => GamePhase::Finished,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}
