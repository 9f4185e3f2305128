use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    services::buzz_arbiter::BuzzRejection,
    state::{
        game::ControllerSlot,
        state_machine::{
            AbortError, ApplyError, GameEvent, GamePhase, InvalidTransition, PlanError, PlayPhase,
            QuestionStage,
        },
    },
};

/// Precondition failures raised by the game engine.
///
/// None of these are fatal: the engine leaves the game untouched and the caller is free to
/// retry with a corrected operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// No game registered under this identifier.
    #[error("game `{0}` not found")]
    GameNotFound(Uuid),
    /// The operation needs a game in the `playing` status.
    #[error("game is not playing (status {0})")]
    GameNotPlaying(String),
    /// No round is currently active.
    #[error("no round is active")]
    RoundNotActive,
    /// The operation needs a question accepting answers.
    #[error("no question is in progress")]
    QuestionNotInProgress,
    /// The current question was already revealed.
    #[error("answer already revealed")]
    AnswerAlreadyRevealed,
    /// No player is bound to the pressed controller slot.
    #[error("no player bound to controller slot {0}")]
    PlayerNotFound(ControllerSlot),
    /// A referenced team does not exist.
    #[error("team `{0}` not found")]
    TeamNotFound(Uuid),
    /// The game or round is not in the phase required by the operation.
    #[error("phase mismatch: {0}")]
    PhaseMismatch(String),
    /// The player is not allowed to answer right now.
    #[error("not your turn")]
    NotYourTurn,
    /// The player already answered the current question.
    #[error("player already answered this question")]
    AlreadyAnswered,
    /// The pressed color does not map to any choice of the current question.
    #[error("question has no choice for the pressed color")]
    UnknownChoice,
    /// The buzz arbiter refused the press.
    #[error("buzz rejected: {0}")]
    BuzzRejected(BuzzRejection),
    /// The operation target is not acceptable (self-steal, passing to the holder...).
    #[error("invalid target: {0}")]
    InvalidTarget(String),
    /// No question or round is left to play.
    #[error("no remaining questions")]
    NoRemainingQuestions,
    /// Rejected round, team or player configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// A fixed capacity (teams, controller slots, colors, games) would be exceeded.
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),
}

impl From<PlanError> for EngineError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::AlreadyPending => {
                EngineError::PhaseMismatch("another transition is pending".into())
            }
            PlanError::InvalidTransition(invalid) => invalid.into(),
        }
    }
}

impl From<InvalidTransition> for EngineError {
    fn from(InvalidTransition { from, event }: InvalidTransition) -> Self {
        use GameEvent as E;
        match (from, event) {
            (
                GamePhase::Playing(PlayPhase::RoundActive(
                    QuestionStage::Revealed | QuestionStage::PointsShown,
                )),
                E::Reveal,
            ) => EngineError::AnswerAlreadyRevealed,
            (GamePhase::Playing(PlayPhase::RoundActive(QuestionStage::Waiting)), E::Reveal) => {
                EngineError::QuestionNotInProgress
            }
            (
                GamePhase::Playing(PlayPhase::Intermission),
                E::StartQuestion | E::Reveal | E::ShowPoints | E::EndRound,
            ) => EngineError::RoundNotActive,
            (
                GamePhase::Lobby | GamePhase::Setup | GamePhase::Paused { .. } | GamePhase::Finished,
                E::StartRound
                | E::StartQuestion
                | E::Reveal
                | E::ShowPoints
                | E::EndRound
                | E::RetryRound
                | E::Pause,
            ) => EngineError::GameNotPlaying(format!("{:?}", from.status()).to_lowercase()),
            (from, event) => {
                EngineError::PhaseMismatch(format!("cannot apply {event:?} while in {from:?}"))
            }
        }
    }
}

impl From<ApplyError> for EngineError {
    fn from(err: ApplyError) -> Self {
        EngineError::PhaseMismatch(format!("transition could not be applied: {err:?}"))
    }
}

impl From<AbortError> for EngineError {
    fn from(err: AbortError) -> Self {
        EngineError::PhaseMismatch(format!("transition could not be aborted: {err:?}"))
    }
}

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<EngineError> for ServiceError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::GameNotFound(_)
            | EngineError::TeamNotFound(_)
            | EngineError::PlayerNotFound(_) => ServiceError::NotFound(err.to_string()),
            EngineError::InvalidConfiguration(_)
            | EngineError::CapacityExceeded(_)
            | EngineError::InvalidTarget(_)
            | EngineError::UnknownChoice => ServiceError::InvalidInput(err.to_string()),
            EngineError::GameNotPlaying(_)
            | EngineError::RoundNotActive
            | EngineError::QuestionNotInProgress
            | EngineError::AnswerAlreadyRevealed
            | EngineError::PhaseMismatch(_)
            | EngineError::NotYourTurn
            | EngineError::AlreadyAnswered
            | EngineError::BuzzRejected(_)
            | EngineError::NoRemainingQuestions => ServiceError::InvalidState(err.to_string()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
