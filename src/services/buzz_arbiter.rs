use thiserror::Error;

use crate::{
    error::EngineError,
    state::{
        game::{BuzzRecord, ControllerSlot, GameInstance},
        rounds::{BuzzMode, BuzzerRef},
    },
};

/// Why a buzz did not enter the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BuzzRejection {
    /// The question is not taking buzzes right now.
    #[error("buzzing is closed")]
    NotAccepting,
    /// The player is already in the queue.
    #[error("player already buzzed")]
    AlreadyQueued,
    /// Someone else buzzed first.
    #[error("another player buzzed first")]
    NotFirst,
}

/// Result of a buzz that was not rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuzzDecision {
    /// The archetype has no use for buzzes.
    Ignored,
    /// The buzz was appended to the queue.
    Accepted(BuzzRecord),
}

/// Map a controller slot to its player.
pub fn resolve_controller(
    game: &GameInstance,
    slot: ControllerSlot,
) -> Result<BuzzerRef, EngineError> {
    game.player_by_slot(slot)
        .map(|(team_id, player)| BuzzerRef {
            player_id: player.id,
            team_id,
            slot,
        })
        .ok_or(EngineError::PlayerNotFound(slot))
}

/// Decide on a buzz and append it to the per-question queue when accepted.
///
/// `accepting` tells whether the archetype's current sub-phase is open for buzzes.
pub fn arbitrate(
    mode: BuzzMode,
    accepting: bool,
    queue: &mut Vec<BuzzRecord>,
    buzzer: BuzzerRef,
    timestamp_ms: u64,
) -> Result<BuzzDecision, BuzzRejection> {
    if mode == BuzzMode::Ignored {
        return Ok(BuzzDecision::Ignored);
    }
    if queue
        .iter()
        .any(|record| record.player_id == buzzer.player_id)
    {
        return Err(BuzzRejection::AlreadyQueued);
    }
    if mode == BuzzMode::FirstOnly && !queue.is_empty() {
        return Err(BuzzRejection::NotFirst);
    }
    if !accepting {
        return Err(BuzzRejection::NotAccepting);
    }

    let record = BuzzRecord {
        player_id: buzzer.player_id,
        team_id: buzzer.team_id,
        slot: buzzer.slot,
        timestamp_ms,
        was_first: queue.is_empty(),
    };
    queue.push(record.clone());
    Ok(BuzzDecision::Accepted(record))
}
