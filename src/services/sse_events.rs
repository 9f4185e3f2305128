use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dto::{common::GameStateView, game::GameSummary, sse::ServerEvent},
    services::engine::EngineEvent,
    state::SharedState,
};

const EVENT_GAME_SNAPSHOT: &str = "game.snapshot";
const EVENT_GAME_CREATED: &str = "game.created";
const EVENT_GAME_DELETED: &str = "game.deleted";
const EVENT_BUZZ_ACCEPTED: &str = "buzz.accepted";
const EVENT_QUESTION_STARTED: &str = "question.started";
const EVENT_ANSWER_RECEIVED: &str = "answer.received";
const EVENT_ANSWER_REVEALED: &str = "answer.revealed";
const EVENT_POINTS_SHOWN: &str = "points.shown";
const EVENT_ROUND_STARTED: &str = "round.started";
const EVENT_ROUND_RETRIED: &str = "round.retried";
const EVENT_ROUND_ENDED: &str = "round.ended";
const EVENT_LADDER_RUNG_CHANGED: &str = "ladder.rung_changed";
const EVENT_LADDER_BANKED: &str = "ladder.banked";
const EVENT_BOMB_TICK: &str = "bomb.tick";
const EVENT_BOMB_PASSED: &str = "bomb.passed";
const EVENT_BOMB_EXPLODED: &str = "bomb.exploded";
const EVENT_STEAL_PHASE_CHANGED: &str = "steal.phase_changed";
const EVENT_STEAL_EXECUTED: &str = "steal.executed";
const EVENT_TIMER_TICK: &str = "timer.tick";
const EVENT_TIMER_TIME_UP: &str = "timer.time_up";
const EVENT_GAME_PAUSED: &str = "game.paused";
const EVENT_GAME_RESUMED: &str = "game.resumed";
const EVENT_GAME_OVER: &str = "game.over";

/// Payload wrapper stamping every game event with its game id.
#[derive(Serialize)]
struct Scoped<'a, T: Serialize> {
    game_id: Uuid,
    #[serde(flatten)]
    payload: &'a T,
}

#[derive(Serialize)]
struct Flow {
    status: &'static str,
}

/// Who receives an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Audience {
    Everyone,
    AdminOnly,
}

/// SSE name and audience of an engine event.
fn route(event: &EngineEvent) -> (&'static str, Audience) {
    use Audience::*;
    match event {
        EngineEvent::BuzzAccepted(_) => (EVENT_BUZZ_ACCEPTED, Everyone),
        EngineEvent::QuestionStarted(_) => (EVENT_QUESTION_STARTED, Everyone),
        EngineEvent::AnswerReceived(_) => (EVENT_ANSWER_RECEIVED, AdminOnly),
        EngineEvent::AnswerRevealed(_) => (EVENT_ANSWER_REVEALED, Everyone),
        EngineEvent::PointsShown(_) => (EVENT_POINTS_SHOWN, Everyone),
        EngineEvent::RoundStarted(_) => (EVENT_ROUND_STARTED, Everyone),
        EngineEvent::RoundRetried(_) => (EVENT_ROUND_RETRIED, Everyone),
        EngineEvent::RoundEnded(_) => (EVENT_ROUND_ENDED, Everyone),
        EngineEvent::LadderRungChanged(_) => (EVENT_LADDER_RUNG_CHANGED, Everyone),
        EngineEvent::LadderBanked(_) => (EVENT_LADDER_BANKED, Everyone),
        EngineEvent::BombTick(_) => (EVENT_BOMB_TICK, Everyone),
        EngineEvent::BombPassed(_) => (EVENT_BOMB_PASSED, Everyone),
        EngineEvent::BombExploded(_) => (EVENT_BOMB_EXPLODED, Everyone),
        EngineEvent::StealPhaseChanged(_) => (EVENT_STEAL_PHASE_CHANGED, Everyone),
        EngineEvent::StealExecuted(_) => (EVENT_STEAL_EXECUTED, Everyone),
        EngineEvent::TimerTick(_) => (EVENT_TIMER_TICK, Everyone),
        EngineEvent::TimeUp(_) => (EVENT_TIMER_TIME_UP, Everyone),
        EngineEvent::GamePaused => (EVENT_GAME_PAUSED, Everyone),
        EngineEvent::GameResumed => (EVENT_GAME_RESUMED, Everyone),
        EngineEvent::GameOver(_) => (EVENT_GAME_OVER, Everyone),
    }
}

fn encode(game_id: Uuid, event: &EngineEvent) -> serde_json::Result<String> {
    fn scoped<T: Serialize>(game_id: Uuid, payload: &T) -> serde_json::Result<String> {
        serde_json::to_string(&Scoped { game_id, payload })
    }
    match event {
        EngineEvent::BuzzAccepted(payload) => scoped(game_id, payload),
        EngineEvent::QuestionStarted(payload) => scoped(game_id, payload),
        EngineEvent::AnswerReceived(payload) => scoped(game_id, payload),
        EngineEvent::AnswerRevealed(payload) => scoped(game_id, payload),
        EngineEvent::PointsShown(payload) => scoped(game_id, payload),
        EngineEvent::RoundStarted(payload) => scoped(game_id, payload),
        EngineEvent::RoundRetried(payload) => scoped(game_id, payload),
        EngineEvent::RoundEnded(payload) => scoped(game_id, payload),
        EngineEvent::LadderRungChanged(payload) => scoped(game_id, payload),
        EngineEvent::LadderBanked(payload) => scoped(game_id, payload),
        EngineEvent::BombTick(payload) => scoped(game_id, payload),
        EngineEvent::BombPassed(payload) => scoped(game_id, payload),
        EngineEvent::BombExploded(payload) => scoped(game_id, payload),
        EngineEvent::StealPhaseChanged(payload) => scoped(game_id, payload),
        EngineEvent::StealExecuted(payload) => scoped(game_id, payload),
        EngineEvent::TimerTick(payload) => scoped(game_id, payload),
        EngineEvent::TimeUp(payload) => scoped(game_id, payload),
        EngineEvent::GamePaused => scoped(game_id, &Flow { status: "paused" }),
        EngineEvent::GameResumed => scoped(game_id, &Flow { status: "resumed" }),
        EngineEvent::GameOver(payload) => scoped(game_id, payload),
    }
}

/// Publish the events produced by one engine operation, in order.
pub fn publish(state: &SharedState, game_id: Uuid, events: &[EngineEvent]) {
    for event in events {
        let (name, audience) = route(event);
        let data = match encode(game_id, event) {
            Ok(data) => data,
            Err(err) => {
                warn!(event = name, game_id = %game_id, error = %err, "failed to serialize SSE payload");
                continue;
            }
        };
        let event = ServerEvent {
            event: Some(name.to_string()),
            data,
            game_id: Some(game_id),
        };
        if audience == Audience::Everyone {
            state.public_sse().broadcast(event.clone());
        }
        state.admin_sse().broadcast(event);
    }
}

/// Broadcast the public snapshot of a game.
pub fn broadcast_snapshot(state: &SharedState, game_id: Uuid, view: &GameStateView) {
    send_game_event(state, game_id, EVENT_GAME_SNAPSHOT, view);
}

/// Broadcast that a game is now hosted.
pub fn broadcast_game_created(state: &SharedState, summary: &GameSummary) {
    send_game_event(state, summary.id, EVENT_GAME_CREATED, summary);
}

/// Broadcast that a game is no longer hosted.
pub fn broadcast_game_deleted(state: &SharedState, game_id: Uuid) {
    send_game_event(state, game_id, EVENT_GAME_DELETED, &Flow { status: "deleted" });
}

fn send_game_event(state: &SharedState, game_id: Uuid, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), &Scoped { game_id, payload }) {
        Ok(event) => {
            let event = event.for_game(game_id);
            state.public_sse().broadcast(event.clone());
            state.admin_sse().broadcast(event);
        }
        Err(err) => warn!(event, game_id = %game_id, error = %err, "failed to serialize SSE payload"),
    }
}
