use std::{collections::HashMap, ops::ControlFlow, time::Duration};

use dashmap::DashMap;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

/// Named timers a game can run; at most one of each kind per game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// Answer window of the question.
    Question,
    /// Fastest-finger answer turn.
    AnswerTurn,
    /// Steal-points answer window.
    StealAnswer,
    /// Hot-potato fuse.
    Bomb,
    /// Delay before the automatic reveal.
    AutoReveal,
    /// Delay before the scoreboard is shown.
    AutoShowPoints,
    /// Delay before the next question or round.
    AutoNext,
    /// Delay before the game ends on its own.
    AutoEndGame,
}

/// Work attached to a timer.
pub enum TimerTask {
    /// Run `action` once after `delay`.
    Once {
        /// Wait before firing.
        delay: Duration,
        /// Callback.
        action: Box<dyn FnOnce() + Send + 'static>,
    },
    /// Call `on_tick` every `period` until it breaks.
    Countdown {
        /// Tick interval.
        period: Duration,
        /// Callback; `Break` stops the countdown.
        on_tick: Box<dyn FnMut() -> ControlFlow<()> + Send + 'static>,
    },
}

struct GameTimers {
    generation: u64,
    handles: HashMap<TimerKind, JoinHandle<()>>,
}

impl GameTimers {
    fn abort_all(&mut self) -> usize {
        let count = self.handles.len();
        for (_, handle) in self.handles.drain() {
            handle.abort();
        }
        count
    }
}

/// Tokio-task timers keyed by `(game, kind)`.
///
/// Scheduling a kind aborts the previous timer of that kind. Every request
/// carries the game generation it was derived from; requests older than the
/// last accepted one are refused so a slow caller cannot replace newer timers.
#[derive(Default)]
pub struct TimerOrchestrator {
    games: DashMap<Uuid, GameTimers>,
}

impl TimerOrchestrator {
    /// Create an orchestrator without timers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule one timer, replacing any timer of the same kind.
    /// Returns false when `generation` is stale.
    pub fn schedule(&self, game_id: Uuid, generation: u64, kind: TimerKind, task: TimerTask) -> bool {
        let mut entry = self.games.entry(game_id).or_insert_with(|| GameTimers {
            generation,
            handles: HashMap::new(),
        });
        if generation < entry.generation {
            debug!(game_id = %game_id, ?kind, generation, "refusing stale timer");
            return false;
        }
        entry.generation = generation;
        if let Some(previous) = entry.handles.insert(kind, spawn(task)) {
            previous.abort();
        }
        true
    }

    /// Abort every timer of the game and start `tasks` instead.
    /// Returns false when `generation` is stale; existing timers are then kept.
    pub fn reschedule_all(
        &self,
        game_id: Uuid,
        generation: u64,
        tasks: Vec<(TimerKind, TimerTask)>,
    ) -> bool {
        let mut entry = self.games.entry(game_id).or_insert_with(|| GameTimers {
            generation,
            handles: HashMap::new(),
        });
        if generation < entry.generation {
            debug!(game_id = %game_id, generation, "refusing stale timer set");
            return false;
        }
        entry.generation = generation;
        entry.abort_all();
        for (kind, task) in tasks {
            if let Some(previous) = entry.handles.insert(kind, spawn(task)) {
                previous.abort();
            }
        }
        true
    }

    /// Abort one timer. Returns whether a live timer was aborted.
    pub fn cancel(&self, game_id: Uuid, kind: TimerKind) -> bool {
        self.games
            .get_mut(&game_id)
            .and_then(|mut entry| entry.handles.remove(&kind))
            .map(|handle| {
                let live = !handle.is_finished();
                handle.abort();
                live
            })
            .unwrap_or(false)
    }

    /// Abort every timer of a game and forget it.
    pub fn cancel_all(&self, game_id: Uuid) -> usize {
        self.games
            .remove(&game_id)
            .map(|(_, mut timers)| timers.abort_all())
            .unwrap_or(0)
    }

    /// Kinds with a timer still running.
    pub fn active_kinds(&self, game_id: Uuid) -> Vec<TimerKind> {
        self.games
            .get(&game_id)
            .map(|entry| {
                entry
                    .handles
                    .iter()
                    .filter(|(_, handle)| !handle.is_finished())
                    .map(|(kind, _)| *kind)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn spawn(task: TimerTask) -> JoinHandle<()> {
    match task {
        TimerTask::Once { delay, action } => tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action();
        }),
        TimerTask::Countdown {
            period,
            mut on_tick,
        } => tokio::spawn(async move {
            loop {
                tokio::time::sleep(period).await;
                if on_tick().is_break() {
                    break;
                }
            }
        }),
    }
}
