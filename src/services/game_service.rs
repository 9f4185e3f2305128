//! Façade serialising every mutation of a hosted game.
//!
//! Operations run under the registry entry of their game. When one moves the
//! generation forward the façade re-derives the timers, broadcasts the public
//! snapshot and persists the game in the background.

use std::collections::HashSet;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::GameEntity,
    dto::{
        common::GameStateView,
        game::{CreateGameRequest, GameListItem, GameSummary, StoredGameItem},
    },
    error::{EngineError, ServiceError},
    services::{
        auto_advance::{self, TimerPlan},
        engine::{self, Button, EngineEvent, Press, PressAction, PressOutcome},
        sse_events, websocket_service,
    },
    state::{
        SharedState,
        game::{ControllerSlot, GameInstance, unix_millis},
    },
};

/// Work left once the game lock is released.
struct Committed {
    generation: u64,
    plans: Vec<TimerPlan>,
    view: GameStateView,
    entity: GameEntity,
    ticket: u64,
}

fn run_op<T>(
    state: &SharedState,
    game_id: Uuid,
    expected_generation: Option<u64>,
    op: impl FnOnce(&mut GameInstance, &mut Vec<EngineEvent>) -> Result<T, EngineError>,
) -> Result<Option<T>, EngineError> {
    let outcome = state.registry().with_game_mut(game_id, |game| {
        if expected_generation.is_some_and(|expected| expected != game.generation()) {
            return Ok::<_, EngineError>(None);
        }
        let before = game.generation();
        let mut events = Vec::new();
        let value = op(game, &mut events)?;
        sse_events::publish(state, game_id, &events);

        let committed = (game.generation() != before).then(|| {
            game.touch();
            let view = GameStateView::from(&*game);
            sse_events::broadcast_snapshot(state, game_id, &view);
            Committed {
                generation: game.generation(),
                plans: auto_advance::required_timers(game),
                view,
                entity: GameEntity::from(&*game),
                ticket: state.next_persist_ticket(),
            }
        });
        Ok(Some((value, committed)))
    })??;

    let Some((value, committed)) = outcome else {
        return Ok(None);
    };
    if let Some(committed) = committed {
        debug!(
            game_id = %game_id,
            generation = committed.generation,
            phase = ?committed.view.phase,
            timers = committed.plans.len(),
            "game state committed"
        );
        let tasks =
            auto_advance::build_tasks(state, game_id, committed.generation, committed.plans);
        state
            .timers()
            .reschedule_all(game_id, committed.generation, tasks);
        persist(state, committed.entity, committed.ticket);
    }
    Ok(Some(value))
}

/// Run an engine operation against a hosted game.
pub fn mutate<T>(
    state: &SharedState,
    game_id: Uuid,
    op: impl FnOnce(&mut GameInstance, &mut Vec<EngineEvent>) -> Result<T, EngineError>,
) -> Result<T, ServiceError> {
    match run_op(state, game_id, None, op) {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Err(ServiceError::InvalidState(
            "game changed while the operation ran".into(),
        )),
        Err(err) => {
            debug!(game_id = %game_id, error = %err, "engine operation refused");
            Err(err.into())
        }
    }
}

/// Run a timer callback, unless the game moved past `generation` since the timer was armed.
pub(crate) fn apply_timed<T>(
    state: &SharedState,
    game_id: Uuid,
    generation: u64,
    op: impl FnOnce(&mut GameInstance, &mut Vec<EngineEvent>) -> Result<T, EngineError>,
) -> Option<T> {
    match run_op(state, game_id, Some(generation), op) {
        Ok(Some(value)) => Some(value),
        Ok(None) => {
            debug!(game_id = %game_id, generation, "stale timer callback ignored");
            None
        }
        Err(err) => {
            debug!(game_id = %game_id, generation, error = %err, "timer callback refused");
            None
        }
    }
}

/// Save a snapshot in the background; older snapshots never overwrite newer ones.
fn persist(state: &SharedState, entity: GameEntity, ticket: u64) {
    let state = state.clone();
    tokio::spawn(async move {
        let Some(store) = state.game_store().await else {
            debug!(game_id = %entity.id, "no storage backend; snapshot kept in memory only");
            return;
        };
        let guard = state.persist_guard(entity.id);
        let mut last_saved = guard.lock().await;
        if *last_saved >= ticket {
            debug!(game_id = %entity.id, ticket, "newer snapshot already saved");
            return;
        }
        if !state.registry().contains(entity.id) {
            debug!(game_id = %entity.id, "game no longer hosted; snapshot dropped");
            return;
        }
        let game_id = entity.id;
        match store.save_game(entity).await {
            Ok(()) => *last_saved = ticket,
            Err(err) => warn!(game_id = %game_id, error = %err, "failed to persist game"),
        }
    });
}

/// Feed one controller event to the engine.
pub fn submit_press(
    state: &SharedState,
    game_id: Uuid,
    slot: u8,
    button: Button,
    action: PressAction,
    timestamp_ms: Option<u64>,
) -> Result<PressOutcome, ServiceError> {
    let slot = ControllerSlot::new(slot).ok_or_else(|| {
        ServiceError::InvalidInput(format!("controller slot {slot} is out of range"))
    })?;
    let press = Press {
        slot,
        button,
        action,
        timestamp_ms: timestamp_ms.unwrap_or_else(unix_millis),
    };
    mutate(state, game_id, |game, events| {
        engine::handle_press(game, press, events)
    })
}

fn register(state: &SharedState, game: GameInstance) -> Result<GameSummary, ServiceError> {
    let summary = GameSummary::from(&game);
    let view = GameStateView::from(&game);
    let entity = GameEntity::from(&game);
    let game_id = game.id;

    state.timers().cancel_all(game_id);
    state.registry().insert(game)?;
    let ticket = state.next_persist_ticket();

    sse_events::broadcast_game_created(state, &summary);
    sse_events::broadcast_snapshot(state, game_id, &view);
    persist(state, entity, ticket);
    Ok(summary)
}

/// Create and host a new game.
pub fn create_game(
    state: &SharedState,
    request: CreateGameRequest,
) -> Result<GameSummary, ServiceError> {
    let settings = request
        .settings
        .unwrap_or_else(|| state.config().default_settings().clone());
    let game = GameInstance::new(request.name.trim().to_owned(), settings);
    let summary = register(state, game)?;
    info!(game_id = %summary.id, name = %summary.name, "game created");
    Ok(summary)
}

/// Stop hosting a game, cancel its timers and drop it from storage.
pub async fn delete_game(state: &SharedState, game_id: Uuid) -> Result<(), ServiceError> {
    let hosted = state.registry().remove(game_id).is_ok();
    let cancelled = state.timers().cancel_all(game_id);
    state.forget_persisted(game_id);

    let stored = match state.game_store().await {
        Some(store) => store.delete_game(game_id).await?,
        None => false,
    };
    if !hosted && !stored {
        return Err(EngineError::GameNotFound(game_id).into());
    }

    let hubs = websocket_service::disconnect_game(state, game_id);
    info!(game_id = %game_id, hosted, stored, cancelled, hubs, "game deleted");
    sse_events::broadcast_game_deleted(state, game_id);
    Ok(())
}

/// Games hosted in memory, oldest first.
pub fn list_games(state: &SharedState) -> Vec<GameListItem> {
    state
        .registry()
        .list()
        .into_iter()
        .map(GameListItem::from)
        .collect()
}

/// Summary of a hosted game.
pub fn game_summary(state: &SharedState, game_id: Uuid) -> Result<GameSummary, ServiceError> {
    Ok(state.registry().read(game_id, |game| GameSummary::from(game))?)
}

/// Public snapshot of a hosted game.
pub fn game_state(state: &SharedState, game_id: Uuid) -> Result<GameStateView, ServiceError> {
    Ok(state.registry().read(game_id, |game| GameStateView::from(game))?)
}

/// Full snapshot of a hosted game, answers included.
pub fn export_snapshot(state: &SharedState, game_id: Uuid) -> Result<GameEntity, ServiceError> {
    Ok(state.registry().read(game_id, |game| GameEntity::from(game))?)
}

/// Host a game from a snapshot, replacing the hosted copy when `replace` is set.
///
/// Games saved while playing come back paused; see [`GameEntity::into_instance`].
pub fn import_snapshot(
    state: &SharedState,
    entity: GameEntity,
    replace: bool,
) -> Result<GameSummary, ServiceError> {
    let game = entity.into_instance(&mut rand::rng())?;
    let game_id = game.id;
    if state.registry().contains(game_id) {
        if !replace {
            return Err(ServiceError::InvalidState(format!(
                "game `{game_id}` is already hosted"
            )));
        }
        state.registry().remove(game_id)?;
        state.timers().cancel_all(game_id);
    }
    let summary = register(state, game)?;
    info!(game_id = %game_id, status = ?summary.status, "game imported");
    Ok(summary)
}

/// Host a game from the storage backend.
pub async fn load_game(state: &SharedState, game_id: Uuid) -> Result<GameSummary, ServiceError> {
    if state.registry().contains(game_id) {
        return game_summary(state, game_id);
    }
    let store = state.game_store().await.ok_or(ServiceError::Degraded)?;
    let Some(entity) = store.find_game(game_id).await? else {
        return Err(ServiceError::NotFound(format!("game `{game_id}` not found")));
    };
    import_snapshot(state, entity, false)
}

/// Games known to the storage backend, most recently updated first.
pub async fn list_stored_games(state: &SharedState) -> Result<Vec<StoredGameItem>, ServiceError> {
    let store = state.game_store().await.ok_or(ServiceError::Degraded)?;
    let hosted: HashSet<Uuid> = state
        .registry()
        .list()
        .into_iter()
        .map(|listing| listing.id)
        .collect();
    Ok(store
        .list_games()
        .await?
        .into_iter()
        .map(|entity| {
            let loaded = hosted.contains(&entity.id);
            StoredGameItem::new(entity, loaded)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::game_store::{GameStore, memory::MemoryStore},
        services::{engine::RoundDraft, timers::TimerKind},
        state::{
            AppState,
            game::{Choice, ChoiceColor, GameSettings, Question},
            rounds::{RoundConfig, RoundKind},
            state_machine::{GamePhase, GameStatus, PlayPhase, QuestionStage},
        },
    };

    fn question() -> Question {
        Question {
            prompt: "Largest planet?".into(),
            choices: [ChoiceColor::Blue, ChoiceColor::Orange]
                .into_iter()
                .map(|color| Choice {
                    text: format!("{color:?}"),
                    color,
                    correct: color == ChoiceColor::Blue,
                })
                .collect(),
            media_url: None,
        }
    }

    fn request(settings: GameSettings) -> CreateGameRequest {
        CreateGameRequest {
            name: " Quiz night ".into(),
            settings: Some(settings),
        }
    }

    fn ready_game(state: &SharedState, settings: GameSettings) -> Uuid {
        let game_id = create_game(state, request(settings)).unwrap().id;
        mutate(state, game_id, |game, _| {
            let owls = engine::add_team(game, "Owls", None)?;
            engine::add_player(game, owls, "Ada", ControllerSlot::new(1).unwrap())?;
            let cats = engine::add_team(game, "Cats", None)?;
            engine::add_player(game, cats, "Bob", ControllerSlot::new(2).unwrap())?;
            engine::set_rounds(
                game,
                vec![RoundDraft {
                    config: RoundConfig {
                        title: "Warm-up".into(),
                        kind: RoundKind::MultipleChoice {
                            correct_points: 100,
                            wrong_points: 0,
                            speed_bonus: None,
                        },
                        question_time: Duration::from_secs(10),
                    },
                    questions: vec![question()],
                }],
            )?;
            engine::begin_setup(game)?;
            engine::start_game(game)
        })
        .unwrap();
        game_id
    }

    fn press(state: &SharedState, game_id: Uuid, slot: u8, button: Button) {
        submit_press(state, game_id, slot, button, PressAction::Press, None).unwrap();
    }

    fn phase(state: &SharedState, game_id: Uuid) -> GamePhase {
        state.registry().read(game_id, GameInstance::phase).unwrap()
    }

    fn auto_settings() -> GameSettings {
        GameSettings {
            auto_reveal: true,
            reveal_delay: Duration::from_millis(500),
            auto_show_points: true,
            show_points_delay: Duration::from_millis(500),
            auto_next: true,
            next_delay: Duration::from_millis(500),
            auto_end_game: true,
        }
    }

    #[tokio::test]
    async fn failed_operations_leave_the_game_untouched() {
        let state = AppState::new(AppConfig::default());
        let game_id = create_game(&state, request(GameSettings::default())).unwrap().id;
        let before = state.registry().read(game_id, GameInstance::generation).unwrap();

        let err = mutate(&state, game_id, |game, events| engine::reveal(game, events));
        assert!(matches!(err, Err(ServiceError::InvalidState(_))));
        assert_eq!(
            state.registry().read(game_id, GameInstance::generation).unwrap(),
            before
        );

        let missing = mutate(&state, Uuid::new_v4(), |game, _| engine::begin_setup(game));
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn stale_timer_callbacks_do_nothing() {
        let state = AppState::new(AppConfig::default());
        let game_id = create_game(&state, request(GameSettings::default())).unwrap().id;
        let generation = state.registry().read(game_id, GameInstance::generation).unwrap();
        mutate(&state, game_id, |game, _| engine::begin_setup(game)).unwrap();

        let ran = apply_timed(&state, game_id, generation, |game, _| engine::start_game(game));
        assert!(ran.is_none());
        assert_eq!(phase(&state, game_id), GamePhase::Setup);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_advance_chains_to_the_end_of_the_game() {
        let state = AppState::new(AppConfig::default());
        let game_id = ready_game(&state, auto_settings());
        let mut public = state.public_sse().subscribe();

        mutate(&state, game_id, |game, events| {
            engine::next(game, unix_millis(), &mut rand::rng(), events)
        })
        .unwrap();
        assert_eq!(
            state.timers().active_kinds(game_id),
            vec![TimerKind::Question]
        );

        press(&state, game_id, 1, Button::Blue);
        press(&state, game_id, 2, Button::Orange);
        assert_eq!(
            state.timers().active_kinds(game_id),
            vec![TimerKind::AutoReveal]
        );

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(
            phase(&state, game_id),
            GamePhase::Playing(PlayPhase::RoundActive(QuestionStage::Revealed))
        );

        tokio::time::sleep(Duration::from_millis(1_200)).await;
        assert_eq!(phase(&state, game_id), GamePhase::Finished);
        assert!(state.timers().active_kinds(game_id).is_empty());

        let scores = state
            .registry()
            .read(game_id, |game| game.scores().into_values().collect::<Vec<_>>())
            .unwrap();
        assert_eq!(scores, vec![100, 0]);

        let mut names = Vec::new();
        while let Ok(event) = public.try_recv() {
            names.extend(event.event);
        }
        assert!(names.iter().any(|name| name == "answer.revealed"));
        assert!(names.iter().any(|name| name == "game.over"));
        assert!(!names.iter().any(|name| name == "answer.received"));
    }

    #[tokio::test(start_paused = true)]
    async fn pausing_cancels_the_countdown() {
        let state = AppState::new(AppConfig::default());
        let game_id = ready_game(&state, GameSettings::default());
        mutate(&state, game_id, |game, events| {
            engine::next(game, unix_millis(), &mut rand::rng(), events)
        })
        .unwrap();
        tokio::time::sleep(Duration::from_millis(2_500)).await;

        mutate(&state, game_id, engine::pause).unwrap();
        assert!(state.timers().active_kinds(game_id).is_empty());
        let remaining = state
            .registry()
            .read(game_id, |game| game.question.as_ref().map(|q| q.remaining_secs))
            .unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        let after = state
            .registry()
            .read(game_id, |game| game.question.as_ref().map(|q| q.remaining_secs))
            .unwrap();
        assert_eq!(remaining, after);
    }

    #[tokio::test]
    async fn import_replaces_and_comes_back_paused() {
        let state = AppState::new(AppConfig::default());
        let game_id = ready_game(&state, GameSettings::default());
        mutate(&state, game_id, |game, events| {
            engine::next(game, unix_millis(), &mut rand::rng(), events)
        })
        .unwrap();
        let snapshot = export_snapshot(&state, game_id).unwrap();
        assert_eq!(snapshot.status, GameStatus::Playing);

        assert!(matches!(
            import_snapshot(&state, snapshot.clone(), false),
            Err(ServiceError::InvalidState(_))
        ));
        let summary = import_snapshot(&state, snapshot, true).unwrap();
        assert_eq!(summary.status, GameStatus::Paused);
        assert!(state.timers().active_kinds(game_id).is_empty());
    }

    #[tokio::test]
    async fn mutations_are_persisted_and_deleted() {
        let state = AppState::new(AppConfig::default());
        let store = MemoryStore::default();
        state.set_game_store(Arc::new(store.clone())).await;

        let game_id = ready_game(&state, GameSettings::default());
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        let latest = store.find_game(game_id).await.unwrap().unwrap();
        assert_eq!(latest.teams.len(), 2);
        assert_eq!(latest.status, GameStatus::Playing);

        delete_game(&state, game_id).await.unwrap();
        assert!(store.find_game(game_id).await.unwrap().is_none());
        assert!(!state.registry().contains(game_id));
        assert!(matches!(
            delete_game(&state, game_id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn degraded_mode_refuses_storage_reads() {
        let state = AppState::new(AppConfig::default());
        assert!(matches!(
            list_stored_games(&state).await,
            Err(ServiceError::Degraded)
        ));
        assert!(matches!(
            load_game(&state, Uuid::new_v4()).await,
            Err(ServiceError::Degraded)
        ));
    }
}
