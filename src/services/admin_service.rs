//! Business logic powering the admin REST routes. Every helper funnels one
//! engine operation through [`game_service::mutate`], which serialises it
//! with presses and timer callbacks of the same game.

use uuid::Uuid;

use crate::{
    dto::{
        admin::{
            AddPlayerRequest, AddTeamRequest, IndexResponse, NextStepResponse,
            PlayerCreatedResponse, PressOutcomeResponse, SetRoundsRequest, SimulatedPressRequest,
            StandingsResponse, TeamCreatedResponse,
        },
        sse::{AnswerRevealedEvent, BombExplodedEvent, LadderBankedEvent, StealExecutedEvent},
    },
    error::ServiceError,
    services::{
        engine,
        game_service::{self, mutate},
    },
    state::{
        SharedState,
        game::{ControllerSlot, GameSettings, RoundResult, unix_millis},
    },
};

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

pub fn add_team(
    state: &SharedState,
    game_id: Uuid,
    request: AddTeamRequest,
) -> Result<TeamCreatedResponse, ServiceError> {
    let team_id = mutate(state, game_id, |game, _| {
        engine::add_team(game, &request.name, request.color)
    })?;
    Ok(TeamCreatedResponse { team_id })
}

pub fn remove_team(state: &SharedState, game_id: Uuid, team_id: Uuid) -> Result<(), ServiceError> {
    mutate(state, game_id, |game, _| engine::remove_team(game, team_id))
}

pub fn add_player(
    state: &SharedState,
    game_id: Uuid,
    team_id: Uuid,
    request: AddPlayerRequest,
) -> Result<PlayerCreatedResponse, ServiceError> {
    let slot = ControllerSlot::new(request.slot).ok_or_else(|| {
        ServiceError::InvalidInput(format!("controller slot {} is out of range", request.slot))
    })?;
    let player_id = mutate(state, game_id, |game, _| {
        engine::add_player(game, team_id, &request.name, slot)
    })?;
    Ok(PlayerCreatedResponse { player_id })
}

pub fn set_rounds(
    state: &SharedState,
    game_id: Uuid,
    request: SetRoundsRequest,
) -> Result<(), ServiceError> {
    let drafts = request.rounds.into_iter().map(Into::into).collect();
    mutate(state, game_id, |game, _| engine::set_rounds(game, drafts))
}

pub fn update_settings(
    state: &SharedState,
    game_id: Uuid,
    settings: GameSettings,
) -> Result<(), ServiceError> {
    mutate(state, game_id, |game, _| {
        engine::update_settings(game, settings)
    })
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

pub fn begin_setup(state: &SharedState, game_id: Uuid) -> Result<(), ServiceError> {
    mutate(state, game_id, |game, _| engine::begin_setup(game))
}

pub fn start_game(state: &SharedState, game_id: Uuid) -> Result<(), ServiceError> {
    mutate(state, game_id, |game, _| engine::start_game(game))
}

pub fn start_round(
    state: &SharedState,
    game_id: Uuid,
    round_index: Option<usize>,
) -> Result<IndexResponse, ServiceError> {
    let index = mutate(state, game_id, |game, events| {
        engine::start_round(game, round_index, &mut rand::rng(), events)
    })?;
    Ok(IndexResponse { index })
}

pub fn start_question(state: &SharedState, game_id: Uuid) -> Result<IndexResponse, ServiceError> {
    let index = mutate(state, game_id, |game, events| {
        engine::start_question(game, unix_millis(), events)
    })?;
    Ok(IndexResponse { index })
}

pub fn reveal(state: &SharedState, game_id: Uuid) -> Result<AnswerRevealedEvent, ServiceError> {
    mutate(state, game_id, engine::reveal)
}

pub fn show_points(state: &SharedState, game_id: Uuid) -> Result<StandingsResponse, ServiceError> {
    let standings = mutate(state, game_id, engine::show_points)?;
    Ok(StandingsResponse { standings })
}

pub fn next(state: &SharedState, game_id: Uuid) -> Result<NextStepResponse, ServiceError> {
    let step = mutate(state, game_id, |game, events| {
        engine::next(game, unix_millis(), &mut rand::rng(), events)
    })?;
    Ok(step.into())
}

pub fn end_round(state: &SharedState, game_id: Uuid) -> Result<RoundResult, ServiceError> {
    mutate(state, game_id, engine::end_round)
}

pub fn retry_round(state: &SharedState, game_id: Uuid) -> Result<IndexResponse, ServiceError> {
    let index = mutate(state, game_id, |game, events| {
        engine::retry_round(game, &mut rand::rng(), events)
    })?;
    Ok(IndexResponse { index })
}

pub fn pause(state: &SharedState, game_id: Uuid) -> Result<(), ServiceError> {
    mutate(state, game_id, engine::pause)
}

pub fn resume(state: &SharedState, game_id: Uuid) -> Result<(), ServiceError> {
    mutate(state, game_id, engine::resume)
}

pub fn end_game(state: &SharedState, game_id: Uuid) -> Result<StandingsResponse, ServiceError> {
    let standings = mutate(state, game_id, engine::end_game)?;
    Ok(StandingsResponse { standings })
}

// ---------------------------------------------------------------------------
// Archetype operations
// ---------------------------------------------------------------------------

pub fn bank(state: &SharedState, game_id: Uuid) -> Result<LadderBankedEvent, ServiceError> {
    mutate(state, game_id, engine::bank)
}

pub fn select_ladder_team(
    state: &SharedState,
    game_id: Uuid,
    team_id: Uuid,
) -> Result<(), ServiceError> {
    mutate(state, game_id, |game, events| {
        engine::select_ladder_team(game, team_id, events)
    })
}

pub fn pass(state: &SharedState, game_id: Uuid, player_id: Uuid) -> Result<(), ServiceError> {
    mutate(state, game_id, |game, events| {
        engine::pass(game, player_id, events)
    })
}

pub fn explode(state: &SharedState, game_id: Uuid) -> Result<BombExplodedEvent, ServiceError> {
    mutate(state, game_id, engine::explode)
}

pub fn begin_steal(state: &SharedState, game_id: Uuid) -> Result<(), ServiceError> {
    mutate(state, game_id, engine::begin_steal)
}

pub fn steal(
    state: &SharedState,
    game_id: Uuid,
    target_team_id: Uuid,
) -> Result<StealExecutedEvent, ServiceError> {
    mutate(state, game_id, |game, events| {
        engine::steal(game, target_team_id, events)
    })
}

/// Inject a press from the admin console, as if it came from the controller hub.
pub fn simulate_press(
    state: &SharedState,
    game_id: Uuid,
    request: SimulatedPressRequest,
) -> Result<PressOutcomeResponse, ServiceError> {
    let outcome = game_service::submit_press(
        state,
        game_id,
        request.slot,
        request.button,
        request.action,
        request.timestamp_ms,
    )?;
    Ok(outcome.into())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::AppConfig,
        dto::{admin::RoundInput, game::CreateGameRequest},
        services::engine::{Button, PressAction},
        state::{
            AppState,
            game::{Choice, ChoiceColor, Question, TeamColor},
            rounds::{RoundConfig, RoundKind},
        },
    };

    fn setup() -> (SharedState, Uuid) {
        let state = AppState::new(AppConfig::default());
        let game_id = game_service::create_game(
            &state,
            CreateGameRequest {
                name: "Ladder night".into(),
                settings: None,
            },
        )
        .unwrap()
        .id;
        (state, game_id)
    }

    fn ladder_round() -> RoundInput {
        RoundInput {
            config: RoundConfig {
                title: "Ladder".into(),
                kind: RoundKind::Ladder {
                    rungs: vec![100, 200, 400],
                },
                question_time: Duration::from_secs(15),
            },
            questions: vec![Question {
                prompt: "Smallest prime?".into(),
                choices: vec![
                    Choice {
                        text: "2".into(),
                        color: ChoiceColor::Blue,
                        correct: true,
                    },
                    Choice {
                        text: "1".into(),
                        color: ChoiceColor::Green,
                        correct: false,
                    },
                ],
                media_url: None,
            }],
        }
    }

    #[tokio::test]
    async fn setup_then_play_a_ladder_round() {
        let (state, game_id) = setup();
        let team = add_team(
            &state,
            game_id,
            AddTeamRequest {
                name: "Owls".into(),
                color: Some(TeamColor::Yellow),
            },
        )
        .unwrap()
        .team_id;
        add_player(
            &state,
            game_id,
            team,
            AddPlayerRequest {
                name: "Ada".into(),
                slot: 1,
            },
        )
        .unwrap();
        set_rounds(
            &state,
            game_id,
            SetRoundsRequest {
                rounds: vec![ladder_round()],
            },
        )
        .unwrap();
        begin_setup(&state, game_id).unwrap();
        start_game(&state, game_id).unwrap();

        assert_eq!(start_round(&state, game_id, None).unwrap().index, 0);
        assert!(matches!(
            start_round(&state, game_id, None),
            Err(ServiceError::InvalidState(_))
        ));
        assert_eq!(start_question(&state, game_id).unwrap().index, 0);
        let released = simulate_press(
            &state,
            game_id,
            SimulatedPressRequest {
                slot: 1,
                button: Button::Blue,
                action: PressAction::Release,
                timestamp_ms: None,
            },
        )
        .unwrap();
        assert_eq!(
            released,
            PressOutcomeResponse::Ignored {
                reason: "release".into()
            }
        );
        assert!(matches!(
            bank(&state, game_id),
            Err(ServiceError::InvalidState(_))
        ));
        pause(&state, game_id).unwrap();
        resume(&state, game_id).unwrap();
        let standings = end_game(&state, game_id).unwrap().standings;
        assert_eq!(standings.len(), 1);
    }

    #[tokio::test]
    async fn setup_errors_map_to_client_errors() {
        let (state, game_id) = setup();
        let team = add_team(
            &state,
            game_id,
            AddTeamRequest {
                name: "Owls".into(),
                color: Some(TeamColor::Red),
            },
        )
        .unwrap()
        .team_id;

        let duplicate = add_team(
            &state,
            game_id,
            AddTeamRequest {
                name: "Cats".into(),
                color: Some(TeamColor::Red),
            },
        );
        assert!(matches!(duplicate, Err(ServiceError::InvalidInput(_))));

        let out_of_range = add_player(
            &state,
            game_id,
            team,
            AddPlayerRequest {
                name: "Ada".into(),
                slot: 9,
            },
        );
        assert!(matches!(out_of_range, Err(ServiceError::InvalidInput(_))));

        assert!(matches!(
            remove_team(&state, game_id, Uuid::new_v4()),
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            start_game(&state, game_id),
            Err(ServiceError::InvalidInput(_))
        ));
    }
}
