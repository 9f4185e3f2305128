use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::EngineError,
    state::{
        game::{
            ControllerSlot, GameInstance, GameSettings, Player, Question, Round, RoundResult,
            RoundStatus, Team, TeamColor,
        },
        rounds::{RoundConfig, RoundRuntime},
        state_machine::{GamePhase, GameStateMachine, GameStatus, PlayPhase, QuestionStage},
    },
};

/// Player bound to a controller slot, as persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct PlayerEntity {
    /// Stable identifier for the player.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Controller slot (1 to 4).
    #[schema(value_type = u8)]
    pub slot: ControllerSlot,
}

/// Representation of a team stored in persistence and shared across layers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct TeamEntity {
    /// Stable identifier for the team.
    pub id: Uuid,
    /// Display name chosen for the team.
    pub name: String,
    /// Color owned by the team.
    pub color: TeamColor,
    /// Committed score.
    pub score: u32,
    /// Members in join order.
    pub players: Vec<PlayerEntity>,
}

/// Round configuration, questions and progress.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct RoundEntity {
    /// Archetype and tuning.
    pub config: RoundConfig,
    /// Questions in play order.
    pub questions: Vec<Question>,
    /// Cursor, `-1` before the first question.
    pub current_question_index: i32,
    /// Progress marker.
    pub status: RoundStatus,
    /// Scores captured when the round started.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub score_snapshot: IndexMap<Uuid, u32>,
}

/// Aggregate game entity persisted by the storage layer and used for export/import.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct GameEntity {
    /// Primary key of the game.
    pub id: Uuid,
    /// Display name of the game.
    pub name: String,
    /// Creation time in milliseconds since the epoch.
    pub created_at_ms: u64,
    /// Last mutation time in milliseconds since the epoch.
    pub updated_at_ms: u64,
    /// Status when the snapshot was taken.
    pub status: GameStatus,
    /// Participating teams and their current scores.
    pub teams: Vec<TeamEntity>,
    /// Configured rounds.
    pub rounds: Vec<RoundEntity>,
    /// Round currently or last played.
    #[serde(default)]
    pub active_round: Option<usize>,
    /// Results of completed rounds.
    #[serde(default)]
    pub round_results: Vec<RoundResult>,
    /// Auto-advance preferences.
    #[serde(default)]
    pub settings: GameSettings,
}

/// Aggregate game list item entity (subset of GameEntity) persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameListItemEntity {
    /// Primary key of the game.
    pub id: Uuid,
    /// Display name of the game.
    pub name: String,
    /// Status when last saved.
    pub status: GameStatus,
    /// Creation time in milliseconds since the epoch.
    pub created_at_ms: u64,
    /// Last mutation time in milliseconds since the epoch.
    pub updated_at_ms: u64,
}

impl From<&GameEntity> for GameListItemEntity {
    fn from(game: &GameEntity) -> Self {
        Self {
            id: game.id,
            name: game.name.clone(),
            status: game.status,
            created_at_ms: game.created_at_ms,
            updated_at_ms: game.updated_at_ms,
        }
    }
}

impl From<&GameInstance> for GameEntity {
    fn from(game: &GameInstance) -> Self {
        Self {
            id: game.id,
            name: game.name.clone(),
            created_at_ms: game.created_at_ms,
            updated_at_ms: game.updated_at_ms,
            status: game.status(),
            teams: game
                .teams
                .iter()
                .map(|(id, team)| TeamEntity {
                    id: *id,
                    name: team.name.clone(),
                    color: team.color,
                    score: team.score,
                    players: team
                        .players
                        .iter()
                        .map(|player| PlayerEntity {
                            id: player.id,
                            name: player.name.clone(),
                            slot: player.slot,
                        })
                        .collect(),
                })
                .collect(),
            rounds: game
                .rounds
                .iter()
                .map(|round| RoundEntity {
                    config: round.config.clone(),
                    questions: round.questions.clone(),
                    current_question_index: round.current_question_index,
                    status: round.status,
                    score_snapshot: round.score_snapshot.clone(),
                })
                .collect(),
            active_round: game.active_round,
            round_results: game.round_results.clone(),
            settings: game.settings.clone(),
        }
    }
}

impl GameEntity {
    /// Rebuild a live game from a snapshot.
    ///
    /// Live question state is not part of a snapshot: a game saved while playing comes back
    /// paused, either between rounds or waiting for the next question of its active round.
    /// Out-of-range question cursors are clamped back to `-1`.
    pub fn into_instance<R: Rng + ?Sized>(self, rng: &mut R) -> Result<GameInstance, EngineError> {
        let mut teams = IndexMap::with_capacity(self.teams.len());
        let mut colors = Vec::with_capacity(self.teams.len());
        let mut slots = Vec::new();
        for team in self.teams {
            if colors.contains(&team.color) {
                return Err(EngineError::InvalidConfiguration(format!(
                    "team color {:?} is used twice",
                    team.color
                )));
            }
            colors.push(team.color);
            let mut players = Vec::with_capacity(team.players.len());
            for player in team.players {
                if slots.contains(&player.slot) {
                    return Err(EngineError::InvalidConfiguration(format!(
                        "controller slot {} is bound twice",
                        player.slot
                    )));
                }
                slots.push(player.slot);
                players.push(Player {
                    id: player.id,
                    name: player.name,
                    slot: player.slot,
                });
            }
            teams.insert(
                team.id,
                Team {
                    name: team.name,
                    color: team.color,
                    players,
                    score: team.score,
                },
            );
        }
        if teams.len() > crate::state::game::MAX_TEAMS {
            return Err(EngineError::CapacityExceeded(format!(
                "snapshot holds {} teams",
                teams.len()
            )));
        }

        let mut rounds = Vec::with_capacity(self.rounds.len());
        for (index, entity) in self.rounds.into_iter().enumerate() {
            entity.config.validate().map_err(|reason| {
                EngineError::InvalidConfiguration(format!("round {index}: {reason}"))
            })?;
            if entity.questions.is_empty() {
                return Err(EngineError::InvalidConfiguration(format!(
                    "round {index} has no question"
                )));
            }
            for question in &entity.questions {
                entity.config.validate_question(question).map_err(|reason| {
                    EngineError::InvalidConfiguration(format!("round {index}: {reason}"))
                })?;
            }
            let mut round = Round {
                config: entity.config,
                questions: entity.questions,
                current_question_index: entity.current_question_index,
                status: entity.status,
                score_snapshot: entity.score_snapshot,
            };
            if round.sanitize_cursor() {
                warn!(
                    game_id = %self.id,
                    round = index,
                    cursor = entity.current_question_index,
                    "clamped out-of-range question cursor"
                );
            }
            rounds.push(round);
        }

        let active_round = self.active_round.filter(|index| *index < rounds.len());
        let round_is_active = active_round
            .and_then(|index| rounds.get(index))
            .is_some_and(|round| round.status == RoundStatus::Active);
        let play = if round_is_active {
            PlayPhase::RoundActive(QuestionStage::Waiting)
        } else {
            PlayPhase::Intermission
        };
        let phase = match self.status {
            GameStatus::Lobby => GamePhase::Lobby,
            GameStatus::Setup => GamePhase::Setup,
            GameStatus::Playing | GameStatus::Paused => GamePhase::Paused { resume: play },
            GameStatus::Finished => GamePhase::Finished,
        };

        let mut game = GameInstance {
            id: self.id,
            name: self.name,
            created_at_ms: self.created_at_ms,
            updated_at_ms: self.updated_at_ms,
            machine: GameStateMachine::restore(phase),
            rounds,
            active_round,
            teams,
            settings: self.settings,
            round_results: self.round_results,
            question: None,
            runtime: RoundRuntime::Idle,
        };
        if round_is_active
            && let Some(round) = game.active_round()
        {
            game.runtime = round
                .config
                .kind
                .initial_runtime(&game.roster(), rng)
                .unwrap_or(RoundRuntime::Standard);
        }
        Ok(game)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::state::{
        game::{Choice, ChoiceColor},
        rounds::RoundKind,
    };

    fn snapshot(cursor: i32, status: GameStatus) -> GameEntity {
        let team_id = Uuid::new_v4();
        GameEntity {
            id: Uuid::new_v4(),
            name: "Friday quiz".into(),
            created_at_ms: 1,
            updated_at_ms: 2,
            status,
            teams: vec![TeamEntity {
                id: team_id,
                name: "Owls".into(),
                color: TeamColor::Green,
                score: 300,
                players: vec![PlayerEntity {
                    id: Uuid::new_v4(),
                    name: "Ada".into(),
                    slot: ControllerSlot::new(3).unwrap(),
                }],
            }],
            rounds: vec![RoundEntity {
                config: RoundConfig {
                    title: "Ladder".into(),
                    kind: RoundKind::Ladder {
                        rungs: vec![100, 200],
                    },
                    question_time: Duration::from_secs(15),
                },
                questions: vec![Question {
                    prompt: "2 + 2?".into(),
                    choices: vec![
                        Choice {
                            text: "4".into(),
                            color: ChoiceColor::Blue,
                            correct: true,
                        },
                        Choice {
                            text: "5".into(),
                            color: ChoiceColor::Orange,
                            correct: false,
                        },
                    ],
                    media_url: None,
                }],
                current_question_index: cursor,
                status: RoundStatus::Active,
                score_snapshot: IndexMap::from([(team_id, 100)]),
            }],
            active_round: Some(0),
            round_results: Vec::new(),
            settings: GameSettings::default(),
        }
    }

    #[test]
    fn import_clamps_corrupted_cursor() {
        let mut rng = StdRng::seed_from_u64(3);
        let game = snapshot(9, GameStatus::Setup).into_instance(&mut rng).unwrap();
        assert_eq!(game.rounds[0].current_question_index, -1);

        let game = snapshot(-7, GameStatus::Setup).into_instance(&mut rng).unwrap();
        assert_eq!(game.rounds[0].current_question_index, -1);

        let game = snapshot(0, GameStatus::Setup).into_instance(&mut rng).unwrap();
        assert_eq!(game.rounds[0].current_question_index, 0);
    }

    #[test]
    fn playing_snapshot_comes_back_paused_in_its_round() {
        let mut rng = StdRng::seed_from_u64(3);
        let game = snapshot(0, GameStatus::Playing)
            .into_instance(&mut rng)
            .unwrap();
        assert_eq!(
            game.phase(),
            GamePhase::Paused {
                resume: PlayPhase::RoundActive(QuestionStage::Waiting)
            }
        );
        assert!(matches!(game.runtime, RoundRuntime::Ladder(_)));
    }

    #[test]
    fn export_then_import_keeps_scores_and_players() {
        let mut rng = StdRng::seed_from_u64(3);
        let entity = snapshot(0, GameStatus::Setup);
        let game = entity.clone().into_instance(&mut rng).unwrap();
        let exported = GameEntity::from(&game);
        assert_eq!(exported.teams, entity.teams);
        assert_eq!(exported.rounds, entity.rounds);
        assert_eq!(exported.status, GameStatus::Setup);
    }

    #[test]
    fn questions_are_validated_on_import() {
        let mut rng = StdRng::seed_from_u64(3);

        let mut two_correct = snapshot(0, GameStatus::Setup);
        two_correct.rounds[0].questions[0].choices[1].correct = true;
        assert!(matches!(
            two_correct.into_instance(&mut rng),
            Err(EngineError::InvalidConfiguration(_))
        ));

        let mut none_correct = snapshot(0, GameStatus::Setup);
        none_correct.rounds[0].questions[0].choices[0].correct = false;
        assert!(matches!(
            none_correct.into_instance(&mut rng),
            Err(EngineError::InvalidConfiguration(_))
        ));

        let mut empty = snapshot(-1, GameStatus::Setup);
        empty.rounds[0].questions.clear();
        assert!(matches!(
            empty.into_instance(&mut rng),
            Err(EngineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn duplicate_slots_are_refused() {
        let mut entity = snapshot(0, GameStatus::Lobby);
        let mut twin = entity.teams[0].clone();
        twin.id = Uuid::new_v4();
        twin.color = TeamColor::Red;
        entity.teams.push(twin);
        let mut rng = StdRng::seed_from_u64(3);
        assert!(matches!(
            entity.into_instance(&mut rng),
            Err(EngineError::InvalidConfiguration(_))
        ));
    }
}
