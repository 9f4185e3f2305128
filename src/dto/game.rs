use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::GameListItemEntity,
    dto::{format_timestamp_ms, validation::validate_display_name},
    state::{
        game::{GameInstance, GameSettings},
        registry::GameListing,
        state_machine::GameStatus,
    },
};

/// Payload used to create a brand-new game instance.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateGameRequest {
    #[validate(length(max = 80), custom(function = "validate_display_name"))]
    pub name: String,
    /// Auto-advance preferences; the configured defaults apply when omitted.
    #[serde(default)]
    pub settings: Option<GameSettings>,
}

/// Summary returned once a game has been created, imported or loaded.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameSummary {
    pub id: Uuid,
    pub name: String,
    pub status: GameStatus,
    pub created_at: String,
    pub updated_at: String,
    pub team_count: usize,
    pub player_count: usize,
    pub round_count: usize,
}

impl From<&GameInstance> for GameSummary {
    fn from(game: &GameInstance) -> Self {
        Self {
            id: game.id,
            name: game.name.clone(),
            status: game.status(),
            created_at: format_timestamp_ms(game.created_at_ms),
            updated_at: format_timestamp_ms(game.updated_at_ms),
            team_count: game.teams.len(),
            player_count: game.player_count(),
            round_count: game.rounds.len(),
        }
    }
}

/// Minimal projection of a hosted game.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameListItem {
    pub id: Uuid,
    pub name: String,
    pub status: GameStatus,
    pub created_at: String,
}

impl From<GameListing> for GameListItem {
    fn from(listing: GameListing) -> Self {
        Self {
            id: listing.id,
            name: listing.name,
            status: listing.status,
            created_at: format_timestamp_ms(listing.created_at_ms),
        }
    }
}

/// Game known to the storage backend, hosted or not.
#[derive(Debug, Serialize, ToSchema)]
pub struct StoredGameItem {
    pub id: Uuid,
    pub name: String,
    pub status: GameStatus,
    pub created_at: String,
    pub updated_at: String,
    /// Whether the game is currently hosted in memory.
    pub loaded: bool,
}

impl StoredGameItem {
    /// Project a stored header, flagging whether it is hosted.
    pub fn new(entity: GameListItemEntity, loaded: bool) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            status: entity.status,
            created_at: format_timestamp_ms(entity.created_at_ms),
            updated_at: format_timestamp_ms(entity.updated_at_ms),
            loaded,
        }
    }
}

#[cfg(test)]
mod tests {
    use validator::Validate;

    use super::*;

    #[test]
    fn create_request_rejects_blank_names() {
        let request: CreateGameRequest =
            serde_json::from_str(r#"{ "name": "   " }"#).unwrap();
        assert!(request.validate().is_err());

        let request: CreateGameRequest =
            serde_json::from_str(r#"{ "name": "Pub quiz", "settings": { "auto_next": true } }"#)
                .unwrap();
        assert!(request.validate().is_ok());
        assert!(request.settings.is_some_and(|settings| settings.auto_next));
    }

    #[test]
    fn summary_counts_roster() {
        let game = GameInstance::new("Pub quiz".into(), GameSettings::default());
        let summary = GameSummary::from(&game);
        assert_eq!(summary.status, GameStatus::Lobby);
        assert_eq!(summary.team_count, 0);
        assert!(summary.created_at.ends_with('Z'));
    }
}
