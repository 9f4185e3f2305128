use dashmap::DashMap;
use uuid::Uuid;

use crate::{
    error::EngineError,
    state::{game::GameInstance, state_machine::GameStatus},
};

/// Listing entry for a registered game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameListing {
    /// Game identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Current status.
    pub status: GameStatus,
    /// Creation time in milliseconds since the epoch.
    pub created_at_ms: u64,
}

/// Owner of every live game instance.
///
/// Each instance sits in its own DashMap entry; mutations go through
/// [`GameRegistry::with_game_mut`], which holds the entry guard for the whole
/// closure so two mutations of one game never interleave. Closures must not
/// re-enter the registry.
pub struct GameRegistry {
    games: DashMap<Uuid, GameInstance>,
    capacity: usize,
}

impl GameRegistry {
    /// Create an empty registry accepting at most `capacity` games.
    pub fn new(capacity: usize) -> Self {
        Self {
            games: DashMap::new(),
            capacity,
        }
    }

    /// Register a game, refusing duplicates and overflow.
    pub fn insert(&self, game: GameInstance) -> Result<Uuid, EngineError> {
        let id = game.id;
        if self.games.contains_key(&id) {
            return Err(EngineError::InvalidConfiguration(format!(
                "game `{id}` is already loaded"
            )));
        }
        if self.games.len() >= self.capacity {
            return Err(EngineError::CapacityExceeded(format!(
                "at most {} games can be hosted",
                self.capacity
            )));
        }
        self.games.insert(id, game);
        Ok(id)
    }

    /// Whether a game is registered.
    pub fn contains(&self, id: Uuid) -> bool {
        self.games.contains_key(&id)
    }

    /// Run `f` against a shared view of the game.
    pub fn read<T>(&self, id: Uuid, f: impl FnOnce(&GameInstance) -> T) -> Result<T, EngineError> {
        self.games
            .get(&id)
            .map(|entry| f(entry.value()))
            .ok_or(EngineError::GameNotFound(id))
    }

    /// Run `f` with exclusive access to the game.
    pub fn with_game_mut<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut GameInstance) -> T,
    ) -> Result<T, EngineError> {
        self.games
            .get_mut(&id)
            .map(|mut entry| f(entry.value_mut()))
            .ok_or(EngineError::GameNotFound(id))
    }

    /// Remove a game, returning it.
    pub fn remove(&self, id: Uuid) -> Result<GameInstance, EngineError> {
        self.games
            .remove(&id)
            .map(|(_, game)| game)
            .ok_or(EngineError::GameNotFound(id))
    }

    /// Registered games, oldest first.
    pub fn list(&self) -> Vec<GameListing> {
        let mut listings: Vec<GameListing> = self
            .games
            .iter()
            .map(|entry| GameListing {
                id: entry.id,
                name: entry.name.clone(),
                status: entry.status(),
                created_at_ms: entry.created_at_ms,
            })
            .collect();
        listings.sort_by_key(|listing| listing.created_at_ms);
        listings
    }

    /// Number of registered games.
    pub fn len(&self) -> usize {
        self.games.len()
    }

    /// Whether no game is registered.
    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::game::GameSettings;

    #[test]
    fn capacity_is_enforced() {
        let registry = GameRegistry::new(1);
        registry
            .insert(GameInstance::new("One".into(), GameSettings::default()))
            .unwrap();
        let err = registry
            .insert(GameInstance::new("Two".into(), GameSettings::default()))
            .unwrap_err();
        assert!(matches!(err, EngineError::CapacityExceeded(_)));
    }

    #[test]
    fn mutations_are_visible_and_missing_games_reported() {
        let registry = GameRegistry::new(4);
        let id = registry
            .insert(GameInstance::new("Quiz night".into(), GameSettings::default()))
            .unwrap();

        registry
            .with_game_mut(id, |game| game.name = "Renamed".into())
            .unwrap();
        assert_eq!(registry.read(id, |game| game.name.clone()).unwrap(), "Renamed");
        assert_eq!(registry.list()[0].status, GameStatus::Lobby);

        registry.remove(id).unwrap();
        assert_eq!(
            registry.read(id, |_| ()).unwrap_err(),
            EngineError::GameNotFound(id)
        );
    }
}
