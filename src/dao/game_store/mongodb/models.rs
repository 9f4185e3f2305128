//! Conversion between game snapshots and BSON documents.
//!
//! Snapshots go through `serde_json` first so maps keyed by UUID end up with
//! string keys, which BSON requires.

use mongodb::bson::{self, Document, doc};
use serde::Deserialize;
use uuid::Uuid;

use super::error::{MongoDaoError, MongoResult};
use crate::{
    dao::models::{GameEntity, GameListItemEntity},
    state::state_machine::GameStatus,
};

/// Fields fetched when listing games.
pub const HEADER_PROJECTION: [&str; 5] = ["_id", "name", "status", "created_at_ms", "updated_at_ms"];

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

/// Encode a snapshot with the game id as `_id`.
pub fn to_document(game: &GameEntity) -> MongoResult<Document> {
    let encode = |reason: String| MongoDaoError::Encode {
        id: game.id,
        reason,
    };
    let value = serde_json::to_value(game).map_err(|err| encode(err.to_string()))?;
    let mut document = bson::serialize_to_document(&value).map_err(|err| encode(err.to_string()))?;
    document.insert("_id", game.id.to_string());
    Ok(document)
}

/// Decode a stored snapshot.
pub fn from_document(mut document: Document) -> MongoResult<GameEntity> {
    let id = document
        .remove("_id")
        .and_then(|value| value.as_str().map(str::to_owned))
        .unwrap_or_default();
    let decode = |reason: String| MongoDaoError::Decode {
        id: id.clone(),
        reason,
    };
    let value: serde_json::Value =
        bson::deserialize_from_document(document).map_err(|err| decode(err.to_string()))?;
    serde_json::from_value(value).map_err(|err| decode(err.to_string()))
}

#[derive(Debug, Deserialize)]
struct MongoGameHeader {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    status: GameStatus,
    created_at_ms: i64,
    updated_at_ms: i64,
}

/// Decode a projected listing document.
pub fn header_from_document(document: Document) -> MongoResult<GameListItemEntity> {
    let header: MongoGameHeader = bson::deserialize_from_document(document).map_err(|err| {
        MongoDaoError::Decode {
            id: "<listing>".into(),
            reason: err.to_string(),
        }
    })?;
    let id = Uuid::parse_str(&header.id).map_err(|err| MongoDaoError::Decode {
        id: header.id.clone(),
        reason: err.to_string(),
    })?;
    Ok(GameListItemEntity {
        id,
        name: header.name,
        status: header.status,
        created_at_ms: header.created_at_ms.max(0) as u64,
        updated_at_ms: header.updated_at_ms.max(0) as u64,
    })
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::*;
    use crate::state::game::{GameSettings, RoundResult};
    use crate::state::rounds::RoundKindTag;

    fn entity() -> GameEntity {
        let team = Uuid::new_v4();
        GameEntity {
            id: Uuid::new_v4(),
            name: "Pub quiz".into(),
            created_at_ms: 1_700_000_000_000,
            updated_at_ms: 1_700_000_100_000,
            status: GameStatus::Finished,
            teams: Vec::new(),
            rounds: Vec::new(),
            active_round: None,
            round_results: vec![RoundResult {
                round_index: 0,
                kind: RoundKindTag::TrueFalse,
                deltas: IndexMap::from([(team, -40)]),
                completed_at_ms: 1_700_000_050_000,
            }],
            settings: GameSettings::default(),
        }
    }

    #[test]
    fn uuid_keyed_maps_survive_bson() {
        let game = entity();
        let document = to_document(&game).unwrap();
        assert_eq!(document.get_str("_id").unwrap(), game.id.to_string());
        assert_eq!(from_document(document).unwrap(), game);
    }

    #[test]
    fn header_reads_the_projection() {
        let game = entity();
        let document: Document = to_document(&game)
            .unwrap()
            .into_iter()
            .filter(|(key, _)| HEADER_PROJECTION.contains(&key.as_str()))
            .collect();
        let header = header_from_document(document).unwrap();
        assert_eq!(header.id, game.id);
        assert_eq!(header.status, GameStatus::Finished);
        assert_eq!(header.updated_at_ms, game.updated_at_ms);
    }
}
