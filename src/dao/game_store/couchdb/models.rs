use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    dao::{
        game_store::couchdb::error::CouchDaoError,
        models::{GameEntity, GameListItemEntity},
    },
    state::state_machine::GameStatus,
};

pub const GAME_PREFIX: &str = "game::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    pub id: String,
    #[serde(default)]
    pub doc: Option<Value>,
}

/// Full game snapshot stored as one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchGameDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub game: GameEntity,
}

impl From<(GameEntity, Option<String>)> for CouchGameDocument {
    fn from((game, rev): (GameEntity, Option<String>)) -> Self {
        Self {
            id: game_doc_id(game.id),
            rev,
            game,
        }
    }
}

/// Only the `_rev` of a document, used before replacing or deleting it.
#[derive(Debug, Deserialize)]
pub struct CouchRevision {
    #[serde(rename = "_rev")]
    pub rev: String,
}

/// Listing projection of a game document; the rest of the body is skipped.
#[derive(Debug, Deserialize)]
pub struct CouchGameHeader {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub status: GameStatus,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl TryFrom<CouchGameHeader> for GameListItemEntity {
    type Error = CouchDaoError;

    fn try_from(doc: CouchGameHeader) -> Result<Self, Self::Error> {
        Ok(Self {
            id: extract_uuid(&doc.id)?,
            name: doc.name,
            status: doc.status,
            created_at_ms: doc.created_at_ms,
            updated_at_ms: doc.updated_at_ms,
        })
    }
}

pub fn game_doc_id(id: Uuid) -> String {
    format!("{}{}", GAME_PREFIX, id)
}

pub fn extract_uuid(doc_id: &str) -> Result<Uuid, CouchDaoError> {
    let (_, id) = doc_id
        .split_once("::")
        .ok_or_else(|| CouchDaoError::InvalidDocId {
            doc_id: doc_id.to_string(),
            kind: "missing separator",
        })?;

    Uuid::parse_str(id).map_err(|_| CouchDaoError::InvalidDocId {
        doc_id: doc_id.to_string(),
        kind: "invalid UUID",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_ids_round_trip_through_the_prefix() {
        let id = Uuid::new_v4();
        let doc_id = game_doc_id(id);
        assert!(doc_id.starts_with(GAME_PREFIX));
        assert_eq!(extract_uuid(&doc_id).unwrap(), id);
        assert!(matches!(
            extract_uuid("game-without-separator"),
            Err(CouchDaoError::InvalidDocId { .. })
        ));
    }

    #[test]
    fn header_ignores_the_snapshot_body() {
        let id = Uuid::new_v4();
        let raw = serde_json::json!({
            "_id": game_doc_id(id),
            "_rev": "3-abc",
            "name": "Friday quiz",
            "status": "paused",
            "created_at_ms": 10,
            "updated_at_ms": 20,
            "teams": [],
            "rounds": [],
        });
        let header: CouchGameHeader = serde_json::from_value(raw).unwrap();
        let item = GameListItemEntity::try_from(header).unwrap();
        assert_eq!(item.id, id);
        assert_eq!(item.status, GameStatus::Paused);
    }
}
