use mongodb::bson::{Bson, DateTime, Document, doc, oid::ObjectId};
use serde::{Deserialize, Serialize};

use crate::dao::models::{MemberEntity, PartyEntity, PartyKindEntity, UserEntity};

/// Party document stored in the `parties` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoPartyDocument {
    code: String,
    #[serde(rename = "type")]
    kind: PartyKindEntity,
    max_size: i64,
    members: Vec<MongoMemberDocument>,
    created_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MongoMemberDocument {
    id: String,
    username: String,
    #[serde(default)]
    is_leader: bool,
    color: String,
    #[serde(default)]
    is_ready: bool,
    #[serde(default = "default_rating")]
    elo: i32,
    #[serde(default)]
    xp: i64,
    #[serde(default)]
    games_played: i64,
}

fn default_rating() -> i32 {
    1200
}

impl From<PartyEntity> for MongoPartyDocument {
    fn from(value: PartyEntity) -> Self {
        Self {
            code: value.code,
            kind: value.kind,
            max_size: value.max_size as i64,
            members: value
                .members
                .into_iter()
                .map(|member| MongoMemberDocument {
                    id: member.id,
                    username: member.username,
                    is_leader: member.is_leader,
                    color: member.color,
                    is_ready: member.is_ready,
                    elo: member.rating,
                    xp: i64::from(member.xp),
                    games_played: i64::from(member.games_played),
                })
                .collect(),
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<MongoPartyDocument> for PartyEntity {
    fn from(value: MongoPartyDocument) -> Self {
        Self {
            code: value.code,
            kind: value.kind,
            max_size: value.max_size.max(0) as usize,
            members: value
                .members
                .into_iter()
                .map(|member| MemberEntity {
                    id: member.id,
                    username: member.username,
                    is_leader: member.is_leader,
                    color: member.color,
                    is_ready: member.is_ready,
                    rating: member.elo,
                    xp: clamp_u32(member.xp),
                    games_played: clamp_u32(member.games_played),
                })
                .collect(),
            created_at: value.created_at.to_system_time(),
        }
    }
}

/// Filter selecting a party by join code.
pub fn party_filter(code: &str) -> Document {
    doc! { "code": code }
}

/// Filter selecting an account by id; hex ids are matched as ObjectIds.
pub fn user_filter(id: &str) -> Document {
    match ObjectId::parse_str(id) {
        Ok(oid) => doc! { "_id": oid },
        Err(_) => doc! { "_id": id },
    }
}

/// Decode an account document written by the authentication service.
///
/// Numeric fields may arrive as int32, int64 or double depending on the writer.
pub fn user_from_document(document: &Document) -> Option<UserEntity> {
    let id = match document.get("_id")? {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(id) => id.clone(),
        _ => return None,
    };
    let username = document.get_str("username").unwrap_or_default().to_owned();
    let current_party = match document.get("currentParty") {
        Some(Bson::String(code)) => Some(code.clone()),
        _ => None,
    };

    Some(UserEntity {
        id,
        username,
        rating: numeric(document, "elo").map_or(1200, |value| value as i32),
        xp: numeric(document, "xp").map_or(0, clamp_u32),
        games_played: numeric(document, "gamesPlayed").map_or(0, clamp_u32),
        current_party,
    })
}

fn numeric(document: &Document, key: &str) -> Option<i64> {
    match document.get(key)? {
        Bson::Int32(value) => Some(i64::from(*value)),
        Bson::Int64(value) => Some(*value),
        Bson::Double(value) => Some(value.round() as i64),
        _ => None,
    }
}

fn clamp_u32(value: i64) -> u32 {
    value.clamp(0, i64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_document_reads_mixed_numeric_types() {
        let oid = ObjectId::new();
        let document = doc! {
            "_id": oid,
            "username": "ada",
            "elo": 1234.0_f64,
            "xp": 90_i64,
            "gamesPlayed": 3_i32,
            "currentParty": "ABC123",
        };

        let user = user_from_document(&document).unwrap();
        assert_eq!(user.id, oid.to_hex());
        assert_eq!(user.rating, 1234);
        assert_eq!(user.xp, 90);
        assert_eq!(user.games_played, 3);
        assert_eq!(user.current_party.as_deref(), Some("ABC123"));
    }

    #[test]
    fn user_filter_parses_object_ids() {
        let oid = ObjectId::new();
        assert_eq!(user_filter(&oid.to_hex()), doc! { "_id": oid });
        assert_eq!(user_filter("plain"), doc! { "_id": "plain" });
    }
}
