use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Visibility of a party as stored by the persistence layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PartyKindEntity {
    /// Auto-matched party anyone can land in.
    Public,
    /// Invite-code party.
    Private,
}

/// Member record embedded in a party.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberEntity {
    /// Wire form of the member identity (guest ids keep their `guest` prefix).
    pub id: String,
    /// Display name at join time.
    pub username: String,
    /// Whether the member created the party.
    pub is_leader: bool,
    /// Palette color assigned on join.
    pub color: String,
    /// Readiness flag toggled from the lobby.
    pub is_ready: bool,
    /// Denormalized rating snapshot.
    pub rating: i32,
    /// Denormalized experience snapshot.
    pub xp: u32,
    /// Denormalized games-played snapshot.
    pub games_played: u32,
}

/// Party document persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartyEntity {
    /// Join code, unique across live parties.
    pub code: String,
    /// Public or private.
    pub kind: PartyKindEntity,
    /// Member capacity.
    pub max_size: usize,
    /// Ordered member list.
    pub members: Vec<MemberEntity>,
    /// Creation timestamp, used for expiry.
    pub created_at: SystemTime,
}

/// Durable account record owned by the authentication collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEntity {
    /// Account identifier.
    pub id: String,
    /// Account display name.
    pub username: String,
    /// Skill rating.
    pub rating: i32,
    /// Accumulated experience.
    pub xp: u32,
    /// Completed matches.
    pub games_played: u32,
    /// Code of the party the account currently sits in.
    pub current_party: Option<String>,
}

/// Rating/xp/games triple written back on settlement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserStatsEntity {
    /// Skill rating.
    pub rating: i32,
    /// Accumulated experience.
    pub xp: u32,
    /// Completed matches.
    pub games_played: u32,
}
