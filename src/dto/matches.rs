use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::format_system_time,
    state::matches::{FinishEntry, MatchState, RosterEntry},
};

/// Player captured when the match started.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RosterEntryDto {
    pub identity: String,
    pub username: String,
    pub color: String,
}

/// One arrival at the finish line.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FinishEntryDto {
    pub identity: String,
    pub username: String,
    pub color: String,
    pub rank: u32,
    /// Seconds between match start and the finish submission.
    pub elapsed_secs: f64,
}

/// Live standings of a match.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MatchStateDto {
    pub room_code: String,
    /// RFC 3339 start timestamp.
    pub started_at: String,
    pub players: Vec<RosterEntryDto>,
    pub finished: Vec<FinishEntryDto>,
    pub complete: bool,
}

impl From<&RosterEntry> for RosterEntryDto {
    fn from(entry: &RosterEntry) -> Self {
        Self {
            identity: entry.identity.to_string(),
            username: entry.username.clone(),
            color: entry.color.clone(),
        }
    }
}

impl From<&FinishEntry> for FinishEntryDto {
    fn from(entry: &FinishEntry) -> Self {
        Self {
            identity: entry.identity.to_string(),
            username: entry.username.clone(),
            color: entry.color.clone(),
            rank: entry.rank,
            elapsed_secs: entry.elapsed_secs,
        }
    }
}

impl From<&MatchState> for MatchStateDto {
    fn from(state: &MatchState) -> Self {
        Self {
            room_code: state.room_code.clone(),
            started_at: format_system_time(state.started_at),
            players: state.roster.iter().map(RosterEntryDto::from).collect(),
            finished: state.finished.values().map(FinishEntryDto::from).collect(),
            complete: state.complete,
        }
    }
}
