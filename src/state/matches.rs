use std::time::SystemTime;

use dashmap::DashMap;
use indexmap::IndexMap;
use tokio::time::Instant;

use crate::state::identity::Identity;

/// Player captured when the countdown completed.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    pub identity: Identity,
    pub username: String,
    pub color: String,
}

/// Arrival recorded for one player.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishEntry {
    pub identity: Identity,
    pub username: String,
    pub color: String,
    /// 1-based arrival order.
    pub rank: u32,
    pub elapsed_secs: f64,
}

/// Live state of one race.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchState {
    pub room_code: String,
    pub started_at: SystemTime,
    start: Instant,
    pub roster: Vec<RosterEntry>,
    /// Finishers in arrival order, keyed by identity so duplicates are impossible.
    pub finished: IndexMap<Identity, FinishEntry>,
    pub complete: bool,
}

impl MatchState {
    fn new(room_code: String, roster: Vec<RosterEntry>) -> Self {
        Self {
            room_code,
            started_at: SystemTime::now(),
            start: Instant::now(),
            roster,
            finished: IndexMap::new(),
            complete: false,
        }
    }

    /// Finish entries in rank order.
    pub fn finishers(&self) -> impl Iterator<Item = &FinishEntry> {
        self.finished.values()
    }
}

/// Why a finish submission changed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleFinish {
    UnknownMatch,
    AlreadyComplete,
    AlreadyFinished,
    NotInRoster,
}

/// Result of [`MatchTracker::submit_finish`].
#[derive(Debug, Clone, PartialEq)]
pub enum FinishOutcome {
    /// A new arrival was appended.
    Recorded {
        state: MatchState,
        /// This arrival completed the match; settlement must run exactly once.
        completed_now: bool,
    },
    /// Nothing changed; `state` is the current snapshot when the match exists.
    Ignored {
        state: Option<MatchState>,
        reason: StaleFinish,
    },
}

impl FinishOutcome {
    /// Snapshot after the submission, whatever happened.
    pub fn state(&self) -> Option<&MatchState> {
        match self {
            FinishOutcome::Recorded { state, .. } => Some(state),
            FinishOutcome::Ignored { state, .. } => state.as_ref(),
        }
    }
}

/// In-memory registry of matches keyed by room code.
#[derive(Default)]
pub struct MatchTracker {
    matches: DashMap<String, MatchState>,
}

impl MatchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a match for `room_code`, replacing any previous one.
    pub fn create(&self, room_code: &str, roster: Vec<RosterEntry>) -> MatchState {
        let state = MatchState::new(room_code.to_owned(), roster);
        self.matches.insert(room_code.to_owned(), state.clone());
        state
    }

    /// Record `identity` crossing the line. Stale submissions are ignored.
    pub fn submit_finish(&self, room_code: &str, identity: &Identity) -> FinishOutcome {
        let Some(mut state) = self.matches.get_mut(room_code) else {
            return FinishOutcome::Ignored {
                state: None,
                reason: StaleFinish::UnknownMatch,
            };
        };

        let reason = if state.complete {
            Some(StaleFinish::AlreadyComplete)
        } else if state.finished.contains_key(identity) {
            Some(StaleFinish::AlreadyFinished)
        } else {
            None
        };
        if let Some(reason) = reason {
            return FinishOutcome::Ignored {
                state: Some(state.clone()),
                reason,
            };
        }

        let Some(player) = state
            .roster
            .iter()
            .find(|entry| &entry.identity == identity)
            .cloned()
        else {
            return FinishOutcome::Ignored {
                state: Some(state.clone()),
                reason: StaleFinish::NotInRoster,
            };
        };

        let rank = state.finished.len() as u32 + 1;
        let elapsed_secs = state.start.elapsed().as_millis() as f64 / 1000.0;
        state.finished.insert(
            identity.clone(),
            FinishEntry {
                identity: player.identity,
                username: player.username,
                color: player.color,
                rank,
                elapsed_secs,
            },
        );
        let completed_now = state.finished.len() == state.roster.len();
        state.complete = completed_now;

        FinishOutcome::Recorded {
            state: state.clone(),
            completed_now,
        }
    }

    /// Read-only snapshot for resyncing clients.
    pub fn get(&self, room_code: &str) -> Option<MatchState> {
        self.matches.get(room_code).map(|state| state.clone())
    }

    /// Drop whatever match `room_code` has. Returns whether one existed.
    pub fn remove(&self, room_code: &str) -> bool {
        self.matches.remove(room_code).is_some()
    }

    /// Drop the match for `room_code` if it is still the one started at `started_at`.
    pub fn remove_if_started_at(&self, room_code: &str, started_at: SystemTime) -> bool {
        self.matches
            .remove_if(room_code, |_, state| state.started_at == started_at)
            .is_some()
    }
}
