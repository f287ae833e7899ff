//! Post-match settlement: readiness reset, rating/XP updates and match retention.

use std::{sync::Arc, time::SystemTime};

use tracing::{debug, info, warn};

use crate::{
    dao::{lobby_store::LobbyStore, models::UserStatsEntity},
    dto::ws::{ChatKind, ServerMessage},
    services::{events, rating},
    state::{
        SharedState,
        identity::{Identity, PlayerStats},
        matches::{FinishEntry, MatchState},
        party::Party,
    },
};

const COMPLETION_NOTICE: &str = "Match complete! Everyone finished. Ratings updated.";

/// Settle a completed match. Runs once per match, right after the last finish.
///
/// Every finisher is processed independently: a failed write for one player is logged and the
/// others are still settled.
pub async fn settle(state: &SharedState, standings: &MatchState) {
    let code = standings.room_code.as_str();
    let Some(store) = state.store().await else {
        warn!(room = %code, "storage unavailable; settlement skipped");
        arm_retention(state, code, standings.started_at);
        return;
    };

    let snapshot = reset_readiness(state, &store, code).await;

    let mut field: Vec<(&FinishEntry, PlayerStats)> = Vec::new();
    for entry in standings.finishers() {
        let fallback = snapshot
            .as_ref()
            .and_then(|party| party.member(&entry.identity))
            .map(|member| member.stats)
            .unwrap_or_default();
        let before = current_stats(&store, &entry.identity, fallback).await;
        field.push((entry, before));
    }
    let ranked: Vec<(u32, i32)> = field
        .iter()
        .map(|(entry, before)| (entry.rank, before.rating))
        .collect();

    let hub = state.hub();
    let mut settled: Vec<(Identity, PlayerStats)> = Vec::with_capacity(field.len());
    for (index, (entry, before)) in field.iter().enumerate() {
        let delta = rating::averaged_delta(&ranked, index);
        let after = PlayerStats {
            rating: before.rating + delta,
            xp: before.xp + rating::xp_award(entry.rank),
            games_played: before.games_played + 1,
        };

        if let Some(account_id) = entry.identity.account_id() {
            let update = UserStatsEntity {
                rating: after.rating,
                xp: after.xp,
                games_played: after.games_played,
            };
            if let Err(err) = store.update_user_stats(account_id.to_owned(), update).await {
                warn!(room = %code, identity = %entry.identity, error = %err, "failed to persist rating");
            }
        }

        info!(
            room = %code,
            identity = %entry.identity,
            rank = entry.rank,
            delta,
            rating = after.rating,
            "rating settled"
        );
        hub.broadcast(
            code,
            &ServerMessage::RatingUpdate {
                identity: entry.identity.to_string(),
                rating: after.rating,
                xp: after.xp,
                games_played: after.games_played,
                delta,
            },
        );
        settled.push((entry.identity.clone(), after));
    }

    refresh_members(state, &store, code, &settled).await;
    arm_retention(state, code, standings.started_at);
}

/// Clear every ready flag so the lobby does not restart the countdown. Returns the party as
/// it was persisted.
async fn reset_readiness(
    state: &SharedState,
    store: &Arc<dyn LobbyStore>,
    code: &str,
) -> Option<Party> {
    let _room = state.lock_room(code).await;
    let mut party = match store.find_party(code.to_owned()).await {
        Ok(Some(entity)) => Party::from(entity),
        Ok(None) => {
            info!(room = %code, "party gone before settlement");
            return None;
        }
        Err(err) => {
            warn!(room = %code, error = %err, "failed to load party for settlement");
            return None;
        }
    };
    party.reset_readiness();
    if let Err(err) = store.save_party(party.clone().into()).await {
        warn!(room = %code, error = %err, "failed to reset readiness");
    }
    Some(party)
}

/// Pre-settlement stats: the account record for registered players, the party snapshot for
/// guests and for accounts that cannot be read.
async fn current_stats(
    store: &Arc<dyn LobbyStore>,
    identity: &Identity,
    fallback: PlayerStats,
) -> PlayerStats {
    let Some(account_id) = identity.account_id() else {
        return fallback;
    };
    match store.find_user(account_id.to_owned()).await {
        Ok(Some(user)) => PlayerStats {
            rating: user.rating,
            xp: user.xp,
            games_played: user.games_played,
        },
        Ok(None) => fallback,
        Err(err) => {
            warn!(identity = %identity, error = %err, "failed to load account; using party snapshot");
            fallback
        }
    }
}

/// Write the settled stats into the member snapshots and announce the result.
async fn refresh_members(
    state: &SharedState,
    store: &Arc<dyn LobbyStore>,
    code: &str,
    settled: &[(Identity, PlayerStats)],
) {
    let _room = state.lock_room(code).await;
    let hub = state.hub();
    match store.find_party(code.to_owned()).await {
        Ok(Some(entity)) => {
            let mut party = Party::from(entity);
            for (identity, stats) in settled {
                if let Some(member) = party.member_mut(identity) {
                    member.stats = *stats;
                }
            }
            if let Err(err) = store.save_party(party.clone().into()).await {
                warn!(room = %code, error = %err, "failed to store settled member stats");
            }
            hub.broadcast(code, &events::party_update(&party));
        }
        Ok(None) => debug!(room = %code, "party gone; no member refresh"),
        Err(err) => warn!(room = %code, error = %err, "failed to reload party after settlement"),
    }
    hub.broadcast(
        code,
        &events::system_chat(code, COMPLETION_NOTICE, ChatKind::SystemGreen),
    );
}

/// Keep the settled match queryable for a while, then drop it unless a newer match replaced it.
fn arm_retention(state: &SharedState, code: &str, started_at: SystemTime) {
    let retention = state.config().match_retention;
    let task_state = state.clone();
    let key = code.to_owned();
    state
        .match_retention()
        .arm(code.to_owned(), move |token| async move {
            if token.sleep(retention).await
                && task_state.match_retention().complete(&key, &token)
                && task_state.matches().remove_if_started_at(&key, started_at)
            {
                debug!(room = %key, "settled match dropped");
            }
        });
}
