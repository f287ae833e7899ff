use tracing::{debug, info, warn};

use crate::{
    services::{events, settlement},
    state::{
        SharedState,
        identity::Identity,
        matches::FinishOutcome,
        rooms::ConnectionHandle,
    },
};

/// Send the standings of `room_code` to the caller, if a match is tracked for it.
pub fn get_match_state(state: &SharedState, connection: &ConnectionHandle, room_code: &str) {
    match state.matches().get(room_code) {
        Some(standings) => {
            connection.send(events::match_update(&standings));
        }
        None => debug!(room = %room_code, "no match to report"),
    }
}

/// Record the caller crossing the finish line and settle the match once everyone has.
///
/// Submissions on behalf of another identity and stale submissions are dropped.
pub async fn submit_finish(
    state: &SharedState,
    caller: &Identity,
    room_code: &str,
    submitted: &Identity,
) {
    if caller != submitted {
        warn!(room = %room_code, caller = %caller, submitted = %submitted, "finish submitted for another identity; ignored");
        return;
    }

    match state.matches().submit_finish(room_code, submitted) {
        FinishOutcome::Recorded {
            state: standings,
            completed_now,
        } => {
            let rank = standings
                .finished
                .get(submitted)
                .map(|entry| entry.rank)
                .unwrap_or_default();
            info!(room = %room_code, identity = %submitted, rank, "finish recorded");
            state
                .hub()
                .broadcast(room_code, &events::match_update(&standings));

            if completed_now {
                info!(room = %room_code, players = standings.roster.len(), "match complete");
                settlement::settle(state, &standings).await;
            }
        }
        FinishOutcome::Ignored { reason, .. } => {
            debug!(room = %room_code, identity = %submitted, ?reason, "stale finish ignored");
        }
    }
}
