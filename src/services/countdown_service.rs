use tracing::{debug, info, warn};

use crate::{
    dto::ws::{ChatKind, ServerMessage},
    services::events::system_chat,
    state::{
        SharedState,
        countdown::{Countdown, CountdownEvent, CountdownPhase},
        matches::RosterEntry,
        party::Party,
        timers::TimerToken,
    },
};

const CANCEL_NOTICE: &str = "Match start canceled.";
const GO_NOTICE: &str = "Starting game!";

/// Start (or restart) the countdown of room `code`.
///
/// Callers hold the room lock; the spawned task waits for it before its first announcement.
pub fn start(state: &SharedState, code: &str) {
    let from = state.config().countdown_from;
    let task_state = state.clone();
    let room = code.to_owned();
    state
        .countdowns()
        .arm(code.to_owned(), move |token| run(task_state, room, token, from));
    info!(room = %code, from, "countdown started");
}

/// Cancel a live countdown of room `code` and tell the room. Returns whether one was running.
///
/// Callers hold the room lock.
pub fn cancel(state: &SharedState, code: &str) -> bool {
    if !state.countdowns().cancel(&code.to_owned()) {
        return false;
    }
    let hub = state.hub();
    hub.broadcast(code, &system_chat(code, CANCEL_NOTICE, ChatKind::System));
    hub.broadcast(code, &ServerMessage::CountdownCanceled);
    info!(room = %code, "countdown canceled");
    true
}

async fn run(state: SharedState, code: String, token: TimerToken, from: u8) {
    let tick = state.config().countdown_tick;
    let mut countdown = Countdown::new();
    let mut event = CountdownEvent::Start { from };

    loop {
        let phase = match countdown.apply(event) {
            Ok(phase) => phase,
            Err(err) => {
                warn!(room = %code, error = %err, "countdown aborted");
                return;
            }
        };

        match phase {
            CountdownPhase::Counting(remaining) => {
                {
                    let _room = state.lock_room(&code).await;
                    if !state.countdowns().is_current(&code, &token) {
                        return;
                    }
                    let text = if remaining > 0 {
                        format!("Starting game in {remaining}...")
                    } else {
                        GO_NOTICE.to_owned()
                    };
                    state
                        .hub()
                        .broadcast(&code, &system_chat(&code, text, ChatKind::SystemGreen));
                    debug!(room = %code, remaining, "countdown tick");
                }
                if remaining > 0 && !token.sleep(tick).await {
                    return;
                }
                event = CountdownEvent::Tick;
            }
            CountdownPhase::Starting => {
                launch_match(&state, &code, &token).await;
                return;
            }
            CountdownPhase::Idle => return,
        }
    }
}

/// Snapshot the current members into a new match and announce it.
async fn launch_match(state: &SharedState, code: &str, token: &TimerToken) {
    let _room = state.lock_room(code).await;
    if !state.countdowns().complete(&code.to_owned(), token) {
        return;
    }

    let store = match state.require_store().await {
        Ok(store) => store,
        Err(err) => {
            warn!(room = %code, error = %err, "cannot start match");
            return;
        }
    };
    let party = match store.find_party(code.to_owned()).await {
        Ok(Some(entity)) => Party::from(entity),
        Ok(None) => {
            info!(room = %code, "party vanished before match start");
            return;
        }
        Err(err) => {
            warn!(room = %code, error = %err, "failed to load party for match start");
            return;
        }
    };
    if party.is_empty() {
        return;
    }

    let roster: Vec<RosterEntry> = party
        .members
        .iter()
        .map(|member| RosterEntry {
            identity: member.identity.clone(),
            username: member.username.clone(),
            color: member.color.clone(),
        })
        .collect();

    state.match_retention().cancel(&code.to_owned());
    let started = state.matches().create(code, roster);
    info!(room = %code, players = started.roster.len(), "match started");
    state.hub().broadcast(
        code,
        &ServerMessage::MatchStart {
            match_id: code.to_owned(),
        },
    );
}
