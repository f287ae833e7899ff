//! Session ownership: binding identities to connections and reaping disconnected players.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    dto::ws::ServerMessage,
    error::ServiceError,
    services::party_service::{self, Departure},
    state::{
        SharedState,
        identity::Identity,
        rooms::{ConnectionHandle, ConnectionId, GLOBAL_GROUP, Outbound},
        session::Claim,
    },
};

/// Register a freshly accepted socket in the global group.
pub fn open_connection(state: &SharedState, tx: mpsc::UnboundedSender<Outbound>) -> ConnectionHandle {
    let handle = ConnectionHandle::new(tx);
    state.hub().attach(handle.clone());
    info!(connection = %handle.id, "connection opened");
    handle
}

/// Make `connection` the sole owner of `identity`, evicting any previous owner first.
///
/// On success the pending removal of `identity` is canceled and the connection is put back
/// into the identity's party, if any.
pub async fn identify(
    state: &SharedState,
    connection: &ConnectionHandle,
    identity: Identity,
) -> Result<(), ServiceError> {
    let sessions = state.sessions();

    if let Some(bound) = sessions.identity_of(connection.id) {
        if bound != identity {
            info!(connection = %connection.id, from = %bound, to = %identity, "connection switches identity");
            if let Some(released) = sessions.release(connection.id) {
                arm_removal(state, released);
            }
            state.hub().move_to(connection.id, GLOBAL_GROUP);
        }
    }

    match sessions.begin_claim(&identity, connection) {
        Ok(Claim::AlreadyOwner) => debug!(identity = %identity, "identity already owned by connection"),
        Ok(Claim::Installed) => {}
        Ok(Claim::Evict(previous)) => {
            info!(identity = %identity, replaced = %previous.id, by = %connection.id, "session replaced");
            previous.send(ServerMessage::SessionReplaced);
            previous.close();
            let timeout = state.config().eviction_timeout;
            if tokio::time::timeout(timeout, previous.closed()).await.is_err() {
                warn!(connection = %previous.id, "replaced connection did not close in time");
            }
            if let Err(err) = sessions.complete_claim(&identity, connection) {
                warn!(identity = %identity, connection = %connection.id, error = %err, "ownership transfer abandoned");
                if !sessions.is_owned(&identity) {
                    arm_removal(state, identity);
                }
                return Err(err.into());
            }
        }
        Err(err) => {
            warn!(identity = %identity, connection = %connection.id, error = %err, "identify rejected");
            return Err(err.into());
        }
    }

    if state.removals().cancel(&identity) {
        info!(identity = %identity, "reconnected within grace period; removal canceled");
    }
    info!(identity = %identity, connection = %connection.id, "connection identified");

    if let Err(err) = party_service::resync(state, connection, &identity).await {
        warn!(identity = %identity, error = %err, "failed to restore party state");
    }
    Ok(())
}

/// Forget a closed socket. Arms the disconnect reaper when the socket owned an identity.
pub fn close_connection(state: &SharedState, id: ConnectionId) {
    state.hub().detach(id);
    if let Some(identity) = state.sessions().release(id) {
        info!(identity = %identity, connection = %id, "owner disconnected");
        arm_removal(state, identity);
    }
    state.sessions().forget(id);
    info!(connection = %id, "connection closed");
}

/// Remove `identity` from its party unless it is owned again before the grace period ends.
///
/// Arming replaces any timer already pending for the identity.
pub fn arm_removal(state: &SharedState, identity: Identity) {
    let grace = state.config().reconnect_grace;
    let task_state = state.clone();
    let key = identity.clone();

    state.removals().arm(identity, move |token| async move {
        if !token.sleep(grace).await || !task_state.removals().complete(&key, &token) {
            return;
        }
        if task_state.sessions().is_owned(&key) {
            debug!(identity = %key, "identity owned again; removal skipped");
            return;
        }
        info!(identity = %key, "reconnect grace expired; removing from party");
        if let Err(err) = party_service::leave_all(&task_state, &key, Departure::Disconnected).await
        {
            warn!(identity = %key, error = %err, "disconnect removal failed");
        }
    });
    debug!(grace_secs = grace.as_secs(), "pending removal armed");
}
