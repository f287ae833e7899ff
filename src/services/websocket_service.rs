use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    dto::ws::{ClientIntent, ServerMessage},
    error::ServiceError,
    services::{chat_service, match_service, party_service, session_service},
    state::{
        SharedState,
        identity::Identity,
        rooms::{ConnectionHandle, Outbound},
        session::SessionError,
    },
};

/// Handle the full lifecycle of one lobby WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Outbound>();

    // Dedicated writer task keeps outbound events flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(item) = outbound_rx.recv().await {
            let frame = match item {
                Outbound::Event(event) => match serde_json::to_string(&event) {
                    Ok(payload) => Message::Text(payload.into()),
                    Err(err) => {
                        warn!(error = %err, "failed to serialize event `{event:?}`");
                        continue;
                    }
                },
                Outbound::Pong(payload) => Message::Pong(payload.into()),
                Outbound::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            };
            if sender.send(frame).await.is_err() {
                break;
            }
        }
    });

    let handle = session_service::open_connection(&state, outbound_tx);

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientIntent::from_json_str(&text) {
                Ok(intent) => {
                    debug!(connection = %handle.id, intent = intent.name(), "received intent");
                    handle_intent(&state, &handle, intent).await;
                }
                Err(err) => {
                    warn!(connection = %handle.id, error = %err, "failed to parse or validate intent");
                }
            },
            Ok(Message::Ping(payload)) => handle.pong(payload.to_vec()),
            Ok(Message::Close(_)) => {
                info!(connection = %handle.id, "client closed");
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(connection = %handle.id, error = %err, "websocket error");
                break;
            }
        }

        if state.sessions().is_revoked(handle.id) {
            debug!(connection = %handle.id, "connection revoked; stop reading");
            break;
        }
    }

    session_service::close_connection(&state, handle.id);
    finalize(writer_task, handle).await;
}

/// Dispatch one intent on behalf of `connection`.
///
/// Everything but `identify` requires the connection to own an identity. Failures are reported
/// to the caller only.
pub async fn handle_intent(state: &SharedState, connection: &ConnectionHandle, intent: ClientIntent) {
    let name = intent.name();

    if let ClientIntent::Identify(request) = intent {
        let Some(identity) = Identity::parse(&request.identity) else {
            return;
        };
        if let Err(err) = session_service::identify(state, connection, identity).await {
            send_error(state, connection, name, err);
        }
        return;
    }

    let identity = match state.sessions().authorize(connection.id) {
        Ok(identity) => identity,
        Err(err) => {
            send_error(state, connection, name, err.into());
            return;
        }
    };

    let result = match intent {
        ClientIntent::SyncState(request) => {
            party_service::sync_state(state, connection, &identity, &request.profile).await
        }
        ClientIntent::CreateParty(request) => {
            party_service::create_party(state, connection, &identity, &request.profile).await
        }
        ClientIntent::JoinPublic(request) => {
            party_service::join_public(state, connection, &identity, &request.profile).await
        }
        ClientIntent::JoinPrivate(request) => {
            party_service::join_private(state, connection, &identity, &request.code, &request.profile)
                .await
        }
        ClientIntent::ToggleReady(request) => {
            party_service::toggle_ready(
                state,
                &identity,
                &request.room_code,
                request.profile.as_ref(),
            )
            .await
        }
        ClientIntent::LeaveParty(request) => {
            party_service::leave_party(state, connection, &identity, request.room_code.as_deref())
                .await
        }
        ClientIntent::GetMatchState(request) => {
            match_service::get_match_state(state, connection, &request.room_code);
            Ok(())
        }
        ClientIntent::SubmitFinish(request) => {
            let submitted = Identity::from(request.identity.trim());
            match_service::submit_finish(state, &identity, &request.room_code, &submitted).await;
            Ok(())
        }
        ClientIntent::SendChat(request) => {
            chat_service::send_chat(state, connection, &identity, &request);
            Ok(())
        }
        ClientIntent::Unknown => {
            debug!(connection = %connection.id, "ignoring unknown intent");
            Ok(())
        }
        ClientIntent::Identify(_) => Ok(()),
    };

    if let Err(err) = result {
        send_error(state, connection, name, err);
    }
}

/// Report a failed intent to the caller. Ownership failures end the connection.
fn send_error(state: &SharedState, connection: &ConnectionHandle, intent: &str, err: ServiceError) {
    match err {
        ServiceError::Session(SessionError::Denied) => {
            state.sessions().revoke(connection.id);
            connection.send(ServerMessage::SessionDenied);
            connection.close();
        }
        ServiceError::Session(SessionError::Replaced) => {
            connection.send(ServerMessage::SessionReplaced);
            connection.close();
        }
        err => {
            warn!(connection = %connection.id, intent, error = %err, "intent failed");
            connection.send(ServerMessage::PartyError {
                message: err.client_message(fallback_message(intent)),
            });
        }
    }
}

fn fallback_message(intent: &str) -> &'static str {
    match intent {
        "create_party" => "Failed to create party",
        "join_public" | "join_private" => "Failed to join party",
        "toggle_ready" => "Failed to update readiness",
        "leave_party" => "Failed to leave party",
        _ => "Request failed",
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, handle: ConnectionHandle) {
    handle.close();
    drop(handle);
    let _ = writer_task.await;
}
