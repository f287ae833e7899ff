use tracing::debug;

use crate::{
    dto::ws::{ChatKind, ChatRequest, ServerMessage},
    state::{SharedState, identity::Identity, rooms::ConnectionHandle},
};

/// Relay a chat line to `request.room`, provided the sender is listening to that room.
pub fn send_chat(
    state: &SharedState,
    connection: &ConnectionHandle,
    identity: &Identity,
    request: &ChatRequest,
) {
    let hub = state.hub();
    let room = request.room.as_str();
    if hub.group_of(connection.id).as_deref() != Some(room) {
        debug!(connection = %connection.id, room = %room, "chat dropped: sender not in room");
        return;
    }

    let user = hub
        .display_name(connection.id)
        .unwrap_or_else(|| identity.to_string());
    hub.broadcast(
        room,
        &ServerMessage::ChatMessage {
            room: room.to_owned(),
            user,
            text: request.text.trim().to_owned(),
            color: request.color.clone(),
            kind: ChatKind::User,
        },
    );
}
