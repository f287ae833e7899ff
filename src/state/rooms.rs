use std::collections::HashSet;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::dto::ws::ServerMessage;

/// Identifier of one physical socket.
pub type ConnectionId = Uuid;

/// Broadcast group every connection starts in.
pub const GLOBAL_GROUP: &str = "global";

/// Item queued for a socket's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Event(ServerMessage),
    /// Answer a ping with the same payload.
    Pong(Vec<u8>),
    /// Send a close frame and stop writing.
    Close,
}

/// Cloneable handle used to push events to a connected socket.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ConnectionHandle {
    /// Wrap the sending half of a socket's outbound queue.
    pub fn new(tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx,
        }
    }

    /// Queue an event. Returns `false` once the writer is gone.
    pub fn send(&self, message: ServerMessage) -> bool {
        self.tx.send(Outbound::Event(message)).is_ok()
    }

    /// Queue a pong frame.
    pub fn pong(&self, payload: Vec<u8>) {
        let _ = self.tx.send(Outbound::Pong(payload));
    }

    /// Ask the writer to close the socket.
    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the writer task has dropped its receiver.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

struct Attached {
    handle: ConnectionHandle,
    group: String,
    display_name: Option<String>,
}

/// Membership of live connections in broadcast groups (one group per party plus `global`).
#[derive(Default)]
pub struct RoomHub {
    connections: DashMap<ConnectionId, Attached>,
    groups: DashMap<String, HashSet<ConnectionId>>,
}

impl RoomHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh connection in the global group.
    pub fn attach(&self, handle: ConnectionHandle) {
        let id = handle.id;
        self.connections.insert(
            id,
            Attached {
                handle,
                group: GLOBAL_GROUP.to_owned(),
                display_name: None,
            },
        );
        self.groups
            .entry(GLOBAL_GROUP.to_owned())
            .or_default()
            .insert(id);
    }

    /// Forget a connection entirely.
    pub fn detach(&self, id: ConnectionId) {
        if let Some((_, attached)) = self.connections.remove(&id) {
            self.leave_group(&attached.group, id);
        }
    }

    /// Move a connection into `group`, leaving whatever group it was in.
    pub fn move_to(&self, id: ConnectionId, group: &str) {
        let previous = {
            let Some(mut attached) = self.connections.get_mut(&id) else {
                return;
            };
            if attached.group == group {
                return;
            }
            std::mem::replace(&mut attached.group, group.to_owned())
        };
        self.leave_group(&previous, id);
        self.groups.entry(group.to_owned()).or_default().insert(id);
        debug!(connection = %id, from = %previous, to = %group, "connection moved");
    }

    /// Group the connection currently listens to.
    pub fn group_of(&self, id: ConnectionId) -> Option<String> {
        self.connections.get(&id).map(|attached| attached.group.clone())
    }

    pub fn handle(&self, id: ConnectionId) -> Option<ConnectionHandle> {
        self.connections
            .get(&id)
            .map(|attached| attached.handle.clone())
    }

    pub fn set_display_name(&self, id: ConnectionId, name: &str) {
        if let Some(mut attached) = self.connections.get_mut(&id) {
            attached.display_name = Some(name.to_owned());
        }
    }

    pub fn display_name(&self, id: ConnectionId) -> Option<String> {
        self.connections
            .get(&id)
            .and_then(|attached| attached.display_name.clone())
    }

    /// Send to a single connection, ignoring unknown ids.
    pub fn send_to(&self, id: ConnectionId, message: ServerMessage) {
        if let Some(handle) = self.handle(id) {
            handle.send(message);
        }
    }

    /// Send to every connection in `group`.
    pub fn broadcast(&self, group: &str, message: &ServerMessage) {
        self.broadcast_filtered(group, None, message);
    }

    /// Send to every connection in `group` but `except`.
    pub fn broadcast_except(&self, group: &str, except: ConnectionId, message: &ServerMessage) {
        self.broadcast_filtered(group, Some(except), message);
    }

    /// Number of attached connections, whatever their group.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of connections listening to `group`.
    pub fn group_size(&self, group: &str) -> usize {
        self.groups.get(group).map_or(0, |members| members.len())
    }

    fn broadcast_filtered(&self, group: &str, except: Option<ConnectionId>, message: &ServerMessage) {
        let targets: Vec<ConnectionId> = match self.groups.get(group) {
            Some(members) => members
                .iter()
                .copied()
                .filter(|id| Some(*id) != except)
                .collect(),
            None => return,
        };
        for id in targets {
            self.send_to(id, message.clone());
        }
    }

    fn leave_group(&self, group: &str, id: ConnectionId) {
        if let Some(mut members) = self.groups.get_mut(group) {
            members.remove(&id);
        }
        self.groups.remove_if(group, |_, members| members.is_empty());
    }
}
