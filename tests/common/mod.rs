#![allow(dead_code)]

use std::sync::Arc;

use raceparty_back::{
    config::AppConfig,
    dao::{lobby_store::MemoryStore, models::UserEntity},
    dto::ws::{ClientIntent, ServerMessage},
    services::{session_service, websocket_service::handle_intent},
    state::{
        AppState, SharedState,
        rooms::{ConnectionHandle, Outbound},
    },
};
use tokio::sync::mpsc;

/// Lobby wired to an in-memory store.
pub struct Lobby {
    pub state: SharedState,
    pub store: MemoryStore,
}

impl Lobby {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let store = MemoryStore::new(config.party_ttl);
        let state = AppState::with_store(config, Arc::new(store.clone()));
        Self { state, store }
    }

    /// Seed an account with the given rating.
    pub fn register(&self, id: &str, username: &str, rating: i32) {
        self.store.insert_user(UserEntity {
            id: id.to_owned(),
            username: username.to_owned(),
            rating,
            xp: 0,
            games_played: 0,
            current_party: None,
        });
    }

    pub fn connect(&self) -> Client {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = session_service::open_connection(&self.state, tx);
        Client {
            state: self.state.clone(),
            handle,
            rx,
        }
    }

    /// Open a connection and identify it as `identity`.
    pub async fn player(&self, identity: &str) -> Client {
        let mut client = self.connect();
        client.identify(identity).await;
        client.drain();
        client
    }
}

/// Fake socket: intents go straight to the dispatcher, events queue up in `rx`.
pub struct Client {
    pub state: SharedState,
    pub handle: ConnectionHandle,
    pub rx: mpsc::UnboundedReceiver<Outbound>,
}

impl Client {
    pub async fn send(&self, raw: &str) {
        let intent = ClientIntent::from_json_str(raw).expect("valid intent");
        handle_intent(&self.state, &self.handle, intent).await;
    }

    pub async fn identify(&self, identity: &str) {
        self.send(&format!(r#"{{"type":"identify","identity":"{identity}"}}"#))
            .await;
    }

    pub async fn create_party(&self, id: &str, username: &str) {
        self.send(&format!(
            r#"{{"type":"create_party","profile":{{"_id":"{id}","username":"{username}"}}}}"#
        ))
        .await;
    }

    pub async fn join_public(&self, id: &str, username: &str) {
        self.send(&format!(
            r#"{{"type":"join_public","profile":{{"_id":"{id}","username":"{username}"}}}}"#
        ))
        .await;
    }

    pub async fn join_private(&self, code: &str, id: &str, username: &str) {
        self.send(&format!(
            r#"{{"type":"join_private","code":"{code}","profile":{{"_id":"{id}","username":"{username}"}}}}"#
        ))
        .await;
    }

    pub async fn toggle_ready(&self, code: &str) {
        self.send(&format!(r#"{{"type":"toggle_ready","room_code":"{code}"}}"#))
            .await;
    }

    pub async fn leave(&self, code: &str) {
        self.send(&format!(r#"{{"type":"leave_party","room_code":"{code}"}}"#))
            .await;
    }

    pub async fn finish(&self, code: &str, identity: &str) {
        self.send(&format!(
            r#"{{"type":"submit_finish","room_code":"{code}","identity":"{identity}"}}"#
        ))
        .await;
    }

    /// Everything queued so far.
    pub fn drain(&mut self) -> Vec<Outbound> {
        let mut items = Vec::new();
        while let Ok(item) = self.rx.try_recv() {
            items.push(item);
        }
        items
    }

    /// Queued events, skipping control items.
    pub fn events(&mut self) -> Vec<ServerMessage> {
        self.drain()
            .into_iter()
            .filter_map(|item| match item {
                Outbound::Event(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    /// Simulate the socket going away.
    pub fn disconnect(self) {
        session_service::close_connection(&self.state, self.handle.id);
    }
}

/// Room code from the first `joined_party` event.
pub fn joined_room(events: &[ServerMessage]) -> Option<String> {
    events.iter().find_map(|event| match event {
        ServerMessage::JoinedParty { room_code, .. } => Some(room_code.clone()),
        _ => None,
    })
}

/// Text of every chat line.
pub fn chat_lines(events: &[ServerMessage]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            ServerMessage::ChatMessage { text, .. } => Some(text.clone()),
            _ => None,
        })
        .collect()
}

/// Let spawned tasks run without advancing time.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
