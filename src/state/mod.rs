pub mod countdown;
pub mod identity;
pub mod matches;
pub mod party;
pub mod rooms;
pub mod session;
pub mod timers;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{config::AppConfig, dao::lobby_store::LobbyStore, error::ServiceError};

use self::{
    identity::Identity, matches::MatchTracker, rooms::RoomHub, session::SessionRegistry,
    timers::TimerSlots,
};

pub type SharedState = Arc<AppState>;

/// Central application state: storage handle plus the process-local coordination maps.
pub struct AppState {
    config: Arc<AppConfig>,
    store: RwLock<Option<Arc<dyn LobbyStore>>>,
    sessions: SessionRegistry,
    hub: RoomHub,
    room_locks: DashMap<String, Arc<Mutex<()>>>,
    public_matchmaking: Mutex<()>,
    removals: TimerSlots<Identity>,
    countdowns: TimerSlots<String>,
    matches: MatchTracker,
    match_retention: TimerSlots<String>,
}

/// Exclusive access to one room; released (and its lock entry reclaimed) on drop.
pub struct RoomGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    code: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RoomGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .remove_if(&self.code, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Arc::new(Self::build(config, None))
    }

    /// Construct a state with `store` already installed.
    pub fn with_store(config: AppConfig, store: Arc<dyn LobbyStore>) -> SharedState {
        Arc::new(Self::build(config, Some(store)))
    }

    fn build(config: AppConfig, store: Option<Arc<dyn LobbyStore>>) -> Self {
        Self {
            config: Arc::new(config),
            store: RwLock::new(store),
            sessions: SessionRegistry::new(),
            hub: RoomHub::new(),
            room_locks: DashMap::new(),
            public_matchmaking: Mutex::new(()),
            removals: TimerSlots::new(),
            countdowns: TimerSlots::new(),
            matches: MatchTracker::new(),
            match_retention: TimerSlots::new(),
        }
    }

    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn LobbyStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Current store, or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_store(&self) -> Result<Arc<dyn LobbyStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn LobbyStore>) {
        *self.store.write().await = Some(store);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        self.store.write().await.take();
    }

    /// Whether lobby operations are currently refused for lack of a store.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.store.read().await;
        guard.is_none()
    }

    /// Serialize every mutation of room `code`. Unrelated rooms never contend.
    pub async fn lock_room(&self, code: &str) -> RoomGuard<'_> {
        let lock = self
            .room_locks
            .entry(code.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        RoomGuard {
            locks: &self.room_locks,
            code: code.to_owned(),
            guard: Some(guard),
        }
    }

    /// Gate around "find an open public party or create one".
    pub fn public_matchmaking(&self) -> &Mutex<()> {
        &self.public_matchmaking
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn hub(&self) -> &RoomHub {
        &self.hub
    }

    /// Disconnect reaper timers keyed by identity.
    pub fn removals(&self) -> &TimerSlots<Identity> {
        &self.removals
    }

    /// Countdown timers keyed by room code.
    pub fn countdowns(&self) -> &TimerSlots<String> {
        &self.countdowns
    }

    pub fn matches(&self) -> &MatchTracker {
        &self.matches
    }

    /// Timers dropping settled matches after the retention window.
    pub fn match_retention(&self) -> &TimerSlots<String> {
        &self.match_retention
    }
}
