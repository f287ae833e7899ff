use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use tracing::debug;

use crate::dao::{
    lobby_store::LobbyStore,
    models::{PartyEntity, PartyKindEntity, UserEntity, UserStatsEntity},
    storage::StorageResult,
};

/// Process-local store used when no database is configured and by the test-suite.
///
/// Party expiry is applied lazily on every read and eagerly by [`MemoryStore::purge_expired`].
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    parties: DashMap<String, PartyEntity>,
    users: DashMap<String, UserEntity>,
    party_ttl: Duration,
}

impl MemoryStore {
    /// Build an empty store whose parties expire after `party_ttl`.
    pub fn new(party_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                parties: DashMap::new(),
                users: DashMap::new(),
                party_ttl,
            }),
        }
    }

    /// Seed or replace an account record.
    pub fn insert_user(&self, user: UserEntity) {
        self.inner.users.insert(user.id.clone(), user);
    }

    /// Snapshot of an account record, bypassing the async interface.
    pub fn user(&self, id: &str) -> Option<UserEntity> {
        self.inner.users.get(id).map(|entry| entry.value().clone())
    }

    /// Number of live parties.
    pub fn party_count(&self) -> usize {
        self.inner.parties.len()
    }

    /// Drop every party older than the configured TTL, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = SystemTime::now();
        let before = self.inner.parties.len();
        self.inner
            .parties
            .retain(|_, party| !self.inner.is_expired(party, now));
        let purged = before.saturating_sub(self.inner.parties.len());
        if purged > 0 {
            debug!(purged, "expired parties purged");
        }
        purged
    }

    fn live_parties(&self) -> Vec<PartyEntity> {
        let now = SystemTime::now();
        self.inner
            .parties
            .iter()
            .filter(|entry| !self.inner.is_expired(entry.value(), now))
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn party(&self, code: &str) -> Option<PartyEntity> {
        let now = SystemTime::now();
        let party = self.inner.parties.get(code)?.value().clone();
        if self.inner.is_expired(&party, now) {
            self.inner
                .parties
                .remove_if(code, |_, stored| stored.created_at == party.created_at);
            return None;
        }
        Some(party)
    }
}

impl MemoryInner {
    fn is_expired(&self, party: &PartyEntity, now: SystemTime) -> bool {
        now.duration_since(party.created_at)
            .map(|age| age >= self.party_ttl)
            .unwrap_or(false)
    }
}

impl LobbyStore for MemoryStore {
    fn find_party(&self, code: String) -> BoxFuture<'static, StorageResult<Option<PartyEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.party(&code)) })
    }

    fn find_party_by_member(
        &self,
        member_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<PartyEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .live_parties()
                .into_iter()
                .find(|party| party.members.iter().any(|member| member.id == member_id)))
        })
    }

    fn find_open_public_party(
        &self,
        capacity: usize,
    ) -> BoxFuture<'static, StorageResult<Option<PartyEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut candidates: Vec<PartyEntity> = store
                .live_parties()
                .into_iter()
                .filter(|party| {
                    party.kind == PartyKindEntity::Public && party.members.len() < capacity
                })
                .collect();
            candidates.sort_by_key(|party| party.created_at);
            Ok(candidates.into_iter().next())
        })
    }

    fn list_parties_with_member(
        &self,
        member_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<PartyEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .live_parties()
                .into_iter()
                .filter(|party| party.members.iter().any(|member| member.id == member_id))
                .collect())
        })
    }

    fn save_party(&self, party: PartyEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.parties.insert(party.code.clone(), party);
            Ok(())
        })
    }

    fn delete_party(&self, code: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.parties.remove(&code).is_some()) })
    }

    fn find_user(&self, id: String) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.user(&id)) })
    }

    fn update_user_stats(
        &self,
        id: String,
        stats: UserStatsEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if let Some(mut user) = store.inner.users.get_mut(&id) {
                user.rating = stats.rating;
                user.xp = stats.xp;
                user.games_played = stats.games_played;
            }
            Ok(())
        })
    }

    fn set_current_party(
        &self,
        id: String,
        code: Option<String>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if let Some(mut user) = store.inner.users.get_mut(&id) {
                user.current_party = code;
            }
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
