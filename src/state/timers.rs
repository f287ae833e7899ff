//! Cancellable background timers keyed by room code or identity.

use std::{
    future::Future,
    hash::Hash,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use dashmap::DashMap;
use tokio::sync::Notify;

/// Handle shared between a timer slot and the task it spawned.
///
/// The cancelled flag is authoritative: a task that wakes up after cancellation must check it
/// (through [`TimerToken::sleep`] or [`TimerSlots::complete`]) before acting.
#[derive(Debug, Clone)]
pub struct TimerToken {
    id: u64,
    cancelled: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl TimerToken {
    fn new(id: u64) -> Self {
        Self {
            id,
            cancelled: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// Sleep for `duration`, returning `false` as soon as the timer is cancelled.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => !self.is_cancelled(),
            _ = self.wake.notified() => false,
        }
    }
}

/// At most one live timer per key; arming a key cancels its predecessor.
pub struct TimerSlots<K> {
    slots: DashMap<K, TimerToken>,
    next_id: AtomicU64,
}

impl<K> Default for TimerSlots<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            slots: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<K> TimerSlots<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new timer for `key` and spawn `task` with its token.
    pub fn arm<F, Fut>(&self, key: K, task: F) -> TimerToken
    where
        F: FnOnce(TimerToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = TimerToken::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Some(previous) = self.slots.insert(key, token.clone()) {
            previous.cancel();
        }
        tokio::spawn(task(token.clone()));
        token
    }

    /// Cancel the live timer for `key`, returning whether one existed.
    pub fn cancel(&self, key: &K) -> bool {
        match self.slots.remove(key) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Retire `token` once it fires. Returns `true` only if it was still the live timer and
    /// had not been cancelled, in which case the caller may run its effect.
    pub fn complete(&self, key: &K, token: &TimerToken) -> bool {
        let removed = self
            .slots
            .remove_if(key, |_, live| live.id == token.id)
            .is_some();
        removed && !token.is_cancelled()
    }

    /// Whether `token` is still the live timer for `key`.
    pub fn is_current(&self, key: &K, token: &TimerToken) -> bool {
        !token.is_cancelled()
            && self
                .slots
                .get(key)
                .is_some_and(|live| live.id == token.id)
    }

    pub fn is_armed(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }
}
