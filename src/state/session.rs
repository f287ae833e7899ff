use dashmap::{DashMap, DashSet, mapref::entry::Entry};
use thiserror::Error;

use crate::state::{
    identity::Identity,
    rooms::{ConnectionHandle, ConnectionId},
};

/// Ownership failures surfaced to the losing connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Lost an ownership race or was already revoked.
    #[error("session denied")]
    Denied,
    /// Ownership moved to another connection.
    #[error("session replaced")]
    Replaced,
    /// The connection has not identified yet.
    #[error("connection has not identified")]
    NotIdentified,
}

/// First half of an ownership transfer.
#[derive(Debug)]
pub enum Claim {
    /// The connection already owns the identity.
    AlreadyOwner,
    /// Nobody owned the identity; the connection is now the owner.
    Installed,
    /// The previous owner has been revoked and must be closed before
    /// [`SessionRegistry::complete_claim`] is called.
    Evict(ConnectionHandle),
}

#[derive(Default)]
struct Slot {
    owner: Option<ConnectionHandle>,
    claimant: Option<ConnectionId>,
}

/// Single-owner binding between identities and connections.
///
/// Every transition of a slot happens under the slot's map entry, so check, evict and install
/// cannot interleave for one identity. A pending claimant blocks further claims until it either
/// completes or is abandoned, and revoked connections can never claim again.
#[derive(Default)]
pub struct SessionRegistry {
    slots: DashMap<Identity, Slot>,
    bindings: DashMap<ConnectionId, Identity>,
    revoked: DashSet<ConnectionId>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start binding `handle` as the owner of `identity`.
    pub fn begin_claim(
        &self,
        identity: &Identity,
        handle: &ConnectionHandle,
    ) -> Result<Claim, SessionError> {
        if self.revoked.contains(&handle.id) {
            return Err(SessionError::Denied);
        }

        let mut slot = self.slots.entry(identity.clone()).or_default();
        if slot.claimant.is_some_and(|claimant| claimant != handle.id) {
            return Err(SessionError::Denied);
        }

        match slot.owner.as_ref() {
            None => {
                slot.owner = Some(handle.clone());
                slot.claimant = None;
                self.bindings.insert(handle.id, identity.clone());
                Ok(Claim::Installed)
            }
            Some(owner) if owner.id == handle.id => Ok(Claim::AlreadyOwner),
            Some(owner) => {
                let previous = owner.clone();
                slot.claimant = Some(handle.id);
                self.revoked.insert(previous.id);
                self.bindings.remove(&previous.id);
                Ok(Claim::Evict(previous))
            }
        }
    }

    /// Finish an eviction started by [`Self::begin_claim`].
    ///
    /// Fails when the claim was superseded, or the claimant was revoked or closed meanwhile.
    pub fn complete_claim(
        &self,
        identity: &Identity,
        handle: &ConnectionHandle,
    ) -> Result<(), SessionError> {
        {
            let Some(mut slot) = self.slots.get_mut(identity) else {
                return Err(SessionError::Denied);
            };
            if slot.claimant != Some(handle.id) {
                return Err(SessionError::Denied);
            }
            slot.claimant = None;
            if !self.revoked.contains(&handle.id) && !handle.is_closed() {
                slot.owner = Some(handle.clone());
                self.bindings.insert(handle.id, identity.clone());
                return Ok(());
            }
            slot.owner = None;
        }
        self.slots
            .remove_if(identity, |_, slot| slot.owner.is_none() && slot.claimant.is_none());
        Err(SessionError::Denied)
    }

    /// Mark a connection as permanently unable to own anything.
    pub fn revoke(&self, id: ConnectionId) {
        self.revoked.insert(id);
    }

    pub fn is_revoked(&self, id: ConnectionId) -> bool {
        self.revoked.contains(&id)
    }

    /// Identity owned by `id`, gating every intent but `identify`.
    pub fn authorize(&self, id: ConnectionId) -> Result<Identity, SessionError> {
        if self.revoked.contains(&id) {
            return Err(SessionError::Replaced);
        }
        self.bindings
            .get(&id)
            .map(|identity| identity.clone())
            .ok_or(SessionError::NotIdentified)
    }

    /// Identity bound to `id`, if any.
    pub fn identity_of(&self, id: ConnectionId) -> Option<Identity> {
        self.bindings.get(&id).map(|identity| identity.clone())
    }

    pub fn is_owned(&self, identity: &Identity) -> bool {
        self.slots
            .get(identity)
            .is_some_and(|slot| slot.owner.is_some())
    }

    pub fn owner(&self, identity: &Identity) -> Option<ConnectionHandle> {
        self.slots.get(identity).and_then(|slot| slot.owner.clone())
    }

    /// Drop whatever `id` owns or is claiming.
    ///
    /// Returns the identity only when `id` was its owner; that is the signal to arm the
    /// disconnect reaper.
    pub fn release(&self, id: ConnectionId) -> Option<Identity> {
        let identity = self.bindings.remove(&id).map(|(_, identity)| identity)?;
        match self.slots.entry(identity.clone()) {
            Entry::Occupied(mut entry) => {
                let slot = entry.get_mut();
                let was_owner = slot.owner.as_ref().is_some_and(|owner| owner.id == id);
                if was_owner {
                    slot.owner = None;
                }
                if slot.owner.is_none() && slot.claimant.is_none() {
                    entry.remove();
                }
                was_owner.then_some(identity)
            }
            Entry::Vacant(_) => None,
        }
    }

    /// Forget a closed connection's revocation marker.
    pub fn forget(&self, id: ConnectionId) {
        self.revoked.remove(&id);
    }
}
