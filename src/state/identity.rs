use std::fmt;

use serde::{Serialize, Serializer};

/// Prefix marking locally generated guest identities on the wire.
pub const GUEST_PREFIX: &str = "guest";

const DEFAULT_RATING: i32 = 1200;

/// Logical player behind one or more connections.
///
/// Guests are generated client-side and never get a durable account; registered players map to
/// an account owned by the authentication service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    /// Ephemeral player whose stats only live inside party snapshots.
    Guest {
        /// Full wire identifier, prefix included.
        local_id: String,
    },
    /// Player backed by a durable account record.
    Registered {
        /// Account identifier understood by the user store.
        account_id: String,
    },
}

impl Identity {
    /// Parse a wire identifier, rejecting blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        Some(Self::from(raw))
    }

    /// Wire form of the identity.
    pub fn as_str(&self) -> &str {
        match self {
            Identity::Guest { local_id } => local_id,
            Identity::Registered { account_id } => account_id,
        }
    }

    /// Account id for registered players, `None` for guests.
    pub fn account_id(&self) -> Option<&str> {
        match self {
            Identity::Guest { .. } => None,
            Identity::Registered { account_id } => Some(account_id),
        }
    }

    /// Whether the identity is an ephemeral guest.
    pub fn is_guest(&self) -> bool {
        matches!(self, Identity::Guest { .. })
    }
}

impl From<&str> for Identity {
    fn from(raw: &str) -> Self {
        if raw.starts_with(GUEST_PREFIX) {
            Identity::Guest {
                local_id: raw.to_owned(),
            }
        } else {
            Identity::Registered {
                account_id: raw.to_owned(),
            }
        }
    }
}

impl From<String> for Identity {
    fn from(raw: String) -> Self {
        if raw.starts_with(GUEST_PREFIX) {
            Identity::Guest { local_id: raw }
        } else {
            Identity::Registered { account_id: raw }
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Rating, experience and match count carried for every party member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerStats {
    /// Skill rating.
    pub rating: i32,
    /// Accumulated experience.
    pub xp: u32,
    /// Completed matches.
    pub games_played: u32,
}

impl Default for PlayerStats {
    fn default() -> Self {
        Self {
            rating: DEFAULT_RATING,
            xp: 0,
            games_played: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guest_prefix_selects_variant() {
        let guest = Identity::from("guest_8f2a");
        let account = Identity::from("65f1c0ffee");

        assert!(guest.is_guest());
        assert_eq!(guest.account_id(), None);
        assert_eq!(account.account_id(), Some("65f1c0ffee"));
        assert_eq!(guest.to_string(), "guest_8f2a");
    }

    #[test]
    fn blank_identifiers_are_rejected() {
        assert_eq!(Identity::parse("   "), None);
        assert_eq!(
            Identity::parse(" u1 "),
            Some(Identity::Registered {
                account_id: "u1".into()
            })
        );
    }
}
