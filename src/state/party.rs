use std::time::SystemTime;

use rand::Rng;
use thiserror::Error;

use crate::{
    dao::models::{MemberEntity, PartyEntity, PartyKindEntity},
    state::identity::{Identity, PlayerStats},
};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const PRIVATE_CODE_LEN: usize = 6;
const PUBLIC_CODE_LEN: usize = 5;
const PUBLIC_CODE_PREFIX: &str = "PUB_";

/// Visibility of a party.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyKind {
    /// Auto-matched.
    Public,
    /// Joined by invite code.
    Private,
}

impl PartyKind {
    /// Draw a fresh join code for this kind of party.
    pub fn generate_code(self) -> String {
        let mut rng = rand::rng();
        let mut draw = |len: usize| -> String {
            (0..len)
                .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
                .collect()
        };
        match self {
            PartyKind::Public => format!("{PUBLIC_CODE_PREFIX}{}", draw(PUBLIC_CODE_LEN)),
            PartyKind::Private => draw(PRIVATE_CODE_LEN),
        }
    }
}

/// One player seated in a party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub identity: Identity,
    pub username: String,
    /// Set for the creator of a private party. Carries no permissions.
    pub is_leader: bool,
    pub color: String,
    pub is_ready: bool,
    pub stats: PlayerStats,
}

/// In-memory view of a persisted party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Party {
    pub code: String,
    pub kind: PartyKind,
    pub max_size: usize,
    pub members: Vec<Member>,
    pub created_at: SystemTime,
}

/// Rejected membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("party is full")]
pub struct PartyFull;

impl Party {
    /// Empty party created now.
    pub fn new(code: String, kind: PartyKind, max_size: usize) -> Self {
        Self {
            code,
            kind,
            max_size,
            members: Vec::new(),
            created_at: SystemTime::now(),
        }
    }

    pub fn is_public(&self) -> bool {
        self.kind == PartyKind::Public
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.max_size
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member(&self, identity: &Identity) -> Option<&Member> {
        self.members.iter().find(|member| &member.identity == identity)
    }

    pub fn member_mut(&mut self, identity: &Identity) -> Option<&mut Member> {
        self.members
            .iter_mut()
            .find(|member| &member.identity == identity)
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.member(identity).is_some()
    }

    /// Colors currently held by members, in seat order.
    pub fn used_colors(&self) -> Vec<&str> {
        self.members
            .iter()
            .map(|member| member.color.as_str())
            .collect()
    }

    /// Append a member, refusing once capacity is reached.
    pub fn push_member(&mut self, member: Member) -> Result<(), PartyFull> {
        if self.is_full() {
            return Err(PartyFull);
        }
        self.members.push(member);
        Ok(())
    }

    /// Remove `identity`, returning the departed member.
    pub fn remove_member(&mut self, identity: &Identity) -> Option<Member> {
        let index = self
            .members
            .iter()
            .position(|member| &member.identity == identity)?;
        Some(self.members.remove(index))
    }

    /// Flip the ready flag of `identity`, returning the new value.
    pub fn toggle_ready(&mut self, identity: &Identity) -> Option<bool> {
        let member = self.member_mut(identity)?;
        member.is_ready = !member.is_ready;
        Some(member.is_ready)
    }

    /// True when the party has members and every one of them is ready.
    pub fn all_ready(&self) -> bool {
        !self.members.is_empty() && self.members.iter().all(|member| member.is_ready)
    }

    pub fn reset_readiness(&mut self) {
        for member in &mut self.members {
            member.is_ready = false;
        }
    }
}

impl From<PartyKindEntity> for PartyKind {
    fn from(value: PartyKindEntity) -> Self {
        match value {
            PartyKindEntity::Public => PartyKind::Public,
            PartyKindEntity::Private => PartyKind::Private,
        }
    }
}

impl From<PartyKind> for PartyKindEntity {
    fn from(value: PartyKind) -> Self {
        match value {
            PartyKind::Public => PartyKindEntity::Public,
            PartyKind::Private => PartyKindEntity::Private,
        }
    }
}

impl From<MemberEntity> for Member {
    fn from(value: MemberEntity) -> Self {
        Self {
            identity: Identity::from(value.id),
            username: value.username,
            is_leader: value.is_leader,
            color: value.color,
            is_ready: value.is_ready,
            stats: PlayerStats {
                rating: value.rating,
                xp: value.xp,
                games_played: value.games_played,
            },
        }
    }
}

impl From<Member> for MemberEntity {
    fn from(value: Member) -> Self {
        Self {
            id: value.identity.as_str().to_owned(),
            username: value.username,
            is_leader: value.is_leader,
            color: value.color,
            is_ready: value.is_ready,
            rating: value.stats.rating,
            xp: value.stats.xp,
            games_played: value.stats.games_played,
        }
    }
}

impl From<PartyEntity> for Party {
    fn from(value: PartyEntity) -> Self {
        Self {
            code: value.code,
            kind: value.kind.into(),
            max_size: value.max_size,
            members: value.members.into_iter().map(Into::into).collect(),
            created_at: value.created_at,
        }
    }
}

impl From<Party> for PartyEntity {
    fn from(value: Party) -> Self {
        Self {
            code: value.code,
            kind: value.kind.into(),
            max_size: value.max_size,
            members: value.members.into_iter().map(Into::into).collect(),
            created_at: value.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: &str) -> Member {
        Member {
            identity: Identity::from(id),
            username: id.to_uppercase(),
            is_leader: false,
            color: "#ef4444".into(),
            is_ready: false,
            stats: PlayerStats::default(),
        }
    }

    #[test]
    fn codes_follow_kind_format() {
        let private = PartyKind::Private.generate_code();
        let public = PartyKind::Public.generate_code();

        assert_eq!(private.len(), 6);
        assert!(private.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        assert!(public.starts_with("PUB_"));
        assert_eq!(public.len(), 9);
    }

    #[test]
    fn push_member_respects_capacity() {
        let mut party = Party::new("ABC123".into(), PartyKind::Private, 2);
        party.push_member(member("a")).unwrap();
        party.push_member(member("b")).unwrap();
        assert_eq!(party.push_member(member("c")), Err(PartyFull));
        assert_eq!(party.members.len(), 2);
    }

    #[test]
    fn all_ready_needs_members() {
        let mut party = Party::new("ABC123".into(), PartyKind::Private, 4);
        assert!(!party.all_ready());

        party.push_member(member("a")).unwrap();
        party.push_member(member("b")).unwrap();
        assert_eq!(party.toggle_ready(&Identity::from("a")), Some(true));
        assert!(!party.all_ready());
        assert_eq!(party.toggle_ready(&Identity::from("b")), Some(true));
        assert!(party.all_ready());

        party.reset_readiness();
        assert!(!party.all_ready());
    }

    #[test]
    fn entity_round_trip_keeps_guest_tag() {
        let mut party = Party::new("PUB_AAAAA".into(), PartyKind::Public, 4);
        party.push_member(member("guest_1")).unwrap();

        let entity: PartyEntity = party.clone().into();
        assert_eq!(entity.members[0].id, "guest_1");
        let back: Party = entity.into();
        assert!(back.members[0].identity.is_guest());
        assert_eq!(back, party);
    }
}
