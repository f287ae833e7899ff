use crate::{
    config::FALLBACK_COLOR,
    dto::{
        matches::MatchStateDto,
        party::members_of,
        ws::{ChatKind, ServerMessage},
    },
    state::{identity::Identity, matches::MatchState, party::Party},
};

/// Author shown on server-generated chat lines.
pub const SYSTEM_USER: &str = "System";

/// Server-generated chat line for `room`.
pub fn system_chat(room: &str, text: impl Into<String>, kind: ChatKind) -> ServerMessage {
    ServerMessage::ChatMessage {
        room: room.to_owned(),
        user: SYSTEM_USER.to_owned(),
        text: text.into(),
        color: None,
        kind,
    }
}

/// Membership delta broadcast to a room.
pub fn party_update(party: &Party) -> ServerMessage {
    ServerMessage::PartyUpdate {
        member_count: party.members.len(),
        max_size: party.max_size,
        members: members_of(party),
    }
}

/// Full room snapshot for `identity`, including the color it was assigned.
pub fn joined_party(party: &Party, identity: &Identity) -> ServerMessage {
    let assigned_color = party
        .member(identity)
        .map(|member| member.color.clone())
        .unwrap_or_else(|| FALLBACK_COLOR.to_owned());
    ServerMessage::JoinedParty {
        room_code: party.code.clone(),
        is_public: party.is_public(),
        member_count: party.members.len(),
        max_size: party.max_size,
        assigned_color,
        members: members_of(party),
    }
}

pub fn match_update(state: &MatchState) -> ServerMessage {
    ServerMessage::MatchUpdate {
        state: MatchStateDto::from(state),
    }
}
