use serde::Serialize;
use utoipa::ToSchema;

use crate::state::party::{Member, Party};

/// Party member as shown in the lobby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct MemberDto {
    pub id: String,
    pub username: String,
    pub is_leader: bool,
    pub color: String,
    pub is_ready: bool,
    pub rating: i32,
    pub xp: u32,
    pub games_played: u32,
}

impl From<&Member> for MemberDto {
    fn from(member: &Member) -> Self {
        Self {
            id: member.identity.to_string(),
            username: member.username.clone(),
            is_leader: member.is_leader,
            color: member.color.clone(),
            is_ready: member.is_ready,
            rating: member.stats.rating,
            xp: member.stats.xp,
            games_played: member.stats.games_played,
        }
    }
}

/// Member list in seat order.
pub fn members_of(party: &Party) -> Vec<MemberDto> {
    party.members.iter().map(MemberDto::from).collect()
}
