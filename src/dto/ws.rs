use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::{
    dto::{
        matches::MatchStateDto,
        party::MemberDto,
        validation::{
            normalize_room_code, validate_chat_text, validate_identity, validate_room_code,
        },
    },
    state::identity::{Identity, PlayerStats},
};

/// Reason an inbound frame could not be turned into an intent.
#[derive(Debug, Error)]
pub enum IntentError {
    #[error("malformed intent: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid intent: {0}")]
    Invalid(#[from] ValidationErrors),
}

/// Player profile echoed by the client with most lobby intents.
///
/// Field aliases accept the camelCase names the web client stores locally.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct ProfileDto {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub username: String,
    #[serde(default, alias = "elo")]
    pub rating: Option<i32>,
    #[serde(default)]
    pub xp: Option<u32>,
    #[serde(default, alias = "gamesPlayed")]
    pub games_played: Option<u32>,
}

impl ProfileDto {
    /// Stats claimed by the client, with defaults for anything missing.
    pub fn claimed_stats(&self) -> PlayerStats {
        let defaults = PlayerStats::default();
        PlayerStats {
            rating: self.rating.unwrap_or(defaults.rating),
            xp: self.xp.unwrap_or(defaults.xp),
            games_played: self.games_played.unwrap_or(defaults.games_played),
        }
    }

    /// Whether the embedded id, when present, names `identity`.
    pub fn matches(&self, identity: &Identity) -> bool {
        self.id
            .as_deref()
            .is_none_or(|id| id.trim().is_empty() || id == identity.as_str())
    }
}

/// `identify` payload.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct IdentifyRequest {
    pub identity: String,
}

impl Validate for IdentifyRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_identity(&self.identity) {
            errors.add("identity", e);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Payload of intents that only carry the caller's profile.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
pub struct ProfileRequest {
    #[validate(nested)]
    pub profile: ProfileDto,
}

fn room_code<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    String::deserialize(deserializer).map(|code| normalize_room_code(&code))
}

fn optional_room_code<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Option::<String>::deserialize(deserializer).map(|code| code.map(|c| normalize_room_code(&c)))
}

/// `join_private` payload.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct JoinPrivateRequest {
    #[serde(deserialize_with = "room_code")]
    pub code: String,
    pub profile: ProfileDto,
}

impl Validate for JoinPrivateRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_room_code(&self.code) {
            errors.add("code", e);
        }
        errors.merge_self("profile", self.profile.validate());
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// `toggle_ready` payload.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ToggleReadyRequest {
    #[serde(deserialize_with = "room_code")]
    pub room_code: String,
    #[serde(default)]
    pub profile: Option<ProfileDto>,
}

impl Validate for ToggleReadyRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_room_code(&self.room_code) {
            errors.add("room_code", e);
        }
        if let Some(profile) = &self.profile {
            errors.merge_self("profile", profile.validate());
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// `leave_party` payload. Both fields are optional; the room is resolved from membership.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct LeavePartyRequest {
    #[serde(default)]
    pub profile: Option<ProfileDto>,
    #[serde(default, deserialize_with = "optional_room_code")]
    pub room_code: Option<String>,
}

impl Validate for LeavePartyRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(code) = &self.room_code {
            if let Err(e) = validate_room_code(code) {
                errors.add("room_code", e);
            }
        }
        if let Some(profile) = &self.profile {
            errors.merge_self("profile", profile.validate());
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Payload addressing a room by code.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct RoomRequest {
    #[serde(deserialize_with = "room_code")]
    pub room_code: String,
}

impl Validate for RoomRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_room_code(&self.room_code) {
            errors.add("room_code", e);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// `submit_finish` payload.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct SubmitFinishRequest {
    #[serde(deserialize_with = "room_code")]
    pub room_code: String,
    pub identity: String,
}

impl Validate for SubmitFinishRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_room_code(&self.room_code) {
            errors.add("room_code", e);
        }
        if let Err(e) = validate_identity(&self.identity) {
            errors.add("identity", e);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// `send_chat` payload.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ChatRequest {
    #[serde(deserialize_with = "room_code")]
    pub room: String,
    pub text: String,
    #[serde(default)]
    pub color: Option<String>,
}

impl Validate for ChatRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_room_code(&self.room) {
            errors.add("room", e);
        }
        if let Err(e) = validate_chat_text(&self.text) {
            errors.add("text", e);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Intents accepted from lobby WebSocket clients.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientIntent {
    Identify(IdentifyRequest),
    SyncState(ProfileRequest),
    CreateParty(ProfileRequest),
    JoinPublic(ProfileRequest),
    JoinPrivate(JoinPrivateRequest),
    ToggleReady(ToggleReadyRequest),
    LeaveParty(LeavePartyRequest),
    GetMatchState(RoomRequest),
    SubmitFinish(SubmitFinishRequest),
    SendChat(ChatRequest),
    #[serde(other)]
    Unknown,
}

impl ClientIntent {
    /// Parse a text frame and validate its payload.
    pub fn from_json_str(raw: &str) -> Result<Self, IntentError> {
        let intent: Self = serde_json::from_str(raw)?;
        intent.validate()?;
        Ok(intent)
    }

    /// Wire name of the intent, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            ClientIntent::Identify(_) => "identify",
            ClientIntent::SyncState(_) => "sync_state",
            ClientIntent::CreateParty(_) => "create_party",
            ClientIntent::JoinPublic(_) => "join_public",
            ClientIntent::JoinPrivate(_) => "join_private",
            ClientIntent::ToggleReady(_) => "toggle_ready",
            ClientIntent::LeaveParty(_) => "leave_party",
            ClientIntent::GetMatchState(_) => "get_match_state",
            ClientIntent::SubmitFinish(_) => "submit_finish",
            ClientIntent::SendChat(_) => "send_chat",
            ClientIntent::Unknown => "unknown",
        }
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            ClientIntent::Identify(request) => request.validate(),
            ClientIntent::SyncState(request)
            | ClientIntent::CreateParty(request)
            | ClientIntent::JoinPublic(request) => request.validate(),
            ClientIntent::JoinPrivate(request) => request.validate(),
            ClientIntent::ToggleReady(request) => request.validate(),
            ClientIntent::LeaveParty(request) => request.validate(),
            ClientIntent::GetMatchState(request) => request.validate(),
            ClientIntent::SubmitFinish(request) => request.validate(),
            ClientIntent::SendChat(request) => request.validate(),
            ClientIntent::Unknown => Ok(()),
        }
    }
}

/// Styling hint attached to chat lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    User,
    System,
    SystemGreen,
}

/// Events pushed to lobby WebSocket clients.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The identify attempt lost an ownership race; the socket is closed next.
    SessionDenied,
    /// Another connection took over this identity; the socket is closed next.
    SessionReplaced,
    JoinedParty {
        room_code: String,
        is_public: bool,
        member_count: usize,
        max_size: usize,
        assigned_color: String,
        members: Vec<MemberDto>,
    },
    LeftParty,
    PartyError {
        message: String,
    },
    PartyUpdate {
        member_count: usize,
        max_size: usize,
        members: Vec<MemberDto>,
    },
    CountdownCanceled,
    MatchStart {
        match_id: String,
    },
    MatchUpdate {
        state: MatchStateDto,
    },
    RatingUpdate {
        identity: String,
        rating: i32,
        xp: u32,
        games_played: u32,
        delta: i32,
    },
    ChatMessage {
        room: String,
        user: String,
        text: String,
        color: Option<String>,
        kind: ChatKind,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_intents() {
        let intent = ClientIntent::from_json_str(
            r#"{"type":"join_private","code":"ABC123","profile":{"_id":"u1","username":"ada","elo":1400,"gamesPlayed":7}}"#,
        )
        .unwrap();

        let ClientIntent::JoinPrivate(request) = intent else {
            panic!("unexpected intent");
        };
        assert_eq!(request.code, "ABC123");
        assert_eq!(request.profile.id.as_deref(), Some("u1"));
        let stats = request.profile.claimed_stats();
        assert_eq!(stats.rating, 1400);
        assert_eq!(stats.xp, 0);
        assert_eq!(stats.games_played, 7);
    }

    #[test]
    fn room_codes_are_normalized_on_every_intent() {
        let intent =
            ClientIntent::from_json_str(r#"{"type":"toggle_ready","room_code":" abc123 "}"#).unwrap();
        let ClientIntent::ToggleReady(request) = intent else {
            panic!("unexpected intent");
        };
        assert_eq!(request.room_code, "ABC123");

        let intent =
            ClientIntent::from_json_str(r#"{"type":"leave_party","room_code":"pub_7xk2q"}"#).unwrap();
        let ClientIntent::LeaveParty(request) = intent else {
            panic!("unexpected intent");
        };
        assert_eq!(request.room_code.as_deref(), Some("PUB_7XK2Q"));

        let intent = ClientIntent::from_json_str(r#"{"type":"leave_party"}"#).unwrap();
        let ClientIntent::LeaveParty(request) = intent else {
            panic!("unexpected intent");
        };
        assert_eq!(request.room_code, None);
    }

    #[test]
    fn unknown_intent_type_is_tolerated() {
        let intent = ClientIntent::from_json_str(r#"{"type":"dance"}"#).unwrap();
        assert!(matches!(intent, ClientIntent::Unknown));
    }

    #[test]
    fn oversized_chat_is_rejected() {
        let raw = format!(
            r#"{{"type":"send_chat","room":"ABC123","text":"{}"}}"#,
            "x".repeat(501)
        );
        assert!(matches!(
            ClientIntent::from_json_str(&raw),
            Err(IntentError::Invalid(_))
        ));
    }

    #[test]
    fn blank_username_is_rejected() {
        let raw = r#"{"type":"create_party","profile":{"username":""}}"#;
        assert!(matches!(
            ClientIntent::from_json_str(raw),
            Err(IntentError::Invalid(_))
        ));
    }

    #[test]
    fn server_messages_are_tagged() {
        let value = serde_json::to_value(ServerMessage::MatchStart {
            match_id: "ABC123".into(),
        })
        .unwrap();
        assert_eq!(value["type"], "match_start");
        assert_eq!(value["match_id"], "ABC123");

        let value = serde_json::to_value(ServerMessage::CountdownCanceled).unwrap();
        assert_eq!(value["type"], "countdown_canceled");

        let value = serde_json::to_value(ServerMessage::ChatMessage {
            room: "ABC123".into(),
            user: "System".into(),
            text: "Starting game!".into(),
            color: None,
            kind: ChatKind::SystemGreen,
        })
        .unwrap();
        assert_eq!(value["kind"], "system_green");
    }

    #[test]
    fn profile_id_must_match_identity() {
        let identity = Identity::from("u1");
        let mut profile = ProfileDto {
            username: "ada".into(),
            ..ProfileDto::default()
        };
        assert!(profile.matches(&identity));
        profile.id = Some("u1".into());
        assert!(profile.matches(&identity));
        profile.id = Some("u2".into());
        assert!(!profile.matches(&identity));
    }
}
