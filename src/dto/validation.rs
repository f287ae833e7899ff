//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest chat line relayed to a room, in characters.
pub const MAX_CHAT_LEN: usize = 500;
const MAX_ROOM_CODE_LEN: usize = 16;

/// Validates a room or party code: 1 to 16 ASCII letters, digits or underscores.
///
/// # Examples
///
/// ```ignore
/// validate_room_code("ABC123")    // Ok
/// validate_room_code("PUB_7XK2Q") // Ok
/// validate_room_code("AB C")      // Err - space
/// ```
pub fn validate_room_code(code: &str) -> Result<(), ValidationError> {
    let code = code.trim();
    if code.is_empty() || code.len() > MAX_ROOM_CODE_LEN {
        let mut err = ValidationError::new("room_code_length");
        err.message = Some(
            format!("Room code must be 1 to {MAX_ROOM_CODE_LEN} characters (got {})", code.len())
                .into(),
        );
        return Err(err);
    }

    if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        let mut err = ValidationError::new("room_code_format");
        err.message = Some("Room code must contain only letters, digits or underscores".into());
        return Err(err);
    }

    Ok(())
}

/// Canonical form of a room code as typed by a player: trimmed and uppercased.
pub fn normalize_room_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Validates a chat line once surrounding whitespace is dropped.
pub fn validate_chat_text(text: &str) -> Result<(), ValidationError> {
    let length = text.trim().chars().count();
    if length == 0 || length > MAX_CHAT_LEN {
        let mut err = ValidationError::new("chat_text_length");
        err.message =
            Some(format!("Chat text must be 1 to {MAX_CHAT_LEN} characters (got {length})").into());
        return Err(err);
    }
    Ok(())
}

/// Validates that an identity is not blank.
pub fn validate_identity(identity: &str) -> Result<(), ValidationError> {
    if identity.trim().is_empty() {
        let mut err = ValidationError::new("identity_blank");
        err.message = Some("Identity must not be blank".into());
        return Err(err);
    }
    Ok(())
}
