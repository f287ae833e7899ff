use thiserror::Error;

use crate::{dao::storage::StorageError, state::session::SessionError};

/// Failures surfaced to the requesting client as `party_error`.
///
/// The `Display` text is the message the client shows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartyError {
    /// Bad or expired join code.
    #[error("Party not found")]
    PartyNotFound,
    /// Capacity already reached.
    #[error("Party is full")]
    PartyFull,
    /// The caller is not a member of the addressed party.
    #[error("You are not in this party")]
    NotInParty,
    /// The profile sent with the intent belongs to someone else.
    #[error("Profile does not match the identified player")]
    ProfileMismatch,
}

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// User-facing lobby failure.
    #[error(transparent)]
    Party(#[from] PartyError),
    /// Ownership failure for the calling connection.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl ServiceError {
    /// Message for `party_error`, using `fallback` for storage failures.
    pub fn client_message(&self, fallback: &'static str) -> String {
        match self {
            ServiceError::Party(err) => err.to_string(),
            ServiceError::Session(err) => err.to_string(),
            ServiceError::Unavailable(_) | ServiceError::Degraded => fallback.to_owned(),
        }
    }
}
