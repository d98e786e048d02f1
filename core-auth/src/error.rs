use thiserror::Error;

/// Errors surfaced by the sign-in core.
///
/// `Clone` so a single refresh outcome can be handed to every caller that
/// awaited the same in-flight refresh.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("No active session")]
    NoActiveSession,

    #[error("Provider returned incomplete credentials: missing {missing}")]
    IncompleteCredentials { missing: String },

    #[error("Token refresh failed, try again later: {0}")]
    RefreshTransientFailure(String),

    #[error("Provider session is no longer valid: {0}")]
    RefreshSessionInvalid(String),

    #[error("Stored credential record is corrupt: {0}")]
    CorruptStoredRecord(String),

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Secure storage unavailable: {0}")]
    SecureStorageUnavailable(String),

    #[error("Sign-in provider error: {0}")]
    Provider(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;
