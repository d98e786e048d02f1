//! Identity Provider Seam
//!
//! The native sign-in SDK is modelled as a [`SignInProvider`]. The core asks
//! it to start flows and refresh sessions; the provider reports terminal
//! results back through the state machine's completion methods, tagged with
//! the [`AttemptId`] it was given.

use crate::types::{AttemptId, RawTokens, SessionHandle, UserProfile};
use async_trait::async_trait;
use thiserror::Error;

/// Provider error code meaning "no prior auth token in the keychain".
pub const NO_AUTH_TOKEN_CODE: i64 = -4;

/// Provider error code for a flow the user dismissed.
pub const CANCELLED_CODE: i64 = -5;

/// Errors returned by provider calls.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider has no session to refresh, or it expired.
    #[error("No provider session: {0}")]
    NoSession(String),

    #[error("Network failure: {0}")]
    Network(String),

    #[error("Provider error {code}: {message}")]
    Failed { code: i64, message: String },
}

/// Everything the provider hands over on a successful sign-in.
#[derive(Debug, Clone, Default)]
pub struct ProviderCredentials {
    pub user: UserProfile,
    pub tokens: RawTokens,
    /// One-time code, present only for interactive sign-ins
    pub server_auth_code: Option<String>,
    pub session_handle: Option<SessionHandle>,
}

/// Why a sign-in attempt did not produce credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInFailure {
    /// The provider had no previous authentication to restore.
    NoAuthToken,
    Cancelled,
    Provider { code: i64, message: String },
}

impl SignInFailure {
    /// Classify a raw provider error code.
    pub fn from_code(code: i64, message: impl Into<String>) -> Self {
        match code {
            NO_AUTH_TOKEN_CODE => SignInFailure::NoAuthToken,
            CANCELLED_CODE => SignInFailure::Cancelled,
            _ => SignInFailure::Provider {
                code,
                message: message.into(),
            },
        }
    }

    pub fn is_no_auth_token(&self) -> bool {
        matches!(self, SignInFailure::NoAuthToken)
    }
}

/// Terminal result of one sign-in attempt.
#[derive(Debug, Clone)]
pub enum SignInOutcome {
    Success(ProviderCredentials),
    Failure(SignInFailure),
}

/// Native identity provider used by the state machine.
///
/// Implementations must not call back into the state machine before the
/// returned future resolves; completions are delivered later through
/// `complete_sign_in_attempt`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignInProvider: Send + Sync {
    /// Start the interactive flow (account picker, consent screen).
    async fn begin_sign_in(&self, attempt: AttemptId) -> Result<(), ProviderError>;

    /// Start a silent restore of a previous sign-in.
    async fn restore_previous_sign_in(&self, attempt: AttemptId) -> Result<(), ProviderError>;

    /// Drop the provider's own session so the next interactive sign-in yields
    /// a fresh server auth code.
    async fn sign_out(&self) -> Result<(), ProviderError>;

    /// Exchange the session for a fresh access token.
    async fn refresh_session(&self, handle: &SessionHandle) -> Result<RawTokens, ProviderError>;
}
