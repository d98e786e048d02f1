//! Token Refresh
//!
//! Wraps the provider's session refresh with a timeout and classifies the
//! outcome. The refresher is stateless and never retries; the state machine
//! decides what a failure means for the session.

use crate::error::AuthError;
use crate::provider::{ProviderError, SignInProvider};
use crate::types::{RefreshedTokens, SessionHandle};
use core_runtime::config::DEFAULT_REFRESH_TIMEOUT;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// The session handle is absent or expired. Interactive sign-in required.
    #[error("No refreshable session: {0}")]
    NoSession(String),

    #[error("Network error during refresh: {0}")]
    NetworkError(String),

    /// The provider reported success without a usable access token.
    #[error("Malformed refresh response: {0}")]
    MalformedResponse(String),
}

impl RefreshError {
    /// Whether the caller may retry later with the same session.
    pub fn is_transient(&self) -> bool {
        !matches!(self, RefreshError::NoSession(_))
    }
}

impl From<RefreshError> for AuthError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::NoSession(msg) => AuthError::RefreshSessionInvalid(msg),
            other => AuthError::RefreshTransientFailure(other.to_string()),
        }
    }
}

/// Requests fresh tokens from the provider for an existing session.
#[derive(Clone)]
pub struct TokenRefresher {
    provider: Arc<dyn SignInProvider>,
    timeout: Duration,
}

impl TokenRefresher {
    pub fn new(provider: Arc<dyn SignInProvider>) -> Self {
        Self::with_timeout(provider, DEFAULT_REFRESH_TIMEOUT)
    }

    pub fn with_timeout(provider: Arc<dyn SignInProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Refresh the session behind `handle`.
    ///
    /// A timeout is reported as [`RefreshError::NetworkError`].
    #[instrument(skip(self, handle), fields(timeout_ms = self.timeout.as_millis() as u64))]
    pub async fn refresh(&self, handle: &SessionHandle) -> Result<RefreshedTokens, RefreshError> {
        if handle.is_empty() {
            return Err(RefreshError::NoSession("empty session handle".to_string()));
        }

        let raw = match timeout(self.timeout, self.provider.refresh_session(handle)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(ProviderError::NoSession(msg))) => {
                warn!(reason = %msg, "Provider session is gone");
                return Err(RefreshError::NoSession(msg));
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Token refresh failed");
                return Err(RefreshError::NetworkError(e.to_string()));
            }
            Err(_) => {
                warn!("Token refresh timed out");
                return Err(RefreshError::NetworkError(format!(
                    "refresh timed out after {:?}",
                    self.timeout
                )));
            }
        };

        let access_token = match raw.access_token.filter(|t| !t.is_empty()) {
            Some(token) => token,
            None => {
                warn!("Provider returned no access token on refresh");
                return Err(RefreshError::MalformedResponse(
                    "missing access token".to_string(),
                ));
            }
        };

        let refresh_token = raw.refresh_token.filter(|t| !t.is_empty());
        debug!(rotated = refresh_token.is_some(), "Token refresh succeeded");

        Ok(RefreshedTokens {
            access_token,
            refresh_token,
        })
    }
}

impl std::fmt::Debug for TokenRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRefresher")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
