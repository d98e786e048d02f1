//! # Sign-In Core
//!
//! Credential lifecycle for a single identity provider.
//!
//! ## Overview
//!
//! This crate obtains, persists, refreshes and invalidates an access/refresh
//! token pair bound to one user, and reports each transition to a delegate.
//! The identity provider's own UI flow stays outside; it is driven through the
//! [`SignInProvider`] trait and reports back through the state machine.
//!
//! ## Components
//!
//! - [`CredentialRecord`]: immutable snapshot of the signed-in user's tokens
//! - [`CredentialStore`]: versioned blob persistence via `SecureStore`
//! - [`TokenRefresher`]: timeout-bounded provider refresh
//! - [`SignInStateMachine`]: single authority for state transitions
//!
//! ## Usage
//!
//! ```ignore
//! use core_auth::{EventBusDelegate, SignInStateMachine};
//! use core_runtime::{config::SignInConfig, events::EventBus};
//! use std::sync::Arc;
//!
//! let config = SignInConfig::builder().secure_store(store).build()?;
//! let delegate = Arc::new(EventBusDelegate::new(EventBus::default()));
//! let machine = SignInStateMachine::from_config(&config, provider, delegate);
//!
//! machine.launch(user_was_signed_in).await;
//! let attempt = machine.begin_interactive_sign_in().await?;
//! // ... later, from the provider callback:
//! machine.complete_sign_in_attempt(attempt, outcome).await?;
//! ```

pub mod credential_store;
pub mod delegate;
pub mod error;
pub mod machine;
pub mod provider;
pub mod refresher;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use credential_store::CredentialStore;
pub use delegate::{EventBusDelegate, SignInDelegate};
pub use error::{AuthError, Result};
pub use machine::SignInStateMachine;
pub use provider::{
    ProviderCredentials, ProviderError, SignInFailure, SignInOutcome, SignInProvider,
};
pub use refresher::{RefreshError, TokenRefresher};
pub use types::{
    AttemptId, ButtonState, CredentialRecord, HeaderNames, RawTokens, RefreshedTokens,
    SessionHandle, SignInState, UserProfile,
};
