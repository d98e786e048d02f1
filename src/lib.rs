//! Workspace facade crate.
//!
//! Re-exports the sign-in core so host applications can depend on
//! `signin-workspace` alone. The `desktop-shims` feature (default) pulls in the
//! keychain-backed `SecureStore` and lets [`SignInConfig`] fall back to it when
//! no store is injected.
//!
//! ```ignore
//! use signin_workspace::{SignInConfig, SignInStateMachine};
//! use std::sync::Arc;
//!
//! let config = SignInConfig::builder().build()?;
//! let machine = SignInStateMachine::from_config(&config, provider, delegate);
//! machine.launch(user_was_signed_in).await;
//! ```

pub use bridge_traits;
pub use core_auth;
pub use core_runtime;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::KeyringSecureStore;

pub use core_auth::{
    AttemptId, AuthError, ButtonState, CredentialRecord, CredentialStore, EventBusDelegate,
    ProviderCredentials, SignInDelegate, SignInFailure, SignInOutcome, SignInProvider,
    SignInState, SignInStateMachine, TokenRefresher,
};
pub use core_runtime::config::SignInConfig;
