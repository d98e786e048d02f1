//! # Sign-In Configuration
//!
//! Builder-based configuration for the sign-in core.
//!
//! ## Overview
//!
//! [`SignInConfigBuilder`] collects the host-provided `SecureStore` and the
//! tunables of the credential lifecycle, then validates them fail-fast in
//! [`SignInConfigBuilder::build`]. Missing capabilities produce
//! [`Error::CapabilityMissing`] with a message telling the host what to inject.
//!
//! When the `desktop-shims` feature is enabled, a keychain-backed
//! `SecureStore` is injected automatically if none is provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::SignInConfig;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = SignInConfig::builder()
//!     .secure_store(Arc::new(MyKeychain))
//!     .storage_key("myapp.google.credentials")
//!     .refresh_timeout(Duration::from_secs(20))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::SecureStore;
use std::sync::Arc;
use std::time::Duration;

/// Secure-store key holding the serialized credential record.
pub const DEFAULT_STORAGE_KEY: &str = "signin.credentials";

/// Upper bound on a single token refresh round-trip.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

/// Keychain service name used by the desktop store.
pub const DEFAULT_KEYRING_SERVICE: &str = "signin-core";

/// Validated configuration for the sign-in core.
#[derive(Clone)]
pub struct SignInConfig {
    /// Secure credential storage
    pub secure_store: Arc<dyn SecureStore>,

    /// Key under which the credential blob is stored
    pub storage_key: String,

    /// Timeout applied to each provider refresh call
    pub refresh_timeout: Duration,

    /// Service name for the desktop keychain store
    pub keyring_service: String,
}

impl std::fmt::Debug for SignInConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignInConfig")
            .field("secure_store", &"SecureStore { ... }")
            .field("storage_key", &self.storage_key)
            .field("refresh_timeout", &self.refresh_timeout)
            .field("keyring_service", &self.keyring_service)
            .finish()
    }
}

impl SignInConfig {
    pub fn builder() -> SignInConfigBuilder {
        SignInConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// This checks:
    /// - Storage key is not blank
    /// - Refresh timeout is non-zero and at most ten minutes
    /// - Keychain service name is not blank
    pub fn validate(&self) -> Result<()> {
        if self.storage_key.trim().is_empty() {
            return Err(Error::Config("Storage key cannot be empty".to_string()));
        }

        if self.refresh_timeout.is_zero() {
            return Err(Error::Config(
                "Refresh timeout must be greater than zero".to_string(),
            ));
        }

        if self.refresh_timeout > Duration::from_secs(600) {
            return Err(Error::Config(
                "Refresh timeout exceeds maximum of 600 seconds".to_string(),
            ));
        }

        if self.keyring_service.trim().is_empty() {
            return Err(Error::Config(
                "Keyring service name cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn secure_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SecureStore".to_string(),
        message: "SecureStore implementation is required for credential persistence. \
                 Desktop: enable the 'desktop-shims' feature to use the default KeyringSecureStore. \
                 Mobile: inject platform-native secure storage (Keychain/Keystore)."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_secure_store(service_name: &str) -> Result<Arc<dyn SecureStore>> {
    use bridge_desktop::KeyringSecureStore;

    let store: Arc<dyn SecureStore> = Arc::new(KeyringSecureStore::with_service_name(service_name));
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_secure_store(_service_name: &str) -> Result<Arc<dyn SecureStore>> {
    Err(secure_store_missing_error())
}

/// Builder for constructing [`SignInConfig`] instances.
#[derive(Default)]
pub struct SignInConfigBuilder {
    secure_store: Option<Arc<dyn SecureStore>>,
    storage_key: Option<String>,
    refresh_timeout: Option<Duration>,
    keyring_service: Option<String>,
}

impl SignInConfigBuilder {
    /// Sets the secure store (required unless `desktop-shims` is enabled).
    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    /// Sets the key under which the credential blob is persisted.
    ///
    /// Defaults to [`DEFAULT_STORAGE_KEY`].
    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = Some(key.into());
        self
    }

    pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = Some(timeout);
        self
    }

    /// Sets the keychain service name used when the default desktop store is
    /// injected. Ignored when a store is provided explicitly.
    pub fn keyring_service(mut self, service: impl Into<String>) -> Self {
        self.keyring_service = Some(service.into());
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when no `SecureStore` is available
    /// - [`Error::Config`] when a value is out of range
    pub fn build(self) -> Result<SignInConfig> {
        let keyring_service = self
            .keyring_service
            .unwrap_or_else(|| DEFAULT_KEYRING_SERVICE.to_string());

        let secure_store = match self.secure_store {
            Some(store) => store,
            None => provide_default_secure_store(&keyring_service)?,
        };

        let config = SignInConfig {
            secure_store,
            storage_key: self
                .storage_key
                .unwrap_or_else(|| DEFAULT_STORAGE_KEY.to_string()),
            refresh_timeout: self.refresh_timeout.unwrap_or(DEFAULT_REFRESH_TIMEOUT),
            keyring_service,
        };

        config.validate()?;

        Ok(config)
    }
}
