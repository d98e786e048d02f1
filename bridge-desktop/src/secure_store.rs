//! Secure Credential Storage using OS Keychain

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SecureStore,
};
use keyring::Entry;
use tracing::{debug, error, warn};

/// Keychain service name used when none is configured.
pub const DEFAULT_SERVICE_NAME: &str = "signin-core";

/// Keyring-based secure storage implementation
///
/// Uses platform-specific secure storage (with the `native-keychain` feature):
/// - macOS: Keychain
/// - Windows: Credential Manager (DPAPI)
/// - Linux: Secret Service (libsecret)
///
/// Values are base64 encoded because several keyring backends only accept
/// UTF-8 passwords. Entries are opened once per key and reused, so the
/// in-process backend used without `native-keychain` keeps values for the
/// life of the store.
pub struct KeyringSecureStore {
    service_name: String,
    entries: Mutex<HashMap<String, Entry>>,
}

impl KeyringSecureStore {
    pub fn new() -> Self {
        Self::with_service_name(DEFAULT_SERVICE_NAME)
    }

    pub fn with_service_name(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Run `f` against the indexed entry for `key`, opening it on first use.
    fn with_entry<T>(
        &self,
        key: &str,
        f: impl FnOnce(&Entry) -> std::result::Result<T, keyring::Error>,
    ) -> std::result::Result<T, keyring::Error> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| keyring::Error::PlatformFailure("entry index poisoned".into()))?;

        if !entries.contains_key(key) {
            let entry = Entry::new(&self.service_name, key)?;
            entries.insert(key.to_string(), entry);
        }

        match entries.get(key) {
            Some(entry) => f(entry),
            None => Err(keyring::Error::NoEntry),
        }
    }

    fn forget(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }

    fn map_keyring_error(e: keyring::Error) -> BridgeError {
        match e {
            keyring::Error::NoStorageAccess(inner) => {
                BridgeError::NotAvailable(format!("Keychain not accessible: {}", inner))
            }
            keyring::Error::PlatformFailure(inner) => {
                BridgeError::NotAvailable(format!("Keychain platform failure: {}", inner))
            }
            other => BridgeError::OperationFailed(format!("Keyring error: {}", other)),
        }
    }
}

impl Default for KeyringSecureStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for KeyringSecureStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyringSecureStore")
            .field("service_name", &self.service_name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SecureStore for KeyringSecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        let encoded = STANDARD.encode(value);

        self.with_entry(key, |entry| entry.set_password(&encoded))
            .map_err(|e| {
                warn!(key = key, error = %e, "Failed to write keychain entry");
                Self::map_keyring_error(e)
            })?;

        debug!(key = key, bytes = value.len(), "Stored secret in keychain");
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.with_entry(key, |entry| entry.get_password()) {
            Ok(encoded) => {
                let decoded = STANDARD.decode(encoded.as_bytes()).map_err(|e| {
                    error!(key = key, error = %e, "Keychain entry is not valid base64");
                    BridgeError::OperationFailed(format!("Failed to decode secret: {}", e))
                })?;

                debug!(key = key, "Retrieved secret from keychain");
                Ok(Some(decoded))
            }
            Err(keyring::Error::NoEntry) => {
                debug!(key = key, "Secret not found in keychain");
                Ok(None)
            }
            Err(e) => Err(Self::map_keyring_error(e)),
        }
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        let result = self.with_entry(key, |entry| entry.delete_credential());
        self.forget(key);

        match result {
            Ok(()) => {
                debug!(key = key, "Deleted secret from keychain");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => {
                debug!(key = key, "Secret already absent");
                Ok(())
            }
            Err(e) => Err(Self::map_keyring_error(e)),
        }
    }

    async fn has_secret(&self, key: &str) -> Result<bool> {
        match self.with_entry(key, |entry| entry.get_password()) {
            Ok(_) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(Self::map_keyring_error(e)),
        }
    }
}
