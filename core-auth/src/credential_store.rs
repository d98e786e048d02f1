//! Credential Persistence
//!
//! Persists the current [`CredentialRecord`] as a single opaque blob in the
//! host's [`SecureStore`].
//!
//! ## Storage Format
//!
//! The blob is versioned JSON:
//!
//! ```text
//! {"version":1,"user_id":"...","username":null,"email":"...",
//!  "access_token":"...","refresh_token":"...","server_auth_code":null,
//!  "session_handle":"<base64>"}
//! ```
//!
//! Absence of the key means "signed out". A blob that cannot be decoded, or
//! that decodes to a record violating the validity invariant, is treated as
//! absent.
//!
//! The store performs no concurrency control of its own. Only the state
//! machine calls `save` and `clear`, under its own lock; `load` is read-only
//! and may be called from anywhere.

use crate::error::{AuthError, Result};
use crate::types::{CredentialRecord, SessionHandle, UserProfile};
use bridge_traits::storage::SecureStore;
use core_runtime::config::DEFAULT_STORAGE_KEY;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

const STORE_FORMAT_VERSION: u32 = 1;

/// Secure persistence for the single credential record.
#[derive(Clone)]
pub struct CredentialStore {
    secure_store: Arc<dyn SecureStore>,
    key: String,
}

#[derive(Serialize, Deserialize)]
struct StoredRecord {
    version: u32,
    user_id: String,
    username: Option<String>,
    email: Option<String>,
    access_token: String,
    refresh_token: String,
    server_auth_code: Option<String>,
    session_handle: Option<SessionHandle>,
}

impl From<&CredentialRecord> for StoredRecord {
    fn from(record: &CredentialRecord) -> Self {
        Self {
            version: STORE_FORMAT_VERSION,
            user_id: record.user_id().to_string(),
            username: record.username().map(str::to_string),
            email: record.email().map(str::to_string),
            access_token: record.access_token().to_string(),
            refresh_token: record.refresh_token().to_string(),
            server_auth_code: record.server_auth_code().map(str::to_string),
            session_handle: record.session_handle().cloned(),
        }
    }
}

impl StoredRecord {
    fn into_record(self) -> Result<CredentialRecord> {
        if self.version != STORE_FORMAT_VERSION {
            return Err(AuthError::CorruptStoredRecord(format!(
                "unsupported format version {}",
                self.version
            )));
        }

        let user = UserProfile {
            user_id: self.user_id,
            username: self.username,
            email: self.email,
        };

        let record = CredentialRecord::new(user, self.access_token, self.refresh_token)
            .with_server_auth_code(self.server_auth_code)
            .with_session_handle(self.session_handle);

        record
            .validate()
            .map_err(|e| AuthError::CorruptStoredRecord(e.to_string()))?;

        Ok(record)
    }
}

impl CredentialStore {
    /// Create a store using the default key.
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        Self::with_key(secure_store, DEFAULT_STORAGE_KEY)
    }

    pub fn with_key(secure_store: Arc<dyn SecureStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        debug!(key = %key, "Initializing CredentialStore");
        Self { secure_store, key }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the persisted record.
    ///
    /// Returns `None` when nothing is stored, when the backend cannot be read,
    /// or when the stored blob is corrupt. Never writes; removing a corrupt
    /// blob is left to the owner of the store.
    pub async fn load(&self) -> Option<CredentialRecord> {
        let data = match self.secure_store.get_secret(&self.key).await {
            Ok(Some(data)) => data,
            Ok(None) => {
                debug!(key = %self.key, "No credentials in storage");
                return None;
            }
            Err(e) => {
                warn!(
                    key = %self.key,
                    error = %e,
                    "Failed to read credentials from secure storage"
                );
                return None;
            }
        };

        match Self::decode(&data) {
            Ok(record) => {
                info!(
                    user_id = %record.user_id(),
                    has_session_handle = record.session_handle().is_some(),
                    "Credentials loaded"
                );
                Some(record)
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "Ignoring unreadable credential blob");
                None
            }
        }
    }

    /// Persist `record`, overwriting any previous blob.
    pub async fn save(&self, record: &CredentialRecord) -> Result<()> {
        let json = serde_json::to_vec(&StoredRecord::from(record)).map_err(|e| {
            warn!(user_id = %record.user_id(), error = %e, "Failed to serialize credentials");
            AuthError::Serialization(e.to_string())
        })?;

        self.secure_store
            .set_secret(&self.key, &json)
            .await
            .map_err(|e| {
                warn!(
                    user_id = %record.user_id(),
                    error = %e,
                    "Failed to store credentials in secure storage"
                );
                AuthError::SecureStorageUnavailable(e.to_string())
            })?;

        info!(
            user_id = %record.user_id(),
            has_auth_code = record.server_auth_code().is_some(),
            "Credentials stored securely"
        );

        Ok(())
    }

    /// Remove the persisted record. Succeeds when nothing is stored.
    pub async fn clear(&self) -> Result<()> {
        self.secure_store
            .delete_secret(&self.key)
            .await
            .map_err(|e| {
                warn!(key = %self.key, error = %e, "Failed to delete credentials");
                AuthError::SecureStorageUnavailable(e.to_string())
            })?;

        info!(key = %self.key, "Credentials cleared");
        Ok(())
    }

    /// Whether a blob exists under the key, without decoding it.
    ///
    /// Backend errors read as `false`.
    pub async fn has_record(&self) -> bool {
        match self.secure_store.has_secret(&self.key).await {
            Ok(present) => present,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to check credential existence");
                false
            }
        }
    }

    fn decode(data: &[u8]) -> Result<CredentialRecord> {
        let stored: StoredRecord = serde_json::from_slice(data)
            .map_err(|e| AuthError::CorruptStoredRecord(e.to_string()))?;
        stored.into_record()
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
