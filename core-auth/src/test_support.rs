//! Shared fakes for the crate's unit tests.

use crate::delegate::SignInDelegate;
use crate::provider::{ProviderError, SignInProvider};
use crate::types::{AttemptId, CredentialRecord, RawTokens, SessionHandle, UserProfile};
use async_trait::async_trait;
use bridge_traits::{error::Result as BridgeResult, BridgeError, SecureStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};

pub fn sample_record(user_id: &str, access: &str, refresh: &str) -> CredentialRecord {
    CredentialRecord::new(
        UserProfile::new(user_id).with_email(format!("{}@example.com", user_id)),
        access,
        refresh,
    )
    .with_session_handle(Some(SessionHandle::new(format!("handle-{}", user_id))))
}

/// In-memory `SecureStore` with switchable failures.
#[derive(Clone, Default)]
pub struct MemorySecureStore {
    storage: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    failing: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
    deletes: Arc<AtomicUsize>,
}

impl MemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub async fn insert_raw(&self, key: &str, value: Vec<u8>) {
        self.storage.lock().await.insert(key.to_string(), value);
    }

    pub async fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.storage.lock().await.get(key).cloned()
    }

    fn check(&self) -> BridgeResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(BridgeError::NotAvailable("keychain locked".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SecureStore for MemorySecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
        self.check()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.storage
            .lock()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
        self.check()?;
        Ok(self.storage.lock().await.get(key).cloned())
    }

    async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
        self.check()?;
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.storage.lock().await.remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelegateEvent {
    Started,
    CredentialsAvailable(String),
    Completed(bool),
    SignedOut,
}

#[derive(Default)]
pub struct RecordingDelegate {
    events: std::sync::Mutex<Vec<DelegateEvent>>,
}

impl RecordingDelegate {
    pub fn events(&self) -> Vec<DelegateEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Events other than `Started`, which most assertions ignore.
    pub fn transitions(&self) -> Vec<DelegateEvent> {
        self.events()
            .into_iter()
            .filter(|e| *e != DelegateEvent::Started)
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    fn push(&self, event: DelegateEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl SignInDelegate for RecordingDelegate {
    fn on_sign_in_started(&self) {
        self.push(DelegateEvent::Started);
    }

    fn on_credentials_available(&self, record: &CredentialRecord) {
        self.push(DelegateEvent::CredentialsAvailable(record.user_id().to_string()));
    }

    fn on_sign_in_completed(&self, auto_sign_in: bool) {
        self.push(DelegateEvent::Completed(auto_sign_in));
    }

    fn on_signed_out(&self) {
        self.push(DelegateEvent::SignedOut);
    }
}

/// Provider whose refresh never answers.
pub struct StalledProvider;

#[async_trait]
impl SignInProvider for StalledProvider {
    async fn begin_sign_in(&self, _attempt: AttemptId) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn restore_previous_sign_in(&self, _attempt: AttemptId) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn refresh_session(&self, _handle: &SessionHandle) -> Result<RawTokens, ProviderError> {
        std::future::pending().await
    }
}

/// Provider that records calls and answers refreshes with a scripted result.
///
/// When gated, each refresh waits for a permit released with [`open_gate`].
///
/// [`open_gate`]: ScriptedProvider::open_gate
pub struct ScriptedProvider {
    pub begin_calls: std::sync::Mutex<Vec<AttemptId>>,
    pub restore_calls: std::sync::Mutex<Vec<AttemptId>>,
    pub sign_out_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    refresh_result: std::sync::Mutex<Result<RawTokens, ProviderError>>,
    gate: Option<Semaphore>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            begin_calls: std::sync::Mutex::new(Vec::new()),
            restore_calls: std::sync::Mutex::new(Vec::new()),
            sign_out_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            refresh_result: std::sync::Mutex::new(Ok(RawTokens::new("a2", "r2"))),
            gate: None,
        }
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    pub fn set_refresh_result(&self, result: Result<RawTokens, ProviderError>) {
        *self.refresh_result.lock().unwrap() = result;
    }

    pub fn open_gate(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn sign_out_count(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    pub fn last_begin(&self) -> Option<AttemptId> {
        self.begin_calls.lock().unwrap().last().copied()
    }

    pub fn last_restore(&self) -> Option<AttemptId> {
        self.restore_calls.lock().unwrap().last().copied()
    }
}

#[async_trait]
impl SignInProvider for ScriptedProvider {
    async fn begin_sign_in(&self, attempt: AttemptId) -> Result<(), ProviderError> {
        self.begin_calls.lock().unwrap().push(attempt);
        Ok(())
    }

    async fn restore_previous_sign_in(&self, attempt: AttemptId) -> Result<(), ProviderError> {
        self.restore_calls.lock().unwrap().push(attempt);
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn refresh_session(&self, _handle: &SessionHandle) -> Result<RawTokens, ProviderError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        self.refresh_result.lock().unwrap().clone()
    }
}
