//! # Sign-In State Machine
//!
//! Single authority over the sign-in state of one identity provider.
//!
//! ## Overview
//!
//! The machine owns the in-memory [`SignInState`] behind one
//! `tokio::sync::Mutex`. Every public operation, including provider callbacks,
//! is serialized through that lock, and the machine is the only component
//! that mutates the [`CredentialStore`].
//!
//! ```text
//! SignedOut --begin_interactive_sign_in-------------> SigningIn
//! SignedOut --network_changed_state(online, sticky)-> SigningIn (auto)
//! SigningIn --complete(Success)----------------------> SignedIn
//! SigningIn --complete(Failure, explicit/no token)---> SignedOut (+on_signed_out)
//! SigningIn --complete(Failure, transient + auto)----> SignedOut (quiet)
//! SignedIn  --refresh_credentials ok-----------------> SignedIn (record updated)
//! SignedIn  --refresh_credentials transient----------> SignedIn (unchanged)
//! SignedIn  --refresh_credentials session invalid----> SignedOut (+on_signed_out)
//! any       --sign_out-------------------------------> SignedOut (+on_signed_out)
//! ```
//!
//! ## Duplicate and stale callbacks
//!
//! Each attempt gets a fresh [`AttemptId`]. Completions are dropped when the
//! machine is already signed in, when they carry an id other than the
//! outstanding one, or when no attempt is outstanding.
//!
//! ## Refresh
//!
//! Concurrent `refresh_credentials` calls share one in-flight provider call.
//! Every transition into or out of `SignedIn` bumps a session generation; a
//! refresh that completes under a different generation is discarded.
//!
//! ## Delegate
//!
//! Delegate callbacks run while the lock is held. Provider calls never do.

use crate::credential_store::CredentialStore;
use crate::delegate::SignInDelegate;
use crate::error::{AuthError, Result};
use crate::provider::{ProviderCredentials, SignInOutcome, SignInProvider};
use crate::refresher::{RefreshError, TokenRefresher};
use crate::types::{AttemptId, ButtonState, CredentialRecord, RefreshedTokens, SignInState};
use core_runtime::config::SignInConfig;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

type RefreshFuture = Shared<BoxFuture<'static, Result<CredentialRecord>>>;

struct InFlightRefresh {
    id: u64,
    generation: u64,
    future: RefreshFuture,
}

struct MachineState {
    state: SignInState,
    last_attempt: AttemptId,
    /// Bumped on every transition into or out of `SignedIn`
    generation: u64,
    /// The user chose to be signed in; drives silent restore
    sticky_sign_in: bool,
    refresh: Option<InFlightRefresh>,
    next_refresh_id: u64,
}

impl MachineState {
    fn new() -> Self {
        Self {
            state: SignInState::SignedOut,
            last_attempt: AttemptId::from_raw(0),
            generation: 0,
            sticky_sign_in: false,
            refresh: None,
            next_refresh_id: 0,
        }
    }

    fn begin_attempt(&mut self, auto_sign_in: bool) -> AttemptId {
        let attempt = self.last_attempt.next();
        self.last_attempt = attempt;
        self.state = SignInState::SigningIn {
            attempt,
            auto_sign_in,
        };
        attempt
    }

    fn enter_signed_in(&mut self, record: CredentialRecord, auto_sign_in: bool) {
        self.generation += 1;
        self.refresh = None;
        self.state = SignInState::SignedIn {
            record,
            auto_sign_in,
        };
    }

    fn enter_signed_out(&mut self) {
        if self.state.is_signed_in() {
            self.generation += 1;
        }
        self.refresh = None;
        self.state = SignInState::SignedOut;
    }
}

struct Inner {
    store: CredentialStore,
    refresher: TokenRefresher,
    provider: Arc<dyn SignInProvider>,
    delegate: Arc<dyn SignInDelegate>,
    machine: Mutex<MachineState>,
}

impl Inner {
    /// Clear persisted credentials, go to `SignedOut` and notify.
    ///
    /// The provider is told separately, after the lock is released.
    async fn sign_out_locked(&self, machine: &mut MachineState) {
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "Failed to clear stored credentials during sign-out");
        }

        machine.enter_signed_out();
        machine.sticky_sign_in = false;
        self.delegate.on_signed_out();
    }

    async fn provider_sign_out(&self) {
        if let Err(e) = self.provider.sign_out().await {
            warn!(error = %e, "Provider sign-out failed");
        }
    }

    /// Ask the provider to run its flow for `attempt`.
    ///
    /// A refusal puts the machine back to `SignedOut` if the attempt is still
    /// the outstanding one.
    async fn start_provider_flow(&self, attempt: AttemptId, auto_sign_in: bool) -> Result<()> {
        let started = if auto_sign_in {
            self.provider.restore_previous_sign_in(attempt).await
        } else {
            self.provider.begin_sign_in(attempt).await
        };

        let Err(e) = started else {
            return Ok(());
        };

        warn!(%attempt, error = %e, "Provider refused to start sign-in");
        let mut machine = self.machine.lock().await;
        if matches!(machine.state, SignInState::SigningIn { attempt: current, .. } if current == attempt)
        {
            machine.enter_signed_out();
        }

        Err(AuthError::Provider(e.to_string()))
    }

    async fn accept_credentials(
        &self,
        machine: &mut MachineState,
        credentials: ProviderCredentials,
        auto_sign_in: bool,
    ) -> Result<()> {
        let ProviderCredentials {
            user,
            tokens,
            server_auth_code,
            session_handle,
        } = credentials;

        // Silent restores never carry a one-time code.
        let server_auth_code = if auto_sign_in { None } else { server_auth_code };

        let record = CredentialRecord::new(
            user,
            tokens.access_token.unwrap_or_default(),
            tokens.refresh_token.unwrap_or_default(),
        )
        .with_server_auth_code(server_auth_code)
        .with_session_handle(session_handle);

        record.validate().map_err(|e| {
            warn!(error = %e, "Provider returned incomplete credentials");
            e
        })?;

        self.store.save(&record).await?;

        info!(user_id = %record.user_id(), auto_sign_in, "Signed in");
        machine.enter_signed_in(record.clone(), auto_sign_in);
        machine.sticky_sign_in = true;

        self.delegate.on_credentials_available(&record);
        self.delegate.on_sign_in_completed(auto_sign_in);
        Ok(())
    }

    /// Apply the outcome of refresh `id`, started under `generation`.
    async fn apply_refresh(
        &self,
        id: u64,
        generation: u64,
        outcome: std::result::Result<RefreshedTokens, RefreshError>,
    ) -> Result<CredentialRecord> {
        let mut machine = self.machine.lock().await;
        if machine.refresh.as_ref().map(|r| r.id) == Some(id) {
            machine.refresh = None;
        }

        if machine.generation != generation {
            debug!("Discarding refresh result from a previous session");
            return machine
                .state
                .credentials()
                .cloned()
                .ok_or(AuthError::NoActiveSession);
        }

        let tokens = match outcome {
            Ok(tokens) => tokens,
            Err(e) if e.is_transient() => {
                warn!(error = %e, "Refresh failed, keeping current credentials");
                return Err(e.into());
            }
            Err(e) => {
                warn!(error = %e, "Session no longer valid, signing out");
                self.sign_out_locked(&mut machine).await;
                drop(machine);
                self.provider_sign_out().await;
                return Err(e.into());
            }
        };

        let (updated, auto_sign_in) = match &machine.state {
            SignInState::SignedIn {
                record,
                auto_sign_in,
            } => (record.with_refreshed_tokens(tokens), *auto_sign_in),
            _ => return Err(AuthError::NoActiveSession),
        };

        self.store.save(&updated).await?;
        machine.state = SignInState::SignedIn {
            record: updated.clone(),
            auto_sign_in,
        };

        info!(user_id = %updated.user_id(), "Credentials refreshed");
        Ok(updated)
    }
}

/// Orchestrates sign-in, sign-out and refresh for one identity provider.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct SignInStateMachine {
    inner: Arc<Inner>,
}

impl SignInStateMachine {
    /// Creates a state machine in `SignedOut`. Call [`launch`](Self::launch)
    /// before anything else.
    pub fn new(
        store: CredentialStore,
        refresher: TokenRefresher,
        provider: Arc<dyn SignInProvider>,
        delegate: Arc<dyn SignInDelegate>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                refresher,
                provider,
                delegate,
                machine: Mutex::new(MachineState::new()),
            }),
        }
    }

    /// Creates a state machine wired from a validated [`SignInConfig`].
    pub fn from_config(
        config: &SignInConfig,
        provider: Arc<dyn SignInProvider>,
        delegate: Arc<dyn SignInDelegate>,
    ) -> Self {
        let store = CredentialStore::with_key(config.secure_store.clone(), &config.storage_key);
        let refresher = TokenRefresher::with_timeout(provider.clone(), config.refresh_timeout);
        Self::new(store, refresher, provider, delegate)
    }

    /// Establish the initial state.
    ///
    /// With `user_was_signed_in`, persisted credentials are restored and
    /// reported as an automatic sign-in; without usable credentials the
    /// machine removes whatever unreadable blob is left and reports
    /// `on_signed_out`. Without the flag, any stale record is
    /// removed and the provider is signed out so the next interactive sign-in
    /// yields a fresh server auth code. No event is emitted in that case.
    #[instrument(skip(self))]
    pub async fn launch(&self, user_was_signed_in: bool) {
        let inner = &self.inner;
        let mut machine = inner.machine.lock().await;
        machine.sticky_sign_in = user_was_signed_in;

        if user_was_signed_in {
            match inner.store.load().await {
                Some(record) => {
                    info!(user_id = %record.user_id(), "Restored credentials at launch");
                    machine.enter_signed_in(record.clone(), true);
                    inner.delegate.on_credentials_available(&record);
                    inner.delegate.on_sign_in_completed(true);
                }
                None => {
                    info!("No usable credentials at launch");
                    if inner.store.has_record().await {
                        if let Err(e) = inner.store.clear().await {
                            warn!(error = %e, "Failed to remove unreadable credentials");
                        }
                    }
                    machine.enter_signed_out();
                    inner.delegate.on_signed_out();
                }
            }
            return;
        }

        machine.enter_signed_out();
        if let Err(e) = inner.store.clear().await {
            warn!(error = %e, "Failed to clear stale credentials at launch");
        }
        drop(machine);

        inner.provider_sign_out().await;
    }

    /// Start an interactive sign-in. Only valid from `SignedOut`.
    ///
    /// Returns as soon as the provider has started its flow; the result
    /// arrives later through [`complete_sign_in_attempt`](Self::complete_sign_in_attempt).
    ///
    /// # Errors
    ///
    /// - [`AuthError::IllegalState`] when signed in or an attempt is outstanding
    /// - [`AuthError::Provider`] when the provider refuses to start
    #[instrument(skip(self))]
    pub async fn begin_interactive_sign_in(&self) -> Result<AttemptId> {
        let attempt = {
            let mut machine = self.inner.machine.lock().await;
            if !matches!(machine.state, SignInState::SignedOut) {
                warn!(state = machine.state.name(), "Sign-in requested in wrong state");
                return Err(AuthError::IllegalState(format!(
                    "cannot begin sign-in while {}",
                    machine.state.name()
                )));
            }

            let attempt = machine.begin_attempt(false);
            info!(%attempt, "Interactive sign-in started");
            self.inner.delegate.on_sign_in_started();
            attempt
        };

        self.inner.start_provider_flow(attempt, false).await?;
        Ok(attempt)
    }

    /// Deliver the terminal result of whichever attempt is outstanding.
    ///
    /// For providers that do not echo attempt ids back.
    pub async fn complete_interactive_sign_in(&self, outcome: SignInOutcome) -> Result<()> {
        let attempt = {
            let machine = self.inner.machine.lock().await;
            match machine.state {
                SignInState::SigningIn { attempt, .. } => attempt,
                _ => {
                    debug!(state = machine.state.name(), "Completion without outstanding attempt dropped");
                    return Ok(());
                }
            }
        };

        self.complete_sign_in_attempt(attempt, outcome).await
    }

    /// Deliver the terminal result of `attempt`.
    ///
    /// Duplicate, stale and unsolicited completions are dropped and return
    /// `Ok(())`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::IncompleteCredentials`] when the provider's success
    ///   lacks a token or the user id (the machine signs out)
    /// - [`AuthError::SecureStorageUnavailable`] when the record cannot be
    ///   persisted (the machine signs out)
    #[instrument(skip(self, outcome))]
    pub async fn complete_sign_in_attempt(
        &self,
        attempt: AttemptId,
        outcome: SignInOutcome,
    ) -> Result<()> {
        let inner = &self.inner;
        let mut machine = inner.machine.lock().await;

        let auto_sign_in = match machine.state {
            SignInState::SigningIn {
                attempt: current,
                auto_sign_in,
            } if current == attempt => auto_sign_in,
            SignInState::SigningIn {
                attempt: current, ..
            } => {
                debug!(outstanding = %current, "Stale completion dropped");
                return Ok(());
            }
            SignInState::SignedIn { .. } => {
                debug!("Completion while signed in dropped");
                return Ok(());
            }
            SignInState::SignedOut => {
                debug!("Completion without outstanding attempt dropped");
                return Ok(());
            }
        };

        let (result, tell_provider) = match outcome {
            SignInOutcome::Success(credentials) => {
                match inner
                    .accept_credentials(&mut machine, credentials, auto_sign_in)
                    .await
                {
                    Ok(()) => (Ok(()), false),
                    Err(e) => {
                        inner.sign_out_locked(&mut machine).await;
                        (Err(e), true)
                    }
                }
            }
            SignInOutcome::Failure(failure) if failure.is_no_auth_token() || !auto_sign_in => {
                info!(?failure, auto_sign_in, "Sign-in failed, signing out");
                inner.sign_out_locked(&mut machine).await;
                (Ok(()), true)
            }
            SignInOutcome::Failure(failure) => {
                info!(?failure, "Silent sign-in failed, will retry later");
                machine.enter_signed_out();
                (Ok(()), false)
            }
        };
        drop(machine);

        if tell_provider {
            inner.provider_sign_out().await;
        }
        result
    }

    /// Sign out from any state.
    ///
    /// Removes the persisted record, signs the provider out and emits
    /// `on_signed_out`, every time it is called. An outstanding attempt is
    /// abandoned and its completion will be dropped.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) {
        {
            let mut machine = self.inner.machine.lock().await;
            info!(state = machine.state.name(), "Signing out");
            self.inner.sign_out_locked(&mut machine).await;
        }

        self.inner.provider_sign_out().await;
    }

    /// Obtain a fresh access token for the current session.
    ///
    /// Callers arriving while a refresh is in flight share its result. No
    /// delegate event is emitted.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NoActiveSession`] when not signed in
    /// - [`AuthError::RefreshTransientFailure`] on network or malformed
    ///   responses; state and storage are untouched
    /// - [`AuthError::RefreshSessionInvalid`] when the provider session is
    ///   gone; the machine signs out
    #[instrument(skip(self))]
    pub async fn refresh_credentials(&self) -> Result<CredentialRecord> {
        let future = {
            let mut machine = self.inner.machine.lock().await;
            if !machine.state.is_signed_in() {
                return Err(AuthError::NoActiveSession);
            }

            let joinable = machine
                .refresh
                .as_ref()
                .filter(|r| r.generation == machine.generation)
                .map(|r| r.future.clone());

            match joinable {
                Some(future) => {
                    debug!("Joining in-flight refresh");
                    future
                }
                None => {
                    let handle = machine
                        .state
                        .credentials()
                        .and_then(|r| r.session_handle().cloned())
                        .filter(|h| !h.is_empty());

                    let Some(handle) = handle else {
                        warn!("Signed-in record has no session handle, signing out");
                        self.inner.sign_out_locked(&mut machine).await;
                        drop(machine);
                        self.inner.provider_sign_out().await;
                        return Err(AuthError::RefreshSessionInvalid(
                            "no session handle".to_string(),
                        ));
                    };

                    let id = machine.next_refresh_id;
                    machine.next_refresh_id += 1;
                    let generation = machine.generation;

                    let refresher = self.inner.refresher.clone();
                    let weak: Weak<Inner> = Arc::downgrade(&self.inner);
                    let future = async move {
                        let outcome = refresher.refresh(&handle).await;
                        match weak.upgrade() {
                            Some(inner) => inner.apply_refresh(id, generation, outcome).await,
                            None => Err(AuthError::NoActiveSession),
                        }
                    }
                    .boxed()
                    .shared();

                    machine.refresh = Some(InFlightRefresh {
                        id,
                        generation,
                        future: future.clone(),
                    });
                    future
                }
            }
        };

        future.await
    }

    /// React to a connectivity change.
    ///
    /// When the user chose to be signed in, the network is back and the
    /// machine is `SignedOut`, a silent restore is started and its attempt id
    /// returned. Otherwise nothing happens.
    #[instrument(skip(self))]
    pub async fn network_changed_state(&self, online: bool) -> Result<Option<AttemptId>> {
        let attempt = {
            let mut machine = self.inner.machine.lock().await;
            if !online
                || !machine.sticky_sign_in
                || !matches!(machine.state, SignInState::SignedOut)
            {
                return Ok(None);
            }

            let attempt = machine.begin_attempt(true);
            info!(%attempt, "Network available, restoring previous sign-in");
            self.inner.delegate.on_sign_in_started();
            attempt
        };

        self.inner.start_provider_flow(attempt, true).await?;
        Ok(Some(attempt))
    }

    pub async fn state(&self) -> SignInState {
        self.inner.machine.lock().await.state.clone()
    }

    /// Current credential record, if signed in.
    pub async fn credentials(&self) -> Option<CredentialRecord> {
        self.inner.machine.lock().await.state.credentials().cloned()
    }

    pub async fn is_signed_in(&self) -> bool {
        self.inner.machine.lock().await.state.is_signed_in()
    }

    /// Whether the user chose to stay signed in, even if currently signed out.
    pub async fn user_is_signed_in(&self) -> bool {
        self.inner.machine.lock().await.sticky_sign_in
    }

    pub async fn button_state(&self) -> ButtonState {
        self.inner.machine.lock().await.state.button_state()
    }
}

impl std::fmt::Debug for SignInStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignInStateMachine")
            .field("store", &self.inner.store)
            .field("refresher", &self.inner.refresher)
            .finish_non_exhaustive()
    }
}
