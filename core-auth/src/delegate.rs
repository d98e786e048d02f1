//! Lifecycle Observer
//!
//! The state machine reports every transition to one [`SignInDelegate`].
//! Callbacks run while the machine's lock is held, so they arrive strictly
//! ordered. They must return quickly and must not call back into the state
//! machine.

use crate::types::CredentialRecord;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use tracing::trace;

/// Receives sign-in lifecycle callbacks.
///
/// For one successful sign-in the order is always
/// `on_credentials_available` followed by `on_sign_in_completed`.
pub trait SignInDelegate: Send + Sync {
    /// An attempt has started. Default: ignored.
    fn on_sign_in_started(&self) {}

    fn on_credentials_available(&self, record: &CredentialRecord);

    fn on_sign_in_completed(&self, auto_sign_in: bool);

    fn on_signed_out(&self);
}

/// Republishes delegate callbacks on the runtime [`EventBus`].
///
/// Tokens are not forwarded; subscribers only learn the user id.
#[derive(Debug, Clone)]
pub struct EventBusDelegate {
    event_bus: EventBus,
}

impl EventBusDelegate {
    pub fn new(event_bus: EventBus) -> Self {
        Self { event_bus }
    }

    fn emit(&self, event: AuthEvent) {
        // No subscribers is not an error for the sign-in flow.
        if self.event_bus.emit(CoreEvent::Auth(event)).is_err() {
            trace!("Auth event dropped, no subscribers");
        }
    }
}

impl SignInDelegate for EventBusDelegate {
    fn on_sign_in_started(&self) {
        self.emit(AuthEvent::SignInStarted);
    }

    fn on_credentials_available(&self, record: &CredentialRecord) {
        self.emit(AuthEvent::CredentialsAvailable {
            user_id: record.user_id().to_string(),
        });
    }

    fn on_sign_in_completed(&self, auto_sign_in: bool) {
        self.emit(AuthEvent::SignInCompleted { auto_sign_in });
    }

    fn on_signed_out(&self) {
        self.emit(AuthEvent::SignedOut);
    }
}
