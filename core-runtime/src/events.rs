//! # Event Bus System
//!
//! Broadcasts sign-in lifecycle events to any number of observers using
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The state machine reports transitions to a single delegate. Hosts that need
//! more than one observer (UI, analytics, sync schedulers) install the
//! event-bus delegate from `core-auth`, which republishes each callback as a
//! [`CoreEvent`] here.
//!
//! ```text
//! ┌───────────────┐  delegate   ┌───────────┐   subscribe   ┌────────────┐
//! │ State Machine ├────────────>│ EventBus  ├──────────────>│ Subscriber │
//! └───────────────┘             │ (broadcast│               └────────────┘
//!                               │  channel) ├──────────────>┌────────────┐
//!                               └───────────┘               │ Subscriber │
//!                                                           └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(16);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Auth(AuthEvent::SignInCompleted { auto_sign_in: true }))
//!     .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Auth(AuthEvent::SignInCompleted { .. })));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell behind and missed `n`
//!   events. Non-fatal; keep receiving.
//! - **`RecvError::Closed`**: every sender was dropped. Treat as shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 64;

/// Top-level event published through the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Sign-in lifecycle events
    Auth(AuthEvent),
}

impl CoreEvent {
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthEvent::SignInCompleted { .. })
            | CoreEvent::Auth(AuthEvent::SignedOut) => EventSeverity::Info,
            CoreEvent::Auth(_) => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
///
/// Sign-in events are either progress (`Debug`) or a settled state (`Info`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
}

/// Sign-in lifecycle events, one per delegate callback.
///
/// Token values never travel on the bus. Subscribers that need the access
/// token read it from the state machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// An interactive or silent sign-in attempt was started.
    SignInStarted,
    /// A valid credential record became available.
    CredentialsAvailable {
        /// Provider-assigned user identifier.
        user_id: String,
    },
    /// The sign-in flow finished successfully.
    SignInCompleted {
        /// `true` when credentials were restored without user interaction.
        auto_sign_in: bool,
    },
    /// The user is signed out and persisted credentials were removed.
    SignedOut,
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::SignInStarted => "Sign-in attempt started",
            AuthEvent::CredentialsAvailable { .. } => "Credentials available",
            AuthEvent::SignInCompleted { .. } => "User signed in successfully",
            AuthEvent::SignedOut => "User signed out",
        }
    }
}

/// Central event bus for broadcasting events to multiple subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// A subscriber that falls behind by more than `capacity` events receives
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching event is currently buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    fn matches(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(auto_sign_in: bool) -> CoreEvent {
        CoreEvent::Auth(AuthEvent::SignInCompleted { auto_sign_in })
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);

        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(CoreEvent::Auth(AuthEvent::SignedOut)).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Auth(AuthEvent::CredentialsAvailable {
            user_id: "u1".to_string(),
        });
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_events_arrive_in_emission_order() {
        let bus = EventBus::new(10);
        let mut sub = bus.subscribe();

        bus.emit(CoreEvent::Auth(AuthEvent::CredentialsAvailable {
            user_id: "u1".to_string(),
        }))
        .ok();
        bus.emit(completed(true)).ok();

        assert!(matches!(
            sub.recv().await.unwrap(),
            CoreEvent::Auth(AuthEvent::CredentialsAvailable { .. })
        ));
        assert_eq!(sub.recv().await.unwrap(), completed(true));
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| event.severity() >= EventSeverity::Info);

        bus.emit(CoreEvent::Auth(AuthEvent::SignInStarted)).ok();
        bus.emit(completed(false)).ok();

        assert_eq!(stream.recv().await.unwrap(), completed(false));
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for _ in 0..5 {
            bus.emit(CoreEvent::Auth(AuthEvent::SignedOut)).ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_every_auth_event_has_a_severity() {
        let cases = [
            (CoreEvent::Auth(AuthEvent::SignInStarted), EventSeverity::Debug),
            (
                CoreEvent::Auth(AuthEvent::CredentialsAvailable {
                    user_id: "u1".to_string(),
                }),
                EventSeverity::Debug,
            ),
            (completed(false), EventSeverity::Info),
            (CoreEvent::Auth(AuthEvent::SignedOut), EventSeverity::Info),
        ];

        for (event, severity) in cases {
            assert_eq!(event.severity(), severity, "{:?}", event);
        }
        assert!(EventSeverity::Debug < EventSeverity::Info);
    }

    #[test]
    fn test_event_severity_and_description() {
        assert_eq!(completed(true).severity(), EventSeverity::Info);
        assert_eq!(
            CoreEvent::Auth(AuthEvent::SignInStarted).severity(),
            EventSeverity::Debug
        );
        assert_eq!(
            CoreEvent::Auth(AuthEvent::SignedOut).description(),
            "User signed out"
        );
    }

    #[test]
    fn test_event_serialization_shape() {
        let json = serde_json::to_value(completed(true)).unwrap();
        assert_eq!(json["type"], "Auth");
        assert_eq!(json["payload"]["event"], "SignInCompleted");
        assert_eq!(json["payload"]["auto_sign_in"], true);

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, completed(true));
    }

    #[tokio::test]
    async fn test_try_recv() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe());
        assert!(stream.try_recv().is_none());

        bus.emit(CoreEvent::Auth(AuthEvent::SignedOut)).ok();
        let received = stream.try_recv().unwrap().unwrap();
        assert_eq!(received, CoreEvent::Auth(AuthEvent::SignedOut));
    }
}
