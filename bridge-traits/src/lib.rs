//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the sign-in core and the host. Each
//! trait represents a capability that the core requires but that must be
//! implemented differently per platform (desktop, iOS, Android).
//!
//! ## Traits
//!
//! ### Security & Storage
//! - [`SecureStore`](storage::SecureStore) - Credential persistence (Keychain/Keystore)
//!
//! ### Utilities
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Available |
//! | iOS      | host-injected       | 📋 Planned |
//! | Android  | host-injected       | 📋 Planned |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should convert platform-specific errors to `BridgeError` and
//! never include secret material in error messages.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so a
//! single implementation can be shared across async tasks behind an `Arc`.
//!
//! ## Examples
//!
//! ### Implementing SecureStore
//!
//! ```ignore
//! use bridge_traits::storage::SecureStore;
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! pub struct MyKeychain;
//!
//! #[async_trait]
//! impl SecureStore for MyKeychain {
//!     async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> { todo!() }
//!     async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> { todo!() }
//!     async fn delete_secret(&self, key: &str) -> Result<()> { todo!() }
//! }
//! ```

pub mod error;
pub mod logging;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use storage::SecureStore;
