//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `SecureStore` using the `keyring` crate (OS keychain / credential manager /
//!   Secret Service)
//!
//! ## Feature Flags
//!
//! - `secure-store`: Enable OS keychain integration (default)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::KeyringSecureStore;
//! use bridge_traits::SecureStore;
//! use std::sync::Arc;
//!
//! let store: Arc<dyn SecureStore> = Arc::new(KeyringSecureStore::new());
//! ```

#[cfg(feature = "secure-store")]
mod secure_store;

#[cfg(feature = "secure-store")]
pub use secure_store::{KeyringSecureStore, DEFAULT_SERVICE_NAME};
