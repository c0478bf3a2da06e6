//! Session core: token storage and single-flight refresh
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  RefreshCoordinator  │  at most one refresh in flight
//! └─────────┬────────────┘
//!           │
//!           ├──► RefreshTransport   (raw call, no interception)
//!           ├──► SessionStore       (begin / apply_refresh / end)
//!           │         │
//!           │         └──► TokenStore  (memory, file, keychain)
//!           │
//!           └──► SessionEvents      (SessionTerminated broadcast)
//! ```
//!
//! # Module Organization
//!
//! - **[`types`]**: storage keys, [`TokenPair`], [`Session`]
//! - **[`store`]**: the [`TokenStore`] seam and [`SessionStore`]
//! - **[`traits`]**: the [`RefreshTransport`] seam
//! - **[`events`]**: termination events and observers
//! - **[`coordinator`]**: [`RefreshCoordinator`]
//!
//! # Platform Support
//!
//! The `keychain` feature stores the session in the platform keychain via
//! the `keyring` crate (macOS Keychain, Windows Credential Manager, Linux
//! Secret Service).

pub mod coordinator;
pub mod events;
mod file_store;
#[cfg(feature = "keychain")]
mod keychain;
pub mod store;
pub mod traits;
pub mod types;

pub use coordinator::{RefreshCoordinator, RefreshError, RefreshResult};
pub use events::{SessionEndReason, SessionEvents, SessionObserver, SessionTerminated};
pub use file_store::FileTokenStore;
#[cfg(feature = "keychain")]
pub use keychain::KeychainTokenStore;
pub use store::{MemoryTokenStore, SessionStore, StoreError, TokenStore};
pub use traits::{RefreshTransport, TransportError};
pub use types::{Session, StorageKey, TokenPair};
