//! Test doubles for the session core
//!
//! - **[`mocks`]**: scripted [`RefreshTransport`](crate::auth::RefreshTransport)
//!   and a recording [`SessionObserver`](crate::auth::SessionObserver)
//! - **[`async_utils`]**: polling and deadline helpers
//!
//! Enabled in unit tests and, for downstream crates, with the `test-utils`
//! feature.

pub mod async_utils;
pub mod mocks;

pub use async_utils::{poll_until, within};
pub use mocks::{MockRefreshTransport, RecordingObserver};
