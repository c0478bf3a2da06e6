//! Session primitives shared across storefront crates.
//!
//! Everything here is transport-agnostic: the HTTP client that drives the
//! coordinator lives in `storefront-infra`.
//!
//! # Features
//!
//! - `keychain` (default): platform keychain session storage
//! - `test-utils`: mock transports and async test helpers

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod auth;

#[cfg(any(feature = "test-utils", test))]
pub mod testing;

pub use auth::{
    RefreshCoordinator, RefreshError, Session, SessionEvents, SessionStore, TokenPair, TokenStore,
};
