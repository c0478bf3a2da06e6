//! # Storefront Domain
//!
//! Plain data shared by every storefront session crate.
//!
//! This crate contains:
//! - The workspace error type and `Result` alias
//! - Client configuration structures and the endpoint table
//! - Fixed names (storage keys, logical endpoint names)
//!
//! ## Architecture
//! - No dependencies on other storefront crates
//! - No I/O; loading configuration lives in `storefront-infra`

pub mod config;
pub mod constants;
pub mod errors;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
