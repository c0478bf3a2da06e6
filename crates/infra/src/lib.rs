//! # Storefront Infrastructure
//!
//! Network-facing implementations for the storefront session core.
//!
//! This crate contains:
//! - `http`: a thin reqwest client and the interceptor-free refresh transport
//! - `api`: the authenticated client (bearer attach, 401 refresh-and-retry)
//!   and login/registration flows
//! - `config`: configuration loading and session storage selection
//! - `logging`: tracing subscriber setup and structured request logging
//!
//! ## Architecture
//! - Implements the `RefreshTransport` seam defined in `storefront-common`
//! - Depends on `storefront-common` and `storefront-domain`
//! - Contains all network and filesystem I/O

pub mod api;
pub mod config;
pub mod http;
pub mod logging;

// Re-export commonly used items
pub use api::{ApiClient, ApiError, AuthFlows, RequestDescriptor, RequestOptions};
pub use http::RawTransport;
