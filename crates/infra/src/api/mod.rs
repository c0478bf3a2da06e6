//! Authenticated storefront API client
//!
//! # Architecture
//!
//! - Bearer token from the session store on every request
//! - One refresh-and-retry per request on 401, shared through the
//!   `RefreshCoordinator`
//! - Auth-exempt endpoints propagate their 401 unchanged
//! - Per-request timeout and cancellation
//!
//! Structured tracing only; token values are never logged.

pub mod auth_flows;
pub mod client;
pub mod errors;
pub mod exempt;
pub mod request;

pub use auth_flows::{session_from_response, AuthFlows};
pub use client::{ApiClient, ApiClientBuilder, ApiClientConfig};
pub use errors::{ApiError, ApiErrorCategory};
pub use exempt::{EndpointPattern, ExemptSet};
pub use request::{ApiResponse, RequestDescriptor, RequestOptions};
