//! HTTP plumbing shared by the authenticated client and the refresh transport

pub mod client;
pub mod transport;

pub use client::{HttpClient, HttpClientBuilder, HttpError};
pub use transport::{join_url, parse_token_pair, RawTransport};
