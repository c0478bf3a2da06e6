//! Configuration loading and management
//!
//! This module provides utilities for loading client configuration from
//! environment variables and files, and for opening the configured session
//! storage.

pub mod loader;
pub mod storage;

// Re-export commonly used items
pub use loader::{load, load_from_env, load_from_file, load_from_lookup, probe_config_paths};
pub use storage::build_token_store;
