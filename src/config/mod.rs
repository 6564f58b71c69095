//! Configuration management for the proxy
//!
//! This module handles loading and managing configuration settings.

pub mod loader;
pub mod settings;

pub use loader::ConfigLoader;
pub use settings::Settings;

/// Serializes tests that mutate process environment variables
#[cfg(test)]
pub(crate) static ENV_TEST_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
