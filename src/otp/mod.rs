//! One-time code provider
//!
//! The authenticator only needs two capabilities from a code source: produce
//! the code for a point in time, and wait until a code that has not been
//! handed out yet becomes current.

pub mod generator;

pub use generator::TotpGenerator;

use crate::Result;
use chrono::{DateTime, Utc};

/// Source of one-time codes for the login form
#[async_trait::async_trait]
pub trait CodeProvider: Send + Sync {
    /// Code valid at `at`; remembered as the last issued code
    fn generate(&self, at: DateTime<Utc>) -> Result<String>;

    /// Wait until the current code differs from the last issued one.
    ///
    /// Returns immediately if nothing was issued yet. Bounded by one
    /// validity window.
    async fn wait_for_next_window(&self);
}
