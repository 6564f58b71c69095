//! HKA two-factor proxy
//!
//! An HTTP reverse proxy for a web backend that sits behind a form login
//! with a time-based one-time code. The proxy keeps a single logged-in
//! session, forwards every inbound request through it, and logs in again
//! when the backend drops the session.
//!
//! # Architecture
//!
//! - [`otp`]: one-time codes that are never reused across logins
//! - [`session`]: the login handshake, the forwarder and the session guard
//! - [`server`]: the axum application that hands requests to the guard
//! - [`config`]: settings from file, environment and command line
//!
//! # Usage
//!
//! ```bash
//! hka-2fa-proxy run --username abcd1234 --secret JBSWY3DPEHPK3PXP
//! ```
//!
//! # Examples
//!
//! ```rust
//! use hka_2fa_proxy::{SessionGuard, Settings, TotpGenerator};
//! use std::sync::Arc;
//!
//! # fn example() -> anyhow::Result<()> {
//! let settings = Arc::new(Settings::default());
//! let codes = Arc::new(TotpGenerator::new("JBSWY3DPEHPK3PXP", 30, 6)?);
//! let guard = SessionGuard::from_settings(settings, codes)?;
//! assert!(!guard.is_active());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod otp;
pub mod server;
pub mod session;
pub mod types;

pub use config::{ConfigLoader, Settings};
pub use error::{Error, Result};
pub use otp::{CodeProvider, TotpGenerator};
pub use session::{Forwarder, LoginAuthenticator, Session, SessionGuard};
pub use types::{ErrorResponse, PingResponse, ProxyRequest, ProxyResponse};

/// Crate version reported by `/_proxy/ping` and error responses
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
