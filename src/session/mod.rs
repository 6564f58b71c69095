//! Backend session handling
//!
//! Logging in, forwarding requests through the authenticated session, and
//! the guard that keeps exactly one session alive and serializes its use.

pub mod authenticator;
pub mod forwarder;
pub mod guard;
pub mod network;

pub use authenticator::{Authenticate, LoginAuthenticator};
pub use forwarder::Forwarder;
pub use guard::SessionGuard;
pub use network::{NetworkManager, Session};
