//! Type definitions for the proxy
//!
//! This module contains the main data structures used for requests and responses.

pub mod internal;
pub mod request;
pub mod response;

pub use internal::LoginParameters;
pub use request::ProxyRequest;
pub use response::{ErrorResponse, PingResponse, ProxyResponse};
