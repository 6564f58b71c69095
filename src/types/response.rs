//! Response type definitions
//!
//! Relayed backend responses plus the small JSON bodies the proxy produces
//! on its own.

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A backend response captured in full, to be relayed verbatim
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    /// Backend status code
    pub status: StatusCode,
    /// Backend headers (hop-by-hop headers already removed)
    pub headers: HeaderMap,
    /// Complete backend body
    pub body: Bytes,
}

impl ProxyResponse {
    /// Create a new relayed response
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Body as text, for logging and inspection
    pub fn body_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Ping response for health checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    /// Server uptime in seconds
    pub server_uptime: u64,

    /// Server version
    pub version: String,

    /// Whether an authenticated session is currently held
    pub session_active: bool,
}

impl PingResponse {
    /// Create a new ping response
    pub fn new(server_uptime: u64, version: impl Into<String>, session_active: bool) -> Self {
        Self {
            server_uptime,
            version: version.into(),
            session_active,
        }
    }
}

/// Error response returned to inbound callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,

    /// Optional error context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Error timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Service version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            context: None,
            timestamp: Some(Utc::now()),
            version: Some(crate::VERSION.to_string()),
        }
    }

    /// Create error response with context
    pub fn with_context(error: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            context: Some(context.into()),
            ..Self::new(error)
        }
    }
}
