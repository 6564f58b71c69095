//! Error classification for the proxy
//!
//! Login handshake failures, session invalidation and transport problems are
//! kept as separate variants so the session guard can decide which of them
//! are worth a re-authentication.

use axum::http::StatusCode;
use thiserror::Error;

/// Main error type for the application
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failures talking to the backend (connect, TLS, body read)
    #[error("Transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML configuration parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend answered the login handshake in an unexpected shape
    #[error("Login protocol error at {stage}: {message}")]
    Protocol {
        /// Handshake step that failed
        stage: String,
        /// What was wrong with the response
        message: String,
    },

    /// The backend rejected the username or one-time code
    #[error("Authentication failed: {reason}")]
    AuthFailed {
        /// Why the login was considered unsuccessful
        reason: String,
    },

    /// The backend no longer honours the session cookies
    #[error("Session invalid: {reason}")]
    SessionInvalid {
        /// What revealed the invalidation
        reason: String,
    },

    /// Rebuilding the session after an invalidation failed
    #[error("re-authentication failed: {source}")]
    ReauthFailed {
        /// The authenticator's error
        #[source]
        source: Box<Error>,
    },

    /// The single retry after a fresh login failed as well
    #[error("proxy error after re-authentication: {source}")]
    ProxyAfterReauth {
        /// The forwarder's error on the retry
        #[source]
        source: Box<Error>,
    },

    /// One-time code generation errors
    #[error("OTP error: {message}")]
    Otp {
        /// Error message
        message: String,
    },

    /// Timeout errors
    #[error("Operation timed out after {duration_secs} seconds: {operation}")]
    Timeout {
        /// The operation that timed out
        operation: String,
        /// Duration in seconds before timing out
        duration_secs: u64,
    },

    /// Inbound request body exceeded the configured limit
    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge {
        /// Configured limit in bytes
        limit: usize,
    },

    /// Configuration errors
    #[error("Configuration error in {field}: {message}")]
    Config {
        /// The configuration field that has an error
        field: String,
        /// Error message describing the issue
        message: String,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal issue
        message: String,
    },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a login protocol-shape error
    pub fn protocol<S: Into<String>>(stage: S, message: S) -> Self {
        Self::Protocol {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Create an authentication failure
    pub fn auth_failed(reason: impl Into<String>) -> Self {
        Self::AuthFailed {
            reason: reason.into(),
        }
    }

    /// Create a session-invalid signal
    pub fn session_invalid(reason: impl Into<String>) -> Self {
        Self::SessionInvalid {
            reason: reason.into(),
        }
    }

    /// Wrap an authenticator error raised during recovery
    pub fn reauth_failed(source: Error) -> Self {
        Self::ReauthFailed {
            source: Box::new(source),
        }
    }

    /// Wrap a forwarder error raised on the retry
    pub fn proxy_after_reauth(source: Error) -> Self {
        Self::ProxyAfterReauth {
            source: Box::new(source),
        }
    }

    /// Create an OTP error
    pub fn otp(message: impl Into<String>) -> Self {
        Self::Otp {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(operation: S, duration_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration_secs,
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(field: S, message: S) -> Self {
        Self::Config {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error means the backend dropped the session.
    ///
    /// This is the only condition the guard re-authenticates for.
    pub fn is_session_invalid(&self) -> bool {
        matches!(self, Error::SessionInvalid { .. })
    }

    /// Whether this error came from the network rather than the backend's answer
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Http(..))
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::Http(..) => "transport",
            Error::Toml(..) => "toml",
            Error::Url(..) => "url",
            Error::Io(..) => "io",
            Error::Protocol { .. } => "protocol",
            Error::AuthFailed { .. } => "auth",
            Error::SessionInvalid { .. } => "session_invalid",
            Error::ReauthFailed { .. } => "reauth_failed",
            Error::ProxyAfterReauth { .. } => "proxy_after_reauth",
            Error::Otp { .. } => "otp",
            Error::Timeout { .. } => "timeout",
            Error::PayloadTooLarge { .. } => "payload_too_large",
            Error::Config { .. } => "config",
            Error::Internal { .. } => "internal",
        }
    }

    /// HTTP status reported to the inbound caller
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Http(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            Error::Http(..)
            | Error::Protocol { .. }
            | Error::AuthFailed { .. }
            | Error::SessionInvalid { .. }
            | Error::ReauthFailed { .. }
            | Error::ProxyAfterReauth { .. } => StatusCode::BAD_GATEWAY,
            Error::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
