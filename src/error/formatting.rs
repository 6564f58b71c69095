//! Error formatting utilities
//!
//! Renders errors with their cause chain for logs and for the JSON body
//! returned to inbound callers.

use crate::Error;
use std::error::Error as StdError;

/// Format error for display, appending every distinct cause in the chain
pub fn format_error(error: &Error) -> String {
    let mut result = error.to_string();
    let mut source = error.source();

    while let Some(cause) = source {
        if !result.contains(&cause.to_string()) {
            result = format!("{} (caused by {})", result, cause);
        }
        source = cause.source();
    }

    result
}

/// Format error for logging with structured data
pub fn format_error_for_logging(error: &Error) -> serde_json::Value {
    let mut log_data = serde_json::json!({
        "message": format_error(error),
        "category": error.category(),
        "session_invalid": error.is_session_invalid(),
    });

    match error {
        Error::Protocol { stage, .. } => {
            log_data["stage"] = serde_json::Value::String(stage.clone());
        }
        Error::ReauthFailed { source } | Error::ProxyAfterReauth { source } => {
            log_data["cause_category"] = serde_json::Value::String(source.category().to_string());
        }
        Error::Timeout { duration_secs, .. } => {
            log_data["timeout_duration"] = serde_json::Value::Number((*duration_secs).into());
        }
        _ => {}
    }

    log_data
}
