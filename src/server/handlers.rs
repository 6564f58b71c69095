//! HTTP request handlers
//!
//! The fallback handler proxies everything through the session guard; the
//! control endpoints under `/_proxy` report on and reset the session.

use crate::{
    Error, VERSION,
    error::{format_error, format_error_for_logging},
    server::app::AppState,
    types::{ErrorResponse, PingResponse, ProxyRequest, ProxyResponse},
};
use axum::{
    Json,
    body::{Body, Bytes},
    extract::{State, rejection::BytesRejection},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};

/// Proxy endpoint
///
/// ANY /*
///
/// Forwards the request to the backend through the authenticated session
/// and relays the backend's response.
pub async fn proxy(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return error_response(&Error::PayloadTooLarge {
                limit: state.settings.server.max_body_size,
            });
        }
        Err(rejection) => {
            tracing::warn!("Failed to read inbound body: {}", rejection.body_text());
            return (
                rejection.status(),
                Json(ErrorResponse::with_context(
                    rejection.body_text(),
                    "request_body",
                )),
            )
                .into_response();
        }
    };

    let request = ProxyRequest::from_parts(method, &uri, headers, body);
    let deadline = state.settings.server.request_timeout;

    let result = match tokio::time::timeout(deadline, state.guard.proxy(&request)).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(
            format!("{} {}", request.method, request.path_and_query),
            deadline.as_secs(),
        )),
    };

    match result {
        Ok(response) => {
            tracing::debug!(
                "Relaying {} for {} {}",
                response.status,
                request.method,
                request.path_and_query
            );
            relay(response)
        }
        Err(e) => error_response(&e),
    }
}

fn relay(proxied: ProxyResponse) -> Response {
    let mut response = Response::new(Body::from(proxied.body));
    *response.status_mut() = proxied.status;
    *response.headers_mut() = proxied.headers;
    response
}

fn error_response(error: &Error) -> Response {
    tracing::error!("Proxy request failed: {}", format_error_for_logging(error));
    (
        error.status_code(),
        Json(ErrorResponse::with_context(format_error(error), error.category())),
    )
        .into_response()
}

/// Health check endpoint
///
/// GET /_proxy/ping
pub async fn ping(State(state): State<AppState>) -> Json<PingResponse> {
    let uptime = state.start_time.elapsed().as_secs();
    let response = PingResponse::new(uptime, VERSION, state.guard.is_active());

    tracing::debug!(
        "Ping response: uptime={}s, session_active={}",
        uptime,
        response.session_active
    );
    Json(response)
}

/// Discard the backend session; the next proxied request logs in again
///
/// POST /_proxy/logout
pub async fn logout(State(state): State<AppState>) -> StatusCode {
    let discarded = state.guard.invalidate().await;
    tracing::info!("Logout requested (session held: {})", discarded);
    StatusCode::NO_CONTENT
}
