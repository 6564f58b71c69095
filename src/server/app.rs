//! Axum application setup
//!
//! Creates and configures the Axum application with routes and middleware.

use crate::{config::Settings, otp::CodeProvider, session::SessionGuard};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Path prefix reserved for the proxy's own endpoints
pub const CONTROL_PREFIX: &str = "/_proxy";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Guard around the backend session
    pub guard: Arc<SessionGuard>,
    /// Application settings
    pub settings: Arc<Settings>,
    /// Server start time for uptime calculation
    pub start_time: std::time::Instant,
}

/// Create the main Axum application with routes and middleware
pub fn create_app(settings: Settings, codes: Arc<dyn CodeProvider>) -> crate::Result<Router> {
    let settings = Arc::new(settings);
    let guard = Arc::new(SessionGuard::from_settings(settings.clone(), codes)?);
    Ok(create_app_with_guard(settings, guard))
}

/// Create the application around an existing guard
pub fn create_app_with_guard(settings: Arc<Settings>, guard: Arc<SessionGuard>) -> Router {
    let body_limit = settings.server.max_body_size;

    let state = AppState {
        guard,
        settings,
        start_time: std::time::Instant::now(),
    };

    Router::new()
        .route(
            &format!("{}/ping", CONTROL_PREFIX),
            get(super::handlers::ping),
        )
        .route(
            &format!("{}/logout", CONTROL_PREFIX),
            post(super::handlers::logout),
        )
        .fallback(super::handlers::proxy)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}
