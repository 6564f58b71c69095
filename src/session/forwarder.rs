//! Forwarding inbound requests through an authenticated session

use super::network::{Session, remove_hop_by_hop};
use crate::config::Settings;
use crate::types::{ProxyRequest, ProxyResponse};
use crate::{Error, Result};
use axum::http::{HeaderMap, HeaderValue, header};
use std::sync::Arc;
use url::Url;

/// Replays requests against the backend and spots expired sessions
#[derive(Debug, Clone)]
pub struct Forwarder {
    settings: Arc<Settings>,
}

impl Forwarder {
    /// Create a forwarder for the configured target
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    /// Send `request` through `session` and capture the full response.
    ///
    /// Returns [`Error::SessionInvalid`] when the backend bounces the request
    /// to its login, so the caller can decide whether to log in again.
    pub async fn forward(
        &self,
        session: &Session,
        request: &ProxyRequest,
    ) -> Result<ProxyResponse> {
        let url = request.target_url(self.settings.target_base());
        let parsed = Url::parse(&url)?;

        let headers = self.outbound_headers(session, &parsed, &request.headers);

        tracing::debug!("Forwarding {} {}", request.method, request.path_and_query);
        let mut builder = session
            .client()
            .request(request.method.clone(), parsed)
            .headers(headers);
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }
        let response = builder.send().await?;

        let status = response.status();
        let mut headers = response.headers().clone();
        let body = response.bytes().await?;

        self.check_session(&headers, &body)?;

        remove_hop_by_hop(&mut headers);
        headers.remove(header::CONTENT_LENGTH);

        Ok(ProxyResponse::new(status, headers, body))
    }

    /// Inbound headers minus anything that must not reach the backend
    fn outbound_headers(&self, session: &Session, url: &Url, inbound: &HeaderMap) -> HeaderMap {
        let mut headers = inbound.clone();
        remove_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);
        // The client's configured user agent applies instead.
        headers.remove(header::USER_AGENT);
        // The client negotiates its own encodings and decodes the body, so
        // the login-page check always sees plain text.
        headers.remove(header::ACCEPT_ENCODING);

        // An explicit Cookie header stops the jar from adding its own, so merge them.
        if let Some(jar_cookies) = session.cookies_for(url) {
            let inbound_cookies: Vec<&str> = headers
                .get_all(header::COOKIE)
                .iter()
                .filter_map(|value| value.to_str().ok())
                .collect();

            if !inbound_cookies.is_empty() {
                let merged = match jar_cookies.to_str() {
                    Ok(jar) => format!("{}; {}", inbound_cookies.join("; "), jar),
                    Err(_) => inbound_cookies.join("; "),
                };
                headers.remove(header::COOKIE);
                if let Ok(value) = HeaderValue::from_str(&merged) {
                    headers.insert(header::COOKIE, value);
                }
            }
        }

        headers
    }

    /// Fail with `SessionInvalid` if the response is the backend's login
    fn check_session(&self, headers: &HeaderMap, body: &[u8]) -> Result<()> {
        let login = &self.settings.login;

        if let Some(location) = headers
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            && login
                .login_redirect_markers
                .iter()
                .any(|marker| contains_ignore_case(location.as_bytes(), marker))
        {
            return Err(Error::session_invalid(format!(
                "backend redirected to its login at {}",
                location
            )));
        }

        if is_textual(headers) && contains_ignore_case(body, &login.login_page_marker) {
            return Err(Error::session_invalid("backend served its login page"));
        }

        Ok(())
    }
}

/// Whether the body may be a login page; attachments and images are skipped
fn is_textual(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
    else {
        return true;
    };
    let content_type = content_type.to_ascii_lowercase();
    content_type.starts_with("text/")
        || ["html", "xml", "json", "javascript"]
            .iter()
            .any(|kind| content_type.contains(kind))
}

/// ASCII case-insensitive substring search
fn contains_ignore_case(haystack: &[u8], needle: &str) -> bool {
    let needle = needle.as_bytes();
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    haystack
        .windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle))
}
