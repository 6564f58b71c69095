//! Backend HTTP clients and header hygiene
//!
//! Every authenticated session owns its own client and cookie jar. The
//! clients never follow redirects: the login handshake needs to see the
//! backend's 302s and the forwarder relays them to the caller.

use crate::config::Settings;
use crate::{Error, Result};
use axum::http::{HeaderMap, HeaderName, HeaderValue, header};
use chrono::{DateTime, Utc};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, Proxy, redirect};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// An authenticated cookie context for the backend
#[derive(Debug, Clone)]
pub struct Session {
    client: Client,
    jar: Arc<Jar>,
    established_at: DateTime<Utc>,
}

impl Session {
    /// Client carrying this session's cookies
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// When the login that produced this session completed
    pub fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }

    /// `Cookie` header value the session would send to `url`
    pub fn cookies_for(&self, url: &Url) -> Option<HeaderValue> {
        self.jar.cookies(url)
    }

    /// Mark the login as completed now
    pub(crate) fn mark_established(mut self) -> Self {
        self.established_at = Utc::now();
        self
    }
}

/// Builds backend clients from the network configuration
#[derive(Debug, Clone)]
pub struct NetworkManager {
    user_agent: String,
    connect_timeout: Duration,
    request_timeout: Duration,
    proxy_url: Option<String>,
}

impl NetworkManager {
    /// Create a network manager from the effective settings
    pub fn new(settings: &Settings) -> Self {
        Self {
            user_agent: settings.network.user_agent.clone(),
            connect_timeout: Duration::from_secs(settings.network.connect_timeout),
            request_timeout: Duration::from_secs(settings.network.request_timeout),
            proxy_url: settings.get_proxy_url(),
        }
    }

    /// Create a client with an empty cookie jar, ready for a login attempt
    pub fn fresh_session(&self) -> Result<Session> {
        let jar = Arc::new(Jar::default());

        let mut client_builder = Client::builder()
            .user_agent(self.user_agent.as_str())
            .cookie_provider(jar.clone())
            .redirect(redirect::Policy::none())
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout);

        if let Some(proxy_url) = &self.proxy_url {
            let proxy = Proxy::all(proxy_url).map_err(|e| {
                Error::config("network.proxy", &format!("Invalid proxy URL: {}", e))
            })?;
            client_builder = client_builder.proxy(proxy);
        }

        let client = client_builder
            .build()
            .map_err(|e| Error::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Session {
            client,
            jar,
            established_at: Utc::now(),
        })
    }
}

/// Whether a header only applies to a single transport hop
pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "proxy-connection"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Remove hop-by-hop headers, including any listed in `Connection`
pub fn remove_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }

    let hop: Vec<HeaderName> = headers
        .keys()
        .filter(|name| is_hop_by_hop(name))
        .cloned()
        .collect();
    for name in hop {
        headers.remove(name);
    }
}
