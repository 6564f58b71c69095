//! Inbound request representation
//!
//! The body is buffered so the same request can be replayed after a
//! re-authentication.

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, Uri};

/// A fully buffered inbound request, ready to be forwarded
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    /// HTTP method
    pub method: Method,
    /// Path plus query string, always starting with `/`
    pub path_and_query: String,
    /// Inbound headers as received
    pub headers: HeaderMap,
    /// Buffered body
    pub body: Bytes,
}

impl ProxyRequest {
    /// Create a bodiless request for `path_and_query`
    pub fn new(method: Method, path_and_query: impl Into<String>) -> Self {
        let mut path_and_query = path_and_query.into();
        if !path_and_query.starts_with('/') {
            path_and_query.insert(0, '/');
        }
        Self {
            method,
            path_and_query,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Build from the parts of an inbound request
    pub fn from_parts(method: Method, uri: &Uri, headers: HeaderMap, body: Bytes) -> Self {
        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());
        Self {
            method,
            path_and_query,
            headers,
            body,
        }
    }

    /// Set headers
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Set body
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Absolute backend URL for this request
    pub fn target_url(&self, target_base: &str) -> String {
        format!("{}{}", target_base.trim_end_matches('/'), self.path_and_query)
    }
}
