//! Common test utilities and helpers
//!
//! A wiremock stand-in for the backend's auth proxy and a predictable code
//! provider.

#![allow(dead_code)]

use hka_2fa_proxy::{CodeProvider, Result, config::Settings};
use std::sync::Mutex;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Redirect the backend sends unauthenticated callers to
pub const LOGIN_LOCATION: &str =
    "/CookieAuth.dll?GetLogon?curl=Z2Fowa&curlid=4f0c-11&curlmode=0";

/// Username configured for tests
pub const USERNAME: &str = "abcd1234";

/// Session cookie the mock backend hands out
pub const SESSION_COOKIE: &str = "cadata=session-1";

/// Body of the backend's login page
pub const LOGIN_PAGE: &str =
    "<html><head><title>Anmeldung</title></head><body>Outlook</body></html>";

/// What the code provider was asked to do, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeEvent {
    Wait,
    Generate(String),
}

/// Code provider issuing 000001, 000002, ... without sleeping
#[derive(Debug, Default)]
pub struct StubCodes {
    events: Mutex<Vec<CodeEvent>>,
}

impl StubCodes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CodeEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn issued(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                CodeEvent::Generate(code) => Some(code),
                CodeEvent::Wait => None,
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl CodeProvider for StubCodes {
    fn generate(&self, _at: chrono::DateTime<chrono::Utc>) -> Result<String> {
        let mut events = self.events.lock().unwrap();
        let count = events
            .iter()
            .filter(|event| matches!(event, CodeEvent::Generate(_)))
            .count();
        let code = format!("{:06}", count + 1);
        events.push(CodeEvent::Generate(code.clone()));
        Ok(code)
    }

    async fn wait_for_next_window(&self) {
        self.events.lock().unwrap().push(CodeEvent::Wait);
    }
}

/// Test configuration factory
pub struct TestConfig;

impl TestConfig {
    /// Settings pointing at the mock backend
    pub fn for_backend(server: &MockServer) -> Settings {
        let mut settings = Settings::default();
        settings.target.host = server.uri();
        settings.target.username = USERNAME.to_string();
        settings.otp.secret = "JBSWY3DPEHPK3PXP".to_string();
        settings.server.port = 0;
        settings.server.request_timeout = Duration::from_secs(10);
        settings.network.connect_timeout = 2;
        settings.network.request_timeout = 5;
        settings
    }
}

/// Mock backend factory
pub struct MockBackend;

impl MockBackend {
    /// Create new mock server
    pub async fn start() -> MockServer {
        MockServer::start().await
    }

    /// `GET /` redirects to the login page with correlation tokens
    pub async fn mount_login_redirect(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", LOGIN_LOCATION))
            .named("initial redirect")
            .mount(server)
            .await;
    }

    /// Login POST succeeds and sets the session cookie
    pub fn login_success() -> Mock {
        Mock::given(method("POST"))
            .and(path("/lm_auth_proxy"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", "/owa/")
                    .insert_header("Set-Cookie", format!("{}; Path=/; HttpOnly", SESSION_COOKIE)),
            )
            .named("login accepted")
    }

    /// Login POST answers with the login page again
    pub fn login_rejected() -> Mock {
        Mock::given(method("POST"))
            .and(path("/lm_auth_proxy"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
            .named("login rejected")
    }

    /// Complete happy-path login
    pub async fn mount_working_login(server: &MockServer) {
        Self::mount_login_redirect(server).await;
        Self::login_success().mount(server).await;
    }

    /// A backend page answering `GET page` with `body`
    pub fn page(page: &str, body: &str) -> Mock {
        Mock::given(method("GET"))
            .and(path(page))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Backend", "owa")
                    .set_body_raw(body, "text/html; charset=utf-8"),
            )
    }

    /// A backend page that bounces to the login, as after session expiry
    pub fn expired(page: &str) -> Mock {
        Mock::given(method("GET"))
            .and(path(page))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", LOGIN_LOCATION))
            .named("session expired")
    }

    /// Number of login POSTs the backend received
    pub async fn login_count(server: &MockServer) -> usize {
        Self::requests_to(server, "/lm_auth_proxy").await.len()
    }

    /// Requests the backend received for `path`
    pub async fn requests_to(server: &MockServer, request_path: &str) -> Vec<wiremock::Request> {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.url.path() == request_path)
            .collect()
    }
}

/// Test utilities
pub struct TestUtils;

impl TestUtils {
    /// Initialize test logging
    pub fn init_logger() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter("debug")
            .try_init();
    }

    /// URL of a local port nothing listens on
    pub fn closed_port_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{}", port)
    }

    /// Decode a form-encoded body into pairs
    pub fn form_pairs(body: &[u8]) -> Vec<(String, String)> {
        url::form_urlencoded::parse(body).into_owned().collect()
    }
}
