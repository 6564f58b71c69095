//! Login handshake integration tests
//!
//! Runs the authenticator against a mock of the backend's auth proxy.

mod common;

use common::{
    CodeEvent, LOGIN_LOCATION, LOGIN_PAGE, MockBackend, StubCodes, TestConfig, TestUtils,
};
use hka_2fa_proxy::{Error, session::Authenticate, session::LoginAuthenticator};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn authenticator(server: &MockServer, codes: Arc<StubCodes>) -> LoginAuthenticator {
    LoginAuthenticator::new(Arc::new(TestConfig::for_backend(server)), codes).unwrap()
}

#[tokio::test]
async fn test_successful_login_yields_cookie_session() {
    TestUtils::init_logger();
    let server = MockBackend::start().await;
    MockBackend::mount_working_login(&server).await;

    let codes = Arc::new(StubCodes::new());
    let started = chrono::Utc::now();
    let session = authenticator(&server, codes.clone())
        .authenticate()
        .await
        .unwrap();

    assert!(session.established_at() >= started);
    let base = url::Url::parse(&server.uri()).unwrap();
    let cookies = session.cookies_for(&base).unwrap();
    assert_eq!(cookies.to_str().unwrap(), common::SESSION_COOKIE);
    assert_eq!(MockBackend::login_count(&server).await, 1);
}

#[tokio::test]
async fn test_login_form_carries_tokens_username_and_code() {
    let server = MockBackend::start().await;
    MockBackend::mount_working_login(&server).await;

    let mut settings = TestConfig::for_backend(&server);
    settings.target.username = "  abcd1234 \n".to_string();
    let codes = Arc::new(StubCodes::new());
    LoginAuthenticator::new(Arc::new(settings), codes)
        .unwrap()
        .authenticate()
        .await
        .unwrap();

    let posts = MockBackend::requests_to(&server, "/lm_auth_proxy").await;
    assert_eq!(posts.len(), 1);
    let post = &posts[0];

    assert_eq!(post.url.query(), Some("LMLogon"));
    assert_eq!(
        post.headers.get("referer").unwrap().to_str().unwrap(),
        format!("{}{}", server.uri(), LOGIN_LOCATION)
    );
    assert_eq!(
        post.headers.get("content-type").unwrap().to_str().unwrap(),
        "application/x-www-form-urlencoded"
    );
    assert!(
        post.headers
            .get("user-agent")
            .unwrap()
            .to_str()
            .unwrap()
            .contains("Chrome/140")
    );

    let form = TestUtils::form_pairs(&post.body);
    let expected: Vec<(String, String)> = [
        ("curl", "Z2Fowa"),
        ("curlid", "4f0c-11"),
        ("curlmode", "0"),
        ("username", "abcd1234"),
        ("password", "000001"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    assert_eq!(form, expected);
}

#[tokio::test]
async fn test_waits_for_fresh_window_before_each_code() {
    let server = MockBackend::start().await;
    MockBackend::mount_working_login(&server).await;

    let codes = Arc::new(StubCodes::new());
    let auth = authenticator(&server, codes.clone());
    auth.authenticate().await.unwrap();
    auth.authenticate().await.unwrap();

    assert_eq!(
        codes.events(),
        vec![
            CodeEvent::Wait,
            CodeEvent::Generate("000001".to_string()),
            CodeEvent::Wait,
            CodeEvent::Generate("000002".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_login_page_response_is_auth_failure() {
    let server = MockBackend::start().await;
    MockBackend::mount_login_redirect(&server).await;
    MockBackend::login_rejected().expect(1).mount(&server).await;

    let err = authenticator(&server, Arc::new(StubCodes::new()))
        .authenticate()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::AuthFailed { .. }), "got {:?}", err);
    assert!(err.to_string().contains("login page"));
}

#[tokio::test]
async fn test_generic_success_status_is_not_accepted() {
    let server = MockBackend::start().await;
    MockBackend::mount_login_redirect(&server).await;
    Mock::given(method("POST"))
        .and(path("/lm_auth_proxy"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>Welcome</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let err = authenticator(&server, Arc::new(StubCodes::new()))
        .authenticate()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AuthFailed { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_configured_success_status_is_honoured() {
    let server = MockBackend::start().await;
    MockBackend::mount_login_redirect(&server).await;
    Mock::given(method("POST"))
        .and(path("/lm_auth_proxy"))
        .respond_with(ResponseTemplate::new(303).insert_header("Location", "/owa/"))
        .mount(&server)
        .await;

    let mut settings = TestConfig::for_backend(&server);
    settings.login.success_status = 303;
    let result = LoginAuthenticator::new(Arc::new(settings), Arc::new(StubCodes::new()))
        .unwrap()
        .authenticate()
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_missing_redirect_is_protocol_error() {
    let server = MockBackend::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>no login here</html>"))
        .mount(&server)
        .await;
    MockBackend::login_success().expect(0).mount(&server).await;

    let codes = Arc::new(StubCodes::new());
    let err = authenticator(&server, codes.clone())
        .authenticate()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Protocol { .. }), "got {:?}", err);
    assert!(codes.issued().is_empty());
}

#[tokio::test]
async fn test_redirect_without_location_is_protocol_error() {
    let server = MockBackend::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(302))
        .mount(&server)
        .await;

    let err = authenticator(&server, Arc::new(StubCodes::new()))
        .authenticate()
        .await
        .unwrap_err();
    assert!(err.to_string().contains("'Location' header not found"));
}

#[tokio::test]
async fn test_redirect_without_tokens_is_protocol_error() {
    let server = MockBackend::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", "/CookieAuth.dll?GetLogon?curl=Z2F"),
        )
        .mount(&server)
        .await;
    MockBackend::login_success().expect(0).mount(&server).await;

    let err = authenticator(&server, Arc::new(StubCodes::new()))
        .authenticate()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Protocol { .. }), "got {:?}", err);
    assert!(err.to_string().contains("curlid"));
}

#[tokio::test]
async fn test_unreachable_backend_is_transport_error() {
    let server = MockBackend::start().await;
    let mut settings = TestConfig::for_backend(&server);
    settings.target.host = TestUtils::closed_port_url();

    let err = LoginAuthenticator::new(Arc::new(settings), Arc::new(StubCodes::new()))
        .unwrap()
        .authenticate()
        .await
        .unwrap_err();
    assert!(err.is_transport(), "got {:?}", err);
}

#[tokio::test]
async fn test_login_page_body_check_is_case_insensitive() {
    let server = MockBackend::start().await;
    MockBackend::mount_login_redirect(&server).await;
    Mock::given(method("POST"))
        .and(path("/lm_auth_proxy"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE.to_uppercase()))
        .mount(&server)
        .await;

    let err = authenticator(&server, Arc::new(StubCodes::new()))
        .authenticate()
        .await
        .unwrap_err();
    assert!(err.to_string().contains("login page"));
}
