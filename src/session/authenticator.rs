//! Login handshake against the backend's auth proxy
//!
//! One attempt consists of:
//! 1. `GET /` on a fresh cookie jar, expecting a redirect to the login page
//! 2. extracting the correlation tokens from that redirect
//! 3. posting the tokens, the username and a never-used one-time code to
//!    the login endpoint
//!
//! The attempt succeeds only if the login endpoint answers with the
//! configured redirect status. There is no retry at this level.

use super::network::{NetworkManager, Session};
use crate::config::Settings;
use crate::otp::CodeProvider;
use crate::types::LoginParameters;
use crate::{Error, Result};
use axum::http::header;
use chrono::Utc;
use std::sync::Arc;
use url::Url;

/// Something that can establish a fresh authenticated session
#[async_trait::async_trait]
pub trait Authenticate: Send + Sync {
    /// Perform one complete login attempt
    async fn authenticate(&self) -> Result<Session>;
}

/// Authenticator for the backend's form-based login
pub struct LoginAuthenticator {
    settings: Arc<Settings>,
    network: NetworkManager,
    codes: Arc<dyn CodeProvider>,
    base: Url,
}

impl std::fmt::Debug for LoginAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginAuthenticator")
            .field("base", &self.base.as_str())
            .field("username", &self.settings.target.username)
            .finish_non_exhaustive()
    }
}

impl LoginAuthenticator {
    /// Create an authenticator for the configured target
    pub fn new(settings: Arc<Settings>, codes: Arc<dyn CodeProvider>) -> Result<Self> {
        let base = Url::parse(settings.target_base())?;
        let network = NetworkManager::new(&settings);
        Ok(Self {
            settings,
            network,
            codes,
            base,
        })
    }

    /// Step 1: trigger the redirect that carries the login parameters
    async fn fetch_login_parameters(&self, session: &Session) -> Result<LoginParameters> {
        let url = format!("{}/", self.settings.target_base());
        tracing::debug!("Requesting login parameters from {}", url);

        let response = session.client().get(&url).send().await?;
        let status = response.status();

        if !status.is_redirection() {
            return Err(Error::protocol(
                "initial_redirect",
                &format!("expected a redirect from {}, got {}", url, status),
            ));
        }

        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                Error::protocol(
                    "initial_redirect",
                    "'Location' header not found in the response",
                )
            })?;

        LoginParameters::from_redirect(
            &self.base,
            location,
            &self.settings.login.correlation_params,
        )
    }

    /// Step 2: post the login form
    async fn submit_credentials(
        &self,
        session: &Session,
        params: &LoginParameters,
        code: &str,
    ) -> Result<()> {
        let login = &self.settings.login;
        let url = format!("{}{}", self.settings.target_base(), login.login_path);

        let mut form: Vec<(&str, &str)> = params
            .tokens
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        form.push(("username", self.settings.target.username.trim()));
        form.push(("password", code));

        let response = session
            .client()
            .post(&url)
            .header(header::REFERER, params.referer.as_str())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == login.success_status {
            return Ok(());
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!("Could not read login response body: {}", e);
                String::new()
            }
        };
        if body
            .to_lowercase()
            .contains(&login.login_page_marker.to_lowercase())
        {
            return Err(Error::auth_failed(format!(
                "backend answered with the login page again (status {}); \
                 check username and OTP secret",
                status
            )));
        }

        Err(Error::auth_failed(format!(
            "login endpoint returned {} instead of {}",
            status, login.success_status
        )))
    }
}

#[async_trait::async_trait]
impl Authenticate for LoginAuthenticator {
    async fn authenticate(&self) -> Result<Session> {
        let session = self.network.fresh_session()?;

        let params = self.fetch_login_parameters(&session).await?;
        tracing::debug!("Received {} correlation tokens", params.tokens.len());

        self.codes.wait_for_next_window().await;
        let code = self.codes.generate(Utc::now())?;

        self.submit_credentials(&session, &params, &code).await?;
        tracing::info!(
            "Logged in to {} as {}",
            self.base,
            self.settings.target.username.trim()
        );

        Ok(session.mark_established())
    }
}
