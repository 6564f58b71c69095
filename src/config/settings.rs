//! Configuration settings
//!
//! Settings are loaded from a TOML file, overridden by environment variables
//! and finally by command-line flags.

use serde::{Deserialize, Serialize};
use std::time::Duration;

// Helper functions for serde defaults
fn default_request_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_max_body_size() -> usize {
    10 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_backend_timeout() -> u64 {
    60
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/140.0.0.0 Safari/537.36".to_string()
}

fn default_target_host() -> String {
    "https://owa.h-ka.de".to_string()
}

fn default_otp_step() -> u64 {
    30
}

fn default_otp_digits() -> usize {
    6
}

fn default_login_path() -> String {
    "/lm_auth_proxy?LMLogon".to_string()
}

fn default_correlation_params() -> Vec<String> {
    vec![
        "curl".to_string(),
        "curlid".to_string(),
        "curlmode".to_string(),
    ]
}

fn default_success_status() -> u16 {
    302
}

fn default_login_page_marker() -> String {
    "anmeldung".to_string()
}

fn default_login_redirect_markers() -> Vec<String> {
    vec!["lm_auth_proxy".to_string(), "GetLogon".to_string()]
}

// Duration serialization module
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Main configuration settings for the proxy
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Inbound server configuration
    #[serde(default)]
    pub server: ServerSettings,
    /// Backend being proxied
    #[serde(default)]
    pub target: TargetSettings,
    /// One-time code configuration
    #[serde(default)]
    pub otp: OtpSettings,
    /// Backend-specific login handshake details
    #[serde(default)]
    pub login: LoginSettings,
    /// Outbound network configuration
    #[serde(default)]
    pub network: NetworkSettings,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingSettings,
}

fn default_host() -> String {
    "::".to_string()
}

fn default_port() -> u16 {
    8080
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Deadline for one proxied request, including waiting for the session
    /// and any re-authentication
    #[serde(with = "duration_secs", default = "default_request_timeout")]
    pub request_timeout: Duration,
    /// Maximum inbound request body size
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

/// The proxied backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSettings {
    /// Base URL requests are forwarded to
    #[serde(default = "default_target_host")]
    pub host: String,
    /// Account used for the login handshake
    #[serde(default)]
    pub username: String,
}

/// TOTP configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct OtpSettings {
    /// Base32 shared secret
    #[serde(default)]
    pub secret: String,
    /// Code validity window in seconds
    #[serde(default = "default_otp_step")]
    pub step: u64,
    /// Number of digits per code
    #[serde(default = "default_otp_digits")]
    pub digits: usize,
}

impl std::fmt::Debug for OtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let secret = if self.secret.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };
        f.debug_struct("OtpSettings")
            .field("secret", &secret)
            .field("step", &self.step)
            .field("digits", &self.digits)
            .finish()
    }
}

/// Login handshake details that depend on the backend version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginSettings {
    /// Path (with query) of the login form endpoint
    #[serde(default = "default_login_path")]
    pub login_path: String,
    /// Query parameters of the initial redirect echoed back in the login form
    #[serde(default = "default_correlation_params")]
    pub correlation_params: Vec<String>,
    /// Status code the login POST answers with on success
    #[serde(default = "default_success_status")]
    pub success_status: u16,
    /// Text that identifies the login page (case-insensitive)
    #[serde(default = "default_login_page_marker")]
    pub login_page_marker: String,
    /// Texts in a `Location` header that identify a redirect to the login
    /// (case-insensitive, any one matches)
    #[serde(default = "default_login_redirect_markers")]
    pub login_redirect_markers: Vec<String>,
    /// Log in before accepting the first request
    #[serde(default)]
    pub login_on_startup: bool,
}

/// Network and proxy configuration for backend traffic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// HTTPS proxy URL
    #[serde(default)]
    pub https_proxy: Option<String>,
    /// HTTP proxy URL
    #[serde(default)]
    pub http_proxy: Option<String>,
    /// All protocols proxy URL
    #[serde(default)]
    pub all_proxy: Option<String>,
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    /// Timeout for a single backend request in seconds
    #[serde(default = "default_backend_timeout")]
    pub request_timeout: u64,
    /// User agent presented to the backend
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable verbose logging
    #[serde(default)]
    pub verbose: bool,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
            max_body_size: default_max_body_size(),
        }
    }
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self {
            host: default_target_host(),
            username: String::new(),
        }
    }
}

impl Default for OtpSettings {
    fn default() -> Self {
        Self {
            secret: String::new(),
            step: default_otp_step(),
            digits: default_otp_digits(),
        }
    }
}

impl Default for LoginSettings {
    fn default() -> Self {
        Self {
            login_path: default_login_path(),
            correlation_params: default_correlation_params(),
            success_status: default_success_status(),
            login_page_marker: default_login_page_marker(),
            login_redirect_markers: default_login_redirect_markers(),
            login_on_startup: false,
        }
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            https_proxy: None,
            http_proxy: None,
            all_proxy: None,
            connect_timeout: default_connect_timeout(),
            request_timeout: default_backend_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            verbose: false,
            format: default_log_format(),
        }
    }
}

impl Settings {
    /// Create new settings with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut settings = Self::default();

        if let Ok(host) = std::env::var("PROXY_HOST") {
            settings.server.host = host;
        }

        if let Ok(port) = std::env::var("PROXY_PORT") {
            settings.server.port = port
                .parse()
                .map_err(|e| crate::Error::config("port", &format!("Invalid port: {}", e)))?;
        }

        if let Ok(timeout) = std::env::var("PROXY_REQUEST_TIMEOUT") {
            let timeout_secs: u64 = timeout.parse().map_err(|e| {
                crate::Error::config("request_timeout", &format!("Invalid timeout: {}", e))
            })?;
            settings.server.request_timeout = Duration::from_secs(timeout_secs);
        }

        if let Ok(target) = std::env::var("PROXY_TARGET_HOST") {
            settings.target.host = target;
        }

        if let Ok(username) = std::env::var("PROXY_USERNAME") {
            settings.target.username = username;
        }

        if let Ok(secret) = std::env::var("PROXY_OTP_SECRET") {
            settings.otp.secret = secret;
        }

        settings.network.https_proxy = std::env::var("HTTPS_PROXY").ok();
        settings.network.http_proxy = std::env::var("HTTP_PROXY").ok();
        settings.network.all_proxy = std::env::var("ALL_PROXY").ok();

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            settings.logging.level = level;
        }

        Ok(settings)
    }

    /// Load settings from configuration file
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::config("file", &format!("Failed to read config file: {}", e))
        })?;

        let settings: Settings = toml::from_str(&content).map_err(|e| {
            crate::Error::config("file", &format!("Failed to parse config file: {}", e))
        })?;

        Ok(settings)
    }

    /// Merge settings with environment variable overrides
    pub fn merge_with_env(mut self) -> crate::Result<Self> {
        let env_settings = Self::from_env()?;
        let defaults = Self::default();

        // Merge only non-default values from environment
        if env_settings.server.host != defaults.server.host {
            self.server.host = env_settings.server.host;
        }

        if env_settings.server.port != defaults.server.port {
            self.server.port = env_settings.server.port;
        }

        if env_settings.server.request_timeout != defaults.server.request_timeout {
            self.server.request_timeout = env_settings.server.request_timeout;
        }

        if env_settings.target.host != defaults.target.host {
            self.target.host = env_settings.target.host;
        }

        if !env_settings.target.username.is_empty() {
            self.target.username = env_settings.target.username;
        }

        if !env_settings.otp.secret.is_empty() {
            self.otp.secret = env_settings.otp.secret;
        }

        if env_settings.logging.level != defaults.logging.level {
            self.logging.level = env_settings.logging.level;
        }

        // Proxy settings always override if present
        if env_settings.network.https_proxy.is_some() {
            self.network.https_proxy = env_settings.network.https_proxy;
        }
        if env_settings.network.http_proxy.is_some() {
            self.network.http_proxy = env_settings.network.http_proxy;
        }
        if env_settings.network.all_proxy.is_some() {
            self.network.all_proxy = env_settings.network.all_proxy;
        }

        Ok(self)
    }

    /// Get effective outbound proxy URL based on priority
    pub fn get_proxy_url(&self) -> Option<String> {
        self.network
            .https_proxy
            .as_ref()
            .or(self.network.http_proxy.as_ref())
            .or(self.network.all_proxy.as_ref())
            .cloned()
    }

    /// Target base URL without a trailing slash
    pub fn target_base(&self) -> &str {
        self.target.host.trim_end_matches('/')
    }

    /// Validate configuration settings
    pub fn validate(&self) -> crate::Result<()> {
        if self.server.port == 0 {
            return Err(crate::Error::config(
                "port",
                "Invalid server port: cannot be 0",
            ));
        }

        if self.server.request_timeout.is_zero() {
            return Err(crate::Error::config(
                "request_timeout",
                "Invalid request timeout: cannot be 0",
            ));
        }

        match url::Url::parse(&self.target.host) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(crate::Error::config(
                    "target.host",
                    &format!("Unsupported scheme '{}'", url.scheme()),
                ));
            }
            Err(e) => {
                return Err(crate::Error::config(
                    "target.host",
                    &format!("Invalid target URL '{}': {}", self.target.host, e),
                ));
            }
        }

        if self.otp.step == 0 {
            return Err(crate::Error::config(
                "otp.step",
                "Invalid OTP step: cannot be 0",
            ));
        }

        if !(300..400).contains(&self.login.success_status) {
            return Err(crate::Error::config(
                "login.success_status",
                &format!(
                    "Login success status must be a redirect, got {}",
                    self.login.success_status
                ),
            ));
        }

        if self.login.correlation_params.is_empty() {
            return Err(crate::Error::config(
                "login.correlation_params",
                "At least one correlation parameter is required",
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(crate::Error::config(
                    "log_level",
                    &format!("Invalid log level: {}", self.logging.level),
                ));
            }
        }

        for (name, proxy_url) in [
            ("https_proxy", &self.network.https_proxy),
            ("http_proxy", &self.network.http_proxy),
            ("all_proxy", &self.network.all_proxy),
        ]
        .iter()
        {
            if let Some(url_str) = proxy_url
                && let Err(e) = url::Url::parse(url_str)
            {
                return Err(crate::Error::config(
                    *name,
                    &format!("Invalid proxy URL '{}': {}", url_str, e),
                ));
            }
        }

        Ok(())
    }

    /// Check that the login credentials are present
    pub fn validate_credentials(&self) -> crate::Result<()> {
        if self.target.username.trim().is_empty() {
            return Err(crate::Error::config(
                "target.username",
                "username is required",
            ));
        }

        if self.otp.secret.trim().is_empty() {
            return Err(crate::Error::config("otp.secret", "otp secret is required"));
        }

        Ok(())
    }
}
