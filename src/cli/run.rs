//! Proxy mode CLI logic
//!
//! Contains the core logic for running the authenticating proxy.

use crate::{
    Settings, VERSION,
    config::ConfigLoader,
    otp::{CodeProvider, TotpGenerator},
    server::app,
    session::SessionGuard,
};
use anyhow::{Context, Result};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Arguments for proxy mode
#[derive(Debug, Default)]
pub struct RunArgs {
    pub username: Option<String>,
    pub secret: Option<String>,
    pub port: Option<u16>,
    pub host: Option<String>,
    pub target: Option<String>,
    pub config: Option<String>,
    pub verbose: bool,
}

/// Run the proxy with the given arguments
pub async fn run_proxy_mode(args: RunArgs) -> Result<()> {
    // Configuration is loaded before logging so that logging.level applies.
    //
    // Precedence:
    // 1. Command line arguments
    // 2. Environment variables
    // 3. Configuration file (from --config, HKA_PROXY_CONFIG or default location)
    // 4. Default values
    let config_path = if let Some(config) = &args.config {
        Some(std::path::PathBuf::from(config))
    } else {
        ConfigLoader::get_config_path()
    };

    let mut settings = ConfigLoader::new()
        .load(config_path.as_deref())
        .context("Failed to load configuration")?;

    apply_cli_overrides(&mut settings, &args);
    settings.validate().context("Invalid configuration")?;

    init_logging(&settings, args.verbose);

    tracing::info!("Starting hka-2fa-proxy v{}", VERSION);

    settings.validate_credentials()?;

    let codes: Arc<dyn CodeProvider> = Arc::new(
        TotpGenerator::new(&settings.otp.secret, settings.otp.step, settings.otp.digits)
            .context("Invalid OTP secret")?,
    );

    let settings = Arc::new(settings);
    let guard = Arc::new(SessionGuard::from_settings(settings.clone(), codes)?);

    if settings.login.login_on_startup {
        tracing::info!("Logging in to {} before accepting requests", settings.target_base());
        guard
            .ensure_session()
            .await
            .context("Initial login failed")?;
    }

    let app = app::create_app_with_guard(settings.clone(), guard);

    let listener = bind_listener(&settings.server.host, settings.server.port).await?;
    let addr = listener.local_addr()?;

    tracing::info!(
        "Proxying {} on {} as {}",
        settings.target_base(),
        addr,
        settings.target.username.trim()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Proxy stopped");
    Ok(())
}

/// Apply command line flags on top of the loaded settings
pub fn apply_cli_overrides(settings: &mut Settings, args: &RunArgs) {
    if let Some(username) = &args.username {
        settings.target.username = username.clone();
    }
    if let Some(secret) = &args.secret {
        settings.otp.secret = secret.clone();
    }
    if let Some(host) = &args.host {
        settings.server.host = host.clone();
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    if let Some(target) = &args.target {
        settings.target.host = target.clone();
    }
    settings.logging.verbose = args.verbose;
}

/// Build the log filter.
///
/// Precedence: `--verbose` > `RUST_LOG` > `logging.level`.
pub fn build_env_filter(level: &str, verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("debug")
    } else if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(level)
    }
}

fn init_logging(settings: &Settings, verbose: bool) {
    let env_filter = build_env_filter(&settings.logging.level, verbose);
    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if settings.logging.format.eq_ignore_ascii_case("json") {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    if let Err(e) = result {
        eprintln!("Warning: logging already initialized: {}", e);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Bind the listening socket for `host`.
///
/// `::` tries IPv6 first and falls back to `0.0.0.0` on hosts without IPv6;
/// any other value must be a literal IP address.
pub async fn bind_listener(host: &str, port: u16) -> Result<TcpListener> {
    let candidates = if host == "::" {
        vec![
            SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
        ]
    } else {
        let ip = host.parse::<IpAddr>().map_err(|_| {
            anyhow::anyhow!(
                "Invalid host address: {}. Use '::' for IPv6 or '0.0.0.0' for IPv4",
                host
            )
        })?;
        vec![SocketAddr::new(ip, port)]
    };

    bind_first(&candidates).await
}

/// Bind the first address in `candidates` that accepts a listener
async fn bind_first(candidates: &[SocketAddr]) -> Result<TcpListener> {
    let mut last_error = None;
    for addr in candidates {
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                tracing::debug!("Bound to {}", addr);
                return Ok(listener);
            }
            Err(e) => {
                tracing::warn!("Could not listen on {} (Caused by {})", addr, e);
                last_error =
                    Some(anyhow::Error::new(e).context(format!("Failed to bind {}", addr)));
            }
        }
    }
    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("No address to bind")))
}
