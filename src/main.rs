//! Command line interface for the HKA two-factor proxy
//!
//! # Usage
//!
//! ## Run the proxy
//! ```bash
//! hka-2fa-proxy run --username abcd1234 --secret JBSWY3DPEHPK3PXP --port 8080
//! ```
//!
//! ## Help and Version
//! ```bash
//! hka-2fa-proxy --version
//! hka-2fa-proxy --help
//! hka-2fa-proxy run --help
//! ```

use clap::{Parser, Subcommand};

use hka_2fa_proxy::{
    VERSION,
    cli::run::{RunArgs, run_proxy_mode},
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "hka-2fa-proxy")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the authenticating reverse proxy
    Run {
        /// Account name for the backend login
        #[arg(short, long)]
        username: Option<String>,

        /// Base32 TOTP secret
        #[arg(short, long)]
        secret: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Backend base URL
        #[arg(long, value_name = "URL")]
        target: Option<String>,

        /// Configuration file path
        #[arg(long)]
        config: Option<String>,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run {
            username,
            secret,
            port,
            host,
            target,
            config,
            verbose,
        }) => {
            let args = RunArgs {
                username,
                secret,
                port,
                host,
                target,
                config,
                verbose,
            };
            run_proxy_mode(args).await
        }
        None => {
            println!("hka-2fa-proxy {}", VERSION);
            println!("Run `hka-2fa-proxy run --help` to start the proxy.");
            Ok(())
        }
    }
}
