//! bearer-relay CLI binary entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use bearer_relay::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.relay_config() {
        Ok(config) => match &cli.command {
            Commands::Login(args) => bearer_relay::cli::auth::handle_login(config, args).await,
            Commands::Logout => bearer_relay::cli::auth::handle_logout(config).await,
            Commands::Status => bearer_relay::cli::auth::handle_status(config).await,
            Commands::Request(args) => {
                bearer_relay::cli::request::handle_request(config, args).await
            }
        },
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
