//! Keywire server binary.
//!
//! # Usage
//!
//! ```bash
//! KEYWIRE_API_KEY=secret keywire-server
//!
//! # Custom tree bounds and port
//! KEYWIRE_API_KEY=secret KEYWIRE_A=3 KEYWIRE_B=6 KEYWIRE_PORT=4100 keywire-server
//! ```

use clap::Parser;
use keywire_server::{Server, ServerConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Keywire key-value store server
#[derive(Parser, Debug)]
#[command(name = "keywire-server")]
#[command(about = "Authenticated in-memory key-value store over TCP")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Keywire server starting");

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(%error, "invalid configuration");
            return Err(error.into());
        },
    };

    let server = Server::bind(config).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
