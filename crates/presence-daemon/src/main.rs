//! Presence daemon
//!
//! Tracks the configured directory users and keeps one presence record per
//! existing user in the registry until shutdown.

use clap::Parser;
use presence_daemon::{Daemon, DaemonConfig, DaemonResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Presence daemon CLI
#[derive(Parser)]
#[command(name = "presenced")]
#[command(about = "Presence daemon - publishes directory user presence", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "PRESENCE_CONFIG")]
    config: Option<String>,

    /// Log level
    #[arg(long, env = "PRESENCE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "PRESENCE_LOG_JSON")]
    json: bool,

    /// User to track (repeatable)
    #[arg(short, long = "user")]
    users: Vec<String>,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    let mut config = DaemonConfig::load(cli.config.as_deref())?;

    // Override with CLI args
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;
    config.track_users(cli.users);

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        trackers = config.trackers.len(),
        root_path = %config.subscription.root_path,
        "Starting presence daemon"
    );

    Daemon::new(config).run().await
}
