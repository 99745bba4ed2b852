//! Echo Reflector
//!
//! A small test-utility server that reflects request data back to callers.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ TCP listener ──▶ axum router ──┬─▶ GET /, /hello ─▶ headers + client IP
//!                                             ├─▶ POST /echo     ─▶ body copy
//!                                             └─▶ /ws            ─▶ upgrade ─▶ EchoSession
//!
//!   Cross-cutting: config (TOML + PORT + flags), tracing, metrics, CORS, shutdown
//! ```

use std::path::PathBuf;

use clap::Parser;

use echo_reflector::config::{loader, validate_config, ConfigError, EchoConfig};
use echo_reflector::http::{self, HttpServer};
use echo_reflector::lifecycle::Shutdown;
use echo_reflector::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "echo-reflector")]
#[command(about = "Echoes HTTP and WebSocket traffic and reports the caller's IP", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listening address, overrides the config file and PORT
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => loader::load_config(path)?,
        None => EchoConfig::default(),
    };
    loader::apply_env_overrides(&mut config);
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability.log_level.to_ascii_lowercase())?;

    tracing::info!("echo-reflector v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        cors_max_age_secs = config.cors.max_age_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = http::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(shutdown.trigger_on_signal());

    HttpServer::new(config).run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
