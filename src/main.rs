use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use jobgate::config::{JobgateConfig, LoggingConfig};
use jobgate::http::{router, ApiServer};
use jobgate::ratelimit::RateLimiters;

#[derive(Parser, Debug)]
#[command(name = "jobgate")]
#[command(about = "Job board API server with fixed-window rate limiting")]
#[command(version)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overriding the configuration
    #[arg(short, long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = JobgateConfig::load(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.server.listen_addr = listen;
    }

    init_tracing(&config.logging);

    info!("Starting jobgate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(listen_addr = %config.server.listen_addr, "Configuration loaded");

    let limiters = RateLimiters::from_config(&config.rate_limiting)?;
    for limiter in [&limiters.general, &limiters.strict, &limiters.auth, &limiters.ai] {
        let policy = limiter.policy();
        info!(
            policy = %policy.name(),
            window_ms = policy.window_ms(),
            max_requests = policy.max_requests(),
            "Rate limit policy loaded"
        );
    }

    let reaper = limiters.spawn_reaper(config.rate_limiting.sweep_interval());

    let app = router(&limiters, config.rate_limiting.trust_proxy);
    let server = ApiServer::new(config.server.listen_addr, app);

    // Run the server with graceful shutdown on Ctrl+C
    let result = server.serve_with_shutdown(shutdown_signal()).await;

    info!(windows = limiters.store().len(), "HTTP server stopped, stopping window reaper");
    reaper.shutdown().await;
    result?;

    info!("jobgate stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .init();
    }
}

/// Wait for Ctrl+C or SIGTERM.
///
/// Resolving stops the HTTP listener; `main` then stops the window reaper.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, draining requests before stopping the window reaper");
        }
        _ = terminate => {
            info!("Received SIGTERM, draining requests before stopping the window reaper");
        }
    }
}
