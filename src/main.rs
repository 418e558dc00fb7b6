use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vadret::cache::weather::start_cleanup_task;
use vadret::config::AppConfig;
use vadret::server::Server;
use vadret::AppState;

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for ctrl+c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

/// Apply the positional CLI arguments: `vadret [port] [bind-address]`.
fn apply_cli_args(config: &mut AppConfig) {
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 3 {
        eprintln!("usage: {} [port] [bind-address]", args[0]);
        std::process::exit(1);
    }
    if let Some(port) = args.get(1) {
        match port.parse() {
            Ok(port) => config.port = port,
            Err(_) => {
                eprintln!("invalid port: {port}");
                eprintln!("usage: {} [port] [bind-address]", args[0]);
                std::process::exit(1);
            }
        }
    }
    if let Some(host) = args.get(2) {
        config.host = host.clone();
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vadret=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration, then let CLI positionals take precedence
    let mut config = AppConfig::load()?;
    apply_cli_args(&mut config);
    tracing::info!("Configuration loaded successfully");

    // One cooperative scheduler thread drives everything
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(config))
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    let state = Arc::new(AppState::init(config).await?);
    let geocode_entries = state.geo_cache.len().await;
    tracing::info!(geocode_entries, "Caches initialized");

    start_cleanup_task(
        state.weather_cache.clone(),
        Duration::from_secs(state.config.cache_cleanup_interval_secs),
        Duration::from_secs(state.config.cache_max_age_secs),
    );

    let server = Server::bind(state.clone()).await?;
    server.run(shutdown_signal()).await;

    // Flush anything the geocode cache could not persist earlier
    if state.geo_cache.is_dirty() {
        state.geo_cache.save().await?;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}
