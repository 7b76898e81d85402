//! proxmox-guest-probe - version 0.1.0
//!
//! Monitoring probe for Proxmox VE guests with tracing logging.
//! This is the main entry point that schedules the checks, serves telemetry,
//! and handles subcommands.

mod cli;
mod commands;
mod config;
mod handlers;
mod metrics;
mod scheduler;
mod state;

use ahash::AHashMap as HashMap;
use axum::{routing::get, Router};
use clap::Parser;
use prometheus::Registry;
use proxmox_guest_probe::{HttpTransport, ProbeRuntime, TopologyCache};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::{net::TcpListener, signal, sync::RwLock};
use tracing::{debug, error, info, Level};

use cli::{Args, Commands, LogLevel};
use commands::{command_check, command_config};
use config::{
    resolve_config, show_config, validate_effective_config, Config, DEFAULT_BACKOFF_SECONDS,
    DEFAULT_BIND_ADDR, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT_SECONDS,
};
use handlers::{health_handler, metrics_handler, status_handler};
use metrics::ProbeMetrics;
use state::{AppState, SharedState};

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(level: &LogLevel) {
    let log_level = match level {
        LogLevel::Off => Level::ERROR,
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    info!("Logging initialized with level: {:?}", level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Builds the shared state: one transport, one topology cache, one registry.
fn build_state(config: Config) -> Result<SharedState, Box<dyn std::error::Error>> {
    let request_timeout = Duration::from_secs(
        config
            .request_timeout_seconds
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS),
    );
    let backoff = Duration::from_secs(config.backoff_seconds.unwrap_or(DEFAULT_BACKOFF_SECONDS));

    let transport = Arc::new(HttpTransport::new(request_timeout)?);
    let topology = Arc::new(TopologyCache::new());
    let runtime = Arc::new(ProbeRuntime::new(transport, topology, backoff));
    debug!(
        "Probe runtime initialized (request timeout {:?}, backoff {:?})",
        request_timeout, backoff
    );

    let registry = Registry::new();
    let metrics = ProbeMetrics::new(&registry)?;
    debug!("All metrics registered successfully");

    Ok(Arc::new(AppState {
        registry,
        metrics,
        runtime,
        config: Arc::new(config),
        statuses: RwLock::new(HashMap::new()),
        start_time: Instant::now(),
    }))
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        return match command {
            Commands::Config {
                output,
                format,
                commented,
            } => command_config(output.clone(), format.clone(), *commented),

            Commands::Check {
                asset,
                check,
                vmid,
                format,
            } => {
                let config = load_validated_config(&args)?;
                setup_logging(&config.effective_log_level()?);
                let state = build_state(config)?;
                command_check(&state, asset, *check, *vmid, format.clone()).await
            }
        };
    }

    // Load configuration for main probe mode
    let config = load_validated_config(&args)?;

    setup_logging(&config.effective_log_level()?);

    info!("Starting proxmox-guest-probe");

    let check_count: usize = config.assets.iter().map(|a| a.checks.len()).sum();
    if check_count == 0 {
        error!("No checks configured - the probe will only serve telemetry");
    }

    let bind_ip_str = config
        .bind
        .clone()
        .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
    let port = config.port.unwrap_or(DEFAULT_PORT);
    let enable_telemetry = config.enable_telemetry.unwrap_or(true);

    let state = build_state(config)?;

    let tasks = scheduler::spawn_checks(&state);
    info!(
        "Scheduled {} checks across {} assets",
        tasks.len(),
        state.config.assets.len()
    );

    // Setup graceful shutdown signal handlers
    let shutdown_signal = async {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
            }
            _ = terminate => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
        }
    };

    if enable_telemetry {
        let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;

        let app = Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .route("/status", get(status_handler))
            .with_state(state.clone());

        let listener = TcpListener::bind(addr).await?;
        info!(
            "proxmox-guest-probe telemetry listening on http://{}:{}",
            bind_ip_str, port
        );

        let server = axum::serve(listener, app);

        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!("Server error: {}", e);
                    return Err(e.into());
                }
            }
            _ = shutdown_signal => {
                info!("Shutdown signal received, exiting...");
            }
        }
    } else {
        info!("Telemetry listener disabled");
        shutdown_signal.await;
    }

    // Dropping the check futures cancels in-flight requests and backoff waits
    for task in &tasks {
        task.abort();
    }

    info!("proxmox-guest-probe stopped gracefully");
    Ok(())
}
