// # routednsd - Route DNS Daemon
//
// The routednsd daemon is a thin integration layer. It is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Building the Traefik source, the RFC 2136 updater and the state store
// 4. Running the reconciliation engine until SIGTERM/SIGINT
//
// All reconciliation logic lives in routedns-core.
//
// ## Configuration
//
// - `DB_PATH`: State file path (default `dns.json`)
// - `TRAEFIK_HOST` / `TRAEFIK_PORT`: Traefik API address (default `localhost:8080`)
// - `TRAEFIK_ENTRYPOINTS`: Comma-separated entry points (default `web,websecure`)
// - `DNS_SERVER`: Server accepting dynamic updates, `ip` or `ip:port`
// - `DNS_DOMAIN`: Zone to manage (default `fritz.box`)
// - `TARGET_IP`: Address all records point to
// - `DNS_TTL`: TTL of created records (default 3600)
// - `UPDATE_INTERVAL`: Seconds between pass starts (default 60)
// - `REQUEST_TIMEOUT`: Per-request timeout in seconds (default 10)
// - `LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export TRAEFIK_HOST=traefik
// export DNS_SERVER=192.168.178.1
// export DNS_DOMAIN=home.example.com
// export TARGET_IP=192.168.178.2
// export DB_PATH=/var/lib/routedns/dns.json
//
// routednsd
// ```

use anyhow::Result;
use routedns_core::{EngineEvent, ReconcileEngine, RouteDnsConfig};
use routedns_source_traefik::TraefikSource;
use routedns_update_rfc2136::Rfc2136Updater;
use std::process::ExitCode;
use tokio::sync::oneshot;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (state store corruption, unexpected failure)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouteDnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unrecoverable failure)
    RuntimeError = 2,
}

impl From<RouteDnsExitCode> for ExitCode {
    fn from(code: RouteDnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl RouteDnsExitCode {
    /// Exit code for an error that ended the daemon
    fn for_error(error: &anyhow::Error) -> Self {
        match error.downcast_ref::<routedns_core::Error>() {
            Some(routedns_core::Error::Config(_)) => RouteDnsExitCode::ConfigError,
            _ => RouteDnsExitCode::RuntimeError,
        }
    }
}

fn main() -> ExitCode {
    // Load and validate configuration from environment
    let config = match RouteDnsConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return RouteDnsExitCode::ConfigError.into();
        }
    };

    // Initialize tracing
    let log_level = match config.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return RouteDnsExitCode::ConfigError.into();
    }

    info!("Starting routednsd daemon");
    info!(
        traefik = %config.proxy.routers_url(),
        entry_points = ?config.proxy.entry_points,
        dns_server = %config.dns.server,
        domain = %config.dns.domain,
        target = %config.dns.target_ip,
        interval_secs = config.engine.interval_secs,
        "Configuration loaded"
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return RouteDnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => RouteDnsExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                RouteDnsExitCode::for_error(&e)
            }
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: RouteDnsConfig) -> Result<()> {
    // Only a corrupt state file stops us here, before any DNS traffic.
    // An unreadable one is retried by the first pass.
    let state_store = routedns_core::state::open(&config.state_store).await?;
    let source = TraefikSource::new(&config.proxy)?;
    let updater = Rfc2136Updater::new(&config.dns)?;

    let (engine, mut events) = ReconcileEngine::new(
        Box::new(source),
        Box::new(updater),
        state_store,
        &config,
    )?;

    // Ends when the engine (and its sender) is dropped
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
    });

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Shutdown signal handling failed, stopping: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    engine.run_with_shutdown(Some(shutdown_rx)).await?;

    info!("Shutting down daemon");
    Ok(())
}

/// Mirror engine events into the log at debug level
fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::Started { interval } => debug!(?interval, "Engine event: started"),
        EngineEvent::Stopped { reason } => debug!(%reason, "Engine event: stopped"),
        other => debug!(event = ?other, "Engine event"),
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received, or an error if the handlers
/// cannot be installed.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let received = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(received)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
