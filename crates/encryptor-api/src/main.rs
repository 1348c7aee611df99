//! `encryptor-api` — unprivileged REST/WebSocket API process for the
//! encryptor-sim control plane.
//!
//! TLS termination and HTTP/1.1-vs-2 framing are left to the external
//! reverse-proxy collaborator (§1); this process listens in plaintext on a
//! loopback/MGMT-bound address behind it.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

use std::sync::Arc;

use clap::Parser;
use encryptor_crypto::psk::PskVault;
use encryptor_crypto::token::TokenService;
use encryptor_ipc::client::UnixSocketDaemonClient;
use encryptor_storage::ConfigStore;

use encryptor_api::telemetry::connection_manager::ConnectionManager;
use encryptor_api::{AppState, router, spawn_pollers};

/// `encryptor-api` — the unprivileged API half of the control plane.
#[derive(Parser)]
#[command(name = "encryptor-api")]
#[command(author, version, about = "encryptor-sim REST/WebSocket API")]
struct Args {
    /// Address to bind the HTTP listener to.
    #[arg(long, default_value = "127.0.0.1:8443")]
    bind: std::net::SocketAddr,
    /// Enable verbose (debug) logging regardless of `APP_LOG`.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = encryptor_config::Settings::from_env()?;

    let log_directive = if args.verbose { "debug".to_string() } else { settings.log_directive.clone() };
    let log_config = encryptor_telemetry::LogConfig::new(log_directive);
    if let Err(e) = encryptor_telemetry::setup_logging(&log_config) {
        eprintln!("failed to initialize logging: {e}");
    }

    tracing::info!("encryptor-api starting up");

    let psk_vault = Arc::new(PskVault::parse_key(&settings.psk_encryption_key)?);
    let tokens = Arc::new(TokenService::new(
        settings.token_signing_key.clone().into_bytes(),
        settings.access_token_ttl_secs,
        settings.refresh_token_ttl_secs,
    ));
    let store = ConfigStore::connect_url(&settings.database_url).await?;
    let daemon: Arc<dyn encryptor_ipc::client::DaemonClient> =
        Arc::new(UnixSocketDaemonClient::new(settings.daemon_socket_path.clone()));

    let state = Arc::new(AppState {
        store,
        daemon,
        psk_vault,
        tokens,
        connections: Arc::new(ConnectionManager::new()),
        settings: Arc::new(settings),
    });

    sync_isolation_result_from_daemon(&state).await;

    let (poller_shutdown, tunnel_handle, interface_handle) = spawn_pollers(state.clone());

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    tracing::info!(addr = %args.bind, "listening");

    axum::serve(listener, app).with_graceful_shutdown(wait_for_shutdown_signal()).await?;

    tracing::info!("shutdown signal received, stopping pollers");
    poller_shutdown.cancel();
    let _ = tokio::join!(tunnel_handle, interface_handle);

    tracing::info!("encryptor-api stopped");
    Ok(())
}

/// Pull the daemon's in-memory "latest isolation result" into the store on
/// startup, so a freshly started API process does not 404 on
/// `/system/isolation-status` just because it was restarted after the
/// daemon already ran its self-test (§3 "IsolationValidationResult").
async fn sync_isolation_result_from_daemon(state: &AppState) {
    use encryptor_core::entities::IsolationValidationResult;
    use encryptor_ipc::protocol::{Command, EmptyPayload};

    match state.daemon.call_typed::<_, IsolationValidationResult>(Command::GetValidationResult, &EmptyPayload {}).await
    {
        Ok(result) => {
            if let Err(e) = state.store.record_isolation_result(result).await {
                tracing::warn!(error = %e, "failed to persist isolation result synced from daemon");
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "daemon unreachable at startup, isolation status will be stale until next sync");
        }
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = sigterm.recv() => {},
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
