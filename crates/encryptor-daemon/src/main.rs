//! `encryptor-simd` — privileged daemon process for the encryptor-sim
//! control plane: namespace isolation, interface/XFRM programming, and
//! strongSwan orchestration, driven entirely by IPC requests from the API.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod commands;
mod error;
mod ipsec;
mod netprog;
mod nspolicy;
mod shell;
mod state;

use std::sync::Arc;

use clap::Parser;
use encryptor_ipc::server::{CommandHandler, ShutdownFlag};

use commands::DaemonHandler;
use state::IsolationState;

/// `encryptor-simd` — the privileged daemon half of the control plane.
#[derive(Parser)]
#[command(name = "encryptor-simd")]
#[command(author, version, about = "encryptor-sim privileged daemon")]
struct Args {
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

    tracing::info!("encryptor-simd starting up");

    netprog::replay_persisted_interfaces(&settings.boot_timing_dir.join("netns")).await;

    let isolation_state = IsolationState::default();
    let handler = Arc::new(DaemonHandler::new(
        settings.swanctl_conf_dir.clone(),
        settings.boot_timing_dir.join("netns"),
        isolation_state.clone(),
    ));
    handler.run_and_record_self_test().await;

    let shutdown = ShutdownFlag::new();
    let shutdown_for_signals = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::info!("shutdown signal received");
        shutdown_for_signals.trigger();
    });

    let handler: Arc<dyn CommandHandler> = handler;
    encryptor_ipc::server::serve(&settings.daemon_socket_path, handler, shutdown).await?;

    tracing::info!("encryptor-simd stopped");
    Ok(())
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
