//! Background task that polls `/proc/net/dev` counters (via the daemon) and
//! unconditionally broadcasts `interface.stats_updated` for all three
//! physical interfaces every cycle (§4.10).

use std::sync::Arc;
use std::time::Duration;

use encryptor_core::entities::InterfaceName;
use encryptor_ipc::protocol::{Command, EmptyPayload, InterfaceStats, InterfaceStatsResult};
use tokio_util::sync::CancellationToken;

use crate::state::AppState;
use crate::telemetry::events;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

pub(crate) async fn fetch_stats(state: &AppState) -> InterfaceStatsResult {
    match state.daemon.call_typed::<_, InterfaceStatsResult>(Command::GetInterfaceStats, &EmptyPayload {}).await {
        Ok(stats) => stats,
        Err(e) => {
            tracing::warn!(error = %e, "daemon unreachable for interface stats, reporting zeros");
            InterfaceStatsResult::new()
        }
    }
}

async fn poll_once(state: &AppState) {
    let stats = fetch_stats(state).await;
    for name in InterfaceName::ALL {
        let s = stats.get(name.as_str()).copied().unwrap_or(InterfaceStats::default());
        state
            .connections
            .broadcast(events::interface_stats_updated(
                name.as_str(),
                s.bytes_rx,
                s.bytes_tx,
                s.packets_rx,
                s.packets_tx,
                s.errors_rx,
                s.errors_tx,
            ))
            .await;
    }
}

/// Run the interface poller loop until `shutdown` is cancelled.
pub async fn run(state: Arc<AppState>, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                tracing::info!("interface poller shutting down");
                return;
            }
            _ = ticker.tick() => {
                poll_once(&state).await;
            }
        }
    }
}

/// Build the initial WebSocket snapshot: one `interface.stats_updated` per
/// physical interface (§4.10 "WebSocket connect").
pub async fn snapshot_events(state: &AppState) -> Vec<crate::telemetry::events::EventEnvelope> {
    let stats = fetch_stats(state).await;
    InterfaceName::ALL
        .iter()
        .map(|name| {
            let s = stats.get(name.as_str()).copied().unwrap_or(InterfaceStats::default());
            events::interface_stats_updated(
                name.as_str(),
                s.bytes_rx,
                s.bytes_tx,
                s.packets_rx,
                s.packets_tx,
                s.errors_rx,
                s.errors_tx,
            )
        })
        .collect()
}
