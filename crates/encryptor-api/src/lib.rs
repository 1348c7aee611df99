//! Unprivileged REST/WebSocket API process for the encryptor-sim control
//! plane: HTTPS-framed-by-a-collaborator REST endpoints and a WebSocket
//! telemetry fan-out, backed by the config store and the daemon IPC client
//! (§2, §6).

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod auth;
pub mod envelope;
pub mod error;
pub mod health;
pub mod resources;
pub mod state;
pub mod telemetry;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the full `/api/v1` router over `state`.
///
/// Mounted as-is by the external HTTP/TLS collaborator (§1 "out of scope");
/// this crate only defines routing and handlers, never binds a socket
/// itself except through [`serve`].
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/change-password", post(auth::change_password))
        .route("/auth/me", get(auth::me))
        .route("/system/health", get(resources::system::health))
        .route("/system/isolation-status", get(resources::system::isolation_status))
        .route("/interfaces", get(resources::interfaces::list))
        .route("/interfaces/{name}", get(resources::interfaces::get))
        .route("/interfaces/{name}/configure", post(resources::interfaces::configure))
        .route("/peers", get(resources::peers::list).post(resources::peers::create))
        .route(
            "/peers/{id}",
            get(resources::peers::get).put(resources::peers::update).delete(resources::peers::delete),
        )
        .route("/peers/{id}/initiate", post(resources::peers::initiate))
        .route("/routes", get(resources::routes::list).post(resources::routes::create))
        .route(
            "/routes/{id}",
            get(resources::routes::get).put(resources::routes::update).delete(resources::routes::delete),
        )
        .route("/monitoring/tunnels", get(resources::monitoring::tunnels))
        .route("/monitoring/interfaces", get(resources::monitoring::interfaces))
        .route("/ws", get(telemetry::websocket::upgrade))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Spawn the tunnel and interface telemetry pollers, returning the
/// [`CancellationToken`] that stops both on shutdown (§5 "Cancellation").
///
/// The supervisor (normally `main`) holds the returned token and the join
/// handles; on shutdown it cancels the token and awaits both tasks so
/// neither is left mid-broadcast.
pub fn spawn_pollers(state: Arc<AppState>) -> (CancellationToken, tokio::task::JoinHandle<()>, tokio::task::JoinHandle<()>) {
    let shutdown = CancellationToken::new();

    let tunnel_state = state.clone();
    let tunnel_shutdown = shutdown.clone();
    let tunnel_handle =
        tokio::spawn(async move { telemetry::tunnel_poller::run(tunnel_state, tunnel_shutdown).await });

    let interface_state = state;
    let interface_shutdown = shutdown.clone();
    let interface_handle =
        tokio::spawn(async move { telemetry::interface_poller::run(interface_state, interface_shutdown).await });

    (shutdown, tunnel_handle, interface_handle)
}
