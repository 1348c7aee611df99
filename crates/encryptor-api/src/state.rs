//! Shared, cloneable application state threaded into every handler and
//! background poller (§5, §9 "Global configuration").

use std::sync::Arc;

use encryptor_config::Settings;
use encryptor_crypto::psk::PskVault;
use encryptor_crypto::token::TokenService;
use encryptor_ipc::client::DaemonClient;
use encryptor_storage::ConfigStore;

use crate::telemetry::connection_manager::ConnectionManager;

/// Everything a handler or poller needs, cloned cheaply (every field is
/// either already `Clone` or behind an `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub store: ConfigStore,
    pub daemon: Arc<dyn DaemonClient>,
    pub psk_vault: Arc<PskVault>,
    pub tokens: Arc<TokenService>,
    pub connections: Arc<ConnectionManager>,
    pub settings: Arc<Settings>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
