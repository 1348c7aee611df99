//! The `ConfigStore`: a single shared, internally-synchronised handle onto
//! the embedded database, safely reachable from both poller tasks and
//! request handlers without external locking (§4.4).

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use encryptor_core::entities::{Interface, InterfaceName, User};
use surrealdb::Surreal;
use surrealdb::engine::any::Any;

use crate::error::{StorageError, StorageResult};

const SEEDED_ADMIN_USERNAME: &str = "admin";

/// Transactional persistence for interfaces, peers, routes, users, and
/// isolation results.
///
/// Cloning a `ConfigStore` is cheap: the underlying `Surreal` client and id
/// counters are reference-counted, so every clone observes the same
/// database and the same id sequence. This is what lets the tunnel/interface
/// pollers and the HTTP request handlers share one store without any
/// additional locking on the caller's side (the `Surreal` client
/// internally synchronises concurrent access).
#[derive(Clone)]
pub struct ConfigStore {
    pub(crate) db: Surreal<Any>,
    pub(crate) next_user_id: Arc<AtomicI64>,
    pub(crate) next_peer_id: Arc<AtomicI64>,
    pub(crate) next_route_id: Arc<AtomicI64>,
    pub(crate) next_result_id: Arc<AtomicI64>,
}

impl ConfigStore {
    /// Connect to an embedded, disk-persisted store at `path` (SurrealKV),
    /// seeding the three `Interface` rows and the `admin` `User` row on an
    /// empty database, then open.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the engine cannot be opened,
    /// or any [`StorageError`] the seeding transaction can produce.
    pub async fn connect(path: &str) -> StorageResult<Self> {
        let endpoint = format!("surrealkv://{path}");
        Self::open(&endpoint, "config").await
    }

    /// Connect using a fully-qualified engine URL (e.g. the
    /// `APP_DATABASE_URL` setting, which already carries its own scheme).
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::connect`].
    pub async fn connect_url(url: &str) -> StorageResult<Self> {
        Self::open(url, "config").await
    }

    /// Connect to an in-memory store. Used by tests and by any daemon-less
    /// exercising of the API surface.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::connect`].
    pub async fn connect_memory() -> StorageResult<Self> {
        Self::open("mem://", "test").await
    }

    async fn open(endpoint: &str, database: &str) -> StorageResult<Self> {
        let db: Surreal<Any> = Surreal::init();
        db.connect(endpoint)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        db.use_ns("encryptor_sim")
            .use_db(database)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self {
            db,
            next_user_id: Arc::new(AtomicI64::new(1)),
            next_peer_id: Arc::new(AtomicI64::new(1)),
            next_route_id: Arc::new(AtomicI64::new(1)),
            next_result_id: Arc::new(AtomicI64::new(1)),
        };
        store.seed_if_empty().await?;
        store.resync_id_counters().await?;
        Ok(store)
    }

    /// Direct access to the underlying `SurrealDB` client, for callers that
    /// need a raw `SurrealQL` query the typed API above does not expose.
    #[must_use]
    pub fn client(&self) -> &Surreal<Any> {
        &self.db
    }

    async fn seed_if_empty(&self) -> StorageResult<()> {
        let existing: Vec<Interface> = self
            .db
            .query("SELECT * FROM interface LIMIT 1")
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?
            .take(0)
            .map_err(|e| StorageError::Decode(e.to_string()))?;
        if !existing.is_empty() {
            return Ok(());
        }

        tracing::info!("config store is empty; seeding interfaces and admin user");

        let now = chrono::Utc::now();
        let password_hash = encryptor_crypto::password::hash_password("changeme")
            .map_err(|e| StorageError::Query(format!("failed to hash seed admin password: {e}")))?;

        let admin = User {
            user_id: 1,
            username: SEEDED_ADMIN_USERNAME.to_string(),
            password_hash,
            require_password_change: true,
            created_at: now,
            last_login: None,
        };

        let interfaces: Vec<Interface> = InterfaceName::ALL
            .iter()
            .enumerate()
            .map(|(i, name)| Interface {
                interface_id: i as i64 + 1,
                name: *name,
                ip_address: None,
                netmask: None,
                gateway: None,
            })
            .collect();

        self.db
            .query("BEGIN TRANSACTION;")
            .query("CREATE user CONTENT $user;")
            .bind(("user", admin))
            .query("FOR $iface IN $ifaces { CREATE interface CONTENT $iface };")
            .bind(("ifaces", interfaces))
            .query("COMMIT TRANSACTION;")
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(())
    }

    /// Re-derive the next-id counters from the current contents of the
    /// store. Needed on every startup (not just a fresh seed) so that a
    /// restarted API process does not recycle a surrogate id.
    async fn resync_id_counters(&self) -> StorageResult<()> {
        let max_user: Option<i64> = self.max_field("user", "user_id").await?;
        let max_peer: Option<i64> = self.max_field("peer", "peer_id").await?;
        let max_route: Option<i64> = self.max_field("route", "route_id").await?;
        let max_result: Option<i64> = self.max_field("isolation_result", "result_id").await?;

        self.next_user_id.store(max_user.unwrap_or(0) + 1, Ordering::SeqCst);
        self.next_peer_id.store(max_peer.unwrap_or(0) + 1, Ordering::SeqCst);
        self.next_route_id.store(max_route.unwrap_or(0) + 1, Ordering::SeqCst);
        self.next_result_id.store(max_result.unwrap_or(0) + 1, Ordering::SeqCst);
        Ok(())
    }

    async fn max_field(&self, table: &str, field: &str) -> StorageResult<Option<i64>> {
        let sql = format!("SELECT math::max({field}) AS m FROM {table} GROUP ALL;");
        #[derive(serde::Deserialize)]
        struct Row {
            m: Option<i64>,
        }
        let rows: Vec<Row> = self
            .db
            .query(&sql)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?
            .take(0)
            .map_err(|e| StorageError::Decode(e.to_string()))?;
        Ok(rows.into_iter().next().and_then(|r| r.m))
    }

    pub(crate) fn allocate_peer_id(&self) -> i64 {
        self.next_peer_id.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn allocate_route_id(&self) -> i64 {
        self.next_route_id.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn allocate_result_id(&self) -> i64 {
        self.next_result_id.fetch_add(1, Ordering::SeqCst)
    }

    #[allow(dead_code)]
    pub(crate) fn allocate_user_id(&self) -> i64 {
        self.next_user_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Cheapest possible round trip to the backing engine, used by the
    /// health endpoint's database probe (§4.11).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] if the engine does not respond.
    pub async fn ping(&self) -> StorageResult<()> {
        self.db
            .query("SELECT 1;")
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(())
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore").finish_non_exhaustive()
    }
}
