//! `Peer` persistence.

use encryptor_core::entities::{DpdAction, IkeVersion, Peer};

use crate::error::{StorageError, StorageResult};
use crate::store::ConfigStore;

/// Fields needed to create a peer. Mirrors [`Peer`] minus the surrogate id
/// and timestamps, which the store assigns.
#[derive(Debug, Clone)]
pub struct NewPeer {
    /// Display name, already validated and checked for uniqueness by the caller.
    pub name: String,
    /// Remote IPv4 address.
    pub remote_ip: String,
    /// AES-GCM ciphertext of the PSK.
    pub psk_encrypted: Vec<u8>,
    /// AES-GCM nonce paired with `psk_encrypted`.
    pub psk_nonce: Vec<u8>,
    /// Negotiated IKE version.
    pub ike_version: IkeVersion,
    /// Whether the peer starts enabled.
    pub enabled: bool,
    /// DPD action on timeout.
    pub dpd_action: DpdAction,
    /// DPD delay, seconds.
    pub dpd_delay: i64,
    /// DPD timeout, seconds.
    pub dpd_timeout: i64,
    /// Rekey interval, seconds.
    pub rekey_time: i64,
}

/// Fields a peer update may change. `None` means "leave as-is".
#[derive(Debug, Clone, Default)]
pub struct PeerUpdate {
    /// New display name.
    pub name: Option<String>,
    /// New remote IPv4 address.
    pub remote_ip: Option<String>,
    /// New encrypted PSK, replacing both `psk_encrypted` and `psk_nonce` together.
    pub psk: Option<(Vec<u8>, Vec<u8>)>,
    /// New IKE version.
    pub ike_version: Option<IkeVersion>,
    /// New enabled flag.
    pub enabled: Option<bool>,
    /// New DPD action.
    pub dpd_action: Option<DpdAction>,
    /// New DPD delay, seconds.
    pub dpd_delay: Option<i64>,
    /// New DPD timeout, seconds.
    pub dpd_timeout: Option<i64>,
    /// New rekey interval, seconds.
    pub rekey_time: Option<i64>,
}

impl ConfigStore {
    /// List all peers, stable insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] on a store-level failure.
    pub async fn list_peers(&self) -> StorageResult<Vec<Peer>> {
        let mut response = self
            .db
            .query("SELECT * FROM peer ORDER BY peer_id ASC")
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        response.take(0).map_err(|e| StorageError::Decode(e.to_string()))
    }

    /// Look up a peer by surrogate id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if no such peer exists.
    pub async fn get_peer(&self, peer_id: i64) -> StorageResult<Peer> {
        let mut response = self
            .db
            .query("SELECT * FROM peer WHERE peer_id = $id LIMIT 1")
            .bind(("id", peer_id))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        let rows: Vec<Peer> = response.take(0).map_err(|e| StorageError::Decode(e.to_string()))?;
        rows.into_iter()
            .next()
            .ok_or(StorageError::NotFound { entity: "peer", id: peer_id })
    }

    /// Create a peer after the caller has already validated field content
    /// and checked name uniqueness against a fresh read.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::DuplicateName`] if `new.name` collides with
    /// an existing peer (checked again here, inside the same call, to close
    /// the race against a concurrent create), or [`StorageError::Query`] on
    /// a store-level failure.
    pub async fn create_peer(&self, new: NewPeer) -> StorageResult<Peer> {
        if self.find_peer_by_name(&new.name).await?.is_some() {
            return Err(StorageError::DuplicateName { entity: "peer", name: new.name });
        }

        let now = chrono::Utc::now();
        let peer = Peer {
            peer_id: self.allocate_peer_id(),
            name: new.name,
            remote_ip: new.remote_ip,
            psk_encrypted: new.psk_encrypted,
            psk_nonce: new.psk_nonce,
            ike_version: new.ike_version,
            enabled: new.enabled,
            dpd_action: new.dpd_action,
            dpd_delay: new.dpd_delay,
            dpd_timeout: new.dpd_timeout,
            rekey_time: new.rekey_time,
            created_at: now,
            updated_at: now,
        };

        self.db
            .query("CREATE peer CONTENT $peer")
            .bind(("peer", peer.clone()))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(peer)
    }

    /// Apply a partial update to an existing peer.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if `peer_id` does not exist, or
    /// [`StorageError::DuplicateName`] if `update.name` collides with a
    /// different peer.
    pub async fn update_peer(&self, peer_id: i64, update: PeerUpdate) -> StorageResult<Peer> {
        let mut peer = self.get_peer(peer_id).await?;

        if let Some(name) = update.name {
            if let Some(existing) = self.find_peer_by_name(&name).await? {
                if existing.peer_id != peer_id {
                    return Err(StorageError::DuplicateName { entity: "peer", name });
                }
            }
            peer.name = name;
        }
        if let Some(remote_ip) = update.remote_ip {
            peer.remote_ip = remote_ip;
        }
        if let Some((ciphertext, nonce)) = update.psk {
            peer.psk_encrypted = ciphertext;
            peer.psk_nonce = nonce;
        }
        if let Some(ike_version) = update.ike_version {
            peer.ike_version = ike_version;
        }
        if let Some(enabled) = update.enabled {
            peer.enabled = enabled;
        }
        if let Some(dpd_action) = update.dpd_action {
            peer.dpd_action = dpd_action;
        }
        if let Some(dpd_delay) = update.dpd_delay {
            peer.dpd_delay = dpd_delay;
        }
        if let Some(dpd_timeout) = update.dpd_timeout {
            peer.dpd_timeout = dpd_timeout;
        }
        if let Some(rekey_time) = update.rekey_time {
            peer.rekey_time = rekey_time;
        }
        peer.updated_at = chrono::Utc::now();

        self.db
            .query("UPDATE peer CONTENT $peer WHERE peer_id = $id")
            .bind(("peer", peer.clone()))
            .bind(("id", peer_id))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(peer)
    }

    /// Delete a peer and every route it owns in one transaction (§4.4).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if `peer_id` does not exist.
    pub async fn delete_peer(&self, peer_id: i64) -> StorageResult<()> {
        self.get_peer(peer_id).await?;
        self.db
            .query("BEGIN TRANSACTION;")
            .query("DELETE route WHERE peer_id = $id;")
            .bind(("id", peer_id))
            .query("DELETE peer WHERE peer_id = $id;")
            .bind(("id", peer_id))
            .query("COMMIT TRANSACTION;")
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(())
    }

    async fn find_peer_by_name(&self, name: &str) -> StorageResult<Option<Peer>> {
        let mut response = self
            .db
            .query("SELECT * FROM peer WHERE name = $name LIMIT 1")
            .bind(("name", name.to_string()))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        let rows: Vec<Peer> = response.take(0).map_err(|e| StorageError::Decode(e.to_string()))?;
        Ok(rows.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_peer(name: &str) -> NewPeer {
        NewPeer {
            name: name.to_string(),
            remote_ip: "203.0.113.10".to_string(),
            psk_encrypted: vec![1, 2, 3],
            psk_nonce: vec![0; 12],
            ike_version: IkeVersion::Ikev2,
            enabled: true,
            dpd_action: DpdAction::Restart,
            dpd_delay: 30,
            dpd_timeout: 150,
            rekey_time: 3600,
        }
    }

    #[tokio::test]
    async fn create_then_list_then_get_round_trips() {
        let store = ConfigStore::connect_memory().await.unwrap();
        let created = store.create_peer(sample_peer("site-a")).await.unwrap();
        assert_eq!(created.peer_id, 1);

        let listed = store.list_peers().await.unwrap();
        assert_eq!(listed.len(), 1);

        let fetched = store.get_peer(created.peer_id).await.unwrap();
        assert_eq!(fetched.name, "site-a");
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected() {
        let store = ConfigStore::connect_memory().await.unwrap();
        store.create_peer(sample_peer("site-a")).await.unwrap();
        let result = store.create_peer(sample_peer("site-a")).await;
        assert!(matches!(result, Err(StorageError::DuplicateName { .. })));
    }

    #[tokio::test]
    async fn update_renaming_to_own_name_is_not_a_conflict() {
        let store = ConfigStore::connect_memory().await.unwrap();
        let peer = store.create_peer(sample_peer("site-a")).await.unwrap();
        let updated = store
            .update_peer(
                peer.peer_id,
                PeerUpdate { name: Some("site-a".to_string()), enabled: Some(false), ..Default::default() },
            )
            .await
            .unwrap();
        assert!(!updated.enabled);
    }

    #[tokio::test]
    async fn delete_peer_cascades_to_its_routes() {
        let store = ConfigStore::connect_memory().await.unwrap();
        let peer = store.create_peer(sample_peer("site-a")).await.unwrap();
        store.create_route(peer.peer_id, "10.2.0.0/24").await.unwrap();

        store.delete_peer(peer.peer_id).await.unwrap();

        assert!(matches!(
            store.get_peer(peer.peer_id).await,
            Err(StorageError::NotFound { .. })
        ));
        assert!(store.list_routes_for_peer(peer.peer_id).await.unwrap().is_empty());
    }
}
