//! `Route` persistence.

use encryptor_core::entities::Route;

use crate::error::{StorageError, StorageResult};
use crate::store::ConfigStore;

impl ConfigStore {
    /// List a peer's routes, stable insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] on a store-level failure. Does not
    /// check that `peer_id` exists; an unknown id simply yields an empty list.
    pub async fn list_routes_for_peer(&self, peer_id: i64) -> StorageResult<Vec<Route>> {
        let mut response = self
            .db
            .query("SELECT * FROM route WHERE peer_id = $peer_id ORDER BY route_id ASC")
            .bind(("peer_id", peer_id))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        response.take(0).map_err(|e| StorageError::Decode(e.to_string()))
    }

    /// List every route across all peers, stable insertion order. Backs the
    /// unfiltered `GET /routes` listing.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] on a store-level failure.
    pub async fn list_all_routes(&self) -> StorageResult<Vec<Route>> {
        let mut response = self
            .db
            .query("SELECT * FROM route ORDER BY route_id ASC")
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        response.take(0).map_err(|e| StorageError::Decode(e.to_string()))
    }

    /// Look up a single route by id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if no such route exists.
    pub async fn get_route(&self, route_id: i64) -> StorageResult<Route> {
        let mut response = self
            .db
            .query("SELECT * FROM route WHERE route_id = $id LIMIT 1")
            .bind(("id", route_id))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        let rows: Vec<Route> = response.take(0).map_err(|e| StorageError::Decode(e.to_string()))?;
        rows.into_iter()
            .next()
            .ok_or(StorageError::NotFound { entity: "route", id: route_id })
    }

    /// Add a route to a peer. `destination_cidr` is assumed to already be
    /// strict-normalised by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if `peer_id` does not exist.
    pub async fn create_route(&self, peer_id: i64, destination_cidr: &str) -> StorageResult<Route> {
        self.get_peer(peer_id).await?;
        let now = chrono::Utc::now();
        let route = Route {
            route_id: self.allocate_route_id(),
            peer_id,
            destination_cidr: destination_cidr.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.db
            .query("CREATE route CONTENT $route")
            .bind(("route", route.clone()))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(route)
    }

    /// Replace a peer's entire route set in one transaction (bulk
    /// `PUT .../routes`, §4.9). Existing routes are dropped and the given
    /// CIDRs are inserted fresh, so every returned row has a new id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if `peer_id` does not exist.
    pub async fn replace_routes_for_peer(
        &self,
        peer_id: i64,
        destination_cidrs: &[String],
    ) -> StorageResult<Vec<Route>> {
        self.get_peer(peer_id).await?;
        let now = chrono::Utc::now();
        let routes: Vec<Route> = destination_cidrs
            .iter()
            .map(|cidr| Route {
                route_id: self.allocate_route_id(),
                peer_id,
                destination_cidr: cidr.clone(),
                created_at: now,
                updated_at: now,
            })
            .collect();

        self.db
            .query("BEGIN TRANSACTION;")
            .query("DELETE route WHERE peer_id = $peer_id;")
            .bind(("peer_id", peer_id))
            .query("FOR $route IN $routes { CREATE route CONTENT $route };")
            .bind(("routes", routes.clone()))
            .query("COMMIT TRANSACTION;")
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(routes)
    }

    /// Replace a single route's destination CIDR in place, preserving its id,
    /// owning peer, and `created_at`. `destination_cidr` is assumed to
    /// already be strict-normalised by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if `route_id` does not exist.
    pub async fn update_route(&self, route_id: i64, destination_cidr: &str) -> StorageResult<Route> {
        let mut route = self.get_route(route_id).await?;
        route.destination_cidr = destination_cidr.to_string();
        route.updated_at = chrono::Utc::now();

        self.db
            .query("UPDATE route CONTENT $route WHERE route_id = $id")
            .bind(("route", route.clone()))
            .bind(("id", route_id))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(route)
    }

    /// Delete a single route.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if `route_id` does not exist.
    pub async fn delete_route(&self, route_id: i64) -> StorageResult<()> {
        self.get_route(route_id).await?;
        self.db
            .query("DELETE route WHERE route_id = $id")
            .bind(("id", route_id))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peers::NewPeer;
    use encryptor_core::entities::{DpdAction, IkeVersion};

    async fn seed_peer(store: &ConfigStore) -> i64 {
        let peer = store
            .create_peer(NewPeer {
                name: "site-a".to_string(),
                remote_ip: "203.0.113.10".to_string(),
                psk_encrypted: vec![1, 2, 3],
                psk_nonce: vec![0; 12],
                ike_version: IkeVersion::Ikev2,
                enabled: true,
                dpd_action: DpdAction::Restart,
                dpd_delay: 30,
                dpd_timeout: 150,
                rekey_time: 3600,
            })
            .await
            .unwrap();
        peer.peer_id
    }

    #[tokio::test]
    async fn create_and_list_routes_round_trip() {
        let store = ConfigStore::connect_memory().await.unwrap();
        let peer_id = seed_peer(&store).await;

        store.create_route(peer_id, "10.1.0.0/24").await.unwrap();
        store.create_route(peer_id, "10.2.0.0/24").await.unwrap();

        let routes = store.list_routes_for_peer(peer_id).await.unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].destination_cidr, "10.1.0.0/24");
    }

    #[tokio::test]
    async fn replace_routes_drops_prior_set() {
        let store = ConfigStore::connect_memory().await.unwrap();
        let peer_id = seed_peer(&store).await;

        store.create_route(peer_id, "10.1.0.0/24").await.unwrap();
        let replaced = store
            .replace_routes_for_peer(peer_id, &["10.9.0.0/16".to_string()])
            .await
            .unwrap();

        assert_eq!(replaced.len(), 1);
        let routes = store.list_routes_for_peer(peer_id).await.unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].destination_cidr, "10.9.0.0/16");
    }

    #[tokio::test]
    async fn update_route_preserves_id_and_created_at() {
        let store = ConfigStore::connect_memory().await.unwrap();
        let peer_id = seed_peer(&store).await;
        let route = store.create_route(peer_id, "10.1.0.0/24").await.unwrap();

        let updated = store.update_route(route.route_id, "10.2.0.0/24").await.unwrap();

        assert_eq!(updated.route_id, route.route_id);
        assert_eq!(updated.peer_id, route.peer_id);
        assert_eq!(updated.created_at, route.created_at);
        assert_eq!(updated.destination_cidr, "10.2.0.0/24");
    }

    #[tokio::test]
    async fn delete_route_removes_only_that_row() {
        let store = ConfigStore::connect_memory().await.unwrap();
        let peer_id = seed_peer(&store).await;
        let route = store.create_route(peer_id, "10.1.0.0/24").await.unwrap();
        store.create_route(peer_id, "10.2.0.0/24").await.unwrap();

        store.delete_route(route.route_id).await.unwrap();

        let routes = store.list_routes_for_peer(peer_id).await.unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].destination_cidr, "10.2.0.0/24");
    }
}
