//! `Interface` persistence.
//!
//! Interfaces are seeded once (§4.4) and never created or deleted afterward;
//! the only mutation is rewriting a row's IPv4 configuration.

use encryptor_core::entities::{Interface, InterfaceName};

use crate::error::{StorageError, StorageResult};
use crate::store::ConfigStore;

impl ConfigStore {
    /// List all three interfaces, stable `CT`/`PT`/`MGMT` seed order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] on a store-level failure.
    pub async fn list_interfaces(&self) -> StorageResult<Vec<Interface>> {
        let mut response = self
            .db
            .query("SELECT * FROM interface ORDER BY interface_id ASC")
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        response.take(0).map_err(|e| StorageError::Decode(e.to_string()))
    }

    /// Look up a single interface by its immutable name.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] — seeding guarantees all three
    /// rows exist, so this only fires if the store was tampered with.
    pub async fn get_interface(&self, name: InterfaceName) -> StorageResult<Interface> {
        let mut response = self
            .db
            .query("SELECT * FROM interface WHERE name = $name LIMIT 1")
            .bind(("name", name))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        let rows: Vec<Interface> = response.take(0).map_err(|e| StorageError::Decode(e.to_string()))?;
        rows.into_iter().next().ok_or(StorageError::NotFound {
            entity: "interface",
            id: 0,
        })
    }

    /// Overwrite an interface's IPv4 configuration after the daemon has
    /// applied it (§4.7).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if `name` somehow has no row.
    pub async fn update_interface_config(
        &self,
        name: InterfaceName,
        ip_address: &str,
        netmask: &str,
        gateway: &str,
    ) -> StorageResult<Interface> {
        self.get_interface(name).await?;
        let mut response = self
            .db
            .query(
                "UPDATE interface SET ip_address = $ip, netmask = $netmask, gateway = $gateway \
                 WHERE name = $name",
            )
            .bind(("ip", ip_address.to_string()))
            .bind(("netmask", netmask.to_string()))
            .bind(("gateway", gateway.to_string()))
            .bind(("name", name))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        let rows: Vec<Interface> = response.take(0).map_err(|e| StorageError::Decode(e.to_string()))?;
        rows.into_iter().next().ok_or(StorageError::NotFound {
            entity: "interface",
            id: 0,
        })
    }

    /// Restore a previous IPv4 configuration after a daemon-side apply
    /// failure (§3's "configuration rollback" invariant). Identical to
    /// [`ConfigStore::update_interface_config`] in mechanism; kept as a
    /// distinct name so call sites read as what they are — a rollback, not
    /// a forward change.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::update_interface_config`].
    pub async fn rollback_interface_config(
        &self,
        name: InterfaceName,
        prev_ip: &str,
        prev_netmask: &str,
        prev_gateway: &str,
    ) -> StorageResult<Interface> {
        self.update_interface_config(name, prev_ip, prev_netmask, prev_gateway)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_interfaces_cover_all_three_names() {
        let store = ConfigStore::connect_memory().await.unwrap();
        let rows = store.list_interfaces().await.unwrap();
        assert_eq!(rows.len(), 3);
        for name in InterfaceName::ALL {
            assert!(rows.iter().any(|r| r.name == name));
        }
    }

    #[tokio::test]
    async fn update_then_rollback_restores_prior_values() {
        let store = ConfigStore::connect_memory().await.unwrap();
        let before = store.get_interface(InterfaceName::Ct).await.unwrap();
        assert!(before.ip_address.is_none());

        store
            .update_interface_config(InterfaceName::Ct, "10.0.0.2", "255.255.255.0", "10.0.0.1")
            .await
            .unwrap();
        let applied = store.get_interface(InterfaceName::Ct).await.unwrap();
        assert_eq!(applied.ip_address.as_deref(), Some("10.0.0.2"));

        store
            .rollback_interface_config(InterfaceName::Ct, "10.0.0.9", "255.255.255.0", "10.0.0.1")
            .await
            .unwrap();
        let rolled_back = store.get_interface(InterfaceName::Ct).await.unwrap();
        assert_eq!(rolled_back.ip_address.as_deref(), Some("10.0.0.9"));
    }
}
