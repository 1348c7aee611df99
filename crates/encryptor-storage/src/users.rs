//! `User` persistence.

use encryptor_core::entities::User;

use crate::error::{StorageError, StorageResult};
use crate::store::ConfigStore;

impl ConfigStore {
    /// Look up a user by username (used by the login handler).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] on a store-level failure. A missing
    /// user is `Ok(None)`, not an error — the login handler turns both a
    /// missing user and a wrong password into the same generic 401 (§7).
    pub async fn find_user_by_username(&self, username: &str) -> StorageResult<Option<User>> {
        let mut response = self
            .db
            .query("SELECT * FROM user WHERE username = $username LIMIT 1")
            .bind(("username", username.to_string()))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        let rows: Vec<User> = response.take(0).map_err(|e| StorageError::Decode(e.to_string()))?;
        Ok(rows.into_iter().next())
    }

    /// Look up a user by surrogate id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if no such user exists.
    pub async fn get_user(&self, user_id: i64) -> StorageResult<User> {
        let mut response = self
            .db
            .query("SELECT * FROM user WHERE user_id = $id LIMIT 1")
            .bind(("id", user_id))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        let rows: Vec<User> = response.take(0).map_err(|e| StorageError::Decode(e.to_string()))?;
        rows.into_iter()
            .next()
            .ok_or(StorageError::NotFound { entity: "user", id: user_id })
    }

    /// Persist a new password hash and clear `requirePasswordChange`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if `user_id` does not exist.
    pub async fn update_password(&self, user_id: i64, new_hash: &str) -> StorageResult<()> {
        self.get_user(user_id).await?;
        self.db
            .query(
                "UPDATE user SET password_hash = $hash, require_password_change = false WHERE user_id = $id",
            )
            .bind(("hash", new_hash.to_string()))
            .bind(("id", user_id))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(())
    }

    /// Silently rehash in place (§3 supplemental rehash rule). Never
    /// surfaced to the caller; failures are logged by the caller, not here.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if `user_id` does not exist.
    pub async fn rehash_password(&self, user_id: i64, new_hash: &str) -> StorageResult<()> {
        self.get_user(user_id).await?;
        self.db
            .query("UPDATE user SET password_hash = $hash WHERE user_id = $id")
            .bind(("hash", new_hash.to_string()))
            .bind(("id", user_id))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(())
    }

    /// Record a successful login's timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if `user_id` does not exist.
    pub async fn record_login(&self, user_id: i64) -> StorageResult<()> {
        self.get_user(user_id).await?;
        self.db
            .query("UPDATE user SET last_login = $now WHERE user_id = $id")
            .bind(("now", chrono::Utc::now()))
            .bind(("id", user_id))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_admin_exists_and_requires_password_change() {
        let store = ConfigStore::connect_memory().await.unwrap();
        let admin = store.find_user_by_username("admin").await.unwrap().unwrap();
        assert!(admin.require_password_change);
        assert!(encryptor_crypto::password::verify_password("changeme", &admin.password_hash).unwrap());
    }

    #[tokio::test]
    async fn unknown_username_is_none_not_an_error() {
        let store = ConfigStore::connect_memory().await.unwrap();
        assert!(store.find_user_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn password_update_clears_require_change_flag() {
        let store = ConfigStore::connect_memory().await.unwrap();
        let admin = store.find_user_by_username("admin").await.unwrap().unwrap();
        let new_hash = encryptor_crypto::password::hash_password("NewPassw0rd").unwrap();
        store.update_password(admin.user_id, &new_hash).await.unwrap();

        let reloaded = store.get_user(admin.user_id).await.unwrap();
        assert!(!reloaded.require_password_change);
        assert_eq!(reloaded.password_hash, new_hash);
    }
}
