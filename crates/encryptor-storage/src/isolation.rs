//! `IsolationValidationResult` persistence.
//!
//! The daemon runs its empirical namespace-isolation self-test on a
//! schedule and after every `enforce_isolation` call; each run is recorded
//! so the API can serve the most recent result without re-running the test.

use encryptor_core::entities::IsolationValidationResult;

use crate::error::{StorageError, StorageResult};
use crate::store::ConfigStore;

impl ConfigStore {
    /// Persist one isolation self-test run, assigning it a fresh surrogate id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] on a store-level failure.
    pub async fn record_isolation_result(
        &self,
        mut result: IsolationValidationResult,
    ) -> StorageResult<IsolationValidationResult> {
        result.result_id = self.allocate_result_id();
        self.db
            .query("CREATE isolation_result CONTENT $result")
            .bind(("result", result.clone()))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(result)
    }

    /// Fetch the most recent isolation self-test result, if any has run.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] on a store-level failure.
    pub async fn latest_isolation_result(&self) -> StorageResult<Option<IsolationValidationResult>> {
        let mut response = self
            .db
            .query("SELECT * FROM isolation_result ORDER BY result_id DESC LIMIT 1")
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        let rows: Vec<IsolationValidationResult> =
            response.take(0).map_err(|e| StorageError::Decode(e.to_string()))?;
        Ok(rows.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result(status: &str) -> IsolationValidationResult {
        IsolationValidationResult {
            result_id: 0,
            status: status.to_string(),
            timestamp: chrono::Utc::now(),
            checks: vec![],
            failures: vec![],
            duration_seconds: 0.42,
        }
    }

    #[tokio::test]
    async fn latest_result_is_none_before_any_run() {
        let store = ConfigStore::connect_memory().await.unwrap();
        assert!(store.latest_isolation_result().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn latest_result_reflects_most_recent_run() {
        let store = ConfigStore::connect_memory().await.unwrap();
        store.record_isolation_result(sample_result("pass")).await.unwrap();
        store.record_isolation_result(sample_result("fail")).await.unwrap();

        let latest = store.latest_isolation_result().await.unwrap().unwrap();
        assert_eq!(latest.status, "fail");
    }
}
