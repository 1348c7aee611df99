//! In-memory daemon state: the latest isolation self-test result.
//!
//! The daemon has no database of its own (§2); everything else needed to
//! answer a command is either computed fresh (telemetry, interface stats)
//! or passed in the request payload (peer name, routes) by the API, which
//! owns the config store.

use std::sync::Arc;

use encryptor_core::entities::IsolationValidationResult;
use tokio::sync::RwLock;

/// Shared, lock-protected holder for the most recent isolation self-test
/// result, updated at startup and after every `enforce_isolation` call.
#[derive(Clone, Default)]
pub struct IsolationState {
    inner: Arc<RwLock<Option<IsolationValidationResult>>>,
}

impl IsolationState {
    /// Replace the stored result.
    pub async fn set(&self, result: IsolationValidationResult) {
        *self.inner.write().await = Some(result);
    }

    /// Read the current result, if a self-test has run.
    pub async fn get(&self) -> Option<IsolationValidationResult> {
        self.inner.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_empty_and_reflects_last_set() {
        let state = IsolationState::default();
        assert!(state.get().await.is_none());

        state
            .set(IsolationValidationResult {
                result_id: 0,
                status: "pass".to_string(),
                timestamp: chrono::Utc::now(),
                checks: vec![],
                failures: vec![],
                duration_seconds: 0.1,
            })
            .await;
        assert_eq!(state.get().await.unwrap().status, "pass");
    }
}
