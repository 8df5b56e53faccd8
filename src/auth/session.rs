//! Session lookup and persistence.

use std::sync::Arc;
use std::time::Duration;

use crate::apidef::SessionState;
use crate::storage::{StorageError, StorageHandler};

/// Storage prefix for API key sessions.
pub const SESSION_PREFIX: &str = "apikey-";
/// Storage prefix for organisation sessions.
pub const ORG_SESSION_PREFIX: &str = "orgkey-";

/// Reads and writes sessions through a prefix-scoped store.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn StorageHandler>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn StorageHandler>) -> Self {
        Self { store }
    }

    pub async fn session_detail(&self, key: &str) -> Result<Option<SessionState>, StorageError> {
        match self.store.get_key(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn update_session(
        &self,
        key: &str,
        session: &SessionState,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        let encoded = serde_json::to_string(session)?;
        self.store.set_key(key, &encoded, ttl).await
    }

    pub async fn remove_session(&self, key: &str) -> Result<bool, StorageError> {
        self.store.delete_key(key).await
    }

    /// Keys starting with `filter`.
    pub async fn sessions(&self, filter: &str) -> Result<Vec<String>, StorageError> {
        self.store.get_keys(filter).await
    }
}
