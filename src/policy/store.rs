//! Current policy set.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::apidef::Policy;

pub type PolicyMap = HashMap<String, Policy>;

/// Policies keyed by id. Readers share the lock; the reload loop takes it
/// exclusively only to swap in a new map.
#[derive(Default)]
pub struct PolicyStore {
    inner: RwLock<Arc<PolicyMap>>,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a new policy set. `None` or an empty set keeps the current one.
    /// Returns true when the set was replaced.
    pub fn replace(&self, policies: Option<PolicyMap>) -> bool {
        let policies = match policies {
            Some(policies) if !policies.is_empty() => policies,
            Some(_) => {
                tracing::warn!("No policies loaded, keeping current set");
                return false;
            }
            None => {
                tracing::warn!("Policy source unavailable, keeping current set");
                return false;
            }
        };

        let count = policies.len();
        match self.inner.write() {
            Ok(mut guard) => {
                *guard = Arc::new(policies);
                tracing::info!(count, "Policies replaced");
                true
            }
            Err(_) => {
                tracing::error!("Policy store lock poisoned");
                false
            }
        }
    }

    pub fn lookup(&self, id: &str) -> Option<Policy> {
        self.inner.read().ok()?.get(id).cloned()
    }

    /// Shared handle on the current set.
    pub fn snapshot(&self) -> Arc<PolicyMap> {
        self.inner
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(ids: &[&str]) -> PolicyMap {
        ids.iter()
            .map(|id| (id.to_string(), Policy { id: id.to_string(), ..Policy::default() }))
            .collect()
    }

    #[test]
    fn test_replace_and_lookup() {
        let store = PolicyStore::new();
        assert!(store.replace(Some(map(&["p1", "p2"]))));
        assert_eq!(store.lookup("p1").unwrap().id, "p1");
        assert!(store.lookup("p3").is_none());

        assert!(store.replace(Some(map(&["p3"]))));
        assert!(store.lookup("p1").is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_failed_or_empty_fetch_keeps_policies() {
        let store = PolicyStore::new();
        store.replace(Some(map(&["p1"])));
        assert!(!store.replace(None));
        assert!(!store.replace(Some(PolicyMap::new())));
        assert!(store.lookup("p1").is_some());
    }

    #[test]
    fn test_snapshot_outlives_replace() {
        let store = PolicyStore::new();
        store.replace(Some(map(&["old"])));
        let before = store.snapshot();
        store.replace(Some(map(&["new"])));
        assert!(before.contains_key("old"));
        assert!(store.snapshot().contains_key("new"));
    }
}
