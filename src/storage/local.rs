//! In-process clustered store.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::storage::{StorageError, StorageHandler};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Shared key/value map. Clones share the same data; each clone carries its
/// own key prefix.
#[derive(Debug, Clone, Default)]
pub struct LocalStore {
    entries: Arc<DashMap<String, Entry>>,
    lists: Arc<DashMap<String, Vec<String>>>,
    prefix: String,
}

impl LocalStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A view of the same data under another prefix.
    pub fn with_prefix(&self, prefix: &str) -> Self {
        Self {
            entries: self.entries.clone(),
            lists: self.lists.clone(),
            prefix: prefix.to_string(),
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Drain a list, returning its values in insertion order.
    pub fn take_list(&self, key: &str) -> Vec<String> {
        self.lists
            .remove(&self.full_key(key))
            .map(|(_, values)| values)
            .unwrap_or_default()
    }

    /// Number of live entries across all prefixes.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| e.value().is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StorageHandler for LocalStore {
    async fn get_key(&self, key: &str) -> Result<Option<String>, StorageError> {
        let full = self.full_key(key);
        let now = Instant::now();
        let value = match self.entries.get(&full) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => None,
            None => return Ok(None),
        };
        if value.is_none() {
            self.entries.remove_if(&full, |_, e| !e.is_live(now));
        }
        Ok(value)
    }

    async fn set_key(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        let entry = Entry {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.insert(self.full_key(key), entry);
        Ok(())
    }

    async fn delete_key(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.entries.remove(&self.full_key(key)).is_some())
    }

    async fn get_keys(&self, filter: &str) -> Result<Vec<String>, StorageError> {
        let search = self.full_key(filter);
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(&search) && e.value().is_live(now))
            .map(|e| e.key()[self.prefix.len()..].to_string())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn delete_keys(&self, filter: &str) -> Result<usize, StorageError> {
        let search = self.full_key(filter);
        let mut removed = 0;
        self.entries.retain(|k, _| {
            let matched = k.starts_with(&search);
            if matched {
                removed += 1;
            }
            !matched
        });
        Ok(removed)
    }

    async fn append_to_list(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.lists
            .entry(self.full_key(key))
            .or_default()
            .push(value.to_string());
        Ok(())
    }
}
