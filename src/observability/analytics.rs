//! Per-request analytics records.
//!
//! The recorder appends one JSON record per proxied request to a list in
//! the local store. The purger drains that list on a fixed interval and
//! emits each record as a structured log event.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::observability::metrics;
use crate::storage::{LocalStore, StorageHandler};

/// List the records are appended to, relative to the analytics prefix.
pub const ANALYTICS_KEY: &str = "tyk-system-analytics";
pub const ANALYTICS_PREFIX: &str = "analytics-";
pub const ANALYTICS_PURGE_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsRecord {
    pub method: String,
    pub path: String,
    pub response_code: u16,
    pub api_id: String,
    pub org_id: String,
    pub api_key: String,
    pub ip_address: String,
    pub request_time_ms: u64,
    pub timestamp: u64,
}

impl AnalyticsRecord {
    pub fn now_unix() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }
}

/// Appends analytics records to the local store.
#[derive(Clone)]
pub struct AnalyticsRecorder {
    store: Arc<dyn StorageHandler>,
}

impl AnalyticsRecorder {
    pub fn new(store: Arc<dyn StorageHandler>) -> Self {
        Self { store }
    }

    pub async fn record(&self, record: &AnalyticsRecord) {
        let encoded = match serde_json::to_string(record) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode analytics record");
                return;
            }
        };
        if let Err(e) = self.store.append_to_list(ANALYTICS_KEY, &encoded).await {
            tracing::warn!(
                api_id = %record.api_id,
                error = %e,
                "Failed to store analytics record"
            );
        }
    }
}

/// Periodically drains the analytics list.
pub struct AnalyticsPurger {
    store: LocalStore,
    interval: Duration,
}

impl AnalyticsPurger {
    /// `store` must carry the analytics prefix.
    pub fn new(store: LocalStore, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Drain the list once, returning the number of records emitted.
    pub fn purge_once(&self) -> usize {
        let raw = self.store.take_list(ANALYTICS_KEY);
        if raw.is_empty() {
            return 0;
        }

        let mut emitted = 0;
        for encoded in &raw {
            match serde_json::from_str::<AnalyticsRecord>(encoded) {
                Ok(record) => {
                    tracing::info!(
                        target: "analytics",
                        api_id = %record.api_id,
                        org_id = %record.org_id,
                        method = %record.method,
                        path = %record.path,
                        response_code = record.response_code,
                        ip_address = %record.ip_address,
                        request_time_ms = record.request_time_ms,
                        timestamp = record.timestamp,
                        "Request recorded"
                    );
                    emitted += 1;
                }
                Err(e) => tracing::warn!(error = %e, "Dropping undecodable analytics record"),
            }
        }
        metrics::record_analytics_purged(raw.len());
        tracing::debug!(records = raw.len(), "Analytics purged");
        emitted
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Analytics purger started");
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(self.interval) => {
                    self.purge_once();
                }
            }
        }
        self.purge_once();
        tracing::info!("Analytics purger stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str) -> AnalyticsRecord {
        AnalyticsRecord {
            method: "GET".into(),
            path: path.into(),
            response_code: 200,
            api_id: "api1".into(),
            org_id: "org".into(),
            api_key: String::new(),
            ip_address: "10.0.0.1".into(),
            request_time_ms: 3,
            timestamp: AnalyticsRecord::now_unix(),
        }
    }

    #[tokio::test]
    async fn test_records_are_appended() {
        let root = LocalStore::new();
        let recorder = AnalyticsRecorder::new(Arc::new(root.with_prefix(ANALYTICS_PREFIX)));
        let record = record("/api/users");
        recorder.record(&record).await;

        let stored = root.with_prefix(ANALYTICS_PREFIX).take_list(ANALYTICS_KEY);
        assert_eq!(stored.len(), 1);
        let decoded: AnalyticsRecord = serde_json::from_str(&stored[0]).unwrap();
        assert_eq!(decoded, record);
    }

    #[tokio::test]
    async fn test_purge_drains_list() {
        let store = LocalStore::new().with_prefix(ANALYTICS_PREFIX);
        let recorder = AnalyticsRecorder::new(Arc::new(store.clone()));
        for i in 0..50 {
            recorder.record(&record(&format!("/api/{i}"))).await;
        }
        store.append_to_list(ANALYTICS_KEY, "not json").await.unwrap();

        let purger = AnalyticsPurger::new(store.clone(), ANALYTICS_PURGE_INTERVAL);
        assert_eq!(purger.purge_once(), 50);
        assert!(store.take_list(ANALYTICS_KEY).is_empty());
        assert_eq!(purger.purge_once(), 0);
    }

    #[tokio::test]
    async fn test_run_drains_on_shutdown() {
        let store = LocalStore::new().with_prefix(ANALYTICS_PREFIX);
        let recorder = AnalyticsRecorder::new(Arc::new(store.clone()));
        let (tx, rx) = broadcast::channel(1);
        let purger = AnalyticsPurger::new(store.clone(), Duration::from_secs(3600));
        let task = tokio::spawn(purger.run(rx));

        recorder.record(&record("/late")).await;
        tx.send(()).unwrap();
        task.await.unwrap();
        assert!(store.take_list(ANALYTICS_KEY).is_empty());
    }

    #[tokio::test]
    async fn test_run_purges_on_interval() {
        let store = LocalStore::new().with_prefix(ANALYTICS_PREFIX);
        let recorder = AnalyticsRecorder::new(Arc::new(store.clone()));
        let (tx, rx) = broadcast::channel(1);
        let purger = AnalyticsPurger::new(store.clone(), Duration::from_millis(20));
        let task = tokio::spawn(purger.run(rx));

        recorder.record(&record("/a")).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(store.take_list(ANALYTICS_KEY).is_empty());
        tx.send(()).unwrap();
        task.await.unwrap();
    }
}
