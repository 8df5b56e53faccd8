//! Per-API health counters.
//!
//! # Data Flow
//! ```text
//! AuthKey rejects an unknown key  → KeyFailure
//! upstream proxy answers          → RequestLog(latency)
//!     → HealthReporter (per-API sliding one-minute window)
//!     → GET /tyk/health/?api_id=
//! ```

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;

const WINDOW: Duration = Duration::from_secs(60);

/// Kinds of samples recorded against an API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthCounter {
    KeyFailure,
    QuotaViolation,
    Throttle,
    /// A proxied request and its upstream latency in milliseconds.
    RequestLog(u64),
}

#[derive(Default)]
struct Samples {
    key_failures: VecDeque<Instant>,
    quota_violations: VecDeque<Instant>,
    throttles: VecDeque<Instant>,
    requests: VecDeque<(Instant, u64)>,
}

fn prune(samples: &mut VecDeque<Instant>, now: Instant) {
    while samples.front().is_some_and(|t| now.duration_since(*t) > WINDOW) {
        samples.pop_front();
    }
}

impl Samples {
    fn prune(&mut self, now: Instant) {
        prune(&mut self.key_failures, now);
        prune(&mut self.quota_violations, now);
        prune(&mut self.throttles, now);
        while self
            .requests
            .front()
            .is_some_and(|(t, _)| now.duration_since(*t) > WINDOW)
        {
            self.requests.pop_front();
        }
    }
}

/// Health summary returned by the control API.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthSnapshot {
    pub throttle_requests_per_minute: f64,
    pub quota_violations_per_minute: f64,
    pub key_failures_per_minute: f64,
    pub average_upstream_latency: f64,
    pub average_requests_per_minute: f64,
}

/// Sliding-window counters keyed by API id.
#[derive(Default)]
pub struct HealthReporter {
    apis: DashMap<String, Mutex<Samples>>,
}

impl HealthReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, api_id: &str, counter: HealthCounter) {
        let now = Instant::now();
        let entry = self.apis.entry(api_id.to_string()).or_default();
        let Ok(mut samples) = entry.lock() else {
            return;
        };
        samples.prune(now);
        match counter {
            HealthCounter::KeyFailure => samples.key_failures.push_back(now),
            HealthCounter::QuotaViolation => samples.quota_violations.push_back(now),
            HealthCounter::Throttle => samples.throttles.push_back(now),
            HealthCounter::RequestLog(latency_ms) => samples.requests.push_back((now, latency_ms)),
        }
    }

    pub fn snapshot(&self, api_id: &str) -> HealthSnapshot {
        let Some(entry) = self.apis.get(api_id) else {
            return HealthSnapshot::default();
        };
        let Ok(mut samples) = entry.lock() else {
            return HealthSnapshot::default();
        };
        samples.prune(Instant::now());

        let requests = samples.requests.len();
        let average_upstream_latency = if requests == 0 {
            0.0
        } else {
            samples.requests.iter().map(|(_, ms)| *ms as f64).sum::<f64>() / requests as f64
        };

        HealthSnapshot {
            throttle_requests_per_minute: samples.throttles.len() as f64,
            quota_violations_per_minute: samples.quota_violations.len() as f64,
            key_failures_per_minute: samples.key_failures.len() as f64,
            average_upstream_latency,
            average_requests_per_minute: requests as f64,
        }
    }
}
