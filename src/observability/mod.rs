//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs   (structured log events via tracing)
//!     → metrics.rs   (counters, gauges, histograms)
//!     → events.rs    (AuthFailure / ReloadComplete / EmergencyMode)
//!     → analytics.rs (one record per proxied request, local store list,
//!                     drained on an interval)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape endpoint
//!     → event subscribers (health reporter, tests)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through all subsystems
//! - Metrics are cheap (atomic increments)
//! - Events never block the request path

pub mod analytics;
pub mod events;
pub mod logging;
pub mod metrics;

pub use analytics::{AnalyticsPurger, AnalyticsRecord, AnalyticsRecorder};
pub use events::{EventBus, GatewayEvent};
