//! Resilience helpers for background loops.
//!
//! # Data Flow
//! ```text
//! RPC keepalive / dashboard registration failure
//!     → backoff.rs (next delay, exponential with jitter, capped)
//!     → sleep, retry
//!     → success resets the attempt counter
//! ```
//!
//! # Design Decisions
//! - Every retry loop is bounded by a delay cap and an explicit exit flag
//! - No recursion; loops own their attempt counters

pub mod backoff;

pub use backoff::{calculate_backoff, Backoff};
