//! Configuration reloads.
//!
//! # Data Flow
//! ```text
//! triggers (control API, SIGHUP, file watcher, RPC listener, keepalive recovery)
//!     → queue.rs ReloadQueue (single slot, duplicates coalesced)
//!     → ReloadLoop (one reload at a time, idle interval after each)
//!     → coordinator.rs Reloader (policies → specs → pipelines → snapshot swap)
//! ```

pub mod coordinator;
pub mod queue;

pub use coordinator::{ReloadResult, Reloader};
pub use queue::{Reload, ReloadLoop, ReloadOutcome, ReloadProgress, ReloadQueue, ReloadReceiver};
