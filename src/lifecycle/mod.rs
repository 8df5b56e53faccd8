//! Process lifecycle.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → wire stores, sources, chain builder → register / login
//!     → initial reload → serve
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → graceful shutdown
//!     SIGHUP         → queued reload
//!
//! Handoff (handoff.rs):
//!     outgoing process suspends its heartbeat and exports node id + nonce
//!     incoming process resumes them instead of registering
//!
//! Shutdown (shutdown.rs):
//!     broadcast to background tasks → drain HTTP → deregister → kill RPC client
//! ```

pub mod handoff;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use handoff::{export_handoff, suspend_for_handoff, take_handoff};
pub use shutdown::Shutdown;
pub use startup::{Collaborators, Gateway, StartupError};
