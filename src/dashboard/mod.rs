//! Control-plane (dashboard) integration.
//!
//! # Data Flow
//! ```text
//! startup: handoff identity? → resume : register (POST /register/node)
//! every heartbeat_interval:  GET /register/ping      (rotates nonce)
//! every reload:              GET /system/apis, /system/policies (rotates nonce)
//! 403 anywhere:              discard nonce → register again
//! shutdown:                  DELETE /system/node
//! ```

pub mod client;
pub mod heartbeat;

pub use client::{DashboardClient, DashboardError, NodeIdentity};
pub use heartbeat::{Heartbeat, HeartbeatHandle};
