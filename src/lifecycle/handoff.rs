//! Registration handoff between an outgoing and an incoming process.
//!
//! The outgoing process suspends its heartbeat and exports its node id and
//! nonce; the incoming process picks them up at startup and resumes without
//! registering again. Moving the listener itself is the supervisor's job.

use crate::dashboard::{HeartbeatHandle, NodeIdentity};

pub const NONCE_ENV: &str = "TYK_SERVICE_NONCE";
pub const NODE_ID_ENV: &str = "TYK_SERVICE_NODEID";

/// Read and clear a handed-over identity.
pub fn take_handoff() -> Option<NodeIdentity> {
    let node_id = std::env::var(NODE_ID_ENV).unwrap_or_default();
    let nonce = std::env::var(NONCE_ENV).unwrap_or_default();
    std::env::remove_var(NODE_ID_ENV);
    std::env::remove_var(NONCE_ENV);

    if node_id.is_empty() {
        return None;
    }
    tracing::info!(node_id = %node_id, "Found handed-over node identity");
    Some(NodeIdentity { node_id, nonce })
}

pub fn export_handoff(identity: &NodeIdentity) {
    std::env::set_var(NODE_ID_ENV, &identity.node_id);
    std::env::set_var(NONCE_ENV, &identity.nonce);
}

/// Stop the heartbeat and export the identity for the next process.
pub fn suspend_for_handoff(heartbeat: &HeartbeatHandle) -> NodeIdentity {
    let identity = heartbeat.suspend();
    export_handoff(&identity);
    tracing::info!(node_id = %identity.node_id, "Registration exported for handoff");
    identity
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::{DashboardClient, Heartbeat};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_handoff_roundtrip() {
        let client = Arc::new(DashboardClient::new(
            "http://127.0.0.1:9",
            "s",
            "h",
            Duration::from_secs(1),
        ));
        client.resume(NodeIdentity {
            node_id: "node-7".into(),
            nonce: "n7".into(),
        });
        let heartbeat = Heartbeat::new(client, Duration::from_secs(1));
        let handle = heartbeat.handle();

        let exported = suspend_for_handoff(&handle);
        assert!(handle.is_suspended());
        assert_eq!(exported.node_id, "node-7");

        let taken = take_handoff().unwrap();
        assert_eq!(taken, exported);
        assert!(std::env::var(NODE_ID_ENV).is_err());
        assert!(take_handoff().is_none());
    }
}
