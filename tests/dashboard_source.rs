//! Control-plane sourced configuration against a mock control plane.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use api_gateway::apidef::Policy;
use api_gateway::chain::{ChainBuilder, ChainSettings};
use api_gateway::config::AuthOverrideConfig;
use api_gateway::dashboard::DashboardClient;
use api_gateway::policy::PolicyStore;
use api_gateway::registry::empty_snapshot;
use api_gateway::reload::{ReloadResult, Reloader};
use api_gateway::sources::{ConfigSource, DashboardSource, Sources};
use api_gateway::storage::{LocalStore, StorageFactory};

use common::{keyless_api, EchoUpstream, MockDashboard, SECRET};

async fn connect(dash: &MockDashboard) -> (Arc<DashboardClient>, Arc<DashboardSource>) {
    let base = dash.spawn().await;
    let client = Arc::new(DashboardClient::new(
        &base,
        SECRET,
        "test-host",
        Duration::from_secs(2),
    ));
    client.register().await.unwrap();
    let source = Arc::new(DashboardSource::new(client.clone(), &base, false));
    (client, source)
}

#[tokio::test]
async fn test_fetch_rotates_nonce() {
    let dash = MockDashboard::default();
    dash.apis.lock().unwrap().push(keyless_api("a", "/a/"));
    let (client, source) = connect(&dash).await;
    assert_eq!(client.identity().node_id, "node-1");
    assert_eq!(client.identity().nonce, "n0");

    let apis = source.load_api_definitions().await.unwrap();
    assert_eq!(apis.len(), 1);
    assert_eq!(apis[0].api_id, "a");
    assert_eq!(client.identity().nonce, "n1");
}

#[tokio::test]
async fn test_policies_keyed_by_record_id() {
    let dash = MockDashboard::default();
    dash.policies.lock().unwrap().push(Policy {
        id: "explicit".into(),
        mid: "record-1".into(),
        ..Policy::default()
    });
    let (_client, source) = connect(&dash).await;

    let policies = source.load_policies().await.unwrap();
    assert_eq!(policies.len(), 1);
    assert_eq!(policies[0].0, "record-1");
    assert_eq!(policies[0].1.id, "record-1");
}

#[tokio::test]
async fn test_forbidden_fetch_leaves_state_unchanged() {
    let dash = MockDashboard::default();
    dash.apis.lock().unwrap().push(keyless_api("a", "/a/"));
    dash.policies.lock().unwrap().push(Policy {
        mid: "pol-1".into(),
        rate: 5.0,
        per: 1.0,
        ..Policy::default()
    });
    let (_client, source) = connect(&dash).await;

    let snapshot = empty_snapshot();
    let policies = Arc::new(PolicyStore::new());
    let storage = StorageFactory::local_only(LocalStore::new());
    let builder =
        ChainBuilder::new(ChainSettings::default(), storage).with_upstream(Arc::new(EchoUpstream));
    let reloader = Reloader::new(
        Sources {
            apis: source.clone(),
            policies: source.clone(),
        },
        AuthOverrideConfig::default(),
        policies.clone(),
        builder,
        snapshot.clone(),
    );
    assert!(matches!(reloader.reload_once().await, ReloadResult::Published { apis: 1, .. }));
    let generation = snapshot.load().generation();
    let loaded = policies.lookup("pol-1").unwrap();
    assert_eq!(loaded.id, "pol-1");

    dash.forbid.store(true, Ordering::SeqCst);
    dash.policies.lock().unwrap().clear();
    assert_eq!(reloader.reload_once().await, ReloadResult::SkippedNoDefinitions);
    assert_eq!(snapshot.load().generation(), generation);
    assert!(snapshot.load().get("a").is_some());
    assert_eq!(policies.len(), 1);
    assert_eq!(policies.lookup("pol-1"), Some(loaded));
}

#[tokio::test]
async fn test_forbidden_fetch_registers_again() {
    let dash = MockDashboard::default();
    let (client, source) = connect(&dash).await;
    assert_eq!(dash.registrations.load(Ordering::SeqCst), 1);

    dash.forbid.store(true, Ordering::SeqCst);
    assert!(source.load_api_definitions().await.is_none());
    assert_eq!(client.identity().nonce, "");

    dash.forbid.store(false, Ordering::SeqCst);
    client.register().await.unwrap();
    assert_eq!(client.identity().node_id, "node-2");
}
