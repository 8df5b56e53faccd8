//! The published routing table.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use crate::apidef::ApiDefinition;
use crate::chain::ApiPipeline;
use crate::policy::PolicyMap;

/// Immutable view of every mounted API, its pipeline and the policies it was
/// built against. Replaced wholesale on reload.
#[derive(Clone, Default)]
pub struct RegistrySnapshot {
    generation: u64,
    routes: Vec<ApiPipeline>,
    by_id: HashMap<String, usize>,
    policies: Arc<PolicyMap>,
}

fn host_without_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

fn path_matches(listen_path: &str, path: &str) -> bool {
    path.starts_with(listen_path) || path == listen_path.trim_end_matches('/')
}

impl RegistrySnapshot {
    /// Order pipelines most specific first: longer listen paths, then longer
    /// domains. Ties keep load order.
    pub fn new(generation: u64, mut pipelines: Vec<ApiPipeline>, policies: Arc<PolicyMap>) -> Self {
        pipelines.sort_by_key(|p| {
            let api = p.api();
            (Reverse(api.proxy.listen_path.len()), Reverse(api.domain.len()))
        });
        let by_id = pipelines
            .iter()
            .enumerate()
            .map(|(i, p)| (p.api().api_id.clone(), i))
            .collect();
        Self {
            generation,
            routes: pipelines,
            by_id,
            policies,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn policies(&self) -> &Arc<PolicyMap> {
        &self.policies
    }

    pub fn get(&self, api_id: &str) -> Option<&ApiPipeline> {
        self.by_id.get(api_id).map(|&i| &self.routes[i])
    }

    /// Definitions in routing order.
    pub fn apis(&self) -> impl Iterator<Item = &Arc<ApiDefinition>> {
        self.routes.iter().map(ApiPipeline::api)
    }

    /// First pipeline whose domain (if any) and listen path match the request.
    pub fn match_request(&self, host: Option<&str>, path: &str) -> Option<&ApiPipeline> {
        let host = host.map(host_without_port);
        self.routes.iter().find(|pipeline| {
            let api = pipeline.api();
            let domain_ok = api.domain.is_empty()
                || host.is_some_and(|h| h.eq_ignore_ascii_case(&api.domain));
            domain_ok && path_matches(&api.proxy.listen_path, path)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainBuilder, ChainSettings};
    use crate::storage::{LocalStore, StorageFactory};

    fn pipeline(api_id: &str, listen_path: &str, domain: &str) -> ApiPipeline {
        let mut api = ApiDefinition {
            api_id: api_id.into(),
            use_keyless: true,
            domain: domain.into(),
            ..ApiDefinition::default()
        };
        api.proxy.listen_path = listen_path.into();
        ChainBuilder::new(ChainSettings::default(), StorageFactory::local_only(LocalStore::new()))
            .build(&api, Arc::default())
            .unwrap()
    }

    fn order(snapshot: &RegistrySnapshot) -> Vec<String> {
        snapshot.apis().map(|a| a.proxy.listen_path.clone()).collect()
    }

    #[test]
    fn test_routing_order() {
        let snapshot = RegistrySnapshot::new(
            1,
            vec![pipeline("a", "/a/", ""), pipeline("ab", "/ab/", ""), pipeline("root", "/", "")],
            Arc::default(),
        );
        assert_eq!(order(&snapshot), vec!["/ab/", "/a/", "/"]);
        assert_eq!(snapshot.get("root").map(|p| p.api().api_id.as_str()), Some("root"));
    }

    #[test]
    fn test_domain_breaks_ties() {
        let snapshot = RegistrySnapshot::new(
            1,
            vec![pipeline("any", "/api/", ""), pipeline("host", "/api/", "example.com")],
            Arc::default(),
        );
        let ids: Vec<_> = snapshot.apis().map(|a| a.api_id.as_str()).collect();
        assert_eq!(ids, vec!["host", "any"]);

        let matched = |host, path| {
            snapshot
                .match_request(host, path)
                .map(|p| p.api().api_id.clone())
        };
        assert_eq!(matched(Some("EXAMPLE.com:8080"), "/api/x"), Some("host".into()));
        assert_eq!(matched(Some("other.com"), "/api/x"), Some("any".into()));
        assert_eq!(matched(None, "/api"), Some("any".into()));
        assert_eq!(matched(None, "/apix"), None);
    }

    #[test]
    fn test_host_without_port() {
        assert_eq!(host_without_port("example.com:8080"), "example.com");
        assert_eq!(host_without_port("example.com"), "example.com");
        assert_eq!(host_without_port("[::1]:80"), "[::1]");
    }
}
