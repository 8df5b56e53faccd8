//! Policy dedup contract.

use std::collections::HashMap;

use crate::apidef::Policy;

/// Collapse an ordered policy list into a map. The first entry seen for an
/// id wins; every later duplicate is dropped with a warning.
pub fn dedup_policies(entries: Vec<(String, Policy)>) -> HashMap<String, Policy> {
    let mut policies = HashMap::with_capacity(entries.len());
    for (id, policy) in entries {
        if policies.contains_key(&id) {
            tracing::warn!(
                policy_id = %id,
                org_id = %policy.org_id,
                "Duplicate policy id, skipping"
            );
            continue;
        }
        policies.insert(id, policy);
    }
    policies
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(org: &str) -> Policy {
        Policy {
            org_id: org.to_string(),
            ..Policy::default()
        }
    }

    #[test]
    fn test_first_seen_wins() {
        let entries = vec![
            ("p1".to_string(), policy("A")),
            ("p1".to_string(), policy("B")),
            ("p2".to_string(), policy("C")),
        ];
        let policies = dedup_policies(entries);
        assert_eq!(policies.len(), 2);
        assert_eq!(policies["p1"].org_id, "A");
    }
}
