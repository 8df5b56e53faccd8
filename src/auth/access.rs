//! Session checks for keyed APIs: active, unexpired, and granted this API.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::apidef::SessionState;
use crate::auth::AuthError;
use crate::chain::context::RequestContext;
use crate::policy::PolicyMap;

#[derive(Clone)]
pub struct AccessCheck {
    api_id: Arc<str>,
    policies: Arc<PolicyMap>,
}

impl AccessCheck {
    pub fn new(api_id: &str, policies: Arc<PolicyMap>) -> Self {
        Self {
            api_id: api_id.into(),
            policies,
        }
    }

    /// APIs granted by the session itself plus its applied policies.
    fn granted_apis<'a>(
        &'a self,
        session: &'a SessionState,
    ) -> Result<HashSet<&'a str>, AuthError> {
        let mut granted: HashSet<&str> = session.access_rights.keys().map(String::as_str).collect();
        for policy_id in &session.apply_policies {
            let Some(policy) = self.policies.get(policy_id) else {
                tracing::warn!(
                    api_id = %self.api_id,
                    policy_id = %policy_id,
                    "Session references unknown policy"
                );
                return Err(AuthError::NotAuthorised);
            };
            granted.extend(policy.access_rights.keys().map(String::as_str));
        }
        Ok(granted)
    }

    pub fn check(&self, session: &SessionState, now_unix: i64) -> Result<(), AuthError> {
        if session.is_inactive {
            return Err(AuthError::Inactive);
        }
        if session.is_expired(now_unix) {
            return Err(AuthError::Expired);
        }
        let granted = self.granted_apis(session)?;
        // No access rights at all means unrestricted.
        if !granted.is_empty() && !granted.contains(self.api_id.as_ref()) {
            tracing::info!(api_id = %self.api_id, "Session not granted access to API");
            return Err(AuthError::AccessDenied);
        }
        Ok(())
    }
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

pub async fn access_middleware(
    State(check): State<AccessCheck>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(session) = request
        .extensions()
        .get::<RequestContext>()
        .and_then(|ctx| ctx.session.as_ref())
    else {
        return AuthError::NotAuthorised.into_response();
    };
    if let Err(e) = check.check(session, now_unix()) {
        return e.into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apidef::{AccessDefinition, Policy};

    fn rights(api_ids: &[&str]) -> std::collections::HashMap<String, AccessDefinition> {
        api_ids
            .iter()
            .map(|id| {
                let access = AccessDefinition {
                    api_id: id.to_string(),
                    ..AccessDefinition::default()
                };
                (id.to_string(), access)
            })
            .collect()
    }

    fn policies() -> Arc<PolicyMap> {
        let gold = Policy {
            id: "gold".into(),
            access_rights: rights(&["api1"]),
            ..Policy::default()
        };
        Arc::new([("gold".to_string(), gold)].into_iter().collect())
    }

    #[test]
    fn test_unrestricted_session() {
        let check = AccessCheck::new("api1", policies());
        assert!(check.check(&SessionState::default(), 100).is_ok());
    }

    #[test]
    fn test_rights_from_session_and_policy() {
        let check = AccessCheck::new("api1", policies());
        let own = SessionState {
            access_rights: rights(&["api2"]),
            ..SessionState::default()
        };
        assert!(matches!(check.check(&own, 100), Err(AuthError::AccessDenied)));

        let via_policy = SessionState {
            access_rights: rights(&["api2"]),
            apply_policies: vec!["gold".into()],
            ..SessionState::default()
        };
        assert!(check.check(&via_policy, 100).is_ok());

        let unknown = SessionState {
            apply_policies: vec!["platinum".into()],
            ..SessionState::default()
        };
        assert!(matches!(check.check(&unknown, 100), Err(AuthError::NotAuthorised)));
    }

    #[test]
    fn test_inactive_and_expired() {
        let check = AccessCheck::new("api1", policies());
        let inactive = SessionState { is_inactive: true, ..SessionState::default() };
        assert!(matches!(check.check(&inactive, 100), Err(AuthError::Inactive)));
        let expired = SessionState { expires: 50, ..SessionState::default() };
        assert!(matches!(check.check(&expired, 100), Err(AuthError::Expired)));
    }
}
