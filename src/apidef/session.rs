//! Session state stored per API key.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::apidef::policy::AccessDefinition;

/// Resolved caller identity.
///
/// Quota and rate counters are maintained by the quota subsystem; the
/// gateway core only reads and persists them.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct SessionState {
    pub org_id: String,
    pub rate: f64,
    pub per: f64,
    pub quota_max: i64,
    pub quota_remaining: i64,
    pub quota_renews: i64,
    pub quota_renewal_rate: i64,
    /// Unix timestamp; zero or negative never expires.
    pub expires: i64,
    pub access_rights: HashMap<String, AccessDefinition>,
    pub apply_policies: Vec<String>,
    pub meta_data: serde_json::Map<String, serde_json::Value>,
    pub tags: Vec<String>,
    pub alias: String,
    pub is_inactive: bool,
}

impl SessionState {
    /// True when the session carries an expiry in the past.
    pub fn is_expired(&self, now_unix: i64) -> bool {
        self.expires > 0 && self.expires < now_unix
    }
}
