//! Policy and access-right records.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Rate/quota/access template attachable to sessions.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct Policy {
    pub id: String,
    /// Record id assigned by the control plane.
    #[serde(rename = "_id")]
    pub mid: String,
    pub org_id: String,
    pub rate: f64,
    pub per: f64,
    pub quota_max: i64,
    pub quota_renewal_rate: i64,
    pub access_rights: HashMap<String, AccessDefinition>,
    pub active: bool,
    pub tags: Vec<String>,
    pub key_expires_in: i64,
}

impl Policy {
    /// True when this policy grants access to `api_id`.
    pub fn grants(&self, api_id: &str) -> bool {
        self.access_rights.contains_key(api_id)
    }

    /// Id under which a control-plane record is stored: the record id,
    /// unless explicit ids are allowed and one is set.
    pub fn resolved_id(&self, allow_explicit_id: bool) -> &str {
        if allow_explicit_id && !self.id.is_empty() {
            &self.id
        } else {
            &self.mid
        }
    }
}

/// Access granted to one API.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AccessDefinition {
    pub api_name: String,
    pub api_id: String,
    pub versions: Vec<String>,
    pub allowed_urls: Vec<AccessSpec>,
}

/// URL pattern (regular expression text) and permitted methods.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AccessSpec {
    pub url: String,
    pub methods: Vec<String>,
}
