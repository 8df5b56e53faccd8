//! File-backed configuration source (standalone mode).

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;

use crate::apidef::{ApiDefinition, Policy};
use crate::config::GatewayConfig;
use crate::sources::{ConfigSource, SourceError};

/// Policy object read in document order, duplicate keys included.
struct OrderedPolicies(Vec<(String, Policy)>);

impl<'de> Deserialize<'de> for OrderedPolicies {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = OrderedPolicies;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping policy ids to policies")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((id, policy)) = map.next_entry::<String, Policy>()? {
                    entries.push((id, policy));
                }
                Ok(OrderedPolicies(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

/// Parse a policy file body, keeping every entry in document order.
pub fn parse_policies(raw: &str) -> Result<Vec<(String, Policy)>, SourceError> {
    serde_json::from_str::<OrderedPolicies>(raw)
        .map(|ordered| ordered.0)
        .map_err(|source| SourceError::Decode {
            what: "policy file",
            source,
        })
}

pub struct FileSource {
    app_path: PathBuf,
    policy_path: Option<PathBuf>,
}

impl FileSource {
    pub fn new(app_path: impl Into<PathBuf>, policy_path: Option<PathBuf>) -> Self {
        Self {
            app_path: app_path.into(),
            policy_path,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        let policy_path = Some(config.policies.policy_record_name.as_str())
            .filter(|name| !name.is_empty())
            .map(PathBuf::from);
        Self::new(&config.app_path, policy_path)
    }

    async fn definition_files(&self) -> Result<Vec<PathBuf>, SourceError> {
        let io_err = |source| SourceError::Io {
            path: self.app_path.display().to_string(),
            source,
        };
        let mut entries = tokio::fs::read_dir(&self.app_path).await.map_err(io_err)?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    async fn read_definition(path: &Path) -> Result<ApiDefinition, SourceError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|source| SourceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| SourceError::Decode {
            what: "API definition",
            source,
        })
    }
}

#[async_trait]
impl ConfigSource for FileSource {
    async fn load_api_definitions(&self) -> Option<Vec<ApiDefinition>> {
        let files = match self.definition_files().await {
            Ok(files) => files,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list API definitions");
                return None;
            }
        };

        let mut definitions = Vec::with_capacity(files.len());
        for path in files {
            match Self::read_definition(&path).await {
                Ok(definition) => {
                    tracing::debug!(
                        path = %path.display(),
                        api_id = %definition.api_id,
                        "Loaded API definition"
                    );
                    definitions.push(definition);
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Skipping API definition")
                }
            }
        }
        Some(definitions)
    }

    async fn load_policies(&self) -> Option<Vec<(String, Policy)>> {
        let Some(path) = &self.policy_path else {
            return Some(Vec::new());
        };
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to read policy file");
                return None;
            }
        };
        match parse_policies(&raw) {
            Ok(policies) => Some(policies),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to parse policy file");
                None
            }
        }
    }
}
