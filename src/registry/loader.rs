//! Turn raw source output into the definitions a snapshot is built from.

use std::collections::HashSet;
use std::sync::Arc;

use crate::apidef::ApiDefinition;
use crate::config::AuthOverrideConfig;
use crate::sources::ConfigSource;

/// Listen path with exactly one leading and one trailing slash.
pub fn normalize_listen_path(listen_path: &str) -> String {
    let trimmed = listen_path.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}

/// Apply provider overrides, normalize, drop duplicate ids (first wins) and
/// inactive definitions.
pub fn prepare_specs(
    specs: Vec<ApiDefinition>,
    overrides: &AuthOverrideConfig,
) -> Vec<ApiDefinition> {
    let mut seen = HashSet::new();
    let mut prepared = Vec::with_capacity(specs.len());

    for mut spec in specs {
        if overrides.force_auth_provider {
            spec.auth_provider = overrides.auth_provider.clone();
        }
        if overrides.force_session_provider {
            spec.session_provider = overrides.session_provider.clone();
        }
        spec.proxy.listen_path = normalize_listen_path(&spec.proxy.listen_path);

        if !seen.insert(spec.api_id.clone()) {
            tracing::warn!(
                api_id = %spec.api_id,
                name = %spec.name,
                "Duplicate API ID, skipping definition"
            );
            continue;
        }
        if !spec.active {
            tracing::debug!(api_id = %spec.api_id, "API is inactive, skipping");
            continue;
        }
        prepared.push(spec);
    }
    prepared
}

/// Loads definitions from the deployment's API source.
#[derive(Clone)]
pub struct SpecLoader {
    source: Arc<dyn ConfigSource>,
    overrides: AuthOverrideConfig,
}

impl SpecLoader {
    pub fn new(source: Arc<dyn ConfigSource>, overrides: AuthOverrideConfig) -> Self {
        Self { source, overrides }
    }

    /// `None` when the source is unavailable or produced nothing usable.
    pub async fn load(&self) -> Option<Vec<ApiDefinition>> {
        let raw = self.source.load_api_definitions().await?;
        let specs = prepare_specs(raw, &self.overrides);
        if specs.is_empty() {
            tracing::warn!("No API definitions found, keeping current configuration");
            return None;
        }
        tracing::info!(count = specs.len(), "Loaded API definitions");
        Some(specs)
    }
}
