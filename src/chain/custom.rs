//! Custom middleware descriptor resolution.
//!
//! Hooks come from two places: the API definition, and script files found
//! under `<middleware_path>/<api_id>/{pre,auth,post_auth,post}`. Declared
//! hooks run first, discovered ones are appended in file name order.

use std::path::{Path, PathBuf};

use crate::apidef::{ApiDefinition, MiddlewareDescriptor};

/// File name marker for hooks that need the session.
pub const SESSION_MARKER: &str = "_with_session";
const SCRIPT_EXTENSION: &str = "js";

/// Hooks of every stage for one API.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedMiddleware {
    pub pre: Vec<MiddlewareDescriptor>,
    pub auth_check: Option<MiddlewareDescriptor>,
    pub post_key_auth: Vec<MiddlewareDescriptor>,
    pub post: Vec<MiddlewareDescriptor>,
}

impl ResolvedMiddleware {
    pub fn is_empty(&self) -> bool {
        self.pre.is_empty()
            && self.auth_check.is_none()
            && self.post_key_auth.is_empty()
            && self.post.is_empty()
    }
}

/// Merge declared and discovered hooks for `api`.
pub fn resolve_middleware(api: &ApiDefinition, middleware_path: &str) -> ResolvedMiddleware {
    let declared = &api.custom_middleware;
    let base = (!middleware_path.is_empty()).then(|| Path::new(middleware_path).join(&api.api_id));
    let discover = |folder: &str| {
        base.as_ref()
            .map(|base| discover_scripts(&base.join(folder)))
            .unwrap_or_default()
    };

    let auth_check = if !declared.auth_check.name.is_empty() {
        Some(declared.auth_check.clone())
    } else {
        let found = discover("auth");
        if found.len() > 1 {
            tracing::warn!(
                api_id = %api.api_id,
                using = %found[0].name,
                "Only one auth check hook is permitted, ignoring the rest"
            );
        }
        found.into_iter().next()
    };

    let merge = |declared: &[MiddlewareDescriptor], folder: &str| {
        let mut hooks = declared.to_vec();
        hooks.extend(discover(folder));
        hooks
    };

    ResolvedMiddleware {
        pre: merge(&declared.pre, "pre"),
        auth_check,
        post_key_auth: merge(&declared.post_key_auth, "post_auth"),
        post: merge(&declared.post, "post"),
    }
}

/// Script files in `dir`, sorted by file name. A missing directory is empty.
pub fn discover_scripts(dir: &Path) -> Vec<MiddlewareDescriptor> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file() && path.extension().is_some_and(|ext| ext == SCRIPT_EXTENSION)
        })
        .collect();
    files.sort();

    files
        .into_iter()
        .filter_map(|path| {
            let file_name = path.file_name()?.to_str()?;
            let name = file_name.split('.').next().unwrap_or(file_name).to_string();
            tracing::debug!(path = %path.display(), hook = %name, "Discovered script hook");
            Some(MiddlewareDescriptor {
                require_session: name.contains(SESSION_MARKER),
                name,
                path: path.display().to_string(),
            })
        })
        .collect()
}
