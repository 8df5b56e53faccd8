//! Per-API request pipeline.
//!
//! # Data Flow
//! ```text
//! ApiDefinition + collaborators
//!     → builder.rs ChainBuilder::build
//!     → ApiPipeline
//!         CORS → pre hooks → auth (auth check hook | AuthKey) → post-key-auth hooks
//!              → access rights → post hooks → response chain → upstream
//!         + <listen_path>oauth/*, <listen_path>tyk/batch/
//! ```

pub mod batch;
pub mod builder;
pub mod context;
pub mod cors;
pub mod custom;
pub mod hooks;
pub mod oauth;
pub mod proxy;
pub mod response;

use thiserror::Error;

use crate::storage::StorageError;

pub use builder::{ApiPipeline, ChainBuilder, ChainSettings};
pub use context::RequestContext;
pub use hooks::{HookChain, HookError, HookStage, ScriptHook, ScriptRuntime};
pub use oauth::{AuthorizationServer, OAuthServerFactory, OAuthStorage, UnconfiguredOAuth};
pub use proxy::{HyperProxy, UpstreamProxy};
pub use response::{ResponseProcessor, ResponseProcessorRegistry};

/// Reasons an API pipeline cannot be built.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("unknown response processor: {0}")]
    UnknownResponseProcessor(String),

    #[error("invalid options for response processor {name}: {message}")]
    InvalidProcessorOptions { name: String, message: String },

    #[error("API {api_id} declares script hooks but no script runtime is configured")]
    MissingScriptRuntime { api_id: String },

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error("storage for pipeline unavailable: {0}")]
    Storage(#[from] StorageError),
}
