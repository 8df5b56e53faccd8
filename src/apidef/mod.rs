//! Data model shared by loaders, the chain builder and the control API.

pub mod definition;
pub mod policy;
pub mod session;

pub use definition::{
    ApiDefinition, ApiDefinitionEnvelope, AuthProviderMeta, AuthSettings, BaseIdentity,
    CorsSettings, CustomMiddleware, MiddlewareDescriptor, OAuthMeta, ProxySettings,
    ResponseProcessorDef, SessionProviderMeta, StorageEngine, DEFAULT_AUTH_HEADER,
};
pub use policy::{AccessDefinition, AccessSpec, Policy};
pub use session::SessionState;
