//! API definition records as served by files, the dashboard and RPC peers.

use serde::{Deserialize, Serialize};

/// Default header carrying the API key.
pub const DEFAULT_AUTH_HEADER: &str = "Authorization";

/// One managed API.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiDefinition {
    pub name: String,
    pub api_id: String,
    pub org_id: String,
    pub active: bool,
    pub use_keyless: bool,
    /// Virtual host; empty matches any host.
    pub domain: String,
    pub proxy: ProxySettings,
    pub auth: AuthSettings,
    pub use_oauth2: bool,
    pub oauth_meta: OAuthMeta,
    pub enable_batch_request_support: bool,
    #[serde(rename = "CORS", alias = "cors")]
    pub cors: CorsSettings,
    pub custom_middleware: CustomMiddleware,
    pub response_processors: Vec<ResponseProcessorDef>,
    pub enable_context_vars: bool,
    pub base_identity_provided_by: BaseIdentity,
    pub auth_provider: AuthProviderMeta,
    pub session_provider: SessionProviderMeta,
}

impl Default for ApiDefinition {
    fn default() -> Self {
        Self {
            name: String::new(),
            api_id: String::new(),
            org_id: String::new(),
            active: true,
            use_keyless: false,
            domain: String::new(),
            proxy: ProxySettings::default(),
            auth: AuthSettings::default(),
            use_oauth2: false,
            oauth_meta: OAuthMeta::default(),
            enable_batch_request_support: false,
            cors: CorsSettings::default(),
            custom_middleware: CustomMiddleware::default(),
            response_processors: Vec::new(),
            enable_context_vars: false,
            base_identity_provided_by: BaseIdentity::Unset,
            auth_provider: AuthProviderMeta::default(),
            session_provider: SessionProviderMeta::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxySettings {
    /// Request path prefix owned by this API.
    pub listen_path: String,
    /// Upstream base URL.
    pub target_url: String,
    /// Remove the listen path before forwarding upstream.
    pub strip_listen_path: bool,
}

/// Where the API key is looked up on a request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthSettings {
    pub auth_header_name: String,
    pub use_param: bool,
    pub param_name: String,
    pub use_cookie: bool,
    pub cookie_name: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            auth_header_name: DEFAULT_AUTH_HEADER.to_string(),
            use_param: false,
            param_name: String::new(),
            use_cookie: false,
            cookie_name: String::new(),
        }
    }
}

impl AuthSettings {
    /// Header name, falling back to `Authorization` when unset.
    pub fn header_name(&self) -> &str {
        if self.auth_header_name.is_empty() {
            DEFAULT_AUTH_HEADER
        } else {
            &self.auth_header_name
        }
    }

    /// Query/form parameter name when parameter lookup is enabled.
    pub fn param_lookup(&self) -> Option<&str> {
        if !self.use_param && self.param_name.is_empty() {
            return None;
        }
        Some(if self.param_name.is_empty() {
            self.header_name()
        } else {
            &self.param_name
        })
    }

    /// Cookie name when cookie lookup is enabled.
    pub fn cookie_lookup(&self) -> Option<&str> {
        if !self.use_cookie && self.cookie_name.is_empty() {
            return None;
        }
        Some(if self.cookie_name.is_empty() {
            self.header_name()
        } else {
            &self.cookie_name
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct OAuthMeta {
    pub allowed_access_types: Vec<String>,
    pub allowed_authorize_types: Vec<String>,
    pub auth_login_redirect: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CorsSettings {
    pub enable: bool,
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub exposed_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age: u64,
    pub options_passthrough: bool,
    pub debug: bool,
}

/// One custom script hook.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct MiddlewareDescriptor {
    pub name: String,
    pub path: String,
    pub require_session: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CustomMiddleware {
    pub pre: Vec<MiddlewareDescriptor>,
    pub post: Vec<MiddlewareDescriptor>,
    pub post_key_auth: Vec<MiddlewareDescriptor>,
    pub auth_check: MiddlewareDescriptor,
    pub driver: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ResponseProcessorDef {
    pub name: String,
    pub options: serde_json::Value,
}

/// Which auth mechanism establishes the session identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BaseIdentity {
    #[default]
    #[serde(rename = "")]
    Unset,
    AuthToken,
    HmacKey,
    BasicAuthUser,
    JwtClaim,
    OidcUser,
    OauthKey,
    CustomAuth,
}

/// Storage engine backing a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
pub enum StorageEngine {
    #[default]
    #[serde(rename = "local", alias = "", alias = "redis")]
    Local,
    #[serde(rename = "rpc")]
    Rpc,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct AuthProviderMeta {
    pub name: String,
    pub storage_engine: StorageEngine,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct SessionProviderMeta {
    pub name: String,
    pub storage_engine: StorageEngine,
}

/// Wrapper used by dashboard and RPC payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiDefinitionEnvelope {
    pub api_definition: ApiDefinition,
}
