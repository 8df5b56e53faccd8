//! Caller identity resolution.
//!
//! # Data Flow
//! ```text
//! request
//!     → extract.rs (header → param → cookie, Bearer stripped)
//!     → key.rs AuthKey (SessionManager lookup)
//!     → RequestContext { session, token, vars["token"] }
//!     → access.rs (inactive / expired / access rights incl. policies)
//! ```

pub mod access;
pub mod extract;
pub mod key;
pub mod session;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::http::response::error_response;
use crate::storage::StorageError;

pub use access::{access_middleware, AccessCheck};
pub use extract::{extract_credential, strip_bearer};
pub use key::{auth_key_middleware, AuthKey};
pub use session::{SessionManager, ORG_SESSION_PREFIX, SESSION_PREFIX};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authorization field missing")]
    Missing,

    #[error("Key not authorised")]
    NotAuthorised,

    #[error("Key has expired, please renew")]
    Expired,

    #[error("Key is inactive, please renew")]
    Inactive,

    #[error("Access to this API has been disallowed")]
    AccessDenied,

    #[error("session store unavailable: {0}")]
    Storage(#[from] StorageError),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Missing | AuthError::Expired => StatusCode::UNAUTHORIZED,
            AuthError::NotAuthorised | AuthError::Inactive | AuthError::AccessDenied => {
                StatusCode::FORBIDDEN
            }
            AuthError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match &self {
            AuthError::Storage(_) => "Session store unavailable".to_string(),
            other => other.to_string(),
        };
        error_response(self.status(), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AuthError::Missing.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::NotAuthorised.status(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::NotAuthorised.to_string(), "Key not authorised");
        assert_eq!(
            AuthError::Storage(StorageError::Unavailable("down".into())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
