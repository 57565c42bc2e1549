//! PayKit Core Library
//!
//! Resilient, authenticated access to the PayPal REST APIs: OAuth
//! client-credentials token management with caching, an HTTP executor with
//! bounded retry of transient failures, certificate chain validation pinned
//! to a trusted issuer and domain, and per-call request contexts.
//!
//! # Example
//!
//! ```no_run
//! use std::collections::HashMap;
//! use paykit_core::auth::TokenManager;
//!
//! # async fn run() -> paykit_core::Result<()> {
//! let config = HashMap::from([
//!     ("clientId".to_string(), "my-client-id".to_string()),
//!     ("clientSecret".to_string(), "my-client-secret".to_string()),
//! ]);
//! let manager = TokenManager::from_config(&config)?;
//! let bearer = manager.get_access_token().await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cert;
pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod uri;
pub mod user_agent;

pub use auth::TokenManager;
pub use cert::{certificates_from_url, trusted_root, validate_chain, Certificate};
pub use context::RequestContext;
pub use error::{
    decode_error_body, DecodedErrorBody, Error, FieldIssue, IdentityErrorDetails,
    PaymentsErrorDetails, Result,
};
pub use http::{ApiClient, Exchange, HttpExecutor, Method, RetryPolicy, StatusCode};
pub use uri::format_uri_path;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_public_error_surface() {
        let err = Error::MissingCredential {
            message: "clientId is empty".to_string(),
        };
        assert!(err.to_string().contains("clientId"));
    }
}
