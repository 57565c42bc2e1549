//! Per-call request context
//!
//! A `RequestContext` carries the access token, idempotency key, extra
//! headers, and configuration for one outbound call. It is created per call
//! and owned by the caller; it is not shared across concurrent calls unless
//! explicitly reused.

use std::collections::{BTreeMap, HashMap};

use uuid::Uuid;

use crate::error::{Error, Result};

/// Value object passed into the executor and token manager for one call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    access_token: String,
    request_id: String,
    /// When set, the idempotency header is omitted from the request.
    pub mask_request_id: bool,
    /// Extra headers for this call; these override the assembled defaults.
    pub headers: BTreeMap<String, String>,
    /// Configuration for this call, merged with defaults at execution time.
    pub config: HashMap<String, String>,
}

impl RequestContext {
    /// Creates a context holding the given OAuth access token.
    pub fn new(access_token: impl Into<String>) -> Result<Self> {
        let access_token = access_token.into();
        if access_token.is_empty() {
            return Err(Error::Config {
                message: "access token cannot be empty".to_string(),
                source: None,
            });
        }
        Ok(Self {
            access_token,
            ..Self::unauthenticated()
        })
    }

    /// Creates a context with an explicit idempotency key.
    pub fn with_request_id(
        access_token: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Result<Self> {
        let request_id = request_id.into();
        if request_id.is_empty() {
            return Err(Error::Config {
                message: "request id cannot be empty".to_string(),
                source: None,
            });
        }
        let mut context = Self::new(access_token)?;
        context.request_id = request_id;
        Ok(context)
    }

    /// Creates a context without an access token, used for calls that carry
    /// their own authorization header (the OAuth token exchange).
    pub fn unauthenticated() -> Self {
        Self {
            access_token: String::new(),
            request_id: Uuid::new_v4().to_string(),
            mask_request_id: false,
            headers: BTreeMap::new(),
            config: HashMap::new(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// The idempotency key sent as the `PayPal-Request-Id` header.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Regenerates the idempotency key. The new value always differs from
    /// the previous one.
    pub fn reset_request_id(&mut self) {
        self.request_id = Uuid::new_v4().to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_access_token_rejected() {
        assert!(matches!(
            RequestContext::new(""),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_request_ids_are_valid_and_unique() {
        let a = RequestContext::new("Bearer abc").unwrap();
        let b = RequestContext::new("Bearer abc").unwrap();
        assert!(Uuid::parse_str(a.request_id()).is_ok());
        assert!(Uuid::parse_str(b.request_id()).is_ok());
        assert_ne!(a.request_id(), b.request_id());
    }

    #[test]
    fn test_reset_produces_a_different_key() {
        let mut context = RequestContext::new("Bearer abc").unwrap();
        let before = context.request_id().to_string();
        context.reset_request_id();
        assert_ne!(context.request_id(), before);
        assert!(Uuid::parse_str(context.request_id()).is_ok());
    }

    #[test]
    fn test_explicit_request_id() {
        let context = RequestContext::with_request_id("Bearer abc", "my-key-1").unwrap();
        assert_eq!(context.request_id(), "my-key-1");
        assert!(RequestContext::with_request_id("Bearer abc", "").is_err());
    }
}
