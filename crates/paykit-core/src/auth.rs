//! OAuth client-credentials token management
//!
//! A `TokenManager` owns one cached bearer token per client-id/secret pair
//! and decides when to reuse it versus exchanging credentials for a fresh
//! one. The check-then-regenerate sequence runs under a mutex so concurrent
//! callers never trigger redundant regeneration or observe a half-updated
//! cache entry.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::{Method, Url};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config;
use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::http::client::{ensure_trailing_slash, ApiClient, CONTENT_TYPE_FORM_URLENCODED};

/// Service path for the OAuth token exchange.
pub const OAUTH_TOKEN_PATH: &str = "v1/oauth2/token";

const GRANT_TYPE_CLIENT_CREDENTIALS: &str = "grant_type=client_credentials";

/// Default safety gap subtracted from a token's lifetime before reuse.
pub const DEFAULT_SAFETY_GAP_SECONDS: i64 = 120;

/// Success payload of the token exchange.
#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    token_type: String,
    access_token: String,
    #[serde(default)]
    app_id: Option<String>,
    expires_in: i64,
}

/// A bearer token issued by a successful exchange, plus the bookkeeping
/// needed to decide reuse. Never partially constructed: either a whole entry
/// exists in the cache or none does.
#[derive(Debug, Clone)]
pub(crate) struct CachedToken {
    pub(crate) bearer: String,
    pub(crate) app_id: Option<String>,
    pub(crate) issued_at: DateTime<Utc>,
    pub(crate) expires_in: i64,
    pub(crate) safety_gap: i64,
}

impl CachedToken {
    /// Reuse is permitted while the elapsed time stays within the token's
    /// lifetime less the safety gap.
    pub(crate) fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        let elapsed = (now - self.issued_at).num_seconds();
        elapsed <= self.expires_in - self.safety_gap
    }
}

/// Acquires and caches one bearer token per credential pair.
pub struct TokenManager {
    client_id: String,
    client_secret: String,
    safety_gap: i64,
    client: ApiClient,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenManager {
    /// Creates a manager with explicit credentials. Empty values fall back
    /// to the `clientId`/`clientSecret` configuration keys.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        config: &HashMap<String, String>,
    ) -> Result<Self> {
        let mut config = config::merged_with_defaults(config);

        let client_id = {
            let explicit = client_id.into();
            if explicit.is_empty() {
                config.get(config::CLIENT_ID).cloned().unwrap_or_default()
            } else {
                config.insert(config::CLIENT_ID.to_string(), explicit.clone());
                explicit
            }
        };
        let client_secret = {
            let explicit = client_secret.into();
            if explicit.is_empty() {
                config
                    .get(config::CLIENT_SECRET)
                    .cloned()
                    .unwrap_or_default()
            } else {
                config.insert(config::CLIENT_SECRET.to_string(), explicit.clone());
                explicit
            }
        };

        let client = ApiClient::new(&config)?;
        Ok(Self {
            client_id,
            client_secret,
            safety_gap: DEFAULT_SAFETY_GAP_SECONDS,
            client,
            cached: Mutex::new(None),
        })
    }

    /// Creates a manager reading credentials from configuration.
    pub fn from_config(config: &HashMap<String, String>) -> Result<Self> {
        Self::new("", "", config)
    }

    /// Overrides the expiration safety gap, in seconds.
    pub fn with_safety_gap(mut self, seconds: i64) -> Self {
        self.safety_gap = seconds;
        self
    }

    /// Returns the cached bearer token, exchanging credentials for a new one
    /// when none is cached or the cached token has aged past
    /// `expires_in - safety_gap`.
    pub async fn get_access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.bearer.clone());
            }
            log::debug!("cached access token aged out, regenerating");
            *cached = None;
        }

        let token = self.regenerate().await?;
        let bearer = token.bearer.clone();
        *cached = Some(token);
        Ok(bearer)
    }

    /// The application id returned by the last successful exchange, if any.
    pub async fn application_id(&self) -> Option<String> {
        self.cached.lock().await.as_ref().and_then(|t| t.app_id.clone())
    }

    /// Exchanges client credentials for a fresh bearer token.
    async fn regenerate(&self) -> Result<CachedToken> {
        if self.client_id.is_empty() {
            return Err(Error::MissingCredential {
                message: "clientId is empty".to_string(),
            });
        }
        if self.client_secret.is_empty() {
            return Err(Error::MissingCredential {
                message: "clientSecret is empty".to_string(),
            });
        }

        let basic = BASE64.encode(format!("{}:{}", self.client_id, self.client_secret));
        let mut context = RequestContext::unauthenticated();
        context.config = self.client.config().clone();
        context.headers.insert(
            "Content-Type".to_string(),
            CONTENT_TYPE_FORM_URLENCODED.to_string(),
        );
        context
            .headers
            .insert("Authorization".to_string(), format!("Basic {basic}"));

        let endpoint = self.endpoint_override()?;
        let body = self
            .client
            .configure_and_execute(
                &context,
                Method::POST,
                OAUTH_TOKEN_PATH,
                GRANT_TYPE_CLIENT_CREDENTIALS,
                endpoint.as_deref(),
            )
            .await
            .map_err(Error::refine)?;

        let response: TokenResponse = serde_json::from_str(&body)?;
        Ok(CachedToken {
            bearer: format!("{} {}", response.token_type, response.access_token),
            app_id: response.app_id,
            issued_at: Utc::now(),
            expires_in: response.expires_in,
            safety_gap: self.safety_gap,
        })
    }

    /// The OAuth endpoint override from configuration, normalized to end
    /// with a single trailing slash.
    fn endpoint_override(&self) -> Result<Option<String>> {
        match self.client.config().get(config::OAUTH_ENDPOINT) {
            Some(endpoint) => {
                if Url::parse(endpoint).is_err() {
                    return Err(Error::Config {
                        message: format!("malformed {} value: {endpoint}", config::OAUTH_ENDPOINT),
                        source: None,
                    });
                }
                Ok(Some(ensure_trailing_slash(endpoint)))
            }
            None => Ok(None),
        }
    }

    #[cfg(test)]
    pub(crate) async fn install_cached(&self, token: CachedToken) {
        *self.cached.lock().await = Some(token);
    }
}
