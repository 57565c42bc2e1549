//! Configuration keys, built-in defaults, and typed accessors
//!
//! Configuration is a plain string-to-string map supplied by the caller;
//! a process-wide default set is merged in for any missing key.

use std::collections::HashMap;
use std::time::Duration;

use once_cell::sync::Lazy;

use crate::error::{Error, Result};

/// Configuration key for the OAuth client id.
pub const CLIENT_ID: &str = "clientId";
/// Configuration key for the OAuth client secret.
pub const CLIENT_SECRET: &str = "clientSecret";
/// Configuration key overriding the OAuth token endpoint.
pub const OAUTH_ENDPOINT: &str = "oauth.EndPoint";
/// Configuration key overriding the REST service endpoint.
pub const ENDPOINT: &str = "endpoint";
/// Configuration key for the number of HTTP connection retries.
pub const HTTP_CONNECTION_RETRY: &str = "requestRetries";
/// Configuration key for the HTTP connection timeout in milliseconds.
pub const HTTP_CONNECTION_TIMEOUT: &str = "connectionTimeout";
/// Configuration key selecting the application mode (`sandbox` or `live`).
pub const APPLICATION_MODE: &str = "mode";
/// Configuration key pointing at a trusted certificate file.
pub const TRUSTED_CERTIFICATE_LOCATION: &str = "trustedCertificateLocation";

pub const SANDBOX_MODE: &str = "sandbox";
pub const LIVE_MODE: &str = "live";

pub const SANDBOX_ENDPOINT: &str = "https://api.sandbox.paypal.com/";
pub const LIVE_ENDPOINT: &str = "https://api.paypal.com/";

pub const DEFAULT_HTTP_CONNECTION_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_HTTP_CONNECTION_RETRY: u32 = 3;

static DEFAULT_CONFIG: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (HTTP_CONNECTION_TIMEOUT, "30000"),
        (HTTP_CONNECTION_RETRY, "3"),
        (APPLICATION_MODE, SANDBOX_MODE),
    ])
});

/// Combines the caller-supplied configuration with the built-in defaults.
/// Caller values always win; defaults only fill missing keys.
pub fn merged_with_defaults(config: &HashMap<String, String>) -> HashMap<String, String> {
    let mut merged = config.clone();
    for (key, value) in DEFAULT_CONFIG.iter() {
        merged
            .entry((*key).to_string())
            .or_insert_with(|| (*value).to_string());
    }
    merged
}

/// Gets the built-in default value for the specified key, if one exists.
pub fn default_value(key: &str) -> Option<&'static str> {
    DEFAULT_CONFIG.get(key).copied()
}

/// Returns whether live mode is enabled in the given configuration.
pub fn is_live_mode(config: &HashMap<String, String>) -> bool {
    config
        .get(APPLICATION_MODE)
        .is_some_and(|mode| mode == LIVE_MODE)
}

/// Resolves the configured retry count, falling back to the default when the
/// key is absent.
pub fn retry_limit(config: &HashMap<String, String>) -> Result<u32> {
    match config.get(HTTP_CONNECTION_RETRY) {
        Some(raw) => raw.parse::<u32>().map_err(|e| Error::Config {
            message: format!("invalid {HTTP_CONNECTION_RETRY} value: {raw:?}"),
            source: Some(e.into()),
        }),
        None => Ok(DEFAULT_HTTP_CONNECTION_RETRY),
    }
}

/// Resolves the configured per-attempt connection timeout, falling back to
/// the default when the key is absent.
pub fn connection_timeout(config: &HashMap<String, String>) -> Result<Duration> {
    match config.get(HTTP_CONNECTION_TIMEOUT) {
        Some(raw) => raw
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| Error::Config {
                message: format!("invalid {HTTP_CONNECTION_TIMEOUT} value: {raw:?}"),
                source: Some(e.into()),
            }),
        None => Ok(Duration::from_millis(DEFAULT_HTTP_CONNECTION_TIMEOUT_MS)),
    }
}
