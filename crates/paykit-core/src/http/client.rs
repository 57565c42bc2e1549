//! High-level call glue: endpoint resolution, header assembly, execution
//!
//! `ApiClient` turns a request context plus a service-relative path into a
//! fully configured call on the executor. The token manager uses it for the
//! OAuth exchange; resource layers use it for everything else.

use std::collections::{BTreeMap, HashMap};

use reqwest::{Method, Url};

use crate::config;
use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::http::executor::{Exchange, HttpExecutor};
use crate::user_agent;

/// Header carrying the per-call idempotency key.
pub const REQUEST_ID_HEADER: &str = "PayPal-Request-Id";
pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Client for one configuration, shared across calls.
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: HashMap<String, String>,
    executor: HttpExecutor,
}

impl ApiClient {
    /// Creates a client from caller configuration merged with defaults.
    pub fn new(config: &HashMap<String, String>) -> Result<Self> {
        let config = config::merged_with_defaults(config);
        let executor = HttpExecutor::from_config(&config)?;
        Ok(Self { config, executor })
    }

    /// The merged configuration this client operates with.
    pub fn config(&self) -> &HashMap<String, String> {
        &self.config
    }

    /// Executes a call against the resolved service endpoint and returns the
    /// response body. Configuration carried by the context takes precedence
    /// over the client's own for this call, including endpoint resolution and
    /// executor settings.
    pub async fn configure_and_execute(
        &self,
        context: &RequestContext,
        method: Method,
        path: &str,
        payload: &str,
        endpoint_override: Option<&str>,
    ) -> Result<String> {
        let call_config;
        let call_executor;
        let (config, executor) = if context.config.is_empty() {
            (&self.config, &self.executor)
        } else {
            call_config = config::merged_with_defaults(&context.config);
            call_executor = HttpExecutor::from_config(&call_config)?;
            (&call_config, &call_executor)
        };

        let base = match endpoint_override {
            Some(endpoint) => ensure_trailing_slash(endpoint),
            None => base_endpoint(config)?,
        };
        let base_url = Url::parse(&base).map_err(|e| Error::Config {
            message: format!("invalid endpoint: {base}"),
            source: Some(e.into()),
        })?;
        let url = base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::Config {
                message: format!("invalid resource path: {path}"),
                source: Some(e.into()),
            })?;

        let headers = self.assemble_headers(context);
        let body = (!payload.is_empty()).then_some(payload);
        let exchange: Exchange = executor.execute(method, url.as_str(), &headers, body).await?;
        Ok(exchange.response.body)
    }

    /// Assembles the header set for one call. Context headers override the
    /// defaults, so a caller can swap the content type or supply its own
    /// Authorization value.
    fn assemble_headers(&self, context: &RequestContext) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert("User-Agent".to_string(), user_agent::header_value());
        headers.insert("Content-Type".to_string(), CONTENT_TYPE_JSON.to_string());
        if !context.access_token().is_empty() {
            headers.insert(
                "Authorization".to_string(),
                context.access_token().to_string(),
            );
        }
        if !context.mask_request_id {
            headers.insert(
                REQUEST_ID_HEADER.to_string(),
                context.request_id().to_string(),
            );
        }
        for (name, value) in &context.headers {
            headers.insert(name.clone(), value.clone());
        }
        headers
    }
}

/// Resolves the service base endpoint from a configuration map: explicit
/// `endpoint` override first, then the default host for the configured
/// application mode.
fn base_endpoint(config: &HashMap<String, String>) -> Result<String> {
    if let Some(endpoint) = config.get(config::ENDPOINT) {
        if Url::parse(endpoint).is_err() {
            return Err(Error::Config {
                message: format!("malformed endpoint in configuration: {endpoint}"),
                source: None,
            });
        }
        return Ok(ensure_trailing_slash(endpoint));
    }
    if config::is_live_mode(config) {
        Ok(config::LIVE_ENDPOINT.to_string())
    } else {
        Ok(config::SANDBOX_ENDPOINT.to_string())
    }
}

/// Normalizes an endpoint to end with exactly one trailing slash.
pub fn ensure_trailing_slash(endpoint: &str) -> String {
    format!("{}/", endpoint.trim_end_matches('/'))
}
