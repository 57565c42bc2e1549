//! HTTP executor: one logical call with bounded retry
//!
//! Sends a single logical request, retrying transient network/server
//! failures up to the configured limit, and classifies everything else into
//! the typed error taxonomy.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use reqwest::{Client as ReqwestClient, Method, Url};

use crate::config;
use crate::error::{Error, Result};
use crate::http::error::{classify_status, classify_transport_error, FailureClass};
use crate::http::retry::{RetryDecision, RetryHandler, RetryPolicy};

/// Headers that are regenerated per underlying connection and therefore not
/// copied onto the fresh request built for a retry attempt.
pub const RETRY_EXCLUDED_HEADERS: &[&str] = &[
    "accept",
    "connection",
    "content-length",
    "content-type",
    "date",
    "expect",
    "host",
    "if-modified-since",
    "range",
    "referer",
    "transfer-encoding",
    "user-agent",
    "proxy-connection",
];

/// Per-call record of the request as sent, including retries consumed.
/// Reset at the start of every logical call and owned by that invocation.
#[derive(Debug, Clone, Default)]
pub struct RequestDetails {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub retry_attempts: u32,
}

/// Per-call record of the terminal response.
#[derive(Debug, Clone, Default)]
pub struct ResponseDetails {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

/// A completed request/response exchange.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub request: RequestDetails,
    pub response: ResponseDetails,
}

/// Copies caller headers onto a retry attempt, skipping the
/// connection-scoped set. Method, Accept, and Content-Type are re-applied by
/// the executor itself, mirroring how a fresh connection is configured.
pub fn retained_for_retry(headers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter(|(name, _)| !RETRY_EXCLUDED_HEADERS.contains(&name.to_lowercase().as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Executes outbound HTTP calls with bounded retry.
///
/// The executor itself holds no per-call state; every invocation of
/// [`HttpExecutor::execute`] owns its own request/response tracking, so one
/// instance is safe to share across concurrent calls.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: ReqwestClient,
    timeout: Duration,
    policy: RetryPolicy,
}

impl HttpExecutor {
    /// Builds an executor from configuration (timeout and retry count).
    pub fn from_config(config: &HashMap<String, String>) -> Result<Self> {
        let timeout = config::connection_timeout(config)?;
        let policy = RetryPolicy::from_config(config)?;
        Self::new(timeout, policy)
    }

    pub fn new(timeout: Duration, policy: RetryPolicy) -> Result<Self> {
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to create HTTP client: {e}"),
                source: Some(e.into()),
            })?;
        Ok(Self {
            client,
            timeout,
            policy,
        })
    }

    /// Sends one logical request. Transient failures (408/502/503/504 and
    /// connect/receive failures) are retried up to the configured limit;
    /// everything else surfaces immediately as a typed error.
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        headers: &BTreeMap<String, String>,
        body: Option<&str>,
    ) -> Result<Exchange> {
        let parsed_url = Url::parse(url).map_err(|e| Error::Config {
            message: format!("invalid URI: {url}"),
            source: Some(e.into()),
        })?;

        // Fresh per-call tracking state; never shared across calls.
        let mut request_details = RequestDetails {
            method: method.to_string(),
            url: url.to_string(),
            headers: headers.clone(),
            body: body.unwrap_or_default().to_string(),
            retry_attempts: 0,
        };
        let mut handler = RetryHandler::new(self.policy.clone());

        loop {
            let attempt_headers = if request_details.retry_attempts == 0 {
                headers.clone()
            } else {
                // A retry builds a fresh underlying request; connection-scoped
                // headers are regenerated rather than copied.
                let mut retained = retained_for_retry(headers);
                for name in ["Accept", "Content-Type"] {
                    if let Some(value) = headers.get(name) {
                        retained.insert(name.to_string(), value.clone());
                    }
                }
                retained
            };

            let mut request = self.client.request(method.clone(), parsed_url.clone());
            for (name, value) in &attempt_headers {
                request = request.header(name, value);
            }
            if body.is_some()
                && (method == Method::POST || method == Method::PUT || method == Method::PATCH)
            {
                request = request.body(request_details.body.clone());
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let response_headers = header_map_to_btree(response.headers());
                        match response.text().await {
                            Ok(text) => {
                                log::debug!(
                                    "{} {} -> {} after {} retries",
                                    request_details.method,
                                    request_details.url,
                                    status,
                                    request_details.retry_attempts
                                );
                                return Ok(Exchange {
                                    request: request_details,
                                    response: ResponseDetails {
                                        status: status.as_u16(),
                                        headers: response_headers,
                                        body: text.trim().to_string(),
                                    },
                                });
                            }
                            // A failure while draining the body is a receive
                            // failure and classified like any other transport
                            // error.
                            Err(err) => match classify_transport_error(&err) {
                                FailureClass::Transient => {
                                    log::debug!(
                                        "failed reading response body from {}: {}, retrying",
                                        request_details.url,
                                        err
                                    );
                                }
                                FailureClass::Timeout => {
                                    return Err(Error::Connection {
                                        message: format!(
                                            "{err} (HTTP request timeout was set to {}ms)",
                                            self.timeout.as_millis()
                                        ),
                                        source: Some(err.into()),
                                    });
                                }
                                _ => {
                                    return Err(Error::Connection {
                                        message: format!("failed reading response body: {err}"),
                                        source: Some(err.into()),
                                    });
                                }
                            },
                        }
                    } else {
                        match classify_status(status) {
                            FailureClass::Transient => {
                                log::debug!(
                                    "transient status {} from {}, retrying",
                                    status,
                                    request_details.url
                                );
                            }
                            _ => {
                                let response_headers = header_map_to_btree(response.headers());
                                let response_body =
                                    response.text().await.unwrap_or_default().trim().to_string();
                                log::error!("{} returned by {}", status, request_details.url);
                                return Err(Error::Http {
                                    status: status.as_u16(),
                                    message: format!("{status} returned by remote host"),
                                    headers: response_headers,
                                    body: response_body,
                                });
                            }
                        }
                    }
                }
                Err(err) => match classify_transport_error(&err) {
                    FailureClass::Transient => {
                        log::debug!(
                            "problem connecting to {}: {}, retrying",
                            request_details.url,
                            err
                        );
                    }
                    FailureClass::Timeout => {
                        return Err(Error::Connection {
                            message: format!(
                                "{err} (HTTP request timeout was set to {}ms)",
                                self.timeout.as_millis()
                            ),
                            source: Some(err.into()),
                        });
                    }
                    _ => {
                        return Err(Error::Connection {
                            message: format!("invalid HTTP response: {err}"),
                            source: Some(err.into()),
                        });
                    }
                },
            }

            match handler.try_consume() {
                RetryDecision::Retry { delay } => {
                    log::warn!(
                        "retrying {} (retry {} of {}) after {:?}",
                        request_details.url,
                        handler.retries(),
                        handler.limit(),
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    request_details.retry_attempts += 1;
                }
                RetryDecision::NoRetry => {
                    log::error!(
                        "exhausted {} retries sending {} {}",
                        handler.limit(),
                        request_details.method,
                        request_details.url
                    );
                    return Err(Error::RetryExhausted {
                        retries: handler.limit(),
                    });
                }
            }
        }
    }
}

fn header_map_to_btree(headers: &reqwest::header::HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).to_string(),
            )
        })
        .collect()
}
