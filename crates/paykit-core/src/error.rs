//! Error types for the PayKit core library
//!
//! Defines the typed failure taxonomy for outbound API calls, using thiserror
//! for ergonomic error definitions and anyhow for flexible error contexts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for PayKit operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing configuration, including bad URIs
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Empty client id or client secret
    #[error("Missing credential: {message}")]
    MissingCredential { message: String },

    /// Transport-level failure: timeout, connect/receive failure
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Non-transient protocol-level status, with the response attached so
    /// callers can run specialized decoding
    #[error("HTTP error {status}: {message}")]
    Http {
        status: u16,
        message: String,
        headers: BTreeMap<String, String>,
        body: String,
    },

    /// Typed decoding of an Identity API error payload
    #[error("Identity error: {message}")]
    Identity {
        message: String,
        details: IdentityErrorDetails,
    },

    /// Typed decoding of a Payments API error payload
    #[error("Payments error: {message}")]
    Payments {
        message: String,
        details: PaymentsErrorDetails,
    },

    /// JSON parsing and serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// All attempts at sending a request failed
    #[error("Retried {retries} times without a successful response")]
    RetryExhausted { retries: u32 },

    /// Generic internal error wrapping an unexpected failure with context
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// JSON error object returned by the Payments REST API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentsErrorDetails {
    pub name: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub information_link: Option<String>,
    #[serde(default)]
    pub debug_id: Option<String>,
    #[serde(default)]
    pub details: Vec<FieldIssue>,
}

/// One `{field, issue}` entry of a Payments error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub issue: Option<String>,
}

/// JSON error object returned by the Identity API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityErrorDetails {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub error_uri: Option<String>,
}

/// Outcome of attempting to decode an error response body into one of the
/// known payload shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedErrorBody {
    Identity(IdentityErrorDetails),
    Payments(PaymentsErrorDetails),
    Opaque(String),
}

/// Attempts to decode a raw error response body. The two known shapes are
/// disjoint: Identity payloads carry `error`, Payments payloads carry `name`.
pub fn decode_error_body(body: &str) -> DecodedErrorBody {
    if let Ok(details) = serde_json::from_str::<IdentityErrorDetails>(body) {
        return DecodedErrorBody::Identity(details);
    }
    if let Ok(details) = serde_json::from_str::<PaymentsErrorDetails>(body) {
        return DecodedErrorBody::Payments(details);
    }
    DecodedErrorBody::Opaque(body.to_string())
}

impl Error {
    /// Refines an `Http` error into `Identity` or `Payments` when its body
    /// decodes as one of the known payload shapes. Any other error is
    /// returned unchanged; typed errors are never re-wrapped.
    pub fn refine(self) -> Error {
        match self {
            Error::Http {
                status,
                message,
                headers,
                body,
            } => match decode_error_body(&body) {
                DecodedErrorBody::Identity(details) => Error::Identity {
                    message: format!(
                        "{}: {}",
                        details.error,
                        details.error_description.as_deref().unwrap_or("")
                    ),
                    details,
                },
                DecodedErrorBody::Payments(details) => Error::Payments {
                    message: format!(
                        "{}: {}",
                        details.name,
                        details.message.as_deref().unwrap_or("")
                    ),
                    details,
                },
                DecodedErrorBody::Opaque(body) => Error::Http {
                    status,
                    message,
                    headers,
                    body,
                },
            },
            other => other,
        }
    }
}

// Conversion implementations
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal {
            message: err.to_string(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::MissingCredential {
            message: "clientId is empty".to_string(),
        };
        assert_eq!(err.to_string(), "Missing credential: clientId is empty");
    }

    #[test]
    fn test_decode_identity_body() {
        let body = r#"{"error":"invalid_client","error_description":"Client Authentication failed","error_uri":"https://developer.paypal.com"}"#;
        match decode_error_body(body) {
            DecodedErrorBody::Identity(details) => {
                assert_eq!(details.error, "invalid_client");
                assert_eq!(
                    details.error_description.as_deref(),
                    Some("Client Authentication failed")
                );
            }
            other => panic!("expected identity decode, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_payments_body() {
        let body = r#"{"name":"VALIDATION_ERROR","message":"Invalid request","information_link":"https://developer.paypal.com/docs","debug_id":"abc123","details":[{"field":"amount","issue":"Must be positive"}]}"#;
        match decode_error_body(body) {
            DecodedErrorBody::Payments(details) => {
                assert_eq!(details.name, "VALIDATION_ERROR");
                assert_eq!(details.details.len(), 1);
                assert_eq!(details.details[0].field.as_deref(), Some("amount"));
            }
            other => panic!("expected payments decode, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_opaque_body() {
        assert_eq!(
            decode_error_body("not json at all"),
            DecodedErrorBody::Opaque("not json at all".to_string())
        );
    }

    #[test]
    fn test_refine_http_into_identity() {
        let err = Error::Http {
            status: 401,
            message: "HTTP 401".to_string(),
            headers: BTreeMap::new(),
            body: r#"{"error":"invalid_client","error_description":"bad secret"}"#.to_string(),
        };
        match err.refine() {
            Error::Identity { details, .. } => assert_eq!(details.error, "invalid_client"),
            other => panic!("expected identity error, got {:?}", other),
        }
    }

    #[test]
    fn test_refine_leaves_opaque_http_untouched() {
        let err = Error::Http {
            status: 500,
            message: "HTTP 500".to_string(),
            headers: BTreeMap::new(),
            body: "<html>oops</html>".to_string(),
        };
        match err.refine() {
            Error::Http { status, body, .. } => {
                assert_eq!(status, 500);
                assert_eq!(body, "<html>oops</html>");
            }
            other => panic!("expected http error, got {:?}", other),
        }
    }
}
