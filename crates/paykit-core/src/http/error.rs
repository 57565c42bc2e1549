//! Failure classification for the retry loop
//!
//! Maps protocol-level statuses and transport errors onto the retry
//! decision the executor makes for each attempt.

use reqwest::StatusCode;

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Transient remote failure (408/502/503/504 or a connect/receive
    /// failure) - retried, consuming one retry slot
    Transient,
    /// Any other protocol-level status - surfaced as an HTTP error, not
    /// retried
    Protocol,
    /// Per-attempt timeout - surfaced as a connection error, not retried
    Timeout,
    /// Any other transport failure - surfaced as a connection error, not
    /// retried
    Transport,
}

impl FailureClass {
    /// Check if this failure type should be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureClass::Transient)
    }
}

/// Classify a protocol-level response status.
pub fn classify_status(status: StatusCode) -> FailureClass {
    match status {
        StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT
        | StatusCode::REQUEST_TIMEOUT => FailureClass::Transient,
        _ => FailureClass::Protocol,
    }
}

/// Classify a transport-level failure from the underlying client. Failures
/// while sending the request or receiving the response (resets, truncated
/// exchanges) count as transient alongside connect failures: the remote host
/// is reachable and a fresh attempt may succeed.
pub fn classify_transport_error(err: &reqwest::Error) -> FailureClass {
    if err.is_timeout() {
        FailureClass::Timeout
    } else if err.is_connect() || err.is_request() || err.is_body() {
        FailureClass::Transient
    } else {
        FailureClass::Transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_statuses() {
        for code in [408u16, 502, 503, 504] {
            let status = StatusCode::from_u16(code).unwrap();
            assert_eq!(classify_status(status), FailureClass::Transient, "{code}");
            assert!(classify_status(status).is_retryable());
        }
    }

    #[test]
    fn test_non_transient_statuses() {
        for code in [400u16, 401, 403, 404, 409, 422, 429, 500] {
            let status = StatusCode::from_u16(code).unwrap();
            assert_eq!(classify_status(status), FailureClass::Protocol, "{code}");
            assert!(!classify_status(status).is_retryable());
        }
    }

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(FailureClass::Transient.is_retryable());
        assert!(!FailureClass::Protocol.is_retryable());
        assert!(!FailureClass::Timeout.is_retryable());
        assert!(!FailureClass::Transport.is_retryable());
    }
}
