// Client error taxonomy
//
// Three caller-visible failure kinds, matching what the backend and the
// transport can actually produce:
// - Timeout: no response arrived within the configured budget
// - Network: transport-level failure, no response at all (DNS, connect, TLS)
// - Api: the server responded with a non-2xx status and (maybe) an error body
//
// The store translates any of these into a human-readable `state.error`
// message; the 401 case additionally clears the stored token (see client.rs).

use serde::Deserialize;

/// Errors produced by the API client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No response within the configured timeout; the in-flight call was aborted
    #[error("request timed out")]
    Timeout,

    /// Transport-level failure (connection, DNS, TLS) - no response received
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The server responded with a non-2xx status
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The response body was not the JSON we expected
    #[error("invalid response body: {0}")]
    InvalidBody(#[source] serde_json::Error),
}

impl ClientError {
    /// True when re-authentication is required (HTTP 401)
    pub fn is_auth_error(&self) -> bool {
        matches!(self, ClientError::Api { status: 401, .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Map a reqwest error to the right taxonomy entry
    ///
    /// reqwest reports timeouts as a flavor of transport error; we promote
    /// them so callers can tell "too slow" from "unreachable".
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::Network(err)
        }
    }
}

/// Error payload shape the backend actually sends
///
/// API responses are inconsistent: some handlers populate `message`, others
/// `detail`. Both are optional here and `normalize` picks whichever is
/// present, so neither shape is special-cased at call sites.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl ErrorBody {
    /// Pick the server-provided message, falling back to a generic one
    pub fn normalize(self, status: u16) -> String {
        self.message
            .or(self.detail)
            .unwrap_or_else(|| format!("request failed with status {status}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_prefers_message() {
        let body = ErrorBody {
            message: Some("Invalid credentials".into()),
            detail: Some("ignored".into()),
        };
        assert_eq!(body.normalize(400), "Invalid credentials");
    }

    #[test]
    fn test_error_body_falls_back_to_detail() {
        let body: ErrorBody = serde_json::from_str(r#"{"detail":"Not found"}"#).unwrap();
        assert_eq!(body.normalize(404), "Not found");
    }

    #[test]
    fn test_error_body_generic_fallback() {
        let body: ErrorBody = serde_json::from_str("{}").unwrap();
        assert_eq!(body.normalize(500), "request failed with status 500");
    }

    #[test]
    fn test_is_auth_error() {
        let err = ClientError::Api {
            status: 401,
            message: "expired".into(),
        };
        assert!(err.is_auth_error());
        assert!(!ClientError::Timeout.is_auth_error());
    }
}
