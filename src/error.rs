//! Error types for the HCP provider.

use std::time::Duration;

use thiserror::Error;

use crate::schema::Diagnostic;

/// Errors that can occur while talking to HCP or waiting on it.
#[derive(Debug, Error)]
pub enum HcpError {
    /// A link could not be encoded because a required field is missing.
    #[error("Invalid link: {0}")]
    InvalidLink(String),

    /// A link string does not have the canonical shape.
    #[error("Malformed link: {0}")]
    MalformedLink(String),

    /// An import id does not have the expected `a:b` shape.
    #[error("Malformed import id: {0}")]
    MalformedImportId(String),

    /// User input failed validation before any network call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The provider is not configured, or configured incorrectly.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// The API answered 404.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The API answered with any other non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the error body.
        message: String,
    },

    /// The request never produced an HTTP response.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A long-running operation finished with an error.
    #[error("unable to {action}: {message}")]
    OperationFailed {
        /// What the caller was doing, e.g. "create HVN".
        action: String,
        /// The error message reported by the backend.
        message: String,
    },

    /// The local deadline passed before the wait completed.
    #[error("timeout while waiting to {action} after {elapsed:?}")]
    OperationTimeout {
        /// What the caller was doing.
        action: String,
        /// Time spent waiting.
        elapsed: Duration,
    },

    /// An entity reached a terminal state that is not the target.
    #[error("unable to {action}: resource entered terminal state {state}")]
    UnexpectedState {
        /// What the caller was doing.
        action: String,
        /// The observed state.
        state: String,
    },

    /// The wait was cancelled by its context.
    #[error("cancelled while waiting to {action}")]
    Cancelled {
        /// What the caller was doing.
        action: String,
    },
}

impl HcpError {
    /// Whether this error is an HTTP 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether retrying the same read could succeed.
    ///
    /// Covers transport timeouts and connection failures, 5xx responses and
    /// rate limiting.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            Self::Transport(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            _ => false,
        }
    }

    /// Whether this error was raised before anything was sent to HCP.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidLink(_)
                | Self::MalformedLink(_)
                | Self::MalformedImportId(_)
                | Self::Validation(_)
        )
    }
}

/// Returns `true` if `err` is an HTTP 404 from the HCP API.
pub fn is_not_found(err: &HcpError) -> bool {
    err.is_not_found()
}

impl From<HcpError> for Diagnostic {
    fn from(err: HcpError) -> Self {
        match &err {
            HcpError::OperationTimeout { .. } => Diagnostic::error(err.to_string()).with_detail(
                "The operation may still be running in HCP. Re-run to pick up its result.",
            ),
            HcpError::Validation(_) | HcpError::MalformedImportId(_) => {
                Diagnostic::error("Invalid input").with_detail(err.to_string())
            },
            _ => Diagnostic::error(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DiagnosticSeverity;

    #[test]
    fn test_error_display() {
        let err = HcpError::NotFound("hvn test-hvn".to_string());
        assert_eq!(format!("{}", err), "Resource not found: hvn test-hvn");

        let err = HcpError::OperationFailed {
            action: "create HVN".to_string(),
            message: "quota exceeded".to_string(),
        };
        assert_eq!(format!("{}", err), "unable to create HVN: quota exceeded");

        let err = HcpError::OperationTimeout {
            action: "delete HVN".to_string(),
            elapsed: Duration::from_secs(30),
        };
        assert_eq!(
            format!("{}", err),
            "timeout while waiting to delete HVN after 30s"
        );
    }

    #[test]
    fn test_not_found_classification() {
        assert!(HcpError::NotFound("x".to_string()).is_not_found());
        assert!(is_not_found(&HcpError::NotFound("x".to_string())));
        assert!(!HcpError::Api {
            status: 500,
            message: "boom".to_string()
        }
        .is_not_found());
    }

    #[test]
    fn test_transient_classification() {
        let transient = [500u16, 502, 503, 429];
        for status in transient {
            let err = HcpError::Api {
                status,
                message: String::new(),
            };
            assert!(err.is_transient(), "{} should be transient", status);
        }

        let permanent = [400u16, 401, 403, 409];
        for status in permanent {
            let err = HcpError::Api {
                status,
                message: String::new(),
            };
            assert!(!err.is_transient(), "{} should not be transient", status);
        }

        assert!(!HcpError::NotFound("x".to_string()).is_transient());
        assert!(!HcpError::OperationFailed {
            action: "a".to_string(),
            message: "b".to_string()
        }
        .is_transient());
    }

    #[test]
    fn test_input_errors() {
        assert!(HcpError::MalformedLink("x".to_string()).is_input_error());
        assert!(HcpError::InvalidLink("x".to_string()).is_input_error());
        assert!(!HcpError::NotFound("x".to_string()).is_input_error());
    }

    #[test]
    fn test_error_to_diagnostic() {
        let diag: Diagnostic = HcpError::OperationTimeout {
            action: "create HVN".to_string(),
            elapsed: Duration::from_secs(5),
        }
        .into();
        assert_eq!(diag.severity, DiagnosticSeverity::Error);
        assert!(diag.detail.is_some());

        let diag: Diagnostic = HcpError::Validation("bad cidr".to_string()).into();
        assert_eq!(diag.summary, "Invalid input");
        assert_eq!(diag.detail, Some("Validation error: bad cidr".to_string()));
    }
}
