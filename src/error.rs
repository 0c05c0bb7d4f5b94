//! Unified error types for chatsweep.
//!
//! This module provides a single [`ChatsweepError`] enum that covers every
//! failure in the library, from HTTP status handling to record normalization.
//!
//! # Severity
//!
//! Errors fall into three groups, and callers are expected to treat them
//! differently:
//!
//! | Group | Variants | Handling |
//! |-------|----------|----------|
//! | Session-fatal | [`Authentication`](ChatsweepError::Authentication), [`Cancelled`](ChatsweepError::Cancelled) | Abort the whole run |
//! | Per-source | [`PermissionDenied`](ChatsweepError::PermissionDenied), [`RemoteApi`](ChatsweepError::RemoteApi), [`RetryExhausted`](ChatsweepError::RetryExhausted) | Skip the source, keep sweeping |
//! | Per-record | [`MalformedRecord`](ChatsweepError::MalformedRecord) | Drop the record, keep paging |

use std::io;

use thiserror::Error;

/// A specialized [`Result`] type for chatsweep operations.
///
/// # Example
///
/// ```rust
/// use chatsweep::error::Result;
/// use chatsweep::Message;
///
/// fn my_function() -> Result<Vec<Message>> {
///     Ok(vec![])
/// }
/// ```
pub type Result<T> = std::result::Result<T, ChatsweepError>;

/// The error type for all chatsweep operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChatsweepError {
    /// The credential was rejected (HTTP 401).
    ///
    /// Every later call would fail the same way, so this aborts the run.
    #[error(
        "Authentication failed on {endpoint}. The token may be invalid or expired."
    )]
    Authentication {
        /// Endpoint that rejected the credential
        endpoint: String,
    },

    /// The credential is valid but lacks access to the resource (HTTP 403).
    #[error("Access denied for {endpoint}. You may not have permission.")]
    PermissionDenied {
        /// Endpoint that refused access
        endpoint: String,
    },

    /// Any other non-success response from the remote API.
    #[error("API error {status} on {endpoint}: {body}")]
    RemoteApi {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
        /// Endpoint that failed
        endpoint: String,
    },

    /// Rate limits or transient network failures outlived the retry budget.
    #[error("Too many retries for {endpoint} ({attempts} attempts)")]
    RetryExhausted {
        /// Endpoint that kept failing
        endpoint: String,
        /// Number of attempts made
        attempts: u32,
    },

    /// A single wire record could not be normalized.
    #[error("Malformed record: {reason}")]
    MalformedRecord {
        /// What was wrong with the record
        reason: String,
    },

    /// The run was cancelled by an external signal.
    #[error("Operation cancelled")]
    Cancelled,

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing/serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An I/O error occurred while writing an export.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// CSV writing error.
    #[cfg(feature = "csv-output")]
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid date format in filter configuration.
    #[error("Invalid date '{input}'. Expected format: {expected}")]
    InvalidDate {
        /// The invalid date string that was provided
        input: String,
        /// Expected format description
        expected: &'static str,
    },

    /// A value did not match the expected shape (output format, rule syntax, API payload).
    #[error("Invalid {format} format: {message}")]
    InvalidFormat {
        /// What was being read
        format: &'static str,
        /// Description of what's wrong
        message: String,
    },

    /// Configuration is missing or inconsistent.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },
}

impl From<std::string::FromUtf8Error> for ChatsweepError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        ChatsweepError::InvalidFormat {
            format: "output",
            message: err.to_string(),
        }
    }
}

// ============================================================================
// Convenience constructors
// ============================================================================

impl ChatsweepError {
    /// Creates an authentication error for an endpoint.
    pub fn authentication(endpoint: impl Into<String>) -> Self {
        ChatsweepError::Authentication {
            endpoint: endpoint.into(),
        }
    }

    /// Creates a permission error for an endpoint.
    pub fn permission_denied(endpoint: impl Into<String>) -> Self {
        ChatsweepError::PermissionDenied {
            endpoint: endpoint.into(),
        }
    }

    /// Creates a remote API error.
    pub fn remote_api(status: u16, body: impl Into<String>, endpoint: impl Into<String>) -> Self {
        ChatsweepError::RemoteApi {
            status,
            body: body.into(),
            endpoint: endpoint.into(),
        }
    }

    /// Creates a retry exhaustion error.
    pub fn retry_exhausted(endpoint: impl Into<String>, attempts: u32) -> Self {
        ChatsweepError::RetryExhausted {
            endpoint: endpoint.into(),
            attempts,
        }
    }

    /// Creates a malformed record error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        ChatsweepError::MalformedRecord {
            reason: reason.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(format: &'static str, message: impl Into<String>) -> Self {
        ChatsweepError::InvalidFormat {
            format,
            message: message.into(),
        }
    }

    /// Creates an invalid date error.
    pub fn invalid_date(input: impl Into<String>) -> Self {
        ChatsweepError::InvalidDate {
            input: input.into(),
            expected: "YYYY-MM-DD or RFC 3339",
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        ChatsweepError::Config {
            message: message.into(),
        }
    }

    /// Returns `true` if this error invalidates the whole session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ChatsweepError::Authentication { .. } | ChatsweepError::Cancelled
        )
    }

    /// Returns `true` if a multi-source sweep may skip the source and continue.
    pub fn is_source_recoverable(&self) -> bool {
        matches!(
            self,
            ChatsweepError::PermissionDenied { .. }
                | ChatsweepError::RemoteApi { .. }
                | ChatsweepError::RetryExhausted { .. }
                | ChatsweepError::MalformedRecord { .. }
        )
    }

    /// Returns `true` if this is an authentication error.
    pub fn is_authentication(&self) -> bool {
        matches!(self, ChatsweepError::Authentication { .. })
    }

    /// Returns `true` if this is a permission error.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, ChatsweepError::PermissionDenied { .. })
    }

    /// Returns `true` if this is a malformed record error.
    pub fn is_malformed(&self) -> bool {
        matches!(self, ChatsweepError::MalformedRecord { .. })
    }

    /// Returns `true` if the run was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ChatsweepError::Cancelled)
    }

    /// Returns `true` if this is a date-related error.
    pub fn is_invalid_date(&self) -> bool {
        matches!(self, ChatsweepError::InvalidDate { .. })
    }

    /// Returns `true` if a transport-level failure is worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            ChatsweepError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_display() {
        let err = ChatsweepError::authentication("/users/@me");
        let display = err.to_string();
        assert!(display.contains("Authentication failed"));
        assert!(display.contains("/users/@me"));
    }

    #[test]
    fn test_remote_api_display() {
        let err = ChatsweepError::remote_api(500, "oops", "/channels/1/messages");
        let display = err.to_string();
        assert!(display.contains("500"));
        assert!(display.contains("oops"));
        assert!(display.contains("/channels/1/messages"));
    }

    #[test]
    fn test_retry_exhausted_display() {
        let err = ChatsweepError::retry_exhausted("/channels/1/pins", 5);
        assert_eq!(
            err.to_string(),
            "Too many retries for /channels/1/pins (5 attempts)"
        );
    }

    #[test]
    fn test_invalid_date_display() {
        let err = ChatsweepError::invalid_date("01-01-2024");
        let display = err.to_string();
        assert!(display.contains("01-01-2024"));
        assert!(display.contains("YYYY-MM-DD"));
        assert!(err.is_invalid_date());
    }

    #[test]
    fn test_severity_classification() {
        assert!(ChatsweepError::authentication("x").is_fatal());
        assert!(ChatsweepError::Cancelled.is_fatal());
        assert!(!ChatsweepError::authentication("x").is_source_recoverable());

        assert!(ChatsweepError::permission_denied("x").is_source_recoverable());
        assert!(ChatsweepError::remote_api(404, "", "x").is_source_recoverable());
        assert!(ChatsweepError::retry_exhausted("x", 5).is_source_recoverable());
        assert!(!ChatsweepError::permission_denied("x").is_fatal());
    }

    #[test]
    fn test_is_helpers() {
        assert!(ChatsweepError::malformed("no id").is_malformed());
        assert!(ChatsweepError::permission_denied("x").is_permission_denied());
        assert!(ChatsweepError::authentication("x").is_authentication());
        assert!(ChatsweepError::Cancelled.is_cancelled());
        assert!(!ChatsweepError::Cancelled.is_transient());
    }

    #[test]
    fn test_json_error_from() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: ChatsweepError = json_err.into();
        assert!(err.to_string().contains("JSON error"));
    }

    #[test]
    fn test_io_error_from() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err = ChatsweepError::from(io_err);
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ChatsweepError>();
    }
}
