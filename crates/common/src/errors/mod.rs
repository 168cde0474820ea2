//! Error types for Collabnet pipelines
//!
//! Provides the error taxonomy shared by the harvester and analysis stages:
//! - Configuration and usage errors, raised before any network activity
//! - Fetch errors for non-success transport responses (never retried by the core)
//! - Malformed-entry errors for responses missing expected links or fields
//! - Resolution ambiguity, raised when coauthor names cannot be made unique
//! - Error codes for machine-readable identification

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Input errors (1xxx)
    ConfigurationError,
    UsageError,

    // Upstream errors (2xxx)
    FetchError,
    UpstreamError,
    MalformedEntry,

    // Consistency errors (3xxx)
    ResolutionAmbiguity,

    // Persistence errors (4xxx)
    CheckpointError,
    CsvError,
    IoError,

    // Internal errors (9xxx)
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ConfigurationError => 1001,
            ErrorCode::UsageError => 1002,

            ErrorCode::FetchError => 2001,
            ErrorCode::UpstreamError => 2002,
            ErrorCode::MalformedEntry => 2003,

            ErrorCode::ResolutionAmbiguity => 3001,

            ErrorCode::CheckpointError => 4001,
            ErrorCode::CsvError => 4002,
            ErrorCode::IoError => 4003,

            ErrorCode::SerializationError => 9001,
        }
    }
}

/// An external identifier whose name variants stayed tied after every tie-break
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbiguousIdentity {
    pub external_id: String,
    pub candidates: Vec<String>,
}

impl fmt::Display for AmbiguousIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> [{}]", self.external_id, self.candidates.join(" | "))
    }
}

fn describe_ambiguities(identities: &[AmbiguousIdentity]) -> String {
    identities
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Usage error: {message}")]
    Usage { message: String },

    #[error("Connection failed for {url}. Status: {status}. Reason: {reason}")]
    Fetch {
        url: String,
        status: u16,
        reason: String,
    },

    #[error("Malformed entry in {context}: {message}")]
    MalformedEntry { context: String, message: String },

    #[error("Coauthor names did not resolve uniquely: {}", describe_ambiguities(.identities))]
    ResolutionAmbiguity { identities: Vec<AmbiguousIdentity> },

    #[error("Checkpoint error: {message}")]
    Checkpoint { message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        AppError::Configuration {
            message: message.into(),
        }
    }

    /// Shorthand for a malformed-entry error
    pub fn malformed(context: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::MalformedEntry {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Usage { .. } => ErrorCode::UsageError,
            AppError::Fetch { .. } => ErrorCode::FetchError,
            AppError::MalformedEntry { .. } => ErrorCode::MalformedEntry,
            AppError::ResolutionAmbiguity { .. } => ErrorCode::ResolutionAmbiguity,
            AppError::Checkpoint { .. } => ErrorCode::CheckpointError,
            AppError::Csv(_) => ErrorCode::CsvError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Io(_) => ErrorCode::IoError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
        }
    }

    /// Whether an ops-layer wrapper may retry the failed request.
    ///
    /// The pipeline components themselves never consult this.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Fetch { status, .. } => *status == 429 || (500..600).contains(status),
            AppError::HttpClient(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Errors that must abort before any request is issued
    pub fn is_input_error(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::ConfigurationError | ErrorCode::UsageError
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::Fetch {
            url: "https://api.elsevier.com/x".into(),
            status: 401,
            reason: "Unauthorized".into(),
        };
        assert_eq!(err.code(), ErrorCode::FetchError);
        assert_eq!(err.code().as_code(), 2001);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retryable_statuses() {
        let throttled = AppError::Fetch {
            url: "u".into(),
            status: 429,
            reason: "Too Many Requests".into(),
        };
        let unavailable = AppError::Fetch {
            url: "u".into(),
            status: 503,
            reason: "Service Unavailable".into(),
        };
        assert!(throttled.is_retryable());
        assert!(unavailable.is_retryable());
        assert!(!AppError::config("bad").is_retryable());
    }

    #[test]
    fn test_fetch_message_names_status_and_reason() {
        let err = AppError::Fetch {
            url: "https://example.org/a".into(),
            status: 404,
            reason: "Not Found".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("404"));
        assert!(msg.contains("Not Found"));
    }

    #[test]
    fn test_ambiguity_reports_identifiers() {
        let err = AppError::ResolutionAmbiguity {
            identities: vec![AmbiguousIdentity {
                external_id: "57190000001".into(),
                candidates: vec!["Ana Lima".into(), "Ana Lime".into()],
            }],
        };
        assert_eq!(err.code(), ErrorCode::ResolutionAmbiguity);
        assert!(err.to_string().contains("57190000001"));
        assert!(!err.is_input_error());
    }

    #[test]
    fn test_input_errors() {
        assert!(AppError::config("x").is_input_error());
        assert!(AppError::Usage { message: "x".into() }.is_input_error());
    }
}
