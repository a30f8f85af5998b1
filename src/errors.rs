//! Typed error hierarchy for the coder client.
//!
//! Two top-level enums cover the two fallible seams:
//! - `ServiceError`: chat, summarization, execution and analysis calls
//! - `ConfigError`: loading and validating `.coder/coder.toml`
//!
//! Input rejection (empty message, empty code) is not an error: those calls
//! are silent no-ops and never produce one of these values.

use thiserror::Error;

/// Errors from a remote service call.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service answered with a non-success status.
    #[error("{detail}")]
    Status { status: u16, detail: String },

    #[error("{0}")]
    Transport(String),

    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The summarizer answered successfully but with nothing to fold in.
    #[error("summarization returned an empty digest")]
    EmptySummary,

    /// The client cannot be built from the given settings.
    #[error("invalid client settings: {0}")]
    InvalidClient(String),
}

impl ServiceError {
    /// Text shown inline to the user in the chat transcript.
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::Status { detail, .. } if detail.trim().is_empty() => {
                "Error: Failed to get response".to_string()
            }
            ServiceError::Status { detail, .. } => format!("Error: {}", detail),
            ServiceError::EmptySummary | ServiceError::InvalidClient(_) => {
                format!("Error: {}", self)
            }
            other => format!("Network Error: {}", other),
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ServiceError::Decode(err.to_string())
        } else {
            ServiceError::Transport(err.to_string())
        }
    }
}

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid compaction policy: {0}")]
    InvalidPolicy(String),

    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse coder.toml: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_user_message_carries_detail() {
        let err = ServiceError::Status {
            status: 500,
            detail: "model crashed".to_string(),
        };
        assert_eq!(err.user_message(), "Error: model crashed");
    }

    #[test]
    fn status_error_without_detail_uses_fallback() {
        let err = ServiceError::Status {
            status: 502,
            detail: "  ".to_string(),
        };
        assert_eq!(err.user_message(), "Error: Failed to get response");
    }

    #[test]
    fn transport_errors_are_marked_as_network_errors() {
        let err = ServiceError::Transport("connection refused".to_string());
        assert_eq!(err.user_message(), "Network Error: connection refused");

        let timeout = ServiceError::Timeout { secs: 30 };
        assert!(timeout.user_message().starts_with("Network Error:"));
        assert!(timeout.to_string().contains("30"));
    }

    #[test]
    fn invalid_client_is_not_a_network_error() {
        let err = ServiceError::InvalidClient("timeout must be greater than 0".to_string());
        assert_eq!(
            err.user_message(),
            "Error: invalid client settings: timeout must be greater than 0"
        );
    }

    #[test]
    fn config_error_read_carries_path() {
        use std::path::PathBuf;
        let path = PathBuf::from("/project/.coder/coder.toml");
        let err = ConfigError::Read {
            path: path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        match &err {
            ConfigError::Read { path: p, source } => {
                assert_eq!(p, &path);
                assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied);
            }
            _ => panic!("Expected Read"),
        }
        assert!(err.to_string().contains("coder.toml"));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&ServiceError::EmptySummary);
        assert_std_error(&ConfigError::InvalidPolicy("x".into()));
    }
}
