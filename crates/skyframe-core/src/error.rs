//! Centralized error types for the workflow.
//!
//! Every failure a workflow run can end with maps onto [`AppError`]. The
//! orchestrator only ever shows these as text, so each variant carries a
//! readable `Display` plus a shorter `user_message()`.

use thiserror::Error;

/// Top-level workflow error type.
///
/// Crate-specific errors (location, image jobs) are converted into this type
/// before they reach the orchestrator's status line.
#[derive(Debug, Error)]
pub enum AppError {
    /// The user or the configuration refused access to the device location.
    #[error("{0}")]
    PermissionDenied(String),

    /// Location could not be determined for a reason other than refusal.
    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),

    /// Transport-level failure; may succeed if tried again.
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// A remote endpoint answered, but with a non-success status or a body
    /// that could not be used.
    #[error("{message}")]
    RemoteRejection { status: Option<u16>, message: String },

    /// The generation job reached a terminal state without a usable image.
    #[error("{0}")]
    TerminalJobFailure(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Create a remote rejection from a status code and message.
    pub fn rejection(status: Option<u16>, message: impl Into<String>) -> Self {
        AppError::RemoteRejection {
            status,
            message: message.into(),
        }
    }

    /// Returns a short message suitable for display next to the status line.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::PermissionDenied(_) => {
                "Location access was denied. Allow location access and try again."
            }
            AppError::LocationUnavailable(_) => "Could not determine your location.",
            AppError::Network(e) => e.user_message(),
            AppError::RemoteRejection { status: Some(s), .. } if *s >= 500 => {
                "The image service is experiencing issues. Please try again later."
            }
            AppError::RemoteRejection { .. } => "The image service rejected the request.",
            AppError::TerminalJobFailure(_) => "Image generation did not produce an image.",
            AppError::Config(e) => e.user_message(),
            AppError::Other(_) => "Something went wrong. Run with RUST_LOG=debug for details.",
        }
    }

    /// Whether trying the same operation again could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Network(_) => true,
            AppError::RemoteRejection { status: Some(s), .. } => !(400..500).contains(s),
            _ => false,
        }
    }
}

/// Transport failures talking to a remote service.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Could not reach the service: {0}")]
    Unreachable(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::Unreachable(_) => "No connection to the service. Check your network.",
            NetworkError::Timeout => "The service took too long to answer.",
            NetworkError::Status { status, .. } if *status >= 500 => {
                "The service is having problems right now."
            }
            NetworkError::Status { .. } => "The service refused the request.",
            NetworkError::InvalidResponse(_) => "The service sent a response that could not be read.",
        }
    }
}

/// Failures loading or validating the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No configuration directory on this platform")]
    NoConfigDir,

    #[error("Failed to access {path}: {message}")]
    Io { path: String, message: String },

    #[error("Config file is malformed: {0}")]
    Parse(String),

    #[error("Configuration validation failed: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NoConfigDir => "Pass --config with an explicit config file.",
            ConfigError::Io { .. } => "The config file could not be read or written.",
            ConfigError::Parse(_) => "The config file is not valid TOML.",
            ConfigError::Invalid(_) => "Fix the listed settings in the config file.",
        }
    }
}

/// Classify a reqwest failure as a [`NetworkError`].
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            return NetworkError::Timeout;
        }
        if self.is_decode() {
            return NetworkError::InvalidResponse(self.to_string());
        }
        match self.status() {
            Some(status) if !self.is_connect() => NetworkError::Status {
                status: status.as_u16(),
                message: self.to_string(),
            },
            _ => NetworkError::Unreachable(self.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_error_wraps() {
        let err: AppError = NetworkError::Timeout.into();
        assert!(matches!(err, AppError::Network(NetworkError::Timeout)));
        assert_eq!(err.user_message(), "The service took too long to answer.");
    }

    #[test]
    fn test_config_error_wraps() {
        let err: AppError = ConfigError::Parse("expected `=`".into()).into();
        assert_eq!(err.to_string(), "Configuration error: Config file is malformed: expected `=`");
        assert_eq!(err.user_message(), "The config file is not valid TOML.");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_status_user_message_by_class() {
        let server = NetworkError::Status {
            status: 502,
            message: "bad gateway".into(),
        };
        assert_eq!(server.user_message(), "The service is having problems right now.");
        let client = NetworkError::Status {
            status: 403,
            message: "forbidden".into(),
        };
        assert_eq!(client.user_message(), "The service refused the request.");
    }

    #[test]
    fn test_rejection_display_is_message() {
        let err = AppError::rejection(Some(422), "Invalid input");
        assert_eq!(err.to_string(), "Invalid input");
    }

    #[test]
    fn test_rejection_user_message_by_status() {
        assert!(AppError::rejection(Some(503), "down")
            .user_message()
            .contains("try again later"));
        assert!(AppError::rejection(Some(404), "missing")
            .user_message()
            .contains("rejected"));
    }

    #[test]
    fn test_is_retryable() {
        assert!(AppError::Network(NetworkError::Timeout).is_retryable());
        assert!(AppError::rejection(Some(502), "bad gateway").is_retryable());
        assert!(!AppError::rejection(Some(404), "missing").is_retryable());
        assert!(!AppError::rejection(Some(408), "request timeout").is_retryable());
        assert!(!AppError::rejection(Some(429), "slow down").is_retryable());
        assert!(!AppError::rejection(None, "no id").is_retryable());
        assert!(!AppError::PermissionDenied("denied".into()).is_retryable());
        assert!(!AppError::TerminalJobFailure("failed".into()).is_retryable());
    }
}
