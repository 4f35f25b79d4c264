//! Error types and handling for Voltlink
//!
//! This module defines the error types used throughout the application,
//! providing consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for Voltlink operations
pub type Result<T> = std::result::Result<T, VoltlinkError>;

/// Main error type for Voltlink
#[derive(Debug, Error)]
pub enum VoltlinkError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Authentication/authorization errors
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// Enode API errors
    #[error("API error: {message}")]
    Api { message: String },

    /// Network-related errors
    #[error("Network error: {message}")]
    Network { message: String },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Control command rejected by the provider
    #[error("Control error: {message}")]
    Control { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl VoltlinkError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        VoltlinkError::Config {
            message: message.into(),
        }
    }

    /// Create a new auth error
    pub fn auth<S: Into<String>>(message: S) -> Self {
        VoltlinkError::Auth {
            message: message.into(),
        }
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(message: S) -> Self {
        VoltlinkError::Api {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        VoltlinkError::Network {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        VoltlinkError::Timeout {
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        VoltlinkError::Io {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        VoltlinkError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new control error
    pub fn control<S: Into<String>>(message: S) -> Self {
        VoltlinkError::Control {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        VoltlinkError::Generic {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for VoltlinkError {
    fn from(err: std::io::Error) -> Self {
        VoltlinkError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for VoltlinkError {
    fn from(err: serde_yaml::Error) -> Self {
        VoltlinkError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for VoltlinkError {
    fn from(err: serde_json::Error) -> Self {
        VoltlinkError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for VoltlinkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            VoltlinkError::timeout(err.to_string())
        } else {
            VoltlinkError::network(err.to_string())
        }
    }
}

impl From<chrono::ParseError> for VoltlinkError {
    fn from(err: chrono::ParseError) -> Self {
        VoltlinkError::validation("datetime", &err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = VoltlinkError::config("test config error");
        assert!(matches!(err, VoltlinkError::Config { .. }));

        let err = VoltlinkError::auth("test auth error");
        assert!(matches!(err, VoltlinkError::Auth { .. }));

        let err = VoltlinkError::validation("field", "test validation error");
        assert!(matches!(err, VoltlinkError::Validation { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = VoltlinkError::config("test error");
        let error_string = format!("{}", err);
        assert_eq!(error_string, "Configuration error: test error");

        let err = VoltlinkError::validation("update_interval", "out of range");
        let error_string = format!("{}", err);
        assert_eq!(
            error_string,
            "Validation error: update_interval - out of range"
        );
    }

    #[test]
    fn test_control_error_display() {
        let err = VoltlinkError::control("vehicle is not plugged in");
        assert_eq!(
            format!("{}", err),
            "Control error: vehicle is not plugged in"
        );
    }
}
