// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for Sage
//!
//! This module defines all error types used throughout the engine.

use thiserror::Error;

/// Main error type for Sage operations
#[derive(Error, Debug)]
pub enum SageError {
    /// Session state errors (bad indices, invalid edits)
    #[error("Session error: {0}")]
    Session(String),

    /// Context loading errors
    #[error("Context error: {0}")]
    Context(String),

    /// Generation service errors
    #[error("Generation error: {0}")]
    Generation(String),

    /// Tool execution errors
    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    /// History persistence errors
    #[error("History error: {0}")]
    History(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(String),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Sage operations
pub type Result<T> = std::result::Result<T, SageError>;

impl From<toml::de::Error> for SageError {
    fn from(err: toml::de::Error) -> Self {
        SageError::Toml(err.to_string())
    }
}

impl From<toml::ser::Error> for SageError {
    fn from(err: toml::ser::Error) -> Self {
        SageError::Toml(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_display() {
        let err = SageError::Session("index out of bounds: 9".to_string());
        assert!(err.to_string().contains("Session error"));
        assert!(err.to_string().contains("index out of bounds"));
    }

    #[test]
    fn test_context_error_display() {
        let err = SageError::Context("no project root".to_string());
        assert!(err.to_string().contains("Context error"));
    }

    #[test]
    fn test_tool_execution_error_display() {
        let err = SageError::ToolExecution("tool 'x' not found".to_string());
        assert!(err.to_string().contains("Tool execution failed"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: SageError = io_err.into();
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_error_from_toml() {
        let toml_err = toml::from_str::<toml::Value>("not = = toml").unwrap_err();
        let err: SageError = toml_err.into();
        assert!(err.to_string().contains("TOML error"));
    }

    #[test]
    fn test_result_alias() {
        fn ok_fn() -> Result<u32> {
            Ok(7)
        }
        assert_eq!(ok_fn().unwrap(), 7);
    }
}
