// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for Tether
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Main error type for Tether operations
#[derive(Error, Debug)]
pub enum TetherError {
    /// API-related errors (provider transport, auth, rate limits)
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// The agent configuration cannot produce a usable provider
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A tool's setup hook failed (reported, never fatal)
    #[error("Tool '{tool}' failed to initialize: {message}")]
    ToolInitialization { tool: String, message: String },

    /// Tool execution errors
    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    /// The model produced neither a completion nor a tool call
    #[error("No completion found: the model response contained no completion marker and no tool calls")]
    NoCompletionFound,

    /// The turn loop ran out of turns before the model completed
    #[error("Turn budget exceeded: no completion after {max_turns} turns")]
    TurnBudgetExceeded { max_turns: u32 },

    /// The completion did not satisfy the requested output schema
    #[error("Schema validation failed: {0}")]
    SchemaValidationFailed(String),

    /// The background task of a streaming run panicked or was cancelled
    #[error("Task aborted: {0}")]
    TaskAborted(String),

    /// Streaming was requested together with an output schema
    #[error("Streaming is not supported together with an output schema")]
    StreamingSchemaUnsupported,

    /// Configuration file errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// API-specific error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Authentication failed (invalid API key)
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    /// Rate limited by the API
    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u32),

    /// Requested model not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Context window exceeded
    #[error("Context too long: {current} tokens exceeds limit of {limit}")]
    ContextTooLong { current: u32, limit: u32 },

    /// Network connectivity error
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid response from API
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// API returned an error
    #[error("API error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Streaming error
    #[error("Streaming error: {0}")]
    StreamError(String),
}

/// Result type alias for Tether operations
pub type Result<T> = std::result::Result<T, TetherError>;

impl From<toml::de::Error> for TetherError {
    fn from(err: toml::de::Error) -> Self {
        TetherError::Toml(err.to_string())
    }
}

impl From<toml::ser::Error> for TetherError {
    fn from(err: toml::ser::Error) -> Self {
        TetherError::Toml(err.to_string())
    }
}

impl TetherError {
    /// Whether this error ends a task (as opposed to being absorbed or reported)
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            TetherError::ToolInitialization { .. } | TetherError::ToolExecution(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_configuration() {
        let err = TetherError::InvalidConfiguration("unknown provider 'foo'".to_string());
        assert!(err.to_string().contains("Invalid configuration"));
        assert!(err.to_string().contains("foo"));
    }

    #[test]
    fn test_tool_initialization() {
        let err = TetherError::ToolInitialization {
            tool: "browser".to_string(),
            message: "no display".to_string(),
        };
        assert!(err.to_string().contains("browser"));
        assert!(err.to_string().contains("no display"));
        assert!(!err.is_terminal());
    }

    #[test]
    fn test_no_completion_found() {
        let err = TetherError::NoCompletionFound;
        assert!(err.to_string().contains("No completion found"));
        assert!(err.is_terminal());
    }

    #[test]
    fn test_turn_budget_exceeded() {
        let err = TetherError::TurnBudgetExceeded { max_turns: 12 };
        assert!(err.to_string().contains("12 turns"));
    }

    #[test]
    fn test_schema_validation_failed() {
        let err = TetherError::SchemaValidationFailed("missing field 'name'".to_string());
        assert!(err.to_string().contains("Schema validation failed"));
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_streaming_schema_unsupported() {
        let err = TetherError::StreamingSchemaUnsupported;
        assert!(err.to_string().contains("output schema"));
    }

    #[test]
    fn test_task_aborted_is_terminal() {
        let err = TetherError::TaskAborted("task 7 panicked".to_string());
        assert!(err.to_string().contains("Task aborted"));
        assert!(err.is_terminal());
    }

    #[test]
    fn test_tool_execution_is_absorbed() {
        let err = TetherError::ToolExecution("tool failed".to_string());
        assert!(err.to_string().contains("tool failed"));
        assert!(!err.is_terminal());
    }

    #[test]
    fn test_tether_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: TetherError = io_err.into();
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_tether_error_from_toml() {
        let toml_err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let err: TetherError = toml_err.into();
        assert!(err.to_string().contains("TOML error"));
    }

    #[test]
    fn test_api_error_rate_limited() {
        let err = ApiError::RateLimited(30);
        assert!(err.to_string().contains("Rate limited"));
        assert!(err.to_string().contains("30"));
    }

    #[test]
    fn test_api_error_context_too_long() {
        let err = ApiError::ContextTooLong {
            current: 10000,
            limit: 8192,
        };
        assert!(err.to_string().contains("10000"));
        assert!(err.to_string().contains("8192"));
    }

    #[test]
    fn test_api_error_server_error() {
        let err = ApiError::ServerError {
            status: 500,
            message: "internal server error".to_string(),
        };
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("internal server error"));
    }

    #[test]
    fn test_tether_error_from_api_error() {
        let err: TetherError = ApiError::AuthenticationFailed.into();
        assert!(err.to_string().contains("API error"));
        assert!(err.is_terminal());
    }
}
