// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use tether::error::ApiError;
use tether::TetherError;

#[test]
fn test_task_failures_are_descriptive() {
    let cases = [
        (TetherError::NoCompletionFound, "No completion found"),
        (
            TetherError::TurnBudgetExceeded { max_turns: 12 },
            "no completion after 12 turns",
        ),
        (
            TetherError::SchemaValidationFailed("\"x\" is not of type \"integer\"".to_string()),
            "Schema validation failed",
        ),
        (TetherError::StreamingSchemaUnsupported, "output schema"),
        (
            TetherError::InvalidConfiguration("unknown provider 'foo'".to_string()),
            "unknown provider 'foo'",
        ),
    ];

    for (err, needle) in cases {
        assert!(err.to_string().contains(needle), "{}", err);
        assert!(err.is_terminal());
    }
}

#[test]
fn test_absorbed_errors_are_not_terminal() {
    assert!(!TetherError::ToolExecution("boom".to_string()).is_terminal());
    assert!(!TetherError::ToolInitialization {
        tool: "browser".to_string(),
        message: "no display".to_string(),
    }
    .is_terminal());
}

#[test]
fn test_api_error_converts() {
    let err: TetherError = ApiError::RateLimited(30).into();
    assert!(matches!(err, TetherError::Api(ApiError::RateLimited(30))));
    assert!(err.to_string().contains("retry after 30 seconds"));
}

#[test]
fn test_io_and_json_errors_convert() {
    let io: TetherError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert!(matches!(io, TetherError::Io(_)));

    let json: TetherError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
    assert!(matches!(json, TetherError::Json(_)));
}
