// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for sandpiper.
//!
//! This module provides strongly-typed errors for each layer of the agent,
//! using `thiserror` for ergonomic error definitions and `anyhow` for error
//! propagation at the application edge.
//!
//! How each kind surfaces to the user:
//! - [`BootError`] is fatal to the session and shown as an error turn.
//! - [`WorkspaceError`] and [`ToolError`] become tool-result text that goes
//!   back to the model.
//! - [`ProviderError`] ends the current run with an assistant error turn.

use thiserror::Error;

/// The sandbox could not be started.
///
/// Cloneable so a single in-flight boot can hand the same failure to every
/// caller that awaited it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BootError {
    #[error("Sandbox requires cross-origin isolation, which is not available in this environment")]
    IsolationUnavailable,

    #[error("Sandbox failed to boot: {0}")]
    Failed(String),
}

/// Errors raised by workspace file and process operations.
#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error(transparent)]
    Boot(#[from] BootError),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Failed to spawn process: {0}")]
    Spawn(String),
}

impl WorkspaceError {
    /// Check if this error means the path does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<std::io::Error> for WorkspaceError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::Io(err.to_string()),
        }
    }
}

/// Errors that can occur during provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("API error: {message}")]
    ApiError {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Response parsing error: {0}")]
    ParseError(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl ProviderError {
    /// Create an API error with status code.
    pub fn api(message: impl Into<String>, status_code: u16) -> Self {
        Self::ApiError {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Create an API error without status code.
    pub fn api_message(message: impl Into<String>) -> Self {
        Self::ApiError {
            message: message.into(),
            status_code: None,
        }
    }

    /// Map an HTTP failure status and its extracted message to an error.
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status_code {
            401 | 403 => Self::AuthError(message),
            429 => Self::RateLimited(message),
            _ => Self::api(message, status_code),
        }
    }

    /// Get the HTTP status code, if the provider answered with one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ApiError { status_code, .. } => *status_code,
            Self::AuthError(_) => Some(401),
            Self::RateLimited(_) => Some(429),
            _ => None,
        }
    }
}

/// Errors that can occur during tool execution.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Workspace unavailable: {0}")]
    Workspace(String),
}

impl From<WorkspaceError> for ToolError {
    fn from(err: WorkspaceError) -> Self {
        match err {
            WorkspaceError::NotFound(path) => Self::FileNotFound(path),
            WorkspaceError::NotADirectory(path) => {
                Self::InvalidInput(format!("not a directory: {path}"))
            }
            WorkspaceError::InvalidPath(msg) => Self::PermissionDenied(msg),
            WorkspaceError::InvalidPattern(msg) => Self::InvalidInput(msg),
            WorkspaceError::Io(msg) => Self::IoError(msg),
            WorkspaceError::Spawn(msg) => Self::ExecutionFailed(msg),
            WorkspaceError::Boot(boot) => Self::Workspace(boot.to_string()),
        }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid config format: {0}")]
    InvalidFormat(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("IO error reading config: {0}")]
    IoError(String),

    #[error("YAML parsing error: {0}")]
    YamlError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err.to_string())
    }
}

/// Errors that abort an agent submission.
///
/// Provider failures and cancellation normally end a run as ordinary
/// conversation turns; only errors the conversation cannot recover from
/// are returned to the caller.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Workspace(#[from] BootError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias using anyhow for flexible error handling.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_api() {
        let err = ProviderError::api("Bad request", 400);
        match err {
            ProviderError::ApiError { message, status_code } => {
                assert_eq!(message, "Bad request");
                assert_eq!(status_code, Some(400));
            }
            _ => panic!("Expected ApiError"),
        }
    }

    #[test]
    fn test_provider_error_from_status() {
        assert!(matches!(ProviderError::from_status(401, "no"), ProviderError::AuthError(_)));
        assert!(matches!(ProviderError::from_status(429, "slow"), ProviderError::RateLimited(_)));
        let err = ProviderError::from_status(502, "bad gateway");
        assert_eq!(err.status_code(), Some(502));
        assert_eq!(err.to_string(), "API error: bad gateway");
    }

    #[test]
    fn test_workspace_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: WorkspaceError = io_err.into();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_tool_error_from_workspace() {
        let err: ToolError = WorkspaceError::NotFound("a.ts".to_string()).into();
        assert!(matches!(err, ToolError::FileNotFound(ref p) if p == "a.ts"));

        let err: ToolError = WorkspaceError::Boot(BootError::IsolationUnavailable).into();
        assert!(matches!(err, ToolError::Workspace(_)));
    }

    #[test]
    fn test_boot_error_is_clone() {
        let err = BootError::Failed("wasm init".to_string());
        assert_eq!(err.clone(), err);
        assert!(err.to_string().contains("wasm init"));
    }

    #[test]
    fn test_config_error_from_json() {
        let result: std::result::Result<serde_json::Value, _> = serde_json::from_str("invalid json");
        let json_err = result.unwrap_err();
        let config_err: ConfigError = json_err.into();
        assert!(matches!(config_err, ConfigError::JsonError(_)));
    }

    #[test]
    fn test_agent_error_from_boot() {
        let agent_err: AgentError = BootError::IsolationUnavailable.into();
        assert!(matches!(agent_err, AgentError::Workspace(_)));
        assert!(agent_err.to_string().contains("cross-origin isolation"));
    }
}
