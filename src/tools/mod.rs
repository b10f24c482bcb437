// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tool system for sandpiper.
//!
//! The model can call exactly five tools, each built on the workspace facade:
//! `read_file`, `write_file`, `list_files`, `grep_search` and `run_command`.
//!
//! # Architecture
//!
//! - [`ToolHandler`] trait - Core abstraction for tool implementations
//! - [`ToolRegistry`] - Maps tool names to handlers, dispatches calls
//! - Individual handlers in the [`handlers`] module
//!
//! # Example
//!
//! ```rust,ignore
//! use sandpiper::tools::ToolRegistry;
//!
//! let registry = ToolRegistry::with_defaults(workspace);
//! let result = registry.dispatch("read_file", json!({"path": "src/main.ts"})).await?;
//! println!("{}", result.output.status);
//! ```

pub mod handlers;
pub mod registry;

pub use handlers::*;
pub use registry::{DispatchResult, ToolHandler, ToolOutput, ToolRegistry, ToolRegistryBuilder};

use serde::Deserialize;
use crate::error::ToolError;
use crate::types::RAW_ARGUMENTS_KEY;

/// Parse JSON arguments into a typed struct.
///
/// A missing required field is reported as [`ToolError::MissingParameter`]
/// so the model sees which argument it forgot. Arguments the provider sent
/// as something other than an object are rejected with the original text.
pub fn parse_arguments<T>(arguments: &serde_json::Value) -> Result<T, ToolError>
where
    T: for<'de> Deserialize<'de>,
{
    if let Some(raw) = arguments.get(RAW_ARGUMENTS_KEY) {
        let raw = match raw {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        return Err(ToolError::InvalidInput(format!(
            "Arguments must be a JSON object, got: {raw}"
        )));
    }

    serde_json::from_value(arguments.clone()).map_err(|err| {
        let message = err.to_string();
        match missing_field(&message) {
            Some(field) => ToolError::MissingParameter(field.to_string()),
            None => ToolError::InvalidInput(format!("Failed to parse arguments: {message}")),
        }
    })
}

fn missing_field(message: &str) -> Option<&str> {
    let rest = message.strip_prefix("missing field `")?;
    rest.split('`').next()
}

/// Largest file body returned by `read_file`.
pub const MAX_READ_BYTES: usize = 200 * 1024;

/// Lines of command output kept by `run_command`.
pub const MAX_OUTPUT_LINES: usize = 400;

/// Paths listed by `list_files` before the rest are summarized.
pub const MAX_LISTED_FILES: usize = 1000;

/// Truncate text to a maximum byte length, respecting UTF-8 boundaries.
pub fn truncate_text(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }

    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }

    if end == 0 {
        return String::new();
    }

    format!("{}... [truncated]", &text[..end])
}

/// Truncate output by lines, keeping first and last portions.
pub fn truncate_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();
    let total = lines.len();

    if total <= max_lines {
        return output.to_string();
    }

    let keep = max_lines / 2;
    let first_part = lines[..keep].join("\n");
    let last_part = lines[total - keep..].join("\n");
    let omitted = total - keep * 2;

    format!("{first_part}\n\n... [{omitted} lines omitted] ...\n\n{last_part}")
}

/// Number of lines as a human would count them.
pub(crate) fn line_count(text: &str) -> usize {
    text.lines().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_short() {
        let text = "Hello, world!";
        assert_eq!(truncate_text(text, 100), text);
    }

    #[test]
    fn test_truncate_text_utf8() {
        let text = "こんにちは"; // 5 characters, 15 bytes
        let truncated = truncate_text(text, 7);
        assert!(truncated.starts_with("こん"));
        assert!(truncated.ends_with("[truncated]"));
    }

    #[test]
    fn test_truncate_output_long() {
        let lines: Vec<String> = (1..=20).map(|i| format!("line{i}")).collect();
        let output = lines.join("\n");
        let truncated = truncate_output(&output, 6);
        assert!(truncated.contains("line1\n"));
        assert!(truncated.contains("line20"));
        assert!(truncated.contains("[14 lines omitted]"));
        assert!(!truncated.contains("line10"));
    }

    #[test]
    fn test_parse_arguments_missing_field() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Args {
            path: String,
        }

        let result: Result<Args, _> = parse_arguments(&serde_json::json!({}));
        assert!(matches!(result, Err(ToolError::MissingParameter(ref f)) if f == "path"));

        let result: Result<Args, _> = parse_arguments(&serde_json::json!({"path": 3}));
        assert!(matches!(result, Err(ToolError::InvalidInput(_))));
    }

    #[test]
    fn test_parse_arguments_reports_raw_text() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Args {
            path: String,
        }

        let result: Result<Args, _> = parse_arguments(&serde_json::json!({"_raw": "{broken"}));
        match result {
            Err(ToolError::InvalidInput(message)) => assert!(message.ends_with("{broken")),
            other => panic!("expected invalid input, got {other:?}"),
        }
    }

    #[test]
    fn test_line_count() {
        assert_eq!(line_count(""), 0);
        assert_eq!(line_count("a\nb\n"), 2);
        assert_eq!(line_count("a\nb"), 2);
    }
}
