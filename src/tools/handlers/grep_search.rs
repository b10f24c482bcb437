// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Text search tool handler.
//!
//! Runs the workspace's own line search rather than a `grep` binary, which
//! the sandbox may not have.

use async_trait::async_trait;
use serde::Deserialize;

use super::require;
use crate::error::ToolError;
use crate::tools::parse_arguments;
use crate::tools::registry::{ToolHandler, ToolOutput};
use crate::types::{InputSchema, ToolDefinition};
use crate::workspace::{GrepOptions, Workspace, DEFAULT_MAX_RESULTS};

/// Handler for the `grep_search` tool.
pub struct GrepSearchHandler;

#[derive(Debug, Deserialize)]
struct GrepSearchArgs {
    pattern: String,

    #[serde(default)]
    case_sensitive: Option<bool>,

    #[serde(default)]
    whole_words: Option<bool>,

    #[serde(default)]
    file_pattern: Option<String>,

    #[serde(default)]
    max_results: Option<usize>,
}

#[async_trait]
impl ToolHandler for GrepSearchHandler {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "grep_search",
            "Search file contents for literal text. Returns matching lines as path:line:text.",
        )
        .with_schema(
            InputSchema::new()
                .with_property("pattern", serde_json::json!({
                    "type": "string",
                    "description": "Text to search for (matched literally)"
                }))
                .with_property("case_sensitive", serde_json::json!({
                    "type": "boolean",
                    "description": "Match case exactly (default: false)"
                }))
                .with_property("whole_words", serde_json::json!({
                    "type": "boolean",
                    "description": "Only match whole words (default: false)"
                }))
                .with_property("file_pattern", serde_json::json!({
                    "type": "string",
                    "description": "Glob limiting which files are searched (default: \"**/*\")"
                }))
                .with_property("max_results", serde_json::json!({
                    "type": "integer",
                    "description": "Maximum matching lines to return (default: 100)"
                }))
                .with_required(vec!["pattern".to_string()]),
        )
    }

    async fn execute(
        &self,
        workspace: &Workspace,
        input: serde_json::Value,
    ) -> Result<ToolOutput, ToolError> {
        let args: GrepSearchArgs = parse_arguments(&input)?;
        require("pattern", &args.pattern)?;
        let max_results = args.max_results.unwrap_or(DEFAULT_MAX_RESULTS);
        if max_results == 0 {
            return Err(ToolError::InvalidInput(
                "max_results must be greater than zero".to_string(),
            ));
        }

        let mut options = GrepOptions::default()
            .case_sensitive(args.case_sensitive.unwrap_or(false))
            .whole_words(args.whole_words.unwrap_or(false))
            .max_results(max_results);
        if let Some(file_pattern) = args.file_pattern.filter(|p| !p.trim().is_empty()) {
            options = options.file_pattern(file_pattern);
        }

        let results = workspace.grep_search(&args.pattern, &options).await?;
        let status = if results.is_empty() {
            "No matches".to_string()
        } else if results.is_truncated() {
            format!("Found {}+ matches", results.len())
        } else {
            format!("Found {} matches", results.len())
        };

        Ok(ToolOutput::success(results.to_string(), status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::{MemorySandbox, NO_MATCHES};
    use std::sync::Arc;

    fn workspace() -> Workspace {
        Workspace::new(Arc::new(
            MemorySandbox::new()
                .with_file("src/a.ts", "const FOO = 1;\nlet foo = FOO;\n")
                .with_file("src/b.rs", "fn foo() {}\n")
                .with_file("README.md", "nothing here\n"),
        ))
    }

    #[tokio::test]
    async fn test_case_insensitive_by_default() {
        let output = GrepSearchHandler
            .execute(&workspace(), serde_json::json!({"pattern": "foo"}))
            .await
            .unwrap();
        assert_eq!(
            output.content,
            "src/a.ts:1:const FOO = 1;\nsrc/a.ts:2:let foo = FOO;\nsrc/b.rs:1:fn foo() {}"
        );
        assert_eq!(output.status, "Found 3 matches");
    }

    #[tokio::test]
    async fn test_file_pattern_and_cap() {
        let output = GrepSearchHandler
            .execute(
                &workspace(),
                serde_json::json!({"pattern": "foo", "file_pattern": "**/*.ts", "max_results": 1}),
            )
            .await
            .unwrap();
        let lines: Vec<&str> = output.content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "src/a.ts:1:const FOO = 1;");
        assert!(lines[1].contains("more matches exist"));
        assert_eq!(output.status, "Found 1+ matches");
    }

    #[tokio::test]
    async fn test_no_matches_is_not_error() {
        let output = GrepSearchHandler
            .execute(&workspace(), serde_json::json!({"pattern": "zebra"}))
            .await
            .unwrap();
        assert!(output.success);
        assert_eq!(output.content, NO_MATCHES);
        assert_eq!(output.status, "No matches");
    }

    #[tokio::test]
    async fn test_null_options_take_defaults() {
        let output = GrepSearchHandler
            .execute(
                &workspace(),
                serde_json::json!({
                    "pattern": "foo",
                    "case_sensitive": null,
                    "whole_words": null,
                    "file_pattern": null,
                    "max_results": null
                }),
            )
            .await
            .unwrap();
        assert_eq!(output.status, "Found 3 matches");
    }
}
