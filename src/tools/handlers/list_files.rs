// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! List files tool handler.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ToolError;
use crate::tools::registry::{ToolHandler, ToolOutput};
use crate::tools::{parse_arguments, MAX_LISTED_FILES};
use crate::types::{InputSchema, ToolDefinition};
use crate::workspace::Workspace;

/// Handler for the `list_files` tool.
pub struct ListFilesHandler;

/// Text returned when the listing is empty.
pub const NO_FILES: &str = "No files found.";

#[derive(Debug, Deserialize)]
struct ListFilesArgs {
    #[serde(default)]
    pattern: Option<String>,

    #[serde(default)]
    path: Option<String>,

    #[serde(default)]
    include_hidden: Option<bool>,
}

const DEFAULT_PATTERN: &str = "**/*";

#[async_trait]
impl ToolHandler for ListFilesHandler {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "list_files",
            "Recursively list files matching a glob pattern. Ignored and hidden files are skipped.",
        )
        .with_schema(
            InputSchema::new()
                .with_property("pattern", serde_json::json!({
                    "type": "string",
                    "description": "Glob matched against paths relative to `path`, e.g. \"**/*.ts\" (default: \"**/*\")"
                }))
                .with_property("path", serde_json::json!({
                    "type": "string",
                    "description": "Directory to search from (default: workspace root)"
                }))
                .with_property("include_hidden", serde_json::json!({
                    "type": "boolean",
                    "description": "Include dot-files and dot-directories (default: false)"
                })),
        )
    }

    async fn execute(
        &self,
        workspace: &Workspace,
        input: serde_json::Value,
    ) -> Result<ToolOutput, ToolError> {
        let args: ListFilesArgs = parse_arguments(&input)?;
        let pattern = args
            .pattern
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PATTERN.to_string());
        let path = args
            .path
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| ".".to_string());

        let files = workspace
            .list_files(&pattern, &path, args.include_hidden.unwrap_or(false))
            .await?;
        let count = files.len();

        let content = if files.is_empty() {
            NO_FILES.to_string()
        } else if count > MAX_LISTED_FILES {
            let mut shown = files[..MAX_LISTED_FILES].join("\n");
            shown.push_str(&format!("\n... and {} more", count - MAX_LISTED_FILES));
            shown
        } else {
            files.join("\n")
        };

        Ok(ToolOutput::success(content, format!("Listed {count} files")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::MemorySandbox;
    use std::sync::Arc;

    fn workspace() -> Workspace {
        Workspace::new(Arc::new(
            MemorySandbox::new()
                .with_file("a.ts", "")
                .with_file("src/b.ts", "")
                .with_file("src/c.rs", "")
                .with_file(".eslintrc", "")
                .with_file("node_modules/x.js", ""),
        ))
    }

    #[tokio::test]
    async fn test_defaults() {
        let output = ListFilesHandler
            .execute(&workspace(), serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(output.content, "a.ts\nsrc/b.ts\nsrc/c.rs");
        assert_eq!(output.status, "Listed 3 files");
    }

    #[tokio::test]
    async fn test_pattern_and_hidden() {
        let output = ListFilesHandler
            .execute(&workspace(), serde_json::json!({"pattern": "**/*.ts"}))
            .await
            .unwrap();
        assert_eq!(output.content, "a.ts\nsrc/b.ts");

        let output = ListFilesHandler
            .execute(&workspace(), serde_json::json!({"pattern": "*", "include_hidden": true}))
            .await
            .unwrap();
        assert_eq!(output.content, ".eslintrc\na.ts");
    }

    #[tokio::test]
    async fn test_no_files() {
        let output = ListFilesHandler
            .execute(&workspace(), serde_json::json!({"pattern": "**/*.py"}))
            .await
            .unwrap();
        assert_eq!(output.content, NO_FILES);
        assert_eq!(output.status, "Listed 0 files");
    }

    #[tokio::test]
    async fn test_null_arguments_take_defaults() {
        let output = ListFilesHandler
            .execute(
                &workspace(),
                serde_json::json!({"pattern": null, "path": null, "include_hidden": null}),
            )
            .await
            .unwrap();
        assert_eq!(output.content, "a.ts
src/b.ts
src/c.rs");
    }
}
