// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Read file tool handler.

use async_trait::async_trait;
use serde::Deserialize;

#[cfg(feature = "telemetry")]
use tracing::{debug, instrument};

use super::require;
use crate::error::ToolError;
use crate::tools::registry::{ToolHandler, ToolOutput};
use crate::tools::{line_count, parse_arguments, truncate_text, MAX_READ_BYTES};
use crate::types::{InputSchema, ToolDefinition};
use crate::workspace::Workspace;

/// Handler for the `read_file` tool.
pub struct ReadFileHandler;

/// Arguments for the read_file tool.
#[derive(Debug, Deserialize)]
struct ReadFileArgs {
    /// Workspace-relative path of the file to read.
    path: String,
}

#[async_trait]
impl ToolHandler for ReadFileHandler {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("read_file", "Read the full text of a file in the workspace")
            .with_schema(
                InputSchema::new()
                    .with_property("path", serde_json::json!({
                        "type": "string",
                        "description": "Path of the file, relative to the workspace root"
                    }))
                    .with_required(vec!["path".to_string()]),
            )
    }

    #[cfg_attr(feature = "telemetry", instrument(skip(self, workspace, input), fields(path, lines)))]
    async fn execute(
        &self,
        workspace: &Workspace,
        input: serde_json::Value,
    ) -> Result<ToolOutput, ToolError> {
        let args: ReadFileArgs = parse_arguments(&input)?;
        require("path", &args.path)?;

        #[cfg(feature = "telemetry")]
        tracing::Span::current().record("path", args.path.as_str());

        let content = workspace.read_file(&args.path).await?;
        let lines = line_count(&content);

        #[cfg(feature = "telemetry")]
        {
            tracing::Span::current().record("lines", lines);
            debug!(path = %args.path, lines, bytes = content.len(), "File read complete");
        }

        Ok(ToolOutput::success(
            truncate_text(&content, MAX_READ_BYTES),
            format!("Read {} ({lines} lines)", args.path),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::MemorySandbox;
    use std::sync::Arc;

    fn workspace() -> Workspace {
        Workspace::new(Arc::new(
            MemorySandbox::new().with_file("src/a.ts", "const a = 1;\nexport { a };\n"),
        ))
    }

    #[tokio::test]
    async fn test_read_file() {
        let output = ReadFileHandler
            .execute(&workspace(), serde_json::json!({"path": "src/a.ts"}))
            .await
            .unwrap();
        assert!(output.success);
        assert_eq!(output.content, "const a = 1;\nexport { a };\n");
        assert_eq!(output.status, "Read src/a.ts (2 lines)");
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let err = ReadFileHandler
            .execute(&workspace(), serde_json::json!({"path": "nope.ts"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_read_requires_path() {
        let err = ReadFileHandler
            .execute(&workspace(), serde_json::json!({"path": ""}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::MissingParameter(_)));
    }
}
