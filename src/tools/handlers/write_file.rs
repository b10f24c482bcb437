// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Write file tool handler.
//!
//! Creates or overwrites a file. Parent directories are whatever the sandbox
//! filesystem provides; none are created here.

use async_trait::async_trait;
use serde::Deserialize;

#[cfg(feature = "telemetry")]
use tracing::{debug, instrument};

use super::require;
use crate::error::ToolError;
use crate::tools::registry::{ToolHandler, ToolOutput};
use crate::tools::{line_count, parse_arguments};
use crate::types::{InputSchema, ToolDefinition};
use crate::workspace::{normalize_path, Workspace};

/// Handler for the `write_file` tool.
pub struct WriteFileHandler;

/// Arguments for the write_file tool.
#[derive(Debug, Deserialize)]
struct WriteFileArgs {
    path: String,
    content: String,
}

#[async_trait]
impl ToolHandler for WriteFileHandler {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "write_file",
            "Create or overwrite a file in the workspace with the given content",
        )
        .with_schema(
            InputSchema::new()
                .with_property("path", serde_json::json!({
                    "type": "string",
                    "description": "Path of the file, relative to the workspace root"
                }))
                .with_property("content", serde_json::json!({
                    "type": "string",
                    "description": "The complete new content of the file"
                }))
                .with_required(vec!["path".to_string(), "content".to_string()]),
        )
    }

    fn is_mutating(&self) -> bool {
        true
    }

    fn write_target(&self, input: &serde_json::Value) -> Option<String> {
        let path = input.get("path")?.as_str()?;
        normalize_path(path).ok().filter(|p| !p.is_empty())
    }

    #[cfg_attr(feature = "telemetry", instrument(skip(self, workspace, input), fields(path, bytes)))]
    async fn execute(
        &self,
        workspace: &Workspace,
        input: serde_json::Value,
    ) -> Result<ToolOutput, ToolError> {
        let args: WriteFileArgs = parse_arguments(&input)?;
        require("path", &args.path)?;

        #[cfg(feature = "telemetry")]
        {
            let span = tracing::Span::current();
            span.record("path", args.path.as_str());
            span.record("bytes", args.content.len());
        }

        workspace.write_file(&args.path, &args.content).await?;

        #[cfg(feature = "telemetry")]
        debug!(path = %args.path, bytes = args.content.len(), "File written");

        Ok(ToolOutput::success(
            format!("Wrote {} bytes to {}", args.content.len(), args.path),
            format!("Wrote {} ({} lines)", args.path, line_count(&args.content)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::MemorySandbox;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_write_then_read_back() {
        let sandbox = Arc::new(MemorySandbox::new());
        let workspace = Workspace::new(sandbox.clone());

        let output = WriteFileHandler
            .execute(
                &workspace,
                serde_json::json!({"path": "notes.md", "content": "one\ntwo\n"}),
            )
            .await
            .unwrap();

        assert_eq!(output.content, "Wrote 8 bytes to notes.md");
        assert_eq!(output.status, "Wrote notes.md (2 lines)");
        assert_eq!(sandbox.file("notes.md").as_deref(), Some("one\ntwo\n"));
    }

    #[tokio::test]
    async fn test_write_missing_content() {
        let workspace = Workspace::new(Arc::new(MemorySandbox::new()));
        let err = WriteFileHandler
            .execute(&workspace, serde_json::json!({"path": "a.ts"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::MissingParameter(ref p) if p == "content"));
    }

    #[tokio::test]
    async fn test_write_outside_workspace() {
        let workspace = Workspace::new(Arc::new(MemorySandbox::new()));
        let err = WriteFileHandler
            .execute(&workspace, serde_json::json!({"path": "../x", "content": ""}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied(_)));
    }
}
