// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Run command tool handler.
//!
//! Commands run inside the sandbox, never on the host directly. Output is
//! stdout and stderr merged in arrival order.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

#[cfg(feature = "telemetry")]
use tracing::{debug, instrument};

use super::require;
use crate::error::ToolError;
use crate::tools::registry::{ToolHandler, ToolOutput};
use crate::tools::{parse_arguments, truncate_output, MAX_OUTPUT_LINES};
use crate::types::{InputSchema, ToolDefinition};
use crate::workspace::Workspace;

/// Handler for the `run_command` tool.
pub struct RunCommandHandler;

#[derive(Debug, Deserialize)]
struct RunCommandArgs {
    command: String,

    #[serde(default)]
    args: Option<Vec<String>>,

    #[serde(default)]
    env: Option<HashMap<String, String>>,
}

impl RunCommandArgs {
    /// Program and argument list. Without explicit `args` the command
    /// string is split on whitespace.
    fn program(&self) -> Result<(String, Vec<String>), ToolError> {
        match &self.args {
            Some(args) => Ok((self.command.trim().to_string(), args.clone())),
            None => {
                let mut parts = self.command.split_whitespace().map(str::to_string);
                let program = parts
                    .next()
                    .ok_or_else(|| ToolError::MissingParameter("command".to_string()))?;
                Ok((program, parts.collect()))
            }
        }
    }
}

#[async_trait]
impl ToolHandler for RunCommandHandler {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "run_command",
            "Run a command in the workspace sandbox and return its combined output and exit code.",
        )
        .with_schema(
            InputSchema::new()
                .with_property("command", serde_json::json!({
                    "type": "string",
                    "description": "Program to run. Without `args`, split on whitespace into program and arguments"
                }))
                .with_property("args", serde_json::json!({
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Arguments passed to the program verbatim"
                }))
                .with_property("env", serde_json::json!({
                    "type": "object",
                    "additionalProperties": { "type": "string" },
                    "description": "Extra environment variables"
                }))
                .with_required(vec!["command".to_string()]),
        )
    }

    fn is_mutating(&self) -> bool {
        true
    }

    #[cfg_attr(feature = "telemetry", instrument(skip(self, workspace, input), fields(command, exit_code)))]
    async fn execute(
        &self,
        workspace: &Workspace,
        input: serde_json::Value,
    ) -> Result<ToolOutput, ToolError> {
        let args: RunCommandArgs = parse_arguments(&input)?;
        require("command", &args.command)?;
        let (program, argv) = args.program()?;
        let env = args.env.unwrap_or_default();

        let result = workspace.run_command(&program, &argv, &env).await?;

        #[cfg(feature = "telemetry")]
        {
            let span = tracing::Span::current();
            span.record("command", result.command.as_str());
            span.record("exit_code", result.exit_code);
            debug!(command = %result.command, exit_code = result.exit_code, bytes = result.output.len(), "Command finished");
        }

        let mut content = truncate_output(&result.output, MAX_OUTPUT_LINES);
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(&format!("[exit code: {}]", result.exit_code));

        Ok(ToolOutput::success(
            content,
            format!("Ran {} (exit {})", result.command, result.exit_code),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::{CommandResult, MemorySandbox};
    use std::sync::Arc;

    fn workspace() -> Workspace {
        Workspace::new(Arc::new(
            MemorySandbox::new()
                .with_file("a.txt", "hello\n")
                .with_command("npm", |args, _env| {
                    if args.first().map(String::as_str) == Some("test") {
                        CommandResult::failed("1 failing\n", 1)
                    } else {
                        CommandResult::ok("ok\n")
                    }
                }),
        ))
    }

    #[tokio::test]
    async fn test_split_command_line() {
        let output = RunCommandHandler
            .execute(&workspace(), serde_json::json!({"command": "echo hi there"}))
            .await
            .unwrap();
        assert_eq!(output.content, "hi there\n[exit code: 0]");
        assert_eq!(output.status, "Ran echo hi there (exit 0)");
    }

    #[tokio::test]
    async fn test_explicit_args_and_nonzero_exit() {
        let output = RunCommandHandler
            .execute(
                &workspace(),
                serde_json::json!({"command": "npm", "args": ["test"]}),
            )
            .await
            .unwrap();
        assert!(output.success);
        assert_eq!(output.content, "1 failing\n[exit code: 1]");
        assert_eq!(output.status, "Ran npm test (exit 1)");
    }

    #[tokio::test]
    async fn test_env_injection() {
        let output = RunCommandHandler
            .execute(
                &workspace(),
                serde_json::json!({"command": "env", "env": {"MODE": "ci"}}),
            )
            .await
            .unwrap();
        assert!(output.content.contains("MODE=ci"));
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let output = RunCommandHandler
            .execute(&workspace(), serde_json::json!({"command": "cargo build"}))
            .await
            .unwrap();
        assert!(output.content.ends_with("[exit code: 127]"));
    }

    #[tokio::test]
    async fn test_blank_command() {
        let err = RunCommandHandler
            .execute(&workspace(), serde_json::json!({"command": "  "}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::MissingParameter(_)));
    }
}
