// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tool registry and handler trait.
//!
//! This module defines the core abstractions for the tool system:
//! - [`ToolHandler`] trait that all tools must implement
//! - [`ToolRegistry`] for managing and dispatching tool calls
//! - [`ToolOutput`] for returning results from tool execution

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(feature = "telemetry")]
use tracing::{debug, info_span, Instrument};

use crate::error::ToolError;
#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;
use crate::types::ToolDefinition;
use crate::workspace::Workspace;

/// Output from executing a tool.
///
/// `content` goes back to the model; `status` is the one-line summary shown
/// to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub content: String,
    pub status: String,
    pub success: bool,
}

impl ToolOutput {
    /// Create a successful output.
    pub fn success(content: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            status: status.into(),
            success: true,
        }
    }

    /// Create an error output. The status repeats the message.
    pub fn error(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            status: format!("Error: {content}"),
            content,
            success: false,
        }
    }

    /// Get a preview suitable for logging (truncated).
    pub fn log_preview(&self, max_bytes: usize) -> String {
        super::truncate_text(&self.content, max_bytes)
    }
}

impl From<ToolError> for ToolOutput {
    fn from(err: ToolError) -> Self {
        Self::error(err.to_string())
    }
}

/// Trait that all tool handlers must implement.
///
/// # Example
///
/// ```rust,ignore
/// struct MyTool;
///
/// #[async_trait]
/// impl ToolHandler for MyTool {
///     fn definition(&self) -> ToolDefinition {
///         ToolDefinition::new("my_tool", "Does something useful")
///     }
///
///     async fn execute(&self, workspace: &Workspace, input: serde_json::Value) -> Result<ToolOutput, ToolError> {
///         Ok(ToolOutput::success("Done!", "Did it"))
///     }
/// }
/// ```
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Get the tool definition (name, description, input schema).
    fn definition(&self) -> ToolDefinition;

    /// Returns true if this tool may mutate the workspace.
    fn is_mutating(&self) -> bool {
        false
    }

    /// The workspace path this call would write, if it is a file write.
    ///
    /// Used by the agent's repetition guard.
    fn write_target(&self, _input: &serde_json::Value) -> Option<String> {
        None
    }

    /// Execute the tool with the given input parameters.
    async fn execute(
        &self,
        workspace: &Workspace,
        input: serde_json::Value,
    ) -> Result<ToolOutput, ToolError>;
}

/// Registry of available tools, maps names to handlers.
pub struct ToolRegistry {
    workspace: Arc<Workspace>,
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
    /// Registration order, so definitions are stable across requests.
    order: Vec<String>,
}

impl ToolRegistry {
    /// Create a registry with the five workspace tools.
    pub fn with_defaults(workspace: Arc<Workspace>) -> Self {
        let mut builder = ToolRegistryBuilder::new();

        builder.register(super::handlers::ReadFileHandler);
        builder.register(super::handlers::WriteFileHandler);
        builder.register(super::handlers::ListFilesHandler);
        builder.register(super::handlers::GrepSearchHandler);
        builder.register(super::handlers::RunCommandHandler);

        builder.build(workspace)
    }

    /// The workspace every tool runs against.
    pub fn workspace(&self) -> &Arc<Workspace> {
        &self.workspace
    }

    /// Get a handler by tool name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Check if a tool exists.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Get all tool definitions, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.handlers.get(name))
            .map(|h| h.definition())
            .collect()
    }

    /// Get all tool names, in registration order.
    pub fn tool_names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// The path a call would write, if the named tool writes files.
    pub fn write_target(&self, tool_name: &str, input: &serde_json::Value) -> Option<String> {
        self.handlers.get(tool_name)?.write_target(input)
    }

    /// Dispatch a tool call and return the result.
    ///
    /// Handler failures are folded into an error [`ToolOutput`]; only an
    /// unknown tool name is returned as `Err`.
    pub async fn dispatch(
        &self,
        tool_name: &str,
        input: serde_json::Value,
    ) -> Result<DispatchResult, ToolError> {
        let handler = self
            .get(tool_name)
            .ok_or_else(|| ToolError::NotFound(tool_name.to_string()))?;

        #[cfg(feature = "telemetry")]
        debug!(tool = %tool_name, mutating = handler.is_mutating(), "Executing tool");

        let start = Instant::now();

        #[cfg(feature = "telemetry")]
        let result = handler
            .execute(&self.workspace, input)
            .instrument(info_span!("tool_execute", tool = %tool_name))
            .await;

        #[cfg(not(feature = "telemetry"))]
        let result = handler.execute(&self.workspace, input).await;

        let duration = start.elapsed();

        let output = match result {
            Ok(output) => output,
            Err(err) => ToolOutput::from(err),
        };

        #[cfg(feature = "telemetry")]
        {
            GLOBAL_METRICS.record_tool(tool_name, duration, output.success);
            debug!(
                tool = %tool_name,
                duration_ms = duration.as_secs_f64() * 1000.0,
                success = output.success,
                preview = %output.log_preview(crate::telemetry::LOG_PREVIEW_MAX_BYTES),
                "Tool execution finished"
            );
        }

        Ok(DispatchResult {
            tool_name: tool_name.to_string(),
            is_error: !output.success,
            output,
            duration,
        })
    }
}

/// Result of dispatching a tool call.
#[derive(Debug)]
pub struct DispatchResult {
    /// Name of the tool that was called
    pub tool_name: String,
    /// Output from the tool
    pub output: ToolOutput,
    /// Duration of execution
    pub duration: Duration,
    /// Whether the execution resulted in an error
    pub is_error: bool,
}

/// Builder for constructing a ToolRegistry.
pub struct ToolRegistryBuilder {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
    order: Vec<String>,
}

impl ToolRegistryBuilder {
    /// Create a new empty builder.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a tool handler. A later handler with the same name replaces
    /// the earlier one.
    pub fn register<T: ToolHandler + 'static>(&mut self, handler: T) -> &mut Self {
        self.register_arc(Arc::new(handler))
    }

    pub fn register_arc(&mut self, handler: Arc<dyn ToolHandler>) -> &mut Self {
        let name = handler.definition().name;
        if self.handlers.insert(name.clone(), handler).is_none() {
            self.order.push(name);
        }
        self
    }

    /// Build the final registry.
    pub fn build(self, workspace: Arc<Workspace>) -> ToolRegistry {
        ToolRegistry {
            workspace,
            handlers: self.handlers,
            order: self.order,
        }
    }
}

impl Default for ToolRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::MemorySandbox;
    use serde_json::json;

    struct MockTool {
        name: String,
    }

    #[async_trait]
    impl ToolHandler for MockTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new(&self.name, "A mock tool")
        }

        async fn execute(
            &self,
            _workspace: &Workspace,
            input: serde_json::Value,
        ) -> Result<ToolOutput, ToolError> {
            if input.get("fail").is_some() {
                return Err(ToolError::ExecutionFailed("asked to fail".to_string()));
            }
            Ok(ToolOutput::success("mock output", "Mocked"))
        }
    }

    fn workspace() -> Arc<Workspace> {
        Arc::new(Workspace::new(Arc::new(MemorySandbox::new())))
    }

    #[test]
    fn test_defaults_register_five_tools_in_order() {
        let registry = ToolRegistry::with_defaults(workspace());
        assert_eq!(
            registry.tool_names(),
            vec!["read_file", "write_file", "list_files", "grep_search", "run_command"]
        );
        assert_eq!(registry.definitions().len(), 5);
    }

    #[test]
    fn test_write_target() {
        let registry = ToolRegistry::with_defaults(workspace());
        assert_eq!(
            registry.write_target("write_file", &json!({"path": "./src/a.ts", "content": ""})),
            Some("src/a.ts".to_string())
        );
        assert_eq!(registry.write_target("read_file", &json!({"path": "a.ts"})), None);
        assert_eq!(registry.write_target("nope", &json!({})), None);
    }

    #[tokio::test]
    async fn test_dispatch_accepts_null_optionals() {
        let registry = ToolRegistry::with_defaults(workspace());
        let result = registry
            .dispatch(
                "grep_search",
                json!({"pattern": "foo", "case_sensitive": null, "max_results": null}),
            )
            .await
            .unwrap();
        assert!(result.output.success);

        let result = registry
            .dispatch("list_files", json!({"pattern": null, "include_hidden": null}))
            .await
            .unwrap();
        assert!(result.output.success);

        let result = registry
            .dispatch("run_command", json!({"command": "true", "args": null, "env": null}))
            .await
            .unwrap();
        assert!(result.output.success);
    }

    #[tokio::test]
    async fn test_dispatch_success_and_failure() {
        let mut builder = ToolRegistryBuilder::new();
        builder.register(MockTool {
            name: "mock".to_string(),
        });
        let registry = builder.build(workspace());

        let result = registry.dispatch("mock", json!({})).await.unwrap();
        assert!(!result.is_error);
        assert_eq!(result.output.status, "Mocked");

        let result = registry.dispatch("mock", json!({"fail": true})).await.unwrap();
        assert!(result.is_error);
        assert!(result.output.content.contains("asked to fail"));
        assert!(result.output.status.starts_with("Error:"));
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool() {
        let registry = ToolRegistryBuilder::new().build(workspace());
        let result = registry.dispatch("nonexistent", json!({})).await;
        assert!(matches!(result, Err(ToolError::NotFound(_))));
    }
}
