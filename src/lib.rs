// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Sandpiper - a coding agent that works inside a sandbox.
//!
//! A user types a request; the agent sends the conversation to an LLM,
//! runs the tools the model asks for against an isolated workspace, and
//! feeds the results back until the model is done.
//!
//! # Architecture
//!
//! - [`workspace`] - Sandboxed workspace facade: lazy single-flight boot,
//!   file I/O, glob listing, text search, process spawning
//! - [`providers`] - Protocol adapters (Anthropic tool_use, Gemini
//!   function_call) and the HTTP transport
//! - [`tools`] - The five workspace tools and their registry
//! - [`agent`] - The round-trip loop, loop bounds and repetition guard
//! - [`config`] - Configuration loading and merging
//! - [`telemetry`] - Tracing setup and metrics
//! - [`types`] - Conversation and tool types shared by everything above
//! - [`error`] - Error types and result aliases
//!
//! # Example
//!
//! ```rust,ignore
//! use std::path::Path;
//! use std::sync::Arc;
//! use sandpiper::agent::{Agent, AgentCallbacks};
//! use sandpiper::config::{load_config, CliOptions};
//! use sandpiper::providers::{create_adapter, create_transport};
//! use sandpiper::tools::ToolRegistry;
//! use sandpiper::workspace::{LocalSandbox, Workspace};
//!
//! let config = load_config(Path::new("."), CliOptions::default())?;
//! let adapter = create_adapter(&config)?;
//! let transport = create_transport(&config, adapter.as_ref())?;
//! let workspace = Arc::new(Workspace::new(Arc::new(LocalSandbox::new("."))));
//! let registry = Arc::new(ToolRegistry::with_defaults(workspace));
//!
//! let mut agent = Agent::new(adapter, transport, registry, config.agent_config(), AgentCallbacks::default());
//! let report = agent.submit("Add a README").await?;
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod providers;
pub mod telemetry;
pub mod tools;
pub mod types;
pub mod workspace;

// Re-export commonly used types at crate root
pub use agent::{Agent, AgentCallbacks, AgentConfig, AgentEvent, AgentPhase, RunOutcome, RunReport};
pub use error::{AgentError, BootError, ConfigError, ProviderError, Result, ToolError, WorkspaceError};
pub use providers::{ProtocolAdapter, ProviderTransport, ProviderType};
pub use tools::{ToolOutput, ToolRegistry};
pub use types::{
    ContentBlock, Conversation, ParsedReply, ProviderConfig, Role, TokenUsage, ToolCallRequest,
    ToolDefinition, Turn,
};
pub use workspace::Workspace;

/// Sandpiper version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_public_exports() {
        let turn = Turn::user("test");
        assert_eq!(turn.role, Role::User);
        assert_eq!("claude".parse::<ProviderType>(), Ok(ProviderType::Anthropic));
    }
}
