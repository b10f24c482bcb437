// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Agent types and configuration.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::loop_state::{RepetitionPolicy, MAX_ROUND_TRIPS};
use super::prompt::MAX_PROMPT_FILES;
use crate::types::Turn;

/// Where the agent is within a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentPhase {
    Idle,
    AwaitingReply,
    ExecutingTools,
    Done,
    Cancelled,
}

/// Statistics for a single submission (user text -> final reply).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnStats {
    /// Provider round-trips made.
    pub round_trips: usize,
    /// Number of tool calls executed.
    pub tool_call_count: usize,
    /// Input tokens used.
    pub input_tokens: u64,
    /// Output tokens generated.
    pub output_tokens: u64,
    /// Total tokens (input + output).
    pub total_tokens: u64,
    /// Duration of the submission in milliseconds.
    pub duration_ms: u64,
    /// Individual tool call stats.
    pub tool_calls: Vec<TurnToolCall>,
}

/// Statistics for a single tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnToolCall {
    /// Tool name.
    pub name: String,
    /// Duration in milliseconds.
    pub duration_ms: u64,
    /// Whether the tool call resulted in an error.
    pub is_error: bool,
}

/// How a submission ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The provider answered without requesting tools.
    Completed,
    /// The round-trip cap was reached.
    Truncated { round_trips: usize },
    /// The repetition guard stopped the loop.
    RepetitionStopped,
    /// The user cancelled.
    Cancelled,
    /// A provider request failed.
    ProviderFailed { message: String },
}

/// Summary returned by [`Agent::submit`](super::Agent::submit).
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Final assistant text shown to the user.
    pub reply: String,
    pub stats: TurnStats,
}

/// Callbacks for agent events.
///
/// Uses `Arc` so callbacks can be cloned into tool futures. All are
/// fire-and-forget.
#[derive(Clone, Default)]
pub struct AgentCallbacks {
    /// Reply text, as soon as a reply is parsed.
    pub on_text: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    /// A tool is about to run (call_id, tool_name, arguments).
    pub on_tool_call: Option<Arc<dyn Fn(&str, &str, &serde_json::Value) + Send + Sync>>,
    /// One-line status of a finished tool (call_id, tool_name, status).
    pub on_tool_status: Option<Arc<dyn Fn(&str, &str, &str) + Send + Sync>>,
    /// Tool output as sent back to the model (call_id, tool_name, output, is_error).
    pub on_tool_result: Option<Arc<dyn Fn(&str, &str, &str, bool) + Send + Sync>>,
    /// A turn was appended to the conversation.
    pub on_turn_appended: Option<Arc<dyn Fn(&Turn) + Send + Sync>>,
    /// The agent changed phase.
    pub on_phase: Option<Arc<dyn Fn(AgentPhase) + Send + Sync>>,
    /// A submission finished.
    pub on_turn_complete: Option<Arc<dyn Fn(&TurnStats) + Send + Sync>>,
}

/// Owned form of every callback, for consumers that prefer a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    Text(String),
    ToolCall {
        call_id: String,
        name: String,
        arguments: serde_json::Value,
    },
    ToolStatus {
        call_id: String,
        name: String,
        status: String,
    },
    ToolResult {
        call_id: String,
        name: String,
        output: String,
        is_error: bool,
    },
    TurnAppended(Turn),
    Phase(AgentPhase),
    TurnComplete(TurnStats),
}

impl AgentCallbacks {
    /// Callbacks that forward every event into an unbounded channel.
    ///
    /// Events sent after the receiver is dropped are discarded.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AgentEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let text = tx.clone();
        let call = tx.clone();
        let status = tx.clone();
        let result = tx.clone();
        let turn = tx.clone();
        let phase = tx.clone();
        let complete = tx;

        let callbacks = Self {
            on_text: Some(Arc::new(move |t: &str| {
                let _ = text.send(AgentEvent::Text(t.to_string()));
            })),
            on_tool_call: Some(Arc::new(move |id: &str, name: &str, args: &serde_json::Value| {
                let _ = call.send(AgentEvent::ToolCall {
                    call_id: id.to_string(),
                    name: name.to_string(),
                    arguments: args.clone(),
                });
            })),
            on_tool_status: Some(Arc::new(move |id: &str, name: &str, s: &str| {
                let _ = status.send(AgentEvent::ToolStatus {
                    call_id: id.to_string(),
                    name: name.to_string(),
                    status: s.to_string(),
                });
            })),
            on_tool_result: Some(Arc::new(move |id: &str, name: &str, output: &str, is_error: bool| {
                let _ = result.send(AgentEvent::ToolResult {
                    call_id: id.to_string(),
                    name: name.to_string(),
                    output: output.to_string(),
                    is_error,
                });
            })),
            on_turn_appended: Some(Arc::new(move |t: &Turn| {
                let _ = turn.send(AgentEvent::TurnAppended(t.clone()));
            })),
            on_phase: Some(Arc::new(move |p: AgentPhase| {
                let _ = phase.send(AgentEvent::Phase(p));
            })),
            on_turn_complete: Some(Arc::new(move |stats: &TurnStats| {
                let _ = complete.send(AgentEvent::TurnComplete(stats.clone()));
            })),
        };
        (callbacks, rx)
    }
}

impl std::fmt::Debug for AgentCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentCallbacks")
            .field("on_text", &self.on_text.is_some())
            .field("on_tool_call", &self.on_tool_call.is_some())
            .field("on_tool_status", &self.on_tool_status.is_some())
            .field("on_tool_result", &self.on_tool_result.is_some())
            .field("on_turn_appended", &self.on_turn_appended.is_some())
            .field("on_phase", &self.on_phase.is_some())
            .field("on_turn_complete", &self.on_turn_complete.is_some())
            .finish()
    }
}

/// Configuration for the agent loop.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Maximum provider round-trips per submission.
    pub max_round_trips: usize,
    /// Repetition guard thresholds.
    pub repetition: RepetitionPolicy,
    /// Extra text appended to the system prompt.
    pub system_prompt_additions: Option<String>,
    /// Maximum file paths listed in the system prompt.
    pub prompt_file_limit: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_round_trips: MAX_ROUND_TRIPS,
            repetition: RepetitionPolicy::default(),
            system_prompt_additions: None,
            prompt_file_limit: MAX_PROMPT_FILES,
        }
    }
}
