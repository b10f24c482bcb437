// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Agent module - the round-trip loop.
//!
//! The agent owns the conversation and drives it: send the transcript to the
//! provider, run the tools it asks for against the workspace, send the
//! results back, and repeat until the provider stops asking for tools or a
//! loop bound is hit.
//!
//! Protocol details stay behind [`ProtocolAdapter`]; the agent only sees
//! [`ParsedReply`](crate::types::ParsedReply) values.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sandpiper::agent::{Agent, AgentCallbacks, AgentConfig};
//! use sandpiper::tools::ToolRegistry;
//! use sandpiper::workspace::{LocalSandbox, Workspace};
//!
//! let workspace = Arc::new(Workspace::new(Arc::new(LocalSandbox::new("."))));
//! let registry = Arc::new(ToolRegistry::with_defaults(workspace));
//! let mut agent = Agent::new(adapter, transport, registry, AgentConfig::default(), AgentCallbacks::default());
//!
//! let report = agent.submit("What does src/main.rs do?").await?;
//! println!("{}", report.reply);
//! ```

pub mod loop_state;
pub mod prompt;
mod types;

pub use loop_state::{
    LoopState, Repetition, RepetitionPolicy, MAX_IDENTICAL_READS, MAX_ROUND_TRIPS,
    MAX_SAME_PATH_WRITES, REPETITION_WINDOW,
};
pub use prompt::{build_system_prompt, MAX_PROMPT_FILES};
pub use types::{
    AgentCallbacks, AgentConfig, AgentEvent, AgentPhase, RunOutcome, RunReport, TurnStats,
    TurnToolCall,
};

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

use crate::error::{AgentError, BootError, WorkspaceError};
use crate::providers::{BoxedAdapter, ProviderTransport};
use crate::tools::{ToolOutput, ToolRegistry};
use crate::types::{ContentBlock, Conversation, Role, Turn};

/// Placeholder for a reply with neither text nor tool calls.
pub const EMPTY_REPLY: &str = "(no response)";

/// Final turn after a user cancel.
pub const STOPPED_NOTICE: &str = "Stopped by user.";

/// Final turn when the repetition guard trips.
pub const REPETITION_NOTICE: &str =
    "The task appears to be complete; stopping because the same tool calls kept repeating.";

/// Result text for a call skipped because the run was cancelled first.
pub const CANCELLED_CALL: &str = "Cancelled by user before execution.";

/// Result text for calls skipped by the repetition guard.
pub const SKIPPED_CALL: &str = "Skipped: this call repeats earlier calls without progress.";

/// Notice appended when the round-trip cap is reached.
pub fn round_trip_limit_notice(limit: usize) -> String {
    format!("(Reached the limit of {limit} round-trips; stopping here.)")
}

/// A tool call with its id assigned.
#[derive(Debug, Clone)]
struct PendingCall {
    id: String,
    name: String,
    arguments: serde_json::Value,
}

/// Drives one conversation against one workspace.
pub struct Agent {
    adapter: BoxedAdapter,
    transport: Arc<dyn ProviderTransport>,
    registry: Arc<ToolRegistry>,
    config: AgentConfig,
    callbacks: AgentCallbacks,
    conversation: Conversation,
    phase: AgentPhase,
}

impl Agent {
    pub fn new(
        adapter: BoxedAdapter,
        transport: Arc<dyn ProviderTransport>,
        registry: Arc<ToolRegistry>,
        config: AgentConfig,
        callbacks: AgentCallbacks,
    ) -> Self {
        Self {
            adapter,
            transport,
            registry,
            config,
            callbacks,
            conversation: Conversation::new(),
            phase: AgentPhase::Idle,
        }
    }

    /// The conversation so far, for display.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn phase(&self) -> AgentPhase {
        self.phase
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Name and model of the protocol in use.
    pub fn provider_label(&self) -> String {
        format!("{} ({})", self.adapter.name(), self.adapter.model())
    }

    /// Forget the conversation. The workspace is untouched.
    pub fn clear(&mut self) {
        self.conversation = Conversation::new();
        self.set_phase(AgentPhase::Idle);
    }

    /// Run one user submission to completion.
    pub async fn submit(&mut self, text: &str) -> Result<RunReport, AgentError> {
        let (_keep_open, cancel) = watch::channel(false);
        self.submit_with_cancel(text, cancel).await
    }

    /// Run one user submission, stopping early when `cancel` becomes true.
    ///
    /// Provider failures, cancellation and loop bounds all end the run with
    /// an ordinary assistant turn and an `Ok` report. Only a sandbox that
    /// cannot boot is returned as `Err`.
    pub async fn submit_with_cancel(
        &mut self,
        text: &str,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<RunReport, AgentError> {
        let start = Instant::now();
        let mut stats = TurnStats::default();

        self.append(Turn::user(text));

        let system_prompt = match self.system_prompt().await {
            Ok(prompt) => prompt,
            Err(err) => {
                warn!(error = %err, "Workspace unavailable, abandoning submission");
                self.append(Turn::assistant(format!("Error: {err}")));
                self.set_phase(AgentPhase::Done);
                self.set_phase(AgentPhase::Idle);
                return Err(AgentError::Workspace(err));
            }
        };
        let tools = self.registry.definitions();
        let mut state = LoopState::new(self.config.max_round_trips, self.config.repetition.clone());
        let mut last_text = String::new();

        let (outcome, reply) = loop {
            if is_cancelled(&cancel) {
                break self.stop_cancelled();
            }

            if !state.begin_round_trip() {
                info!(limit = state.max_round_trips(), "Round-trip limit reached");
                let notice = round_trip_limit_notice(state.max_round_trips());
                self.append(Turn::assistant(notice.clone()));
                let reply = if last_text.is_empty() {
                    notice
                } else {
                    format!("{last_text}\n\n{notice}")
                };
                break (
                    RunOutcome::Truncated {
                        round_trips: state.round_trips(),
                    },
                    reply,
                );
            }

            self.set_phase(AgentPhase::AwaitingReply);
            debug!(
                round_trip = state.round_trips(),
                turns = self.conversation.len(),
                provider = self.adapter.name(),
                "Sending provider request"
            );
            let request =
                self.adapter
                    .serialize_request(&system_prompt, self.conversation.turns(), &tools);

            #[cfg(feature = "telemetry")]
            let request_start = Instant::now();

            let sent = tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => None,
                result = self.transport.send(&request) => Some(result),
            };
            let Some(result) = sent else {
                debug!("Provider request aborted by cancel");
                break self.stop_cancelled();
            };

            #[cfg(feature = "telemetry")]
            GLOBAL_METRICS.record_operation("provider.request", request_start.elapsed());

            let parsed = match result.and_then(|body| self.adapter.parse_reply(body)) {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!(error = %err, provider = self.adapter.name(), "Provider request failed");
                    let message = err.to_string();
                    let notice = format!("Error: {message}");
                    self.append(Turn::assistant(notice.clone()));
                    break (RunOutcome::ProviderFailed { message }, notice);
                }
            };

            if let Some(usage) = parsed.usage {
                stats.input_tokens += u64::from(usage.input_tokens);
                stats.output_tokens += u64::from(usage.output_tokens);
                stats.total_tokens = stats.input_tokens + stats.output_tokens;
            }

            if let Some(on_text) = &self.callbacks.on_text {
                for fragment in parsed.text_fragments.iter().filter(|f| !f.is_empty()) {
                    on_text(fragment);
                }
            }

            let calls: Vec<PendingCall> = parsed
                .tool_calls
                .into_iter()
                .map(|call| PendingCall {
                    id: call.id.unwrap_or_else(new_call_id),
                    name: call.name,
                    arguments: call.arguments,
                })
                .collect();

            let reply_text = parsed.text_fragments.concat();
            let mut blocks = Vec::with_capacity(calls.len() + 1);
            if !reply_text.is_empty() {
                blocks.push(ContentBlock::text(reply_text.clone()));
            }
            blocks.extend(
                calls
                    .iter()
                    .map(|c| ContentBlock::tool_call(&c.id, &c.name, c.arguments.clone())),
            );
            if blocks.is_empty() {
                blocks.push(ContentBlock::text(EMPTY_REPLY));
            }
            self.append(Turn::new(Role::Assistant, blocks));

            if calls.is_empty() {
                let reply = if reply_text.is_empty() {
                    EMPTY_REPLY.to_string()
                } else {
                    reply_text
                };
                break (RunOutcome::Completed, reply);
            }
            if !reply_text.is_empty() {
                last_text = reply_text;
            }

            let mut repetition = None;
            for call in &calls {
                let target = self.registry.write_target(&call.name, &call.arguments);
                if let Some(found) = state.record(&call.name, &call.arguments, target) {
                    repetition.get_or_insert(found);
                }
            }
            if let Some(found) = repetition {
                info!(reason = %found, "Stopping on repeated tool calls");
                let skipped = calls
                    .iter()
                    .map(|c| ContentBlock::tool_result(&c.id, SKIPPED_CALL, true))
                    .collect();
                self.append(Turn::tool_results(skipped));
                self.append(Turn::assistant(REPETITION_NOTICE));
                break (RunOutcome::RepetitionStopped, REPETITION_NOTICE.to_string());
            }

            self.set_phase(AgentPhase::ExecutingTools);
            let executed = join_all(calls.iter().map(|call| self.execute_call(call, &cancel))).await;

            let mut results = Vec::with_capacity(executed.len());
            for (block, call_stats) in executed {
                if let Some(call_stats) = call_stats {
                    stats.tool_call_count += 1;
                    stats.tool_calls.push(call_stats);
                }
                results.push(block);
            }
            self.append(Turn::tool_results(results));
        };

        stats.round_trips = state.round_trips();
        stats.duration_ms = start.elapsed().as_millis() as u64;

        #[cfg(feature = "telemetry")]
        {
            GLOBAL_METRICS.record_operation("agent.submit", start.elapsed());
            GLOBAL_METRICS.record_tokens(stats.input_tokens, stats.output_tokens);
        }

        if outcome != RunOutcome::Cancelled {
            self.set_phase(AgentPhase::Done);
        }
        if let Some(on_turn_complete) = &self.callbacks.on_turn_complete {
            on_turn_complete(&stats);
        }
        self.set_phase(AgentPhase::Idle);

        Ok(RunReport {
            outcome,
            reply,
            stats,
        })
    }

    /// System prompt over a fresh workspace listing.
    async fn system_prompt(&self) -> Result<String, BootError> {
        let files = match self
            .registry
            .workspace()
            .list_files("**/*", ".", true)
            .await
        {
            Ok(files) => files,
            Err(WorkspaceError::Boot(err)) => return Err(err),
            Err(err) => {
                warn!(error = %err, "Could not list workspace files for the prompt");
                Vec::new()
            }
        };
        Ok(build_system_prompt(
            &files,
            self.config.prompt_file_limit,
            self.config.system_prompt_additions.as_deref(),
        ))
    }

    /// Run one call unless the run was cancelled first.
    async fn execute_call(
        &self,
        call: &PendingCall,
        cancel: &watch::Receiver<bool>,
    ) -> (ContentBlock, Option<TurnToolCall>) {
        if is_cancelled(cancel) {
            return (ContentBlock::tool_result(&call.id, CANCELLED_CALL, true), None);
        }

        if let Some(on_tool_call) = &self.callbacks.on_tool_call {
            on_tool_call(&call.id, &call.name, &call.arguments);
        }

        let start = Instant::now();
        let output = match self.registry.dispatch(&call.name, call.arguments.clone()).await {
            Ok(dispatched) => dispatched.output,
            Err(err) => {
                warn!(tool = %call.name, "Model requested an unknown tool");
                ToolOutput::from(err)
            }
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let is_error = !output.success;
        let content = if is_error {
            format!("Error: {}", output.content)
        } else {
            output.content
        };

        if let Some(on_tool_status) = &self.callbacks.on_tool_status {
            on_tool_status(&call.id, &call.name, &output.status);
        }
        if let Some(on_tool_result) = &self.callbacks.on_tool_result {
            on_tool_result(&call.id, &call.name, &content, is_error);
        }

        (
            ContentBlock::tool_result(&call.id, content, is_error),
            Some(TurnToolCall {
                name: call.name.clone(),
                duration_ms,
                is_error,
            }),
        )
    }

    fn stop_cancelled(&mut self) -> (RunOutcome, String) {
        info!("Run cancelled by user");
        self.append(Turn::assistant(STOPPED_NOTICE));
        self.set_phase(AgentPhase::Cancelled);
        (RunOutcome::Cancelled, STOPPED_NOTICE.to_string())
    }

    fn append(&mut self, turn: Turn) {
        let turn = self.conversation.push(turn);
        if let Some(on_turn_appended) = &self.callbacks.on_turn_appended {
            on_turn_appended(turn);
        }
    }

    fn set_phase(&mut self, phase: AgentPhase) {
        if self.phase == phase {
            return;
        }
        self.phase = phase;
        if let Some(on_phase) = &self.callbacks.on_phase {
            on_phase(phase);
        }
    }
}

fn new_call_id() -> String {
    format!("call_{}", Uuid::new_v4().simple())
}

fn is_cancelled(cancel: &watch::Receiver<bool>) -> bool {
    *cancel.borrow()
}

/// Resolves once the flag turns true. Never resolves if the sender is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    while !*cancel.borrow_and_update() {
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
