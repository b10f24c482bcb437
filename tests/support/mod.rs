// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Shared helpers for integration tests: a scripted provider transport and
//! reply builders for both protocols.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use sandpiper::agent::{Agent, AgentCallbacks, AgentConfig};
use sandpiper::providers::{AnthropicAdapter, BoxedAdapter, GeminiAdapter, ProviderTransport};
use sandpiper::tools::ToolRegistry;
use sandpiper::workspace::{MemorySandbox, Workspace};
use sandpiper::{ProviderConfig, ProviderError};

type Script = Box<dyn Fn(usize, &Value) -> Result<Value, ProviderError> + Send + Sync>;

/// Transport that answers from a script and records every request.
pub struct ScriptedTransport {
    script: Script,
    requests: Mutex<Vec<Value>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    /// Answer the nth request with the nth reply. Running out is a test bug.
    pub fn replies(replies: Vec<Value>) -> Arc<Self> {
        Self::from_fn(move |n, _| {
            replies
                .get(n)
                .cloned()
                .ok_or_else(|| ProviderError::ParseError(format!("script exhausted at request {n}")))
        })
    }

    /// Answer every request with the same reply.
    pub fn repeating(reply: Value) -> Arc<Self> {
        Self::from_fn(move |_, _| Ok(reply.clone()))
    }

    /// Answer with a function of the request index and body.
    pub fn from_fn<F>(f: F) -> Arc<Self>
    where
        F: Fn(usize, &Value) -> Result<Value, ProviderError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            script: Box::new(f),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn request_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Value {
        self.requests().last().cloned().expect("no requests recorded")
    }
}

#[async_trait]
impl ProviderTransport for ScriptedTransport {
    async fn send(&self, request: &Value) -> Result<Value, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        (self.script)(n, request)
    }
}

// ============================================================================
// Anthropic-shaped replies
// ============================================================================

pub fn text_reply(text: &str) -> Value {
    json!({
        "content": [{"type": "text", "text": text}],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 12, "output_tokens": 4}
    })
}

/// A reply requesting the given (id, name, input) calls.
pub fn tool_reply(calls: &[(&str, &str, Value)]) -> Value {
    let content: Vec<Value> = calls
        .iter()
        .map(|(id, name, input)| json!({"type": "tool_use", "id": id, "name": name, "input": input}))
        .collect();
    json!({"content": content, "stop_reason": "tool_use"})
}

// ============================================================================
// Gemini-shaped replies
// ============================================================================

pub fn gemini_text_reply(text: &str) -> Value {
    json!({
        "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}, "finishReason": "STOP"}]
    })
}

pub fn gemini_call_reply(name: &str, args: Value) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"functionCall": {"name": name, "args": args}}]},
            "finishReason": "STOP"
        }]
    })
}

// ============================================================================
// Agent construction
// ============================================================================

pub fn anthropic() -> BoxedAdapter {
    Arc::new(AnthropicAdapter::new("claude-test", &ProviderConfig::default()))
}

pub fn gemini() -> BoxedAdapter {
    Arc::new(GeminiAdapter::new("gemini-test", &ProviderConfig::default()))
}

/// Agent over an in-memory sandbox. The sandbox stays inspectable.
pub fn agent(
    adapter: BoxedAdapter,
    transport: Arc<ScriptedTransport>,
    sandbox: Arc<MemorySandbox>,
    config: AgentConfig,
    callbacks: AgentCallbacks,
) -> Agent {
    let workspace = Arc::new(Workspace::new(sandbox));
    let registry = Arc::new(ToolRegistry::with_defaults(workspace));
    Agent::new(adapter, transport, registry, config, callbacks)
}

/// Anthropic agent with default config and no callbacks.
pub fn simple_agent(transport: Arc<ScriptedTransport>, sandbox: Arc<MemorySandbox>) -> Agent {
    agent(
        anthropic(),
        transport,
        sandbox,
        AgentConfig::default(),
        AgentCallbacks::default(),
    )
}
