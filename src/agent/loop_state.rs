// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Per-run loop bookkeeping.
//!
//! [`LoopState`] counts round-trips against the hard cap and remembers the
//! most recent tool invocations so the agent can stop a model that keeps
//! asking for the same thing without making progress.

use std::collections::VecDeque;

use serde::Serialize;

/// Hard cap on provider round-trips per user submission.
pub const MAX_ROUND_TRIPS: usize = 10;

/// Number of recent tool invocations remembered by the repetition guard.
pub const REPETITION_WINDOW: usize = 8;

/// Identical non-write invocations (with no write in between) that stop a run.
pub const MAX_IDENTICAL_READS: usize = 3;

/// Writes to one path within the window that stop a run.
pub const MAX_SAME_PATH_WRITES: usize = 3;

/// Thresholds for the repetition guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepetitionPolicy {
    pub window: usize,
    pub max_identical_reads: usize,
    pub max_same_path_writes: usize,
}

impl Default for RepetitionPolicy {
    fn default() -> Self {
        Self {
            window: REPETITION_WINDOW,
            max_identical_reads: MAX_IDENTICAL_READS,
            max_same_path_writes: MAX_SAME_PATH_WRITES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Invocation {
    /// Any call that writes no file, keyed by name and canonical arguments.
    Other(String),
    /// A file write, keyed by normalized path.
    Write(String),
}

/// Why the repetition guard stopped a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Repetition {
    IdenticalCall { tool: String, count: usize },
    SamePathWrite { path: String, count: usize },
}

impl std::fmt::Display for Repetition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IdenticalCall { tool, count } => {
                write!(f, "{tool} called {count} times with identical arguments")
            }
            Self::SamePathWrite { path, count } => write!(f, "{path} written {count} times"),
        }
    }
}

/// Mutable counters for one submission.
#[derive(Debug)]
pub struct LoopState {
    policy: RepetitionPolicy,
    max_round_trips: usize,
    round_trips: usize,
    recent: VecDeque<Invocation>,
}

impl LoopState {
    pub fn new(max_round_trips: usize, policy: RepetitionPolicy) -> Self {
        Self {
            recent: VecDeque::with_capacity(policy.window),
            policy,
            max_round_trips,
            round_trips: 0,
        }
    }

    /// Count a new round-trip. Returns false once the cap is spent.
    pub fn begin_round_trip(&mut self) -> bool {
        if self.round_trips >= self.max_round_trips {
            return false;
        }
        self.round_trips += 1;
        true
    }

    /// Round-trips started so far.
    pub fn round_trips(&self) -> usize {
        self.round_trips
    }

    pub fn max_round_trips(&self) -> usize {
        self.max_round_trips
    }

    /// Record one invocation and report whether it trips the guard.
    ///
    /// `write_target` is the normalized path for file writes and `None` for
    /// everything else.
    pub fn record(
        &mut self,
        name: &str,
        arguments: &serde_json::Value,
        write_target: Option<String>,
    ) -> Option<Repetition> {
        let invocation = match write_target {
            Some(path) => Invocation::Write(path),
            None => Invocation::Other(invocation_key(name, arguments)),
        };

        if self.recent.len() == self.policy.window {
            self.recent.pop_front();
        }
        self.recent.push_back(invocation.clone());

        match invocation {
            Invocation::Write(path) => {
                let count = self
                    .recent
                    .iter()
                    .filter(|i| matches!(i, Invocation::Write(p) if *p == path))
                    .count();
                (count >= self.policy.max_same_path_writes)
                    .then_some(Repetition::SamePathWrite { path, count })
            }
            Invocation::Other(key) => {
                // Only calls since the most recent write count.
                let count = self
                    .recent
                    .iter()
                    .rev()
                    .take_while(|i| !matches!(i, Invocation::Write(_)))
                    .filter(|i| matches!(i, Invocation::Other(k) if *k == key))
                    .count();
                (count >= self.policy.max_identical_reads).then(|| Repetition::IdenticalCall {
                    tool: name.to_string(),
                    count,
                })
            }
        }
    }
}

/// Name plus canonical argument text. Object keys serialize in sorted order.
fn invocation_key(name: &str, arguments: &serde_json::Value) -> String {
    format!("{name}:{}", canonical(arguments))
}

fn canonical(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let fields: Vec<String> = entries
                .into_iter()
                .map(|(k, v)| format!("{}:{}", serde_json::Value::String(k.clone()), canonical(v)))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        serde_json::Value::Array(items) => {
            let items: Vec<String> = items.iter().map(canonical).collect();
            format!("[{}]", items.join(","))
        }
        other => other.to_string(),
    }
}
