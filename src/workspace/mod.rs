// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Sandboxed workspace facade.
//!
//! [`Workspace`] owns the lifecycle of one sandbox instance and is the only
//! way the rest of the crate reaches files or processes. Every tool is built
//! from the primitives here.
//!
//! # Lifecycle
//!
//! The sandbox boots lazily on the first [`Workspace::acquire`]. Concurrent
//! callers that arrive while a boot is in flight await that same attempt.
//! A successful boot is kept until [`Workspace::teardown`]. A failed boot
//! is forgotten so the next call starts over.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sandpiper::workspace::{MemorySandbox, Workspace};
//!
//! let sandbox = MemorySandbox::new().with_file("a.ts", "export {}");
//! let workspace = Workspace::new(Arc::new(sandbox));
//! let files = workspace.list_files("**/*", ".", false).await?;
//! ```

pub mod glob;
pub mod ignore;
pub mod local;
pub mod memory;
pub mod sandbox;
pub mod search;

pub use glob::compile_glob;
pub use ignore::{GitignoreRule, IgnoreRules, DEFAULT_IGNORE_RULES, IGNORE_FILE};
pub use local::LocalSandbox;
pub use memory::{CommandResult, MemorySandbox};
pub use sandbox::{DirEntry, SandboxHandle, SandboxRuntime, SpawnedProcess};
pub use search::{GrepOptions, SearchMatch, SearchResults, DEFAULT_MAX_RESULTS, NO_MATCHES};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

use crate::error::{BootError, WorkspaceError};
use search::{build_search_regex, DEFAULT_FILE_PATTERN};

type BootResult = Result<Arc<dyn SandboxHandle>, BootError>;
type BootFuture = Shared<BoxFuture<'static, BootResult>>;

enum Slot {
    Empty,
    Booting { generation: u64, future: BootFuture },
    Ready(Arc<dyn SandboxHandle>),
}

struct SlotState {
    slot: Slot,
    next_generation: u64,
    /// Every generation at or below this was discarded by a teardown.
    torn_down_through: u64,
    /// Boots superseded mid-flight whose handle still needs a teardown.
    abandoned: Vec<u64>,
}

/// Single point of access to one sandbox instance.
pub struct Workspace {
    runtime: Arc<dyn SandboxRuntime>,
    state: Mutex<SlotState>,
}

impl Workspace {
    /// Create a workspace over the given runtime. Nothing boots until first use.
    pub fn new(runtime: Arc<dyn SandboxRuntime>) -> Self {
        Self {
            runtime,
            state: Mutex::new(SlotState {
                slot: Slot::Empty,
                next_generation: 0,
                torn_down_through: 0,
                abandoned: Vec::new(),
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a booted handle is currently held.
    pub fn is_ready(&self) -> bool {
        matches!(self.lock_state().slot, Slot::Ready(_))
    }

    /// Get the shared sandbox handle, booting it if needed.
    ///
    /// A boot that a [`teardown`](Self::teardown) overtook is never handed
    /// out: its handle is torn down once and the caller boots again.
    pub async fn acquire(&self) -> Result<Arc<dyn SandboxHandle>, BootError> {
        loop {
            let (generation, future) = {
                let mut state = self.lock_state();
                match &state.slot {
                    Slot::Ready(handle) => return Ok(Arc::clone(handle)),
                    Slot::Booting { generation, future } => (*generation, future.clone()),
                    Slot::Empty => {
                        if !self.runtime.is_cross_origin_isolated() {
                            warn!("Sandbox boot refused: cross-origin isolation unavailable");
                            return Err(BootError::IsolationUnavailable);
                        }
                        state.next_generation += 1;
                        let generation = state.next_generation;
                        let future = boot_future(Arc::clone(&self.runtime));
                        state.slot = Slot::Booting {
                            generation,
                            future: future.clone(),
                        };
                        (generation, future)
                    }
                }
            };

            let result = future.await;

            let owns_abandoned = {
                let mut state = self.lock_state();
                if generation <= state.torn_down_through {
                    let position = state.abandoned.iter().position(|g| *g == generation);
                    Some(position.map(|i| state.abandoned.swap_remove(i)).is_some())
                } else {
                    let still_current = matches!(
                        &state.slot,
                        Slot::Booting { generation: g, .. } if *g == generation
                    );
                    if still_current {
                        state.slot = match &result {
                            Ok(handle) => Slot::Ready(Arc::clone(handle)),
                            Err(_) => Slot::Empty,
                        };
                    }
                    None
                }
            };

            match (owns_abandoned, result) {
                (None, result) => return result,
                (Some(_), Err(err)) => return Err(err),
                (Some(owner), Ok(handle)) => {
                    if owner {
                        info!(generation, "Tearing down sandbox booted after teardown");
                        handle.teardown().await;
                    }
                }
            }
        }
    }

    /// Discard the sandbox. The next [`acquire`](Self::acquire) boots a fresh one.
    pub async fn teardown(&self) {
        let previous = {
            let mut state = self.lock_state();
            state.torn_down_through = state.next_generation;
            let previous = std::mem::replace(&mut state.slot, Slot::Empty);
            if let Slot::Booting { generation, .. } = &previous {
                state.abandoned.push(*generation);
            }
            previous
        };
        if let Slot::Ready(handle) = previous {
            info!("Tearing down sandbox");
            handle.teardown().await;
        }
    }

    /// Read a file as text.
    pub async fn read_file(&self, path: &str) -> Result<String, WorkspaceError> {
        let path = normalize_path(path)?;
        let handle = self.acquire().await?;
        handle.read_file(&path).await
    }

    /// Create or overwrite a file.
    pub async fn write_file(&self, path: &str, contents: &str) -> Result<(), WorkspaceError> {
        let path = normalize_path(path)?;
        if path.is_empty() {
            return Err(WorkspaceError::InvalidPath("cannot write to the workspace root".to_string()));
        }
        let handle = self.acquire().await?;
        handle.write_file(&path, contents).await
    }

    /// Recursively list files under `base_path` whose path relative to
    /// `base_path` matches `pattern`.
    ///
    /// Hidden entries are skipped unless `include_hidden` is set, and
    /// anything matching the ignore rules is skipped. Directories are
    /// descended regardless of the pattern. Returned paths are relative to
    /// the workspace root and sorted.
    pub async fn list_files(
        &self,
        pattern: &str,
        base_path: &str,
        include_hidden: bool,
    ) -> Result<Vec<String>, WorkspaceError> {
        let base = normalize_path(base_path)?;
        let matcher = compile_glob(pattern)?;
        let handle = self.acquire().await?;
        let ignore = IgnoreRules::load(handle.as_ref()).await;

        let mut files = Vec::new();
        let mut pending = vec![base.clone()];

        while let Some(dir) = pending.pop() {
            let entries = match handle.read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if dir == base => return Err(err),
                Err(err) => {
                    debug!(dir = %dir, error = %err, "Skipping unreadable directory");
                    continue;
                }
            };

            for entry in entries {
                if !include_hidden && entry.name.starts_with('.') {
                    continue;
                }
                let path = join_path(&dir, &entry.name);
                if ignore.is_ignored(&path, entry.is_dir) {
                    continue;
                }
                if entry.is_dir {
                    pending.push(path);
                } else if matcher.is_match(relative_to(&path, &base)) {
                    files.push(path);
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// Search file contents for a literal term.
    pub async fn grep_search(
        &self,
        pattern: &str,
        options: &GrepOptions,
    ) -> Result<SearchResults, WorkspaceError> {
        let regex = build_search_regex(pattern, options)?;
        let file_pattern = options
            .file_pattern
            .as_deref()
            .unwrap_or(DEFAULT_FILE_PATTERN);
        let files = self.list_files(file_pattern, ".", false).await?;
        let handle = self.acquire().await?;

        let mut results = SearchResults::new(options.max_results);
        'files: for path in files {
            let content = match handle.read_file(&path).await {
                Ok(content) => content,
                Err(err) => {
                    debug!(path = %path, error = %err, "Skipping unreadable file");
                    continue;
                }
            };

            for (index, line) in content.lines().enumerate() {
                if !regex.is_match(line) {
                    continue;
                }
                let found = SearchMatch {
                    path: path.clone(),
                    line_number: index + 1,
                    text: line.trim_end().to_string(),
                };
                if !results.push(found) {
                    break 'files;
                }
            }
        }

        Ok(results)
    }

    /// Start a process and return immediately with a live handle.
    pub async fn spawn_command(
        &self,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> Result<ProcessHandle, WorkspaceError> {
        let handle = self.acquire().await?;
        debug!(command, ?args, "Spawning process");
        let process = handle.spawn(command, args, env).await?;
        Ok(ProcessHandle::new(command_line(command, args), process))
    }

    /// Run a process to completion and return everything it printed.
    ///
    /// A non-zero exit is logged, not raised; callers inspect the output.
    pub async fn run_command(
        &self,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> Result<CommandOutput, WorkspaceError> {
        let process = self.spawn_command(command, args, env).await?;
        let output = process.collect().await;
        if output.exit_code != 0 {
            warn!(
                command = %output.command,
                exit_code = output.exit_code,
                "Command exited with non-zero status"
            );
        }
        Ok(output)
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("ready", &self.is_ready())
            .finish()
    }
}

fn boot_future(runtime: Arc<dyn SandboxRuntime>) -> BootFuture {
    async move {
        info!("Booting sandbox");
        #[cfg(feature = "telemetry")]
        let start = std::time::Instant::now();

        let result = runtime.boot().await;

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("workspace.boot", start.elapsed());

        match &result {
            Ok(_) => info!("Sandbox ready"),
            Err(err) => warn!(error = %err, "Sandbox boot failed"),
        }
        result
    }
    .boxed()
    .shared()
}

/// Everything a finished process printed, plus its exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub command: String,
    pub output: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A running process.
#[derive(Debug)]
pub struct ProcessHandle {
    command: String,
    output: mpsc::UnboundedReceiver<String>,
    exit: oneshot::Receiver<i32>,
}

impl ProcessHandle {
    fn new(command: String, process: SpawnedProcess) -> Self {
        Self {
            command,
            output: process.output,
            exit: process.exit,
        }
    }

    /// The command line this process was started with.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Next chunk of output, or `None` once the process stops writing.
    pub async fn next_output(&mut self) -> Option<String> {
        self.output.recv().await
    }

    /// Wait for the exit code, discarding unread output.
    ///
    /// A process whose runtime vanished without reporting is treated as -1.
    pub async fn wait(self) -> i32 {
        self.exit.await.unwrap_or(-1)
    }

    /// Drain all output and wait for exit.
    pub async fn collect(mut self) -> CommandOutput {
        let mut output = String::new();
        while let Some(chunk) = self.output.recv().await {
            output.push_str(&chunk);
        }
        let exit_code = self.exit.await.unwrap_or(-1);
        CommandOutput {
            command: self.command,
            output,
            exit_code,
        }
    }
}

/// Normalize a workspace path to root-relative form.
///
/// Leading `/` and `./` are accepted, `.` segments are dropped, and `..` is
/// rejected. The root normalizes to the empty string.
pub fn normalize_path(path: &str) -> Result<String, WorkspaceError> {
    let mut parts = Vec::new();
    for segment in path.trim().split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(WorkspaceError::InvalidPath(format!(
                    "{path} escapes the workspace root"
                )))
            }
            s => parts.push(s),
        }
    }
    Ok(parts.join("/"))
}

fn join_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

fn relative_to<'a>(path: &'a str, base: &str) -> &'a str {
    if base.is_empty() {
        return path;
    }
    path.strip_prefix(base)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(path)
}

fn command_line(command: &str, args: &[String]) -> String {
    if args.is_empty() {
        command.to_string()
    } else {
        format!("{command} {}", args.join(" "))
    }
}
