// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! In-memory sandbox runtime.
//!
//! A virtual filesystem and a handful of builtin commands, enough to drive
//! the agent end to end without a host filesystem. Boot behavior can be
//! tuned (delay, failures, missing isolation) and boots are counted.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::sandbox::{DirEntry, SandboxHandle, SandboxRuntime, SpawnedProcess};
use crate::error::{BootError, WorkspaceError};

/// What a scripted command returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub output: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            exit_code: 0,
        }
    }

    pub fn failed(output: impl Into<String>, exit_code: i32) -> Self {
        Self {
            output: output.into(),
            exit_code,
        }
    }
}

type ScriptedCommand = Arc<dyn Fn(&[String], &HashMap<String, String>) -> CommandResult + Send + Sync>;

#[derive(Debug, Default)]
struct FsState {
    files: BTreeMap<String, String>,
    dirs: BTreeSet<String>,
}

impl FsState {
    fn insert_file(&mut self, path: String, contents: String) {
        let mut parent = path.as_str();
        while let Some((dir, _)) = parent.rsplit_once('/') {
            self.dirs.insert(dir.to_string());
            parent = dir;
        }
        self.files.insert(path, contents);
    }

    fn is_dir(&self, path: &str) -> bool {
        path.is_empty() || self.dirs.contains(path)
    }
}

/// Shared filesystem, visible to both the runtime and every handle it boots.
#[derive(Debug, Default)]
struct MemoryFs {
    state: RwLock<FsState>,
}

impl MemoryFs {
    fn read<T>(&self, f: impl FnOnce(&FsState) -> T) -> T {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write<T>(&self, f: impl FnOnce(&mut FsState) -> T) -> T {
        f(&mut self.state.write().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Sandbox runtime backed by memory.
pub struct MemorySandbox {
    fs: Arc<MemoryFs>,
    commands: HashMap<String, ScriptedCommand>,
    isolated: bool,
    boot_delay: Duration,
    failures_remaining: AtomicUsize,
    boots: AtomicUsize,
    teardowns: Arc<AtomicUsize>,
}

impl MemorySandbox {
    pub fn new() -> Self {
        Self {
            fs: Arc::new(MemoryFs::default()),
            commands: HashMap::new(),
            isolated: true,
            boot_delay: Duration::ZERO,
            failures_remaining: AtomicUsize::new(0),
            boots: AtomicUsize::new(0),
            teardowns: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Seed a file (parent directories are implied).
    pub fn with_file(self, path: impl Into<String>, contents: impl Into<String>) -> Self {
        self.fs.write(|fs| fs.insert_file(path.into(), contents.into()));
        self
    }

    /// Seed an empty directory.
    pub fn with_dir(self, path: impl Into<String>) -> Self {
        self.fs.write(|fs| {
            fs.dirs.insert(path.into());
        });
        self
    }

    /// Register a scripted command, overriding any builtin of the same name.
    pub fn with_command<F>(mut self, name: impl Into<String>, command: F) -> Self
    where
        F: Fn(&[String], &HashMap<String, String>) -> CommandResult + Send + Sync + 'static,
    {
        self.commands.insert(name.into(), Arc::new(command));
        self
    }

    /// Simulate a host without the isolation the sandbox needs.
    pub fn with_isolation(mut self, isolated: bool) -> Self {
        self.isolated = isolated;
        self
    }

    /// Make every boot take this long.
    pub fn with_boot_delay(mut self, delay: Duration) -> Self {
        self.boot_delay = delay;
        self
    }

    /// Fail the next `count` boot attempts.
    pub fn failing_boots(self, count: usize) -> Self {
        self.failures_remaining.store(count, Ordering::SeqCst);
        self
    }

    /// Number of boot attempts so far, including failed ones.
    pub fn boot_count(&self) -> usize {
        self.boots.load(Ordering::SeqCst)
    }

    /// Number of booted handles that have been torn down.
    pub fn teardown_count(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }

    /// Current contents of a file, bypassing the workspace.
    pub fn file(&self, path: &str) -> Option<String> {
        self.fs.read(|fs| fs.files.get(path).cloned())
    }
}

impl Default for MemorySandbox {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SandboxRuntime for MemorySandbox {
    fn is_cross_origin_isolated(&self) -> bool {
        self.isolated
    }

    async fn boot(&self) -> Result<Arc<dyn SandboxHandle>, BootError> {
        self.boots.fetch_add(1, Ordering::SeqCst);
        if !self.boot_delay.is_zero() {
            tokio::time::sleep(self.boot_delay).await;
        }

        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(BootError::Failed("simulated boot failure".to_string()));
        }

        Ok(Arc::new(MemoryHandle {
            fs: Arc::clone(&self.fs),
            commands: Arc::new(self.commands.clone()),
            teardowns: Arc::clone(&self.teardowns),
        }))
    }
}

struct MemoryHandle {
    fs: Arc<MemoryFs>,
    commands: Arc<HashMap<String, ScriptedCommand>>,
    teardowns: Arc<AtomicUsize>,
}

#[async_trait]
impl SandboxHandle for MemoryHandle {
    async fn teardown(&self) {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
    }

    async fn read_file(&self, path: &str) -> Result<String, WorkspaceError> {
        self.fs
            .read(|fs| fs.files.get(path).cloned())
            .ok_or_else(|| WorkspaceError::NotFound(path.to_string()))
    }

    async fn write_file(&self, path: &str, contents: &str) -> Result<(), WorkspaceError> {
        self.fs.write(|fs| {
            if fs.is_dir(path) {
                return Err(WorkspaceError::InvalidPath(format!("{path} is a directory")));
            }
            fs.insert_file(path.to_string(), contents.to_string());
            Ok(())
        })
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, WorkspaceError> {
        self.fs.read(|fs| list_dir(fs, path))
    }

    async fn spawn(
        &self,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> Result<SpawnedProcess, WorkspaceError> {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = oneshot::channel();

        let fs = Arc::clone(&self.fs);
        let scripted = self.commands.get(command).cloned();
        let command = command.to_string();
        let args = args.to_vec();
        let env = env.clone();

        tokio::spawn(async move {
            let result = match scripted {
                Some(script) => script(&args, &env),
                None => run_builtin(&fs, &command, &args, &env).await,
            };
            if !result.output.is_empty() {
                let _ = out_tx.send(result.output);
            }
            drop(out_tx);
            let _ = exit_tx.send(result.exit_code);
        });

        Ok(SpawnedProcess {
            output: out_rx,
            exit: exit_rx,
        })
    }
}

fn list_dir(fs: &FsState, path: &str) -> Result<Vec<DirEntry>, WorkspaceError> {
    if fs.files.contains_key(path) {
        return Err(WorkspaceError::NotADirectory(path.to_string()));
    }
    if !fs.is_dir(path) {
        return Err(WorkspaceError::NotFound(path.to_string()));
    }

    let prefix = if path.is_empty() {
        String::new()
    } else {
        format!("{path}/")
    };
    let child = |full: &str| -> Option<String> {
        let rest = full.strip_prefix(prefix.as_str())?;
        (!rest.is_empty() && !rest.contains('/')).then(|| rest.to_string())
    };

    let mut entries: Vec<DirEntry> = fs
        .dirs
        .iter()
        .filter_map(|d| child(d.as_str()))
        .map(DirEntry::dir)
        .collect();
    entries.extend(fs.files.keys().filter_map(|f| child(f.as_str())).map(DirEntry::file));
    Ok(entries)
}

async fn run_builtin(
    fs: &MemoryFs,
    command: &str,
    args: &[String],
    env: &HashMap<String, String>,
) -> CommandResult {
    match command {
        "echo" => CommandResult::ok(format!("{}\n", args.join(" "))),
        "pwd" => CommandResult::ok("/\n"),
        "true" => CommandResult::ok(""),
        "false" => CommandResult::failed("", 1),
        "exit" => {
            let code = args.first().and_then(|a| a.parse().ok()).unwrap_or(0);
            CommandResult::failed("", code)
        }
        "sleep" => {
            let millis = args.first().and_then(|a| a.parse().ok()).unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(millis)).await;
            CommandResult::ok("")
        }
        "env" => {
            let mut pairs: Vec<_> = env.iter().map(|(k, v)| format!("{k}={v}\n")).collect();
            pairs.sort();
            CommandResult::ok(pairs.concat())
        }
        "cat" => fs.read(|fs| {
            let mut result = CommandResult::ok("");
            for arg in args {
                match fs.files.get(arg.trim_start_matches("./")) {
                    Some(contents) => result.output.push_str(contents),
                    None => {
                        result.output.push_str(&format!("cat: {arg}: No such file or directory\n"));
                        result.exit_code = 1;
                    }
                }
            }
            result
        }),
        "ls" => fs.read(|fs| {
            let target = args.first().map(|a| a.trim_matches('/')).unwrap_or("");
            let target = if target == "." { "" } else { target };
            match list_dir(fs, target) {
                Ok(entries) => {
                    let mut names: Vec<_> = entries.into_iter().map(|e| e.name).collect();
                    names.sort();
                    CommandResult::ok(names.iter().map(|n| format!("{n}\n")).collect::<String>())
                }
                Err(_) => CommandResult::failed(
                    format!("ls: cannot access '{target}': No such file or directory\n"),
                    2,
                ),
            }
        }),
        "mkdir" => fs.write(|fs| {
            for dir in args.iter().filter(|a| !a.starts_with('-')) {
                let dir = dir.trim_matches('/');
                let mut current = String::new();
                for segment in dir.split('/') {
                    if !current.is_empty() {
                        current.push('/');
                    }
                    current.push_str(segment);
                    fs.dirs.insert(current.clone());
                }
            }
            CommandResult::ok("")
        }),
        other => CommandResult::failed(format!("sh: command not found: {other}\n"), 127),
    }
}
