// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Sandbox runtime interface.
//!
//! The workspace never touches a filesystem or process table directly. It
//! goes through these two traits, which an embedding supplies:
//!
//! - [`SandboxRuntime`] checks environment preconditions and boots an instance.
//! - [`SandboxHandle`] is the booted instance: file access plus process spawn.
//!
//! Paths passed to a handle are already normalized: root-relative, `/`
//! separated, no `.` or `..` segments. The root itself is the empty string.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::error::{BootError, WorkspaceError};

/// A single directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

impl DirEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
        }
    }
}

/// A process started inside the sandbox.
///
/// `output` yields chunks from stdout and stderr interleaved; the sender side
/// is dropped once the process has finished writing. `exit` resolves with the
/// exit code.
#[derive(Debug)]
pub struct SpawnedProcess {
    pub output: mpsc::UnboundedReceiver<String>,
    pub exit: oneshot::Receiver<i32>,
}

/// Boots sandbox instances.
#[async_trait]
pub trait SandboxRuntime: Send + Sync {
    /// Whether the host satisfies the isolation the sandbox requires.
    ///
    /// Checked before every boot attempt.
    fn is_cross_origin_isolated(&self) -> bool {
        true
    }

    /// Start a new sandbox instance.
    async fn boot(&self) -> Result<Arc<dyn SandboxHandle>, BootError>;
}

/// A booted sandbox instance.
#[async_trait]
pub trait SandboxHandle: Send + Sync {
    /// Read a file as UTF-8 text.
    async fn read_file(&self, path: &str) -> Result<String, WorkspaceError>;

    /// Create or overwrite a file.
    async fn write_file(&self, path: &str, contents: &str) -> Result<(), WorkspaceError>;

    /// List the immediate children of a directory.
    async fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, WorkspaceError>;

    /// Spawn a process with extra environment variables.
    async fn spawn(
        &self,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> Result<SpawnedProcess, WorkspaceError>;

    /// Release runtime resources. Called once when the workspace is torn down.
    async fn teardown(&self) {}
}
