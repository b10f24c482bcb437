// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Host-directory sandbox runtime.
//!
//! Confines file access to one directory on the host and runs commands with
//! that directory as the working directory. Used by the CLI.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};

#[cfg(feature = "telemetry")]
use tracing::debug;

use super::sandbox::{DirEntry, SandboxHandle, SandboxRuntime, SpawnedProcess};
use crate::error::{BootError, WorkspaceError};

/// Sandbox rooted at a host directory.
#[derive(Debug, Clone)]
pub struct LocalSandbox {
    root: PathBuf,
}

impl LocalSandbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl SandboxRuntime for LocalSandbox {
    async fn boot(&self) -> Result<Arc<dyn SandboxHandle>, BootError> {
        let metadata = tokio::fs::metadata(&self.root)
            .await
            .map_err(|e| BootError::Failed(format!("{}: {e}", self.root.display())))?;
        if !metadata.is_dir() {
            return Err(BootError::Failed(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        let root = tokio::fs::canonicalize(&self.root)
            .await
            .map_err(|e| BootError::Failed(e.to_string()))?;
        Ok(Arc::new(LocalHandle { root }))
    }
}

struct LocalHandle {
    root: PathBuf,
}

impl LocalHandle {
    fn resolve(&self, path: &str) -> Result<PathBuf, WorkspaceError> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(WorkspaceError::InvalidPath(format!(
                "{path} is outside the workspace"
            )));
        }
        Ok(self.root.join(relative))
    }

    /// Resolve `path` and check that symlinks along it stay under the root.
    ///
    /// Checks the deepest existing ancestor, so paths about to be created
    /// are accepted when their parent is inside.
    async fn confine(&self, path: &str) -> Result<PathBuf, WorkspaceError> {
        let full = self.resolve(path)?;
        let outside =
            || WorkspaceError::InvalidPath(format!("{path} resolves outside the workspace"));

        let mut existing = full.as_path();
        let canonical = loop {
            if let Ok(canonical) = tokio::fs::canonicalize(existing).await {
                break canonical;
            }
            // A dangling link could point anywhere.
            if tokio::fs::symlink_metadata(existing).await.is_ok() {
                return Err(outside());
            }
            existing = existing.parent().ok_or_else(outside)?;
        };

        if canonical.starts_with(&self.root) {
            Ok(full)
        } else {
            Err(outside())
        }
    }
}

#[async_trait]
impl SandboxHandle for LocalHandle {
    async fn read_file(&self, path: &str) -> Result<String, WorkspaceError> {
        let full = self.confine(path).await?;
        match tokio::fs::metadata(&full).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(WorkspaceError::NotFound(format!("{path} is not a file"))),
            Err(_) => return Err(WorkspaceError::NotFound(path.to_string())),
        }
        tokio::fs::read_to_string(&full).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => WorkspaceError::NotFound(path.to_string()),
            _ => WorkspaceError::Io(format!("{path}: {e}")),
        })
    }

    async fn write_file(&self, path: &str, contents: &str) -> Result<(), WorkspaceError> {
        let full = self.confine(path).await?;
        tokio::fs::write(&full, contents).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                WorkspaceError::NotFound(format!("parent directory of {path} does not exist"))
            }
            _ => WorkspaceError::Io(format!("{path}: {e}")),
        })
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, WorkspaceError> {
        let full = self.confine(path).await?;
        let mut reader = tokio::fs::read_dir(&full).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => WorkspaceError::NotFound(path.to_string()),
            _ => WorkspaceError::NotADirectory(format!("{path}: {e}")),
        })?;

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir,
            });
        }
        Ok(entries)
    }

    async fn spawn(
        &self,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> Result<SpawnedProcess, WorkspaceError> {
        #[cfg(feature = "telemetry")]
        debug!(command, ?args, root = %self.root.display(), "Spawning host process");

        let mut child = Command::new(command)
            .args(args)
            .envs(env)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| WorkspaceError::Spawn(format!("{command}: {e}")))?;

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = oneshot::channel();

        let stdout = child.stdout.take().map(|s| tokio::spawn(forward(s, out_tx.clone())));
        let stderr = child.stderr.take().map(|s| tokio::spawn(forward(s, out_tx.clone())));
        drop(out_tx);

        tokio::spawn(async move {
            let status = child.wait().await;
            for reader in [stdout, stderr].into_iter().flatten() {
                let _ = reader.await;
            }
            let code = status.ok().and_then(|s| s.code()).unwrap_or(-1);
            let _ = exit_tx.send(code);
        });

        Ok(SpawnedProcess {
            output: out_rx,
            exit: exit_rx,
        })
    }
}

async fn forward<R: AsyncRead + Unpin>(mut reader: R, tx: mpsc::UnboundedSender<String>) {
    let mut buf = vec![0u8; 8192];
    let mut pending = Vec::new();
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                pending.extend_from_slice(&buf[..n]);
                let text = drain_utf8(&mut pending);
                if !text.is_empty() && tx.send(text).is_err() {
                    return;
                }
            }
        }
    }
    if !pending.is_empty() {
        let _ = tx.send(String::from_utf8_lossy(&pending).into_owned());
    }
}

/// Decode the complete characters in `pending`, leaving a trailing partial
/// sequence for the next read. Invalid bytes become U+FFFD.
fn drain_utf8(pending: &mut Vec<u8>) -> String {
    let mut text = String::new();
    loop {
        match std::str::from_utf8(pending) {
            Ok(valid) => {
                text.push_str(valid);
                pending.clear();
                return text;
            }
            Err(err) => {
                let valid_up_to = err.valid_up_to();
                text.push_str(&String::from_utf8_lossy(&pending[..valid_up_to]));
                match err.error_len() {
                    None => {
                        pending.drain(..valid_up_to);
                        return text;
                    }
                    Some(len) => {
                        text.push(char::REPLACEMENT_CHARACTER);
                        pending.drain(..valid_up_to + len);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn handle(dir: &TempDir) -> Arc<dyn SandboxHandle> {
        LocalSandbox::new(dir.path()).boot().await.unwrap()
    }

    #[tokio::test]
    async fn test_boot_missing_root_fails() {
        let result = LocalSandbox::new("/definitely/not/here").boot().await;
        assert!(matches!(result, Err(BootError::Failed(_))));
    }

    #[tokio::test]
    async fn test_read_write_roundtrip() {
        let dir = TempDir::new().unwrap();
        let handle = handle(&dir).await;
        handle.write_file("a.txt", "hello").await.unwrap();
        assert_eq!(handle.read_file("a.txt").await.unwrap(), "hello");
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_read_directory_is_not_found() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        let handle = handle(&dir).await;
        assert!(handle.read_file("src").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_escape_rejected() {
        let dir = TempDir::new().unwrap();
        let handle = handle(&dir).await;
        assert!(matches!(
            handle.read_file("../secret").await,
            Err(WorkspaceError::InvalidPath(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_out_of_root_rejected() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "hidden").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("gone.txt"),
            dir.path().join("dangling"),
        )
        .unwrap();
        let handle = handle(&dir).await;

        assert!(matches!(
            handle.read_file("link/secret.txt").await,
            Err(WorkspaceError::InvalidPath(_))
        ));
        assert!(matches!(
            handle.write_file("link/new.txt", "x").await,
            Err(WorkspaceError::InvalidPath(_))
        ));
        assert!(matches!(
            handle.write_file("dangling", "x").await,
            Err(WorkspaceError::InvalidPath(_))
        ));
        assert!(matches!(handle.read_dir("link").await, Err(WorkspaceError::InvalidPath(_))));
        assert!(!outside.path().join("new.txt").exists());
        assert!(!outside.path().join("gone.txt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_inside_root_allowed() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "ok").unwrap();
        std::os::unix::fs::symlink(dir.path().join("src"), dir.path().join("alias")).unwrap();
        let handle = handle(&dir).await;

        assert_eq!(handle.read_file("alias/lib.rs").await.unwrap(), "ok");
        handle.write_file("new.txt", "x").await.unwrap();
    }

    #[test]
    fn test_drain_utf8_keeps_split_character() {
        let bytes = "é".as_bytes();
        let mut pending = vec![b'a', bytes[0]];
        assert_eq!(drain_utf8(&mut pending), "a");
        assert_eq!(pending, vec![bytes[0]]);

        pending.push(bytes[1]);
        assert_eq!(drain_utf8(&mut pending), "é");
        assert!(pending.is_empty());

        let mut pending = vec![b'x', 0xff, b'y'];
        assert_eq!(drain_utf8(&mut pending), "x\u{fffd}y");
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_read_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();
        let handle = handle(&dir).await;

        let entries = handle.read_dir("").await.unwrap();
        assert_eq!(entries, vec![DirEntry::dir("src")]);
        let entries = handle.read_dir("src").await.unwrap();
        assert_eq!(entries, vec![DirEntry::file("main.rs")]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_collects_output_and_exit() {
        let dir = TempDir::new().unwrap();
        let handle = handle(&dir).await;
        let env = HashMap::from([("GREETING".to_string(), "hi".to_string())]);
        let args = vec!["-c".to_string(), "echo $GREETING; echo oops >&2; exit 4".to_string()];
        let mut process = handle.spawn("sh", &args, &env).await.unwrap();

        let mut output = String::new();
        while let Some(chunk) = process.output.recv().await {
            output.push_str(&chunk);
        }
        assert!(output.contains("hi"));
        assert!(output.contains("oops"));
        assert_eq!(process.exit.await.unwrap(), 4);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_output_keeps_multibyte_text() {
        let dir = TempDir::new().unwrap();
        let expected = format!("a{}", "é".repeat(20_000));
        std::fs::write(dir.path().join("accents.txt"), &expected).unwrap();
        let handle = handle(&dir).await;
        let args = vec!["accents.txt".to_string()];
        let mut process = handle.spawn("cat", &args, &HashMap::new()).await.unwrap();

        let mut output = String::new();
        while let Some(chunk) = process.output.recv().await {
            output.push_str(&chunk);
        }
        assert_eq!(output, expected);
        assert_eq!(process.exit.await.unwrap(), 0);
    }
}
