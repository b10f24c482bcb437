// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tool handler implementations.
//!
//! This module contains the five workspace tools.

mod grep_search;
mod list_files;
mod read_file;
mod run_command;
mod write_file;

pub use grep_search::GrepSearchHandler;
pub use list_files::ListFilesHandler;
pub use read_file::ReadFileHandler;
pub use run_command::RunCommandHandler;
pub use write_file::WriteFileHandler;

use crate::error::ToolError;

/// Reject an empty required string argument.
fn require(name: &str, value: &str) -> Result<(), ToolError> {
    if value.trim().is_empty() {
        return Err(ToolError::MissingParameter(name.to_string()));
    }
    Ok(())
}
