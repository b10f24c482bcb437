// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Glob to regex compilation.
//!
//! Supported syntax:
//! - `**/` matches zero or more whole directories
//! - `**` matches anything, including separators
//! - `*` matches within one path segment
//! - `?` matches one character within a segment
//!
//! Everything else is literal.

use regex::Regex;

use crate::error::WorkspaceError;

/// Translate a glob into an unanchored regex fragment.
pub fn glob_to_regex(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    out.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
            }
            '*' => {
                out.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                out.push_str("[^/]");
                i += 1;
            }
            c => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
                i += 1;
            }
        }
    }

    out
}

/// Compile a glob into a regex that must match the entire path.
pub fn compile_glob(pattern: &str) -> Result<Regex, WorkspaceError> {
    let trimmed = pattern.trim();
    let trimmed = trimmed.strip_prefix("./").unwrap_or(trimmed);
    let trimmed = trimmed.trim_start_matches('/');
    let source = format!("^{}$", glob_to_regex(trimmed));
    Regex::new(&source).map_err(|e| WorkspaceError::InvalidPattern(format!("{pattern}: {e}")))
}
