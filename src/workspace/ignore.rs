// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Ignore-file rules for workspace listings.
//!
//! Rules are rebuilt for every listing because the ignore file can change
//! between calls.

use regex::Regex;
use tracing::{debug, warn};

use super::glob::glob_to_regex;
use super::sandbox::SandboxHandle;
use crate::error::WorkspaceError;

/// Ignore file read from the workspace root.
pub const IGNORE_FILE: &str = ".gitignore";

/// Rules used when the workspace has no ignore file.
pub const DEFAULT_IGNORE_RULES: &[&str] = &[
    "node_modules/",
    ".git/",
    "dist/",
    "build/",
    ".next/",
    ".cache/",
    "coverage/",
    "*.log",
    ".env",
    ".env.local",
    ".env.*.local",
];

/// One compiled ignore line.
#[derive(Debug, Clone)]
pub struct GitignoreRule {
    source: String,
    /// Matches the named entry itself or anything beneath it.
    regex: Regex,
    /// Only set for directory rules: matches strictly beneath the directory.
    beneath: Option<Regex>,
}

impl GitignoreRule {
    /// Compile one ignore-file line.
    ///
    /// Returns `Ok(None)` for blank lines, comments, and negations.
    pub fn parse(line: &str) -> Result<Option<Self>, WorkspaceError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        if line.starts_with('!') {
            debug!(rule = line, "Negated ignore rules are not supported, skipping");
            return Ok(None);
        }

        let dir_only = line.ends_with('/');
        let body = line.trim_end_matches('/');
        let anchored = body.starts_with('/');
        let body = body.trim_start_matches('/');
        if body.is_empty() {
            return Ok(None);
        }

        let prefix = if anchored { "^" } else { "^(?:.*/)?" };
        let fragment = glob_to_regex(body);
        let compile = |source: String| {
            Regex::new(&source).map_err(|e| WorkspaceError::InvalidPattern(format!("{line}: {e}")))
        };

        let regex = compile(format!("{prefix}{fragment}(?:/.*)?$"))?;
        let beneath = if dir_only {
            Some(compile(format!("{prefix}{fragment}/.+$"))?)
        } else {
            None
        };

        Ok(Some(Self {
            source: line.to_string(),
            regex,
            beneath,
        }))
    }

    /// The original line this rule was built from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_dir_only(&self) -> bool {
        self.beneath.is_some()
    }

    /// Test a root-relative path.
    pub fn matches(&self, path: &str, is_dir: bool) -> bool {
        match &self.beneath {
            Some(beneath) if !is_dir => beneath.is_match(path),
            _ => self.regex.is_match(path),
        }
    }
}

/// The full rule set for one listing.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    rules: Vec<GitignoreRule>,
}

impl IgnoreRules {
    /// The built-in rule set.
    pub fn defaults() -> Self {
        Self::from_lines(DEFAULT_IGNORE_RULES.iter().copied())
    }

    /// Compile the contents of an ignore file. Lines that fail to compile are
    /// logged and skipped.
    pub fn parse(source: &str) -> Self {
        Self::from_lines(source.lines())
    }

    fn from_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Self {
        let rules = lines
            .filter_map(|line| match GitignoreRule::parse(line) {
                Ok(rule) => rule,
                Err(err) => {
                    warn!(error = %err, "Skipping invalid ignore rule");
                    None
                }
            })
            .collect();
        Self { rules }
    }

    /// Load rules from the workspace's ignore file, falling back to defaults.
    pub async fn load(handle: &dyn SandboxHandle) -> Self {
        match handle.read_file(IGNORE_FILE).await {
            Ok(source) => Self::parse(&source),
            Err(err) if err.is_not_found() => Self::defaults(),
            Err(err) => {
                warn!(error = %err, "Failed to read ignore file, using default rules");
                Self::defaults()
            }
        }
    }

    pub fn is_ignored(&self, path: &str, is_dir: bool) -> bool {
        self.rules.iter().any(|rule| rule.matches(path, is_dir))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(line: &str) -> GitignoreRule {
        GitignoreRule::parse(line).unwrap().unwrap()
    }

    #[test]
    fn test_skips_blank_comment_and_negation() {
        assert!(GitignoreRule::parse("").unwrap().is_none());
        assert!(GitignoreRule::parse("   ").unwrap().is_none());
        assert!(GitignoreRule::parse("# build output").unwrap().is_none());
        assert!(GitignoreRule::parse("!keep.log").unwrap().is_none());
    }

    #[test]
    fn test_dir_rule_matches_directory_and_contents() {
        let r = rule("node_modules/");
        assert!(r.is_dir_only());
        assert!(r.matches("node_modules", true));
        assert!(r.matches("node_modules/x.js", false));
        assert!(r.matches("packages/app/node_modules/y/z.js", false));
        // A plain file with the same name is not a directory.
        assert!(!r.matches("node_modules", false));
    }

    #[test]
    fn test_unanchored_matches_any_depth() {
        let r = rule("*.log");
        assert!(r.matches("debug.log", false));
        assert!(r.matches("logs/server/debug.log", false));
        assert!(!r.matches("debug.log.txt", false));
    }

    #[test]
    fn test_anchored_matches_root_only() {
        let r = rule("/dist");
        assert!(r.matches("dist", true));
        assert!(r.matches("dist/bundle.js", false));
        assert!(!r.matches("packages/dist", true));
    }

    #[test]
    fn test_defaults_cover_common_noise() {
        let rules = IgnoreRules::defaults();
        assert!(rules.is_ignored("node_modules", true));
        assert!(rules.is_ignored(".git", true));
        assert!(rules.is_ignored("build/out.js", false));
        assert!(rules.is_ignored("npm-debug.log", false));
        assert!(rules.is_ignored(".env", false));
        assert!(rules.is_ignored(".env.production.local", false));
        assert!(!rules.is_ignored("src/index.ts", false));
    }

    #[test]
    fn test_parse_file() {
        let rules = IgnoreRules::parse("# comment\n\ntarget/\n*.tmp\n");
        assert_eq!(rules.len(), 2);
        assert!(rules.is_ignored("target/debug/app", false));
        assert!(rules.is_ignored("notes.tmp", false));
        assert!(!rules.is_ignored("node_modules", true));
    }
}
