// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Text search over workspace files.
//!
//! Search does not rely on a `grep` binary inside the sandbox. The workspace
//! lists candidate files, reads each one, and tests every line against a
//! regex built here.

use std::fmt;

use regex::{Regex, RegexBuilder};

use crate::error::WorkspaceError;

/// Default cap on collected match lines.
pub const DEFAULT_MAX_RESULTS: usize = 100;

/// Glob used when the caller gives no file pattern.
pub const DEFAULT_FILE_PATTERN: &str = "**/*";

/// Sentinel returned when nothing matches.
pub const NO_MATCHES: &str = "No matches found.";

/// Options for [`Workspace::grep_search`](super::Workspace::grep_search).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrepOptions {
    pub case_sensitive: bool,
    pub whole_words: bool,
    pub file_pattern: Option<String>,
    pub max_results: usize,
}

impl Default for GrepOptions {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            whole_words: false,
            file_pattern: None,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl GrepOptions {
    pub fn case_sensitive(mut self, value: bool) -> Self {
        self.case_sensitive = value;
        self
    }

    pub fn whole_words(mut self, value: bool) -> Self {
        self.whole_words = value;
        self
    }

    pub fn file_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.file_pattern = Some(pattern.into());
        self
    }

    pub fn max_results(mut self, limit: usize) -> Self {
        self.max_results = limit;
        self
    }
}

/// Build the line matcher for a literal search term.
pub fn build_search_regex(pattern: &str, options: &GrepOptions) -> Result<Regex, WorkspaceError> {
    if pattern.is_empty() {
        return Err(WorkspaceError::InvalidPattern(
            "search pattern must not be empty".to_string(),
        ));
    }

    let escaped = regex::escape(pattern);
    let source = if options.whole_words {
        format!(r"\b{escaped}\b")
    } else {
        escaped
    };

    RegexBuilder::new(&source)
        .case_insensitive(!options.case_sensitive)
        .build()
        .map_err(|e| WorkspaceError::InvalidPattern(format!("{pattern}: {e}")))
}

/// One matching line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    pub path: String,
    /// 1-based.
    pub line_number: usize,
    pub text: String,
}

impl fmt::Display for SearchMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.path, self.line_number, self.text)
    }
}

/// Collected matches, capped at a limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResults {
    matches: Vec<SearchMatch>,
    limit: usize,
    truncated: bool,
}

impl SearchResults {
    pub fn new(limit: usize) -> Self {
        Self {
            matches: Vec::new(),
            limit,
            truncated: false,
        }
    }

    /// Record a match. Returns `false` once the cap has been exceeded, at
    /// which point the caller should stop searching.
    pub fn push(&mut self, found: SearchMatch) -> bool {
        if self.matches.len() >= self.limit {
            self.truncated = true;
            return false;
        }
        self.matches.push(found);
        true
    }

    pub fn matches(&self) -> &[SearchMatch] {
        &self.matches
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// More matches existed than the cap allowed.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Rendered `path:line:text` lines, followed by the truncation marker
    /// when applicable. Empty results render as the single sentinel line.
    pub fn lines(&self) -> Vec<String> {
        if self.matches.is_empty() && !self.truncated {
            return vec![NO_MATCHES.to_string()];
        }
        let mut lines: Vec<String> = self.matches.iter().map(ToString::to_string).collect();
        if self.truncated {
            lines.push(format!(
                "... (more matches exist; showing first {})",
                self.limit
            ));
        }
        lines
    }
}

impl fmt::Display for SearchResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lines().join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found(n: usize) -> SearchMatch {
        SearchMatch {
            path: "a.ts".to_string(),
            line_number: n,
            text: format!("line {n}"),
        }
    }

    #[test]
    fn test_default_options() {
        let options = GrepOptions::default();
        assert!(!options.case_sensitive);
        assert!(!options.whole_words);
        assert_eq!(options.max_results, 100);
    }

    #[test]
    fn test_regex_case_insensitive_by_default() {
        let re = build_search_regex("foo", &GrepOptions::default()).unwrap();
        assert!(re.is_match("const FOO = 1;"));

        let re = build_search_regex("foo", &GrepOptions::default().case_sensitive(true)).unwrap();
        assert!(!re.is_match("const FOO = 1;"));
    }

    #[test]
    fn test_regex_escapes_pattern() {
        let re = build_search_regex("a.b(", &GrepOptions::default()).unwrap();
        assert!(re.is_match("x a.b( y"));
        assert!(!re.is_match("axb("));
    }

    #[test]
    fn test_regex_whole_words() {
        let re = build_search_regex("log", &GrepOptions::default().whole_words(true)).unwrap();
        assert!(re.is_match("console.log(x)"));
        assert!(!re.is_match("dialog.open()"));
    }

    #[test]
    fn test_empty_pattern_rejected() {
        assert!(build_search_regex("", &GrepOptions::default()).is_err());
    }

    #[test]
    fn test_results_cap_and_marker() {
        let mut results = SearchResults::new(2);
        assert!(results.push(found(1)));
        assert!(results.push(found(2)));
        assert!(!results.push(found(3)));
        assert!(results.is_truncated());

        let lines = results.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "a.ts:1:line 1");
        assert!(lines[2].contains("more matches exist"));
    }

    #[test]
    fn test_empty_results_sentinel() {
        let results = SearchResults::new(10);
        assert_eq!(results.to_string(), NO_MATCHES);
    }
}
