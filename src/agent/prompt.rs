// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! System prompt template.

/// Default cap on file paths listed in the prompt.
pub const MAX_PROMPT_FILES: usize = 500;

const PREAMBLE: &str = "\
You are sandpiper, a coding assistant working inside a sandboxed project workspace.

You can inspect and change the project only through the tools you are given:
- read_file: read a file's full text
- write_file: create or overwrite a file with complete new content
- list_files: list files matching a glob pattern
- grep_search: search file contents for literal text
- run_command: run a program inside the sandbox and see its output

Guidelines:
- Read a file before changing it, and write the whole file when you do.
- Prefer grep_search and list_files over guessing paths.
- Do not repeat a tool call whose result you already have.
- When the task is done, reply with a short summary and no tool calls.";

/// Build the system prompt for one submission.
///
/// `files` is the current workspace listing. At most `limit` paths are
/// included, followed by a count of the rest.
pub fn build_system_prompt(files: &[String], limit: usize, additions: Option<&str>) -> String {
    let mut prompt = String::from(PREAMBLE);

    prompt.push_str("\n\n## Workspace files\n");
    if files.is_empty() {
        prompt.push_str("(the workspace is empty)\n");
    } else {
        for path in files.iter().take(limit) {
            prompt.push_str(path);
            prompt.push('\n');
        }
        if files.len() > limit {
            prompt.push_str(&format!("... and {} more files\n", files.len() - limit));
        }
    }

    if let Some(extra) = additions.map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str("\n## Additional instructions\n");
        prompt.push_str(extra);
        prompt.push('\n');
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_files() {
        let files = vec!["a.ts".to_string(), "src/b.ts".to_string()];
        let prompt = build_system_prompt(&files, MAX_PROMPT_FILES, None);
        assert!(prompt.contains("## Workspace files\na.ts\nsrc/b.ts\n"));
        assert!(!prompt.contains("Additional instructions"));
    }

    #[test]
    fn test_caps_listing() {
        let files: Vec<String> = (0..5).map(|i| format!("f{i}.ts")).collect();
        let prompt = build_system_prompt(&files, 2, None);
        assert!(prompt.contains("f1.ts\n... and 3 more files"));
        assert!(!prompt.contains("f2.ts"));
    }

    #[test]
    fn test_empty_workspace_and_additions() {
        let prompt = build_system_prompt(&[], MAX_PROMPT_FILES, Some("  Use tabs.  "));
        assert!(prompt.contains("(the workspace is empty)"));
        assert!(prompt.ends_with("## Additional instructions\nUse tabs.\n"));
    }
}
