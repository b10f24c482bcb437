// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration merging.
//!
//! Handles merging configurations from different sources with proper precedence.

use super::types::{ResolvedConfig, WorkspaceConfig};

/// CLI options that can override configuration.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub max_round_trips: Option<usize>,
}

/// Default configuration values.
pub fn default_config() -> ResolvedConfig {
    ResolvedConfig::default()
}

/// Merge multiple configurations with precedence.
///
/// Precedence (highest to lowest):
/// 1. CLI options
/// 2. Workspace config
/// 3. Global config (~/.sandpiper/config.json)
/// 4. Default values
pub fn merge_config(
    global: Option<WorkspaceConfig>,
    workspace: Option<WorkspaceConfig>,
    cli: CliOptions,
) -> ResolvedConfig {
    let mut result = default_config();

    if let Some(config) = global {
        apply_workspace_config(&mut result, &config);
    }

    if let Some(config) = workspace {
        apply_workspace_config(&mut result, &config);
    }

    apply_cli_options(&mut result, &cli);

    result
}

fn apply_workspace_config(result: &mut ResolvedConfig, config: &WorkspaceConfig) {
    if let Some(ref provider) = config.provider {
        result.provider = provider.clone();
    }

    if config.model.is_some() {
        result.model = config.model.clone();
    }

    if config.base_url.is_some() {
        result.base_url = config.base_url.clone();
    }

    if let Some(max_tokens) = config.max_tokens {
        result.max_tokens = max_tokens;
    }

    if config.temperature.is_some() {
        result.temperature = config.temperature;
    }

    if let Some(timeout) = config.request_timeout_ms {
        result.request_timeout_ms = timeout;
    }

    if let Some(max) = config.max_round_trips {
        result.max_round_trips = max;
    }

    // Thresholds merge field by field so a file can tune just one.
    if let Some(ref repetition) = config.repetition {
        if let Some(window) = repetition.window {
            result.repetition.window = window;
        }
        if let Some(reads) = repetition.max_identical_reads {
            result.repetition.max_identical_reads = reads;
        }
        if let Some(writes) = repetition.max_same_path_writes {
            result.repetition.max_same_path_writes = writes;
        }
    }

    if config.system_prompt_additions.is_some() {
        result.system_prompt_additions = config.system_prompt_additions.clone();
    }
}

fn apply_cli_options(result: &mut ResolvedConfig, cli: &CliOptions) {
    if let Some(ref provider) = cli.provider {
        result.provider = provider.clone();
    }

    if cli.model.is_some() {
        result.model = cli.model.clone();
    }

    if cli.base_url.is_some() {
        result.base_url = cli.base_url.clone();
    }

    if let Some(max) = cli.max_round_trips {
        result.max_round_trips = max;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepetitionConfig;

    #[test]
    fn test_default_config() {
        let config = default_config();
        assert_eq!(config.provider, "anthropic");
        assert!(config.model.is_none());
    }

    #[test]
    fn test_merge_config_precedence() {
        let global = WorkspaceConfig {
            provider: Some("anthropic".to_string()),
            model: Some("global-model".to_string()),
            ..Default::default()
        };

        let workspace = WorkspaceConfig {
            model: Some("workspace-model".to_string()),
            ..Default::default()
        };

        let cli = CliOptions {
            provider: Some("gemini".to_string()),
            ..Default::default()
        };

        let result = merge_config(Some(global), Some(workspace), cli);

        assert_eq!(result.provider, "gemini");
        assert_eq!(result.model.as_deref(), Some("workspace-model"));
    }

    #[test]
    fn test_repetition_merges_per_field() {
        let global = WorkspaceConfig {
            repetition: Some(RepetitionConfig {
                window: Some(16),
                ..Default::default()
            }),
            ..Default::default()
        };
        let workspace = WorkspaceConfig {
            repetition: Some(RepetitionConfig {
                max_identical_reads: Some(4),
                ..Default::default()
            }),
            ..Default::default()
        };

        let result = merge_config(Some(global), Some(workspace), CliOptions::default());
        assert_eq!(result.repetition.window, 16);
        assert_eq!(result.repetition.max_identical_reads, 4);
        assert_eq!(result.repetition.max_same_path_writes, 3);
    }

    #[test]
    fn test_cli_max_round_trips_override() {
        let workspace = WorkspaceConfig {
            max_round_trips: Some(20),
            ..Default::default()
        };
        let cli = CliOptions {
            max_round_trips: Some(2),
            ..Default::default()
        };
        assert_eq!(merge_config(None, Some(workspace), cli).max_round_trips, 2);
    }
}
