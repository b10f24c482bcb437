// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration module for sandpiper.
//!
//! Handles loading, merging, and validation of configuration from multiple sources:
//! - Global config: ~/.sandpiper/config.json
//! - Workspace config: .sandpiper.json, .sandpiper/config.json, or sandpiper.config.yaml
//! - CLI options: command-line arguments
//!
//! Configuration is merged with precedence (CLI > workspace > global > defaults).

mod loader;
mod merger;
mod types;

pub use loader::{
    get_global_config_dir, get_global_config_path, load_config_file, load_global_config,
    load_workspace_config, CONFIG_FILES, GLOBAL_CONFIG_DIR, GLOBAL_CONFIG_FILE,
};

pub use merger::{default_config, merge_config, CliOptions};

pub use types::{
    RepetitionConfig, ResolvedConfig, WorkspaceConfig, DEFAULT_MAX_TOKENS, DEFAULT_PROVIDER,
    DEFAULT_REQUEST_TIMEOUT_MS,
};

use crate::error::ConfigError;
use std::path::Path;

/// Load, merge and validate all configuration sources for a workspace.
pub fn load_config(
    workspace_root: &Path,
    cli_options: CliOptions,
) -> Result<ResolvedConfig, ConfigError> {
    let global = load_global_config()?;
    let workspace = load_workspace_config(workspace_root)?;

    let config = merge_config(global, workspace, cli_options);
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_with_no_files() {
        let temp = TempDir::new().unwrap();
        let config = load_config(temp.path(), CliOptions::default()).unwrap();
        assert!(!config.provider.is_empty());
    }

    #[test]
    fn test_load_config_cli_override() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".sandpiper.json"), r#"{"provider": "gemini"}"#).unwrap();

        let cli = CliOptions {
            provider: Some("anthropic".to_string()),
            ..Default::default()
        };

        let config = load_config(temp.path(), cli).unwrap();
        assert_eq!(config.provider, "anthropic");
    }

    #[test]
    fn test_load_config_rejects_invalid_values() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".sandpiper.json"), r#"{"maxRoundTrips": 0}"#).unwrap();
        let result = load_config(temp.path(), CliOptions::default());
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
