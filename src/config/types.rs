// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! Defines the structure of workspace and resolved configuration,
//! supporting JSON and YAML formats.

use serde::{Deserialize, Serialize};

use crate::agent::{AgentConfig, RepetitionPolicy};
use crate::error::ConfigError;
use crate::providers::ProviderType;

/// Default provider when nothing is configured.
pub const DEFAULT_PROVIDER: &str = "anthropic";

/// Default cap on output tokens per reply.
pub const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Default provider request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 300_000;

/// Workspace configuration for sandpiper.
/// Can be defined in .sandpiper.json, .sandpiper/config.json, or
/// sandpiper.config.yaml in the project root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    /// Provider to use (anthropic, gemini)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Model name to use
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Custom base URL for the API, or a relay in front of it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,

    /// Provider round-trips allowed per submission
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_round_trips: Option<usize>,

    /// Repetition guard thresholds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repetition: Option<RepetitionConfig>,

    /// Additional text to append to the system prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt_additions: Option<String>,
}

/// Partial repetition guard settings as written in a config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepetitionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_identical_reads: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_same_path_writes: Option<usize>,
}

/// Fully resolved configuration with defaults applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    pub provider: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub request_timeout_ms: u64,
    pub max_round_trips: usize,
    pub repetition: RepetitionPolicy,
    pub system_prompt_additions: Option<String>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            provider: DEFAULT_PROVIDER.to_string(),
            model: None,
            base_url: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            max_round_trips: crate::agent::MAX_ROUND_TRIPS,
            repetition: RepetitionPolicy::default(),
            system_prompt_additions: None,
        }
    }
}

impl ResolvedConfig {
    /// Parse the configured provider name.
    pub fn provider_type(&self) -> Result<ProviderType, ConfigError> {
        self.provider.parse().map_err(|_| ConfigError::InvalidValue {
            field: "provider".to_string(),
            message: format!("unknown provider '{}' (expected anthropic or gemini)", self.provider),
        })
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.provider_type()?;

        if self.max_round_trips == 0 {
            return Err(invalid("maxRoundTrips", "must be at least 1"));
        }
        if self.max_tokens == 0 {
            return Err(invalid("maxTokens", "must be at least 1"));
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(invalid("temperature", "must be between 0 and 2"));
            }
        }
        let rep = &self.repetition;
        if rep.window == 0 {
            return Err(invalid("repetition.window", "must be at least 1"));
        }
        if rep.max_identical_reads < 2 || rep.max_same_path_writes < 2 {
            return Err(invalid(
                "repetition",
                "thresholds below 2 would stop on the first call",
            ));
        }
        Ok(())
    }

    /// Loop settings for the agent.
    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            max_round_trips: self.max_round_trips,
            repetition: self.repetition.clone(),
            system_prompt_additions: self.system_prompt_additions.clone(),
            ..AgentConfig::default()
        }
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_config_camel_case() {
        let config: WorkspaceConfig = serde_json::from_str(
            r#"{"baseUrl": "/api/relay", "maxRoundTrips": 4, "repetition": {"maxIdenticalReads": 5}}"#,
        )
        .unwrap();
        assert_eq!(config.base_url.as_deref(), Some("/api/relay"));
        assert_eq!(config.max_round_trips, Some(4));
        assert_eq!(config.repetition.unwrap().max_identical_reads, Some(5));
    }

    #[test]
    fn test_resolved_defaults_validate() {
        let config = ResolvedConfig::default();
        assert_eq!(config.provider, "anthropic");
        assert_eq!(config.max_round_trips, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = ResolvedConfig {
            provider: "openai".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "provider"
        ));

        let config = ResolvedConfig {
            max_round_trips: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ResolvedConfig {
            temperature: Some(3.5),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_agent_config_carries_loop_settings() {
        let config = ResolvedConfig {
            max_round_trips: 3,
            system_prompt_additions: Some("Prefer tabs.".to_string()),
            ..Default::default()
        };
        let agent = config.agent_config();
        assert_eq!(agent.max_round_trips, 3);
        assert_eq!(agent.system_prompt_additions.as_deref(), Some("Prefer tabs."));
    }
}
