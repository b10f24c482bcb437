// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Protocol adapters and transport for LLM providers.
//!
//! The agent loop is written once against [`ProtocolAdapter`]; each adapter
//! translates the provider-agnostic conversation model to and from one wire
//! protocol:
//!
//! - [`anthropic::AnthropicAdapter`] - block-structured `tool_use` protocol
//! - [`gemini::GeminiAdapter`] - `functionCall` protocol
//!
//! Sending the serialized request is the job of a [`ProviderTransport`],
//! normally an [`HttpTransport`] pointed at the provider or at a same-origin
//! relay in front of it.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use sandpiper::config::ResolvedConfig;
//! use sandpiper::providers::{create_adapter, create_transport};
//!
//! let config = ResolvedConfig::default();
//! let adapter = create_adapter(&config)?;
//! let transport = create_transport(&config, adapter.as_ref())?;
//! ```

pub mod anthropic;
pub mod gemini;
pub mod transport;

pub use anthropic::AnthropicAdapter;
pub use gemini::GeminiAdapter;
pub use transport::{HttpTransport, ProviderTransport};

use std::sync::Arc;

use serde_json::Value;

use crate::config::ResolvedConfig;
use crate::error::ProviderError;
use crate::types::{ParsedReply, ProviderConfig, ToolDefinition, Turn, RAW_ARGUMENTS_KEY};

/// Translation between the conversation model and one wire protocol.
pub trait ProtocolAdapter: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    /// Path appended to the base URL for a request.
    fn endpoint_path(&self) -> String;

    /// Authentication headers for the given key.
    fn auth_headers(&self, api_key: &str) -> Vec<(&'static str, String)>;

    /// Build the wire request for the whole transcript.
    fn serialize_request(&self, system_prompt: &str, turns: &[Turn], tools: &[ToolDefinition]) -> Value;

    /// Parse a wire reply into text fragments, tool calls and the terminal signal.
    fn parse_reply(&self, reply: Value) -> Result<ParsedReply, ProviderError>;
}

/// Shared adapter reference.
pub type BoxedAdapter = Arc<dyn ProtocolAdapter>;

/// Supported provider types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    /// Anthropic Claude models
    Anthropic,
    /// Google Gemini models
    Gemini,
}

impl ProviderType {
    /// Get the default model for this provider.
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Anthropic => "claude-sonnet-4-20250514",
            Self::Gemini => "gemini-2.0-flash",
        }
    }

    /// Get the default base URL for this provider.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com",
            Self::Gemini => "https://generativelanguage.googleapis.com",
        }
    }

    /// Environment variables checked for an API key, in order.
    pub fn api_key_env_vars(&self) -> &'static [&'static str] {
        match self {
            Self::Anthropic => &["ANTHROPIC_API_KEY"],
            Self::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        }
    }

    /// First API key found in the environment.
    pub fn api_key_from_env(&self) -> Option<String> {
        self.api_key_env_vars()
            .iter()
            .find_map(|var| std::env::var(var).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

/// Error type for parsing a provider type from a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseProviderTypeError;

impl std::fmt::Display for ParseProviderTypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid provider type")
    }
}

impl std::error::Error for ParseProviderTypeError {}

impl std::str::FromStr for ProviderType {
    type Err = ParseProviderTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "gemini" | "google" => Ok(Self::Gemini),
            _ => Err(ParseProviderTypeError),
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anthropic => write!(f, "Anthropic"),
            Self::Gemini => write!(f, "Gemini"),
        }
    }
}

/// Normalize tool-call arguments to a JSON object.
///
/// Providers may deliver arguments already structured or as a JSON-encoded
/// string. Missing or null arguments become an empty object. Anything that
/// is not an object, including text that fails to parse, is wrapped under
/// [`RAW_ARGUMENTS_KEY`]: the stored call must stay a valid object on the
/// wire, and the tool still reports the bad input.
pub fn normalize_arguments(arguments: Option<Value>) -> Value {
    let value = match arguments {
        None | Some(Value::Null) => return Value::Object(Default::default()),
        Some(Value::String(raw)) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Value::Object(Default::default());
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(Value::Null) => return Value::Object(Default::default()),
                Ok(parsed @ Value::Object(_)) => return parsed,
                Ok(_) | Err(_) => Value::String(raw),
            }
        }
        Some(other @ Value::Object(_)) => return other,
        Some(other) => other,
    };
    let mut wrapped = serde_json::Map::new();
    wrapped.insert(RAW_ARGUMENTS_KEY.to_string(), value);
    Value::Object(wrapped)
}

/// Create an adapter for the provider type.
pub fn create_adapter_for(provider_type: ProviderType, config: &ProviderConfig) -> BoxedAdapter {
    let model = config
        .model
        .clone()
        .unwrap_or_else(|| provider_type.default_model().to_string());

    match provider_type {
        ProviderType::Anthropic => Arc::new(AnthropicAdapter::new(model, config)),
        ProviderType::Gemini => Arc::new(GeminiAdapter::new(model, config)),
    }
}

/// Build the provider settings from a resolved configuration.
pub fn provider_config(config: &ResolvedConfig) -> Result<(ProviderType, ProviderConfig), ProviderError> {
    let provider_type: ProviderType = config.provider.parse().map_err(|_| {
        ProviderError::NotConfigured(format!("Unknown provider: {}", config.provider))
    })?;

    let provider_config = ProviderConfig {
        api_key: provider_type.api_key_from_env(),
        model: config.model.clone(),
        base_url: config.base_url.clone(),
        max_tokens: Some(config.max_tokens),
        temperature: config.temperature,
        timeout_ms: Some(config.request_timeout_ms),
    };
    Ok((provider_type, provider_config))
}

/// Create the adapter named by a resolved configuration.
pub fn create_adapter(config: &ResolvedConfig) -> Result<BoxedAdapter, ProviderError> {
    let (provider_type, provider_config) = provider_config(config)?;
    Ok(create_adapter_for(provider_type, &provider_config))
}

/// Create the HTTP transport for a resolved configuration and its adapter.
///
/// An API key is required when talking to the provider directly. When a
/// custom base URL points at a relay, the relay holds the credentials and
/// the key is optional.
pub fn create_transport(
    config: &ResolvedConfig,
    adapter: &dyn ProtocolAdapter,
) -> Result<Arc<dyn ProviderTransport>, ProviderError> {
    let (provider_type, provider_config) = provider_config(config)?;
    let transport = create_transport_for(provider_type, &provider_config, adapter)?;
    Ok(Arc::new(transport))
}

/// Create an HTTP transport from explicit provider settings.
pub fn create_transport_for(
    provider_type: ProviderType,
    config: &ProviderConfig,
    adapter: &dyn ProtocolAdapter,
) -> Result<HttpTransport, ProviderError> {
    let relay = config.base_url.is_some();
    let base_url = config
        .base_url
        .clone()
        .unwrap_or_else(|| provider_type.default_base_url().to_string());

    let headers = match &config.api_key {
        Some(key) => adapter.auth_headers(key),
        None if relay => Vec::new(),
        None => {
            return Err(ProviderError::NotConfigured(format!(
                "{} not set. Set it or point baseUrl at a relay.",
                provider_type.api_key_env_vars().join(" or ")
            )))
        }
    };

    let url = format!("{}{}", base_url.trim_end_matches('/'), adapter.endpoint_path());
    HttpTransport::new(url, headers, config.timeout_ms)
}
