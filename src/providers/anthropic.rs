// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Anthropic Messages API adapter.
//!
//! Block-structured protocol: assistant turns carry `tool_use` blocks and
//! results go back as `tool_result` blocks inside a user message. The reply's
//! `stop_reason` says whether the model is waiting on tools.
//!
//! See [Anthropic Messages API](https://docs.anthropic.com/en/api/messages) for details.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{normalize_arguments, ProtocolAdapter};
use crate::error::ProviderError;
use crate::types::{
    ContentBlock, ParsedReply, ProviderConfig, Role, TokenUsage, ToolCallRequest, ToolDefinition,
    Turn,
};

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default max tokens if not specified.
const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Stop reason that means the model wants tool results.
const STOP_TOOL_USE: &str = "tool_use";

/// Adapter for the `tool_use` protocol.
#[derive(Debug, Clone)]
pub struct AnthropicAdapter {
    model: String,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl AnthropicAdapter {
    pub fn new(model: impl Into<String>, config: &ProviderConfig) -> Self {
        Self {
            model: model.into(),
            max_tokens: config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: config.temperature,
        }
    }

    fn to_api_message(turn: &Turn) -> Option<ApiMessage> {
        let content: Vec<ApiContentBlock> = turn
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { value } if value.trim().is_empty() => None,
                ContentBlock::Text { value } => Some(ApiContentBlock::Text { text: value.clone() }),
                ContentBlock::ToolCall { id, name, arguments } => Some(ApiContentBlock::ToolUse {
                    id: id.clone(),
                    name: name.clone(),
                    input: arguments.clone(),
                }),
                ContentBlock::ToolResult {
                    call_id,
                    output,
                    is_error,
                } => Some(ApiContentBlock::ToolResult {
                    tool_use_id: call_id.clone(),
                    content: output.clone(),
                    is_error: is_error.then_some(true),
                }),
            })
            .collect();

        if content.is_empty() {
            return None;
        }

        let role = match turn.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        Some(ApiMessage { role, content })
    }
}

impl ProtocolAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        "Anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn endpoint_path(&self) -> String {
        "/v1/messages".to_string()
    }

    fn auth_headers(&self, api_key: &str) -> Vec<(&'static str, String)> {
        vec![
            ("x-api-key", api_key.to_string()),
            ("anthropic-version", ANTHROPIC_VERSION.to_string()),
        ]
    }

    fn serialize_request(&self, system_prompt: &str, turns: &[Turn], tools: &[ToolDefinition]) -> Value {
        let request = AnthropicRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: (!system_prompt.is_empty()).then_some(system_prompt),
            messages: turns.iter().filter_map(Self::to_api_message).collect(),
            tools: tools
                .iter()
                .map(|t| ApiTool {
                    name: &t.name,
                    description: &t.description,
                    input_schema: serde_json::to_value(&t.input_schema).unwrap_or(Value::Null),
                })
                .collect(),
            temperature: self.temperature,
        };
        serde_json::to_value(request).unwrap_or(Value::Null)
    }

    fn parse_reply(&self, reply: Value) -> Result<ParsedReply, ProviderError> {
        // Relays sometimes pass provider errors through with a 200.
        if let Some(error) = reply.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(ProviderError::api_message(message));
        }

        let response: ApiResponse =
            serde_json::from_value(reply).map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let mut parsed = ParsedReply::default();
        for block in response.content {
            match block {
                ReplyBlock::Text { text } => parsed.text_fragments.push(text),
                ReplyBlock::ToolUse { id, name, input } => parsed.tool_calls.push(ToolCallRequest {
                    id: id.filter(|id| !id.is_empty()),
                    name,
                    arguments: normalize_arguments(input),
                }),
                ReplyBlock::Other => {}
            }
        }

        let wants_tools = response.stop_reason.as_deref() == Some(STOP_TOOL_USE);
        parsed.is_terminal = !wants_tools && parsed.tool_calls.is_empty();
        parsed.usage = response.usage.map(|u| TokenUsage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
        });
        Ok(parsed)
    }
}

// ============================================================================
// API Types
// ============================================================================

/// Request body for the Messages API.
#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: Vec<ApiContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

#[derive(Debug, Serialize)]
struct ApiTool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: Value,
}

/// API response format.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    content: Vec<ReplyBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ReplyBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        #[serde(default)]
        id: Option<String>,
        name: String,
        #[serde(default)]
        input: Option<Value>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InputSchema;
    use serde_json::json;

    fn adapter() -> AnthropicAdapter {
        AnthropicAdapter::new("claude-test", &ProviderConfig::default().with_max_tokens(1024))
    }

    #[test]
    fn test_serialize_request_shape() {
        let turns = vec![
            Turn::user("read a.ts"),
            Turn::new(
                Role::Assistant,
                vec![
                    ContentBlock::text(""),
                    ContentBlock::tool_call("toolu_1", "read_file", json!({"path": "a.ts"})),
                ],
            ),
            Turn::tool_results(vec![ContentBlock::tool_result("toolu_1", "boom", true)]),
        ];
        let tools = vec![ToolDefinition::new("read_file", "Read a file")
            .with_schema(InputSchema::new().with_property("path", json!({"type": "string"})))];

        let request = adapter().serialize_request("You are helpful.", &turns, &tools);

        assert_eq!(request["model"], "claude-test");
        assert_eq!(request["max_tokens"], 1024);
        assert_eq!(request["system"], "You are helpful.");
        assert_eq!(request["messages"][0]["content"][0]["type"], "text");

        let assistant = &request["messages"][1];
        assert_eq!(assistant["role"], "assistant");
        // The empty text block is dropped.
        assert_eq!(assistant["content"].as_array().unwrap().len(), 1);
        assert_eq!(assistant["content"][0]["type"], "tool_use");
        assert_eq!(assistant["content"][0]["input"]["path"], "a.ts");

        let result = &request["messages"][2]["content"][0];
        assert_eq!(request["messages"][2]["role"], "user");
        assert_eq!(result["type"], "tool_result");
        assert_eq!(result["tool_use_id"], "toolu_1");
        assert_eq!(result["is_error"], true);

        assert_eq!(request["tools"][0]["input_schema"]["type"], "object");
        assert!(request.get("temperature").is_none());
    }

    #[test]
    fn test_parse_reply_with_tool_use() {
        let reply = json!({
            "content": [
                {"type": "text", "text": "Reading both."},
                {"type": "tool_use", "id": "toolu_1", "name": "read_file", "input": {"path": "a.ts"}},
                {"type": "tool_use", "id": "toolu_2", "name": "read_file", "input": "{\"path\":\"b.ts\"}"}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 12, "output_tokens": 30}
        });

        let parsed = adapter().parse_reply(reply).unwrap();
        assert!(!parsed.is_terminal);
        assert_eq!(parsed.text_fragments, vec!["Reading both."]);
        assert_eq!(parsed.tool_calls.len(), 2);
        assert_eq!(parsed.tool_calls[0].id.as_deref(), Some("toolu_1"));
        assert_eq!(parsed.tool_calls[1].arguments, json!({"path": "b.ts"}));
        assert_eq!(parsed.usage.unwrap().total(), 42);
    }

    #[test]
    fn test_parse_reply_end_turn_is_terminal() {
        let reply = json!({
            "content": [{"type": "text", "text": "All done."}, {"type": "thinking", "thinking": "..."}],
            "stop_reason": "end_turn"
        });
        let parsed = adapter().parse_reply(reply).unwrap();
        assert!(parsed.is_terminal);
        assert_eq!(parsed.joined_text(), "All done.");
    }

    #[test]
    fn test_parse_reply_error_body() {
        let reply = json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}});
        let err = adapter().parse_reply(reply).unwrap_err();
        assert!(err.to_string().contains("Overloaded"));
    }

    #[test]
    fn test_auth_headers() {
        let headers = adapter().auth_headers("sk-test");
        assert!(headers.contains(&("x-api-key", "sk-test".to_string())));
        assert!(headers.contains(&("anthropic-version", "2023-06-01".to_string())));
    }
}
