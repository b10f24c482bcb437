// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Gemini `generateContent` adapter.
//!
//! Function-call protocol: the model's turns carry `functionCall` parts and
//! results go back as `functionResponse` parts. There is no stop reason for
//! tool use; a reply without function calls is terminal.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{normalize_arguments, ProtocolAdapter};
use crate::error::ProviderError;
use crate::types::{
    ContentBlock, ParsedReply, ProviderConfig, Role, TokenUsage, ToolCallRequest, ToolDefinition,
    Turn,
};

const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Adapter for the `functionCall` protocol.
#[derive(Debug, Clone)]
pub struct GeminiAdapter {
    model: String,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl GeminiAdapter {
    pub fn new(model: impl Into<String>, config: &ProviderConfig) -> Self {
        Self {
            model: model.into(),
            max_tokens: config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: config.temperature,
        }
    }
}

/// Function responses are keyed by name, not id, so results need the name
/// of the call they answer.
fn call_names(turns: &[Turn]) -> HashMap<&str, &str> {
    turns
        .iter()
        .flat_map(Turn::tool_calls)
        .map(|(id, name, _)| (id, name))
        .collect()
}

fn to_part(block: &ContentBlock, names: &HashMap<&str, &str>) -> Option<Part> {
    match block {
        ContentBlock::Text { value } if value.trim().is_empty() => None,
        ContentBlock::Text { value } => Some(Part {
            text: Some(value.clone()),
            ..Default::default()
        }),
        ContentBlock::ToolCall { name, arguments, .. } => Some(Part {
            function_call: Some(FunctionCall {
                name: name.clone(),
                args: Some(arguments.clone()),
            }),
            ..Default::default()
        }),
        ContentBlock::ToolResult {
            call_id,
            output,
            is_error,
        } => {
            let name = names.get(call_id.as_str()).copied().unwrap_or(call_id.as_str());
            let response = if *is_error {
                json!({ "error": output })
            } else {
                json!({ "content": output })
            };
            Some(Part {
                function_response: Some(FunctionResponse {
                    name: name.to_string(),
                    response,
                }),
                ..Default::default()
            })
        }
    }
}

impl ProtocolAdapter for GeminiAdapter {
    fn name(&self) -> &str {
        "Gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn endpoint_path(&self) -> String {
        format!("/v1beta/models/{}:generateContent", self.model)
    }

    fn auth_headers(&self, api_key: &str) -> Vec<(&'static str, String)> {
        vec![("x-goog-api-key", api_key.to_string())]
    }

    fn serialize_request(&self, system_prompt: &str, turns: &[Turn], tools: &[ToolDefinition]) -> Value {
        let names = call_names(turns);
        let contents: Vec<Content> = turns
            .iter()
            .filter_map(|turn| {
                let parts: Vec<Part> = turn.content.iter().filter_map(|b| to_part(b, &names)).collect();
                if parts.is_empty() {
                    return None;
                }
                let role = match turn.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                };
                Some(Content {
                    role: Some(role.to_string()),
                    parts,
                })
            })
            .collect();

        let declarations: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.input_schema,
                })
            })
            .collect();

        let mut request = json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": self.max_tokens,
            },
        });
        if !system_prompt.is_empty() {
            request["systemInstruction"] = json!({ "parts": [{ "text": system_prompt }] });
        }
        if !declarations.is_empty() {
            request["tools"] = json!([{ "functionDeclarations": declarations }]);
        }
        if let Some(temperature) = self.temperature {
            request["generationConfig"]["temperature"] = json!(temperature);
        }
        request
    }

    fn parse_reply(&self, reply: Value) -> Result<ParsedReply, ProviderError> {
        if let Some(error) = reply.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(ProviderError::api_message(message));
        }

        let response: GenerateContentResponse =
            serde_json::from_value(reply).map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let candidate = match response.candidates.into_iter().next() {
            Some(candidate) => candidate,
            None => {
                if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
                    return Err(ProviderError::api_message(format!("Prompt blocked: {reason}")));
                }
                return Err(ProviderError::ParseError("reply has no candidates".to_string()));
            }
        };

        let mut parsed = ParsedReply::default();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if part.thought == Some(true) {
                continue;
            }
            if let Some(text) = part.text {
                parsed.text_fragments.push(text);
            }
            if let Some(call) = part.function_call {
                parsed.tool_calls.push(ToolCallRequest {
                    id: None,
                    name: call.name,
                    arguments: normalize_arguments(call.args),
                });
            }
        }

        parsed.is_terminal = parsed.tool_calls.is_empty();
        parsed.usage = response.usage_metadata.map(|u| TokenUsage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
        });
        Ok(parsed)
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    args: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}
