// ABOUTME: Gemini generateContent request and response wire types
// ABOUTME: Parts keep unknown fields so model turns can be replayed byte-for-byte
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::ModelEvent;

// ============================================================================
// Transcript
// ============================================================================

/// Author of a transcript turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentRole {
    /// End user or tool results
    User,
    /// The model
    Model,
}

/// One transcript turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    /// Turn author
    pub role: ContentRole,
    /// Turn parts, in order
    pub parts: Vec<Part>,
}

impl Content {
    /// User turn with a single text part
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: ContentRole::User,
            parts: vec![Part::text(text)],
        }
    }

    /// Model turn with a single text part
    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: ContentRole::Model,
            parts: vec![Part::text(text)],
        }
    }

    /// Model turn replaying previously received parts
    #[must_use]
    pub fn model_parts(parts: Vec<Part>) -> Self {
        Self {
            role: ContentRole::Model,
            parts,
        }
    }

    /// User turn carrying tool results
    #[must_use]
    pub fn function_responses(responses: Vec<FunctionResponse>) -> Self {
        Self {
            role: ContentRole::User,
            parts: responses.into_iter().map(Part::function_response).collect(),
        }
    }
}

/// One piece of a turn
///
/// Unrecognized fields land in `extra` and are serialized back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// Text, answer or thought
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Marks `text` as reasoning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
    /// Opaque continuation token for multi-step tool calling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
    /// Tool request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    /// Tool result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
    /// Fields not modeled above
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Part {
    /// Plain text part
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Tool result part
    #[must_use]
    pub fn function_response(response: FunctionResponse) -> Self {
        Self {
            function_response: Some(response),
            ..Self::default()
        }
    }

    /// Whether the part is reasoning
    #[must_use]
    pub fn is_thought(&self) -> bool {
        self.thought.unwrap_or(false)
    }

    /// Text to show the user (non-empty, non-thought)
    #[must_use]
    pub fn answer_text(&self) -> Option<&str> {
        if self.is_thought() {
            return None;
        }
        self.text.as_deref().filter(|t| !t.is_empty())
    }
}

/// Tool request emitted by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Tool name
    pub name: String,
    /// Arguments object
    #[serde(default = "empty_object")]
    pub args: Value,
    /// Call identifier, when the backend assigns one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Tool result sent back to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    /// Tool name
    pub name: String,
    /// Result object
    pub response: Value,
}

impl FunctionResponse {
    /// Wrap a rendered tool result as `{ "result": text }`
    pub fn result(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            response: json!({ "result": text.into() }),
        }
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

// ============================================================================
// Request
// ============================================================================

/// Tool declaration exposed to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    /// Tool name
    pub name: String,
    /// When the model should use the tool
    pub description: String,
    /// JSON schema of the arguments
    pub parameters: Value,
}

/// Group of tool declarations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    /// Declared functions
    pub function_declarations: Vec<FunctionDeclaration>,
}

/// Whether the model may call tools this round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FunctionCallingMode {
    /// Model decides
    Auto,
    /// Text only
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FunctionCallingConfig {
    mode: FunctionCallingMode,
}

/// Tool-calling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolConfig {
    function_calling_config: FunctionCallingConfig,
}

/// System instruction block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInstruction {
    /// Instruction parts
    pub parts: Vec<Part>,
}

/// Sampling parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Output token ceiling
    pub max_output_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

/// `generateContent` request body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// System instruction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<SystemInstruction>,
    /// Transcript
    pub contents: Vec<Content>,
    /// Declared tools
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    /// Tool-calling mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_config: Option<ToolConfig>,
    /// Sampling parameters
    pub generation_config: GenerationConfig,
}

impl GenerateRequest {
    /// Request without tools
    pub fn new(
        system_instruction: impl Into<String>,
        contents: Vec<Content>,
        generation_config: GenerationConfig,
    ) -> Self {
        Self {
            system_instruction: Some(SystemInstruction {
                parts: vec![Part::text(system_instruction)],
            }),
            contents,
            tools: Vec::new(),
            tool_config: None,
            generation_config,
        }
    }

    /// Declare tools with the given calling mode
    #[must_use]
    pub fn with_tools(
        mut self,
        declarations: Vec<FunctionDeclaration>,
        mode: FunctionCallingMode,
    ) -> Self {
        if !declarations.is_empty() {
            self.tools = vec![Tool {
                function_declarations: declarations,
            }];
            self.tool_config = Some(ToolConfig {
                function_calling_config: FunctionCallingConfig { mode },
            });
        }
        self
    }

    /// Tool-calling mode in effect, if tools are declared
    #[must_use]
    pub fn calling_mode(&self) -> Option<FunctionCallingMode> {
        self.tool_config
            .as_ref()
            .map(|config| config.function_calling_config.mode)
    }
}

// ============================================================================
// Response
// ============================================================================

/// Why generation stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    /// Natural end
    Stop,
    /// Output token ceiling reached
    MaxTokens,
    /// Blocked by safety filters
    Safety,
    /// Anything else reported by the backend
    Other(String),
}

impl FinishReason {
    /// Parse the backend's finish reason string
    #[must_use]
    pub fn from_wire(value: &str) -> Self {
        match value {
            "STOP" => Self::Stop,
            "MAX_TOKENS" => Self::MaxTokens,
            "SAFETY" => Self::Safety,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// Token counts reported by the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    /// Prompt tokens
    pub prompt_tokens: i32,
    /// Output tokens
    pub output_tokens: i32,
}

/// Content block of a candidate
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateContent {
    /// Parts, in order
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// One response candidate
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Generated content
    #[serde(default)]
    pub content: Option<CandidateContent>,
    /// Finish reason, on the last chunk
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Token accounting block
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    /// Prompt tokens
    #[serde(default)]
    pub prompt_token_count: Option<i32>,
    /// Output tokens
    #[serde(default)]
    pub candidates_token_count: Option<i32>,
}

/// `generateContent` response body, also the shape of each streamed chunk
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    /// Candidates (the first one is used)
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    /// Token accounting
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
}

impl GenerateContentResponse {
    /// Decode into events: parts first, then finish reason, then usage
    #[must_use]
    pub fn into_events(self) -> Vec<ModelEvent> {
        let mut events = Vec::new();
        if let Some(candidate) = self.candidates.into_iter().next() {
            if let Some(content) = candidate.content {
                events.extend(content.parts.into_iter().map(ModelEvent::from_part));
            }
            if let Some(reason) = candidate.finish_reason {
                events.push(ModelEvent::Finish(FinishReason::from_wire(&reason)));
            }
        }
        if let Some(usage) = self.usage_metadata {
            events.push(ModelEvent::Usage(TokenUsage {
                prompt_tokens: usage.prompt_token_count.unwrap_or(0),
                output_tokens: usage.candidates_token_count.unwrap_or(0),
            }));
        }
        events
    }

    /// Concatenated answer text of the first candidate
    #[must_use]
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(Part::answer_text)
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_preserves_unknown_fields() {
        let raw = json!({
            "functionCall": { "name": "search_clientes", "args": { "nombre": "Garcia" } },
            "thoughtSignature": "sig-123",
            "videoMetadata": { "fps": 1 }
        });
        let part: Part = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(part.thought_signature.as_deref(), Some("sig-123"));
        assert!(part.extra.contains_key("videoMetadata"));
        assert_eq!(serde_json::to_value(&part).unwrap(), raw);
    }

    #[test]
    fn test_request_serializes_tool_config() {
        let request = GenerateRequest::new(
            "sistema",
            vec![Content::user_text("hola")],
            GenerationConfig {
                max_output_tokens: 1024,
                temperature: 0.3,
            },
        )
        .with_tools(
            vec![FunctionDeclaration {
                name: "get_ranking_ventas".to_owned(),
                description: "ranking".to_owned(),
                parameters: json!({ "type": "object", "properties": {} }),
            }],
            FunctionCallingMode::None,
        );

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sistema");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["toolConfig"]["functionCallingConfig"]["mode"], "NONE");
        assert_eq!(
            body["tools"][0]["functionDeclarations"][0]["name"],
            "get_ranking_ventas"
        );
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1024);
    }

    #[test]
    fn test_response_events_order() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [
                    { "text": "pensando", "thought": true },
                    { "text": "Hola" }
                ]},
                "finishReason": "MAX_TOKENS"
            }],
            "usageMetadata": { "promptTokenCount": 12, "candidatesTokenCount": 3 }
        }))
        .unwrap();

        assert_eq!(response.text(), "Hola");
        let events = response.into_events();
        assert!(matches!(events[0], ModelEvent::Thought(_)));
        assert!(matches!(events[1], ModelEvent::Text(_)));
        assert_eq!(events[2], ModelEvent::Finish(FinishReason::MaxTokens));
        assert_eq!(
            events[3],
            ModelEvent::Usage(TokenUsage {
                prompt_tokens: 12,
                output_tokens: 3
            })
        );
    }
}
