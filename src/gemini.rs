//! Gemini API client
//!
//! Implements [`ChatModel`] over `generateContent` with function calling.
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::agent::{ChatModel, ModelRequest, ModelTurn, Turn};
use crate::error::AssistantError;
use crate::tools::ToolSpec;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-lite";
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: model.into(),
            base_url: GEMINI_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelTurn> {
        if self.api_key.is_empty() {
            return Err(AssistantError::LlmError(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let body = build_request(request);
        debug!(
            model = %self.model,
            turns = body.contents.len(),
            "Calling Gemini API"
        );

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                AssistantError::LlmError(format!("Gemini API error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Gemini API error response: {}", error_text);
            return Err(AssistantError::LlmError(format!(
                "Gemini API error ({}): {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            AssistantError::LlmError(format!("Gemini parse error: {}", e))
        })?;

        if let Some(usage) = &gemini_response.usage_metadata {
            debug!(
                prompt_tokens = usage.prompt_token_count.unwrap_or_default(),
                candidate_tokens = usage.candidates_token_count.unwrap_or_default(),
                "Gemini usage"
            );
        }

        parse_model_turn(gemini_response)
    }
}

fn build_request(request: ModelRequest<'_>) -> GeminiRequest {
    let contents = request.turns.iter().map(turn_to_content).collect();

    let tools = if request.tools.is_empty() {
        Vec::new()
    } else {
        vec![ToolDeclarations {
            function_declarations: request.tools.iter().map(FunctionDeclaration::from).collect(),
        }]
    };

    GeminiRequest {
        contents,
        system_instruction: SystemInstruction {
            parts: vec![Part::text(request.system)],
        },
        tools,
        generation_config: GenerationConfig {
            temperature: 0.3,
            top_p: 0.9,
            top_k: 40,
            max_output_tokens: 1024,
        },
    }
}

fn turn_to_content(turn: &Turn) -> Content {
    let (role, part) = match turn {
        Turn::User(text) => ("user", Part::text(text)),
        Turn::Model(text) => ("model", Part::text(text)),
        Turn::ToolCall { name, arguments } => (
            "model",
            Part {
                function_call: Some(FunctionCall {
                    name: name.clone(),
                    args: arguments.clone(),
                }),
                ..Part::default()
            },
        ),
        Turn::ToolResult { name, output } => {
            // functionResponse.response must be a JSON object
            let response = if output.is_object() {
                output.clone()
            } else {
                json!({ "result": output })
            };
            (
                "user",
                Part {
                    function_response: Some(FunctionResponse {
                        name: name.clone(),
                        response,
                    }),
                    ..Part::default()
                },
            )
        }
    };

    Content {
        role: Some(role.to_string()),
        parts: vec![part],
    }
}

fn parse_model_turn(response: GeminiResponse) -> Result<ModelTurn> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.get("blockReason"))
            .and_then(Value::as_str)
            .unwrap_or("no candidates");
        return Err(AssistantError::LlmError(format!(
            "No response from Gemini API: {}",
            reason
        )));
    };

    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();

    if let Some(call) = parts.iter().find_map(|p| p.function_call.as_ref()) {
        return Ok(ModelTurn::ToolCall {
            name: call.name.clone(),
            arguments: call.args.clone(),
        });
    }

    let text: String = parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect::<Vec<_>>()
        .join("");

    debug!(
        finish_reason = candidate.finish_reason.as_deref().unwrap_or("unknown"),
        "Gemini response received"
    );

    Ok(ModelTurn::Answer(text))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    system_instruction: SystemInstruction,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDeclarations>,
    generation_config: GenerationConfig,
}

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
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolDeclarations {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

impl From<&ToolSpec> for FunctionDeclaration {
    fn from(spec: &ToolSpec) -> Self {
        Self {
            name: spec.name.clone(),
            description: spec.description.clone(),
            parameters: spec.parameters.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    prompt_feedback: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<i32>,
    candidates_token_count: Option<i32>,
}
