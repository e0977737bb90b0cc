//! Google Gemini provider implementation.
//!
//! Uses the Generative Language REST API (`generateContent`).
//!
//! Mapping notes:
//! - System messages become the top-level `systemInstruction` field
//! - Tool schemas are sent as `functionDeclarations`
//! - Assistant tool requests arrive as `functionCall` parts; the API has no
//!   call ids, so ids are minted locally to satisfy the one-result-per-call
//!   bookkeeping
//! - Tool result messages are sent back as `functionResponse` parts, with
//!   the function name resolved from the assistant turn that requested it

use async_trait::async_trait;
use siteforge_core::error::ProviderError;
use siteforge_core::message::{Message, MessageToolCall, Role};
use siteforge_core::provider::{
    Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini `generateContent` provider.
pub struct GeminiProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Create a new Gemini provider.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            name: "gemini".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Create with a custom base URL (for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Extract system messages; Gemini takes them as a top-level field.
    fn extract_system(messages: &[Message]) -> (Option<String>, Vec<&Message>) {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut non_system: Vec<&Message> = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => system_parts.push(&msg.content),
                _ => non_system.push(msg),
            }
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };

        (system, non_system)
    }

    /// Resolve the tool name a call id belongs to, scanning assistant turns.
    fn tool_name_for_call(messages: &[&Message], call_id: &str) -> Option<String> {
        messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .flat_map(|m| m.tool_calls.iter())
            .find(|tc| tc.id == call_id)
            .map(|tc| tc.name.clone())
    }

    /// Convert messages to Gemini `contents`.
    fn to_api_contents(messages: &[&Message]) -> Vec<ApiContent> {
        let mut contents = Vec::new();

        for msg in messages {
            match msg.role {
                Role::User => contents.push(ApiContent {
                    role: "user".into(),
                    parts: vec![ApiPart::text(&msg.content)],
                }),
                Role::Assistant => {
                    let mut parts = Vec::new();
                    if !msg.content.is_empty() {
                        parts.push(ApiPart::text(&msg.content));
                    }
                    for tc in &msg.tool_calls {
                        parts.push(ApiPart {
                            text: None,
                            function_call: Some(ApiFunctionCall {
                                name: tc.name.clone(),
                                args: tc.arguments.clone(),
                            }),
                            function_response: None,
                        });
                    }
                    if !parts.is_empty() {
                        contents.push(ApiContent {
                            role: "model".into(),
                            parts,
                        });
                    }
                }
                Role::Tool => {
                    let call_id = msg.tool_call_id.as_deref().unwrap_or_default();
                    let name = Self::tool_name_for_call(messages, call_id)
                        .unwrap_or_else(|| "unknown".into());
                    contents.push(ApiContent {
                        role: "user".into(),
                        parts: vec![ApiPart {
                            text: None,
                            function_call: None,
                            function_response: Some(ApiFunctionResponse {
                                name,
                                response: serde_json::json!({ "content": msg.content }),
                            }),
                        }],
                    });
                }
                Role::System => {} // handled separately
            }
        }

        contents
    }

    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiTool> {
        if tools.is_empty() {
            return Vec::new();
        }
        vec![ApiTool {
            function_declarations: tools
                .iter()
                .map(|t| ApiFunctionDeclaration {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                })
                .collect(),
        }]
    }

    /// Fold the response candidate into an assistant [`Message`].
    fn parse_candidate(candidate: ApiCandidate) -> Message {
        let mut text_parts = Vec::new();
        let mut tool_calls = Vec::new();

        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(text) = part.text {
                text_parts.push(text);
            }
            if let Some(call) = part.function_call {
                tool_calls.push(MessageToolCall {
                    // Gemini has no call ids; mint one per call.
                    id: format!("call_{}", Uuid::new_v4().simple()),
                    name: call.name,
                    arguments: call.args,
                });
            }
        }

        Message::assistant_with_calls(text_parts.join(""), tool_calls)
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, request.model
        );

        let (system, messages) = Self::extract_system(&request.messages);
        let body = ApiRequest {
            system_instruction: system.map(|text| ApiSystemInstruction {
                parts: vec![ApiPart::text(&text)],
            }),
            contents: Self::to_api_contents(&messages),
            tools: Self::to_api_tools(&request.tools),
            generation_config: ApiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        };

        debug!(model = %request.model, messages = body.contents.len(), "Gemini request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Gemini API error");
            return Err(match status.as_u16() {
                401 | 403 => ProviderError::AuthenticationFailed(message),
                404 => ProviderError::ModelNotFound(request.model),
                429 => ProviderError::RateLimited {
                    retry_after_secs: 30,
                },
                code => ProviderError::ApiError {
                    status_code: code,
                    message,
                },
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        let candidate = api_response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse("no candidates in response".into()))?;

        let message = Self::parse_candidate(candidate);
        let usage = api_response.usage_metadata.map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        Ok(ProviderResponse {
            message,
            usage,
            model: request.model,
        })
    }
}

// --- Wire DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ApiSystemInstruction>,
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
    generation_config: ApiGenerationConfig,
}

#[derive(Serialize)]
struct ApiSystemInstruction {
    parts: Vec<ApiPart>,
}

#[derive(Serialize, Deserialize)]
struct ApiContent {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<ApiFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<ApiFunctionResponse>,
}

impl ApiPart {
    fn text(s: &str) -> Self {
        Self {
            text: Some(s.to_string()),
            function_call: None,
            function_response: None,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Serialize, Deserialize)]
struct ApiFunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiTool {
    function_declarations: Vec<ApiFunctionDeclaration>,
}

#[derive(Serialize)]
struct ApiFunctionDeclaration {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    #[serde(default)]
    usage_metadata: Option<ApiUsageMetadata>,
}

#[derive(Deserialize)]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiContent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}
