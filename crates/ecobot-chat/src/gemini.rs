//! Google Gemini completion client (`generateContent` REST API).

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ecobot_core::types::Role;

use crate::classifier::{ErrorClassifier, RuleClassifier};
use crate::completion::{
    single_fragment, ChatTurn, CompletionClient, CompletionFailure, CompletionRequest,
    FragmentStream, ModelInfo,
};
use crate::sse;

const PROVIDER: &str = "Gemini";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    generation_config: WireGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WirePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    prompt_feedback: Option<WirePromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    content: Option<WireContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireModels {
    #[serde(default)]
    models: Vec<WireModel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireModel {
    name: String,
    display_name: Option<String>,
}

/// Client for `https://generativelanguage.googleapis.com/v1beta`.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    classifier: Arc<RuleClassifier>,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            classifier: Arc::new(RuleClassifier::gemini()),
        }
    }

    fn endpoint(&self, model: &str, stream: bool) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        if stream {
            format!("{}/models/{}:streamGenerateContent?alt=sse", self.base_url, model)
        } else {
            format!("{}/models/{}:generateContent", self.base_url, model)
        }
    }
}

#[async_trait]
impl CompletionClient for GeminiClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn classifier(&self) -> Arc<dyn ErrorClassifier> {
        self.classifier.clone()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<FragmentStream, CompletionFailure> {
        let body = build_request(&request);

        tracing::debug!(
            provider = PROVIDER,
            model = %request.model,
            contents = body.contents.len(),
            stream = request.stream,
            "Sending completion request"
        );

        let response = self
            .http
            .post(self.endpoint(&request.model, request.stream))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(CompletionFailure::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error_body(status.as_u16(), &text));
        }

        if request.stream {
            return Ok(sse::fragment_stream(response, PROVIDER, |data| {
                parse_response(data).map(Some)
            }));
        }

        let text = response.text().await.map_err(CompletionFailure::from_reqwest)?;
        Ok(single_fragment(parse_response(&text)?))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, CompletionFailure> {
        let response = self
            .http
            .get(format!("{}/models", self.base_url))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(CompletionFailure::from_reqwest)?;

        let status = response.status();
        let text = response.text().await.map_err(CompletionFailure::from_reqwest)?;
        if !status.is_success() {
            return Err(parse_error_body(status.as_u16(), &text));
        }

        let models: WireModels = serde_json::from_str(&text)
            .map_err(|e| CompletionFailure::decode(format!("invalid model list: {}", e)))?;
        Ok(models
            .models
            .into_iter()
            .map(|m| ModelInfo {
                id: m.name.trim_start_matches("models/").to_string(),
                display_name: m.display_name,
            })
            .collect())
    }
}

/// Gemini has no system role in `contents`: the persona goes to
/// `systemInstruction` and assistant turns are sent as role `model`.
fn build_request(request: &CompletionRequest) -> WireRequest {
    let system: Vec<&ChatTurn> = request
        .messages
        .iter()
        .filter(|t| t.role == Role::System)
        .collect();

    let system_instruction = if system.is_empty() {
        None
    } else {
        Some(WireContent {
            role: None,
            parts: system
                .iter()
                .map(|t| WirePart {
                    text: t.content.clone(),
                })
                .collect(),
        })
    };

    // Contents must open with a user turn and alternate roles. Trimming can
    // leave a leading reply and a failed send leaves two user turns in a row.
    let mut contents: Vec<WireContent> = Vec::new();
    for turn in request.messages.iter().filter(|t| t.role != Role::System) {
        let role = if turn.role == Role::Assistant { "model" } else { "user" };
        let part = WirePart {
            text: turn.content.clone(),
        };
        match contents.last().map(|c| c.role.as_deref() == Some(role)) {
            None if role == "model" => {}
            Some(true) => {
                if let Some(last) = contents.last_mut() {
                    last.parts.push(part);
                }
            }
            _ => contents.push(WireContent {
                role: Some(role.to_string()),
                parts: vec![part],
            }),
        }
    }

    WireRequest {
        contents,
        system_instruction,
        generation_config: WireGenerationConfig {
            max_output_tokens: request.max_tokens,
            temperature: request.temperature,
        },
    }
}

/// Extract reply text from a full response or one streamed chunk.
fn parse_response(body: &str) -> Result<String, CompletionFailure> {
    let parsed: WireResponse = serde_json::from_str(body)
        .map_err(|e| CompletionFailure::decode(format!("invalid Gemini response: {}", e)))?;

    if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(CompletionFailure::blocked(format!("prompt blocked: {}", reason)).with_code(reason));
    }

    let Some(candidate) = parsed.candidates.into_iter().next() else {
        return Ok(String::new());
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() && candidate.finish_reason.as_deref() == Some("SAFETY") {
        return Err(CompletionFailure::blocked("response blocked: SAFETY").with_code("SAFETY"));
    }
    Ok(text)
}

/// `{"error": {"code": 429, "message": "...", "status": "RESOURCE_EXHAUSTED"}}`
fn parse_error_body(status: u16, body: &str) -> CompletionFailure {
    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => {
            let message = if body.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                body.trim().to_string()
            };
            return CompletionFailure::http(status, message);
        }
    };

    let error = &value["error"];
    let message = error["message"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string());
    let failure = CompletionFailure::http(status, message);
    match error["status"].as_str() {
        Some(code) => failure.with_code(code),
        None => failure,
    }
}
