//! OpenRouter completion client (OpenAI-compatible chat completions).

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::classifier::{ErrorClassifier, RuleClassifier};
use crate::completion::{
    single_fragment, ChatTurn, CompletionClient, CompletionFailure, CompletionRequest,
    FailureKind, FragmentStream, ModelInfo,
};
use crate::sse;

const PROVIDER: &str = "OpenRouter";

// OpenAI-compatible wire types
#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: Option<WireContent>,
    delta: Option<WireContent>,
}

#[derive(Debug, Deserialize)]
struct WireContent {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireModels {
    #[serde(default)]
    data: Vec<WireModel>,
}

#[derive(Debug, Deserialize)]
struct WireModel {
    id: String,
    name: Option<String>,
}

/// Client for `https://openrouter.ai/api/v1`.
pub struct OpenRouterClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    site_url: String,
    site_name: String,
    classifier: Arc<RuleClassifier>,
}

impl std::fmt::Debug for OpenRouterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterClient")
            .field("base_url", &self.base_url)
            .field("site_name", &self.site_name)
            .finish_non_exhaustive()
    }
}

impl OpenRouterClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        api_key: &str,
        site_url: &str,
        site_name: &str,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            site_url: site_url.to_string(),
            site_name: site_name.to_string(),
            classifier: Arc::new(RuleClassifier::openrouter()),
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.site_url)
            .header("X-Title", &self.site_name)
    }
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn classifier(&self) -> Arc<dyn ErrorClassifier> {
        self.classifier.clone()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<FragmentStream, CompletionFailure> {
        let body = WireRequest {
            model: &request.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: request.stream,
        };

        tracing::debug!(
            provider = PROVIDER,
            model = %request.model,
            messages = request.messages.len(),
            stream = request.stream,
            "Sending completion request"
        );

        let response = self
            .post("/chat/completions")
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
            return Ok(sse::fragment_stream(response, PROVIDER, parse_stream_chunk));
        }

        let text = response.text().await.map_err(CompletionFailure::from_reqwest)?;
        let reply = parse_completion(&text)?;
        Ok(single_fragment(reply))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, CompletionFailure> {
        let response = self
            .http
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
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
            .data
            .into_iter()
            .map(|m| ModelInfo {
                id: m.id,
                display_name: m.name,
            })
            .collect())
    }
}

/// Extract the reply text from a non-streaming response body.
fn parse_completion(body: &str) -> Result<String, CompletionFailure> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| CompletionFailure::decode(format!("invalid completion body: {}", e)))?;
    if value.get("error").is_some() {
        return Err(failure_from_value(None, &value, body));
    }
    let parsed: WireResponse = serde_json::from_value(value)
        .map_err(|e| CompletionFailure::decode(format!("invalid completion body: {}", e)))?;

    Ok(parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .unwrap_or_default())
}

/// Extract the delta text from one streamed chunk.
fn parse_stream_chunk(data: &str) -> Result<Option<String>, CompletionFailure> {
    let value: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| CompletionFailure::decode(format!("invalid stream chunk: {}", e)))?;
    if value.get("error").is_some() {
        return Err(failure_from_value(None, &value, data));
    }
    let chunk: WireResponse = serde_json::from_value(value)
        .map_err(|e| CompletionFailure::decode(format!("invalid stream chunk: {}", e)))?;

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta)
        .and_then(|d| d.content))
}

/// Build a failure from a non-success response body.
fn parse_error_body(status: u16, body: &str) -> CompletionFailure {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => failure_from_value(Some(status), &value, body),
        Err(_) => {
            let message = if body.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                body.trim().to_string()
            };
            CompletionFailure::http(status, message)
        }
    }
}

/// `{"error": {"message": "...", "code": 429}}`; the code may be numeric.
fn failure_from_value(status: Option<u16>, value: &serde_json::Value, raw: &str) -> CompletionFailure {
    let error = &value["error"];
    let message = error["message"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| raw.trim().to_string());

    let code = match &error["code"] {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    // OpenRouter repeats the HTTP status as a numeric code in-band on streams.
    let status = status.or_else(|| error["code"].as_u64().and_then(|c| u16::try_from(c).ok()));

    let mut failure = match status {
        Some(status) => CompletionFailure::http(status, message),
        None => CompletionFailure::new(FailureKind::Http, message),
    };
    failure.code = code;
    failure
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecobot_core::types::Role;

    #[test]
    fn test_request_body_shape() {
        let messages = vec![
            ChatTurn {
                role: Role::System,
                content: "persona".to_string(),
            },
            ChatTurn {
                role: Role::User,
                content: "Hi".to_string(),
            },
        ];
        let body = WireRequest {
            model: "anthropic/claude-3.5-sonnet",
            messages: &messages,
            max_tokens: 500,
            temperature: 0.5,
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "anthropic/claude-3.5-sonnet");
        assert_eq!(json["max_tokens"], 500);
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "Hi");
    }

    #[test]
    fn test_parse_completion() {
        let body = r#"{"id":"gen-1","choices":[{"index":0,"message":{"role":"assistant","content":"Take the train."}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "Take the train.");
    }

    #[test]
    fn test_parse_completion_without_choices_is_empty() {
        assert_eq!(parse_completion(r#"{"choices":[]}"#).unwrap(), "");
        assert_eq!(
            parse_completion(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap(),
            ""
        );
    }

    #[test]
    fn test_parse_completion_in_band_error() {
        let body = r#"{"error":{"message":"Rate limit exceeded","code":429}}"#;
        let failure = parse_completion(body).unwrap_err();
        assert_eq!(failure.status, Some(429));
        assert_eq!(failure.message, "Rate limit exceeded");
    }

    #[test]
    fn test_parse_completion_garbage_is_decode_failure() {
        let failure = parse_completion("<html>").unwrap_err();
        assert_eq!(failure.kind, FailureKind::Decode);
    }

    #[test]
    fn test_parse_stream_chunk() {
        let chunk = r#"{"choices":[{"index":0,"delta":{"content":"Trains "}}]}"#;
        assert_eq!(parse_stream_chunk(chunk).unwrap().as_deref(), Some("Trains "));

        let role_only = r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_stream_chunk(role_only).unwrap(), None);
    }

    #[test]
    fn test_parse_error_body_json() {
        let failure = parse_error_body(
            401,
            r#"{"error":{"message":"No auth credentials found","code":401}}"#,
        );
        assert_eq!(failure.kind, FailureKind::Http);
        assert_eq!(failure.status, Some(401));
        assert_eq!(failure.code.as_deref(), Some("401"));
        assert_eq!(failure.message, "No auth credentials found");
    }

    #[test]
    fn test_parse_error_body_plain_text() {
        let failure = parse_error_body(502, "Bad Gateway");
        assert_eq!(failure.status, Some(502));
        assert_eq!(failure.message, "Bad Gateway");

        let failure = parse_error_body(500, "");
        assert_eq!(failure.message, "HTTP 500");
    }

    #[test]
    fn test_debug_hides_api_key() {
        let client = OpenRouterClient::new(
            reqwest::Client::new(),
            "https://openrouter.ai/api/v1/",
            "sk-or-secret",
            "https://example.org",
            "EcoTravel Platform",
        );
        let dbg = format!("{:?}", client);
        assert!(!dbg.contains("sk-or-secret"));
        assert!(dbg.contains("https://openrouter.ai/api/v1"));
        assert_eq!(client.name(), "OpenRouter");
    }
}
