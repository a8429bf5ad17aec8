use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use super::{Completion, CompletionRequest, LanguageModel};
use crate::config::LlmConfig;
use crate::{PrdflowError, SecretValue};

/// Client for the Gemini `generateContent` REST endpoint.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: SecretValue,
}

impl GeminiClient {
    pub fn new(config: &LlmConfig, api_key: SecretValue) -> Result<Self, PrdflowError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("prdflow/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    #[instrument(
        name = "llm.gemini",
        skip(self, request),
        fields(model = %self.model, role = %request.role, operation = request.operation, grounded = request.grounded)
    )]
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, PrdflowError> {
        let body = GenerateContentRequest::from(&request);

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let payload = response.text().await?;

        if !status.is_success() {
            return Err(PrdflowError::Api {
                status: status.as_u16(),
                message: api_error_message(&payload),
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&payload)
            .map_err(|err| PrdflowError::Other(anyhow::anyhow!("malformed model response: {err}")))?;
        let completion = parsed.into_completion()?;

        debug!(
            chars = completion.text.len(),
            sources = completion.grounding_sources.len(),
            "model call completed"
        );
        Ok(completion)
    }
}

fn api_error_message(payload: &str) -> String {
    serde_json::from_str::<Value>(payload)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| payload.chars().take(500).collect())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
}

impl From<&CompletionRequest> for GenerateContentRequest {
    fn from(request: &CompletionRequest) -> Self {
        let tools = if request.grounded {
            vec![serde_json::json!({ "google_search": {} })]
        } else {
            Vec::new()
        };

        Self {
            system_instruction: request.system.as_ref().map(|text| Content {
                role: None,
                parts: vec![Part {
                    text: Some(text.clone()),
                }],
            }),
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(request.prompt.clone()),
                }],
            }],
            tools,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebChunk>,
}

#[derive(Debug, Deserialize)]
struct WebChunk {
    #[serde(default)]
    uri: Option<String>,
}

impl GenerateContentResponse {
    fn into_completion(self) -> Result<Completion, PrdflowError> {
        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or(PrdflowError::EmptyCompletion)?;

        let text: String = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(PrdflowError::EmptyCompletion);
        }

        let mut grounding_sources: Vec<String> = Vec::new();
        for uri in candidate
            .grounding_metadata
            .into_iter()
            .flat_map(|meta| meta.grounding_chunks)
            .filter_map(|chunk| chunk.web.and_then(|web| web.uri))
        {
            if !grounding_sources.contains(&uri) {
                grounding_sources.push(uri);
            }
        }

        Ok(Completion {
            text,
            grounding_sources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentRole;

    #[test]
    fn request_body_includes_system_and_search_tool() {
        let request = CompletionRequest::new(AgentRole::Researcher, "research.search", "battery")
            .with_system("You research.")
            .grounded();

        let body = serde_json::to_value(GenerateContentRequest::from(&request)).unwrap();

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "You research.");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "battery");
        assert!(body["tools"][0].get("google_search").is_some());
    }

    #[test]
    fn ungrounded_request_omits_tools_and_system() {
        let request = CompletionRequest::new(AgentRole::Writer, "write.draft", "notes");
        let body = serde_json::to_value(GenerateContentRequest::from(&request)).unwrap();

        assert!(body.get("tools").is_none());
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn response_parts_are_concatenated_and_sources_deduplicated() {
        let payload = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Hello, "}, {"text": "world"}]},
                "finishReason": "STOP",
                "groundingMetadata": {
                    "groundingChunks": [
                        {"web": {"uri": "https://a.example", "title": "A"}},
                        {"web": {"uri": "https://a.example", "title": "A again"}},
                        {"web": {"uri": "https://b.example"}}
                    ]
                }
            }]
        }"#;

        let parsed: GenerateContentResponse = serde_json::from_str(payload).unwrap();
        let completion = parsed.into_completion().unwrap();

        assert_eq!(completion.text, "Hello, world");
        assert_eq!(
            completion.grounding_sources,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn missing_candidates_is_an_empty_completion() {
        let parsed: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#).unwrap();
        assert!(matches!(
            parsed.into_completion(),
            Err(PrdflowError::EmptyCompletion)
        ));
    }

    #[test]
    fn api_error_message_prefers_json_message() {
        let payload = r#"{"error": {"code": 429, "message": "Resource exhausted", "status": "RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(api_error_message(payload), "Resource exhausted");
        assert_eq!(api_error_message("upstream timeout"), "upstream timeout");
    }
}
