use crate::api::ScriptBackend;
use crate::error::{ApiError, Result, body_snippet};
use crate::logw;
use async_trait::async_trait;
use reqwest::{Client, Request};
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Google Gemini `generateContent` client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    fn build_request(&self, prompt: &str) -> Result<Request> {
        Ok(self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&GeminiRequest::from_prompt(prompt))
            .build()?)
    }
}

#[async_trait]
impl ScriptBackend for GeminiClient {
    async fn generate_content(&self, prompt: &str) -> Result<String> {
        let req = self.build_request(prompt)?;
        let resp = self.client.execute(req).await?;

        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            logw(format!("Gemini HTTP {}", status.as_u16()));
            let snippet = body_snippet(&raw);
            if !snippet.is_empty() {
                logw(format!("Gemini raw body: {}", snippet));
            }
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: snippet,
            });
        }

        let parsed: GeminiResponse = serde_json::from_str(&raw)?;
        parsed.into_text()
    }

    fn name(&self) -> &str {
        "Gemini"
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

impl GeminiRequest {
    fn from_prompt(prompt: &str) -> Self {
        Self {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
        }
    }
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
struct GeminiPartResponse {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiResponse {
    /// Joins the text parts of the first candidate.
    fn into_text(self) -> Result<String> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ApiError::Blocked(reason));
        }

        let candidate = self.candidates.into_iter().next().ok_or_else(|| {
            ApiError::UnexpectedResponse("No candidates in Gemini response".into())
        })?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            let reason = candidate.finish_reason.unwrap_or_else(|| "none".into());
            return Err(ApiError::UnexpectedResponse(format!(
                "No text in Gemini response (finish reason: {})",
                reason
            )));
        }

        Ok(text)
    }
}
