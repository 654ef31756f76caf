use crate::api::VideoBackend;
use crate::error::{ApiError, Result, body_snippet};
use crate::logw;
use async_trait::async_trait;
use reqwest::{Client, Request, RequestBuilder, header};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.d-id.com";

/// D-ID `/talks` client.
#[derive(Debug, Clone)]
pub struct DidClient {
    client: Client,
    auth_token: String,
    base_url: String,
}

impl DidClient {
    pub fn new(client: Client, auth_token: impl Into<String>) -> Self {
        Self {
            client,
            auth_token: auth_token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn talks_url(&self) -> String {
        format!("{}/talks", self.base_url)
    }

    fn talk_url(&self, talk_id: &str) -> String {
        format!("{}/talks/{}", self.base_url, talk_id)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header(header::ACCEPT, "application/json")
            .bearer_auth(&self.auth_token)
    }

    fn create_talk_request(&self, request: &TalkRequest) -> Result<Request> {
        Ok(self
            .authorized(self.client.post(self.talks_url()))
            .header(header::CONTENT_TYPE, "application/json")
            .json(request)
            .build()?)
    }

    fn get_talk_request(&self, talk_id: &str) -> Result<Request> {
        Ok(self
            .authorized(self.client.get(self.talk_url(talk_id)))
            .build()?)
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
        what: &str,
    ) -> Result<T> {
        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            logw(format!("D-ID {} HTTP {}", what, status.as_u16()));
            let snippet = body_snippet(&raw);
            if !snippet.is_empty() {
                logw(format!("D-ID raw body: {}", snippet));
            }
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: snippet,
            });
        }

        tracing::debug!(body = %body_snippet(&raw), "D-ID {} response", what);
        Ok(serde_json::from_str(&raw)?)
    }
}

#[async_trait]
impl VideoBackend for DidClient {
    async fn create_talk(&self, request: &TalkRequest) -> Result<TalkCreated> {
        let req = self.create_talk_request(request)?;
        let resp = self.client.execute(req).await?;
        self.read_json(resp, "create talk").await
    }

    async fn get_talk(&self, talk_id: &str) -> Result<TalkStatus> {
        let req = self.get_talk_request(talk_id)?;
        let resp = self.client.execute(req).await?;
        self.read_json(resp, "get talk").await
    }

    fn name(&self) -> &str {
        "D-ID"
    }
}

/// Body of `POST /talks`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TalkRequest {
    pub source_url: String,
    pub script: TalkScript,
    pub config: TalkConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TalkScript {
    #[serde(rename = "type")]
    pub kind: String,
    pub subtitles: bool,
    pub provider: TalkProvider,
    pub input: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TalkProvider {
    #[serde(rename = "type")]
    pub kind: String,
    pub voice_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TalkConfig {
    pub fluent: bool,
    pub pad_audio: String,
}

/// Response of `POST /talks`. Only the id matters.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TalkCreated {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl TalkCreated {
    /// The job id, treating an empty string the same as a missing field.
    pub fn job_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.trim().is_empty())
    }
}

/// Response of `GET /talks/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TalkStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub result_url: Option<String>,
}

impl TalkStatus {
    /// The rendered video location, if present and non-empty.
    pub fn result_url(&self) -> Option<&str> {
        self.result_url.as_deref().filter(|url| !url.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> TalkRequest {
        TalkRequest {
            source_url: "https://example.com/alice.jpg".into(),
            script: TalkScript {
                kind: "text".into(),
                subtitles: false,
                provider: TalkProvider {
                    kind: "microsoft".into(),
                    voice_id: "Sara".into(),
                },
                input: "Hello there".into(),
            },
            config: TalkConfig {
                fluent: false,
                pad_audio: "0.0".into(),
            },
        }
    }

    #[test]
    fn test_talk_request_wire_shape() {
        let json = serde_json::to_value(sample_request()).unwrap();

        assert_eq!(json["source_url"], "https://example.com/alice.jpg");
        assert_eq!(json["script"]["type"], "text");
        assert_eq!(json["script"]["subtitles"], false);
        assert_eq!(json["script"]["provider"]["type"], "microsoft");
        assert_eq!(json["script"]["provider"]["voice_id"], "Sara");
        assert_eq!(json["script"]["input"], "Hello there");
        assert_eq!(json["config"]["fluent"], false);
        assert_eq!(json["config"]["pad_audio"], "0.0");
    }

    #[test]
    fn test_created_without_id() {
        let created: TalkCreated = serde_json::from_str("{}").unwrap();
        assert_eq!(created.job_id(), None);

        let created: TalkCreated = serde_json::from_str(r#"{"id":""}"#).unwrap();
        assert_eq!(created.job_id(), None);

        let created: TalkCreated =
            serde_json::from_str(r#"{"id":"tlk_123","status":"created","created_by":"x"}"#)
                .unwrap();
        assert_eq!(created.job_id(), Some("tlk_123"));
    }

    #[test]
    fn test_status_result_url_presence() {
        let pending: TalkStatus = serde_json::from_str(r#"{"status":"started"}"#).unwrap();
        assert_eq!(pending.result_url(), None);

        let done: TalkStatus =
            serde_json::from_str(r#"{"status":"done","result_url":"https://x/video.mp4"}"#)
                .unwrap();
        assert_eq!(done.result_url(), Some("https://x/video.mp4"));
    }

    #[test]
    fn test_urls() {
        let client = DidClient::new(Client::new(), "token").with_base_url("http://localhost:1/");
        assert_eq!(client.talks_url(), "http://localhost:1/talks");
        assert_eq!(client.talk_url("tlk_9"), "http://localhost:1/talks/tlk_9");
    }

    #[test]
    fn test_create_talk_http_contract() {
        let client = DidClient::new(Client::new(), "secret-token");
        let req = client.create_talk_request(&sample_request()).unwrap();

        assert_eq!(req.method(), &reqwest::Method::POST);
        assert_eq!(req.url().as_str(), "https://api.d-id.com/talks");
        let headers = req.headers();
        assert_eq!(
            headers[header::AUTHORIZATION].to_str().unwrap(),
            "Bearer secret-token"
        );
        assert_eq!(headers[header::ACCEPT], "application/json");
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");

        let body: serde_json::Value =
            serde_json::from_slice(req.body().unwrap().as_bytes().unwrap()).unwrap();
        assert_eq!(body, serde_json::to_value(sample_request()).unwrap());
    }

    #[test]
    fn test_get_talk_http_contract() {
        let client = DidClient::new(Client::new(), "secret-token").with_base_url("http://localhost:1");
        let req = client.get_talk_request("tlk_42").unwrap();

        assert_eq!(req.method(), &reqwest::Method::GET);
        assert_eq!(req.url().as_str(), "http://localhost:1/talks/tlk_42");
        assert_eq!(
            req.headers()[header::AUTHORIZATION].to_str().unwrap(),
            "Bearer secret-token"
        );
        assert_eq!(req.headers()[header::ACCEPT], "application/json");
        assert!(req.body().is_none());
    }
}
