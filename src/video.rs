//! Video job submission.

use crate::api::{TalkConfig, TalkProvider, TalkRequest, TalkScript, VideoBackend};
use crate::error::GenerationError;
use crate::script::Script;
use crate::{logi, logok, logw};
use serde::{Deserialize, Serialize};

const DEFAULT_SOURCE_URL: &str = "https://d-id-public-bucket.s3.us-west-2.amazonaws.com/alice.jpg";

/// Fixed avatar and voice used for every talk. Not user-selectable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarProfile {
    #[serde(default = "default_source_url")]
    pub source_url: String,
    #[serde(default = "default_voice_provider")]
    pub voice_provider: String,
    #[serde(default = "default_voice_id")]
    pub voice_id: String,
}

fn default_source_url() -> String {
    DEFAULT_SOURCE_URL.to_string()
}

fn default_voice_provider() -> String {
    "microsoft".to_string()
}

fn default_voice_id() -> String {
    "Sara".to_string()
}

impl Default for AvatarProfile {
    fn default() -> Self {
        Self {
            source_url: default_source_url(),
            voice_provider: default_voice_provider(),
            voice_id: default_voice_id(),
        }
    }
}

impl AvatarProfile {
    /// Builds the talk body: script as spoken text, subtitles off, no audio padding.
    pub fn talk_request(&self, script: &Script) -> TalkRequest {
        TalkRequest {
            source_url: self.source_url.clone(),
            script: TalkScript {
                kind: "text".to_string(),
                subtitles: false,
                provider: TalkProvider {
                    kind: self.voice_provider.clone(),
                    voice_id: self.voice_id.clone(),
                },
                input: script.text().to_string(),
            },
            config: TalkConfig {
                fluent: false,
                pad_audio: "0.0".to_string(),
            },
        }
    }
}

/// A submitted rendering job. Only the poller fills in `result_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoJob {
    job_id: String,
    result_url: Option<String>,
}

impl VideoJob {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            result_url: None,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn result_url(&self) -> Option<&str> {
        self.result_url.as_deref()
    }

    pub(crate) fn set_result_url(&mut self, url: impl Into<String>) {
        self.result_url = Some(url.into());
    }
}

/// Sends the script to the video backend and returns the created job.
///
/// A successful HTTP exchange that carries no `id` is reported as
/// [`GenerationError::NoJobId`]. Nothing is cancelled remotely if later steps fail.
pub async fn submit_video_job(
    backend: &dyn VideoBackend,
    avatar: &AvatarProfile,
    script: &Script,
) -> Result<VideoJob, GenerationError> {
    let request = avatar.talk_request(script);
    logi(format!(
        "Submitting {} talk ({} chars, voice {}/{})...",
        backend.name(),
        script.text().len(),
        avatar.voice_provider,
        avatar.voice_id
    ));

    let created = backend.create_talk(&request).await.map_err(|e| {
        logw(format!("{} submission failed: {}", backend.name(), e));
        GenerationError::Submission(e)
    })?;

    let Some(job_id) = created.job_id() else {
        logw(format!("Invalid video ID received: {:?}", created.id));
        return Err(GenerationError::NoJobId);
    };

    logok(format!("Video job created: {}", job_id));
    Ok(VideoJob::new(job_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_avatar() {
        let avatar = AvatarProfile::default();
        assert!(avatar.source_url.ends_with("alice.jpg"));
        assert_eq!(avatar.voice_provider, "microsoft");
        assert_eq!(avatar.voice_id, "Sara");
    }

    #[test]
    fn test_talk_request_carries_script_verbatim() {
        let script = Script::new("  A dragon sneezed.\nThe end.  ");
        let req = AvatarProfile::default().talk_request(&script);
        assert_eq!(req.script.input, "  A dragon sneezed.\nThe end.  ");
        assert_eq!(req.script.kind, "text");
        assert!(!req.script.subtitles);
        assert!(!req.config.fluent);
        assert_eq!(req.config.pad_audio, "0.0");
    }

    #[test]
    fn test_avatar_partial_deserialize_fills_defaults() {
        let avatar: AvatarProfile = serde_json::from_str(r#"{"voice_id":"Jenny"}"#).unwrap();
        assert_eq!(avatar.voice_id, "Jenny");
        assert_eq!(avatar.voice_provider, "microsoft");
    }

    #[test]
    fn test_video_job_starts_without_url() {
        let mut job = VideoJob::new("tlk_1");
        assert_eq!(job.result_url(), None);
        job.set_result_url("https://x/video.mp4");
        assert_eq!(job.result_url(), Some("https://x/video.mp4"));
    }
}
