use crate::api::{DidClient, GeminiClient, ScriptBackend, VideoBackend};
use crate::config::Config;
use crate::error::GenerationError;
use crate::poller::{PollPolicy, PollState, poll_with_progress};
use crate::request::GenerationRequest;
use crate::script::{Script, generate_from_instruction, generate_script};
use crate::session::{RunTicket, Session};
use crate::video::{AvatarProfile, VideoJob, submit_video_job};
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct GenerationOutcome {
    pub script: Script,
    pub job: VideoJob,
    pub video_url: String,
}

#[derive(Clone)]
pub struct Pipeline {
    script_backend: Arc<dyn ScriptBackend>,
    video_backend: Arc<dyn VideoBackend>,
    avatar: AvatarProfile,
    poll: PollPolicy,
}

impl Pipeline {
    pub fn new(script_backend: Arc<dyn ScriptBackend>, video_backend: Arc<dyn VideoBackend>) -> Self {
        Self {
            script_backend,
            video_backend,
            avatar: AvatarProfile::default(),
            poll: PollPolicy::default(),
        }
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        let gemini = GeminiClient::new(client.clone(), &cfg.gemini_api_key).with_model(&cfg.gemini_model);
        let did = DidClient::new(client, &cfg.did_auth_token);

        Ok(Self::new(Arc::new(gemini), Arc::new(did))
            .with_avatar(cfg.avatar.clone())
            .with_poll_policy(cfg.poll))
    }

    pub fn with_avatar(mut self, avatar: AvatarProfile) -> Self {
        self.avatar = avatar;
        self
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn poll_policy(&self) -> &PollPolicy {
        &self.poll
    }

    /// Runs only the story step, outside any session.
    pub async fn script_only(&self, request: &GenerationRequest) -> Result<Script, GenerationError> {
        generate_script(self.script_backend.as_ref(), request).await
    }

    async fn drive(
        &self,
        session: &Session,
        request: &GenerationRequest,
        instruction: &str,
        ticket: &RunTicket,
    ) -> Result<GenerationOutcome, GenerationError> {
        let cancel = ticket.cancel_token();
        let script = until_cancelled(
            cancel,
            generate_from_instruction(
                self.script_backend.as_ref(),
                instruction,
                request.target_word_count(),
            ),
        )
        .await?;
        session.script_ready(ticket, &script)?;

        let mut job = until_cancelled(
            cancel,
            submit_video_job(self.video_backend.as_ref(), &self.avatar, &script),
        )
        .await?;
        session.job_submitted(ticket, job.job_id())?;

        let poll_cancel = cancel.child_token();
        let mut superseded = false;
        let polled = poll_with_progress(
            self.video_backend.as_ref(),
            &mut job,
            &self.poll,
            &poll_cancel,
            |state| {
                let attempts = match state {
                    PollState::Pending { attempts }
                    | PollState::Ready { attempts, .. }
                    | PollState::Exhausted { attempts }
                    | PollState::Cancelled { attempts } => *attempts,
                    PollState::Failed { attempt } => *attempt,
                };
                if session.poll_attempted(ticket, attempts).is_err() {
                    superseded = true;
                    poll_cancel.cancel();
                }
            },
        )
        .await;
        if superseded {
            return Err(GenerationError::Superseded);
        }
        let video_url = polled?;
        session.finish(ticket, &video_url)?;

        Ok(GenerationOutcome {
            script,
            job,
            video_url,
        })
    }
}

async fn until_cancelled<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, GenerationError>>,
) -> Result<T, GenerationError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(GenerationError::Cancelled),
        result = fut => result,
    }
}

/// One full run: validate, write the story, submit the talk, wait for the video.
/// A talk that was already created is never cancelled remotely.
pub async fn run_generation(
    pipeline: &Pipeline,
    session: &Session,
    request: &GenerationRequest,
) -> Result<GenerationOutcome, GenerationError> {
    let ticket = match session.begin_validated(request) {
        Ok(ticket) => ticket,
        Err(GenerationError::Busy) => {
            logw("A generation is already running; ignoring new request.");
            return Err(GenerationError::Busy);
        }
        Err(e) => {
            logw(e.user_message());
            return Err(e);
        }
    };
    let instruction = request.instruction();
    logi(format!(
        "\n=== Generating: {} ({}, {}, {}, {}) ===",
        request.topic().trim(),
        request.theme(),
        request.tone(),
        request.audience(),
        request.length()
    ));

    let result = pipeline.drive(session, request, &instruction, &ticket).await;
    match &result {
        Ok(outcome) => logok(format!("DONE: {}", outcome.video_url)),
        Err(e) => {
            logw(format!("FAILED: {}", e));
            session.fail(&ticket, e);
        }
    }
    result
}
