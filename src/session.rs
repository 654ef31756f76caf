//! Generation state as an explicit state machine.
//!
//! `Idle -> GeneratingScript -> GeneratingVideo -> FetchingVideo -> Done`, with any
//! busy phase able to drop to `Failed`. A new run may start only from a non-busy
//! phase, so at most one video job is ever in flight per session. The methods on
//! [`Session`] are the only places state changes.

use crate::error::GenerationError;
use crate::request::GenerationRequest;
use crate::script::Script;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

pub const SCRIPT_PLACEHOLDER: &str = "Enter a prompt to generate a Script";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    GeneratingScript,
    GeneratingVideo,
    FetchingVideo,
    Done,
    Failed,
}

impl Phase {
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::GeneratingScript | Self::GeneratingVideo | Self::FetchingVideo
        )
    }

    fn can_move_to(&self, next: Phase) -> bool {
        use Phase::*;
        match (self, next) {
            (Idle | Done | Failed, GeneratingScript) => true,
            (Idle | Done | Failed, Failed) => true,
            (GeneratingScript, GeneratingVideo) => true,
            (GeneratingVideo, FetchingVideo) => true,
            (FetchingVideo, Done) => true,
            (GeneratingScript | GeneratingVideo | FetchingVideo, Failed) => true,
            _ => false,
        }
    }
}

/// Handle for one run. Every transition after `begin` must present it.
#[derive(Debug, Clone)]
pub struct RunTicket {
    id: u64,
    cancel: CancellationToken,
}

impl RunTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Everything a presentation layer needs to render the current state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub is_generating_script: bool,
    pub is_generating_video: bool,
    pub is_fetching_video: bool,
    pub is_busy: bool,
    pub error: Option<String>,
    pub generated_prompt: Option<String>,
    pub generated_script: String,
    pub job_id: Option<String>,
    pub video_url: Option<String>,
    pub poll_attempts: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct SessionInner {
    phase: Phase,
    run: u64,
    error: Option<String>,
    generated_prompt: Option<String>,
    generated_script: String,
    job_id: Option<String>,
    video_url: Option<String>,
    poll_attempts: u32,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    cancel: Option<CancellationToken>,
}

impl Default for SessionInner {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            run: 0,
            error: None,
            generated_prompt: None,
            generated_script: SCRIPT_PLACEHOLDER.to_string(),
            job_id: None,
            video_url: None,
            poll_attempts: 0,
            started_at: None,
            finished_at: None,
            cancel: None,
        }
    }
}

impl SessionInner {
    fn move_to(&mut self, next: Phase) -> bool {
        if !self.phase.can_move_to(next) {
            tracing::warn!(from = ?self.phase, to = ?next, "ignored invalid session transition");
            return false;
        }
        self.phase = next;
        if !next.is_busy() {
            self.finished_at = Some(Utc::now());
            self.cancel = None;
        }
        true
    }

    fn owned_by(&self, ticket: &RunTicket) -> bool {
        self.run == ticket.id && self.phase.is_busy()
    }

    fn advance(&mut self, ticket: &RunTicket, next: Phase) -> Result<(), GenerationError> {
        if !self.owned_by(ticket) {
            tracing::warn!(run = ticket.id, current = self.run, to = ?next, "stale run refused");
            return Err(GenerationError::Superseded);
        }
        if !self.move_to(next) {
            return Err(GenerationError::Superseded);
        }
        Ok(())
    }

    fn start(&mut self, prompt: String) -> RunTicket {
        self.move_to(Phase::GeneratingScript);
        self.run += 1;
        let cancel = CancellationToken::new();
        self.cancel = Some(cancel.clone());
        self.error = None;
        self.generated_prompt = Some(prompt);
        self.job_id = None;
        self.video_url = None;
        self.poll_attempts = 0;
        self.started_at = Some(Utc::now());
        self.finished_at = None;
        RunTicket {
            id: self.run,
            cancel,
        }
    }
}

/// Shared generation state for one user. Cheap to wrap in an `Arc`.
#[derive(Debug, Default)]
pub struct Session {
    inner: Mutex<SessionInner>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.lock();
        SessionSnapshot {
            phase: inner.phase,
            is_generating_script: inner.phase == Phase::GeneratingScript,
            is_generating_video: inner.phase == Phase::GeneratingVideo,
            is_fetching_video: inner.phase == Phase::FetchingVideo,
            is_busy: inner.phase.is_busy(),
            error: inner.error.clone(),
            generated_prompt: inner.generated_prompt.clone(),
            generated_script: inner.generated_script.clone(),
            job_id: inner.job_id.clone(),
            video_url: inner.video_url.clone(),
            poll_attempts: inner.poll_attempts,
            started_at: inner.started_at,
            finished_at: inner.finished_at,
        }
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    pub fn is_busy(&self) -> bool {
        self.lock().phase.is_busy()
    }

    /// Starts a run. Fails with [`GenerationError::Busy`] while another run is active.
    pub fn begin(&self, prompt: impl Into<String>) -> Result<RunTicket, GenerationError> {
        let mut inner = self.lock();
        if inner.phase.is_busy() {
            return Err(GenerationError::Busy);
        }
        Ok(inner.start(prompt.into()))
    }

    /// Busy check, validation and start under one lock.
    ///
    /// A busy session is left untouched. An invalid request on an idle session
    /// records the validation message and keeps the previous video.
    pub fn begin_validated(&self, request: &GenerationRequest) -> Result<RunTicket, GenerationError> {
        let mut inner = self.lock();
        if inner.phase.is_busy() {
            return Err(GenerationError::Busy);
        }
        if let Err(e) = request.validate() {
            inner.move_to(Phase::Failed);
            inner.error = Some(e.user_message().to_string());
            return Err(e);
        }
        Ok(inner.start(request.instruction()))
    }

    pub fn script_ready(&self, ticket: &RunTicket, script: &Script) -> Result<(), GenerationError> {
        let mut inner = self.lock();
        inner.advance(ticket, Phase::GeneratingVideo)?;
        inner.generated_script = script.text().to_string();
        Ok(())
    }

    pub fn job_submitted(&self, ticket: &RunTicket, job_id: &str) -> Result<(), GenerationError> {
        let mut inner = self.lock();
        inner.advance(ticket, Phase::FetchingVideo)?;
        inner.job_id = Some(job_id.to_string());
        Ok(())
    }

    pub fn poll_attempted(&self, ticket: &RunTicket, attempts: u32) -> Result<(), GenerationError> {
        let mut inner = self.lock();
        if !inner.owned_by(ticket) || inner.phase != Phase::FetchingVideo {
            return Err(GenerationError::Superseded);
        }
        inner.poll_attempts = attempts;
        Ok(())
    }

    pub fn finish(&self, ticket: &RunTicket, video_url: &str) -> Result<(), GenerationError> {
        let mut inner = self.lock();
        inner.advance(ticket, Phase::Done)?;
        inner.video_url = Some(video_url.to_string());
        Ok(())
    }

    /// Ends the ticket's run with `error`. Returns false if that run is no longer active.
    pub fn fail(&self, ticket: &RunTicket, error: &GenerationError) -> bool {
        let mut inner = self.lock();
        if !inner.owned_by(ticket) || !inner.move_to(Phase::Failed) {
            return false;
        }
        inner.error = Some(error.user_message().to_string());
        true
    }

    /// Cancels the in-flight run, if there is one. Its stages stop at their next await point.
    pub fn cancel(&self) -> bool {
        match self.lock().cancel.as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(token) = self.lock().cancel.take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_snapshot() {
        let snap = Session::new().snapshot();
        assert_eq!(snap.phase, Phase::Idle);
        assert!(!snap.is_busy);
        assert_eq!(snap.generated_script, SCRIPT_PLACEHOLDER);
        assert_eq!(snap.error, None);
    }

    #[test]
    fn test_happy_path_transitions() {
        let session = Session::new();
        let run = session.begin("prompt").unwrap();
        assert!(session.snapshot().is_generating_script);

        session.script_ready(&run, &Script::new("story")).unwrap();
        let snap = session.snapshot();
        assert!(snap.is_generating_video);
        assert!(!snap.is_generating_script);
        assert_eq!(snap.generated_script, "story");

        session.job_submitted(&run, "tlk_1").unwrap();
        assert!(session.snapshot().is_fetching_video);
        session.poll_attempted(&run, 4).unwrap();

        session.finish(&run, "https://x/video.mp4").unwrap();
        let snap = session.snapshot();
        assert_eq!(snap.phase, Phase::Done);
        assert!(!snap.is_busy);
        assert_eq!(snap.poll_attempts, 4);
        assert_eq!(snap.video_url.as_deref(), Some("https://x/video.mp4"));
        assert!(snap.finished_at.is_some());
    }

    #[test]
    fn test_begin_refused_while_busy() {
        let session = Session::new();
        session.begin("first").unwrap();
        assert!(matches!(session.begin("second"), Err(GenerationError::Busy)));
        assert_eq!(
            session.snapshot().generated_prompt.as_deref(),
            Some("first")
        );
    }

    #[test]
    fn test_out_of_order_transition_refused() {
        let session = Session::new();
        let run = session.begin("p").unwrap();
        assert!(matches!(
            session.job_submitted(&run, "tlk_1"),
            Err(GenerationError::Superseded)
        ));
        assert!(session.finish(&run, "u").is_err());
        assert_eq!(session.phase(), Phase::GeneratingScript);
    }

    #[test]
    fn test_failure_clears_busy_and_replaces_error() {
        let session = Session::new();
        let run = session.begin("p").unwrap();
        assert!(session.fail(&run, &GenerationError::NoJobId));
        let snap = session.snapshot();
        assert_eq!(snap.phase, Phase::Failed);
        assert!(!snap.is_busy);
        assert_eq!(snap.error.as_deref(), Some("Failed to retrieve video ID."));

        let run = session.begin("p").unwrap();
        assert_eq!(session.snapshot().error, None);
        session.fail(&run, &GenerationError::PollExhausted { attempts: 10 });
        assert_eq!(
            session.snapshot().error.as_deref(),
            Some("Failed to fetch video. Please try again later.")
        );
    }

    #[test]
    fn test_stale_ticket_cannot_touch_newer_run() {
        let session = Session::new();
        let old = session.begin("old").unwrap();
        session.fail(&old, &GenerationError::Cancelled);
        let current = session.begin("new").unwrap();
        assert_ne!(old.id(), current.id());

        assert!(!session.fail(&old, &GenerationError::NoJobId));
        assert!(matches!(
            session.script_ready(&old, &Script::new("stale")),
            Err(GenerationError::Superseded)
        ));
        assert!(session.poll_attempted(&old, 3).is_err());

        let snap = session.snapshot();
        assert!(snap.is_generating_script);
        assert_eq!(snap.error, None);
        assert_eq!(snap.generated_script, SCRIPT_PLACEHOLDER);
    }

    #[test]
    fn test_fail_after_finish_keeps_done() {
        let session = Session::new();
        let run = session.begin("p").unwrap();
        session.script_ready(&run, &Script::new("s")).unwrap();
        session.job_submitted(&run, "tlk_1").unwrap();
        session.finish(&run, "https://x/v.mp4").unwrap();

        assert!(!session.fail(&run, &GenerationError::Cancelled));
        let snap = session.snapshot();
        assert_eq!(snap.phase, Phase::Done);
        assert_eq!(snap.error, None);
    }

    #[test]
    fn test_begin_validated_checks_busy_before_topic() {
        let session = Session::new();
        let run = session.begin("running").unwrap();

        let blank = GenerationRequest::new("  ");
        assert!(matches!(
            session.begin_validated(&blank),
            Err(GenerationError::Busy)
        ));
        let snap = session.snapshot();
        assert!(snap.is_generating_script);
        assert_eq!(snap.error, None);

        session.script_ready(&run, &Script::new("s")).unwrap();
        session.job_submitted(&run, "tlk_1").unwrap();
        session.finish(&run, "https://x/v.mp4").unwrap();

        assert!(matches!(
            session.begin_validated(&blank),
            Err(GenerationError::Validation)
        ));
        let snap = session.snapshot();
        assert_eq!(snap.phase, Phase::Failed);
        assert_eq!(snap.error.as_deref(), Some("Please enter a prompt."));
        assert_eq!(snap.video_url.as_deref(), Some("https://x/v.mp4"));
    }

    #[test]
    fn test_cancel_triggers_token() {
        let session = Session::new();
        assert!(!session.cancel());
        let run = session.begin("p").unwrap();
        assert!(session.cancel());
        assert!(run.cancel_token().is_cancelled());
    }

    #[test]
    fn test_drop_cancels_in_flight_run() {
        let session = Session::new();
        let run = session.begin("p").unwrap();
        drop(session);
        assert!(run.cancel_token().is_cancelled());
    }
}
