//! Remote backends: the text generator and the talking-avatar video service.

pub mod did;
pub mod gemini;

use crate::error::Result;
use async_trait::async_trait;

pub use did::{DidClient, TalkConfig, TalkCreated, TalkProvider, TalkRequest, TalkScript, TalkStatus};
pub use gemini::GeminiClient;

/// Produces story text from a single natural-language prompt.
#[async_trait]
pub trait ScriptBackend: Send + Sync {
    /// Returns the generated text verbatim.
    async fn generate_content(&self, prompt: &str) -> Result<String>;

    /// Name of this backend for logs.
    fn name(&self) -> &str;
}

/// Creates talking-avatar rendering jobs and reports their status.
#[async_trait]
pub trait VideoBackend: Send + Sync {
    /// Submits a rendering job. Billable on the remote side.
    async fn create_talk(&self, request: &TalkRequest) -> Result<TalkCreated>;

    /// Reads the current state of a job. Read-only.
    async fn get_talk(&self, talk_id: &str) -> Result<TalkStatus>;

    /// Name of this backend for logs.
    fn name(&self) -> &str;
}
