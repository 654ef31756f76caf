use crate::api::gemini::DEFAULT_MODEL;
use crate::poller::PollPolicy;
use crate::video::AvatarProfile;
use anyhow::Result;
use serde::{Deserialize, Serialize};

pub const GEMINI_API_KEY_VAR: &str = "GEMINI_API_KEY";
pub const DID_AUTH_TOKEN_VAR: &str = "DID_AUTH_TOKEN";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub gemini_api_key: String,
    pub did_auth_token: String,
    #[serde(default = "default_model")]
    pub gemini_model: String,
    #[serde(default)]
    pub avatar: AvatarProfile,
    #[serde(default)]
    pub poll: PollPolicy,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Config {
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!("ignoring unreadable .env: {e}"),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; only the two secrets are read.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let gemini_api_key = lookup(GEMINI_API_KEY_VAR).unwrap_or_default();
        let did_auth_token = lookup(DID_AUTH_TOKEN_VAR).unwrap_or_default();

        if gemini_api_key.trim().is_empty() {
            anyhow::bail!("environment: {} missing", GEMINI_API_KEY_VAR);
        }
        if did_auth_token.trim().is_empty() {
            anyhow::bail!("environment: {} missing", DID_AUTH_TOKEN_VAR);
        }

        Ok(Self {
            gemini_api_key,
            did_auth_token,
            gemini_model: default_model(),
            avatar: AvatarProfile::default(),
            poll: PollPolicy::default(),
        })
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }
}
