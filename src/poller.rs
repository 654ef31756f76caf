//! Fixed-interval, fixed-count polling of a rendering job.
//!
//! Each attempt issues exactly one status query. A response without a result URL
//! means "not ready yet" and schedules the next attempt after `interval`; any
//! query error ends polling at once. Queries never overlap, and the total wait is
//! bounded by `max_attempts * interval`.

use crate::api::VideoBackend;
use crate::error::GenerationError;
use crate::video::VideoJob;
use crate::{logi, logok, logw};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(5000);

/// How long and how often to ask for the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl PollPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Upper bound on the time spent waiting between queries.
    pub fn max_wait(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }
}

/// Where a polling run currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    Pending { attempts: u32 },
    Ready { url: String, attempts: u32 },
    Exhausted { attempts: u32 },
    Failed { attempt: u32 },
    Cancelled { attempts: u32 },
}

/// Polls `job` until the backend reports a result URL, then stores and returns it.
pub async fn poll_until_ready(
    backend: &dyn VideoBackend,
    job: &mut VideoJob,
    policy: &PollPolicy,
    cancel: &CancellationToken,
) -> Result<String, GenerationError> {
    poll_with_progress(backend, job, policy, cancel, |_| {}).await
}

/// Same as [`poll_until_ready`], reporting every state change to `on_state`.
pub async fn poll_with_progress(
    backend: &dyn VideoBackend,
    job: &mut VideoJob,
    policy: &PollPolicy,
    cancel: &CancellationToken,
    mut on_state: impl FnMut(&PollState),
) -> Result<String, GenerationError> {
    let job_id = job.job_id().to_string();
    let mut attempts = 0u32;

    logi(format!(
        "Waiting for video {} (up to {} checks, every {} ms, at most {} s)...",
        job_id,
        policy.max_attempts,
        policy.interval.as_millis(),
        policy.max_wait().as_secs()
    ));

    loop {
        if attempts >= policy.max_attempts {
            logw(format!(
                "Video {} still not ready after {} checks; giving up.",
                job_id, attempts
            ));
            on_state(&PollState::Exhausted { attempts });
            return Err(GenerationError::PollExhausted { attempts });
        }

        attempts += 1;
        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                on_state(&PollState::Cancelled { attempts: attempts - 1 });
                return Err(GenerationError::Cancelled);
            }
            result = backend.get_talk(&job_id) => result,
        };

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                logw(format!("Error fetching video {} (check {}): {}", job_id, attempts, e));
                on_state(&PollState::Failed { attempt: attempts });
                return Err(GenerationError::PollFailed {
                    attempt: attempts,
                    source: e,
                });
            }
        };

        if let Some(url) = status.result_url() {
            let url = url.to_string();
            job.set_result_url(url.clone());
            logok(format!("Result URL: {}", url));
            on_state(&PollState::Ready {
                url: url.clone(),
                attempts,
            });
            return Ok(url);
        }

        tracing::debug!(
            job_id = %job_id,
            attempt = attempts,
            max_attempts = policy.max_attempts,
            status = status.status.as_deref().unwrap_or("unknown"),
            "result URL not ready yet"
        );
        on_state(&PollState::Pending { attempts });

        if attempts >= policy.max_attempts {
            continue;
        }

        logi(format!(
            "Result URL not ready yet ({}/{}), retrying...",
            attempts, policy.max_attempts
        ));
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                on_state(&PollState::Cancelled { attempts });
                return Err(GenerationError::Cancelled);
            }
            _ = tokio::time::sleep(policy.interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = PollPolicy::default();
        assert_eq!(policy.max_attempts, 10);
        assert_eq!(policy.interval, Duration::from_millis(5000));
        assert_eq!(policy.max_wait(), Duration::from_secs(50));
    }

    #[test]
    fn test_max_wait_saturates() {
        let policy = PollPolicy::new(u32::MAX, Duration::MAX);
        assert_eq!(policy.max_wait(), Duration::MAX);
        let policy = PollPolicy::new(u32::MAX, Duration::from_secs(u64::MAX / 2));
        assert_eq!(policy.max_wait(), Duration::MAX);
    }

    #[test]
    fn test_policy_deserializes() {
        let policy: PollPolicy =
            serde_json::from_str(r#"{"max_attempts":3,"interval":{"secs":2,"nanos":0}}"#).unwrap();
        assert_eq!(policy, PollPolicy::new(3, Duration::from_secs(2)));
    }
}
