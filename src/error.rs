//! Error types for the story and video pipeline.

/// Failures talking to one of the remote backends.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Network or HTTP transport error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Status { status: u16, message: String },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The prompt was refused before any text was produced.
    #[error("prompt blocked: {0}")]
    Blocked(String),

    /// The response parsed but carried nothing usable.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Terminal failures of a generation run, one per pipeline stage.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The topic was empty or whitespace only.
    #[error("topic is empty")]
    Validation,

    /// The text backend failed or returned no usable text.
    #[error("script generation failed: {0}")]
    Generation(#[source] ApiError),

    /// The video job could not be created.
    #[error("video submission failed: {0}")]
    Submission(#[source] ApiError),

    /// The video backend accepted the request but returned no job id.
    #[error("video submission returned no job id")]
    NoJobId,

    /// Every status query came back without a result URL.
    #[error("video not ready after {attempts} status queries")]
    PollExhausted { attempts: u32 },

    /// A status query itself failed.
    #[error("video status query failed on attempt {attempt}: {source}")]
    PollFailed {
        attempt: u32,
        #[source]
        source: ApiError,
    },

    /// The run was cancelled before it finished.
    #[error("generation cancelled")]
    Cancelled,

    /// Another run is still in flight on this session.
    #[error("a generation is already in progress")]
    Busy,

    /// The session no longer belongs to this run; later stages must not start.
    #[error("generation run was superseded")]
    Superseded,
}

impl GenerationError {
    /// The single message shown to the user for this failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Validation => "Please enter a prompt.",
            Self::Generation(_) => "Failed to generate script. Please try again.",
            Self::Submission(_) => "Failed to generate video. Please try again.",
            Self::NoJobId => "Failed to retrieve video ID.",
            Self::PollExhausted { .. } => "Failed to fetch video. Please try again later.",
            Self::PollFailed { .. } => "Failed to fetch video. Please try again.",
            Self::Cancelled => "Generation cancelled.",
            Self::Busy => "A generation is already in progress.",
            Self::Superseded => "Generation cancelled.",
        }
    }

    /// True for the two poller outcomes, which the user sees as the same failure.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Self::PollExhausted { .. } | Self::PollFailed { .. })
    }
}

/// Result type alias for backend calls.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Truncates a response body for logs and error messages.
pub(crate) fn body_snippet(raw: &str) -> String {
    raw.chars().take(800).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        assert_eq!(
            GenerationError::Validation.user_message(),
            "Please enter a prompt."
        );
        assert_eq!(
            GenerationError::NoJobId.user_message(),
            "Failed to retrieve video ID."
        );
        assert_eq!(
            GenerationError::Generation(ApiError::UnexpectedResponse("empty".into()))
                .user_message(),
            "Failed to generate script. Please try again."
        );
        assert_eq!(
            GenerationError::Superseded.user_message(),
            GenerationError::Cancelled.user_message()
        );
    }

    #[test]
    fn test_fetch_failures_share_class() {
        let exhausted = GenerationError::PollExhausted { attempts: 10 };
        let failed = GenerationError::PollFailed {
            attempt: 3,
            source: ApiError::Status {
                status: 500,
                message: "boom".into(),
            },
        };
        assert!(exhausted.is_fetch_failure());
        assert!(failed.is_fetch_failure());
        assert!(!GenerationError::NoJobId.is_fetch_failure());
        assert!(exhausted.user_message().starts_with("Failed to fetch video."));
        assert!(failed.user_message().starts_with("Failed to fetch video."));
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::Status {
            status: 404,
            message: "Not found".into(),
        };
        assert_eq!(err.to_string(), "API error: 404 - Not found");
        assert_eq!(
            GenerationError::PollExhausted { attempts: 10 }.to_string(),
            "video not ready after 10 status queries"
        );
    }

    #[test]
    fn test_body_snippet_truncates_on_char_boundary() {
        let long = "é".repeat(1000);
        assert_eq!(body_snippet(&long).chars().count(), 800);
        assert_eq!(body_snippet("short"), "short");
    }
}
