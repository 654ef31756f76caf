use crate::api::ScriptBackend;
use crate::error::{ApiError, GenerationError};
use crate::request::GenerationRequest;
use crate::{logi, logok, logw};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Script(String);

impl Script {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn text(&self) -> &str {
        &self.0
    }

    pub fn word_count(&self) -> usize {
        self.0.split_whitespace().count()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

pub async fn generate_script(
    backend: &dyn ScriptBackend,
    request: &GenerationRequest,
) -> Result<Script, GenerationError> {
    request.validate()?;
    generate_from_instruction(backend, &request.instruction(), request.target_word_count()).await
}

pub(crate) async fn generate_from_instruction(
    backend: &dyn ScriptBackend,
    instruction: &str,
    target_words: u32,
) -> Result<Script, GenerationError> {
    logi(format!(
        "Requesting {} script (~{} words)...",
        backend.name(),
        target_words
    ));
    tracing::debug!(instruction = %instruction, "script instruction");

    let text = backend.generate_content(instruction).await.map_err(|e| {
        logw(format!("{} script request failed: {}", backend.name(), e));
        GenerationError::Generation(e)
    })?;

    if text.trim().is_empty() {
        logw(format!("{} returned no text", backend.name()));
        return Err(GenerationError::Generation(ApiError::UnexpectedResponse(
            "empty script".into(),
        )));
    }

    let script = Script::new(text);
    logok(format!("Script received: {} words", script.word_count()));
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_word_count() {
        let script = Script::new("One two  three\nfour");
        assert_eq!(script.word_count(), 4);
        assert_eq!(script.text(), "One two  three\nfour");
    }

    #[test]
    fn test_script_serializes_as_string() {
        let json = serde_json::to_string(&Script::new("hi")).unwrap();
        assert_eq!(json, "\"hi\"");
    }
}
