use thiserror::Error;

#[derive(Debug, Error)]
pub enum SttError {
    #[error("speech-to-text backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("text-to-speech backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM call timed out")]
    Timeout,
    #[error("LLM backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no scenario was set before the session started")]
    NoScenario,
    #[error("transport error: {0}")]
    Transport(String),
}
