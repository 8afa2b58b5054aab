//! Speech-to-text adapter contract.

use crate::error::SttError;
use async_trait::async_trait;

#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe a single-speaker utterance of 16kHz PCM. Empty input
    /// yields `("", 0.0)` without invoking the backend. Confidence is an
    /// implementation-defined monotone score where higher is better.
    async fn transcribe(&self, pcm_16k: &[i16]) -> Result<(String, f32), SttError>;
}

/// A scripted STT adapter for tests and for environments without a real
/// speech backend wired up: looks up a canned transcript by exact PCM
/// length, or returns an empty transcript.
pub struct ScriptedStt {
    responses: std::sync::Mutex<std::collections::VecDeque<(String, f32)>>,
}

impl ScriptedStt {
    pub fn new(responses: Vec<(String, f32)>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into()),
        }
    }
}

#[async_trait]
impl SpeechToText for ScriptedStt {
    async fn transcribe(&self, pcm_16k: &[i16]) -> Result<(String, f32), SttError> {
        if pcm_16k.is_empty() {
            return Ok(("".to_string(), 0.0));
        }
        let mut queue = self.responses.lock().expect("scripted stt lock poisoned");
        Ok(queue.pop_front().unwrap_or(("".to_string(), 0.0)))
    }
}

/// Production adapter over `whisper-rs`, transcribing one bounded
/// utterance at a time with greedy decoding and no incremental/context
/// carry-over (unlike the streaming `Session` this workspace's teacher
/// crate implements, each call here is a single complete utterance
/// bounded by the turn detector, not a growing live buffer).
#[cfg(feature = "whisper")]
pub struct WhisperSttAdapter {
    ctx: std::sync::Arc<whisper_rs::WhisperContext>,
    language: Option<String>,
    state: tokio::sync::Mutex<whisper_rs::WhisperState>,
}

#[cfg(feature = "whisper")]
impl WhisperSttAdapter {
    pub fn new(
        ctx: std::sync::Arc<whisper_rs::WhisperContext>,
        language: Option<String>,
    ) -> Result<Self, SttError> {
        let state = ctx
            .create_state()
            .map_err(|e| SttError::Backend(e.to_string()))?;
        Ok(Self {
            ctx,
            language,
            state: tokio::sync::Mutex::new(state),
        })
    }
}

#[cfg(feature = "whisper")]
#[async_trait]
impl SpeechToText for WhisperSttAdapter {
    async fn transcribe(&self, pcm_16k: &[i16]) -> Result<(String, f32), SttError> {
        use whisper_rs::{FullParams, SamplingStrategy};

        if pcm_16k.is_empty() {
            return Ok(("".to_string(), 0.0));
        }

        let audio_f32: Vec<f32> = pcm_16k.iter().map(|&s| s as f32 / 32768.0).collect();
        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(self.language.as_deref());
        params.set_single_segment(true);
        params.set_print_progress(false);
        params.set_print_special(false);
        params.set_print_realtime(false);
        params.set_no_context(true);

        let mut state = self.state.lock().await;
        state
            .full(params, &audio_f32)
            .map_err(|e| SttError::Backend(e.to_string()))?;

        let n_segments = state.full_n_segments();
        let mut text = String::new();
        let mut confidences = Vec::new();
        for i in 0..n_segments {
            let Some(segment) = state.get_segment(i) else {
                continue;
            };
            if let Ok(segment_text) = segment.to_str_lossy() {
                text.push_str(segment_text.trim());
                text.push(' ');
            }
            confidences.push(segment.no_speech_probability());
        }
        let _ = &self.ctx; // kept alive for the lifetime of `state`
        let confidence = if confidences.is_empty() {
            0.0
        } else {
            1.0 - confidences.iter().sum::<f32>() / confidences.len() as f32
        };
        Ok((text.trim().to_string(), confidence))
    }
}
