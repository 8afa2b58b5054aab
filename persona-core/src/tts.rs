//! Text-to-speech adapter contract: text in, 8kHz mu-law frames out.

use crate::codec;
use crate::error::TtsError;
use crate::resampler;
use async_trait::async_trait;
use persona_protocol::{Frame, FRAME_BYTES};

#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Synthesize `text` into 160-byte mu-law frames at 8kHz. Empty
    /// synthesized audio yields an empty list and is treated as a no-op
    /// speech turn.
    async fn synthesize(&self, text: &str) -> Result<Vec<Frame>, TtsError>;
}

/// Splits already-encoded 8kHz mu-law bytes into frames, padding the
/// final frame with mu-law silence. Shared by every adapter so the
/// framing rule lives in one place.
pub fn chunk_into_frames(mulaw_bytes: &[u8]) -> Vec<Frame> {
    if mulaw_bytes.is_empty() {
        return Vec::new();
    }
    mulaw_bytes
        .chunks(FRAME_BYTES)
        .map(|chunk| {
            let mut bytes = [persona_protocol::MULAW_SILENCE; FRAME_BYTES];
            bytes[..chunk.len()].copy_from_slice(chunk);
            Frame(bytes)
        })
        .collect()
}

/// Converts a synthesis backend's raw PCM (at its own native sample
/// rate) down to the telephony line rate, mu-law encodes it, and frames
/// it. Adapters that already hand back PCM should call this instead of
/// duplicating the pipeline.
pub fn pcm_to_frames(pcm: &[i16], source_rate: u32) -> Vec<Frame> {
    if pcm.is_empty() {
        return Vec::new();
    }
    let pcm_8k = resampler::resample(pcm, source_rate, persona_protocol::LINE_SAMPLE_RATE);
    let mulaw: Vec<u8> = pcm_8k.iter().map(|&s| codec::encode(s)).collect();
    chunk_into_frames(&mulaw)
}

/// Deterministic adapter for tests: synthesizes a fixed tone scaled to
/// the text length, so callers can assert on frame counts without a real
/// speech backend.
pub struct ScriptedTts {
    samples_per_char: usize,
    source_rate: u32,
}

impl ScriptedTts {
    pub fn new() -> Self {
        Self {
            samples_per_char: 160, // 10ms of 16kHz audio per character
            source_rate: 16000,
        }
    }
}

impl Default for ScriptedTts {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextToSpeech for ScriptedTts {
    async fn synthesize(&self, text: &str) -> Result<Vec<Frame>, TtsError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let n = text.len() * self.samples_per_char;
        let pcm: Vec<i16> = (0..n).map(|i| ((i % 200) as i16) - 100).collect();
        Ok(pcm_to_frames(&pcm, self.source_rate))
    }
}

/// HTTP TTS adapter over an ElevenLabs-shaped `/v1/text-to-speech/{voice}`
/// endpoint, requesting raw PCM output directly (`output_format=pcm_16000`)
/// rather than a compressed format, so synthesis needs no audio-decode
/// dependency beyond the resampler this pipeline already carries.
pub struct ElevenLabsTtsAdapter {
    api_key: String,
    voice_id: String,
    http: reqwest::Client,
}

const ELEVENLABS_NATIVE_RATE: u32 = 16000;

impl ElevenLabsTtsAdapter {
    pub fn new(api_key: String, voice_id: String) -> Self {
        Self {
            api_key,
            voice_id,
            http: reqwest::Client::new(),
        }
    }
}

#[derive(serde::Serialize)]
struct ElevenLabsRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

#[async_trait]
impl TextToSpeech for ElevenLabsTtsAdapter {
    async fn synthesize(&self, text: &str) -> Result<Vec<Frame>, TtsError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let url = format!(
            "https://api.elevenlabs.io/v1/text-to-speech/{}?output_format=pcm_16000",
            self.voice_id
        );
        let response = self
            .http
            .post(url)
            .header("xi-api-key", &self.api_key)
            .json(&ElevenLabsRequest {
                text,
                model_id: "eleven_turbo_v2",
            })
            .send()
            .await
            .map_err(|e| TtsError::Backend(e.to_string()))?;

        let response = response
            .error_for_status()
            .map_err(|e| TtsError::Backend(e.to_string()))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TtsError::Backend(e.to_string()))?;

        if bytes.len() < 2 {
            return Ok(Vec::new());
        }
        let pcm: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();

        Ok(pcm_to_frames(&pcm, ELEVENLABS_NATIVE_RATE))
    }
}
