//! Wire types shared between the telephony transport glue and the
//! per-call media-stream session core.

use serde::{Deserialize, Serialize};

/// 20ms of mu-law audio at 8kHz line rate.
pub const FRAME_BYTES: usize = 160;
pub const FRAME_MS: u64 = 20;
pub const LINE_SAMPLE_RATE: u32 = 8000;
pub const MODEL_SAMPLE_RATE: u32 = 16000;
/// G.711 mu-law encoding of digital silence.
pub const MULAW_SILENCE: u8 = 0xFF;

/// A fixed-size telephony audio payload. Carries no timestamp of its own;
/// temporal order is established purely by arrival/send order.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Frame(pub [u8; FRAME_BYTES]);

impl Frame {
    pub fn silence() -> Self {
        Frame([MULAW_SILENCE; FRAME_BYTES])
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != FRAME_BYTES {
            return None;
        }
        let mut arr = [0u8; FRAME_BYTES];
        arr.copy_from_slice(bytes);
        Some(Frame(arr))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Frame({} bytes)", self.0.len())
    }
}

/// Inbound envelopes from the telephony media stream.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEnvelope {
    Connected,
    Start { start: StartPayload },
    Media { media: MediaPayload },
    Stop,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartPayload {
    #[serde(rename = "streamSid")]
    pub stream_sid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaPayload {
    /// Base64-encoded 160-byte mu-law frame.
    pub payload: String,
}

/// Outbound envelopes written by the pacer and the barge-in path.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEnvelope {
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: MediaPayload,
    },
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

impl ServerEnvelope {
    pub fn media(stream_sid: String, frame: &Frame) -> Self {
        use base64::Engine;
        let payload = base64::engine::general_purpose::STANDARD.encode(frame.as_bytes());
        ServerEnvelope::Media {
            stream_sid,
            media: MediaPayload { payload },
        }
    }

    pub fn clear(stream_sid: String) -> Self {
        ServerEnvelope::Clear { stream_sid }
    }
}

/// LLM chat-history role. Deliberately inverted from what you'd expect:
/// the agent's lines are `user`-authored and the patient's are
/// `assistant`-authored, because the LLM is driven to continue speaking
/// as the patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Agent,
    Patient,
}

impl Speaker {
    pub fn role(self) -> Role {
        match self {
            Speaker::Agent => Role::User,
            Speaker::Patient => Role::Assistant,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: f64,
    pub elapsed: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub scenario_id: String,
    pub started_at: f64,
    pub duration_seconds: f64,
    pub turn_count: usize,
    pub turns: Vec<TurnRecord>,
}

fn default_unknown() -> String {
    "unknown".to_string()
}

/// Opaque-to-the-core persona/behavioral script assigned to a single call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub name: String,
    pub patient_name: String,
    pub patient_age: u32,
    #[serde(default = "default_unknown")]
    pub date_of_birth: String,
    pub personality: String,
    pub speaking_style: String,
    pub goal: String,
    pub backstory: String,
    pub instructions: String,
    #[serde(default)]
    pub expected_agent_actions: Vec<String>,
    #[serde(default)]
    pub bug_triggers: Vec<String>,
}
