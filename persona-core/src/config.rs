//! Configuration surface enumerated for the core: silence/timing
//! thresholds plus the identifiers for the speech/LLM backends. Loaded
//! from the environment with the spec'd defaults, overridable by CLI
//! flags at the binary layer.

#[derive(Debug, Clone)]
pub struct Config {
    pub silence_threshold_ms: i64,
    pub trial_message_duration_s: u64,
    pub max_call_duration_s: u64,
    pub stt_model: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub tts_voice: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            silence_threshold_ms: 700,
            trial_message_duration_s: 10,
            max_call_duration_s: 180,
            stt_model: "base".to_string(),
            llm_base_url: "http://localhost:11434".to_string(),
            llm_model: "llama3".to_string(),
            tts_voice: "en-US-JennyNeural".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            silence_threshold_ms: env_or("SILENCE_THRESHOLD_MS", defaults.silence_threshold_ms),
            trial_message_duration_s: env_or(
                "TRIAL_MESSAGE_DURATION_S",
                defaults.trial_message_duration_s,
            ),
            max_call_duration_s: env_or("MAX_CALL_DURATION_S", defaults.max_call_duration_s),
            stt_model: std::env::var("STT_MODEL").unwrap_or(defaults.stt_model),
            llm_base_url: std::env::var("LLM_BASE_URL").unwrap_or(defaults.llm_base_url),
            llm_model: std::env::var("LLM_MODEL").unwrap_or(defaults.llm_model),
            tts_voice: std::env::var("TTS_VOICE").unwrap_or(defaults.tts_voice),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_enumerated_spec_values() {
        let cfg = Config::default();
        assert_eq!(cfg.silence_threshold_ms, 700);
        assert_eq!(cfg.trial_message_duration_s, 10);
        assert_eq!(cfg.max_call_duration_s, 180);
    }
}
