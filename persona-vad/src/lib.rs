//! Voice activity detection contract.
//!
//! The turn-taking pipeline needs a per-window speech/non-speech
//! classifier. `EarshotVad` is the production implementation, backed by
//! `earshot`'s pure-Rust WebRTC-derived detector. `EnergyVad` is a
//! deterministic RMS-threshold reference used by tests that need a
//! predictable speech/silence boundary instead of a model's.

/// 32ms at 16kHz, the window size the core classifies at a time.
pub const WINDOW: usize = 512;

/// 16ms at 16kHz, earshot's native analysis frame. `WINDOW` is an exact
/// multiple of this, so a classify call splits cleanly into two frames.
const EARSHOT_FRAME: usize = 256;

pub trait VoiceActivityDetector: Send {
    /// Classify exactly `WINDOW` samples of 16kHz PCM. Implementations may
    /// assume `window.len() == WINDOW`.
    fn classify(&mut self, window: &[i16]) -> bool;

    /// Reset internal state between utterances.
    fn reset(&mut self);
}

/// Deterministic RMS-threshold classifier. Not speech-quality, but
/// behaves identically given the same input, which is what the turn
/// detector and session orchestration tests need.
pub struct EnergyVad {
    threshold: f32,
    /// Smoothed energy estimate, carried across windows so a single
    /// quiet window inside a longer utterance doesn't flip the result.
    smoothed: f32,
    smoothing: f32,
}

impl EnergyVad {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            smoothed: 0.0,
            smoothing: 0.6,
        }
    }
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new(400.0)
    }
}

impl VoiceActivityDetector for EnergyVad {
    fn classify(&mut self, window: &[i16]) -> bool {
        let sum_sq: f64 = window.iter().map(|&s| (s as f64) * (s as f64)).sum();
        let rms = (sum_sq / window.len().max(1) as f64).sqrt() as f32;
        self.smoothed = self.smoothing * rms + (1.0 - self.smoothing) * self.smoothed;
        self.smoothed > self.threshold
    }

    fn reset(&mut self) {
        self.smoothed = 0.0;
    }
}

/// Production classifier backed by `earshot::Detector`. Splits each
/// `WINDOW`-sized call into earshot's native 16ms frames and flags the
/// window as speech if any frame's probability clears `threshold`.
pub struct EarshotVad {
    detector: earshot::Detector,
    threshold: f32,
}

impl EarshotVad {
    pub fn new(threshold: f32) -> Self {
        Self {
            detector: earshot::Detector::default(),
            threshold,
        }
    }
}

impl Default for EarshotVad {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl VoiceActivityDetector for EarshotVad {
    fn classify(&mut self, window: &[i16]) -> bool {
        window
            .chunks(EARSHOT_FRAME)
            .map(|chunk| self.detector.predict_i16(chunk))
            .any(|p| p >= self.threshold)
    }

    fn reset(&mut self) {
        self.detector = earshot::Detector::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_is_not_speech() {
        let mut vad = EnergyVad::default();
        let window = vec![0i16; WINDOW];
        assert!(!vad.classify(&window));
    }

    #[test]
    fn loud_tone_is_speech() {
        let mut vad = EnergyVad::default();
        let window: Vec<i16> = (0..WINDOW).map(|_| 10_000i16).collect();
        assert!(vad.classify(&window));
    }

    #[test]
    fn reset_clears_smoothing() {
        let mut vad = EnergyVad::default();
        let loud: Vec<i16> = (0..WINDOW).map(|_| 10_000i16).collect();
        vad.classify(&loud);
        vad.reset();
        let quiet = vec![0i16; WINDOW];
        assert!(!vad.classify(&quiet));
    }

    #[test]
    fn earshot_silence_is_not_speech() {
        let mut vad = EarshotVad::default();
        let window = vec![0i16; WINDOW];
        assert!(!vad.classify(&window));
    }
}
