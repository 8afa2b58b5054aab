//! Feeds arriving 16kHz PCM into a `VoiceActivityDetector` one fixed-size
//! window at a time, buffering the remainder between calls. Windows are
//! 32ms/512 samples, twice the width of the narrowband classifiers this
//! pipeline's windowing loop was adapted from.

use persona_vad::{VoiceActivityDetector, WINDOW};

pub struct VadWindower {
    vad: Box<dyn VoiceActivityDetector>,
    tail: Vec<i16>,
}

impl VadWindower {
    pub fn new(vad: Box<dyn VoiceActivityDetector>) -> Self {
        Self {
            vad,
            tail: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.vad.reset();
        self.tail.clear();
    }

    /// Feed new samples; returns one classification per `WINDOW`-sized
    /// slice consumed, in arrival order.
    pub fn feed(&mut self, samples: &[i16]) -> Vec<bool> {
        self.tail.extend_from_slice(samples);
        let mut results = Vec::new();
        while self.tail.len() >= WINDOW {
            let window: Vec<i16> = self.tail.drain(..WINDOW).collect();
            results.push(self.vad.classify(&window));
        }
        results
    }
}
