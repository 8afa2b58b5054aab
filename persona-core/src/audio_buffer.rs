//! Bounded accumulator of inbound 16kHz PCM, with the coarse trim policy
//! spec'd for this pipeline: on overflow, keep only the most recently
//! added block rather than trimming sample-by-sample. A correctly
//! behaving turn detector flushes the buffer at end-of-utterance, so
//! overflow should be rare; it is not a precision-critical path.

pub struct AudioBuffer {
    max_samples: usize,
    blocks: Vec<Vec<i16>>,
    total_samples: usize,
}

impl AudioBuffer {
    pub fn new(max_duration_seconds: u32, sample_rate: u32) -> Self {
        Self {
            max_samples: (max_duration_seconds * sample_rate) as usize,
            blocks: Vec::new(),
            total_samples: 0,
        }
    }

    /// Append a block of PCM samples. If the buffer now exceeds its max
    /// duration, collapse it down to only the block just added.
    pub fn add(&mut self, block: Vec<i16>) {
        if block.is_empty() {
            return;
        }
        self.total_samples += block.len();
        self.blocks.push(block);

        if self.total_samples > self.max_samples {
            let last = self.blocks.pop().expect("just pushed");
            self.total_samples = last.len();
            self.blocks.clear();
            self.blocks.push(last);
        }
    }

    /// Atomically return the concatenation of all blocks and empty the
    /// buffer.
    pub fn flush(&mut self) -> Vec<i16> {
        if self.blocks.is_empty() {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(self.total_samples);
        for block in self.blocks.drain(..) {
            out.extend(block);
        }
        self.total_samples = 0;
        out
    }

    pub fn total_samples(&self) -> usize {
        self.total_samples
    }

    pub fn is_empty(&self) -> bool {
        self.total_samples == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_flush_concatenates_in_order() {
        let mut buf = AudioBuffer::new(30, 16000);
        buf.add(vec![1, 2, 3]);
        buf.add(vec![4, 5]);
        assert_eq!(buf.total_samples(), 5);
        assert_eq!(buf.flush(), vec![1, 2, 3, 4, 5]);
        assert!(buf.is_empty());
    }

    #[test]
    fn flush_empties_the_buffer() {
        let mut buf = AudioBuffer::new(30, 16000);
        buf.add(vec![1, 2, 3]);
        buf.flush();
        assert!(buf.is_empty());
        assert_eq!(buf.flush(), Vec::<i16>::new());
    }

    #[test]
    fn overflow_keeps_only_the_most_recent_block() {
        let mut buf = AudioBuffer::new(1, 10); // max_samples = 10
        buf.add(vec![0; 8]);
        buf.add(vec![1; 5]); // total would be 13 > 10
        assert_eq!(buf.total_samples(), 5);
        assert_eq!(buf.flush(), vec![1; 5]);
    }

    #[test]
    fn total_samples_invariant_holds_across_adds() {
        let mut buf = AudioBuffer::new(30, 16000);
        let mut expected = 0usize;
        for n in [10, 0, 20, 5] {
            buf.add(vec![0; n]);
            expected += n;
            assert_eq!(buf.total_samples(), expected);
        }
    }
}
