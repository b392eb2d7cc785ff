use crate::logging::trace;

use super::samples::Samples;

/// buffer audio samples. the driver hands us whatever block size it likes; the spectrum builder wants exactly `S`
pub struct AudioBuffer<const S: usize> {
    count: usize,
    buffer: [i16; S],
}

impl<const S: usize> Default for AudioBuffer<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const S: usize> AudioBuffer<S> {
    pub const fn new() -> Self {
        assert!(S > 0);

        Self {
            count: 0,
            buffer: [0; S],
        }
    }

    /// returns a full chunk every time `S` samples have been buffered
    pub fn buffer_sample(&mut self, sample: i16) -> Option<Samples<S>> {
        self.buffer[self.count] = sample;
        self.count += 1;

        if self.count < S {
            return None;
        }

        self.count = 0;

        Some(Samples(self.buffer))
    }

    /// call `f` with every completed chunk. leftover samples wait for the next call
    pub fn buffer_samples(&mut self, samples: &[i16], mut f: impl FnMut(Samples<S>)) {
        trace!("buffering {} samples", samples.len());

        for &sample in samples {
            if let Some(chunk) = self.buffer_sample(sample) {
                f(chunk);
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::AudioBuffer;

    #[test]
    fn test_rechunks_uneven_blocks() {
        let mut buffer = AudioBuffer::<4>::new();
        let mut chunks = vec![];

        buffer.buffer_samples(&[1, 2, 3], |x| chunks.push(x.0));
        assert!(chunks.is_empty());
        assert_eq!(buffer.pending(), 3);

        buffer.buffer_samples(&[4, 5, 6, 7, 8, 9], |x| chunks.push(x.0));
        assert_eq!(chunks, vec![[1, 2, 3, 4], [5, 6, 7, 8]]);
        assert_eq!(buffer.pending(), 1);
    }
}
