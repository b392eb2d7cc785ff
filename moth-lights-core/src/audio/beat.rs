//! Energy based beat detection.
//!
//! A chunk is a beat when it is much louder than the last second or so of chunks. The gap between beats gives a BPM
//! estimate for the display.
use std::time::{Duration, Instant};

use circular_buffer::CircularBuffer;

use crate::logging::trace;

/// about one second of chunks at 44.1kHz with 1024 sample chunks
pub const ENERGY_HISTORY: usize = 43;

/// how many beat intervals are averaged for the displayed bpm
pub const BPM_INTERVALS: usize = 5;

pub struct BeatDetector {
    energies: CircularBuffer<ENERGY_HISTORY, f32>,
    intervals: CircularBuffer<BPM_INTERVALS, Duration>,
    /// current energy must be this many times the rolling average
    threshold: f32,
    min_interval: Duration,
    last_beat: Option<Instant>,
}

impl BeatDetector {
    pub fn new(threshold: f32, max_bpm: f32) -> Self {
        let min_interval = if max_bpm > 0.0 {
            Duration::from_secs_f32(60.0 / max_bpm)
        } else {
            Duration::ZERO
        };

        Self {
            energies: CircularBuffer::new(),
            intervals: CircularBuffer::new(),
            threshold,
            min_interval,
            last_beat: None,
        }
    }

    fn rolling_average(&self) -> Option<f32> {
        if self.energies.is_empty() {
            return None;
        }

        Some(self.energies.iter().sum::<f32>() / self.energies.len() as f32)
    }

    /// returns true if this chunk's energy is a beat
    pub fn update(&mut self, energy: f32, now: Instant) -> bool {
        let over_average = self
            .rolling_average()
            .is_some_and(|avg| avg > 0.0 && energy > self.threshold * avg);

        self.energies.push_back(energy);

        if !over_average {
            return false;
        }

        if let Some(last_beat) = self.last_beat {
            let interval = now.saturating_duration_since(last_beat);

            if interval < self.min_interval {
                trace!("beat ignored. only {interval:?} since the last one");
                return false;
            }

            self.intervals.push_back(interval);
        }

        self.last_beat = Some(now);

        true
    }

    pub fn bpm(&self) -> Option<f32> {
        if self.intervals.is_empty() {
            return None;
        }

        let total: Duration = self.intervals.iter().sum();
        let mean = total.as_secs_f32() / self.intervals.len() as f32;

        if mean <= 0.0 {
            return None;
        }

        Some(60.0 / mean)
    }
}
