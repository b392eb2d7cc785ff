//! PCM chunk -> normalized, truncated magnitude spectrum.
//!
//! scale -> remove dc -> high-pass -> sensitivity -> hann window -> rfft -> |X| -> adaptive ceiling -> truncate
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use flume::{Receiver, Sender, TrySendError};

use super::beat::BeatDetector;
use super::high_pass::HighPassFilter;
use super::peak_scaled::PeakScaled;
use super::samples::Samples;
use crate::config::AudioConfig;
use crate::errors::MyResult;
use crate::logging::{debug, trace, warn};
use crate::windows::{HanningWindow, Window};

/// The microfft sizes we compile in. Each one is a separate function, so they get listed out with a macro.
pub trait RealFft {
    /// write `|X[k]|` for the first `N/2` bins into `out`. the input is used as scratch space
    fn magnitudes_into(&mut self, out: &mut [f32]);
}

macro_rules! impl_real_fft {
    ($in_size:expr, $rfft:path) => {
        impl RealFft for [f32; $in_size] {
            fn magnitudes_into(&mut self, out: &mut [f32]) {
                let spectrum = $rfft(self);

                // the real-valued coefficient at the nyquist frequency is packed into the imaginary part of the dc bin
                spectrum[0].im = 0.0;

                for (out, x) in out.iter_mut().zip(spectrum.iter()) {
                    *out = x.norm_sqr().sqrt();
                }
            }
        }
    };
}

impl_real_fft!(512, microfft::real::rfft_512);
impl_real_fft!(1024, microfft::real::rfft_1024);
impl_real_fft!(2048, microfft::real::rfft_2048);
impl_real_fft!(4096, microfft::real::rfft_4096);

/// Number of bins and the frequency they span. Fixed for a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrumShape {
    pub bins: usize,
    pub max_freq_hz: f32,
}

impl SpectrumShape {
    /// bins from 0Hz up to and including `max_freq_hz`, never more than the fft gives us
    pub fn new(chunk_size: usize, sample_rate_hz: f32, max_freq_hz: f32) -> Self {
        let bin_width = sample_rate_hz / chunk_size as f32;
        let available = chunk_size / 2;

        let bins = ((max_freq_hz / bin_width).floor() as usize + 1).min(available);

        Self {
            bins,
            max_freq_hz: bins as f32 * bin_width,
        }
    }

    pub fn bin_width(&self) -> f32 {
        if self.bins == 0 {
            return 0.0;
        }

        self.max_freq_hz / self.bins as f32
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFrame {
    /// magnitude per bin, normalized by the adaptive ceiling
    pub bins: Vec<f32>,
    /// bin `i` is at `i * max_freq_hz / bins.len()`
    pub max_freq_hz: f32,
    pub beat: bool,
    pub bpm: Option<f32>,
}

impl SpectrumFrame {
    pub fn zeros(shape: SpectrumShape) -> Self {
        Self {
            bins: vec![0.0; shape.bins],
            max_freq_hz: shape.max_freq_hz,
            beat: false,
            bpm: None,
        }
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// elementwise mean of everything that arrived since the last tick. no frames means silence
    pub fn average(frames: &[SpectrumFrame], shape: SpectrumShape) -> Self {
        let mut avg = Self::zeros(shape);
        let mut count = 0;

        for frame in frames {
            if frame.bins.len() != shape.bins {
                warn!(
                    "skipping spectrum with {} bins. expected {}",
                    frame.bins.len(),
                    shape.bins
                );
                continue;
            }

            for (avg, x) in avg.bins.iter_mut().zip(frame.bins.iter()) {
                *avg += x;
            }

            avg.beat |= frame.beat;
            avg.bpm = frame.bpm.or(avg.bpm);
            count += 1;
        }

        if count > 1 {
            for x in avg.bins.iter_mut() {
                *x /= count as f32;
            }
        }

        avg
    }

    /// sum of squared bins. used by the pulse mode
    pub fn energy(&self) -> f32 {
        self.bins.iter().map(|x| x * x).sum()
    }
}

/// Runtime-adjustable input gain, shared between the audio thread and the parameter interface.
#[derive(Debug, Clone)]
pub struct Sensitivity(Arc<AtomicU32>);

impl Sensitivity {
    pub fn new(gain: f32) -> Self {
        Self(Arc::new(AtomicU32::new(gain.to_bits())))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, gain: f32) {
        self.0.store(gain.to_bits(), Ordering::Relaxed)
    }
}

pub struct SpectrumBuilder<const S: usize> {
    shape: SpectrumShape,
    high_pass: HighPassFilter,
    sensitivity: Sensitivity,
    window_multipliers: [f32; S],
    ceiling: PeakScaled,
    beat_detector: Option<BeatDetector>,
    magnitudes: Vec<f32>,
}

impl<const S: usize> SpectrumBuilder<S>
where
    [f32; S]: RealFft,
{
    pub fn new(config: &AudioConfig, sensitivity: Sensitivity) -> MyResult<Self> {
        let shape = SpectrumShape::new(S, config.sample_rate_hz, config.max_freq_hz);

        debug!(
            "spectrum: {} bins of {:.1}Hz up to {:.0}Hz",
            shape.bins,
            shape.bin_width(),
            shape.max_freq_hz
        );

        let beat_detector = config
            .beat_detection
            .then(|| BeatDetector::new(config.beat_threshold, config.max_bpm));

        Ok(Self {
            shape,
            high_pass: HighPassFilter::new(config.sample_rate_hz, config.high_pass_hz)?,
            sensitivity,
            window_multipliers: HanningWindow::<S>::windows(),
            ceiling: PeakScaled::new(config.decay_factor),
            beat_detector,
            magnitudes: vec![0.0; S / 2],
        })
    }

    pub fn shape(&self) -> SpectrumShape {
        self.shape
    }

    pub fn ceiling(&self) -> f32 {
        self.ceiling.ceiling()
    }

    pub fn process(&mut self, samples: &Samples<S>, now: Instant) -> SpectrumFrame {
        let mut scaled = samples.scaled();

        scaled.remove_dc_offset();

        self.high_pass.process(&mut scaled.0);

        let gain = self.sensitivity.get();
        for x in scaled.0.iter_mut() {
            *x *= gain;
        }

        let beat = match self.beat_detector.as_mut() {
            Some(detector) => detector.update(scaled.mean_square(), now),
            None => false,
        };
        let bpm = self.beat_detector.as_ref().and_then(BeatDetector::bpm);

        let mut fft_buf = scaled.0;
        for (x, w) in fft_buf.iter_mut().zip(self.window_multipliers.iter()) {
            *x *= w;
        }

        fft_buf.magnitudes_into(&mut self.magnitudes);

        self.ceiling.scale(&mut self.magnitudes);

        trace!("ceiling: {}", self.ceiling.ceiling());

        SpectrumFrame {
            bins: self.magnitudes[..self.shape.bins].to_vec(),
            max_freq_hz: self.shape.max_freq_hz,
            beat,
            bpm,
        }
    }
}

/// The audio side of the spectrum queue. Pushing never blocks the audio thread.
#[derive(Clone)]
pub struct SpectrumSender(Sender<SpectrumFrame>);

pub fn spectrum_queue(capacity: usize) -> (SpectrumSender, Receiver<SpectrumFrame>) {
    let (tx, rx) = flume::bounded(capacity);

    (SpectrumSender(tx), rx)
}

impl SpectrumSender {
    /// returns false if the frame was dropped
    pub fn push(&self, frame: SpectrumFrame) -> bool {
        match self.0.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                trace!("spectrum queue full. dropping a frame");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("spectrum queue has no receiver");
                false
            }
        }
    }
}
