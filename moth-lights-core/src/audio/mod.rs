//! Audio processing
//!
//! Samples -> AudioBuffer -> SpectrumBuilder (high-pass, window, FFT, PeakScaled, BeatDetector) -> SpectrumFrame
pub mod beat;
pub mod buffer;
pub mod high_pass;
pub mod peak_scaled;
pub mod samples;
pub mod spectrum;

use serde::{Deserialize, Serialize};

pub use beat::BeatDetector;
pub use buffer::AudioBuffer;
pub use high_pass::HighPassFilter;
pub use peak_scaled::PeakScaled;
pub use samples::{Samples, ScaledSamples};
pub use spectrum::{
    RealFft, Sensitivity, SpectrumBuilder, SpectrumFrame, SpectrumSender, SpectrumShape,
    spectrum_queue,
};

/// the center frequency of a bin when `num_bins` span 0Hz to `max_freq_hz`
pub fn bin_to_frequency(bin_index: usize, max_freq_hz: f32, num_bins: usize) -> f32 {
    (bin_index as f32) * max_freq_hz / (num_bins as f32)
}

/// How the bins inside a band are reduced to one number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerStyle {
    #[default]
    Max,
    Mean,
}

/// Reduce the bins whose frequency is inside `[lower_hz, upper_hz]`. An empty band is silent.
pub fn band_magnitude(spectrum: &SpectrumFrame, lower_hz: f32, upper_hz: f32, style: TriggerStyle) -> f32 {
    let num_bins = spectrum.bins.len();

    let in_band = spectrum.bins.iter().enumerate().filter_map(|(i, x)| {
        let freq = bin_to_frequency(i, spectrum.max_freq_hz, num_bins);

        (lower_hz..=upper_hz).contains(&freq).then_some(*x)
    });

    match style {
        TriggerStyle::Max => in_band.fold(0.0, f32::max),
        TriggerStyle::Mean => {
            let (sum, count) = in_band.fold((0.0, 0usize), |(sum, count), x| (sum + x, count + 1));

            if count == 0 { 0.0 } else { sum / count as f32 }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_spectrum() -> SpectrumFrame {
        // 10 bins of 100Hz each
        SpectrumFrame {
            bins: (0..10).map(|x| x as f32 / 10.0).collect(),
            max_freq_hz: 1_000.0,
            beat: false,
            bpm: None,
        }
    }

    #[test]
    fn test_bin_to_frequency() {
        assert_eq!(bin_to_frequency(0, 1_000.0, 10), 0.0);
        assert_eq!(bin_to_frequency(3, 1_000.0, 10), 300.0);
    }

    #[test]
    fn test_band_bounds_are_inclusive() {
        let spectrum = ramp_spectrum();

        // bins 2, 3 and 4
        assert_eq!(band_magnitude(&spectrum, 200.0, 400.0, TriggerStyle::Max), 0.4);

        let mean = band_magnitude(&spectrum, 200.0, 400.0, TriggerStyle::Mean);
        assert!((mean - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_empty_band_is_zero() {
        let spectrum = ramp_spectrum();

        assert_eq!(band_magnitude(&spectrum, 210.0, 290.0, TriggerStyle::Max), 0.0);
        assert_eq!(band_magnitude(&spectrum, 210.0, 290.0, TriggerStyle::Mean), 0.0);
        assert_eq!(band_magnitude(&spectrum, 5_000.0, 6_000.0, TriggerStyle::Mean), 0.0);
    }

    #[test]
    fn test_inverted_band_is_zero() {
        let spectrum = ramp_spectrum();

        assert_eq!(band_magnitude(&spectrum, 400.0, 200.0, TriggerStyle::Max), 0.0);
    }
}
