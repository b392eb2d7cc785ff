mod hanning;

pub use hanning::HanningWindow;

/// A window function applied to a chunk of samples before the FFT.
pub trait Window<const N: usize> {
    fn window(i: usize) -> f32;

    /// precompute the multipliers once. the spectrum builder keeps these around instead of calling `window` per sample
    fn windows() -> [f32; N] {
        let mut window = [0.0; N];

        for (i, sample) in window.iter_mut().enumerate() {
            *sample = Self::window(i);
        }

        window
    }
}

#[cfg(test)]
mod tests {
    use super::{HanningWindow, Window};

    #[test]
    fn test_hanning_edges_and_middle() {
        let w = HanningWindow::<8>::windows();

        assert_eq!(w[0], 0.0);
        assert!((w[4] - 1.0).abs() < 1e-6);
        // periodic hann is symmetric around the middle
        assert!((w[1] - w[7]).abs() < 1e-6);
        assert!((w[3] - w[5]).abs() < 1e-6);
    }

    #[test]
    fn test_precomputed_matches_window() {
        let w = HanningWindow::<16>::windows();

        for (i, x) in w.iter().enumerate() {
            assert_eq!(*x, HanningWindow::<16>::window(i));
        }
    }
}
