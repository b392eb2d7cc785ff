/// Automatic gain control with a decaying ceiling.
///
/// The ceiling jumps straight up to any new peak and otherwise relaxes geometrically,
/// so quiet passages slowly get boosted back toward the top of the range.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakScaled {
    ceiling: f32,
    decay_factor: f32,
    floor: f32,
}

impl PeakScaled {
    /// keeps digital silence from dividing by zero
    pub const DEFAULT_FLOOR: f32 = 1e-6;

    pub fn new(decay_factor: f32) -> Self {
        Self::with_floor(decay_factor, Self::DEFAULT_FLOOR)
    }

    pub fn with_floor(decay_factor: f32, floor: f32) -> Self {
        debug_assert!(decay_factor > 0.0 && decay_factor <= 1.0);

        Self {
            ceiling: floor,
            decay_factor,
            floor,
        }
    }

    pub fn ceiling(&self) -> f32 {
        self.ceiling
    }

    /// `ceiling = max(peak, ceiling * decay)`. returns the new ceiling
    pub fn update(&mut self, peak: f32) -> f32 {
        let decayed = (self.ceiling * self.decay_factor).max(self.floor);

        self.ceiling = if peak > decayed { peak } else { decayed };

        self.ceiling
    }

    /// update with a single value and return it scaled by the new ceiling
    pub fn scale_one(&mut self, x: f32) -> f32 {
        let ceiling = self.update(x);

        x / ceiling
    }

    /// update with the peak of `x`, then scale everything in place
    pub fn scale(&mut self, x: &mut [f32]) {
        let peak = x.iter().copied().fold(0.0f32, f32::max);

        let ceiling = self.update(peak);

        for x in x.iter_mut() {
            *x /= ceiling;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PeakScaled;

    #[test]
    fn test_jumps_to_new_peak() {
        let mut agc = PeakScaled::new(0.999);

        assert_eq!(agc.update(2.0), 2.0);
        assert_eq!(agc.update(5.0), 5.0);
    }

    #[test]
    fn test_never_rises_on_quiet_frames() {
        let mut agc = PeakScaled::new(0.9);
        agc.update(10.0);

        let mut last = agc.ceiling();

        for peak in [1.0, 0.0, 8.0, 3.0, 5.0, 0.5] {
            let before = agc.ceiling();
            let after = agc.update(peak);

            if peak < before {
                assert!(after <= before, "{after} > {before} for a quiet peak of {peak}");
                assert!(after == before * 0.9 || after == peak);
            }

            last = after;
        }

        assert!(last < 10.0);
    }

    #[test]
    fn test_decays_geometrically() {
        let mut agc = PeakScaled::new(0.5);
        agc.update(8.0);

        assert_eq!(agc.update(0.0), 4.0);
        assert_eq!(agc.update(0.0), 2.0);
        assert_eq!(agc.update(0.0), 1.0);
    }

    #[test]
    fn test_scale_normalizes_to_peak() {
        let mut agc = PeakScaled::new(0.999);
        let mut x = [1.0, 4.0, 2.0];

        agc.scale(&mut x);

        assert_eq!(x, [0.25, 1.0, 0.5]);
    }

    #[test]
    fn test_silence_stays_finite() {
        let mut agc = PeakScaled::new(0.5);
        let mut x = [0.0; 4];

        for _ in 0..100 {
            agc.scale(&mut x);
        }

        assert!(x.iter().all(|x| x.is_finite()));
        assert_eq!(agc.ceiling(), PeakScaled::DEFAULT_FLOOR);
    }
}
