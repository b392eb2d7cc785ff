//! One LED strip ("bar") and the state machine that picks what it shows.
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use smart_leds::RGB8;

use super::animation::{FrameContext, StripState, scale_color};
use super::modes::{Mode, ModeKind};
use super::ramp::{Ramp, phase_offset};
use crate::audio::TriggerStyle;
use crate::logging::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandSettings {
    pub lower_hz: f32,
    pub upper_hz: f32,
    pub threshold: f32,
    /// minimum seconds between triggers
    pub debounce_s: f32,
}

/// Everything a user can change about a strip. Saved with the rest of the settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StripSettings {
    /// 0 to 1
    pub brightness: f32,
    /// fraction of brightness lost per tick while fading. (0, 1]
    pub fade: f32,
    pub trigger_style: TriggerStyle,
    pub bass: BandSettings,
    pub mid: BandSettings,
    /// how many LEDs a mid strobe lights
    pub length_mid_strobe: usize,
    pub auto_cycle: bool,
    pub time_per_mode_s: f32,
    /// fraction of the ramp between neighbouring strips
    pub color_offset: f32,
    pub mode_index: usize,
    /// a solid color that overrides every mode
    pub static_color: Option<[u8; 3]>,
}

impl Default for StripSettings {
    fn default() -> Self {
        Self {
            brightness: 1.0,
            fade: 0.9,
            trigger_style: TriggerStyle::Max,
            bass: BandSettings {
                lower_hz: 20.0,
                upper_hz: 250.0,
                threshold: 0.6,
                debounce_s: 0.15,
            },
            mid: BandSettings {
                lower_hz: 250.0,
                upper_hz: 2_000.0,
                threshold: 0.5,
                debounce_s: 0.1,
            },
            length_mid_strobe: 10,
            auto_cycle: false,
            time_per_mode_s: 30.0,
            color_offset: 0.0,
            mode_index: 0,
            static_color: None,
        }
    }
}

/// What a strip rendered on its last tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Idle,
    Static,
    AutoCycle(usize),
    Fixed(usize),
}

pub struct Strip {
    /// position across the whole installation. drives the phase offset
    index: usize,
    settings: StripSettings,
    state: StripState,
    /// one of every mode so switching keeps each mode's state
    modes: Vec<Mode>,
    cycle_position: usize,
    mode_started: Option<Instant>,
    activity: Activity,
}

impl Strip {
    pub fn new(
        index: usize,
        num_leds: usize,
        settings: StripSettings,
        ramp: Arc<Ramp>,
        current_step: usize,
    ) -> Self {
        let phase = phase_offset(ramp.len(), index, settings.color_offset);
        let current_step = current_step % ramp.len().max(1);

        debug!("strip {index}: {num_leds} leds. phase {phase}. step {current_step}");

        Self {
            index,
            settings,
            state: StripState::new(num_leds, ramp, phase, current_step),
            modes: Mode::all(index as u64),
            cycle_position: 0,
            mode_started: None,
            activity: Activity::Idle,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn num_leds(&self) -> usize {
        self.state.num_leds()
    }

    pub fn pixels(&self) -> &[u8] {
        self.state.pixels()
    }

    pub fn current_step(&self) -> usize {
        self.state.current_step()
    }

    pub fn activity(&self) -> Activity {
        self.activity
    }

    pub fn settings(&self) -> &StripSettings {
        &self.settings
    }

    /// replace the settings. the phase offset follows `color_offset`
    pub fn set_settings(&mut self, settings: StripSettings) {
        let phase = phase_offset(self.state.ramp().len(), self.index, settings.color_offset);

        self.state.set_phase(phase);
        self.settings = settings;
    }

    pub fn set_ramp(&mut self, ramp: Arc<Ramp>) {
        let phase = phase_offset(ramp.len(), self.index, self.settings.color_offset);

        self.state.set_ramp(ramp, phase);
    }

    pub fn blank(&mut self) {
        self.state.blank();
    }

    /// Render one tick. Static color beats auto-cycle beats the fixed mode.
    pub fn update(&mut self, frame: &FrameContext) {
        if let Some([r, g, b]) = self.settings.static_color {
            self.mode_started = None;
            self.activity = Activity::Static;

            let color = scale_color(RGB8::new(r, g, b), self.settings.brightness);
            self.state.fill(color);
            return;
        }

        if self.settings.auto_cycle && !frame.auto_cycle.is_empty() {
            let mode_index = self.auto_cycle_mode(frame.auto_cycle, frame.now);

            self.activity = Activity::AutoCycle(mode_index);
            self.render(mode_index, frame);
            return;
        }

        // no modes flagged falls back to the fixed mode
        self.mode_started = None;
        self.activity = Activity::Fixed(self.settings.mode_index);
        self.render(self.settings.mode_index, frame);
    }

    /// advance through `cycle` every `time_per_mode_s` and return the catalog index to render
    fn auto_cycle_mode(&mut self, cycle: &[usize], now: Instant) -> usize {
        let started = self.mode_started.get_or_insert(now);

        if let Ok(per_mode) = Duration::try_from_secs_f32(self.settings.time_per_mode_s) {
            if !per_mode.is_zero() {
                while now.saturating_duration_since(*started) >= per_mode {
                    *started += per_mode;
                    self.cycle_position = (self.cycle_position + 1) % cycle.len();

                    trace!("strip {} auto-cycle -> {}", self.index, self.cycle_position);
                }
            }
        }

        cycle[self.cycle_position % cycle.len()]
    }

    fn render(&mut self, mode_index: usize, frame: &FrameContext) {
        match self.modes.get_mut(mode_index) {
            Some(mode) => mode.render(&mut self.state, &self.settings, frame),
            None => warn!(
                "strip {}: mode {} does not exist. {} modes available",
                self.index,
                mode_index,
                ModeKind::ALL.len()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use smart_leds::colors::{BLUE, LIME, RED};

    use super::*;
    use crate::audio::{SpectrumFrame, SpectrumShape};
    use crate::lights::Ramp;

    fn ramp() -> Arc<Ramp> {
        Arc::new(Ramp::build(&[RED, LIME, BLUE], 10).unwrap())
    }

    fn silence() -> SpectrumFrame {
        SpectrumFrame::zeros(SpectrumShape {
            bins: 50,
            max_freq_hz: 5_000.0,
        })
    }

    #[test]
    fn test_static_color_beats_everything() {
        let settings = StripSettings {
            static_color: Some([100, 50, 0]),
            auto_cycle: true,
            brightness: 0.5,
            ..Default::default()
        };
        let mut strip = Strip::new(0, 3, settings, ramp(), 0);
        let spectrum = silence();

        strip.update(&FrameContext {
            spectrum: &spectrum,
            auto_cycle: &[1, 2],
            now: Instant::now(),
        });

        assert_eq!(strip.activity(), Activity::Static);
        assert_eq!(strip.pixels(), &[50, 25, 0, 50, 25, 0, 50, 25, 0]);
    }

    #[test_log::test]
    fn test_auto_cycle_returns_to_start_after_full_cycle() {
        let settings = StripSettings {
            auto_cycle: true,
            time_per_mode_s: 1.0,
            ..Default::default()
        };
        let mut strip = Strip::new(0, 4, settings, ramp(), 0);
        let spectrum = silence();
        let cycle = [0, 3, 5];

        let t0 = Instant::now();
        let mut seen = vec![];

        // tick at T/10 for 3T
        for k in 0..=30 {
            strip.update(&FrameContext {
                spectrum: &spectrum,
                auto_cycle: &cycle,
                now: t0 + Duration::from_millis(k * 100),
            });

            if let Activity::AutoCycle(x) = strip.activity() {
                if seen.last() != Some(&x) {
                    seen.push(x);
                }
            }
        }

        assert_eq!(seen, vec![0, 3, 5, 0]);
        assert_eq!(strip.activity(), Activity::AutoCycle(0));
    }

    #[test]
    fn test_auto_cycle_without_flagged_modes_uses_fixed_mode() {
        let settings = StripSettings {
            auto_cycle: true,
            mode_index: 4,
            ..Default::default()
        };
        let mut strip = Strip::new(0, 4, settings, ramp(), 0);
        let spectrum = silence();

        strip.update(&FrameContext {
            spectrum: &spectrum,
            auto_cycle: &[],
            now: Instant::now(),
        });

        assert_eq!(strip.activity(), Activity::Fixed(4));
    }

    #[test_log::test]
    fn test_unknown_mode_keeps_pixels() {
        let mut strip = Strip::new(0, 2, StripSettings::default(), ramp(), 0);
        let spectrum = silence();
        let now = Instant::now();

        strip.update(&FrameContext {
            spectrum: &spectrum,
            auto_cycle: &[],
            now,
        });
        let before = strip.pixels().to_vec();
        assert_eq!(before, vec![255, 0, 0, 255, 0, 0]);

        strip.set_settings(StripSettings {
            mode_index: 42,
            ..Default::default()
        });
        strip.update(&FrameContext {
            spectrum: &spectrum,
            auto_cycle: &[],
            now,
        });

        assert_eq!(strip.pixels(), before.as_slice());
    }

    #[test]
    fn test_strips_are_out_of_phase() {
        let settings = StripSettings {
            color_offset: 0.5,
            ..Default::default()
        };
        let spectrum = silence();
        let now = Instant::now();

        let mut a = Strip::new(0, 1, settings.clone(), ramp(), 0);
        let mut b = Strip::new(1, 1, settings, ramp(), 0);

        for strip in [&mut a, &mut b] {
            strip.update(&FrameContext {
                spectrum: &spectrum,
                auto_cycle: &[],
                now,
            });
        }

        assert_eq!(a.pixels(), &[255, 0, 0]);
        assert_ne!(a.pixels(), b.pixels());
    }

    #[test]
    fn test_pixel_length_survives_ramp_changes() {
        let mut strip = Strip::new(0, 5, StripSettings::default(), ramp(), 25);

        strip.set_ramp(Arc::new(Ramp::build(&[RED], 3).unwrap()));

        assert_eq!(strip.pixels().len(), 15);
        assert!(strip.current_step() < 3);
    }
}
