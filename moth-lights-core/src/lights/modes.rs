//! The animation catalog. Each mode carries exactly the state it needs between ticks.
use std::f32::consts::TAU;
use std::time::Instant;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::animation::{FrameContext, StripState, band_triggered, scale_color};
use super::strip::StripSettings;
use crate::audio::PeakScaled;
use crate::errors::{MyError, MyResult};
use crate::logging::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    ColorCycle,
    BassStrobe,
    BassMidStrobe,
    Pulse,
    Sine,
    Swirl,
}

impl ModeKind {
    /// catalog order. indexes into this are what the menu and the saved settings use
    pub const ALL: [ModeKind; 6] = [
        ModeKind::ColorCycle,
        ModeKind::BassStrobe,
        ModeKind::BassMidStrobe,
        ModeKind::Pulse,
        ModeKind::Sine,
        ModeKind::Swirl,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModeKind::ColorCycle => "Colour cycle",
            ModeKind::BassStrobe => "Bass strobe",
            ModeKind::BassMidStrobe => "Bass + mid strobe",
            ModeKind::Pulse => "Pulse",
            ModeKind::Sine => "Sine",
            ModeKind::Swirl => "Swirl",
        }
    }

    pub fn audio_reactive(&self) -> bool {
        !matches!(self, ModeKind::ColorCycle)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeInfo {
    pub name: &'static str,
    pub audio_reactive: bool,
    pub in_auto_cycle: bool,
}

/// Which modes take part in auto-cycle. Shared by every strip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeCatalog {
    auto_cycle: [bool; ModeKind::ALL.len()],
}

impl ModeCatalog {
    pub fn new(auto_cycle: &[usize]) -> MyResult<Self> {
        let mut catalog = Self::default();

        for &index in auto_cycle {
            catalog.add_to_auto_cycle(index)?;
        }

        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.auto_cycle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.auto_cycle.is_empty()
    }

    pub fn list_modes(&self) -> Vec<ModeInfo> {
        ModeKind::ALL
            .iter()
            .zip(self.auto_cycle.iter())
            .map(|(kind, &in_auto_cycle)| ModeInfo {
                name: kind.name(),
                audio_reactive: kind.audio_reactive(),
                in_auto_cycle,
            })
            .collect()
    }

    pub fn add_to_auto_cycle(&mut self, index: usize) -> MyResult<()> {
        let x = self.auto_cycle.get_mut(index).ok_or(MyError::ModeIndex(index))?;

        *x = true;

        Ok(())
    }

    pub fn remove_from_auto_cycle(&mut self, index: usize) -> MyResult<()> {
        let x = self.auto_cycle.get_mut(index).ok_or(MyError::ModeIndex(index))?;

        *x = false;

        Ok(())
    }

    /// the cycle order. catalog order, flagged modes only
    pub fn auto_cycle_indices(&self) -> Vec<usize> {
        self.auto_cycle
            .iter()
            .enumerate()
            .filter_map(|(i, x)| x.then_some(i))
            .collect()
    }
}

/// pulse ceiling relaxes per tick, so it needs to be much faster than the spectrum's per-chunk ceiling
const PULSE_DECAY: f32 = 0.99;

/// radians per tick
const WAVE_RATE_FLOOR: f32 = 0.02;
const WAVE_RATE_KICK: f32 = 0.15;
const WAVE_RATE_MAX: f32 = 0.6;
const WAVE_RATE_DECAY: f32 = 0.95;

/// full sine periods along one strip
const WAVES_PER_STRIP: f32 = 2.0;

pub struct Strobe {
    last_bass: Option<Instant>,
    last_mid: Option<Instant>,
    rng: SmallRng,
}

impl Strobe {
    fn new(seed: u64) -> Self {
        Self {
            last_bass: None,
            last_mid: None,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    fn render(
        &mut self,
        with_mid: bool,
        state: &mut StripState,
        settings: &StripSettings,
        frame: &FrameContext,
    ) {
        let color = scale_color(state.color(), settings.brightness);

        let bass = band_triggered(
            frame.spectrum,
            &settings.bass,
            settings.trigger_style,
            &mut self.last_bass,
            frame.now,
        );

        if bass {
            trace!("bass strobe");
            state.fill(color);
            state.triggered();
            return;
        }

        let mid = with_mid
            && band_triggered(
                frame.spectrum,
                &settings.mid,
                settings.trigger_style,
                &mut self.last_mid,
                frame.now,
            );

        let run = settings.length_mid_strobe.min(state.num_leds());

        if mid && run > 0 {
            let start = self.rng.random_range(0..=state.num_leds() - run);

            trace!("mid strobe at {start}");
            state.fill_range(start..start + run, color);
            state.triggered();
            return;
        }

        state.fade_out(settings.fade);
    }
}

pub struct Pulse {
    ceiling: PeakScaled,
}

impl Pulse {
    fn new() -> Self {
        Self {
            ceiling: PeakScaled::new(PULSE_DECAY),
        }
    }

    fn render(&mut self, state: &mut StripState, settings: &StripSettings, frame: &FrameContext) {
        let level = self.ceiling.scale_one(frame.spectrum.energy()).clamp(0.0, 1.0);

        let lit = (level * state.num_leds() as f32).round() as usize;

        if lit == 0 {
            state.fade_out(settings.fade);
            return;
        }

        let color = scale_color(state.color(), settings.brightness);

        state.dim_range(lit..state.num_leds(), settings.fade);
        state.fill_range(0..lit, color);
        state.triggered();
        state.advance();
    }
}

pub struct Wave {
    phase: f32,
    rate: f32,
    last_bass: Option<Instant>,
}

impl Wave {
    fn new() -> Self {
        Self {
            phase: 0.0,
            rate: WAVE_RATE_FLOOR,
            last_bass: None,
        }
    }

    #[cfg(test)]
    fn rate(&self) -> f32 {
        self.rate
    }

    /// kick the rate on bass, otherwise let it relax. returns true on a kick
    fn step(&mut self, settings: &StripSettings, frame: &FrameContext) -> bool {
        let kicked = band_triggered(
            frame.spectrum,
            &settings.bass,
            settings.trigger_style,
            &mut self.last_bass,
            frame.now,
        );

        self.rate = if kicked {
            (self.rate + WAVE_RATE_KICK).min(WAVE_RATE_MAX)
        } else {
            (self.rate * WAVE_RATE_DECAY).max(WAVE_RATE_FLOOR)
        };

        self.phase = (self.phase + self.rate) % TAU;

        kicked
    }

    fn render(
        &mut self,
        swirl: bool,
        state: &mut StripState,
        settings: &StripSettings,
        frame: &FrameContext,
    ) {
        if self.step(settings, frame) {
            state.advance();
        }

        let color = state.color();
        let num_leds = state.num_leds();

        for n in 0..num_leds {
            let x = n as f32 / num_leds as f32 * TAU * WAVES_PER_STRIP;

            let level = if swirl {
                // two waves moving in opposite directions. squared twice for deeper shadows
                let w = ((x - self.phase).sin() + (x * 1.5 + self.phase).sin()) / 4.0 + 0.5;
                let w = w * w;
                w * w
            } else {
                let w = (x - self.phase).sin() * 0.5 + 0.5;
                w * w
            };

            state.set_led(n, scale_color(color, level * settings.brightness));
        }
    }
}

/// A mode and its state. Every strip owns one of each.
pub enum Mode {
    ColorCycle,
    BassStrobe(Strobe),
    BassMidStrobe(Strobe),
    Pulse(Pulse),
    Sine(Wave),
    Swirl(Wave),
}

impl Mode {
    pub fn new(kind: ModeKind, seed: u64) -> Self {
        match kind {
            ModeKind::ColorCycle => Mode::ColorCycle,
            ModeKind::BassStrobe => Mode::BassStrobe(Strobe::new(seed)),
            ModeKind::BassMidStrobe => Mode::BassMidStrobe(Strobe::new(seed)),
            ModeKind::Pulse => Mode::Pulse(Pulse::new()),
            ModeKind::Sine => Mode::Sine(Wave::new()),
            ModeKind::Swirl => Mode::Swirl(Wave::new()),
        }
    }

    /// one of every mode, in catalog order
    pub fn all(seed: u64) -> Vec<Self> {
        debug!("new modes with seed {seed}");

        ModeKind::ALL.iter().map(|kind| Self::new(*kind, seed)).collect()
    }

    pub fn kind(&self) -> ModeKind {
        match self {
            Mode::ColorCycle => ModeKind::ColorCycle,
            Mode::BassStrobe(_) => ModeKind::BassStrobe,
            Mode::BassMidStrobe(_) => ModeKind::BassMidStrobe,
            Mode::Pulse(_) => ModeKind::Pulse,
            Mode::Sine(_) => ModeKind::Sine,
            Mode::Swirl(_) => ModeKind::Swirl,
        }
    }

    pub fn render(&mut self, state: &mut StripState, settings: &StripSettings, frame: &FrameContext) {
        match self {
            Mode::ColorCycle => {
                state.fill(scale_color(state.color(), settings.brightness));
                state.advance();
            }
            Mode::BassStrobe(x) => x.render(false, state, settings, frame),
            Mode::BassMidStrobe(x) => x.render(true, state, settings, frame),
            Mode::Pulse(x) => x.render(state, settings, frame),
            Mode::Sine(x) => x.render(false, state, settings, frame),
            Mode::Swirl(x) => x.render(true, state, settings, frame),
        }
    }
}
