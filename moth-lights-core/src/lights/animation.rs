//! The pieces every mode shares: the pixel buffer, the strip's position in the ramp, fading and band triggers.
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

use smart_leds::RGB8;

use super::Ramp;
use super::strip::BandSettings;
use crate::audio::{SpectrumFrame, TriggerStyle, band_magnitude};
use crate::logging::trace;

/// Everything a strip needs to render one tick.
pub struct FrameContext<'a> {
    pub spectrum: &'a SpectrumFrame,
    /// catalog indexes currently flagged for auto-cycle
    pub auto_cycle: &'a [usize],
    pub now: Instant,
}

/// how many untriggered ticks a fade lasts before snapping to black
pub fn fade_ticks(fade: f32) -> u32 {
    if fade <= 0.0 {
        return u32::MAX;
    }

    (5.0 / fade).ceil() as u32
}

/// multiply a color by a level in [0, 1]
pub fn scale_color(color: RGB8, level: f32) -> RGB8 {
    let scale = |c: u8| (c as f32 * level).clamp(0.0, 255.0) as u8;

    RGB8::new(scale(color.r), scale(color.g), scale(color.b))
}

/// The pixel buffer plus where this strip is in the shared ramp.
pub struct StripState {
    /// RGB bytes. the length is fixed when the strip is built
    pixels: Vec<u8>,
    ramp: Arc<Ramp>,
    /// how far this strip is offset from the others
    phase: usize,
    current_step: usize,
    /// untriggered ticks since the last strobe
    faded_ticks: u32,
}

impl StripState {
    pub fn new(num_leds: usize, ramp: Arc<Ramp>, phase: usize, current_step: usize) -> Self {
        Self {
            pixels: vec![0; num_leds * 3],
            ramp,
            phase,
            current_step,
            faded_ticks: 0,
        }
    }

    pub fn num_leds(&self) -> usize {
        self.pixels.len() / 3
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn ramp(&self) -> &Arc<Ramp> {
        &self.ramp
    }

    pub fn set_ramp(&mut self, ramp: Arc<Ramp>, phase: usize) {
        self.current_step %= ramp.len().max(1);
        self.ramp = ramp;
        self.phase = phase;
    }

    pub fn set_phase(&mut self, phase: usize) {
        self.phase = phase;
    }

    /// the ramp color this strip is showing right now
    pub fn color(&self) -> RGB8 {
        self.ramp.get(self.current_step + self.phase)
    }

    pub fn advance(&mut self) {
        self.current_step = (self.current_step + 1) % self.ramp.len().max(1);
    }

    pub fn set_led(&mut self, n: usize, color: RGB8) {
        if let Some(x) = self.pixels.chunks_exact_mut(3).nth(n) {
            x.copy_from_slice(&[color.r, color.g, color.b]);
        }
    }

    pub fn fill(&mut self, color: RGB8) {
        self.fill_range(0..self.num_leds(), color);
    }

    /// LEDs outside the strip are ignored
    pub fn fill_range(&mut self, leds: Range<usize>, color: RGB8) {
        let end = leds.end.min(self.num_leds());
        let start = leds.start.min(end);

        for x in self.pixels[start * 3..end * 3].chunks_exact_mut(3) {
            x.copy_from_slice(&[color.r, color.g, color.b]);
        }
    }

    pub fn blank(&mut self) {
        self.pixels.fill(0);
    }

    /// a fresh strobe. the next untriggered tick starts a new fade
    pub fn triggered(&mut self) {
        self.faded_ticks = 0;
    }

    /// dim the LEDs in `leds` once, without touching the fade counter
    pub fn dim_range(&mut self, leds: Range<usize>, fade: f32) {
        let end = leds.end.min(self.num_leds());
        let start = leds.start.min(end);

        for x in self.pixels[start * 3..end * 3].iter_mut() {
            *x = (*x as f32 * (1.0 - fade)) as u8;
        }
    }

    /// Dim everything by `1 - fade`. After `fade_ticks(fade)` of these the strip snaps to black and moves to the next
    /// ramp color. Fading an already faded strip does nothing.
    pub fn fade_out(&mut self, fade: f32) {
        let limit = fade_ticks(fade);

        if self.faded_ticks >= limit {
            return;
        }

        self.dim_range(0..self.num_leds(), fade);
        self.faded_ticks += 1;

        if self.faded_ticks == limit {
            trace!("faded out after {limit} ticks");

            self.blank();
            self.advance();
        }
    }
}

/// True when the band is over its threshold and its debounce has elapsed. Restarts the debounce timer.
pub fn band_triggered(
    spectrum: &SpectrumFrame,
    band: &BandSettings,
    style: TriggerStyle,
    last_trigger: &mut Option<Instant>,
    now: Instant,
) -> bool {
    let magnitude = band_magnitude(spectrum, band.lower_hz, band.upper_hz, style);

    if magnitude <= band.threshold {
        return false;
    }

    let debouncing = last_trigger
        .is_some_and(|last| now.saturating_duration_since(last).as_secs_f32() < band.debounce_s);

    if debouncing {
        trace!("band {}-{}Hz debounced", band.lower_hz, band.upper_hz);
        return false;
    }

    *last_trigger = Some(now);

    true
}
