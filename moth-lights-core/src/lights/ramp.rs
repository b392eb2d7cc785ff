//! A palette stretched into a closed loop of colors.
use itertools::Itertools;
use palette::{Mix, Srgb};
use smart_leds::RGB8;

use crate::errors::{MyError, MyResult};
use crate::logging::debug;

/// The user-editable list of colors. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette(Vec<RGB8>);

impl Palette {
    pub fn new(colors: Vec<RGB8>) -> MyResult<Self> {
        if colors.is_empty() {
            return Err(MyError::EmptyRamp);
        }

        Ok(Self(colors))
    }

    pub fn colors(&self) -> &[RGB8] {
        &self.0
    }

    pub fn add(&mut self, color: RGB8) {
        self.0.push(color);
    }

    pub fn remove(&mut self, index: usize) -> MyResult<RGB8> {
        if index >= self.0.len() {
            return Err(MyError::PaletteIndex(index));
        }

        if self.0.len() == 1 {
            return Err(MyError::LastColour);
        }

        Ok(self.0.remove(index))
    }

    pub fn update(&mut self, index: usize, color: RGB8) -> MyResult<()> {
        let x = self.0.get_mut(index).ok_or(MyError::PaletteIndex(index))?;

        *x = color;

        Ok(())
    }

    /// for persistence. `RGB8` doesn't implement serde
    pub fn to_triples(&self) -> Vec<[u8; 3]> {
        self.0.iter().map(|x| [x.r, x.g, x.b]).collect()
    }

    pub fn from_triples(triples: &[[u8; 3]]) -> MyResult<Self> {
        Self::new(triples.iter().map(|[r, g, b]| RGB8::new(*r, *g, *b)).collect())
    }
}

/// Every consecutive pair of palette colors (wrapping from the last back to the first) blended over `steps` samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ramp {
    colors: Vec<RGB8>,
    steps_per_transition: usize,
}

impl Ramp {
    pub fn build(palette: &[RGB8], steps_per_transition: usize) -> MyResult<Self> {
        if palette.is_empty() || steps_per_transition == 0 {
            return Err(MyError::EmptyRamp);
        }

        let colors: Vec<RGB8> = palette
            .iter()
            .circular_tuple_windows::<(_, _)>()
            .flat_map(|(a, b)| {
                let a: Srgb<f32> = Srgb::new(a.r, a.g, a.b).into_format();
                let b: Srgb<f32> = Srgb::new(b.r, b.g, b.b).into_format();

                (0..steps_per_transition).map(move |k| {
                    // t never reaches 1. the next transition starts on that color
                    let t = k as f32 / steps_per_transition as f32;

                    let mixed: Srgb<u8> = a.mix(b, t).into_format();

                    RGB8::new(mixed.red, mixed.green, mixed.blue)
                })
            })
            .collect();

        debug!(
            "built a ramp of {} colors from {} palette colors",
            colors.len(),
            palette.len()
        );

        Ok(Self {
            colors,
            steps_per_transition,
        })
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn steps_per_transition(&self) -> usize {
        self.steps_per_transition
    }

    /// wraps around
    pub fn get(&self, step: usize) -> RGB8 {
        self.colors[step % self.colors.len()]
    }

    pub fn colors(&self) -> &[RGB8] {
        &self.colors
    }
}

/// Where strip `strip_index` starts in the ramp so neighbouring strips don't move in lockstep.
pub fn phase_offset(ramp_len: usize, strip_index: usize, offset_fraction: f32) -> usize {
    if ramp_len == 0 {
        return 0;
    }

    let start = (ramp_len as f32 * offset_fraction * strip_index as f32).round() as i64;

    start.rem_euclid(ramp_len as i64) as usize
}

#[cfg(test)]
mod tests {
    use smart_leds::RGB8;
    use smart_leds::colors::{BLUE, LIME, RED};

    use super::*;

    #[test]
    fn test_three_colors_ten_steps() {
        let ramp = Ramp::build(&[RED, LIME, BLUE], 10).unwrap();

        assert_eq!(ramp.len(), 30);
        assert_eq!(ramp.get(0), RED);
        assert_eq!(ramp.get(10), LIME);
        assert_eq!(ramp.get(20), BLUE);

        // almost back to red
        let last = ramp.get(29);
        assert!(last.r > 200, "{last:?}");
        assert!(last.b < 40, "{last:?}");
        assert_eq!(last.g, 0);

        // halfway between red and green
        let mid = ramp.get(5);
        assert!((mid.r as i16 - 128).abs() <= 1, "{mid:?}");
        assert!((mid.g as i16 - 128).abs() <= 1, "{mid:?}");
    }

    #[test]
    fn test_get_wraps() {
        let ramp = Ramp::build(&[RED, BLUE], 4).unwrap();

        assert_eq!(ramp.get(8), ramp.get(0));
        assert_eq!(ramp.get(13), ramp.get(5));
    }

    #[test]
    fn test_single_color_is_solid() {
        let ramp = Ramp::build(&[RGB8::new(10, 20, 30)], 5).unwrap();

        assert_eq!(ramp.len(), 5);
        assert!(ramp.colors().iter().all(|x| *x == RGB8::new(10, 20, 30)));
    }

    #[test]
    fn test_empty_ramp_is_an_error() {
        assert!(Ramp::build(&[], 10).is_err());
        assert!(Ramp::build(&[RED], 0).is_err());
    }

    #[test]
    fn test_phase_offset() {
        assert_eq!(phase_offset(300, 0, 0.25), 0);
        assert_eq!(phase_offset(300, 1, 0.25), 75);
        assert_eq!(phase_offset(300, 5, 0.25), 75);
        assert_eq!(phase_offset(300, 2, 0.0), 0);
        assert_eq!(phase_offset(0, 2, 0.5), 0);
    }

    #[test]
    fn test_palette_keeps_its_last_color() {
        let mut palette = Palette::new(vec![RED, BLUE]).unwrap();

        assert!(matches!(palette.remove(5), Err(MyError::PaletteIndex(5))));
        assert_eq!(palette.remove(0).unwrap(), RED);
        assert!(matches!(palette.remove(0), Err(MyError::LastColour)));
        assert_eq!(palette.colors(), &[BLUE]);
    }

    #[test]
    fn test_palette_update() {
        let mut palette = Palette::new(vec![RED]).unwrap();

        palette.update(0, LIME).unwrap();
        assert!(palette.update(1, LIME).is_err());

        assert_eq!(palette.to_triples(), vec![[0, 255, 0]]);
    }
}
