//! Removes handling noise and rumble before the FFT sees it.
use biquad::{Biquad, Coefficients, DirectForm2Transposed, Hertz, Type};

use crate::errors::{MyError, MyResult};

/// Q values for the two sections of a 4th order butterworth
const BUTTERWORTH_4_Q: [f32; 2] = [0.541_196_1, 1.306_563];

/// 4th order butterworth high-pass made from two cascaded biquads.
/// filter state carries over between chunks so chunk edges don't click.
pub struct HighPassFilter {
    sections: [DirectForm2Transposed<f32>; 2],
}

impl HighPassFilter {
    pub fn new(sample_rate_hz: f32, cutoff_hz: f32) -> MyResult<Self> {
        let fs = Hertz::<f32>::from_hz(sample_rate_hz)
            .map_err(|err| MyError::HighPass(format!("sample rate: {err:?}")))?;
        let f0 = Hertz::<f32>::from_hz(cutoff_hz)
            .map_err(|err| MyError::HighPass(format!("cutoff: {err:?}")))?;

        let section = |q: f32| {
            Coefficients::<f32>::from_params(Type::HighPass, fs, f0, q)
                .map(DirectForm2Transposed::<f32>::new)
                .map_err(|err| MyError::HighPass(format!("{err:?}")))
        };

        Ok(Self {
            sections: [section(BUTTERWORTH_4_Q[0])?, section(BUTTERWORTH_4_Q[1])?],
        })
    }

    pub fn run(&mut self, x: f32) -> f32 {
        let [a, b] = &mut self.sections;

        b.run(a.run(x))
    }

    pub fn process(&mut self, samples: &mut [f32]) {
        for x in samples.iter_mut() {
            *x = self.run(*x);
        }
    }
}
