/// S = number of microphone samples in one chunk
#[derive(Debug, Clone, PartialEq)]
pub struct Samples<const S: usize>(pub [i16; S]);

/// the chunk after scaling to [-1, 1]. everything downstream of here works on these
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledSamples<const S: usize>(pub [f32; S]);

impl<const S: usize> Samples<S> {
    pub const fn silent() -> Self {
        Self([0; S])
    }

    pub fn scaled(&self) -> ScaledSamples<S> {
        let mut inner = [0.0; S];

        for (x, &sample) in inner.iter_mut().zip(self.0.iter()) {
            *x = sample as f32 / 32768.0;
        }

        ScaledSamples(inner)
    }
}

impl<const S: usize> ScaledSamples<S> {
    pub fn mean(&self) -> f32 {
        if S == 0 {
            return 0.0;
        }

        self.0.iter().sum::<f32>() / S as f32
    }

    /// subtract the mean so a mic with a dc offset doesn't light up bin 0
    pub fn remove_dc_offset(&mut self) {
        let mean = self.mean();

        for x in self.0.iter_mut() {
            *x -= mean;
        }
    }

    pub fn mean_square(&self) -> f32 {
        if S == 0 {
            return 0.0;
        }

        self.0.iter().map(|x| x * x).sum::<f32>() / S as f32
    }
}
