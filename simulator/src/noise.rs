use crate::distribution::DistributionError;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct NoiseSource {
    attributes: NoiseAttributes,
    /// Weight of the previous sample's noise in the current one, zero for white noise.
    #[serde(default)]
    smoothing_factor: f64,
}

impl NoiseSource {
    fn smooth(&self, new_value: f64, old_value: f64) -> f64 {
        new_value * (1.0 - self.smoothing_factor) + old_value * self.smoothing_factor
    }

    fn sample<R: Rng>(&self, rng: &mut R) -> Result<f64, DistributionError> {
        match self.attributes {
            NoiseAttributes::Uniform { min, max } => Ok((max - min) * rng.random::<f64>() + min),
            NoiseAttributes::Gaussian { mean, sd } => Ok(Normal::new(mean, sd)?.sample(rng)),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", tag = "noise-type")]
pub(crate) enum NoiseAttributes {
    Uniform { min: f64, max: f64 },
    Gaussian { mean: f64, sd: f64 },
}

/// Noise added to one trace, remembering the previous value for smoothing.
pub(crate) struct Noise<'a> {
    source: &'a NoiseSource,
    prev: f64,
}

impl<'a> Noise<'a> {
    pub(crate) fn new(source: &'a NoiseSource) -> Self {
        Self {
            source,
            prev: f64::default(),
        }
    }

    pub(crate) fn noisify<R: Rng>(
        &mut self,
        value: f64,
        rng: &mut R,
    ) -> Result<f64, DistributionError> {
        self.prev = self.source.smooth(self.source.sample(rng)?, self.prev);
        Ok(value + self.prev)
    }
}
