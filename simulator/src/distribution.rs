use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum DistributionError {
    #[error("Invalid Normal Distribution: {0}")]
    NormalDistribution(#[from] rand_distr::NormalError),
    #[error("Empty Uniform Distribution: [{min}, {max})")]
    EmptyUniform { min: f64, max: f64 },
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", tag = "random-type")]
pub(crate) enum FloatRandomDistribution {
    Constant { value: f64 },
    Uniform { min: f64, max: f64 },
    Normal { mean: f64, sd: f64 },
}

impl FloatRandomDistribution {
    pub(crate) fn sample<R: Rng>(&self, rng: &mut R) -> Result<f64, DistributionError> {
        match *self {
            Self::Constant { value } => Ok(value),
            Self::Uniform { min, max } => {
                if min < max {
                    Ok(rng.random_range(min..max))
                } else {
                    Err(DistributionError::EmptyUniform { min, max })
                }
            }
            Self::Normal { mean, sd } => Ok(Normal::new(mean, sd)?.sample(rng)),
        }
    }
}
