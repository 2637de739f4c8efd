use crate::{
    distribution::DistributionError,
    scenario::PulseAttributes,
};
use rand::Rng;

/// A single pulse, with every attribute drawn from the scenario's distributions.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Pulse {
    Gaussian {
        mean: f64,
        sd: f64,
        peak_amplitude: f64,
    },
    Triangular {
        start: f64,
        peak_time: f64,
        stop: f64,
        amplitude: f64,
    },
    Biexp {
        start: f64,
        decay: f64,
        rise: f64,
        coef: f64,
    },
}

impl Pulse {
    pub(crate) fn sample<R: Rng>(
        attributes: &PulseAttributes,
        rng: &mut R,
    ) -> Result<Self, DistributionError> {
        Ok(match attributes {
            PulseAttributes::Gaussian {
                height,
                peak_time,
                sd,
            } => Self::Gaussian {
                mean: peak_time.sample(rng)?,
                sd: sd.sample(rng)?,
                peak_amplitude: height.sample(rng)?,
            },
            PulseAttributes::Triangular {
                start,
                peak_time,
                width,
                height,
            } => {
                let start = start.sample(rng)?;
                let width = width.sample(rng)?;
                Self::Triangular {
                    start,
                    peak_time: start + peak_time.sample(rng)? * width,
                    stop: start + width,
                    amplitude: height.sample(rng)?,
                }
            }
            PulseAttributes::Biexp {
                start,
                decay,
                rise,
                height,
            } => {
                let start = start.sample(rng)?;
                let decay = decay.sample(rng)?;
                let rise = rise.sample(rng)?;
                let height = height.sample(rng)?;
                /*
                f(t) = A(e^{-t/d} - e^{-t/r})
                peak_time: t' = ln(b), where b = (d/r)^{dr/(d - r)}
                f(t') = A((r/d)^{r/(d - r)} - (r/d)^{d/(d - r)})
                */
                let ratio = rise / decay;
                let peak = ratio.powf(rise / (decay - rise)) - ratio.powf(decay / (decay - rise));
                Self::Biexp {
                    start,
                    decay,
                    rise,
                    coef: height / peak,
                }
            }
        })
    }

    pub(crate) fn value_at(&self, time: f64) -> f64 {
        match *self {
            Self::Gaussian {
                mean,
                sd,
                peak_amplitude,
            } => peak_amplitude * f64::exp(-0.5 * f64::powi((time - mean) / sd, 2)),
            Self::Triangular {
                start,
                peak_time,
                stop,
                amplitude,
            } => {
                if start <= time && time < peak_time {
                    amplitude * (time - start) / (peak_time - start)
                } else if peak_time <= time && time < stop {
                    amplitude * (stop - time) / (stop - peak_time)
                } else {
                    f64::default()
                }
            }
            Self::Biexp {
                start,
                decay,
                rise,
                coef,
            } => {
                if time < start {
                    f64::default()
                } else {
                    let time = time - start;
                    coef * (f64::exp(-time / decay) - f64::exp(-time / rise))
                }
            }
        }
    }
}
