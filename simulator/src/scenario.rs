//! JSON description of a simulated acquisition.
use crate::{distribution::FloatRandomDistribution, noise::NoiseSource};
use pulsecal_common::ChannelId;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum Polarity {
    #[default]
    Positive,
    Negative,
}

impl Polarity {
    pub(crate) fn sign(self) -> f64 {
        match self {
            Polarity::Positive => 1.0,
            Polarity::Negative => -1.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", tag = "pulse-type")]
pub(crate) enum PulseAttributes {
    Gaussian {
        height: FloatRandomDistribution,
        peak_time: FloatRandomDistribution,
        sd: FloatRandomDistribution,
    },
    Triangular {
        start: FloatRandomDistribution,
        /// Fraction of the width at which the peak occurs.
        peak_time: FloatRandomDistribution,
        width: FloatRandomDistribution,
        height: FloatRandomDistribution,
    },
    Biexp {
        start: FloatRandomDistribution,
        decay: FloatRandomDistribution,
        rise: FloatRandomDistribution,
        height: FloatRandomDistribution,
    },
}

fn default_occupancy() -> f64 {
    1.0
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct Scenario {
    pub(crate) num_events: u64,
    pub(crate) channels: Vec<ChannelId>,
    pub(crate) num_samples: usize,
    #[serde(default)]
    pub(crate) pedestal: f64,
    #[serde(default)]
    pub(crate) polarity: Polarity,
    pub(crate) pulse: PulseAttributes,
    /// Probability that a trace holds a pulse.
    #[serde(default = "default_occupancy")]
    pub(crate) occupancy: f64,
    #[serde(default)]
    pub(crate) noises: Vec<NoiseSource>,
    /// Round every sample to the nearest integer, as a digitiser would.
    #[serde(default)]
    pub(crate) quantise: bool,
    pub(crate) seed: Option<u64>,
}
