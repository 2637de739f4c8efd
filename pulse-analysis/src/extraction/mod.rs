//! Amplitude and time extraction from conditioned waveforms.
//!
//! Every strategy consumes a [ConditionedWaveform] and produces an [Extraction].
//! A channel is configured with exactly one strategy.
mod fixed_sample;
mod spline_peak;
mod threshold;

pub use spline_peak::{DEFAULT_SPLINE_STEP, SplineScan, scan_spline};
pub use threshold::threshold_crossing;

use crate::{Real, SENTINEL, error::ExtractionError, waveform::ConditionedWaveform};
use tracing::trace;

/// Amplitude reported by an extraction.
#[derive(Default, Clone, Copy, Debug, PartialEq)]
pub enum Amplitude {
    /// The strategy does not measure an amplitude.
    #[default]
    None,
    /// The strategy measured the amplitude directly.
    Measured(Real),
    /// An estimate only to be used if nothing better has been measured.
    Fallback(Real),
}

impl Amplitude {
    pub fn value(&self) -> Option<Real> {
        match *self {
            Amplitude::None => None,
            Amplitude::Measured(value) | Amplitude::Fallback(value) => Some(value),
        }
    }
}

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtractionStatus {
    #[default]
    Ok,
    /// No threshold crossing was found.
    NoSignal,
    /// The waveform has no samples.
    EmptyChannel,
}

#[derive(Default, Clone, Copy, Debug, PartialEq)]
pub struct Extraction {
    pub amplitude: Amplitude,
    pub time: Option<Real>,
    pub status: ExtractionStatus,
}

impl Extraction {
    fn empty() -> Self {
        Self {
            status: ExtractionStatus::EmptyChannel,
            ..Default::default()
        }
    }

    /// The extracted time, or the sentinel if none was found.
    pub fn time_or_sentinel(&self) -> Real {
        self.time.unwrap_or(SENTINEL)
    }

    pub fn amplitude_or_sentinel(&self) -> Real {
        self.amplitude.value().unwrap_or(SENTINEL)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ExtractionStrategy {
    /// Maximum of a natural cubic spline through the samples, scanned at `step`.
    SplinePeak { step: Real },
    /// Time at which the waveform first rises through `threshold`.
    LeadingEdge { threshold: Real },
    /// As [Self::LeadingEdge] with the threshold at `fraction` of the waveform maximum.
    ConstantFraction { fraction: Real },
    /// The value at sample `index`, reported as the time.
    FixedSample { index: usize },
}

impl Default for ExtractionStrategy {
    fn default() -> Self {
        Self::SplinePeak {
            step: DEFAULT_SPLINE_STEP,
        }
    }
}

impl ExtractionStrategy {
    pub fn extract(&self, conditioned: &ConditionedWaveform) -> Result<Extraction, ExtractionError> {
        let extraction = match *self {
            ExtractionStrategy::SplinePeak { step } => scan_spline(conditioned, step)
                .map(|scan| Extraction {
                    amplitude: Amplitude::Measured(scan.amplitude),
                    ..Default::default()
                })
                .unwrap_or_else(Extraction::empty),
            ExtractionStrategy::LeadingEdge { threshold } => {
                if conditioned.is_empty() {
                    Extraction::empty()
                } else {
                    threshold::leading_edge(conditioned, threshold)
                }
            }
            ExtractionStrategy::ConstantFraction { fraction } => {
                threshold::constant_fraction(conditioned, fraction)
                    .unwrap_or_else(Extraction::empty)
            }
            ExtractionStrategy::FixedSample { index } => {
                fixed_sample::readout(conditioned, index)?
            }
        };
        trace!("{self:?} gave {extraction:?}");
        Ok(extraction)
    }
}
