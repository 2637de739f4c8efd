//! Learning, storing and evaluating pulse templates.
//!
//! Training waveforms are recentred on a reference time, normalised by their amplitude,
//! and accumulated in a two dimensional histogram by [TemplateAccumulator]. Once enough
//! waveforms have been seen, the histogram is collapsed into a [TemplateLookupTable],
//! which can be persisted, reloaded, and evaluated by a [TemplateFunction].
mod accumulator;
mod collapser;
mod function;
mod geometry;
mod lookup;
pub mod persistence;

pub use accumulator::{DEFAULT_TIME_OFFSET, TemplateAccumulator, TrainingDiagnostics};
pub use collapser::collapse;
pub use function::{TemplateFunction, TemplatePoint};
pub use geometry::TemplateGeometry;
pub use lookup::TemplateLookupTable;

use crate::Real;
use strum::Display;

/// Range of amplitudes a waveform must have to be used for training.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QualityWindow {
    pub min_amplitude: Real,
    pub max_amplitude: Real,
}

impl Default for QualityWindow {
    fn default() -> Self {
        Self {
            min_amplitude: 20.0,
            max_amplitude: 4080.0,
        }
    }
}

impl QualityWindow {
    pub fn check(&self, amplitude: Real) -> Result<(), TrainingRejection> {
        if amplitude < self.min_amplitude {
            Err(TrainingRejection::BelowQuality)
        } else if amplitude > self.max_amplitude {
            Err(TrainingRejection::AboveQuality)
        } else {
            Ok(())
        }
    }
}

/// Reason a waveform was not accumulated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum TrainingRejection {
    BelowQuality,
    AboveQuality,
    /// The waveform is already above half of its maximum at the first sample.
    NoRisingEdge,
    EmptyChannel,
    /// The fit against the existing template did not produce parameters.
    FitFailed,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TrainingOutcome {
    Accepted { amplitude: Real, time: Real },
    Rejected(TrainingRejection),
}

impl TrainingOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, TrainingOutcome::Accepted { .. })
    }
}
