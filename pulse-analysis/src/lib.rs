//! Per-channel pulse analysis and template learning for digitised detector traces.
//!
//! A channel's raw trace is conditioned (pedestal subtracted and, if required, inverted)
//! before any amplitude or time is extracted from it. During a calibration run, many
//! clean pulses are normalised and accumulated into a two dimensional histogram, which is
//! collapsed into a lookup table (the pulse "template"). In production, each conditioned
//! trace is fitted against the template to recover sub-sample amplitude and timing.
//!
//! Typical usage may look like:
//! ```rust
//! use pulsecal_analysis::{Channel, ChannelConfig, Waveform};
//!
//! let mut channel = Channel::new(ChannelConfig::new(0, 31)).unwrap();
//! channel.set_waveform(Waveform::from_values(&[0.0; 31])).unwrap();
//! let outcome = channel.train().unwrap();
//! assert!(!outcome.is_accepted());
//! ```

pub mod channel;
pub mod conditioner;
pub mod error;
pub mod extraction;
pub mod fitter;
pub mod histogram;
pub mod pedestal;
pub mod spline;
pub mod template;
pub mod waveform;

pub use channel::{Channel, ChannelConfig};
pub use conditioner::{Polarity, condition};
pub use error::{ChannelError, ExtractionError, TemplateError, WaveformError};
pub use extraction::{Amplitude, Extraction, ExtractionStatus, ExtractionStrategy};
pub use fitter::{FitQuality, FitResult, FitStatus, FitTrace, TemplateFitter, TracePoint};
pub use pedestal::{Pedestal, PedestalEstimator, PedestalMode, PedestalWindow};
pub use template::{
    QualityWindow, TemplateAccumulator, TemplateFunction, TemplateGeometry, TemplateLookupTable,
    TrainingOutcome, TrainingRejection,
};
pub use waveform::{ConditionedWaveform, Sample, Waveform};

/// Floating point type used for all positions and amplitudes.
pub type Real = f64;

/// Channel identifier, as written in template files.
pub type ChannelId = u32;

/// Reserved value signalling "no valid measurement" in amplitudes and times handed to the host.
pub const SENTINEL: Real = -9999.0;
