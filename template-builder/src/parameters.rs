//! Defines the command line parameters of the template builder.
use anyhow::{Error, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use pulsecal_analysis::{
    ExtractionStrategy, Pedestal, PedestalWindow, QualityWindow, Real, TemplateGeometry,
    extraction::DEFAULT_SPLINE_STEP,
};
use std::{path::PathBuf, str::FromStr};

fn split_fields<'a>(s: &'a str, expected: usize, pattern: &str) -> Result<Vec<&'a str>, Error> {
    let vals: Vec<_> = s.split(',').map(str::trim).collect();
    if vals.len() == expected {
        Ok(vals)
    } else {
        Err(anyhow!(
            "Incorrect number of parameters, expected pattern '{pattern}', got '{s}'"
        ))
    }
}

/// Defines the polarity of the signal, i.e. whether pulses cause positive or negative signals.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub(crate) enum Polarity {
    /// Pulses register as positive signals.
    #[default]
    Positive,
    /// Pulses register as negative signals, and are inverted before analysis.
    Negative,
}

impl From<Polarity> for pulsecal_analysis::Polarity {
    fn from(polarity: Polarity) -> Self {
        match polarity {
            Polarity::Positive => Self::Positive,
            Polarity::Negative => Self::Negative,
        }
    }
}

/// Window over which the pedestal of each event is estimated,
/// either `samples:<first>,<last>` or `positions:<begin>,<end>`. Both bounds are inclusive.
#[derive(Debug, Clone)]
pub(crate) struct PedestalWindowWrapper(pub(crate) PedestalWindow);

impl FromStr for PedestalWindowWrapper {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, bounds) = s
            .split_once(':')
            .ok_or_else(|| anyhow!("Expected 'samples:*,*' or 'positions:*,*', got '{s}'"))?;
        let vals = split_fields(bounds, 2, "*,*")?;
        let window = match kind {
            "samples" => PedestalWindow::Samples {
                first: usize::from_str(vals[0])?,
                last: usize::from_str(vals[1])?,
            },
            "positions" => PedestalWindow::Positions {
                begin: Real::from_str(vals[0])?,
                end: Real::from_str(vals[1])?,
            },
            other => return Err(anyhow!("Unknown pedestal window kind '{other}'")),
        };
        Ok(PedestalWindowWrapper(window))
    }
}

/// Pedestal supplied from outside as `<mean>,<rms>`.
#[derive(Debug, Clone)]
pub(crate) struct FixedPedestalWrapper(pub(crate) Pedestal);

impl FromStr for FixedPedestalWrapper {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let vals = split_fields(s, 2, "*,*")?;
        Ok(FixedPedestalWrapper(Pedestal::fixed(
            Real::from_str(vals[0])?,
            Real::from_str(vals[1])?,
        )))
    }
}

/// Inclusive range of positions, as `<begin>,<end>`.
#[derive(Debug, Clone)]
pub(crate) struct RangeWrapper(pub(crate) (Real, Real));

impl FromStr for RangeWrapper {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let vals = split_fields(s, 2, "*,*")?;
        let range = (Real::from_str(vals[0])?, Real::from_str(vals[1])?);
        if range.0 > range.1 {
            return Err(anyhow!("Range begins after it ends: '{s}'"));
        }
        Ok(RangeWrapper(range))
    }
}

/// Amplitudes accepted for training, as `<min>,<max>`.
#[derive(Debug, Clone)]
pub(crate) struct QualityWindowWrapper(pub(crate) QualityWindow);

impl FromStr for QualityWindowWrapper {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let RangeWrapper((min_amplitude, max_amplitude)) = RangeWrapper::from_str(s)?;
        Ok(QualityWindowWrapper(QualityWindow {
            min_amplitude,
            max_amplitude,
        }))
    }
}

/// Template layout, as `<time points>,<value bins>,<begin>,<end>`.
#[derive(Debug, Clone)]
pub(crate) struct GeometryWrapper(pub(crate) TemplateGeometry);

impl FromStr for GeometryWrapper {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let vals = split_fields(s, 4, "*,*,*,*")?;
        let geometry = TemplateGeometry {
            num_time_points: usize::from_str(vals[0])?,
            num_value_bins: usize::from_str(vals[1])?,
            begin: Real::from_str(vals[2])?,
            end: Real::from_str(vals[3])?,
        };
        geometry.validate()?;
        Ok(GeometryWrapper(geometry))
    }
}

/// Extraction strategy, one of `spline-peak[:<step>]`, `leading-edge:<threshold>`,
/// `constant-fraction:<fraction>` or `fixed-sample:<index>`.
#[derive(Debug, Clone)]
pub(crate) struct StrategyWrapper(pub(crate) ExtractionStrategy);

impl FromStr for StrategyWrapper {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, value) = match s.split_once(':') {
            Some((kind, value)) => (kind, Some(value.trim())),
            None => (s, None),
        };
        let required = || value.ok_or_else(|| anyhow!("Strategy '{kind}' requires a value"));
        let strategy = match kind {
            "spline-peak" => {
                let step = value
                    .map(Real::from_str)
                    .transpose()?
                    .unwrap_or(DEFAULT_SPLINE_STEP);
                if !(step > 0.0) {
                    return Err(anyhow!("Spline step must be positive, got '{step}'"));
                }
                ExtractionStrategy::SplinePeak { step }
            }
            "leading-edge" => ExtractionStrategy::LeadingEdge {
                threshold: Real::from_str(required()?)?,
            },
            "constant-fraction" => ExtractionStrategy::ConstantFraction {
                fraction: Real::from_str(required()?)?,
            },
            "fixed-sample" => ExtractionStrategy::FixedSample {
                index: usize::from_str(required()?)?,
            },
            other => return Err(anyhow!("Unknown extraction strategy '{other}'")),
        };
        Ok(StrategyWrapper(strategy))
    }
}

/// Encapsulates the parameters of template building.
#[derive(Debug, Clone, Parser)]
pub(crate) struct BuildParameters {
    /// File to write the template means to.
    #[clap(long)]
    pub(crate) means: PathBuf,

    /// File to write the template errors to.
    #[clap(long)]
    pub(crate) errors: PathBuf,

    /// Number of passes which retrain against the template of the previous pass.
    #[clap(long, default_value = "1")]
    pub(crate) refinement_passes: usize,
}

/// Encapsulates the parameters of template fitting.
#[derive(Debug, Clone, Parser)]
pub(crate) struct FitParameters {
    /// File holding the template means, one record per channel in increasing channel order.
    #[clap(long)]
    pub(crate) means: PathBuf,

    /// File holding the template errors, one record per channel in increasing channel order.
    #[clap(long)]
    pub(crate) errors: PathBuf,

    /// CSV file to write the results to.
    #[clap(long)]
    pub(crate) output: PathBuf,
}

/// Encapsulates the parameters of a single extraction strategy.
#[derive(Debug, Clone, Parser)]
pub(crate) struct ExtractParameters {
    #[clap(long, default_value = "spline-peak")]
    pub(crate) strategy: StrategyWrapper,

    /// CSV file to write the results to.
    #[clap(long)]
    pub(crate) output: PathBuf,
}

/// Specifies what to do with the waveforms, and wraps the mode-specific options in each variant.
#[derive(Subcommand, Debug)]
pub(crate) enum Mode {
    /// Learns a template for each channel and writes them to file.
    Build(BuildParameters),
    /// Fits each waveform against the template of its channel.
    Fit(FitParameters),
    /// Measures each waveform with one of the template-free extraction strategies.
    Extract(ExtractParameters),
}
