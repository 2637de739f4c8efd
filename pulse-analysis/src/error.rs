use crate::{ChannelId, Real};
use std::num::{ParseFloatError, ParseIntError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WaveformError {
    #[error("Positions and values have different lengths: {positions} != {values}")]
    LengthMismatch { positions: usize, values: usize },
    #[error("Positions must be strictly increasing, but {next} follows {previous} at sample {index}")]
    NonMonotonicPositions {
        index: usize,
        previous: Real,
        next: Real,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum ExtractionError {
    #[error("Channel is empty")]
    EmptyChannel,
    #[error("Sample {index} is out of range for a waveform of {len} samples")]
    SampleOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("IO Error: {0}")]
    IO(#[from] std::io::Error),
    #[error("Template file ended before a record for channel {0} was found")]
    MissingRecord(ChannelId),
    #[error("Template file truncated: expected {expected} values, found {found}")]
    Truncated { expected: usize, found: usize },
    #[error("Invalid Integer in Template Header: {0}")]
    ParseInt(#[from] ParseIntError),
    #[error("Invalid Float in Template File: {0}")]
    ParseFloat(#[from] ParseFloatError),
    #[error("Template Header Malformed: '{0}'")]
    MalformedHeader(String),
    #[error("Template channel is {found} but should be {expected}")]
    IdentityMismatch {
        expected: ChannelId,
        found: ChannelId,
    },
    #[error("Error record header {errors:?} does not match shape record header {means:?}")]
    InconsistentHeaders {
        means: (ChannelId, usize, Real, Real),
        errors: (ChannelId, usize, Real, Real),
    },
    #[error("Template must have at least 2 points, got {0}")]
    TooFewPoints(usize),
    #[error("Template window must satisfy begin < end, got [{begin}, {end})")]
    InvalidWindow { begin: Real, end: Real },
    #[error("Template means and errors have different lengths: {means} != {errors}")]
    LengthMismatch { means: usize, errors: usize },
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel {channel} expects {expected} samples, got {found}")]
    SampleCountMismatch {
        channel: ChannelId,
        expected: usize,
        found: usize,
    },
    #[error("Channel {0} has no waveform set")]
    NoWaveform(ChannelId),
    #[error("Channel {0} has no samples in its pedestal window")]
    NoPedestal(ChannelId),
    #[error("Channel {0} has no template loaded")]
    NoTemplate(ChannelId),
    #[error("{0}")]
    Extraction(#[from] ExtractionError),
    #[error("{0}")]
    Template(#[from] TemplateError),
}
