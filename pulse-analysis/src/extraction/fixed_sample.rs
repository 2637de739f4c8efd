use super::{Amplitude, Extraction};
use crate::{error::ExtractionError, waveform::Waveform};

/// Reads the value of sample `index` as the time, with the waveform maximum as a fallback amplitude.
pub(super) fn readout(waveform: &Waveform, index: usize) -> Result<Extraction, ExtractionError> {
    let maximum = waveform.max_value().ok_or(ExtractionError::EmptyChannel)?;
    let sample = waveform
        .samples()
        .get(index)
        .ok_or(ExtractionError::SampleOutOfRange {
            index,
            len: waveform.len(),
        })?;
    Ok(Extraction {
        amplitude: Amplitude::Fallback(maximum),
        time: Some(sample.value),
        ..Default::default()
    })
}
