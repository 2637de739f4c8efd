use crate::{
    Real,
    pedestal::Pedestal,
    waveform::{ConditionedWaveform, Sample, Waveform},
};

/// Whether detector pulses register as positive or negative excursions from the baseline.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Polarity {
    #[default]
    Positive,
    Negative,
}

impl Polarity {
    pub fn sign(self) -> Real {
        match self {
            Polarity::Positive => 1.0,
            Polarity::Negative => -1.0,
        }
    }
}

/// Subtracts the pedestal from `raw` and multiplies by the polarity sign.
///
/// Each conditioned sample carries the pedestal RMS as its uncertainty.
/// Without a pedestal the waveform is passed through unchanged and uninverted.
pub fn condition(
    raw: &Waveform,
    pedestal: Option<&Pedestal>,
    polarity: Polarity,
) -> ConditionedWaveform {
    let Some(pedestal) = pedestal else {
        return raw.clone().into();
    };
    let sign = polarity.sign();
    Waveform::from_ordered_samples(
        raw.samples()
            .iter()
            .map(|s| Sample {
                position: s.position,
                value: sign * (s.value - pedestal.mean),
                error: pedestal.rms,
            })
            .collect(),
    )
    .into()
}
