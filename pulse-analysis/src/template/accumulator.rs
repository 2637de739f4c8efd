use super::{
    QualityWindow, TemplateGeometry, TemplateLookupTable, TrainingOutcome, TrainingRejection,
    collapser,
};
use crate::{
    Real,
    error::TemplateError,
    extraction::scan_spline,
    fitter::FitResult,
    histogram::Histogram1D,
    waveform::ConditionedWaveform,
};
use ndarray::Array2;
use std::collections::BTreeMap;
use tracing::trace;

/// Shift subtracted from half maximum times found by the spline, so the
/// rising edge of the learned template sits inside the template window.
pub const DEFAULT_TIME_OFFSET: Real = 4.0;

const AMPLITUDE_BINS: usize = 17100;
const AMPLITUDE_LOW: Real = -100.0;
const AMPLITUDE_HIGH: Real = 17000.0;
const TIME_BINS_PER_SAMPLE: usize = 100;

/// Distributions and counts of the waveforms offered for training.
#[derive(Clone, Debug)]
pub struct TrainingDiagnostics {
    amplitudes: Histogram1D,
    times: Option<Histogram1D>,
    accepted: usize,
    rejected: BTreeMap<TrainingRejection, usize>,
}

impl Default for TrainingDiagnostics {
    fn default() -> Self {
        Self {
            amplitudes: Histogram1D::new(AMPLITUDE_BINS, AMPLITUDE_LOW, AMPLITUDE_HIGH),
            times: None,
            accepted: 0,
            rejected: BTreeMap::new(),
        }
    }
}

impl TrainingDiagnostics {
    fn record(&mut self, waveform: &ConditionedWaveform, outcome: &TrainingOutcome) {
        match *outcome {
            TrainingOutcome::Accepted { amplitude, time } => {
                self.accepted += 1;
                self.amplitudes.fill(amplitude);
                self.times
                    .get_or_insert_with(|| Self::time_histogram(waveform))
                    .fill(time);
            }
            TrainingOutcome::Rejected(reason) => {
                *self.rejected.entry(reason).or_default() += 1;
            }
        }
    }

    /// Covers the sample positions of the first accepted waveform.
    fn time_histogram(waveform: &ConditionedWaveform) -> Histogram1D {
        let first = waveform.first_position().unwrap_or_default();
        let last = waveform.last_position().unwrap_or_default();
        let num_samples = waveform.len().max(2);
        let spacing = (last - first) / (num_samples - 1) as Real;
        let high = if spacing > 0.0 { last + spacing } else { first + 1.0 };
        Histogram1D::new(num_samples * TIME_BINS_PER_SAMPLE, first, high)
    }

    /// Amplitudes of accepted waveforms.
    pub fn amplitudes(&self) -> &Histogram1D {
        &self.amplitudes
    }

    /// Reference times of accepted waveforms, `None` until one has been accepted.
    pub fn times(&self) -> Option<&Histogram1D> {
        self.times.as_ref()
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn rejected(&self, reason: TrainingRejection) -> usize {
        self.rejected.get(&reason).copied().unwrap_or_default()
    }

    pub fn total_rejected(&self) -> usize {
        self.rejected.values().sum()
    }
}

/// Two dimensional histogram of normalised waveform values against time relative to each pulse.
#[derive(Clone, Debug)]
pub struct TemplateAccumulator {
    geometry: TemplateGeometry,
    quality: QualityWindow,
    time_offset: Real,
    /// Indexed by `[time_bin, value_bin]`.
    counts: Array2<Real>,
    diagnostics: TrainingDiagnostics,
}

impl TemplateAccumulator {
    /// # Parameters
    /// - geometry: must be valid, see [TemplateGeometry::validate].
    /// - quality: amplitudes outside this window are rejected.
    /// - time_offset: subtracted from the reference time of bootstrap training.
    pub fn new(
        geometry: TemplateGeometry,
        quality: QualityWindow,
        time_offset: Real,
    ) -> Result<Self, TemplateError> {
        geometry.validate()?;
        Ok(Self {
            geometry,
            quality,
            time_offset,
            counts: Array2::zeros((geometry.num_time_points, geometry.num_value_bins)),
            diagnostics: TrainingDiagnostics::default(),
        })
    }

    pub fn geometry(&self) -> &TemplateGeometry {
        &self.geometry
    }

    pub fn counts(&self) -> &Array2<Real> {
        &self.counts
    }

    pub fn diagnostics(&self) -> &TrainingDiagnostics {
        &self.diagnostics
    }

    /// Trains on a waveform without an existing template.
    ///
    /// The amplitude is the maximum of a spline through the samples, and the reference time
    /// is the spline's half maximum crossing on the rising edge, less the time offset.
    pub fn train_bootstrap(&mut self, waveform: &ConditionedWaveform) -> TrainingOutcome {
        let outcome = match self.bootstrap_estimate(waveform) {
            Ok((amplitude, time)) => self.accumulate(waveform, amplitude, time - self.time_offset),
            Err(reason) => TrainingOutcome::Rejected(reason),
        };
        self.diagnostics.record(waveform, &outcome);
        outcome
    }

    fn bootstrap_estimate(
        &self,
        waveform: &ConditionedWaveform,
    ) -> Result<(Real, Real), TrainingRejection> {
        let maximum = waveform
            .max_value()
            .ok_or(TrainingRejection::EmptyChannel)?;
        if maximum < self.quality.min_amplitude {
            return Err(TrainingRejection::BelowQuality);
        }
        let scan = scan_spline(waveform, self.geometry.time_step())
            .ok_or(TrainingRejection::EmptyChannel)?;
        self.quality.check(scan.amplitude)?;
        let time = scan
            .half_maximum_time
            .ok_or(TrainingRejection::NoRisingEdge)?;
        Ok((scan.amplitude, time))
    }

    /// Trains on a waveform using the parameters of its fit against an existing template.
    pub fn train_refined(&mut self, waveform: &ConditionedWaveform, fit: &FitResult) -> TrainingOutcome {
        let outcome = if waveform.is_empty() {
            TrainingOutcome::Rejected(TrainingRejection::EmptyChannel)
        } else if !fit.status.has_parameters() {
            TrainingOutcome::Rejected(TrainingRejection::FitFailed)
        } else {
            match self.quality.check(fit.amplitude) {
                Ok(()) => self.accumulate(waveform, fit.amplitude, fit.time),
                Err(reason) => TrainingOutcome::Rejected(reason),
            }
        };
        self.diagnostics.record(waveform, &outcome);
        outcome
    }

    fn accumulate(&mut self, waveform: &ConditionedWaveform, amplitude: Real, time: Real) -> TrainingOutcome {
        trace!("Accumulating waveform with amplitude {amplitude} at {time}");
        for sample in waveform.samples() {
            let relative_time = sample.position - time;
            let normalised = if amplitude != 0.0 {
                sample.value / amplitude
            } else {
                0.0
            };
            if let (Some(t), Some(v)) = (
                self.geometry.time_bin(relative_time),
                self.geometry.value_bin(normalised),
            ) {
                self.counts[[t, v]] += 1.0;
            }
        }
        TrainingOutcome::Accepted { amplitude, time }
    }

    /// Reduces the accumulated histogram to a lookup table.
    pub fn collapse(&self) -> Result<TemplateLookupTable, TemplateError> {
        collapser::collapse(&self.counts, &self.geometry)
    }

    /// Discards everything accumulated, ready for another training pass.
    pub fn reset(&mut self) {
        self.counts.fill(0.0);
        self.diagnostics = TrainingDiagnostics::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fitter::FitStatus, waveform::Waveform};
    use assert_approx_eq::assert_approx_eq;

    fn accumulator() -> TemplateAccumulator {
        TemplateAccumulator::new(
            TemplateGeometry::default(),
            QualityWindow::default(),
            DEFAULT_TIME_OFFSET,
        )
        .unwrap()
    }

    fn gaussian(amplitude: Real, centre: Real) -> ConditionedWaveform {
        let values: Vec<Real> = (0..31)
            .map(|i| amplitude * (-0.5 * ((i as Real - centre) / 1.5).powi(2)).exp())
            .collect();
        Waveform::from_values(&values).into()
    }

    #[test]
    fn rejects_outside_quality_window() {
        let mut accumulator = accumulator();
        assert_eq!(
            accumulator.train_bootstrap(&gaussian(10.0, 12.0)),
            TrainingOutcome::Rejected(TrainingRejection::BelowQuality)
        );
        assert_eq!(
            accumulator.train_bootstrap(&gaussian(5000.0, 12.0)),
            TrainingOutcome::Rejected(TrainingRejection::AboveQuality)
        );
        assert_eq!(
            accumulator.train_bootstrap(&ConditionedWaveform::default()),
            TrainingOutcome::Rejected(TrainingRejection::EmptyChannel)
        );
        assert_eq!(accumulator.counts().sum(), 0.0);
        assert_eq!(accumulator.diagnostics().total_rejected(), 3);
        assert_eq!(accumulator.diagnostics().rejected(TrainingRejection::AboveQuality), 1);
    }

    #[test]
    fn rejects_without_rising_edge() {
        let mut accumulator = accumulator();
        let mut values = vec![0.0; 31];
        values[0] = 100.0;
        values[1] = 50.0;
        let waveform: ConditionedWaveform = Waveform::from_values(&values).into();
        assert_eq!(
            accumulator.train_bootstrap(&waveform),
            TrainingOutcome::Rejected(TrainingRejection::NoRisingEdge)
        );
    }

    #[test]
    fn bootstrap_accepts_and_recentres() {
        let mut accumulator = accumulator();
        let outcome = accumulator.train_bootstrap(&gaussian(1000.0, 12.0));
        assert!(outcome.is_accepted(), "{outcome:?}");
        let TrainingOutcome::Accepted { amplitude, time } = outcome else {
            unreachable!()
        };
        assert!((amplitude - 1000.0).abs() < 10.0);
        let half_width = 1.5 * (2.0 * std::f64::consts::LN_2).sqrt();
        assert!((time - (12.0 - half_width - DEFAULT_TIME_OFFSET)).abs() < 0.05);
        assert_eq!(accumulator.diagnostics().accepted(), 1);
        assert_approx_eq!(accumulator.diagnostics().amplitudes().mean(), amplitude);
        // Samples at relative times beyond the window are dropped.
        let filled = accumulator.counts().sum();
        assert!(filled > 0.0 && filled < 31.0);
    }

    #[test]
    fn refined_training_uses_fit_time() {
        let mut accumulator = accumulator();
        let fit = FitResult {
            amplitude: 1000.0,
            time: 10.0,
            status: FitStatus::Ok,
            quality: None,
        };
        let outcome = accumulator.train_refined(&gaussian(1000.0, 12.0), &fit);
        assert_eq!(
            outcome,
            TrainingOutcome::Accepted {
                amplitude: 1000.0,
                time: 10.0
            }
        );
        // Sample 12 lands at relative time 2 with normalised value 1.
        let t = accumulator.geometry().time_bin(2.0).unwrap();
        let v = accumulator.geometry().value_bin(1.0).unwrap();
        assert_eq!(accumulator.counts()[[t, v]], 1.0);
    }

    #[test]
    fn refined_training_rejects_failed_fit() {
        let mut accumulator = accumulator();
        let outcome = accumulator.train_refined(&gaussian(1000.0, 12.0), &FitResult::default());
        assert_eq!(outcome, TrainingOutcome::Rejected(TrainingRejection::FitFailed));
    }

    #[test]
    fn reset_clears_counts() {
        let mut accumulator = accumulator();
        accumulator.train_bootstrap(&gaussian(1000.0, 12.0));
        accumulator.reset();
        assert_eq!(accumulator.counts().sum(), 0.0);
        assert_eq!(accumulator.diagnostics().accepted(), 0);
    }
}
