//! Least squares fit of a conditioned waveform against a learned template.
use crate::{
    Real, SENTINEL,
    template::TemplateFunction,
    waveform::{ConditionedWaveform, Sample},
};
use std::fmt::Display;
use strum::Display as StrumDisplay;
use tracing::{debug, instrument, trace};

pub const DEFAULT_MAX_ITERATIONS: usize = 100;

const INITIAL_DAMPING: Real = 1e-3;
const MAX_DAMPING: Real = 1e12;
const MIN_DAMPING: Real = 1e-12;
const RELATIVE_TOLERANCE: Real = 1e-9;

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Hash, StrumDisplay)]
#[strum(serialize_all = "snake_case")]
pub enum FitStatus {
    /// Nothing has been extracted from the current waveform yet.
    #[default]
    Pending,
    Ok,
    /// The iteration limit was reached before the fit settled.
    NotConverged,
    /// Fewer than two samples fall inside both the fit range and the template window.
    InsufficientPoints,
    EmptyChannel,
    /// No threshold crossing was found.
    NoSignal,
}

impl FitStatus {
    /// Whether the amplitude and time of the result come from a completed fit or extraction.
    pub fn has_parameters(self) -> bool {
        matches!(self, FitStatus::Ok | FitStatus::NotConverged)
    }
}

#[derive(Default, Clone, Copy, Debug, PartialEq)]
pub struct FitQuality {
    pub chi2: Real,
    /// Degrees of freedom, the number of points used less the two parameters.
    pub ndf: usize,
    pub iterations: usize,
    pub converged: bool,
}

/// Final amplitude and time of a channel for one event.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitResult {
    pub amplitude: Real,
    pub time: Real,
    pub status: FitStatus,
    /// Present only when a template fit was attempted.
    pub quality: Option<FitQuality>,
}

impl Default for FitResult {
    fn default() -> Self {
        Self {
            amplitude: SENTINEL,
            time: SENTINEL,
            status: FitStatus::default(),
            quality: None,
        }
    }
}

impl FitResult {
    fn with_status(status: FitStatus) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }
}

/// One sample of a fitted waveform alongside the model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TracePoint {
    pub position: Real,
    pub value: Real,
    pub model: Real,
    pub residual: Real,
    /// Excluded from the fit, either outside the fit range or outside the template window.
    pub rejected: bool,
}

impl Display for TracePoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{0},{1},{2},{3},{4}",
            self.position, self.value, self.model, self.residual, self.rejected
        )
    }
}

/// Comparison of a waveform with the fitted model, for inspecting individual fits.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct FitTrace {
    pub points: Vec<TracePoint>,
}

/// Sums over the points of a fit for the current parameters.
#[derive(Default)]
struct NormalEquations {
    chi2: Real,
    used: usize,
    jtj: [[Real; 2]; 2],
    jtr: [Real; 2],
}

#[derive(Clone, Debug)]
pub struct TemplateFitter {
    function: TemplateFunction,
    range: Option<(Real, Real)>,
    max_iterations: usize,
}

impl TemplateFitter {
    /// # Parameters
    /// - function: the template to fit against.
    /// - range: if set, only samples with positions in this inclusive range are fitted.
    /// - max_iterations: upper bound on the number of accepted steps.
    pub fn new(function: TemplateFunction, range: Option<(Real, Real)>, max_iterations: usize) -> Self {
        Self {
            function,
            range,
            max_iterations,
        }
    }

    pub fn function(&self) -> &TemplateFunction {
        &self.function
    }

    fn in_range(&self, position: Real) -> bool {
        self.range
            .is_none_or(|(min, max)| position >= min && position <= max)
    }

    /// Starting parameters, aligning the waveform maximum with the template maximum.
    fn initial_guess(&self, waveform: &ConditionedWaveform) -> Option<[Real; 2]> {
        let (min, max) = self.range.unwrap_or_default();
        let peak = waveform.local_maximum(min, max)?;
        let (template_position, template_value) = self.function.table().peak();
        let scale = if template_value > 0.0 {
            peak.value / template_value
        } else {
            peak.value
        };
        Some([scale, peak.position - template_position])
    }

    fn weight(sample: &Sample) -> Real {
        if sample.error > 0.0 {
            1.0 / (sample.error * sample.error)
        } else {
            1.0
        }
    }

    fn normal_equations(&self, points: &[Sample], [scale, offset]: [Real; 2]) -> NormalEquations {
        let mut sums = NormalEquations::default();
        for sample in points {
            let point = self.function.evaluate(sample.position, scale, offset);
            if point.rejected {
                continue;
            }
            let weight = Self::weight(sample);
            let residual = sample.value - point.value;
            let unscaled = if scale != 0.0 {
                point.value / scale
            } else {
                self.function.lookup(sample.position - offset).value
            };
            let jacobian = [unscaled, -point.slope];

            sums.chi2 += weight * residual * residual;
            sums.used += 1;
            for i in 0..2 {
                sums.jtr[i] += weight * jacobian[i] * residual;
                for j in 0..2 {
                    sums.jtj[i][j] += weight * jacobian[i] * jacobian[j];
                }
            }
        }
        sums
    }

    fn solve(jtj: &[[Real; 2]; 2], jtr: &[Real; 2], damping: Real) -> Option<[Real; 2]> {
        let a = jtj[0][0] + damping * jtj[0][0].max(Real::EPSILON);
        let d = jtj[1][1] + damping * jtj[1][1].max(Real::EPSILON);
        let (b, c) = (jtj[0][1], jtj[1][0]);
        let determinant = a * d - b * c;
        if determinant.abs() < Real::MIN_POSITIVE || !determinant.is_finite() {
            return None;
        }
        Some([
            (d * jtr[0] - b * jtr[1]) / determinant,
            (a * jtr[1] - c * jtr[0]) / determinant,
        ])
    }

    /// Fits `scale · template(position - offset)` to the waveform with a damped Gauss-Newton
    /// (Levenberg-Marquardt) iteration, reporting the scale as the amplitude and the offset as the time.
    #[instrument(skip_all, level = "trace")]
    pub fn fit(&self, waveform: &ConditionedWaveform) -> FitResult {
        if waveform.is_empty() {
            return FitResult::with_status(FitStatus::EmptyChannel);
        }
        let Some(mut parameters) = self.initial_guess(waveform) else {
            return FitResult::with_status(FitStatus::InsufficientPoints);
        };
        let points: Vec<Sample> = waveform
            .samples()
            .iter()
            .filter(|s| self.in_range(s.position))
            .copied()
            .collect();

        let mut current = self.normal_equations(&points, parameters);
        if current.used < 2 {
            debug!("Only {0} points available to fit", current.used);
            return FitResult {
                amplitude: parameters[0],
                time: parameters[1],
                status: FitStatus::InsufficientPoints,
                quality: None,
            };
        }

        let mut damping = INITIAL_DAMPING;
        let mut iterations = 0;
        let mut converged = false;
        while iterations < self.max_iterations && !converged {
            iterations += 1;
            let mut accepted = false;
            while damping <= MAX_DAMPING {
                let Some(step) = Self::solve(&current.jtj, &current.jtr, damping) else {
                    damping *= 10.0;
                    continue;
                };
                let trial = [parameters[0] + step[0], parameters[1] + step[1]];
                let candidate = self.normal_equations(&points, trial);
                if candidate.used >= 2 && candidate.chi2 <= current.chi2 {
                    let improvement = current.chi2 - candidate.chi2;
                    converged = improvement <= RELATIVE_TOLERANCE * current.chi2
                        || (step[0].abs() <= RELATIVE_TOLERANCE * trial[0].abs()
                            && step[1].abs() <= RELATIVE_TOLERANCE);
                    parameters = trial;
                    current = candidate;
                    damping = (damping / 10.0).max(MIN_DAMPING);
                    accepted = true;
                    break;
                }
                damping *= 10.0;
            }
            if !accepted {
                // No step reduces chi squared, so the current parameters are a minimum.
                converged = true;
            }
            trace!("Iteration {iterations}: parameters {parameters:?}, chi2 {0}", current.chi2);
        }

        FitResult {
            amplitude: parameters[0],
            time: parameters[1],
            status: if converged {
                FitStatus::Ok
            } else {
                FitStatus::NotConverged
            },
            quality: Some(FitQuality {
                chi2: current.chi2,
                ndf: current.used.saturating_sub(2),
                iterations,
                converged,
            }),
        }
    }

    /// Evaluates the model of `result` at every sample of `waveform`.
    pub fn trace(&self, waveform: &ConditionedWaveform, result: &FitResult) -> FitTrace {
        let model = self.function.model();
        let parameters = [result.amplitude, result.time];
        FitTrace {
            points: waveform
                .samples()
                .iter()
                .map(|sample| {
                    let value = model(sample.position, parameters);
                    let outside_template =
                        self.function.lookup(sample.position - result.time).rejected;
                    TracePoint {
                        position: sample.position,
                        value: sample.value,
                        model: value,
                        residual: sample.value - value,
                        rejected: outside_template || !self.in_range(sample.position),
                    }
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{template::TemplateLookupTable, waveform::Waveform};
    use assert_approx_eq::assert_approx_eq;
    use std::sync::Arc;

    const SIGMA: Real = 1.5;

    fn shape(t: Real) -> Real {
        (-0.5 * (t / SIGMA).powi(2)).exp()
    }

    /// Gaussian template peaking at relative time 4.
    fn fitter(range: Option<(Real, Real)>) -> TemplateFitter {
        let geometry_begin = -2.0;
        let step = 0.1;
        let means: Vec<Real> = (0..120)
            .map(|i| shape(geometry_begin + i as Real * step - 4.0))
            .collect();
        let table = TemplateLookupTable::new(-2.0, 9.9, means, vec![0.0; 120]).unwrap();
        TemplateFitter::new(
            TemplateFunction::new(Arc::new(table)),
            range,
            DEFAULT_MAX_ITERATIONS,
        )
    }

    fn pulse(amplitude: Real, centre: Real) -> ConditionedWaveform {
        let values: Vec<Real> = (0..31)
            .map(|i| amplitude * shape(i as Real - centre))
            .collect();
        Waveform::from_values(&values).into()
    }

    #[test]
    fn recovers_amplitude_and_time() {
        let result = fitter(None).fit(&pulse(800.0, 13.37));
        assert_eq!(result.status, FitStatus::Ok);
        assert!((result.amplitude - 800.0).abs() < 4.0);
        assert!((result.time - 9.37).abs() < 0.02);
        let quality = result.quality.unwrap();
        assert!(quality.converged);
        assert!(quality.ndf > 0);
        assert!(quality.iterations <= DEFAULT_MAX_ITERATIONS);
    }

    #[test]
    fn respects_fit_range() {
        let fitter = fitter(Some((8.0, 18.0)));
        let result = fitter.fit(&pulse(500.0, 12.6));
        assert_eq!(result.status, FitStatus::Ok);
        assert!((result.time - 8.6).abs() < 0.02);
        let trace = fitter.trace(&pulse(500.0, 12.6), &result);
        assert_eq!(trace.points.len(), 31);
        assert!(trace.points[0].rejected);
        assert!(!trace.points[12].rejected);
        assert!(trace.points[12].residual.abs() < 5.0);
    }

    #[test]
    fn trace_follows_fitted_model() {
        let fitter = fitter(None);
        let waveform = pulse(800.0, 13.37);
        let result = fitter.fit(&waveform);
        let model = fitter.function().model();
        let trace = fitter.trace(&waveform, &result);
        for point in &trace.points {
            let expected = model(point.position, [result.amplitude, result.time]);
            assert_approx_eq!(point.model, expected);
            assert_approx_eq!(point.residual, point.value - expected);
        }
        // The template window covers [time - 2, time + 9.9).
        assert!(trace.points[0].rejected);
        assert!(!trace.points[13].rejected);
        assert!(trace.points[25].rejected);
        assert!(trace.points[13].residual.abs() < 5.0);
    }

    #[test]
    fn empty_channel() {
        let result = fitter(None).fit(&ConditionedWaveform::default());
        assert_eq!(result.status, FitStatus::EmptyChannel);
        assert_eq!(result.amplitude, SENTINEL);
        assert_eq!(result.time, SENTINEL);
    }

    #[test]
    fn insufficient_points() {
        let waveform: ConditionedWaveform = Waveform::from_values(&[0.0, 10.0]).into();
        let result = fitter(Some((1.0, 1.0))).fit(&waveform);
        assert_eq!(result.status, FitStatus::InsufficientPoints);
        assert!(!result.status.has_parameters());
    }

    #[test]
    fn trace_point_csv() {
        let point = TracePoint {
            position: 1.0,
            value: 2.0,
            model: 1.5,
            residual: 0.5,
            rejected: false,
        };
        assert_eq!(point.to_string(), "1,2,1.5,0.5,false");
    }

    #[test]
    fn default_result_is_sentinel() {
        let result = FitResult::default();
        assert_approx_eq!(result.amplitude, SENTINEL);
        assert_eq!(result.status, FitStatus::Pending);
    }
}
