//! Per-event, per-channel sample sequences.
use crate::{Real, error::WaveformError};
use std::{fmt::Display, ops::Deref};

/// A single digitised sample.
#[derive(Default, Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    /// Sample index or calibrated time.
    pub position: Real,
    pub value: Real,
    /// Uncertainty on `value`, zero for raw samples.
    pub error: Real,
}

impl Sample {
    pub fn new(position: Real, value: Real) -> Self {
        Self {
            position,
            value,
            error: Real::default(),
        }
    }
}

impl Display for Sample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{0},{1},{2}", self.position, self.value, self.error)
    }
}

/// An ordered sequence of samples whose positions are strictly increasing.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct Waveform {
    samples: Vec<Sample>,
}

impl Waveform {
    /// Creates a waveform whose positions are the sample indices.
    pub fn from_values(values: &[Real]) -> Self {
        Self {
            samples: values
                .iter()
                .enumerate()
                .map(|(i, &v)| Sample::new(i as Real, v))
                .collect(),
        }
    }

    /// Creates a waveform with calibrated positions.
    /// # Parameters
    /// - positions: must be strictly increasing.
    /// - values: must have the same length as `positions`.
    pub fn from_positions(positions: &[Real], values: &[Real]) -> Result<Self, WaveformError> {
        if positions.len() != values.len() {
            return Err(WaveformError::LengthMismatch {
                positions: positions.len(),
                values: values.len(),
            });
        }
        for (index, pair) in positions.windows(2).enumerate() {
            if let [previous, next] = *pair {
                // Written to also catch NaN positions.
                if !(next > previous) {
                    return Err(WaveformError::NonMonotonicPositions {
                        index: index + 1,
                        previous,
                        next,
                    });
                }
            }
        }
        Ok(Self {
            samples: positions
                .iter()
                .zip(values)
                .map(|(&p, &v)| Sample::new(p, v))
                .collect(),
        })
    }

    /// Builds a waveform from samples already known to be ordered, e.g. derived from another waveform.
    pub(crate) fn from_ordered_samples(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn positions(&self) -> impl Iterator<Item = Real> + '_ {
        self.samples.iter().map(|s| s.position)
    }

    pub fn values(&self) -> impl Iterator<Item = Real> + '_ {
        self.samples.iter().map(|s| s.value)
    }

    pub fn first_position(&self) -> Option<Real> {
        self.samples.first().map(|s| s.position)
    }

    pub fn last_position(&self) -> Option<Real> {
        self.samples.last().map(|s| s.position)
    }

    /// The largest sample value, or `None` if the waveform is empty.
    pub fn max_value(&self) -> Option<Real> {
        self.values().reduce(Real::max)
    }

    /// Finds the first sample holding the maximum value within `[xmin, xmax]`.
    /// If `xmax <= xmin` the whole waveform is searched.
    pub fn local_maximum(&self, xmin: Real, xmax: Real) -> Option<Sample> {
        self.local_extremum(xmin, xmax, |candidate, best| candidate > best)
    }

    /// Finds the first sample holding the minimum value within `[xmin, xmax]`.
    /// If `xmax <= xmin` the whole waveform is searched.
    pub fn local_minimum(&self, xmin: Real, xmax: Real) -> Option<Sample> {
        self.local_extremum(xmin, xmax, |candidate, best| candidate < best)
    }

    fn local_extremum<F>(&self, xmin: Real, xmax: Real, better: F) -> Option<Sample>
    where
        F: Fn(Real, Real) -> bool,
    {
        let (xmin, xmax) = if xmax <= xmin {
            (Real::MIN, Real::MAX)
        } else {
            (xmin, xmax)
        };
        self.samples
            .iter()
            .skip_while(|s| s.position < xmin)
            .take_while(|s| s.position <= xmax)
            .fold(None, |best: Option<&Sample>, s| match best {
                Some(b) if !better(s.value, b.value) => Some(b),
                _ => Some(s),
            })
            .copied()
    }

    /// Trapezoid-weighted sum of the samples whose position lies in `[xmin, xmax]`.
    ///
    /// Each sample is weighted by half the distance between its neighbours.
    /// The first and last samples of the waveform only have one neighbour, and are
    /// weighted by half the distance to it.
    pub fn integral(&self, xmin: Real, xmax: Real) -> Real {
        self.samples
            .iter()
            .enumerate()
            .filter(|(_, s)| s.position >= xmin && s.position <= xmax)
            .map(|(i, s)| s.value * self.local_width(i))
            .sum()
    }

    fn local_width(&self, index: usize) -> Real {
        let here = self.samples.get(index).map(|s| s.position);
        let previous = index
            .checked_sub(1)
            .and_then(|i| self.samples.get(i))
            .map(|s| s.position);
        let next = self.samples.get(index + 1).map(|s| s.position);
        match (previous.or(here), next.or(here)) {
            (Some(previous), Some(next)) => (next - previous) / 2.0,
            _ => Real::default(),
        }
    }
}

/// The pedestal-subtracted, sign-corrected waveform consumed by every extraction algorithm.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct ConditionedWaveform(Waveform);

impl ConditionedWaveform {
    pub fn into_inner(self) -> Waveform {
        self.0
    }
}

impl From<Waveform> for ConditionedWaveform {
    fn from(waveform: Waveform) -> Self {
        Self(waveform)
    }
}

impl Deref for ConditionedWaveform {
    type Target = Waveform;

    fn deref(&self) -> &Waveform {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn rejects_non_increasing_positions() {
        let result = Waveform::from_positions(&[0.0, 1.0, 1.0], &[1.0, 2.0, 3.0]);
        assert!(matches!(
            result,
            Err(WaveformError::NonMonotonicPositions { index: 2, .. })
        ));
    }

    #[test]
    fn rejects_length_mismatch() {
        let result = Waveform::from_positions(&[0.0, 1.0], &[1.0]);
        assert!(matches!(result, Err(WaveformError::LengthMismatch { .. })));
    }

    #[test]
    fn local_maximum_ties_take_first() {
        let waveform = Waveform::from_values(&[1.0, 5.0, 2.0, 5.0, 0.0]);
        let peak = waveform.local_maximum(0.0, 0.0).unwrap();
        assert_eq!(peak.position, 1.0);
        assert_eq!(peak.value, 5.0);
    }

    #[test]
    fn local_maximum_within_range() {
        let waveform = Waveform::from_values(&[1.0, 5.0, 2.0, 4.0, 0.0, 9.0]);
        let peak = waveform.local_maximum(2.0, 4.0).unwrap();
        assert_eq!(peak.position, 3.0);
        assert_eq!(peak.value, 4.0);
    }

    #[test]
    fn local_minimum_flipped_range_searches_everything() {
        let waveform = Waveform::from_values(&[1.0, -5.0, 2.0, -7.0, 0.0]);
        let nadir = waveform.local_minimum(4.0, 1.0).unwrap();
        assert_eq!(nadir.position, 3.0);
        assert_eq!(nadir.value, -7.0);
    }

    #[test]
    fn local_maximum_of_empty_waveform() {
        assert_eq!(Waveform::default().local_maximum(0.0, 0.0), None);
    }

    #[test]
    fn integral_of_rectangle_spanning_waveform() {
        let waveform = Waveform::from_values(&[1.0; 11]);
        assert_approx_eq!(waveform.integral(0.0, 10.0), 10.0);
    }

    #[test]
    fn integral_of_interior_rectangle() {
        let mut values = vec![0.0; 20];
        values[5..=12].iter_mut().for_each(|v| *v = 1.0);
        let waveform = Waveform::from_values(&values);
        // Interior samples carry a full width each, so the result is within one step of the range.
        let integral = waveform.integral(5.0, 12.0);
        assert!((integral - 7.0).abs() <= 1.0);
    }

    #[test]
    fn integral_with_uneven_positions() {
        let waveform =
            Waveform::from_positions(&[0.0, 1.0, 3.0, 4.0], &[2.0, 2.0, 2.0, 2.0]).unwrap();
        // widths: 0.5, 1.5, 1.5, 0.5
        assert_approx_eq!(waveform.integral(0.0, 4.0), 8.0);
        assert_approx_eq!(waveform.integral(1.0, 3.0), 6.0);
    }
}
