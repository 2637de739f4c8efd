use super::{Amplitude, Extraction, ExtractionStatus};
use crate::{Real, waveform::Waveform};

/// Finds the first sample above `threshold` whose successor is also above it and whose
/// predecessor is at or below it, and interpolates linearly against the predecessor to
/// find the crossing time.
///
/// The first sample has no predecessor, and the last has no successor, so neither can be
/// the crossing sample. A waveform that starts above threshold has no crossing until it
/// has fallen back to or below it.
pub fn threshold_crossing(waveform: &Waveform, threshold: Real) -> Option<Real> {
    waveform
        .samples()
        .windows(3)
        .find_map(|window| match *window {
            [previous, crossing, next]
                if previous.value <= threshold
                    && crossing.value > threshold
                    && next.value > threshold =>
            {
                let dx = crossing.position - previous.position;
                let dy = crossing.value - previous.value;
                Some(crossing.position - (crossing.value - threshold) * dx / dy)
            }
            _ => None,
        })
}

pub(super) fn leading_edge(waveform: &Waveform, threshold: Real) -> Extraction {
    match threshold_crossing(waveform, threshold) {
        Some(time) => Extraction {
            time: Some(time),
            ..Default::default()
        },
        None => Extraction {
            status: ExtractionStatus::NoSignal,
            ..Default::default()
        },
    }
}

/// Returns `None` if the waveform is empty.
pub(super) fn constant_fraction(waveform: &Waveform, fraction: Real) -> Option<Extraction> {
    let maximum = waveform.max_value()?;
    let mut extraction = leading_edge(waveform, fraction * maximum);
    extraction.amplitude = Amplitude::Fallback(maximum);
    Some(extraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn crossing_on_last_sample_is_ignored() {
        let waveform = Waveform::from_values(&[0.0, 0.0, 0.0, 0.0, 10.0]);
        assert_eq!(threshold_crossing(&waveform, 5.0), None);
    }

    #[test]
    fn single_sample_spike_is_ignored() {
        let waveform = Waveform::from_values(&[0.0, 10.0, 0.0, 0.0, 8.0, 9.0, 1.0]);
        // The spike at 1 falls back below threshold, so the crossing is at sample 4.
        assert_approx_eq!(threshold_crossing(&waveform, 5.0).unwrap(), 3.0 + 5.0 / 8.0);
    }

    #[test]
    fn waveform_starting_above_threshold_has_no_crossing() {
        assert_eq!(threshold_crossing(&Waveform::from_values(&[10.0, 20.0, 30.0, 0.0]), 5.0), None);
        assert_eq!(threshold_crossing(&Waveform::from_values(&[10.0, 10.0, 10.0, 0.0]), 5.0), None);
    }

    #[test]
    fn crossing_after_falling_below_threshold() {
        let waveform = Waveform::from_values(&[10.0, 20.0, 4.0, 6.0, 12.0, 3.0]);
        // Samples 0 and 1 start above threshold; the first rise from below is at 3.
        assert_approx_eq!(threshold_crossing(&waveform, 5.0).unwrap(), 2.5);
    }

    #[test]
    fn predecessor_on_threshold() {
        let waveform = Waveform::from_values(&[0.0, 5.0, 9.0, 9.0]);
        assert_approx_eq!(threshold_crossing(&waveform, 5.0).unwrap(), 1.0);
    }

    #[test]
    fn crossing_with_calibrated_positions() {
        let waveform =
            Waveform::from_positions(&[0.0, 2.0, 4.0, 6.0], &[0.0, 0.0, 4.0, 8.0]).unwrap();
        assert_approx_eq!(threshold_crossing(&waveform, 2.0).unwrap(), 3.0);
    }

    #[test]
    fn constant_fraction_of_empty_waveform() {
        assert_eq!(constant_fraction(&Waveform::default(), 0.5), None);
    }
}
