use crate::{Real, spline::NaturalCubicSpline, waveform::Waveform};

/// Scan step, in position units, used when no other is configured.
pub const DEFAULT_SPLINE_STEP: Real = 0.01;

/// Result of scanning a spline through a waveform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SplineScan {
    /// Largest value of the spline found by the scan.
    pub amplitude: Real,
    pub peak_position: Real,
    /// Position at which the spline first rises through half of `amplitude`,
    /// interpolated between the scan points either side of it.
    /// `None` if the spline is already above half maximum at the start of the scan.
    pub half_maximum_time: Option<Real>,
}

/// Fits a natural cubic spline through `waveform` and scans it from the first
/// to the last sample position in increments of `step`.
///
/// Returns `None` if the waveform is empty.
pub fn scan_spline(waveform: &Waveform, step: Real) -> Option<SplineScan> {
    let spline = NaturalCubicSpline::new(waveform)?;
    let (peak_position, amplitude) = spline
        .scan(step)
        .reduce(|best, point| if point.1 > best.1 { point } else { best })?;

    let half_maximum = 0.5 * amplitude;
    let half_maximum_time = spline
        .scan(step)
        .enumerate()
        .find(|(_, (_, value))| *value > half_maximum)
        .and_then(|(i, (at, value))| {
            if i == 0 {
                return None;
            }
            let dy_mid = value - half_maximum;
            let dy_previous = value - spline.eval(at - step);
            Some(at - dy_mid / dy_previous * step)
        });

    Some(SplineScan {
        amplitude,
        peak_position,
        half_maximum_time,
    })
}
