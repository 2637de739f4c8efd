//! Natural cubic spline through a waveform's samples.
use crate::{Real, waveform::Waveform};

/// Piecewise cubic `y + b·dx + c·dx² + d·dx³` on each knot interval,
/// with zero second derivative at both ends.
#[derive(Clone, Debug)]
pub struct NaturalCubicSpline {
    x: Vec<Real>,
    y: Vec<Real>,
    b: Vec<Real>,
    c: Vec<Real>,
    d: Vec<Real>,
}

impl NaturalCubicSpline {
    /// Returns `None` for an empty waveform.
    pub fn new(waveform: &Waveform) -> Option<Self> {
        let x: Vec<Real> = waveform.positions().collect();
        let y: Vec<Real> = waveform.values().collect();
        let m = x.len();
        if m == 0 {
            return None;
        }
        let k = m - 1;
        let h: Vec<Real> = x.windows(2).map(|w| w[1] - w[0]).collect();

        let mut alpha = vec![0.0; m];
        for i in 1..k {
            alpha[i] = 3.0 / h[i] * (y[i + 1] - y[i]) - 3.0 / h[i - 1] * (y[i] - y[i - 1]);
        }

        let mut l = vec![1.0; m];
        let mut mu = vec![0.0; m];
        let mut z = vec![0.0; m];
        for i in 1..k {
            l[i] = 2.0 * (x[i + 1] - x[i - 1]) - h[i - 1] * mu[i - 1];
            mu[i] = h[i] / l[i];
            z[i] = (alpha[i] - h[i - 1] * z[i - 1]) / l[i];
        }

        let mut c = vec![0.0; m];
        let mut b = vec![0.0; k];
        let mut d = vec![0.0; k];
        for j in (0..k).rev() {
            c[j] = z[j] - mu[j] * c[j + 1];
            b[j] = (y[j + 1] - y[j]) / h[j] - h[j] * (c[j + 1] + 2.0 * c[j]) / 3.0;
            d[j] = (c[j + 1] - c[j]) / (3.0 * h[j]);
        }

        Some(Self { x, y, b, c, d })
    }

    pub fn first_knot(&self) -> Real {
        self.x.first().copied().unwrap_or_default()
    }

    pub fn last_knot(&self) -> Real {
        self.x.last().copied().unwrap_or_default()
    }

    /// Evaluates the spline, holding the end values outside the knot range.
    pub fn eval(&self, at: Real) -> Real {
        let (Some(&first), Some(&last)) = (self.x.first(), self.x.last()) else {
            return 0.0;
        };
        if at.is_nan() {
            return Real::NAN;
        }
        if at <= first {
            return self.y[0];
        }
        if at >= last {
            return self.y[self.y.len() - 1];
        }
        let segment = self.x.partition_point(|&knot| knot <= at) - 1;
        let dx = at - self.x[segment];
        self.y[segment] + dx * (self.b[segment] + dx * (self.c[segment] + dx * self.d[segment]))
    }

    /// Evaluates the spline from the first to the last knot in increments of `step`.
    pub fn scan(&self, step: Real) -> impl Iterator<Item = (Real, Real)> + '_ {
        let first = self.first_knot();
        let span = self.last_knot() - first;
        let num_steps = if step > 0.0 {
            // Tolerates rounding in the division so the last knot is reached.
            (span / step + 1e-9).floor() as usize
        } else {
            0
        };
        (0..=num_steps).map(move |i| {
            let at = first + i as Real * step;
            (at, self.eval(at))
        })
    }
}
