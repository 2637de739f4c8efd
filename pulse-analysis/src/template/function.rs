use super::TemplateLookupTable;
use crate::Real;
use std::sync::Arc;
use tracing::debug;

/// Value of the template at a single position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TemplatePoint {
    pub value: Real,
    /// Derivative of `value` with respect to position, zero outside the table.
    pub slope: Real,
    /// The position lies outside the table window, `value` is clamped to the boundary point.
    pub rejected: bool,
}

/// Piecewise linear interpolant of a lookup table, scaled and shifted by the fit parameters.
#[derive(Clone, Debug)]
pub struct TemplateFunction {
    table: Arc<TemplateLookupTable>,
}

impl TemplateFunction {
    pub fn new(table: Arc<TemplateLookupTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &TemplateLookupTable {
        &self.table
    }

    /// Evaluates `scale · lookup(position - offset)`.
    pub fn evaluate(&self, position: Real, scale: Real, offset: Real) -> TemplatePoint {
        let point = self.lookup(position - offset);
        TemplatePoint {
            value: scale * point.value,
            slope: scale * point.slope,
            rejected: point.rejected,
        }
    }

    /// The fit model as a pure function of position and `[scale, offset]`.
    pub fn model(&self) -> impl Fn(Real, [Real; 2]) -> Real + '_ {
        |position, [scale, offset]| self.evaluate(position, scale, offset).value
    }

    /// Interpolates the unscaled table at `time`.
    ///
    /// Outside `[begin, end)` the boundary value is returned and the point is flagged rejected.
    pub fn lookup(&self, time: Real) -> TemplatePoint {
        let table = &*self.table;
        let means = table.means();
        let last = means.len() - 1;
        if !(time >= table.begin()) {
            debug!("Time {time} before template window at {0}, clamped", table.begin());
            return TemplatePoint {
                value: means[0],
                slope: 0.0,
                rejected: true,
            };
        }
        if time >= table.end() {
            debug!("Time {time} at or after template window end {0}, clamped", table.end());
            return TemplatePoint {
                value: means[last],
                slope: 0.0,
                rejected: true,
            };
        }

        let step = table.step();
        let index = (time - table.begin()) / step;
        let mut low = index.floor() as usize;
        let mut high = index.ceil() as usize;
        if high > last {
            debug!("Interpolation index {index} beyond table of {0} points", means.len());
            high = last;
            low = low.min(last);
        }

        let segment = low.min(last - 1);
        let slope = (means[segment + 1] - means[segment]) / step;
        let value = if low == high {
            means[low]
        } else {
            let x0 = table.position(low);
            means[low] + (means[high] - means[low]) / (table.position(high) - x0) * (time - x0)
        };
        TemplatePoint {
            value,
            slope,
            rejected: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn function() -> TemplateFunction {
        let table =
            TemplateLookupTable::new(0.0, 4.0, vec![0.0, 1.0, 3.0, 2.0, 0.0], vec![0.0; 5])
                .unwrap();
        TemplateFunction::new(Arc::new(table))
    }

    #[test]
    fn interpolates_between_points() {
        let function = function();
        let point = function.lookup(1.25);
        assert_approx_eq!(point.value, 1.5);
        assert_approx_eq!(point.slope, 2.0);
        assert!(!point.rejected);
    }

    #[test]
    fn exact_grid_point() {
        let point = function().lookup(2.0);
        assert_approx_eq!(point.value, 3.0);
        assert!(!point.rejected);
    }

    #[test]
    fn scaled_and_shifted() {
        let function = function();
        let point = function.evaluate(11.25, 100.0, 10.0);
        assert_approx_eq!(point.value, 150.0);
        assert_approx_eq!(point.slope, 200.0);
        assert_approx_eq!(function.model()(11.25, [100.0, 10.0]), 150.0);
    }

    #[test]
    fn outside_window_is_clamped_and_rejected() {
        let function = function();
        let before = function.lookup(-0.5);
        assert!(before.rejected);
        assert_approx_eq!(before.value, 0.0);
        let after = function.evaluate(4.0, 2.0, 0.0);
        assert!(after.rejected);
        assert_approx_eq!(after.value, 0.0);
        let below_end = function.lookup(3.999);
        assert!(!below_end.rejected);
    }

    #[test]
    fn nan_time_is_clamped_and_rejected() {
        let point = function().lookup(Real::NAN);
        assert!(point.rejected);
        assert_approx_eq!(point.value, 0.0);
        assert_eq!(point.slope, 0.0);
    }
}
