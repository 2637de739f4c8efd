use crate::{Real, error::TemplateError};

/// Shape of the training histogram and of the lookup table collapsed from it.
///
/// Time bins are centred on `begin + i·step` for `i` in `0..num_time_points`,
/// so the first and last bin centres coincide with `begin` and `end`.
/// Value bins span normalised amplitudes from just below 0 to just above 1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TemplateGeometry {
    pub num_time_points: usize,
    pub num_value_bins: usize,
    /// Time of the first point, relative to the reference time of each pulse.
    pub begin: Real,
    pub end: Real,
}

impl Default for TemplateGeometry {
    fn default() -> Self {
        Self {
            num_time_points: 120,
            num_value_bins: 2048,
            begin: -2.0,
            end: 9.9,
        }
    }
}

impl TemplateGeometry {
    const VALUE_LOW: Real = -0.1;
    const VALUE_SPAN: Real = 1.2;

    pub fn validate(&self) -> Result<(), TemplateError> {
        if self.num_time_points < 2 {
            return Err(TemplateError::TooFewPoints(self.num_time_points));
        }
        if !(self.begin < self.end) {
            return Err(TemplateError::InvalidWindow {
                begin: self.begin,
                end: self.end,
            });
        }
        if self.num_value_bins == 0 {
            return Err(TemplateError::TooFewPoints(self.num_value_bins));
        }
        Ok(())
    }

    /// Distance between neighbouring time points, which is also the time bin width.
    pub fn time_step(&self) -> Real {
        (self.end - self.begin) / (self.num_time_points - 1) as Real
    }

    pub fn time_low(&self) -> Real {
        self.begin - self.time_step() / 2.0
    }

    pub fn time_high(&self) -> Real {
        self.end + self.time_step() / 2.0
    }

    pub fn value_bin_width(&self) -> Real {
        Self::VALUE_SPAN / self.num_value_bins as Real
    }

    pub fn value_low(&self) -> Real {
        Self::VALUE_LOW + self.value_bin_width() / 2.0
    }

    pub fn value_high(&self) -> Real {
        self.value_low() + Self::VALUE_SPAN
    }

    pub fn time_bin(&self, time: Real) -> Option<usize> {
        Self::find_bin(time, self.time_low(), self.time_step(), self.num_time_points)
    }

    pub fn value_bin(&self, value: Real) -> Option<usize> {
        Self::find_bin(value, self.value_low(), self.value_bin_width(), self.num_value_bins)
    }

    pub fn value_bin_centre(&self, bin: usize) -> Real {
        self.value_low() + (bin as Real + 0.5) * self.value_bin_width()
    }

    fn find_bin(x: Real, low: Real, width: Real, num_bins: usize) -> Option<usize> {
        let offset = (x - low) / width;
        // Also excludes NaN.
        if offset >= 0.0 && offset < num_bins as Real {
            Some((offset as usize).min(num_bins - 1))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn default_bins() {
        let geometry = TemplateGeometry::default();
        assert_approx_eq!(geometry.time_step(), 0.1);
        assert_eq!(geometry.time_bin(-2.0), Some(0));
        assert_eq!(geometry.time_bin(9.9), Some(119));
        assert_eq!(geometry.time_bin(-2.06), None);
        assert_eq!(geometry.time_bin(9.96), None);
        assert_eq!(geometry.value_bin(0.0).map(|b| b > 0), Some(true));
        assert_eq!(geometry.value_bin(-0.2), None);
    }

    #[test]
    fn value_bin_centres_round_trip() {
        let geometry = TemplateGeometry::default();
        for bin in [0, 100, 1000, 2047] {
            assert_eq!(geometry.value_bin(geometry.value_bin_centre(bin)), Some(bin));
        }
    }

    #[test]
    fn invalid_geometries() {
        let geometry = TemplateGeometry {
            num_time_points: 1,
            ..Default::default()
        };
        assert!(matches!(geometry.validate(), Err(TemplateError::TooFewPoints(1))));
        let geometry = TemplateGeometry {
            begin: 3.0,
            end: 3.0,
            ..Default::default()
        };
        assert!(matches!(
            geometry.validate(),
            Err(TemplateError::InvalidWindow { .. })
        ));
    }
}
