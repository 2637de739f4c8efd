//! One dimensional fixed-bin histogram.
//!
//! Bin contents are kept alongside exact running sums of the filled values,
//! so the reported mean and RMS include entries that fell outside the binned range.
use crate::Real;

#[derive(Default, Clone, Debug)]
struct RunningSums {
    weight: Real,
    weighted_x: Real,
    weighted_x2: Real,
}

#[derive(Clone, Debug)]
pub struct Histogram1D {
    low: Real,
    high: Real,
    bins: Vec<Real>,
    underflow: Real,
    overflow: Real,
    sums: RunningSums,
}

impl Histogram1D {
    /// # Parameters
    /// - num_bins: number of equal width bins, at least one is always allocated.
    /// - low, high: lower edge of the first bin and upper edge of the last.
    pub fn new(num_bins: usize, low: Real, high: Real) -> Self {
        Self {
            low,
            high,
            bins: vec![0.0; num_bins.max(1)],
            underflow: 0.0,
            overflow: 0.0,
            sums: RunningSums::default(),
        }
    }

    pub fn num_bins(&self) -> usize {
        self.bins.len()
    }

    pub fn bin_width(&self) -> Real {
        (self.high - self.low) / self.bins.len() as Real
    }

    pub fn bin_centre(&self, bin: usize) -> Real {
        self.low + (bin as Real + 0.5) * self.bin_width()
    }

    /// Index of the bin containing `x`, or `None` if it lies outside `[low, high)`.
    pub fn find_bin(&self, x: Real) -> Option<usize> {
        if !(x >= self.low && x < self.high) {
            return None;
        }
        let bin = ((x - self.low) / self.bin_width()) as usize;
        Some(bin.min(self.bins.len() - 1))
    }

    pub fn fill(&mut self, x: Real) {
        self.fill_weighted(x, 1.0)
    }

    pub fn fill_weighted(&mut self, x: Real, weight: Real) {
        match self.find_bin(x) {
            Some(bin) => self.bins[bin] += weight,
            None if x < self.low => self.underflow += weight,
            None => self.overflow += weight,
        }
        self.sums.weight += weight;
        self.sums.weighted_x += weight * x;
        self.sums.weighted_x2 += weight * x * x;
    }

    pub fn bins(&self) -> &[Real] {
        &self.bins
    }

    pub fn underflow(&self) -> Real {
        self.underflow
    }

    pub fn overflow(&self) -> Real {
        self.overflow
    }

    /// Total weight filled, including under- and overflow.
    pub fn entries(&self) -> Real {
        self.sums.weight
    }

    /// Mean of all filled values, zero if nothing was filled.
    pub fn mean(&self) -> Real {
        if self.sums.weight > 0.0 {
            self.sums.weighted_x / self.sums.weight
        } else {
            0.0
        }
    }

    /// Root mean square deviation from the mean, zero if nothing was filled.
    pub fn rms(&self) -> Real {
        if self.sums.weight > 0.0 {
            let mean = self.mean();
            (self.sums.weighted_x2 / self.sums.weight - mean * mean)
                .max(0.0)
                .sqrt()
        } else {
            0.0
        }
    }

    pub fn reset(&mut self) {
        self.bins.iter_mut().for_each(|b| *b = 0.0);
        self.underflow = 0.0;
        self.overflow = 0.0;
        self.sums = RunningSums::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn empty_histogram_statistics() {
        let histogram = Histogram1D::new(10, 0.0, 10.0);
        assert_eq!(histogram.mean(), 0.0);
        assert_eq!(histogram.rms(), 0.0);
        assert_eq!(histogram.entries(), 0.0);
    }

    #[test]
    fn binning() {
        let mut histogram = Histogram1D::new(4, -0.5, 3.5);
        histogram.fill(0.0);
        histogram.fill(2.9);
        histogram.fill(3.0);
        assert_eq!(histogram.bins(), &[1.0, 0.0, 0.0, 2.0]);
        assert_approx_eq!(histogram.bin_centre(3), 3.0);
        assert_eq!(histogram.find_bin(3.5), None);
        assert_eq!(histogram.find_bin(-0.5), Some(0));
    }

    #[test]
    fn statistics_include_out_of_range_values() {
        let mut histogram = Histogram1D::new(4, 0.0, 4.0);
        histogram.fill(-10.0);
        histogram.fill(2.0);
        histogram.fill(20.0);
        assert_eq!(histogram.underflow(), 1.0);
        assert_eq!(histogram.overflow(), 1.0);
        assert_approx_eq!(histogram.mean(), 4.0);
        // sqrt((100 + 4 + 400) / 3 - 16)
        assert_approx_eq!(histogram.rms(), (504.0 / 3.0 - 16.0_f64).sqrt());
    }

    #[test]
    fn reset_clears_everything() {
        let mut histogram = Histogram1D::new(4, 0.0, 4.0);
        histogram.fill(1.0);
        histogram.fill(100.0);
        histogram.reset();
        assert_eq!(histogram.entries(), 0.0);
        assert_eq!(histogram.overflow(), 0.0);
        assert!(histogram.bins().iter().all(|&b| b == 0.0));
    }
}
