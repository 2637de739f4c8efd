use crate::{Real, histogram::Histogram1D, waveform::Waveform};
use tracing::debug;

const PEDESTAL_BINS: usize = 16384;
const PEDESTAL_LOW: Real = -0.5;
const PEDESTAL_HIGH: Real = 16383.5;

/// Inclusive range of samples used to estimate the baseline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PedestalWindow {
    /// Sample indices `first..=last`.
    Samples { first: usize, last: usize },
    /// Sample positions in `[begin, end]`.
    Positions { begin: Real, end: Real },
}

impl PedestalWindow {
    fn contains(&self, index: usize, position: Real) -> bool {
        match *self {
            Self::Samples { first, last } => (first..=last).contains(&index),
            Self::Positions { begin, end } => position >= begin && position <= end,
        }
    }
}

/// Estimated baseline of a channel.
#[derive(Default, Clone, Copy, Debug, PartialEq)]
pub struct Pedestal {
    pub mean: Real,
    /// Zero means no samples were available to estimate it.
    pub rms: Real,
    /// Window the pedestal was estimated over, `None` if supplied externally.
    pub window: Option<PedestalWindow>,
    /// Number of samples that fell in `window`.
    pub entries: usize,
}

impl Pedestal {
    pub fn fixed(mean: Real, rms: Real) -> Self {
        Self {
            mean,
            rms,
            window: None,
            entries: 0,
        }
    }

    /// True if the pedestal was estimated from a window containing no samples.
    pub fn is_empty(&self) -> bool {
        self.window.is_some() && self.entries == 0
    }
}

/// How a channel obtains its pedestal.
#[derive(Default, Clone, Copy, Debug, PartialEq)]
pub enum PedestalMode {
    /// Waveforms are used as read.
    #[default]
    None,
    /// A pedestal supplied externally, held for the lifetime of the channel.
    Fixed(Pedestal),
    /// A pedestal recomputed from every event.
    PerEvent(PedestalWindow),
}

#[derive(Clone, Debug)]
pub struct PedestalEstimator {
    histogram: Histogram1D,
}

impl Default for PedestalEstimator {
    fn default() -> Self {
        Self {
            histogram: Histogram1D::new(PEDESTAL_BINS, PEDESTAL_LOW, PEDESTAL_HIGH),
        }
    }
}

impl PedestalEstimator {
    /// Estimates the mean and RMS of the samples of `raw` inside `window`.
    ///
    /// Values outside the histogram range still contribute to the statistics.
    /// Returns a zero pedestal with zero RMS if no sample falls in the window,
    /// see [Pedestal::is_empty].
    pub fn estimate(&mut self, raw: &Waveform, window: PedestalWindow) -> Pedestal {
        self.histogram.reset();
        let entries = raw
            .samples()
            .iter()
            .enumerate()
            .filter(|(i, s)| window.contains(*i, s.position))
            .map(|(_, s)| self.histogram.fill(s.value))
            .count();

        if entries == 0 {
            debug!("No samples in pedestal window {window:?}");
        }
        Pedestal {
            mean: self.histogram.mean(),
            rms: self.histogram.rms(),
            window: Some(window),
            entries,
        }
    }

    /// The histogram of the last estimate.
    pub fn histogram(&self) -> &Histogram1D {
        &self.histogram
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn constant_waveform() {
        let raw = Waveform::from_values(&[1500.0; 31]);
        let pedestal =
            PedestalEstimator::default().estimate(&raw, PedestalWindow::Samples { first: 0, last: 9 });
        assert_eq!(pedestal.mean, 1500.0);
        assert_eq!(pedestal.rms, 0.0);
    }

    #[test]
    fn sample_window_is_inclusive() {
        let raw = Waveform::from_values(&[10.0, 12.0, 14.0, 100.0, 100.0]);
        let pedestal =
            PedestalEstimator::default().estimate(&raw, PedestalWindow::Samples { first: 0, last: 2 });
        assert_approx_eq!(pedestal.mean, 12.0);
        assert_approx_eq!(pedestal.rms, (8.0_f64 / 3.0).sqrt());
    }

    #[test]
    fn position_window() {
        let raw = Waveform::from_positions(&[0.0, 2.0, 4.0, 6.0], &[5.0, 7.0, 50.0, 50.0]).unwrap();
        let pedestal = PedestalEstimator::default()
            .estimate(&raw, PedestalWindow::Positions { begin: 0.0, end: 2.0 });
        assert_approx_eq!(pedestal.mean, 6.0);
        assert_approx_eq!(pedestal.rms, 1.0);
    }

    #[test]
    fn empty_window_is_zero() {
        let raw = Waveform::from_values(&[10.0; 5]);
        let pedestal = PedestalEstimator::default()
            .estimate(&raw, PedestalWindow::Samples { first: 10, last: 20 });
        assert_eq!(pedestal.mean, 0.0);
        assert_eq!(pedestal.rms, 0.0);
        assert!(pedestal.is_empty());
    }

    #[test]
    fn constant_window_is_not_empty() {
        let raw = Waveform::from_values(&[10.0; 5]);
        let pedestal =
            PedestalEstimator::default().estimate(&raw, PedestalWindow::Samples { first: 0, last: 1 });
        assert_eq!(pedestal.rms, 0.0);
        assert_eq!(pedestal.entries, 2);
        assert!(!pedestal.is_empty());
        assert!(!Pedestal::fixed(0.0, 0.0).is_empty());
    }

    #[test]
    fn values_beyond_histogram_range_contribute() {
        let raw = Waveform::from_values(&[-100.0, -100.0, 20000.0, 20000.0]);
        let pedestal =
            PedestalEstimator::default().estimate(&raw, PedestalWindow::Samples { first: 0, last: 3 });
        assert_approx_eq!(pedestal.mean, 9950.0);
        assert_approx_eq!(pedestal.rms, 10050.0);
    }

    #[test]
    fn estimator_is_reset_between_events() {
        let mut estimator = PedestalEstimator::default();
        let window = PedestalWindow::Samples { first: 0, last: 3 };
        estimator.estimate(&Waveform::from_values(&[100.0; 4]), window);
        let pedestal = estimator.estimate(&Waveform::from_values(&[4.0; 4]), window);
        assert_eq!(pedestal.mean, 4.0);
    }
}
