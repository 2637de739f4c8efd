use super::{TemplateGeometry, TemplateLookupTable};
use crate::{Real, error::TemplateError};
use ndarray::{Array2, ArrayView1};
use tracing::debug;

/// Columns with fewer entries than this use the unweighted estimator.
const MIN_WEIGHTED_ENTRIES: Real = 10.0;

/// Reduces each time column of `counts` to the mean and RMS of its value bin centres.
///
/// Columns with at least ten entries are weighted by count. Sparser columns count each occupied
/// value bin once, and empty columns give zero for both.
pub fn collapse(
    counts: &Array2<Real>,
    geometry: &TemplateGeometry,
) -> Result<TemplateLookupTable, TemplateError> {
    let (means, errors): (Vec<Real>, Vec<Real>) = counts
        .rows()
        .into_iter()
        .enumerate()
        .map(|(time_bin, column)| collapse_column(time_bin, column, geometry))
        .unzip();
    TemplateLookupTable::new(geometry.begin, geometry.end, means, errors)
}

fn collapse_column(
    time_bin: usize,
    column: ArrayView1<Real>,
    geometry: &TemplateGeometry,
) -> (Real, Real) {
    let entries = column.sum();
    if entries <= 0.0 {
        return (0.0, 0.0);
    }
    let weighted = entries >= MIN_WEIGHTED_ENTRIES;
    if !weighted {
        debug!("Time bin {time_bin} has only {entries} entries, using unweighted estimate");
    }

    let (mut weight, mut sum, mut sum_squares) = (0.0, 0.0, 0.0);
    for (bin, &count) in column.iter().enumerate().filter(|(_, c)| **c > 0.0) {
        let w = if weighted { count } else { 1.0 };
        let y = geometry.value_bin_centre(bin);
        weight += w;
        sum += w * y;
        sum_squares += w * y * y;
    }
    let mean = sum / weight;
    let rms = (sum_squares / weight - mean * mean).max(0.0).sqrt();
    (mean, rms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn geometry() -> TemplateGeometry {
        TemplateGeometry {
            num_time_points: 3,
            num_value_bins: 12,
            begin: 0.0,
            end: 2.0,
        }
    }

    #[test]
    fn weighted_and_unweighted_columns() {
        let geometry = geometry();
        let mut counts = Array2::zeros((3, 12));
        // Column 0: twelve entries split 9 and 3.
        counts[[0, 2]] = 9.0;
        counts[[0, 6]] = 3.0;
        // Column 1: three entries split 2 and 1, each bin counts once.
        counts[[1, 2]] = 2.0;
        counts[[1, 6]] = 1.0;
        let table = collapse(&counts, &geometry).unwrap();

        let y2 = geometry.value_bin_centre(2);
        let y6 = geometry.value_bin_centre(6);
        let weighted_mean = (9.0 * y2 + 3.0 * y6) / 12.0;
        assert_approx_eq!(table.means()[0], weighted_mean);
        let weighted_variance = (9.0 * y2 * y2 + 3.0 * y6 * y6) / 12.0 - weighted_mean * weighted_mean;
        assert_approx_eq!(table.errors()[0], weighted_variance.sqrt());

        assert_approx_eq!(table.means()[1], (y2 + y6) / 2.0);
        assert_approx_eq!(table.errors()[1], (y6 - y2) / 2.0);

        assert_eq!(table.means()[2], 0.0);
        assert_eq!(table.errors()[2], 0.0);
    }

    #[test]
    fn table_spans_geometry() {
        let table = collapse(&Array2::zeros((3, 12)), &geometry()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.begin(), 0.0);
        assert_eq!(table.end(), 2.0);
    }
}
