use crate::{Real, error::TemplateError};

/// Mean normalised pulse value and its spread at evenly spaced times relative to the pulse reference time.
#[derive(Clone, Debug, PartialEq)]
pub struct TemplateLookupTable {
    begin: Real,
    end: Real,
    means: Vec<Real>,
    errors: Vec<Real>,
}

impl TemplateLookupTable {
    /// # Parameters
    /// - begin, end: times of the first and last points, `begin < end`.
    /// - means: at least two values.
    /// - errors: one per mean.
    pub fn new(
        begin: Real,
        end: Real,
        means: Vec<Real>,
        errors: Vec<Real>,
    ) -> Result<Self, TemplateError> {
        if means.len() < 2 {
            return Err(TemplateError::TooFewPoints(means.len()));
        }
        if means.len() != errors.len() {
            return Err(TemplateError::LengthMismatch {
                means: means.len(),
                errors: errors.len(),
            });
        }
        if !(begin < end) {
            return Err(TemplateError::InvalidWindow { begin, end });
        }
        Ok(Self {
            begin,
            end,
            means,
            errors,
        })
    }

    pub fn begin(&self) -> Real {
        self.begin
    }

    pub fn end(&self) -> Real {
        self.end
    }

    pub fn len(&self) -> usize {
        self.means.len()
    }

    /// Always false, a table holds at least two points.
    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }

    pub fn step(&self) -> Real {
        (self.end - self.begin) / (self.means.len() - 1) as Real
    }

    pub fn position(&self, index: usize) -> Real {
        self.begin + index as Real * self.step()
    }

    pub fn means(&self) -> &[Real] {
        &self.means
    }

    pub fn errors(&self) -> &[Real] {
        &self.errors
    }

    /// Position and value of the largest mean, first occurrence on ties.
    pub fn peak(&self) -> (Real, Real) {
        let (index, value) = self
            .means
            .iter()
            .copied()
            .enumerate()
            .fold((0, Real::MIN), |best, (i, v)| if v > best.1 { (i, v) } else { best });
        (self.position(index), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn construction_is_validated() {
        assert!(matches!(
            TemplateLookupTable::new(0.0, 1.0, vec![1.0], vec![0.0]),
            Err(TemplateError::TooFewPoints(1))
        ));
        assert!(matches!(
            TemplateLookupTable::new(0.0, 1.0, vec![1.0, 2.0], vec![0.0]),
            Err(TemplateError::LengthMismatch { means: 2, errors: 1 })
        ));
        assert!(matches!(
            TemplateLookupTable::new(1.0, 0.0, vec![1.0, 2.0], vec![0.0, 0.0]),
            Err(TemplateError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn peak_and_positions() {
        let table =
            TemplateLookupTable::new(-1.0, 3.0, vec![0.0, 0.5, 1.0, 1.0, 0.2], vec![0.0; 5])
                .unwrap();
        assert_approx_eq!(table.step(), 1.0);
        let (position, value) = table.peak();
        assert_approx_eq!(position, 1.0);
        assert_approx_eq!(value, 1.0);
    }
}
