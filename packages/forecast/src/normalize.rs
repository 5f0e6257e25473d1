//! Min/max rescaling to `[0, 1]`.
//!
//! Statistics are global over everything passed to `fit`: one pair covers
//! every row and channel of the inputs, another covers every label.

use crime_forecast_forecast_models::{NormalizationStats, ScalingStats, ZeroVariancePolicy};

use crate::ForecastError;
use crate::features::WindowedSet;

/// Value every input maps to when the fitted range is zero.
pub const ZERO_VARIANCE_CENTER: f64 = 0.5;

/// Fits [`NormalizationStats`] under a [`ZeroVariancePolicy`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Normalizer {
    policy: ZeroVariancePolicy,
}

impl Normalizer {
    #[must_use]
    pub const fn new(policy: ZeroVariancePolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub const fn policy(&self) -> ZeroVariancePolicy {
        self.policy
    }

    /// Global min and max of `values`.
    ///
    /// # Errors
    ///
    /// * [`ForecastError::InsufficientData`] if `values` is empty
    /// * [`ForecastError::InvalidParameter`] if any value is NaN or infinite
    /// * [`ForecastError::DegenerateNormalization`] if all values are equal
    ///   and the policy is [`ZeroVariancePolicy::Reject`]
    pub fn fit<'a>(
        &self,
        values: impl IntoIterator<Item = &'a f64>,
    ) -> Result<NormalizationStats, ForecastError> {
        let mut bounds: Option<(f64, f64)> = None;

        for &v in values {
            if !v.is_finite() {
                return Err(ForecastError::invalid(format!(
                    "cannot normalize non-finite value {v}"
                )));
            }
            bounds = Some(bounds.map_or((v, v), |(lo, hi)| (lo.min(v), hi.max(v))));
        }

        let Some((min, max)) = bounds else {
            return Err(ForecastError::InsufficientData {
                unit: "values to normalize",
                needed: 1,
                got: 0,
            });
        };

        let stats = NormalizationStats { min, max };
        if stats.is_degenerate() && self.policy == ZeroVariancePolicy::Reject {
            return Err(ForecastError::DegenerateNormalization { value: min });
        }

        Ok(stats)
    }

    /// [`Self::fit`] over every element of every row.
    ///
    /// # Errors
    ///
    /// See [`Self::fit`].
    pub fn fit_rows(&self, rows: &[Vec<f64>]) -> Result<NormalizationStats, ForecastError> {
        self.fit(rows.iter().flatten())
    }

    /// Fits input and label statistics for a training set.
    ///
    /// # Errors
    ///
    /// See [`Self::fit`].
    pub fn fit_set(&self, set: &WindowedSet) -> Result<ScalingStats, ForecastError> {
        Ok(ScalingStats {
            input: self.fit_rows(&set.inputs)?,
            label: self.fit_rows(&set.labels)?,
        })
    }
}

/// `(v - min) / (max - min)`, or exactly [`ZERO_VARIANCE_CENTER`] when the
/// range is zero.
#[must_use]
pub fn transform(value: f64, stats: &NormalizationStats) -> f64 {
    if stats.is_degenerate() {
        ZERO_VARIANCE_CENTER
    } else {
        (value - stats.min) / stats.range()
    }
}

/// `v * (max - min) + min`.
///
/// With zero range this returns exactly `min` for any finite `v`.
#[must_use]
pub fn invert(value: f64, stats: &NormalizationStats) -> f64 {
    value.mul_add(stats.range(), stats.min)
}

#[must_use]
pub fn transform_rows(rows: &[Vec<f64>], stats: &NormalizationStats) -> Vec<Vec<f64>> {
    rows.iter()
        .map(|row| row.iter().map(|&v| transform(v, stats)).collect())
        .collect()
}

#[must_use]
pub fn invert_rows(rows: &[Vec<f64>], stats: &NormalizationStats) -> Vec<Vec<f64>> {
    rows.iter()
        .map(|row| row.iter().map(|&v| invert(v, stats)).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_finds_global_bounds() {
        let rows = vec![vec![3.0, -1.0], vec![7.0, 2.0]];
        let stats = Normalizer::default().fit_rows(&rows).unwrap();
        assert!((stats.min + 1.0).abs() < f64::EPSILON);
        assert!((stats.max - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn round_trip_within_tolerance() {
        let values = [0.0, 1.5, 42.0, 1234.5678, 99_999.0];
        let stats = Normalizer::default().fit(&values).unwrap();

        for &v in &values {
            let t = transform(v, &stats);
            assert!((0.0..=1.0).contains(&t));
            assert!((invert(t, &stats) - v).abs() < 1e-6, "value {v}");
        }
    }

    #[test]
    fn center_policy_maps_constant_series_to_half() {
        let stats = Normalizer::new(ZeroVariancePolicy::Center)
            .fit(&[10.0, 10.0, 10.0])
            .unwrap();

        assert!(stats.is_degenerate());
        assert!((transform(10.0, &stats) - ZERO_VARIANCE_CENTER).abs() < f64::EPSILON);
        // Exact: the range is zero so any prediction inverts to `min`.
        assert!((invert(0.73, &stats) - 10.0).abs() < f64::EPSILON);
        assert!((invert(ZERO_VARIANCE_CENTER, &stats) - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn reject_policy_refuses_constant_series() {
        let result = Normalizer::new(ZeroVariancePolicy::Reject).fit(&[4.0, 4.0]);
        assert!(matches!(
            result,
            Err(ForecastError::DegenerateNormalization { .. })
        ));
    }

    #[test]
    fn empty_and_non_finite_inputs_are_errors() {
        let normalizer = Normalizer::default();
        assert!(matches!(
            normalizer.fit(&[]),
            Err(ForecastError::InsufficientData { .. })
        ));
        assert!(matches!(
            normalizer.fit(&[1.0, f64::NAN]),
            Err(ForecastError::InvalidParameter { .. })
        ));
    }
}
