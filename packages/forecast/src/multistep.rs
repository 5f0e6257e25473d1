//! Multi-step forecasting past the last observed month.

use crime_forecast_crime_models::YearMonth;
use crime_forecast_forecast_models::{
    AutoregressiveStep, FeatureScheme, ForecastPoint, ScalingStats,
};

use crate::ForecastError;
use crate::model::ForecastModel;
use crate::normalize::{invert, transform};

/// Labels for the `horizon` months after `last_month`.
///
/// # Errors
///
/// * [`ForecastError::InvalidMonth`] if `last_month` is not `"YYYY-MM"`
pub fn future_months(last_month: &str, horizon: usize) -> Result<Vec<String>, ForecastError> {
    let last: YearMonth = last_month.parse()?;
    (1..=horizon)
        .map(|n| {
            let n = u32::try_from(n)
                .map_err(|_| ForecastError::invalid(format!("horizon {horizon} is too large")))?;
            Ok(last.add_months(n)?.to_string())
        })
        .collect()
}

/// Rolls a trained model forward using the statistics it was trained with.
pub struct MultiStepForecaster<'a> {
    model: &'a dyn ForecastModel,
    stats: ScalingStats,
}

impl<'a> MultiStepForecaster<'a> {
    #[must_use]
    pub const fn new(model: &'a dyn ForecastModel, stats: ScalingStats) -> Self {
        Self { model, stats }
    }

    /// Predicts months `history_len .. history_len + horizon` from their own
    /// index features in a single batch.
    ///
    /// # Errors
    ///
    /// * [`ForecastError::InvalidMonth`] if `last_month` is not `"YYYY-MM"`
    /// * [`ForecastError::ShapeMismatch`] if the model does not take
    ///   `scheme`-width inputs or does not produce a single output
    pub fn independent(
        &self,
        scheme: FeatureScheme,
        history_len: usize,
        last_month: &str,
        horizon: usize,
    ) -> Result<Vec<ForecastPoint>, ForecastError> {
        if self.model.output_width() != 1 {
            return Err(ForecastError::ShapeMismatch {
                what: "independent forecast output",
                expected: 1,
                got: self.model.output_width(),
            });
        }

        let months = future_months(last_month, horizon)?;
        if months.is_empty() {
            return Ok(Vec::new());
        }

        let features: Vec<Vec<f64>> = scheme
            .encode_range(history_len, horizon)
            .into_iter()
            .map(|row| row.iter().map(|&v| transform(v, &self.stats.input)).collect())
            .collect();

        let predictions = self.model.predict(&features)?;

        Ok(months
            .into_iter()
            .zip(predictions)
            .map(|(month, row)| ForecastPoint {
                month,
                predicted_value: invert(row[0], &self.stats.label),
            })
            .collect())
    }

    /// Predicts `horizon` months one at a time, feeding each prediction back
    /// into a rolling window of the last `lookback` rows.
    ///
    /// A predicted channel that is NaN or not strictly positive is replaced
    /// with that channel's mean over the current window before it is pushed.
    ///
    /// # Errors
    ///
    /// * [`ForecastError::InsufficientData`] if `history` has fewer than
    ///   `lookback` rows
    /// * [`ForecastError::InvalidMonth`] if `last_month` is not `"YYYY-MM"`
    /// * [`ForecastError::ShapeMismatch`] if the model's output width differs
    ///   from the history's channel count, or the window width does not
    ///   match the model
    #[allow(clippy::cast_precision_loss)]
    pub fn autoregressive(
        &self,
        history: &[Vec<f64>],
        lookback: usize,
        last_month: &str,
        horizon: usize,
    ) -> Result<Vec<AutoregressiveStep>, ForecastError> {
        if lookback == 0 || history.len() < lookback {
            return Err(ForecastError::InsufficientData {
                unit: "months of history",
                needed: lookback.max(1),
                got: history.len(),
            });
        }

        let channels = history[0].len();
        if self.model.output_width() != channels {
            return Err(ForecastError::ShapeMismatch {
                what: "autoregressive forecast output",
                expected: channels,
                got: self.model.output_width(),
            });
        }

        let months = future_months(last_month, horizon)?;
        let mut window: Vec<Vec<f64>> = history[history.len() - lookback..].to_vec();
        let mut steps = Vec::with_capacity(horizon);

        for month in months {
            let input: Vec<f64> = window
                .iter()
                .flatten()
                .map(|&v| transform(v, &self.stats.input))
                .collect();

            let predicted = self
                .model
                .predict(std::slice::from_ref(&input))?
                .pop()
                .unwrap_or_default();

            let mut substituted = false;
            let values: Vec<f64> = predicted
                .iter()
                .enumerate()
                .map(|(channel, &v)| {
                    let value = invert(v, &self.stats.label);
                    if value.is_nan() || value <= 0.0 {
                        substituted = true;
                        let sum: f64 = window.iter().map(|row| row[channel]).sum();
                        sum / window.len() as f64
                    } else {
                        value
                    }
                })
                .collect();

            if substituted {
                log::debug!("{month}: substituted window mean for unstable prediction");
            }

            window.remove(0);
            window.push(values.clone());
            steps.push(AutoregressiveStep {
                month,
                values,
                substituted,
            });
        }

        Ok(steps)
    }
}

/// Collapses autoregressive steps into one point per month by summing
/// channels.
#[must_use]
pub fn steps_to_points(steps: &[AutoregressiveStep]) -> Vec<ForecastPoint> {
    steps
        .iter()
        .map(|step| ForecastPoint {
            month: step.month.clone(),
            predicted_value: step.values.iter().sum(),
        })
        .collect()
}
