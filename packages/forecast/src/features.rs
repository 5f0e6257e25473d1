//! Training example construction.
//!
//! Two shapes of training set are built here. Index-feature sets pair each
//! month's [`FeatureScheme`] encoding with its observed value. Sliding-window
//! sets pair the `lookback` rows before a month with that month's row.

pub use crime_forecast_forecast_models::{FeatureScheme, WindowFilter};

use crate::ForecastError;

/// Inputs and labels for one training run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowedSet {
    /// One feature vector per example.
    pub inputs: Vec<Vec<f64>>,
    /// One label row per example.
    pub labels: Vec<Vec<f64>>,
    /// Series index each label was taken from.
    pub target_indices: Vec<usize>,
}

impl WindowedSet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

/// Converts counts to `f64`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn counts_to_f64(counts: &[u64]) -> Vec<f64> {
    counts.iter().map(|&c| c as f64).collect()
}

/// Wraps each scalar in a one-channel row.
#[must_use]
pub fn scalar_rows(values: &[f64]) -> Vec<Vec<f64>> {
    values.iter().map(|&v| vec![v]).collect()
}

fn channel_width(series: &[Vec<f64>]) -> Result<usize, ForecastError> {
    let Some(first) = series.first() else {
        return Ok(0);
    };
    let width = first.len();

    if let Some(row) = series.iter().find(|row| row.len() != width) {
        return Err(ForecastError::ShapeMismatch {
            what: "series row",
            expected: width,
            got: row.len(),
        });
    }

    Ok(width)
}

/// Pairs `scheme.encode_index(i)` with `series[i]` for every month.
///
/// # Errors
///
/// * [`ForecastError::ShapeMismatch`] if series rows differ in width
pub fn index_features(
    scheme: FeatureScheme,
    series: &[Vec<f64>],
) -> Result<WindowedSet, ForecastError> {
    channel_width(series)?;

    Ok(WindowedSet {
        inputs: scheme.encode_range(0, series.len()),
        labels: series.to_vec(),
        target_indices: (0..series.len()).collect(),
    })
}

/// Builds one example per index `t >= lookback`.
///
/// The input is rows `t - lookback .. t` flattened oldest first; the label
/// is row `t`. A series no longer than `lookback` produces an empty set.
///
/// # Errors
///
/// * [`ForecastError::InvalidParameter`] if `lookback` is zero
/// * [`ForecastError::ShapeMismatch`] if series rows differ in width
pub fn sliding_windows(
    series: &[Vec<f64>],
    lookback: usize,
    filter: WindowFilter,
) -> Result<WindowedSet, ForecastError> {
    if lookback == 0 {
        return Err(ForecastError::invalid("lookback must be at least 1"));
    }
    channel_width(series)?;

    let mut set = WindowedSet::default();

    for t in lookback..series.len() {
        let window = &series[t - lookback..t];
        let target = &series[t];

        if filter == WindowFilter::RequirePositive
            && (window.iter().flatten().any(|&v| v <= 0.0) || target.iter().any(|&v| v <= 0.0))
        {
            continue;
        }

        set.inputs.push(window.concat());
        set.labels.push(target.clone());
        set.target_indices.push(t);
    }

    Ok(set)
}
