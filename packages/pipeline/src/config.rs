//! Pipeline profile types.
//!
//! A profile names everything one forecast run needs: how to read the
//! archive, how to turn counts into training examples, which model to fit,
//! and how far ahead to predict.

use crime_forecast_forecast_models::{
    FitOptions, ForecastStrategy, ModelConfig, ZeroVariancePolicy,
};
use serde::{Deserialize, Serialize};

/// How many months past the last observed month to predict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Horizon {
    /// A fixed number of months.
    Months(usize),
    /// As many months as there are in the history.
    HistoryLength,
}

impl Horizon {
    #[must_use]
    pub const fn resolve(self, history_len: usize) -> usize {
        match self {
            Self::Months(n) => n,
            Self::HistoryLength => history_len,
        }
    }
}

/// Which series a profile forecasts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    /// Monthly totals, one channel.
    #[default]
    Totals,
    /// One channel per crime type.
    PerType,
}

/// A complete, named forecast configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineProfile {
    /// Unique identifier, e.g. `"seasonal"`.
    pub id: String,
    #[serde(default)]
    pub description: String,
    /// Id of the ingest profile used to read archives.
    pub ingest: String,
    #[serde(default)]
    pub series: SeriesKind,
    pub horizon: Horizon,
    #[serde(default)]
    pub zero_variance: ZeroVariancePolicy,
    pub strategy: ForecastStrategy,
    pub model: ModelConfig,
    pub fit: FitOptions,
}

impl PipelineProfile {
    /// Months of history required before any model is built.
    #[must_use]
    pub const fn min_history(&self) -> usize {
        self.strategy.min_history()
    }
}
