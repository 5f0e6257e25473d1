#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Forecast configuration, result, and collaborator payload types.
//!
//! Configuration types ([`ModelConfig`], [`FitOptions`],
//! [`ForecastStrategy`]) deserialize from the `snake_case` TOML used by
//! pipeline profiles. Result and payload types serialize as `camelCase`
//! JSON for rendering and narrative collaborators.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// One predicted month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPoint {
    /// Month label (`"YYYY-MM"`).
    pub month: String,
    /// Predicted incident count, on the original (denormalized) scale.
    pub predicted_value: f64,
}

/// Local extremum classification.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AnnotationKind {
    /// Strictly greater than both neighbours.
    Peak,
    /// Strictly less than both neighbours.
    Trough,
}

/// A peak or trough found in a predicted sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub kind: AnnotationKind,
    /// Position within the annotated sequence.
    pub index: usize,
    pub month: String,
    pub value: f64,
}

/// Min/max pair used for `[0, 1]` rescaling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationStats {
    pub min: f64,
    pub max: f64,
}

impl NormalizationStats {
    /// `max - min`.
    #[must_use]
    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    /// Whether every fitted value was identical.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.range().abs() < f64::EPSILON
    }
}

/// Input and label statistics, fitted together on one training set.
///
/// Both must be kept for the lifetime of the model they were fitted with:
/// predictions are only meaningful when denormalized with the same label
/// statistics used during training.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalingStats {
    pub input: NormalizationStats,
    pub label: NormalizationStats,
}

/// What to do when fitted statistics have `max == min`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroVariancePolicy {
    /// Every value maps to exactly `0.5`; inversion returns `min`.
    #[default]
    Center,
    /// Fitting fails with a degenerate-normalization error.
    Reject,
}

/// Loss after one training epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochLog {
    /// 1-based epoch number.
    pub epoch: usize,
    pub loss: f64,
}

/// Per-epoch losses for one training run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochLog>,
}

impl TrainingHistory {
    pub fn push(&mut self, epoch: usize, loss: f64) {
        self.epochs.push(EpochLog { epoch, loss });
    }

    #[must_use]
    pub fn first_loss(&self) -> Option<f64> {
        self.epochs.first().map(|e| e.loss)
    }

    #[must_use]
    pub fn last_loss(&self) -> Option<f64> {
        self.epochs.last().map(|e| e.loss)
    }
}

/// Trainable model family and its architecture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ModelConfig {
    /// Feed-forward regressor: ReLU hidden layers, one linear output per
    /// label channel.
    Dense {
        hidden: Vec<usize>,
        /// Dropout rate after the first hidden layer (training only).
        #[serde(default)]
        dropout: f64,
    },
    /// Stacked LSTM over `lookback` timesteps with a linear head.
    Lstm { units: Vec<usize> },
    /// Feed-forward binary classifier with a sigmoid output.
    Classifier { hidden: Vec<usize> },
}

impl ModelConfig {
    /// Short family name used in logs.
    #[must_use]
    pub const fn family(&self) -> &'static str {
        match self {
            Self::Dense { .. } => "dense",
            Self::Lstm { .. } => "lstm",
            Self::Classifier { .. } => "classifier",
        }
    }
}

/// Optimizer and loop settings for one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    /// Number of full passes over the training set. All are run.
    pub epochs: usize,
    /// Adam step size.
    pub learning_rate: f64,
    /// Examples per gradient step.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Seed for weight initialization, dropout, and shuffling.
    #[serde(default)]
    pub seed: u64,
    /// Shuffle example order every epoch.
    #[serde(default = "default_shuffle")]
    pub shuffle: bool,
}

const fn default_batch_size() -> usize {
    32
}

const fn default_shuffle() -> bool {
    true
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            epochs: 100,
            learning_rate: 0.001,
            batch_size: default_batch_size(),
            seed: 0,
            shuffle: default_shuffle(),
        }
    }
}

/// Deterministic features derived from a month's chronological index.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FeatureScheme {
    /// `[i]`
    TrendOnly,
    /// `[i, sin(2π(i mod 12)/12), cos(2π(i mod 12)/12)]`
    TrendSeasonal,
}

impl FeatureScheme {
    /// Length of every feature vector this scheme produces.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::TrendOnly => 1,
            Self::TrendSeasonal => 3,
        }
    }

    /// Feature vector for month index `i`.
    ///
    /// Indices past the observed range are valid; that is how future months
    /// get their features.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn encode_index(self, i: usize) -> Vec<f64> {
        let x = i as f64;
        match self {
            Self::TrendOnly => vec![x],
            Self::TrendSeasonal => {
                let angle = 2.0 * std::f64::consts::PI * (i % 12) as f64 / 12.0;
                vec![x, angle.sin(), angle.cos()]
            }
        }
    }

    /// Feature vectors for indices `start..start + len`.
    #[must_use]
    pub fn encode_range(self, start: usize, len: usize) -> Vec<Vec<f64>> {
        (start..start + len).map(|i| self.encode_index(i)).collect()
    }
}

/// Which sliding windows are kept as training examples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowFilter {
    /// Every full window.
    #[default]
    All,
    /// Only windows whose inputs and target are all strictly positive.
    RequirePositive,
}

/// How future months are predicted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ForecastStrategy {
    /// Each future month is predicted from its own engineered features.
    Independent { scheme: FeatureScheme },
    /// Each prediction is fed back into a rolling window of raw values.
    Autoregressive {
        lookback: usize,
        #[serde(default)]
        filter: WindowFilter,
    },
}

impl ForecastStrategy {
    /// Months of history needed before a model can be built.
    ///
    /// Independent strategies use the same twelve-month floor as a twelve
    /// month window so every profile rejects the same short inputs.
    #[must_use]
    pub const fn min_history(&self) -> usize {
        match self {
            Self::Independent { .. } => DEFAULT_LOOKBACK + 1,
            Self::Autoregressive { lookback, .. } => *lookback + 1,
        }
    }
}

/// Window length used throughout the built-in profiles.
pub const DEFAULT_LOOKBACK: usize = 12;

/// One autoregressive prediction step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoregressiveStep {
    pub month: String,
    /// One value per channel, after stabilization.
    pub values: Vec<f64>,
    /// Whether any channel was replaced by the window mean.
    pub substituted: bool,
}

/// One named line for the rendering collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub name: String,
    /// One entry per chart label; `None` leaves a gap.
    pub points: Vec<Option<f64>>,
}

/// Everything the rendering collaborator needs to draw one chart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartPayload {
    pub labels: Vec<String>,
    pub series: Vec<ChartSeries>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

/// A dated value in a [`NarrativeSummary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub date: String,
    pub value: f64,
}

/// Historical and predicted series handed to the narrative collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NarrativeSummary {
    pub historical: Vec<DataPoint>,
    pub predicted: Vec<DataPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seasonal_features_lie_on_unit_circle() {
        for i in 0..60 {
            let f = FeatureScheme::TrendSeasonal.encode_index(i);
            assert_eq!(f.len(), 3);
            assert!((f[1].powi(2) + f[2].powi(2) - 1.0).abs() < 1e-12, "index {i}");
        }
    }

    #[test]
    fn seasonal_features_repeat_every_twelve_months() {
        let a = FeatureScheme::TrendSeasonal.encode_index(3);
        let b = FeatureScheme::TrendSeasonal.encode_index(15);
        assert!((a[1] - b[1]).abs() < 1e-12);
        assert!((a[2] - b[2]).abs() < 1e-12);
        assert!((b[0] - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn encode_range_extends_past_history() {
        let rows = FeatureScheme::TrendOnly.encode_range(10, 3);
        assert_eq!(rows, vec![vec![10.0], vec![11.0], vec![12.0]]);
    }

    #[test]
    fn degenerate_stats() {
        let stats = NormalizationStats {
            min: 10.0,
            max: 10.0,
        };
        assert!(stats.is_degenerate());
        assert!(
            !NormalizationStats {
                min: 0.0,
                max: 1.0
            }
            .is_degenerate()
        );
        assert!(
            !NormalizationStats {
                min: 3.0,
                max: 3.0 + 1e-9
            }
            .is_degenerate()
        );
    }

    #[test]
    fn model_config_from_toml() {
        let config: ModelConfig = toml::from_str(
            r#"
family = "dense"
hidden = [10]
dropout = 0.2
"#,
        )
        .unwrap();
        assert_eq!(
            config,
            ModelConfig::Dense {
                hidden: vec![10],
                dropout: 0.2,
            }
        );
        assert_eq!(config.family(), "dense");
    }

    #[test]
    fn strategy_min_history() {
        let ar = ForecastStrategy::Autoregressive {
            lookback: 12,
            filter: WindowFilter::RequirePositive,
        };
        assert_eq!(ar.min_history(), 13);
        let ind = ForecastStrategy::Independent {
            scheme: FeatureScheme::TrendSeasonal,
        };
        assert_eq!(ind.min_history(), 13);
    }

    #[test]
    fn forecast_point_serializes_camel_case() {
        let json = serde_json::to_string(&ForecastPoint {
            month: "2024-01".to_string(),
            predicted_value: 2.5,
        })
        .unwrap();
        assert_eq!(json, r#"{"month":"2024-01","predictedValue":2.5}"#);
    }

    #[test]
    fn annotation_kind_display() {
        assert_eq!(AnnotationKind::Peak.to_string(), "peak");
        assert_eq!(AnnotationKind::Trough.as_ref(), "trough");
    }
}
