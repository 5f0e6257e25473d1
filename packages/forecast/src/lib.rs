#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Monthly crime count forecasting.
//!
//! Turns a month-ordered series into training examples ([`features`]),
//! rescales them to `[0, 1]` ([`normalize`]), fits a seeded model from the
//! [`model`] family through the cooperative async [`trainer`], and rolls the
//! trained model forward over future months ([`multistep`]). Predicted
//! sequences can then be scanned for peaks and troughs ([`annotate`]).
//!
//! Models are plain owned values: a run builds one, trains it, forecasts
//! with it, and drops it. Nothing is cached between runs.

pub mod annotate;
pub mod features;
pub mod model;
pub mod multistep;
pub mod normalize;
pub mod progress;
pub mod trainer;

use crime_forecast_crime_models::InvalidMonthError;

/// Errors that can occur while building, training, or running a forecast.
#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    /// Too few months, windows, or examples to proceed.
    #[error("Insufficient data: need at least {needed} {unit}, got {got}")]
    InsufficientData {
        /// What was being counted (e.g. `"months"`).
        unit: &'static str,
        needed: usize,
        got: usize,
    },

    /// Every value was identical and the normalizer rejects zero variance.
    #[error("Cannot normalize: every value equals {value}")]
    DegenerateNormalization { value: f64 },

    /// A row or batch did not have the width or length the model expects.
    #[error("Shape mismatch for {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// A month label could not be parsed or advanced.
    #[error(transparent)]
    InvalidMonth(#[from] InvalidMonthError),

    /// A configuration value is out of range.
    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// Training was abandoned because a newer run took over.
    #[error("Training cancelled")]
    Cancelled,
}

impl ForecastError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }
}
