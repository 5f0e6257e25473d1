//! Geolocated outcome experiment.
//!
//! Trains a binary classifier to predict whether an incident at a given
//! latitude and longitude has a recorded outcome, then scores a regular
//! grid over the observed bounding box.

use std::sync::Arc;

use crime_forecast_crime_models::OutcomeSample;
use crime_forecast_forecast::ForecastError;
use crime_forecast_forecast::model::{Classifier, ForecastModel as _};
use crime_forecast_forecast::normalize::{Normalizer, transform};
use crime_forecast_forecast::progress::{TrainingProgress, null_progress};
use crime_forecast_forecast::trainer::{CancelCheck, Trainer};
use crime_forecast_forecast_models::{FitOptions, NormalizationStats, TrainingHistory};
use crime_forecast_ingest::archive::read_outcome_samples;
use crime_forecast_ingest_models::{IngestProfile, IngestReport};
use serde::{Deserialize, Serialize};

use crate::PipelineError;

/// Classifier architecture and training settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeSettings {
    pub hidden: Vec<usize>,
    pub fit: FitOptions,
    /// Probability at or above which an incident counts as resolved.
    pub threshold: f64,
    /// Points per axis of the scored grid.
    pub grid_size: usize,
}

impl Default for OutcomeSettings {
    fn default() -> Self {
        Self {
            hidden: vec![10, 10, 10, 10],
            fit: FitOptions {
                learning_rate: 0.0005,
                ..FitOptions::default()
            },
            threshold: 0.5,
            grid_size: 20,
        }
    }
}

/// Predicted probability of a recorded outcome at one grid point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridPrediction {
    pub latitude: f64,
    pub longitude: f64,
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeReport {
    pub samples: usize,
    /// Fraction of samples with a recorded outcome.
    pub resolved_share: f64,
    /// Training-set accuracy at the configured threshold.
    pub accuracy: f64,
    pub history: TrainingHistory,
    pub grid: Vec<GridPrediction>,
    pub ingest: IngestReport,
}

/// `n` evenly spaced values from `min` to `max` inclusive.
#[allow(clippy::cast_precision_loss)]
fn linspace(min: f64, max: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![min],
        _ => {
            let step = (max - min) / (n - 1) as f64;
            (0..n).map(|i| step.mul_add(i as f64, min)).collect()
        }
    }
}

/// Runs the outcome experiment over archive bytes.
pub struct OutcomeExperiment {
    ingest: IngestProfile,
    settings: OutcomeSettings,
    progress: Arc<dyn TrainingProgress>,
}

impl OutcomeExperiment {
    #[must_use]
    pub fn new(ingest: IngestProfile, settings: OutcomeSettings) -> Self {
        Self {
            ingest,
            settings,
            progress: null_progress(),
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn TrainingProgress>) -> Self {
        self.progress = progress;
        self
    }

    /// Reads samples on the blocking pool, then trains and scores.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::Ingest`] if the archive cannot be opened
    /// * [`PipelineError::Join`] if the blocking task fails
    /// * any [`PipelineError::Forecast`] from [`Self::train`]
    pub async fn run(
        &self,
        bytes: Vec<u8>,
        cancel: Option<CancelCheck>,
    ) -> Result<OutcomeReport, PipelineError> {
        let ingest = self.ingest.clone();
        let (samples, report) =
            tokio::task::spawn_blocking(move || read_outcome_samples(&bytes, &ingest)).await??;

        log::info!(
            "outcome experiment: {} samples from {} entries",
            samples.len(),
            report.entries_parsed
        );

        let mut outcome = self.train(&samples, cancel).await?;
        outcome.ingest = report;
        Ok(outcome)
    }

    /// Trains the classifier on `samples` and scores the grid.
    ///
    /// Latitude and longitude are each rescaled to `[0, 1]` with their own
    /// statistics.
    ///
    /// # Errors
    ///
    /// * [`ForecastError::InsufficientData`] with fewer than two samples
    /// * [`ForecastError::Cancelled`] if `cancel` fires
    /// * [`ForecastError::InvalidParameter`] for unusable settings
    #[allow(clippy::cast_precision_loss)]
    pub async fn train(
        &self,
        samples: &[OutcomeSample],
        cancel: Option<CancelCheck>,
    ) -> Result<OutcomeReport, PipelineError> {
        let normalizer = Normalizer::default();
        let lat_stats = normalizer.fit(samples.iter().map(|s| &s.latitude))?;
        let lon_stats = normalizer.fit(samples.iter().map(|s| &s.longitude))?;
        let encode = |lat: f64, lon: f64| vec![transform(lat, &lat_stats), transform(lon, &lon_stats)];

        let inputs: Vec<Vec<f64>> = samples
            .iter()
            .map(|s| encode(s.latitude, s.longitude))
            .collect();
        let labels: Vec<Vec<f64>> = samples
            .iter()
            .map(|s| vec![if s.resolved { 1.0 } else { 0.0 }])
            .collect();

        let mut model = Classifier::new(2, &self.settings.hidden, 1, self.settings.fit.seed)?;
        let mut trainer =
            Trainer::new(self.settings.fit.clone()).with_progress(self.progress.clone());
        if let Some(cancel) = cancel {
            trainer = trainer.with_cancellation(cancel);
        }
        let history = trainer.train(&mut model, &inputs, &labels).await?;

        let accuracy = model.accuracy(&inputs, &labels, self.settings.threshold)?;
        let grid = self.score_grid(&model, &lat_stats, &lon_stats, encode)?;

        let resolved = samples.iter().filter(|s| s.resolved).count();
        Ok(OutcomeReport {
            samples: samples.len(),
            resolved_share: resolved as f64 / samples.len() as f64,
            accuracy,
            history,
            grid,
            ingest: IngestReport::default(),
        })
    }

    fn score_grid(
        &self,
        model: &Classifier,
        lat_stats: &NormalizationStats,
        lon_stats: &NormalizationStats,
        encode: impl Fn(f64, f64) -> Vec<f64>,
    ) -> Result<Vec<GridPrediction>, ForecastError> {
        let n = self.settings.grid_size;
        let coords: Vec<(f64, f64)> = linspace(lat_stats.min, lat_stats.max, n)
            .into_iter()
            .flat_map(|lat| {
                linspace(lon_stats.min, lon_stats.max, n)
                    .into_iter()
                    .map(move |lon| (lat, lon))
            })
            .collect();

        let rows: Vec<Vec<f64>> = coords.iter().map(|&(lat, lon)| encode(lat, lon)).collect();
        let predictions = model.predict(&rows)?;

        Ok(coords
            .into_iter()
            .zip(predictions)
            .map(|((latitude, longitude), p)| GridPrediction {
                latitude,
                longitude,
                probability: p[0],
            })
            .collect())
    }
}
