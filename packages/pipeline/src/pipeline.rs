//! One profile, one archive, one forecast.

use std::sync::Arc;

use crime_forecast_crime_models::MonthlyTable;
use crime_forecast_forecast::ForecastError;
use crime_forecast_forecast::annotate::TrendAnnotator;
use crime_forecast_forecast::features::{
    WindowedSet, counts_to_f64, index_features, scalar_rows, sliding_windows,
};
use crime_forecast_forecast::model::{ModelShape, build_model, ensure_trainable};
use crime_forecast_forecast::multistep::{MultiStepForecaster, steps_to_points};
use crime_forecast_forecast::normalize::{Normalizer, transform_rows};
use crime_forecast_forecast::progress::{TrainingProgress, null_progress};
use crime_forecast_forecast::trainer::{CancelCheck, Trainer};
use crime_forecast_forecast_models::{
    Annotation, AutoregressiveStep, ForecastPoint, ForecastStrategy, ModelConfig, ScalingStats,
    TrainingHistory,
};
use crime_forecast_ingest::archive::{ArchiveContents, read_archive};
use crime_forecast_ingest_models::IngestProfile;

use crate::PipelineError;
use crate::config::{PipelineProfile, SeriesKind};

/// Everything a finished forecast produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRun {
    pub points: Vec<ForecastPoint>,
    /// Per-channel autoregressive steps; empty for independent strategies.
    pub steps: Vec<AutoregressiveStep>,
    pub annotations: Vec<Annotation>,
    pub history: TrainingHistory,
    /// The statistics the model was trained with.
    pub stats: ScalingStats,
    /// Number of training examples.
    pub examples: usize,
}

/// Executes a [`PipelineProfile`].
#[derive(Clone)]
pub struct ForecastPipeline {
    profile: PipelineProfile,
    ingest: IngestProfile,
    progress: Arc<dyn TrainingProgress>,
}

impl std::fmt::Debug for ForecastPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForecastPipeline")
            .field("profile", &self.profile.id)
            .field("ingest", &self.ingest.id)
            .finish_non_exhaustive()
    }
}

impl ForecastPipeline {
    /// Resolves the profile's ingest profile from the built-in registry.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::UnknownProfile`] if the ingest profile does not
    ///   exist
    pub fn new(profile: PipelineProfile) -> Result<Self, PipelineError> {
        let ingest = crime_forecast_ingest::registry::profile(&profile.ingest).ok_or_else(|| {
            PipelineError::UnknownProfile {
                kind: "ingest",
                id: profile.ingest.clone(),
            }
        })?;
        Ok(Self::with_ingest(profile, ingest))
    }

    /// Looks up a built-in pipeline profile by id.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::UnknownProfile`] if either profile does not exist
    pub fn from_profile_id(id: &str) -> Result<Self, PipelineError> {
        Self::new(crate::registry::profile(id)?)
    }

    #[must_use]
    pub fn with_ingest(profile: PipelineProfile, ingest: IngestProfile) -> Self {
        Self {
            profile,
            ingest,
            progress: null_progress(),
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn TrainingProgress>) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub const fn profile(&self) -> &PipelineProfile {
        &self.profile
    }

    #[must_use]
    pub const fn ingest(&self) -> &IngestProfile {
        &self.ingest
    }

    /// Decodes and aggregates an archive on the blocking pool.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::Ingest`] if the archive cannot be opened
    /// * [`PipelineError::Join`] if the blocking task fails
    pub async fn read(&self, bytes: Vec<u8>) -> Result<ArchiveContents, PipelineError> {
        let ingest = self.ingest.clone();
        Ok(tokio::task::spawn_blocking(move || read_archive(&bytes, &ingest)).await??)
    }

    fn series(&self, table: &MonthlyTable) -> Result<Vec<Vec<f64>>, ForecastError> {
        match self.profile.series {
            SeriesKind::Totals => Ok(scalar_rows(&counts_to_f64(&table.totals()))),
            SeriesKind::PerType => {
                if !table.tracks_types() {
                    return Err(ForecastError::InvalidParameter {
                        message: format!(
                            "profile {} needs per-type counts but ingest profile {} does not \
                             track them",
                            self.profile.id, self.ingest.id
                        ),
                    });
                }
                Ok(table
                    .type_matrix()
                    .iter()
                    .map(|row| counts_to_f64(row))
                    .collect())
            }
        }
    }

    /// Training examples and the shape of the model that fits them.
    fn training_set(
        &self,
        series: &[Vec<f64>],
    ) -> Result<(WindowedSet, ModelShape), ForecastError> {
        let channels = series.first().map_or(0, Vec::len);

        match &self.profile.strategy {
            ForecastStrategy::Independent { scheme } => {
                if channels != 1 {
                    return Err(ForecastError::ShapeMismatch {
                        what: "independent forecast channels",
                        expected: 1,
                        got: channels,
                    });
                }
                Ok((
                    index_features(*scheme, series)?,
                    ModelShape::flat(scheme.width(), 1),
                ))
            }
            ForecastStrategy::Autoregressive { lookback, filter } => {
                let set = sliding_windows(series, *lookback, *filter)?;
                let input_width = lookback * channels;
                let shape = match self.profile.model {
                    ModelConfig::Lstm { .. } => ModelShape {
                        input_width,
                        output_width: channels,
                        timesteps: *lookback,
                    },
                    _ => ModelShape::flat(input_width, channels),
                };
                Ok((set, shape))
            }
        }
    }

    /// Trains a fresh model on `table` and forecasts past its last month.
    ///
    /// # Errors
    ///
    /// * [`ForecastError::InsufficientData`] with fewer months than the
    ///   profile needs, or too few training examples after windowing
    /// * [`ForecastError::DegenerateNormalization`] under the reject policy
    /// * [`ForecastError::Cancelled`] if `cancel` fires during training
    /// * any other [`ForecastError`] from model construction or forecasting
    pub async fn forecast(
        &self,
        table: &MonthlyTable,
        cancel: Option<CancelCheck>,
    ) -> Result<ForecastRun, PipelineError> {
        let needed = self.profile.min_history();
        let last_month = match table.last_month() {
            Some(month) if table.len() >= needed => month,
            _ => {
                return Err(ForecastError::InsufficientData {
                    unit: "months of history",
                    needed,
                    got: table.len(),
                }
                .into());
            }
        };

        let series = self.series(table)?;
        let (set, shape) = self.training_set(&series)?;
        let examples = set.len();
        ensure_trainable(examples)?;

        let stats = Normalizer::new(self.profile.zero_variance).fit_set(&set)?;
        let inputs = transform_rows(&set.inputs, &stats.input);
        let labels = transform_rows(&set.labels, &stats.label);
        drop(set);

        let mut model = build_model(&self.profile.model, shape, self.profile.fit.seed)?;

        let mut trainer = Trainer::new(self.profile.fit.clone()).with_progress(self.progress.clone());
        if let Some(cancel) = cancel {
            trainer = trainer.with_cancellation(cancel);
        }

        log::info!(
            "{}: training on {examples} examples from {} months",
            self.profile.id,
            table.len()
        );
        let history = trainer.train(model.as_mut(), &inputs, &labels).await?;
        drop((inputs, labels));

        let horizon = self.profile.horizon.resolve(table.len());
        let forecaster = MultiStepForecaster::new(model.as_ref(), stats);

        let (points, steps) = match &self.profile.strategy {
            ForecastStrategy::Independent { scheme } => (
                forecaster.independent(*scheme, table.len(), last_month, horizon)?,
                Vec::new(),
            ),
            ForecastStrategy::Autoregressive { lookback, .. } => {
                let steps = forecaster.autoregressive(&series, *lookback, last_month, horizon)?;
                (steps_to_points(&steps), steps)
            }
        };

        let annotations = TrendAnnotator::annotate(&points);
        log::info!(
            "{}: forecast {} months, {} annotations",
            self.profile.id,
            points.len(),
            annotations.len()
        );

        Ok(ForecastRun {
            points,
            steps,
            annotations,
            history,
            stats,
            examples,
        })
    }
}
