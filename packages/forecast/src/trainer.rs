//! Cooperative async training loop.
//!
//! Training is CPU-bound but runs inside the async pipeline: after every
//! epoch the trainer reports progress, yields to the runtime so other tasks
//! (UI updates, a newer run starting) can make progress, and then checks
//! whether it has been cancelled.

use std::sync::Arc;

use crime_forecast_forecast_models::{FitOptions, TrainingHistory};

use crate::ForecastError;
use crate::model::{ForecastModel, ensure_trainable, validate_options};
use crate::progress::{TrainingProgress, null_progress};

/// Returns `true` once training should stop.
pub type CancelCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// Drives a [`ForecastModel`] through its full epoch budget.
#[derive(Clone)]
pub struct Trainer {
    options: FitOptions,
    progress: Arc<dyn TrainingProgress>,
    cancelled: Option<CancelCheck>,
}

impl Trainer {
    #[must_use]
    pub fn new(options: FitOptions) -> Self {
        Self {
            options,
            progress: null_progress(),
            cancelled: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn TrainingProgress>) -> Self {
        self.progress = progress;
        self
    }

    /// Checked after every epoch; when it returns `true` training stops
    /// with [`ForecastError::Cancelled`].
    #[must_use]
    pub fn with_cancellation(mut self, check: CancelCheck) -> Self {
        self.cancelled = Some(check);
        self
    }

    #[must_use]
    pub const fn options(&self) -> &FitOptions {
        &self.options
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.as_ref().is_some_and(|check| check())
    }

    /// Trains `model` for every configured epoch.
    ///
    /// # Errors
    ///
    /// * [`ForecastError::InsufficientData`] with fewer than two examples
    /// * [`ForecastError::InvalidParameter`] for unusable options
    /// * [`ForecastError::ShapeMismatch`] for malformed rows
    /// * [`ForecastError::Cancelled`] if the cancellation check fires
    pub async fn train(
        &self,
        model: &mut dyn ForecastModel,
        inputs: &[Vec<f64>],
        labels: &[Vec<f64>],
    ) -> Result<TrainingHistory, ForecastError> {
        ensure_trainable(inputs.len())?;
        validate_options(&self.options)?;

        if self.is_cancelled() {
            return Err(ForecastError::Cancelled);
        }

        self.progress.start(model.name(), self.options.epochs);
        let mut history = TrainingHistory::default();

        for epoch in 1..=self.options.epochs {
            let loss = model.train_epoch(inputs, labels, &self.options)?;
            history.push(epoch, loss);
            self.progress.epoch_end(epoch, loss);

            tokio::task::yield_now().await;

            if self.is_cancelled() {
                log::info!("training cancelled after epoch {epoch}");
                return Err(ForecastError::Cancelled);
            }
        }

        self.progress.finish(&history);
        Ok(history)
    }
}
