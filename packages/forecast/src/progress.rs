//! Progress reporting for model training.
//!
//! Defines a [`TrainingProgress`] trait that decouples epoch reporting from
//! any particular sink (log lines, a UI status field, or silence).

use std::sync::Arc;

use crime_forecast_forecast_models::TrainingHistory;

/// Receives training progress from a [`Trainer`](crate::trainer::Trainer).
///
/// Implementations must be `Send + Sync` so that a run can share one
/// reporter across tasks.
pub trait TrainingProgress: Send + Sync {
    /// Called once before the first epoch with the epoch budget.
    fn start(&self, model: &str, epochs: usize);

    /// Called after every epoch with its 1-based number and mean loss.
    fn epoch_end(&self, epoch: usize, loss: f64);

    /// Called once after the last epoch.
    fn finish(&self, history: &TrainingHistory);
}

/// Silently ignores all progress updates.
pub struct NullProgress;

impl TrainingProgress for NullProgress {
    fn start(&self, _model: &str, _epochs: usize) {}
    fn epoch_end(&self, _epoch: usize, _loss: f64) {}
    fn finish(&self, _history: &TrainingHistory) {}
}

/// Returns a shared [`NullProgress`] instance for convenient use.
#[must_use]
pub fn null_progress() -> Arc<dyn TrainingProgress> {
    Arc::new(NullProgress)
}

/// Logs the loss every `every` epochs at debug level, and the start and end
/// of training at info level.
pub struct LogProgress {
    every: usize,
}

impl LogProgress {
    #[must_use]
    pub const fn new(every: usize) -> Self {
        Self { every }
    }
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new(10)
    }
}

impl TrainingProgress for LogProgress {
    fn start(&self, model: &str, epochs: usize) {
        log::info!("training {model} model for {epochs} epochs");
    }

    fn epoch_end(&self, epoch: usize, loss: f64) {
        if self.every > 0 && epoch % self.every == 0 {
            log::debug!("epoch {epoch}: loss = {loss:.6}");
        }
    }

    fn finish(&self, history: &TrainingHistory) {
        if let Some(loss) = history.last_loss() {
            log::info!(
                "training finished after {} epochs, final loss {loss:.6}",
                history.epochs.len()
            );
        }
    }
}
