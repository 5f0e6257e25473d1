//! Upload-driven runs against a shared display board.

use std::sync::Arc;

use crime_forecast_ai::Recommendation;
use crime_forecast_ai::providers::LlmProvider;
use crime_forecast_ingest_models::IngestReport;

use crate::PipelineError;
use crate::chart::{forecast_chart, historical_chart, narrative_summary};
use crate::display::{DisplayBoard, ForecastView, HistoricalView};
use crate::pipeline::{ForecastPipeline, ForecastRun};
use crate::run::{RunCoordinator, RunTicket};

/// What one successful run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub generation: u64,
    pub report: IngestReport,
    pub months: usize,
    pub forecast: ForecastRun,
    pub recommendation: Option<Recommendation>,
}

/// Runs a [`ForecastPipeline`] once per upload.
///
/// Submitting a new archive supersedes any run still in flight: the older
/// run stops training at its next epoch boundary and none of its results
/// reach the board.
pub struct ForecastSession {
    pipeline: ForecastPipeline,
    coordinator: RunCoordinator,
    board: Arc<DisplayBoard>,
    narrator: Option<Arc<dyn LlmProvider>>,
}

impl ForecastSession {
    #[must_use]
    pub fn new(pipeline: ForecastPipeline) -> Self {
        Self {
            pipeline,
            coordinator: RunCoordinator::new(),
            board: Arc::new(DisplayBoard::new()),
            narrator: None,
        }
    }

    /// Requests a narrative for every successful forecast.
    #[must_use]
    pub fn with_narrator(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.narrator = Some(provider);
        self
    }

    #[must_use]
    pub const fn board(&self) -> &Arc<DisplayBoard> {
        &self.board
    }

    #[must_use]
    pub const fn coordinator(&self) -> &RunCoordinator {
        &self.coordinator
    }

    /// Runs the pipeline on `bytes` as the new current run.
    ///
    /// Failures other than being superseded are shown on the board as a
    /// single status message. Results already on the board stay there.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::Superseded`] if another submission started first
    /// * any other [`PipelineError`] that ended the run
    pub async fn submit(&self, bytes: Vec<u8>) -> Result<RunSummary, PipelineError> {
        let ticket = self.coordinator.begin_run();

        let result = self.run(&ticket, bytes).await;

        match &result {
            Ok(summary) => {
                self.board.show_status(&ticket, "Done");
                log::info!(
                    "run {} finished: {} months, {} predictions",
                    summary.generation,
                    summary.months,
                    summary.forecast.points.len()
                );
            }
            Err(e) if e.is_superseded() => {
                log::info!("run {} superseded", ticket.generation());
            }
            Err(e) => {
                log::warn!("run {} failed: {e}", ticket.generation());
                self.board.show_status(&ticket, e.user_message());
            }
        }

        result
    }

    async fn run(&self, ticket: &RunTicket, bytes: Vec<u8>) -> Result<RunSummary, PipelineError> {
        let superseded = || PipelineError::Superseded {
            generation: ticket.generation(),
        };

        self.board.show_status(ticket, "Reading archive...");
        let contents = self.pipeline.read(bytes).await?;
        ticket.ensure_current()?;

        let historical = HistoricalView {
            chart: historical_chart(&contents.table),
            report: contents.report.clone(),
        };
        if !self.board.show_historical(ticket, historical) {
            return Err(superseded());
        }

        self.board.show_status(ticket, "Training model...");
        let forecast = self
            .pipeline
            .forecast(&contents.table, Some(ticket.cancel_check()))
            .await
            .map_err(|e| if e.is_superseded() { superseded() } else { e })?;

        let view = ForecastView {
            chart: forecast_chart(&contents.table, &forecast.points, &forecast.annotations),
            points: forecast.points.clone(),
            annotations: forecast.annotations.clone(),
        };
        if !self.board.show_forecast(ticket, view) {
            return Err(superseded());
        }

        let recommendation = match &self.narrator {
            Some(narrator) => {
                self.board.show_status(ticket, "Generating recommendations...");
                let summary = narrative_summary(&contents.table, &forecast.points);
                let recommendation = crime_forecast_ai::recommend(narrator.as_ref(), &summary).await;
                if !self.board.show_recommendation(ticket, recommendation.clone()) {
                    return Err(superseded());
                }
                Some(recommendation)
            }
            None => None,
        };

        Ok(RunSummary {
            generation: ticket.generation(),
            report: contents.report,
            months: contents.table.len(),
            forecast,
            recommendation,
        })
    }
}

#[cfg(test)]
mod tests {
    use crime_forecast_ai::AiError;

    use super::*;
    use crate::test_support::{street_csv, zip_bytes};

    struct Failing;

    #[async_trait::async_trait]
    impl LlmProvider for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn complete(&self, _system: &str, _user: &str) -> Result<String, AiError> {
            Err(AiError::Provider {
                message: "offline".to_string(),
            })
        }
    }

    struct Echo;

    #[async_trait::async_trait]
    impl LlmProvider for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn complete(&self, _system: &str, user: &str) -> Result<String, AiError> {
            Ok(format!("{} chars", user.len()))
        }
    }

    fn quick_session() -> ForecastSession {
        let mut profile = crate::registry::profile("trend").unwrap();
        profile.fit.epochs = 5;
        profile.horizon = crate::config::Horizon::Months(2);
        ForecastSession::new(ForecastPipeline::new(profile).unwrap())
    }

    fn archive(months: u32) -> Vec<u8> {
        let csv = street_csv("2022-06", months, 4, "Robbery");
        zip_bytes(&[("force/2022-06-street.csv", csv.as_str())])
    }

    #[tokio::test]
    async fn successful_run_fills_the_board() {
        let session = quick_session().with_narrator(Arc::new(Echo));
        let summary = session.submit(archive(13)).await.unwrap();

        assert_eq!(summary.generation, 1);
        assert_eq!(summary.months, 13);
        assert_eq!(summary.forecast.points.len(), 2);
        assert!(matches!(
            summary.recommendation,
            Some(Recommendation::Markdown(_))
        ));

        let state = session.board().snapshot();
        assert!(state.is_consistent());
        assert_eq!(state.status.unwrap().value, "Done");
        let forecast = state.forecast.unwrap().value;
        assert_eq!(forecast.chart.labels.len(), 15);
        assert_eq!(forecast.points, summary.forecast.points);
    }

    #[tokio::test]
    async fn narrator_failure_degrades_to_placeholder() {
        let session = quick_session().with_narrator(Arc::new(Failing));
        let summary = session.submit(archive(13)).await.unwrap();

        assert_eq!(
            summary.recommendation,
            Some(Recommendation::Placeholder(
                crime_forecast_ai::ERROR_PLACEHOLDER.to_string()
            ))
        );
        let state = session.board().snapshot();
        assert!(state.recommendation.unwrap().value.is_placeholder());
    }

    #[tokio::test]
    async fn short_history_shows_one_message_and_keeps_history() {
        let session = quick_session();
        let err = session.submit(archive(5)).await.unwrap_err();

        assert!(matches!(err, PipelineError::Forecast(_)));
        let state = session.board().snapshot();
        assert_eq!(state.status.unwrap().value, err.user_message());
        assert!(state.historical.is_some());
        assert!(state.forecast.is_none());
    }

    #[tokio::test]
    async fn bad_archive_leaves_previous_results_in_place() {
        let session = quick_session();
        session.submit(archive(13)).await.unwrap();
        let before = session.board().snapshot();

        let err = session.submit(b"garbage".to_vec()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Ingest(_)));

        let after = session.board().snapshot();
        assert_eq!(after.historical, before.historical);
        assert_eq!(after.forecast, before.forecast);
        assert_eq!(
            after.status.unwrap().value,
            "The uploaded file could not be opened as a zip archive."
        );
    }

    #[tokio::test]
    async fn newer_upload_supersedes_the_run_in_flight() {
        let session = quick_session();

        let (first, second) = tokio::join!(session.submit(archive(13)), session.submit(archive(14)));

        assert!(matches!(
            first,
            Err(PipelineError::Superseded { generation: 1 })
        ));
        let second = second.unwrap();
        assert_eq!(second.generation, 2);
        assert_eq!(second.months, 14);

        let state = session.board().snapshot();
        assert!(state.is_consistent());
        assert_eq!(state.historical.unwrap().generation, 2);
        assert_eq!(state.forecast.unwrap().generation, 2);
        assert_eq!(state.status.unwrap().generation, 2);
    }
}
