//! Shared display state, written only by the current run.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crime_forecast_ai::Recommendation;
use crime_forecast_forecast_models::{Annotation, ChartPayload, ForecastPoint};
use crime_forecast_ingest_models::IngestReport;

use crate::run::RunTicket;

/// A display section and the run generation that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Tagged<T> {
    pub generation: u64,
    pub value: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalView {
    pub chart: ChartPayload,
    pub report: IngestReport,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastView {
    pub chart: ChartPayload,
    pub points: Vec<ForecastPoint>,
    pub annotations: Vec<Annotation>,
}

/// Everything currently on screen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayState {
    pub status: Option<Tagged<String>>,
    pub historical: Option<Tagged<HistoricalView>>,
    pub forecast: Option<Tagged<ForecastView>>,
    pub recommendation: Option<Tagged<Recommendation>>,
}

impl DisplayState {
    /// No forecast or recommendation is shown against history from a
    /// different run.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let history = self.historical.as_ref().map(|h| h.generation);
        let forecast = self.forecast.as_ref().map(|f| f.generation);
        let recommendation = self.recommendation.as_ref().map(|r| r.generation);

        forecast.is_none_or(|g| Some(g) == history)
            && recommendation.is_none_or(|g| Some(g) == forecast)
    }
}

/// Guards [`DisplayState`] so that stale runs can never write to it.
///
/// Every `show_*` method returns `false` and leaves the state untouched if
/// the ticket is no longer current.
#[derive(Debug, Default)]
pub struct DisplayBoard {
    state: Mutex<DisplayState>,
}

impl DisplayBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, DisplayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> DisplayState {
        self.lock().clone()
    }

    fn apply(&self, ticket: &RunTicket, update: impl FnOnce(&mut DisplayState, u64) -> bool) -> bool {
        let mut state = self.lock();
        if !ticket.is_current() {
            log::debug!(
                "discarding display update from stale run {}",
                ticket.generation()
            );
            return false;
        }
        update(&mut state, ticket.generation())
    }

    pub fn show_status(&self, ticket: &RunTicket, message: impl Into<String>) -> bool {
        let message = message.into();
        self.apply(ticket, |state, generation| {
            state.status = Some(Tagged {
                generation,
                value: message,
            });
            true
        })
    }

    /// Shows new history and clears any forecast or recommendation from
    /// an older run.
    pub fn show_historical(&self, ticket: &RunTicket, view: HistoricalView) -> bool {
        self.apply(ticket, |state, generation| {
            if state.forecast.as_ref().is_some_and(|f| f.generation != generation) {
                state.forecast = None;
            }
            if state
                .recommendation
                .as_ref()
                .is_some_and(|r| r.generation != generation)
            {
                state.recommendation = None;
            }
            state.historical = Some(Tagged {
                generation,
                value: view,
            });
            true
        })
    }

    /// Shows a forecast, but only next to history from the same run.
    pub fn show_forecast(&self, ticket: &RunTicket, view: ForecastView) -> bool {
        self.apply(ticket, |state, generation| {
            if state.historical.as_ref().is_none_or(|h| h.generation != generation) {
                return false;
            }
            state.forecast = Some(Tagged {
                generation,
                value: view,
            });
            true
        })
    }

    /// Shows a recommendation, but only next to a forecast from the same
    /// run.
    pub fn show_recommendation(&self, ticket: &RunTicket, recommendation: Recommendation) -> bool {
        self.apply(ticket, |state, generation| {
            if state.forecast.as_ref().is_none_or(|f| f.generation != generation) {
                return false;
            }
            state.recommendation = Some(Tagged {
                generation,
                value: recommendation,
            });
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::RunCoordinator;

    fn historical(label: &str) -> HistoricalView {
        HistoricalView {
            chart: ChartPayload {
                labels: vec![label.to_string()],
                ..ChartPayload::default()
            },
            report: IngestReport::default(),
        }
    }

    fn forecast() -> ForecastView {
        ForecastView {
            chart: ChartPayload::default(),
            points: Vec::new(),
            annotations: Vec::new(),
        }
    }

    #[test]
    fn stale_ticket_never_changes_the_board() {
        let coordinator = RunCoordinator::new();
        let board = DisplayBoard::new();

        let old = coordinator.begin_run();
        assert!(board.show_historical(&old, historical("old")));
        let before = board.snapshot();

        let _new = coordinator.begin_run();
        assert!(!board.show_status(&old, "late"));
        assert!(!board.show_historical(&old, historical("late")));
        assert!(!board.show_forecast(&old, forecast()));
        assert!(!board.show_recommendation(
            &old,
            Recommendation::Markdown("late".to_string())
        ));

        assert_eq!(board.snapshot(), before);
    }

    #[test]
    fn new_history_clears_older_forecast() {
        let coordinator = RunCoordinator::new();
        let board = DisplayBoard::new();

        let first = coordinator.begin_run();
        assert!(board.show_historical(&first, historical("a")));
        assert!(board.show_forecast(&first, forecast()));
        assert!(board.show_recommendation(
            &first,
            Recommendation::Placeholder("x".to_string())
        ));

        let second = coordinator.begin_run();
        assert!(board.show_historical(&second, historical("b")));

        let state = board.snapshot();
        assert!(state.forecast.is_none());
        assert!(state.recommendation.is_none());
        assert_eq!(state.historical.unwrap().generation, second.generation());
    }

    #[test]
    fn forecast_requires_matching_history() {
        let coordinator = RunCoordinator::new();
        let board = DisplayBoard::new();

        let ticket = coordinator.begin_run();
        assert!(!board.show_forecast(&ticket, forecast()));
        assert!(!board.show_recommendation(
            &ticket,
            Recommendation::Placeholder("x".to_string())
        ));
        assert!(board.snapshot().is_consistent());

        assert!(board.show_historical(&ticket, historical("a")));
        assert!(board.show_forecast(&ticket, forecast()));
        assert!(board.snapshot().is_consistent());
    }

    #[test]
    fn mismatched_generations_are_inconsistent() {
        let state = DisplayState {
            historical: Some(Tagged {
                generation: 2,
                value: historical("b"),
            }),
            forecast: Some(Tagged {
                generation: 1,
                value: forecast(),
            }),
            ..DisplayState::default()
        };
        assert!(!state.is_consistent());
    }
}
