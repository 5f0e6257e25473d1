#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! End-to-end crime forecast runs.
//!
//! A [`PipelineProfile`](config::PipelineProfile) picks the ingest profile,
//! the training-example strategy, the model, and the horizon. A
//! [`ForecastPipeline`](pipeline::ForecastPipeline) executes one profile:
//! archive bytes in, monthly table, trained model, forecast points, and
//! annotations out. A [`ForecastSession`](session::ForecastSession) adds the
//! single-flight discipline: each upload starts a new run, older runs are
//! cancelled, and only the current run may update the
//! [`DisplayBoard`](display::DisplayBoard).

pub mod chart;
pub mod config;
pub mod display;
pub mod outcome;
pub mod pipeline;
pub mod registry;
pub mod run;
pub mod session;

use crime_forecast_forecast::ForecastError;
use crime_forecast_ingest::IngestError;

/// Errors that can end a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The archive could not be read.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Training-set construction, training, or forecasting failed.
    #[error(transparent)]
    Forecast(#[from] ForecastError),

    /// A blocking task panicked or was cancelled.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// A pipeline profile TOML could not be parsed.
    #[error("Profile parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// No built-in profile has the requested id.
    #[error("Unknown {kind} profile '{id}'")]
    UnknownProfile { kind: &'static str, id: String },

    /// A newer run started before this one could finish.
    #[error("Run {generation} was superseded by a newer run")]
    Superseded { generation: u64 },
}

impl PipelineError {
    /// Whether the run simply lost to a newer one.
    #[must_use]
    pub const fn is_superseded(&self) -> bool {
        matches!(
            self,
            Self::Superseded { .. } | Self::Forecast(ForecastError::Cancelled)
        )
    }

    /// The single message shown to the user when a run fails.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Forecast(ForecastError::InsufficientData { unit, needed, got }) => {
                format!("Not enough data to forecast: need at least {needed} {unit}, found {got}.")
            }
            Self::Forecast(ForecastError::DegenerateNormalization { value }) => {
                format!("Every value in the data equals {value}, so it cannot be scaled.")
            }
            Self::Ingest(IngestError::Archive(_)) => {
                "The uploaded file could not be opened as a zip archive.".to_string()
            }
            Self::Superseded { .. } | Self::Forecast(ForecastError::Cancelled) => {
                "A newer upload replaced this run.".to_string()
            }
            _ => "An error occurred while processing the data.".to_string(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    pub use crime_forecast_ingest::test_utils::zip_bytes;

    /// Headered street CSV with `per_month` rows in each of `months`
    /// consecutive months starting at `start` (`"YYYY-MM"`).
    pub fn street_csv(start: &str, months: u32, per_month: usize, crime_type: &str) -> String {
        use crime_forecast_crime_models::YearMonth;

        let first: YearMonth = start.parse().unwrap();
        let mut csv = String::from(
            "Crime ID,Month,Reported by,Falls within,Longitude,Latitude,Location,\
             LSOA code,LSOA name,Crime type,Last outcome category,Context\n",
        );
        for m in 0..months {
            let month = first.add_months(m).unwrap();
            for _ in 0..per_month {
                csv.push_str(&format!(
                    ",{month},Force,Force,-1.5,52.4,On or near Street,E01,Area,{crime_type},,\n"
                ));
            }
        }
        csv
    }
}
