#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reads zipped police crime CSV archives into monthly count tables.
//!
//! The stages are deliberately separable:
//!
//! 1. [`archive`] opens a zip archive and yields the text of each entry that
//!    matches an [`EntryFilter`](crime_forecast_ingest_models::EntryFilter).
//! 2. [`parser`] turns one CSV file into a lazy stream of
//!    [`CrimeRecord`](crime_forecast_crime_models::CrimeRecord)s.
//! 3. [`aggregate`] folds records into a month-sorted
//!    [`MonthlyTable`](crime_forecast_crime_models::MonthlyTable).
//!
//! [`tree`] renders the folder structure of an archive, and [`registry`]
//! holds the built-in ingest profiles.

pub mod aggregate;
pub mod archive;
pub mod parser;
pub mod registry;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod tree;

/// Errors that can occur while reading crime archives.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The archive could not be opened or an entry could not be located.
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// A headered CSV file lacks a required column.
    #[error("Missing column '{column}' in CSV header")]
    MissingColumn {
        /// The column name that was not found.
        column: String,
    },

    /// An ingest profile TOML could not be parsed.
    #[error("Profile parse error: {0}")]
    Profile(#[from] toml::de::Error),
}
