#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Ingestion configuration and report types.
//!
//! An [`IngestProfile`] names everything that varies between crime CSV
//! archives: which archive entries count as data ([`EntryFilter`]) and how
//! rows are laid out ([`CsvSchema`]). Both positional and header-keyed CSV
//! files are described by the same schema descriptor so that they share one
//! validation path.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Column names of a UK police street-level crime CSV, in file order.
pub const UK_POLICE_FIELDS: [&str; 12] = [
    "Crime ID",
    "Month",
    "Reported by",
    "Falls within",
    "Longitude",
    "Latitude",
    "Location",
    "LSOA code",
    "LSOA name",
    "Crime type",
    "Last outcome category",
    "Context",
];

/// How columns are located within a CSV row.
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
pub enum CsvMode {
    /// Columns are found by their position in [`CsvSchema::fields`]. The
    /// first line of the file is a header and is discarded.
    Positional,
    /// Columns are found by name in the file's own header line.
    Headered,
}

/// Explicit description of a crime CSV layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvSchema {
    /// Positional or header-keyed lookup.
    pub mode: CsvMode,
    /// Ordered field names used for positional lookup.
    #[serde(default = "default_fields")]
    pub fields: Vec<String>,
    /// Name of the month column.
    #[serde(default = "default_month_field")]
    pub month_field: String,
    /// Name of the crime type column.
    #[serde(default = "default_crime_type_field")]
    pub crime_type_field: String,
    /// Minimum number of columns a positional row must have. Defaults to
    /// the number of [`Self::fields`].
    #[serde(default)]
    pub min_width: Option<usize>,
}

fn default_fields() -> Vec<String> {
    UK_POLICE_FIELDS.iter().map(ToString::to_string).collect()
}

fn default_month_field() -> String {
    "Month".to_string()
}

fn default_crime_type_field() -> String {
    "Crime type".to_string()
}

impl CsvSchema {
    /// The 12-column UK police layout read by position.
    #[must_use]
    pub fn uk_police_positional() -> Self {
        Self {
            mode: CsvMode::Positional,
            fields: default_fields(),
            month_field: default_month_field(),
            crime_type_field: default_crime_type_field(),
            min_width: None,
        }
    }

    /// The UK police layout read through the file's header line.
    #[must_use]
    pub fn uk_police_headered() -> Self {
        Self {
            mode: CsvMode::Headered,
            ..Self::uk_police_positional()
        }
    }
}

/// Resolved column indices for one CSV file.
///
/// Produced from a [`CsvSchema`] plus (in headered mode) the file's header
/// line. Every row of the file is checked against the same layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    /// Index of the month column.
    pub month: usize,
    /// Index of the crime type column.
    pub crime_type: usize,
    /// Rows narrower than this are dropped.
    pub min_width: usize,
}

impl ColumnLayout {
    /// Whether a row with `width` columns is wide enough to read.
    #[must_use]
    pub const fn accepts(&self, width: usize) -> bool {
        width >= self.min_width
    }
}

/// Which archive entries are treated as crime CSV files.
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
pub enum EntryFilter {
    /// Only entries ending in `-street.csv`.
    StreetSuffix,
    /// Any entry ending in `.csv`.
    AnyCsv,
}

impl EntryFilter {
    /// Returns `true` if the archive entry `name` should be parsed.
    #[must_use]
    pub fn matches(self, name: &str) -> bool {
        match self {
            Self::StreetSuffix => name.ends_with("-street.csv"),
            Self::AnyCsv => name.ends_with(".csv"),
        }
    }
}

/// A named combination of archive filter and CSV layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestProfile {
    /// Profile identifier (e.g. `"street_headered"`).
    pub id: String,
    /// Which entries to read.
    pub entry_filter: EntryFilter,
    /// How rows are laid out.
    pub schema: CsvSchema,
    /// Whether to keep per-crime-type counters while aggregating.
    #[serde(default)]
    pub track_types: bool,
}

/// Row-level diagnostics from parsing one or more CSV files.
///
/// Malformed rows never fail a parse; they are only counted here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseReport {
    /// Data rows examined (header lines excluded).
    pub rows_read: u64,
    /// Rows turned into records.
    pub rows_kept: u64,
    /// Rows dropped as malformed or incomplete.
    pub rows_dropped: u64,
}

impl ParseReport {
    /// Adds another report's counters into this one.
    pub const fn merge(&mut self, other: Self) {
        self.rows_read += other.rows_read;
        self.rows_kept += other.rows_kept;
        self.rows_dropped += other.rows_dropped;
    }
}

/// An archive entry that matched the filter but could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedEntry {
    /// Entry path inside the archive.
    pub name: String,
    /// Why it was skipped.
    pub reason: String,
}

/// Summary of reading one archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    /// Total entries in the archive, including directories.
    pub entries_seen: u64,
    /// Entries that matched the [`EntryFilter`] and were parsed.
    pub entries_parsed: u64,
    /// Matching entries that failed file-level parsing.
    pub entries_skipped: Vec<SkippedEntry>,
    /// Row-level counters across all parsed entries.
    pub rows: ParseReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn street_suffix_filter() {
        let filter = EntryFilter::StreetSuffix;
        assert!(filter.matches("2024-01/2024-01-met-street.csv"));
        assert!(!filter.matches("2024-01/2024-01-met-outcomes.csv"));
        assert!(!filter.matches("2024-01/readme.txt"));
    }

    #[test]
    fn any_csv_filter() {
        let filter = EntryFilter::AnyCsv;
        assert!(filter.matches("2024-01/2024-01-met-street.csv"));
        assert!(filter.matches("2024-01/2024-01-met-outcomes.csv"));
        assert!(!filter.matches("2024-01/"));
        assert!(!filter.matches("notes.CSV.txt"));
    }

    #[test]
    fn layout_rejects_narrow_rows() {
        let layout = ColumnLayout {
            month: 1,
            crime_type: 9,
            min_width: 12,
        };
        assert!(layout.accepts(12));
        assert!(layout.accepts(13));
        assert!(!layout.accepts(11));
    }

    #[test]
    fn report_merge_adds_counters() {
        let mut a = ParseReport {
            rows_read: 3,
            rows_kept: 2,
            rows_dropped: 1,
        };
        a.merge(ParseReport {
            rows_read: 5,
            rows_kept: 5,
            rows_dropped: 0,
        });
        assert_eq!(a.rows_read, 8);
        assert_eq!(a.rows_kept, 7);
        assert_eq!(a.rows_dropped, 1);
    }

    #[test]
    fn modes_display_snake_case() {
        assert_eq!(CsvMode::Positional.to_string(), "positional");
        assert_eq!("headered".parse::<CsvMode>().unwrap(), CsvMode::Headered);
        assert_eq!(EntryFilter::StreetSuffix.as_ref(), "street_suffix");
    }
}
