#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crime record and monthly count types.
//!
//! These types describe the data that flows out of the CSV ingestion stage:
//! individual [`CrimeRecord`]s parsed from police street-level CSV files, and
//! the [`MonthlyTable`] of per-month counts that the forecasting stage
//! consumes. Month labels are `"YYYY-MM"` strings; [`YearMonth`] provides
//! the calendar arithmetic needed to label future months.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use chrono::{Datelike as _, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// A single crime incident reduced to the two fields the pipeline needs.
///
/// Both fields are non-empty and trimmed. Records are transient: they are
/// produced by the CSV parser and discarded once aggregated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrimeRecord {
    /// Month the incident was reported in (`"YYYY-MM"`).
    pub month: String,
    /// Crime type as written in the source file (e.g. `"Burglary"`).
    pub crime_type: String,
}

/// A geolocated incident paired with whether an outcome was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeSample {
    pub latitude: f64,
    pub longitude: f64,
    /// `true` when the "Last outcome category" column is non-empty.
    pub resolved: bool,
}

/// Incident counts for one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyCount {
    /// Month label (`"YYYY-MM"`).
    pub month: String,
    /// Total incidents in this month.
    pub total: u64,
    /// Incidents per crime type. Empty when per-type tracking is disabled.
    pub by_type: BTreeMap<String, u64>,
}

impl MonthlyCount {
    /// Creates an empty count for the given month.
    #[must_use]
    pub fn new(month: impl Into<String>) -> Self {
        Self {
            month: month.into(),
            total: 0,
            by_type: BTreeMap::new(),
        }
    }

    /// Sum of the per-type counters.
    #[must_use]
    pub fn by_type_sum(&self) -> u64 {
        self.by_type.values().sum()
    }
}

/// The finished, month-sorted output of aggregation.
///
/// Rows are in ascending lexicographic month order, which for `"YYYY-MM"`
/// labels is chronological order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyTable {
    rows: Vec<MonthlyCount>,
    tracks_types: bool,
}

impl MonthlyTable {
    /// Builds a table from rows, sorting them by month.
    #[must_use]
    pub fn new(mut rows: Vec<MonthlyCount>, tracks_types: bool) -> Self {
        rows.sort_by(|a, b| a.month.cmp(&b.month));
        Self { rows, tracks_types }
    }

    /// The month rows in ascending order.
    #[must_use]
    pub fn rows(&self) -> &[MonthlyCount] {
        &self.rows
    }

    /// Whether per-type counters were accumulated.
    #[must_use]
    pub const fn tracks_types(&self) -> bool {
        self.tracks_types
    }

    /// Number of distinct months.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if no months were seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Month labels in ascending order.
    #[must_use]
    pub fn months(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.month.clone()).collect()
    }

    /// Monthly totals, aligned with [`Self::months`].
    #[must_use]
    pub fn totals(&self) -> Vec<u64> {
        self.rows.iter().map(|r| r.total).collect()
    }

    /// Sorted distinct crime types seen across all months.
    #[must_use]
    pub fn crime_types(&self) -> Vec<String> {
        self.rows
            .iter()
            .flat_map(|r| r.by_type.keys())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Per-month counts for each crime type in [`Self::crime_types`] order.
    ///
    /// A crime type absent in a month contributes `0`.
    #[must_use]
    pub fn type_matrix(&self) -> Vec<Vec<u64>> {
        let types = self.crime_types();
        self.rows
            .iter()
            .map(|row| {
                types
                    .iter()
                    .map(|t| row.by_type.get(t).copied().unwrap_or(0))
                    .collect()
            })
            .collect()
    }

    /// The last (most recent) month label, if any.
    #[must_use]
    pub fn last_month(&self) -> Option<&str> {
        self.rows.last().map(|r| r.month.as_str())
    }
}

/// A calendar month, parsed from and displayed as `"YYYY-MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    first_day: NaiveDate,
}

impl YearMonth {
    /// Creates a month from a year and a 1-based month number.
    ///
    /// # Errors
    ///
    /// Returns an error if `month` is not in `1..=12` or the year is out of
    /// range.
    pub fn new(year: i32, month: u32) -> Result<Self, InvalidMonthError> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(|first_day| Self { first_day })
            .ok_or_else(|| InvalidMonthError {
                label: format!("{year:04}-{month:02}"),
            })
    }

    /// The calendar year.
    #[must_use]
    pub fn year(self) -> i32 {
        self.first_day.year()
    }

    /// The 1-based month number.
    #[must_use]
    pub fn month(self) -> u32 {
        self.first_day.month()
    }

    /// Returns the month `n` months after this one.
    ///
    /// # Errors
    ///
    /// Returns an error if the result falls outside chrono's date range.
    pub fn add_months(self, n: u32) -> Result<Self, InvalidMonthError> {
        self.first_day
            .checked_add_months(Months::new(n))
            .map(|first_day| Self { first_day })
            .ok_or_else(|| InvalidMonthError {
                label: format!("{self} + {n} months"),
            })
    }
}

impl FromStr for YearMonth {
    type Err = InvalidMonthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // `%Y` accepts any digit count; labels must be exactly YYYY-MM.
        if trimmed.len() != 7 {
            return Err(InvalidMonthError {
                label: s.to_string(),
            });
        }
        NaiveDate::parse_from_str(&format!("{trimmed}-01"), "%Y-%m-%d")
            .map(|first_day| Self { first_day })
            .map_err(|_| InvalidMonthError {
                label: s.to_string(),
            })
    }
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

/// Error returned when a month label is not a valid `"YYYY-MM"` month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidMonthError {
    /// The offending label.
    pub label: String,
}

impl std::fmt::Display for InvalidMonthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid month label '{}': expected YYYY-MM", self.label)
    }
}

impl std::error::Error for InvalidMonthError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(month: &str, total: u64) -> MonthlyCount {
        MonthlyCount {
            month: month.to_string(),
            total,
            by_type: BTreeMap::new(),
        }
    }

    #[test]
    fn table_sorts_rows_by_month() {
        let table = MonthlyTable::new(
            vec![count("2024-03", 1), count("2023-12", 2), count("2024-01", 3)],
            false,
        );
        assert_eq!(table.months(), vec!["2023-12", "2024-01", "2024-03"]);
        assert_eq!(table.totals(), vec![2, 3, 1]);
        assert_eq!(table.last_month(), Some("2024-03"));
    }

    #[test]
    fn type_matrix_fill_missing_types_with_zero() {
        let mut jan = count("2024-01", 3);
        jan.by_type.insert("Burglary".to_string(), 2);
        jan.by_type.insert("Drugs".to_string(), 1);
        let mut feb = count("2024-02", 4);
        feb.by_type.insert("Robbery".to_string(), 4);

        let table = MonthlyTable::new(vec![jan, feb], true);
        assert_eq!(table.crime_types(), vec!["Burglary", "Drugs", "Robbery"]);
        assert_eq!(table.type_matrix(), vec![vec![2, 1, 0], vec![0, 0, 4]]);
    }

    #[test]
    fn year_month_parses_and_displays() {
        let ym: YearMonth = "2023-07".parse().unwrap();
        assert_eq!(ym.year(), 2023);
        assert_eq!(ym.month(), 7);
        assert_eq!(ym.to_string(), "2023-07");
    }

    #[test]
    fn year_month_rejects_bad_labels() {
        assert!("2023-13".parse::<YearMonth>().is_err());
        assert!("2023-7".parse::<YearMonth>().is_err());
        assert!("July 2023".parse::<YearMonth>().is_err());
        assert!("".parse::<YearMonth>().is_err());
    }

    #[test]
    fn add_months_crosses_year_boundary() {
        let ym: YearMonth = "2023-11".parse().unwrap();
        assert_eq!(ym.add_months(1).unwrap().to_string(), "2023-12");
        assert_eq!(ym.add_months(2).unwrap().to_string(), "2024-01");
        assert_eq!(ym.add_months(26).unwrap().to_string(), "2026-01");
    }

    #[test]
    fn record_serializes_camel_case() {
        let record = CrimeRecord {
            month: "2024-01".to_string(),
            crime_type: "Burglary".to_string(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"month":"2024-01","crimeType":"Burglary"}"#);
    }
}
