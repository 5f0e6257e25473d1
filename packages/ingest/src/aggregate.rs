//! Folds crime records into per-month counts.

use std::collections::BTreeMap;

use crime_forecast_crime_models::{CrimeRecord, MonthlyCount, MonthlyTable};

/// Accumulates [`CrimeRecord`]s into a [`MonthlyTable`].
///
/// Memory is proportional to the number of distinct months (times distinct
/// crime types when per-type tracking is on), not the number of records.
#[derive(Debug, Default)]
pub struct MonthlyAggregator {
    counts: BTreeMap<String, MonthlyCount>,
    track_types: bool,
}

impl MonthlyAggregator {
    #[must_use]
    pub const fn new(track_types: bool) -> Self {
        Self {
            counts: BTreeMap::new(),
            track_types,
        }
    }

    /// Counts one record.
    pub fn add(&mut self, record: &CrimeRecord) {
        let count = self
            .counts
            .entry(record.month.clone())
            .or_insert_with(|| MonthlyCount::new(record.month.clone()));

        count.total += 1;

        if self.track_types {
            *count.by_type.entry(record.crime_type.clone()).or_insert(0) += 1;
        }
    }

    /// Counts every record yielded by `records`.
    pub fn extend<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = CrimeRecord>,
    {
        for record in records {
            self.add(&record);
        }
    }

    /// Number of distinct months seen so far.
    #[must_use]
    pub fn month_count(&self) -> usize {
        self.counts.len()
    }

    /// Finishes aggregation, returning rows sorted ascending by month.
    #[must_use]
    pub fn finish(self) -> MonthlyTable {
        MonthlyTable::new(self.counts.into_values().collect(), self.track_types)
    }
}

/// Aggregates `records` in one call.
#[must_use]
pub fn aggregate<I>(records: I, track_types: bool) -> MonthlyTable
where
    I: IntoIterator<Item = CrimeRecord>,
{
    let mut aggregator = MonthlyAggregator::new(track_types);
    aggregator.extend(records);
    aggregator.finish()
}
