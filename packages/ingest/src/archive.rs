//! Zip archive reading.
//!
//! Entries are decompressed one at a time; only the current entry's text is
//! held in memory while it is parsed and folded into the running aggregate.

use std::io::{Cursor, Read as _};

use crime_forecast_crime_models::{MonthlyTable, OutcomeSample};
use crime_forecast_ingest_models::{
    EntryFilter, IngestProfile, IngestReport, ParseReport, SkippedEntry,
};

use crate::IngestError;
use crate::aggregate::MonthlyAggregator;
use crate::parser::{CsvRecordParser, parse_outcome_samples};

/// Aggregated table plus diagnostics from one archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveContents {
    pub table: MonthlyTable,
    pub report: IngestReport,
}

/// Calls `on_entry(name, text)` for each file entry accepted by `filter`.
///
/// Directory entries are ignored. Entries that cannot be read, are not
/// UTF-8, or for which `on_entry` fails are skipped with a warning and
/// listed in the returned report.
///
/// # Errors
///
/// * [`IngestError::Archive`] if `bytes` is not a readable zip archive
pub fn visit_text_entries<F>(
    bytes: &[u8],
    filter: EntryFilter,
    mut on_entry: F,
) -> Result<IngestReport, IngestError>
where
    F: FnMut(&str, &str) -> Result<(), IngestError>,
{
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut report = IngestReport::default();

    for i in 0..archive.len() {
        report.entries_seen += 1;

        let mut entry = match archive.by_index(i) {
            Ok(e) => e,
            Err(e) => {
                log::warn!("skipping corrupt zip entry {i}: {e}");
                continue;
            }
        };

        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        if !filter.matches(&name) {
            continue;
        }

        let mut buf = Vec::new();
        if let Err(e) = entry.read_to_end(&mut buf) {
            skip(&mut report, name, &e);
            continue;
        }
        let text = match String::from_utf8(buf) {
            Ok(text) => text,
            Err(e) => {
                skip(&mut report, name, &e);
                continue;
            }
        };

        match on_entry(&name, &text) {
            Ok(()) => report.entries_parsed += 1,
            Err(e) => skip(&mut report, name, &e),
        }
    }

    Ok(report)
}

fn skip(report: &mut IngestReport, name: String, reason: &dyn std::fmt::Display) {
    log::warn!("skipping {name}: {reason}");
    report.entries_skipped.push(SkippedEntry {
        name,
        reason: reason.to_string(),
    });
}

/// Reads every matching CSV entry and aggregates it per `profile`.
///
/// # Errors
///
/// * [`IngestError::Archive`] if `bytes` is not a readable zip archive
pub fn read_archive(bytes: &[u8], profile: &IngestProfile) -> Result<ArchiveContents, IngestError> {
    let parser = CsvRecordParser::new(profile.schema.clone());
    let mut aggregator = MonthlyAggregator::new(profile.track_types);
    let mut rows = ParseReport::default();

    let mut report = visit_text_entries(bytes, profile.entry_filter, |name, text| {
        let mut records = parser.parse(text)?;
        aggregator.extend(records.by_ref());
        log::debug!("{name}: {:?}", records.report());
        rows.merge(records.report());
        Ok(())
    })?;
    report.rows = rows;

    log::info!(
        "read {} of {} archive entries ({} rows kept, {} dropped, {} months)",
        report.entries_parsed,
        report.entries_seen,
        report.rows.rows_kept,
        report.rows.rows_dropped,
        aggregator.month_count(),
    );

    Ok(ArchiveContents {
        table: aggregator.finish(),
        report,
    })
}

/// Reads geolocated outcome samples from every matching positional entry.
///
/// # Errors
///
/// * [`IngestError::Archive`] if `bytes` is not a readable zip archive
pub fn read_outcome_samples(
    bytes: &[u8],
    profile: &IngestProfile,
) -> Result<(Vec<OutcomeSample>, IngestReport), IngestError> {
    let mut samples = Vec::new();
    let mut rows = ParseReport::default();

    let mut report = visit_text_entries(bytes, profile.entry_filter, |_, text| {
        let (mut found, counts) = parse_outcome_samples(&profile.schema, text)?;
        samples.append(&mut found);
        rows.merge(counts);
        Ok(())
    })?;
    report.rows = rows;

    Ok((samples, report))
}

/// Path and uncompressed size of one archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub name: String,
    pub size: u64,
}

/// Lists every entry in the archive, directories included.
///
/// # Errors
///
/// * [`IngestError::Archive`] if `bytes` is not a readable zip archive
pub fn list_entries(bytes: &[u8]) -> Result<Vec<EntryInfo>, IngestError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut entries = Vec::with_capacity(archive.len());

    for i in 0..archive.len() {
        match archive.by_index(i) {
            Ok(entry) => entries.push(EntryInfo {
                name: entry.name().to_string(),
                size: entry.size(),
            }),
            Err(e) => log::warn!("skipping corrupt zip entry {i}: {e}"),
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use crime_forecast_ingest_models::CsvSchema;

    use super::*;
    use crate::test_utils::zip_bytes;

    fn street_profile(track_types: bool) -> IngestProfile {
        IngestProfile {
            id: "test".to_string(),
            entry_filter: EntryFilter::StreetSuffix,
            schema: CsvSchema::uk_police_headered(),
            track_types,
        }
    }

    #[test]
    fn aggregates_across_matching_entries_only() {
        let bytes = zip_bytes(&[
            ("2023-01/", ""),
            (
                "2023-01/2023-01-met-street.csv",
                "Month,Crime type\n2023-01,Drugs\n2023-01,Burglary\n",
            ),
            (
                "2023-02/2023-02-met-street.csv",
                "Month,Crime type\n2023-02,Drugs\n",
            ),
            (
                "2023-02/2023-02-met-outcomes.csv",
                "Month,Crime type\n2023-02,Drugs\n",
            ),
        ]);

        let contents = read_archive(&bytes, &street_profile(true)).unwrap();

        assert_eq!(contents.table.months(), vec!["2023-01", "2023-02"]);
        assert_eq!(contents.table.totals(), vec![2, 1]);
        assert_eq!(contents.report.entries_seen, 4);
        assert_eq!(contents.report.entries_parsed, 2);
        assert_eq!(contents.report.rows.rows_kept, 3);
    }

    #[test]
    fn entry_missing_header_column_is_skipped() {
        let bytes = zip_bytes(&[
            ("a-street.csv", "Month,Crime type\n2023-01,Drugs\n"),
            ("b-street.csv", "Month,Location\n2023-01,Somewhere\n"),
        ]);

        let contents = read_archive(&bytes, &street_profile(false)).unwrap();

        assert_eq!(contents.table.totals(), vec![1]);
        assert_eq!(contents.report.entries_skipped.len(), 1);
        assert_eq!(contents.report.entries_skipped[0].name, "b-street.csv");
    }

    #[test]
    fn archive_without_matches_is_empty() {
        let bytes = zip_bytes(&[("readme.txt", "hello")]);
        let contents = read_archive(&bytes, &street_profile(false)).unwrap();
        assert!(contents.table.is_empty());
        assert_eq!(contents.report.entries_parsed, 0);
    }

    #[test]
    fn garbage_bytes_are_an_archive_error() {
        let result = read_archive(b"definitely not a zip", &street_profile(false));
        assert!(matches!(result, Err(IngestError::Archive(_))));
    }

    #[test]
    fn reads_outcome_samples_from_positional_entries() {
        let header = "Crime ID,Month,Reported by,Falls within,Longitude,Latitude,Location,LSOA code,LSOA name,Crime type,Last outcome category,Context";
        let csv = format!(
            "{header}\nx,2023-01,M,M,-1.5,52.0,L,C,N,Drugs,Local resolution,\ny,2023-01,M,M,,,L,C,N,Drugs,,\n"
        );
        let bytes = zip_bytes(&[("x-street.csv", csv.as_str())]);
        let profile = IngestProfile {
            id: "outcomes".to_string(),
            entry_filter: EntryFilter::AnyCsv,
            schema: CsvSchema::uk_police_positional(),
            track_types: false,
        };

        let (samples, report) = read_outcome_samples(&bytes, &profile).unwrap();

        assert_eq!(samples.len(), 1);
        assert!(samples[0].resolved);
        assert_eq!(report.rows.rows_dropped, 1);
    }

    #[test]
    fn lists_entries_with_sizes() {
        let bytes = zip_bytes(&[("a/", ""), ("a/b.csv", "xyz")]);
        let entries = list_entries(&bytes).unwrap();
        assert_eq!(
            entries,
            vec![
                EntryInfo {
                    name: "a/".to_string(),
                    size: 0,
                },
                EntryInfo {
                    name: "a/b.csv".to_string(),
                    size: 3,
                },
            ]
        );
    }
}
