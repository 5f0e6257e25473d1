//! Streaming CSV row parser for police crime files.
//!
//! Splitting is a plain comma split: the `csv` reader is configured with
//! quoting disabled and flexible row widths, so a quoted field containing a
//! comma is split like any other. Police street-level files do not quote
//! the two columns this parser reads.

use crime_forecast_crime_models::{CrimeRecord, OutcomeSample};
use crime_forecast_ingest_models::{ColumnLayout, CsvMode, CsvSchema, ParseReport};

use crate::IngestError;

const LONGITUDE_FIELD: &str = "Longitude";
const LATITUDE_FIELD: &str = "Latitude";
const OUTCOME_FIELD: &str = "Last outcome category";

/// Parses CSV text into [`CrimeRecord`]s according to a [`CsvSchema`].
#[derive(Debug, Clone)]
pub struct CsvRecordParser {
    schema: CsvSchema,
}

impl CsvRecordParser {
    #[must_use]
    pub const fn new(schema: CsvSchema) -> Self {
        Self { schema }
    }

    #[must_use]
    pub const fn schema(&self) -> &CsvSchema {
        &self.schema
    }

    /// Starts parsing `text`, consuming its first line as the header.
    ///
    /// The returned iterator is lazy; rows are split only as they are
    /// pulled. Empty text yields an empty iterator in either mode.
    ///
    /// # Errors
    ///
    /// * [`IngestError::MissingColumn`] if the schema names a column that
    ///   neither the positional field list nor (in headered mode) the file's
    ///   header line contains
    pub fn parse<'a>(&self, text: &'a str) -> Result<RecordIter<'a>, IngestError> {
        let mut records = reader(text).into_records();

        let header = match records.next() {
            Some(Ok(header)) => Some(header),
            Some(Err(e)) => {
                log::debug!("Unreadable header line: {e}");
                None
            }
            None => {
                return Ok(RecordIter {
                    records,
                    layout: None,
                    report: ParseReport::default(),
                });
            }
        };

        let layout = resolve_layout(&self.schema, header.as_ref())?;

        Ok(RecordIter {
            records,
            layout: Some(layout),
            report: ParseReport::default(),
        })
    }
}

fn reader(text: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(text.as_bytes())
}

fn position_of(names: impl IntoIterator<Item = impl AsRef<str>>, wanted: &str) -> Option<usize> {
    names
        .into_iter()
        .position(|name| name.as_ref().trim().trim_start_matches('\u{feff}') == wanted)
}

fn missing(column: &str) -> IngestError {
    IngestError::MissingColumn {
        column: column.to_string(),
    }
}

/// Resolves the column indices a file will be read with.
///
/// # Errors
///
/// * [`IngestError::MissingColumn`] if the month or crime type column cannot
///   be located
pub fn resolve_layout(
    schema: &CsvSchema,
    header: Option<&csv::StringRecord>,
) -> Result<ColumnLayout, IngestError> {
    match schema.mode {
        CsvMode::Positional => {
            let month = position_of(&schema.fields, &schema.month_field)
                .ok_or_else(|| missing(&schema.month_field))?;
            let crime_type = position_of(&schema.fields, &schema.crime_type_field)
                .ok_or_else(|| missing(&schema.crime_type_field))?;
            let min_width = schema
                .min_width
                .unwrap_or(schema.fields.len())
                .max(month.max(crime_type) + 1);

            Ok(ColumnLayout {
                month,
                crime_type,
                min_width,
            })
        }
        CsvMode::Headered => {
            let header = header.ok_or_else(|| missing(&schema.month_field))?;
            let month = position_of(header.iter(), &schema.month_field)
                .ok_or_else(|| missing(&schema.month_field))?;
            let crime_type = position_of(header.iter(), &schema.crime_type_field)
                .ok_or_else(|| missing(&schema.crime_type_field))?;
            let min_width = schema
                .min_width
                .unwrap_or(0)
                .max(month.max(crime_type) + 1);

            Ok(ColumnLayout {
                month,
                crime_type,
                min_width,
            })
        }
    }
}

/// Lazy iterator over the records of one CSV file.
///
/// Rows that are too narrow, or whose month or crime type is empty after
/// trimming, are skipped and counted in [`Self::report`].
pub struct RecordIter<'a> {
    records: csv::StringRecordsIntoIter<&'a [u8]>,
    layout: Option<ColumnLayout>,
    report: ParseReport,
}

impl RecordIter<'_> {
    /// Counters for the rows pulled so far.
    #[must_use]
    pub const fn report(&self) -> ParseReport {
        self.report
    }

    /// The resolved column layout, or `None` for an empty file.
    #[must_use]
    pub const fn layout(&self) -> Option<ColumnLayout> {
        self.layout
    }
}

impl Iterator for RecordIter<'_> {
    type Item = CrimeRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let layout = self.layout?;

        for row in self.records.by_ref() {
            self.report.rows_read += 1;

            let Ok(row) = row else {
                self.report.rows_dropped += 1;
                continue;
            };

            if !layout.accepts(row.len()) {
                self.report.rows_dropped += 1;
                continue;
            }

            let month = row.get(layout.month).map_or("", str::trim);
            let crime_type = row.get(layout.crime_type).map_or("", str::trim);

            if month.is_empty() || crime_type.is_empty() {
                self.report.rows_dropped += 1;
                continue;
            }

            self.report.rows_kept += 1;
            return Some(CrimeRecord {
                month: month.to_string(),
                crime_type: crime_type.to_string(),
            });
        }

        None
    }
}

/// Extracts geolocated outcome samples from a positional crime CSV.
///
/// The first line is discarded as a header. Rows narrower than the schema,
/// or with unparseable or zero coordinates, are dropped.
///
/// # Errors
///
/// * [`IngestError::MissingColumn`] if the schema's field list lacks the
///   longitude, latitude, or last outcome column
pub fn parse_outcome_samples(
    schema: &CsvSchema,
    text: &str,
) -> Result<(Vec<OutcomeSample>, ParseReport), IngestError> {
    let longitude =
        position_of(&schema.fields, LONGITUDE_FIELD).ok_or_else(|| missing(LONGITUDE_FIELD))?;
    let latitude =
        position_of(&schema.fields, LATITUDE_FIELD).ok_or_else(|| missing(LATITUDE_FIELD))?;
    let outcome =
        position_of(&schema.fields, OUTCOME_FIELD).ok_or_else(|| missing(OUTCOME_FIELD))?;
    let min_width = schema
        .min_width
        .unwrap_or(schema.fields.len())
        .max(longitude.max(latitude).max(outcome) + 1);

    let mut report = ParseReport::default();
    let mut samples = Vec::new();

    for row in reader(text).into_records().skip(1) {
        report.rows_read += 1;

        let sample = row.ok().filter(|r| r.len() >= min_width).and_then(|r| {
            let lat = r.get(latitude)?.trim().parse::<f64>().ok()?;
            let lon = r.get(longitude)?.trim().parse::<f64>().ok()?;
            if !lat.is_finite() || !lon.is_finite() || lat == 0.0 || lon == 0.0 {
                return None;
            }
            Some(OutcomeSample {
                latitude: lat,
                longitude: lon,
                resolved: !r.get(outcome)?.trim().is_empty(),
            })
        });

        if let Some(sample) = sample {
            report.rows_kept += 1;
            samples.push(sample);
        } else {
            report.rows_dropped += 1;
        }
    }

    Ok((samples, report))
}
