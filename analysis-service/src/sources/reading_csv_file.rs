use std::{collections::HashSet, fs::File, io::Read, path::PathBuf};

use csv::StringRecord;
use sicater_client::domain::{CustomerProfile, MeterReading, OcrStatus, Period, ReadingWithCustomer};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use super::ReadingSet;
use crate::{analysis::StandIndex, pipeline::PipelineError};

/// Reading export on disk, one row per customer per month.
///
/// Expected header columns (by name):
/// - customer_id, month, year, final_stand
/// - customer_number, name, address, tariff_code, branch_id, officer_id, zone (optional)
/// - master_latitude, master_longitude (optional)
/// - photo_ocr_status (optional, none/green/yellow/red)
/// - capture_latitude, capture_longitude (optional)
/// - verified_at (optional, RFC3339 timestamp)
///
/// Rows of every month feed the stand index; rows of the requested period
/// become the records to analyse. Pipe-delimited `.dat` exports use the same
/// columns with [`ReadingCsvFile::with_delimiter`].
pub struct ReadingCsvFile {
    path: PathBuf,
    delimiter: u8,
}

impl ReadingCsvFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn load(&self, period: Period) -> Result<ReadingSet, PipelineError> {
        let file = File::open(&self.path)
            .map_err(|e| PipelineError::Source(format!("failed to open reading file: {e}")))?;
        read_reading_set(file, self.delimiter, period)
    }
}

pub fn read_reading_set<R: Read>(reader: R, delimiter: u8, period: Period) -> Result<ReadingSet, PipelineError> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = rdr
        .headers()
        .map_err(|e| PipelineError::Source(format!("failed to read headers: {e}")))?
        .clone();

    let mut records = Vec::new();
    let mut stands = StandIndex::default();
    let mut seen = HashSet::new();

    for result in rdr.records() {
        let record = result.map_err(|e| PipelineError::Source(format!("failed to read record: {e}")))?;

        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let row = match record_to_reading(&record, &headers) {
            Ok(row) => row,
            Err(e) => {
                metrics::counter!("reading_file_parse_errors_total").increment(1);
                return Err(PipelineError::Source(format!("line {line}: {e}")));
            }
        };

        let reading = &row.reading;
        if !seen.insert((reading.customer_id, reading.month, reading.year)) {
            metrics::counter!("reading_file_parse_errors_total").increment(1);
            return Err(PipelineError::Source(format!(
                "line {line}: duplicate reading for customer {} in {}-{:02}",
                reading.customer_id, reading.year, reading.month
            )));
        }

        // Rows the validation step would reject must not become a prior stand.
        match reading.period() {
            Ok(row_period) if reading.final_stand >= 0 => {
                stands.insert(reading.customer_id, row_period, reading.final_stand);
            }
            _ => {
                tracing::warn!(
                    line,
                    customer_id = reading.customer_id,
                    final_stand = reading.final_stand,
                    "invalid reading kept out of the stand index"
                );
            }
        }
        if reading.month == period.month() && reading.year == period.year() {
            records.push(row);
        }
    }

    tracing::info!(
        period = %period,
        readings = records.len(),
        stands = stands.len(),
        "loaded reading file"
    );

    Ok(ReadingSet {
        period,
        records,
        stands,
    })
}

fn parse_optional_string(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_optional<T>(name: &str, s: &str) -> Result<Option<T>, PipelineError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|e| PipelineError::Validation(format!("invalid {name} '{trimmed}': {e}")))
}

fn parse_required<T>(name: &str, s: &str) -> Result<T, PipelineError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    parse_optional(name, s)?.ok_or_else(|| PipelineError::Validation(format!("{name} is empty")))
}

struct Columns<'r> {
    record: &'r StringRecord,
    headers: &'r StringRecord,
}

impl<'r> Columns<'r> {
    fn get(&self, name: &str) -> Result<&'r str, PipelineError> {
        self.headers
            .iter()
            .position(|h| h == name)
            .and_then(|idx| self.record.get(idx))
            .ok_or_else(|| PipelineError::Source(format!("missing column '{name}'")))
    }

    /// Optional columns read as empty when absent.
    fn opt(&self, name: &str) -> &'r str {
        self.get(name).unwrap_or("")
    }
}

fn record_to_reading(record: &StringRecord, headers: &StringRecord) -> Result<ReadingWithCustomer, PipelineError> {
    let cols = Columns { record, headers };

    let customer_id: i64 = parse_required("customer_id", cols.get("customer_id")?)?;
    let month: i32 = parse_required("month", cols.get("month")?)?;
    let year: i32 = parse_required("year", cols.get("year")?)?;
    let final_stand: i64 = parse_required("final_stand", cols.get("final_stand")?)?;

    let photo_ocr_status: OcrStatus = cols
        .opt("photo_ocr_status")
        .parse()
        .map_err(|e| PipelineError::Validation(format!("{e}")))?;

    let verified_at = match parse_optional_string(cols.opt("verified_at")) {
        Some(ts) => Some(
            OffsetDateTime::parse(&ts, &Rfc3339)
                .map_err(|e| PipelineError::Validation(format!("invalid verified_at '{ts}': {e}")))?,
        ),
        None => None,
    };

    let reading = MeterReading {
        customer_id,
        month,
        year,
        final_stand,
        photo_ocr_status,
        capture_latitude: parse_optional("capture_latitude", cols.opt("capture_latitude"))?,
        capture_longitude: parse_optional("capture_longitude", cols.opt("capture_longitude"))?,
        verified_at,
    };

    let customer = CustomerProfile {
        customer_id,
        customer_number: parse_optional_string(cols.opt("customer_number")).unwrap_or_else(|| customer_id.to_string()),
        name: parse_optional_string(cols.opt("name")).unwrap_or_default(),
        address: parse_optional_string(cols.opt("address")),
        tariff_code: parse_optional_string(cols.opt("tariff_code")),
        branch_id: parse_optional("branch_id", cols.opt("branch_id"))?,
        officer_id: parse_optional("officer_id", cols.opt("officer_id"))?,
        zone: parse_optional_string(cols.opt("zone")),
        master_latitude: parse_optional("master_latitude", cols.opt("master_latitude"))?,
        master_longitude: parse_optional("master_longitude", cols.opt("master_longitude"))?,
    };

    Ok(ReadingWithCustomer { reading, customer })
}
