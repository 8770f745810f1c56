//! CSV bar loader.
//!
//! Expected header: `timestamp,open,high,low,close,volume`. The timestamp
//! column accepts epoch milliseconds, RFC 3339 datetimes or `YYYY-MM-DD` dates
//! (midnight UTC).

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate};
use serde::Deserialize;

use super::DataError;
use crate::domain::bar::validate_bars;
use crate::domain::{Bar, Timestamp};

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

/// Load and validate bars from a CSV file.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Bar>, DataError> {
    let file = std::fs::File::open(path)?;
    read_bars(file)
}

/// Read and validate bars from any CSV source.
pub fn read_bars<R: Read>(reader: R) -> Result<Vec<Bar>, DataError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut bars = Vec::new();
    for (row, record) in rdr.deserialize::<CsvRow>().enumerate() {
        let record = record?;
        let timestamp = parse_timestamp(&record.timestamp).ok_or_else(|| DataError::Timestamp {
            row: row + 1,
            value: record.timestamp.clone(),
        })?;
        bars.push(Bar::new(
            timestamp,
            record.open,
            record.high,
            record.low,
            record.close,
            record.volume,
        ));
    }
    validate_bars(&bars)?;
    Ok(bars)
}

fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    if let Ok(ms) = raw.parse::<i64>() {
        return Some(ms);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}
