//! Historical sensor dataset backing `GET /history`.
//!
//! The CSV is read once at startup and kept as raw text. Conversion to
//! [`HistoryRecord`]s happens per request and is all-or-nothing: one bad
//! row fails the whole response.

use std::{io::Read, path::Path};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::StringRecord;

use crate::error::HistoryError;
use crate::HistoryRecord;

pub const TIMESTAMP_COLUMN: &str = "Timestamp";
pub const TEMPERATURE_COLUMN: &str = "Avg Temperature";
pub const HUMIDITY_COLUMN: &str = "Avg Humidity";
pub const AQI_COLUMN: &str = "Avg AQI";
pub const CATEGORY_COLUMN: &str = "AQI_Category";

/// Output format of `HistoryRecord::timestamp`.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

// ---

/// The dataset as read from disk, column names trimmed.
#[derive(Debug, Clone)]
pub struct HistoryTable {
    headers: Vec<String>,
    rows: Vec<StringRecord>,
}

struct Columns {
    timestamp: usize,
    temperature: usize,
    humidity: usize,
    aqi: usize,
    category: usize,
}

impl HistoryTable {
    /// Read the dataset at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, HistoryError> {
        // ---
        let path = path.as_ref();
        let read_err = |source| HistoryError::Read {
            path: path.to_path_buf(),
            source,
        };

        let reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(read_err)?;
        Self::from_csv(reader).map_err(read_err)
    }

    /// Read a dataset from any CSV source.
    pub fn from_reader<R: Read>(source: R) -> Result<Self, csv::Error> {
        let reader = csv::ReaderBuilder::new().flexible(true).from_reader(source);
        Self::from_csv(reader)
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Self, csv::Error> {
        // ---
        let headers = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let rows = reader.records().collect::<Result<Vec<_>, _>>()?;

        Ok(Self { headers, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Convert every row, in file order.
    pub fn records(&self) -> Result<Vec<HistoryRecord>, HistoryError> {
        // ---
        let cols = self.columns()?;

        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| convert_row(i + 1, row, &cols))
            .collect()
    }

    fn columns(&self) -> Result<Columns, HistoryError> {
        let find = |name: &'static str| {
            self.headers
                .iter()
                .position(|h| h == name)
                .ok_or(HistoryError::MissingColumn(name))
        };

        Ok(Columns {
            timestamp: find(TIMESTAMP_COLUMN)?,
            temperature: find(TEMPERATURE_COLUMN)?,
            humidity: find(HUMIDITY_COLUMN)?,
            aqi: find(AQI_COLUMN)?,
            category: find(CATEGORY_COLUMN)?,
        })
    }
}

fn convert_row(
    row: usize,
    record: &StringRecord,
    cols: &Columns,
) -> Result<HistoryRecord, HistoryError> {
    // ---
    let field = |idx: usize, column: &'static str| {
        record
            .get(idx)
            .map(str::trim)
            .ok_or(HistoryError::ShortRow { row, column })
    };
    let number = |idx: usize, column: &'static str| -> Result<f64, HistoryError> {
        let value = field(idx, column)?;
        value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| HistoryError::Number {
                row,
                column,
                value: value.to_string(),
            })
    };

    let raw_timestamp = field(cols.timestamp, TIMESTAMP_COLUMN)?;
    let timestamp = parse_timestamp(raw_timestamp).ok_or_else(|| HistoryError::Timestamp {
        row,
        value: raw_timestamp.to_string(),
    })?;

    Ok(HistoryRecord {
        timestamp: timestamp.format(TIMESTAMP_FORMAT).to_string(),
        temperature: number(cols.temperature, TEMPERATURE_COLUMN)?,
        humidity: number(cols.humidity, HUMIDITY_COLUMN)?,
        aqi: number(cols.aqi, AQI_COLUMN)?,
        category: field(cols.category, CATEGORY_COLUMN)?.to_string(),
    })
}

/// Parse the timestamp layouts the sensor exports have used.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    // ---
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
