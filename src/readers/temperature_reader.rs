use crate::error::{Result, StationError};
use crate::models::TemperatureReading;
use crate::utils::constants::DEFAULT_BUFFER_SIZE;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// GHCN marker for a missing observation.
const MISSING_VALUE: i32 = -9999;

#[derive(Debug, Deserialize)]
struct RawReading {
    station: String,
    date: String,
    tmin: Option<i32>,
    tmax: Option<i32>,
}

/// Reader for `station,date,tmin,tmax` CSV files (tenths °C).
pub struct TemperatureReader {
    skip_missing: bool,
}

impl TemperatureReader {
    pub fn new() -> Self {
        Self { skip_missing: true }
    }

    /// When false, a row with a missing `tmin`/`tmax` is an error instead of
    /// being skipped.
    pub fn with_skip_missing(skip_missing: bool) -> Self {
        Self { skip_missing }
    }

    pub fn read_readings(&self, path: &Path) -> Result<Vec<TemperatureReading>> {
        let file = File::open(path)?;
        self.read_from(BufReader::with_capacity(DEFAULT_BUFFER_SIZE, file))
    }

    pub fn read_from<R: Read>(&self, reader: R) -> Result<Vec<TemperatureReading>> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut readings = Vec::new();
        for row in csv_reader.deserialize::<RawReading>() {
            if let Some(reading) = self.convert(row?)? {
                readings.push(reading);
            }
        }

        Ok(readings)
    }

    fn convert(&self, raw: RawReading) -> Result<Option<TemperatureReading>> {
        let date = parse_date(&raw.date)?;

        let present = |v: Option<i32>| v.filter(|t| *t != MISSING_VALUE);
        match (present(raw.tmin), present(raw.tmax)) {
            (Some(tmin), Some(tmax)) => Ok(Some(TemperatureReading::new(
                raw.station,
                date,
                tmin,
                tmax,
            ))),
            _ if self.skip_missing => Ok(None),
            _ => Err(StationError::InvalidFormat(format!(
                "Missing temperature for station {} on {}",
                raw.station, date
            ))),
        }
    }
}

impl Default for TemperatureReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Accepts `YYYY-MM-DD` and the compact `YYYYMMDD`.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y%m%d"))
        .map_err(|_| StationError::InvalidFormat(format!("Invalid date format: '{}'", value)))
}
