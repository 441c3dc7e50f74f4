use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StationError};
use crate::utils::constants::{MAX_VALID_TENTHS, MIN_VALID_TENTHS};

/// Compound `{tmin, tmax}` value stored inline in each clustered row.
/// Both values are tenths of a degree Celsius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemperatureRecord {
    pub tmin: i32,
    pub tmax: i32,
}

impl TemperatureRecord {
    pub fn new(tmin: i32, tmax: i32) -> Self {
        Self { tmin, tmax }
    }

    pub fn tmin_celsius(&self) -> f32 {
        self.tmin as f32 / 10.0
    }

    pub fn tmax_celsius(&self) -> f32 {
        self.tmax as f32 / 10.0
    }

    pub fn is_valid_range(&self) -> bool {
        (MIN_VALID_TENTHS..=MAX_VALID_TENTHS).contains(&self.tmin)
            && (MIN_VALID_TENTHS..=MAX_VALID_TENTHS).contains(&self.tmax)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tmin > self.tmax {
            return Err(StationError::TemperatureValidation {
                message: format!("tmin {} > tmax {}", self.tmin, self.tmax),
            });
        }

        if !self.is_valid_range() {
            return Err(StationError::TemperatureValidation {
                message: format!(
                    "Temperatures ({}, {}) outside valid range [{}, {}] tenths °C",
                    self.tmin, self.tmax, MIN_VALID_TENTHS, MAX_VALID_TENTHS
                ),
            });
        }

        Ok(())
    }
}

/// One clustered row as supplied by ingestion: the `(station_id, date)` key
/// plus its compound value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemperatureReading {
    pub station_id: String,
    pub date: NaiveDate,
    pub record: TemperatureRecord,
}

impl TemperatureReading {
    pub fn new(station_id: impl Into<String>, date: NaiveDate, tmin: i32, tmax: i32) -> Self {
        Self {
            station_id: station_id.into(),
            date,
            record: TemperatureRecord::new(tmin, tmax),
        }
    }

    pub fn key(&self) -> (&str, NaiveDate) {
        (&self.station_id, self.date)
    }

    pub fn validate(&self) -> Result<()> {
        if self.station_id.trim().is_empty() {
            return Err(StationError::InvalidFormat(format!(
                "Reading on {} has an empty station id",
                self.date
            )));
        }
        self.record.validate()
    }
}
