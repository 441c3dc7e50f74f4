use crate::models::TemperatureReading;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct IntegrityReport {
    pub total_readings: usize,
    pub valid_readings: usize,
    pub rejected_readings: usize,
    pub duplicate_keys: usize,
    pub violations: Vec<ReadingViolation>,
    pub station_statistics: HashMap<String, StationStatistics>,
}

#[derive(Debug, Clone)]
pub struct ReadingViolation {
    pub station_id: String,
    pub date: NaiveDate,
    pub violation_type: ViolationType,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationType {
    MinGreaterThanMax,
    OutOfRange,
    SuspiciousJump,
    DuplicateKey,
    UnknownStation,
}

impl ViolationType {
    /// Violations that keep a reading out of the store. The rest are reported only.
    pub fn rejects(&self) -> bool {
        matches!(
            self,
            ViolationType::MinGreaterThanMax | ViolationType::OutOfRange
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct StationStatistics {
    pub total_readings: usize,
    pub lowest_tmin: Option<i32>,
    pub highest_tmax: Option<i32>,
}

pub struct IntegrityChecker {
    /// Day-over-day change in tenths °C that gets flagged.
    jump_threshold: i32,
    known_stations: Option<HashSet<String>>,
}

impl IntegrityChecker {
    pub fn new() -> Self {
        Self {
            jump_threshold: 250, // 25°C between consecutive days
            known_stations: None,
        }
    }

    pub fn with_jump_threshold(mut self, tenths: i32) -> Self {
        self.jump_threshold = tenths;
        self
    }

    /// Flag readings whose station is not in `stations`.
    pub fn with_known_stations<I, S>(mut self, stations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_stations = Some(stations.into_iter().map(Into::into).collect());
        self
    }

    /// Check a batch and split it into readings fit to store and a report.
    pub fn partition(
        &self,
        readings: Vec<TemperatureReading>,
    ) -> (Vec<TemperatureReading>, IntegrityReport) {
        let mut report = IntegrityReport {
            total_readings: readings.len(),
            ..IntegrityReport::default()
        };

        // Writes run concurrently, so only the last storable row per key
        // may leave the checker.
        let superseded: HashSet<usize> = {
            let storable: Vec<usize> = (0..readings.len())
                .filter(|&idx| self.check_reading(&readings[idx]).is_none())
                .collect();
            let mut last: HashMap<(&str, NaiveDate), usize> = HashMap::new();
            for &idx in &storable {
                last.insert((readings[idx].station_id.as_str(), readings[idx].date), idx);
            }
            storable
                .into_iter()
                .filter(|idx| {
                    let reading = &readings[*idx];
                    last.get(&(reading.station_id.as_str(), reading.date)) != Some(idx)
                })
                .collect()
        };

        let mut accepted = Vec::with_capacity(readings.len());
        let mut seen: HashSet<(String, NaiveDate)> = HashSet::with_capacity(readings.len());

        for (idx, reading) in readings.into_iter().enumerate() {
            if !seen.insert((reading.station_id.clone(), reading.date)) {
                report.duplicate_keys += 1;
                report.violations.push(ReadingViolation {
                    station_id: reading.station_id.clone(),
                    date: reading.date,
                    violation_type: ViolationType::DuplicateKey,
                    details: "key appears more than once in batch".to_string(),
                });
            }

            if let Some(known) = &self.known_stations {
                if !known.contains(&reading.station_id) {
                    report.violations.push(ReadingViolation {
                        station_id: reading.station_id.clone(),
                        date: reading.date,
                        violation_type: ViolationType::UnknownStation,
                        details: "station has no registered name".to_string(),
                    });
                }
            }

            if let Some(violation) = self.check_reading(&reading) {
                report.rejected_readings += 1;
                report.violations.push(violation);
                continue;
            }
            if superseded.contains(&idx) {
                continue;
            }

            report.valid_readings += 1;
            let stats = report
                .station_statistics
                .entry(reading.station_id.clone())
                .or_default();
            stats.total_readings += 1;
            stats.lowest_tmin = Some(
                stats
                    .lowest_tmin
                    .map_or(reading.record.tmin, |t| t.min(reading.record.tmin)),
            );
            stats.highest_tmax = Some(
                stats
                    .highest_tmax
                    .map_or(reading.record.tmax, |t| t.max(reading.record.tmax)),
            );

            accepted.push(reading);
        }

        self.check_time_series(&accepted, &mut report);
        (accepted, report)
    }

    fn check_reading(&self, reading: &TemperatureReading) -> Option<ReadingViolation> {
        let violation_type = if reading.record.tmin > reading.record.tmax {
            ViolationType::MinGreaterThanMax
        } else if !reading.record.is_valid_range() {
            ViolationType::OutOfRange
        } else {
            return None;
        };

        Some(ReadingViolation {
            station_id: reading.station_id.clone(),
            date: reading.date,
            violation_type,
            details: reading
                .validate()
                .err()
                .map(|e| e.to_string())
                .unwrap_or_default(),
        })
    }

    /// Flag implausible day-over-day `tmax` jumps within each station.
    fn check_time_series(&self, readings: &[TemperatureReading], report: &mut IntegrityReport) {
        let mut by_station: HashMap<&str, Vec<&TemperatureReading>> = HashMap::new();
        for reading in readings {
            by_station
                .entry(reading.station_id.as_str())
                .or_default()
                .push(reading);
        }

        for (station_id, mut series) in by_station {
            series.sort_by_key(|r| r.date);

            for window in series.windows(2) {
                let (prev, curr) = (window[0], window[1]);
                if (curr.date - prev.date).num_days() != 1 {
                    continue;
                }

                let jump = (curr.record.tmax - prev.record.tmax).abs();
                if jump > self.jump_threshold {
                    report.violations.push(ReadingViolation {
                        station_id: station_id.to_string(),
                        date: curr.date,
                        violation_type: ViolationType::SuspiciousJump,
                        details: format!(
                            "tmax jumped {:.1}°C from {} to {}",
                            jump as f32 / 10.0,
                            prev.date,
                            curr.date
                        ),
                    });
                }
            }
        }
    }

    /// Generate a summary report
    pub fn generate_summary(&self, report: &IntegrityReport) -> String {
        let mut summary = String::new();
        let pct = |n: usize| {
            if report.total_readings == 0 {
                0.0
            } else {
                100.0 * n as f64 / report.total_readings as f64
            }
        };

        summary.push_str("=== Integrity Check Report ===\n");
        summary.push_str(&format!("Total Readings: {}\n", report.total_readings));
        summary.push_str(&format!(
            "Valid Readings: {} ({:.1}%)\n",
            report.valid_readings,
            pct(report.valid_readings)
        ));
        summary.push_str(&format!(
            "Rejected Readings: {} ({:.1}%)\n",
            report.rejected_readings,
            pct(report.rejected_readings)
        ));
        summary.push_str(&format!("Duplicate Keys: {}\n", report.duplicate_keys));
        summary.push_str(&format!("Stations: {}\n", report.station_statistics.len()));
        summary.push_str(&format!("\nViolations: {}\n", report.violations.len()));

        if !report.violations.is_empty() {
            summary.push_str("\nTop 10 Violations:\n");
            for (i, violation) in report.violations.iter().take(10).enumerate() {
                summary.push_str(&format!(
                    "  {}. Station {} on {}: {:?} {}\n",
                    i + 1,
                    violation.station_id,
                    violation.date,
                    violation.violation_type,
                    violation.details
                ));
            }
        }

        summary
    }
}

impl Default for IntegrityChecker {
    fn default() -> Self {
        Self::new()
    }
}
