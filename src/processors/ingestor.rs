use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::coordinator::{CoordinatorError, FailureKind, RequestContext, Served, TieredCoordinator};
use crate::error::{Result, StationError};
use crate::models::{StationMetadata, TemperatureReading};
use crate::processors::integrity_checker::{IntegrityChecker, IntegrityReport};
use crate::utils::constants::DEFAULT_INGEST_CONCURRENCY;
use crate::utils::progress::ProgressReporter;

/// Counts from one ingest run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub stations_registered: usize,
    pub stations_failed: usize,
    pub readings_written: usize,
    /// Subset of `readings_written` acknowledged below the first tier.
    pub readings_degraded: usize,
    pub readings_unavailable: usize,
    pub readings_failed: usize,
    pub readings_rejected: usize,
}

impl IngestReport {
    pub fn summary(&self) -> String {
        format!(
            "Stations: {} registered, {} failed\n\
             Readings: {} written ({} degraded), {} unavailable, {} failed, {} rejected",
            self.stations_registered,
            self.stations_failed,
            self.readings_written,
            self.readings_degraded,
            self.readings_unavailable,
            self.readings_failed,
            self.readings_rejected
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Written { degraded: bool },
    Unavailable,
    Failed,
}

impl Outcome {
    fn of<T>(result: std::result::Result<Served<T>, CoordinatorError>) -> Self {
        match result {
            Ok(served) => Outcome::Written {
                degraded: served.is_degraded(),
            },
            Err(e) => {
                warn!("{}", e);
                match e.failure_kind() {
                    Some(FailureKind::Unavailable) | Some(FailureKind::Timeout) => {
                        Outcome::Unavailable
                    }
                    _ => Outcome::Failed,
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct Tally {
    written: usize,
    degraded: usize,
    unavailable: usize,
    failed: usize,
}

impl Tally {
    fn add(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Written { degraded } => {
                self.written += 1;
                if degraded {
                    self.degraded += 1;
                }
            }
            Outcome::Unavailable => self.unavailable += 1,
            Outcome::Failed => self.failed += 1,
        }
    }
}

/// Loads station names and temperature readings through the coordinator.
pub struct Ingestor {
    coordinator: TieredCoordinator,
    concurrency: usize,
    deadline: Option<Duration>,
    cancel: CancellationToken,
}

impl Ingestor {
    pub fn new(coordinator: TieredCoordinator) -> Self {
        Self {
            coordinator,
            concurrency: DEFAULT_INGEST_CONCURRENCY,
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Per-write deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Register every station, then write the readings that pass the
    /// integrity check.
    pub async fn ingest(
        &self,
        stations: Vec<StationMetadata>,
        readings: Vec<TemperatureReading>,
        progress: Option<&ProgressReporter>,
    ) -> Result<(IngestReport, IntegrityReport)> {
        let mut report = IngestReport::default();

        let stations: Vec<StationMetadata> = stations
            .into_iter()
            .filter(|station| match station.validate() {
                Ok(()) => true,
                Err(e) => {
                    warn!("Skipping station {:?}: {}", station.id, e);
                    report.stations_failed += 1;
                    false
                }
            })
            .collect();
        let known: Vec<String> = stations.iter().map(|s| s.id.clone()).collect();

        if let Some(p) = progress {
            p.restart(stations.len() as u64, "Registering stations...");
        }
        let tally = self
            .drive(stations, progress, |coordinator, station, ctx| async move {
                Outcome::of(coordinator.register_station(&station, &ctx).await)
            })
            .await?;
        report.stations_registered = tally.written;
        report.stations_failed += tally.unavailable + tally.failed;
        info!(
            "Registered {} stations ({} failed)",
            report.stations_registered, report.stations_failed
        );

        let checker = IntegrityChecker::new().with_known_stations(known);
        let (accepted, integrity) = checker.partition(readings);
        report.readings_rejected = integrity.rejected_readings;

        if let Some(p) = progress {
            p.restart(accepted.len() as u64, "Writing temperature readings...");
        }
        let tally = self
            .drive(accepted, progress, |coordinator, reading, ctx| async move {
                Outcome::of(coordinator.record_temperature(&reading, &ctx).await)
            })
            .await?;
        report.readings_written = tally.written;
        report.readings_degraded = tally.degraded;
        report.readings_unavailable = tally.unavailable;
        report.readings_failed = tally.failed;

        info!(
            "Wrote {} readings ({} degraded, {} unavailable, {} failed, {} rejected)",
            report.readings_written,
            report.readings_degraded,
            report.readings_unavailable,
            report.readings_failed,
            report.readings_rejected
        );

        Ok((report, integrity))
    }

    /// Run `op` over `items` with at most `concurrency` requests in flight.
    async fn drive<T, F, Fut>(
        &self,
        items: Vec<T>,
        progress: Option<&ProgressReporter>,
        op: F,
    ) -> Result<Tally>
    where
        T: Send + 'static,
        F: Fn(TieredCoordinator, T, RequestContext) -> Fut,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        let mut tasks = JoinSet::new();
        let mut tally = Tally::default();

        for item in items {
            if self.cancel.is_cancelled() {
                break;
            }

            while tasks.len() >= self.concurrency {
                if let Some(done) = tasks.join_next().await {
                    tally.add(done?);
                    if let Some(p) = progress {
                        p.increment(1);
                    }
                }
            }

            tasks.spawn(op(self.coordinator.clone(), item, self.request_context()));
        }

        while let Some(done) = tasks.join_next().await {
            tally.add(done?);
            if let Some(p) = progress {
                p.increment(1);
            }
        }

        if self.cancel.is_cancelled() {
            debug!("Ingest cancelled after {} writes", tally.written);
            return Err(StationError::Cancelled);
        }

        Ok(tally)
    }

    fn request_context(&self) -> RequestContext {
        let ctx = RequestContext::new().with_cancel(self.cancel.child_token());
        match self.deadline {
            Some(d) => ctx.with_deadline(d),
            None => ctx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::coordinator::bootstrap;
    use crate::storage::{NodeState, ReplicatedMemoryEngine};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    async fn setup() -> (Arc<ReplicatedMemoryEngine>, TieredCoordinator) {
        let engine = Arc::new(ReplicatedMemoryEngine::new(3, Duration::from_millis(20)));
        let coordinator = bootstrap(engine.clone(), &StoreConfig::default())
            .await
            .unwrap();
        (engine, coordinator)
    }

    fn readings(station: &str, days: u32) -> Vec<TemperatureReading> {
        (1..=days)
            .map(|day| {
                let date = NaiveDate::from_ymd_opt(2022, 1, day).unwrap();
                TemperatureReading::new(station, date, -100, day as i32 * 10)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_ingest_counts() {
        let (_engine, coordinator) = setup().await;
        let ingestor = Ingestor::new(coordinator.clone()).with_concurrency(4);

        let mut batch = readings("USC00470124", 10);
        batch.push(TemperatureReading::new(
            "USC00470124",
            NaiveDate::from_ymd_opt(2022, 1, 20).unwrap(),
            50,
            10,
        ));

        let stations = vec![
            StationMetadata::new("USC00470124", "ABBOTSFORD"),
            StationMetadata::new("USC00470125", ""),
        ];
        let (report, integrity) = ingestor.ingest(stations, batch, None).await.unwrap();

        assert_eq!(
            report,
            IngestReport {
                stations_registered: 1,
                stations_failed: 1,
                readings_written: 10,
                readings_rejected: 1,
                ..IngestReport::default()
            }
        );
        assert_eq!(integrity.valid_readings, 10);

        let ctx = RequestContext::new();
        let max = coordinator.max_temperature("USC00470124", &ctx).await.unwrap();
        assert_eq!(max.value, Some(100));
    }

    #[tokio::test]
    async fn test_ingest_with_cluster_down() {
        let (engine, coordinator) = setup().await;
        engine.set_all_nodes(NodeState::Down);

        let ingestor = Ingestor::new(coordinator);
        let (report, _) = ingestor
            .ingest(
                vec![StationMetadata::new("USC00470124", "ABBOTSFORD")],
                readings("USC00470124", 3),
                None,
            )
            .await
            .unwrap();

        assert_eq!(report.stations_failed, 1);
        assert_eq!(report.readings_unavailable, 3);
        assert_eq!(report.readings_written, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_duplicate_rows_store_last_value() {
        let date = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();

        for _ in 0..50 {
            let (_engine, coordinator) = setup().await;
            let batch = vec![
                TemperatureReading::new("USC00470124", date, 0, 10),
                TemperatureReading::new("USC00470124", date, 0, 20),
            ];

            let (report, integrity) = Ingestor::new(coordinator.clone())
                .with_concurrency(64)
                .ingest(vec![], batch, None)
                .await
                .unwrap();

            assert_eq!(report.readings_written, 1);
            assert_eq!(report.readings_rejected, 0);
            assert_eq!(integrity.duplicate_keys, 1);

            let max = coordinator
                .max_temperature("USC00470124", &RequestContext::new())
                .await
                .unwrap();
            assert_eq!(max.value, Some(20));
        }
    }

    #[tokio::test]
    async fn test_cancelled_ingest() {
        let (_engine, coordinator) = setup().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = Ingestor::new(coordinator)
            .with_cancel(cancel)
            .ingest(vec![], readings("USC00470124", 3), None)
            .await;

        assert!(matches!(result, Err(StationError::Cancelled)));
    }
}
