//! Request/response surface over the coordinator.
//!
//! Transport framing lives elsewhere; this layer turns coordinator results
//! into replies whose `error` strings follow the tagging convention
//! (`""`, `"fallback_to_available"`, `"unavailable"`, ...).

pub mod replies;

pub use replies::{
    RecordTempsReply, ReplyStatus, StationMaxReply, StationNameReply, StationRecordsReply,
    StationSchemaReply,
};

use chrono::NaiveDate;
use std::time::Duration;
use tracing::{instrument, warn};

use crate::coordinator::{RequestContext, TieredCoordinator};
use crate::models::TemperatureReading;

#[derive(Clone)]
pub struct StationService {
    coordinator: TieredCoordinator,
    deadline: Option<Duration>,
}

impl StationService {
    pub fn new(coordinator: TieredCoordinator) -> Self {
        Self {
            coordinator,
            deadline: None,
        }
    }

    /// Apply `deadline` to every request created by [`Self::request_context`].
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn coordinator(&self) -> &TieredCoordinator {
        &self.coordinator
    }

    pub fn request_context(&self) -> RequestContext {
        match self.deadline {
            Some(d) => RequestContext::new().with_deadline(d),
            None => RequestContext::new(),
        }
    }

    #[instrument(skip(self, ctx))]
    pub async fn station_name(&self, station: &str, ctx: &RequestContext) -> StationNameReply {
        match self.coordinator.lookup_station_name(station, ctx).await {
            Ok(served) => StationNameReply::served(served),
            Err(e) => {
                warn!("Station name lookup failed: {}", e);
                StationNameReply::failed(&e)
            }
        }
    }

    #[instrument(skip(self, ctx))]
    pub async fn station_max(&self, station: &str, ctx: &RequestContext) -> StationMaxReply {
        match self.coordinator.max_temperature(station, ctx).await {
            Ok(served) => StationMaxReply::served(served),
            Err(e) => {
                warn!("Max temperature lookup failed: {}", e);
                StationMaxReply::failed(&e)
            }
        }
    }

    #[instrument(skip(self, ctx))]
    pub async fn record_temps(
        &self,
        station: &str,
        date: NaiveDate,
        tmin: i32,
        tmax: i32,
        ctx: &RequestContext,
    ) -> RecordTempsReply {
        // Uploads are stored as sent; screening belongs to batch ingestion.
        let reading = TemperatureReading::new(station, date, tmin, tmax);
        match self.coordinator.record_temperature(&reading, ctx).await {
            Ok(served) => RecordTempsReply::served(served),
            Err(e) => {
                warn!("Temperature write failed: {}", e);
                RecordTempsReply::failed(&e)
            }
        }
    }

    #[instrument(skip(self, ctx))]
    pub async fn station_records(
        &self,
        station: &str,
        from: NaiveDate,
        to: NaiveDate,
        ctx: &RequestContext,
    ) -> StationRecordsReply {
        match self.coordinator.station_records(station, from, to, ctx).await {
            Ok(served) => StationRecordsReply::served(served),
            Err(e) => {
                warn!("Station range scan failed: {}", e);
                StationRecordsReply::failed(&e)
            }
        }
    }

    pub async fn station_schema(&self, ctx: &RequestContext) -> StationSchemaReply {
        match self.coordinator.describe_schema(ctx).await {
            Ok(schema) => StationSchemaReply {
                schema,
                error: String::new(),
                status: ReplyStatus::Ok,
            },
            Err(e) => StationSchemaReply {
                schema: String::new(),
                error: e.to_string(),
                status: ReplyStatus::Failed,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::coordinator::bootstrap;
    use crate::storage::{NodeState, ReplicatedMemoryEngine};
    use std::sync::Arc;

    async fn service() -> (Arc<ReplicatedMemoryEngine>, StationService) {
        let engine = Arc::new(ReplicatedMemoryEngine::new(3, Duration::from_millis(20)));
        let coordinator = bootstrap(engine.clone(), &StoreConfig::default())
            .await
            .unwrap();
        (engine, StationService::new(coordinator).with_deadline(Duration::from_secs(5)))
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 3, day).unwrap()
    }

    #[tokio::test]
    async fn test_max_correctness() {
        let (_engine, service) = service().await;
        let ctx = service.request_context();

        for (day, tmax) in [(1, -32), (2, 344), (3, 12)] {
            let reply = service.record_temps("USC00470124", date(day), -100, tmax, &ctx).await;
            assert!(reply.ok, "{:?}", reply);
            assert_eq!(reply.error, "");
        }

        let reply = service.station_max("USC00470124", &ctx).await;
        assert_eq!(reply.tmax, 344);
        assert_eq!(reply.error, "");
        assert_eq!(reply.status, ReplyStatus::Ok);
    }

    #[tokio::test]
    async fn test_unscreened_upload_is_accepted() {
        let (_engine, service) = service().await;
        let ctx = service.request_context();

        let inverted = service.record_temps("USC00470124", date(1), 300, 100, &ctx).await;
        assert_eq!((inverted.ok, inverted.error.as_str()), (true, ""));
        assert_eq!(inverted.status, ReplyStatus::Ok);

        let hot = service.record_temps("USC00470124", date(2), 0, 750, &ctx).await;
        assert_eq!((hot.ok, hot.error.as_str()), (true, ""));

        let max = service.station_max("USC00470124", &ctx).await;
        assert_eq!(max.tmax, 750);
    }

    #[tokio::test]
    async fn test_total_failure_replies() {
        let (engine, service) = service().await;
        let ctx = service.request_context();
        engine.set_all_nodes(NodeState::Down);

        let max = service.station_max("USC00470124", &ctx).await;
        assert_eq!((max.tmax, max.error.as_str()), (0, "unavailable"));

        let name = service.station_name("USC00470124", &ctx).await;
        assert_eq!((name.name.as_str(), name.error.as_str()), ("", "unavailable"));

        let write = service.record_temps("USC00470124", date(2), 1, 2, &ctx).await;
        assert_eq!((write.ok, write.error.as_str()), (false, "unavailable"));
    }

    #[tokio::test]
    async fn test_schema_reply() {
        let (_engine, service) = service().await;
        let reply = service.station_schema(&service.request_context()).await;

        assert_eq!(reply.status, ReplyStatus::Ok);
        assert!(reply.schema.contains("PRIMARY KEY (id, date)"));
    }
}
