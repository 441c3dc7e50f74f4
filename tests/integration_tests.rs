use async_trait::async_trait;
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use station_store::config::StoreConfig;
use station_store::coordinator::{
    bootstrap, connect, CancelReason, CoordinatorError, RequestContext, TieredCoordinator,
};
use station_store::models::{StationMetadata, TableSchema, TemperatureReading};
use station_store::service::{ReplyStatus, StationService};
use station_store::storage::{
    ConsistencyLevel, ConsistencyTier, EngineError, NodeState, PreparedStatement,
    ReplicatedMemoryEngine, Row, Statement, StorageEngine, Value,
};

const STATION: &str = "USC00470124";

/// Engine double that replays scripted results in order and records every
/// `execute` call it sees.
#[derive(Default)]
struct ScriptedEngine {
    script: Mutex<VecDeque<Result<Vec<Row>, EngineError>>>,
    calls: Mutex<Vec<(Statement, ConsistencyLevel)>>,
    delay: Option<Duration>,
}

impl ScriptedEngine {
    fn new(script: Vec<Result<Vec<Row>, EngineError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<(Statement, ConsistencyLevel)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageEngine for ScriptedEngine {
    async fn create_schema(&self, _schema: &TableSchema) -> Result<(), EngineError> {
        Ok(())
    }

    async fn prepare(&self, statement: Statement) -> Result<PreparedStatement, EngineError> {
        Ok(PreparedStatement::new(0, statement))
    }

    async fn execute(
        &self,
        prepared: &PreparedStatement,
        level: ConsistencyLevel,
        _params: &[Value],
    ) -> Result<Vec<Row>, EngineError> {
        self.calls.lock().unwrap().push((prepared.statement, level));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn describe_table(&self) -> Result<String, EngineError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(TableSchema::stations(2).create_table_cql())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

async fn scripted(engine: Arc<ScriptedEngine>) -> TieredCoordinator {
    connect(engine, &StoreConfig::default()).await.unwrap()
}

async fn replicated(replica_timeout_ms: u64) -> (Arc<ReplicatedMemoryEngine>, TieredCoordinator) {
    let engine = Arc::new(ReplicatedMemoryEngine::new(
        3,
        Duration::from_millis(replica_timeout_ms),
    ));
    let coordinator = bootstrap(engine.clone(), &StoreConfig::default())
        .await
        .unwrap();
    (engine, coordinator)
}

fn unavailable(level: ConsistencyLevel) -> EngineError {
    EngineError::Unavailable {
        level,
        required: 2,
        alive: 1,
    }
}

fn max_row(tmax: i32) -> Vec<Row> {
    vec![Row::new().with("max_temp", Value::Int(tmax))]
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, day).unwrap()
}

#[tokio::test]
async fn test_strong_tier_tried_before_available() {
    let engine = Arc::new(ScriptedEngine::new(vec![
        Err(unavailable(ConsistencyLevel::Two)),
        Ok(max_row(344)),
    ]));
    let coordinator = scripted(engine.clone()).await;

    let served = coordinator
        .max_temperature(STATION, &RequestContext::new())
        .await
        .unwrap();

    assert_eq!(served.value, Some(344));
    assert_eq!(served.tier, ConsistencyTier::Available);
    assert_eq!(served.tag(), "fallback_to_available");
    assert_eq!(
        engine.calls(),
        vec![
            (Statement::SelectMaxTmax, ConsistencyLevel::Two),
            (Statement::SelectMaxTmax, ConsistencyLevel::One),
        ]
    );
}

#[tokio::test]
async fn test_timeout_degrades() {
    let engine = Arc::new(ScriptedEngine::new(vec![
        Err(EngineError::ReadTimeout {
            level: ConsistencyLevel::Two,
            received: 1,
            required: 2,
        }),
        Ok(vec![Row::new().with("name", Value::from("ABBOTSFORD"))]),
    ]));
    let coordinator = scripted(engine.clone()).await;

    let served = coordinator
        .lookup_station_name(STATION, &RequestContext::new())
        .await
        .unwrap();

    assert_eq!(served.value.as_deref(), Some("ABBOTSFORD"));
    assert!(served.is_degraded());
    assert_eq!(engine.calls().len(), 2);
}

#[tokio::test]
async fn test_fatal_error_aborts_after_one_attempt() {
    let engine = Arc::new(ScriptedEngine::new(vec![Err(EngineError::InvalidQuery(
        "bad bind".to_string(),
    ))]));
    let coordinator = scripted(engine.clone()).await;

    let err = coordinator
        .max_temperature(STATION, &RequestContext::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CoordinatorError::Fatal { .. }));
    assert!(err.tag().contains("bad bind"));
    assert_eq!(engine.calls().len(), 1);
}

#[tokio::test]
async fn test_exhausted_tiers_report_last_failure() {
    let engine = Arc::new(ScriptedEngine::new(vec![
        Err(unavailable(ConsistencyLevel::Two)),
        Err(EngineError::ReadTimeout {
            level: ConsistencyLevel::One,
            received: 0,
            required: 1,
        }),
    ]));
    let coordinator = scripted(engine.clone()).await;

    let err = coordinator
        .max_temperature(STATION, &RequestContext::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CoordinatorError::Timeout { .. }));
    assert_eq!(err.tag(), "timeout");
    assert_eq!(engine.calls().len(), 2);
}

#[tokio::test]
async fn test_write_has_single_tier() {
    let engine = Arc::new(ScriptedEngine::new(vec![Err(EngineError::WriteTimeout {
        level: ConsistencyLevel::One,
        received: 0,
        required: 1,
    })]));
    let coordinator = scripted(engine.clone()).await;

    let reading = TemperatureReading::new(STATION, date(1), -10, 40);
    let err = coordinator
        .record_temperature(&reading, &RequestContext::new())
        .await
        .unwrap_err();

    assert_eq!(err.tag(), "timeout");
    assert_eq!(
        engine.calls(),
        vec![(Statement::InsertTemperature, ConsistencyLevel::One)]
    );
}

#[tokio::test]
async fn test_caller_cancellation_is_not_unavailable() {
    let engine = Arc::new(ScriptedEngine::slow(Duration::from_secs(30)));
    let coordinator = scripted(engine.clone()).await;

    let cancel = CancellationToken::new();
    let ctx = RequestContext::new().with_cancel(cancel.clone());
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
    });

    let err = coordinator.max_temperature(STATION, &ctx).await.unwrap_err();

    match err {
        CoordinatorError::Cancelled {
            reason, attempts, ..
        } => {
            assert_eq!(reason, CancelReason::Caller);
            assert_eq!(attempts, 1);
        }
        other => panic!("expected cancellation, got {:?}", other),
    }
    assert_eq!(engine.calls().len(), 1);
}

#[tokio::test]
async fn test_deadline_covers_whole_sequence() {
    let engine = Arc::new(ScriptedEngine::slow(Duration::from_secs(30)));
    let coordinator = scripted(engine).await;

    let ctx = RequestContext::new().with_deadline(Duration::from_millis(30));
    let err = coordinator.max_temperature(STATION, &ctx).await.unwrap_err();

    assert!(matches!(
        err,
        CoordinatorError::Cancelled {
            reason: CancelReason::Deadline,
            ..
        }
    ));
    assert_eq!(err.tag(), "cancelled");
}

#[tokio::test]
async fn test_schema_describe_honors_deadline() {
    let engine = Arc::new(ScriptedEngine::slow(Duration::from_secs(30)));
    let service = StationService::new(scripted(engine).await);

    let ctx = RequestContext::new().with_deadline(Duration::from_millis(30));
    let reply = tokio::time::timeout(Duration::from_secs(5), service.station_schema(&ctx))
        .await
        .expect("schema describe ignored the deadline");

    assert_eq!(reply.status, ReplyStatus::Failed);
    assert_eq!(reply.error, "Request cancelled");
    assert_eq!(reply.schema, "");
}

#[tokio::test]
async fn test_round_trip_and_idempotent_overwrite() {
    let (_engine, coordinator) = replicated(20).await;
    let ctx = RequestContext::new();

    coordinator
        .register_station(&StationMetadata::new(STATION, "ABBOTSFORD"), &ctx)
        .await
        .unwrap();
    coordinator
        .record_temperature(&TemperatureReading::new(STATION, date(5), -20, 10), &ctx)
        .await
        .unwrap();
    coordinator
        .record_temperature(&TemperatureReading::new(STATION, date(5), -30, 55), &ctx)
        .await
        .unwrap();

    let name = coordinator.lookup_station_name(STATION, &ctx).await.unwrap();
    assert_eq!(name.value.as_deref(), Some("ABBOTSFORD"));
    assert_eq!(name.tag(), "");

    let records = coordinator
        .station_records(STATION, date(1), date(31), &ctx)
        .await
        .unwrap();
    assert_eq!(
        records.value,
        vec![TemperatureReading::new(STATION, date(5), -30, 55)]
    );

    let max = coordinator.max_temperature(STATION, &ctx).await.unwrap();
    assert_eq!(max.value, Some(55));
}

#[tokio::test]
async fn test_monotonic_degradation() {
    let (engine, coordinator) = replicated(20).await;
    let service = StationService::new(coordinator);
    let ctx = service.request_context();

    for (day, tmax) in [(1, -32), (2, 344), (3, 12)] {
        let reply = service.record_temps(STATION, date(day), -100, tmax, &ctx).await;
        assert_eq!(reply.status, ReplyStatus::Ok);
    }

    let healthy = service.station_max(STATION, &ctx).await;
    assert_eq!((healthy.tmax, healthy.error.as_str()), (344, ""));

    engine.take_down_replicas(STATION, 1);
    let degraded = service.station_max(STATION, &ctx).await;
    assert_eq!(degraded.tmax, 344);
    assert_eq!(degraded.error, "fallback_to_available");
    assert_eq!(degraded.status, ReplyStatus::Degraded);

    // Writes only need one replica.
    let write = service.record_temps(STATION, date(4), 0, 20, &ctx).await;
    assert_eq!((write.ok, write.error.as_str()), (true, ""));

    engine.take_down_replicas(STATION, 2);
    let failed = service.station_max(STATION, &ctx).await;
    assert_eq!((failed.tmax, failed.error.as_str()), (0, "unavailable"));
    assert_eq!(failed.status, ReplyStatus::Failed);
}

#[tokio::test]
async fn test_unresponsive_replica_falls_back() {
    let (engine, coordinator) = replicated(20).await;
    let ctx = RequestContext::new();

    coordinator
        .record_temperature(&TemperatureReading::new(STATION, date(1), 0, 99), &ctx)
        .await
        .unwrap();

    let last = *engine.replicas_for(STATION).last().unwrap();
    engine.set_node_state(last, NodeState::Unresponsive);

    let max = coordinator.max_temperature(STATION, &ctx).await.unwrap();
    assert_eq!(max.value, Some(99));
    assert_eq!(max.tag(), "fallback_to_available");
}

#[tokio::test]
async fn test_unknown_station_is_empty_not_error() {
    let (_engine, coordinator) = replicated(20).await;
    let service = StationService::new(coordinator);
    let ctx = service.request_context();

    let max = service.station_max("USC00000000", &ctx).await;
    assert_eq!((max.tmax, max.found, max.error.as_str()), (0, false, ""));

    let name = service.station_name("USC00000000", &ctx).await;
    assert_eq!((name.name.as_str(), name.found), ("", false));
    assert_eq!(name.status, ReplyStatus::Ok);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests() {
    let (_engine, coordinator) = replicated(20).await;

    let mut handles = Vec::new();
    for i in 0..32u32 {
        let coordinator = coordinator.clone();
        handles.push(tokio::spawn(async move {
            let station = format!("USC004701{:02}", i);
            let ctx = RequestContext::new();
            coordinator
                .record_temperature(
                    &TemperatureReading::new(station.as_str(), date(1), 0, i as i32),
                    &ctx,
                )
                .await
                .unwrap();
            coordinator
                .max_temperature(&station, &ctx)
                .await
                .unwrap()
                .value
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap(), Some(i as i32));
    }
}
