//! Consistency-tiered execution.
//!
//! Each request walks its operation's profiles strongest first:
//!
//! ```text
//! Init -> Trying(0) -> Success(0)
//!                   -> Degrade -> Trying(1) -> Success(1) | Terminal
//!                   -> Terminal
//! ```
//!
//! Nothing survives between requests. Cancellation and the request deadline
//! wrap the whole walk, not individual attempts.

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::classifier::{classify, FailureKind, Verdict};
use super::registry::{Operation, Profile, StatementRegistry};
use crate::error::{Result, StationError};
use crate::models::{StationMetadata, TemperatureReading, TemperatureRecord};
use crate::storage::{ConsistencyTier, EngineError, Row, StorageEngine, Value};
use crate::utils::constants::{TAG_CANCELLED, TAG_TIMEOUT, TAG_UNAVAILABLE};

/// Per-request cancellation handle and overall deadline.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub cancel: CancellationToken,
    pub deadline: Option<Duration>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CancelReason {
    Caller,
    Deadline,
}

/// A successful result and the profile that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Served<T> {
    pub value: T,
    pub tier: ConsistencyTier,
    pub profile_index: usize,
}

impl<T> Served<T> {
    pub fn new(value: T, tier: ConsistencyTier, profile_index: usize) -> Self {
        Self {
            value,
            tier,
            profile_index,
        }
    }

    /// True when a weaker profile than the operation's first served the request.
    pub fn is_degraded(&self) -> bool {
        self.profile_index > 0
    }

    /// Empty when the primary profile served it, `fallback_to_<tier>` otherwise.
    pub fn tag(&self) -> String {
        if self.is_degraded() {
            format!("fallback_to_{}", self.tier)
        } else {
            String::new()
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Served<U> {
        Served {
            value: f(self.value),
            tier: self.tier,
            profile_index: self.profile_index,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("{operation}: no consistency tier available ({source})")]
    Unavailable {
        operation: Operation,
        source: EngineError,
    },

    #[error("{operation}: timed out at every consistency tier ({source})")]
    Timeout {
        operation: Operation,
        source: EngineError,
    },

    #[error("{operation} failed: {source}")]
    Fatal {
        operation: Operation,
        source: EngineError,
    },

    #[error("{operation} cancelled ({reason:?}) after {attempts} attempt(s)")]
    Cancelled {
        operation: Operation,
        reason: CancelReason,
        attempts: usize,
    },

    #[error("No statement profiles registered for {0}")]
    Unregistered(Operation),
}

impl CoordinatorError {
    fn from_failure(operation: Operation, kind: FailureKind, source: EngineError) -> Self {
        match kind {
            FailureKind::Unavailable => CoordinatorError::Unavailable { operation, source },
            FailureKind::Timeout => CoordinatorError::Timeout { operation, source },
            FailureKind::Fatal => CoordinatorError::Fatal { operation, source },
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            CoordinatorError::Unavailable { .. } => Some(FailureKind::Unavailable),
            CoordinatorError::Timeout { .. } => Some(FailureKind::Timeout),
            CoordinatorError::Fatal { .. } | CoordinatorError::Unregistered(_) => {
                Some(FailureKind::Fatal)
            }
            CoordinatorError::Cancelled { .. } => None,
        }
    }

    /// Short machine-readable error string used in replies.
    pub fn tag(&self) -> String {
        match self {
            CoordinatorError::Unavailable { .. } => TAG_UNAVAILABLE.to_string(),
            CoordinatorError::Timeout { .. } => TAG_TIMEOUT.to_string(),
            CoordinatorError::Cancelled { .. } => TAG_CANCELLED.to_string(),
            CoordinatorError::Fatal { source, .. } => source.to_string(),
            CoordinatorError::Unregistered(op) => format!("unregistered operation {}", op),
        }
    }
}

enum TierState {
    Init,
    Trying(usize),
    Success(usize, Vec<Row>),
    Terminal(CoordinatorError),
}

/// Stateless per request; clone freely and call concurrently.
#[derive(Clone)]
pub struct TieredCoordinator {
    engine: Arc<dyn StorageEngine>,
    registry: Arc<StatementRegistry>,
}

impl TieredCoordinator {
    pub fn new(engine: Arc<dyn StorageEngine>, registry: Arc<StatementRegistry>) -> Self {
        Self { engine, registry }
    }

    pub fn registry(&self) -> &StatementRegistry {
        &self.registry
    }

    pub fn engine(&self) -> &Arc<dyn StorageEngine> {
        &self.engine
    }

    /// Run `operation`'s profiles in order until one succeeds.
    pub async fn execute(
        &self,
        operation: Operation,
        params: &[Value],
        ctx: &RequestContext,
    ) -> std::result::Result<Served<Vec<Row>>, CoordinatorError> {
        let attempts = AtomicUsize::new(0);
        let profiles = self.registry.profiles(operation);
        let walk = self.walk_profiles(operation, profiles, params, &attempts);

        let deadline = async {
            match ctx.deadline {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        let cancelled = |reason: CancelReason| {
            let attempts = attempts.load(Ordering::SeqCst);
            warn!(
                "{} cancelled ({:?}) after {} attempt(s)",
                operation, reason, attempts
            );
            CoordinatorError::Cancelled {
                operation,
                reason,
                attempts,
            }
        };

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(cancelled(CancelReason::Caller)),
            _ = deadline => Err(cancelled(CancelReason::Deadline)),
            result = walk => result,
        }
    }

    async fn walk_profiles(
        &self,
        operation: Operation,
        profiles: &[Profile],
        params: &[Value],
        attempts: &AtomicUsize,
    ) -> std::result::Result<Served<Vec<Row>>, CoordinatorError> {
        let mut state = TierState::Init;

        loop {
            state = match state {
                TierState::Init if profiles.is_empty() => {
                    TierState::Terminal(CoordinatorError::Unregistered(operation))
                }
                TierState::Init => TierState::Trying(0),
                TierState::Trying(i) => {
                    let profile = &profiles[i];
                    attempts.fetch_add(1, Ordering::SeqCst);
                    debug!(
                        "{}: trying profile {} ({} at {})",
                        operation, i, profile.tier, profile.level
                    );

                    match self
                        .engine
                        .execute(&profile.prepared, profile.level, params)
                        .await
                    {
                        Ok(rows) => TierState::Success(i, rows),
                        Err(error) => {
                            let kind = classify(&error);
                            match kind.verdict(i + 1 < profiles.len()) {
                                Verdict::Degrade => {
                                    warn!(
                                        "{}: {} tier failed ({}: {}), degrading to {}",
                                        operation,
                                        profile.tier,
                                        kind,
                                        error,
                                        profiles[i + 1].tier
                                    );
                                    TierState::Trying(i + 1)
                                }
                                Verdict::Terminal => {
                                    debug!("{}: terminal {} failure: {}", operation, kind, error);
                                    TierState::Terminal(CoordinatorError::from_failure(
                                        operation, kind, error,
                                    ))
                                }
                            }
                        }
                    }
                }
                TierState::Success(i, rows) => {
                    if i > 0 {
                        debug!("{}: served by fallback profile {}", operation, i);
                    }
                    return Ok(Served::new(rows, profiles[i].tier, i));
                }
                TierState::Terminal(error) => return Err(error),
            };
        }
    }

    pub async fn lookup_station_name(
        &self,
        station_id: &str,
        ctx: &RequestContext,
    ) -> std::result::Result<Served<Option<String>>, CoordinatorError> {
        let served = self
            .execute(Operation::LookupStationName, &[Value::from(station_id)], ctx)
            .await?;
        Ok(served.map(|rows| {
            rows.first()
                .and_then(|r| r.get_text("name"))
                .map(str::to_string)
        }))
    }

    /// Highest `tmax` recorded for the station; `None` when it has no rows.
    pub async fn max_temperature(
        &self,
        station_id: &str,
        ctx: &RequestContext,
    ) -> std::result::Result<Served<Option<i32>>, CoordinatorError> {
        let served = self
            .execute(Operation::MaxTemperature, &[Value::from(station_id)], ctx)
            .await?;
        Ok(served.map(|rows| rows.first().and_then(|r| r.get_int("max_temp"))))
    }

    pub async fn record_temperature(
        &self,
        reading: &TemperatureReading,
        ctx: &RequestContext,
    ) -> std::result::Result<Served<()>, CoordinatorError> {
        let params = [
            Value::from(reading.station_id.as_str()),
            Value::Date(reading.date),
            Value::Int(reading.record.tmin),
            Value::Int(reading.record.tmax),
        ];
        let served = self
            .execute(Operation::RecordTemperature, &params, ctx)
            .await?;
        Ok(served.map(|_| ()))
    }

    /// Set the static name of a station partition.
    pub async fn register_station(
        &self,
        station: &StationMetadata,
        ctx: &RequestContext,
    ) -> std::result::Result<Served<()>, CoordinatorError> {
        let params = [
            Value::from(station.id.as_str()),
            Value::from(station.name.as_str()),
        ];
        let served = self
            .execute(Operation::RegisterStation, &params, ctx)
            .await?;
        Ok(served.map(|_| ()))
    }

    /// Rows for one station between `from` and `to` inclusive, ascending by date.
    pub async fn station_records(
        &self,
        station_id: &str,
        from: NaiveDate,
        to: NaiveDate,
        ctx: &RequestContext,
    ) -> std::result::Result<Served<Vec<TemperatureReading>>, CoordinatorError> {
        let params = [Value::from(station_id), Value::Date(from), Value::Date(to)];
        let served = self
            .execute(Operation::StationRecords, &params, ctx)
            .await?;

        Ok(served.map(|rows| {
            rows.iter()
                .filter_map(|row| {
                    Some(TemperatureReading {
                        station_id: station_id.to_string(),
                        date: row.get_date("date")?,
                        record: TemperatureRecord::new(row.get_int("tmin")?, row.get_int("tmax")?),
                    })
                })
                .collect()
        }))
    }

    /// The live `CREATE TABLE` statement. Not tiered: any node that answers
    /// can describe the schema.
    pub async fn describe_schema(&self, ctx: &RequestContext) -> Result<String> {
        let deadline = async {
            match ctx.deadline {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(StationError::Cancelled),
            _ = deadline => {
                warn!("Schema describe hit its deadline");
                Err(StationError::Cancelled)
            }
            result = self.engine.describe_table() => Ok(result?),
        }
    }
}
