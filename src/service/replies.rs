use serde::{Deserialize, Serialize};

use crate::coordinator::{CoordinatorError, Served};
use crate::models::TemperatureReading;

/// Machine-readable outcome carried by every reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyStatus {
    /// Served by the operation's primary tier.
    Ok,
    /// Served, but by a weaker tier than requested. Data is valid.
    Degraded,
    /// No tier served the request. Data fields hold sentinels.
    Failed,
}

impl ReplyStatus {
    fn of<T>(served: &Served<T>) -> Self {
        if served.is_degraded() {
            ReplyStatus::Degraded
        } else {
            ReplyStatus::Ok
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, ReplyStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationNameReply {
    pub name: String,
    pub error: String,
    pub status: ReplyStatus,
    pub found: bool,
}

impl StationNameReply {
    pub fn served(served: Served<Option<String>>) -> Self {
        Self {
            status: ReplyStatus::of(&served),
            error: served.tag(),
            found: served.value.is_some(),
            name: served.value.unwrap_or_default(),
        }
    }

    pub fn failed(error: &CoordinatorError) -> Self {
        Self {
            name: String::new(),
            error: error.tag(),
            status: ReplyStatus::Failed,
            found: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationMaxReply {
    /// Tenths of a degree Celsius; 0 when `found` is false or on failure.
    pub tmax: i32,
    pub error: String,
    pub status: ReplyStatus,
    pub found: bool,
}

impl StationMaxReply {
    pub fn served(served: Served<Option<i32>>) -> Self {
        Self {
            status: ReplyStatus::of(&served),
            error: served.tag(),
            found: served.value.is_some(),
            tmax: served.value.unwrap_or(0),
        }
    }

    pub fn failed(error: &CoordinatorError) -> Self {
        Self {
            tmax: 0,
            error: error.tag(),
            status: ReplyStatus::Failed,
            found: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTempsReply {
    pub ok: bool,
    pub error: String,
    pub status: ReplyStatus,
}

impl RecordTempsReply {
    pub fn served(served: Served<()>) -> Self {
        Self {
            ok: true,
            error: served.tag(),
            status: ReplyStatus::of(&served),
        }
    }

    pub fn failed(error: &CoordinatorError) -> Self {
        Self {
            ok: false,
            error: error.tag(),
            status: ReplyStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationSchemaReply {
    pub schema: String,
    pub error: String,
    pub status: ReplyStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationRecordsReply {
    pub records: Vec<TemperatureReading>,
    pub error: String,
    pub status: ReplyStatus,
}

impl StationRecordsReply {
    pub fn served(served: Served<Vec<TemperatureReading>>) -> Self {
        Self {
            status: ReplyStatus::of(&served),
            error: served.tag(),
            records: served.value,
        }
    }

    pub fn failed(error: &CoordinatorError) -> Self {
        Self {
            records: Vec::new(),
            error: error.tag(),
            status: ReplyStatus::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{CancelReason, Operation};
    use crate::storage::{ConsistencyTier, EngineError};

    #[test]
    fn test_degraded_reply_keeps_data() {
        let served = Served::new(Some(344), ConsistencyTier::Available, 1);
        let reply = StationMaxReply::served(served);

        assert_eq!(reply.tmax, 344);
        assert_eq!(reply.error, "fallback_to_available");
        assert_eq!(reply.status, ReplyStatus::Degraded);
        assert!(reply.status.is_success());
        assert!(reply.found);
    }

    #[test]
    fn test_empty_result_is_not_failure() {
        let served = Served::new(None, ConsistencyTier::Strong, 0);
        let reply = StationMaxReply::served(served);

        assert_eq!(reply.tmax, 0);
        assert_eq!(reply.error, "");
        assert_eq!(reply.status, ReplyStatus::Ok);
        assert!(!reply.found);
    }

    #[test]
    fn test_failed_reply_uses_sentinels() {
        let error = CoordinatorError::Unavailable {
            operation: Operation::LookupStationName,
            source: EngineError::NoHostAvailable {
                partition: "S1".to_string(),
            },
        };
        let reply = StationNameReply::failed(&error);

        assert_eq!(reply.name, "");
        assert_eq!(reply.error, "unavailable");
        assert_eq!(reply.status, ReplyStatus::Failed);
    }

    #[test]
    fn test_cancelled_write_is_distinct_from_unavailable() {
        let error = CoordinatorError::Cancelled {
            operation: Operation::RecordTemperature,
            reason: CancelReason::Deadline,
            attempts: 1,
        };
        let reply = RecordTempsReply::failed(&error);

        assert!(!reply.ok);
        assert_eq!(reply.error, "cancelled");
    }
}
