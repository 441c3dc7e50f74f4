//! Operation → ordered statement profiles, prepared once at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{error, info};

use crate::config::TierLevels;
use crate::error::{Result, StationError};
use crate::storage::{
    ConsistencyLevel, ConsistencyTier, PreparedStatement, Statement, StorageEngine,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    LookupStationName,
    MaxTemperature,
    RecordTemperature,
    RegisterStation,
    StationRecords,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::LookupStationName,
        Operation::MaxTemperature,
        Operation::RecordTemperature,
        Operation::RegisterStation,
        Operation::StationRecords,
    ];

    pub fn statement(&self) -> Statement {
        match self {
            Operation::LookupStationName => Statement::SelectStationName,
            Operation::MaxTemperature => Statement::SelectMaxTmax,
            Operation::RecordTemperature => Statement::InsertTemperature,
            Operation::RegisterStation => Statement::InsertStationName,
            Operation::StationRecords => Statement::SelectStationRecords,
        }
    }

    pub fn is_write(&self) -> bool {
        self.statement().is_write()
    }

    /// Tiers in the order they are tried. Writes get a single, already
    /// most-permissive tier; reads start strong and fall back to available.
    pub fn tiers(&self) -> &'static [ConsistencyTier] {
        if self.is_write() {
            &[ConsistencyTier::Available]
        } else {
            &[ConsistencyTier::Strong, ConsistencyTier::Available]
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::LookupStationName => "LookupStationName",
            Operation::MaxTemperature => "MaxTemperature",
            Operation::RecordTemperature => "RecordTemperature",
            Operation::RegisterStation => "RegisterStation",
            Operation::StationRecords => "StationRecords",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A prepared template bound to the tier it must be executed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub prepared: PreparedStatement,
    pub tier: ConsistencyTier,
    pub level: ConsistencyLevel,
}

/// Immutable after [`StatementRegistry::prepare`]; share it behind an `Arc`.
#[derive(Debug)]
pub struct StatementRegistry {
    profiles: HashMap<Operation, Vec<Profile>>,
    levels: TierLevels,
}

impl StatementRegistry {
    /// Prepare every profile against `engine`.
    ///
    /// Any failure is fatal: a process must not serve traffic with a
    /// partially prepared registry, so nothing here is retried.
    pub async fn prepare(engine: &dyn StorageEngine, levels: TierLevels) -> Result<Self> {
        let mut profiles = HashMap::with_capacity(Operation::ALL.len());

        for operation in Operation::ALL {
            let mut list = Vec::with_capacity(operation.tiers().len());

            for &tier in operation.tiers() {
                let prepared = engine.prepare(operation.statement()).await.map_err(|e| {
                    error!("Failed to prepare {} ({}): {}", operation, tier, e);
                    StationError::RegistryPreparation(e)
                })?;

                list.push(Profile {
                    prepared,
                    tier,
                    level: Self::level_for(operation, tier, levels),
                });
            }

            profiles.insert(operation, list);
        }

        info!(
            "Prepared {} operations against {} engine (strong read {}, available read {}, write {})",
            profiles.len(),
            engine.name(),
            levels.strong_read,
            levels.available_read,
            levels.write
        );

        Ok(Self { profiles, levels })
    }

    fn level_for(operation: Operation, tier: ConsistencyTier, levels: TierLevels) -> ConsistencyLevel {
        match (operation.is_write(), tier) {
            (true, _) => levels.write,
            (false, ConsistencyTier::Strong) => levels.strong_read,
            (false, ConsistencyTier::Available) => levels.available_read,
        }
    }

    /// Profiles for `operation` in declared order; empty if unknown.
    pub fn profiles(&self, operation: Operation) -> &[Profile] {
        self.profiles
            .get(&operation)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn levels(&self) -> TierLevels {
        self.levels
    }
}
